//! Airtable-compatible REST access.

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

pub mod license;
pub mod records;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("request to {url} failed with status {code}: {body}")]
    Status {
        url: Url,
        code: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode response: {0}")]
    Decode(serde_json::Error),
}

/// Minimal HTTP surface the sync needs.
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_json(
        &self,
        url: &Url,
        bearer: &str,
    ) -> impl Future<Output = Result<serde_json::Value, Self::Error>> + Send;

    /// Fire a JSON POST; the response body is not consumed.
    fn post_json(
        &self,
        url: &Url,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    type Error = Error;

    async fn get_json(&self, url: &Url, bearer: &str) -> Result<serde_json::Value, Self::Error> {
        trace!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(Error::Transport)?;
        let code = response.status();
        if !code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                url: url.clone(),
                code,
                body,
            });
        }
        response.json().await.map_err(Error::Transport)
    }

    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> Result<(), Self::Error> {
        trace!(%url, "POST");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        let code = response.status();
        if !code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                url: url.clone(),
                code,
                body,
            });
        }
        debug!(%url, %code, "webhook accepted");
        Ok(())
    }
}

/// One row of a remote table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, serde_json::Value>,
}

impl RemoteRecord {
    /// Text of a field. Lookup columns arrive as arrays; their first element is used.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(value_text)
    }

    pub fn value(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Array(items) => items.iter().find_map(value_text),
        serde_json::Value::Object(_) => None,
    }
}

/// JavaScript truthiness of a field value.
pub fn is_truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(serde_json::Value::Array(_) | serde_json::Value::Object(_)) => true,
    }
}

/// A page of a list-records response.
#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub records: Vec<RemoteRecord>,
    #[serde(default)]
    pub offset: Option<String>,
}

impl Page {
    pub fn from_json(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(Error::Decode)
    }

    /// Cursor for the next request; `None` once the server stops issuing one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.offset.as_deref().filter(|offset| !offset.is_empty())
    }
}

/// `{root}/{base}/{table}`, whether or not `root` ends in a slash.
pub fn table_url(root: &Url, base_id: &str, table_id: &str) -> Result<Url, url::ParseError> {
    let mut url = root.clone();
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend([base_id, table_id]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_record_text() {
        let record: RemoteRecord = serde_json::from_value(json!({
            "id": "rec1",
            "fields": {
                "Title": "Hello",
                "Order": 3,
                "Lookup": [null, "first", "second"],
                "Empty": null
            }
        }))
        .unwrap();
        assert_eq!(record.text("Title").as_deref(), Some("Hello"));
        assert_eq!(record.text("Order").as_deref(), Some("3"));
        assert_eq!(record.text("Lookup").as_deref(), Some("first"));
        assert_eq!(record.text("Empty"), None);
        assert_eq!(record.text("Missing"), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(Some(&json!(1))));
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!("yes"))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_page_cursor() {
        let page = Page::from_json(json!({"records": [], "offset": ""})).unwrap();
        assert_eq!(page.next_cursor(), None);
        let page = Page::from_json(json!({"records": [], "offset": "itr/rec"})).unwrap();
        assert_eq!(page.next_cursor(), Some("itr/rec"));
        let page = Page::from_json(json!({})).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn test_table_url() {
        let root = Url::parse("https://api.airtable.com/v0/").unwrap();
        assert_eq!(
            table_url(&root, "appA", "tblB").unwrap().as_str(),
            "https://api.airtable.com/v0/appA/tblB"
        );
    }

    #[test]
    fn test_table_url_keeps_root_without_trailing_slash() {
        let root = Url::parse("https://api.airtable.com/v0").unwrap();
        assert_eq!(
            table_url(&root, "appA", "tblB").unwrap().as_str(),
            "https://api.airtable.com/v0/appA/tblB"
        );
        let bare = Url::parse("https://api.airtable.com").unwrap();
        assert_eq!(
            table_url(&bare, "appA", "tblB").unwrap().as_str(),
            "https://api.airtable.com/appA/tblB"
        );
    }
}
