//! License key and account email checks.

use std::sync::LazyLock;

use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{Endpoints, Timing, UpdateIds};

use super::{Page, Transport, is_truthy, table_url};

const MIN_API_KEY_LEN: usize = 82;
const MIN_EMAIL_LEN: usize = 10;

static EMAIL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .unwrap()
});

/// Shape check for personal access tokens; no network involved.
pub fn is_valid_api_key(api_key: &str) -> bool {
    api_key.chars().count() >= MIN_API_KEY_LEN && api_key.contains("pat") && api_key.contains('.')
}

pub fn is_valid_email(email: &str) -> bool {
    let Some(at) = email.find('@') else {
        return false;
    };
    if !email[at..].contains('.') || email.chars().count() < MIN_EMAIL_LEN {
        return false;
    }
    EMAIL.is_match(email)
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError<E> {
    #[error("invalid lookup url: {0}")]
    Url(url::ParseError),
    #[error("lookup request failed: {0}")]
    Request(E),
    #[error("unexpected lookup response: {0}")]
    Response(super::Error),
    #[error("undecodable update ids: {0}")]
    UpdateIds(serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// Failed the local shape check; the backend was not contacted.
    Malformed,
    /// The backend did not confirm the key.
    Rejected,
    Accepted,
}

/// Quote a value for use inside an Airtable formula string literal.
fn formula_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub struct LicenseClient<'a, T> {
    transport: &'a T,
    endpoints: &'a Endpoints,
    timing: &'a Timing,
}

impl<'a, T: Transport> LicenseClient<'a, T> {
    pub fn new(transport: &'a T, endpoints: &'a Endpoints, timing: &'a Timing) -> Self {
        Self {
            transport,
            endpoints,
            timing,
        }
    }

    fn key_log_url(&self, challenge: &Uuid) -> Result<Url, url::ParseError> {
        let log = &self.endpoints.key_log;
        let mut url = table_url(&self.endpoints.api_root, &log.base_id, &log.table)?;
        url.query_pairs_mut()
            .append_pair("maxRecords", "1")
            .append_pair("view", &log.view_id)
            .append_pair(
                "filterByFormula",
                &format!(
                    "{{{}}} = {}",
                    log.uuid_field,
                    formula_literal(&challenge.to_string())
                ),
            )
            .append_pair("fields[]", &log.match_field);
        Ok(url)
    }

    fn email_lookup_url(&self, email: &str) -> Result<Url, url::ParseError> {
        let table = &self.endpoints.email_lookup;
        let mut url = table_url(&self.endpoints.api_root, &table.base_id, &table.table)?;
        url.query_pairs_mut()
            .append_pair("maxRecords", "1")
            .append_pair(
                "filterByFormula",
                &format!("{{{}}} = {}", table.email_field, formula_literal(email)),
            )
            .append_pair("fields[]", &table.update_ids_field);
        Ok(url)
    }

    /// Ask the backend whether `api_key` is valid.
    ///
    /// Posts a fresh challenge id with the key to the webhook, waits for the
    /// webhook to settle, then polls the log table for the row tagged with the
    /// challenge id. Any failure or an absent row counts as invalid.
    pub async fn check_api_key(&self, api_key: &str) -> bool {
        let challenge = Uuid::new_v4();
        let body = json!({ "uuid": challenge.to_string(), "userApiKey": api_key });
        if let Err(error) = self
            .transport
            .post_json(&self.endpoints.webhook_url, &body)
            .await
        {
            warn!(%error, "key check webhook failed");
            return false;
        }

        let url = match self.key_log_url(&challenge) {
            Ok(url) => url,
            Err(error) => {
                warn!(%error, "invalid key log url");
                return false;
            }
        };

        tokio::time::sleep(self.timing.webhook_settle()).await;
        let mut interval = self.timing.poll_interval();
        let attempts = self.timing.poll_attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .transport
                .get_json(&url, &self.endpoints.service_token)
                .await
                .map_err(|e| e.to_string())
                .and_then(|json| Page::from_json(json).map_err(|e| e.to_string()))
            {
                Ok(page) => {
                    if let Some(record) = page.records.first() {
                        let valid = is_truthy(record.value(&self.endpoints.key_log.match_field));
                        info!(%challenge, valid, attempt, "key check answered");
                        return valid;
                    }
                    debug!(%challenge, attempt, "key check not logged yet");
                }
                Err(error) => warn!(%error, %challenge, attempt, "key check poll failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
                interval *= 2;
            }
        }
        info!(%challenge, attempts, "no key check verdict, treating key as invalid");
        false
    }

    /// Local shape check first, then the remote check.
    pub async fn verify_api_key(&self, api_key: &str) -> KeyStatus {
        if !is_valid_api_key(api_key) {
            return KeyStatus::Malformed;
        }
        if self.check_api_key(api_key).await {
            KeyStatus::Accepted
        } else {
            KeyStatus::Rejected
        }
    }

    /// Fetch the table ids the account behind `email` may pull.
    ///
    /// `Ok(None)` when no account row exists or the row carries no ids. A
    /// failed request or an unreadable answer is an error, so callers can
    /// tell an unknown account from an unreachable backend.
    pub async fn lookup_update_ids(
        &self,
        email: &str,
    ) -> Result<Option<UpdateIds>, LookupError<T::Error>> {
        let email = email.trim();
        let url = self.email_lookup_url(email).map_err(LookupError::Url)?;
        let json = self
            .transport
            .get_json(&url, &self.endpoints.service_token)
            .await
            .map_err(LookupError::Request)
            .inspect_err(|error| warn!(%error, "email lookup failed"))?;
        let page = Page::from_json(json)
            .map_err(LookupError::Response)
            .inspect_err(|error| warn!(%error, "unexpected email lookup response"))?;
        let Some(raw) = page
            .records
            .first()
            .and_then(|record| record.text(&self.endpoints.email_lookup.update_ids_field))
        else {
            debug!("no update ids for this email");
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(LookupError::UpdateIds)
            .inspect_err(|error| warn!(%error, "undecodable update ids"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_shape() {
        let valid = format!("pat{}.{}", "a".repeat(14), "b".repeat(64));
        assert!(valid.len() >= MIN_API_KEY_LEN);
        assert!(is_valid_api_key(&valid));
        assert!(!is_valid_api_key("patshort.x"));
        assert!(!is_valid_api_key(&"x".repeat(90)));
        assert!(!is_valid_api_key(&format!("{}.", "a".repeat(90))));
        assert!(!is_valid_api_key(""));
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("someone@example.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("a@b.cd"));
        assert!(!is_valid_email("someone.example.com"));
        assert!(!is_valid_email("someone@examplecom"));
        assert!(!is_valid_email("some one@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_formula_literal_escapes_quotes() {
        assert_eq!(formula_literal("o'neil@x.com"), r"'o\'neil@x.com'");
    }
}
