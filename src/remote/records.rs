//! Paginated list-records fetching.

use std::sync::Arc;

use tracing::{debug, error, info};
use url::Url;

use crate::{field_names::FieldMapping, progress::ProgressReporter, table::TableReference};

use super::{Page, RemoteRecord, Transport};

/// Result of walking every page of a table.
///
/// A failed page ends the walk; whatever was accumulated up to that point is
/// kept and `error` describes why the walk stopped.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RemoteRecord>,
    pub pages: usize,
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

pub struct TableClient<'a, T> {
    transport: &'a T,
    api_root: &'a Url,
    reporter: Arc<dyn ProgressReporter>,
}

impl<'a, T: Transport> TableClient<'a, T> {
    pub fn new(transport: &'a T, api_root: &'a Url, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            transport,
            api_root,
            reporter,
        }
    }

    /// URL of the first page: view filter plus the mapped columns. Later pages
    /// append the server's cursor.
    pub fn query_url(
        &self,
        table: &TableReference,
        mapping: &FieldMapping,
    ) -> Result<Url, url::ParseError> {
        let mut url = super::table_url(self.api_root, &table.base_id, &table.table_id)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(view) = &table.view_id {
                query.append_pair("view", view);
            }
            for column in mapping.columns() {
                query.append_pair("fields[]", column);
            }
        }
        Ok(url)
    }

    pub async fn fetch_all_records(
        &self,
        table: &TableReference,
        mapping: &FieldMapping,
        api_key: &str,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let base_url = match self.query_url(table, mapping) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, base = %table.base_id, table = %table.table_id, "invalid table url");
                outcome.error = Some(format!("invalid table url: {e}"));
                return outcome;
            }
        };

        let mut cursor: Option<String> = None;
        loop {
            let mut url = base_url.clone();
            if let Some(offset) = &cursor {
                url.query_pairs_mut().append_pair("offset", offset);
            }
            let page = match self.transport.get_json(&url, api_key).await {
                Ok(json) => Page::from_json(json).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    error!(error = %e, %url, fetched = outcome.records.len(), "failed to fetch page");
                    self.reporter
                        .log_error(&format!("Failed to fetch records: {e}"));
                    outcome.error = Some(e);
                    break;
                }
            };
            outcome.pages += 1;
            cursor = page.next_cursor().map(ToOwned::to_owned);
            outcome.records.extend(page.records);
            debug!(page = outcome.pages, total = outcome.records.len(), "fetched page");
            self.reporter.records_fetched(outcome.records.len());
            if cursor.is_none() {
                break;
            }
        }
        info!(
            records = outcome.records.len(),
            pages = outcome.pages,
            complete = outcome.is_complete(),
            "finished fetching table"
        );
        outcome
    }
}
