//! Fetch a table and reconcile it into the vault.

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::{
    config::Timing,
    field_names::FieldMapping,
    progress::{ProgressReporter, SyncPhase},
    reconcile::{ReconcileReport, Reconciler},
    remote::{Transport, records::TableClient},
    table::TableReference,
    vault::Vault,
};

#[derive(Debug)]
pub struct SyncReport {
    pub fetched: usize,
    pub pages: usize,
    /// Why fetching stopped early; `None` when every page arrived.
    pub fetch_error: Option<String>,
    pub reconcile: ReconcileReport,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.fetch_error.is_none() && self.reconcile.failures.is_empty()
    }
}

pub struct SyncContext<'a, T, V> {
    pub transport: &'a T,
    pub vault: &'a V,
    pub api_root: &'a Url,
    pub timing: &'a Timing,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl<T: Transport, V: Vault> SyncContext<'_, T, V> {
    /// Pull every record of `table` and write them as notes. Whatever was
    /// fetched before a failed page is still written.
    pub async fn sync_table(
        &self,
        table: &TableReference,
        mapping: &FieldMapping,
        api_key: &str,
    ) -> SyncReport {
        self.reporter.set_phase(SyncPhase::FetchingRecords);
        let client = TableClient::new(self.transport, self.api_root, self.reporter.clone());
        let outcome = client.fetch_all_records(table, mapping, api_key).await;
        if let Some(error) = &outcome.error {
            warn!(
                %error,
                fetched = outcome.records.len(),
                "fetch stopped early, syncing a partial record set"
            );
            self.reporter.log_warn(&format!(
                "Only {} records were fetched before an error; the sync is partial",
                outcome.records.len()
            ));
        }

        let reconciler = Reconciler::new(self.vault, mapping, self.timing, self.reporter.clone());
        let reconcile = reconciler.reconcile(&outcome.records, table).await;
        info!(
            base = %table.base_id,
            table = %table.table_id,
            written = reconcile.written(),
            complete = outcome.is_complete(),
            "sync finished"
        );
        SyncReport {
            fetched: outcome.records.len(),
            pages: outcome.pages,
            fetch_error: outcome.error,
            reconcile,
        }
    }
}
