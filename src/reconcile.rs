//! Create-or-update reconciliation of remote records against vault files.

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    config::Timing,
    field_names::FieldMapping,
    path::{self, DEFAULT_EXTENSION},
    progress::{EntryStatus, ProgressReporter, SyncPhase, SyncProgress},
    remote::RemoteRecord,
    table::TableReference,
    vault::Vault,
};

/// A note derived from one record, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNote {
    pub file_name: String,
    pub folder_path: String,
    pub extension: String,
    pub content: String,
}

impl PendingNote {
    pub fn from_record(record: &RemoteRecord, mapping: &FieldMapping, root: &str) -> Self {
        let sub_folder = record.text(&mapping.sub_folder);
        Self {
            file_name: path::sanitize_file_name(&record.text(&mapping.title).unwrap_or_default()),
            folder_path: path::resolve_folder_path(root, sub_folder.as_deref()),
            extension: record
                .text(&mapping.extension)
                .filter(|ext| !ext.is_empty())
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned()),
            content: record.text(&mapping.content).unwrap_or_default(),
        }
    }

    pub fn path(&self) -> String {
        path::resolve_note_path(&self.folder_path, None, &self.file_name, Some(&self.extension))
    }
}

/// How a note gets written, decided from whether it exists and where it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Create,
    DirectOverwrite,
    Modify,
}

#[derive(Debug, thiserror::Error)]
pub enum NoteError<E> {
    #[error("failed to create folder {path}: {source}")]
    CreateFolder { path: String, source: E },
    #[error("failed to check {path}: {source}")]
    Exists { path: String, source: E },
    #[error("failed to write {path} ({action:?}): {source}")]
    Write {
        path: String,
        action: NoteAction,
        source: E,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFailure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub created: usize,
    pub modified: usize,
    pub overwritten: usize,
    pub failures: Vec<NoteFailure>,
    /// Paths written by more than one record in this run. The last record wins.
    pub collisions: Vec<String>,
    pub chunks: usize,
}

impl ReconcileReport {
    pub fn written(&self) -> usize {
        self.created + self.modified + self.overwritten
    }
}

pub struct Reconciler<'a, V> {
    vault: &'a V,
    mapping: &'a FieldMapping,
    timing: &'a Timing,
    reporter: Arc<dyn ProgressReporter>,
}

impl<'a, V: Vault> Reconciler<'a, V> {
    pub fn new(
        vault: &'a V,
        mapping: &'a FieldMapping,
        timing: &'a Timing,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            vault,
            mapping,
            timing,
            reporter,
        }
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), NoteError<V::Error>> {
        if folder.is_empty() {
            return Ok(());
        }
        let exists = self
            .vault
            .exists(folder)
            .await
            .map_err(|source| NoteError::Exists {
                path: folder.to_owned(),
                source,
            })?;
        if !exists {
            debug!(folder, "creating folder");
            self.vault
                .create_folder(folder)
                .await
                .map_err(|source| NoteError::CreateFolder {
                    path: folder.to_owned(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn write_note(
        &self,
        note: &PendingNote,
        path: &str,
    ) -> Result<NoteAction, NoteError<V::Error>> {
        self.ensure_folder(&note.folder_path).await?;
        let exists = self
            .vault
            .exists(path)
            .await
            .map_err(|source| NoteError::Exists {
                path: path.to_owned(),
                source,
            })?;
        let action = if !exists {
            NoteAction::Create
        } else if path::is_hidden_path(path) {
            NoteAction::DirectOverwrite
        } else {
            NoteAction::Modify
        };
        let written = match action {
            NoteAction::Create => self.vault.create(path, &note.content).await,
            NoteAction::DirectOverwrite => self.vault.write(path, &note.content).await,
            NoteAction::Modify => self.vault.modify(path, &note.content).await,
        };
        written.map_err(|source| NoteError::Write {
            path: path.to_owned(),
            action,
            source,
        })?;
        if action == NoteAction::Modify {
            // give the vault's metadata indexer a moment before the next write
            tokio::time::sleep(self.timing.metadata_settle()).await;
        }
        Ok(action)
    }

    /// Bring the vault in line with `records`, in chunks, reporting progress
    /// after each chunk. Per-note failures are recorded and do not stop the run.
    pub async fn reconcile(
        &self,
        records: &[RemoteRecord],
        table: &TableReference,
    ) -> ReconcileReport {
        let notes = records
            .iter()
            .map(|record| PendingNote::from_record(record, self.mapping, &table.target_folder_path))
            .collect::<Vec<_>>();
        let mut report = ReconcileReport::default();
        let mut progress = SyncProgress {
            total_fetched: records.len(),
            total_to_process: notes.len(),
            processed_so_far: 0,
        };

        self.reporter.set_phase(SyncPhase::Reconciling);
        self.reporter.register_notes(notes.len());

        if let Some(template_folder) = &table.template_folder_path {
            if let Err(e) = self.ensure_folder(&path::normalize_path(template_folder)).await {
                warn!(error = %e, "could not prepare template folder");
                self.reporter.log_warn(&e.to_string());
            }
        }

        let mut seen = HashSet::new();
        for chunk in notes.chunks(self.timing.chunk_size.max(1)) {
            for note in chunk {
                let path = note.path();
                if !seen.insert(path.clone()) {
                    warn!(%path, "several records map to the same note; last one wins");
                    self.reporter
                        .log_warn(&format!("{path} is written by more than one record"));
                    report.collisions.push(path.clone());
                }
                self.reporter.update_entry(&path, EntryStatus::Processing);
                match self.write_note(note, &path).await {
                    Ok(NoteAction::Create) => {
                        report.created += 1;
                        self.reporter.update_entry(&path, EntryStatus::Created);
                    }
                    Ok(NoteAction::Modify) => {
                        report.modified += 1;
                        self.reporter.update_entry(&path, EntryStatus::Modified);
                    }
                    Ok(NoteAction::DirectOverwrite) => {
                        report.overwritten += 1;
                        self.reporter.update_entry(&path, EntryStatus::Overwritten);
                    }
                    Err(e) => {
                        error!(error = %e, %path, "failed to write note");
                        let message = e.to_string();
                        self.reporter
                            .log_error(&format!("Failed to write file: {message}"));
                        self.reporter
                            .update_entry(&path, EntryStatus::Failed(message.clone()));
                        report.failures.push(NoteFailure { path, message });
                    }
                }
            }
            progress.processed_so_far += chunk.len();
            report.chunks += 1;
            if progress.remaining() > 0 {
                self.reporter.chunk_finished(progress);
            } else {
                self.reporter.set_phase(SyncPhase::Completed);
            }
        }

        info!(
            created = report.created,
            modified = report.modified,
            overwritten = report.overwritten,
            failed = report.failures.len(),
            collisions = report.collisions.len(),
            "reconciled notes"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::field_names::Locale;

    fn record(fields: serde_json::Value) -> RemoteRecord {
        serde_json::from_value(json!({ "fields": fields })).unwrap()
    }

    #[test]
    fn test_pending_note_defaults() {
        let mapping = FieldMapping::for_locale(Locale::ZhCn);
        let note = PendingNote::from_record(&record(json!({ "Title": "a: b" })), &mapping, "Notes");
        assert_eq!(
            note,
            PendingNote {
                file_name: "a- b".into(),
                folder_path: "Notes".into(),
                extension: "md".into(),
                content: "".into(),
            }
        );
        assert_eq!(note.path(), "Notes/a- b.md");
    }

    #[test]
    fn test_pending_note_with_sub_folder_and_extension() {
        let mapping = FieldMapping::for_locale(Locale::En);
        let note = PendingNote::from_record(
            &record(json!({
                "TitleEN": "sync",
                "SubFolderEN": "Scripts/Core",
                "Extension": "js",
                "MDEN": "module.exports = {};"
            })),
            &mapping,
            "Templater/",
        );
        assert_eq!(note.folder_path, "Templater/Scripts/Core");
        assert_eq!(note.path(), "Templater/Scripts/Core/sync.js");
        assert_eq!(note.content, "module.exports = {};");
    }
}
