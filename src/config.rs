use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    field_names::{FieldMapping, FieldOverrides, Language},
    table::TableIds,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(serde_yaml::Error),
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Delays and retry bounds. These are heuristics for giving the remote
/// webhook and the vault indexer time to settle, not completion guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub webhook_settle_ms: u64,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub metadata_settle_ms: u64,
    pub chunk_size: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            webhook_settle_ms: 1500,
            poll_attempts: 3,
            poll_interval_ms: 1000,
            metadata_settle_ms: 100,
            chunk_size: 10,
        }
    }
}

impl Timing {
    pub fn webhook_settle(&self) -> Duration {
        Duration::from_millis(self.webhook_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn metadata_settle(&self) -> Duration {
        Duration::from_millis(self.metadata_settle_ms)
    }

    #[cfg(test)]
    pub(crate) fn without_delays() -> Self {
        Self {
            webhook_settle_ms: 0,
            poll_interval_ms: 0,
            metadata_settle_ms: 0,
            ..Default::default()
        }
    }
}

/// Log table the key-check webhook writes its verdict into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLogTable {
    pub base_id: String,
    pub table: String,
    pub view_id: String,
    pub uuid_field: String,
    pub match_field: String,
}

/// Table mapping account emails to the ids of the tables they may pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTable {
    pub base_id: String,
    pub table: String,
    pub email_field: String,
    pub update_ids_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub api_root: Url,
    pub webhook_url: Url,
    pub key_log: KeyLogTable,
    pub email_lookup: EmailTable,
    /// Token for reading the key log and email tables.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_token: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_root: Url::parse("https://api.airtable.com/v0/").unwrap(),
            webhook_url: Url::parse(
                "https://hooks.airtable.com/workflows/v1/genericWebhook/appq9k6KwHV3lEIJZ/wfl2uT25IPEljno9w/wtrFUIEC8SXlDsdIu",
            )
            .unwrap(),
            key_log: KeyLogTable {
                base_id: "appq9k6KwHV3lEIJZ".into(),
                table: "UpdateLogs".into(),
                view_id: "viweTQ2YarquoqZUT".into(),
                uuid_field: "UUID".into(),
                match_field: "Match".into(),
            },
            email_lookup: EmailTable {
                base_id: "appxQqkHaEkjUQnBf".into(),
                table: "EmailSync".into(),
                email_field: "Email".into(),
                update_ids_field: "ObSyncUpdateIDs".into(),
            },
            service_token: String::new(),
        }
    }
}

/// Tables an account is entitled to pull from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIds {
    #[serde(rename = "obSyncCore", default)]
    pub ob_sync_core: TableIds,
    #[serde(rename = "demoTemplates", default)]
    pub demo_templates: TableIds,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub update_api_key: String,
    pub update_api_key_is_valid: bool,
    pub user_email: String,
    pub user_checked: bool,
    pub user_api_key: String,
    pub user_sync_setting_url: String,
    pub templater_scripts_folder: String,
    pub demo_folder: String,
    pub user_sync_scripts_folder: String,
    pub language: Language,
    pub field_overrides: FieldOverrides,
    pub update_ids: UpdateIds,
    pub timing: Timing,
    pub endpoints: Endpoints,
}

impl Settings {
    pub fn field_mapping(&self) -> FieldMapping {
        FieldMapping::for_locale(self.language.resolve()).with_overrides(&self.field_overrides)
    }
}

/// Folder settings of the Templater plugin, if installed in the vault.
#[derive(Debug, Default, Deserialize)]
struct TemplaterSettings {
    #[serde(default)]
    user_scripts_folder: Option<String>,
    #[serde(default)]
    templates_folder: Option<String>,
}

const TEMPLATER_SETTINGS: &str = ".obsidian/plugins/templater-obsidian/data.json";

async fn read_templater_settings(vault_root: &Path) -> Option<TemplaterSettings> {
    let path = vault_root.join(TEMPLATER_SETTINGS);
    let content = tokio::fs::read_to_string(&path).await.ok()?;
    serde_json::from_str(&content)
        .inspect_err(|error| warn!(%error, path = %path.display(), "ignoring unreadable templater settings"))
        .ok()
}

fn fill_if_empty(slot: &mut String, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        if slot.is_empty() {
            *slot = value.clone();
        }
    }
}

/// Sole owner of the persisted [`Settings`].
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path` (defaults when missing), then fill empty folder
    /// settings from the Templater plugin's configuration in `vault_root`.
    pub async fn load(path: impl Into<PathBuf>, vault_root: &Path) -> Result<Self, Error> {
        let path = path.into();
        let mut settings = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Settings::default(),
            Ok(content) => serde_yaml::from_str(&content).map_err(|source| Error::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(source) => return Err(Error::Read { path, source }),
        };
        if let Some(templater) = read_templater_settings(vault_root).await {
            fill_if_empty(
                &mut settings.templater_scripts_folder,
                templater.user_scripts_folder.as_ref(),
            );
            fill_if_empty(&mut settings.demo_folder, templater.templates_folder.as_ref());
            fill_if_empty(
                &mut settings.user_sync_scripts_folder,
                templater.templates_folder.as_ref(),
            );
        }
        Ok(Self { path, settings })
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mutate settings in memory; call [`SettingsStore::save`] to persist.
    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings);
    }

    pub async fn save(&self) -> Result<(), Error> {
        let content = serde_yaml::to_string(&self.settings).map_err(Error::Serialize)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| Error::Write {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings = serde_yaml::from_str(
            r#"
user_email: someone@example.com
timing:
  webhook_settle_ms: 10
update_ids:
  obSyncCore:
    baseID: appA
    tableID: tblB
"#,
        )
        .unwrap();
        assert_eq!(settings.user_email, "someone@example.com");
        assert_eq!(settings.timing.webhook_settle_ms, 10);
        assert_eq!(settings.timing.chunk_size, 10);
        assert_eq!(settings.update_ids.ob_sync_core.base_id, "appA");
        assert_eq!(settings.update_ids.ob_sync_core.view_id, "");
        assert_eq!(settings.endpoints, Endpoints::default());
        assert_eq!(settings.language, Language::Auto);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_templater_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join(".obsidian/plugins/templater-obsidian");
        tokio::fs::create_dir_all(&plugin_dir).await.unwrap();
        tokio::fs::write(
            plugin_dir.join("data.json"),
            r#"{"user_scripts_folder": "Scripts", "templates_folder": "Templates"}"#,
        )
        .await
        .unwrap();

        let path = dir.path().join("settings/settings.yaml");
        let mut store = SettingsStore::load(&path, dir.path()).await.unwrap();
        assert_eq!(store.get().templater_scripts_folder, "Scripts");
        assert_eq!(store.get().demo_folder, "Templates");
        assert_eq!(store.get().user_sync_scripts_folder, "Templates");

        store.update(|settings| {
            settings.demo_folder = "Demo".into();
            settings.user_api_key = "key".into();
        });
        store.save().await.unwrap();

        let reloaded = SettingsStore::load(&path, dir.path()).await.unwrap();
        assert_eq!(reloaded.get().demo_folder, "Demo");
        assert_eq!(reloaded.get().user_api_key, "key");
        assert_eq!(reloaded.get().templater_scripts_folder, "Scripts");
    }

    #[tokio::test]
    async fn test_unparsable_settings_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        tokio::fs::write(&path, "timing: [").await.unwrap();
        let error = SettingsStore::load(&path, dir.path()).await.err().unwrap();
        assert!(matches!(error, Error::Parse { .. }));
    }
}
