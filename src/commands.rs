//! User-invoked commands: the named table syncs and key/email registration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::{self, Settings, SettingsStore},
    progress::ProgressReporter,
    remote::{
        Transport,
        license::{self, KeyStatus, LicenseClient},
    },
    sync::{SyncContext, SyncReport},
    table::{TableReference, extract_airtable_ids},
    vault::Vault,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("You must provide an API Key to run this command")]
    MissingApiKey,
    #[error("You need to provide the email for your account to run this command")]
    MissingEmail,
    #[error("Your API Key was expired. Please get a new one.")]
    ExpiredApiKey,
    #[error("No source table is configured for {0:?}")]
    MissingTable(SyncCommand),
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("account lookup failed, settings left unchanged: {0}")]
    Lookup(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Settings(#[from] config::Error),
}

/// The tables a user can pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SyncCommand {
    /// Latest version of the sync scripts
    CoreScripts,
    /// Latest version of the demo sync templates
    DemoTemplates,
    /// The user's own sync templates, from the table behind the sync setting URL
    UserTemplates,
}

impl SyncCommand {
    pub fn title(self) -> &'static str {
        match self {
            Self::CoreScripts => "Get The Latest Version Of Sync Scripts",
            Self::DemoTemplates => "Get The Latest Version Of Demo Sync Templates",
            Self::UserTemplates => "Get Your Personal Sync Templates",
        }
    }

    fn requires_valid_update_key(self) -> bool {
        matches!(self, Self::CoreScripts)
    }
}

/// What a command resolved to, before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub table: TableReference,
    pub api_key: String,
}

pub fn plan(command: SyncCommand, settings: &Settings) -> Result<SyncPlan, Error> {
    let (ids, folder, api_key) = match command {
        SyncCommand::CoreScripts => (
            Some(settings.update_ids.ob_sync_core.clone()),
            &settings.templater_scripts_folder,
            &settings.update_api_key,
        ),
        SyncCommand::DemoTemplates => (
            Some(settings.update_ids.demo_templates.clone()),
            &settings.demo_folder,
            &settings.update_api_key,
        ),
        SyncCommand::UserTemplates => (
            extract_airtable_ids(&settings.user_sync_setting_url),
            &settings.user_sync_scripts_folder,
            &settings.user_api_key,
        ),
    };
    if api_key.is_empty() {
        return Err(Error::MissingApiKey);
    }
    if settings.user_email.is_empty() {
        return Err(Error::MissingEmail);
    }
    if command.requires_valid_update_key() && !settings.update_api_key_is_valid {
        return Err(Error::ExpiredApiKey);
    }
    let ids = ids
        .filter(|ids| ids.is_complete())
        .ok_or(Error::MissingTable(command))?;
    Ok(SyncPlan {
        table: TableReference::new(&ids, folder.as_str()),
        api_key: api_key.clone(),
    })
}

/// Check preconditions for `command` and run its sync.
pub async fn run_sync<T: Transport, V: Vault>(
    command: SyncCommand,
    settings: &Settings,
    template_folder: Option<&str>,
    transport: &T,
    vault: &V,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<SyncReport, Error> {
    let mut plan = plan(command, settings)?;
    if let Some(folder) = template_folder {
        plan.table = plan.table.with_template_folder(folder);
    }
    info!(command = command.title(), base = %plan.table.base_id, "running sync command");
    let context = SyncContext {
        transport,
        vault,
        api_root: &settings.endpoints.api_root,
        timing: &settings.timing,
        reporter,
    };
    Ok(context
        .sync_table(&plan.table, &settings.field_mapping(), &plan.api_key)
        .await)
}

/// Store a new update key and record whether the backend accepts it.
pub async fn register_api_key<T: Transport>(
    store: &mut SettingsStore,
    transport: &T,
    api_key: &str,
) -> Result<KeyStatus, config::Error> {
    let settings = store.get();
    let status = LicenseClient::new(transport, &settings.endpoints, &settings.timing)
        .verify_api_key(api_key)
        .await;
    info!(?status, "checked update api key");
    store.update(|settings| {
        settings.update_api_key = api_key.to_owned();
        settings.update_api_key_is_valid = status == KeyStatus::Accepted;
    });
    store.save().await?;
    Ok(status)
}

/// Store the account email and fetch the tables it is entitled to. An email
/// the backend does not know resets those tables to their defaults; a
/// malformed one is stored unchecked without contacting the backend. When the
/// lookup itself fails nothing is changed or saved.
pub async fn register_email<T: Transport>(
    store: &mut SettingsStore,
    transport: &T,
    email: &str,
) -> Result<bool, RegisterError> {
    if !license::is_valid_email(email) {
        warn!("malformed email, not contacting the backend");
        store.update(|settings| {
            settings.user_email = email.to_owned();
            settings.user_checked = false;
        });
        store.save().await?;
        return Ok(false);
    }
    let settings = store.get();
    let update_ids = LicenseClient::new(transport, &settings.endpoints, &settings.timing)
        .lookup_update_ids(email)
        .await
        .map_err(|e| RegisterError::Lookup(Box::new(e)))?;
    let checked = update_ids.is_some();
    if !checked {
        warn!("no update ids for this email, resetting to defaults");
    }
    store.update(|settings| {
        settings.user_email = email.to_owned();
        settings.user_checked = checked;
        settings.update_ids = update_ids.unwrap_or_default();
    });
    store.save().await?;
    Ok(checked)
}
