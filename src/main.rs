use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mdb_note_sync::{
    commands::{self, SyncCommand},
    config::{Settings, SettingsStore},
    progress::{SyncPhase, create_reporter},
    remote::{
        HttpTransport,
        license::{self, KeyStatus},
    },
    vault::local::LocalVault,
};
use tracing::{error, info};

#[derive(Parser)]
#[clap(version, about = "Pull scripts and templates from remote tables into a note vault")]
struct Opts {
    /// Root directory of the vault
    #[clap(short, long, env = "MDB_SYNC_VAULT")]
    vault: PathBuf,
    /// Settings file; defaults to `.mdb-sync/settings.yaml` inside the vault
    #[clap(short, long, env = "MDB_SYNC_SETTINGS")]
    settings: Option<PathBuf>,
    /// Token for the key-check and account lookup tables
    #[clap(long, env = "MDB_SYNC_SERVICE_TOKEN", hide_env_values = true)]
    service_token: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull one table into the vault
    Sync {
        #[clap(value_enum)]
        table: SyncCommand,
        /// Folder to make sure exists before writing notes
        #[clap(long)]
        template_folder: Option<String>,
    },
    /// Store and check the update API key
    SetApiKey { api_key: String },
    /// Store the account email and fetch its update ids
    SetEmail { email: String },
    /// Print the current settings
    Status,
}

fn mask(secret: &str) -> String {
    match secret.char_indices().nth(6) {
        Some((end, _)) => format!("{}…", &secret[..end]),
        None if secret.is_empty() => "(not set)".to_owned(),
        None => "…".to_owned(),
    }
}

fn print_status(store: &SettingsStore) {
    let settings: &Settings = store.get();
    println!("settings file:        {}", store.path().display());
    println!("update api key:       {}", mask(&settings.update_api_key));
    println!("update key valid:     {}", settings.update_api_key_is_valid);
    println!(
        "email:                {}",
        if settings.user_email.is_empty() {
            "(not set)"
        } else {
            &settings.user_email
        }
    );
    println!("email checked:        {}", settings.user_checked);
    println!("user api key:         {}", mask(&settings.user_api_key));
    println!("user sync table url:  {}", settings.user_sync_setting_url);
    println!("core scripts folder:  {}", settings.templater_scripts_folder);
    println!("demo folder:          {}", settings.demo_folder);
    println!("user scripts folder:  {}", settings.user_sync_scripts_folder);
    let mapping = settings.field_mapping();
    println!(
        "columns:              {} / {} / {} / {}",
        mapping.title, mapping.content, mapping.sub_folder, mapping.extension
    );
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let settings_path = opts
        .settings
        .unwrap_or_else(|| opts.vault.join(".mdb-sync/settings.yaml"));
    let mut store = SettingsStore::load(&settings_path, &opts.vault)
        .await
        .with_context(|| format!("load settings from {}", settings_path.display()))?;
    if let Some(token) = opts.service_token {
        store.update(|settings| settings.endpoints.service_token = token);
    }
    let transport = HttpTransport::new();

    match opts.command {
        Command::Sync {
            table,
            template_folder,
        } => {
            let vault = LocalVault::new(&opts.vault);
            let reporter = create_reporter();
            reporter.log_info(table.title());
            let result = commands::run_sync(
                table,
                store.get(),
                template_folder.as_deref(),
                &transport,
                &vault,
                reporter.clone(),
            )
            .await;
            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    reporter.set_phase(SyncPhase::Failed(e.to_string()));
                    reporter.finish();
                    return Err(e).context("sync not started");
                }
            };
            reporter.finish();
            if !report.is_complete() {
                bail!(
                    "sync incomplete: {} failed notes{}",
                    report.reconcile.failures.len(),
                    report
                        .fetch_error
                        .map(|e| format!(", fetch stopped early: {e}"))
                        .unwrap_or_default()
                );
            }
        }
        Command::SetApiKey { api_key } => {
            let status = commands::register_api_key(&mut store, &transport, api_key.trim())
                .await
                .context("save api key")?;
            match status {
                KeyStatus::Accepted => println!("API key accepted."),
                KeyStatus::Rejected => println!("Your API Key was expired. Please get a new one."),
                KeyStatus::Malformed => println!("This does not look like a valid API key."),
            }
        }
        Command::SetEmail { email } => {
            let checked = commands::register_email(&mut store, &transport, email.trim())
                .await
                .context("register email")?;
            if checked {
                println!("Email confirmed.");
            } else if !license::is_valid_email(email.trim()) {
                println!("This does not look like a valid email; it was saved unchecked.");
            } else {
                println!("This email is not linked to an account; update tables were reset.");
            }
        }
        Command::Status => print_status(&store),
    }
    info!("done");
    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
