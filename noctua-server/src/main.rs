//! Noctua chat backend - standalone binary

use anyhow::{Context, anyhow};
use clap::Parser;
use config::{ChatSettings, PathManager, Settings, load_env_file};
use llm::{ChatModel, RunpodProvider};
use noctua_core::storage::{
    MemoryStorage, MemoryStores, SqliteStorage, SqliteStore, SqliteStores, StorageTypes, Stores,
};
use noctua_core::{ConversationRepository, MessageOrchestrator, OrchestratorConfig, TranscriptCache};
use noctua_server::{AppState, Authenticator, SessionSigner, build_router, logging, start_server_on};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "noctua-server", author, version, about = "Chat backend for noctua", long_about = None)]
struct Args {
    /// Address to listen on (overrides NOCTUA_BIND)
    #[arg(short, long)]
    bind: Option<String>,

    /// Settings file (defaults to settings.toml in the config dir)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset, e.g. "debug" or "info,llm=trace"
    #[arg(short, long)]
    log_level: Option<String>,

    /// Store conversations in SQLite (defaults to noctua.db in the data dir)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    db: Option<Option<PathBuf>>,

    /// Also log to a file (defaults to logs/noctua.log in the data dir)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    /// Directory for the default database and log file
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn orchestrator_config(chat: &ChatSettings) -> anyhow::Result<OrchestratorConfig> {
    Ok(OrchestratorConfig {
        inference_timeout: Duration::from_secs(chat.inference_timeout_secs),
        title_timing: chat.title_timing.parse().map_err(|e: String| anyhow!(e))?,
        max_queue_depth: chat.max_queue_depth,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    if let Some(dir) = args.data_dir.clone() {
        PathManager::set_data_dir(dir);
    }
    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!(e))?;

    let db = PathManager::requested(args.db.clone(), PathManager::db_path).map_err(|e| anyhow!(e))?;
    let log_file =
        PathManager::requested(args.log_file.clone(), PathManager::log_file_path).map_err(|e| anyhow!(e))?;
    if db.is_some() || log_file.is_some() {
        PathManager::ensure_dirs_exist().context("Failed to create data directories")?;
    }
    settings.db_path = db.or(settings.db_path);
    settings.log_file = log_file.or(settings.log_file);

    logging::init_logging(settings.log_file.as_deref(), args.log_level.as_deref());
    settings.validate().map_err(|e| anyhow!(e))?;

    let (Some(endpoint_id), Some(api_key), Some(secret)) = (
        settings.runpod.endpoint_id.as_deref(),
        settings.runpod.api_key.as_deref(),
        settings.auth.session_secret.as_deref(),
    ) else {
        return Err(anyhow!("incomplete settings after validation"));
    };

    let timeout = Duration::from_secs(settings.chat.inference_timeout_secs);
    let model = RunpodProvider::new(&settings.runpod.base_url, endpoint_id, api_key, timeout)?
        .create_chat_model();
    let auth = Authenticator::new(SessionSigner::new(secret), settings.auth.allowed_emails.clone());
    let bind = args.bind.clone().unwrap_or_else(|| settings.bind.clone());

    info!(endpoint = model.name(), "using RunPod endpoint");

    match &settings.db_path {
        Some(path) => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            info!("Storing conversations in {}", path.display());
            serve::<SqliteStorage, _>(SqliteStores::new(store), model, auth, &settings, &bind).await
        }
        None => {
            warn!("No database configured (NOCTUA_DB_PATH or --db), conversations are kept in memory only");
            serve::<MemoryStorage, _>(MemoryStores::new(), model, auth, &settings, &bind).await
        }
    }
}

async fn serve<S: StorageTypes, T: Stores<S>>(
    stores: T,
    model: Arc<dyn ChatModel + Send + Sync>,
    auth: Authenticator,
    settings: &Settings,
    bind: &str,
) -> anyhow::Result<()> {
    let cache = TranscriptCache::new(
        Duration::from_secs(settings.chat.cache_ttl_secs),
        settings.chat.cache_max_entries,
    );
    let repository = ConversationRepository::new(&stores, cache);
    let orchestrator = MessageOrchestrator::new(repository, model, orchestrator_config(&settings.chat)?);
    let router = build_router(AppState::new(orchestrator, auth));

    let handle = start_server_on(bind, router).await?;
    info!("noctua server listening on {}", handle.url());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;
    Ok(())
}
