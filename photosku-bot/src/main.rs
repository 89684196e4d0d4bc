//! photosku-bot - Telegram bot for item photos tagged with article numbers
//!
//! Startup order: configuration, tracing, build identification, storage,
//! Telegram client, dispatcher, then polling or webhook intake alongside the
//! HTTP listener. Ctrl-C stops intake and drains the per-user workers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use photosku_bot::engine::Catalog;
use photosku_bot::session::{ConversationEngine, Dispatcher, DispatcherSettings};
use photosku_bot::store::{
    EntityStore, FilesystemObjectStore, MemoryEntityStore, MemoryObjectStore, ObjectStore,
    SqliteEntityStore,
};
use photosku_bot::transport::telegram::{run_polling, TelegramClient};
use photosku_bot::{build_router, logging, AppState};
use photosku_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig, UpdateMode};
use photosku_common::db::init_database;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "photosku-bot", version, about = "Telegram bot for item photos tagged with article numbers")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "PHOTOSKU_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database and object store
    #[arg(long, env = "PHOTOSKU_ROOT")]
    root_folder: Option<PathBuf>,

    /// Telegram bot token
    #[arg(long, env = "PHOTOSKU_TELEGRAM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Keep everything in memory (nothing survives a restart)
    #[arg(long)]
    memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PHOTOSKU_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    logging::init_tracing(&config.logging, cli.log_level.as_deref())?;

    // Build identification immediately after tracing init
    info!(
        "Starting photosku-bot v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let token = config.telegram.resolve_token(cli.token.as_deref())?;

    let (entities, objects) = open_stores(&cli, &config).await?;

    let telegram = Arc::new(TelegramClient::new(&config.telegram.api_base, &token)?);
    let me = telegram
        .get_me()
        .await
        .context("Telegram getMe failed; check the bot token")?;
    info!(
        "✓ Connected to Telegram as @{}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    let catalog = Catalog::new(entities, objects, telegram.clone());
    let engine = Arc::new(ConversationEngine::new(catalog, config.support_text.clone()));
    let dispatcher = Dispatcher::new(
        engine,
        telegram.clone(),
        DispatcherSettings::from(&config.dispatcher),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (state, poller) = match config.telegram.mode {
        UpdateMode::Polling => {
            if let Err(e) = telegram.delete_webhook().await {
                warn!("Failed to clear webhook before polling: {}", e);
            }
            let poller = tokio::spawn(run_polling(
                telegram.clone(),
                dispatcher.clone(),
                config.telegram.poll_timeout_secs,
                shutdown_rx.clone(),
            ));
            (AppState::health_only(), Some(poller))
        }
        UpdateMode::Webhook => {
            let url = config
                .telegram
                .webhook_url
                .as_deref()
                .context("telegram.webhook_url is required in webhook mode")?;
            telegram
                .set_webhook(url, config.telegram.webhook_secret.as_deref())
                .await
                .context("Telegram setWebhook failed")?;
            info!("✓ Webhook registered: {}", url);
            (
                AppState::with_webhook(dispatcher.clone(), config.telegram.webhook_secret.clone()),
                None,
            )
        }
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                // Keep the sender alive; dropping it would stop the bot
                std::future::pending::<()>().await;
            }
        }
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.http.bind))?;
    info!("photosku-bot listening on http://{}", config.http.bind);
    info!("Health check: http://{}/health", config.http.bind);

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            error!("Polling task failed: {}", e);
        }
    }

    if dispatcher.shutdown(DRAIN_TIMEOUT).await {
        info!("All conversations drained");
    } else {
        warn!("Timed out draining conversations after {:?}", DRAIN_TIMEOUT);
    }

    info!("photosku-bot stopped");
    Ok(())
}

async fn open_stores(
    cli: &Cli,
    config: &TomlConfig,
) -> Result<(Arc<dyn EntityStore>, Arc<dyn ObjectStore>)> {
    if cli.memory {
        warn!("Running with in-memory stores; data is lost on exit");
        return Ok((
            Arc::new(MemoryEntityStore::new()),
            Arc::new(MemoryObjectStore::new()),
        ));
    }

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(cli.root_folder.clone())
        .with_config(config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;
    info!("Root folder: {}", initializer.root().display());

    let db_path = initializer.database_path(config);
    info!("Database path: {}", db_path.display());
    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let objects = FilesystemObjectStore::open(initializer.objects_path(config)).await?;

    Ok((Arc::new(SqliteEntityStore::new(pool)), Arc::new(objects)))
}
