use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use vidhi_core::bootstrap::{build_answer_service, build_ingestion_job};
use vidhi_core::config::{Config, resolve_config_path};
use vidhi_core::supervisor::{InitFuture, spawn_supervisor};
use vidhi_core::vault::{EnvVaultProvider, VaultProvider};
use vidhi_core::ServiceSlot;
use vidhi_gateway::{AppState, GatewayServer};

#[derive(Parser, Debug)]
#[command(
    name = "vidhi",
    version,
    about = "Retrieval-augmented question answering over Indian legal texts"
)]
struct Cli {
    /// TOML config file (defaults to `VIDHI_CONFIG`, then config/default.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed the preprocessed corpus and upsert it into the vector index.
    Ingest {
        /// JSON array of `{id, text, metadata}` chunks.
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Chunks per embedding call.
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Run the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Ingest { corpus, batch_size } => {
            if let Some(path) = corpus {
                config.ingest.corpus_path = path;
            }
            if let Some(n) = batch_size {
                config.ingest.batch_size = n;
            }
            config.validate()?;
            ingest(&config).await
        }
        Command::Serve => serve(config).await,
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn ingest(config: &Config) -> anyhow::Result<()> {
    let job = build_ingestion_job(config, &EnvVaultProvider).await?;
    let report = job.run(&config.ingest.corpus_path).await?;
    tracing::info!(
        total = report.total,
        upserted = report.upserted,
        failed_batches = report.failed_batches,
        "ingestion complete"
    );
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let vault: Arc<dyn VaultProvider> = Arc::new(EnvVaultProvider);

    let init_config = Arc::clone(&config);
    let slot = Arc::new(ServiceSlot::new(move || -> InitFuture {
        let config = Arc::clone(&init_config);
        let vault = Arc::clone(&vault);
        Box::pin(async move { build_answer_service(&config, vault.as_ref()).await })
    }));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let supervisor = spawn_supervisor(Arc::clone(&slot), &config.init, shutdown_rx.clone());

    let state = AppState::new(slot, &config.service.name);
    GatewayServer::new(&config.gateway.bind, config.gateway.port, state, shutdown_rx)
        .with_max_body_size(config.gateway.max_body_size)
        .serve()
        .await?;

    supervisor.abort();
    Ok(())
}
