//! Server entrypoint for consensus-server
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result};
use clap::Parser;
use consensus_application::{
    AuditLog, ConsensusPipeline, JobRegistry, MaintenanceScheduler, NoAuditLog, ProviderRoster,
    UsageLedger,
};
use consensus_infrastructure::{
    ConfigLoader, ConfigTierCatalog, FileConfig, JsonlAuditLog, MemoryAccountRepository,
    MemoryJobRepository, MemoryLeaseManager, MemoryUsageRepository, TracingNotifier,
    build_adapters,
};
use consensus_presentation::{AppState, Cli, TracingProgress, cors_layer, create_router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    // Load configuration
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())?
    };
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    config.logging.json |= cli.json_logs;

    let _log_guard = init_tracing(&cli, &config)?;
    info!("Starting consensus-server {}", env!("CARGO_PKG_VERSION"));

    for issue in config.ensure_valid()? {
        warn!("{}", issue.message);
    }
    let (addr, _) = config.server.parse_bind();
    let addr = addr.context("server.bind is not a socket address")?;
    let (pipeline_params, _) = config.pipeline.to_params();
    let (registry_params, _) = config.server.to_registry_params();
    let (scheduler_params, _) = config.scheduler.to_params();

    // === Dependency Injection ===
    let adapters = build_adapters(&config.providers, |name| std::env::var(name).ok())?;
    let roster = ProviderRoster::new(adapters, pipeline_params.call_timeout)?;

    let audit: Arc<dyn AuditLog> = match &config.logging.audit_log {
        Some(path) => {
            let log = JsonlAuditLog::open(path)
                .with_context(|| format!("Cannot open audit log {}", path.display()))?;
            info!(path = %path.display(), "Audit log enabled");
            Arc::new(log)
        }
        None => Arc::new(NoAuditLog),
    };

    let jobs = Arc::new(MemoryJobRepository::new());
    let ledger = Arc::new(
        UsageLedger::new(
            Arc::new(MemoryAccountRepository::new()),
            Arc::new(MemoryUsageRepository::new()),
            Arc::new(ConfigTierCatalog::from_config(&config.tiers)),
        )
        .with_audit_log(audit.clone()),
    );
    let pipeline = Arc::new(
        ConsensusPipeline::new(roster, jobs.clone(), ledger.clone(), pipeline_params)?
            .with_audit_log(audit.clone()),
    );
    info!(
        providers = pipeline.roster().len(),
        arbiter = %pipeline.arbiter(),
        "Consensus pipeline ready"
    );
    let registry = JobRegistry::new(jobs.clone(), ledger.clone(), pipeline, registry_params)
        .with_progress(Arc::new(TracingProgress))
        .with_audit_log(audit);

    let shutdown = CancellationToken::new();
    let scheduler = if config.scheduler.enabled {
        let scheduler = Arc::new(MaintenanceScheduler::new(
            jobs,
            ledger,
            Arc::new(TracingNotifier),
            Arc::new(MemoryLeaseManager::new()),
            scheduler_params,
        ));
        Some(scheduler.spawn(shutdown.clone()))
    } else {
        info!("Maintenance scheduler disabled");
        None
    };

    let app = create_router(
        AppState::new(Arc::new(registry)),
        cors_layer(&config.server.cors_origins),
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Listening on http://{addr}");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            signal.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
    info!("Shut down cleanly");
    Ok(())
}

/// Install the global subscriber.
///
/// Filter priority: `-v` flags, then `RUST_LOG`, then `logging.filter`,
/// then `info`. The returned guard flushes the file sink on drop.
fn init_tracing(cli: &Cli, config: &FileConfig) -> Result<Option<WorkerGuard>> {
    let filter = match cli.verbosity_filter() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(config.logging.filter.as_deref().unwrap_or("info"))
        }),
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if config.logging.json {
        layers.push(tracing_subscriber::fmt::layer().json().boxed());
    } else {
        layers.push(tracing_subscriber::fmt::layer().with_target(false).boxed());
    }

    let guard = match &config.logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "consensus-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
