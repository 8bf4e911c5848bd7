use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use fraudr::api::{create_router, AppState};
use fraudr::config::Config;
use fraudr::observability::{init_tracing, MetricsRegistry};
use fraudr::orchestrator::{FraudOrchestrator, Verifiers};
use fraudr::rules::{load_catalogue, seed_rules, RuleAdmin};
use fraudr::storage::{AuditJournal, AuditLog, MemoryStorage, PostgresStorage, Storage};
use fraudr::verification::{
    HttpNidRegistry, HttpTinVerifier, NidVerifier, RegistryNidVerifier, StaticNidRegistry,
    TinVerifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting fraudr fraud engine"
    );

    match config.database_url.clone() {
        Some(url) => {
            let storage = PostgresStorage::connect(
                &url,
                config.db_min_connections,
                config.db_max_connections,
            )
            .await?;
            storage.run_migrations().await?;
            info!("Connected to Postgres, migrations applied");

            serve(Arc::new(storage), config).await
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage");
            serve(Arc::new(MemoryStorage::new()), config).await
        }
    }
}

async fn serve<S: Storage + 'static>(storage: Arc<S>, config: Config) -> anyhow::Result<()> {
    // Seed the rule catalogue into an empty store
    match load_catalogue(&config.rules_path) {
        Ok(catalogue) => {
            let seeded = seed_rules(storage.as_ref(), &catalogue).await?;
            info!(
                path = %config.rules_path.display(),
                seeded,
                "Rule catalogue loaded"
            );
        }
        Err(e) => {
            warn!(
                path = %config.rules_path.display(),
                error = %e,
                "Failed to load rule catalogue, continuing with stored rules"
            );
        }
    }

    // Audit journal (optional)
    let audit: Arc<dyn AuditLog> = match config.audit_journal_path {
        Some(ref path) => match AuditJournal::open(path) {
            Ok(journal) => {
                info!(path = %path.display(), "Audit journal enabled");
                Arc::new(journal) as Arc<dyn AuditLog>
            }
            Err(e) => {
                error!(error = %e, "Failed to open audit journal, using store audit log");
                storage.clone() as Arc<dyn AuditLog>
            }
        },
        None => storage.clone() as Arc<dyn AuditLog>,
    };

    let verifiers = build_verifiers(&config)?;
    let metrics = Arc::new(MetricsRegistry::new());

    let orchestrator = FraudOrchestrator::from_storage(
        storage.clone(),
        audit.clone(),
        verifiers,
        config.scoring_policy(),
        metrics.clone(),
    );

    let admin = RuleAdmin::new(storage.clone(), audit.clone());
    let state = Arc::new(AppState::new(orchestrator, admin, audit, metrics));

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, scoring = ?config.scoring, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    if !config.graceful_shutdown {
        axum::serve(listener, app).await?;
        return Ok(());
    }

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = stop_tx.send(true);

    info!("Shutting down...");
    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => error!(error = %e, "Server task failed"),
        Err(_) => warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Shutdown complete");
    Ok(())
}

fn build_verifiers(config: &Config) -> anyhow::Result<Verifiers> {
    let timeout = config.verification_timeout();

    let tin: Option<Arc<dyn TinVerifier>> = match config.tin_registry() {
        Some(tin) => {
            info!(url = %tin.url, "TIN registry enabled");
            Some(Arc::new(HttpTinVerifier::new(
                tin.url,
                tin.username,
                tin.password,
                timeout,
            )?))
        }
        None => {
            info!("TIN registry not configured, tin_mismatch uses supplied context only");
            None
        }
    };

    let nid: Option<Arc<dyn NidVerifier>> = match (&config.nid_url, config.nid_static) {
        (Some(url), _) => {
            info!(url = %url, "NID registry enabled");
            Some(Arc::new(RegistryNidVerifier::new(HttpNidRegistry::new(
                url.as_str(),
                timeout,
            )?)))
        }
        (None, true) => {
            warn!("Using built-in sample NID registry");
            Some(Arc::new(RegistryNidVerifier::new(
                StaticNidRegistry::with_sample_records(),
            )))
        }
        (None, false) => {
            info!("NID registry not configured, nid_kyc_mismatch uses supplied context only");
            None
        }
    };

    Ok(Verifiers {
        tin,
        nid,
        pattern_matcher: None,
        timeout,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
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
