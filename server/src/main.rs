//! Storefront HTTP server.
//!
//! Wires the `PostgreSQL` store, the cache backend, the audit queue and the
//! Prometheus exporter into the axum router, then serves until a shutdown
//! signal arrives.

mod config;

use anyhow::Context;
use config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use storefront_core::cache::CacheBackend;
use storefront_core::environment::SystemClock;
use storefront_core::event::DomainObserver;
use storefront_postgres::{PgStorefront, PoolOptions};
use storefront_redis::RedisCache;
use storefront_runtime::metrics::MetricsServer;
use storefront_runtime::{
    AuditLogObserver, AuditQueue, CacheService, Environment, MemoryCache, StoreSettings,
};
use storefront_web::{AppState, build_router};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside development
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Storefront HTTP Server");
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env file");
    }

    let config = Config::from_env();
    info!(
        http_addr = %config.http_addr(),
        metrics_addr = %config.metrics_addr(),
        redis = config.redis_url.is_some(),
        settings = %config.settings_path.display(),
        "Configuration loaded"
    );

    let settings = Arc::new(
        StoreSettings::load(&config.settings_path).context("Failed to load store settings")?,
    );

    info!("Connecting to database...");
    let store = PgStorefront::connect_with(
        &config.postgres.url,
        PoolOptions {
            max_connections: config.postgres.max_connections,
            min_connections: config.postgres.min_connections,
            connect_timeout: std::time::Duration::from_secs(config.postgres.connect_timeout),
        },
    )
    .await
    .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to run migrations")?;
    info!("Database ready");

    let clock = Arc::new(SystemClock);
    let backend: Arc<dyn CacheBackend> = match &config.redis_url {
        Some(url) => {
            info!("Connecting to Redis cache...");
            Arc::new(
                RedisCache::new(url)
                    .await
                    .context("Failed to connect to Redis")?,
            )
        }
        None => {
            info!("REDIS_URL not set, using in-process cache");
            Arc::new(MemoryCache::new(clock.clone()))
        }
    };

    let observers: Vec<Arc<dyn DomainObserver>> = vec![Arc::new(AuditLogObserver)];
    let (audit, audit_worker) = AuditQueue::spawn(observers, settings.audit_queue_capacity);

    let metrics_addr: SocketAddr = config
        .metrics_addr()
        .parse()
        .context("Invalid metrics address")?;
    let mut metrics = MetricsServer::new(metrics_addr);
    metrics.start().context("Failed to start metrics server")?;

    let env = Environment::new(
        Arc::new(store),
        CacheService::new(backend),
        Arc::new(audit),
        clock,
        settings,
    );
    let app = build_router(AppState::new(&env));
    // The router holds the only remaining audit publishers
    drop(env);

    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    });

    let drain_timeout = config.shutdown_timeout();
    let drain_deadline = async move {
        let _ = stopping_rx.wait_for(|stopping| *stopping).await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        () = drain_deadline => {
            warn!(
                timeout_secs = drain_timeout.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
        }
    }

    // Dropping the router closed the audit channel; let the worker drain
    match tokio::time::timeout(drain_timeout, audit_worker).await {
        Ok(Ok(delivered)) => info!(delivered, "Audit queue drained"),
        Ok(Err(e)) => error!(error = %e, "Audit worker failed"),
        Err(_) => warn!("Audit queue did not drain before the shutdown timeout"),
    }

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
