//! Notification Worker
//!
//! Consumes user lifecycle events from Redis Streams and turns each one into
//! a persisted notification record and an email.
//!
//! ```text
//! Redis Streams (events:user-created, events:user-login)
//!   ↓ (Consumer Group: notification_workers)
//! EventStreamConsumer (one per stream)
//!   ↓
//! EventListener → NotificationProcessor
//!   ↓                    ↓
//! PostgreSQL        EmailProvider (SMTP)
//! ```

pub mod connections;
pub mod consumer;
pub mod health;
pub mod metrics;
pub mod settings;

use core_config::server::ServerConfig;
use core_config::{AppInfo, Environment, FromEnv, app_info};
use domain_notifications::{
    CapturingEmailProvider, EmailProvider, EventListener, NotificationProcessor,
    PgNotificationRepository, SmtpProvider, TemplateEngine,
};
use eyre::{Result, WrapErr, eyre};
use migration::{Migrator, MigratorTrait};
use redis::aio::ConnectionManager;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::consumer::EventStreamConsumer;
use crate::health::{
    DatabaseCheck, DependencyCheck, HealthState, ProviderCheck, RedisCheck, health_router,
};
use crate::settings::{EmailProviderKind, WorkerSettings};

async fn start_health_server(state: HealthState, config: &ServerConfig) -> Result<()> {
    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {addr}"))?;

    info!(addr = %addr, "Health server listening");

    axum::serve(listener, health_router(state))
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the notification worker until SIGINT or SIGTERM.
///
/// # Errors
///
/// Fails at startup if configuration is invalid, Redis or PostgreSQL are
/// unreachable, migrations fail, or the email provider cannot be built.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    metrics::init_metrics().wrap_err("Failed to initialize Prometheus metrics")?;

    let app = app_info!();
    info!(
        name = %app.name,
        version = %app.version,
        environment = ?environment,
        "Starting notification worker"
    );

    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker settings")?;

    let redis = connections::connect_redis(&settings.redis)
        .await
        .wrap_err("Failed to connect to Redis")?;
    let db = connections::connect_database(&settings.database, environment.is_development())
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;

    if settings.run_migrations {
        Migrator::up(&db, None)
            .await
            .wrap_err("Failed to apply database migrations")?;
        info!("Database migrations applied");
    }

    let templates = TemplateEngine::new().wrap_err("Failed to initialize template engine")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let ctx = Runtime {
        app,
        settings: &settings,
        redis,
        db,
        templates,
        shutdown: shutdown_rx,
    };

    match settings.email_provider {
        EmailProviderKind::Smtp => {
            let provider = SmtpProvider::from_env().wrap_err("SMTP configuration error")?;
            serve(ctx, provider).await?;
        }
        EmailProviderKind::Capture => {
            if environment.is_production() {
                return Err(eyre!("EMAIL_PROVIDER=capture is not allowed in production"));
            }
            warn!("Using capturing email provider, no email will leave the process");
            serve(ctx, CapturingEmailProvider::new()).await?;
        }
    }

    info!("Notification worker stopped");
    Ok(())
}

/// Everything `serve` needs besides the selected provider.
struct Runtime<'a> {
    app: AppInfo,
    settings: &'a WorkerSettings,
    redis: ConnectionManager,
    db: DatabaseConnection,
    templates: TemplateEngine,
    shutdown: watch::Receiver<bool>,
}

/// Start the health server, then spawn one consumer per configured stream
/// and wait for all of them.
async fn serve<P>(ctx: Runtime<'_>, provider: P) -> Result<()>
where
    P: EmailProvider + 'static,
{
    let Runtime {
        app,
        settings,
        redis,
        db,
        templates,
        shutdown,
    } = ctx;

    let provider = Arc::new(provider);
    info!(provider = provider.name(), "Email provider selected");

    let checks: Vec<Box<dyn DependencyCheck>> = vec![
        Box::new(RedisCheck(redis.clone())),
        Box::new(DatabaseCheck(db.clone())),
        Box::new(ProviderCheck(Arc::clone(&provider))),
    ];
    let streams = settings
        .streams
        .bindings()
        .into_iter()
        .map(|(_, stream)| stream)
        .collect();
    let health_state = HealthState::new(app, streams, checks);
    let server_config = settings.server.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, &server_config).await {
            error!(error = %e, "Health server failed");
        }
    });

    let processor = NotificationProcessor::with_arcs(
        Arc::new(PgNotificationRepository::new(db)),
        provider,
        templates,
        settings.processor.clone(),
    );
    let listener = EventListener::new(processor);

    let mut consumers = JoinSet::new();
    for (kind, stream) in settings.streams.bindings() {
        let consumer = EventStreamConsumer::new(
            redis.clone(),
            listener.clone(),
            kind,
            stream,
            settings.consumer.clone(),
        );
        let shutdown = shutdown.clone();
        consumers.spawn(async move {
            let result = consumer.run(shutdown).await;
            (consumer.stream().to_string(), result)
        });
    }

    let mut failed = 0usize;
    while let Some(joined) = consumers.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((stream, Err(e))) => {
                error!(stream = %stream, error = %e, "Event consumer failed");
                failed += 1;
            }
            Err(e) => {
                error!(error = %e, "Event consumer task aborted");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(eyre!("{failed} event consumer(s) failed"));
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating shutdown"),
    }
}
