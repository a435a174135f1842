//! Storefront notifier - delivers push notifications for the signed-in
//! device user.
//!
//! Wires configuration, logging, the backend and the push platform, then
//! runs the notification runtime until a shutdown signal arrives.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use storefront_core::config::AppConfig;
use storefront_core::config::backend::BackendProvider;
use storefront_core::config::push::PushProvider;
use storefront_core::error::AppError;
use storefront_core::types::id::UserId;
use storefront_database::change::trigger_publishes_on;
use storefront_database::connection::DatabasePool;
use storefront_notify::platform::{
    BACKGROUND_NOTIFICATION_TASK, ExpoPushPlatform, LogPushPlatform,
};
use storefront_notify::backend::UserDirectory;
use storefront_notify::{Backend, Notifier, PushPlatform};

#[tokio::main]
async fn main() {
    let env = std::env::var("STOREFRONT_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!("Loaded configuration (env: {})", env);

    if let Err(e) = run(config).await {
        tracing::error!("Notifier error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting storefront notifier v{}", env!("CARGO_PKG_VERSION"));

    // ── Backend ──────────────────────────────────────────────────
    let (backend, database) = match config.backend.provider {
        BackendProvider::Postgres => {
            tracing::info!("Connecting to database...");
            let database = DatabasePool::connect(&config.database).await?;
            if !database.health_check().await? {
                return Err(AppError::database("Database health check failed"));
            }

            tracing::info!("Running database migrations...");
            storefront_database::migration::run_migrations(database.pool()).await?;

            let channel = &config.backend.change_channel;
            match trigger_publishes_on(database.pool(), channel).await {
                Ok(Some(true)) => {}
                Ok(Some(false)) => tracing::warn!(
                    channel = %channel,
                    "Insert trigger publishes on a different channel; \
                     the change listener will receive nothing"
                ),
                Ok(None) => tracing::warn!("Insert trigger function is not installed"),
                Err(e) => tracing::warn!("Failed to inspect insert trigger: {}", e),
            }

            let backend = Backend::postgres(database.pool().clone(), &config.backend);
            (backend, Some(database))
        }
        BackendProvider::Memory => {
            tracing::warn!("Using in-memory backend; notifications are not persisted");
            (Backend::memory(config.backend.feed_buffer), None)
        }
    };

    // ── Push platform ────────────────────────────────────────────
    let platform: Arc<dyn PushPlatform> = match config.push.provider {
        PushProvider::Expo => Arc::new(ExpoPushPlatform::new(&config.push)?),
        PushProvider::Log => Arc::new(LogPushPlatform::granted()),
    };
    if let Err(e) = platform
        .register_background_task(BACKGROUND_NOTIFICATION_TASK)
        .await
    {
        tracing::warn!("Failed to register background notification task: {}", e);
    }

    let users = backend.users.clone();
    let notifier = Notifier::new(backend, platform, &config.notifications);
    let runtime = notifier.runtime().spawn();

    // ── Device session ───────────────────────────────────────────
    match config.session.user_id.as_deref() {
        Some(raw) => {
            let user_id: UserId = raw
                .parse()
                .map_err(|e| AppError::configuration(format!("Invalid session.user_id: {e}")))?;
            match users.find_user(user_id).await? {
                Some(user) => notifier
                    .service()
                    .set_current_user(Some(user.to_session_user())),
                None => tracing::warn!(user_id = %user_id, "Session user not found"),
            }
        }
        None => tracing::info!("No session user configured; waiting for sign-in"),
    }

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping notifier...");

    notifier.service().set_current_user(None);
    runtime.shutdown().await;

    if let Some(database) = database {
        database.close().await;
    }
    tracing::info!("Notifier stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
