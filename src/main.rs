use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rental_core::adapters::{
    PostgresBookingRepository, PostgresUserRepository, PostgresVehicleRepository,
};
use rental_core::cli::{self, Cli, Commands, DbCommands, IntentCommands};
use rental_core::config::{Config, LogFormat};
use rental_core::health::{HealthChecks, PostgresChecker, RedisChecker, SigningSecretChecker};
use rental_core::ports::Notifier;
use rental_core::services::{self, HttpNotifier, LogNotifier};
use rental_core::{create_app, AppState, Ports};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match Cli::parse().command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
        Commands::Intents(IntentCommands::Purge) => cli::handle_intents_purge(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = rental_core::db::create_pool(&config).await?;
    rental_core::db::run_migrations(&pool).await?;

    // Refuse to start without a signing secret.
    let secret = rental_core::secrets::resolve_signing_secret(&config).await?;
    let gateway = Arc::new(
        config
            .gateway_with_secret(&secret)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );
    tracing::info!(
        form_url = %gateway.form_url,
        callback_url = %gateway.callback_url,
        "Payment gateway configured"
    );

    let intents = cli::build_intent_store(&config)?;
    let store_kind = if config.redis_url.is_some() { "redis" } else { "memory" };
    tracing::info!(
        store = store_kind,
        ttl_secs = config.intent_ttl_secs,
        holds = config.enforce_payment_holds,
        "Intent store ready"
    );

    let notifier: Arc<dyn Notifier> = match &config.notification_webhook_url {
        Some(url) => Arc::new(HttpNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let mut health = HealthChecks::new()
        .with("postgres", true, PostgresChecker::new(pool.clone()))
        .with(
            "signing_secret",
            true,
            SigningSecretChecker::new(Some(gateway.clone())),
        );
    if let Some(url) = &config.redis_url {
        health = health.with("redis", true, RedisChecker::new(url.clone()));
    }

    let ports = Ports {
        bookings: Arc::new(PostgresBookingRepository::new(pool.clone())),
        vehicles: Arc::new(PostgresVehicleRepository::new(pool.clone())),
        users: Arc::new(PostgresUserRepository::new(pool)),
        intents: intents.clone(),
        notifier,
    };
    let state = AppState::new(ports, gateway, config.enforce_payment_holds, health);

    tokio::spawn(services::run_intent_sweeper(
        intents,
        Duration::from_secs(services::DEFAULT_SWEEP_INTERVAL_SECS),
    ));

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
