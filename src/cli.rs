use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::adapters::{MemoryIntentStore, RedisIntentStore};
use crate::config::Config;
use crate::ports::IntentStore;

#[derive(Parser)]
#[command(name = "rental-core")]
#[command(about = "Rental Core - payment-gated vehicle reservations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Validate configuration and dependencies
    Config,

    /// Pending payment intent maintenance
    #[command(subcommand)]
    Intents(IntentCommands),
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum IntentCommands {
    /// Drop expired intents (and stale hold index entries in Redis)
    Purge,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!(
        "  Intent Store: {}",
        config
            .redis_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "in-memory".to_string())
    );
    println!("  Gateway Form URL: {}", config.esewa_form_url);
    println!("  Product Code: {}", config.esewa_product_code);
    println!("  Frontend URL: {}", config.frontend_url);
    println!("  Intent TTL: {}s", config.intent_ttl_secs);
    println!("  Payment Holds: {}", config.enforce_payment_holds);

    let pool = match crate::db::create_pool(config).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            tracing::warn!(error = %e, "Database unreachable during validation");
            None
        }
    };

    let report = crate::startup::validate_environment(config, pool.as_ref()).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("configuration validation failed");
    }
    Ok(())
}

/// The intent store the server would use under this config.
pub fn build_intent_store(config: &Config) -> anyhow::Result<Arc<dyn IntentStore>> {
    Ok(match &config.redis_url {
        Some(url) => Arc::new(RedisIntentStore::new(url, config.intent_ttl())?),
        None => Arc::new(MemoryIntentStore::new(config.intent_ttl())),
    })
}

pub async fn handle_intents_purge(config: &Config) -> anyhow::Result<()> {
    if config.redis_url.is_none() {
        println!("Intents are held in the server's memory; the running server purges them itself.");
        return Ok(());
    }

    let store = build_intent_store(config)?;
    let removed = crate::services::sweep_once(store.as_ref()).await;
    println!("✓ Removed {} stale intent index entries", removed);
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
