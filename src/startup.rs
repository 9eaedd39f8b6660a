use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

/// Outcome of `rental-core config`. `redis` is `None` when no Redis URL is
/// configured and intents are held in memory.
pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub redis: Option<bool>,
    pub signing_secret: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.redis.unwrap_or(true) && self.signing_secret
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        match self.redis {
            Some(ok) => println!("Redis Connectivity:    {}", status(ok)),
            None => println!("Redis Connectivity:    - (in-memory intents)"),
        }
        println!("Signing Secret:        {}", status(self.signing_secret));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        redis: None,
        signing_secret: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    let db_result = match pool {
        Some(pool) => validate_database(pool).await,
        None => Err(anyhow::anyhow!("could not connect to DATABASE_URL")),
    };
    if let Err(e) = db_result {
        report.database = false;
        report.errors.push(format!("Database: {:#}", e));
    }

    if let Some(url) = &config.redis_url {
        let ok = match validate_redis(url).await {
            Ok(()) => true,
            Err(e) => {
                report.errors.push(format!("Redis: {:#}", e));
                false
            }
        };
        report.redis = Some(ok);
    }

    if let Err(e) = validate_signing_secret(config).await {
        report.signing_secret = false;
        report.errors.push(format!("Signing secret: {:#}", e));
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.intent_ttl_secs == 0 {
        anyhow::bail!("INTENT_TTL_SECS must be greater than 0");
    }

    url::Url::parse(&config.esewa_form_url).context("ESEWA_FORM_URL is not a valid URL")?;
    url::Url::parse(&config.backend_url).context("BACKEND_URL is not a valid URL")?;
    url::Url::parse(&config.frontend_url).context("FRONTEND_URL is not a valid URL")?;
    if let Some(webhook) = &config.notification_webhook_url {
        url::Url::parse(webhook).context("NOTIFICATION_WEBHOOK_URL is not a valid URL")?;
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_redis(redis_url: &str) -> Result<()> {
    let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;

    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .context("Failed to connect to Redis")?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .context("Redis PING failed")?;

    Ok(())
}

async fn validate_signing_secret(config: &Config) -> Result<()> {
    let secret = crate::secrets::resolve_signing_secret(config).await?;
    config
        .gateway_with_secret(&secret)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    fn config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost:5432/rental".to_string(),
            redis_url: None,
            esewa_form_url: "https://rc-epay.esewa.com.np/api/epay/main/v2/form".to_string(),
            esewa_product_code: "EPAYTEST".to_string(),
            esewa_secret_key: Some("secret".to_string()),
            backend_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            intent_ttl_secs: 1800,
            enforce_payment_holds: false,
            notification_webhook_url: None,
            log_format: LogFormat::Pretty,
            vault_enabled: false,
        }
    }

    #[test]
    fn test_validate_env_vars_accepts_defaults() {
        assert!(validate_env_vars(&config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_invalid_url() {
        let mut config = config();
        config.frontend_url = "not-a-url".to_string();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_zero_ttl() {
        let mut config = config();
        config.intent_ttl_secs = 0;
        assert!(validate_env_vars(&config).is_err());
    }

    #[tokio::test]
    async fn test_missing_secret_fails_report() {
        let mut config = config();
        config.esewa_secret_key = None;

        let report = validate_environment(&config, None).await;
        assert!(!report.signing_secret);
        assert!(!report.database);
        assert!(report.redis.is_none());
        assert!(!report.is_valid());
    }
}
