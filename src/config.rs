use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::AppError;
use crate::payment::{GatewayConfig, SignatureCodec};

pub const DEFAULT_INTENT_TTL_SECS: u64 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub esewa_form_url: String,
    pub esewa_product_code: String,
    /// `None` only when Vault is configured to supply it at startup.
    pub esewa_secret_key: Option<String>,
    pub backend_url: String,
    pub frontend_url: String,
    pub intent_ttl_secs: u64,
    pub enforce_payment_holds: bool,
    pub notification_webhook_url: Option<String>,
    pub log_format: LogFormat,
    pub vault_enabled: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| non_empty(key).with_context(|| format!("{} is required", key));

        let esewa_secret_key = non_empty("ESEWA_SECRET_KEY");
        let vault_enabled = non_empty("VAULT_ROLE_ID").is_some();
        if esewa_secret_key.is_none() && !vault_enabled {
            anyhow::bail!("ESEWA_SECRET_KEY is required (or configure VAULT_ROLE_ID to load it from Vault)");
        }

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        };

        Ok(Config {
            server_port: non_empty("SERVER_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: required("DATABASE_URL")?,
            redis_url: non_empty("REDIS_URL"),
            esewa_form_url: required("ESEWA_FORM_URL")?,
            esewa_product_code: required("ESEWA_PRODUCT_CODE")?,
            esewa_secret_key,
            backend_url: required("BACKEND_URL")?,
            frontend_url: required("FRONTEND_URL")?,
            intent_ttl_secs: match non_empty("INTENT_TTL_SECS") {
                Some(raw) => raw.parse().context("INTENT_TTL_SECS must be a number of seconds")?,
                None => DEFAULT_INTENT_TTL_SECS,
            },
            enforce_payment_holds: match non_empty("ENFORCE_PAYMENT_HOLDS") {
                Some(raw) => raw.parse().context("ENFORCE_PAYMENT_HOLDS must be true or false")?,
                None => false,
            },
            notification_webhook_url: non_empty("NOTIFICATION_WEBHOOK_URL"),
            log_format,
            vault_enabled,
        })
    }

    pub fn intent_ttl(&self) -> Duration {
        Duration::from_secs(self.intent_ttl_secs)
    }

    /// Gateway settings signed with `secret`. An empty secret is a
    /// configuration error; there is no fallback key.
    pub fn gateway_with_secret(&self, secret: &str) -> Result<GatewayConfig, AppError> {
        let codec = SignatureCodec::new(secret)
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        Ok(GatewayConfig::new(
            self.esewa_form_url.clone(),
            self.esewa_product_code.clone(),
            &self.backend_url,
            &self.frontend_url,
            codec,
        ))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("redis_url", &self.redis_url.is_some())
            .field("esewa_form_url", &self.esewa_form_url)
            .field("esewa_product_code", &self.esewa_product_code)
            .field("esewa_secret_key", &self.esewa_secret_key.as_ref().map(|_| "[redacted]"))
            .field("backend_url", &self.backend_url)
            .field("frontend_url", &self.frontend_url)
            .field("intent_ttl_secs", &self.intent_ttl_secs)
            .field("enforce_payment_holds", &self.enforce_payment_holds)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}
