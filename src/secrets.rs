use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use crate::config::Config;
use vaultrs::auth::approle;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::kv2;

/// Vault AppRole client for secrets that should not live in the environment.
pub struct SecretsManager {
    client: VaultClient,
    kv_mount: String,
}

impl SecretsManager {
    pub async fn new() -> Result<Self> {
        let vault_addr =
            env::var("VAULT_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8200".to_string());
        let role_id = env::var("VAULT_ROLE_ID").context("VAULT_ROLE_ID is required")?;
        let secret_id = env::var("VAULT_SECRET_ID").context("VAULT_SECRET_ID is required")?;
        let auth_mount = env::var("VAULT_AUTH_MOUNT").unwrap_or_else(|_| "auth/approle".to_string());
        let kv_mount = env::var("VAULT_KV_MOUNT").unwrap_or_else(|_| "secret".to_string());

        let mut client = VaultClient::new(
            VaultClientSettingsBuilder::default()
                .address(&vault_addr)
                .build()
                .context("failed to build Vault client settings")?,
        )
        .context("failed to create Vault client")?;

        let auth = approle::login(&mut client, &auth_mount, &role_id, &secret_id)
            .await
            .context("failed to authenticate to Vault with AppRole")?;
        client.set_token(&auth.client_token);

        Ok(Self { client, kv_mount })
    }

    /// Reads the gateway signing secret from `<kv_mount>/esewa`, key `secret_key`.
    pub async fn get_gateway_secret(&self) -> Result<String> {
        let secret: HashMap<String, String> = kv2::read(&self.client, &self.kv_mount, "esewa")
            .await
            .context("failed to read secret/esewa from Vault")?;

        secret
            .get("secret_key")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("secret_key not found in Vault secret/esewa")
    }
}

/// The signing secret from the environment, or from Vault when the
/// environment leaves it unset.
pub async fn resolve_signing_secret(config: &Config) -> Result<String> {
    if let Some(secret) = &config.esewa_secret_key {
        return Ok(secret.clone());
    }
    if !config.vault_enabled {
        anyhow::bail!("ESEWA_SECRET_KEY is not configured and Vault is disabled");
    }

    let secret = SecretsManager::new().await?.get_gateway_secret().await?;
    tracing::info!("Gateway signing secret loaded from Vault");
    Ok(secret)
}
