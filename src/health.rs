use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use utoipa::ToSchema;

use crate::payment::GatewayConfig;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    #[schema(value_type = Object)]
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub struct RedisChecker {
    url: String,
}

impl RedisChecker {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let client = match redis::Client::open(self.url.as_str()) {
            Ok(client) => client,
            Err(e) => return DependencyStatus::unhealthy(e),
        };
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => return DependencyStatus::unhealthy(e),
        };
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Reports whether a usable signing secret was loaded. Signs a fixed probe
/// and verifies it, so a codec that cannot round-trip shows up here.
pub struct SigningSecretChecker {
    gateway: Option<Arc<GatewayConfig>>,
}

impl SigningSecretChecker {
    pub fn new(gateway: Option<Arc<GatewayConfig>>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl DependencyChecker for SigningSecretChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let Some(gateway) = &self.gateway else {
            return DependencyStatus::unhealthy("signing secret is not configured");
        };
        let probe = [("total_amount", "1.00"), ("transaction_uuid", "health-probe")];
        let signature = gateway.codec().sign(&probe);
        if gateway.codec().verify(&probe, &signature) {
            DependencyStatus::healthy(start)
        } else {
            DependencyStatus::unhealthy("signing secret failed self-check")
        }
    }
}

struct RegisteredCheck {
    name: &'static str,
    critical: bool,
    checker: Box<dyn DependencyChecker>,
}

/// The set of dependencies reported by `/health`.
pub struct HealthChecks {
    checks: Vec<RegisteredCheck>,
    timeout: Duration,
}

impl Default for HealthChecks {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl HealthChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with(
        mut self,
        name: &'static str,
        critical: bool,
        checker: impl DependencyChecker + 'static,
    ) -> Self {
        self.checks.push(RegisteredCheck {
            name,
            critical,
            checker: Box::new(checker),
        });
        self
    }

    pub async fn run(&self, start_time: Instant) -> HealthResponse {
        let results = futures::future::join_all(
            self.checks
                .iter()
                .map(|c| timeout(self.timeout, c.checker.check())),
        )
        .await;

        let mut critical_failure = false;
        let mut non_critical_failure = false;
        let mut dependencies = HashMap::new();

        for (check, result) in self.checks.iter().zip(results) {
            let status = result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            if matches!(status, DependencyStatus::Unhealthy { .. }) {
                if check.critical {
                    critical_failure = true;
                } else {
                    non_critical_failure = true;
                }
            }
            dependencies.insert(check.name.to_string(), status);
        }

        let status = if critical_failure {
            "unhealthy"
        } else if non_critical_failure {
            "degraded"
        } else {
            "healthy"
        };

        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
            dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SignatureCodec;

    struct Fixed(bool);

    #[async_trait]
    impl DependencyChecker for Fixed {
        async fn check(&self) -> DependencyStatus {
            if self.0 {
                DependencyStatus::healthy(Instant::now())
            } else {
                DependencyStatus::unhealthy("down")
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl DependencyChecker for Hangs {
        async fn check(&self) -> DependencyStatus {
            tokio::time::sleep(Duration::from_secs(60)).await;
            DependencyStatus::healthy(Instant::now())
        }
    }

    #[tokio::test]
    async fn test_non_critical_failure_degrades() {
        let report = HealthChecks::new()
            .with("postgres", true, Fixed(true))
            .with("redis", false, Fixed(false))
            .run(Instant::now())
            .await;
        assert_eq!(report.status, "degraded");
        assert_eq!(report.dependencies.len(), 2);
    }

    #[tokio::test]
    async fn test_critical_failure_is_unhealthy() {
        let report = HealthChecks::new()
            .with("postgres", true, Fixed(false))
            .run(Instant::now())
            .await;
        assert_eq!(report.status, "unhealthy");
    }

    #[tokio::test]
    async fn test_slow_check_times_out() {
        let report = HealthChecks::new()
            .with_timeout(Duration::from_millis(50))
            .with("redis", false, Hangs)
            .run(Instant::now())
            .await;
        assert!(matches!(
            report.dependencies.get("redis"),
            Some(DependencyStatus::Unhealthy { error, .. }) if error == "timeout"
        ));
    }

    #[tokio::test]
    async fn test_signing_secret_checker() {
        let missing = SigningSecretChecker::new(None).check().await;
        assert!(matches!(missing, DependencyStatus::Unhealthy { .. }));

        let gateway = GatewayConfig::new(
            "https://gateway.test/form",
            "EPAYTEST",
            "https://api.test",
            "https://app.test",
            SignatureCodec::new("secret").unwrap(),
        );
        let present = SigningSecretChecker::new(Some(Arc::new(gateway))).check().await;
        assert!(matches!(present, DependencyStatus::Healthy { .. }));
    }
}
