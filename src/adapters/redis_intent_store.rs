//! Redis-backed intent store.
//!
//! Puts run as one Lua script: `SET NX EX` refuses to overwrite and gives
//! native TTL expiry, and the optional hold check over the per-vehicle index
//! runs inside the same script so no other put can interleave. `GETDEL` makes
//! take-and-remove a single server-side step.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::BookingIntent;
use crate::ports::{IntentStore, RepositoryError, RepositoryResult};

const INTENT_PREFIX: &str = "intent:";
const VEHICLE_INDEX_PREFIX: &str = "intent:vehicle:";

// KEYS: intent key, vehicle index.
// ARGV: payload, ttl secs, transaction id, start, end, intent prefix, exclusive.
// Dates are ISO-8601 strings, so string comparison orders them. Held intent
// keys are read by name from the index, which needs a single-node Redis.
// Returns 1 stored, 0 dates held, -1 duplicate transaction id.
const PUT_INTENT_LUA: &str = r#"
if ARGV[7] == '1' then
  for _, id in ipairs(redis.call('SMEMBERS', KEYS[2])) do
    local raw = redis.call('GET', ARGV[6] .. id)
    if raw then
      local held = cjson.decode(raw)
      if held.start_date <= ARGV[5] and held.end_date >= ARGV[4] then
        return 0
      end
    else
      redis.call('SREM', KEYS[2], id)
    end
  end
end
if not redis.call('SET', KEYS[1], ARGV[1], 'NX', 'EX', ARGV[2]) then
  return -1
end
redis.call('SADD', KEYS[2], ARGV[3])
redis.call('EXPIRE', KEYS[2], ARGV[2])
return 1
"#;

#[derive(Clone)]
pub struct RedisIntentStore {
    client: redis::Client,
    ttl: Duration,
    put_script: Script,
}

impl RedisIntentStore {
    pub fn new(redis_url: &str, ttl: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            ttl,
            put_script: Script::new(PUT_INTENT_LUA),
        })
    }

    async fn connection(&self) -> RepositoryResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }

    async fn put_scripted(&self, intent: &BookingIntent, exclusive: bool) -> RepositoryResult<bool> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(intent)?;

        let result: i64 = self
            .put_script
            .key(intent_key(&intent.transaction_id))
            .key(vehicle_index_key(intent.vehicle_id))
            .arg(payload)
            .arg(self.ttl_secs())
            .arg(&intent.transaction_id)
            .arg(intent.start_date.to_string())
            .arg(intent.end_date.to_string())
            .arg(INTENT_PREFIX)
            .arg(if exclusive { "1" } else { "0" })
            .invoke_async(&mut conn)
            .await?;

        match result {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(RepositoryError::Duplicate(intent.transaction_id.clone())),
        }
    }

    async fn get_del(
        &self,
        conn: &mut MultiplexedConnection,
        transaction_id: &str,
    ) -> RepositoryResult<Option<BookingIntent>> {
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(intent_key(transaction_id))
            .query_async(&mut *conn)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let intent: BookingIntent = serde_json::from_str(&raw)?;

        // The intent is already consumed; a stale index entry is swept later.
        if let Err(e) = redis::cmd("SREM")
            .arg(vehicle_index_key(intent.vehicle_id))
            .arg(transaction_id)
            .query_async::<_, i64>(&mut *conn)
            .await
        {
            tracing::warn!(
                transaction_uuid = transaction_id,
                vehicle_id = %intent.vehicle_id,
                error = %e,
                "Failed to drop taken intent from the hold index"
            );
        }

        Ok(Some(intent))
    }
}

fn intent_key(transaction_id: &str) -> String {
    format!("{}{}", INTENT_PREFIX, transaction_id)
}

fn vehicle_index_key(vehicle_id: Uuid) -> String {
    format!("{}{}", VEHICLE_INDEX_PREFIX, vehicle_id)
}

#[async_trait]
impl IntentStore for RedisIntentStore {
    async fn put(&self, intent: &BookingIntent) -> RepositoryResult<()> {
        self.put_scripted(intent, false).await.map(|_| ())
    }

    async fn put_exclusive(&self, intent: &BookingIntent) -> RepositoryResult<bool> {
        self.put_scripted(intent, true).await
    }

    async fn take(&self, transaction_id: &str) -> RepositoryResult<Option<BookingIntent>> {
        let mut conn = self.connection().await?;
        self.get_del(&mut conn, transaction_id).await
    }

    async fn discard(&self, transaction_id: &str) -> RepositoryResult<bool> {
        let mut conn = self.connection().await?;
        Ok(self.get_del(&mut conn, transaction_id).await?.is_some())
    }

    /// Intent keys expire natively; this only sweeps index entries whose
    /// intent key is gone.
    async fn purge_expired(&self) -> RepositoryResult<usize> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", VEHICLE_INDEX_PREFIX);
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, indexes): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            for index in indexes {
                let members: Vec<String> = redis::cmd("SMEMBERS")
                    .arg(&index)
                    .query_async(&mut conn)
                    .await?;
                for transaction_id in members {
                    let exists: bool = redis::cmd("EXISTS")
                        .arg(intent_key(&transaction_id))
                        .query_async(&mut conn)
                        .await?;
                    if !exists {
                        let n: i64 = redis::cmd("SREM")
                            .arg(&index)
                            .arg(&transaction_id)
                            .query_async(&mut conn)
                            .await?;
                        removed += n as usize;
                    }
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    // Note: These tests require a running Redis instance
    // Run with: docker run -p 6379:6379 redis:7

    fn store() -> RedisIntentStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        RedisIntentStore::new(&url, Duration::from_secs(60)).unwrap()
    }

    fn intent(vehicle_id: Uuid) -> BookingIntent {
        BookingIntent::new(
            Uuid::new_v4(),
            vehicle_id,
            "2024-06-01".parse().unwrap(),
            "2024-06-03".parse().unwrap(),
            2,
            BigDecimal::from(1000),
            BigDecimal::from(2000),
        )
    }

    #[test]
    fn test_key_layout() {
        let vehicle = Uuid::nil();
        assert_eq!(intent_key("abc"), "intent:abc");
        assert_eq!(
            vehicle_index_key(vehicle),
            "intent:vehicle:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_put_take_is_single_use() {
        let store = store();
        let intent = intent(Uuid::new_v4());

        store.put(&intent).await.unwrap();
        assert!(matches!(
            store.put(&intent).await,
            Err(RepositoryError::Duplicate(_))
        ));
        assert_eq!(store.take(&intent.transaction_id).await.unwrap(), Some(intent.clone()));
        assert_eq!(store.take(&intent.transaction_id).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_holds_follow_intent_lifecycle() {
        let store = store();
        let vehicle = Uuid::new_v4();
        let first = intent(vehicle);

        assert!(store.put_exclusive(&first).await.unwrap());
        assert!(!store.put_exclusive(&intent(vehicle)).await.unwrap());

        assert!(store.discard(&first.transaction_id).await.unwrap());
        assert!(store.put_exclusive(&intent(vehicle)).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore] // Requires Redis
    async fn test_redis_concurrent_exclusive_puts_grant_one_hold() {
        let store = store();
        let vehicle = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let candidate = intent(vehicle);
                tokio::spawn(async move { store.put_exclusive(&candidate).await.unwrap() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_take_survives_broken_hold_index() {
        let store = store();
        let vehicle = Uuid::new_v4();
        let intent = intent(vehicle);
        store.put(&intent).await.unwrap();

        // Replace the index set with a plain string so SREM fails.
        let mut conn = store.connection().await.unwrap();
        let index = vehicle_index_key(vehicle);
        redis::pipe()
            .cmd("DEL")
            .arg(&index)
            .ignore()
            .cmd("SET")
            .arg(&index)
            .arg("not-a-set")
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .unwrap();

        assert_eq!(store.take(&intent.transaction_id).await.unwrap(), Some(intent.clone()));
        assert_eq!(store.take(&intent.transaction_id).await.unwrap(), None);

        let _: i64 = redis::cmd("DEL").arg(&index).query_async(&mut conn).await.unwrap();
    }
}
