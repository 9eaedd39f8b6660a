//! Process-local intent store with per-entry expiry.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::booking::ranges_overlap;
use crate::domain::BookingIntent;
use crate::ports::{IntentStore, RepositoryError, RepositoryResult};

struct StoredIntent {
    intent: BookingIntent,
    expires_at: Instant,
}

impl StoredIntent {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Every operation runs under one mutex, so take-and-remove is atomic.
pub struct MemoryIntentStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, StoredIntent>>,
}

impl MemoryIntentStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn insert_locked(
        &self,
        entries: &mut HashMap<String, StoredIntent>,
        intent: &BookingIntent,
        now: Instant,
    ) -> RepositoryResult<()> {
        if let Some(existing) = entries.get(&intent.transaction_id) {
            if existing.is_live(now) {
                return Err(RepositoryError::Duplicate(intent.transaction_id.clone()));
            }
        }

        entries.insert(
            intent.transaction_id.clone(),
            StoredIntent {
                intent: intent.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }
}

fn held_by_other(
    entries: &HashMap<String, StoredIntent>,
    vehicle_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    now: Instant,
) -> bool {
    entries.values().any(|stored| {
        stored.is_live(now)
            && stored.intent.vehicle_id == vehicle_id
            && ranges_overlap(stored.intent.start_date, stored.intent.end_date, start, end)
    })
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn put(&self, intent: &BookingIntent) -> RepositoryResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.insert_locked(&mut entries, intent, now)
    }

    async fn put_exclusive(&self, intent: &BookingIntent) -> RepositoryResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if held_by_other(&entries, intent.vehicle_id, intent.start_date, intent.end_date, now) {
            return Ok(false);
        }
        self.insert_locked(&mut entries, intent, now)?;
        Ok(true)
    }

    async fn take(&self, transaction_id: &str) -> RepositoryResult<Option<BookingIntent>> {
        let now = Instant::now();
        let removed = self.entries.lock().await.remove(transaction_id);
        Ok(removed
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.intent))
    }

    async fn discard(&self, transaction_id: &str) -> RepositoryResult<bool> {
        Ok(self.take(transaction_id).await?.is_some())
    }

    async fn purge_expired(&self) -> RepositoryResult<usize> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, stored| stored.is_live(now));
        Ok(before - entries.len())
    }
}
