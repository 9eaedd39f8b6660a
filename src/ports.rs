//! Storage and collaborator ports.
//! Use cases depend on these traits; adapters provide Postgres, Redis and
//! in-memory implementations.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Booking, BookingIntent, User, Vehicle};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for RepositoryError {
    fn from(err: redis::RedisError) -> Self {
        RepositoryError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Store(format!("serialization: {}", err))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking>;

    /// Bookings for the vehicle in a blocking status whose range overlaps
    /// `[start, end]` inclusively.
    async fn find_blocking(
        &self,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<Booking>>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Vehicle>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;
}

/// Ephemeral store of intents awaiting a gateway callback.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Fails with `Duplicate` rather than overwriting an existing key.
    async fn put(&self, intent: &BookingIntent) -> RepositoryResult<()>;

    /// Reads and deletes in one step. At most one caller observes `Some`.
    async fn take(&self, transaction_id: &str) -> RepositoryResult<Option<BookingIntent>>;

    async fn discard(&self, transaction_id: &str) -> RepositoryResult<bool>;

    /// Like `put`, but refuses when a live intent for the same vehicle
    /// overlaps the dates. Check and insert happen in one step; `false`
    /// means the dates are held by another payment.
    async fn put_exclusive(&self, intent: &BookingIntent) -> RepositoryResult<bool>;

    /// Drops expired entries, returning how many were removed.
    async fn purge_expired(&self) -> RepositoryResult<usize>;
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(
        &self,
        booking: &Booking,
        user: &User,
        vehicle: &Vehicle,
    ) -> Result<(), NotifyError>;
}
