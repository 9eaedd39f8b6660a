//! Postgres implementation of BookingRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, GatewayRefs, PaymentStatus, PickupLocation};
use crate::ports::{BookingRepository, RepositoryError, RepositoryResult};

const BOOKING_COLUMNS: &str = r#"
    id, user_id, vehicle_id, start_date, end_date, total_days, price_per_day,
    total_amount, payment_status, booking_status, pickup_address, pickup_city,
    gateway_transaction_uuid, gateway_transaction_code, gateway_ref_id,
    created_at, updated_at
"#;

/// Postgres-backed booking repository.
#[derive(Clone)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let query = format!(
            r#"
            INSERT INTO bookings (
                id, user_id, vehicle_id, start_date, end_date, total_days, price_per_day,
                total_amount, payment_status, booking_status, pickup_address, pickup_city,
                gateway_transaction_uuid, gateway_transaction_code, gateway_ref_id,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(booking.id)
            .bind(booking.user_id)
            .bind(booking.vehicle_id)
            .bind(booking.start_date)
            .bind(booking.end_date)
            .bind(booking.total_days)
            .bind(&booking.price_per_day)
            .bind(&booking.total_amount)
            .bind(booking.payment_status.as_str())
            .bind(booking.booking_status.as_str())
            .bind(&booking.pickup_location.address)
            .bind(&booking.pickup_location.city)
            .bind(&booking.gateway.transaction_uuid)
            .bind(&booking.gateway.transaction_code)
            .bind(&booking.gateway.ref_id)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn find_blocking(
        &self,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<Booking>> {
        let statuses: Vec<String> = BookingStatus::BLOCKING
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let query = format!(
            r#"
            SELECT {} FROM bookings
            WHERE vehicle_id = $1
            AND booking_status = ANY($2)
            AND start_date <= $4
            AND end_date >= $3
            ORDER BY start_date ASC
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query_as::<_, BookingRow>(&query)
            .bind(vehicle_id)
            .bind(&statuses)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(BookingRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    vehicle_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: i32,
    price_per_day: BigDecimal,
    total_amount: BigDecimal,
    payment_status: String,
    booking_status: String,
    pickup_address: String,
    pickup_city: String,
    gateway_transaction_uuid: Option<String>,
    gateway_transaction_code: Option<String>,
    gateway_ref_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_domain(self) -> RepositoryResult<Booking> {
        let payment_status = self
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(RepositoryError::Database)?;
        let booking_status = self
            .booking_status
            .parse::<BookingStatus>()
            .map_err(RepositoryError::Database)?;

        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            vehicle_id: self.vehicle_id,
            start_date: self.start_date,
            end_date: self.end_date,
            total_days: self.total_days,
            price_per_day: self.price_per_day,
            total_amount: self.total_amount,
            payment_status,
            booking_status,
            pickup_location: PickupLocation {
                address: self.pickup_address,
                city: self.pickup_city,
            },
            gateway: GatewayRefs {
                transaction_uuid: self.gateway_transaction_uuid,
                transaction_code: self.gateway_transaction_code,
                ref_id: self.gateway_ref_id,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
