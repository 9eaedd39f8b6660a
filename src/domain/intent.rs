//! Pending booking intent: what the customer asked for, parked until the
//! gateway confirms payment.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Esewa,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingIntent {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub vehicle_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub price_per_day: BigDecimal,
    pub total_amount: BigDecimal,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

impl BookingIntent {
    /// Builds an intent with a freshly generated transaction id.
    pub fn new(
        user_id: Uuid,
        vehicle_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_days: i32,
        price_per_day: BigDecimal,
        total_amount: BigDecimal,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            transaction_id: new_transaction_id(created_at, user_id, vehicle_id),
            user_id,
            vehicle_id,
            start_date,
            end_date,
            total_days,
            price_per_day,
            total_amount,
            payment_method: PaymentMethod::Esewa,
            created_at,
        }
    }
}

/// `<millis>-<user>-<vehicle>-<nonce>`. The embedded ids are for tracing only;
/// the nonce keeps two attempts in the same millisecond apart.
pub fn new_transaction_id(at: DateTime<Utc>, user_id: Uuid, vehicle_id: Uuid) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}",
        at.timestamp_millis(),
        user_id.simple(),
        vehicle_id.simple(),
        &nonce[..8]
    )
}
