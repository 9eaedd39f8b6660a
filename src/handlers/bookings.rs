use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Booking;
use crate::error::AppError;
use crate::payment::format_amount;
use crate::ports::{BookingRepository, RepositoryError};
use crate::AppState;

/// Wire view of a booking. Amounts are two-decimal strings.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vehicle_id: Uuid,
    #[schema(value_type = String, format = Date)]
    pub start_date: chrono::NaiveDate,
    #[schema(value_type = String, format = Date)]
    pub end_date: chrono::NaiveDate,
    pub total_days: i32,
    pub price_per_day: String,
    pub total_amount: String,
    pub payment_status: String,
    pub booking_status: String,
    pub pickup_location: PickupLocationResponse,
    pub transaction_uuid: Option<String>,
    pub transaction_code: Option<String>,
    pub ref_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PickupLocationResponse {
    pub address: String,
    pub city: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            vehicle_id: b.vehicle_id,
            start_date: b.start_date,
            end_date: b.end_date,
            total_days: b.total_days,
            price_per_day: format_amount(&b.price_per_day),
            total_amount: format_amount(&b.total_amount),
            payment_status: b.payment_status.to_string(),
            booking_status: b.booking_status.to_string(),
            pickup_location: PickupLocationResponse {
                address: b.pickup_location.address,
                city: b.pickup_location.city,
            },
            transaction_uuid: b.gateway.transaction_uuid,
            transaction_code: b.gateway.transaction_code,
            ref_id: b.gateway.ref_id,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking", body = BookingResponse),
        (status = 404, description = "Booking not found")
    ),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.get_by_id(id).await.map_err(|e| match e {
        RepositoryError::NotFound(_) => AppError::NotFound(format!("Booking {} not found", id)),
        other => other.into(),
    })?;
    Ok(Json(booking.into()))
}
