//! Validates a booking request, parks it as a pending intent and returns the
//! signed form the browser submits to the gateway.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::availability::AvailabilityChecker;
use crate::domain::{BookingIntent, VehicleStatus};
use crate::error::AppError;
use crate::payment::{GatewayConfig, PaymentForm};
use crate::ports::{IntentStore, VehicleRepository};

/// Every field is optional on the wire so a missing one is reported as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub vehicle_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_days: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price_per_day: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedPayment {
    pub transaction_uuid: String,
    pub form_data: PaymentForm,
    pub form_url: String,
}

struct ValidatedRequest {
    vehicle_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: i32,
    price_per_day: BigDecimal,
    total_amount: BigDecimal,
}

impl ReservationRequest {
    fn require_fields(self) -> Result<ValidatedRequest, AppError> {
        let mut missing = Vec::new();
        if self.vehicle_id.is_none() {
            missing.push("vehicleId");
        }
        if self.start_date.is_none() {
            missing.push("startDate");
        }
        if self.end_date.is_none() {
            missing.push("endDate");
        }
        if self.total_days.is_none() {
            missing.push("totalDays");
        }
        if self.price_per_day.is_none() {
            missing.push("pricePerDay");
        }
        if self.total_amount.is_none() {
            missing.push("totalAmount");
        }

        match (
            self.vehicle_id,
            self.start_date,
            self.end_date,
            self.total_days,
            self.price_per_day,
            self.total_amount,
        ) {
            (
                Some(vehicle_id),
                Some(start_date),
                Some(end_date),
                Some(total_days),
                Some(price_per_day),
                Some(total_amount),
            ) => Ok(ValidatedRequest {
                vehicle_id,
                start_date,
                end_date,
                total_days,
                price_per_day,
                total_amount,
            }),
            _ => Err(AppError::Validation(format!(
                "missing required booking fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Largest amount the `NUMERIC(12, 2)` booking columns hold.
pub fn max_amount() -> BigDecimal {
    BigDecimal::new(999_999_999_999i64.into(), 2)
}

#[derive(Clone)]
pub struct InitiateReservation {
    vehicles: Arc<dyn VehicleRepository>,
    availability: AvailabilityChecker,
    intents: Arc<dyn IntentStore>,
    gateway: Arc<GatewayConfig>,
    enforce_holds: bool,
}

impl InitiateReservation {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        availability: AvailabilityChecker,
        intents: Arc<dyn IntentStore>,
        gateway: Arc<GatewayConfig>,
        enforce_holds: bool,
    ) -> Self {
        Self {
            vehicles,
            availability,
            intents,
            gateway,
            enforce_holds,
        }
    }

    pub async fn execute(
        &self,
        user_id: Uuid,
        request: ReservationRequest,
    ) -> Result<InitiatedPayment, AppError> {
        let req = request.require_fields()?;

        let vehicle = self
            .vehicles
            .find_by_id(req.vehicle_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", req.vehicle_id)))?;

        if vehicle.status != VehicleStatus::Available {
            return Err(AppError::Conflict(format!(
                "Vehicle {} is not available for booking",
                vehicle.id
            )));
        }

        if req.end_date <= req.start_date {
            return Err(AppError::Validation(
                "endDate must be after startDate".to_string(),
            ));
        }

        if self
            .availability
            .has_conflict(vehicle.id, req.start_date, req.end_date)
            .await?
        {
            return Err(AppError::Conflict(
                "Vehicle is already booked for the selected dates".to_string(),
            ));
        }

        if req.total_amount < BigDecimal::from(1) {
            return Err(AppError::Validation(
                "totalAmount must be at least 1".to_string(),
            ));
        }
        let max_amount = max_amount();
        if req.total_amount > max_amount || req.price_per_day > max_amount {
            return Err(AppError::Validation(format!(
                "totalAmount and pricePerDay must not exceed {}",
                max_amount
            )));
        }

        let intent = BookingIntent::new(
            user_id,
            vehicle.id,
            req.start_date,
            req.end_date,
            req.total_days,
            req.price_per_day,
            req.total_amount,
        );
        let form = self
            .gateway
            .build_form(&intent.transaction_id, &intent.total_amount);

        if self.enforce_holds {
            if !self.intents.put_exclusive(&intent).await? {
                return Err(AppError::Conflict(
                    "Vehicle is being reserved by another payment for the selected dates"
                        .to_string(),
                ));
            }
        } else {
            self.intents.put(&intent).await?;
        }

        tracing::info!(
            transaction_uuid = %intent.transaction_id,
            vehicle_id = %intent.vehicle_id,
            user_id = %intent.user_id,
            total_amount = %form.total_amount,
            "Payment initiated"
        );

        Ok(InitiatedPayment {
            transaction_uuid: intent.transaction_id,
            form_data: form,
            form_url: self.gateway.form_url.clone(),
        })
    }
}
