//! Turns a verified intent into a durable, paid booking.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingIntent, BookingStatus, GatewayRefs, PaymentStatus, PickupLocation, User,
    Vehicle,
};
use crate::error::AppError;
use crate::ports::{BookingRepository, Notifier, UserRepository, VehicleRepository};

pub const PLACEHOLDER_CITY: &str = "Not specified";

#[derive(Clone)]
pub struct MaterializeBooking {
    bookings: Arc<dyn BookingRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
}

impl MaterializeBooking {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bookings,
            vehicles,
            users,
            notifier,
        }
    }

    pub async fn execute(
        &self,
        intent: &BookingIntent,
        refs: GatewayRefs,
    ) -> Result<Booking, AppError> {
        let vehicle = self
            .vehicles
            .find_by_id(intent.vehicle_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vehicle {}", intent.vehicle_id)))?;
        let user = self
            .users
            .find_by_id(intent.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", intent.user_id)))?;

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: intent.user_id,
            vehicle_id: intent.vehicle_id,
            start_date: intent.start_date,
            end_date: intent.end_date,
            total_days: intent.total_days,
            price_per_day: intent.price_per_day.clone(),
            total_amount: intent.total_amount.clone(),
            payment_status: PaymentStatus::Paid,
            booking_status: BookingStatus::Confirmed,
            pickup_location: derive_pickup_location(&vehicle, &user),
            gateway: refs,
            created_at: now,
            updated_at: now,
        };

        let saved = self.bookings.insert(&booking).await?;
        tracing::info!(
            booking_id = %saved.id,
            vehicle_id = %saved.vehicle_id,
            user_id = %saved.user_id,
            "Booking materialized"
        );

        self.notify_in_background(saved.clone(), user, vehicle);
        Ok(saved)
    }

    /// Fire-and-forget; the booking stands whatever the notifier does.
    fn notify_in_background(&self, booking: Booking, user: User, vehicle: Vehicle) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.booking_confirmed(&booking, &user, &vehicle).await {
                tracing::warn!(
                    booking_id = %booking.id,
                    error = %e,
                    "Booking confirmation notification failed"
                );
            }
        });
    }
}

/// Structured pickup address first, then "address, city" free text, then the
/// raw location (or the customer's address) with a placeholder city.
pub fn derive_pickup_location(vehicle: &Vehicle, user: &User) -> PickupLocation {
    let non_empty = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    if let Some(address) = non_empty(vehicle.pickup_address.as_deref()) {
        let city = non_empty(vehicle.pickup_city.as_deref())
            .unwrap_or_else(|| PLACEHOLDER_CITY.to_string());
        return PickupLocation { address, city };
    }

    let location = non_empty(vehicle.location.as_deref());
    if let Some((address, city)) = location.as_deref().and_then(|l| l.rsplit_once(',')) {
        let (address, city) = (address.trim(), city.trim());
        if !address.is_empty() && !city.is_empty() {
            return PickupLocation {
                address: address.to_string(),
                city: city.to_string(),
            };
        }
    }

    let address = location
        .or_else(|| non_empty(user.address.as_deref()))
        .unwrap_or_else(|| PLACEHOLDER_CITY.to_string());
    PickupLocation {
        address,
        city: PLACEHOLDER_CITY.to_string(),
    }
}
