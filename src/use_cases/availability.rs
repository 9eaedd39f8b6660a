//! Date-range availability pre-check.
//!
//! Read-only: nothing is locked, so two initiations for the same dates can
//! both pass before either booking exists. Payment holds (see
//! `InitiateReservation`) narrow that window when enabled.

use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::ports::{BookingRepository, RepositoryResult};

#[derive(Clone)]
pub struct AvailabilityChecker {
    bookings: Arc<dyn BookingRepository>,
}

impl AvailabilityChecker {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    /// True when a pending, confirmed or active booking for the vehicle
    /// overlaps `[start, end]`, both ends inclusive.
    pub async fn has_conflict(
        &self,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<bool> {
        let conflicts = self.bookings.find_blocking(vehicle_id, start, end).await?;
        if let Some(first) = conflicts.first() {
            tracing::debug!(
                vehicle_id = %vehicle_id,
                conflicting_booking = %first.id,
                count = conflicts.len(),
                "Requested dates overlap existing booking"
            );
        }
        Ok(!conflicts.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBookingRepository;
    use crate::domain::{Booking, BookingStatus, GatewayRefs, PaymentStatus, PickupLocation};
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn booking(vehicle_id: Uuid, start: &str, end: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            vehicle_id,
            start_date: d(start),
            end_date: d(end),
            total_days: 2,
            price_per_day: BigDecimal::from(1000),
            total_amount: BigDecimal::from(2000),
            payment_status: PaymentStatus::Paid,
            booking_status: status,
            pickup_location: PickupLocation {
                address: "Lakeside".to_string(),
                city: "Pokhara".to_string(),
            },
            gateway: GatewayRefs::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn checker_with(bookings: Vec<Booking>) -> AvailabilityChecker {
        let repo = Arc::new(InMemoryBookingRepository::new());
        for b in &bookings {
            repo.insert(b).await.unwrap();
        }
        AvailabilityChecker::new(repo)
    }

    #[tokio::test]
    async fn test_boundary_day_counts_as_conflict() {
        let vehicle = Uuid::new_v4();
        let checker =
            checker_with(vec![booking(vehicle, "2024-06-01", "2024-06-03", BookingStatus::Confirmed)])
                .await;

        assert!(checker.has_conflict(vehicle, d("2024-06-03"), d("2024-06-05")).await.unwrap());
        assert!(checker.has_conflict(vehicle, d("2024-05-28"), d("2024-06-01")).await.unwrap());
        assert!(!checker.has_conflict(vehicle, d("2024-06-04"), d("2024-06-05")).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_bookings_do_not_block() {
        let vehicle = Uuid::new_v4();
        let checker = checker_with(vec![
            booking(vehicle, "2024-06-01", "2024-06-03", BookingStatus::Cancelled),
            booking(vehicle, "2024-06-01", "2024-06-03", BookingStatus::Completed),
        ])
        .await;

        assert!(!checker.has_conflict(vehicle, d("2024-06-01"), d("2024-06-03")).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_and_active_block() {
        let vehicle = Uuid::new_v4();
        let checker = checker_with(vec![
            booking(vehicle, "2024-06-01", "2024-06-03", BookingStatus::Pending),
            booking(vehicle, "2024-07-01", "2024-07-03", BookingStatus::Active),
        ])
        .await;

        assert!(checker.has_conflict(vehicle, d("2024-06-02"), d("2024-06-02")).await.unwrap());
        assert!(checker.has_conflict(vehicle, d("2024-06-30"), d("2024-07-01")).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_vehicles_are_ignored() {
        let checker = checker_with(vec![booking(
            Uuid::new_v4(),
            "2024-06-01",
            "2024-06-03",
            BookingStatus::Confirmed,
        )])
        .await;

        assert!(!checker
            .has_conflict(Uuid::new_v4(), d("2024-06-01"), d("2024-06-03"))
            .await
            .unwrap());
    }
}
