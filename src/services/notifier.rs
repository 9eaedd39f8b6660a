use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::domain::{Booking, User, Vehicle};
use crate::payment::format_amount;
use crate::ports::{NotifyError, Notifier};

/// Payload POSTed to the notification webhook when a booking is confirmed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmedEvent {
    pub event: &'static str,
    pub booking_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub vehicle_name: String,
    pub start_date: String,
    pub end_date: String,
    pub total_days: i32,
    pub total_amount: String,
    pub pickup_address: String,
    pub pickup_city: String,
    pub transaction_code: Option<String>,
}

impl BookingConfirmedEvent {
    pub fn new(booking: &Booking, user: &User, vehicle: &Vehicle) -> Self {
        Self {
            event: "booking.confirmed",
            booking_id: booking.id.to_string(),
            customer_name: user.full_name.clone(),
            customer_email: user.email.clone(),
            vehicle_name: vehicle.name.clone(),
            start_date: booking.start_date.to_string(),
            end_date: booking.end_date.to_string(),
            total_days: booking.total_days,
            total_amount: format_amount(&booking.total_amount),
            pickup_address: booking.pickup_location.address.clone(),
            pickup_city: booking.pickup_location.city.clone(),
            transaction_code: booking.gateway.transaction_code.clone(),
        }
    }
}

/// Delivers confirmation events to an external mailer over HTTP.
///
/// Repeated failures open the breaker so a dead mailer does not pile up
/// spawned tasks waiting on timeouts.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpNotifier {
    pub fn new(endpoint: String) -> Self {
        Self::with_circuit_breaker(endpoint, 3, 60)
    }

    pub fn with_circuit_breaker(
        endpoint: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            endpoint,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn booking_confirmed(
        &self,
        booking: &Booking,
        user: &User,
        vehicle: &Vehicle,
    ) -> Result<(), NotifyError> {
        let event = BookingConfirmedEvent::new(booking, user, vehicle);
        let client = self.client.clone();
        let url = self.endpoint.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                client
                    .post(&url)
                    .json(&event)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map(|_| ())
                    .map_err(|e| NotifyError::Delivery(e.to_string()))
            })
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(booking_id = %booking.id, "Booking confirmation delivered");
                Ok(())
            }
            Err(FailsafeError::Rejected) => Err(NotifyError::Unavailable(
                "notification circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(
        &self,
        booking: &Booking,
        user: &User,
        vehicle: &Vehicle,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            booking_id = %booking.id,
            customer_email = %user.email,
            vehicle = %vehicle.name,
            "Booking confirmed (no notification channel configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookingStatus, GatewayRefs, PaymentStatus, PickupLocation, VehicleStatus};
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use uuid::Uuid;

    fn fixtures() -> (Booking, User, Vehicle) {
        let user = User {
            id: Uuid::new_v4(),
            full_name: "Sita Tamang".to_string(),
            email: "sita@example.com".to_string(),
            address: None,
        };
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            name: "Creta".to_string(),
            status: VehicleStatus::Available,
            price_per_day: BigDecimal::from(1000),
            location: None,
            pickup_address: Some("Durbar Marg".to_string()),
            pickup_city: Some("Kathmandu".to_string()),
        };
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: user.id,
            vehicle_id: vehicle.id,
            start_date: "2024-06-01".parse().unwrap(),
            end_date: "2024-06-03".parse().unwrap(),
            total_days: 2,
            price_per_day: BigDecimal::from(1000),
            total_amount: BigDecimal::from(2000),
            payment_status: PaymentStatus::Paid,
            booking_status: BookingStatus::Confirmed,
            pickup_location: PickupLocation {
                address: "Durbar Marg".to_string(),
                city: "Kathmandu".to_string(),
            },
            gateway: GatewayRefs {
                transaction_uuid: Some("tx-1".to_string()),
                transaction_code: Some("000AWEO".to_string()),
                ref_id: Some("000AWEO".to_string()),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (booking, user, vehicle)
    }

    #[test]
    fn test_event_shape() {
        let (booking, user, vehicle) = fixtures();
        let event = serde_json::to_value(BookingConfirmedEvent::new(&booking, &user, &vehicle)).unwrap();

        assert_eq!(event["event"], "booking.confirmed");
        assert_eq!(event["customerEmail"], "sita@example.com");
        assert_eq!(event["totalAmount"], "2000.00");
        assert_eq!(event["transactionCode"], "000AWEO");
    }

    #[tokio::test]
    async fn test_http_notifier_posts_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/notify")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"event":"booking.confirmed","vehicleName":"Creta"}"#.to_string(),
            ))
            .with_status(202)
            .create_async()
            .await;

        let notifier = HttpNotifier::new(format!("{}/notify", server.url()));
        let (booking, user, vehicle) = fixtures();

        notifier.booking_confirmed(&booking, &user, &vehicle).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_notifier_opens_circuit_after_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/notify")
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let notifier = HttpNotifier::with_circuit_breaker(format!("{}/notify", server.url()), 2, 60);
        let (booking, user, vehicle) = fixtures();

        for _ in 0..2 {
            let err = notifier.booking_confirmed(&booking, &user, &vehicle).await.unwrap_err();
            assert!(matches!(err, NotifyError::Delivery(_)));
        }

        let err = notifier.booking_confirmed(&booking, &user, &vehicle).await.unwrap_err();
        assert!(matches!(err, NotifyError::Unavailable(_)));
        assert_eq!(notifier.circuit_state(), "open");
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let (booking, user, vehicle) = fixtures();
        assert!(LogNotifier.booking_confirmed(&booking, &user, &vehicle).await.is_ok());
    }
}
