//! Gateway callback state machine.
//!
//! Decode, take the pending intent, verify the signature, then branch on the
//! reported status. The take is atomic, so only the first delivery of a
//! transaction can reach materialization; redeliveries find nothing.

use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::materialize_booking::MaterializeBooking;
use crate::domain::{BookingIntent, GatewayRefs};
use crate::payment::signature::resolve_signed_fields;
use crate::payment::{parse_amount, CallbackPayload, CallbackStatus, GatewayConfig};
use crate::ports::IntentStore;

/// Reason codes carried on the failure redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    BookingDataNotFound,
    AmountMismatch,
    BookingCreationFailed,
    CallbackError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::BookingDataNotFound => "booking_data_not_found",
            FailureReason::AmountMismatch => "amount_mismatch",
            FailureReason::BookingCreationFailed => "booking_creation_failed",
            FailureReason::CallbackError => "callback_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardKind {
    /// CANCELED or FAILURE.
    Cancelled,
    /// PENDING or an unrecognised status. The intent has already been taken
    /// and is not restored.
    Unresolved {
        status: String,
        transaction_uuid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Materialized { booking_id: Uuid },
    UnknownTransaction,
    RejectedSignature,
    RejectedAmount,
    Discarded(DiscardKind),
    Failed(FailureReason),
}

impl CallbackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CallbackOutcome::Materialized { .. } => "materialized",
            CallbackOutcome::UnknownTransaction => "unknown_transaction",
            CallbackOutcome::RejectedSignature => "rejected_signature",
            CallbackOutcome::RejectedAmount => "rejected_amount",
            CallbackOutcome::Discarded(DiscardKind::Cancelled) => "discarded",
            CallbackOutcome::Discarded(DiscardKind::Unresolved { .. }) => "discarded_unresolved",
            CallbackOutcome::Failed(_) => "failed",
        }
    }

    /// Browser redirect target under `frontend_url`.
    pub fn redirect_url(&self, frontend_url: &str) -> String {
        let base = frontend_url.trim_end_matches('/');
        match self {
            CallbackOutcome::Materialized { booking_id } => {
                let id = booking_id.to_string();
                format!("{}/payment/success?{}", base, encode_query(&[("bookingId", id.as_str())]))
            }
            CallbackOutcome::Discarded(DiscardKind::Cancelled) => {
                format!("{}/payment/cancelled", base)
            }
            CallbackOutcome::Discarded(DiscardKind::Unresolved {
                status,
                transaction_uuid,
            }) => format!(
                "{}/payment/pending?{}",
                base,
                encode_query(&[
                    ("status", status.as_str()),
                    ("transactionUuid", transaction_uuid.as_str()),
                ])
            ),
            CallbackOutcome::UnknownTransaction => failed_url(base, FailureReason::BookingDataNotFound),
            CallbackOutcome::RejectedSignature => failed_url(base, FailureReason::CallbackError),
            CallbackOutcome::RejectedAmount => failed_url(base, FailureReason::AmountMismatch),
            CallbackOutcome::Failed(reason) => failed_url(base, *reason),
        }
    }
}

fn failed_url(base: &str, reason: FailureReason) -> String {
    format!("{}/payment/failed?{}", base, encode_query(&[("error", reason.as_str())]))
}

fn encode_query(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish()
}

#[derive(Clone)]
pub struct HandleCallback {
    intents: Arc<dyn IntentStore>,
    materializer: MaterializeBooking,
    gateway: Arc<GatewayConfig>,
}

impl HandleCallback {
    pub fn new(
        intents: Arc<dyn IntentStore>,
        materializer: MaterializeBooking,
        gateway: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            intents,
            materializer,
            gateway,
        }
    }

    /// Never fails: every fault maps to an outcome with a redirect.
    pub async fn execute(&self, data: Option<&str>) -> CallbackOutcome {
        let payload = match CallbackPayload::decode(data) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable payment callback");
                return CallbackOutcome::Failed(FailureReason::CallbackError);
            }
        };

        let outcome = self.process(&payload).await;
        tracing::info!(
            transaction_uuid = %payload.transaction_uuid,
            status = %payload.status,
            outcome = outcome.label(),
            "Payment callback handled"
        );
        outcome
    }

    async fn process(&self, payload: &CallbackPayload) -> CallbackOutcome {
        let intent = match self.intents.take(&payload.transaction_uuid).await {
            Ok(Some(intent)) => intent,
            Ok(None) => return CallbackOutcome::UnknownTransaction,
            Err(e) => {
                tracing::error!(
                    transaction_uuid = %payload.transaction_uuid,
                    error = %e,
                    "Intent store unavailable during callback"
                );
                return CallbackOutcome::Failed(FailureReason::CallbackError);
            }
        };

        let signature_valid = match payload.signature_parts() {
            Some((names, received)) => {
                let fields = resolve_signed_fields(payload, names);
                if !self.gateway.codec().verify(&fields, received) {
                    tracing::warn!(
                        transaction_uuid = %payload.transaction_uuid,
                        signed_field_names = names,
                        expected = %self.gateway.codec().sign(&fields),
                        received = received,
                        "Callback signature mismatch"
                    );
                    return CallbackOutcome::RejectedSignature;
                }
                true
            }
            None => false,
        };

        match payload.status() {
            CallbackStatus::Complete if signature_valid => self.complete(payload, intent).await,
            CallbackStatus::Complete => {
                tracing::warn!(
                    transaction_uuid = %payload.transaction_uuid,
                    "COMPLETE callback without signature"
                );
                CallbackOutcome::RejectedSignature
            }
            CallbackStatus::Canceled | CallbackStatus::Failure => {
                CallbackOutcome::Discarded(DiscardKind::Cancelled)
            }
            CallbackStatus::Pending | CallbackStatus::Other(_) => {
                tracing::warn!(
                    transaction_uuid = %payload.transaction_uuid,
                    status = %payload.status,
                    "Unresolved payment status; intent dropped"
                );
                CallbackOutcome::Discarded(DiscardKind::Unresolved {
                    status: payload.status.clone(),
                    transaction_uuid: payload.transaction_uuid.clone(),
                })
            }
        }
    }

    async fn complete(&self, payload: &CallbackPayload, intent: BookingIntent) -> CallbackOutcome {
        if !amount_matches(&payload.total_amount, &intent.total_amount) {
            tracing::warn!(
                transaction_uuid = %payload.transaction_uuid,
                confirmed = %payload.total_amount,
                quoted = %intent.total_amount,
                "Confirmed amount does not match quote"
            );
            return CallbackOutcome::RejectedAmount;
        }

        let refs = GatewayRefs {
            transaction_uuid: Some(payload.transaction_uuid.clone()),
            transaction_code: payload.transaction_code.clone(),
            ref_id: payload
                .ref_id
                .clone()
                .or_else(|| payload.transaction_code.clone()),
        };

        match self.materializer.execute(&intent, refs).await {
            Ok(booking) => CallbackOutcome::Materialized {
                booking_id: booking.id,
            },
            Err(e) => {
                tracing::error!(
                    transaction_uuid = %payload.transaction_uuid,
                    error = %e,
                    "Booking materialization failed"
                );
                CallbackOutcome::Failed(FailureReason::BookingCreationFailed)
            }
        }
    }
}

/// Unparseable amounts never match.
fn amount_matches(confirmed: &str, quoted: &BigDecimal) -> bool {
    let tolerance = match BigDecimal::from_str("0.01") {
        Ok(t) => t,
        Err(_) => return false,
    };
    parse_amount(confirmed)
        .map(|amount| (amount - quoted).abs() < tolerance)
        .unwrap_or(false)
}
