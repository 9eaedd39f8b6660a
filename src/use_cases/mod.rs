pub mod availability;
pub mod handle_callback;
pub mod initiate_reservation;
pub mod materialize_booking;

pub use availability::AvailabilityChecker;
pub use handle_callback::{CallbackOutcome, DiscardKind, FailureReason, HandleCallback};
pub use initiate_reservation::{InitiateReservation, InitiatedPayment, ReservationRequest};
pub use materialize_booking::{derive_pickup_location, MaterializeBooking};
