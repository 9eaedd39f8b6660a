//! Domain entities for the reservation core.
//! Framework-agnostic: no sqlx or axum types leak in here.

pub mod booking;
pub mod intent;
pub mod vehicle;

pub use booking::{Booking, BookingStatus, GatewayRefs, PaymentStatus, PickupLocation};
pub use intent::{BookingIntent, PaymentMethod};
pub use vehicle::{User, Vehicle, VehicleStatus};
