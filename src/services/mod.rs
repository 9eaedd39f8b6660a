pub mod intent_sweeper;
pub mod notifier;

pub use intent_sweeper::{run_intent_sweeper, sweep_once, DEFAULT_SWEEP_INTERVAL_SECS};
pub use notifier::{BookingConfirmedEvent, HttpNotifier, LogNotifier};
