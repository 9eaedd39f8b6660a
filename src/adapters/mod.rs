pub mod memory;
pub mod memory_intent_store;
pub mod postgres_booking_repository;
pub mod postgres_catalog_repository;
pub mod redis_intent_store;

pub use memory::{InMemoryBookingRepository, InMemoryUserRepository, InMemoryVehicleRepository};
pub use memory_intent_store::MemoryIntentStore;
pub use postgres_booking_repository::PostgresBookingRepository;
pub use postgres_catalog_repository::{PostgresUserRepository, PostgresVehicleRepository};
pub use redis_intent_store::RedisIntentStore;
