//! In-memory repositories. Back the router in tests and local demos where no
//! Postgres is available.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Booking, User, Vehicle};
use crate::ports::{
    BookingRepository, RepositoryError, RepositoryResult, UserRepository, VehicleRepository,
};

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Booking> {
        self.bookings.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(RepositoryError::Duplicate(booking.id.to_string()));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Booking> {
        self.bookings
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_blocking(
        &self,
        vehicle_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| {
                b.vehicle_id == vehicle_id && b.booking_status.is_blocking() && b.overlaps(start, end)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryVehicleRepository {
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
}

impl InMemoryVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, vehicle: Vehicle) {
        self.vehicles.write().await.insert(vehicle.id, vehicle);
    }

    pub async fn remove(&self, id: Uuid) {
        self.vehicles.write().await.remove(&id);
    }
}

#[async_trait]
impl VehicleRepository for InMemoryVehicleRepository {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn remove(&self, id: Uuid) {
        self.users.write().await.remove(&id);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
