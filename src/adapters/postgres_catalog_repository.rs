//! Postgres lookups for vehicles and users. Both tables are written by the
//! marketplace CRUD layer; the reservation core only reads them.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{User, Vehicle, VehicleStatus};
use crate::ports::{RepositoryError, RepositoryResult, UserRepository, VehicleRepository};

#[derive(Clone)]
pub struct PostgresVehicleRepository {
    pool: PgPool,
}

impl PostgresVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleRepository for PostgresVehicleRepository {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, name, status, price_per_day, location, pickup_address, pickup_city
            FROM vehicles WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(VehicleRow::into_domain).transpose()
    }
}

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, full_name, email, address FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(|r| User {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            address: r.address,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    name: String,
    status: String,
    price_per_day: BigDecimal,
    location: Option<String>,
    pickup_address: Option<String>,
    pickup_city: Option<String>,
}

impl VehicleRow {
    fn into_domain(self) -> RepositoryResult<Vehicle> {
        Ok(Vehicle {
            id: self.id,
            name: self.name,
            status: self
                .status
                .parse::<VehicleStatus>()
                .map_err(RepositoryError::Database)?,
            price_per_day: self.price_per_day,
            location: self.location,
            pickup_address: self.pickup_address,
            pickup_city: self.pickup_city,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    address: Option<String>,
}
