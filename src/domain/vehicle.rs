//! Read-side views of records owned by the marketplace CRUD layer.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Unavailable,
    Maintenance,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::Unavailable => "unavailable",
            VehicleStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(VehicleStatus::Available),
            "unavailable" => Ok(VehicleStatus::Unavailable),
            "maintenance" => Ok(VehicleStatus::Maintenance),
            other => Err(format!("unknown vehicle status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    pub status: VehicleStatus,
    pub price_per_day: BigDecimal,
    /// Free-text location, usually "street, city".
    pub location: Option<String>,
    pub pickup_address: Option<String>,
    pub pickup_city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub address: Option<String>,
}
