//! Modelo de Vehicle
//!
//! Registro de vehículos de clientes. Las cotizaciones guardan un snapshot
//! (`VehicleDetails`) en lugar de una referencia viva, de modo que editar el
//! vehículo después no cambia lo cotizado.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::{validation_error, AppError};

/// Tipo de vehículo - mapea al ENUM vehicle_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "vehicle_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Sedan,
    Suv,
    Pickup,
    Motorcycle,
    CommercialTruck,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Sedan => "sedan",
            VehicleType::Suv => "suv",
            VehicleType::Pickup => "pickup",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::CommercialTruck => "commercial_truck",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "sedan" => Ok(VehicleType::Sedan),
            "suv" => Ok(VehicleType::Suv),
            "pickup" => Ok(VehicleType::Pickup),
            "motorcycle" => Ok(VehicleType::Motorcycle),
            "commercial_truck" => Ok(VehicleType::CommercialTruck),
            other => Err(validation_error(format!("unknown vehicle type '{}'", other))),
        }
    }
}

/// Vehicle principal - mapea a la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub vin: Option<String>,
    pub vehicle_type: VehicleType,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// Snapshot inmutable para incrustar en cotizaciones
    pub fn details(&self) -> VehicleDetails {
        VehicleDetails {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year,
            vin: self.vin.clone(),
            vehicle_type: self.vehicle_type,
        }
    }
}

/// Snapshot estructurado del vehículo cotizado
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleDetails {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub vin: Option<String>,
    pub vehicle_type: VehicleType,
}

/// Request para registrar un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterVehicleRequest {
    pub customer_id: Uuid,

    #[validate(length(min = 2, max = 100))]
    pub make: String,

    #[validate(length(min = 1, max = 100))]
    pub model: String,

    #[validate(range(min = 1900, max = 2030))]
    pub year: i32,

    #[validate(length(min = 11, max = 17))]
    pub vin: Option<String>,

    pub vehicle_type: VehicleType,
}
