//! Modelo de Shipment
//!
//! Seguimiento del tránsito, 1:1 con su reserva. El estado avanza
//! preparing → in_transit → customs → delivered; `delayed` funciona como
//! bandera re-entrable: se llega a él desde cualquier estado no entregado y
//! se vuelve al camino normal cuando el tránsito se retoma.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::{conflict_error, validation_error, AppError, AppResult};

/// Estado del envío - mapea al ENUM shipment_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "shipment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    Preparing,
    InTransit,
    Customs,
    Delivered,
    Delayed,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Preparing => "preparing",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Customs => "customs",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Delayed => "delayed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "preparing" => Ok(ShipmentStatus::Preparing),
            "in_transit" => Ok(ShipmentStatus::InTransit),
            "customs" => Ok(ShipmentStatus::Customs),
            "delivered" => Ok(ShipmentStatus::Delivered),
            "delayed" => Ok(ShipmentStatus::Delayed),
            other => Err(validation_error(format!(
                "unknown shipment status '{}'",
                other
            ))),
        }
    }

    fn forward_index(&self) -> Option<u8> {
        match self {
            ShipmentStatus::Preparing => Some(0),
            ShipmentStatus::InTransit => Some(1),
            ShipmentStatus::Customs => Some(2),
            ShipmentStatus::Delivered => Some(3),
            ShipmentStatus::Delayed => None,
        }
    }
}

/// Valida una transición de estado de envío.
///
/// `delivered` es terminal. `delayed` se alcanza desde cualquier estado no
/// entregado y desde él se puede retomar cualquier etapa del camino normal.
pub fn validate_shipment_transition(from: ShipmentStatus, to: ShipmentStatus) -> AppResult<()> {
    if from == ShipmentStatus::Delivered {
        return Err(conflict_error("shipment was already delivered"));
    }
    if from == to {
        return Err(conflict_error(format!(
            "shipment is already {}",
            from.as_str()
        )));
    }
    match (from, to) {
        (_, ShipmentStatus::Delayed) => Ok(()),
        (ShipmentStatus::Delayed, _) => Ok(()),
        (from, to) => {
            let from_idx = from.forward_index().unwrap_or(u8::MAX);
            let to_idx = to.forward_index().unwrap_or(0);
            if to_idx > from_idx {
                Ok(())
            } else {
                Err(conflict_error(format!(
                    "shipment cannot move backwards from {} to {}",
                    from.as_str(),
                    to.as_str()
                )))
            }
        }
    }
}

/// Evento del historial de ubicaciones, solo se agrega, nunca se edita
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationEvent {
    pub location: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Shipment principal - mapea a la tabla shipments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub carrier_name: String,
    pub vessel_name: Option<String>,
    pub status: ShipmentStatus,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub location_history: Vec<LocationEvent>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    /// Retraso detectado: estimación vencida y aún sin entregar
    pub fn is_delayed(&self, now: DateTime<Utc>) -> bool {
        match self.estimated_arrival {
            Some(estimated) => estimated < now && self.status != ShipmentStatus::Delivered,
            None => false,
        }
    }

    /// A tiempo si llegó en o antes de lo estimado; None si falta alguna
    /// de las dos fechas.
    pub fn on_time(&self) -> Option<bool> {
        match (self.actual_arrival, self.estimated_arrival) {
            (Some(actual), Some(estimated)) => Some(actual <= estimated),
            _ => None,
        }
    }

    /// Días de retraso de una entrega tardía; 0 si llegó a tiempo
    pub fn delay_days(&self) -> Option<i64> {
        match (self.actual_arrival, self.estimated_arrival) {
            (Some(actual), Some(estimated)) => {
                Some((actual - estimated).num_days().max(0))
            }
            _ => None,
        }
    }

    /// Agrega una entrada al historial de ubicaciones
    pub fn record_location(&mut self, location: String, note: Option<String>, now: DateTime<Utc>) {
        self.location_history.push(LocationEvent {
            location,
            note,
            recorded_at: now,
        });
    }

    pub fn last_known_location(&self) -> Option<&LocationEvent> {
        self.location_history.last()
    }
}

/// Request para crear el envío de una reserva confirmada
#[derive(Debug, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    pub booking_id: Uuid,

    #[validate(length(min = 2, max = 200))]
    pub carrier_name: String,

    #[validate(length(min = 2, max = 200))]
    pub vessel_name: Option<String>,

    pub estimated_arrival: Option<DateTime<Utc>>,
}

/// Filtros para búsqueda de envíos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentFilters {
    pub status: Option<ShipmentStatus>,
    pub booking_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}
