//! Modelo de Route
//!
//! Una ruta es un par origen/destino con precio base y tiempo estimado.
//! El precio base se congela en la cotización al momento de crearla, de modo
//! que cambios posteriores a la ruta no alteran cotizaciones existentes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Route principal - mapea a la tabla routes
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Route {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub base_price: Decimal,
    pub estimated_days: i32,
    /// Indica si la ruta cruza una frontera aduanera
    pub requires_customs: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request para crear una ruta
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRouteRequest {
    #[validate(length(min = 2, max = 200))]
    pub origin: String,

    #[validate(length(min = 2, max = 200))]
    pub destination: String,

    pub base_price: Decimal,

    #[validate(range(min = 1, max = 365))]
    pub estimated_days: i32,

    pub requires_customs: Option<bool>,
}

/// Filtros para búsqueda de rutas
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteFilters {
    pub is_active: Option<bool>,
    pub search: Option<String>,
}
