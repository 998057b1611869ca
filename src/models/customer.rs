//! Modelo de Customer
//!
//! Este módulo contiene el struct Customer y la clasificación de nivel
//! derivada del gasto acumulado. Los totales (`total_bookings`,
//! `total_spent`) no se almacenan: se recalculan bajo demanda a partir de
//! las reservas y los pagos.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::{validation_error, AppError};

/// Estado del cliente - mapea al ENUM customer_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "customer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Suspended,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
            CustomerStatus::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "active" => Ok(CustomerStatus::Active),
            "inactive" => Ok(CustomerStatus::Inactive),
            "suspended" => Ok(CustomerStatus::Suspended),
            other => Err(validation_error(format!(
                "unknown customer status '{}'",
                other
            ))),
        }
    }
}

/// Nivel de lealtad derivado del gasto acumulado. Nunca se almacena.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl CustomerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerTier::Bronze => "bronze",
            CustomerTier::Silver => "silver",
            CustomerTier::Gold => "gold",
            CustomerTier::Platinum => "platinum",
        }
    }

    /// Clasifica un gasto acumulado en su nivel.
    ///
    /// Umbrales: platinum >= 50000, gold >= 25000, silver >= 10000.
    pub fn for_spend(total_spent: Decimal) -> Self {
        if total_spent >= Decimal::from(50_000) {
            CustomerTier::Platinum
        } else if total_spent >= Decimal::from(25_000) {
            CustomerTier::Gold
        } else if total_spent >= Decimal::from(10_000) {
            CustomerTier::Silver
        } else {
            CustomerTier::Bronze
        }
    }
}

/// Customer principal - mapea a la tabla customers
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

/// Request para registrar un cliente
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 2, max = 200))]
    pub full_name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 5, max = 30))]
    pub phone: Option<String>,

    #[validate(length(min = 2, max = 100))]
    pub country: Option<String>,
}

/// Filtros para búsqueda de clientes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilters {
    pub status: Option<CustomerStatus>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Perfil de cliente con los totales recalculados y el nivel derivado
#[derive(Debug, Clone, Serialize)]
pub struct CustomerProfile {
    pub customer: Customer,
    pub total_bookings: i64,
    pub total_spent: Decimal,
    pub tier: CustomerTier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(CustomerTier::for_spend(dec!(0)), CustomerTier::Bronze);
        assert_eq!(CustomerTier::for_spend(dec!(9999.99)), CustomerTier::Bronze);
        assert_eq!(CustomerTier::for_spend(dec!(10000)), CustomerTier::Silver);
        assert_eq!(CustomerTier::for_spend(dec!(24999.99)), CustomerTier::Silver);
        assert_eq!(CustomerTier::for_spend(dec!(25000)), CustomerTier::Gold);
        assert_eq!(CustomerTier::for_spend(dec!(49999.99)), CustomerTier::Gold);
        assert_eq!(CustomerTier::for_spend(dec!(50000)), CustomerTier::Platinum);
        assert_eq!(CustomerTier::for_spend(dec!(125000)), CustomerTier::Platinum);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            CustomerStatus::parse("active").unwrap(),
            CustomerStatus::Active
        );
        assert!(CustomerStatus::parse("deleted").is_err());
    }
}
