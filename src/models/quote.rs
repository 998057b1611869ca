//! Modelo de Quote
//!
//! Cotización con ventana de validez. El total siempre se recalcula como
//! `base_price + Σ additional_fees`; nunca se edita a mano. La expiración se
//! evalúa de forma perezosa en cada lectura: un `status` almacenado como
//! `pending` no es confiable sin consultar `valid_until`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;
use validator::Validate;

use crate::models::vehicle::VehicleDetails;
use crate::utils::errors::{conflict_error, validation_error, AppError, AppResult};

/// Línea de cargo adicional sobre el precio base de la ruta
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeLine {
    pub name: String,
    pub amount: Decimal,
}

/// Motor de precios: total = precio base + suma de cargos.
///
/// Función pura, sin redondeo más allá de la precisión decimal de los
/// propios montos.
pub fn quote_total(base_price: Decimal, fees: &[FeeLine]) -> Decimal {
    fees.iter().fold(base_price, |acc, fee| acc + fee.amount)
}

/// Estado de la cotización - mapea al ENUM quote_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "quote_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Converted,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Converted => "converted",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(QuoteStatus::Pending),
            "approved" => Ok(QuoteStatus::Approved),
            "rejected" => Ok(QuoteStatus::Rejected),
            "expired" => Ok(QuoteStatus::Expired),
            "converted" => Ok(QuoteStatus::Converted),
            other => Err(validation_error(format!("unknown quote status '{}'", other))),
        }
    }

    /// `converted`, `rejected` y `expired` son terminales
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteStatus::Converted | QuoteStatus::Rejected | QuoteStatus::Expired
        )
    }
}

/// Quote principal - mapea a la tabla quotes
///
/// `vehicle_details` y `base_price` son snapshots tomados al crearla; la
/// ruta puede cambiar después sin afectar cotizaciones emitidas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub route_id: Uuid,
    pub vehicle_details: VehicleDetails,
    pub base_price: Decimal,
    pub additional_fees: Vec<FeeLine>,
    pub total_amount: Decimal,
    pub status: QuoteStatus,
    pub valid_until: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    /// Restablece el invariante `total_amount = base_price + Σ fees`
    pub fn recompute_total(&mut self) {
        self.total_amount = quote_total(self.base_price, &self.additional_fees);
    }

    /// Estado efectivo evaluado a la hora dada.
    ///
    /// Una cotización no terminal cuyo `valid_until` quedó atrás se reporta
    /// como expirada aunque el estado almacenado diga otra cosa.
    pub fn effective_status(&self, now: DateTime<Utc>) -> QuoteStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if now > self.valid_until {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == QuoteStatus::Expired
    }

    /// Solo una cotización efectivamente pendiente puede aprobarse o
    /// rechazarse.
    pub fn ensure_reviewable(&self, now: DateTime<Utc>) -> AppResult<()> {
        match self.effective_status(now) {
            QuoteStatus::Pending => Ok(()),
            QuoteStatus::Expired => Err(conflict_error(format!(
                "quote {} expired on {} and can no longer be reviewed",
                self.id, self.valid_until
            ))),
            other => Err(conflict_error(format!(
                "quote {} is already {}",
                self.id,
                other.as_str()
            ))),
        }
    }

    /// Solo una cotización efectivamente aprobada y vigente puede
    /// convertirse, y solo una vez.
    pub fn ensure_convertible(&self, now: DateTime<Utc>) -> AppResult<()> {
        match self.effective_status(now) {
            QuoteStatus::Approved => Ok(()),
            QuoteStatus::Converted => Err(conflict_error(format!(
                "quote {} was already converted into a booking",
                self.id
            ))),
            QuoteStatus::Expired => Err(conflict_error(format!(
                "quote {} expired on {} and cannot be converted",
                self.id, self.valid_until
            ))),
            other => Err(conflict_error(format!(
                "quote {} is {} and cannot be converted",
                self.id,
                other.as_str()
            ))),
        }
    }
}

/// Request para emitir una cotización
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    pub customer_id: Uuid,
    pub route_id: Uuid,
    pub vehicle_details: VehicleDetails,
    pub additional_fees: Vec<FeeLine>,
    /// Ventana explícita; si falta se usa la configurada por defecto
    pub valid_until: Option<DateTime<Utc>>,
}

/// Los cargos deben tener nombre y monto no negativo
pub fn validate_fee_lines(fees: &[FeeLine]) -> AppResult<()> {
    for fee in fees {
        if fee.name.trim().is_empty() {
            return Err(validation_error("fee line requires a name"));
        }
        if fee.amount < Decimal::ZERO {
            return Err(validation_error(format!(
                "fee '{}' has a negative amount",
                fee.name
            )));
        }
    }
    Ok(())
}

impl CreateQuoteRequest {
    pub fn validate_fees(&self) -> AppResult<()> {
        validate_fee_lines(&self.additional_fees)
    }
}

/// Request para convertir una cotización aprobada en reserva
#[derive(Debug, Deserialize, Validate)]
pub struct ConvertQuoteRequest {
    pub vehicle_id: Uuid,

    #[validate(length(min = 2, max = 200))]
    pub recipient_name: String,

    #[validate(length(min = 5, max = 30))]
    pub recipient_phone: String,

    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
}

/// Filtros para búsqueda de cotizaciones
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteFilters {
    pub status: Option<QuoteStatus>,
    pub customer_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle::VehicleType;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample_details() -> VehicleDetails {
        VehicleDetails {
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2019,
            vin: None,
            vehicle_type: VehicleType::Sedan,
        }
    }

    fn sample_quote(status: QuoteStatus, valid_until: DateTime<Utc>) -> Quote {
        let fees = vec![
            FeeLine {
                name: "Customs".to_string(),
                amount: dec!(800),
            },
            FeeLine {
                name: "VAT".to_string(),
                amount: dec!(594),
            },
            FeeLine {
                name: "Levies".to_string(),
                amount: dec!(350),
            },
        ];
        let base = dec!(2500);
        Quote {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            vehicle_details: sample_details(),
            base_price: base,
            total_amount: quote_total(base, &fees),
            additional_fees: fees,
            status,
            valid_until,
            reviewed_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_quote_total_scenario_a() {
        // base 2500 + Customs 800 + VAT 594 + Levies 350 = 4244
        let quote = sample_quote(QuoteStatus::Pending, Utc::now() + Duration::days(14));
        assert_eq!(quote.total_amount, dec!(4244));
    }

    #[test]
    fn test_quote_total_is_sum_of_parts() {
        let fees = vec![
            FeeLine {
                name: "Handling".to_string(),
                amount: dec!(120.50),
            },
            FeeLine {
                name: "Insurance".to_string(),
                amount: dec!(75.25),
            },
        ];
        assert_eq!(quote_total(dec!(1000), &fees), dec!(1195.75));
        assert_eq!(quote_total(dec!(1000), &[]), dec!(1000));
    }

    #[test]
    fn test_recompute_total_restores_invariant() {
        let mut quote = sample_quote(QuoteStatus::Pending, Utc::now() + Duration::days(14));
        quote.additional_fees.push(FeeLine {
            name: "Storage".to_string(),
            amount: dec!(100),
        });
        quote.recompute_total();
        assert_eq!(quote.total_amount, dec!(4344));
    }

    #[test]
    fn test_stored_pending_reports_expired_scenario_d() {
        let yesterday = Utc::now() - Duration::days(1);
        let quote = sample_quote(QuoteStatus::Pending, yesterday);

        assert_eq!(quote.status, QuoteStatus::Pending);
        assert_eq!(quote.effective_status(Utc::now()), QuoteStatus::Expired);
        assert!(quote.ensure_convertible(Utc::now()).is_err());
        assert!(quote.ensure_reviewable(Utc::now()).is_err());
    }

    #[test]
    fn test_terminal_status_not_overridden_by_expiry() {
        let yesterday = Utc::now() - Duration::days(1);
        let quote = sample_quote(QuoteStatus::Converted, yesterday);
        assert_eq!(quote.effective_status(Utc::now()), QuoteStatus::Converted);
    }

    #[test]
    fn test_convert_requires_approved() {
        let now = Utc::now();
        let valid = now + Duration::days(7);

        assert!(sample_quote(QuoteStatus::Approved, valid)
            .ensure_convertible(now)
            .is_ok());
        assert!(sample_quote(QuoteStatus::Pending, valid)
            .ensure_convertible(now)
            .is_err());
        assert!(sample_quote(QuoteStatus::Rejected, valid)
            .ensure_convertible(now)
            .is_err());
    }

    #[test]
    fn test_second_conversion_is_conflict() {
        let quote = sample_quote(QuoteStatus::Converted, Utc::now() + Duration::days(7));
        let err = quote.ensure_convertible(Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_fee_validation() {
        let request = CreateQuoteRequest {
            customer_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            vehicle_details: sample_details(),
            additional_fees: vec![FeeLine {
                name: "  ".to_string(),
                amount: dec!(10),
            }],
            valid_until: None,
        };
        assert!(request.validate_fees().is_err());
    }

    #[test]
    fn test_unknown_status_string_rejected() {
        assert!(QuoteStatus::parse("archived").is_err());
        assert_eq!(QuoteStatus::parse("approved").unwrap(), QuoteStatus::Approved);
    }
}
