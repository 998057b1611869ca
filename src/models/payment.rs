//! Modelo de Payment
//!
//! Los pagos son un flujo de eventos adjunto a la reserva: nunca se borran,
//! solo cambian de estado. Únicamente los pagos completados cuentan para el
//! `paid_amount` de la reserva y para el ingreso reportado; un reembolso lo
//! descuenta y queda registrado aparte como ingreso reembolsado.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::{conflict_error, validation_error, AppError, AppResult};

/// Estado del pago - mapea al ENUM payment_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(validation_error(format!(
                "unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// Método de pago - mapea al ENUM payment_method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    MobileMoney,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Cash => "cash",
        }
    }
}

/// Payment principal - mapea a la tabla payments
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub reference: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Momento en que el pago quedó completado
    pub payment_date: Option<DateTime<Utc>>,
    /// Momento del reembolso, si lo hubo
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Valida la transición de estado del pago.
    ///
    /// pending -> {completed, failed, cancelled}; completed -> refunded.
    /// Todo lo demás es Conflict; en particular, completar dos veces el
    /// mismo pago.
    pub fn ensure_transition(&self, to: PaymentStatus) -> AppResult<()> {
        use PaymentStatus::*;
        match (self.status, to) {
            (Pending, Completed) | (Pending, Failed) | (Pending, Cancelled) => Ok(()),
            (Completed, Refunded) => Ok(()),
            (Completed, Completed) => Err(conflict_error(format!(
                "payment {} was already completed",
                self.reference
            ))),
            (from, to) => Err(conflict_error(format!(
                "payment {} cannot move from {} to {}",
                self.reference,
                from.as_str(),
                to.as_str()
            ))),
        }
    }

    /// Delta que la transición aplica al `paid_amount` de la reserva
    pub fn settlement_delta(&self, to: PaymentStatus) -> Decimal {
        match to {
            PaymentStatus::Completed => self.amount,
            PaymentStatus::Refunded => -self.amount,
            _ => Decimal::ZERO,
        }
    }

    /// Pendiente desde hace más del umbral configurado (30 días por defecto)
    pub fn is_overdue(&self, now: DateTime<Utc>, threshold_days: i64) -> bool {
        self.status == PaymentStatus::Pending
            && now - self.created_at > Duration::days(threshold_days)
    }

    /// Horas entre el registro y la confirmación del pago
    pub fn processing_hours(&self) -> Option<f64> {
        self.payment_date
            .map(|completed| (completed - self.created_at).num_seconds() as f64 / 3600.0)
    }
}

/// Request para registrar un pago entrante
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub booking_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,

    #[validate(length(min = 3, max = 100))]
    pub reference: Option<String>,
}

impl RecordPaymentRequest {
    pub fn validate_amount(&self) -> AppResult<()> {
        if self.amount <= Decimal::ZERO {
            return Err(validation_error("payment amount must be positive"));
        }
        Ok(())
    }
}

/// Filtros para búsqueda de pagos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilters {
    pub status: Option<PaymentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub booking_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}
