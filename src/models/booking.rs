//! Modelo de Booking
//!
//! Reserva comprometida de transporte de un vehículo. El estado avanza de
//! forma monótona por el camino feliz pending → confirmed → processing →
//! in_transit → delivered (con `completed` como marcador posterior a la
//! entrega) o se cancela desde cualquier estado no terminal. El estado de
//! pago (paid/partial/unpaid) es una etiqueta derivada, nunca se almacena.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;
use validator::Validate;

use crate::models::quote::{ConvertQuoteRequest, Quote};
use crate::utils::errors::{
    conflict_error, invariant_error, validation_error, AppError, AppResult,
};

/// Estado de la reserva - mapea al ENUM booking_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Processing,
    InTransit,
    Delivered,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Processing => "processing",
            BookingStatus::InTransit => "in_transit",
            BookingStatus::Delivered => "delivered",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Un valor desconocido es un error de validación, no un Conflict
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "processing" => Ok(BookingStatus::Processing),
            "in_transit" => Ok(BookingStatus::InTransit),
            "delivered" => Ok(BookingStatus::Delivered),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(validation_error(format!(
                "unknown booking status '{}'",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Posición en el camino feliz; `cancelled` queda fuera
    fn path_index(&self) -> Option<u8> {
        match self {
            BookingStatus::Pending => Some(0),
            BookingStatus::Confirmed => Some(1),
            BookingStatus::Processing => Some(2),
            BookingStatus::InTransit => Some(3),
            BookingStatus::Delivered => Some(4),
            BookingStatus::Completed => Some(5),
            BookingStatus::Cancelled => None,
        }
    }
}

/// Valida una transición de estado de reserva.
///
/// Reglas: avance monótono por el camino feliz (saltarse etapas intermedias
/// cuenta como avance), `completed` solo desde `delivered`, `cancelled` desde
/// cualquier estado salvo `delivered`/`completed`. Todo lo demás es Conflict.
pub fn validate_booking_transition(from: BookingStatus, to: BookingStatus) -> AppResult<()> {
    if from.is_terminal() {
        return Err(conflict_error(format!(
            "booking is {} and cannot change status",
            from.as_str()
        )));
    }
    if from == to {
        return Err(conflict_error(format!(
            "booking is already {}",
            from.as_str()
        )));
    }
    match to {
        BookingStatus::Cancelled => {
            if from == BookingStatus::Delivered {
                Err(conflict_error("a delivered booking cannot be cancelled"))
            } else {
                Ok(())
            }
        }
        BookingStatus::Completed => {
            if from == BookingStatus::Delivered {
                Ok(())
            } else {
                Err(conflict_error(format!(
                    "booking must be delivered before completion, found {}",
                    from.as_str()
                )))
            }
        }
        _ => {
            let from_idx = from.path_index().unwrap_or(u8::MAX);
            let to_idx = to.path_index().unwrap_or(0);
            if to_idx > from_idx {
                Ok(())
            } else {
                Err(conflict_error(format!(
                    "booking cannot move backwards from {} to {}",
                    from.as_str(),
                    to.as_str()
                )))
            }
        }
    }
}

/// Etiqueta derivada del estado de pago de una reserva
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProgress {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProgress::Paid => "paid",
            PaymentProgress::Partial => "partial",
            PaymentProgress::Unpaid => "unpaid",
        }
    }
}

/// Deriva la etiqueta de pago para cualquier par (pagado, total).
///
/// paid si paid >= total > 0; partial si 0 < paid < total; unpaid en el
/// resto de los casos.
pub fn derive_payment_progress(paid_amount: Decimal, total_amount: Decimal) -> PaymentProgress {
    if total_amount > Decimal::ZERO && paid_amount >= total_amount {
        PaymentProgress::Paid
    } else if paid_amount > Decimal::ZERO && paid_amount < total_amount {
        PaymentProgress::Partial
    } else {
        PaymentProgress::Unpaid
    }
}

/// Valida que la entrega quede después de la recogida cuando ambas existen
pub fn validate_booking_dates(
    pickup_date: Option<DateTime<Utc>>,
    delivery_date: Option<DateTime<Utc>>,
) -> AppResult<()> {
    if let (Some(pickup), Some(delivery)) = (pickup_date, delivery_date) {
        if delivery <= pickup {
            return Err(invariant_error(format!(
                "delivery_date {} must be after pickup_date {}",
                delivery, pickup
            )));
        }
    }
    Ok(())
}

/// Booking principal - mapea a la tabla bookings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub customer_id: Uuid,
    pub route_id: Uuid,
    pub vehicle_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub pickup_date: Option<DateTime<Utc>>,
    /// Fecha de entrega programada; también es la referencia de atraso
    pub delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Etiqueta derivada, consistente con `paid_amount` vs `total_amount`
    pub fn payment_status(&self) -> PaymentProgress {
        derive_payment_progress(self.paid_amount, self.total_amount)
    }

    /// Atrasada: fecha de entrega programada en el pasado y aún sin entregar
    /// ni cancelar. Predicado derivado, no un estado almacenado.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.delivery_date {
            Some(delivery) => {
                delivery < now
                    && !matches!(
                        self.status,
                        BookingStatus::Delivered
                            | BookingStatus::Completed
                            | BookingStatus::Cancelled
                    )
            }
            None => false,
        }
    }

    /// Pendiente desde hace más del umbral configurado
    pub fn is_stale_pending(&self, now: DateTime<Utc>, threshold_hours: i64) -> bool {
        self.status == BookingStatus::Pending
            && now - self.created_at > Duration::hours(threshold_hours)
    }

    /// Aplica un delta al monto pagado preservando los invariantes
    /// `0 <= paid_amount <= total_amount`.
    pub fn apply_payment_delta(&mut self, delta: Decimal) -> AppResult<()> {
        let new_paid = self.paid_amount + delta;
        if new_paid < Decimal::ZERO {
            return Err(invariant_error(format!(
                "paid_amount of booking {} would go negative ({})",
                self.booking_number, new_paid
            )));
        }
        if new_paid > self.total_amount {
            return Err(invariant_error(format!(
                "paid_amount {} would exceed total_amount {} on booking {}",
                new_paid, self.total_amount, self.booking_number
            )));
        }
        self.paid_amount = new_paid;
        Ok(())
    }

    /// Construye la reserva resultante de convertir una cotización aprobada.
    ///
    /// El total se toma del snapshot congelado de la cotización, no de la
    /// ruta viva.
    pub fn from_quote(
        quote: &Quote,
        request: &ConvertQuoteRequest,
        booking_number: String,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        validate_booking_dates(request.pickup_date, request.delivery_date)?;
        Ok(Booking {
            id: Uuid::new_v4(),
            booking_number,
            customer_id: quote.customer_id,
            route_id: quote.route_id,
            vehicle_id: request.vehicle_id,
            quote_id: Some(quote.id),
            status: BookingStatus::Pending,
            total_amount: quote.total_amount,
            paid_amount: Decimal::ZERO,
            recipient_name: request.recipient_name.clone(),
            recipient_phone: request.recipient_phone.clone(),
            pickup_date: request.pickup_date,
            delivery_date: request.delivery_date,
            created_at: now,
        })
    }
}

/// Request para crear una reserva directa, sin cotización previa
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub route_id: Uuid,
    pub vehicle_id: Uuid,

    pub total_amount: Decimal,

    #[validate(length(min = 2, max = 200))]
    pub recipient_name: String,

    #[validate(length(min = 5, max = 30))]
    pub recipient_phone: String,

    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
}

/// Request para el único cambio de estado disparado externamente
#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    /// Valor textual; se valida contra el conjunto cerrado de estados
    pub status: String,
    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
}

/// Filtros para búsqueda de reservas
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilters {
    pub status: Option<BookingStatus>,
    pub customer_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

/// Motivo por el que una reserva aparece en el reporte de atención
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttentionReason {
    /// Pendiente desde hace más del umbral configurado
    StalePending,
    /// Fecha de entrega programada ya pasó
    Overdue,
    /// Pago pendiente más antiguo que el umbral configurado
    AgedPendingPayment,
    /// Documentos requeridos sin aprobar
    PendingDocuments,
    /// Documentos aprobados próximos a expirar
    ExpiringDocuments,
}

/// Entrada del reporte "requiere atención"; composición de lecturas, nunca
/// una bandera persistida
#[derive(Debug, Clone, Serialize)]
pub struct AttentionEntry {
    pub booking_id: Uuid,
    pub booking_number: String,
    pub status: BookingStatus,
    pub reasons: Vec<AttentionReason>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_booking(total: Decimal, paid: Decimal) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            booking_number: "BK-TEST0001".to_string(),
            customer_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            quote_id: None,
            status: BookingStatus::Pending,
            total_amount: total,
            paid_amount: paid,
            recipient_name: "Ama Mensah".to_string(),
            recipient_phone: "+233201234567".to_string(),
            pickup_date: None,
            delivery_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        use BookingStatus::*;
        assert!(validate_booking_transition(Pending, Confirmed).is_ok());
        assert!(validate_booking_transition(Confirmed, Processing).is_ok());
        assert!(validate_booking_transition(Processing, InTransit).is_ok());
        assert!(validate_booking_transition(InTransit, Delivered).is_ok());
        assert!(validate_booking_transition(Delivered, Completed).is_ok());
    }

    #[test]
    fn test_forward_skips_allowed() {
        use BookingStatus::*;
        assert!(validate_booking_transition(Pending, Processing).is_ok());
        assert!(validate_booking_transition(Confirmed, InTransit).is_ok());
    }

    #[test]
    fn test_backwards_and_repeat_rejected() {
        use BookingStatus::*;
        assert!(validate_booking_transition(Confirmed, Pending).is_err());
        assert!(validate_booking_transition(Delivered, InTransit).is_err());
        assert!(validate_booking_transition(Processing, Processing).is_err());
    }

    #[test]
    fn test_cancel_rules() {
        use BookingStatus::*;
        assert!(validate_booking_transition(Pending, Cancelled).is_ok());
        assert!(validate_booking_transition(InTransit, Cancelled).is_ok());
        assert!(validate_booking_transition(Delivered, Cancelled).is_err());
        assert!(validate_booking_transition(Cancelled, Confirmed).is_err());
        assert!(validate_booking_transition(Completed, Cancelled).is_err());
    }

    #[test]
    fn test_completed_only_after_delivery() {
        use BookingStatus::*;
        assert!(validate_booking_transition(InTransit, Completed).is_err());
        assert!(validate_booking_transition(Delivered, Completed).is_ok());
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let err = BookingStatus::parse("refunded").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_payment_progress_scenario_b() {
        // total 2000, pagos completados de 800 y 1200
        let mut booking = sample_booking(dec!(2000), dec!(0));
        booking.apply_payment_delta(dec!(800)).unwrap();
        booking.apply_payment_delta(dec!(1200)).unwrap();
        assert_eq!(booking.paid_amount, dec!(2000));
        assert_eq!(booking.payment_status(), PaymentProgress::Paid);
    }

    #[test]
    fn test_payment_progress_scenario_c() {
        // total 2000, un pago de 500 -> partial; su reembolso vuelve a 0
        let mut booking = sample_booking(dec!(2000), dec!(0));
        booking.apply_payment_delta(dec!(500)).unwrap();
        assert_eq!(booking.payment_status(), PaymentProgress::Partial);
        booking.apply_payment_delta(dec!(-500)).unwrap();
        assert_eq!(booking.paid_amount, dec!(0));
        assert_eq!(booking.payment_status(), PaymentProgress::Unpaid);
    }

    #[test]
    fn test_payment_progress_consistency() {
        let cases = [
            (dec!(0), dec!(0), PaymentProgress::Unpaid),
            (dec!(0), dec!(100), PaymentProgress::Unpaid),
            (dec!(50), dec!(100), PaymentProgress::Partial),
            (dec!(100), dec!(100), PaymentProgress::Paid),
            (dec!(0.01), dec!(2000), PaymentProgress::Partial),
        ];
        for (paid, total, expected) in cases {
            assert_eq!(derive_payment_progress(paid, total), expected);
        }
    }

    #[test]
    fn test_negative_paid_amount_rejected() {
        let mut booking = sample_booking(dec!(1000), dec!(200));
        let err = booking.apply_payment_delta(dec!(-300)).unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation(_)));
        // el estado no cambia en el camino de error
        assert_eq!(booking.paid_amount, dec!(200));
    }

    #[test]
    fn test_overpayment_rejected() {
        let mut booking = sample_booking(dec!(1000), dec!(800));
        let err = booking.apply_payment_delta(dec!(300)).unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation(_)));
    }

    #[test]
    fn test_date_ordering_invariant() {
        let now = Utc::now();
        assert!(validate_booking_dates(Some(now), Some(now + Duration::days(3))).is_ok());
        assert!(validate_booking_dates(Some(now), Some(now)).is_err());
        assert!(validate_booking_dates(Some(now), Some(now - Duration::days(1))).is_err());
        assert!(validate_booking_dates(None, Some(now)).is_ok());
        assert!(validate_booking_dates(Some(now), None).is_ok());
    }

    #[test]
    fn test_overdue_is_derived() {
        let now = Utc::now();
        let mut booking = sample_booking(dec!(1000), dec!(0));
        booking.delivery_date = Some(now - Duration::days(2));
        booking.status = BookingStatus::InTransit;
        assert!(booking.is_overdue(now));

        booking.status = BookingStatus::Delivered;
        assert!(!booking.is_overdue(now));

        booking.status = BookingStatus::Cancelled;
        assert!(!booking.is_overdue(now));
    }

    #[test]
    fn test_stale_pending() {
        let now = Utc::now();
        let mut booking = sample_booking(dec!(1000), dec!(0));
        booking.created_at = now - Duration::hours(96);
        assert!(booking.is_stale_pending(now, 72));

        booking.status = BookingStatus::Confirmed;
        assert!(!booking.is_stale_pending(now, 72));
    }
}
