//! Puerto de notificaciones
//!
//! El núcleo solo emite eventos; la entrega real (SMTP, plantillas, SMS)
//! es un colaborador externo. Aquí viven el contrato `Notifier` y los dos
//! adaptadores que incluye el crate: uno que registra por tracing y uno
//! nulo para pruebas.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::utils::errors::AppResult;

/// Eventos que el ciclo de vida publica hacia afuera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Cotización aprobada; el payload incluye el código de acceso de un
    /// solo uso para el portal del cliente
    QuoteApproved,
    /// La reserva cambió de estado
    BookingStatusChanged,
    /// Un pago quedó confirmado
    PaymentCompleted,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::QuoteApproved => "quote.approved",
            NotificationEvent::BookingStatusChanged => "booking.status_changed",
            NotificationEvent::PaymentCompleted => "payment.completed",
        }
    }
}

/// Contrato del colaborador de notificaciones
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        event: NotificationEvent,
        entity_id: Uuid,
        payload: Value,
    ) -> AppResult<()>;
}

/// Adaptador que registra cada evento en el log estructurado
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        event: NotificationEvent,
        entity_id: Uuid,
        payload: Value,
    ) -> AppResult<()> {
        info!(
            event = event.as_str(),
            entity_id = %entity_id,
            payload = %payload,
            "notification emitted"
        );
        Ok(())
    }
}

/// Adaptador nulo, para pruebas y entornos sin entrega configurada
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _event: NotificationEvent,
        _entity_id: Uuid,
        _payload: Value,
    ) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(NotificationEvent::QuoteApproved.as_str(), "quote.approved");
        assert_eq!(
            NotificationEvent::BookingStatusChanged.as_str(),
            "booking.status_changed"
        );
        assert_eq!(
            NotificationEvent::PaymentCompleted.as_str(),
            "payment.completed"
        );
    }

    #[tokio::test]
    async fn test_noop_accepts_everything() {
        let notifier = NoopNotifier;
        let result = notifier
            .notify(
                NotificationEvent::PaymentCompleted,
                Uuid::new_v4(),
                serde_json::json!({ "amount": "500" }),
            )
            .await;
        assert!(result.is_ok());
    }
}
