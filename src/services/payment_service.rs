//! Servicio de conciliación de pagos
//!
//! Los pagos se registran pendientes y se liquidan con la operación
//! compuesta del puerto de almacenamiento: la transición del pago y el
//! delta sobre el `paid_amount` de la reserva ocurren en la misma unidad
//! atómica, de modo que un pago no puede contarse dos veces ni dejar la
//! reserva a medio actualizar.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::EnvironmentConfig;
use crate::models::booking::Booking;
use crate::models::payment::{
    Payment, PaymentFilters, PaymentStatus, RecordPaymentRequest,
};
use crate::notifications::{NotificationEvent, Notifier};
use crate::storage::{BookingStore, Page, Pagination, PaymentStore, Store};
use crate::utils::errors::{not_found_error, AppResult};

/// Referencia legible de pago derivada de su id
fn allocate_payment_reference(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("PAY-{}", hex[..8].to_uppercase())
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: EnvironmentConfig,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Registra un pago entrante en estado pendiente
    pub async fn record_payment(&self, request: RecordPaymentRequest) -> AppResult<Payment> {
        request.validate()?;
        request.validate_amount()?;

        let booking = self
            .store
            .find_booking(request.booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", request.booking_id))?;

        let id = Uuid::new_v4();
        let payment = Payment {
            id,
            booking_id: booking.id,
            customer_id: booking.customer_id,
            reference: request
                .reference
                .unwrap_or_else(|| allocate_payment_reference(id)),
            amount: request.amount,
            status: PaymentStatus::Pending,
            payment_method: request.payment_method,
            payment_date: None,
            refunded_at: None,
            created_at: Utc::now(),
        };

        let payment = self.store.insert_payment(payment).await?;
        info!(
            payment_id = %payment.id,
            reference = %payment.reference,
            amount = %payment.amount,
            "payment recorded"
        );
        Ok(payment)
    }

    pub async fn get_payment(&self, id: Uuid) -> AppResult<Payment> {
        self.store
            .find_payment(id)
            .await?
            .ok_or_else(|| not_found_error("Payment", id))
    }

    pub async fn list_payments(
        &self,
        filters: &PaymentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Payment>> {
        self.store.list_payments(filters, page).await
    }

    /// Confirma un pago pendiente y acredita su monto a la reserva.
    ///
    /// Completar dos veces el mismo pago falla con Conflict dentro de la
    /// unidad atómica; un monto que excedería el total de la reserva se
    /// rechaza antes de escribir.
    pub async fn complete_payment(&self, id: Uuid) -> AppResult<(Payment, Booking)> {
        let now = Utc::now();
        let (payment, booking) = self
            .store
            .settle_payment(id, PaymentStatus::Completed, now)
            .await?;

        self.notifier
            .notify(
                NotificationEvent::PaymentCompleted,
                payment.id,
                json!({
                    "booking_number": booking.booking_number,
                    "reference": payment.reference,
                    "amount": payment.amount,
                    "paid_amount": booking.paid_amount,
                    "payment_status": booking.payment_status().as_str(),
                }),
            )
            .await?;

        info!(
            payment_id = %payment.id,
            booking_id = %booking.id,
            paid_amount = %booking.paid_amount,
            "payment completed"
        );
        Ok((payment, booking))
    }

    /// Reembolsa un pago completado descontando su monto de la reserva.
    ///
    /// El ingreso reembolsado queda registrado aparte; el neto de un reporte
    /// puede quedar negativo y se informa tal cual.
    pub async fn refund_payment(&self, id: Uuid) -> AppResult<(Payment, Booking)> {
        let now = Utc::now();
        let (payment, booking) = self
            .store
            .settle_payment(id, PaymentStatus::Refunded, now)
            .await?;
        warn!(
            payment_id = %payment.id,
            booking_id = %booking.id,
            amount = %payment.amount,
            "payment refunded"
        );
        Ok((payment, booking))
    }

    /// Marca un pago pendiente como fallido
    pub async fn fail_payment(&self, id: Uuid) -> AppResult<Payment> {
        let (payment, _) = self
            .store
            .settle_payment(id, PaymentStatus::Failed, Utc::now())
            .await?;
        Ok(payment)
    }

    /// Cancela un pago pendiente
    pub async fn cancel_payment(&self, id: Uuid) -> AppResult<Payment> {
        let (payment, _) = self
            .store
            .settle_payment(id, PaymentStatus::Cancelled, Utc::now())
            .await?;
        Ok(payment)
    }

    /// Pagos pendientes más viejos que el umbral configurado
    pub async fn overdue_payments(&self) -> AppResult<Vec<Payment>> {
        let now = Utc::now();
        let pending = self
            .store
            .payments_by_status(PaymentStatus::Pending)
            .await?;
        Ok(pending
            .into_iter()
            .filter(|p| p.is_overdue(now, self.config.overdue_payment_days))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingStatus, PaymentProgress};
    use crate::models::customer::{Customer, CustomerStatus};
    use crate::models::payment::PaymentMethod;
    use crate::notifications::NoopNotifier;
    use crate::storage::memory::MemoryStore;
    use crate::storage::CustomerStore;
    use crate::utils::errors::AppError;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    async fn seed_booking(store: &MemoryStore, total: Decimal) -> Booking {
        let customer = store
            .insert_customer(Customer {
                id: Uuid::new_v4(),
                full_name: "Kofi Adjei".to_string(),
                email: "kofi@example.com".to_string(),
                phone: None,
                country: None,
                status: CustomerStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_booking(Booking {
                id: Uuid::new_v4(),
                booking_number: "BK-PAY00001".to_string(),
                customer_id: customer.id,
                route_id: Uuid::new_v4(),
                vehicle_id: Uuid::new_v4(),
                quote_id: None,
                status: BookingStatus::Confirmed,
                total_amount: total,
                paid_amount: dec!(0),
                recipient_name: "Ama Mensah".to_string(),
                recipient_phone: "+233201234567".to_string(),
                pickup_date: None,
                delivery_date: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    fn service(store: Arc<MemoryStore>) -> PaymentService {
        PaymentService::new(store, Arc::new(NoopNotifier), EnvironmentConfig::default())
    }

    fn payment_request(booking_id: Uuid, amount: Decimal) -> RecordPaymentRequest {
        RecordPaymentRequest {
            booking_id,
            amount,
            payment_method: PaymentMethod::BankTransfer,
            reference: None,
        }
    }

    #[tokio::test]
    async fn test_two_completions_reach_paid() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store);

        let first = svc
            .record_payment(payment_request(booking.id, dec!(800)))
            .await
            .unwrap();
        let second = svc
            .record_payment(payment_request(booking.id, dec!(1200)))
            .await
            .unwrap();
        assert!(first.reference.starts_with("PAY-"));

        let (_, booking) = svc.complete_payment(first.id).await.unwrap();
        assert_eq!(booking.paid_amount, dec!(800));
        assert_eq!(booking.payment_status(), PaymentProgress::Partial);

        let (_, booking) = svc.complete_payment(second.id).await.unwrap();
        assert_eq!(booking.paid_amount, dec!(2000));
        assert_eq!(booking.payment_status(), PaymentProgress::Paid);
    }

    #[tokio::test]
    async fn test_double_completion_is_conflict() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store.clone());

        let payment = svc
            .record_payment(payment_request(booking.id, dec!(500)))
            .await
            .unwrap();
        svc.complete_payment(payment.id).await.unwrap();

        let err = svc.complete_payment(payment.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // el monto no se acreditó dos veces
        let booking = store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.paid_amount, dec!(500));
    }

    #[tokio::test]
    async fn test_refund_returns_amount() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store);

        let payment = svc
            .record_payment(payment_request(booking.id, dec!(500)))
            .await
            .unwrap();
        let (_, booking_after) = svc.complete_payment(payment.id).await.unwrap();
        assert_eq!(booking_after.payment_status(), PaymentProgress::Partial);

        let (refunded, booking_after) = svc.refund_payment(payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(refunded.refunded_at.is_some());
        assert_eq!(booking_after.paid_amount, dec!(0));
        assert_eq!(booking_after.payment_status(), PaymentProgress::Unpaid);
    }

    #[tokio::test]
    async fn test_refund_requires_completed() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store);

        let payment = svc
            .record_payment(payment_request(booking.id, dec!(500)))
            .await
            .unwrap();
        let err = svc.refund_payment(payment.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_overpayment_rejected_atomically() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(1000)).await;
        let svc = service(store.clone());

        let payment = svc
            .record_payment(payment_request(booking.id, dec!(1500)))
            .await
            .unwrap();
        let err = svc.complete_payment(payment.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation(_)));

        // nada quedó a medias: el pago sigue pendiente y la reserva intacta
        let payment = store.find_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        let booking = store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.paid_amount, dec!(0));
    }

    #[tokio::test]
    async fn test_fail_and_cancel_leave_booking_untouched() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store.clone());

        let failing = svc
            .record_payment(payment_request(booking.id, dec!(300)))
            .await
            .unwrap();
        let failed = svc.fail_payment(failing.id).await.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);

        let cancelling = svc
            .record_payment(payment_request(booking.id, dec!(300)))
            .await
            .unwrap();
        let cancelled = svc.cancel_payment(cancelling.id).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);

        let booking = store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.paid_amount, dec!(0));
    }

    #[tokio::test]
    async fn test_overdue_report_uses_threshold() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store.clone());
        let now = Utc::now();

        let aged = svc
            .record_payment(payment_request(booking.id, dec!(400)))
            .await
            .unwrap();
        let mut stale = aged.clone();
        stale.created_at = now - Duration::days(45);
        store.insert_payment(stale).await.unwrap();

        let recent = svc
            .record_payment(payment_request(booking.id, dec!(400)))
            .await
            .unwrap();

        let overdue = svc.overdue_payments().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, aged.id);
        assert!(overdue.iter().all(|p| p.id != recent.id));
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let store = Arc::new(MemoryStore::new());
        let booking = seed_booking(&store, dec!(2000)).await;
        let svc = service(store);

        let err = svc
            .record_payment(payment_request(booking.id, dec!(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
