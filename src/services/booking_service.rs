//! Servicio de reservas
//!
//! Creación directa de reservas, el único cambio de estado disparado desde
//! afuera y el reporte compuesto "requiere atención". Este último es pura
//! composición de lecturas sobre reservas, pagos y documentos; nunca se
//! persiste como bandera.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::EnvironmentConfig;
use crate::models::booking::{
    validate_booking_dates, validate_booking_transition, AttentionEntry, AttentionReason, Booking,
    BookingFilters, BookingStatus, CreateBookingRequest, UpdateBookingStatusRequest,
};
use crate::models::document::{missing_documents, required_documents};
use crate::models::payment::PaymentStatus;
use crate::notifications::{NotificationEvent, Notifier};
use crate::services::quote_service::allocate_booking_number;
use crate::storage::{
    BookingStore, CustomerStore, DocumentStore, Page, Pagination, PaymentStore, RouteStore, Store,
    VehicleStore,
};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: EnvironmentConfig,
}

impl BookingService {
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

    /// Crea una reserva sin cotización previa
    pub async fn create_booking(&self, request: CreateBookingRequest) -> AppResult<Booking> {
        request.validate()?;
        if request.total_amount <= Decimal::ZERO {
            return Err(validation_error("total_amount must be positive"));
        }
        validate_booking_dates(request.pickup_date, request.delivery_date)?;

        self.store
            .find_customer(request.customer_id)
            .await?
            .ok_or_else(|| not_found_error("Customer", request.customer_id))?;
        self.store
            .find_route(request.route_id)
            .await?
            .ok_or_else(|| not_found_error("Route", request.route_id))?;
        self.store
            .find_vehicle(request.vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", request.vehicle_id))?;

        let id = Uuid::new_v4();
        let booking = Booking {
            id,
            booking_number: allocate_booking_number(id),
            customer_id: request.customer_id,
            route_id: request.route_id,
            vehicle_id: request.vehicle_id,
            quote_id: None,
            status: BookingStatus::Pending,
            total_amount: request.total_amount,
            paid_amount: Decimal::ZERO,
            recipient_name: request.recipient_name,
            recipient_phone: request.recipient_phone,
            pickup_date: request.pickup_date,
            delivery_date: request.delivery_date,
            created_at: Utc::now(),
        };

        let booking = self.store.insert_booking(booking).await?;
        info!(
            booking_id = %booking.id,
            booking_number = %booking.booking_number,
            "booking created"
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> AppResult<Booking> {
        self.store
            .find_booking(id)
            .await?
            .ok_or_else(|| not_found_error("Booking", id))
    }

    pub async fn list_bookings(
        &self,
        filters: &BookingFilters,
        page: &Pagination,
    ) -> AppResult<Page<Booking>> {
        self.store.list_bookings(filters, page).await
    }

    /// Único cambio de estado disparado externamente.
    ///
    /// El valor textual se valida contra el conjunto cerrado de estados y la
    /// transición contra el grafo; las fechas que acompañan al cambio deben
    /// respetar el orden recogida < entrega.
    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateBookingStatusRequest,
        actor: &str,
    ) -> AppResult<Booking> {
        let target = BookingStatus::parse(&request.status)?;
        let mut booking = self.get_booking(id).await?;
        let previous = booking.status;
        validate_booking_transition(previous, target)?;

        let pickup = request.pickup_date.or(booking.pickup_date);
        let delivery = request.delivery_date.or(booking.delivery_date);
        validate_booking_dates(pickup, delivery)?;

        booking.status = target;
        booking.pickup_date = pickup;
        booking.delivery_date = delivery;
        self.store.update_booking(&booking).await?;

        self.notifier
            .notify(
                NotificationEvent::BookingStatusChanged,
                booking.id,
                json!({
                    "booking_number": booking.booking_number,
                    "from": previous.as_str(),
                    "to": target.as_str(),
                    "actor": actor,
                }),
            )
            .await?;

        info!(
            booking_id = %booking.id,
            from = previous.as_str(),
            to = target.as_str(),
            actor = actor,
            "booking status changed"
        );
        Ok(booking)
    }

    /// Reporte de reservas que requieren acción del personal.
    ///
    /// Reúne cuatro señales: reserva pendiente más vieja que el umbral,
    /// entrega programada vencida, pagos pendientes añejos y documentos
    /// requeridos sin aprobar o por expirar.
    pub async fn requires_attention(&self) -> AppResult<Vec<AttentionEntry>> {
        let now = Utc::now();
        let open = self
            .store
            .bookings_by_statuses(&[
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Processing,
                BookingStatus::InTransit,
            ])
            .await?;

        let mut entries = Vec::new();
        for booking in open {
            let mut reasons = Vec::new();

            if booking.is_stale_pending(now, self.config.attention_pending_hours) {
                reasons.push(AttentionReason::StalePending);
            }
            if booking.is_overdue(now) {
                reasons.push(AttentionReason::Overdue);
            }

            let payments = self.store.payments_by_booking(booking.id).await?;
            if payments.iter().any(|p| {
                p.status == PaymentStatus::Pending
                    && p.is_overdue(now, self.config.attention_payment_days)
            }) {
                reasons.push(AttentionReason::AgedPendingPayment);
            }

            let documents = self.store.documents_by_booking(booking.id).await?;
            let route = self
                .store
                .find_route(booking.route_id)
                .await?
                .ok_or_else(|| not_found_error("Route", booking.route_id))?;
            let vehicle = self
                .store
                .find_vehicle(booking.vehicle_id)
                .await?
                .ok_or_else(|| not_found_error("Vehicle", booking.vehicle_id))?;
            let required = required_documents(&route, vehicle.vehicle_type);
            if !missing_documents(&required, &documents, now).is_empty() {
                reasons.push(AttentionReason::PendingDocuments);
            }
            if documents
                .iter()
                .any(|d| d.is_expiring_within(now, self.config.document_expiry_warning_days))
            {
                reasons.push(AttentionReason::ExpiringDocuments);
            }

            if !reasons.is_empty() {
                entries.push(AttentionEntry {
                    booking_id: booking.id,
                    booking_number: booking.booking_number.clone(),
                    status: booking.status,
                    reasons,
                });
            }
        }
        Ok(entries)
    }
}
