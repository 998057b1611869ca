//! Servicio de cotizaciones
//!
//! Orquesta el ciclo de vida de la cotización: emisión con precio congelado,
//! revisión por el personal y conversión única en reserva. La conversión
//! corre como operación compuesta del puerto de almacenamiento para que dos
//! peticiones concurrentes no produzcan reservas duplicadas.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::EnvironmentConfig;
use crate::models::booking::Booking;
use crate::models::quote::{
    quote_total, validate_fee_lines, ConvertQuoteRequest, CreateQuoteRequest, FeeLine, Quote,
    QuoteFilters, QuoteStatus,
};
use crate::notifications::{NotificationEvent, Notifier};
use crate::storage::{
    CustomerStore, Page, Pagination, QuoteStore, RouteStore, Store, VehicleStore,
};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

/// Genera el código de acceso de un solo uso que viaja en la notificación
/// de aprobación
fn generate_access_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Número legible de reserva derivado de su id
pub(crate) fn allocate_booking_number(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("BK-{}", hex[..8].to_uppercase())
}

#[derive(Clone)]
pub struct QuoteService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: EnvironmentConfig,
}

impl QuoteService {
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

    /// Emite una cotización congelando el precio base de la ruta.
    ///
    /// Cambios posteriores a la ruta no alteran lo ya cotizado; el total se
    /// calcula siempre a partir de sus componentes.
    pub async fn create_quote(&self, request: CreateQuoteRequest) -> AppResult<Quote> {
        request.validate()?;
        request.validate_fees()?;

        let customer = self
            .store
            .find_customer(request.customer_id)
            .await?
            .ok_or_else(|| not_found_error("Customer", request.customer_id))?;
        let route = self
            .store
            .find_route(request.route_id)
            .await?
            .ok_or_else(|| not_found_error("Route", request.route_id))?;
        if !route.is_active {
            return Err(validation_error(format!(
                "route {} -> {} is not active",
                route.origin, route.destination
            )));
        }

        let now = Utc::now();
        let valid_until = request
            .valid_until
            .unwrap_or(now + Duration::days(self.config.quote_validity_days));
        if valid_until <= now {
            return Err(validation_error("valid_until must be in the future"));
        }

        let total_amount = quote_total(route.base_price, &request.additional_fees);
        let quote = Quote {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            route_id: route.id,
            vehicle_details: request.vehicle_details,
            base_price: route.base_price,
            additional_fees: request.additional_fees,
            total_amount,
            status: QuoteStatus::Pending,
            valid_until,
            reviewed_by: None,
            created_at: now,
        };

        let quote = self.store.insert_quote(quote).await?;
        info!(
            quote_id = %quote.id,
            total = %quote.total_amount,
            "quote created"
        );
        Ok(quote)
    }

    /// Lectura con expiración perezosa: el estado devuelto es el efectivo
    pub async fn get_quote(&self, id: Uuid) -> AppResult<Quote> {
        let mut quote = self
            .store
            .find_quote(id)
            .await?
            .ok_or_else(|| not_found_error("Quote", id))?;
        quote.status = quote.effective_status(Utc::now());
        Ok(quote)
    }

    pub async fn list_quotes(
        &self,
        filters: &QuoteFilters,
        page: &Pagination,
    ) -> AppResult<Page<Quote>> {
        let now = Utc::now();
        let mut result = self.store.list_quotes(filters, page).await?;
        for quote in &mut result.items {
            quote.status = quote.effective_status(now);
        }
        Ok(result)
    }

    /// Aprueba una cotización pendiente y notifica al cliente con un código
    /// de acceso de un solo uso para el portal.
    pub async fn approve_quote(&self, id: Uuid, actor: &str) -> AppResult<Quote> {
        let now = Utc::now();
        let mut quote = self
            .store
            .find_quote(id)
            .await?
            .ok_or_else(|| not_found_error("Quote", id))?;
        quote.ensure_reviewable(now)?;

        quote.status = QuoteStatus::Approved;
        quote.reviewed_by = Some(actor.to_string());
        self.store.update_quote(&quote).await?;

        let access_code = generate_access_code(self.config.access_code_length);
        self.notifier
            .notify(
                NotificationEvent::QuoteApproved,
                quote.id,
                json!({
                    "customer_id": quote.customer_id,
                    "total_amount": quote.total_amount,
                    "valid_until": quote.valid_until,
                    "access_code": access_code,
                }),
            )
            .await?;

        info!(quote_id = %quote.id, actor = actor, "quote approved");
        Ok(quote)
    }

    /// Reemplaza los cargos de una cotización aún pendiente.
    ///
    /// El total se recalcula desde sus componentes; una cotización ya
    /// revisada o vencida no admite ajustes.
    pub async fn update_quote_fees(&self, id: Uuid, fees: Vec<FeeLine>) -> AppResult<Quote> {
        validate_fee_lines(&fees)?;
        let now = Utc::now();
        let mut quote = self
            .store
            .find_quote(id)
            .await?
            .ok_or_else(|| not_found_error("Quote", id))?;
        quote.ensure_reviewable(now)?;

        quote.additional_fees = fees;
        quote.recompute_total();
        self.store.update_quote(&quote).await?;

        info!(quote_id = %quote.id, total = %quote.total_amount, "quote fees updated");
        Ok(quote)
    }

    /// Rechaza una cotización pendiente; el motivo es obligatorio
    pub async fn reject_quote(&self, id: Uuid, actor: &str, reason: &str) -> AppResult<Quote> {
        if reason.trim().is_empty() {
            return Err(validation_error("rejection requires a reason"));
        }
        let now = Utc::now();
        let mut quote = self
            .store
            .find_quote(id)
            .await?
            .ok_or_else(|| not_found_error("Quote", id))?;
        quote.ensure_reviewable(now)?;

        quote.status = QuoteStatus::Rejected;
        quote.reviewed_by = Some(actor.to_string());
        self.store.update_quote(&quote).await?;

        info!(quote_id = %quote.id, actor = actor, reason = reason, "quote rejected");
        Ok(quote)
    }

    /// Convierte una cotización aprobada en exactamente una reserva.
    ///
    /// El chequeo de convertibilidad y las escrituras corren dentro de la
    /// misma unidad atómica del puerto; un segundo intento sobre la misma
    /// cotización falla con Conflict sin dejar estado parcial.
    pub async fn convert_quote(
        &self,
        id: Uuid,
        request: ConvertQuoteRequest,
    ) -> AppResult<Booking> {
        request.validate()?;
        self.store
            .find_vehicle(request.vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", request.vehicle_id))?;

        let now = Utc::now();
        let booking_number = allocate_booking_number(Uuid::new_v4());
        let booking = self
            .store
            .convert_quote(id, &request, booking_number, now)
            .await?;

        info!(
            quote_id = %id,
            booking_id = %booking.id,
            booking_number = %booking.booking_number,
            "quote converted into booking"
        );
        Ok(booking)
    }
}
