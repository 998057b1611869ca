//! Capa de persistencia
//!
//! Puertos de almacenamiento por entidad, independientes del lenguaje de
//! consulta del backend: el núcleo solo pide "aplicar filtros tipados y
//! paginar". Las dos secuencias críticas (conversión de cotización y
//! liquidación de pago) se exponen como operaciones compuestas atómicas;
//! las decisiones de dominio dentro de ellas viven en funciones puras de
//! `models`, compartidas por todos los adaptadores.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::analytics::DateRange;
use crate::models::booking::{Booking, BookingFilters, BookingStatus};
use crate::models::customer::{Customer, CustomerFilters};
use crate::models::document::{Document, DocumentFilters, DocumentStatus};
use crate::models::payment::{Payment, PaymentFilters, PaymentStatus};
use crate::models::quote::{ConvertQuoteRequest, Quote, QuoteFilters};
use crate::models::route::{Route, RouteFilters};
use crate::models::shipment::{Shipment, ShipmentFilters};
use crate::models::vehicle::Vehicle;
use crate::utils::errors::AppResult;

/// Parámetros de paginación
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Lista paginada
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Mundo de persistencia completo.
///
/// Los dos adaptadores del crate (Postgres y memoria) implementan todos los
/// puertos por entidad, así que los servicios reciben un único `Arc<dyn
/// Store>` en lugar de un puerto por dependencia.
pub trait Store:
    CustomerStore
    + RouteStore
    + VehicleStore
    + QuoteStore
    + BookingStore
    + DocumentStore
    + PaymentStore
    + ShipmentStore
{
}

impl<T> Store for T where
    T: CustomerStore
        + RouteStore
        + VehicleStore
        + QuoteStore
        + BookingStore
        + DocumentStore
        + PaymentStore
        + ShipmentStore
{
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert_customer(&self, customer: Customer) -> AppResult<Customer>;
    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>>;
    async fn update_customer(&self, customer: &Customer) -> AppResult<()>;
    async fn list_customers(
        &self,
        filters: &CustomerFilters,
        page: &Pagination,
    ) -> AppResult<Page<Customer>>;
    async fn all_customers(&self) -> AppResult<Vec<Customer>>;
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn insert_route(&self, route: Route) -> AppResult<Route>;
    async fn find_route(&self, id: Uuid) -> AppResult<Option<Route>>;
    async fn update_route(&self, route: &Route) -> AppResult<()>;
    async fn list_routes(&self, filters: &RouteFilters, page: &Pagination)
        -> AppResult<Page<Route>>;
}

#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<Vehicle>;
    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>>;
    async fn vehicles_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Vehicle>>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn insert_quote(&self, quote: Quote) -> AppResult<Quote>;
    async fn find_quote(&self, id: Uuid) -> AppResult<Option<Quote>>;
    async fn update_quote(&self, quote: &Quote) -> AppResult<()>;
    async fn list_quotes(&self, filters: &QuoteFilters, page: &Pagination)
        -> AppResult<Page<Quote>>;
    async fn quotes_created_in(&self, range: &DateRange) -> AppResult<Vec<Quote>>;

    /// Conversión atómica cotización → reserva.
    ///
    /// Verifica dentro de la misma unidad de trabajo que la cotización siga
    /// siendo convertible, crea la reserva y marca la cotización como
    /// `converted`. Un segundo intento concurrente falla con Conflict y no
    /// deja estado parcial.
    async fn convert_quote(
        &self,
        quote_id: Uuid,
        request: &ConvertQuoteRequest,
        booking_number: String,
        now: DateTime<Utc>,
    ) -> AppResult<Booking>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: Booking) -> AppResult<Booking>;
    async fn find_booking(&self, id: Uuid) -> AppResult<Option<Booking>>;
    async fn update_booking(&self, booking: &Booking) -> AppResult<()>;
    async fn list_bookings(
        &self,
        filters: &BookingFilters,
        page: &Pagination,
    ) -> AppResult<Page<Booking>>;
    async fn bookings_created_in(&self, range: &DateRange) -> AppResult<Vec<Booking>>;
    async fn bookings_by_statuses(&self, statuses: &[BookingStatus]) -> AppResult<Vec<Booking>>;
    async fn bookings_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Booking>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: Document) -> AppResult<Document>;
    async fn find_document(&self, id: Uuid) -> AppResult<Option<Document>>;
    async fn update_document(&self, document: &Document) -> AppResult<()>;
    async fn list_documents(
        &self,
        filters: &DocumentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Document>>;
    async fn documents_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Document>>;
    async fn documents_by_status(&self, status: DocumentStatus) -> AppResult<Vec<Document>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, payment: Payment) -> AppResult<Payment>;
    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>>;
    async fn list_payments(
        &self,
        filters: &PaymentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Payment>>;
    async fn payments_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>>;
    async fn payments_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Payment>>;
    async fn payments_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>>;

    /// Pagos relevantes para agregados del rango dado: registrados,
    /// completados o reembolsados entre el inicio de la ventana anterior y
    /// el fin del rango.
    async fn payments_for_analytics(&self, range: &DateRange) -> AppResult<Vec<Payment>>;

    /// Liquidación atómica pago + reserva.
    ///
    /// Valida la transición del pago y aplica el delta al `paid_amount` de
    /// la reserva dentro de la misma unidad de trabajo; cualquier violación
    /// revierte ambas escrituras.
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        target: PaymentStatus,
        now: DateTime<Utc>,
    ) -> AppResult<(Payment, Booking)>;
}

#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Rechaza con Conflict un segundo envío para la misma reserva
    async fn insert_shipment(&self, shipment: Shipment) -> AppResult<Shipment>;
    async fn find_shipment(&self, id: Uuid) -> AppResult<Option<Shipment>>;
    async fn find_shipment_by_booking(&self, booking_id: Uuid) -> AppResult<Option<Shipment>>;
    async fn update_shipment(&self, shipment: &Shipment) -> AppResult<()>;
    async fn list_shipments(
        &self,
        filters: &ShipmentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Shipment>>;
    async fn shipments_arrived_in(&self, range: &DateRange) -> AppResult<Vec<Shipment>>;
    async fn active_shipments(&self) -> AppResult<Vec<Shipment>>;
}
