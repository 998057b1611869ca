//! Adaptador de almacenamiento en memoria
//!
//! Implementación de referencia de los puertos de `storage`, usada por las
//! pruebas. Todo el mundo vive bajo un único `RwLock`: las operaciones
//! compuestas toman el write lock una sola vez, así que validan y escriben
//! sin estados intermedios observables.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::analytics::DateRange;
use crate::models::booking::{Booking, BookingFilters, BookingStatus};
use crate::models::customer::{Customer, CustomerFilters};
use crate::models::document::{Document, DocumentFilters, DocumentStatus};
use crate::models::payment::{Payment, PaymentFilters, PaymentStatus};
use crate::models::quote::{ConvertQuoteRequest, Quote, QuoteFilters};
use crate::models::route::{Route, RouteFilters};
use crate::models::shipment::{Shipment, ShipmentFilters, ShipmentStatus};
use crate::models::vehicle::Vehicle;
use crate::storage::{
    BookingStore, CustomerStore, DocumentStore, Page, Pagination, PaymentStore, QuoteStore,
    RouteStore, ShipmentStore, VehicleStore,
};
use crate::utils::errors::{conflict_error, not_found_error, AppResult};

#[derive(Default)]
struct World {
    customers: HashMap<Uuid, Customer>,
    routes: HashMap<Uuid, Route>,
    vehicles: HashMap<Uuid, Vehicle>,
    quotes: HashMap<Uuid, Quote>,
    bookings: HashMap<Uuid, Booking>,
    documents: HashMap<Uuid, Document>,
    payments: HashMap<Uuid, Payment>,
    shipments: HashMap<Uuid, Shipment>,
}

#[derive(Default)]
pub struct MemoryStore {
    world: RwLock<World>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Ordena por fecha de creación descendente y corta la página pedida
fn paginate<T, F>(mut items: Vec<T>, page: &Pagination, created_at: F) -> Page<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect();
    Page {
        items,
        total,
        limit: page.limit,
        offset: page.offset,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn in_window(ts: DateTime<Utc>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    from.map_or(true, |f| ts >= f) && to.map_or(true, |t| ts <= t)
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn insert_customer(&self, customer: Customer) -> AppResult<Customer> {
        let mut world = self.world.write().await;
        world.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        Ok(self.world.read().await.customers.get(&id).cloned())
    }

    async fn update_customer(&self, customer: &Customer) -> AppResult<()> {
        let mut world = self.world.write().await;
        if !world.customers.contains_key(&customer.id) {
            return Err(not_found_error("Customer", customer.id));
        }
        world.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn list_customers(
        &self,
        filters: &CustomerFilters,
        page: &Pagination,
    ) -> AppResult<Page<Customer>> {
        let world = self.world.read().await;
        let items: Vec<Customer> = world
            .customers
            .values()
            .filter(|c| filters.status.map_or(true, |s| c.status == s))
            .filter(|c| {
                filters.search.as_deref().map_or(true, |needle| {
                    contains_ci(&c.full_name, needle) || contains_ci(&c.email, needle)
                })
            })
            .filter(|c| in_window(c.created_at, filters.date_from, filters.date_to))
            .cloned()
            .collect();
        Ok(paginate(items, page, |c| c.created_at))
    }

    async fn all_customers(&self) -> AppResult<Vec<Customer>> {
        Ok(self.world.read().await.customers.values().cloned().collect())
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn insert_route(&self, route: Route) -> AppResult<Route> {
        let mut world = self.world.write().await;
        world.routes.insert(route.id, route.clone());
        Ok(route)
    }

    async fn find_route(&self, id: Uuid) -> AppResult<Option<Route>> {
        Ok(self.world.read().await.routes.get(&id).cloned())
    }

    async fn update_route(&self, route: &Route) -> AppResult<()> {
        let mut world = self.world.write().await;
        if !world.routes.contains_key(&route.id) {
            return Err(not_found_error("Route", route.id));
        }
        world.routes.insert(route.id, route.clone());
        Ok(())
    }

    async fn list_routes(
        &self,
        filters: &RouteFilters,
        page: &Pagination,
    ) -> AppResult<Page<Route>> {
        let world = self.world.read().await;
        let items: Vec<Route> = world
            .routes
            .values()
            .filter(|r| filters.is_active.map_or(true, |a| r.is_active == a))
            .filter(|r| {
                filters.search.as_deref().map_or(true, |needle| {
                    contains_ci(&r.origin, needle) || contains_ci(&r.destination, needle)
                })
            })
            .cloned()
            .collect();
        Ok(paginate(items, page, |r| r.created_at))
    }
}

#[async_trait]
impl VehicleStore for MemoryStore {
    async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        let mut world = self.world.write().await;
        world.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.world.read().await.vehicles.get(&id).cloned())
    }

    async fn vehicles_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Vehicle>> {
        Ok(self
            .world
            .read()
            .await
            .vehicles
            .values()
            .filter(|v| v.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuoteStore for MemoryStore {
    async fn insert_quote(&self, quote: Quote) -> AppResult<Quote> {
        let mut world = self.world.write().await;
        world.quotes.insert(quote.id, quote.clone());
        Ok(quote)
    }

    async fn find_quote(&self, id: Uuid) -> AppResult<Option<Quote>> {
        Ok(self.world.read().await.quotes.get(&id).cloned())
    }

    async fn update_quote(&self, quote: &Quote) -> AppResult<()> {
        let mut world = self.world.write().await;
        if !world.quotes.contains_key(&quote.id) {
            return Err(not_found_error("Quote", quote.id));
        }
        world.quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    async fn list_quotes(
        &self,
        filters: &QuoteFilters,
        page: &Pagination,
    ) -> AppResult<Page<Quote>> {
        let world = self.world.read().await;
        let items: Vec<Quote> = world
            .quotes
            .values()
            .filter(|q| filters.status.map_or(true, |s| q.status == s))
            .filter(|q| filters.customer_id.map_or(true, |id| q.customer_id == id))
            .filter(|q| filters.route_id.map_or(true, |id| q.route_id == id))
            .filter(|q| in_window(q.created_at, filters.date_from, filters.date_to))
            .filter(|q| filters.amount_min.map_or(true, |min| q.total_amount >= min))
            .filter(|q| filters.amount_max.map_or(true, |max| q.total_amount <= max))
            .cloned()
            .collect();
        Ok(paginate(items, page, |q| q.created_at))
    }

    async fn quotes_created_in(&self, range: &DateRange) -> AppResult<Vec<Quote>> {
        Ok(self
            .world
            .read()
            .await
            .quotes
            .values()
            .filter(|q| range.contains(q.created_at))
            .cloned()
            .collect())
    }

    async fn convert_quote(
        &self,
        quote_id: Uuid,
        request: &ConvertQuoteRequest,
        booking_number: String,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut world = self.world.write().await;

        let quote = world
            .quotes
            .get(&quote_id)
            .ok_or_else(|| not_found_error("Quote", quote_id))?;
        quote.ensure_convertible(now)?;
        let booking = Booking::from_quote(quote, request, booking_number, now)?;

        // Todas las validaciones pasaron; recién ahora se escribe
        let quote = world
            .quotes
            .get_mut(&quote_id)
            .expect("quote checked above");
        quote.status = crate::models::quote::QuoteStatus::Converted;
        world.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: Booking) -> AppResult<Booking> {
        let mut world = self.world.write().await;
        world.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.world.read().await.bookings.get(&id).cloned())
    }

    async fn update_booking(&self, booking: &Booking) -> AppResult<()> {
        let mut world = self.world.write().await;
        if !world.bookings.contains_key(&booking.id) {
            return Err(not_found_error("Booking", booking.id));
        }
        world.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn list_bookings(
        &self,
        filters: &BookingFilters,
        page: &Pagination,
    ) -> AppResult<Page<Booking>> {
        let world = self.world.read().await;
        let items: Vec<Booking> = world
            .bookings
            .values()
            .filter(|b| filters.status.map_or(true, |s| b.status == s))
            .filter(|b| filters.customer_id.map_or(true, |id| b.customer_id == id))
            .filter(|b| filters.route_id.map_or(true, |id| b.route_id == id))
            .filter(|b| in_window(b.created_at, filters.date_from, filters.date_to))
            .filter(|b| {
                filters.search.as_deref().map_or(true, |needle| {
                    contains_ci(&b.booking_number, needle) || contains_ci(&b.recipient_name, needle)
                })
            })
            .filter(|b| filters.amount_min.map_or(true, |min| b.total_amount >= min))
            .filter(|b| filters.amount_max.map_or(true, |max| b.total_amount <= max))
            .cloned()
            .collect();
        Ok(paginate(items, page, |b| b.created_at))
    }

    async fn bookings_created_in(&self, range: &DateRange) -> AppResult<Vec<Booking>> {
        Ok(self
            .world
            .read()
            .await
            .bookings
            .values()
            .filter(|b| range.contains(b.created_at))
            .cloned()
            .collect())
    }

    async fn bookings_by_statuses(&self, statuses: &[BookingStatus]) -> AppResult<Vec<Booking>> {
        Ok(self
            .world
            .read()
            .await
            .bookings
            .values()
            .filter(|b| statuses.contains(&b.status))
            .cloned()
            .collect())
    }

    async fn bookings_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Booking>> {
        Ok(self
            .world
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, document: Document) -> AppResult<Document> {
        let mut world = self.world.write().await;
        world.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn find_document(&self, id: Uuid) -> AppResult<Option<Document>> {
        Ok(self.world.read().await.documents.get(&id).cloned())
    }

    async fn update_document(&self, document: &Document) -> AppResult<()> {
        let mut world = self.world.write().await;
        if !world.documents.contains_key(&document.id) {
            return Err(not_found_error("Document", document.id));
        }
        world.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn list_documents(
        &self,
        filters: &DocumentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Document>> {
        let world = self.world.read().await;
        let items: Vec<Document> = world
            .documents
            .values()
            .filter(|d| filters.status.map_or(true, |s| d.status == s))
            .filter(|d| filters.document_type.map_or(true, |t| d.document_type == t))
            .filter(|d| filters.booking_id.map_or(true, |id| d.booking_id == Some(id)))
            .filter(|d| {
                filters
                    .customer_id
                    .map_or(true, |id| d.customer_id == Some(id))
            })
            .filter(|d| in_window(d.created_at, filters.date_from, filters.date_to))
            .cloned()
            .collect();
        Ok(paginate(items, page, |d| d.created_at))
    }

    async fn documents_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Document>> {
        Ok(self
            .world
            .read()
            .await
            .documents
            .values()
            .filter(|d| d.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn documents_by_status(&self, status: DocumentStatus) -> AppResult<Vec<Document>> {
        Ok(self
            .world
            .read()
            .await
            .documents
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: Payment) -> AppResult<Payment> {
        let mut world = self.world.write().await;
        world.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.world.read().await.payments.get(&id).cloned())
    }

    async fn list_payments(
        &self,
        filters: &PaymentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Payment>> {
        let world = self.world.read().await;
        let items: Vec<Payment> = world
            .payments
            .values()
            .filter(|p| filters.status.map_or(true, |s| p.status == s))
            .filter(|p| {
                filters
                    .payment_method
                    .map_or(true, |m| p.payment_method == m)
            })
            .filter(|p| filters.booking_id.map_or(true, |id| p.booking_id == id))
            .filter(|p| filters.customer_id.map_or(true, |id| p.customer_id == id))
            .filter(|p| in_window(p.created_at, filters.date_from, filters.date_to))
            .filter(|p| filters.amount_min.map_or(true, |min| p.amount >= min))
            .filter(|p| filters.amount_max.map_or(true, |max| p.amount <= max))
            .cloned()
            .collect();
        Ok(paginate(items, page, |p| p.created_at))
    }

    async fn payments_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self
            .world
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn payments_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self
            .world
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn payments_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>> {
        Ok(self
            .world
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    async fn payments_for_analytics(&self, range: &DateRange) -> AppResult<Vec<Payment>> {
        let window_start = range.preceding().start;
        let window_end = range.end;
        let relevant = |ts: Option<DateTime<Utc>>| {
            matches!(ts, Some(t) if t >= window_start && t <= window_end)
        };
        Ok(self
            .world
            .read()
            .await
            .payments
            .values()
            .filter(|p| {
                relevant(Some(p.created_at)) || relevant(p.payment_date) || relevant(p.refunded_at)
            })
            .cloned()
            .collect())
    }

    async fn settle_payment(
        &self,
        payment_id: Uuid,
        target: PaymentStatus,
        now: DateTime<Utc>,
    ) -> AppResult<(Payment, Booking)> {
        let mut world = self.world.write().await;

        let payment = world
            .payments
            .get(&payment_id)
            .ok_or_else(|| not_found_error("Payment", payment_id))?;
        payment.ensure_transition(target)?;
        let delta = payment.settlement_delta(target);
        let booking_id = payment.booking_id;

        let mut booking = world
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| not_found_error("Booking", booking_id))?;
        if !delta.is_zero() {
            booking.apply_payment_delta(delta)?;
        }

        // Todas las validaciones pasaron; recién ahora se escribe
        let payment = world
            .payments
            .get_mut(&payment_id)
            .expect("payment checked above");
        payment.status = target;
        match target {
            PaymentStatus::Completed => payment.payment_date = Some(now),
            PaymentStatus::Refunded => payment.refunded_at = Some(now),
            _ => {}
        }
        let payment = payment.clone();
        world.bookings.insert(booking.id, booking.clone());
        Ok((payment, booking))
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn insert_shipment(&self, shipment: Shipment) -> AppResult<Shipment> {
        let mut world = self.world.write().await;
        if world
            .shipments
            .values()
            .any(|s| s.booking_id == shipment.booking_id)
        {
            return Err(conflict_error(format!(
                "booking {} already has a shipment",
                shipment.booking_id
            )));
        }
        world.shipments.insert(shipment.id, shipment.clone());
        Ok(shipment)
    }

    async fn find_shipment(&self, id: Uuid) -> AppResult<Option<Shipment>> {
        Ok(self.world.read().await.shipments.get(&id).cloned())
    }

    async fn find_shipment_by_booking(&self, booking_id: Uuid) -> AppResult<Option<Shipment>> {
        Ok(self
            .world
            .read()
            .await
            .shipments
            .values()
            .find(|s| s.booking_id == booking_id)
            .cloned())
    }

    async fn update_shipment(&self, shipment: &Shipment) -> AppResult<()> {
        let mut world = self.world.write().await;
        if !world.shipments.contains_key(&shipment.id) {
            return Err(not_found_error("Shipment", shipment.id));
        }
        world.shipments.insert(shipment.id, shipment.clone());
        Ok(())
    }

    async fn list_shipments(
        &self,
        filters: &ShipmentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Shipment>> {
        let world = self.world.read().await;
        let items: Vec<Shipment> = world
            .shipments
            .values()
            .filter(|s| filters.status.map_or(true, |st| s.status == st))
            .filter(|s| filters.booking_id.map_or(true, |id| s.booking_id == id))
            .filter(|s| in_window(s.created_at, filters.date_from, filters.date_to))
            .filter(|s| {
                filters.search.as_deref().map_or(true, |needle| {
                    contains_ci(&s.carrier_name, needle)
                        || s.vessel_name
                            .as_deref()
                            .map_or(false, |v| contains_ci(v, needle))
                })
            })
            .cloned()
            .collect();
        Ok(paginate(items, page, |s| s.created_at))
    }

    async fn shipments_arrived_in(&self, range: &DateRange) -> AppResult<Vec<Shipment>> {
        Ok(self
            .world
            .read()
            .await
            .shipments
            .values()
            .filter(|s| matches!(s.actual_arrival, Some(at) if range.contains(at)))
            .cloned()
            .collect())
    }

    async fn active_shipments(&self) -> AppResult<Vec<Shipment>> {
        Ok(self
            .world
            .read()
            .await
            .shipments
            .values()
            .filter(|s| s.status != ShipmentStatus::Delivered)
            .cloned()
            .collect())
    }
}
