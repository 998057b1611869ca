//! Adaptador de almacenamiento PostgreSQL
//!
//! Implementación sqlx de los puertos de `storage`. Las operaciones
//! compuestas corren dentro de una transacción con `SELECT ... FOR UPDATE`;
//! cualquier error antes del commit revierte la unidad completa, nunca
//! queda una cotización convertida sin reserva ni un pago contado dos veces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::analytics::DateRange;
use crate::models::booking::{Booking, BookingFilters, BookingStatus};
use crate::models::customer::{Customer, CustomerFilters};
use crate::models::document::{Document, DocumentFilters, DocumentStatus};
use crate::models::payment::{Payment, PaymentFilters, PaymentStatus};
use crate::models::quote::{ConvertQuoteRequest, FeeLine, Quote, QuoteFilters, QuoteStatus};
use crate::models::route::{Route, RouteFilters};
use crate::models::shipment::{LocationEvent, Shipment, ShipmentFilters};
use crate::models::vehicle::{Vehicle, VehicleDetails};
use crate::storage::{
    BookingStore, CustomerStore, DocumentStore, Page, Pagination, PaymentStore, QuoteStore,
    RouteStore, ShipmentStore, VehicleStore,
};
use crate::utils::errors::{conflict_error, not_found_error, AppResult};

/// Crear un pool de conexiones a la base de datos
pub async fn create_pool(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Las cotizaciones y envíos llevan campos JSONB; la fila se materializa con
// wrappers Json y se convierte al modelo de dominio.

#[derive(FromRow)]
struct QuoteRow {
    id: Uuid,
    customer_id: Uuid,
    route_id: Uuid,
    vehicle_details: Json<VehicleDetails>,
    base_price: rust_decimal::Decimal,
    additional_fees: Json<Vec<FeeLine>>,
    total_amount: rust_decimal::Decimal,
    status: QuoteStatus,
    valid_until: DateTime<Utc>,
    reviewed_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<QuoteRow> for Quote {
    fn from(row: QuoteRow) -> Self {
        Quote {
            id: row.id,
            customer_id: row.customer_id,
            route_id: row.route_id,
            vehicle_details: row.vehicle_details.0,
            base_price: row.base_price,
            additional_fees: row.additional_fees.0,
            total_amount: row.total_amount,
            status: row.status,
            valid_until: row.valid_until,
            reviewed_by: row.reviewed_by,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ShipmentRow {
    id: Uuid,
    booking_id: Uuid,
    carrier_name: String,
    vessel_name: Option<String>,
    status: crate::models::shipment::ShipmentStatus,
    estimated_arrival: Option<DateTime<Utc>>,
    actual_arrival: Option<DateTime<Utc>>,
    location_history: Json<Vec<LocationEvent>>,
    created_at: DateTime<Utc>,
}

impl From<ShipmentRow> for Shipment {
    fn from(row: ShipmentRow) -> Self {
        Shipment {
            id: row.id,
            booking_id: row.booking_id,
            carrier_name: row.carrier_name,
            vessel_name: row.vessel_name,
            status: row.status,
            estimated_arrival: row.estimated_arrival,
            actual_arrival: row.actual_arrival,
            location_history: row.location_history.0,
            created_at: row.created_at,
        }
    }
}

async fn insert_booking_row<'e, E>(executor: E, booking: &Booking) -> AppResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO bookings
            (id, booking_number, customer_id, route_id, vehicle_id, quote_id, status,
             total_amount, paid_amount, recipient_name, recipient_phone,
             pickup_date, delivery_date, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(booking.id)
    .bind(&booking.booking_number)
    .bind(booking.customer_id)
    .bind(booking.route_id)
    .bind(booking.vehicle_id)
    .bind(booking.quote_id)
    .bind(booking.status)
    .bind(booking.total_amount)
    .bind(booking.paid_amount)
    .bind(&booking.recipient_name)
    .bind(&booking.recipient_phone)
    .bind(booking.pickup_date)
    .bind(booking.delivery_date)
    .bind(booking.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn push_window(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) {
    if let Some(from) = from {
        builder.push(format!(" AND {} >= ", column)).push_bind(from);
    }
    if let Some(to) = to {
        builder.push(format!(" AND {} <= ", column)).push_bind(to);
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn insert_customer(&self, customer: Customer) -> AppResult<Customer> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, full_name, email, phone, country, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(customer.id)
        .bind(&customer.full_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.country)
        .bind(customer.status)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(customer)
    }

    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn update_customer(&self, customer: &Customer) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET full_name = $2, email = $3, phone = $4, country = $5, status = $6
            WHERE id = $1
            "#,
        )
        .bind(customer.id)
        .bind(&customer.full_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.country)
        .bind(customer.status)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Customer", customer.id));
        }
        Ok(())
    }

    async fn list_customers(
        &self,
        filters: &CustomerFilters,
        page: &Pagination,
    ) -> AppResult<Page<Customer>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(status) = filters.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(search) = &filters.search {
                let pattern = format!("%{}%", search);
                builder
                    .push(" AND (full_name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR email ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            push_window(builder, "created_at", filters.date_from, filters.date_to);
        };

        let mut query = QueryBuilder::new("SELECT * FROM customers WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items: Vec<Customer> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM customers WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn all_customers(&self) -> AppResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers")
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }
}

#[async_trait]
impl RouteStore for PgStore {
    async fn insert_route(&self, route: Route) -> AppResult<Route> {
        sqlx::query(
            r#"
            INSERT INTO routes
                (id, origin, destination, base_price, estimated_days, requires_customs,
                 is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(route.id)
        .bind(&route.origin)
        .bind(&route.destination)
        .bind(route.base_price)
        .bind(route.estimated_days)
        .bind(route.requires_customs)
        .bind(route.is_active)
        .bind(route.created_at)
        .execute(&self.pool)
        .await?;
        Ok(route)
    }

    async fn find_route(&self, id: Uuid) -> AppResult<Option<Route>> {
        let route = sqlx::query_as::<_, Route>("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(route)
    }

    async fn update_route(&self, route: &Route) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE routes
            SET origin = $2, destination = $3, base_price = $4, estimated_days = $5,
                requires_customs = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(route.id)
        .bind(&route.origin)
        .bind(&route.destination)
        .bind(route.base_price)
        .bind(route.estimated_days)
        .bind(route.requires_customs)
        .bind(route.is_active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Route", route.id));
        }
        Ok(())
    }

    async fn list_routes(
        &self,
        filters: &RouteFilters,
        page: &Pagination,
    ) -> AppResult<Page<Route>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(is_active) = filters.is_active {
                builder.push(" AND is_active = ").push_bind(is_active);
            }
            if let Some(search) = &filters.search {
                let pattern = format!("%{}%", search);
                builder
                    .push(" AND (origin ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR destination ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        };

        let mut query = QueryBuilder::new("SELECT * FROM routes WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items: Vec<Route> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM routes WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }
}

#[async_trait]
impl VehicleStore for PgStore {
    async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, customer_id, make, model, year, vin, vehicle_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.customer_id)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.vin)
        .bind(vehicle.vehicle_type)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await?;
        Ok(vehicle)
    }

    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vehicle)
    }

    async fn vehicles_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vehicles)
    }
}

#[async_trait]
impl QuoteStore for PgStore {
    async fn insert_quote(&self, quote: Quote) -> AppResult<Quote> {
        sqlx::query(
            r#"
            INSERT INTO quotes
                (id, customer_id, route_id, vehicle_details, base_price, additional_fees,
                 total_amount, status, valid_until, reviewed_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(quote.id)
        .bind(quote.customer_id)
        .bind(quote.route_id)
        .bind(Json(&quote.vehicle_details))
        .bind(quote.base_price)
        .bind(Json(&quote.additional_fees))
        .bind(quote.total_amount)
        .bind(quote.status)
        .bind(quote.valid_until)
        .bind(&quote.reviewed_by)
        .bind(quote.created_at)
        .execute(&self.pool)
        .await?;
        Ok(quote)
    }

    async fn find_quote(&self, id: Uuid) -> AppResult<Option<Quote>> {
        let row = sqlx::query_as::<_, QuoteRow>("SELECT * FROM quotes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Quote::from))
    }

    async fn update_quote(&self, quote: &Quote) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET vehicle_details = $2, base_price = $3, additional_fees = $4,
                total_amount = $5, status = $6, valid_until = $7, reviewed_by = $8
            WHERE id = $1
            "#,
        )
        .bind(quote.id)
        .bind(Json(&quote.vehicle_details))
        .bind(quote.base_price)
        .bind(Json(&quote.additional_fees))
        .bind(quote.total_amount)
        .bind(quote.status)
        .bind(quote.valid_until)
        .bind(&quote.reviewed_by)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Quote", quote.id));
        }
        Ok(())
    }

    async fn list_quotes(
        &self,
        filters: &QuoteFilters,
        page: &Pagination,
    ) -> AppResult<Page<Quote>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(status) = filters.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(customer_id) = filters.customer_id {
                builder.push(" AND customer_id = ").push_bind(customer_id);
            }
            if let Some(route_id) = filters.route_id {
                builder.push(" AND route_id = ").push_bind(route_id);
            }
            push_window(builder, "created_at", filters.date_from, filters.date_to);
            if let Some(min) = filters.amount_min {
                builder.push(" AND total_amount >= ").push_bind(min);
            }
            if let Some(max) = filters.amount_max {
                builder.push(" AND total_amount <= ").push_bind(max);
            }
        };

        let mut query = QueryBuilder::new("SELECT * FROM quotes WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let rows: Vec<QuoteRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM quotes WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Quote::from).collect(),
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn quotes_created_in(&self, range: &DateRange) -> AppResult<Vec<Quote>> {
        let rows = sqlx::query_as::<_, QuoteRow>(
            "SELECT * FROM quotes WHERE created_at >= $1 AND created_at <= $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Quote::from).collect())
    }

    async fn convert_quote(
        &self,
        quote_id: Uuid,
        request: &ConvertQuoteRequest,
        booking_number: String,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, QuoteRow>("SELECT * FROM quotes WHERE id = $1 FOR UPDATE")
            .bind(quote_id)
            .fetch_optional(&mut *tx)
            .await?;
        let quote: Quote = row
            .map(Quote::from)
            .ok_or_else(|| not_found_error("Quote", quote_id))?;

        // Un error en cualquiera de estos pasos suelta la transacción y
        // revierte todo lo escrito.
        quote.ensure_convertible(now)?;
        let booking = Booking::from_quote(&quote, request, booking_number, now)?;

        insert_booking_row(&mut *tx, &booking).await?;

        let updated = sqlx::query("UPDATE quotes SET status = $2 WHERE id = $1 AND status = $3")
            .bind(quote_id)
            .bind(QuoteStatus::Converted)
            .bind(QuoteStatus::Approved)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() != 1 {
            return Err(conflict_error(format!(
                "quote {} was converted by a concurrent request",
                quote_id
            )));
        }

        tx.commit().await?;
        Ok(booking)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn insert_booking(&self, booking: Booking) -> AppResult<Booking> {
        insert_booking_row(&self.pool, &booking).await?;
        Ok(booking)
    }

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn update_booking(&self, booking: &Booking) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, total_amount = $3, paid_amount = $4, recipient_name = $5,
                recipient_phone = $6, pickup_date = $7, delivery_date = $8
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.status)
        .bind(booking.total_amount)
        .bind(booking.paid_amount)
        .bind(&booking.recipient_name)
        .bind(&booking.recipient_phone)
        .bind(booking.pickup_date)
        .bind(booking.delivery_date)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Booking", booking.id));
        }
        Ok(())
    }

    async fn list_bookings(
        &self,
        filters: &BookingFilters,
        page: &Pagination,
    ) -> AppResult<Page<Booking>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(status) = filters.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(customer_id) = filters.customer_id {
                builder.push(" AND customer_id = ").push_bind(customer_id);
            }
            if let Some(route_id) = filters.route_id {
                builder.push(" AND route_id = ").push_bind(route_id);
            }
            push_window(builder, "created_at", filters.date_from, filters.date_to);
            if let Some(search) = &filters.search {
                let pattern = format!("%{}%", search);
                builder
                    .push(" AND (booking_number ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR recipient_name ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            if let Some(min) = filters.amount_min {
                builder.push(" AND total_amount >= ").push_bind(min);
            }
            if let Some(max) = filters.amount_max {
                builder.push(" AND total_amount <= ").push_bind(max);
            }
        };

        let mut query = QueryBuilder::new("SELECT * FROM bookings WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items: Vec<Booking> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM bookings WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn bookings_created_in(&self, range: &DateRange) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE created_at >= $1 AND created_at <= $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn bookings_by_statuses(&self, statuses: &[BookingStatus]) -> AppResult<Vec<Booking>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::new("SELECT * FROM bookings WHERE status IN (");
        let mut separated = query.separated(", ");
        for status in statuses {
            separated.push_bind(*status);
        }
        query.push(")");
        let bookings: Vec<Booking> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(bookings)
    }

    async fn bookings_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert_document(&self, document: Document) -> AppResult<Document> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, booking_id, customer_id, document_type, file_name, status,
                 expiry_date, verified_by, rejection_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(document.id)
        .bind(document.booking_id)
        .bind(document.customer_id)
        .bind(document.document_type)
        .bind(&document.file_name)
        .bind(document.status)
        .bind(document.expiry_date)
        .bind(&document.verified_by)
        .bind(&document.rejection_reason)
        .bind(document.created_at)
        .execute(&self.pool)
        .await?;
        Ok(document)
    }

    async fn find_document(&self, id: Uuid) -> AppResult<Option<Document>> {
        let document = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(document)
    }

    async fn update_document(&self, document: &Document) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = $2, expiry_date = $3, verified_by = $4, rejection_reason = $5
            WHERE id = $1
            "#,
        )
        .bind(document.id)
        .bind(document.status)
        .bind(document.expiry_date)
        .bind(&document.verified_by)
        .bind(&document.rejection_reason)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Document", document.id));
        }
        Ok(())
    }

    async fn list_documents(
        &self,
        filters: &DocumentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Document>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(status) = filters.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(document_type) = filters.document_type {
                builder
                    .push(" AND document_type = ")
                    .push_bind(document_type);
            }
            if let Some(booking_id) = filters.booking_id {
                builder.push(" AND booking_id = ").push_bind(booking_id);
            }
            if let Some(customer_id) = filters.customer_id {
                builder.push(" AND customer_id = ").push_bind(customer_id);
            }
            push_window(builder, "created_at", filters.date_from, filters.date_to);
        };

        let mut query = QueryBuilder::new("SELECT * FROM documents WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items: Vec<Document> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM documents WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn documents_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE booking_id = $1 ORDER BY created_at DESC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn documents_by_status(&self, status: DocumentStatus) -> AppResult<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE status = $1")
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(documents)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_payment(&self, payment: Payment) -> AppResult<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, booking_id, customer_id, reference, amount, status, payment_method,
                 payment_date, refunded_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.customer_id)
        .bind(&payment.reference)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(payment.payment_method)
        .bind(payment.payment_date)
        .bind(payment.refunded_at)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    async fn list_payments(
        &self,
        filters: &PaymentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Payment>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(status) = filters.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(method) = filters.payment_method {
                builder.push(" AND payment_method = ").push_bind(method);
            }
            if let Some(booking_id) = filters.booking_id {
                builder.push(" AND booking_id = ").push_bind(booking_id);
            }
            if let Some(customer_id) = filters.customer_id {
                builder.push(" AND customer_id = ").push_bind(customer_id);
            }
            push_window(builder, "created_at", filters.date_from, filters.date_to);
            if let Some(min) = filters.amount_min {
                builder.push(" AND amount >= ").push_bind(min);
            }
            if let Some(max) = filters.amount_max {
                builder.push(" AND amount <= ").push_bind(max);
            }
        };

        let mut query = QueryBuilder::new("SELECT * FROM payments WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let items: Vec<Payment> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM payments WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn payments_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at DESC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn payments_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn payments_by_status(&self, status: PaymentStatus) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE status = $1")
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }

    async fn payments_for_analytics(&self, range: &DateRange) -> AppResult<Vec<Payment>> {
        let window_start = range.preceding().start;
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE (created_at >= $1 AND created_at <= $2)
               OR (payment_date >= $1 AND payment_date <= $2)
               OR (refunded_at >= $1 AND refunded_at <= $2)
            "#,
        )
        .bind(window_start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    async fn settle_payment(
        &self,
        payment_id: Uuid,
        target: PaymentStatus,
        now: DateTime<Utc>,
    ) -> AppResult<(Payment, Booking)> {
        let mut tx = self.pool.begin().await?;

        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| not_found_error("Payment", payment_id))?;
        payment.ensure_transition(target)?;
        let delta = payment.settlement_delta(target);

        let mut booking =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(payment.booking_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| not_found_error("Booking", payment.booking_id))?;
        if !delta.is_zero() {
            booking.apply_payment_delta(delta)?;
        }

        let mut payment = payment;
        payment.status = target;
        match target {
            PaymentStatus::Completed => payment.payment_date = Some(now),
            PaymentStatus::Refunded => payment.refunded_at = Some(now),
            _ => {}
        }

        sqlx::query(
            "UPDATE payments SET status = $2, payment_date = $3, refunded_at = $4 WHERE id = $1",
        )
        .bind(payment.id)
        .bind(payment.status)
        .bind(payment.payment_date)
        .bind(payment.refunded_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE bookings SET paid_amount = $2 WHERE id = $1")
            .bind(booking.id)
            .bind(booking.paid_amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((payment, booking))
    }
}

#[async_trait]
impl ShipmentStore for PgStore {
    async fn insert_shipment(&self, shipment: Shipment) -> AppResult<Shipment> {
        // UNIQUE(booking_id) respalda la relación 1:1 en el schema
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM shipments WHERE booking_id = $1")
                .bind(shipment.booking_id)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(conflict_error(format!(
                "booking {} already has a shipment",
                shipment.booking_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO shipments
                (id, booking_id, carrier_name, vessel_name, status, estimated_arrival,
                 actual_arrival, location_history, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(shipment.id)
        .bind(shipment.booking_id)
        .bind(&shipment.carrier_name)
        .bind(&shipment.vessel_name)
        .bind(shipment.status)
        .bind(shipment.estimated_arrival)
        .bind(shipment.actual_arrival)
        .bind(Json(&shipment.location_history))
        .bind(shipment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(shipment)
    }

    async fn find_shipment(&self, id: Uuid) -> AppResult<Option<Shipment>> {
        let row = sqlx::query_as::<_, ShipmentRow>("SELECT * FROM shipments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Shipment::from))
    }

    async fn find_shipment_by_booking(&self, booking_id: Uuid) -> AppResult<Option<Shipment>> {
        let row = sqlx::query_as::<_, ShipmentRow>("SELECT * FROM shipments WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Shipment::from))
    }

    async fn update_shipment(&self, shipment: &Shipment) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET carrier_name = $2, vessel_name = $3, status = $4, estimated_arrival = $5,
                actual_arrival = $6, location_history = $7
            WHERE id = $1
            "#,
        )
        .bind(shipment.id)
        .bind(&shipment.carrier_name)
        .bind(&shipment.vessel_name)
        .bind(shipment.status)
        .bind(shipment.estimated_arrival)
        .bind(shipment.actual_arrival)
        .bind(Json(&shipment.location_history))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Shipment", shipment.id));
        }
        Ok(())
    }

    async fn list_shipments(
        &self,
        filters: &ShipmentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Shipment>> {
        let push_filters = |builder: &mut QueryBuilder<'_, Postgres>| {
            if let Some(status) = filters.status {
                builder.push(" AND status = ").push_bind(status);
            }
            if let Some(booking_id) = filters.booking_id {
                builder.push(" AND booking_id = ").push_bind(booking_id);
            }
            push_window(builder, "created_at", filters.date_from, filters.date_to);
            if let Some(search) = &filters.search {
                let pattern = format!("%{}%", search);
                builder
                    .push(" AND (carrier_name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR vessel_name ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        };

        let mut query = QueryBuilder::new("SELECT * FROM shipments WHERE 1=1");
        push_filters(&mut query);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let rows: Vec<ShipmentRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM shipments WHERE 1=1");
        push_filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Shipment::from).collect(),
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn shipments_arrived_in(&self, range: &DateRange) -> AppResult<Vec<Shipment>> {
        let rows = sqlx::query_as::<_, ShipmentRow>(
            "SELECT * FROM shipments WHERE actual_arrival >= $1 AND actual_arrival <= $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Shipment::from).collect())
    }

    async fn active_shipments(&self) -> AppResult<Vec<Shipment>> {
        let rows = sqlx::query_as::<_, ShipmentRow>("SELECT * FROM shipments WHERE status != $1")
            .bind(crate::models::shipment::ShipmentStatus::Delivered)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Shipment::from).collect())
    }
}
