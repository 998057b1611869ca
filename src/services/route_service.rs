//! Servicio de rutas
//!
//! Administración del catálogo origen/destino. Las cotizaciones congelan el
//! precio base al emitirse, así que editar o desactivar una ruta solo
//! afecta cotizaciones futuras.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::route::{CreateRouteRequest, Route, RouteFilters};
use crate::storage::{Page, Pagination, RouteStore, Store};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

#[derive(Clone)]
pub struct RouteService {
    store: Arc<dyn Store>,
}

impl RouteService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_route(&self, request: CreateRouteRequest) -> AppResult<Route> {
        request.validate()?;
        if request.base_price <= Decimal::ZERO {
            return Err(validation_error("base_price must be positive"));
        }

        let route = Route {
            id: Uuid::new_v4(),
            origin: request.origin,
            destination: request.destination,
            base_price: request.base_price,
            estimated_days: request.estimated_days,
            requires_customs: request.requires_customs.unwrap_or(false),
            is_active: true,
            created_at: Utc::now(),
        };

        let route = self.store.insert_route(route).await?;
        info!(
            route_id = %route.id,
            origin = %route.origin,
            destination = %route.destination,
            "route created"
        );
        Ok(route)
    }

    pub async fn get_route(&self, id: Uuid) -> AppResult<Route> {
        self.store
            .find_route(id)
            .await?
            .ok_or_else(|| not_found_error("Route", id))
    }

    pub async fn list_routes(
        &self,
        filters: &RouteFilters,
        page: &Pagination,
    ) -> AppResult<Page<Route>> {
        self.store.list_routes(filters, page).await
    }

    /// Activa o retira una ruta del catálogo sin tocar cotizaciones emitidas
    pub async fn set_route_active(&self, id: Uuid, is_active: bool) -> AppResult<Route> {
        let mut route = self.get_route(id).await?;
        route.is_active = is_active;
        self.store.update_route(&route).await?;
        info!(route_id = %route.id, is_active, "route availability changed");
        Ok(route)
    }
}
