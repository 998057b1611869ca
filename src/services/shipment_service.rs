//! Servicio de envíos
//!
//! El envío se crea una sola vez por reserva confirmada y avanza
//! preparing → in_transit → customs → delivered, con `delayed` como estado
//! re-entrable. El historial de ubicaciones solo crece; la detección de
//! retraso es un predicado derivado de la estimación de llegada.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::models::booking::BookingStatus;
use crate::models::shipment::{
    validate_shipment_transition, CreateShipmentRequest, Shipment, ShipmentFilters, ShipmentStatus,
};
use crate::storage::{BookingStore, Page, Pagination, RouteStore, ShipmentStore, Store};
use crate::utils::errors::{conflict_error, not_found_error, validation_error, AppResult};

#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn Store>,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Crea el envío 1:1 de una reserva confirmada.
    ///
    /// Una reserva pendiente o cancelada no puede tener envío; un segundo
    /// envío para la misma reserva falla con Conflict en el puerto. Sin
    /// estimación explícita se proyecta la de la ruta.
    pub async fn create_shipment(&self, request: CreateShipmentRequest) -> AppResult<Shipment> {
        request.validate()?;

        let booking = self
            .store
            .find_booking(request.booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", request.booking_id))?;
        match booking.status {
            BookingStatus::Pending => {
                return Err(conflict_error(format!(
                    "booking {} must be confirmed before shipping",
                    booking.booking_number
                )))
            }
            BookingStatus::Cancelled => {
                return Err(conflict_error(format!(
                    "booking {} is cancelled",
                    booking.booking_number
                )))
            }
            _ => {}
        }

        let now = Utc::now();
        let estimated_arrival = match request.estimated_arrival {
            Some(estimated) => Some(estimated),
            None => {
                let route = self
                    .store
                    .find_route(booking.route_id)
                    .await?
                    .ok_or_else(|| not_found_error("Route", booking.route_id))?;
                Some(now + Duration::days(route.estimated_days as i64))
            }
        };

        let shipment = Shipment {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            carrier_name: request.carrier_name,
            vessel_name: request.vessel_name,
            status: ShipmentStatus::Preparing,
            estimated_arrival,
            actual_arrival: None,
            location_history: Vec::new(),
            created_at: now,
        };

        let shipment = self.store.insert_shipment(shipment).await?;
        info!(
            shipment_id = %shipment.id,
            booking_id = %shipment.booking_id,
            carrier = %shipment.carrier_name,
            "shipment created"
        );
        Ok(shipment)
    }

    pub async fn get_shipment(&self, id: Uuid) -> AppResult<Shipment> {
        self.store
            .find_shipment(id)
            .await?
            .ok_or_else(|| not_found_error("Shipment", id))
    }

    pub async fn get_shipment_by_booking(&self, booking_id: Uuid) -> AppResult<Shipment> {
        self.store
            .find_shipment_by_booking(booking_id)
            .await?
            .ok_or_else(|| not_found_error("Shipment for booking", booking_id))
    }

    pub async fn list_shipments(
        &self,
        filters: &ShipmentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Shipment>> {
        self.store.list_shipments(filters, page).await
    }

    /// Avanza el estado del envío; `delivered` registra la llegada real
    pub async fn update_status(&self, id: Uuid, target: &str) -> AppResult<Shipment> {
        let target = ShipmentStatus::parse(target)?;
        let mut shipment = self.get_shipment(id).await?;
        validate_shipment_transition(shipment.status, target)?;

        shipment.status = target;
        if target == ShipmentStatus::Delivered {
            shipment.actual_arrival = Some(Utc::now());
        }
        self.store.update_shipment(&shipment).await?;

        if target == ShipmentStatus::Delayed {
            warn!(shipment_id = %shipment.id, "shipment marked delayed");
        } else {
            info!(
                shipment_id = %shipment.id,
                status = target.as_str(),
                "shipment status changed"
            );
        }
        Ok(shipment)
    }

    /// Agrega una entrada al historial de ubicaciones
    pub async fn record_location(
        &self,
        id: Uuid,
        location: &str,
        note: Option<String>,
    ) -> AppResult<Shipment> {
        if location.trim().is_empty() {
            return Err(validation_error("location cannot be empty"));
        }
        let mut shipment = self.get_shipment(id).await?;
        shipment.record_location(location.to_string(), note, Utc::now());
        self.store.update_shipment(&shipment).await?;
        Ok(shipment)
    }

    /// Envíos activos cuya estimación de llegada ya venció
    pub async fn delayed_shipments(&self) -> AppResult<Vec<Shipment>> {
        let now = Utc::now();
        let active = self.store.active_shipments().await?;
        Ok(active.into_iter().filter(|s| s.is_delayed(now)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::Booking;
    use crate::models::route::Route;
    use crate::storage::memory::MemoryStore;
    use crate::utils::errors::AppError;
    use rust_decimal_macros::dec;

    async fn seed_booking(store: &MemoryStore, status: BookingStatus) -> Booking {
        let route = store
            .insert_route(Route {
                id: Uuid::new_v4(),
                origin: "Baltimore".to_string(),
                destination: "Tema".to_string(),
                base_price: dec!(2500),
                estimated_days: 30,
                requires_customs: true,
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_booking(Booking {
                id: Uuid::new_v4(),
                booking_number: "BK-SHIP0001".to_string(),
                customer_id: Uuid::new_v4(),
                route_id: route.id,
                vehicle_id: Uuid::new_v4(),
                quote_id: None,
                status,
                total_amount: dec!(2000),
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

    fn shipment_request(booking_id: Uuid) -> CreateShipmentRequest {
        CreateShipmentRequest {
            booking_id,
            carrier_name: "Grimaldi Lines".to_string(),
            vessel_name: Some("Grande Africa".to_string()),
            estimated_arrival: None,
        }
    }

    #[tokio::test]
    async fn test_shipment_requires_confirmed_booking() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());

        let pending = seed_booking(&store, BookingStatus::Pending).await;
        let err = svc
            .create_shipment(shipment_request(pending.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let cancelled = seed_booking(&store, BookingStatus::Cancelled).await;
        let err = svc
            .create_shipment(shipment_request(cancelled.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let confirmed = seed_booking(&store, BookingStatus::Confirmed).await;
        let shipment = svc
            .create_shipment(shipment_request(confirmed.id))
            .await
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Preparing);
        // estimación proyectada desde los días de la ruta
        assert!(shipment.estimated_arrival.is_some());
    }

    #[tokio::test]
    async fn test_one_shipment_per_booking() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());
        let booking = seed_booking(&store, BookingStatus::Confirmed).await;

        svc.create_shipment(shipment_request(booking.id)).await.unwrap();
        let err = svc
            .create_shipment(shipment_request(booking.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delivery_records_actual_arrival() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());
        let booking = seed_booking(&store, BookingStatus::InTransit).await;

        let shipment = svc.create_shipment(shipment_request(booking.id)).await.unwrap();
        let shipment = svc.update_status(shipment.id, "in_transit").await.unwrap();
        let shipment = svc.update_status(shipment.id, "customs").await.unwrap();
        let shipment = svc.update_status(shipment.id, "delivered").await.unwrap();

        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        assert!(shipment.actual_arrival.is_some());

        // entregado es terminal
        let err = svc.update_status(shipment.id, "delayed").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delayed_roundtrip() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());
        let booking = seed_booking(&store, BookingStatus::Confirmed).await;

        let shipment = svc.create_shipment(shipment_request(booking.id)).await.unwrap();
        let shipment = svc.update_status(shipment.id, "delayed").await.unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Delayed);

        // el retraso se retoma hacia el camino normal
        let shipment = svc.update_status(shipment.id, "in_transit").await.unwrap();
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
    }

    #[tokio::test]
    async fn test_unknown_status_is_validation() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());
        let booking = seed_booking(&store, BookingStatus::Confirmed).await;

        let shipment = svc.create_shipment(shipment_request(booking.id)).await.unwrap();
        let err = svc.update_status(shipment.id, "lost").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_location_history_grows() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());
        let booking = seed_booking(&store, BookingStatus::Confirmed).await;

        let shipment = svc.create_shipment(shipment_request(booking.id)).await.unwrap();
        svc.record_location(shipment.id, "Port of Baltimore", None)
            .await
            .unwrap();
        let shipment = svc
            .record_location(
                shipment.id,
                "Atlantic crossing",
                Some("rough weather".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(shipment.location_history.len(), 2);
        assert_eq!(
            shipment.last_known_location().unwrap().location,
            "Atlantic crossing"
        );

        let err = svc
            .record_location(shipment.id, "  ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delayed_report() {
        let store = Arc::new(MemoryStore::new());
        let svc = ShipmentService::new(store.clone());
        let booking = seed_booking(&store, BookingStatus::Confirmed).await;

        let mut request = shipment_request(booking.id);
        request.estimated_arrival = Some(Utc::now() - Duration::days(2));
        let shipment = svc.create_shipment(request).await.unwrap();

        let delayed = svc.delayed_shipments().await.unwrap();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].id, shipment.id);

        // una vez entregado sale del reporte aunque haya llegado tarde
        svc.update_status(shipment.id, "delivered").await.unwrap();
        let delayed = svc.delayed_shipments().await.unwrap();
        assert!(delayed.is_empty());
    }
}
