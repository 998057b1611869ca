//! Shared application state
//!
//! Este módulo arma el estado compartido que la capa HTTP (colaborador
//! externo) recibe: todos los servicios cableados sobre el mismo mundo de
//! persistencia y el mismo puerto de notificaciones.

use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::notifications::Notifier;
use crate::services::{
    AnalyticsService, BookingService, CustomerService, DocumentService, PaymentService,
    QuoteService, RouteService, ShipmentService, VehicleService,
};
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub customers: CustomerService,
    pub vehicles: VehicleService,
    pub routes: RouteService,
    pub quotes: QuoteService,
    pub bookings: BookingService,
    pub documents: DocumentService,
    pub payments: PaymentService,
    pub shipments: ShipmentService,
    pub analytics: AnalyticsService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: EnvironmentConfig,
    ) -> Self {
        Self {
            customers: CustomerService::new(store.clone()),
            vehicles: VehicleService::new(store.clone()),
            routes: RouteService::new(store.clone()),
            quotes: QuoteService::new(store.clone(), notifier.clone(), config.clone()),
            bookings: BookingService::new(store.clone(), notifier.clone(), config.clone()),
            documents: DocumentService::new(store.clone(), config.clone()),
            payments: PaymentService::new(store.clone(), notifier, config.clone()),
            shipments: ShipmentService::new(store.clone()),
            analytics: AnalyticsService::new(store),
            config,
        }
    }
}
