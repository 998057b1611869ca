//! Services module
//!
//! Este módulo contiene la lógica de negocio de la aplicación. Los
//! servicios orquestan el ciclo de vida completo: cotización, reserva,
//! documentos, pagos, envío y la analítica derivada de todo lo anterior.

pub mod analytics_service;
pub mod booking_service;
pub mod customer_service;
pub mod document_service;
pub mod payment_service;
pub mod quote_service;
pub mod route_service;
pub mod shipment_service;
pub mod vehicle_service;

pub use analytics_service::AnalyticsService;
pub use booking_service::BookingService;
pub use customer_service::CustomerService;
pub use document_service::DocumentService;
pub use payment_service::PaymentService;
pub use quote_service::QuoteService;
pub use route_service::RouteService;
pub use shipment_service::ShipmentService;
pub use vehicle_service::VehicleService;
