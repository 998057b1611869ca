//! Núcleo de dominio del transporte de vehículos
//!
//! Este crate implementa el ciclo de vida completo de una transacción de
//! transporte: una cotización se emite, se aprueba y se convierte en una
//! reserva que acumula documentos y pagos hasta producir un envío seguido
//! a destino, más la analítica derivada de todas esas entidades. La capa
//! HTTP, la autenticación, la entrega de notificaciones y el almacenamiento
//! de archivos son colaboradores externos detrás de los puertos de
//! `storage` y `notifications`.

pub mod config;
pub mod models;
pub mod notifications;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use state::AppState;
pub use utils::errors::{AppError, AppResult};
