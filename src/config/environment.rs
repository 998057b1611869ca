//! Configuración de variables de entorno
//!
//! Este módulo maneja los umbrales configurables del ciclo de vida.
//! Todos tienen valores por defecto y pueden sobreescribirse por entorno.

use std::env;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Días de validez de una cotización nueva
    pub quote_validity_days: i64,
    /// Días tras los que un pago pendiente se considera vencido
    pub overdue_payment_days: i64,
    /// Horas tras las que una reserva pendiente requiere atención
    pub attention_pending_hours: i64,
    /// Días tras los que un pago pendiente entra al reporte de atención
    pub attention_payment_days: i64,
    /// Ventana de aviso para documentos por expirar
    pub document_expiry_warning_days: i64,
    /// Longitud del código de acceso de un solo uso
    pub access_code_length: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            quote_validity_days: 14,
            overdue_payment_days: 30,
            attention_pending_hours: 72,
            attention_payment_days: 7,
            document_expiry_warning_days: 30,
            access_code_length: 8,
        }
    }
}

impl EnvironmentConfig {
    /// Cargar configuración desde variables de entorno, con defaults
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            quote_validity_days: read_i64("QUOTE_VALIDITY_DAYS", defaults.quote_validity_days),
            overdue_payment_days: read_i64("OVERDUE_PAYMENT_DAYS", defaults.overdue_payment_days),
            attention_pending_hours: read_i64(
                "ATTENTION_PENDING_HOURS",
                defaults.attention_pending_hours,
            ),
            attention_payment_days: read_i64(
                "ATTENTION_PAYMENT_DAYS",
                defaults.attention_payment_days,
            ),
            document_expiry_warning_days: read_i64(
                "DOCUMENT_EXPIRY_WARNING_DAYS",
                defaults.document_expiry_warning_days,
            ),
            access_code_length: read_i64("ACCESS_CODE_LENGTH", defaults.access_code_length as i64)
                as usize,
        }
    }
}

fn read_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.overdue_payment_days, 30);
        assert_eq!(config.attention_pending_hours, 72);
        assert_eq!(config.attention_payment_days, 7);
    }
}
