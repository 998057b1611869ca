//! Modelos de Analytics
//!
//! Métricas derivadas del ciclo de vida: embudo de conversión, ingresos,
//! desempeño de entregas, niveles de clientes y retención. Todo es de solo
//! lectura y se calcula como un fold puro sobre filas ya cargadas; ninguna
//! función de este módulo muta entidades. Toda razón con denominador cero
//! vale 0, nunca un error de división.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::booking::{Booking, BookingStatus};
use crate::models::customer::CustomerTier;
use crate::models::payment::{Payment, PaymentMethod};
use crate::models::quote::{Quote, QuoteStatus};
use crate::models::shipment::Shipment;

/// Intervalo cerrado [start, end]; los agregados siempre lo reciben del
/// llamador, esta capa no asume ventanas implícitas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Ventana inmediatamente anterior de igual longitud, para tasas de
    /// crecimiento.
    pub fn preceding(&self) -> DateRange {
        let length = self.end - self.start;
        DateRange {
            start: self.start - length,
            end: self.start,
        }
    }
}

/// Razón segura: 0 cuando el denominador es 0
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Crecimiento relativo (actual - anterior) / anterior; 0 si no hay base
pub fn growth_rate(current: Decimal, previous: Decimal) -> f64 {
    if previous.is_zero() {
        0.0
    } else {
        ((current - previous) / previous).to_f64().unwrap_or(0.0)
    }
}

/// Embudo de conversión: cotizaciones → aprobadas → convertidas → entregadas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionFunnel {
    pub quotes_created: usize,
    pub quotes_approved: usize,
    pub quotes_converted: usize,
    pub bookings_delivered: usize,
    /// aprobadas / creadas
    pub approval_rate: f64,
    /// convertidas / aprobadas
    pub conversion_rate: f64,
    /// entregadas / convertidas
    pub completion_rate: f64,
}

/// Calcula el embudo sobre la cohorte creada dentro del rango.
///
/// Una cotización convertida cuenta también como aprobada: pasó por esa
/// etapa aunque el estado almacenado ya sea `converted`.
pub fn conversion_funnel(quotes: &[Quote], bookings: &[Booking], range: &DateRange) -> ConversionFunnel {
    let in_range: Vec<&Quote> = quotes
        .iter()
        .filter(|q| range.contains(q.created_at))
        .collect();

    let quotes_created = in_range.len();
    let quotes_approved = in_range
        .iter()
        .filter(|q| matches!(q.status, QuoteStatus::Approved | QuoteStatus::Converted))
        .count();
    let quotes_converted = in_range
        .iter()
        .filter(|q| q.status == QuoteStatus::Converted)
        .count();
    let bookings_delivered = bookings
        .iter()
        .filter(|b| {
            range.contains(b.created_at)
                && matches!(b.status, BookingStatus::Delivered | BookingStatus::Completed)
        })
        .count();

    ConversionFunnel {
        quotes_created,
        quotes_approved,
        quotes_converted,
        bookings_delivered,
        approval_rate: ratio(quotes_approved, quotes_created),
        conversion_rate: ratio(quotes_converted, quotes_approved),
        completion_rate: ratio(bookings_delivered, quotes_converted),
    }
}

/// Ingresos por método de pago
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodRevenue {
    pub method: PaymentMethod,
    pub amount: Decimal,
}

/// Resumen de ingresos de una ventana
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevenueSummary {
    /// Pagos completados dentro de la ventana
    pub gross_revenue: Decimal,
    /// Reembolsos emitidos dentro de la ventana
    pub refunded_revenue: Decimal,
    /// gross - refunded; puede ser negativo y se reporta tal cual
    pub net_revenue: Decimal,
    /// Neto de la ventana anterior de igual longitud
    pub previous_net_revenue: Decimal,
    pub growth_rate: f64,
    pub by_method: Vec<MethodRevenue>,
}

/// Ingresos: solo los pagos que llegaron a completarse cuentan; el momento
/// relevante es `payment_date` para el ingreso y `refunded_at` para el
/// reembolso, de modo que un reembolso tardío descuenta en su propia ventana
/// (el neto puede quedar negativo).
pub fn revenue_summary(payments: &[Payment], range: &DateRange) -> RevenueSummary {
    let gross_revenue = gross_in(payments, range);
    let refunded_revenue: Decimal = payments
        .iter()
        .filter(|p| matches!(p.refunded_at, Some(at) if range.contains(at)))
        .map(|p| p.amount)
        .sum();
    let net_revenue = gross_revenue - refunded_revenue;

    let previous = range.preceding();
    let previous_refunded: Decimal = payments
        .iter()
        .filter(|p| matches!(p.refunded_at, Some(at) if previous.contains(at)))
        .map(|p| p.amount)
        .sum();
    let previous_net_revenue = gross_in(payments, &previous) - previous_refunded;

    let mut per_method: HashMap<PaymentMethod, Decimal> = HashMap::new();
    for payment in payments {
        if matches!(payment.payment_date, Some(at) if range.contains(at)) {
            *per_method.entry(payment.payment_method).or_default() += payment.amount;
        }
    }
    let mut by_method: Vec<MethodRevenue> = per_method
        .into_iter()
        .map(|(method, amount)| MethodRevenue { method, amount })
        .collect();
    by_method.sort_by(|a, b| b.amount.cmp(&a.amount));

    RevenueSummary {
        gross_revenue,
        refunded_revenue,
        net_revenue,
        previous_net_revenue,
        growth_rate: growth_rate(net_revenue, previous_net_revenue),
        by_method,
    }
}

fn gross_in(payments: &[Payment], range: &DateRange) -> Decimal {
    payments
        .iter()
        .filter(|p| matches!(p.payment_date, Some(at) if range.contains(at)))
        .map(|p| p.amount)
        .sum()
}

/// Desempeño por método de pago
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodPerformance {
    pub method: PaymentMethod,
    pub attempted: usize,
    pub completed: usize,
    /// completados / intentados
    pub success_rate: f64,
    /// Horas promedio entre registro y confirmación
    pub average_processing_hours: f64,
}

/// Desempeño por método sobre los pagos registrados dentro del rango
pub fn payment_method_performance(payments: &[Payment], range: &DateRange) -> Vec<MethodPerformance> {
    let mut grouped: HashMap<PaymentMethod, Vec<&Payment>> = HashMap::new();
    for payment in payments.iter().filter(|p| range.contains(p.created_at)) {
        grouped.entry(payment.payment_method).or_default().push(payment);
    }

    let mut performance: Vec<MethodPerformance> = grouped
        .into_iter()
        .map(|(method, group)| {
            let attempted = group.len();
            let completed_payments: Vec<&&Payment> =
                group.iter().filter(|p| p.payment_date.is_some()).collect();
            let completed = completed_payments.len();
            let total_hours: f64 = completed_payments
                .iter()
                .filter_map(|p| p.processing_hours())
                .sum();
            let average_processing_hours = if completed == 0 {
                0.0
            } else {
                total_hours / completed as f64
            };
            MethodPerformance {
                method,
                attempted,
                completed,
                success_rate: ratio(completed, attempted),
                average_processing_hours,
            }
        })
        .collect();
    performance.sort_by(|a, b| b.attempted.cmp(&a.attempted));
    performance
}

/// Desempeño de entregas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPerformance {
    pub total_delivered: usize,
    pub on_time_deliveries: usize,
    /// a tiempo / entregas con ambas fechas
    pub on_time_rate: f64,
    /// Días promedio de retraso de las entregas tardías
    pub average_delay_days: f64,
}

/// Entregas cuya llegada real cae dentro del rango
pub fn delivery_performance(shipments: &[Shipment], range: &DateRange) -> DeliveryPerformance {
    let delivered: Vec<&Shipment> = shipments
        .iter()
        .filter(|s| matches!(s.actual_arrival, Some(at) if range.contains(at)))
        .collect();

    let measurable: Vec<&&Shipment> = delivered.iter().filter(|s| s.on_time().is_some()).collect();
    let on_time_deliveries = measurable
        .iter()
        .filter(|s| s.on_time() == Some(true))
        .count();

    let late_days: Vec<i64> = measurable
        .iter()
        .filter_map(|s| s.delay_days())
        .filter(|days| *days > 0)
        .collect();
    let average_delay_days = if late_days.is_empty() {
        0.0
    } else {
        late_days.iter().sum::<i64>() as f64 / late_days.len() as f64
    };

    DeliveryPerformance {
        total_delivered: delivered.len(),
        on_time_deliveries,
        on_time_rate: ratio(on_time_deliveries, measurable.len()),
        average_delay_days,
    }
}

/// Distribución de clientes por nivel derivado
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TierDistribution {
    pub bronze: usize,
    pub silver: usize,
    pub gold: usize,
    pub platinum: usize,
}

impl TierDistribution {
    pub fn total(&self) -> usize {
        self.bronze + self.silver + self.gold + self.platinum
    }
}

/// Agrupa gastos acumulados por nivel; el nivel nunca se lee de la base,
/// siempre se deriva del gasto.
pub fn tier_distribution<I>(spends: I) -> TierDistribution
where
    I: IntoIterator<Item = Decimal>,
{
    let mut distribution = TierDistribution::default();
    for spent in spends {
        match CustomerTier::for_spend(spent) {
            CustomerTier::Bronze => distribution.bronze += 1,
            CustomerTier::Silver => distribution.silver += 1,
            CustomerTier::Gold => distribution.gold += 1,
            CustomerTier::Platinum => distribution.platinum += 1,
        }
    }
    distribution
}

/// Retención de clientes en una cohorte
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionMetrics {
    /// Clientes con al menos una reserva en la cohorte
    pub customers_with_bookings: usize,
    /// Clientes con más de una reserva
    pub repeat_customers: usize,
    pub repeat_rate: f64,
}

/// Cohorte: reservas creadas dentro del rango
pub fn retention(bookings: &[Booking], range: &DateRange) -> RetentionMetrics {
    let mut bookings_per_customer: HashMap<uuid::Uuid, usize> = HashMap::new();
    for booking in bookings.iter().filter(|b| range.contains(b.created_at)) {
        *bookings_per_customer.entry(booking.customer_id).or_default() += 1;
    }

    let customers_with_bookings = bookings_per_customer.len();
    let repeat_customers = bookings_per_customer
        .values()
        .filter(|count| **count > 1)
        .count();

    RetentionMetrics {
        customers_with_bookings,
        repeat_customers,
        repeat_rate: ratio(repeat_customers, customers_with_bookings),
    }
}

/// Resumen compuesto para el dashboard administrativo
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub range: DateRange,
    pub funnel: ConversionFunnel,
    pub revenue: RevenueSummary,
    pub delivery: DeliveryPerformance,
    pub tiers: TierDistribution,
    pub retention: RetentionMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::PaymentStatus;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn range_of_days(days_ago_start: i64, days_ago_end: i64) -> DateRange {
        let now = Utc::now();
        DateRange::new(
            now - Duration::days(days_ago_start),
            now - Duration::days(days_ago_end),
        )
    }

    fn payment(
        method: PaymentMethod,
        amount: Decimal,
        status: PaymentStatus,
        created_days_ago: i64,
        completed_days_ago: Option<i64>,
        refunded_days_ago: Option<i64>,
    ) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            reference: "PAY".to_string(),
            amount,
            status,
            payment_method: method,
            payment_date: completed_days_ago.map(|d| now - Duration::days(d)),
            refunded_at: refunded_days_ago.map(|d| now - Duration::days(d)),
            created_at: now - Duration::days(created_days_ago),
        }
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(5, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }

    #[test]
    fn test_growth_rate_zero_base() {
        assert_eq!(growth_rate(dec!(1000), dec!(0)), 0.0);
        assert_eq!(growth_rate(dec!(1500), dec!(1000)), 0.5);
        assert_eq!(growth_rate(dec!(500), dec!(1000)), -0.5);
    }

    #[test]
    fn test_preceding_window_has_equal_length() {
        let range = range_of_days(30, 0);
        let previous = range.preceding();
        assert_eq!(previous.end, range.start);
        assert_eq!(previous.end - previous.start, range.end - range.start);
    }

    #[test]
    fn test_empty_funnel_is_all_zeroes() {
        let funnel = conversion_funnel(&[], &[], &range_of_days(30, 0));
        assert_eq!(funnel.quotes_created, 0);
        assert_eq!(funnel.approval_rate, 0.0);
        assert_eq!(funnel.conversion_rate, 0.0);
        assert_eq!(funnel.completion_rate, 0.0);
    }

    #[test]
    fn test_revenue_net_can_go_negative() {
        // pago completado hace 40 días, reembolsado hace 5: la ventana de los
        // últimos 30 días solo ve el reembolso
        let payments = vec![payment(
            PaymentMethod::Card,
            dec!(2000),
            PaymentStatus::Refunded,
            45,
            Some(40),
            Some(5),
        )];
        let summary = revenue_summary(&payments, &range_of_days(30, 0));
        assert_eq!(summary.gross_revenue, dec!(0));
        assert_eq!(summary.refunded_revenue, dec!(2000));
        assert_eq!(summary.net_revenue, dec!(-2000));
    }

    #[test]
    fn test_revenue_growth_against_previous_window() {
        let payments = vec![
            // ventana anterior (60..30 días atrás)
            payment(
                PaymentMethod::BankTransfer,
                dec!(1000),
                PaymentStatus::Completed,
                50,
                Some(45),
                None,
            ),
            // ventana actual
            payment(
                PaymentMethod::BankTransfer,
                dec!(1500),
                PaymentStatus::Completed,
                10,
                Some(8),
                None,
            ),
        ];
        let summary = revenue_summary(&payments, &range_of_days(30, 0));
        assert_eq!(summary.gross_revenue, dec!(1500));
        assert_eq!(summary.previous_net_revenue, dec!(1000));
        assert_eq!(summary.growth_rate, 0.5);
    }

    #[test]
    fn test_method_performance_zero_denominators() {
        let payments = vec![payment(
            PaymentMethod::MobileMoney,
            dec!(300),
            PaymentStatus::Pending,
            5,
            None,
            None,
        )];
        let perf = payment_method_performance(&payments, &range_of_days(30, 0));
        assert_eq!(perf.len(), 1);
        assert_eq!(perf[0].attempted, 1);
        assert_eq!(perf[0].completed, 0);
        assert_eq!(perf[0].success_rate, 0.0);
        assert_eq!(perf[0].average_processing_hours, 0.0);
    }

    #[test]
    fn test_tier_distribution() {
        let distribution = tier_distribution(vec![
            dec!(500),
            dec!(12000),
            dec!(30000),
            dec!(80000),
            dec!(80000),
        ]);
        assert_eq!(distribution.bronze, 1);
        assert_eq!(distribution.silver, 1);
        assert_eq!(distribution.gold, 1);
        assert_eq!(distribution.platinum, 2);
        assert_eq!(distribution.total(), 5);
    }

    #[test]
    fn test_retention_repeat_rate() {
        let now = Utc::now();
        let repeat_customer = Uuid::new_v4();
        let single_customer = Uuid::new_v4();
        let mk_booking = |customer_id: Uuid| Booking {
            id: Uuid::new_v4(),
            booking_number: "BK".to_string(),
            customer_id,
            route_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            quote_id: None,
            status: BookingStatus::Confirmed,
            total_amount: dec!(1000),
            paid_amount: dec!(0),
            recipient_name: "R".to_string(),
            recipient_phone: "+233000000".to_string(),
            pickup_date: None,
            delivery_date: None,
            created_at: now - Duration::days(3),
        };

        let bookings = vec![
            mk_booking(repeat_customer),
            mk_booking(repeat_customer),
            mk_booking(single_customer),
        ];
        let metrics = retention(&bookings, &range_of_days(30, 0));
        assert_eq!(metrics.customers_with_bookings, 2);
        assert_eq!(metrics.repeat_customers, 1);
        assert_eq!(metrics.repeat_rate, 0.5);

        let empty = retention(&[], &range_of_days(30, 0));
        assert_eq!(empty.repeat_rate, 0.0);
    }
}
