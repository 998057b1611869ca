//! Servicio de analítica
//!
//! Lado de lectura puro: este servicio solo trae filas por rango y delega
//! el cálculo en las funciones de `models::analytics`. No muta entidades y
//! sus consultas corren sin bloqueos junto a las mutaciones del ciclo de
//! vida. Todo rango lo decide el llamador; aquí no hay ventanas implícitas.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::analytics::{
    conversion_funnel, delivery_performance, payment_method_performance, retention,
    revenue_summary, tier_distribution, ConversionFunnel, DashboardSummary, DateRange,
    DeliveryPerformance, MethodPerformance, RetentionMetrics, RevenueSummary, TierDistribution,
};
use crate::models::payment::{Payment, PaymentStatus};
use crate::storage::{BookingStore, CustomerStore, PaymentStore, QuoteStore, ShipmentStore, Store};
use crate::utils::errors::AppResult;

/// Gasto acumulado por cliente: pagos completados, neto de reembolsos.
///
/// Un pago reembolsado ya no está `completed`, así que queda fuera solo.
fn spend_by_customer(payments: &[Payment]) -> HashMap<Uuid, Decimal> {
    let mut spend: HashMap<Uuid, Decimal> = HashMap::new();
    for payment in payments {
        if payment.status == PaymentStatus::Completed {
            *spend.entry(payment.customer_id).or_default() += payment.amount;
        }
    }
    spend
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Embudo cotizaciones → aprobadas → convertidas → entregadas
    pub async fn conversion_funnel(&self, range: &DateRange) -> AppResult<ConversionFunnel> {
        let quotes = self.store.quotes_created_in(range).await?;
        let bookings = self.store.bookings_created_in(range).await?;
        Ok(conversion_funnel(&quotes, &bookings, range))
    }

    /// Ingresos de la ventana con crecimiento contra la ventana anterior
    pub async fn revenue_summary(&self, range: &DateRange) -> AppResult<RevenueSummary> {
        let payments = self.store.payments_for_analytics(range).await?;
        Ok(revenue_summary(&payments, range))
    }

    /// Tasa de éxito y tiempo de procesamiento por método de pago
    pub async fn payment_method_performance(
        &self,
        range: &DateRange,
    ) -> AppResult<Vec<MethodPerformance>> {
        let payments = self.store.payments_for_analytics(range).await?;
        Ok(payment_method_performance(&payments, range))
    }

    /// Entregas a tiempo sobre entregas medibles del rango
    pub async fn delivery_performance(&self, range: &DateRange) -> AppResult<DeliveryPerformance> {
        let shipments = self.store.shipments_arrived_in(range).await?;
        Ok(delivery_performance(&shipments, range))
    }

    /// Distribución de clientes por nivel derivado del gasto histórico
    pub async fn customer_tiers(&self) -> AppResult<TierDistribution> {
        let customers = self.store.all_customers().await?;
        let completed = self
            .store
            .payments_by_status(PaymentStatus::Completed)
            .await?;
        let spend = spend_by_customer(&completed);
        Ok(tier_distribution(customers.iter().map(|c| {
            spend.get(&c.id).copied().unwrap_or(Decimal::ZERO)
        })))
    }

    /// Tasa de clientes repetidos en la cohorte del rango
    pub async fn retention(&self, range: &DateRange) -> AppResult<RetentionMetrics> {
        let bookings = self.store.bookings_created_in(range).await?;
        Ok(retention(&bookings, range))
    }

    /// Composición de todas las métricas para el dashboard administrativo
    pub async fn dashboard_summary(&self, range: &DateRange) -> AppResult<DashboardSummary> {
        Ok(DashboardSummary {
            range: *range,
            funnel: self.conversion_funnel(range).await?,
            revenue: self.revenue_summary(range).await?,
            delivery: self.delivery_performance(range).await?,
            tiers: self.customer_tiers().await?,
            retention: self.retention(range).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer::{Customer, CustomerStatus};
    use crate::models::payment::PaymentMethod;
    use crate::storage::memory::MemoryStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn last_30_days() -> DateRange {
        let now = Utc::now();
        DateRange::new(now - Duration::days(30), now)
    }

    async fn seed_customer(store: &MemoryStore) -> Customer {
        store
            .insert_customer(Customer {
                id: Uuid::new_v4(),
                full_name: "Kofi Adjei".to_string(),
                email: "kofi@example.com".to_string(),
                phone: None,
                country: None,
                status: CustomerStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    async fn seed_completed_payment(store: &MemoryStore, customer_id: Uuid, amount: Decimal) {
        let now = Utc::now();
        store
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                booking_id: Uuid::new_v4(),
                customer_id,
                reference: "PAY-AN".to_string(),
                amount,
                status: PaymentStatus::Completed,
                payment_method: PaymentMethod::BankTransfer,
                payment_date: Some(now - Duration::days(3)),
                refunded_at: None,
                created_at: now - Duration::days(5),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_world_yields_zeroes() {
        let store = Arc::new(MemoryStore::new());
        let svc = AnalyticsService::new(store);
        let range = last_30_days();

        let summary = svc.dashboard_summary(&range).await.unwrap();
        assert_eq!(summary.funnel.quotes_created, 0);
        assert_eq!(summary.funnel.conversion_rate, 0.0);
        assert_eq!(summary.revenue.gross_revenue, dec!(0));
        assert_eq!(summary.revenue.growth_rate, 0.0);
        assert_eq!(summary.delivery.on_time_rate, 0.0);
        assert_eq!(summary.tiers.total(), 0);
        assert_eq!(summary.retention.repeat_rate, 0.0);
    }

    #[tokio::test]
    async fn test_tiers_follow_net_spend() {
        let store = Arc::new(MemoryStore::new());
        let svc = AnalyticsService::new(store.clone());

        let bronze = seed_customer(&store).await;
        seed_completed_payment(&store, bronze.id, dec!(2000)).await;

        let gold = seed_customer(&store).await;
        seed_completed_payment(&store, gold.id, dec!(30000)).await;

        // sin pagos: bronze
        seed_customer(&store).await;

        let tiers = svc.customer_tiers().await.unwrap();
        assert_eq!(tiers.bronze, 2);
        assert_eq!(tiers.gold, 1);
        assert_eq!(tiers.total(), 3);
    }

    #[tokio::test]
    async fn test_revenue_flows_from_store() {
        let store = Arc::new(MemoryStore::new());
        let svc = AnalyticsService::new(store.clone());
        let customer = seed_customer(&store).await;
        seed_completed_payment(&store, customer.id, dec!(1500)).await;

        let summary = svc.revenue_summary(&last_30_days()).await.unwrap();
        assert_eq!(summary.gross_revenue, dec!(1500));
        assert_eq!(summary.net_revenue, dec!(1500));
        assert_eq!(summary.by_method.len(), 1);
    }

    #[test]
    fn test_spend_ignores_non_completed() {
        let now = Utc::now();
        let customer_id = Uuid::new_v4();
        let mk = |status: PaymentStatus| Payment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            customer_id,
            reference: "PAY".to_string(),
            amount: dec!(100),
            status,
            payment_method: PaymentMethod::Card,
            payment_date: None,
            refunded_at: None,
            created_at: now,
        };
        let payments = vec![
            mk(PaymentStatus::Completed),
            mk(PaymentStatus::Pending),
            mk(PaymentStatus::Refunded),
            mk(PaymentStatus::Failed),
        ];
        let spend = spend_by_customer(&payments);
        assert_eq!(spend.get(&customer_id).copied(), Some(dec!(100)));
    }
}
