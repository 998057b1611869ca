//! Servicio de clientes
//!
//! Alta de clientes y el perfil con totales recalculados. Los contadores
//! `total_bookings`/`total_spent` no viven en la tabla: se recomputan desde
//! las reservas y los pagos en cada lectura, así el nivel derivado nunca se
//! desfasa de los registros reales.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::customer::{
    CreateCustomerRequest, Customer, CustomerFilters, CustomerProfile, CustomerStatus,
    CustomerTier,
};
use crate::models::payment::PaymentStatus;
use crate::storage::{BookingStore, CustomerStore, Page, Pagination, PaymentStore, Store};
use crate::utils::errors::{not_found_error, AppResult};

#[derive(Clone)]
pub struct CustomerService {
    store: Arc<dyn Store>,
}

impl CustomerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_customer(&self, request: CreateCustomerRequest) -> AppResult<Customer> {
        request.validate()?;

        let customer = Customer {
            id: Uuid::new_v4(),
            full_name: request.full_name,
            email: request.email,
            phone: request.phone,
            country: request.country,
            status: CustomerStatus::Active,
            created_at: Utc::now(),
        };

        let customer = self.store.insert_customer(customer).await?;
        info!(customer_id = %customer.id, "customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: Uuid) -> AppResult<Customer> {
        self.store
            .find_customer(id)
            .await?
            .ok_or_else(|| not_found_error("Customer", id))
    }

    pub async fn list_customers(
        &self,
        filters: &CustomerFilters,
        page: &Pagination,
    ) -> AppResult<Page<Customer>> {
        self.store.list_customers(filters, page).await
    }

    /// Perfil con totales recalculados y nivel derivado.
    ///
    /// `total_spent` suma los pagos completados del cliente; un pago
    /// reembolsado ya no cuenta porque dejó de estar `completed`.
    pub async fn customer_profile(&self, id: Uuid) -> AppResult<CustomerProfile> {
        let customer = self.get_customer(id).await?;
        let bookings = self.store.bookings_by_customer(id).await?;
        let payments = self.store.payments_by_customer(id).await?;

        let total_spent: Decimal = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .map(|p| p.amount)
            .sum();

        Ok(CustomerProfile {
            tier: CustomerTier::for_spend(total_spent),
            total_bookings: bookings.len() as i64,
            total_spent,
            customer,
        })
    }

    /// Cambia el estado administrativo del cliente
    pub async fn set_customer_status(&self, id: Uuid, status: &str) -> AppResult<Customer> {
        let status = CustomerStatus::parse(status)?;
        let mut customer = self.get_customer(id).await?;
        customer.status = status;
        self.store.update_customer(&customer).await?;
        info!(customer_id = %customer.id, status = status.as_str(), "customer status changed");
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{Booking, BookingStatus};
    use crate::models::payment::{Payment, PaymentMethod};
    use crate::storage::memory::MemoryStore;
    use crate::utils::errors::AppError;
    use rust_decimal_macros::dec;

    fn create_request() -> CreateCustomerRequest {
        CreateCustomerRequest {
            full_name: "Kofi Adjei".to_string(),
            email: "kofi@example.com".to_string(),
            phone: Some("+233501234567".to_string()),
            country: Some("Ghana".to_string()),
        }
    }

    async fn seed_booking(store: &MemoryStore, customer_id: Uuid) -> Booking {
        store
            .insert_booking(Booking {
                id: Uuid::new_v4(),
                booking_number: "BK-CUST0001".to_string(),
                customer_id,
                route_id: Uuid::new_v4(),
                vehicle_id: Uuid::new_v4(),
                quote_id: None,
                status: BookingStatus::Confirmed,
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

    async fn seed_payment(
        store: &MemoryStore,
        customer_id: Uuid,
        amount: Decimal,
        status: PaymentStatus,
    ) {
        store
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                booking_id: Uuid::new_v4(),
                customer_id,
                reference: "PAY-CUST".to_string(),
                amount,
                status,
                payment_method: PaymentMethod::Card,
                payment_date: None,
                refunded_at: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let store = Arc::new(MemoryStore::new());
        let svc = CustomerService::new(store);

        let customer = svc.create_customer(create_request()).await.unwrap();
        assert_eq!(customer.status, CustomerStatus::Active);

        let fetched = svc.get_customer(customer.id).await.unwrap();
        assert_eq!(fetched.email, "kofi@example.com");
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let store = Arc::new(MemoryStore::new());
        let svc = CustomerService::new(store);

        let mut request = create_request();
        request.email = "not-an-email".to_string();
        let err = svc.create_customer(request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_profile_recomputes_totals() {
        let store = Arc::new(MemoryStore::new());
        let svc = CustomerService::new(store.clone());

        let customer = svc.create_customer(create_request()).await.unwrap();
        seed_booking(&store, customer.id).await;
        seed_booking(&store, customer.id).await;
        seed_payment(&store, customer.id, dec!(12000), PaymentStatus::Completed).await;
        seed_payment(&store, customer.id, dec!(3000), PaymentStatus::Pending).await;
        seed_payment(&store, customer.id, dec!(9000), PaymentStatus::Refunded).await;

        let profile = svc.customer_profile(customer.id).await.unwrap();
        assert_eq!(profile.total_bookings, 2);
        // solo el pago completado cuenta
        assert_eq!(profile.total_spent, dec!(12000));
        assert_eq!(profile.tier, CustomerTier::Silver);
    }

    #[tokio::test]
    async fn test_status_change() {
        let store = Arc::new(MemoryStore::new());
        let svc = CustomerService::new(store);

        let customer = svc.create_customer(create_request()).await.unwrap();
        let suspended = svc
            .set_customer_status(customer.id, "suspended")
            .await
            .unwrap();
        assert_eq!(suspended.status, CustomerStatus::Suspended);

        let err = svc
            .set_customer_status(customer.id, "banned")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
