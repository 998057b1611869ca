//! Servicio del registro de vehículos
//!
//! El tipo de vehículo alimenta el conjunto de documentos requeridos de la
//! reserva; las cotizaciones guardan un snapshot del vehículo en lugar de
//! una referencia viva.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::vehicle::{RegisterVehicleRequest, Vehicle};
use crate::storage::{CustomerStore, Store, VehicleStore};
use crate::utils::errors::{not_found_error, AppResult};

#[derive(Clone)]
pub struct VehicleService {
    store: Arc<dyn Store>,
}

impl VehicleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn register_vehicle(&self, request: RegisterVehicleRequest) -> AppResult<Vehicle> {
        request.validate()?;
        self.store
            .find_customer(request.customer_id)
            .await?
            .ok_or_else(|| not_found_error("Customer", request.customer_id))?;

        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            customer_id: request.customer_id,
            make: request.make,
            model: request.model,
            year: request.year,
            vin: request.vin,
            vehicle_type: request.vehicle_type,
            created_at: Utc::now(),
        };

        let vehicle = self.store.insert_vehicle(vehicle).await?;
        info!(
            vehicle_id = %vehicle.id,
            vehicle_type = vehicle.vehicle_type.as_str(),
            "vehicle registered"
        );
        Ok(vehicle)
    }

    pub async fn get_vehicle(&self, id: Uuid) -> AppResult<Vehicle> {
        self.store
            .find_vehicle(id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    pub async fn list_vehicles_by_customer(&self, customer_id: Uuid) -> AppResult<Vec<Vehicle>> {
        self.store.vehicles_by_customer(customer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer::{Customer, CustomerStatus};
    use crate::models::vehicle::VehicleType;
    use crate::storage::memory::MemoryStore;
    use crate::utils::errors::AppError;

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

    fn register_request(customer_id: Uuid) -> RegisterVehicleRequest {
        RegisterVehicleRequest {
            customer_id,
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2019,
            vin: Some("1NXBR32E84Z995078".to_string()),
            vehicle_type: VehicleType::Sedan,
        }
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let store = Arc::new(MemoryStore::new());
        let customer = seed_customer(&store).await;
        let svc = VehicleService::new(store);

        let vehicle = svc.register_vehicle(register_request(customer.id)).await.unwrap();
        assert_eq!(vehicle.vehicle_type, VehicleType::Sedan);

        let vehicles = svc.list_vehicles_by_customer(customer.id).await.unwrap();
        assert_eq!(vehicles.len(), 1);

        let snapshot = vehicles[0].details();
        assert_eq!(snapshot.make, "Toyota");
        assert_eq!(snapshot.vehicle_type, VehicleType::Sedan);
    }

    #[tokio::test]
    async fn test_unknown_customer_rejected() {
        let store = Arc::new(MemoryStore::new());
        let svc = VehicleService::new(store);

        let err = svc
            .register_vehicle(register_request(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_year_bounds_validated() {
        let store = Arc::new(MemoryStore::new());
        let customer = seed_customer(&store).await;
        let svc = VehicleService::new(store);

        let mut request = register_request(customer.id);
        request.year = 1880;
        let err = svc.register_vehicle(request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
