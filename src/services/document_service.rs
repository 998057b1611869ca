//! Servicio de verificación de documentos
//!
//! Cada documento entra como registro nuevo en estado pendiente; aprobar y
//! rechazar son las únicas revisiones posibles y siempre registran al actor.
//! Un documento corregido es un registro nuevo: el re-review de uno terminal
//! falla con Conflict.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::EnvironmentConfig;
use crate::models::document::{
    missing_documents, required_documents, Document, DocumentFilters, DocumentStatus, DocumentType,
    SubmitDocumentRequest,
};
use crate::storage::{
    BookingStore, CustomerStore, DocumentStore, Page, Pagination, RouteStore, Store, VehicleStore,
};
use crate::utils::errors::{not_found_error, validation_error, AppResult};

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn Store>,
    config: EnvironmentConfig,
}

impl DocumentService {
    pub fn new(store: Arc<dyn Store>, config: EnvironmentConfig) -> Self {
        Self { store, config }
    }

    /// Registra un documento subido; siempre nace pendiente
    pub async fn submit_document(&self, request: SubmitDocumentRequest) -> AppResult<Document> {
        request.validate()?;
        request.validate_owner()?;

        if let Some(booking_id) = request.booking_id {
            self.store
                .find_booking(booking_id)
                .await?
                .ok_or_else(|| not_found_error("Booking", booking_id))?;
        }
        if let Some(customer_id) = request.customer_id {
            self.store
                .find_customer(customer_id)
                .await?
                .ok_or_else(|| not_found_error("Customer", customer_id))?;
        }

        let document = Document {
            id: Uuid::new_v4(),
            booking_id: request.booking_id,
            customer_id: request.customer_id,
            document_type: request.document_type,
            file_name: request.file_name,
            status: DocumentStatus::Pending,
            expiry_date: request.expiry_date,
            verified_by: None,
            rejection_reason: None,
            created_at: Utc::now(),
        };

        let document = self.store.insert_document(document).await?;
        info!(
            document_id = %document.id,
            document_type = document.document_type.as_str(),
            "document submitted"
        );
        Ok(document)
    }

    pub async fn get_document(&self, id: Uuid) -> AppResult<Document> {
        let mut document = self
            .store
            .find_document(id)
            .await?
            .ok_or_else(|| not_found_error("Document", id))?;
        document.status = document.effective_status(Utc::now());
        Ok(document)
    }

    pub async fn list_documents(
        &self,
        filters: &DocumentFilters,
        page: &Pagination,
    ) -> AppResult<Page<Document>> {
        self.store.list_documents(filters, page).await
    }

    /// Aprueba un documento pendiente registrando al verificador
    pub async fn approve_document(&self, id: Uuid, actor: &str) -> AppResult<Document> {
        let now = Utc::now();
        let mut document = self
            .store
            .find_document(id)
            .await?
            .ok_or_else(|| not_found_error("Document", id))?;
        document.ensure_reviewable(now)?;

        document.status = DocumentStatus::Approved;
        document.verified_by = Some(actor.to_string());
        self.store.update_document(&document).await?;

        info!(document_id = %document.id, actor = actor, "document approved");
        Ok(document)
    }

    /// Rechaza un documento pendiente; el motivo no puede quedar vacío
    pub async fn reject_document(&self, id: Uuid, actor: &str, reason: &str) -> AppResult<Document> {
        if reason.trim().is_empty() {
            return Err(validation_error("rejection requires a reason"));
        }
        let now = Utc::now();
        let mut document = self
            .store
            .find_document(id)
            .await?
            .ok_or_else(|| not_found_error("Document", id))?;
        document.ensure_reviewable(now)?;

        document.status = DocumentStatus::Rejected;
        document.verified_by = Some(actor.to_string());
        document.rejection_reason = Some(reason.to_string());
        self.store.update_document(&document).await?;

        info!(document_id = %document.id, actor = actor, "document rejected");
        Ok(document)
    }

    /// Tipos requeridos para la reserva que aún no cubre ningún documento
    /// efectivamente aprobado
    pub async fn missing_documents(&self, booking_id: Uuid) -> AppResult<Vec<DocumentType>> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", booking_id))?;
        let route = self
            .store
            .find_route(booking.route_id)
            .await?
            .ok_or_else(|| not_found_error("Route", booking.route_id))?;
        let vehicle = self
            .store
            .find_vehicle(booking.vehicle_id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", booking.vehicle_id))?;

        let documents = self.store.documents_by_booking(booking_id).await?;
        let required = required_documents(&route, vehicle.vehicle_type);
        Ok(missing_documents(&required, &documents, Utc::now()))
    }

    /// Completo cuando el conjunto requerido quedó cubierto por aprobados
    pub async fn documents_complete(&self, booking_id: Uuid) -> AppResult<bool> {
        Ok(self.missing_documents(booking_id).await?.is_empty())
    }

    /// Documentos aprobados cuyo vencimiento cae dentro de la ventana de
    /// aviso configurada
    pub async fn expiring_documents(&self, within_days: Option<i64>) -> AppResult<Vec<Document>> {
        let now = Utc::now();
        let window = within_days.unwrap_or(self.config.document_expiry_warning_days);
        let approved = self
            .store
            .documents_by_status(DocumentStatus::Approved)
            .await?;
        Ok(approved
            .into_iter()
            .filter(|d| d.is_expiring_within(now, window))
            .collect())
    }
}
