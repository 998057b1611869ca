//! Modelo de Document
//!
//! Flujo de verificación de documentos. Cada documento nace `pending`;
//! aprobar o rechazar son las únicas operaciones que lo vuelven terminal y
//! ambas registran al verificador. Un documento corregido es un registro
//! nuevo, nunca la mutación de uno rechazado. La expiración se evalúa de
//! forma perezosa igual que en las cotizaciones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::models::route::Route;
use crate::models::vehicle::VehicleType;
use crate::utils::errors::{conflict_error, validation_error, AppError, AppResult};

/// Tipo de documento - mapea al ENUM document_type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    VehicleTitle,
    PurchaseInvoice,
    OwnerId,
    InsuranceCertificate,
    CustomsDeclaration,
    CommercialInvoice,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::VehicleTitle => "vehicle_title",
            DocumentType::PurchaseInvoice => "purchase_invoice",
            DocumentType::OwnerId => "owner_id",
            DocumentType::InsuranceCertificate => "insurance_certificate",
            DocumentType::CustomsDeclaration => "customs_declaration",
            DocumentType::CommercialInvoice => "commercial_invoice",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "vehicle_title" => Ok(DocumentType::VehicleTitle),
            "purchase_invoice" => Ok(DocumentType::PurchaseInvoice),
            "owner_id" => Ok(DocumentType::OwnerId),
            "insurance_certificate" => Ok(DocumentType::InsuranceCertificate),
            "customs_declaration" => Ok(DocumentType::CustomsDeclaration),
            "commercial_invoice" => Ok(DocumentType::CommercialInvoice),
            other => Err(validation_error(format!(
                "unknown document type '{}'",
                other
            ))),
        }
    }
}

/// Estado del documento - mapea al ENUM document_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "document_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// Document principal - mapea a la tabla documents
///
/// Pertenece a una reserva o directamente a un cliente; al menos una de las
/// dos referencias debe existir.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub booking_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub document_type: DocumentType,
    pub file_name: String,
    pub status: DocumentStatus,
    pub expiry_date: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Estado efectivo: un documento con `expiry_date` vencida se reporta
    /// expirado salvo que ya esté rechazado.
    pub fn effective_status(&self, now: DateTime<Utc>) -> DocumentStatus {
        if self.status == DocumentStatus::Rejected {
            return self.status;
        }
        match self.expiry_date {
            Some(expiry) if now > expiry => DocumentStatus::Expired,
            _ => self.status,
        }
    }

    /// Solo un documento pendiente admite revisión; el re-review de un
    /// terminal es Conflict.
    pub fn ensure_reviewable(&self, now: DateTime<Utc>) -> AppResult<()> {
        match self.effective_status(now) {
            DocumentStatus::Pending => Ok(()),
            DocumentStatus::Expired => Err(conflict_error(format!(
                "document {} is expired; a new document must be submitted",
                self.id
            ))),
            other => Err(conflict_error(format!(
                "document {} was already {}; submit a new document instead",
                self.id,
                match other {
                    DocumentStatus::Approved => "approved",
                    DocumentStatus::Rejected => "rejected",
                    _ => "reviewed",
                }
            ))),
        }
    }

    /// Un requisito solo lo satisface un documento efectivamente aprobado
    pub fn satisfies_requirement(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == DocumentStatus::Approved
    }

    /// Aprobado y con vencimiento dentro de la ventana de aviso
    pub fn is_expiring_within(&self, now: DateTime<Utc>, days: i64) -> bool {
        self.status == DocumentStatus::Approved
            && match self.expiry_date {
                Some(expiry) => expiry > now && expiry <= now + Duration::days(days),
                None => false,
            }
    }
}

/// Conjunto de documentos requeridos para una reserva.
///
/// Depende de la ruta (aduanas) y del tipo de vehículo.
pub fn required_documents(route: &Route, vehicle_type: VehicleType) -> Vec<DocumentType> {
    let mut required = vec![
        DocumentType::VehicleTitle,
        DocumentType::PurchaseInvoice,
        DocumentType::OwnerId,
        DocumentType::InsuranceCertificate,
    ];
    if route.requires_customs {
        required.push(DocumentType::CustomsDeclaration);
    }
    if vehicle_type == VehicleType::CommercialTruck {
        required.push(DocumentType::CommercialInvoice);
    }
    required
}

/// Documentos faltantes: requeridos menos los tipos cubiertos por documentos
/// efectivamente aprobados. Los pendientes y rechazados no cuentan.
pub fn missing_documents(
    required: &[DocumentType],
    documents: &[Document],
    now: DateTime<Utc>,
) -> Vec<DocumentType> {
    required
        .iter()
        .copied()
        .filter(|doc_type| {
            !documents
                .iter()
                .any(|d| d.document_type == *doc_type && d.satisfies_requirement(now))
        })
        .collect()
}

/// Request para registrar un documento subido
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitDocumentRequest {
    pub booking_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub document_type: DocumentType,

    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    pub expiry_date: Option<DateTime<Utc>>,
}

impl SubmitDocumentRequest {
    pub fn validate_owner(&self) -> AppResult<()> {
        if self.booking_id.is_none() && self.customer_id.is_none() {
            return Err(validation_error(
                "document requires a booking_id or a customer_id",
            ));
        }
        Ok(())
    }
}

/// Filtros para búsqueda de documentos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilters {
    pub status: Option<DocumentStatus>,
    pub document_type: Option<DocumentType>,
    pub booking_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}
