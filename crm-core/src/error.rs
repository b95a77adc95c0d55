//! Error types for CRM operations

use crate::{ContractStatus, EntityId, EntityType, ImportStatus, Role};
use chrono::NaiveDate;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: EntityId },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: EntityId,
        reason: String,
    },

    #[error("Duplicate {entity_type}: {reason}")]
    Conflict { entity_type: EntityType, reason: String },

    #[error("Corrupt {entity_type} row: {reason}")]
    Corrupt { entity_type: EntityType, reason: String },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Referenced {entity_type} {id} does not exist")]
    ReferenceNotFound { entity_type: EntityType, id: EntityId },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// CSV import errors that reject a whole file or batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Import file is empty")]
    EmptyFile,

    #[error("No recognisable columns in header: {headers:?}")]
    NoMappableColumns { headers: Vec<String> },

    #[error("Import file has more than {max} data rows")]
    TooManyRows { max: usize },

    #[error("Import file exceeds {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("Malformed CSV at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("Import batch {batch_id} is {status}, expected Staged")]
    InvalidState {
        batch_id: EntityId,
        status: ImportStatus,
    },
}

/// Service schedule errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Service contract {contract_id} is {status}, expected Active")]
    ContractNotActive {
        contract_id: EntityId,
        status: ContractStatus,
    },

    #[error("Date {date} is before contract start {start}")]
    BeforeStart { date: NaiveDate, start: NaiveDate },

    #[error("Date {date} is after contract end {end}")]
    AfterEnd { date: NaiveDate, end: NaiveDate },

    #[error("Service interval must be at least one day, got {days}")]
    InvalidInterval { days: u32 },

    #[error("Date arithmetic overflow from {date}")]
    Overflow { date: NaiveDate },
}

/// Authorization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Role {role} may not {action}")]
    Forbidden { role: Role, action: String },

    #[error("Role {role} may only {action} records it owns")]
    NotOwner { role: Role, action: String },
}

/// Master error type for all CRM domain errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),
}

/// Result type alias for CRM operations.
pub type CrmResult<T> = Result<T, CrmError>;
