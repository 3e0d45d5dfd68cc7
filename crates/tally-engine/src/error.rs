use tally_domain::{Role, RuleError};
use thiserror::Error;
use uuid::Uuid;

use crate::policy::Capability;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Definition not found: {0}")]
    DefinitionNotFound(Uuid),
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(Uuid),
    #[error("Invalid recurrence rule on definition {id}: {source}")]
    InvalidRule {
        id: Uuid,
        #[source]
        source: RuleError,
    },
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Forbidden: role `{role}` may not {capability}")]
    Forbidden { role: Role, capability: Capability },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the error stems from a definition's own data rather than the store.
    pub fn is_definition_fault(&self) -> bool {
        matches!(self, CoreError::InvalidRule { .. })
    }
}
