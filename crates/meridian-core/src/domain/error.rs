//! Domain-level error taxonomy for MERIDIAN.

/// Errors produced by illegal lifecycle transitions on domain records.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("finding for {task} is already terminal ({status})")]
    FindingAlreadyTerminal { task: String, status: String },

    #[error("investigation {0} is already finalized")]
    AlreadyFinalized(String),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
