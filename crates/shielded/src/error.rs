//! Error types for shielded wallet operations

use thiserror::Error;

/// Result type for shielded wallet operations
pub type ShieldedResult<T> = Result<T, ShieldedError>;

/// Errors that can occur during shielded wallet operations
///
/// Every variant is recoverable: callers retry with corrected input or
/// re-attempt signing.
#[derive(Error, Debug)]
pub enum ShieldedError {
    #[error("Signature request was rejected")]
    SignatureRejected,

    #[error("Key derivation failed: {0}")]
    DerivationError(String),

    #[error("Duplicate note: {0}")]
    DuplicateNote(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: String, requested: String },

    #[error("Note already spent: {0}")]
    NoteAlreadySpent(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Privacy keys are not initialized")]
    KeysNotInitialized,

    #[error("Privacy keys are already initialized with a different key pair")]
    KeysAlreadyInitialized,

    #[error("Note store is view-only and cannot spend")]
    ViewOnly,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Invalid transaction status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("Operation cancelled before commit")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Payload-free discriminant of [`ShieldedError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SignatureRejected,
    DerivationError,
    DuplicateNote,
    InsufficientFunds,
    NoteAlreadySpent,
    InvalidAmount,
    KeysNotInitialized,
    KeysAlreadyInitialized,
    ViewOnly,
    InvalidAddress,
    NoteNotFound,
    TransactionNotFound,
    InvalidStatusTransition,
    ProofGenerationFailed,
    Cancelled,
    SerializationError,
    Other,
}

impl ShieldedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShieldedError::SignatureRejected => ErrorKind::SignatureRejected,
            ShieldedError::DerivationError(_) => ErrorKind::DerivationError,
            ShieldedError::DuplicateNote(_) => ErrorKind::DuplicateNote,
            ShieldedError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ShieldedError::NoteAlreadySpent(_) => ErrorKind::NoteAlreadySpent,
            ShieldedError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            ShieldedError::KeysNotInitialized => ErrorKind::KeysNotInitialized,
            ShieldedError::KeysAlreadyInitialized => ErrorKind::KeysAlreadyInitialized,
            ShieldedError::ViewOnly => ErrorKind::ViewOnly,
            ShieldedError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            ShieldedError::NoteNotFound(_) => ErrorKind::NoteNotFound,
            ShieldedError::TransactionNotFound(_) => ErrorKind::TransactionNotFound,
            ShieldedError::InvalidStatusTransition { .. } => ErrorKind::InvalidStatusTransition,
            ShieldedError::ProofGenerationFailed(_) => ErrorKind::ProofGenerationFailed,
            ShieldedError::Cancelled => ErrorKind::Cancelled,
            ShieldedError::SerializationError(_) => ErrorKind::SerializationError,
            ShieldedError::Other(_) => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for ShieldedError {
    fn from(err: serde_json::Error) -> Self {
        ShieldedError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_variants() {
        assert_eq!(ShieldedError::SignatureRejected.kind(), ErrorKind::SignatureRejected);
        assert_eq!(
            ShieldedError::InsufficientFunds {
                available: "0.5".into(),
                requested: "1".into(),
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(ShieldedError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_serde_json_error_converts() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let converted: ShieldedError = err.into();
        assert_eq!(converted.kind(), ErrorKind::SerializationError);
    }
}
