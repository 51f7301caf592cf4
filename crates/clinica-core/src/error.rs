//! # Error Types
//!
//! Domain-specific error types for clinica-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  clinica-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  clinica-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures and storage-level conflicts    │
//! │                                                                         │
//! │  clinica-actions errors (separate crate)                                │
//! │  └── ActionError      - What the frontend sees (code + Spanish message) │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ActionError → Frontend   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (status labels, amounts, field names)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message downstream

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They are expected
/// outcomes, recovered at the orchestration boundary and translated to
/// user-facing messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status transition outside the entity's transition table.
    ///
    /// Carries the human labels of both statuses so the UI can display
    /// e.g. "Completada" and "En Atención" without a lookup.
    #[error("{entity}: invalid status transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    /// The payment methods do not add up to the payment total.
    ///
    /// ## Invariant
    /// sum(methods.amount) == subtotal - discount, exactly. Amounts are
    /// integer cents, so no epsilon is involved.
    #[error("payment out of balance: methods sum to {methods_cents} but total is {total_cents}")]
    PaymentOutOfBalance {
        total_cents: i64,
        methods_cents: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when user input doesn't meet requirements. Used for early
/// validation before business logic runs; each variant knows which form
/// field it belongs to so the frontend can attribute the message.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid id, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// An interval whose end does not come after its start.
    #[error("{field}: end must be after start")]
    InvalidTimeRange { field: String },

    /// An electronic payment method without a receipt reference.
    #[error("{field}: receipt reference is required for {method}")]
    ReceiptRequired { field: String, method: String },
}

impl ValidationError {
    /// The form field this error attributes itself to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::InvalidTimeRange { field }
            | ValidationError::ReceiptRequired { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_carries_labels() {
        let err = CoreError::InvalidTransition {
            entity: "cita",
            from: "Completada",
            to: "En Atención",
        };
        let msg = err.to_string();
        assert!(msg.contains("Completada"));
        assert!(msg.contains("En Atención"));
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "justificacion".to_string(),
        };
        assert_eq!(err.to_string(), "justificacion is required");

        let err = ValidationError::TooShort {
            field: "justificacion".to_string(),
            min: 10,
        };
        assert_eq!(err.to_string(), "justificacion must be at least 10 characters");
        assert_eq!(err.field(), "justificacion");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "motivo".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
