//! # Action Error Type
//!
//! Unified error type for server actions.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow                                           │
//! │                                                                         │
//! │  Frontend                    Rust Backend                               │
//! │  ────────                    ────────────                               │
//! │                                                                         │
//! │  action('create_payment')                                               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │  Action Function                                                 │   │
//! │  │  Result<T, ActionError>                                          │   │
//! │  │         │                                                        │   │
//! │  │  DbError / CoreError ──► ActionError { code, message, field } ──►│   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  { "code": "SLOT_UNAVAILABLE",                                          │
//! │    "message": "El horario seleccionado no está disponible...",          │
//! │    "field": "fecha_hora_inicio" }                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages are in Spanish - the caller's language - and
//! field-attributed where a form input is to blame. Expected domain
//! failures never panic and never surface raw storage errors; truly
//! unexpected failures are logged server-side and collapse into a
//! generic retry prompt.

use clinica_core::{CoreError, ValidationError};
use clinica_db::DbError;
use serde::Serialize;
use tracing::error;

/// Error returned from server actions.
///
/// ## Serialization
/// This is what the frontend receives when an action fails:
/// ```json
/// {
///   "code": "VALIDATION_FAILED",
///   "message": "El campo justificacion debe tener al menos 10 caracteres",
///   "field": "justificacion"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable Spanish message for display
    pub message: String,

    /// Form field the error attributes itself to, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Error codes for action responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No valid identity. Always checked first.
    Unauthenticated,

    /// Valid identity, insufficient role for this operation.
    Unauthorized,

    /// Referenced entity does not exist.
    NotFound,

    /// Malformed or missing input, caught before any storage call.
    ValidationFailed,

    /// Status-machine rule violated.
    InvalidTransition,

    /// Booking overlap: the doctor already has an appointment in that
    /// interval.
    SlotUnavailable,

    /// Entity is not in the state the operation requires.
    InvalidState,

    /// Concurrent modification or contention; the user should re-check
    /// and retry deliberately.
    Conflict,

    /// Unexpected failure; logged server-side, generic retry prompt.
    Internal,
}

impl ActionError {
    /// Creates a new action error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ActionError {
            code,
            message: message.into(),
            field: None,
        }
    }

    /// Attaches the form field the error belongs to.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// No valid session.
    pub fn unauthenticated() -> Self {
        ActionError::new(ErrorCode::Unauthenticated, "Debe iniciar sesión para continuar")
    }

    /// Insufficient role.
    pub fn unauthorized(action: &str) -> Self {
        ActionError::new(
            ErrorCode::Unauthorized,
            format!("No tiene permisos para {action}"),
        )
    }

    /// Field-attributed validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ActionError::new(ErrorCode::ValidationFailed, message).with_field(field)
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ActionError {}

// =============================================================================
// Conversions
// =============================================================================

/// Spanish, field-attributed rendering of core validation errors.
fn validation_message(err: &ValidationError) -> String {
    match err {
        ValidationError::Required { field } => format!("El campo {field} es obligatorio"),
        ValidationError::TooShort { field, min } => {
            format!("El campo {field} debe tener al menos {min} caracteres")
        }
        ValidationError::TooLong { field, max } => {
            format!("El campo {field} debe tener como máximo {max} caracteres")
        }
        ValidationError::MustBePositive { field } => {
            format!("El campo {field} debe ser mayor que cero")
        }
        ValidationError::OutOfRange { field, min, max } => {
            format!("El campo {field} debe estar entre {min} y {max}")
        }
        ValidationError::InvalidFormat { field, .. } => format!("El campo {field} no es válido"),
        ValidationError::InvalidTimeRange { .. } => {
            "La hora de fin debe ser posterior a la hora de inicio".to_string()
        }
        ValidationError::ReceiptRequired { method, .. } => {
            format!("El método {method} requiere adjuntar el comprobante")
        }
    }
}

impl From<CoreError> for ActionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { entity, from, to } => ActionError::new(
                ErrorCode::InvalidTransition,
                format!("No se puede cambiar la {entity} de {from} a {to}"),
            ),
            CoreError::PaymentOutOfBalance { .. } => ActionError::validation(
                "metodos",
                "Los montos de los métodos de pago no coinciden con el total",
            ),
            CoreError::Validation(v) => {
                let field = v.field().to_string();
                ActionError::validation(field, validation_message(&v))
            }
        }
    }
}

impl From<DbError> for ActionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ActionError::new(
                ErrorCode::NotFound,
                format!("No se encontró {entity} ({id})"),
            ),
            DbError::SlotUnavailable { field } => ActionError::new(
                ErrorCode::SlotUnavailable,
                "El horario seleccionado no está disponible para el médico",
            )
            .with_field(field),
            DbError::StatusConflict { .. } => ActionError::new(
                ErrorCode::Conflict,
                "El registro fue modificado por otro usuario, vuelva a cargarlo e intente de nuevo",
            ),
            DbError::InvalidState { entity, status, .. } => ActionError::new(
                ErrorCode::InvalidState,
                format!("{entity} está en estado {status}, la operación no está permitida"),
            ),
            DbError::AlreadyClosed { closing_id, date } => ActionError::new(
                ErrorCode::Conflict,
                format!("Ya existe un cierre para la fecha {date} (cierre {closing_id})"),
            ),
            DbError::InsufficientStock {
                product,
                available,
                requested,
            } => ActionError::new(
                ErrorCode::Conflict,
                format!("Stock insuficiente de {product}: disponible {available}, solicitado {requested}"),
            ),
            DbError::Unauthorized { action, .. } => ActionError::unauthorized(action),
            DbError::Domain(core) => core.into(),
            DbError::ForeignKeyViolation { .. } => ActionError::new(
                ErrorCode::ValidationFailed,
                "Alguno de los datos hace referencia a un registro inexistente",
            ),
            DbError::UniqueViolation { .. } => ActionError::new(
                ErrorCode::Conflict,
                "El registro ya existe, vuelva a cargar la página",
            ),
            DbError::Busy => ActionError::new(
                ErrorCode::Conflict,
                "El sistema está procesando otra operación, intente nuevamente",
            ),
            // Unexpected storage failures: log and collapse
            other => {
                error!(error = %other, "unexpected storage failure");
                ActionError::new(
                    ErrorCode::Internal,
                    "Ocurrió un error inesperado, intente nuevamente",
                )
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_unavailable_names_start_field() {
        let err: ActionError = DbError::SlotUnavailable {
            field: "fecha_hora_inicio",
        }
        .into();

        assert_eq!(err.code, ErrorCode::SlotUnavailable);
        assert_eq!(err.field.as_deref(), Some("fecha_hora_inicio"));
    }

    #[test]
    fn test_invalid_transition_message_in_spanish_with_labels() {
        let err: ActionError = CoreError::InvalidTransition {
            entity: "cita",
            from: "Completada",
            to: "En Atención",
        }
        .into();

        assert_eq!(err.code, ErrorCode::InvalidTransition);
        assert!(err.message.contains("Completada"));
        assert!(err.message.contains("En Atención"));
    }

    #[test]
    fn test_validation_error_field_attribution() {
        let err: ActionError = CoreError::Validation(ValidationError::TooShort {
            field: "justificacion".to_string(),
            min: 10,
        })
        .into();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.field.as_deref(), Some("justificacion"));
        assert!(err.message.contains("al menos 10"));
    }

    #[test]
    fn test_unexpected_errors_collapse_to_generic_message() {
        let err: ActionError = DbError::QueryFailed("syntax error near SELECT".to_string()).into();
        assert_eq!(err.code, ErrorCode::Internal);
        // Raw storage details never reach the user
        assert!(!err.message.contains("SELECT"));
    }

    #[test]
    fn test_serialization_shape() {
        let err = ActionError::validation("descuento", "El campo descuento debe estar entre 0 y 5000");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION_FAILED");
        assert_eq!(json["field"], "descuento");
    }
}
