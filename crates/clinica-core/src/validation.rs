//! # Validation Module
//!
//! Business rule validation, run by the orchestration layer before any
//! storage call.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend forms                                                │
//! │  ├── Basic format checks, live character count on justifications        │
//! │  └── Immediate user feedback                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Server action (Rust)                                          │
//! │  └── THIS MODULE: business rule validation, field-attributed errors     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  ├── UNIQUE constraints (invoice numbers, closing per date)             │
//! │  └── Foreign key constraints                                            │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{NewPayment, NewPaymentMethod};
use crate::{MAX_LINE_QUANTITY, MIN_JUSTIFICATION_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Text Validators
// =============================================================================

/// Validates a mandatory justification text (void, cancellation, reopen,
/// cash variance, rejection).
///
/// ## Rules
/// - Must be present and non-empty after trimming
/// - Must be at least [`MIN_JUSTIFICATION_LEN`] characters
///
/// ## Returns
/// The trimmed justification.
///
/// ## Example
/// ```rust
/// use clinica_core::validation::validate_justification;
///
/// assert!(validate_justification("justificacion", Some("Cobro duplicado al paciente")).is_ok());
/// assert!(validate_justification("justificacion", Some("corta")).is_err());
/// assert!(validate_justification("justificacion", None).is_err());
/// ```
pub fn validate_justification(field: &str, text: Option<&str>) -> ValidationResult<String> {
    let text = text.unwrap_or("").trim();

    if text.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if text.chars().count() < MIN_JUSTIFICATION_LEN {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min: MIN_JUSTIFICATION_LEN,
        });
    }

    Ok(text.to_string())
}

/// Validates a required free-text field (supplier name, return reason).
pub fn validate_required_text(field: &str, text: &str, max: usize) -> ValidationResult<String> {
    let text = text.trim();

    if text.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if text.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(text.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Interval Validator
// =============================================================================

/// Validates an appointment time range: end strictly after start.
pub fn validate_time_range(
    field: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ValidationResult<()> {
    if end <= start {
        return Err(ValidationError::InvalidTimeRange {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Payment Validators
// =============================================================================

/// Validates that every electronic method carries a receipt reference.
pub fn validate_receipts(methods: &[NewPaymentMethod]) -> ValidationResult<()> {
    for method in methods {
        if method.method.is_electronic()
            && method
                .receipt_path
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ValidationError::ReceiptRequired {
                field: "metodos".to_string(),
                method: method.method.label().to_string(),
            });
        }
    }
    Ok(())
}

/// Validates a payment payload before the transactional call.
///
/// ## Checks (in order)
/// 1. At least one item; every item has a valid quantity and a
///    non-negative price
/// 2. Discount in [0, subtotal]; discount > 0 requires a justification
/// 3. At least one method; every amount positive; electronic methods
///    carry receipts
/// 4. **Balance invariant**: sum(methods) == subtotal - discount,
///    exactly. Violations never reach storage.
pub fn validate_payment(payment: &NewPayment) -> CoreResult<()> {
    if payment.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }

    for item in &payment.items {
        validate_quantity("items", item.quantity)?;
        if item.unit_price_cents < 0 {
            return Err(ValidationError::MustBePositive {
                field: "items".to_string(),
            }
            .into());
        }
    }

    let subtotal = payment.subtotal();

    if payment.discount_cents < 0 || payment.discount_cents > subtotal.cents() {
        return Err(ValidationError::OutOfRange {
            field: "descuento".to_string(),
            min: 0,
            max: subtotal.cents(),
        }
        .into());
    }

    if payment.discount_cents > 0
        && payment
            .discount_reason
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
    {
        return Err(ValidationError::Required {
            field: "justificacion_descuento".to_string(),
        }
        .into());
    }

    if payment.methods.is_empty() {
        return Err(ValidationError::Required {
            field: "metodos".to_string(),
        }
        .into());
    }

    for method in &payment.methods {
        validate_positive_amount("metodos", method.amount_cents)?;
    }

    validate_receipts(&payment.methods)?;

    let total = subtotal - Money::from_cents(payment.discount_cents);
    let methods_total = payment.methods_total();
    if methods_total != total {
        return Err(CoreError::PaymentOutOfBalance {
            total_cents: total.cents(),
            methods_cents: methods_total.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewPaymentItem, PaymentMethodKind};
    use chrono::TimeZone;

    fn base_payment() -> NewPayment {
        NewPayment {
            patient_id: "p1".to_string(),
            items: vec![NewPaymentItem {
                service_id: "s1".to_string(),
                appointment_service_id: None,
                description: "Consulta general".to_string(),
                unit_price_cents: 5000,
                quantity: 1,
            }],
            methods: vec![NewPaymentMethod {
                method: PaymentMethodKind::Efectivo,
                amount_cents: 5000,
                receipt_path: None,
            }],
            discount_cents: 0,
            discount_reason: None,
            created_by: "u1".to_string(),
        }
    }

    #[test]
    fn test_justification_boundaries() {
        // 9 characters: rejected
        assert!(matches!(
            validate_justification("justificacion", Some("123456789")),
            Err(ValidationError::TooShort { .. })
        ));
        // 10 characters: accepted
        assert_eq!(
            validate_justification("justificacion", Some("1234567890")).unwrap(),
            "1234567890"
        );
        // whitespace does not count
        assert!(validate_justification("justificacion", Some("   1234   ")).is_err());
        assert!(validate_justification("justificacion", None).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity("cantidad", 1).is_ok());
        assert!(validate_quantity("cantidad", 999).is_ok());
        assert!(validate_quantity("cantidad", 0).is_err());
        assert!(validate_quantity("cantidad", -3).is_err());
        assert!(validate_quantity("cantidad", 1000).is_err());
    }

    #[test]
    fn test_time_range() {
        let start = chrono::Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2025, 1, 10, 10, 30, 0).unwrap();
        assert!(validate_time_range("fecha_hora_inicio", start, end).is_ok());
        assert!(validate_time_range("fecha_hora_inicio", end, start).is_err());
        assert!(validate_time_range("fecha_hora_inicio", start, start).is_err());
    }

    #[test]
    fn test_balanced_payment_accepted() {
        assert!(validate_payment(&base_payment()).is_ok());
    }

    #[test]
    fn test_unbalanced_payment_rejected() {
        let mut payment = base_payment();
        payment.methods[0].amount_cents = 4999;
        assert!(matches!(
            validate_payment(&payment),
            Err(CoreError::PaymentOutOfBalance {
                total_cents: 5000,
                methods_cents: 4999,
            })
        ));
    }

    #[test]
    fn test_split_methods_must_balance_exactly() {
        let mut payment = base_payment();
        payment.methods = vec![
            NewPaymentMethod {
                method: PaymentMethodKind::Efectivo,
                amount_cents: 3000,
                receipt_path: None,
            },
            NewPaymentMethod {
                method: PaymentMethodKind::Tarjeta,
                amount_cents: 2000,
                receipt_path: Some("receipts/voucher-123.jpg".to_string()),
            },
        ];
        assert!(validate_payment(&payment).is_ok());

        payment.methods[1].amount_cents = 2001;
        assert!(validate_payment(&payment).is_err());
    }

    #[test]
    fn test_discount_requires_reason() {
        let mut payment = base_payment();
        payment.discount_cents = 500;
        payment.methods[0].amount_cents = 4500;
        assert!(matches!(
            validate_payment(&payment),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));

        payment.discount_reason = Some("Convenio empresa".to_string());
        assert!(validate_payment(&payment).is_ok());
    }

    #[test]
    fn test_electronic_method_requires_receipt() {
        let mut payment = base_payment();
        payment.methods = vec![NewPaymentMethod {
            method: PaymentMethodKind::Transferencia,
            amount_cents: 5000,
            receipt_path: None,
        }];
        assert!(matches!(
            validate_payment(&payment),
            Err(CoreError::Validation(ValidationError::ReceiptRequired { .. }))
        ));
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut payment = base_payment();
        payment.items.clear();
        assert!(validate_payment(&payment).is_err());
    }

    #[test]
    fn test_discount_above_subtotal_rejected() {
        let mut payment = base_payment();
        payment.discount_cents = 6000;
        payment.discount_reason = Some("No corresponde".to_string());
        assert!(validate_payment(&payment).is_err());
    }
}
