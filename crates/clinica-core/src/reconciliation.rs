//! # Cash Reconciliation Engine
//!
//! Pure math behind the daily cash closing: expected totals per payment
//! method, variance against the physically counted cash, and the
//! justification gate for discrepancies.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Daily Closing Flow                                   │
//! │                                                                         │
//! │  clinica-db aggregates the day's active documents                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DailySummary { method_totals, discount_total, void_total }             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Cashier counts the physical drawer ──► counted_cash                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Reconciliation::new(expected_cash, counted_cash)  ← THIS MODULE        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_closing() - difference ≠ 0 demands a justification            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  clinica-db persists the closing with a gapless closing number          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only cash participates in the physical comparison; electronic methods
//! are assumed correct via their receipts.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{ClosingModule, PaymentMethodKind};
use crate::validation::{validate_justification, ValidationResult};

// =============================================================================
// Daily Summary
// =============================================================================

/// Expected total for one payment method on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethodKind,
    pub total: Money,
}

/// Pre-computed summary of a day's active documents, produced by the
/// storage layer and consumed both by the closing form and by the
/// closing procedure itself (which recomputes it inside the
/// transaction).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySummary {
    pub module: ClosingModule,
    #[ts(as = "String")]
    pub date: chrono::NaiveDate,
    pub method_totals: Vec<MethodTotal>,
    /// Sum of discounts over the day's active payments. Always zero in
    /// the `ventas` module, which tracks no discounts.
    pub discount_total: Money,
    /// Sum of totals of the day's payments that were voided. Always
    /// zero in the `ventas` module.
    pub void_total: Money,
}

impl DailySummary {
    /// Sum of all method totals. Discounts are already netted at the
    /// transaction level; nothing further is subtracted here.
    pub fn grand_total(&self) -> Money {
        self.method_totals.iter().map(|t| t.total).sum()
    }

    /// Expected total for one method, zero if absent.
    pub fn total_for(&self, method: PaymentMethodKind) -> Money {
        self.method_totals
            .iter()
            .find(|t| t.method == method)
            .map(|t| t.total)
            .unwrap_or_else(Money::zero)
    }

    /// The cash bucket - the only one compared against the physical
    /// count.
    pub fn expected_cash(&self) -> Money {
        self.total_for(PaymentMethodKind::Efectivo)
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Comparison of the physically counted cash against the expected cash
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub expected_cash: Money,
    pub counted_cash: Money,
    /// counted - expected. Negative means missing cash.
    pub difference: Money,
}

impl Reconciliation {
    pub fn new(expected_cash: Money, counted_cash: Money) -> Self {
        Reconciliation {
            expected_cash,
            counted_cash,
            difference: counted_cash - expected_cash,
        }
    }

    /// Whether the drawer matched exactly.
    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero()
    }
}

// =============================================================================
// Variance Policy
// =============================================================================

/// Per-module presentation of the variance rule. The enforced rule is
/// identical in shape - any non-zero difference demands a justification
/// of at least the minimum length - but the sales module presents it as
/// a hard stop ("tolerancia cero") rather than a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VariancePolicy {
    Clinica,
    CeroTolerancia,
}

impl VariancePolicy {
    pub const fn for_module(module: ClosingModule) -> Self {
        match module {
            ClosingModule::Clinica => VariancePolicy::Clinica,
            ClosingModule::Ventas => VariancePolicy::CeroTolerancia,
        }
    }

    /// Whether the frontend should present the variance as a blocking
    /// error rather than a confirm-with-justification warning.
    pub const fn is_hard_stop(&self) -> bool {
        matches!(self, VariancePolicy::CeroTolerancia)
    }
}

impl ClosingModule {
    pub const fn variance_policy(&self) -> VariancePolicy {
        VariancePolicy::for_module(*self)
    }
}

// =============================================================================
// Closing Gate
// =============================================================================

/// The policy gate run before a closing may be persisted.
///
/// ## Rules
/// - difference == 0: justification not required (passed through
///   trimmed when present)
/// - difference != 0: justification mandatory, minimum length applies
///
/// ## Returns
/// The trimmed justification to persist, if any.
pub fn validate_closing(
    reconciliation: &Reconciliation,
    justification: Option<&str>,
) -> ValidationResult<Option<String>> {
    if reconciliation.is_balanced() {
        let trimmed = justification.map(str::trim).unwrap_or("");
        return Ok(if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        });
    }

    validate_justification("justificacion_diferencia", justification).map(Some)
}

// =============================================================================
// Unit Tests
// =============================================================================
