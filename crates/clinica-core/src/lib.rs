//! # clinica-core: Pure Business Logic for the Clinic System
//!
//! This crate is the **heart** of the clinic operations backend. It contains
//! every business rule that must hold regardless of UI or storage: the
//! appointment status machine, the payment balance invariant, justification
//! policies, and the cash reconciliation engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Clinica Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Web Frontend (Next.js)                          │   │
//! │  │    Agenda ──► Caja ──► Inventario ──► Cierres                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ server actions                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  clinica-actions                                │   │
//! │  │    schedule_appointment, create_payment, cancel_purchase, ...   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ clinica-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐ ┌───────────┐ ┌────────────┐ ┌──────────────┐  │   │
//! │  │   │   types   │ │transitions│ │ validation │ │reconciliation│  │   │
//! │  │   │ Cita/Pago │ │ status    │ │  rules     │ │  cash math   │  │   │
//! │  │   └───────────┘ └───────────┘ └────────────┘ └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  clinica-db (Storage Layer)                     │   │
//! │  │         SQLite transactions, gapless counters, booking          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Appointment, Payment, Purchase, CashClosing, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`transitions`] - Status transition tables for every entity
//! - [`validation`] - Business rule validation
//! - [`reconciliation`] - Daily cash reconciliation engine
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod reconciliation;
pub mod transitions;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use reconciliation::{DailySummary, MethodTotal, Reconciliation, VariancePolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum length of every justification text (void, cancellation,
/// reopen, cash variance, rejection).
///
/// ## Business Reason
/// Free-text audit fields shorter than this carry no accountability
/// value; the UI shows a live character count toward this minimum.
pub const MIN_JUSTIFICATION_LEN: usize = 10;

/// Maximum quantity of a single line item (payment, purchase, sale).
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Field name the booking conflict error attributes itself to.
///
/// Matches the form field of the scheduling UI so the frontend can
/// highlight the start-time input.
pub const APPOINTMENT_START_FIELD: &str = "fecha_hora_inicio";
