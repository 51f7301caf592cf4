//! # Gapless Document Counters
//!
//! Invoice, closing, purchase and sale numbers must be strictly
//! increasing with no gaps among *successful* operations.
//!
//! ## How
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE            ← write lock taken, issuers serialize       │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  UPDATE counters SET value = value + 1 ... RETURNING value              │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  INSERT the document carrying that number                               │
//! │      │                                                                  │
//! │      ├── COMMIT   → number is consumed                                  │
//! │      └── ROLLBACK → counter update is undone, number is NOT consumed    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The number is never generated outside the transaction boundary.

use sqlx::{Sqlite, Transaction};

use crate::error::{DbError, DbResult};

/// Counter scope for payment invoice numbers.
pub(crate) const SCOPE_INVOICE: &str = "invoice";
/// Counter scope for cash closing numbers.
pub(crate) const SCOPE_CLOSING: &str = "closing";
/// Counter scope for purchase numbers.
pub(crate) const SCOPE_PURCHASE: &str = "purchase";
/// Counter scope for sale numbers.
pub(crate) const SCOPE_SALE: &str = "sale";

/// Increments the counter for `scope` inside the caller's transaction
/// and returns the new value.
///
/// MUST be called with a transaction opened via `BEGIN IMMEDIATE`; the
/// write lock is what serializes concurrent issuers.
pub(crate) async fn next_number(
    tx: &mut Transaction<'_, Sqlite>,
    scope: &str,
) -> DbResult<i64> {
    let value: Option<i64> = sqlx::query_scalar(
        "UPDATE counters SET value = value + 1 WHERE scope = ?1 RETURNING value",
    )
    .bind(scope)
    .fetch_optional(&mut **tx)
    .await?;

    value.ok_or_else(|| DbError::Internal(format!("counter scope missing: {scope}")))
}
