//! # Cash Closing Repository
//!
//! Daily summary aggregation and the closing/reopen procedures.
//!
//! ## Closing Procedure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE                                                        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  already a 'cerrado' closing for (module, date)?                        │
//! │      ├── yes ──► AlreadyClosed { closing_id } (rollback)                │
//! │      ▼ no                                                               │
//! │  recompute the day's summary INSIDE the transaction                     │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  variance gate: difference ≠ 0 demands justification ≥ 10 chars         │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  next closing number (gapless) ──► INSERT closing + method totals       │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A reopened closing stays behind as the audit record; the next
//! closing of that date links to it through `previous_closing_id`. The
//! partial unique index over `status = 'cerrado'` backs the
//! one-per-date invariant even against racing writers.

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::counter::{next_number, SCOPE_CLOSING};
use crate::error::{DbError, DbResult};
use crate::pool::BEGIN_IMMEDIATE;
use crate::repository::catalog::user_role;
use clinica_core::reconciliation::{validate_closing, Reconciliation};
use clinica_core::validation::validate_justification;
use clinica_core::{
    CashClosing, ClosingMethodTotal, ClosingModule, ClosingStatus, DailySummary, MethodTotal,
    Money, NewClosing, PaymentMethodKind, Role,
};

const CLOSING_COLUMNS: &str = "id, closing_number, module, closing_date, grand_total_cents, \
                               expected_cash_cents, counted_cash_cents, difference_cents, \
                               difference_reason, discount_total_cents, void_total_cents, \
                               evidence_path, status, reopened_by, reopened_at, reopen_reason, \
                               previous_closing_id, created_by, created_at";

/// Repository for cash closing operations.
#[derive(Debug, Clone)]
pub struct ClosingRepository {
    pool: SqlitePool,
}

impl ClosingRepository {
    /// Creates a new ClosingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClosingRepository { pool }
    }

    /// Computes the expected totals for a module and date: per-method
    /// totals plus (clinic module only) the separately tracked discount
    /// and void totals.
    pub async fn daily_summary(
        &self,
        module: ClosingModule,
        date: NaiveDate,
    ) -> DbResult<DailySummary> {
        let mut conn = self.pool.acquire().await?;
        compute_summary(&mut conn, module, date).await
    }

    /// Creates a closing for a date. The summary is recomputed inside
    /// the transaction so the persisted snapshot is authoritative, and
    /// the variance gate runs against that recomputed difference.
    pub async fn create(&self, new: &NewClosing) -> DbResult<CashClosing> {
        match self.try_create(new).await {
            Err(DbError::Busy) => {
                warn!("closing numbering contention, retrying once");
                self.try_create(new).await
            }
            other => other,
        }
    }

    async fn try_create(&self, new: &NewClosing) -> DbResult<CashClosing> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM cash_closings WHERE module = ?1 AND closing_date = ?2 AND status = 'cerrado'",
        )
        .bind(new.module)
        .bind(new.closing_date)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(closing_id) = existing {
            return Err(DbError::AlreadyClosed {
                closing_id,
                date: new.closing_date.to_string(),
            });
        }

        // Superseded (reopened) closing of the same date, if any
        let previous_closing_id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM cash_closings WHERE module = ?1 AND closing_date = ?2 \
             AND status = 'reabierto' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(new.module)
        .bind(new.closing_date)
        .fetch_optional(&mut *tx)
        .await?;

        let summary = compute_summary(&mut tx, new.module, new.closing_date).await?;
        let reconciliation = Reconciliation::new(
            summary.expected_cash(),
            Money::from_cents(new.counted_cash_cents),
        );
        let difference_reason =
            validate_closing(&reconciliation, new.difference_reason.as_deref())?;

        let closing_number = next_number(&mut tx, SCOPE_CLOSING).await?;

        let closing = CashClosing {
            id: Uuid::new_v4().to_string(),
            closing_number,
            module: new.module,
            closing_date: new.closing_date,
            grand_total_cents: summary.grand_total().cents(),
            expected_cash_cents: reconciliation.expected_cash.cents(),
            counted_cash_cents: reconciliation.counted_cash.cents(),
            difference_cents: reconciliation.difference.cents(),
            difference_reason,
            discount_total_cents: summary.discount_total.cents(),
            void_total_cents: summary.void_total.cents(),
            evidence_path: new.evidence_path.clone(),
            status: ClosingStatus::Cerrado,
            reopened_by: None,
            reopened_at: None,
            reopen_reason: None,
            previous_closing_id,
            created_by: new.created_by.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_closings (
                id, closing_number, module, closing_date, grand_total_cents,
                expected_cash_cents, counted_cash_cents, difference_cents,
                difference_reason, discount_total_cents, void_total_cents,
                evidence_path, status, previous_closing_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
        )
        .bind(&closing.id)
        .bind(closing.closing_number)
        .bind(closing.module)
        .bind(closing.closing_date)
        .bind(closing.grand_total_cents)
        .bind(closing.expected_cash_cents)
        .bind(closing.counted_cash_cents)
        .bind(closing.difference_cents)
        .bind(&closing.difference_reason)
        .bind(closing.discount_total_cents)
        .bind(closing.void_total_cents)
        .bind(&closing.evidence_path)
        .bind(closing.status)
        .bind(&closing.previous_closing_id)
        .bind(&closing.created_by)
        .bind(closing.created_at)
        .execute(&mut *tx)
        .await?;

        for total in &summary.method_totals {
            sqlx::query(
                "INSERT INTO closing_method_totals (closing_id, method, total_cents) VALUES (?1, ?2, ?3)",
            )
            .bind(&closing.id)
            .bind(total.method)
            .bind(total.total.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            id = %closing.id,
            closing_number = closing.closing_number,
            difference = closing.difference_cents,
            "Cash closing created"
        );
        Ok(closing)
    }

    /// Reopens a closing. Role re-checked inside the transaction
    /// (admin only); justification mandatory. The row is kept as the
    /// audit record and a new closing for the date becomes possible.
    pub async fn reopen(&self, id: &str, by_user: &str, justification: Option<&str>) -> DbResult<()> {
        let justification = validate_justification("justificacion", justification)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        match user_role(&mut *tx, by_user).await? {
            Some(Role::Admin) => {}
            _ => {
                return Err(DbError::Unauthorized {
                    user_id: by_user.to_string(),
                    action: "reabrir cierre de caja",
                });
            }
        }

        let status: Option<ClosingStatus> =
            sqlx::query_scalar("SELECT status FROM cash_closings WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let status = status.ok_or_else(|| DbError::not_found("Cierre de caja", id))?;
        if !status.can_transition(ClosingStatus::Reabierto) {
            return Err(DbError::InvalidState {
                entity: "Cierre de caja",
                id: id.to_string(),
                status: status.label(),
            });
        }

        let reopened = sqlx::query(
            "UPDATE cash_closings SET status = 'reabierto', reopened_by = ?2, reopened_at = ?3, \
             reopen_reason = ?4 WHERE id = ?1 AND status = 'cerrado'",
        )
        .bind(id)
        .bind(by_user)
        .bind(Utc::now())
        .bind(&justification)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if reopened == 0 {
            return Err(DbError::StatusConflict {
                entity: "Cierre de caja",
                id: id.to_string(),
            });
        }

        tx.commit().await?;

        info!(id = %id, by = %by_user, "Cash closing reopened");
        Ok(())
    }

    /// Gets a closing by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<CashClosing>> {
        let closing = sqlx::query_as::<_, CashClosing>(&format!(
            "SELECT {CLOSING_COLUMNS} FROM cash_closings WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(closing)
    }

    /// The non-superseded (`cerrado`) closing of a date, if any.
    pub async fn find_closed_for_date(
        &self,
        module: ClosingModule,
        date: NaiveDate,
    ) -> DbResult<Option<CashClosing>> {
        let closing = sqlx::query_as::<_, CashClosing>(&format!(
            "SELECT {CLOSING_COLUMNS} FROM cash_closings \
             WHERE module = ?1 AND closing_date = ?2 AND status = 'cerrado'"
        ))
        .bind(module)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(closing)
    }

    /// Snapshotted per-method totals of a closing.
    pub async fn method_totals(&self, closing_id: &str) -> DbResult<Vec<ClosingMethodTotal>> {
        let totals = sqlx::query_as::<_, ClosingMethodTotal>(
            "SELECT closing_id, method, total_cents FROM closing_method_totals \
             WHERE closing_id = ?1 ORDER BY method",
        )
        .bind(closing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }
}

// =============================================================================
// Summary aggregation
// =============================================================================

#[derive(sqlx::FromRow)]
struct MethodTotalRow {
    method: PaymentMethodKind,
    total_cents: i64,
}

/// Aggregates a day's active documents. The clinic module sums active
/// payments by method plus discount/void buckets; the sales module sums
/// raw sale totals by method only.
async fn compute_summary(
    conn: &mut SqliteConnection,
    module: ClosingModule,
    date: NaiveDate,
) -> DbResult<DailySummary> {
    let (method_totals, discount_total, void_total) = match module {
        ClosingModule::Clinica => {
            let rows = sqlx::query_as::<_, MethodTotalRow>(
                r#"
                SELECT pm.method AS method, COALESCE(SUM(pm.amount_cents), 0) AS total_cents
                FROM payment_methods pm
                JOIN payments p ON p.id = pm.payment_id
                WHERE p.status = 'activo' AND date(p.created_at) = ?1
                GROUP BY pm.method
                "#,
            )
            .bind(date)
            .fetch_all(&mut *conn)
            .await?;

            let discount: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(discount_cents), 0) FROM payments \
                 WHERE status = 'activo' AND date(created_at) = ?1",
            )
            .bind(date)
            .fetch_one(&mut *conn)
            .await?;

            let voided: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(total_cents), 0) FROM payments \
                 WHERE status = 'anulado' AND date(created_at) = ?1",
            )
            .bind(date)
            .fetch_one(&mut *conn)
            .await?;

            (rows, discount, voided)
        }
        ClosingModule::Ventas => {
            let rows = sqlx::query_as::<_, MethodTotalRow>(
                r#"
                SELECT method, COALESCE(SUM(total_cents), 0) AS total_cents
                FROM sales
                WHERE date(created_at) = ?1
                GROUP BY method
                "#,
            )
            .bind(date)
            .fetch_all(&mut *conn)
            .await?;

            (rows, 0, 0)
        }
    };

    Ok(DailySummary {
        module,
        date,
        method_totals: method_totals
            .into_iter()
            .map(|row| MethodTotal {
                method: row.method,
                total: Money::from_cents(row.total_cents),
            })
            .collect(),
        discount_total: Money::from_cents(discount_total),
        void_total: Money::from_cents(void_total),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::testutil::{fixture, Fixture};
    use chrono::Utc;
    use clinica_core::{
        ClosingModule, ClosingStatus, NewClosing, NewPayment, NewPaymentItem, NewPaymentMethod,
        NewSale, NewSaleItem, PaymentMethodKind,
    };

    fn payment_with(fx: &Fixture, method: PaymentMethodKind, amount_cents: i64) -> NewPayment {
        NewPayment {
            patient_id: fx.patient.id.clone(),
            items: vec![NewPaymentItem {
                service_id: fx.service.id.clone(),
                appointment_service_id: None,
                description: "Consulta general".to_string(),
                unit_price_cents: amount_cents,
                quantity: 1,
            }],
            methods: vec![NewPaymentMethod {
                method,
                amount_cents,
                receipt_path: if method.is_electronic() {
                    Some("receipts/voucher.jpg".to_string())
                } else {
                    None
                },
            }],
            discount_cents: 0,
            discount_reason: None,
            created_by: fx.clerk.id.clone(),
        }
    }

    fn closing_counting(fx: &Fixture, counted_cash_cents: i64) -> NewClosing {
        NewClosing {
            module: ClosingModule::Clinica,
            closing_date: Utc::now().date_naive(),
            counted_cash_cents,
            difference_reason: None,
            evidence_path: None,
            created_by: fx.clerk.id.clone(),
        }
    }

    #[tokio::test]
    async fn test_summary_tracks_methods_discounts_and_voids() {
        let fx = fixture().await;
        let payments = fx.db.payments();

        payments.create(&payment_with(&fx, PaymentMethodKind::Efectivo, 5000)).await.unwrap();
        payments.create(&payment_with(&fx, PaymentMethodKind::Tarjeta, 8000)).await.unwrap();

        let mut discounted = payment_with(&fx, PaymentMethodKind::Efectivo, 4000);
        discounted.discount_cents = 1000;
        discounted.discount_reason = Some("Convenio empresa".to_string());
        discounted.methods[0].amount_cents = 3000;
        payments.create(&discounted).await.unwrap();

        let voided = payments.create(&payment_with(&fx, PaymentMethodKind::Efectivo, 2000)).await.unwrap();
        payments
            .void(&voided.id, &fx.admin.id, Some("Registrado dos veces por error"))
            .await
            .unwrap();

        let summary = fx
            .db
            .closings()
            .daily_summary(ClosingModule::Clinica, Utc::now().date_naive())
            .await
            .unwrap();

        assert_eq!(summary.expected_cash().cents(), 8000); // 5000 + 3000, void excluded
        assert_eq!(summary.total_for(PaymentMethodKind::Tarjeta).cents(), 8000);
        assert_eq!(summary.grand_total().cents(), 16_000);
        assert_eq!(summary.discount_total.cents(), 1000);
        assert_eq!(summary.void_total.cents(), 2000);
    }

    /// Double closing scenario: second closing rejected referencing the
    /// existing id; accepted again after reopening, linked to the old row.
    #[tokio::test]
    async fn test_one_closing_per_date_until_reopened() {
        let fx = fixture().await;
        let payments = fx.db.payments();
        let closings = fx.db.closings();

        payments.create(&payment_with(&fx, PaymentMethodKind::Efectivo, 5000)).await.unwrap();

        let first = closings.create(&closing_counting(&fx, 5000)).await.unwrap();
        assert_eq!(first.closing_number, 1);
        assert_eq!(first.status, ClosingStatus::Cerrado);
        assert_eq!(first.difference_cents, 0);
        assert!(first.previous_closing_id.is_none());

        let err = closings.create(&closing_counting(&fx, 5000)).await.unwrap_err();
        match err {
            DbError::AlreadyClosed { closing_id, .. } => assert_eq!(closing_id, first.id),
            other => panic!("expected AlreadyClosed, got {other:?}"),
        }

        closings
            .reopen(&first.id, &fx.admin.id, Some("Faltó registrar un pago de la tarde"))
            .await
            .unwrap();

        let second = closings.create(&closing_counting(&fx, 5000)).await.unwrap();
        assert_eq!(second.closing_number, 2);
        assert_eq!(second.previous_closing_id.as_deref(), Some(first.id.as_str()));

        let old = closings.get(&first.id).await.unwrap().unwrap();
        assert_eq!(old.status, ClosingStatus::Reabierto);
        assert!(old.reopened_at.is_some());
    }

    #[tokio::test]
    async fn test_variance_gate_runs_inside_transaction() {
        let fx = fixture().await;
        fx.db
            .payments()
            .create(&payment_with(&fx, PaymentMethodKind::Efectivo, 5000))
            .await
            .unwrap();
        let closings = fx.db.closings();

        // Counted short by 500, no justification: rejected, nothing persisted
        let err = closings.create(&closing_counting(&fx, 4500)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(_)), "{err:?}");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cash_closings")
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);

        // Same variance with a proper justification: accepted
        let mut with_reason = closing_counting(&fx, 4500);
        with_reason.difference_reason = Some("Faltante por vuelto mal entregado".to_string());
        let closing = closings.create(&with_reason).await.unwrap();
        assert_eq!(closing.difference_cents, -500);
        // The failed attempt consumed no closing number
        assert_eq!(closing.closing_number, 1);

        let totals = closings.method_totals(&closing.id).await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total_cents, 5000);
    }

    #[tokio::test]
    async fn test_reopen_requires_admin() {
        let fx = fixture().await;
        let closings = fx.db.closings();
        let closing = closings.create(&closing_counting(&fx, 0)).await.unwrap();

        assert!(matches!(
            closings
                .reopen(&closing.id, &fx.doctor.id, Some("Revisión de auditoría interna"))
                .await
                .unwrap_err(),
            DbError::Unauthorized { .. }
        ));

        closings
            .reopen(&closing.id, &fx.admin.id, Some("Revisión de auditoría interna"))
            .await
            .unwrap();

        // Reopening twice is an invalid state
        assert!(matches!(
            closings
                .reopen(&closing.id, &fx.admin.id, Some("Revisión de auditoría interna"))
                .await
                .unwrap_err(),
            DbError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_ventas_module_closes_sale_totals() {
        let fx = fixture().await;
        fx.db
            .sales()
            .create(&NewSale {
                items: vec![NewSaleItem {
                    product_id: fx.product.id.clone(),
                    quantity: 4,
                }],
                method: PaymentMethodKind::Efectivo,
                receipt_path: None,
                created_by: fx.clerk.id.clone(),
            })
            .await
            .unwrap();

        let closings = fx.db.closings();
        let summary = closings
            .daily_summary(ClosingModule::Ventas, Utc::now().date_naive())
            .await
            .unwrap();
        assert_eq!(summary.expected_cash().cents(), 600);
        assert_eq!(summary.discount_total.cents(), 0);
        assert_eq!(summary.void_total.cents(), 0);

        let closing = closings
            .create(&NewClosing {
                module: ClosingModule::Ventas,
                closing_date: Utc::now().date_naive(),
                counted_cash_cents: 600,
                difference_reason: None,
                evidence_path: None,
                created_by: fx.clerk.id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(closing.grand_total_cents, 600);

        // Clinic and sales closings for the same date coexist
        fx.db
            .closings()
            .create(&closing_counting(&fx, 0))
            .await
            .unwrap();
    }
}
