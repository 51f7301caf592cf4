//! # Payment Repository
//!
//! The atomic payment procedure and its void counterpart.
//!
//! ## Create Payment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN IMMEDIATE                                                        │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  verify patient  ──►  next invoice number (gapless counter)             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  INSERT payment header                                                  │
//! │  INSERT every item   (marking settled appointment services 'pagado')    │
//! │  INSERT every method                                                    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  COMMIT - all rows exist, or none do, and the number is consumed        │
//! │           only on success                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The caller (actions layer) has already validated shape, balance and
//! receipts; this procedure owns atomicity, numbering and the service
//! settlement marks. Numbering contention is retried once, then
//! surfaced.
//!
//! Payments are never edited or deleted. Voiding requires an elevated
//! role - re-checked here against the users table, not trusted from the
//! caller - and a justification, and reverts the settlement marks of
//! the lines the payment had settled.

use chrono::{NaiveDate, Utc};
use sqlx::{Connection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::counter::{next_number, SCOPE_INVOICE};
use crate::error::{DbError, DbResult};
use crate::pool::BEGIN_IMMEDIATE;
use crate::repository::catalog::user_role;
use clinica_core::validation::validate_justification;
use clinica_core::{NewPayment, Payment, PaymentItem, PaymentMethod, PaymentStatus, Role};

const PAYMENT_COLUMNS: &str = "id, patient_id, invoice_number, subtotal_cents, discount_cents, \
                               discount_reason, total_cents, status, voided_by, voided_at, \
                               void_reason, created_by, created_at";

/// Repository for payment operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Creates a payment atomically: gapless invoice number, header,
    /// items, methods and service settlement marks in one transaction.
    ///
    /// Retries once on write-lock contention before surfacing
    /// [`DbError::Busy`].
    pub async fn create(&self, new: &NewPayment) -> DbResult<Payment> {
        match self.try_create(new).await {
            Err(DbError::Busy) => {
                warn!("invoice numbering contention, retrying once");
                self.try_create(new).await
            }
            other => other,
        }
    }

    async fn try_create(&self, new: &NewPayment) -> DbResult<Payment> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let patient: Option<String> = sqlx::query_scalar("SELECT id FROM patients WHERE id = ?1")
            .bind(&new.patient_id)
            .fetch_optional(&mut *tx)
            .await?;
        if patient.is_none() {
            return Err(DbError::not_found("Paciente", &new.patient_id));
        }

        let invoice_number = next_number(&mut tx, SCOPE_INVOICE).await?;
        let now = Utc::now();

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            patient_id: new.patient_id.clone(),
            invoice_number,
            subtotal_cents: new.subtotal().cents(),
            discount_cents: new.discount_cents,
            discount_reason: new.discount_reason.clone(),
            total_cents: new.total().cents(),
            status: PaymentStatus::Activo,
            voided_by: None,
            voided_at: None,
            void_reason: None,
            created_by: new.created_by.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, patient_id, invoice_number, subtotal_cents, discount_cents,
                discount_reason, total_cents, status, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.patient_id)
        .bind(payment.invoice_number)
        .bind(payment.subtotal_cents)
        .bind(payment.discount_cents)
        .bind(&payment.discount_reason)
        .bind(payment.total_cents)
        .bind(payment.status)
        .bind(&payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &new.items {
            let item_id = Uuid::new_v4().to_string();

            // Settle the appointment service line this item pays, if any.
            // A line already settled (or vanished) fails the whole payment.
            if let Some(line_id) = &item.appointment_service_id {
                let settled = sqlx::query(
                    "UPDATE appointment_services SET payment_status = 'pagado', settled_by_item_id = ?2 \
                     WHERE id = ?1 AND payment_status = 'pendiente'",
                )
                .bind(line_id)
                .bind(&item_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if settled == 0 {
                    let exists: Option<String> =
                        sqlx::query_scalar("SELECT id FROM appointment_services WHERE id = ?1")
                            .bind(line_id)
                            .fetch_optional(&mut *tx)
                            .await?;
                    return match exists {
                        None => Err(DbError::not_found("Servicio de cita", line_id)),
                        Some(_) => Err(DbError::InvalidState {
                            entity: "Servicio de cita",
                            id: line_id.clone(),
                            status: "Pagado",
                        }),
                    };
                }
            }

            sqlx::query(
                r#"
                INSERT INTO payment_items (
                    id, payment_id, service_id, appointment_service_id,
                    description, unit_price_cents, quantity, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item_id)
            .bind(&payment.id)
            .bind(&item.service_id)
            .bind(&item.appointment_service_id)
            .bind(&item.description)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total().cents())
            .execute(&mut *tx)
            .await?;
        }

        for method in &new.methods {
            sqlx::query(
                r#"
                INSERT INTO payment_methods (id, payment_id, method, amount_cents, receipt_path)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&payment.id)
            .bind(method.method)
            .bind(method.amount_cents)
            .bind(&method.receipt_path)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            id = %payment.id,
            invoice_number = payment.invoice_number,
            total = payment.total_cents,
            "Payment created"
        );
        Ok(payment)
    }

    /// Voids a payment. Role re-checked inside the transaction
    /// (admin or medico); justification mandatory; settlement marks of
    /// the payment's items are reverted so the services can be billed
    /// again.
    pub async fn void(
        &self,
        payment_id: &str,
        by_user: &str,
        justification: Option<&str>,
    ) -> DbResult<()> {
        let justification = validate_justification("justificacion", justification)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        match user_role(&mut *tx, by_user).await? {
            Some(Role::Admin) | Some(Role::Medico) => {}
            _ => {
                return Err(DbError::Unauthorized {
                    user_id: by_user.to_string(),
                    action: "anular pago",
                });
            }
        }

        let status: Option<PaymentStatus> =
            sqlx::query_scalar("SELECT status FROM payments WHERE id = ?1")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?;

        match status {
            None => return Err(DbError::not_found("Pago", payment_id)),
            Some(PaymentStatus::Anulado) => {
                return Err(DbError::InvalidState {
                    entity: "Pago",
                    id: payment_id.to_string(),
                    status: "Anulado",
                });
            }
            Some(PaymentStatus::Activo) => {}
        }

        let voided = sqlx::query(
            "UPDATE payments SET status = 'anulado', voided_by = ?2, voided_at = ?3, void_reason = ?4 \
             WHERE id = ?1 AND status = 'activo'",
        )
        .bind(payment_id)
        .bind(by_user)
        .bind(Utc::now())
        .bind(&justification)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if voided == 0 {
            return Err(DbError::StatusConflict {
                entity: "Pago",
                id: payment_id.to_string(),
            });
        }

        // Free the service lines this payment had settled
        sqlx::query(
            "UPDATE appointment_services SET payment_status = 'pendiente', settled_by_item_id = NULL \
             WHERE settled_by_item_id IN (SELECT id FROM payment_items WHERE payment_id = ?1)",
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %payment_id, by = %by_user, "Payment voided");
        Ok(())
    }

    /// Gets a payment by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Items of a payment, insertion order.
    pub async fn items(&self, payment_id: &str) -> DbResult<Vec<PaymentItem>> {
        let items = sqlx::query_as::<_, PaymentItem>(
            "SELECT id, payment_id, service_id, appointment_service_id, description, \
                    unit_price_cents, quantity, line_total_cents \
             FROM payment_items WHERE payment_id = ?1 ORDER BY rowid",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Methods of a payment.
    pub async fn methods(&self, payment_id: &str) -> DbResult<Vec<PaymentMethod>> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            "SELECT id, payment_id, method, amount_cents, receipt_path \
             FROM payment_methods WHERE payment_id = ?1 ORDER BY rowid",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(methods)
    }

    /// Payments created on a calendar day, invoice order.
    pub async fn list_on(&self, date: NaiveDate) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE date(created_at) = ?1 \
             ORDER BY invoice_number"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
