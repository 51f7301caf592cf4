//! # Appointment Repository
//!
//! Overlap-safe booking and the compare-and-swap status writes.
//!
//! ## Booking Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Overlap-Safe Booking                                   │
//! │                                                                         │
//! │  BEGIN IMMEDIATE        ← write lock held, no other writer can          │
//! │      │                    interleave between check and insert           │
//! │      ▼                                                                  │
//! │  verify patient exists, doctor is an active medico                      │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  re-read agenda-blocking intervals for the doctor                       │
//! │  [start, end) overlap?  ──► yes ──► SlotUnavailable (rollback)          │
//! │      │ no                                                               │
//! │      ▼                                                                  │
//! │  INSERT appointment, COMMIT                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rescheduling reuses the identical mechanism: it is a time-field-only
//! update subject to the same check, excluding the appointment itself.
//!
//! Status updates are NOT wrapped in this transaction; they are single
//! compare-and-swap writes (`UPDATE ... WHERE status = <read status>`)
//! so a concurrent update surfaces as [`DbError::StatusConflict`]
//! instead of a silent overwrite.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Connection, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::BEGIN_IMMEDIATE;
use crate::repository::catalog::user_role;
use clinica_core::{
    Appointment, AppointmentService, AppointmentStatus, NewAppointment, Role, ValidationError,
    APPOINTMENT_START_FIELD,
};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, start_at, end_at, status, reason, \
                                   notes, created_by, created_at, updated_at";

const APPOINTMENT_SERVICE_COLUMNS: &str = "id, appointment_id, service_id, name_snapshot, \
                                           unit_price_cents, quantity, subtotal_cents, \
                                           payment_status, settled_by_item_id, created_at";

/// Repository for appointment operations.
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: SqlitePool,
}

impl AppointmentRepository {
    /// Creates a new AppointmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentRepository { pool }
    }

    /// Books an appointment, enforcing the no-overlap invariant for the
    /// doctor under the write lock.
    ///
    /// ## Errors
    /// - [`DbError::NotFound`] - patient does not exist
    /// - [`DbError::Domain`] - doctor_id is not an active medico
    /// - [`DbError::SlotUnavailable`] - interval overlaps an
    ///   agenda-blocking appointment; the caller must pick a new time,
    ///   never retry automatically
    pub async fn book(&self, new: &NewAppointment) -> DbResult<Appointment> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let patient: Option<String> = sqlx::query_scalar("SELECT id FROM patients WHERE id = ?1")
            .bind(&new.patient_id)
            .fetch_optional(&mut *tx)
            .await?;
        if patient.is_none() {
            return Err(DbError::not_found("Paciente", &new.patient_id));
        }

        match user_role(&mut *tx, &new.doctor_id).await? {
            Some(Role::Medico) => {}
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: "doctor_id".to_string(),
                    reason: "not an active doctor".to_string(),
                }
                .into());
            }
        }

        assert_slot_free(&mut tx, &new.doctor_id, new.start_at, new.end_at, None).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id: new.patient_id.clone(),
            doctor_id: new.doctor_id.clone(),
            start_at: new.start_at,
            end_at: new.end_at,
            status: AppointmentStatus::Programada,
            reason: new.reason.clone(),
            notes: new.notes.clone(),
            created_by: new.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, patient_id, doctor_id, start_at, end_at, status,
                reason, notes, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&appointment.id)
        .bind(&appointment.patient_id)
        .bind(&appointment.doctor_id)
        .bind(appointment.start_at)
        .bind(appointment.end_at)
        .bind(appointment.status)
        .bind(&appointment.reason)
        .bind(&appointment.notes)
        .bind(&appointment.created_by)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %appointment.id, doctor_id = %appointment.doctor_id, "Appointment booked");
        Ok(appointment)
    }

    /// Moves an appointment to a new time slot under the same overlap
    /// check, excluding the appointment itself from the scan.
    pub async fn reschedule(
        &self,
        id: &str,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> DbResult<Appointment> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let mut appointment = fetch_appointment(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Cita", id))?;

        if !appointment.status.allows_reschedule() {
            return Err(DbError::InvalidState {
                entity: "Cita",
                id: id.to_string(),
                status: appointment.status.label(),
            });
        }

        assert_slot_free(&mut tx, &appointment.doctor_id, new_start, new_end, Some(id)).await?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE appointments SET start_at = ?2, end_at = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(new_start)
        .bind(new_end)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %id, "Appointment rescheduled");
        appointment.start_at = new_start;
        appointment.end_at = new_end;
        appointment.updated_at = now;
        Ok(appointment)
    }

    /// Applies a status transition: re-fetch current status, validate
    /// the edge against the transition table, then compare-and-swap.
    pub async fn update_status(
        &self,
        id: &str,
        requested: AppointmentStatus,
    ) -> DbResult<Appointment> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Cita", id))?
            .status;

        current.check_transition(requested)?;

        self.set_status_checked(id, current, requested).await?;

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Cita", id))
    }

    /// Compare-and-swap status write: succeeds only if the stored
    /// status still equals `from`.
    pub async fn set_status_checked(
        &self,
        id: &str,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> DbResult<()> {
        debug!(id = %id, from = ?from, to = ?to, "Appointment status CAS");

        let result = sqlx::query(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(to)
        .bind(Utc::now())
        .bind(from)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a vanished row from a concurrent status change
            return match self.get(id).await? {
                None => Err(DbError::not_found("Cita", id)),
                Some(_) => Err(DbError::StatusConflict {
                    entity: "Cita",
                    id: id.to_string(),
                }),
            };
        }

        Ok(())
    }

    /// Hard-deletes an appointment (admin-gated in the actions layer).
    /// Attached service lines cascade.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cita", id));
        }

        info!(id = %id, "Appointment deleted");
        Ok(())
    }

    /// Attaches a billable service line, snapshotting the catalog name
    /// and price at attach time.
    pub async fn attach_service(
        &self,
        appointment_id: &str,
        service_id: &str,
        quantity: i64,
    ) -> DbResult<AppointmentService> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let appointment = fetch_appointment(&mut tx, appointment_id)
            .await?
            .ok_or_else(|| DbError::not_found("Cita", appointment_id))?;

        if !appointment.status.blocks_agenda() {
            return Err(DbError::InvalidState {
                entity: "Cita",
                id: appointment_id.to_string(),
                status: appointment.status.label(),
            });
        }

        let service: Option<(String, i64)> = sqlx::query_as(
            "SELECT name, price_cents FROM services WHERE id = ?1 AND is_active = 1",
        )
        .bind(service_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (name, price_cents) =
            service.ok_or_else(|| DbError::not_found("Servicio", service_id))?;

        let line = AppointmentService {
            id: Uuid::new_v4().to_string(),
            appointment_id: appointment_id.to_string(),
            service_id: service_id.to_string(),
            name_snapshot: name,
            unit_price_cents: price_cents,
            quantity,
            subtotal_cents: price_cents * quantity,
            payment_status: clinica_core::ServicePaymentStatus::Pendiente,
            settled_by_item_id: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO appointment_services (
                id, appointment_id, service_id, name_snapshot, unit_price_cents,
                quantity, subtotal_cents, payment_status, settled_by_item_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&line.id)
        .bind(&line.appointment_id)
        .bind(&line.service_id)
        .bind(&line.name_snapshot)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.subtotal_cents)
        .bind(line.payment_status)
        .bind(&line.settled_by_item_id)
        .bind(line.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(line)
    }

    /// Removes an unpaid service line. Paid lines are immutable.
    pub async fn detach_service(&self, line_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "DELETE FROM appointment_services WHERE id = ?1 AND payment_status = 'pendiente'",
        )
        .bind(line_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM appointment_services WHERE id = ?1")
                    .bind(line_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return match exists {
                None => Err(DbError::not_found("Servicio de cita", line_id)),
                Some(_) => Err(DbError::InvalidState {
                    entity: "Servicio de cita",
                    id: line_id.to_string(),
                    status: "Pagado",
                }),
            };
        }

        Ok(())
    }

    /// Gets an appointment by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Appointment>> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(appointment)
    }

    /// Lists a doctor's appointments for one calendar day, agenda order.
    pub async fn list_for_doctor_on(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> DbResult<Vec<Appointment>> {
        let appointments = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
             WHERE doctor_id = ?1 AND date(start_at) = ?2 ORDER BY start_at"
        ))
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(appointments)
    }

    /// Service lines of an appointment.
    pub async fn services(&self, appointment_id: &str) -> DbResult<Vec<AppointmentService>> {
        let lines = sqlx::query_as::<_, AppointmentService>(&format!(
            "SELECT {APPOINTMENT_SERVICE_COLUMNS} FROM appointment_services \
             WHERE appointment_id = ?1 ORDER BY created_at"
        ))
        .bind(appointment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Pending (unpaid) service lines across a patient's appointments,
    /// for the billing form.
    pub async fn unpaid_services(&self, patient_id: &str) -> DbResult<Vec<AppointmentService>> {
        let lines = sqlx::query_as::<_, AppointmentService>(&format!(
            "SELECT s.id, s.appointment_id, s.service_id, s.name_snapshot, s.unit_price_cents, \
                    s.quantity, s.subtotal_cents, s.payment_status, s.settled_by_item_id, s.created_at \
             FROM appointment_services s \
             JOIN appointments a ON a.id = s.appointment_id \
             WHERE a.patient_id = ?1 AND s.payment_status = 'pendiente' \
             ORDER BY s.created_at"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

async fn fetch_appointment(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    id: &str,
) -> DbResult<Option<Appointment>> {
    let appointment = sqlx::query_as::<_, Appointment>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(appointment)
}

/// Rejects the write if any agenda-blocking appointment of the doctor
/// overlaps [start, end). Half-open intervals: back-to-back slots touch
/// without conflict.
async fn assert_slot_free(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    doctor_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> DbResult<()> {
    let conflict: Option<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM appointments
        WHERE doctor_id = ?1
          AND status NOT IN ('cancelada', 'no_asistio')
          AND (?4 IS NULL OR id <> ?4)
          AND start_at < ?3
          AND end_at > ?2
        LIMIT 1
        "#,
    )
    .bind(doctor_id)
    .bind(start)
    .bind(end)
    .bind(exclude_id)
    .fetch_optional(&mut **tx)
    .await?;

    match conflict {
        Some(existing) => {
            debug!(doctor_id = %doctor_id, existing = %existing, "Booking overlap rejected");
            Err(DbError::SlotUnavailable {
                field: APPOINTMENT_START_FIELD,
            })
        }
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
