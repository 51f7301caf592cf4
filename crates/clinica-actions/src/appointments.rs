//! # Appointment Actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use clinica_core::validation::{validate_quantity, validate_time_range};
use clinica_core::{Appointment, AppointmentService, AppointmentStatus, NewAppointment, Role};

use crate::{ActionResult, Actions, AuthContext, View};

/// Input for scheduling an appointment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAppointmentInput {
    pub patient_id: String,
    pub doctor_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Input for a drag-and-drop reschedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAppointmentInput {
    pub appointment_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// Response for status updates: the applied status and what the UI may
/// offer next.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    pub appointment: Appointment,
    pub available_transitions: Vec<AppointmentStatus>,
}

impl Actions {
    /// Books an appointment. Any staff role may schedule.
    pub async fn schedule_appointment(
        &self,
        ctx: &AuthContext,
        input: ScheduleAppointmentInput,
    ) -> ActionResult<Appointment> {
        ctx.require_staff("agendar citas")?;
        validate_time_range("fecha_hora_inicio", input.start_at, input.end_at)
            .map_err(clinica_core::CoreError::from)?;

        debug!(doctor_id = %input.doctor_id, "schedule_appointment");

        let appointment = self
            .db()
            .appointments()
            .book(&NewAppointment {
                patient_id: input.patient_id,
                doctor_id: input.doctor_id,
                start_at: input.start_at,
                end_at: input.end_at,
                reason: input.reason,
                notes: input.notes,
                created_by: ctx.user_id.clone(),
            })
            .await?;

        self.revalidate(&[View::Appointments]);
        Ok(appointment)
    }

    /// Moves an appointment to a new slot under the same overlap rule.
    pub async fn reschedule_appointment(
        &self,
        ctx: &AuthContext,
        input: RescheduleAppointmentInput,
    ) -> ActionResult<Appointment> {
        ctx.require_staff("reprogramar citas")?;
        validate_time_range("fecha_hora_inicio", input.start_at, input.end_at)
            .map_err(clinica_core::CoreError::from)?;

        let appointment = self
            .db()
            .appointments()
            .reschedule(&input.appointment_id, input.start_at, input.end_at)
            .await?;

        self.revalidate(&[View::Appointments]);
        Ok(appointment)
    }

    /// Applies a status transition and returns the statuses the UI may
    /// offer next.
    pub async fn update_appointment_status(
        &self,
        ctx: &AuthContext,
        appointment_id: &str,
        requested: AppointmentStatus,
    ) -> ActionResult<StatusUpdateResponse> {
        ctx.require_staff("actualizar el estado de citas")?;

        let appointment = self
            .db()
            .appointments()
            .update_status(appointment_id, requested)
            .await?;

        self.revalidate(&[View::Appointments]);
        Ok(StatusUpdateResponse {
            available_transitions: appointment.status.available_transitions().to_vec(),
            appointment,
        })
    }

    /// Hard-deletes an appointment. Admin only.
    pub async fn delete_appointment(&self, ctx: &AuthContext, appointment_id: &str) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin], "eliminar citas")?;

        self.db().appointments().delete(appointment_id).await?;

        self.revalidate(&[View::Appointments]);
        Ok(())
    }

    /// Attaches a billable service line to an appointment, snapshotting
    /// the catalog price.
    pub async fn add_service_to_appointment(
        &self,
        ctx: &AuthContext,
        appointment_id: &str,
        service_id: &str,
        quantity: i64,
    ) -> ActionResult<AppointmentService> {
        ctx.require_staff("agregar servicios a citas")?;
        validate_quantity("cantidad", quantity).map_err(clinica_core::CoreError::from)?;

        let line = self
            .db()
            .appointments()
            .attach_service(appointment_id, service_id, quantity)
            .await?;

        self.revalidate(&[View::Appointments, View::Payments]);
        Ok(line)
    }

    /// Pending service lines of a patient, for the billing form.
    pub async fn unpaid_services(
        &self,
        ctx: &AuthContext,
        patient_id: &str,
    ) -> ActionResult<Vec<AppointmentService>> {
        ctx.require_staff("consultar servicios pendientes")?;

        Ok(self.db().appointments().unpaid_services(patient_id).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{at, fixture};
    use crate::ErrorCode;
    use clinica_core::Role;

    fn schedule_input(
        fx: &crate::testsupport::Fixture,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ScheduleAppointmentInput {
        ScheduleAppointmentInput {
            patient_id: fx.patient.id.clone(),
            doctor_id: fx.doctor.id.clone(),
            start_at: start,
            end_at: end,
            reason: Some("Control".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_and_revalidate() {
        let fx = fixture().await;

        let appointment = fx
            .actions
            .schedule_appointment(&fx.as_clerk(), schedule_input(&fx, at(10, 0), at(10, 30)))
            .await
            .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Programada);
        assert_eq!(appointment.created_by, fx.clerk.id);
        assert!(fx.revalidator.recorded().contains(&View::Appointments));
    }

    #[tokio::test]
    async fn test_role_none_cannot_schedule() {
        let fx = fixture().await;
        let outsider = AuthContext::new("anon", Role::None);

        let err = fx
            .actions
            .schedule_appointment(&outsider, schedule_input(&fx, at(10, 0), at(10, 30)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert!(fx.revalidator.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected_before_storage() {
        let fx = fixture().await;

        let err = fx
            .actions
            .schedule_appointment(&fx.as_clerk(), schedule_input(&fx, at(10, 30), at(10, 0)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn test_overlap_surfaces_slot_unavailable_with_field() {
        let fx = fixture().await;
        let clerk = fx.as_clerk();

        fx.actions
            .schedule_appointment(&clerk, schedule_input(&fx, at(10, 0), at(10, 30)))
            .await
            .unwrap();

        let err = fx
            .actions
            .schedule_appointment(&clerk, schedule_input(&fx, at(10, 15), at(10, 45)))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::SlotUnavailable);
        assert_eq!(err.field.as_deref(), Some("fecha_hora_inicio"));
    }

    #[tokio::test]
    async fn test_status_update_returns_next_transitions() {
        let fx = fixture().await;
        let clerk = fx.as_clerk();

        let appointment = fx
            .actions
            .schedule_appointment(&clerk, schedule_input(&fx, at(10, 0), at(10, 30)))
            .await
            .unwrap();

        let response = fx
            .actions
            .update_appointment_status(&clerk, &appointment.id, AppointmentStatus::Confirmada)
            .await
            .unwrap();

        assert_eq!(response.appointment.status, AppointmentStatus::Confirmada);
        assert_eq!(
            response.available_transitions,
            vec![
                AppointmentStatus::EnSala,
                AppointmentStatus::Cancelada,
                AppointmentStatus::NoAsistio,
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_is_admin_only() {
        let fx = fixture().await;
        let clerk = fx.as_clerk();

        let appointment = fx
            .actions
            .schedule_appointment(&clerk, schedule_input(&fx, at(10, 0), at(10, 30)))
            .await
            .unwrap();

        let err = fx
            .actions
            .delete_appointment(&clerk, &appointment.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        fx.actions
            .delete_appointment(&fx.as_admin(), &appointment.id)
            .await
            .unwrap();
    }
}
