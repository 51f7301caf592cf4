//! # Status Transition Tables
//!
//! Static transition tables for every stateful entity. Pure, total,
//! deterministic - no side effects, no I/O.
//!
//! ## Appointment Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  programada ──► confirmada ──► en_sala ──► en_atencion ──► completada   │
//! │      │              │             │             │                       │
//! │      ├──► cancelada ├──► cancelada└──► cancelada└──► cancelada          │
//! │      └──► no_asistio└──► no_asistio                                     │
//! │                                                                         │
//! │  completada / cancelada / no_asistio are terminal (no way out,          │
//! │  not even between each other).                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check MUST run against a freshly fetched status, and the write
//! must be a compare-and-swap on that same status; clinica-db owns that
//! part. This module only answers "is this edge in the table".
//!
//! Self-transitions are never listed: a status is never its own
//! successor.

use crate::error::{CoreError, CoreResult};
use crate::types::{AppointmentStatus, ClosingStatus, PurchaseStatus, ReturnStatus};

// =============================================================================
// Appointment
// =============================================================================

impl AppointmentStatus {
    /// Every status, for exhaustive iteration in checks and tests.
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Programada,
        AppointmentStatus::Confirmada,
        AppointmentStatus::EnSala,
        AppointmentStatus::EnAtencion,
        AppointmentStatus::Completada,
        AppointmentStatus::Cancelada,
        AppointmentStatus::NoAsistio,
    ];

    /// The set of statuses reachable from `self` in one legal step.
    pub const fn available_transitions(self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Programada => &[
                AppointmentStatus::Confirmada,
                AppointmentStatus::Cancelada,
                AppointmentStatus::NoAsistio,
            ],
            AppointmentStatus::Confirmada => &[
                AppointmentStatus::EnSala,
                AppointmentStatus::Cancelada,
                AppointmentStatus::NoAsistio,
            ],
            AppointmentStatus::EnSala => &[
                AppointmentStatus::EnAtencion,
                AppointmentStatus::Cancelada,
            ],
            AppointmentStatus::EnAtencion => &[
                AppointmentStatus::Completada,
                AppointmentStatus::Cancelada,
            ],
            // Terminal states
            AppointmentStatus::Completada
            | AppointmentStatus::Cancelada
            | AppointmentStatus::NoAsistio => &[],
        }
    }

    /// Checks whether `self -> requested` is in the transition table.
    pub fn can_transition(self, requested: AppointmentStatus) -> bool {
        self.available_transitions().contains(&requested)
    }

    /// Like [`Self::can_transition`], but produces the typed error
    /// carrying both human labels for display.
    pub fn check_transition(self, requested: AppointmentStatus) -> CoreResult<()> {
        if self.can_transition(requested) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: "cita",
                from: self.label(),
                to: requested.label(),
            })
        }
    }
}

// =============================================================================
// Purchase
// =============================================================================

impl PurchaseStatus {
    pub const ALL: [PurchaseStatus; 3] = [
        PurchaseStatus::PendienteRecepcion,
        PurchaseStatus::Recibido,
        PurchaseStatus::Anulado,
    ];

    pub const fn available_transitions(self) -> &'static [PurchaseStatus] {
        match self {
            PurchaseStatus::PendienteRecepcion => {
                &[PurchaseStatus::Recibido, PurchaseStatus::Anulado]
            }
            // Cancelling a received purchase reverses its stock increments.
            PurchaseStatus::Recibido => &[PurchaseStatus::Anulado],
            PurchaseStatus::Anulado => &[],
        }
    }

    pub fn can_transition(self, requested: PurchaseStatus) -> bool {
        self.available_transitions().contains(&requested)
    }

    pub fn check_transition(self, requested: PurchaseStatus) -> CoreResult<()> {
        if self.can_transition(requested) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: "compra",
                from: self.label(),
                to: requested.label(),
            })
        }
    }
}

// =============================================================================
// Return
// =============================================================================

impl ReturnStatus {
    pub const ALL: [ReturnStatus; 3] = [
        ReturnStatus::Pendiente,
        ReturnStatus::Aprobada,
        ReturnStatus::Rechazada,
    ];

    pub const fn available_transitions(self) -> &'static [ReturnStatus] {
        match self {
            ReturnStatus::Pendiente => &[ReturnStatus::Aprobada, ReturnStatus::Rechazada],
            ReturnStatus::Aprobada | ReturnStatus::Rechazada => &[],
        }
    }

    pub fn can_transition(self, requested: ReturnStatus) -> bool {
        self.available_transitions().contains(&requested)
    }

    pub fn check_transition(self, requested: ReturnStatus) -> CoreResult<()> {
        if self.can_transition(requested) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: "devolución",
                from: self.label(),
                to: requested.label(),
            })
        }
    }
}

// =============================================================================
// Cash Closing
// =============================================================================

impl ClosingStatus {
    pub const ALL: [ClosingStatus; 3] = [
        ClosingStatus::Abierto,
        ClosingStatus::Cerrado,
        ClosingStatus::Reabierto,
    ];

    /// `abierto` is the conceptual pre-state of a day without a closing;
    /// `reabierto` is terminal for the row - a new closing for the date
    /// is a new row linking back to it, never a flip back to `abierto`.
    pub const fn available_transitions(self) -> &'static [ClosingStatus] {
        match self {
            ClosingStatus::Abierto => &[ClosingStatus::Cerrado],
            ClosingStatus::Cerrado => &[ClosingStatus::Reabierto],
            ClosingStatus::Reabierto => &[],
        }
    }

    pub fn can_transition(self, requested: ClosingStatus) -> bool {
        self.available_transitions().contains(&requested)
    }

    pub fn check_transition(self, requested: ClosingStatus) -> CoreResult<()> {
        if self.can_transition(requested) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: "cierre de caja",
                from: self.label(),
                to: requested.label(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Transition closure: the reachable set of every status matches the
    /// table exactly, for all (current, requested) pairs including
    /// self-transitions.
    #[test]
    fn test_appointment_transition_closure() {
        use AppointmentStatus::*;

        let expected: &[(AppointmentStatus, &[AppointmentStatus])] = &[
            (Programada, &[Confirmada, Cancelada, NoAsistio]),
            (Confirmada, &[EnSala, Cancelada, NoAsistio]),
            (EnSala, &[EnAtencion, Cancelada]),
            (EnAtencion, &[Completada, Cancelada]),
            (Completada, &[]),
            (Cancelada, &[]),
            (NoAsistio, &[]),
        ];

        for (current, allowed) in expected {
            assert_eq!(current.available_transitions(), *allowed);
            for requested in AppointmentStatus::ALL {
                let legal = allowed.contains(&requested);
                assert_eq!(
                    current.can_transition(requested),
                    legal,
                    "{:?} -> {:?}",
                    current,
                    requested
                );
            }
        }
    }

    #[test]
    fn test_self_transitions_always_fail() {
        for status in AppointmentStatus::ALL {
            assert!(!status.can_transition(status), "{:?}", status);
        }
        for status in PurchaseStatus::ALL {
            assert!(!status.can_transition(status), "{:?}", status);
        }
        for status in ReturnStatus::ALL {
            assert!(!status.can_transition(status), "{:?}", status);
        }
        for status in ClosingStatus::ALL {
            assert!(!status.can_transition(status), "{:?}", status);
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use AppointmentStatus::*;
        for terminal in [Completada, Cancelada, NoAsistio] {
            assert!(terminal.available_transitions().is_empty());
        }
        // Terminal states are not reachable from each other either.
        assert!(!Cancelada.can_transition(NoAsistio));
        assert!(!NoAsistio.can_transition(Cancelada));
        assert!(!Completada.can_transition(Cancelada));
    }

    #[test]
    fn test_invalid_transition_error_labels() {
        use AppointmentStatus::*;
        let err = Completada.check_transition(EnAtencion).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Completada"), "{msg}");
        assert!(msg.contains("En Atención"), "{msg}");
    }

    #[test]
    fn test_purchase_transitions() {
        use PurchaseStatus::*;
        assert!(PendienteRecepcion.can_transition(Recibido));
        assert!(PendienteRecepcion.can_transition(Anulado));
        assert!(Recibido.can_transition(Anulado));
        assert!(!Recibido.can_transition(PendienteRecepcion));
        assert!(Anulado.available_transitions().is_empty());
    }

    #[test]
    fn test_return_transitions() {
        use ReturnStatus::*;
        assert!(Pendiente.can_transition(Aprobada));
        assert!(Pendiente.can_transition(Rechazada));
        assert!(Aprobada.available_transitions().is_empty());
        assert!(Rechazada.available_transitions().is_empty());
    }

    #[test]
    fn test_closing_transitions() {
        use ClosingStatus::*;
        assert!(Abierto.can_transition(Cerrado));
        assert!(Cerrado.can_transition(Reabierto));
        assert!(!Reabierto.can_transition(Abierto));
        assert!(!Reabierto.can_transition(Cerrado));
    }
}
