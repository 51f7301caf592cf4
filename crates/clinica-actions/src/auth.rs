//! # Authentication Context
//!
//! An explicit [`AuthContext`] value is populated once per request by
//! the identity collaborator and passed into every action. Business
//! logic never re-derives identity or role ad hoc; privileged
//! procedures additionally re-check the role against the users table
//! inside their transaction.

use clinica_core::Role;

use crate::error::ActionError;

/// The acting identity of a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
}

impl AuthContext {
    /// Creates a context from an already-resolved identity.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        AuthContext {
            user_id: user_id.into(),
            role,
        }
    }

    /// Builds the context from the identity provider's session lookup.
    /// `None` means no valid session - always rejected first, before
    /// any business logic.
    pub fn from_session(session: Option<(String, Role)>) -> Result<Self, ActionError> {
        match session {
            Some((user_id, role)) => Ok(AuthContext { user_id, role }),
            None => Err(ActionError::unauthenticated()),
        }
    }

    /// Requires any staff role.
    pub fn require_staff(&self, action: &str) -> Result<(), ActionError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ActionError::unauthorized(action))
        }
    }

    /// Requires one of the listed roles. Role lists differ per
    /// operation (e.g. voiding a payment: admin or medico).
    pub fn require_role(&self, allowed: &[Role], action: &str) -> Result<(), ActionError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ActionError::unauthorized(action))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_missing_session_is_unauthenticated() {
        let err = AuthContext::from_session(None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }

    #[test]
    fn test_role_none_is_not_staff() {
        let ctx = AuthContext::new("u1", Role::None);
        let err = ctx.require_staff("agendar citas").unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_role_lists() {
        let clerk = AuthContext::new("u1", Role::Secretaria);
        assert!(clerk.require_staff("agendar citas").is_ok());
        assert!(clerk
            .require_role(&[Role::Admin, Role::Medico], "anular pagos")
            .is_err());

        let doctor = AuthContext::new("u2", Role::Medico);
        assert!(doctor
            .require_role(&[Role::Admin, Role::Medico], "anular pagos")
            .is_ok());
    }
}
