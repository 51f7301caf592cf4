//! # clinica-actions: Server Actions for the Clinic System
//!
//! The orchestration layer between the web frontend and the
//! transactional core. Every action follows the same shape:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. AuthContext  - explicit identity, rejected first if missing         │
//! │  2. Role gate    - per-operation role list                              │
//! │  3. Validation   - clinica-core rules, field-attributed errors          │
//! │  4. Delegate     - one call into a clinica-db procedure                 │
//! │  5. Translate    - DbError/CoreError → ActionError (Spanish message)    │
//! │  6. Revalidate   - mark stale views, fire-and-forget                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expected domain failures are returned as values ([`ActionError`]),
//! never thrown; only truly unexpected storage failures collapse into a
//! generic retry prompt (logged server-side).

// =============================================================================
// Module Declarations
// =============================================================================

pub mod appointments;
pub mod auth;
pub mod closings;
pub mod error;
pub mod inventory;
pub mod payments;
pub mod revalidate;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::AuthContext;
pub use error::{ActionError, ErrorCode};
pub use revalidate::{NoopRevalidator, Revalidator, View};

use std::sync::Arc;

use clinica_db::Database;

/// Result type for server actions.
pub type ActionResult<T> = Result<T, ActionError>;

/// The action entry point handed to the web layer.
#[derive(Clone)]
pub struct Actions {
    db: Database,
    revalidator: Arc<dyn Revalidator>,
}

impl Actions {
    /// Creates the action layer with a no-op revalidator.
    pub fn new(db: Database) -> Self {
        Actions {
            db,
            revalidator: Arc::new(NoopRevalidator),
        }
    }

    /// Creates the action layer with a custom revalidator.
    pub fn with_revalidator(db: Database, revalidator: Arc<dyn Revalidator>) -> Self {
        Actions { db, revalidator }
    }

    /// The underlying database handle.
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn revalidate(&self, views: &[View]) {
        self.revalidator.revalidate(views);
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testsupport {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use clinica_core::{Patient, Product, Role, Service, User};
    use clinica_db::{Database, DbConfig};

    use crate::revalidate::RecordingRevalidator;
    use crate::{Actions, AuthContext};

    pub(crate) struct Fixture {
        pub actions: Actions,
        pub revalidator: Arc<RecordingRevalidator>,
        pub admin: User,
        pub doctor: User,
        pub clerk: User,
        pub patient: Patient,
        pub service: Service,
        pub product: Product,
    }

    impl Fixture {
        pub(crate) fn as_admin(&self) -> AuthContext {
            AuthContext::new(&self.admin.id, Role::Admin)
        }

        pub(crate) fn as_doctor(&self) -> AuthContext {
            AuthContext::new(&self.doctor.id, Role::Medico)
        }

        pub(crate) fn as_clerk(&self) -> AuthContext {
            AuthContext::new(&self.clerk.id, Role::Secretaria)
        }
    }

    pub(crate) async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let admin = catalog.insert_user("Admin", Role::Admin).await.unwrap();
        let doctor = catalog.insert_user("Dr. Quispe", Role::Medico).await.unwrap();
        let clerk = catalog.insert_user("Rosa", Role::Secretaria).await.unwrap();
        let patient = catalog.insert_patient("Juan Pérez", None).await.unwrap();
        let service = catalog.insert_service("Consulta general", 5000).await.unwrap();
        let product = catalog
            .insert_product("PARA-500", "Paracetamol 500mg", 150, 100)
            .await
            .unwrap();

        let revalidator = Arc::new(RecordingRevalidator::default());
        let actions = Actions::with_revalidator(db, revalidator.clone());

        Fixture {
            actions,
            revalidator,
            admin,
            doctor,
            clerk,
            patient,
            service,
            product,
        }
    }

    pub(crate) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, hour, minute, 0).unwrap()
    }
}
