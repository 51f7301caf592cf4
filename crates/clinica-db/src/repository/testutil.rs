//! Shared fixtures for repository tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::pool::{Database, DbConfig};
use clinica_core::{Patient, Product, Role, Service, User};

/// A seeded in-memory database with one user per role, a patient, a
/// service and a product.
pub(crate) struct Fixture {
    pub db: Database,
    pub admin: User,
    pub doctor: User,
    pub nurse: User,
    pub clerk: User,
    pub patient: Patient,
    pub service: Service,
    pub product: Product,
}

pub(crate) async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = db.catalog();

    let admin = catalog.insert_user("Admin", Role::Admin).await.unwrap();
    let doctor = catalog.insert_user("Dr. Quispe", Role::Medico).await.unwrap();
    let nurse = catalog.insert_user("Lic. Rojas", Role::Enfermera).await.unwrap();
    let clerk = catalog.insert_user("Rosa", Role::Secretaria).await.unwrap();
    let patient = catalog.insert_patient("Juan Pérez", Some("45879632")).await.unwrap();
    let service = catalog.insert_service("Consulta general", 5000).await.unwrap();
    let product = catalog
        .insert_product("PARA-500", "Paracetamol 500mg", 150, 100)
        .await
        .unwrap();

    Fixture {
        db,
        admin,
        doctor,
        nurse,
        clerk,
        patient,
        service,
        product,
    }
}

/// A fixed test day at hour:minute UTC.
pub(crate) fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, hour, minute, 0).unwrap()
}
