//! # Seed Data Generator
//!
//! Populates the database with development data: one user per role,
//! patients, the service catalog and a starting product inventory.
//!
//! ## Usage
//! ```bash
//! cargo run -p clinica-db --bin seed
//!
//! # Specify database path
//! cargo run -p clinica-db --bin seed -- --db ./data/clinica.db
//! ```

use std::env;

use clinica_core::Role;
use clinica_db::{Database, DbConfig};

const USERS: &[(&str, Role)] = &[
    ("Admin General", Role::Admin),
    ("Dr. Quispe", Role::Medico),
    ("Dra. Salas", Role::Medico),
    ("Lic. Rojas", Role::Enfermera),
    ("Rosa Medina", Role::Secretaria),
];

const PATIENTS: &[(&str, &str)] = &[
    ("Juan Pérez", "45879632"),
    ("María Torres", "41236987"),
    ("Luis Fernández", "40789123"),
    ("Carmen Díaz", "46321458"),
];

/// (name, price in cents)
const SERVICES: &[(&str, i64)] = &[
    ("Consulta general", 5000),
    ("Consulta especializada", 8000),
    ("Curación simple", 1500),
    ("Inyectable", 1000),
    ("Control post operatorio", 3000),
];

/// (sku, name, price in cents, opening stock)
const PRODUCTS: &[(&str, &str, i64, i64)] = &[
    ("PARA-500", "Paracetamol 500mg", 150, 200),
    ("IBU-400", "Ibuprofeno 400mg", 200, 150),
    ("AMOX-500", "Amoxicilina 500mg", 350, 80),
    ("GASA-10", "Gasa estéril 10x10", 100, 300),
    ("ALCO-250", "Alcohol 70% 250ml", 450, 60),
    ("SUERO-1L", "Suero fisiológico 1L", 900, 40),
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut db_path = "./clinica.db".to_string();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                db_path = args.next().expect("--db requires a path");
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(1);
            }
        }
    }

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .expect("failed to open database");
    let catalog = db.catalog();

    for (name, role) in USERS {
        let user = catalog.insert_user(name, *role).await.expect("insert user");
        println!("user     {:<22} {:?} ({})", user.name, user.role, user.id);
    }

    for (name, document) in PATIENTS {
        let patient = catalog
            .insert_patient(name, Some(document))
            .await
            .expect("insert patient");
        println!("patient  {:<22} ({})", patient.name, patient.id);
    }

    for (name, price_cents) in SERVICES {
        let service = catalog
            .insert_service(name, *price_cents)
            .await
            .expect("insert service");
        println!("service  {:<22} {} ({})", service.name, service.price_cents, service.id);
    }

    for (sku, name, price_cents, stock) in PRODUCTS {
        let product = catalog
            .insert_product(sku, name, *price_cents, *stock)
            .await
            .expect("insert product");
        println!("product  {:<22} stock {} ({})", product.sku, product.stock, product.id);
    }

    println!("seed complete: {db_path}");
}
