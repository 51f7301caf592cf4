//! # clinica-db: Database Layer for the Clinic System
//!
//! This crate provides storage for the clinic backend. It uses SQLite
//! with sqlx for async operations and owns every transaction boundary:
//! the overlap-safe booking write, the gapless document counters, and
//! the all-or-nothing financial procedures.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Clinica Data Flow                                │
//! │                                                                         │
//! │  Server action (create_payment)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    clinica-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ appointment    │    │  (embedded)  │  │   │
//! │  │   │               │    │ payment        │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │    │ purchase/sale  │    └──────────────┘  │   │
//! │  │   │ BEGIN         │    │ returns        │                      │   │
//! │  │   │ IMMEDIATE     │    │ closing        │    ┌──────────────┐  │   │
//! │  │   └───────────────┘    │ catalog        │    │   counter    │  │   │
//! │  │                        └────────────────┘    │  (gapless)   │  │   │
//! │  │                                              └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                         SQLite (WAL)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`counter`] - Gapless document counters
//! - [`repository`] - Transactional procedures per entity

// =============================================================================
// Module Declarations
// =============================================================================

pub mod counter;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::appointment::AppointmentRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::closing::ClosingRepository;
pub use repository::payment::PaymentRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::SaleRepository;
