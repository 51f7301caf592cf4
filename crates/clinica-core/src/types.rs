//! # Domain Types
//!
//! Core domain types used throughout the clinic system.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │  Appointment    │   │    Payment      │   │  CashClosing    │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │        │
//! │  │  doctor_id      │   │  invoice_number │   │  closing_number │        │
//! │  │  start/end      │   │  status         │   │  closing_date   │        │
//! │  │  status         │   │  total_cents    │   │  difference     │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │   Purchase      │   │ PurchaseReturn  │   │      Sale       │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every transactional entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business number: (invoice_number, closing_number, ...) - gapless,
//!   strictly increasing, assigned inside the creating transaction
//!
//! ## Status Vocabulary
//! Status values are the Spanish vocabulary of the clinic and are stored
//! verbatim in the database (`programada`, `en_atencion`, `anulado`, ...).
//! `label()` returns the human form shown in the UI ("En Atención").

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Roles
// =============================================================================

/// Staff roles recognised by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Medico,
    Enfermera,
    Secretaria,
    /// Authenticated identity with no staff role assigned.
    None,
}

impl Role {
    /// Checks if this role is any staff role (not `None`).
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::None)
    }
}

// =============================================================================
// Appointment Status
// =============================================================================

/// The status of an appointment.
///
/// The full transition table lives in [`crate::transitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Scheduled, not yet confirmed by the patient.
    Programada,
    /// Confirmed by the patient.
    Confirmada,
    /// Patient is in the waiting room.
    EnSala,
    /// Patient is being attended.
    EnAtencion,
    /// Encounter finished (terminal).
    Completada,
    /// Cancelled (terminal).
    Cancelada,
    /// Patient did not show up (terminal).
    NoAsistio,
}

impl AppointmentStatus {
    /// Human label shown in the UI and carried by transition errors.
    pub const fn label(&self) -> &'static str {
        match self {
            AppointmentStatus::Programada => "Programada",
            AppointmentStatus::Confirmada => "Confirmada",
            AppointmentStatus::EnSala => "En Sala",
            AppointmentStatus::EnAtencion => "En Atención",
            AppointmentStatus::Completada => "Completada",
            AppointmentStatus::Cancelada => "Cancelada",
            AppointmentStatus::NoAsistio => "No Asistió",
        }
    }

    /// Whether an appointment in this status occupies the doctor's agenda.
    ///
    /// ## Invariant
    /// No two agenda-blocking appointments for the same doctor may have
    /// overlapping [start, end) intervals. Cancelled and no-show
    /// appointments free their slot.
    pub const fn blocks_agenda(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelada | AppointmentStatus::NoAsistio
        )
    }

    /// Whether a rescheduling (time-only update) is still allowed.
    pub const fn allows_reschedule(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Programada | AppointmentStatus::Confirmada
        )
    }
}

// =============================================================================
// Service / Payment Statuses
// =============================================================================

/// Payment status of a service line attached to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ServicePaymentStatus {
    Pendiente,
    /// Settled by a payment item. Once here, the line is immutable.
    Pagado,
}

/// Status of a payment. Payments are immutable once created: they can be
/// voided, never edited or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Activo,
    Anulado,
}

impl PaymentStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Activo => "Activo",
            PaymentStatus::Anulado => "Anulado",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How (part of) a payment or sale was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    /// Physical cash. The only method that participates in the physical
    /// count during cash reconciliation.
    Efectivo,
    Tarjeta,
    Transferencia,
}

impl PaymentMethodKind {
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethodKind::Efectivo => "Efectivo",
            PaymentMethodKind::Tarjeta => "Tarjeta",
            PaymentMethodKind::Transferencia => "Transferencia",
        }
    }

    /// Electronic methods require a receipt reference at creation time.
    pub const fn is_electronic(&self) -> bool {
        !matches!(self, PaymentMethodKind::Efectivo)
    }

    /// All methods, in reporting order.
    pub const fn all() -> [PaymentMethodKind; 3] {
        [
            PaymentMethodKind::Efectivo,
            PaymentMethodKind::Tarjeta,
            PaymentMethodKind::Transferencia,
        ]
    }
}

// =============================================================================
// Purchase / Return Statuses
// =============================================================================

/// Status of an inventory purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Registered, goods not yet received.
    PendienteRecepcion,
    /// Goods received, stock incremented.
    Recibido,
    /// Cancelled; if it had been received, stock was reversed.
    Anulado,
}

impl PurchaseStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            PurchaseStatus::PendienteRecepcion => "Pendiente de Recepción",
            PurchaseStatus::Recibido => "Recibido",
            PurchaseStatus::Anulado => "Anulado",
        }
    }
}

/// Status of a product return request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pendiente,
    /// Approved; quantity moved into the separate returns-stock bucket.
    Aprobada,
    /// Rejected; no stock effect.
    Rechazada,
}

impl ReturnStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            ReturnStatus::Pendiente => "Pendiente",
            ReturnStatus::Aprobada => "Aprobada",
            ReturnStatus::Rechazada => "Rechazada",
        }
    }
}

// =============================================================================
// Cash Closing
// =============================================================================

/// Status of a daily cash closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClosingStatus {
    /// Conceptual pre-state of a day before its closing exists. Never
    /// persisted; kept in the table for transition completeness.
    Abierto,
    Cerrado,
    /// Reopened by an authorized role. The row is kept as the audit
    /// record; a later closing for the same date links back to it.
    Reabierto,
}

impl ClosingStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            ClosingStatus::Abierto => "Abierto",
            ClosingStatus::Cerrado => "Cerrado",
            ClosingStatus::Reabierto => "Reabierto",
        }
    }
}

/// Which cash module a closing belongs to. The clinic module tracks
/// discounts and voids separately; the sales module closes raw sale
/// totals under the zero-tolerance variance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClosingModule {
    Clinica,
    Ventas,
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Kind of stock movement appended by the transactional procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    EntradaCompra,
    SalidaVenta,
    ReversaCompra,
    EntradaDevolucion,
}

// =============================================================================
// People & Catalog Records
// =============================================================================

/// A staff user. Roles are re-checked against this record inside
/// privileged transactions, never trusted from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A patient of the clinic.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Patient {
    pub id: String,
    pub name: String,
    /// National document number, when registered.
    pub document_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A billable service in the catalog. Prices here are mutable; billing
/// snapshots them at attach time (see [`AppointmentService`]).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sellable inventory product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// Sellable stock. Mutated only inside transactional procedures.
    pub stock: i64,
    /// Returned units awaiting disposition. Never mixed with sellable
    /// stock.
    pub returns_stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Appointment
// =============================================================================

/// A scheduled doctor-patient encounter.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    #[ts(as = "String")]
    pub start_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A billable service line attached to an appointment.
/// Uses the snapshot pattern: name and price are frozen at attach time
/// and never follow later catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AppointmentService {
    pub id: String,
    pub appointment_id: String,
    pub service_id: String,
    /// Service name at attach time (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at attach time (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// unit_price_cents × quantity.
    pub subtotal_cents: i64,
    pub payment_status: ServicePaymentStatus,
    /// Payment item that settled this line, once `pagado`.
    pub settled_by_item_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// An immutable financial transaction. Created atomically with a gapless
/// invoice number; voidable with elevated role and justification, never
/// edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub patient_id: String,
    /// Gapless, strictly increasing. Assigned inside the creating
    /// transaction; failed attempts never consume a number.
    pub invoice_number: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// Required whenever discount_cents > 0.
    pub discount_reason: Option<String>,
    /// subtotal_cents - discount_cents.
    pub total_cents: i64,
    pub status: PaymentStatus,
    pub voided_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A service line inside a payment (snapshot of an appointment service
/// or a direct catalog charge).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentItem {
    pub id: String,
    pub payment_id: String,
    pub service_id: String,
    /// Appointment service line this item settles, if any.
    pub appointment_service_id: Option<String>,
    pub description: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// One tender of a payment. A payment can be split across methods; the
/// amounts must sum to the payment total exactly.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethod {
    pub id: String,
    pub payment_id: String,
    pub method: PaymentMethodKind,
    pub amount_cents: i64,
    /// Blob-storage path of the receipt photo. Required for electronic
    /// methods.
    pub receipt_path: Option<String>,
}

// =============================================================================
// Purchase
// =============================================================================

/// An inventory purchase from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    /// Gapless, same numbering discipline as invoices.
    pub purchase_number: i64,
    pub supplier: String,
    pub status: PurchaseStatus,
    pub total_cents: i64,
    pub created_by: String,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A line item of a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

/// A product return request. Approval moves the quantity into the
/// separate returns-stock bucket.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseReturn {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
    pub status: ReturnStatus,
    pub requested_by: String,
    /// Approver or rejecter. Must differ from `requested_by`.
    pub resolved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale (inventory module)
// =============================================================================

/// A counter sale of inventory products. Stock is decremented in the
/// same transaction that creates the sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Gapless per the same counter discipline.
    pub sale_number: i64,
    pub total_cents: i64,
    pub method: PaymentMethodKind,
    pub receipt_path: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line item in a sale. Snapshot pattern, as everywhere in billing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// An append-only stock movement record written alongside every stock
/// mutation, in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Signed delta applied to the bucket the kind targets.
    pub quantity: i64,
    /// Id of the purchase, sale or return that triggered the movement.
    pub reference_id: String,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Closing
// =============================================================================

/// A per-calendar-day reconciliation snapshot. At most one `cerrado`
/// closing per (module, date).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashClosing {
    pub id: String,
    /// Gapless, same numbering discipline as invoices.
    pub closing_number: i64,
    pub module: ClosingModule,
    #[ts(as = "String")]
    pub closing_date: NaiveDate,
    pub grand_total_cents: i64,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: i64,
    /// counted - expected.
    pub difference_cents: i64,
    /// Required whenever difference_cents != 0.
    pub difference_reason: Option<String>,
    pub discount_total_cents: i64,
    pub void_total_cents: i64,
    pub evidence_path: Option<String>,
    pub status: ClosingStatus,
    pub reopened_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub reopened_at: Option<DateTime<Utc>>,
    pub reopen_reason: Option<String>,
    /// The reopened closing this one supersedes, if the date was closed
    /// before.
    pub previous_closing_id: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Per-method expected total snapshotted into a closing. Stored as typed
/// rows, one per method with a non-zero total.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ClosingMethodTotal {
    pub closing_id: String,
    pub method: PaymentMethodKind,
    pub total_cents: i64,
}

// =============================================================================
// Creation Payloads
// =============================================================================
// Input records the orchestration layer validates and hands to the
// transactional procedures. Ids, numbers and timestamps are assigned by
// the procedure, never by the caller.

/// Payload to book an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

/// One service line of a payment under creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentItem {
    pub service_id: String,
    /// Appointment service line this item settles, if any.
    pub appointment_service_id: Option<String>,
    pub description: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl NewPaymentItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// One tender of a payment under creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    pub method: PaymentMethodKind,
    pub amount_cents: i64,
    pub receipt_path: Option<String>,
}

/// Payload to create a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub patient_id: String,
    pub items: Vec<NewPaymentItem>,
    pub methods: Vec<NewPaymentMethod>,
    pub discount_cents: i64,
    pub discount_reason: Option<String>,
    pub created_by: String,
}

impl NewPayment {
    /// Sum of line totals.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(|i| i.line_total()).sum()
    }

    /// subtotal - discount.
    pub fn total(&self) -> Money {
        self.subtotal() - Money::from_cents(self.discount_cents)
    }

    /// Sum of method amounts.
    pub fn methods_total(&self) -> Money {
        self.methods
            .iter()
            .map(|m| Money::from_cents(m.amount_cents))
            .sum()
    }
}

/// One line of a purchase under registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

/// Payload to register a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier: String,
    pub items: Vec<NewPurchaseItem>,
    pub created_by: String,
}

/// One line of a sale under creation. Prices are snapshotted from the
/// product catalog inside the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Payload to create a counter sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub items: Vec<NewSaleItem>,
    pub method: PaymentMethodKind,
    pub receipt_path: Option<String>,
    pub created_by: String,
}

/// Payload to request a product return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReturn {
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
    pub requested_by: String,
}

/// Payload to create a cash closing for a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClosing {
    pub module: ClosingModule,
    pub closing_date: NaiveDate,
    pub counted_cash_cents: i64,
    pub difference_reason: Option<String>,
    pub evidence_path: Option<String>,
    pub created_by: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
