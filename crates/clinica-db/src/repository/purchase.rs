//! # Purchase Repository
//!
//! Inventory purchases: register, confirm reception, cancel.
//!
//! ## Purchase Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Purchase Lifecycle                                  │
//! │                                                                         │
//! │  1. REGISTER                                                            │
//! │     └── register() → Purchase { pendiente_recepcion }                   │
//! │         (gapless purchase number)                                       │
//! │                                                                         │
//! │  2. CONFIRM RECEPTION                                                   │
//! │     └── confirm_reception() → recibido                                  │
//! │         stock += qty per item, one movement per item,                   │
//! │         all in one transaction                                          │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                   │
//! │     └── cancel() → anulado                                              │
//! │         if it had been received: stock -= qty per item, failing         │
//! │         the whole cancellation if any stock would go negative           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Connection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::counter::{next_number, SCOPE_PURCHASE};
use crate::error::{DbError, DbResult};
use crate::pool::BEGIN_IMMEDIATE;
use crate::repository::catalog::{add_stock, insert_movement, remove_stock, user_role};
use clinica_core::validation::validate_justification;
use clinica_core::{MovementKind, NewPurchase, Purchase, PurchaseItem, PurchaseStatus, Role};

const PURCHASE_COLUMNS: &str = "id, purchase_number, supplier, status, total_cents, created_by, \
                                received_at, cancelled_by, cancelled_at, cancel_reason, \
                                created_at, updated_at";

/// Repository for purchase operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Registers a purchase in `pendiente_recepcion` with a gapless
    /// purchase number. No stock effect yet.
    pub async fn register(&self, new: &NewPurchase) -> DbResult<Purchase> {
        match self.try_register(new).await {
            Err(DbError::Busy) => {
                warn!("purchase numbering contention, retrying once");
                self.try_register(new).await
            }
            other => other,
        }
    }

    async fn try_register(&self, new: &NewPurchase) -> DbResult<Purchase> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        for item in &new.items {
            let product: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
                .bind(&item.product_id)
                .fetch_optional(&mut *tx)
                .await?;
            if product.is_none() {
                return Err(DbError::not_found("Producto", &item.product_id));
            }
        }

        let purchase_number = next_number(&mut tx, SCOPE_PURCHASE).await?;
        let now = Utc::now();
        let total_cents: i64 = new
            .items
            .iter()
            .map(|i| i.unit_cost_cents * i.quantity)
            .sum();

        let purchase = Purchase {
            id: Uuid::new_v4().to_string(),
            purchase_number,
            supplier: new.supplier.clone(),
            status: PurchaseStatus::PendienteRecepcion,
            total_cents,
            created_by: new.created_by.clone(),
            received_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, purchase_number, supplier, status, total_cents,
                created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&purchase.id)
        .bind(purchase.purchase_number)
        .bind(&purchase.supplier)
        .bind(purchase.status)
        .bind(purchase.total_cents)
        .bind(&purchase.created_by)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in &new.items {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (
                    id, purchase_id, product_id, quantity, unit_cost_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&purchase.id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.unit_cost_cents * item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %purchase.id, purchase_number = purchase.purchase_number, "Purchase registered");
        Ok(purchase)
    }

    /// Confirms reception: atomically flips the status to `recibido`,
    /// increments stock for every line item and appends one stock
    /// movement per item.
    pub async fn confirm_reception(&self, id: &str, by_user: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let status = fetch_status(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Compra", id))?;

        if !status.can_transition(PurchaseStatus::Recibido) {
            return Err(DbError::InvalidState {
                entity: "Compra",
                id: id.to_string(),
                status: status.label(),
            });
        }

        let items = fetch_items(&mut tx, id).await?;
        for item in &items {
            add_stock(&mut tx, &item.product_id, item.quantity).await?;
            insert_movement(
                &mut tx,
                &item.product_id,
                MovementKind::EntradaCompra,
                item.quantity,
                id,
                by_user,
            )
            .await?;
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE purchases SET status = 'recibido', received_at = ?2, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %id, items = items.len(), "Purchase reception confirmed");
        Ok(())
    }

    /// Cancels a purchase. Role re-checked inside the transaction
    /// (admin or medico); justification mandatory. If the purchase had
    /// been received, every stock increment is reversed - the whole
    /// cancellation fails if any item's stock would go negative.
    pub async fn cancel(&self, id: &str, by_user: &str, justification: Option<&str>) -> DbResult<()> {
        let justification = validate_justification("justificacion", justification)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        match user_role(&mut *tx, by_user).await? {
            Some(Role::Admin) | Some(Role::Medico) => {}
            _ => {
                return Err(DbError::Unauthorized {
                    user_id: by_user.to_string(),
                    action: "anular compra",
                });
            }
        }

        let status = fetch_status(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Compra", id))?;

        if !status.can_transition(PurchaseStatus::Anulado) {
            return Err(DbError::InvalidState {
                entity: "Compra",
                id: id.to_string(),
                status: status.label(),
            });
        }

        if status == PurchaseStatus::Recibido {
            let items = fetch_items(&mut tx, id).await?;
            for item in &items {
                remove_stock(&mut tx, &item.product_id, item.quantity).await?;
                insert_movement(
                    &mut tx,
                    &item.product_id,
                    MovementKind::ReversaCompra,
                    -item.quantity,
                    id,
                    by_user,
                )
                .await?;
            }
        }

        sqlx::query(
            "UPDATE purchases SET status = 'anulado', cancelled_by = ?2, cancelled_at = ?3, \
             cancel_reason = ?4, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(by_user)
        .bind(Utc::now())
        .bind(&justification)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %id, by = %by_user, "Purchase cancelled");
        Ok(())
    }

    /// Gets a purchase by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(purchase)
    }

    /// Items of a purchase.
    pub async fn items(&self, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            "SELECT id, purchase_id, product_id, quantity, unit_cost_cents, line_total_cents \
             FROM purchase_items WHERE purchase_id = ?1 ORDER BY rowid",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Purchases awaiting reception, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases \
             WHERE status = 'pendiente_recepcion' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

async fn fetch_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
) -> DbResult<Option<PurchaseStatus>> {
    let status = sqlx::query_scalar::<_, PurchaseStatus>(
        "SELECT status FROM purchases WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(status)
}

async fn fetch_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    purchase_id: &str,
) -> DbResult<Vec<PurchaseItem>> {
    let items = sqlx::query_as::<_, PurchaseItem>(
        "SELECT id, purchase_id, product_id, quantity, unit_cost_cents, line_total_cents \
         FROM purchase_items WHERE purchase_id = ?1 ORDER BY rowid",
    )
    .bind(purchase_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::testutil::{fixture, Fixture};
    use clinica_core::{NewPurchase, NewPurchaseItem, PurchaseStatus};

    fn purchase_of(fx: &Fixture, quantity: i64) -> NewPurchase {
        NewPurchase {
            supplier: "Droguería Central".to_string(),
            items: vec![NewPurchaseItem {
                product_id: fx.product.id.clone(),
                quantity,
                unit_cost_cents: 90,
            }],
            created_by: fx.clerk.id.clone(),
        }
    }

    async fn stock_of(fx: &Fixture) -> i64 {
        fx.db
            .catalog()
            .get_product(&fx.product.id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn test_register_assigns_gapless_numbers() {
        let fx = fixture().await;
        let repo = fx.db.purchases();

        let first = repo.register(&purchase_of(&fx, 10)).await.unwrap();
        assert_eq!(first.purchase_number, 1);
        assert_eq!(first.status, PurchaseStatus::PendienteRecepcion);
        assert_eq!(first.total_cents, 900);

        let second = repo.register(&purchase_of(&fx, 5)).await.unwrap();
        assert_eq!(second.purchase_number, 2);

        // No stock effect before reception
        assert_eq!(stock_of(&fx).await, 100);
    }

    #[tokio::test]
    async fn test_confirm_reception_increments_stock_and_logs() {
        let fx = fixture().await;
        let repo = fx.db.purchases();

        let purchase = repo.register(&purchase_of(&fx, 10)).await.unwrap();
        repo.confirm_reception(&purchase.id, &fx.clerk.id).await.unwrap();

        assert_eq!(stock_of(&fx).await, 110);
        let fetched = repo.get(&purchase.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PurchaseStatus::Recibido);
        assert!(fetched.received_at.is_some());

        let movements: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_movements WHERE reference_id = ?1 AND kind = 'entrada_compra'",
        )
        .bind(&purchase.id)
        .fetch_one(fx.db.pool())
        .await
        .unwrap();
        assert_eq!(movements, 1);

        // Confirming twice is an invalid state
        assert!(matches!(
            repo.confirm_reception(&purchase.id, &fx.clerk.id).await.unwrap_err(),
            DbError::InvalidState { .. }
        ));
    }

    /// Stock reversal symmetry: receive then cancel leaves stock exactly
    /// at its pre-reception value.
    #[tokio::test]
    async fn test_cancel_after_reception_reverses_stock() {
        let fx = fixture().await;
        let repo = fx.db.purchases();
        let before = stock_of(&fx).await;

        let purchase = repo.register(&purchase_of(&fx, 25)).await.unwrap();
        repo.confirm_reception(&purchase.id, &fx.clerk.id).await.unwrap();
        assert_eq!(stock_of(&fx).await, before + 25);

        repo.cancel(&purchase.id, &fx.admin.id, Some("Lote vencido devuelto al proveedor"))
            .await
            .unwrap();

        assert_eq!(stock_of(&fx).await, before);
        let fetched = repo.get(&purchase.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PurchaseStatus::Anulado);
        assert!(fetched.cancel_reason.is_some());
    }

    #[tokio::test]
    async fn test_cancel_without_reception_leaves_stock_unchanged() {
        let fx = fixture().await;
        let repo = fx.db.purchases();
        let before = stock_of(&fx).await;

        let purchase = repo.register(&purchase_of(&fx, 25)).await.unwrap();
        repo.cancel(&purchase.id, &fx.admin.id, Some("Pedido duplicado por error"))
            .await
            .unwrap();

        assert_eq!(stock_of(&fx).await, before);
        assert!(matches!(
            repo.cancel(&purchase.id, &fx.admin.id, Some("Pedido duplicado por error"))
                .await
                .unwrap_err(),
            DbError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn test_cancel_fails_when_stock_already_sold() {
        let fx = fixture().await;
        let repo = fx.db.purchases();

        let purchase = repo.register(&purchase_of(&fx, 10)).await.unwrap();
        repo.confirm_reception(&purchase.id, &fx.clerk.id).await.unwrap();

        // Most of the received units already left the shelf
        sqlx::query("UPDATE products SET stock = 3 WHERE id = ?1")
            .bind(&fx.product.id)
            .execute(fx.db.pool())
            .await
            .unwrap();

        let err = repo
            .cancel(&purchase.id, &fx.admin.id, Some("Proveedor solicita devolución"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DbError::InsufficientStock { available: 3, requested: 10, .. }),
            "{err:?}"
        );

        // The whole cancellation rolled back
        let fetched = repo.get(&purchase.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PurchaseStatus::Recibido);
        assert_eq!(stock_of(&fx).await, 3);
    }

    #[tokio::test]
    async fn test_cancel_role_and_justification_gates() {
        let fx = fixture().await;
        let repo = fx.db.purchases();
        let purchase = repo.register(&purchase_of(&fx, 10)).await.unwrap();

        assert!(matches!(
            repo.cancel(&purchase.id, &fx.clerk.id, Some("Pedido duplicado por error"))
                .await
                .unwrap_err(),
            DbError::Unauthorized { .. }
        ));

        assert!(matches!(
            repo.cancel(&purchase.id, &fx.admin.id, Some("corto")).await.unwrap_err(),
            DbError::Domain(_)
        ));
    }
}
