//! # Return Repository
//!
//! Product return requests. Approval moves the quantity into the
//! separate returns-stock bucket, never back into sellable stock;
//! rejection has no stock effect. Both enforce segregation of duties:
//! the approver must not be the requester.

use chrono::Utc;
use sqlx::{Connection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::BEGIN_IMMEDIATE;
use crate::repository::catalog::{add_returns_stock, insert_movement, user_role};
use clinica_core::{MovementKind, NewReturn, PurchaseReturn, ReturnStatus, Role};

const RETURN_COLUMNS: &str = "id, product_id, quantity, reason, status, requested_by, \
                              resolved_by, resolved_at, resolution_notes, created_at";

/// Repository for return operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Files a return request in `pendiente`. No stock effect.
    pub async fn request(&self, new: &NewReturn) -> DbResult<PurchaseReturn> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let product: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
            .bind(&new.product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if product.is_none() {
            return Err(DbError::not_found("Producto", &new.product_id));
        }

        let ret = PurchaseReturn {
            id: Uuid::new_v4().to_string(),
            product_id: new.product_id.clone(),
            quantity: new.quantity,
            reason: new.reason.clone(),
            status: ReturnStatus::Pendiente,
            requested_by: new.requested_by.clone(),
            resolved_by: None,
            resolved_at: None,
            resolution_notes: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO returns (id, product_id, quantity, reason, status, requested_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&ret.id)
        .bind(&ret.product_id)
        .bind(ret.quantity)
        .bind(&ret.reason)
        .bind(ret.status)
        .bind(&ret.requested_by)
        .bind(ret.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %ret.id, product_id = %ret.product_id, "Return requested");
        Ok(ret)
    }

    /// Approves a return: atomically increments the returns-stock
    /// bucket and appends a movement.
    pub async fn approve(&self, id: &str, by_user: &str, notes: Option<&str>) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        let ret = self.gate_resolution(&mut tx, id, by_user, "aprobar devolución").await?;

        add_returns_stock(&mut tx, &ret.product_id, ret.quantity).await?;
        insert_movement(
            &mut tx,
            &ret.product_id,
            MovementKind::EntradaDevolucion,
            ret.quantity,
            id,
            by_user,
        )
        .await?;

        resolve(&mut tx, id, ReturnStatus::Aprobada, by_user, notes).await?;
        tx.commit().await?;

        info!(id = %id, by = %by_user, "Return approved");
        Ok(())
    }

    /// Rejects a return. No stock effect.
    pub async fn reject(&self, id: &str, by_user: &str, notes: Option<&str>) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        self.gate_resolution(&mut tx, id, by_user, "rechazar devolución").await?;

        resolve(&mut tx, id, ReturnStatus::Rechazada, by_user, notes).await?;
        tx.commit().await?;

        info!(id = %id, by = %by_user, "Return rejected");
        Ok(())
    }

    /// Shared gates for approve/reject: the return exists and is
    /// pending, the resolver holds an elevated role, and the resolver
    /// is not the requester.
    async fn gate_resolution(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: &str,
        by_user: &str,
        action: &'static str,
    ) -> DbResult<PurchaseReturn> {
        match user_role(&mut **tx, by_user).await? {
            Some(Role::Admin) | Some(Role::Medico) => {}
            _ => {
                return Err(DbError::Unauthorized {
                    user_id: by_user.to_string(),
                    action,
                });
            }
        }

        let ret = sqlx::query_as::<_, PurchaseReturn>(&format!(
            "SELECT {RETURN_COLUMNS} FROM returns WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| DbError::not_found("Devolución", id))?;

        if ret.status != ReturnStatus::Pendiente {
            return Err(DbError::InvalidState {
                entity: "Devolución",
                id: id.to_string(),
                status: ret.status.label(),
            });
        }

        // Segregation of duties
        if ret.requested_by == by_user {
            return Err(DbError::Unauthorized {
                user_id: by_user.to_string(),
                action,
            });
        }

        Ok(ret)
    }

    /// Gets a return by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<PurchaseReturn>> {
        let ret = sqlx::query_as::<_, PurchaseReturn>(&format!(
            "SELECT {RETURN_COLUMNS} FROM returns WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ret)
    }

    /// Pending returns, oldest first.
    pub async fn list_pending(&self) -> DbResult<Vec<PurchaseReturn>> {
        let returns = sqlx::query_as::<_, PurchaseReturn>(&format!(
            "SELECT {RETURN_COLUMNS} FROM returns WHERE status = 'pendiente' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(returns)
    }
}

async fn resolve(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
    status: ReturnStatus,
    by_user: &str,
    notes: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE returns SET status = ?2, resolved_by = ?3, resolved_at = ?4, resolution_notes = ?5 \
         WHERE id = ?1",
    )
    .bind(id)
    .bind(status)
    .bind(by_user)
    .bind(Utc::now())
    .bind(notes)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::testutil::{fixture, Fixture};
    use clinica_core::{NewReturn, ReturnStatus};

    fn return_of(fx: &Fixture, quantity: i64) -> NewReturn {
        NewReturn {
            product_id: fx.product.id.clone(),
            quantity,
            reason: "Empaque dañado en góndola".to_string(),
            requested_by: fx.clerk.id.clone(),
        }
    }

    async fn buckets_of(fx: &Fixture) -> (i64, i64) {
        let product = fx
            .db
            .catalog()
            .get_product(&fx.product.id)
            .await
            .unwrap()
            .unwrap();
        (product.stock, product.returns_stock)
    }

    /// Approval feeds the separate returns bucket, never sellable stock.
    #[tokio::test]
    async fn test_approve_increments_returns_bucket_only() {
        let fx = fixture().await;
        let repo = fx.db.returns();

        let ret = repo.request(&return_of(&fx, 3)).await.unwrap();
        assert_eq!(buckets_of(&fx).await, (100, 0));

        repo.approve(&ret.id, &fx.admin.id, Some("Verificado en mostrador")).await.unwrap();

        assert_eq!(buckets_of(&fx).await, (100, 3));
        let resolved = repo.get(&ret.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ReturnStatus::Aprobada);
        assert_eq!(resolved.resolved_by.as_deref(), Some(fx.admin.id.as_str()));
    }

    #[tokio::test]
    async fn test_reject_has_no_stock_effect() {
        let fx = fixture().await;
        let repo = fx.db.returns();

        let ret = repo.request(&return_of(&fx, 3)).await.unwrap();
        repo.reject(&ret.id, &fx.doctor.id, Some("Sin comprobante")).await.unwrap();

        assert_eq!(buckets_of(&fx).await, (100, 0));
        let resolved = repo.get(&ret.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ReturnStatus::Rechazada);

        // Already resolved
        assert!(matches!(
            repo.approve(&ret.id, &fx.admin.id, None).await.unwrap_err(),
            DbError::InvalidState { .. }
        ));
    }

    /// Segregation of duties: the requester can never resolve their own
    /// request, whatever their role.
    #[tokio::test]
    async fn test_requester_cannot_resolve_own_request() {
        let fx = fixture().await;
        let repo = fx.db.returns();

        let mut new = return_of(&fx, 2);
        new.requested_by = fx.admin.id.clone();
        let ret = repo.request(&new).await.unwrap();

        assert!(matches!(
            repo.approve(&ret.id, &fx.admin.id, None).await.unwrap_err(),
            DbError::Unauthorized { .. }
        ));

        // A different elevated user may
        repo.approve(&ret.id, &fx.doctor.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_resolution_requires_elevated_role() {
        let fx = fixture().await;
        let repo = fx.db.returns();
        let ret = repo.request(&return_of(&fx, 2)).await.unwrap();

        assert!(matches!(
            repo.reject(&ret.id, &fx.nurse.id, None).await.unwrap_err(),
            DbError::Unauthorized { .. }
        ));
    }
}
