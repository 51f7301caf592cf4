//! # Sale Repository
//!
//! Counter sales of inventory products. The sale insert, the per-item
//! guarded stock decrements and the movement log are one transaction:
//! a sale either fully happens or leaves no trace.

use chrono::{NaiveDate, Utc};
use sqlx::{Connection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::counter::{next_number, SCOPE_SALE};
use crate::error::{DbError, DbResult};
use crate::pool::BEGIN_IMMEDIATE;
use crate::repository::catalog::{insert_movement, remove_stock};
use clinica_core::{MovementKind, NewSale, Sale, SaleItem};

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Creates a sale atomically: gapless sale number, snapshot line
    /// items, guarded stock decrements and one movement per item.
    pub async fn create(&self, new: &NewSale) -> DbResult<Sale> {
        match self.try_create(new).await {
            Err(DbError::Busy) => {
                warn!("sale numbering contention, retrying once");
                self.try_create(new).await
            }
            other => other,
        }
    }

    async fn try_create(&self, new: &NewSale) -> DbResult<Sale> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin_with(BEGIN_IMMEDIATE).await?;

        // Snapshot names/prices and decrement stock, item by item. Any
        // shortage rolls the whole sale back.
        let mut lines: Vec<SaleItem> = Vec::with_capacity(new.items.len());
        for item in &new.items {
            let product: Option<(String, i64)> =
                sqlx::query_as("SELECT name, price_cents FROM products WHERE id = ?1 AND is_active = 1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let (name, price_cents) =
                product.ok_or_else(|| DbError::not_found("Producto", &item.product_id))?;

            remove_stock(&mut tx, &item.product_id, item.quantity).await?;

            lines.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: String::new(), // filled below
                product_id: item.product_id.clone(),
                name_snapshot: name,
                unit_price_cents: price_cents,
                quantity: item.quantity,
                line_total_cents: price_cents * item.quantity,
            });
        }

        let sale_number = next_number(&mut tx, SCOPE_SALE).await?;
        let total_cents: i64 = lines.iter().map(|l| l.line_total_cents).sum();

        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            sale_number,
            total_cents,
            method: new.method,
            receipt_path: new.receipt_path.clone(),
            created_by: new.created_by.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO sales (id, sale_number, total_cents, method, receipt_path, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&sale.id)
        .bind(sale.sale_number)
        .bind(sale.total_cents)
        .bind(sale.method)
        .bind(&sale.receipt_path)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &mut lines {
            line.sale_id = sale.id.clone();
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, name_snapshot, unit_price_cents, quantity, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&line.id)
            .bind(&line.sale_id)
            .bind(&line.product_id)
            .bind(&line.name_snapshot)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;

            insert_movement(
                &mut tx,
                &line.product_id,
                MovementKind::SalidaVenta,
                -line.quantity,
                &sale.id,
                &new.created_by,
            )
            .await?;
        }

        tx.commit().await?;

        info!(id = %sale.id, sale_number = sale.sale_number, total = sale.total_cents, "Sale created");
        Ok(sale)
    }

    /// Gets a sale by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            "SELECT id, sale_number, total_cents, method, receipt_path, created_by, created_at \
             FROM sales WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Items of a sale.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT id, sale_id, product_id, name_snapshot, unit_price_cents, quantity, line_total_cents \
             FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Sales of a calendar day, number order.
    pub async fn list_on(&self, date: NaiveDate) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            "SELECT id, sale_number, total_cents, method, receipt_path, created_by, created_at \
             FROM sales WHERE date(created_at) = ?1 ORDER BY sale_number",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::repository::testutil::{fixture, Fixture};
    use clinica_core::{NewSale, NewSaleItem, PaymentMethodKind};

    fn sale_of(fx: &Fixture, quantity: i64) -> NewSale {
        NewSale {
            items: vec![NewSaleItem {
                product_id: fx.product.id.clone(),
                quantity,
            }],
            method: PaymentMethodKind::Efectivo,
            receipt_path: None,
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
    async fn test_sale_decrements_stock_and_snapshots() {
        let fx = fixture().await;
        let repo = fx.db.sales();

        let sale = repo.create(&sale_of(&fx, 4)).await.unwrap();
        assert_eq!(sale.sale_number, 1);
        assert_eq!(sale.total_cents, 600);
        assert_eq!(stock_of(&fx).await, 96);

        let items = repo.items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name_snapshot, "Paracetamol 500mg");
        assert_eq!(items[0].unit_price_cents, 150);

        let movement: i64 = sqlx::query_scalar(
            "SELECT quantity FROM stock_movements WHERE reference_id = ?1 AND kind = 'salida_venta'",
        )
        .bind(&sale.id)
        .fetch_one(fx.db.pool())
        .await
        .unwrap();
        assert_eq!(movement, -4);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_whole_sale() {
        let fx = fixture().await;
        let repo = fx.db.sales();
        let other = fx
            .db
            .catalog()
            .insert_product("IBU-400", "Ibuprofeno 400mg", 200, 2)
            .await
            .unwrap();

        let new = NewSale {
            items: vec![
                NewSaleItem {
                    product_id: fx.product.id.clone(),
                    quantity: 10,
                },
                NewSaleItem {
                    product_id: other.id.clone(),
                    quantity: 5, // only 2 on the shelf
                },
            ],
            method: PaymentMethodKind::Efectivo,
            receipt_path: None,
            created_by: fx.clerk.id.clone(),
        };

        let err = repo.create(&new).await.unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { available: 2, .. }), "{err:?}");

        // First item's decrement rolled back with everything else
        assert_eq!(stock_of(&fx).await, 100);
        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(fx.db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);

        // And the failed attempt consumed no sale number
        let next = repo.create(&sale_of(&fx, 1)).await.unwrap();
        assert_eq!(next.sale_number, 1);
    }
}
