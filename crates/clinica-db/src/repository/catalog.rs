//! # Catalog Repository
//!
//! Users, patients, services and products: the reference data the
//! transactional procedures validate against and snapshot from. CRUD
//! screens live elsewhere; this exposes only what the procedures, the
//! seed binary and the tests exercise.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use clinica_core::{MovementKind, Patient, Product, Role, Service, User};

/// Repository for reference data.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Inserts a staff user.
    pub async fn insert_user(&self, name: &str, role: Role) -> DbResult<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %user.id, name = %user.name, "Inserting user");

        sqlx::query(
            "INSERT INTO users (id, name, role, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, role, is_active, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // -------------------------------------------------------------------------
    // Patients
    // -------------------------------------------------------------------------

    /// Inserts a patient.
    pub async fn insert_patient(&self, name: &str, document_id: Option<&str>) -> DbResult<Patient> {
        let patient = Patient {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            document_id: document_id.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO patients (id, name, document_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&patient.id)
        .bind(&patient.name)
        .bind(&patient.document_id)
        .bind(patient.created_at)
        .execute(&self.pool)
        .await?;

        Ok(patient)
    }

    /// Gets a patient by ID.
    pub async fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        let patient = sqlx::query_as::<_, Patient>(
            "SELECT id, name, document_id, created_at FROM patients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(patient)
    }

    // -------------------------------------------------------------------------
    // Services
    // -------------------------------------------------------------------------

    /// Inserts a billable service.
    pub async fn insert_service(&self, name: &str, price_cents: i64) -> DbResult<Service> {
        let service = Service {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            price_cents,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO services (id, name, price_cents, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(service.price_cents)
        .bind(service.is_active)
        .bind(service.created_at)
        .execute(&self.pool)
        .await?;

        Ok(service)
    }

    /// Gets a service by ID.
    pub async fn get_service(&self, id: &str) -> DbResult<Option<Service>> {
        let service = sqlx::query_as::<_, Service>(
            "SELECT id, name, price_cents, is_active, created_at FROM services WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    /// Lists active services for the billing form.
    pub async fn list_active_services(&self) -> DbResult<Vec<Service>> {
        let services = sqlx::query_as::<_, Service>(
            "SELECT id, name, price_cents, is_active, created_at FROM services WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Inserts a product with an opening stock level.
    pub async fn insert_product(
        &self,
        sku: &str,
        name: &str,
        price_cents: i64,
        stock: i64,
    ) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: name.to_string(),
            price_cents,
            stock,
            returns_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, price_cents, stock, returns_stock, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.returns_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, price_cents, stock, returns_stock, is_active, created_at, updated_at
            FROM products WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }
}

// =============================================================================
// Shared helpers for the transactional procedures
// =============================================================================

/// Fetches the role of an active user. Used by privileged procedures to
/// re-check authorization inside the transaction instead of trusting
/// the caller's claimed role.
pub(crate) async fn user_role<'e, E>(executor: E, user_id: &str) -> DbResult<Option<Role>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let role = sqlx::query_scalar::<_, Role>(
        "SELECT role FROM users WHERE id = ?1 AND is_active = 1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(role)
}

/// Increments sellable stock inside the caller's transaction.
pub(crate) async fn add_stock(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let updated = sqlx::query(
        "UPDATE products SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(crate::error::DbError::not_found("Producto", product_id));
    }
    Ok(())
}

/// Decrements sellable stock, failing the caller's whole transaction if
/// the stock would go negative.
pub(crate) async fn remove_stock(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let updated = sqlx::query(
        "UPDATE products SET stock = stock - ?2, updated_at = ?3 WHERE id = ?1 AND stock >= ?2",
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        let product: Option<(String, i64)> =
            sqlx::query_as("SELECT name, stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut **tx)
                .await?;
        return match product {
            None => Err(crate::error::DbError::not_found("Producto", product_id)),
            Some((name, available)) => Err(crate::error::DbError::InsufficientStock {
                product: name,
                available,
                requested: quantity,
            }),
        };
    }
    Ok(())
}

/// Increments the separate returns-stock bucket. Never touches sellable
/// stock.
pub(crate) async fn add_returns_stock(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let updated = sqlx::query(
        "UPDATE products SET returns_stock = returns_stock + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(crate::error::DbError::not_found("Producto", product_id));
    }
    Ok(())
}

/// Appends a stock movement record in the caller's transaction.
pub(crate) async fn insert_movement(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    product_id: &str,
    kind: MovementKind,
    quantity: i64,
    reference_id: &str,
    created_by: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, product_id, kind, quantity, reference_id, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(kind)
    .bind(quantity)
    .bind(reference_id)
    .bind(created_by)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use clinica_core::Role;

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let user = catalog.insert_user("Dra. Flores", Role::Medico).await.unwrap();
        let fetched = catalog.get_user(&user.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Dra. Flores");
        assert_eq!(fetched.role, Role::Medico);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        catalog.insert_product("GAS-01", "Gasa estéril", 500, 10).await.unwrap();
        let err = catalog
            .insert_product("GAS-01", "Gasa estéril grande", 700, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, crate::DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_user_role_helper() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let user = catalog.insert_user("Rosa", Role::Secretaria).await.unwrap();
        let role = super::user_role(db.pool(), &user.id).await.unwrap();
        assert_eq!(role, Some(Role::Secretaria));

        let missing = super::user_role(db.pool(), "nope").await.unwrap();
        assert_eq!(missing, None);
    }
}
