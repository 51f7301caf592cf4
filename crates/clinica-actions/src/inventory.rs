//! # Inventory Actions
//!
//! Purchases, counter sales and product returns.

use serde::Deserialize;
use tracing::debug;

use clinica_core::validation::{validate_quantity, validate_required_text};
use clinica_core::{
    NewPurchase, NewPurchaseItem, NewReturn, NewSale, NewSaleItem, PaymentMethodKind, Purchase,
    PurchaseReturn, Role, Sale, ValidationError,
};

use crate::{ActionResult, Actions, AuthContext, View};

/// Input for registering a purchase.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPurchaseInput {
    pub supplier: String,
    pub items: Vec<NewPurchaseItem>,
}

/// Input for a counter sale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleInput {
    pub items: Vec<NewSaleItem>,
    pub method: PaymentMethodKind,
    pub receipt_path: Option<String>,
}

/// Input for a product return request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReturnInput {
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
}

impl Actions {
    /// Registers a purchase in pending-reception state.
    pub async fn register_purchase(
        &self,
        ctx: &AuthContext,
        input: RegisterPurchaseInput,
    ) -> ActionResult<Purchase> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "registrar compras")?;

        let supplier = validate_required_text("proveedor", &input.supplier, 200)
            .map_err(clinica_core::CoreError::from)?;
        if input.items.is_empty() {
            return Err(clinica_core::CoreError::from(ValidationError::Required {
                field: "items".to_string(),
            })
            .into());
        }
        for item in &input.items {
            validate_quantity("items", item.quantity).map_err(clinica_core::CoreError::from)?;
            if item.unit_cost_cents < 0 {
                return Err(clinica_core::CoreError::from(ValidationError::MustBePositive {
                    field: "items".to_string(),
                })
                .into());
            }
        }

        debug!(supplier = %supplier, items = input.items.len(), "register_purchase");

        let purchase = self
            .db()
            .purchases()
            .register(&NewPurchase {
                supplier,
                items: input.items,
                created_by: ctx.user_id.clone(),
            })
            .await?;

        self.revalidate(&[View::Inventory]);
        Ok(purchase)
    }

    /// Confirms goods reception: stock increments and movement log in
    /// one transaction.
    pub async fn confirm_purchase_reception(
        &self,
        ctx: &AuthContext,
        purchase_id: &str,
    ) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "recepcionar compras")?;

        self.db()
            .purchases()
            .confirm_reception(purchase_id, &ctx.user_id)
            .await?;

        self.revalidate(&[View::Inventory]);
        Ok(())
    }

    /// Cancels a purchase, reversing its stock increments if it had
    /// been received. Admin or medico; justification mandatory.
    pub async fn cancel_purchase(
        &self,
        ctx: &AuthContext,
        purchase_id: &str,
        justification: Option<&str>,
    ) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin, Role::Medico], "anular compras")?;

        self.db()
            .purchases()
            .cancel(purchase_id, &ctx.user_id, justification)
            .await?;

        self.revalidate(&[View::Inventory]);
        Ok(())
    }

    /// Creates a counter sale, decrementing stock atomically.
    pub async fn create_sale(&self, ctx: &AuthContext, input: CreateSaleInput) -> ActionResult<Sale> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "registrar ventas")?;

        if input.items.is_empty() {
            return Err(clinica_core::CoreError::from(ValidationError::Required {
                field: "items".to_string(),
            })
            .into());
        }
        for item in &input.items {
            validate_quantity("items", item.quantity).map_err(clinica_core::CoreError::from)?;
        }
        if input.method.is_electronic()
            && input.receipt_path.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(clinica_core::CoreError::from(ValidationError::ReceiptRequired {
                field: "metodo".to_string(),
                method: input.method.label().to_string(),
            })
            .into());
        }

        let sale = self
            .db()
            .sales()
            .create(&NewSale {
                items: input.items,
                method: input.method,
                receipt_path: input.receipt_path,
                created_by: ctx.user_id.clone(),
            })
            .await?;

        self.revalidate(&[View::Inventory, View::Reports]);
        Ok(sale)
    }

    /// Files a product return request.
    pub async fn request_return(
        &self,
        ctx: &AuthContext,
        input: RequestReturnInput,
    ) -> ActionResult<PurchaseReturn> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "solicitar devoluciones")?;

        validate_quantity("cantidad", input.quantity).map_err(clinica_core::CoreError::from)?;
        let reason = validate_required_text("motivo", &input.reason, 500)
            .map_err(clinica_core::CoreError::from)?;

        let ret = self
            .db()
            .returns()
            .request(&NewReturn {
                product_id: input.product_id,
                quantity: input.quantity,
                reason,
                requested_by: ctx.user_id.clone(),
            })
            .await?;

        self.revalidate(&[View::Inventory]);
        Ok(ret)
    }

    /// Approves a return into the separate returns-stock bucket. The
    /// procedure enforces that the approver is not the requester.
    pub async fn approve_return(
        &self,
        ctx: &AuthContext,
        return_id: &str,
        notes: Option<&str>,
    ) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin, Role::Medico], "aprobar devoluciones")?;

        self.db().returns().approve(return_id, &ctx.user_id, notes).await?;

        self.revalidate(&[View::Inventory]);
        Ok(())
    }

    /// Rejects a return. No stock effect.
    pub async fn reject_return(
        &self,
        ctx: &AuthContext,
        return_id: &str,
        notes: Option<&str>,
    ) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin, Role::Medico], "rechazar devoluciones")?;

        self.db().returns().reject(return_id, &ctx.user_id, notes).await?;

        self.revalidate(&[View::Inventory]);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::fixture;
    use crate::ErrorCode;

    #[tokio::test]
    async fn test_purchase_flow_via_actions() {
        let fx = fixture().await;
        let clerk = fx.as_clerk();

        let purchase = fx
            .actions
            .register_purchase(
                &clerk,
                RegisterPurchaseInput {
                    supplier: "Droguería Central".to_string(),
                    items: vec![NewPurchaseItem {
                        product_id: fx.product.id.clone(),
                        quantity: 10,
                        unit_cost_cents: 90,
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(purchase.purchase_number, 1);

        fx.actions
            .confirm_purchase_reception(&clerk, &purchase.id)
            .await
            .unwrap();

        // Clerk cannot cancel; doctor can, with justification
        let err = fx
            .actions
            .cancel_purchase(&clerk, &purchase.id, Some("Lote vencido devuelto"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        fx.actions
            .cancel_purchase(&fx.as_doctor(), &purchase.id, Some("Lote vencido devuelto"))
            .await
            .unwrap();

        let product = fx
            .actions
            .db()
            .catalog()
            .get_product(&fx.product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, 100); // increment fully reversed
    }

    #[tokio::test]
    async fn test_electronic_sale_requires_receipt() {
        let fx = fixture().await;

        let err = fx
            .actions
            .create_sale(
                &fx.as_clerk(),
                CreateSaleInput {
                    items: vec![NewSaleItem {
                        product_id: fx.product.id.clone(),
                        quantity: 1,
                    }],
                    method: PaymentMethodKind::Transferencia,
                    receipt_path: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        fx.actions
            .create_sale(
                &fx.as_clerk(),
                CreateSaleInput {
                    items: vec![NewSaleItem {
                        product_id: fx.product.id.clone(),
                        quantity: 1,
                    }],
                    method: PaymentMethodKind::Transferencia,
                    receipt_path: Some("receipts/op-559912.jpg".to_string()),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_return_segregation_of_duties_end_to_end() {
        let fx = fixture().await;

        // The admin files the request, so the admin cannot resolve it
        let ret = fx
            .actions
            .request_return(
                &fx.as_admin(),
                RequestReturnInput {
                    product_id: fx.product.id.clone(),
                    quantity: 2,
                    reason: "Empaque dañado en góndola".to_string(),
                },
            )
            .await
            .unwrap();

        let err = fx
            .actions
            .approve_return(&fx.as_admin(), &ret.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        fx.actions
            .approve_return(&fx.as_doctor(), &ret.id, Some("Verificado"))
            .await
            .unwrap();

        let product = fx
            .actions
            .db()
            .catalog()
            .get_product(&fx.product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.returns_stock, 2);
        assert_eq!(product.stock, 100);
    }
}
