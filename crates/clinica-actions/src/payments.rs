//! # Payment Actions

use serde::{Deserialize, Serialize};
use tracing::debug;

use clinica_core::validation::validate_payment;
use clinica_core::{NewPayment, NewPaymentItem, NewPaymentMethod, Role};

use crate::{ActionResult, Actions, AuthContext, View};

/// Input for creating a payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentInput {
    pub patient_id: String,
    pub items: Vec<NewPaymentItem>,
    pub methods: Vec<NewPaymentMethod>,
    pub discount_cents: i64,
    pub discount_reason: Option<String>,
}

/// What the frontend needs after a successful payment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedResponse {
    pub payment_id: String,
    pub invoice_number: i64,
    pub total_cents: i64,
}

impl Actions {
    /// Creates a payment. The balance invariant, receipt rule and
    /// discount justification are validated here, before any storage
    /// call; the transactional procedure owns numbering and atomicity.
    pub async fn create_payment(
        &self,
        ctx: &AuthContext,
        input: CreatePaymentInput,
    ) -> ActionResult<PaymentCreatedResponse> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "registrar pagos")?;

        let new = NewPayment {
            patient_id: input.patient_id,
            items: input.items,
            methods: input.methods,
            discount_cents: input.discount_cents,
            discount_reason: input.discount_reason,
            created_by: ctx.user_id.clone(),
        };
        validate_payment(&new)?;

        debug!(patient_id = %new.patient_id, total = new.total().cents(), "create_payment");

        let payment = self.db().payments().create(&new).await?;

        self.revalidate(&[View::Payments, View::Reports]);
        Ok(PaymentCreatedResponse {
            payment_id: payment.id,
            invoice_number: payment.invoice_number,
            total_cents: payment.total_cents,
        })
    }

    /// Voids a payment. Admin or medico; justification of at least 10
    /// characters. The role is re-checked inside the transactional
    /// procedure against the users table.
    pub async fn void_payment(
        &self,
        ctx: &AuthContext,
        payment_id: &str,
        justification: Option<&str>,
    ) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin, Role::Medico], "anular pagos")?;

        self.db()
            .payments()
            .void(payment_id, &ctx.user_id, justification)
            .await?;

        self.revalidate(&[View::Payments, View::Reports]);
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
    use clinica_core::PaymentMethodKind;

    fn payment_input(fx: &crate::testsupport::Fixture, amount_cents: i64) -> CreatePaymentInput {
        CreatePaymentInput {
            patient_id: fx.patient.id.clone(),
            items: vec![NewPaymentItem {
                service_id: fx.service.id.clone(),
                appointment_service_id: None,
                description: "Consulta general".to_string(),
                unit_price_cents: amount_cents,
                quantity: 1,
            }],
            methods: vec![NewPaymentMethod {
                method: PaymentMethodKind::Efectivo,
                amount_cents,
                receipt_path: None,
            }],
            discount_cents: 0,
            discount_reason: None,
        }
    }

    #[tokio::test]
    async fn test_create_payment_returns_invoice_number() {
        let fx = fixture().await;

        let response = fx
            .actions
            .create_payment(&fx.as_clerk(), payment_input(&fx, 5000))
            .await
            .unwrap();

        assert_eq!(response.invoice_number, 1);
        assert_eq!(response.total_cents, 5000);
        assert!(fx.revalidator.recorded().contains(&View::Payments));
        assert!(fx.revalidator.recorded().contains(&View::Reports));
    }

    /// Balance violations are rejected before any storage call - no
    /// payment row, no consumed invoice number.
    #[tokio::test]
    async fn test_unbalanced_payment_never_reaches_storage() {
        let fx = fixture().await;

        let mut input = payment_input(&fx, 5000);
        input.methods[0].amount_cents = 4000;

        let err = fx
            .actions
            .create_payment(&fx.as_clerk(), input)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.field.as_deref(), Some("metodos"));

        // The next payment still gets invoice number 1
        let response = fx
            .actions
            .create_payment(&fx.as_clerk(), payment_input(&fx, 5000))
            .await
            .unwrap();
        assert_eq!(response.invoice_number, 1);
    }

    #[tokio::test]
    async fn test_electronic_method_requires_receipt() {
        let fx = fixture().await;

        let mut input = payment_input(&fx, 5000);
        input.methods[0].method = PaymentMethodKind::Tarjeta;

        let err = fx
            .actions
            .create_payment(&fx.as_clerk(), input)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(err.message.contains("Tarjeta"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_void_role_gates() {
        let fx = fixture().await;

        let response = fx
            .actions
            .create_payment(&fx.as_clerk(), payment_input(&fx, 5000))
            .await
            .unwrap();

        // The clerk who created it cannot void it
        let err = fx
            .actions
            .void_payment(
                &fx.as_clerk(),
                &response.payment_id,
                Some("Cobro duplicado al paciente"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);

        // Short justification is field-attributed
        let err = fx
            .actions
            .void_payment(&fx.as_admin(), &response.payment_id, Some("corto"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.field.as_deref(), Some("justificacion"));

        fx.actions
            .void_payment(
                &fx.as_doctor(),
                &response.payment_id,
                Some("Cobro duplicado al paciente"),
            )
            .await
            .unwrap();

        // Voiding twice surfaces the invalid state
        let err = fx
            .actions
            .void_payment(
                &fx.as_admin(),
                &response.payment_id,
                Some("Cobro duplicado al paciente"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);
    }
}
