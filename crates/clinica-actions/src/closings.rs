//! # Cash Closing Actions

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use clinica_core::{CashClosing, ClosingModule, DailySummary, NewClosing, Role, VariancePolicy};

use crate::{ActionResult, Actions, AuthContext, View};

/// Input for creating a cash closing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClosingInput {
    pub module: ClosingModule,
    pub closing_date: NaiveDate,
    pub counted_cash_cents: i64,
    pub difference_reason: Option<String>,
    pub evidence_path: Option<String>,
}

/// The closing form payload: expected totals plus the variance policy
/// the frontend must present.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummaryResponse {
    pub summary: DailySummary,
    pub policy: VariancePolicy,
    pub hard_stop: bool,
}

impl Actions {
    /// Computes the day's expected totals for the closing form.
    pub async fn daily_cash_summary(
        &self,
        ctx: &AuthContext,
        module: ClosingModule,
        date: NaiveDate,
    ) -> ActionResult<DailySummaryResponse> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "consultar el resumen de caja")?;

        let summary = self.db().closings().daily_summary(module, date).await?;
        let policy = module.variance_policy();

        Ok(DailySummaryResponse {
            summary,
            policy,
            hard_stop: policy.is_hard_stop(),
        })
    }

    /// Creates the closing for a date. The variance gate and the
    /// one-per-date rule run inside the transactional procedure against
    /// a recomputed summary.
    pub async fn create_cash_closing(
        &self,
        ctx: &AuthContext,
        input: CreateClosingInput,
    ) -> ActionResult<CashClosing> {
        ctx.require_role(&[Role::Admin, Role::Secretaria], "cerrar caja")?;

        if input.counted_cash_cents < 0 {
            return Err(crate::ActionError::validation(
                "efectivo_contado",
                "El efectivo contado no puede ser negativo",
            ));
        }

        debug!(module = ?input.module, date = %input.closing_date, "create_cash_closing");

        let closing = self
            .db()
            .closings()
            .create(&NewClosing {
                module: input.module,
                closing_date: input.closing_date,
                counted_cash_cents: input.counted_cash_cents,
                difference_reason: input.difference_reason,
                evidence_path: input.evidence_path,
                created_by: ctx.user_id.clone(),
            })
            .await?;

        self.revalidate(&[View::Closings, View::Reports]);
        Ok(closing)
    }

    /// Reopens a closing for audit/correction. Admin only; the row is
    /// kept and a new closing for the date becomes possible.
    pub async fn reopen_cash_closing(
        &self,
        ctx: &AuthContext,
        closing_id: &str,
        justification: Option<&str>,
    ) -> ActionResult<()> {
        ctx.require_role(&[Role::Admin], "reabrir cierres de caja")?;

        self.db()
            .closings()
            .reopen(closing_id, &ctx.user_id, justification)
            .await?;

        self.revalidate(&[View::Closings, View::Reports]);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
