// [apps/orchestrator/src/services/subscriptions.rs]
/*!
 * =================================================================
 * APARATO: SUBSCRIPTION QUERY SERVICE (V4.0)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: RESOLUCIÓN DE SOLO LECTURA PLAN/SUSCRIPCIÓN
 *
 * Tolerante por contrato: espejo vacío o usuario sin customer
 * retornan vacío/None, nunca error.
 * =================================================================
 */

use crate::state::BillingSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tesoro_domain_billing::BillingConfig;
use tesoro_infra_db::repositories::{StripeMirrorRepository, SubscriptionRecord};
use tesoro_infra_db::LedgerError;
use tracing::instrument;

/// Resumen del plan resuelto contra el catálogo; None cuando el
/// price_id no tiene contraparte declarada.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub id: Option<String>,
    pub name: String,
    pub per_seat: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStateView {
    pub id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub plan: Option<PlanSummary>,
}

pub struct SubscriptionQueryService {
    mirror: Arc<StripeMirrorRepository>,
    catalog: Arc<BillingConfig>,
    settings: Arc<BillingSettings>,
}

impl SubscriptionQueryService {
    pub fn new(
        mirror: Arc<StripeMirrorRepository>,
        catalog: Arc<BillingConfig>,
        settings: Arc<BillingSettings>,
    ) -> Self {
        Self { mirror, catalog, settings }
    }

    /// ¿Tiene el usuario una suscripción activa o en prueba?
    pub async fn is_active(&self, user_id: &str) -> Result<bool, LedgerError> {
        Ok(self
            .subscriptions_for_user(user_id)
            .await?
            .iter()
            .any(SubscriptionRecord::is_active))
    }

    /**
     * Suscripción representativa del usuario: la activa con el período
     * más reciente; en su defecto, la cancelada más reciente.
     */
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: &str) -> Result<Option<SubscriptionStateView>, LedgerError> {
        let subscriptions = self.subscriptions_for_user(user_id).await?;

        // El espejo ya ordena por current_period_end descendente.
        let chosen = subscriptions
            .iter()
            .find(|subscription| subscription.is_active())
            .or_else(|| {
                subscriptions.iter().find(|subscription| subscription.status == "canceled")
            });

        Ok(chosen.map(|record| self.project(record)))
    }

    /// Todas las suscripciones del usuario, período más reciente primero.
    pub async fn list(&self, user_id: &str) -> Result<Vec<SubscriptionStateView>, LedgerError> {
        let subscriptions = self.subscriptions_for_user(user_id).await?;
        Ok(subscriptions.iter().map(|record| self.project(record)).collect())
    }

    async fn subscriptions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<SubscriptionRecord>, LedgerError> {
        let Some(customer_id) = self.mirror.customer_for_user(user_id).await? else {
            return Ok(Vec::new());
        };
        self.mirror.subscriptions_for_customer(&customer_id).await
    }

    fn project(&self, record: &SubscriptionRecord) -> SubscriptionStateView {
        let plan = record.price_id.as_deref().and_then(|price_id| {
            self.catalog
                .resolve_plan_by_price_id(price_id, self.settings.active_env)
                .map(|resolution| PlanSummary {
                    id: resolution.plan.id.clone(),
                    name: resolution.plan.name.clone(),
                    per_seat: resolution.plan.per_seat,
                })
        });

        SubscriptionStateView {
            id: record.id.clone(),
            status: record.status.clone(),
            price_id: record.price_id.clone(),
            current_period_end: record.current_period_end,
            cancel_at_period_end: record.cancel_at_period_end,
            plan,
        }
    }
}
