// [apps/orchestrator/src/services/lifecycle.rs]
/*!
 * =================================================================
 * APARATO: SUBSCRIPTION LIFECYCLE APPLIER (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: EVENTOS DE SUSCRIPCIÓN -> MUTACIONES DEL LEDGER
 *
 * Política de tolerancia: customer desconocido, plan sin catálogo o
 * feature ausente son no-ops silenciosos, porque los webhooks pueden
 * llegar para objetos ajenos o reordenados. Las colisiones de
 * idempotencia en replays son éxito-de-la-operación-lógica.
 * =================================================================
 */

use crate::state::BillingSettings;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tesoro_domain_billing::{
    allocation_for_interval, BillingConfig, BillingInterval, GrantTarget, OnRenewal, Plan,
};
use tesoro_domain_ledger::{
    sources, CreditEvent, CreditEventSink, DeltaMetadata, ResetDescriptions,
};
use tesoro_infra_db::repositories::{
    CreditLedgerRepository, SeatRepository, StripeMirrorRepository, SubscriptionRecord,
};
use tesoro_infra_db::LedgerError;
use tesoro_infra_stripe::Subscription;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum LifecycleError {
    /// El evento ya fue aplicado; la capa de webhooks responde 200.
    #[error("ALREADY_PROCESSED -> {0}")]
    AlreadyProcessed(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Resultado observable de aplicar un evento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// El evento mutó el ledger.
    Applied,
    /// Evento ajeno, plan sin catálogo o política manual: no-op.
    Skipped,
    /// Replay detectado por idempotencia: la primera aplicación manda.
    Duplicate,
}

/// Proyección mínima de una suscripción, común al objeto de webhook
/// y a la fila del espejo replicado.
#[derive(Debug, Clone)]
pub struct SubscriptionView {
    pub id: String,
    pub customer_id: String,
    pub price_id: Option<String>,
    pub interval: BillingInterval,
    pub metadata: HashMap<String, String>,
}

impl SubscriptionView {
    pub fn from_wire(subscription: &Subscription) -> Self {
        Self {
            id: subscription.id.clone(),
            customer_id: subscription.customer.clone(),
            price_id: subscription.price_id().map(str::to_string),
            interval: BillingInterval::parse(subscription.interval()),
            metadata: subscription.metadata.clone(),
        }
    }

    pub fn from_mirror(record: &SubscriptionRecord) -> Self {
        let metadata = record
            .metadata
            .as_object()
            .map(|object| {
                object
                    .iter()
                    .filter_map(|(key, value)| {
                        value.as_str().map(|text| (key.clone(), text.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: record.id.clone(),
            customer_id: record.customer_id.clone(),
            price_id: record.price_id.clone(),
            interval: BillingInterval::parse(&record.interval),
            metadata,
        }
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

pub struct LifecycleApplier {
    credits: Arc<CreditLedgerRepository>,
    mirror: Arc<StripeMirrorRepository>,
    seat_rows: Arc<SeatRepository>,
    catalog: Arc<BillingConfig>,
    settings: Arc<BillingSettings>,
    event_sink: Arc<dyn CreditEventSink>,
}

impl LifecycleApplier {
    pub fn new(
        credits: Arc<CreditLedgerRepository>,
        mirror: Arc<StripeMirrorRepository>,
        seat_rows: Arc<SeatRepository>,
        catalog: Arc<BillingConfig>,
        settings: Arc<BillingSettings>,
        event_sink: Arc<dyn CreditEventSink>,
    ) -> Self {
        Self { credits, mirror, seat_rows, catalog, settings, event_sink }
    }

    // =================================================================
    // EVENTOS
    // =================================================================

    /**
     * Alta de suscripción: otorga cada feature del plan escalado al
     * intervalo. Replays colisionan en `sub_created:{sub}:{key}` y
     * emergen como ALREADY_PROCESSED.
     */
    #[instrument(skip(self, view), fields(subscription = %view.id))]
    pub async fn on_subscription_created(
        &self,
        view: &SubscriptionView,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        if self.settings.grant_to == GrantTarget::Manual {
            return Ok(LifecycleOutcome::Skipped);
        }

        let Some(plan) = self.resolve_plan(view) else {
            return Ok(LifecycleOutcome::Skipped);
        };

        // En modo por-asiento el alta solo siembra al primer asiento
        // declarado por el checkout; el resto entra por Seats.
        let target_user = match self.settings.grant_to {
            GrantTarget::SeatUsers => view.metadata_str("first_seat_user_id").map(str::to_string),
            _ => self.mirror.user_for_customer(&view.customer_id).await?,
        };
        let Some(target_user) = target_user else {
            debug!("👻 [LIFECYCLE]: Unknown customer {}; created event ignored.", view.customer_id);
            return Ok(LifecycleOutcome::Skipped);
        };

        for (key, rule) in plan.credit_features() {
            let allocation = allocation_for_interval(rule.allocation, view.interval);
            let metadata = DeltaMetadata {
                source: Some(sources::SUBSCRIPTION.to_string()),
                source_id: Some(view.id.clone()),
                description: Some(format!("Initial allocation for plan '{}'", plan.name)),
                currency: None,
                idempotency_key: Some(format!("sub_created:{}:{}", view.id, key)),
            };

            match self.credits.grant(&target_user, key, allocation, &metadata).await {
                Ok(_) => self.notify_granted(&target_user, key, allocation, &view.id),
                Err(LedgerError::IdempotencyConflict(conflicting_key)) => {
                    return Err(LifecycleError::AlreadyProcessed(conflicting_key));
                }
                Err(ledger_fault) => return Err(ledger_fault.into()),
            }
        }

        info!("🌱 [LIFECYCLE]: Subscription {} provisioned for {}.", view.id, target_user);
        Ok(LifecycleOutcome::Applied)
    }

    /**
     * Cambio de plan inmediato. Los downgrades marcados con
     * `pending_credit_downgrade` se difieren a `on_downgrade_applied`.
     */
    #[instrument(skip(self, view), fields(subscription = %view.id))]
    pub async fn on_subscription_plan_changed(
        &self,
        view: &SubscriptionView,
        previous_price_id: Option<&str>,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        if self.settings.grant_to == GrantTarget::Manual {
            return Ok(LifecycleOutcome::Skipped);
        }

        if view.metadata_str("pending_credit_downgrade") == Some("true") {
            debug!("⏳ [LIFECYCLE]: Downgrade of {} deferred to period end.", view.id);
            return Ok(LifecycleOutcome::Skipped);
        }

        let previous_price_id = view
            .metadata_str("upgrade_from_price_id")
            .or(previous_price_id);

        if previous_price_id == view.price_id.as_deref() {
            return Ok(LifecycleOutcome::Skipped);
        }

        let Some(new_plan) = self.resolve_plan(view) else {
            return Ok(LifecycleOutcome::Skipped);
        };
        let Some(target_user) = self.mirror.user_for_customer(&view.customer_id).await? else {
            return Ok(LifecycleOutcome::Skipped);
        };

        let upgrading_from_free = match view.metadata_str("upgrade_from_price_amount") {
            Some(amount_label) => amount_label == "0",
            None => self.price_amount(previous_price_id).await? == Some(0),
        };

        if upgrading_from_free {
            // free -> paid: el remanente gratuito expira y el plan pago
            // entra completo.
            if let Some(old_plan) = self.plan_for_price(previous_price_id) {
                for key in old_plan.credit_keys() {
                    let metadata = DeltaMetadata {
                        source: Some(sources::SUBSCRIPTION.to_string()),
                        source_id: Some(view.id.clone()),
                        description: Some("Free tier balance expired on upgrade".to_string()),
                        ..Default::default()
                    };
                    let revoked = self.credits.revoke_all(&target_user, &key, &metadata).await?;
                    if revoked.amount_revoked > 0 {
                        self.notify_revoked(&target_user, &key, revoked.amount_revoked, &view.id);
                    }
                }
            }
        }

        // En ambas variantes las asignaciones del plan nuevo se suman
        // (free -> paid parte de cero tras la expiración).
        let mut duplicate_detected = false;
        for (key, rule) in new_plan.credit_features() {
            let allocation = allocation_for_interval(rule.allocation, view.interval);
            let metadata = DeltaMetadata {
                source: Some(sources::SUBSCRIPTION.to_string()),
                source_id: Some(view.id.clone()),
                description: Some(format!("Allocation for plan change to '{}'", new_plan.name)),
                currency: None,
                idempotency_key: Some(format!(
                    "plan_changed:{}:{}:{}",
                    view.id,
                    view.price_id.as_deref().unwrap_or("unknown"),
                    key
                )),
            };

            match self.credits.grant(&target_user, key, allocation, &metadata).await {
                Ok(_) => self.notify_granted(&target_user, key, allocation, &view.id),
                Err(LedgerError::IdempotencyConflict(_)) => duplicate_detected = true,
                Err(ledger_fault) => return Err(ledger_fault.into()),
            }
        }

        if duplicate_detected {
            return Ok(LifecycleOutcome::Duplicate);
        }
        info!("📈 [LIFECYCLE]: Plan change applied on {} for {}.", view.id, target_user);
        Ok(LifecycleOutcome::Applied)
    }

    /**
     * Downgrade diferido aplicado al inicio del período: las claves del
     * plan nuevo se reinician (o acumulan), las huérfanas se revocan.
     */
    #[instrument(skip(self, view), fields(subscription = %view.id))]
    pub async fn on_downgrade_applied(
        &self,
        view: &SubscriptionView,
        previous_price_id: &str,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        if self.settings.grant_to == GrantTarget::Manual {
            return Ok(LifecycleOutcome::Skipped);
        }

        let Some(new_plan) = self.resolve_plan(view) else {
            return Ok(LifecycleOutcome::Skipped);
        };
        let target_users = self.resolve_target_users(view).await?;
        if target_users.is_empty() {
            return Ok(LifecycleOutcome::Skipped);
        }

        let mut duplicate_detected = false;
        for target_user in &target_users {
            for (key, rule) in new_plan.credit_features() {
                let allocation = allocation_for_interval(rule.allocation, view.interval);
                let applied = self
                    .apply_rule(
                        target_user,
                        key,
                        rule.on_renewal,
                        allocation,
                        sources::SUBSCRIPTION,
                        &view.id,
                        &format!(
                            "downgrade:{}:{}:{}:{}",
                            view.id,
                            view.price_id.as_deref().unwrap_or("unknown"),
                            target_user,
                            key
                        ),
                        &format!("Downgrade to plan '{}'", new_plan.name),
                    )
                    .await?;
                duplicate_detected |= !applied;
            }

            // Claves del plan anterior sin contraparte en el nuevo.
            if let Some(old_plan) = self.plan_for_price(Some(previous_price_id)) {
                for key in old_plan.credit_keys() {
                    if new_plan.feature(&key).and_then(|f| f.credits.as_ref()).is_some() {
                        continue;
                    }
                    let metadata = DeltaMetadata {
                        source: Some(sources::SUBSCRIPTION.to_string()),
                        source_id: Some(view.id.clone()),
                        description: Some("Credit type removed by downgrade".to_string()),
                        ..Default::default()
                    };
                    let revoked = self.credits.revoke_all(target_user, &key, &metadata).await?;
                    if revoked.amount_revoked > 0 {
                        self.notify_revoked(target_user, &key, revoked.amount_revoked, &view.id);
                    }
                }
            }
        }

        if duplicate_detected {
            return Ok(LifecycleOutcome::Duplicate);
        }
        info!("📉 [LIFECYCLE]: Deferred downgrade applied on {}.", view.id);
        Ok(LifecycleOutcome::Applied)
    }

    /**
     * Renovación: una sola clave `renewal:{sub}:{invoice}` liga el
     * conjunto por-clave completo. El duplicado retorna éxito silencioso
     * para que el receptor de webhooks no re-encole.
     */
    #[instrument(skip(self, view), fields(subscription = %view.id, invoice = %invoice_id))]
    pub async fn on_subscription_renewed(
        &self,
        view: &SubscriptionView,
        invoice_id: &str,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        if self.settings.grant_to == GrantTarget::Manual {
            return Ok(LifecycleOutcome::Skipped);
        }

        let Some(plan) = self.resolve_plan(view) else {
            return Ok(LifecycleOutcome::Skipped);
        };
        let target_users = self.resolve_target_users(view).await?;
        if target_users.is_empty() {
            return Ok(LifecycleOutcome::Skipped);
        }

        let renewal_key = format!("renewal:{}:{}", view.id, invoice_id);
        match self.credits.claim_operation(&renewal_key, "renewal").await {
            Ok(()) => {}
            Err(LedgerError::IdempotencyConflict(_)) => {
                debug!("🔁 [LIFECYCLE]: Renewal replay on {}; first application stands.", view.id);
                return Ok(LifecycleOutcome::Duplicate);
            }
            Err(ledger_fault) => return Err(ledger_fault.into()),
        }

        for target_user in &target_users {
            for (key, rule) in plan.credit_features() {
                let allocation = allocation_for_interval(rule.allocation, view.interval);
                self.apply_rule(
                    target_user,
                    key,
                    rule.on_renewal,
                    allocation,
                    sources::RENEWAL,
                    invoice_id,
                    // La clave maestra ya fue reclamada; los asientos
                    // individuales no llevan clave propia.
                    "",
                    &format!("Renewal allocation for plan '{}'", plan.name),
                )
                .await?;
            }
        }

        info!("🔄 [LIFECYCLE]: Renewal {} applied on {} user(s).", invoice_id, target_users.len());
        Ok(LifecycleOutcome::Applied)
    }

    /**
     * Cancelación: pérdida de servicio. Revoca el saldo completo de cada
     * clave del plan, sin particionar por fuente (los top-ups caen con
     * la suscripción; decisión de producto, no un accidente).
     */
    #[instrument(skip(self, view), fields(subscription = %view.id))]
    pub async fn on_subscription_cancelled(
        &self,
        view: &SubscriptionView,
    ) -> Result<LifecycleOutcome, LifecycleError> {
        if self.settings.grant_to == GrantTarget::Manual {
            return Ok(LifecycleOutcome::Skipped);
        }

        let Some(plan) = self.resolve_plan(view) else {
            return Ok(LifecycleOutcome::Skipped);
        };
        let target_users = self.resolve_target_users(view).await?;
        if target_users.is_empty() {
            return Ok(LifecycleOutcome::Skipped);
        }

        let mut total_revoked: BTreeMap<String, i64> = BTreeMap::new();
        for target_user in &target_users {
            for key in plan.credit_keys() {
                let metadata = DeltaMetadata {
                    source: Some(sources::CANCELLATION.to_string()),
                    source_id: Some(view.id.clone()),
                    description: Some("Subscription cancelled".to_string()),
                    ..Default::default()
                };
                let revoked = self.credits.revoke_all(target_user, &key, &metadata).await?;
                if revoked.amount_revoked > 0 {
                    *total_revoked.entry(key.clone()).or_insert(0) += revoked.amount_revoked;
                    self.notify_revoked(target_user, &key, revoked.amount_revoked, &view.id);
                }
            }
        }

        info!("🧹 [LIFECYCLE]: Cancellation of {} revoked {:?}.", view.id, total_revoked);
        Ok(LifecycleOutcome::Applied)
    }

    // =================================================================
    // RESOLUCIÓN Y SOPORTE
    // =================================================================

    fn resolve_plan(&self, view: &SubscriptionView) -> Option<&Plan> {
        self.plan_for_price(view.price_id.as_deref())
    }

    fn plan_for_price(&self, price_id: Option<&str>) -> Option<&Plan> {
        let price_id = price_id?;
        self.catalog
            .resolve_plan_by_price_id(price_id, self.settings.active_env)
            .map(|resolution| resolution.plan)
    }

    /// Monto del punto de precio, con el espejo de precios como respaldo
    /// cuando el catálogo no conoce el price_id.
    async fn price_amount(&self, price_id: Option<&str>) -> Result<Option<i64>, LedgerError> {
        let Some(price_id) = price_id else { return Ok(None) };

        if let Some(resolution) =
            self.catalog.resolve_plan_by_price_id(price_id, self.settings.active_env)
        {
            return Ok(Some(resolution.price_point.amount));
        }

        Ok(self
            .mirror
            .find_price(price_id)
            .await?
            .and_then(|price_record| price_record.unit_amount))
    }

    /// Usuarios destino del evento según la política de otorgamiento.
    async fn resolve_target_users(
        &self,
        view: &SubscriptionView,
    ) -> Result<Vec<String>, LedgerError> {
        match self.settings.grant_to {
            GrantTarget::Manual => Ok(Vec::new()),
            GrantTarget::SeatUsers => self.seat_rows.list_seat_users(&view.id).await,
            GrantTarget::Subscriber => {
                Ok(self.mirror.user_for_customer(&view.customer_id).await?.into_iter().collect())
            }
        }
    }

    /// Ejecuta la regla de renovación de una clave. Retorna false si el
    /// asiento colisionó por idempotencia (replay).
    #[allow(clippy::too_many_arguments)]
    async fn apply_rule(
        &self,
        target_user: &str,
        key: &str,
        on_renewal: OnRenewal,
        allocation: i64,
        source: &str,
        source_id: &str,
        idempotency_key: &str,
        description: &str,
    ) -> Result<bool, LifecycleError> {
        let metadata = DeltaMetadata {
            source: Some(source.to_string()),
            source_id: Some(source_id.to_string()),
            description: Some(description.to_string()),
            currency: None,
            idempotency_key: (!idempotency_key.is_empty()).then(|| idempotency_key.to_string()),
        };

        match on_renewal {
            OnRenewal::Reset => {
                let descriptions = ResetDescriptions {
                    expire: Some("Unused balance expired".to_string()),
                    forgiven: Some("Negative balance forgiven".to_string()),
                    grant: Some(description.to_string()),
                };
                match self
                    .credits
                    .atomic_balance_reset(target_user, key, allocation, &metadata, &descriptions)
                    .await
                {
                    Ok(reset_outcome) => {
                        self.event_sink.on_balance_reset(&CreditEvent {
                            user_id: target_user.to_string(),
                            key: key.to_string(),
                            amount: reset_outcome.new_balance,
                            source: source.to_string(),
                            source_id: Some(source_id.to_string()),
                        });
                        Ok(true)
                    }
                    Err(LedgerError::IdempotencyConflict(_)) => Ok(false),
                    Err(ledger_fault) => Err(ledger_fault.into()),
                }
            }
            OnRenewal::Add => match self.credits.grant(target_user, key, allocation, &metadata).await
            {
                Ok(_) => {
                    self.notify_granted(target_user, key, allocation, source_id);
                    Ok(true)
                }
                Err(LedgerError::IdempotencyConflict(_)) => Ok(false),
                Err(ledger_fault) => Err(ledger_fault.into()),
            },
        }
    }

    fn notify_granted(&self, user_id: &str, key: &str, amount: i64, source_id: &str) {
        self.event_sink.on_credits_granted(&CreditEvent {
            user_id: user_id.to_string(),
            key: key.to_string(),
            amount,
            source: sources::SUBSCRIPTION.to_string(),
            source_id: Some(source_id.to_string()),
        });
    }

    fn notify_revoked(&self, user_id: &str, key: &str, amount: i64, source_id: &str) {
        self.event_sink.on_credits_revoked(&CreditEvent {
            user_id: user_id.to_string(),
            key: key.to_string(),
            amount,
            source: sources::CANCELLATION.to_string(),
            source_id: Some(source_id.to_string()),
        });
    }
}
