// [apps/orchestrator/src/services/seats.rs]
/*!
 * =================================================================
 * APARATO: SEAT PROVISIONING SERVICE (V4.0)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: ALTA/BAJA DE ASIENTOS Y CANTIDAD POR ASIENTO
 *
 * La baja revoca únicamente el remanente otorgado por ESTA
 * suscripción (min(saldo, otorgado-por-la-suscripción)); los top-ups
 * y otras fuentes sobreviven. La cantidad del ítem por asiento nunca
 * baja de 1.
 * =================================================================
 */

use crate::state::BillingSettings;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tesoro_domain_billing::{allocation_for_interval, BillingConfig, BillingInterval, GrantTarget};
use tesoro_domain_ledger::{sources, CreditEvent, CreditEventSink, DeltaMetadata};
use tesoro_infra_db::repositories::{
    CreditLedgerRepository, SeatRepository, StripeMirrorRepository, SubscriptionRecord,
};
use tesoro_infra_db::LedgerError;
use tesoro_infra_stripe::{GatewayError, PaymentGateway};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum SeatError {
    #[error("org has no Stripe customer")]
    OrgWithoutCustomer,

    #[error("No active subscription")]
    NoActiveSubscription,

    #[error("User is already a seat of another subscription")]
    SeatTakenElsewhere,

    #[error("User holds no seat on this subscription")]
    SeatNotFound,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("SEAT_QUANTITY_SYNC_FAULT: {0}")]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatAddOutcome {
    pub success: bool,
    /// El usuario ya ocupaba este asiento: alta idempotente sin re-grant.
    pub already_member: bool,
    pub credits_granted: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatRemoveOutcome {
    pub success: bool,
    pub credits_revoked: BTreeMap<String, i64>,
}

pub struct SeatProvisioningService {
    credits: Arc<CreditLedgerRepository>,
    mirror: Arc<StripeMirrorRepository>,
    seat_rows: Arc<SeatRepository>,
    payment_gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<BillingConfig>,
    settings: Arc<BillingSettings>,
    event_sink: Arc<dyn CreditEventSink>,
}

impl SeatProvisioningService {
    pub fn new(
        credits: Arc<CreditLedgerRepository>,
        mirror: Arc<StripeMirrorRepository>,
        seat_rows: Arc<SeatRepository>,
        payment_gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<BillingConfig>,
        settings: Arc<BillingSettings>,
        event_sink: Arc<dyn CreditEventSink>,
    ) -> Self {
        Self { credits, mirror, seat_rows, payment_gateway, catalog, settings, event_sink }
    }

    /**
     * Alta de asiento: resuelve org -> customer -> suscripción activa,
     * sella la fila y otorga según la política de destino. En planes
     * por asiento incrementa la cantidad del ítem en el procesador.
     */
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: &str, org_id: &str) -> Result<SeatAddOutcome, SeatError> {
        let customer_id = self
            .mirror
            .customer_for_user(org_id)
            .await?
            .ok_or(SeatError::OrgWithoutCustomer)?;
        let subscription = self
            .mirror
            .active_subscription_for_customer(&customer_id)
            .await?
            .ok_or(SeatError::NoActiveSubscription)?;

        match self.seat_rows.find_seat(user_id).await? {
            Some(existing) if existing == subscription.id => {
                // Alta repetida: éxito idempotente, sin duplicar créditos.
                return Ok(SeatAddOutcome {
                    success: true,
                    already_member: true,
                    credits_granted: BTreeMap::new(),
                });
            }
            Some(_) => return Err(SeatError::SeatTakenElsewhere),
            None => {}
        }

        match self.seat_rows.insert_seat(user_id, &subscription.id).await {
            Ok(()) => {}
            Err(LedgerError::SeatConflict(_)) => return Err(SeatError::SeatTakenElsewhere),
            Err(ledger_fault) => return Err(ledger_fault.into()),
        }

        let credits_granted = self.grant_seat_allocations(user_id, org_id, &subscription).await?;

        if self.plan_is_per_seat(&subscription) {
            if let Some(item_id) = &subscription.item_id {
                self.payment_gateway
                    .update_subscription_item_quantity(item_id, subscription.quantity + 1)
                    .await?;
            }
        }

        info!("🪑 [SEATS]: {} added to {} ({} credit keys).",
            user_id, subscription.id, credits_granted.len());
        Ok(SeatAddOutcome { success: true, already_member: false, credits_granted })
    }

    /**
     * Baja de asiento: revoca el remanente del plan de esta suscripción
     * dejando intactas las demás fuentes, borra la fila y decrementa la
     * cantidad por asiento sin bajar jamás de 1.
     */
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: &str, org_id: &str) -> Result<SeatRemoveOutcome, SeatError> {
        let seat_subscription_id = match self.seat_rows.find_seat(user_id).await? {
            Some(subscription_id) => subscription_id,
            None => return Err(SeatError::SeatNotFound),
        };

        let subscription = self.mirror.find_subscription(&seat_subscription_id).await?;
        let mut credits_revoked = BTreeMap::new();

        if let Some(subscription) = &subscription {
            let revoke_target = self.grant_target_user(user_id, org_id);
            if let (Some(target_user), Some(plan)) =
                (revoke_target, self.plan_for_subscription(subscription))
            {
                for key in plan.credit_keys() {
                    let granted_by_subscription = self
                        .credits
                        .sum_granted_by_source(
                            &target_user,
                            &key,
                            sources::SEAT_GRANT,
                            &subscription.id,
                        )
                        .await?;
                    let current_balance = self.credits.get_balance(&target_user, &key).await?;
                    let revocable = granted_by_subscription.min(current_balance.max(0));
                    if revocable == 0 {
                        continue;
                    }

                    let metadata = DeltaMetadata {
                        source: Some(sources::SEAT_GRANT.to_string()),
                        source_id: Some(subscription.id.clone()),
                        description: Some("Seat removed".to_string()),
                        ..Default::default()
                    };
                    let revoked =
                        self.credits.revoke(&target_user, &key, revocable, &metadata).await?;
                    if revoked.amount_revoked > 0 {
                        credits_revoked.insert(key.clone(), revoked.amount_revoked);
                        self.event_sink.on_credits_revoked(&CreditEvent {
                            user_id: target_user.clone(),
                            key,
                            amount: revoked.amount_revoked,
                            source: sources::SEAT_GRANT.to_string(),
                            source_id: Some(subscription.id.clone()),
                        });
                    }
                }
            }
        }

        self.seat_rows.remove_seat(user_id).await?;

        if let Some(subscription) = &subscription {
            if self.plan_is_per_seat(subscription) && subscription.quantity > 1 {
                if let Some(item_id) = &subscription.item_id {
                    self.payment_gateway
                        .update_subscription_item_quantity(item_id, subscription.quantity - 1)
                        .await?;
                }
            }
        }

        info!("🧹 [SEATS]: {} removed from {}.", user_id, seat_subscription_id);
        Ok(SeatRemoveOutcome { success: true, credits_revoked })
    }

    // =================================================================
    // SOPORTE
    // =================================================================

    async fn grant_seat_allocations(
        &self,
        user_id: &str,
        org_id: &str,
        subscription: &SubscriptionRecord,
    ) -> Result<BTreeMap<String, i64>, SeatError> {
        let mut credits_granted = BTreeMap::new();

        let Some(target_user) = self.grant_target_user(user_id, org_id) else {
            return Ok(credits_granted);
        };
        let Some(plan) = self.plan_for_subscription(subscription) else {
            return Ok(credits_granted);
        };

        let interval = BillingInterval::parse(&subscription.interval);
        for (key, rule) in plan.credit_features() {
            let allocation = allocation_for_interval(rule.allocation, interval);
            let metadata = DeltaMetadata {
                source: Some(sources::SEAT_GRANT.to_string()),
                source_id: Some(subscription.id.clone()),
                description: Some(format!("Seat allocation for '{}'", plan.name)),
                currency: None,
                idempotency_key: Some(format!(
                    "seat_grant:{}:{}:{}",
                    subscription.id, user_id, key
                )),
            };

            match self.credits.grant(&target_user, key, allocation, &metadata).await {
                Ok(_) => {
                    credits_granted.insert(key.to_string(), allocation);
                    self.event_sink.on_credits_granted(&CreditEvent {
                        user_id: target_user.clone(),
                        key: key.to_string(),
                        amount: allocation,
                        source: sources::SEAT_GRANT.to_string(),
                        source_id: Some(subscription.id.clone()),
                    });
                }
                Err(LedgerError::IdempotencyConflict(_)) => {
                    warn!("🔁 [SEATS]: Seat grant replay for ({}, {}).", target_user, key);
                }
                Err(ledger_fault) => return Err(ledger_fault.into()),
            }
        }

        Ok(credits_granted)
    }

    /// Destino del grant según la política: el usuario-asiento, el pool
    /// compartido de la organización, o nadie en modo manual. El pool
    /// compartido escala por asiento, por diseño del plan de equipo.
    fn grant_target_user(&self, user_id: &str, org_id: &str) -> Option<String> {
        match self.settings.grant_to {
            GrantTarget::SeatUsers => Some(user_id.to_string()),
            GrantTarget::Subscriber => Some(org_id.to_string()),
            GrantTarget::Manual => None,
        }
    }

    fn plan_for_subscription(
        &self,
        subscription: &SubscriptionRecord,
    ) -> Option<&tesoro_domain_billing::Plan> {
        let price_id = subscription.price_id.as_deref()?;
        self.catalog
            .resolve_plan_by_price_id(price_id, self.settings.active_env)
            .map(|resolution| resolution.plan)
    }

    fn plan_is_per_seat(&self, subscription: &SubscriptionRecord) -> bool {
        self.plan_for_subscription(subscription).map(|plan| plan.per_seat).unwrap_or(false)
    }
}
