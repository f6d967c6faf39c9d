// [apps/orchestrator/src/services/topup.rs]
/*!
 * =================================================================
 * APARATO: CREDIT TOP-UP ENGINE (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: COMPRA DE CRÉDITOS BAJO DEMANDA Y AUTOMÁTICA
 *
 * Disciplina de idempotencia: un único token determinista viaja al
 * procesador (Idempotency-Key) y la clave del grant deriva del
 * identificador que el procesador devuelve (pi/cs/in). Un reintento
 * ni duplica el cargo ni duplica los créditos; el webhook diferido
 * colisiona con el grant síncrono y se vuelve no-op.
 *
 * El ledger jamás se escribe antes de que el procesador confirme
 * 'succeeded'; los estados pendientes esperan al webhook.
 * =================================================================
 */

use crate::state::BillingSettings;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tesoro_domain_billing::{BillingConfig, Feature};
use tesoro_domain_ledger::{
    sources, AutoTopUpFailure, CreditEvent, CreditEventSink, DeltaMetadata, TopUpReceipt,
};
use tesoro_infra_db::repositories::{
    CreditLedgerRepository, CustomerRecord, StripeMirrorRepository, SubscriptionRecord,
};
use tesoro_infra_db::LedgerError;
use tesoro_infra_stripe::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutSession, CreateInvoice, CreateInvoiceItem,
    CreatePaymentIntent, Invoice, PaymentGateway, PaymentIntent, PaymentIntentStatus,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Mínimo cobrable por el procesador (centavos equivalentes a USD).
const PROCESSOR_MINIMUM_CHARGE_CENTS: i64 = 60;

// =================================================================
// CONTRATOS DE RESULTADO
// =================================================================

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopUpFaultCode {
    InvalidAmount,
    UserNotFound,
    NoSubscription,
    TopupNotConfigured,
    NoPaymentMethod,
    PaymentFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUpFault {
    pub code: TopUpFaultCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargedAmount {
    pub amount_cents: i64,
    pub currency: String,
}

/// Resultado caller-visible de un top-up. Nunca se lanza: los fallos
/// de pago son datos, no excepciones.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TopUpOutcome {
    Completed {
        success: bool,
        balance: i64,
        charged: ChargedAmount,
        source_id: String,
    },
    Pending {
        success: bool,
        status: String,
        message: String,
        source_id: String,
    },
    Failed {
        success: bool,
        error: TopUpFault,
    },
}

impl TopUpOutcome {
    fn completed(balance: i64, charged: ChargedAmount, source_id: String) -> Self {
        TopUpOutcome::Completed { success: true, balance, charged, source_id }
    }

    fn pending(source_id: String) -> Self {
        TopUpOutcome::Pending {
            success: true,
            status: "pending".to_string(),
            message: "Payment is processing; credits land on confirmation".to_string(),
            source_id,
        }
    }

    fn failed(code: TopUpFaultCode, message: String, recovery_url: Option<String>) -> Self {
        TopUpOutcome::Failed { success: false, error: TopUpFault { code, message, recovery_url } }
    }
}

/// Resultado del disparador de auto top-up.
#[derive(Debug, Clone, Serialize)]
pub struct AutoTopUpOutcome {
    pub triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl AutoTopUpOutcome {
    fn triggered(status: &str, source_id: String) -> Self {
        Self {
            triggered: true,
            status: Some(status.to_string()),
            reason: None,
            source_id: Some(source_id),
        }
    }

    fn not_triggered(reason: &str) -> Self {
        Self { triggered: false, status: None, reason: Some(reason.to_string()), source_id: None }
    }
}

// =================================================================
// CONTEXTO INTERNO DE EJECUCIÓN
// =================================================================

struct ChargeContext {
    user_id: String,
    customer_id: String,
    payment_method: String,
    key: String,
    credit_amount: i64,
    total_cents: i64,
    currency: String,
    source: &'static str,
    processor_idempotency_key: String,
}

enum ChargeResult {
    Granted { balance: i64, source_id: String },
    Pending { source_id: String },
    RequiresAction { recovery_url: Option<String> },
    Declined { message: String, recovery_url: Option<String> },
    InvalidRequest { message: String },
}

struct TopUpTarget {
    customer: CustomerRecord,
    subscription: SubscriptionRecord,
}

enum TargetFault {
    UserNotFound,
    NoSubscription,
}

pub struct TopUpEngine {
    credits: Arc<CreditLedgerRepository>,
    mirror: Arc<StripeMirrorRepository>,
    payment_gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<BillingConfig>,
    settings: Arc<BillingSettings>,
    event_sink: Arc<dyn CreditEventSink>,
}

impl TopUpEngine {
    pub fn new(
        credits: Arc<CreditLedgerRepository>,
        mirror: Arc<StripeMirrorRepository>,
        payment_gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<BillingConfig>,
        settings: Arc<BillingSettings>,
        event_sink: Arc<dyn CreditEventSink>,
    ) -> Self {
        Self { credits, mirror, payment_gateway, catalog, settings, event_sink }
    }

    // =================================================================
    // TOP-UP BAJO DEMANDA
    // =================================================================

    /**
     * Compra de créditos bajo demanda. Escalera de precondiciones del
     * contrato; cada fallo retorna un resultado con código y, cuando
     * aplica, una URL de recuperación fuera de banda.
     */
    #[instrument(skip(self, idempotency_key))]
    pub async fn top_up(
        &self,
        user_id: &str,
        key: &str,
        amount: i64,
        idempotency_key: Option<String>,
    ) -> Result<TopUpOutcome, LedgerError> {
        let target = match self.resolve_target(user_id).await? {
            Ok(target) => target,
            Err(TargetFault::UserNotFound) => {
                return Ok(TopUpOutcome::failed(
                    TopUpFaultCode::UserNotFound,
                    "No billing customer on file for this user".to_string(),
                    None,
                ))
            }
            Err(TargetFault::NoSubscription) => {
                return Ok(TopUpOutcome::failed(
                    TopUpFaultCode::NoSubscription,
                    "An active subscription is required to purchase credits".to_string(),
                    None,
                ))
            }
        };

        let Some((feature, currency)) = self.topup_feature(&target.subscription, key) else {
            return Ok(TopUpOutcome::failed(
                TopUpFaultCode::TopupNotConfigured,
                format!("Top-up is not configured for credit type '{}'", key),
                None,
            ));
        };

        let price_per_credit = feature.price_per_credit.unwrap_or(0);
        let minimum_purchase = feature.min_per_purchase.unwrap_or(1);
        let maximum_purchase = feature.max_per_purchase;

        if amount < minimum_purchase || maximum_purchase.is_some_and(|max| amount > max) {
            let boundary_message = match maximum_purchase {
                Some(max) => format!("Amount must be between {} and {}", minimum_purchase, max),
                None => format!("Amount must be at least {}", minimum_purchase),
            };
            return Ok(TopUpOutcome::failed(TopUpFaultCode::InvalidAmount, boundary_message, None));
        }

        let total_cents = amount * price_per_credit;
        if total_cents < PROCESSOR_MINIMUM_CHARGE_CENTS {
            return Ok(TopUpOutcome::failed(
                TopUpFaultCode::InvalidAmount,
                "Total charge must be at least 60 cents".to_string(),
                None,
            ));
        }

        let Some(payment_method) = target.customer.default_payment_method().map(str::to_string)
        else {
            let recovery_url = self
                .pre_create_recovery_url(&target.customer.id, user_id, key, amount, price_per_credit, &currency)
                .await;
            return Ok(TopUpOutcome::failed(
                TopUpFaultCode::NoPaymentMethod,
                "No default payment method on file".to_string(),
                recovery_url,
            ));
        };

        let context = ChargeContext {
            user_id: user_id.to_string(),
            customer_id: target.customer.id.clone(),
            payment_method,
            key: key.to_string(),
            credit_amount: amount,
            total_cents,
            currency: currency.clone(),
            source: sources::TOPUP,
            processor_idempotency_key: idempotency_key
                .unwrap_or_else(|| format!("topup:{}:{}:{}", user_id, key, Uuid::new_v4())),
        };

        let charge_result = self.execute_charge(&context).await?;
        Ok(self.map_charge_result(charge_result, &context))
    }

    fn map_charge_result(&self, result: ChargeResult, context: &ChargeContext) -> TopUpOutcome {
        match result {
            ChargeResult::Granted { balance, source_id } => TopUpOutcome::completed(
                balance,
                ChargedAmount {
                    amount_cents: context.total_cents,
                    currency: context.currency.clone(),
                },
                source_id,
            ),
            ChargeResult::Pending { source_id } => TopUpOutcome::pending(source_id),
            ChargeResult::RequiresAction { recovery_url } => TopUpOutcome::failed(
                TopUpFaultCode::PaymentFailed,
                "Payment requires additional authentication".to_string(),
                recovery_url,
            ),
            ChargeResult::Declined { message, recovery_url } => {
                TopUpOutcome::failed(TopUpFaultCode::PaymentFailed, message, recovery_url)
            }
            ChargeResult::InvalidRequest { message } => {
                TopUpOutcome::failed(TopUpFaultCode::InvalidAmount, message, None)
            }
        }
    }

    // =================================================================
    // AUTO TOP-UP
    // =================================================================

    /**
     * Disparo automático por umbral. La igualdad con el umbral NO
     * dispara; solo cuenta el mes calendario corriente y únicamente
     * los asientos con fuente 'auto_topup' (los manuales no cuentan).
     */
    #[instrument(skip(self))]
    pub async fn trigger_auto_top_up_if_needed(
        &self,
        user_id: &str,
        key: &str,
        current_balance: i64,
    ) -> Result<AutoTopUpOutcome, LedgerError> {
        let target = match self.resolve_target(user_id).await? {
            Ok(target) => target,
            Err(TargetFault::UserNotFound) => {
                return Ok(self.auto_failure(user_id, key, "user_not_found"))
            }
            Err(TargetFault::NoSubscription) => {
                return Ok(self.auto_failure(user_id, key, "no_subscription"))
            }
        };

        let Some((feature, currency)) = self.topup_feature(&target.subscription, key) else {
            return Ok(AutoTopUpOutcome::not_triggered("not_configured"));
        };
        let Some(auto_rule) = feature.auto_top_up.as_ref() else {
            return Ok(AutoTopUpOutcome::not_triggered("not_configured"));
        };

        if current_balance >= auto_rule.threshold {
            return Ok(AutoTopUpOutcome::not_triggered("balance_above_threshold"));
        }

        let fired_this_month = self
            .credits
            .count_monthly_by_source(user_id, key, sources::AUTO_TOPUP)
            .await?;
        if fired_this_month >= auto_rule.max_per_month {
            return Ok(self.auto_failure(user_id, key, "max_per_month_reached"));
        }

        let Some(payment_method) = target.customer.default_payment_method().map(str::to_string)
        else {
            return Ok(self.auto_failure(user_id, key, "no_payment_method"));
        };

        let price_per_credit = feature.price_per_credit.unwrap_or(0);
        let cycle_month = chrono::Utc::now().format("%Y-%m");

        let context = ChargeContext {
            user_id: user_id.to_string(),
            customer_id: target.customer.id.clone(),
            payment_method,
            key: key.to_string(),
            credit_amount: auto_rule.amount,
            total_cents: auto_rule.amount * price_per_credit,
            currency,
            source: sources::AUTO_TOPUP,
            // Sembrada con el contador mensual: un reintento dentro del
            // mismo ciclo reutiliza el cargo en vez de repetirlo.
            processor_idempotency_key: format!(
                "auto_topup:{}:{}:{}:{}",
                user_id, key, cycle_month, fired_this_month
            ),
        };

        match self.execute_charge(&context).await? {
            ChargeResult::Granted { source_id, .. } => {
                info!("⚡ [AUTO_TOPUP]: Fired for ({}, {}) -> {}.", user_id, key, source_id);
                Ok(AutoTopUpOutcome::triggered("succeeded", source_id))
            }
            ChargeResult::Pending { source_id } => {
                Ok(AutoTopUpOutcome::triggered("pending", source_id))
            }
            ChargeResult::RequiresAction { .. } => {
                Ok(self.auto_failure(user_id, key, "payment_requires_action"))
            }
            ChargeResult::Declined { .. } | ChargeResult::InvalidRequest { .. } => {
                Ok(self.auto_failure(user_id, key, "payment_failed"))
            }
        }
    }

    fn auto_failure(&self, user_id: &str, key: &str, reason: &str) -> AutoTopUpOutcome {
        self.event_sink.on_auto_top_up_failed(&AutoTopUpFailure {
            user_id: user_id.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        });
        AutoTopUpOutcome::not_triggered(reason)
    }

    // =================================================================
    // GANCHOS DE WEBHOOK (GRANTS DIFERIDOS)
    // =================================================================

    /// Intento de pago confirmado fuera de banda. Sin metadata de
    /// top-up el evento es ajeno y se ignora.
    #[instrument(skip(self, intent), fields(intent = %intent.id))]
    pub async fn handle_payment_intent_succeeded(
        &self,
        intent: &PaymentIntent,
    ) -> Result<(), LedgerError> {
        if intent.status != PaymentIntentStatus::Succeeded {
            return Ok(());
        }
        let Some(deferred) = DeferredGrant::from_metadata(&intent.metadata) else {
            return Ok(());
        };

        self.grant_once(
            &deferred,
            &format!("pi_succeeded:{}:{}", intent.id, deferred.key),
            &intent.id,
            intent.amount,
            &intent.currency,
        )
        .await
        .map(|_| ())
    }

    /// Checkout de recuperación completado. Solo sesiones pagadas.
    #[instrument(skip(self, session), fields(session = %session.id))]
    pub async fn handle_topup_checkout_completed(
        &self,
        session: &CheckoutSession,
    ) -> Result<(), LedgerError> {
        if session.payment_status.as_deref() != Some("paid") {
            return Ok(());
        }
        let Some(deferred) = DeferredGrant::from_metadata(&session.metadata) else {
            return Ok(());
        };

        self.grant_once(
            &deferred,
            &format!("cs_completed:{}:{}", session.id, deferred.key),
            &session.id,
            deferred.total_cents.unwrap_or(0),
            deferred.currency.as_deref().unwrap_or("usd"),
        )
        .await
        .map(|_| ())
    }

    /// Factura de top-up pagada (ruta B2B o recuperación por invoice).
    #[instrument(skip(self, invoice), fields(invoice = %invoice.id))]
    pub async fn handle_invoice_paid(&self, invoice: &Invoice) -> Result<(), LedgerError> {
        let Some(deferred) = DeferredGrant::from_metadata(&invoice.metadata) else {
            return Ok(());
        };

        self.grant_once(
            &deferred,
            &format!("in_paid:{}:{}", invoice.id, deferred.key),
            &invoice.id,
            invoice.amount_due,
            &invoice.currency,
        )
        .await
        .map(|_| ())
    }

    // =================================================================
    // EJECUCIÓN COMPARTIDA
    // =================================================================

    async fn resolve_target(
        &self,
        user_id: &str,
    ) -> Result<Result<TopUpTarget, TargetFault>, LedgerError> {
        let Some(customer_id) = self.mirror.customer_for_user(user_id).await? else {
            return Ok(Err(TargetFault::UserNotFound));
        };
        let Some(customer) = self.mirror.find_customer(&customer_id).await? else {
            return Ok(Err(TargetFault::UserNotFound));
        };
        if customer.deleted {
            return Ok(Err(TargetFault::UserNotFound));
        }

        let Some(subscription) =
            self.mirror.active_subscription_for_customer(&customer_id).await?
        else {
            return Ok(Err(TargetFault::NoSubscription));
        };

        Ok(Ok(TopUpTarget { customer, subscription }))
    }

    /// Feature con top-up configurado y la divisa del punto de precio.
    fn topup_feature(
        &self,
        subscription: &SubscriptionRecord,
        key: &str,
    ) -> Option<(Feature, String)> {
        let price_id = subscription.price_id.as_deref()?;
        let resolution =
            self.catalog.resolve_plan_by_price_id(price_id, self.settings.active_env)?;
        let feature = resolution.plan.feature(key)?;
        if !feature.supports_top_up() {
            return None;
        }
        Some((feature.clone(), resolution.price_point.currency.clone()))
    }

    fn topup_metadata(&self, context: &ChargeContext) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("top_up_credit_type".to_string(), context.key.clone());
        metadata.insert("top_up_amount".to_string(), context.credit_amount.to_string());
        metadata.insert("top_up_total_cents".to_string(), context.total_cents.to_string());
        metadata.insert("user_id".to_string(), context.user_id.clone());
        if context.source == sources::AUTO_TOPUP {
            metadata.insert("top_up_auto".to_string(), "true".to_string());
        }
        metadata
    }

    async fn execute_charge(&self, context: &ChargeContext) -> Result<ChargeResult, LedgerError> {
        if self.settings.b2b_invoicing {
            self.execute_invoice_charge(context).await
        } else {
            self.execute_intent_charge(context).await
        }
    }

    /// Ruta B2C: intento de pago confirmado fuera de sesión.
    async fn execute_intent_charge(
        &self,
        context: &ChargeContext,
    ) -> Result<ChargeResult, LedgerError> {
        let intent_request = CreatePaymentIntent {
            customer: context.customer_id.clone(),
            amount: context.total_cents,
            currency: context.currency.clone(),
            payment_method: Some(context.payment_method.clone()),
            off_session: true,
            confirm: true,
            metadata: self.topup_metadata(context),
            idempotency_key: Some(context.processor_idempotency_key.clone()),
        };

        let intent = match self.payment_gateway.create_payment_intent(intent_request).await {
            Ok(intent) => intent,
            Err(gateway_fault) if gateway_fault.is_card_error() => {
                let recovery_url = self.recovery_url_for(context).await;
                return Ok(ChargeResult::Declined {
                    message: gateway_fault.to_string(),
                    recovery_url,
                });
            }
            Err(gateway_fault) if gateway_fault.is_invalid_request() => {
                return Ok(ChargeResult::InvalidRequest { message: gateway_fault.to_string() });
            }
            Err(gateway_fault) => {
                warn!("💥 [TOPUP]: Processor uplink fault: {}", gateway_fault);
                return Ok(ChargeResult::Declined {
                    message: gateway_fault.to_string(),
                    recovery_url: None,
                });
            }
        };

        match intent.status {
            PaymentIntentStatus::Succeeded => {
                let deferred = DeferredGrant {
                    user_id: context.user_id.clone(),
                    key: context.key.clone(),
                    credit_amount: context.credit_amount,
                    source: context.source,
                    total_cents: Some(context.total_cents),
                    currency: Some(context.currency.clone()),
                };
                let balance = self
                    .grant_once(
                        &deferred,
                        &format!("pi_succeeded:{}:{}", intent.id, context.key),
                        &intent.id,
                        context.total_cents,
                        &context.currency,
                    )
                    .await?;
                Ok(ChargeResult::Granted { balance, source_id: intent.id })
            }
            PaymentIntentStatus::Processing => {
                debug!("⏱️ [TOPUP]: Intent {} processing; ledger untouched.", intent.id);
                Ok(ChargeResult::Pending { source_id: intent.id })
            }
            PaymentIntentStatus::RequiresAction
            | PaymentIntentStatus::RequiresConfirmation
            | PaymentIntentStatus::RequiresPaymentMethod => {
                let recovery_url = self.recovery_url_for(context).await;
                Ok(ChargeResult::RequiresAction { recovery_url })
            }
            PaymentIntentStatus::Canceled => Ok(ChargeResult::Declined {
                message: "Payment intent canceled by processor".to_string(),
                recovery_url: None,
            }),
        }
    }

    /// Ruta B2B: factura borrador + línea + pago inmediato. El fallo
    /// anula la factura y entrega su URL alojada como recuperación.
    async fn execute_invoice_charge(
        &self,
        context: &ChargeContext,
    ) -> Result<ChargeResult, LedgerError> {
        let created_invoice = match self
            .payment_gateway
            .create_invoice(CreateInvoice {
                customer: context.customer_id.clone(),
                auto_advance: false,
                collection_method: "charge_automatically".to_string(),
                days_until_due: None,
                metadata: self.topup_metadata(context),
                idempotency_key: Some(context.processor_idempotency_key.clone()),
            })
            .await
        {
            Ok(invoice) => invoice,
            Err(gateway_fault) => {
                return Ok(ChargeResult::Declined {
                    message: gateway_fault.to_string(),
                    recovery_url: None,
                })
            }
        };

        let line_item_result = self
            .payment_gateway
            .create_invoice_item(CreateInvoiceItem {
                customer: context.customer_id.clone(),
                invoice: created_invoice.id.clone(),
                amount: context.total_cents,
                currency: context.currency.clone(),
                description: Some(format!("{} {} credits", context.credit_amount, context.key)),
            })
            .await;

        if let Err(gateway_fault) = line_item_result {
            let _ = self.payment_gateway.void_invoice(&created_invoice.id).await;
            return Ok(ChargeResult::Declined {
                message: gateway_fault.to_string(),
                recovery_url: None,
            });
        }

        let finalized_invoice = self
            .payment_gateway
            .finalize_invoice(&created_invoice.id)
            .await
            .unwrap_or_else(|_| created_invoice.clone());

        match self.payment_gateway.pay_invoice(&created_invoice.id).await {
            Ok(paid_invoice) => {
                let deferred = DeferredGrant {
                    user_id: context.user_id.clone(),
                    key: context.key.clone(),
                    credit_amount: context.credit_amount,
                    source: context.source,
                    total_cents: Some(context.total_cents),
                    currency: Some(context.currency.clone()),
                };
                let balance = self
                    .grant_once(
                        &deferred,
                        &format!("in_paid:{}:{}", paid_invoice.id, context.key),
                        &paid_invoice.id,
                        context.total_cents,
                        &context.currency,
                    )
                    .await?;
                Ok(ChargeResult::Granted { balance, source_id: paid_invoice.id })
            }
            Err(gateway_fault) => {
                let _ = self.payment_gateway.void_invoice(&created_invoice.id).await;
                Ok(ChargeResult::Declined {
                    message: gateway_fault.to_string(),
                    recovery_url: finalized_invoice.hosted_invoice_url,
                })
            }
        }
    }

    /**
     * Otorga los créditos de un cargo confirmado exactamente una vez.
     * La colisión de idempotencia significa que otro camino (síncrono
     * o webhook) ya los acreditó: se lee el saldo y no se re-notifica.
     */
    async fn grant_once(
        &self,
        deferred: &DeferredGrant,
        grant_idempotency_key: &str,
        source_id: &str,
        charged_cents: i64,
        currency: &str,
    ) -> Result<i64, LedgerError> {
        let metadata = DeltaMetadata {
            source: Some(deferred.source.to_string()),
            source_id: Some(source_id.to_string()),
            description: Some(format!("Top-up of {} {}", deferred.credit_amount, deferred.key)),
            currency: None,
            idempotency_key: Some(grant_idempotency_key.to_string()),
        };

        match self
            .credits
            .grant(&deferred.user_id, &deferred.key, deferred.credit_amount, &metadata)
            .await
        {
            Ok(outcome) => {
                self.event_sink.on_credits_granted(&CreditEvent {
                    user_id: deferred.user_id.clone(),
                    key: deferred.key.clone(),
                    amount: deferred.credit_amount,
                    source: deferred.source.to_string(),
                    source_id: Some(source_id.to_string()),
                });
                self.event_sink.on_top_up_completed(&TopUpReceipt {
                    user_id: deferred.user_id.clone(),
                    key: deferred.key.clone(),
                    amount: deferred.credit_amount,
                    charged_cents,
                    currency: currency.to_string(),
                    source_id: source_id.to_string(),
                });
                Ok(outcome.new_balance)
            }
            Err(LedgerError::IdempotencyConflict(_)) => {
                debug!(
                    "🔁 [TOPUP]: Grant replay for ({}, {}); first credit stands.",
                    deferred.user_id, deferred.key
                );
                self.credits.get_balance(&deferred.user_id, &deferred.key).await
            }
            Err(ledger_fault) => Err(ledger_fault),
        }
    }

    /// URL de recuperación para fallos de pago en la ruta B2C.
    async fn recovery_url_for(&self, context: &ChargeContext) -> Option<String> {
        self.create_recovery_checkout(
            &context.customer_id,
            &self.topup_metadata(context),
            &context.key,
            context.credit_amount,
            context.total_cents / context.credit_amount.max(1),
            &context.currency,
        )
        .await
    }

    /// Pre-crea la URL de recuperación cuando no hay método de pago:
    /// checkout alojado (B2C) o factura alojada (B2B).
    async fn pre_create_recovery_url(
        &self,
        customer_id: &str,
        user_id: &str,
        key: &str,
        amount: i64,
        price_per_credit: i64,
        currency: &str,
    ) -> Option<String> {
        let mut metadata = HashMap::new();
        metadata.insert("top_up_credit_type".to_string(), key.to_string());
        metadata.insert("top_up_amount".to_string(), amount.to_string());
        metadata.insert("top_up_total_cents".to_string(), (amount * price_per_credit).to_string());
        metadata.insert("user_id".to_string(), user_id.to_string());

        if self.settings.b2b_invoicing {
            self.create_recovery_invoice(customer_id, &metadata, key, amount, price_per_credit, currency)
                .await
        } else {
            self.create_recovery_checkout(customer_id, &metadata, key, amount, price_per_credit, currency)
                .await
        }
    }

    async fn create_recovery_checkout(
        &self,
        customer_id: &str,
        metadata: &HashMap<String, String>,
        key: &str,
        amount: i64,
        price_per_credit: i64,
        currency: &str,
    ) -> Option<String> {
        let session_request = CreateCheckoutSession {
            customer: Some(customer_id.to_string()),
            mode: "payment".to_string(),
            subscription_price_id: None,
            line_items: vec![CheckoutLineItem {
                name: format!("{} credits", key),
                unit_amount: price_per_credit,
                currency: currency.to_string(),
                quantity: amount,
            }],
            success_url: self.settings.checkout_success_url.clone(),
            cancel_url: self.settings.checkout_cancel_url.clone(),
            metadata: metadata.clone(),
        };

        match self.payment_gateway.create_checkout_session(session_request).await {
            Ok(session) => session.url,
            Err(gateway_fault) => {
                warn!("🧯 [TOPUP]: Recovery checkout creation failed: {}", gateway_fault);
                None
            }
        }
    }

    async fn create_recovery_invoice(
        &self,
        customer_id: &str,
        metadata: &HashMap<String, String>,
        key: &str,
        amount: i64,
        price_per_credit: i64,
        currency: &str,
    ) -> Option<String> {
        let invoice = self
            .payment_gateway
            .create_invoice(CreateInvoice {
                customer: customer_id.to_string(),
                auto_advance: false,
                collection_method: "send_invoice".to_string(),
                days_until_due: Some(30),
                metadata: metadata.clone(),
                idempotency_key: None,
            })
            .await
            .ok()?;

        self.payment_gateway
            .create_invoice_item(CreateInvoiceItem {
                customer: customer_id.to_string(),
                invoice: invoice.id.clone(),
                amount: amount * price_per_credit,
                currency: currency.to_string(),
                description: Some(format!("{} {} credits", amount, key)),
            })
            .await
            .ok()?;

        let finalized = self.payment_gateway.finalize_invoice(&invoice.id).await.ok()?;
        finalized.hosted_invoice_url
    }
}

/// Grant diferido decodificado de la metadata del procesador.
struct DeferredGrant {
    user_id: String,
    key: String,
    credit_amount: i64,
    source: &'static str,
    total_cents: Option<i64>,
    currency: Option<String>,
}

impl DeferredGrant {
    fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        let key = metadata.get("top_up_credit_type")?.clone();
        let user_id = metadata.get("user_id")?.clone();
        let credit_amount = metadata.get("top_up_amount")?.parse().ok()?;
        let source = if metadata.get("top_up_auto").map(String::as_str) == Some("true") {
            sources::AUTO_TOPUP
        } else {
            sources::TOPUP
        };
        Some(Self {
            user_id,
            key,
            credit_amount,
            source,
            total_cents: metadata.get("top_up_total_cents").and_then(|v| v.parse().ok()),
            currency: None,
        })
    }
}
