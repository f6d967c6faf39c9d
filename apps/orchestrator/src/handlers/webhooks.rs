// [apps/orchestrator/src/handlers/webhooks.rs]
/*!
 * =================================================================
 * APARATO: STRIPE WEBHOOK ROUTER (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: SOBRE DE EVENTO -> MOTOR DE CICLO DE VIDA / TOP-UP
 *
 * Disciplina de respuesta: el receptor externo re-encola todo lo que
 * no sea 2xx. Por eso los replays (ALREADY_PROCESSED, conflictos de
 * idempotencia) y los objetos ajenos responden 200; solo los fallos
 * de infraestructura responden 500. La verificación de firma ocurre
 * aguas arriba, fuera de este núcleo.
 * =================================================================
 */

use crate::services::lifecycle::{LifecycleError, LifecycleOutcome, SubscriptionView};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tesoro_infra_db::LedgerError;
use tesoro_infra_stripe::{CheckoutSession, Invoice, PaymentIntent, StripeEvent, Subscription};
use tracing::{debug, error, info, instrument, warn};

pub struct WebhookHandler;

impl WebhookHandler {
    /**
     * Endpoint: POST /api/v1/webhooks/stripe
     */
    #[instrument(skip(application_state, event), fields(event_type = %event.event_type))]
    pub async fn handle_stripe_event(
        State(application_state): State<AppState>,
        Json(event): Json<StripeEvent>,
    ) -> impl IntoResponse {
        let outcome = Self::route_event(&application_state, &event).await;

        match outcome {
            Ok(disposition) => {
                debug!("📬 [WEBHOOK]: {} -> {}", event.event_type, disposition);
                (StatusCode::OK, Json(json!({ "received": true, "outcome": disposition })))
                    .into_response()
            }
            Err(WebhookFault::Replay(detail)) => {
                // El primer procesamiento manda; el reintento se reconoce.
                info!("🔁 [WEBHOOK]: Replay of {} absorbed ({}).", event.id, detail);
                (StatusCode::OK, Json(json!({ "received": true, "outcome": "already_processed" })))
                    .into_response()
            }
            Err(WebhookFault::Malformed(detail)) => {
                warn!("🧩 [WEBHOOK]: Undecodable object in {}: {}", event.id, detail);
                (StatusCode::OK, Json(json!({ "received": true, "outcome": "ignored" })))
                    .into_response()
            }
            Err(WebhookFault::Infrastructure(detail)) => {
                error!("❌ [WEBHOOK_FAULT]: {} collapsed: {}", event.event_type, detail);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "LEDGER_FAULT" })))
                    .into_response()
            }
        }
    }

    async fn route_event(
        application_state: &AppState,
        event: &StripeEvent,
    ) -> Result<&'static str, WebhookFault> {
        match event.event_type.as_str() {
            "customer.subscription.created" => {
                let subscription: Subscription = event.object_as().map_err(malformed)?;
                let view = SubscriptionView::from_wire(&subscription);
                lifecycle_disposition(
                    application_state.lifecycle.on_subscription_created(&view).await,
                )
            }

            "customer.subscription.updated" => {
                let subscription: Subscription = event.object_as().map_err(malformed)?;
                let view = SubscriptionView::from_wire(&subscription);

                // Un downgrade diferido ejecutándose trae su precio de
                // origen en la metadata; lo demás es cambio de plan.
                let deferred_from = view
                    .metadata_str("downgrade_from_price")
                    .filter(|price| Some(*price) != view.price_id.as_deref())
                    .map(str::to_string);

                match deferred_from {
                    Some(previous_price_id) => lifecycle_disposition(
                        application_state
                            .lifecycle
                            .on_downgrade_applied(&view, &previous_price_id)
                            .await,
                    ),
                    None => lifecycle_disposition(
                        application_state
                            .lifecycle
                            .on_subscription_plan_changed(&view, event.data.previous_price_id())
                            .await,
                    ),
                }
            }

            "customer.subscription.deleted" => {
                let subscription: Subscription = event.object_as().map_err(malformed)?;
                let view = SubscriptionView::from_wire(&subscription);
                lifecycle_disposition(
                    application_state.lifecycle.on_subscription_cancelled(&view).await,
                )
            }

            "invoice.payment_succeeded" => {
                let invoice: Invoice = event.object_as().map_err(malformed)?;
                Self::route_renewal(application_state, &invoice).await
            }

            "invoice.paid" => {
                let invoice: Invoice = event.object_as().map_err(malformed)?;
                application_state
                    .topup
                    .handle_invoice_paid(&invoice)
                    .await
                    .map_err(ledger_fault)?;
                Ok("invoice_processed")
            }

            "payment_intent.succeeded" => {
                let intent: PaymentIntent = event.object_as().map_err(malformed)?;
                application_state
                    .topup
                    .handle_payment_intent_succeeded(&intent)
                    .await
                    .map_err(ledger_fault)?;
                Ok("payment_intent_processed")
            }

            "checkout.session.completed" => {
                let session: CheckoutSession = event.object_as().map_err(malformed)?;
                application_state
                    .topup
                    .handle_topup_checkout_completed(&session)
                    .await
                    .map_err(ledger_fault)?;
                Ok("checkout_processed")
            }

            _ => Ok("unhandled_event_type"),
        }
    }

    /// La renovación viaja como invoice.payment_succeeded con
    /// billing_reason = subscription_cycle; el alta tiene su propio
    /// evento y no debe re-otorgar aquí.
    async fn route_renewal(
        application_state: &AppState,
        invoice: &Invoice,
    ) -> Result<&'static str, WebhookFault> {
        if invoice.billing_reason.as_deref() != Some("subscription_cycle") {
            return Ok("non_cycle_invoice_ignored");
        }
        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Ok("invoice_without_subscription");
        };

        let Some(record) = application_state
            .mirror
            .find_subscription(subscription_id)
            .await
            .map_err(ledger_fault)?
        else {
            debug!("👻 [WEBHOOK]: Renewal for unmirrored subscription {}.", subscription_id);
            return Ok("unknown_subscription_ignored");
        };

        let view = SubscriptionView::from_mirror(&record);
        lifecycle_disposition(
            application_state.lifecycle.on_subscription_renewed(&view, &invoice.id).await,
        )
    }
}

enum WebhookFault {
    Replay(String),
    Malformed(String),
    Infrastructure(String),
}

fn malformed(decode_fault: serde_json::Error) -> WebhookFault {
    WebhookFault::Malformed(decode_fault.to_string())
}

fn ledger_fault(fault: LedgerError) -> WebhookFault {
    match fault {
        LedgerError::IdempotencyConflict(key) => WebhookFault::Replay(key),
        other => WebhookFault::Infrastructure(other.to_string()),
    }
}

fn lifecycle_disposition(
    result: Result<LifecycleOutcome, LifecycleError>,
) -> Result<&'static str, WebhookFault> {
    match result {
        Ok(LifecycleOutcome::Applied) => Ok("applied"),
        Ok(LifecycleOutcome::Skipped) => Ok("skipped"),
        Ok(LifecycleOutcome::Duplicate) => Ok("already_processed"),
        Err(LifecycleError::AlreadyProcessed(detail)) => Err(WebhookFault::Replay(detail)),
        Err(LifecycleError::Ledger(LedgerError::IdempotencyConflict(key))) => {
            Err(WebhookFault::Replay(key))
        }
        Err(LifecycleError::Ledger(other)) => Err(WebhookFault::Infrastructure(other.to_string())),
    }
}
