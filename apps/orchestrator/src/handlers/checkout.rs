// [apps/orchestrator/src/handlers/checkout.rs]
/*!
 * =================================================================
 * APARATO: CHECKOUT & PORTAL HANDLER (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: SESIONES ALOJADAS DE ALTA Y AUTOGESTIÓN
 *
 * Plomería delgada: delega en el gateway y devuelve la URL. El núcleo
 * contable entra en juego recién cuando el webhook confirma.
 * =================================================================
 */

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tesoro_infra_stripe::CreateCheckoutSession;
use tracing::{error, instrument};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub price_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub user_id: String,
}

pub struct CheckoutHandler;

impl CheckoutHandler {
    /**
     * Endpoint: POST /api/v1/billing/checkout
     * Sesión de suscripción para un price_id del catálogo.
     */
    #[instrument(skip(application_state, request))]
    pub async fn handle_create_checkout(
        State(application_state): State<AppState>,
        Json(request): Json<CheckoutRequest>,
    ) -> impl IntoResponse {
        if application_state
            .catalog
            .resolve_plan_by_price_id(&request.price_id, application_state.settings.active_env)
            .is_none()
        {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "UNKNOWN_PRICE", "price_id": request.price_id })),
            )
                .into_response();
        }

        let customer = match application_state.mirror.customer_for_user(&request.user_id).await {
            Ok(customer) => customer,
            Err(ledger_fault) => {
                error!("❌ [CHECKOUT_FAULT]: Customer lookup failed: {}", ledger_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), request.user_id.clone());

        let session_request = CreateCheckoutSession {
            customer,
            mode: "subscription".to_string(),
            subscription_price_id: Some(request.price_id.clone()),
            line_items: Vec::new(),
            success_url: application_state.settings.checkout_success_url.clone(),
            cancel_url: application_state.settings.checkout_cancel_url.clone(),
            metadata,
        };

        match application_state.payment_gateway.create_checkout_session(session_request).await {
            Ok(session) => {
                (StatusCode::OK, Json(json!({ "id": session.id, "url": session.url })))
                    .into_response()
            }
            Err(gateway_fault) => {
                error!("❌ [CHECKOUT_FAULT]: Session creation failed: {}", gateway_fault);
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }

    /**
     * Endpoint: POST /api/v1/billing/portal
     */
    #[instrument(skip(application_state, request))]
    pub async fn handle_create_portal(
        State(application_state): State<AppState>,
        Json(request): Json<PortalRequest>,
    ) -> impl IntoResponse {
        let customer_id = match application_state.mirror.customer_for_user(&request.user_id).await
        {
            Ok(Some(customer_id)) => customer_id,
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "USER_NOT_FOUND" })),
                )
                    .into_response()
            }
            Err(ledger_fault) => {
                error!("❌ [PORTAL_FAULT]: Customer lookup failed: {}", ledger_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        match application_state
            .payment_gateway
            .create_portal_session(&customer_id, &application_state.settings.portal_return_url)
            .await
        {
            Ok(session) => (StatusCode::OK, Json(json!({ "url": session.url }))).into_response(),
            Err(gateway_fault) => {
                error!("❌ [PORTAL_FAULT]: Session creation failed: {}", gateway_fault);
                StatusCode::BAD_GATEWAY.into_response()
            }
        }
    }
}
