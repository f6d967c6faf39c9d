// [apps/orchestrator/src/handlers/subscriptions.rs]
/*!
 * =================================================================
 * APARATO: SUBSCRIPTIONS API HANDLER (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: ESTADO DE SUSCRIPCIÓN PARA LA API EXTERIOR
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{error, instrument};

pub struct SubscriptionsHandler;

impl SubscriptionsHandler {
    /**
     * Endpoint: GET /api/v1/subscriptions/:user_id
     */
    #[instrument(skip(application_state))]
    pub async fn handle_get_subscription(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
    ) -> impl IntoResponse {
        match application_state.subscriptions.get(&user_id).await {
            Ok(subscription) => {
                (StatusCode::OK, Json(json!({ "subscription": subscription }))).into_response()
            }
            Err(ledger_fault) => {
                error!("❌ [SUBSCRIPTIONS_FAULT]: Read failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/subscriptions/:user_id/list
     */
    #[instrument(skip(application_state))]
    pub async fn handle_list_subscriptions(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
    ) -> impl IntoResponse {
        match application_state.subscriptions.list(&user_id).await {
            Ok(subscriptions) => {
                (StatusCode::OK, Json(json!({ "subscriptions": subscriptions }))).into_response()
            }
            Err(ledger_fault) => {
                error!("❌ [SUBSCRIPTIONS_FAULT]: List failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/subscriptions/:user_id/active
     */
    #[instrument(skip(application_state))]
    pub async fn handle_is_active(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
    ) -> impl IntoResponse {
        match application_state.subscriptions.is_active(&user_id).await {
            Ok(active) => (StatusCode::OK, Json(json!({ "active": active }))).into_response(),
            Err(ledger_fault) => {
                error!("❌ [SUBSCRIPTIONS_FAULT]: Active check failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
