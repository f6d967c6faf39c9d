// [apps/orchestrator/src/handlers/credits.rs]
/*!
 * =================================================================
 * APARATO: CREDITS API HANDLER (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: SUPERFICIE DE CONSULTA Y TOP-UP DEL LEDGER
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tesoro_domain_ledger::{HistoryFilter, WALLET_RESERVED_KEY};
use tracing::{error, instrument};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub key: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub user_id: String,
    pub key: String,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

pub struct CreditsHandler;

impl CreditsHandler {
    /**
     * Endpoint: GET /api/v1/credits/:user_id/balances
     * La clave reservada del monedero queda fuera de esta superficie.
     */
    #[instrument(skip(application_state))]
    pub async fn handle_get_balances(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
    ) -> impl IntoResponse {
        match application_state.credits.get_all_balances(&user_id, &[WALLET_RESERVED_KEY]).await {
            Ok(balances) => (StatusCode::OK, Json(json!({ "balances": balances }))).into_response(),
            Err(ledger_fault) => {
                error!("❌ [CREDITS_FAULT]: Balance read failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/credits/:user_id/history?key&limit&offset
     */
    #[instrument(skip(application_state, pagination))]
    pub async fn handle_get_history(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
        Query(pagination): Query<HistoryQuery>,
    ) -> impl IntoResponse {
        let filter = HistoryFilter {
            key: pagination.key,
            limit: pagination.limit.unwrap_or(50).min(200),
            offset: pagination.offset.unwrap_or(0),
        };

        match application_state.credits.get_history(&user_id, &filter).await {
            Ok(history) => (StatusCode::OK, Json(json!({ "history": history }))).into_response(),
            Err(ledger_fault) => {
                error!("❌ [CREDITS_FAULT]: History read failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: POST /api/v1/credits/topup
     * Los fallos de pago son datos del contrato, no errores HTTP.
     */
    #[instrument(skip(application_state, request))]
    pub async fn handle_top_up(
        State(application_state): State<AppState>,
        Json(request): Json<TopUpRequest>,
    ) -> impl IntoResponse {
        match application_state
            .topup
            .top_up(&request.user_id, &request.key, request.amount, request.idempotency_key)
            .await
        {
            Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
            Err(ledger_fault) => {
                error!("❌ [TOPUP_FAULT]: Ledger collapse during top-up: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
