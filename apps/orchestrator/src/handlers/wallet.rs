// [apps/orchestrator/src/handlers/wallet.rs]
/*!
 * =================================================================
 * APARATO: WALLET API HANDLER (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: SUPERFICIE DE CONSULTA DEL MONEDERO
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
use tracing::{error, instrument};

#[derive(Debug, Deserialize)]
pub struct WalletHistoryQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub struct WalletHandler;

impl WalletHandler {
    /**
     * Endpoint: GET /api/v1/wallet/:user_id
     * Sin fila de balance el monedero simplemente no existe (null).
     */
    #[instrument(skip(application_state))]
    pub async fn handle_get_balance(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
    ) -> impl IntoResponse {
        match application_state.wallet.get_balance(&user_id).await {
            Ok(balance) => (StatusCode::OK, Json(json!({ "wallet": balance }))).into_response(),
            Err(ledger_fault) => {
                error!("❌ [WALLET_FAULT]: Balance read failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/wallet/:user_id/history?limit&offset
     */
    #[instrument(skip(application_state, pagination))]
    pub async fn handle_get_history(
        State(application_state): State<AppState>,
        Path(user_id): Path<String>,
        Query(pagination): Query<WalletHistoryQuery>,
    ) -> impl IntoResponse {
        let limit = pagination.limit.unwrap_or(50).min(200);
        let offset = pagination.offset.unwrap_or(0);

        match application_state.wallet.get_history(&user_id, limit, offset).await {
            Ok(history) => (StatusCode::OK, Json(json!({ "history": history }))).into_response(),
            Err(ledger_fault) => {
                error!("❌ [WALLET_FAULT]: History read failed: {}", ledger_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
