// [apps/orchestrator/src/handlers/seats.rs]
/*!
 * =================================================================
 * APARATO: SEATS API HANDLER (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: ALTA Y BAJA DE USUARIOS-ASIENTO
 * =================================================================
 */

use crate::services::seats::SeatError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, instrument};

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub user_id: String,
    pub org_id: String,
}

pub struct SeatsHandler;

impl SeatsHandler {
    /**
     * Endpoint: POST /api/v1/seats/add
     */
    #[instrument(skip(application_state, request))]
    pub async fn handle_add_seat(
        State(application_state): State<AppState>,
        Json(request): Json<SeatRequest>,
    ) -> impl IntoResponse {
        match application_state.seats.add(&request.user_id, &request.org_id).await {
            Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
            Err(seat_fault) => seat_fault_response(seat_fault),
        }
    }

    /**
     * Endpoint: POST /api/v1/seats/remove
     */
    #[instrument(skip(application_state, request))]
    pub async fn handle_remove_seat(
        State(application_state): State<AppState>,
        Json(request): Json<SeatRequest>,
    ) -> impl IntoResponse {
        match application_state.seats.remove(&request.user_id, &request.org_id).await {
            Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
            Err(seat_fault) => seat_fault_response(seat_fault),
        }
    }
}

fn seat_fault_response(fault: SeatError) -> axum::response::Response {
    let status = match &fault {
        SeatError::OrgWithoutCustomer | SeatError::SeatNotFound => StatusCode::NOT_FOUND,
        SeatError::NoActiveSubscription | SeatError::SeatTakenElsewhere => StatusCode::CONFLICT,
        SeatError::Ledger(_) | SeatError::Gateway(_) => {
            error!("❌ [SEATS_FAULT]: {}", fault);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "success": false, "error": fault.to_string() }))).into_response()
}
