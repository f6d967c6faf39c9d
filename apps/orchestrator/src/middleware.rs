// [apps/orchestrator/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: PERIMETER TOKEN GUARD (V4.0)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: VALIDACIÓN DEL TOKEN SIMÉTRICO DE LA API
 *
 * Sin token configurado la superficie queda abierta (desarrollo
 * local y Proving Grounds). Los webhooks no pasan por aquí: su
 * autenticidad la decide la verificación de firma aguas arriba.
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

pub async fn token_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_token) = application_state.api_access_token.as_deref() else {
        return next.run(request).await;
    };

    let supplied_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match supplied_token {
        Some(token) if token == expected_token => next.run(request).await,
        _ => {
            warn!("⛔ [ACCESS_DENIED]: API token missing or mismatched.");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "INVALID_API_TOKEN" })),
            )
                .into_response()
        }
    }
}
