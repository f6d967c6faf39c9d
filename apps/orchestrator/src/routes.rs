// INICIO DEL ARCHIVO [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V4.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: TOPOLOGÍA DE RED DEL MOTOR DE FACTURACIÓN
 *
 * Dos estratos: el receptor de webhooks (sin guardia de token; la
 * verificación de firma vive aguas arriba) y la superficie API del
 * ledger, protegida por el guardia perimetral cuando hay token.
 * =================================================================
 */

use crate::handlers::{
    checkout::CheckoutHandler, credits::CreditsHandler, seats::SeatsHandler,
    subscriptions::SubscriptionsHandler, wallet::WalletHandler, webhooks::WebhookHandler,
};
use crate::middleware::token_guard;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_billing_router(application_shared_state: AppState) -> Router {
    // Escudo de red: CORS para el dashboard y herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE INGESTA: Webhooks del procesador.
    let webhook_stratum = Router::new()
        .route("/stripe", post(WebhookHandler::handle_stripe_event));

    // ESTRATO DE SUPERFICIE: API del ledger para la aplicación.
    let ledger_api_stratum = Router::new()
        .route("/credits/:user_id/balances", get(CreditsHandler::handle_get_balances))
        .route("/credits/:user_id/history", get(CreditsHandler::handle_get_history))
        .route("/credits/topup", post(CreditsHandler::handle_top_up))
        .route("/wallet/:user_id", get(WalletHandler::handle_get_balance))
        .route("/wallet/:user_id/history", get(WalletHandler::handle_get_history))
        .route("/billing/checkout", post(CheckoutHandler::handle_create_checkout))
        .route("/billing/portal", post(CheckoutHandler::handle_create_portal))
        .route("/seats/add", post(SeatsHandler::handle_add_seat))
        .route("/seats/remove", post(SeatsHandler::handle_remove_seat))
        .route("/subscriptions/:user_id", get(SubscriptionsHandler::handle_get_subscription))
        .route("/subscriptions/:user_id/list", get(SubscriptionsHandler::handle_list_subscriptions))
        .route("/subscriptions/:user_id/active", get(SubscriptionsHandler::handle_is_active))
        .layer(middleware::from_fn_with_state(
            application_shared_state.clone(),
            token_guard,
        ));

    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest("/api/v1/webhooks", webhook_stratum)
        .nest("/api/v1", ledger_api_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/orchestrator/src/routes.rs]
