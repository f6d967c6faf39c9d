// [tests/mirror/apps/orchestrator/handlers/webhook_dispatch.test.rs]
/**
 * =================================================================
 * APARATO: WEBHOOK DISPATCH TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DEL DESPACHO SOBRE LA TOPOLOGÍA AXUM
 * =================================================================
 */

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tesoro_domain_billing::BillingConfig;
use tesoro_domain_ledger::NoopEventSink;
use tesoro_infra_db::repositories::{CustomerRecord, SubscriptionRecord};
use tesoro_infra_db::LedgerClient;
use tesoro_infra_stripe::MockGateway;
use tesoro_orchestrator::routes::create_billing_router;
use tesoro_orchestrator::state::{AppState, BillingSettings};
use tower::ServiceExt;

const CATALOG_DOCUMENT: &str = r#"{
    "test": {
        "plans": [
            {
                "id": "plan_basic",
                "name": "Basic",
                "price": [
                    { "id": "price_basic", "amount": 999, "currency": "usd", "interval": "month" }
                ],
                "features": {
                    "api_calls": { "credits": { "allocation": 1000, "onRenewal": "reset" } }
                }
            }
        ]
    }
}"#;

async fn state(test_name: &str, api_access_token: Option<String>) -> AppState {
    let client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", test_name),
        None,
        None,
    )
    .await
    .expect("ledger ignition failed");

    AppState::assemble(
        client,
        Arc::new(MockGateway::new()),
        Arc::new(BillingConfig::from_json_str(CATALOG_DOCUMENT).unwrap()),
        BillingSettings::default(),
        Arc::new(NoopEventSink),
        api_access_token,
    )
}

async fn seed_subscriber(application_state: &AppState) {
    application_state
        .mirror
        .seed_customer(&CustomerRecord {
            id: "cus_001".to_string(),
            metadata: json!({ "user_id": "user_001" }),
            deleted: false,
            invoice_settings: json!({}),
        })
        .await
        .unwrap();
    application_state
        .mirror
        .seed_subscription(&SubscriptionRecord {
            id: "sub_001".to_string(),
            customer_id: "cus_001".to_string(),
            status: "active".to_string(),
            price_id: Some("price_basic".to_string()),
            item_id: Some("si_001".to_string()),
            quantity: 1,
            interval: "month".to_string(),
            current_period_start: Some(Utc::now()),
            current_period_end: Some(Utc::now() + Duration::days(30)),
            cancel_at_period_end: false,
            metadata: json!({}),
        })
        .await
        .unwrap();
}

fn subscription_created_event() -> Value {
    json!({
        "id": "evt_001",
        "type": "customer.subscription.created",
        "data": {
            "object": {
                "id": "sub_001",
                "customer": "cus_001",
                "status": "active",
                "items": {
                    "data": [{
                        "id": "si_001",
                        "quantity": 1,
                        "price": {
                            "id": "price_basic",
                            "unit_amount": 999,
                            "currency": "usd",
                            "recurring": { "interval": "month" }
                        }
                    }]
                },
                "metadata": {}
            }
        }
    })
}

async fn post_webhook(router: &axum::Router, event: &Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/webhooks/stripe")
                .header("content-type", "application/json")
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn certify_created_event_lands_credits_and_replays_ack() {
    let application_state = state("wh_created", None).await;
    seed_subscriber(&application_state).await;
    let router = create_billing_router(application_state.clone());

    let event = subscription_created_event();
    let (status, body) = post_webhook(&router, &event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(
        application_state.credits.get_balance("user_001", "api_calls").await.unwrap(),
        1000
    );

    // El reintento del receptor externo recibe 200, no re-otorga.
    let (replay_status, replay_body) = post_webhook(&router, &event).await;
    assert_eq!(replay_status, StatusCode::OK);
    assert_eq!(replay_body["outcome"], "already_processed");
    assert_eq!(
        application_state.credits.get_balance("user_001", "api_calls").await.unwrap(),
        1000
    );
}

#[tokio::test]
async fn certify_cycle_invoice_routes_to_renewal() {
    let application_state = state("wh_renewal", None).await;
    seed_subscriber(&application_state).await;
    let router = create_billing_router(application_state.clone());

    // Ciclo previo con consumo.
    let (status, _) = post_webhook(&router, &subscription_created_event()).await;
    assert_eq!(status, StatusCode::OK);
    application_state
        .credits
        .consume("user_001", "api_calls", 400, &Default::default())
        .await
        .unwrap();

    let renewal_event = json!({
        "id": "evt_002",
        "type": "invoice.payment_succeeded",
        "data": {
            "object": {
                "id": "in_cycle_01",
                "billing_reason": "subscription_cycle",
                "subscription": "sub_001",
                "amount_due": 999,
                "currency": "usd",
                "paid": true,
                "metadata": {}
            }
        }
    });

    let (status, body) = post_webhook(&router, &renewal_event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(
        application_state.credits.get_balance("user_001", "api_calls").await.unwrap(),
        1000
    );

    // La factura de alta (subscription_create) no re-otorga.
    let creation_invoice = json!({
        "id": "evt_003",
        "type": "invoice.payment_succeeded",
        "data": {
            "object": {
                "id": "in_create_01",
                "billing_reason": "subscription_create",
                "subscription": "sub_001",
                "amount_due": 999,
                "currency": "usd",
                "paid": true,
                "metadata": {}
            }
        }
    });
    let (_, body) = post_webhook(&router, &creation_invoice).await;
    assert_eq!(body["outcome"], "non_cycle_invoice_ignored");
}

#[tokio::test]
async fn certify_unknown_events_are_acknowledged() {
    let application_state = state("wh_unknown", None).await;
    let router = create_billing_router(application_state);

    let exotic_event = json!({
        "id": "evt_004",
        "type": "customer.tax_id.created",
        "data": { "object": { "id": "txi_001" } }
    });

    let (status, body) = post_webhook(&router, &exotic_event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unhandled_event_type");
}

#[tokio::test]
async fn certify_token_guard_protects_ledger_surface_not_webhooks() {
    let application_state = state("wh_guard", Some("secret_token".to_string())).await;
    seed_subscriber(&application_state).await;
    let router = create_billing_router(application_state);

    // La superficie del ledger exige el token.
    let denied = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/credits/user_001/balances")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/credits/user_001/balances")
                .header("authorization", "Bearer secret_token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    // Los webhooks entran sin token: su autenticidad es la firma.
    let (status, _) = post_webhook(&router, &subscription_created_event()).await;
    assert_eq!(status, StatusCode::OK);
}
