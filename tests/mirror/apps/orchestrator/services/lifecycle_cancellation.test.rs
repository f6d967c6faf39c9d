// [tests/mirror/apps/orchestrator/services/lifecycle_cancellation.test.rs]
/**
 * =================================================================
 * APARATO: LIFECYCLE CANCELLATION TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE LA REVOCACIÓN POR PÉRDIDA DE SERVICIO
 * =================================================================
 */

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tesoro_domain_billing::{BillingConfig, BillingInterval, GrantTarget};
use tesoro_domain_ledger::{sources, DeltaMetadata, NoopEventSink};
use tesoro_infra_db::repositories::{
    CreditLedgerRepository, CustomerRecord, SeatRepository, StripeMirrorRepository,
};
use tesoro_infra_db::LedgerClient;
use tesoro_orchestrator::services::lifecycle::{
    LifecycleApplier, LifecycleOutcome, SubscriptionView,
};
use tesoro_orchestrator::state::BillingSettings;

const CATALOG_DOCUMENT: &str = r#"{
    "test": {
        "plans": [
            {
                "id": "plan_basic",
                "name": "Basic",
                "price": [
                    { "id": "price_basic_year", "amount": 9990, "currency": "usd", "interval": "year" }
                ],
                "features": {
                    "api_calls": { "credits": { "allocation": 1000, "onRenewal": "reset" } }
                }
            }
        ]
    }
}"#;

struct Harness {
    credits: Arc<CreditLedgerRepository>,
    mirror: Arc<StripeMirrorRepository>,
    seats: Arc<SeatRepository>,
    applier: LifecycleApplier,
}

async fn harness(test_name: &str, grant_to: GrantTarget) -> Harness {
    let client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", test_name),
        None,
        None,
    )
    .await
    .expect("ledger ignition failed");

    let credits = Arc::new(CreditLedgerRepository::new(client.clone()));
    let mirror = Arc::new(StripeMirrorRepository::new(client.clone()));
    let seats = Arc::new(SeatRepository::new(client));
    let catalog = Arc::new(BillingConfig::from_json_str(CATALOG_DOCUMENT).unwrap());
    let settings = Arc::new(BillingSettings { grant_to, ..Default::default() });

    let applier = LifecycleApplier::new(
        credits.clone(),
        mirror.clone(),
        seats.clone(),
        catalog,
        settings,
        Arc::new(NoopEventSink),
    );

    Harness { credits, mirror, seats, applier }
}

fn cancelled_view() -> SubscriptionView {
    SubscriptionView {
        id: "sub_001".to_string(),
        customer_id: "cus_001".to_string(),
        price_id: Some("price_basic_year".to_string()),
        interval: BillingInterval::Year,
        metadata: HashMap::new(),
    }
}

#[tokio::test]
async fn certify_yearly_lifecycle_cancellation_revokes_all_sources() {
    let harness = harness("lc_cancel_yearly", GrantTarget::Subscriber).await;
    harness
        .mirror
        .seed_customer(&CustomerRecord {
            id: "cus_001".to_string(),
            metadata: json!({ "user_id": "user_001" }),
            deleted: false,
            invoice_settings: json!({}),
        })
        .await
        .unwrap();

    // Alta anual: 1000 x 12.
    harness.applier.on_subscription_created(&cancelled_view()).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 12_000);

    // Top-up posterior, de otra fuente.
    let topup = DeltaMetadata {
        source: Some(sources::TOPUP.to_string()),
        source_id: Some("pi_777".to_string()),
        ..Default::default()
    };
    harness.credits.grant("user_001", "api_calls", 1000, &topup).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 13_000);

    // Cancelación: pérdida de servicio arrasa la clave completa,
    // top-ups incluidos. Política única, sin partición por fuente.
    let outcome = harness.applier.on_subscription_cancelled(&cancelled_view()).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::Applied);
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 0);
}

#[tokio::test]
async fn certify_seat_mode_cancellation_sweeps_every_seat() {
    let harness = harness("lc_cancel_seats", GrantTarget::SeatUsers).await;

    harness.seats.insert_seat("user_seat_a", "sub_001").await.unwrap();
    harness.seats.insert_seat("user_seat_b", "sub_001").await.unwrap();
    harness
        .credits
        .grant("user_seat_a", "api_calls", 800, &DeltaMetadata::default())
        .await
        .unwrap();
    harness
        .credits
        .grant("user_seat_b", "api_calls", 300, &DeltaMetadata::default())
        .await
        .unwrap();

    harness.applier.on_subscription_cancelled(&cancelled_view()).await.unwrap();

    assert_eq!(harness.credits.get_balance("user_seat_a", "api_calls").await.unwrap(), 0);
    assert_eq!(harness.credits.get_balance("user_seat_b", "api_calls").await.unwrap(), 0);
}

#[tokio::test]
async fn certify_cancellation_of_unknown_plan_is_silent() {
    let harness = harness("lc_cancel_unknown", GrantTarget::Subscriber).await;

    let mut view = cancelled_view();
    view.price_id = Some("price_ghost".to_string());
    let outcome = harness.applier.on_subscription_cancelled(&view).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::Skipped);
}
