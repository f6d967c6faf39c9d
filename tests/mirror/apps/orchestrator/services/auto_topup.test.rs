// [tests/mirror/apps/orchestrator/services/auto_topup.test.rs]
/**
 * =================================================================
 * APARATO: AUTO TOP-UP TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DEL UMBRAL ESTRICTO Y TOPE MENSUAL
 * =================================================================
 */

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tesoro_domain_billing::{BillingConfig, GrantTarget};
use tesoro_domain_ledger::{AutoTopUpFailure, CreditEventSink};
use tesoro_infra_db::repositories::{
    CreditLedgerRepository, CustomerRecord, StripeMirrorRepository, SubscriptionRecord,
};
use tesoro_infra_db::LedgerClient;
use tesoro_infra_stripe::MockGateway;
use tesoro_orchestrator::services::topup::TopUpEngine;
use tesoro_orchestrator::state::BillingSettings;

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
                    "api_calls": {
                        "credits": { "allocation": 1000, "onRenewal": "reset" },
                        "pricePerCredit": 2,
                        "autoTopUp": { "threshold": 500, "amount": 1000, "maxPerMonth": 3 }
                    },
                    "storage_gb": { "credits": { "allocation": 50 } }
                }
            }
        ]
    }
}"#;

/// Receptor de evidencia: captura los diagnósticos de no-disparo.
#[derive(Default)]
struct RecordingSink {
    failures: Mutex<Vec<AutoTopUpFailure>>,
}

impl CreditEventSink for RecordingSink {
    fn on_auto_top_up_failed(&self, failure: &AutoTopUpFailure) {
        self.failures.lock().unwrap().push(failure.clone());
    }
}

struct Harness {
    credits: Arc<CreditLedgerRepository>,
    mirror: Arc<StripeMirrorRepository>,
    gateway: Arc<MockGateway>,
    sink: Arc<RecordingSink>,
    engine: TopUpEngine,
}

async fn harness(test_name: &str) -> Harness {
    let client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", test_name),
        None,
        None,
    )
    .await
    .expect("ledger ignition failed");

    let credits = Arc::new(CreditLedgerRepository::new(client.clone()));
    let mirror = Arc::new(StripeMirrorRepository::new(client));
    let gateway = Arc::new(MockGateway::new());
    let sink = Arc::new(RecordingSink::default());
    let engine = TopUpEngine::new(
        credits.clone(),
        mirror.clone(),
        gateway.clone(),
        Arc::new(BillingConfig::from_json_str(CATALOG_DOCUMENT).unwrap()),
        Arc::new(BillingSettings { grant_to: GrantTarget::Subscriber, ..Default::default() }),
        sink.clone(),
    );

    Harness { credits, mirror, gateway, sink, engine }
}

async fn seed_subscriber(harness: &Harness, with_payment_method: bool) {
    let invoice_settings = if with_payment_method {
        json!({ "default_payment_method": "pm_001" })
    } else {
        json!({})
    };
    harness
        .mirror
        .seed_customer(&CustomerRecord {
            id: "cus_001".to_string(),
            metadata: json!({ "user_id": "user_001" }),
            deleted: false,
            invoice_settings,
        })
        .await
        .unwrap();
    harness.mirror.upsert_user_map("user_001", "cus_001").await.unwrap();
    harness
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

#[tokio::test]
async fn certify_threshold_is_strict() {
    let harness = harness("auto_threshold").await;
    seed_subscriber(&harness, true).await;

    // En el umbral exacto NO dispara.
    let at_threshold = harness
        .engine
        .trigger_auto_top_up_if_needed("user_001", "api_calls", 500)
        .await
        .unwrap();
    assert!(!at_threshold.triggered);
    assert_eq!(at_threshold.reason.as_deref(), Some("balance_above_threshold"));

    // El umbral estricto tampoco alimenta el canal de fallos.
    assert!(harness.sink.failures.lock().unwrap().is_empty());

    // Un crédito por debajo, dispara.
    let below = harness
        .engine
        .trigger_auto_top_up_if_needed("user_001", "api_calls", 499)
        .await
        .unwrap();
    assert!(below.triggered);
    assert_eq!(below.status.as_deref(), Some("succeeded"));
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 1000);
}

#[tokio::test]
async fn certify_monthly_cap_counts_only_auto_source() {
    let harness = harness("auto_monthly_cap").await;
    seed_subscriber(&harness, true).await;

    // Un top-up manual previo no debe descontar del cupo automático.
    harness.engine.top_up("user_001", "api_calls", 500, None).await.unwrap();

    // Tres disparos automáticos consecutivos dentro del mes.
    for expected_round in 1..=3 {
        let outcome = harness
            .engine
            .trigger_auto_top_up_if_needed("user_001", "api_calls", 100)
            .await
            .unwrap();
        assert!(outcome.triggered, "round {} should have fired", expected_round);
    }

    // El cuarto choca con el tope mensual.
    let capped = harness
        .engine
        .trigger_auto_top_up_if_needed("user_001", "api_calls", 100)
        .await
        .unwrap();
    assert!(!capped.triggered);
    assert_eq!(capped.reason.as_deref(), Some("max_per_month_reached"));

    // Tres cargos automáticos + el manual = saldo 500 + 3000.
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 3500);

    // El tope sí alimenta el canal de diagnóstico.
    let failures = harness.sink.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason, "max_per_month_reached");
}

#[tokio::test]
async fn certify_policy_ladder_reasons() {
    let harness = harness("auto_ladder").await;

    // Usuario sin customer.
    let unknown = harness
        .engine
        .trigger_auto_top_up_if_needed("ghost", "api_calls", 100)
        .await
        .unwrap();
    assert_eq!(unknown.reason.as_deref(), Some("user_not_found"));

    // Clave sin autoTopUp configurado: razón sin canal de fallo.
    seed_subscriber(&harness, true).await;
    let unconfigured = harness
        .engine
        .trigger_auto_top_up_if_needed("user_001", "storage_gb", 0)
        .await
        .unwrap();
    assert_eq!(unconfigured.reason.as_deref(), Some("not_configured"));

    // user_not_found alimenta el canal; not_configured no.
    let failures = harness.sink.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason, "user_not_found");
}

#[tokio::test]
async fn certify_missing_payment_method_blocks_and_notifies() {
    let harness = harness("auto_no_pm").await;
    seed_subscriber(&harness, false).await;

    let outcome = harness
        .engine
        .trigger_auto_top_up_if_needed("user_001", "api_calls", 100)
        .await
        .unwrap();
    assert!(!outcome.triggered);
    assert_eq!(outcome.reason.as_deref(), Some("no_payment_method"));
    assert_eq!(harness.sink.failures.lock().unwrap().len(), 1);
    assert_eq!(harness.gateway.created_intents().len(), 0);
}

#[tokio::test]
async fn certify_cycle_retry_reuses_processor_charge() {
    let harness = harness("auto_cycle_retry").await;
    seed_subscriber(&harness, true).await;

    // Primer disparo del ciclo.
    let first = harness
        .engine
        .trigger_auto_top_up_if_needed("user_001", "api_calls", 100)
        .await
        .unwrap();
    assert!(first.triggered);

    // El asiento quedó sellado con fuente auto_topup; un segundo
    // disparo del mismo ciclo avanza el contador y cobra de nuevo
    // solo porque el saldo sigue bajo el umbral (contador 1 -> clave
    // nueva). La clave sembrada por contador garantiza que un retry
    // del MISMO disparo (contador idéntico) reutilice el cargo.
    let intents_after_first = harness.gateway.created_intents().len();
    assert_eq!(intents_after_first, 1);
    assert!(harness.gateway.created_intents()[0]
        .idempotency_key
        .as_deref()
        .unwrap()
        .starts_with("auto_topup:user_001:api_calls:"));
}
