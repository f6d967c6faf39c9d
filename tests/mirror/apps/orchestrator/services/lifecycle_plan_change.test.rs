// [tests/mirror/apps/orchestrator/services/lifecycle_plan_change.test.rs]
/**
 * =================================================================
 * APARATO: LIFECYCLE PLAN CHANGE TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE UPGRADES Y DOWNGRADE DIFERIDO
 * =================================================================
 */

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tesoro_domain_billing::{BillingConfig, BillingInterval, GrantTarget};
use tesoro_domain_ledger::{DeltaMetadata, NoopEventSink};
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
                "id": "plan_free",
                "name": "Free",
                "price": [
                    { "id": "price_free", "amount": 0, "currency": "usd", "interval": "month" }
                ],
                "features": {
                    "api_calls": { "credits": { "allocation": 100 } }
                }
            },
            {
                "id": "plan_basic",
                "name": "Basic",
                "price": [
                    { "id": "price_basic", "amount": 999, "currency": "usd", "interval": "month" }
                ],
                "features": {
                    "api_calls": { "credits": { "allocation": 1000, "onRenewal": "reset" } }
                }
            },
            {
                "id": "plan_pro",
                "name": "Pro",
                "price": [
                    { "id": "price_pro", "amount": 4900, "currency": "usd", "interval": "month" }
                ],
                "features": {
                    "api_calls": { "credits": { "allocation": 10000, "onRenewal": "reset" } },
                    "storage_gb": { "credits": { "allocation": 100, "onRenewal": "reset" } }
                }
            }
        ]
    }
}"#;

struct Harness {
    credits: Arc<CreditLedgerRepository>,
    mirror: Arc<StripeMirrorRepository>,
    applier: LifecycleApplier,
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
    let mirror = Arc::new(StripeMirrorRepository::new(client.clone()));
    let seats = Arc::new(SeatRepository::new(client));
    let catalog = Arc::new(BillingConfig::from_json_str(CATALOG_DOCUMENT).unwrap());
    let settings =
        Arc::new(BillingSettings { grant_to: GrantTarget::Subscriber, ..Default::default() });

    let applier = LifecycleApplier::new(
        credits.clone(),
        mirror.clone(),
        seats,
        catalog,
        settings,
        Arc::new(NoopEventSink),
    );

    Harness { credits, mirror, applier }
}

async fn seed_user(harness: &Harness) {
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
}

fn changed_view(price_id: &str, metadata_pairs: &[(&str, &str)]) -> SubscriptionView {
    let mut metadata = HashMap::new();
    for (key, value) in metadata_pairs {
        metadata.insert(key.to_string(), value.to_string());
    }
    SubscriptionView {
        id: "sub_001".to_string(),
        customer_id: "cus_001".to_string(),
        price_id: Some(price_id.to_string()),
        interval: BillingInterval::Month,
        metadata,
    }
}

#[tokio::test]
async fn certify_paid_to_paid_upgrade_adds_on_top() {
    let harness = harness("lc_upgrade_paid").await;
    seed_user(&harness).await;

    // Usuario en Basic con 300 consumidos: saldo 700.
    harness
        .credits
        .grant("user_001", "api_calls", 1000, &DeltaMetadata::default())
        .await
        .unwrap();
    harness
        .credits
        .consume("user_001", "api_calls", 300, &DeltaMetadata::default())
        .await
        .unwrap();

    let view = changed_view("price_pro", &[("upgrade_from_price_amount", "999")]);
    let outcome = harness
        .applier
        .on_subscription_plan_changed(&view, Some("price_basic"))
        .await
        .unwrap();
    assert_eq!(outcome, LifecycleOutcome::Applied);

    // Los saldos existentes sobreviven y el plan nuevo suma encima;
    // la clave nueva entra completa.
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 10_700);
    assert_eq!(harness.credits.get_balance("user_001", "storage_gb").await.unwrap(), 100);
}

#[tokio::test]
async fn certify_free_to_paid_expires_then_grants_full() {
    let harness = harness("lc_upgrade_free").await;
    seed_user(&harness).await;

    // Remanente del plan gratuito.
    harness
        .credits
        .grant("user_001", "api_calls", 77, &DeltaMetadata::default())
        .await
        .unwrap();

    let view = changed_view("price_basic", &[("upgrade_from_price_amount", "0")]);
    harness
        .applier
        .on_subscription_plan_changed(&view, Some("price_free"))
        .await
        .unwrap();

    // El remanente gratuito expiró y el plan pago entró completo.
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 1000);
}

#[tokio::test]
async fn certify_free_detection_via_mirror_prices() {
    let harness = harness("lc_upgrade_mirror_price").await;
    seed_user(&harness).await;

    // Sin metadata de monto, el espejo de precios delata el plan
    // gratuito de origen.
    harness
        .mirror
        .seed_price(&tesoro_infra_db::repositories::PriceRecord {
            id: "price_unlisted_free".to_string(),
            product_id: None,
            unit_amount: Some(0),
            currency: "usd".to_string(),
            interval: "month".to_string(),
        })
        .await
        .unwrap();

    harness
        .credits
        .grant("user_001", "api_calls", 55, &DeltaMetadata::default())
        .await
        .unwrap();

    let view = changed_view("price_basic", &[]);
    harness
        .applier
        .on_subscription_plan_changed(&view, Some("price_unlisted_free"))
        .await
        .unwrap();

    // Tratado como free -> paid: sin claves del plan origen en
    // catálogo no hay nada que expirar, pero el plan nuevo entra.
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 55 + 1000);
}

#[tokio::test]
async fn certify_same_price_is_a_noop() {
    let harness = harness("lc_upgrade_same").await;
    seed_user(&harness).await;

    let view = changed_view("price_basic", &[("upgrade_from_price_id", "price_basic")]);
    let outcome = harness
        .applier
        .on_subscription_plan_changed(&view, Some("price_basic"))
        .await
        .unwrap();
    assert_eq!(outcome, LifecycleOutcome::Skipped);
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 0);
}

#[tokio::test]
async fn certify_scheduled_downgrade_defers_and_applies_at_period_end() {
    let harness = harness("lc_downgrade_deferred").await;
    seed_user(&harness).await;

    // Usuario en Pro con ambos saldos llenos.
    harness
        .credits
        .grant("user_001", "api_calls", 10_000, &DeltaMetadata::default())
        .await
        .unwrap();
    harness
        .credits
        .grant("user_001", "storage_gb", 100, &DeltaMetadata::default())
        .await
        .unwrap();

    // Fase 1: el evento marcado como downgrade pendiente no toca nada.
    let pending = changed_view("price_basic", &[("pending_credit_downgrade", "true")]);
    let outcome = harness
        .applier
        .on_subscription_plan_changed(&pending, Some("price_pro"))
        .await
        .unwrap();
    assert_eq!(outcome, LifecycleOutcome::Skipped);
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 10_000);

    // Fase 2: el downgrade aplicado reinicia las claves del plan nuevo
    // y revoca las huérfanas.
    let applied = changed_view("price_basic", &[("downgrade_from_price", "price_pro")]);
    harness.applier.on_downgrade_applied(&applied, "price_pro").await.unwrap();

    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 1000);
    assert_eq!(harness.credits.get_balance("user_001", "storage_gb").await.unwrap(), 0);
}
