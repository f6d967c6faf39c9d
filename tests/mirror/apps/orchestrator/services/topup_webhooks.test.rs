// [tests/mirror/apps/orchestrator/services/topup_webhooks.test.rs]
/**
 * =================================================================
 * APARATO: TOP-UP WEBHOOK HOOKS TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE GRANTS DIFERIDOS POR WEBHOOK
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::Arc;
use tesoro_domain_billing::{BillingConfig, GrantTarget};
use tesoro_domain_ledger::{sources, HistoryFilter, NoopEventSink};
use tesoro_infra_db::repositories::{CreditLedgerRepository, StripeMirrorRepository};
use tesoro_infra_db::LedgerClient;
use tesoro_infra_stripe::{
    CheckoutSession, Invoice, MockGateway, PaymentIntent, PaymentIntentStatus,
};
use tesoro_orchestrator::services::topup::TopUpEngine;
use tesoro_orchestrator::state::BillingSettings;

const CATALOG_DOCUMENT: &str = r#"{ "test": { "plans": [] } }"#;

struct Harness {
    credits: Arc<CreditLedgerRepository>,
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
    let engine = TopUpEngine::new(
        credits.clone(),
        mirror,
        Arc::new(MockGateway::new()),
        Arc::new(BillingConfig::from_json_str(CATALOG_DOCUMENT).unwrap()),
        Arc::new(BillingSettings { grant_to: GrantTarget::Subscriber, ..Default::default() }),
        Arc::new(NoopEventSink),
    );
    Harness { credits, engine }
}

fn topup_metadata(user_id: &str, key: &str, amount: i64, auto: bool) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("top_up_credit_type".to_string(), key.to_string());
    metadata.insert("top_up_amount".to_string(), amount.to_string());
    metadata.insert("user_id".to_string(), user_id.to_string());
    if auto {
        metadata.insert("top_up_auto".to_string(), "true".to_string());
    }
    metadata
}

fn intent(id: &str, status: PaymentIntentStatus, metadata: HashMap<String, String>) -> PaymentIntent {
    PaymentIntent {
        id: id.to_string(),
        status,
        amount: 1000,
        currency: "usd".to_string(),
        customer: Some("cus_001".to_string()),
        metadata,
    }
}

#[tokio::test]
async fn certify_payment_intent_succeeded_grants_once() {
    let harness = harness("hook_pi").await;

    let succeeded = intent(
        "pi_900",
        PaymentIntentStatus::Succeeded,
        topup_metadata("user_001", "api_calls", 500, false),
    );

    harness.engine.handle_payment_intent_succeeded(&succeeded).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 500);

    // Reentrega del mismo evento: no-op silencioso.
    harness.engine.handle_payment_intent_succeeded(&succeeded).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 500);

    let history = harness
        .credits
        .get_history("user_001", &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source, sources::TOPUP);
    assert_eq!(history[0].source_id.as_deref(), Some("pi_900"));
}

#[tokio::test]
async fn certify_foreign_payment_intents_are_ignored() {
    let harness = harness("hook_pi_foreign").await;

    // Sin metadata de top-up: evento ajeno.
    let foreign = intent("pi_901", PaymentIntentStatus::Succeeded, HashMap::new());
    harness.engine.handle_payment_intent_succeeded(&foreign).await.unwrap();

    // Con metadata pero sin estado succeeded: tampoco acredita.
    let unconfirmed = intent(
        "pi_902",
        PaymentIntentStatus::Processing,
        topup_metadata("user_001", "api_calls", 500, false),
    );
    harness.engine.handle_payment_intent_succeeded(&unconfirmed).await.unwrap();

    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 0);
}

#[tokio::test]
async fn certify_checkout_completed_requires_paid_status() {
    let harness = harness("hook_checkout").await;

    let mut session = CheckoutSession {
        id: "cs_700".to_string(),
        url: None,
        payment_status: Some("unpaid".to_string()),
        customer: Some("cus_001".to_string()),
        metadata: topup_metadata("user_001", "api_calls", 250, false),
    };

    // Sesión sin pagar: nada.
    harness.engine.handle_topup_checkout_completed(&session).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 0);

    // Sesión pagada: acredita una sola vez.
    session.payment_status = Some("paid".to_string());
    harness.engine.handle_topup_checkout_completed(&session).await.unwrap();
    harness.engine.handle_topup_checkout_completed(&session).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 250);
}

#[tokio::test]
async fn certify_invoice_paid_distinguishes_auto_source() {
    let harness = harness("hook_invoice").await;

    let manual_invoice = Invoice {
        id: "in_500".to_string(),
        status: Some("paid".to_string()),
        customer: Some("cus_001".to_string()),
        amount_due: 1000,
        currency: "usd".to_string(),
        hosted_invoice_url: None,
        paid: true,
        billing_reason: Some("manual".to_string()),
        subscription: None,
        metadata: topup_metadata("user_001", "api_calls", 500, false),
    };
    harness.engine.handle_invoice_paid(&manual_invoice).await.unwrap();

    let auto_invoice = Invoice {
        id: "in_501".to_string(),
        metadata: topup_metadata("user_001", "api_calls", 300, true),
        ..manual_invoice.clone()
    };
    harness.engine.handle_invoice_paid(&auto_invoice).await.unwrap();

    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 800);

    // La fuente del asiento distingue manual de automático.
    let history = harness
        .credits
        .get_history("user_001", &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history[0].source, sources::AUTO_TOPUP);
    assert_eq!(history[1].source, sources::TOPUP);

    // Factura sin metadata de top-up: ignorada.
    let foreign_invoice = Invoice { id: "in_502".to_string(), metadata: HashMap::new(), ..manual_invoice };
    harness.engine.handle_invoice_paid(&foreign_invoice).await.unwrap();
    assert_eq!(harness.credits.get_balance("user_001", "api_calls").await.unwrap(), 800);
}
