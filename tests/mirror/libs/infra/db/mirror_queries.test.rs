// [tests/mirror/libs/infra/db/mirror_queries.test.rs]
/**
 * =================================================================
 * APARATO: STRIPE MIRROR QUERIES TEST (V4.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE LECTURAS DEL ESPEJO REPLICADO
 * =================================================================
 */

use chrono::{Duration, Utc};
use serde_json::json;
use tesoro_infra_db::repositories::{
    CustomerRecord, PriceRecord, StripeMirrorRepository, SubscriptionRecord,
};
use tesoro_infra_db::LedgerClient;

async fn mirror(test_name: &str) -> StripeMirrorRepository {
    let client = LedgerClient::connect(
        &format!("file:{}?mode=memory&cache=shared", test_name),
        None,
        None,
    )
    .await
    .expect("ledger ignition failed");
    StripeMirrorRepository::new(client)
}

fn subscription(id: &str, customer: &str, status: &str, days_out: i64) -> SubscriptionRecord {
    SubscriptionRecord {
        id: id.to_string(),
        customer_id: customer.to_string(),
        status: status.to_string(),
        price_id: Some("price_basic_month".to_string()),
        item_id: Some(format!("si_{}", id)),
        quantity: 1,
        interval: "month".to_string(),
        current_period_start: Some(Utc::now() - Duration::days(30)),
        current_period_end: Some(Utc::now() + Duration::days(days_out)),
        cancel_at_period_end: false,
        metadata: json!({}),
    }
}

#[tokio::test]
async fn certify_customer_record_projection() {
    let repository = mirror("mirror_customer").await;

    repository
        .seed_customer(&CustomerRecord {
            id: "cus_1".to_string(),
            metadata: json!({ "user_id": "user_1" }),
            deleted: false,
            invoice_settings: json!({ "default_payment_method": "pm_1" }),
        })
        .await
        .unwrap();

    let customer = repository.find_customer("cus_1").await.unwrap().unwrap();
    assert_eq!(customer.mapped_user_id(), Some("user_1"));
    assert_eq!(customer.default_payment_method(), Some("pm_1"));
    assert!(!customer.deleted);

    assert!(repository.find_customer("cus_ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn certify_user_resolution_metadata_first_then_map() {
    let repository = mirror("mirror_user_resolution").await;

    // Customer con user_id sellado por el checkout en la metadata.
    repository
        .seed_customer(&CustomerRecord {
            id: "cus_meta".to_string(),
            metadata: json!({ "user_id": "user_meta" }),
            deleted: false,
            invoice_settings: json!({}),
        })
        .await
        .unwrap();
    assert_eq!(
        repository.user_for_customer("cus_meta").await.unwrap().as_deref(),
        Some("user_meta")
    );

    // Customer sin metadata: el mapa inverso resuelve.
    repository
        .seed_customer(&CustomerRecord {
            id: "cus_mapped".to_string(),
            metadata: json!({}),
            deleted: false,
            invoice_settings: json!({}),
        })
        .await
        .unwrap();
    repository.upsert_user_map("user_mapped", "cus_mapped").await.unwrap();
    assert_eq!(
        repository.user_for_customer("cus_mapped").await.unwrap().as_deref(),
        Some("user_mapped")
    );
    assert_eq!(
        repository.customer_for_user("user_mapped").await.unwrap().as_deref(),
        Some("cus_mapped")
    );

    // Desconocidos: None, jamás error.
    assert!(repository.user_for_customer("cus_void").await.unwrap().is_none());
}

#[tokio::test]
async fn certify_active_subscription_selection() {
    let repository = mirror("mirror_active_sub").await;

    repository.seed_subscription(&subscription("sub_old", "cus_2", "canceled", -5)).await.unwrap();
    repository.seed_subscription(&subscription("sub_live", "cus_2", "active", 25)).await.unwrap();
    repository.seed_subscription(&subscription("sub_trial", "cus_2", "trialing", 10)).await.unwrap();

    // La lista llega ordenada por fin de período descendente.
    let all = repository.subscriptions_for_customer("cus_2").await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, "sub_live");

    // active|trialing cuentan como activas; la más reciente manda.
    let active = repository.active_subscription_for_customer("cus_2").await.unwrap().unwrap();
    assert_eq!(active.id, "sub_live");
    assert!(active.is_active());

    assert!(repository.active_subscription_for_customer("cus_void").await.unwrap().is_none());
}

#[tokio::test]
async fn certify_price_record_lookup() {
    let repository = mirror("mirror_price").await;

    repository
        .seed_price(&PriceRecord {
            id: "price_free".to_string(),
            product_id: Some("prod_free".to_string()),
            unit_amount: Some(0),
            currency: "usd".to_string(),
            interval: "month".to_string(),
        })
        .await
        .unwrap();

    let price = repository.find_price("price_free").await.unwrap().unwrap();
    assert_eq!(price.unit_amount, Some(0));
    assert!(repository.find_price("price_ghost").await.unwrap().is_none());
}
