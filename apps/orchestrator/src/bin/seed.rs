// [apps/orchestrator/src/bin/seed.rs]
/*!
 * =================================================================
 * APARATO: LOCAL DEVELOPMENT SEEDER (V4.0)
 * CLASIFICACIÓN: OPERATIONS BINARY (ESTRATO L0-OPS)
 * RESPONSABILIDAD: SIEMBRA DE ESPEJO PARA DESARROLLO SIN REPLICADOR
 *
 * Crea un customer con método de pago, su vínculo user -> customer y
 * una suscripción activa sobre el primer plan del catálogo, para
 * ejercitar el motor completo contra una base local.
 * =================================================================
 */

use chrono::{Duration, Utc};
use dotenvy::dotenv;
use serde_json::json;
use tesoro_domain_billing::BillingConfig;
use tesoro_infra_db::repositories::{CustomerRecord, StripeMirrorRepository, SubscriptionRecord};
use tesoro_infra_db::LedgerClient;
use tesoro_shared_heimdall::init_tracing;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing("tesoro_seed");

    if let Err(seed_fault) = seed_mirror().await {
        error!("❌ [SEED]: {:#}", seed_fault);
        std::process::exit(1);
    }
}

async fn seed_mirror() -> anyhow::Result<()> {
    let database_connection_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "file:tesoro-dev.db".to_string());
    let table_namespace = std::env::var("LEDGER_NAMESPACE").ok();

    let catalog_path = std::env::var("BILLING_CONFIG_PATH")
        .unwrap_or_else(|_| "billing.config.json".to_string());
    let catalog_document = tokio::fs::read_to_string(&catalog_path).await?;
    let catalog = BillingConfig::from_json_str(&catalog_document)?;

    let plan = catalog
        .test
        .plans
        .first()
        .ok_or_else(|| anyhow::anyhow!("CATALOG_VOID: test environment declares no plans"))?;
    let price_point = plan
        .price
        .first()
        .ok_or_else(|| anyhow::anyhow!("CATALOG_VOID: plan '{}' has no price points", plan.name))?;

    let client =
        LedgerClient::connect(&database_connection_url, None, table_namespace).await?;
    let mirror = StripeMirrorRepository::new(client);

    mirror
        .seed_customer(&CustomerRecord {
            id: "cus_dev_001".to_string(),
            metadata: json!({ "user_id": "user_dev_001" }),
            deleted: false,
            invoice_settings: json!({ "default_payment_method": "pm_dev_001" }),
        })
        .await?;
    mirror.upsert_user_map("user_dev_001", "cus_dev_001").await?;

    mirror
        .seed_subscription(&SubscriptionRecord {
            id: "sub_dev_001".to_string(),
            customer_id: "cus_dev_001".to_string(),
            status: "active".to_string(),
            price_id: price_point.id.clone(),
            item_id: Some("si_dev_001".to_string()),
            quantity: 1,
            interval: price_point.interval.as_str().to_string(),
            current_period_start: Some(Utc::now()),
            current_period_end: Some(Utc::now() + Duration::days(30)),
            cancel_at_period_end: false,
            metadata: json!({}),
        })
        .await?;

    info!(
        "🌱 [SEED]: Mirror seeded: user_dev_001 -> cus_dev_001 on plan '{}' ({}).",
        plan.name,
        price_point.id.as_deref().unwrap_or("price sin id")
    );
    Ok(())
}
