// [apps/orchestrator/src/bin/migrator.rs]
/*!
 * =================================================================
 * APARATO: LEDGER SCHEMA MIGRATOR (V4.0)
 * CLASIFICACIÓN: OPERATIONS BINARY (ESTRATO L0-OPS)
 * RESPONSABILIDAD: SOLIDIFICACIÓN DEL ESQUEMA EN FRÍO
 *
 * El cliente aplica el esquema idempotente al conectar; este binario
 * existe para ejecutar esa solidificación fuera del arranque del
 * servidor (pipelines de despliegue y bases locales nuevas).
 * =================================================================
 */

use dotenvy::dotenv;
use tesoro_infra_db::LedgerClient;
use tesoro_shared_heimdall::init_tracing;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing("tesoro_migrator");

    let database_connection_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            error!("❌ [MIGRATOR]: DATABASE_URL not defined in runtime environment.");
            std::process::exit(1);
        }
    };
    let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();
    let table_namespace = std::env::var("LEDGER_NAMESPACE").ok();

    match LedgerClient::connect(&database_connection_url, database_access_token, table_namespace)
        .await
    {
        Ok(client) => {
            info!("✅ [MIGRATOR]: Ledger schema leveled under namespace '{}'.", client.namespace());
        }
        Err(migration_fault) => {
            error!("❌ [MIGRATOR]: Schema solidification failed: {}", migration_fault);
            std::process::exit(1);
        }
    }
}
