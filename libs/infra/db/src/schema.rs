// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: LEDGER DATABASE SCHEMA (V4.0 - NAMESPACE AWARE)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Todas las tablas llevan el prefijo de namespace configurable
 * (por defecto 'stripe'). Las tablas del espejo replican la forma
 * que el motor de replicación externo mantiene pobladas; el migrador
 * las crea también para desarrollo local y pruebas.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/// DDL del ledger y del espejo, en orden de dependencia.
fn ledger_tables(ns: &str) -> Vec<(String, String)> {
    vec![
        (
            format!("TABLE_{}_CREDIT_BALANCES", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_credit_balances (
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0,
            currency TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, key)
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_CREDIT_LEDGER", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_credit_ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            amount INTEGER NOT NULL,
            balance_after INTEGER NOT NULL,
            transaction_type TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'manual',
            source_id TEXT,
            description TEXT,
            currency TEXT,
            idempotency_key TEXT UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_IDEMPOTENCY_KEYS", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_idempotency_keys (
            key TEXT PRIMARY KEY,
            operation TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_CUSTOMERS", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_customers (
            id TEXT PRIMARY KEY,
            metadata_json TEXT NOT NULL DEFAULT '{{}}',
            deleted INTEGER NOT NULL DEFAULT 0,
            invoice_settings_json TEXT NOT NULL DEFAULT '{{}}'
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_SUBSCRIPTIONS", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_subscriptions (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            status TEXT NOT NULL,
            price_id TEXT,
            item_id TEXT,
            quantity INTEGER NOT NULL DEFAULT 1,
            interval TEXT NOT NULL DEFAULT 'month',
            current_period_start DATETIME,
            current_period_end DATETIME,
            cancel_at_period_end INTEGER NOT NULL DEFAULT 0,
            metadata_json TEXT NOT NULL DEFAULT '{{}}'
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_PRICES", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_prices (
            id TEXT PRIMARY KEY,
            product_id TEXT,
            unit_amount INTEGER,
            currency TEXT NOT NULL DEFAULT 'usd',
            interval TEXT NOT NULL DEFAULT 'month'
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_USER_MAP", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_user_map (
            user_id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL
        );
        "#
            ),
        ),
        (
            format!("TABLE_{}_SEAT_USERS", ns.to_uppercase()),
            format!(
                r#"
        CREATE TABLE IF NOT EXISTS {ns}_seat_users (
            user_id TEXT PRIMARY KEY,
            subscription_id TEXT NOT NULL,
            added_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "#
            ),
        ),
    ]
}

/// Índices de aceleración para el hot-path de historial y conteos.
fn ledger_indexes(ns: &str) -> Vec<String> {
    vec![
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ns}_ledger_user_key_created
             ON {ns}_credit_ledger(user_id, key, created_at DESC, id DESC);"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ns}_ledger_source
             ON {ns}_credit_ledger(user_id, key, source, created_at);"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ns}_subscriptions_customer
             ON {ns}_subscriptions(customer_id, status);"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ns}_seat_users_subscription
             ON {ns}_seat_users(subscription_id);"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ns}_user_map_customer
             ON {ns}_user_map(customer_id);"
        ),
    ]
}

/**
 * Solidifica el esquema completo del ledger bajo el namespace dado.
 * Toda sentencia es idempotente: re-ejecutar es un no-op estructural.
 */
#[instrument(skip(database_connection))]
pub async fn apply_ledger_schema(database_connection: &Connection, namespace: &str) -> Result<()> {
    for (table_label, create_statement) in ledger_tables(namespace) {
        database_connection
            .execute(&create_statement, ())
            .await
            .with_context(|| format!("SCHEMA_SOLIDIFICATION_FAULT at {}", table_label))?;
        debug!("🧱 [SCHEMA]: {} leveled.", table_label);
    }

    for index_statement in ledger_indexes(namespace) {
        database_connection
            .execute(&index_statement, ())
            .await
            .context("SCHEMA_INDEX_FAULT")?;
    }

    info!("🏛️ [SCHEMA]: Ledger strata solidified under namespace '{}'.", namespace);
    Ok(())
}
