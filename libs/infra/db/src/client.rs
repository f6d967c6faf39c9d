// INICIO DEL ARCHIVO [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: LEDGER CONNECTION CLIENT (V4.0 - MEMORY FIXED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES TÁCTICOS Y PERSISTENCIA ACID
 *
 * En modo RAM el cliente detecta URLs de memoria y aplica el ancla de
 * persistencia ANTES del bootstrap del esquema, asegurando que las
 * tablas residan en un segmento de memoria compartido entre hilos.
 * =================================================================
 */

use crate::errors::LedgerError;
use crate::schema::apply_ledger_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Prefijo de tablas por defecto (el "schema" configurable del ledger).
pub const DEFAULT_NAMESPACE: &str = "stripe";

#[derive(Clone)]
pub struct LedgerClient {
    internal_database_driver: Arc<Database>,
    /// Prefijo nominal de todas las tablas del ledger y del espejo.
    table_namespace: Arc<str>,
    /// Mantiene la base de datos viva en memoria evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
}

impl LedgerClient {
    #[instrument(skip(database_access_token))]
    pub async fn connect(
        database_connection_url: &str,
        database_access_token: Option<String>,
        table_namespace: Option<String>,
    ) -> Result<Self, LedgerError> {
        if database_connection_url.is_empty() {
            return Err(LedgerError::ConfigurationError("DATABASE_URL_UNDEFINED".into()));
        }

        let namespace = table_namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if !namespace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LedgerError::ConfigurationError(format!(
                "LEDGER_NAMESPACE_REJECTED: '{}' is not a valid table prefix",
                namespace
            )));
        }

        info!("🔌 [LEDGER]: Initiating tactical link to [{}] (namespace '{}')",
            database_connection_url, namespace);

        let is_remote = database_connection_url.starts_with("libsql://")
            || database_connection_url.starts_with("https://");

        let is_memory = database_connection_url.contains(":memory:")
            || database_connection_url.contains("mode=memory");

        let database_driver = if is_remote {
            let token = database_access_token.ok_or_else(|| {
                LedgerError::ConnectionError("SECURITY_FAULT: Remote access denied (token missing)".into())
            })?;
            Builder::new_remote(database_connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(database_connection_url).build().await
        }
        .map_err(|e| LedgerError::ConnectionError(format!("DRIVER_IGNITION_FAILURE: {}", e)))?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        // En modo memoria el ancla se abre antes que cualquier otra operación.
        if is_memory {
            let anchor_connection = shared_driver
                .connect()
                .map_err(|e| LedgerError::ConnectionError(format!("ANCHOR_FAULT: {}", e)))?;

            apply_ledger_schema(&anchor_connection, &namespace)
                .await
                .map_err(|e| LedgerError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", e)))?;

            anchor = Some(Arc::new(anchor_connection));
            info!("⚓ [LEDGER]: Memory strata solidified and anchored.");
        } else {
            let bootstrap_connection = shared_driver
                .connect()
                .map_err(|e| LedgerError::ConnectionError(format!("BOOTSTRAP_LINK_FAULT: {}", e)))?;
            apply_ledger_schema(&bootstrap_connection, &namespace)
                .await
                .map_err(|e| LedgerError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {}", e)))?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            table_namespace: namespace.into(),
            _memory_persistence_anchor: anchor,
        })
    }

    pub fn get_connection(&self) -> Result<Connection, LedgerError> {
        self.internal_database_driver.connect().map_err(|e| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", e);
            LedgerError::ConnectionError(e.to_string())
        })
    }

    pub fn namespace(&self) -> &str {
        &self.table_namespace
    }
}
// FIN DEL ARCHIVO [libs/infra/db/src/client.rs]
