// [libs/infra/db/src/repositories/credits/queries.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER SQL QUERIES (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: ACCESOS ATÓMICOS AL LEDGER NAMESPACIADO
 *
 * Las sentencias se materializan una sola vez por repositorio con el
 * prefijo de namespace inyectado; el hot-path no vuelve a formatear.
 * =================================================================
 */

/// Sentencias precompiladas del ledger de créditos.
pub struct CreditQueries {
    pub select_balance_row: String,
    pub upsert_balance_row: String,
    pub claim_idempotency_key: String,
    pub insert_ledger_entry: String,
    pub select_all_balances: String,
    pub select_history_all: String,
    pub select_history_by_key: String,
    pub sum_source_grants: String,
    pub count_monthly_by_source: String,
}

impl CreditQueries {
    pub fn new(ns: &str) -> Self {
        Self {
            select_balance_row: format!(
                "SELECT balance, currency FROM {ns}_credit_balances
                 WHERE user_id = ?1 AND key = ?2"
            ),

            // El ancla de divisa es de una sola escritura: una vez fijada,
            // solo COALESCE la preserva.
            upsert_balance_row: format!(
                "INSERT INTO {ns}_credit_balances (user_id, key, balance, currency, updated_at)
                 VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
                 ON CONFLICT(user_id, key) DO UPDATE SET
                    balance = excluded.balance,
                    currency = COALESCE({ns}_credit_balances.currency, excluded.currency),
                    updated_at = CURRENT_TIMESTAMP"
            ),

            claim_idempotency_key: format!(
                "INSERT INTO {ns}_idempotency_keys (key, operation) VALUES (?1, ?2)"
            ),

            insert_ledger_entry: format!(
                "INSERT INTO {ns}_credit_ledger
                    (user_id, key, amount, balance_after, transaction_type,
                     source, source_id, description, currency, idempotency_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 RETURNING id"
            ),

            select_all_balances: format!(
                "SELECT key, balance FROM {ns}_credit_balances
                 WHERE user_id = ?1
                 ORDER BY key ASC"
            ),

            select_history_all: format!(
                "SELECT id, user_id, key, amount, balance_after, transaction_type,
                        source, source_id, description, currency, idempotency_key, created_at
                 FROM {ns}_credit_ledger
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3"
            ),

            select_history_by_key: format!(
                "SELECT id, user_id, key, amount, balance_after, transaction_type,
                        source, source_id, description, currency, idempotency_key, created_at
                 FROM {ns}_credit_ledger
                 WHERE user_id = ?1 AND key = ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ),

            // Total otorgado por una fuente concreta (asientos positivos).
            sum_source_grants: format!(
                "SELECT COALESCE(SUM(amount), 0) FROM {ns}_credit_ledger
                 WHERE user_id = ?1 AND key = ?2
                   AND source = ?3 AND source_id = ?4
                   AND amount > 0"
            ),

            // Disparos de una fuente dentro del mes calendario corriente (UTC).
            count_monthly_by_source: format!(
                "SELECT COUNT(*) FROM {ns}_credit_ledger
                 WHERE user_id = ?1 AND key = ?2 AND source = ?3
                   AND strftime('%Y-%m', created_at) = strftime('%Y-%m', 'now')"
            ),
        }
    }
}
