// [libs/infra/db/src/repositories/credits/mod.rs]
/*!
 * =================================================================
 * APARATO: CREDIT LEDGER REPOSITORY (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: MUTACIONES ACID DEL LEDGER DE DOBLE ASIENTO
 *
 * Invariantes custodiadas por este aparato:
 * 1. balance == SUM(amount) del ledger para cada (user_id, key).
 * 2. balance_after del asiento más nuevo == fila de balance.
 * 3. Una clave de idempotencia se consume a lo sumo una vez,
 *    transversal a todos los tipos de operación.
 * 4. Toda operación lógica conmuta en una sola transacción: asientos,
 *    balance y clave de idempotencia entran juntos o no entran.
 * =================================================================
 */

pub mod queries;

use crate::errors::LedgerError;
use crate::LedgerClient;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Transaction};
use queries::CreditQueries;
use std::collections::BTreeMap;
use tesoro_domain_ledger::{
    BalanceResetOutcome, ConsumeOutcome, DeltaMetadata, DeltaOutcome, HistoryFilter, LedgerEntry,
    ResetDescriptions, RevokeOutcome, SetBalanceOutcome, TransactionType,
};
use tracing::{debug, instrument};

/// Repositorio soberano del ledger de créditos.
pub struct CreditLedgerRepository {
    database_client: LedgerClient,
    sql: CreditQueries,
}

impl CreditLedgerRepository {
    pub fn new(client: LedgerClient) -> Self {
        let sql = CreditQueries::new(client.namespace());
        Self { database_client: client, sql }
    }

    // =================================================================
    // PRIMITIVO TRANSACCIONAL
    // =================================================================

    /**
     * Aplica un delta firmado sobre (user_id, key) en una transacción:
     * reclama la clave de idempotencia, verifica el ancla de divisa,
     * materializa el nuevo balance y sella el asiento con balance_after.
     */
    #[instrument(skip(self, metadata))]
    pub async fn apply_delta(
        &self,
        user_id: &str,
        key: &str,
        delta: i64,
        transaction_type: TransactionType,
        metadata: &DeltaMetadata,
    ) -> Result<DeltaOutcome, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let database_transaction = database_connection.transaction().await?;

        if let Some(idempotency_key) = &metadata.idempotency_key {
            self.claim_idempotency(&database_transaction, idempotency_key, transaction_type.as_str())
                .await?;
        }

        let (previous_balance, pinned_currency) =
            self.read_balance(&database_transaction, user_id, key).await?;

        let effective_currency =
            verify_currency_anchor(&pinned_currency, &metadata.currency)?;

        let new_balance = previous_balance + delta;

        self.write_balance(&database_transaction, user_id, key, new_balance, &effective_currency)
            .await?;

        let entry_id = self
            .append_entry(
                &database_transaction,
                user_id,
                key,
                delta,
                new_balance,
                transaction_type,
                metadata,
                metadata.idempotency_key.as_deref(),
                metadata.description.as_deref(),
            )
            .await?;

        database_transaction.commit().await?;

        debug!(
            "🧾 [LEDGER]: {} {} on ({}, {}) -> balance {}",
            transaction_type.as_str(),
            delta,
            user_id,
            key,
            new_balance
        );

        Ok(DeltaOutcome { previous_balance, new_balance, entry_id })
    }

    // =================================================================
    // API DE CRÉDITOS
    // =================================================================

    /// Otorga créditos. Montos no positivos se rechazan.
    pub async fn grant(
        &self,
        user_id: &str,
        key: &str,
        amount: i64,
        metadata: &DeltaMetadata,
    ) -> Result<DeltaOutcome, LedgerError> {
        require_positive(amount, "grant")?;
        self.apply_delta(user_id, key, amount, TransactionType::Grant, metadata).await
    }

    /// Consume créditos. Nunca bloquea: el saldo puede quedar negativo.
    pub async fn consume(
        &self,
        user_id: &str,
        key: &str,
        amount: i64,
        metadata: &DeltaMetadata,
    ) -> Result<ConsumeOutcome, LedgerError> {
        require_positive(amount, "consume")?;
        let outcome = self
            .apply_delta(user_id, key, -amount, TransactionType::Consume, metadata)
            .await?;
        Ok(ConsumeOutcome { success: true, balance: outcome.new_balance })
    }

    /**
     * Revoca hasta `amount`, acotado por el saldo positivo actual dentro
     * de la misma transacción. Con saldo <= 0 la operación es un no-op.
     */
    #[instrument(skip(self, metadata))]
    pub async fn revoke(
        &self,
        user_id: &str,
        key: &str,
        amount: i64,
        metadata: &DeltaMetadata,
    ) -> Result<RevokeOutcome, LedgerError> {
        require_positive(amount, "revoke")?;
        self.revoke_capped(user_id, key, Some(amount), metadata).await
    }

    /// Revoca el saldo positivo completo de la clave.
    pub async fn revoke_all(
        &self,
        user_id: &str,
        key: &str,
        metadata: &DeltaMetadata,
    ) -> Result<RevokeOutcome, LedgerError> {
        self.revoke_capped(user_id, key, None, metadata).await
    }

    async fn revoke_capped(
        &self,
        user_id: &str,
        key: &str,
        requested_amount: Option<i64>,
        metadata: &DeltaMetadata,
    ) -> Result<RevokeOutcome, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let database_transaction = database_connection.transaction().await?;

        let (previous_balance, pinned_currency) =
            self.read_balance(&database_transaction, user_id, key).await?;

        let revocable = previous_balance.max(0);
        let effective_amount = requested_amount.map_or(revocable, |a| a.min(revocable));

        if effective_amount == 0 {
            // Sin saldo positivo no hay asiento que sellar.
            return Ok(RevokeOutcome { amount_revoked: 0, balance: previous_balance });
        }

        if let Some(idempotency_key) = &metadata.idempotency_key {
            self.claim_idempotency(&database_transaction, idempotency_key, "revoke").await?;
        }

        let effective_currency = verify_currency_anchor(&pinned_currency, &metadata.currency)?;
        let new_balance = previous_balance - effective_amount;

        self.write_balance(&database_transaction, user_id, key, new_balance, &effective_currency)
            .await?;
        self.append_entry(
            &database_transaction,
            user_id,
            key,
            -effective_amount,
            new_balance,
            TransactionType::Revoke,
            metadata,
            metadata.idempotency_key.as_deref(),
            metadata.description.as_deref(),
        )
        .await?;

        database_transaction.commit().await?;

        Ok(RevokeOutcome { amount_revoked: effective_amount, balance: new_balance })
    }

    /// Fija el saldo en un objetivo arbitrario (negativo permitido)
    /// mediante un asiento de ajuste con el delta necesario.
    #[instrument(skip(self, metadata))]
    pub async fn set_balance(
        &self,
        user_id: &str,
        key: &str,
        target_balance: i64,
        metadata: &DeltaMetadata,
    ) -> Result<SetBalanceOutcome, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let database_transaction = database_connection.transaction().await?;

        let (previous_balance, pinned_currency) =
            self.read_balance(&database_transaction, user_id, key).await?;

        let delta = target_balance - previous_balance;
        if delta == 0 {
            return Ok(SetBalanceOutcome { previous_balance, balance: previous_balance });
        }

        if let Some(idempotency_key) = &metadata.idempotency_key {
            self.claim_idempotency(&database_transaction, idempotency_key, "adjust").await?;
        }

        let effective_currency = verify_currency_anchor(&pinned_currency, &metadata.currency)?;

        self.write_balance(&database_transaction, user_id, key, target_balance, &effective_currency)
            .await?;
        self.append_entry(
            &database_transaction,
            user_id,
            key,
            delta,
            target_balance,
            TransactionType::Adjust,
            metadata,
            metadata.idempotency_key.as_deref(),
            metadata.description.as_deref(),
        )
        .await?;

        database_transaction.commit().await?;

        Ok(SetBalanceOutcome { previous_balance, balance: target_balance })
    }

    /**
     * Reinicio de doble asiento para renovaciones: expira el remanente
     * positivo (o perdona la deuda) y otorga la nueva asignación, todo
     * bajo una transacción y una sola clave de idempotencia.
     */
    #[instrument(skip(self, metadata, descriptions))]
    pub async fn atomic_balance_reset(
        &self,
        user_id: &str,
        key: &str,
        new_allocation: i64,
        metadata: &DeltaMetadata,
        descriptions: &ResetDescriptions,
    ) -> Result<BalanceResetOutcome, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let database_transaction = database_connection.transaction().await?;

        if let Some(idempotency_key) = &metadata.idempotency_key {
            self.claim_idempotency(&database_transaction, idempotency_key, "balance_reset")
                .await?;
        }

        let (previous_balance, pinned_currency) =
            self.read_balance(&database_transaction, user_id, key).await?;
        let effective_currency = verify_currency_anchor(&pinned_currency, &metadata.currency)?;

        let grants_new_entry = new_allocation > 0;
        let mut expired = 0;
        let mut forgiven = 0;

        // La clave de idempotencia viaja en el asiento de otorgamiento;
        // con asignación cero queda en el asiento de cierre.
        let reset_entry_key =
            if grants_new_entry { None } else { metadata.idempotency_key.as_deref() };

        if previous_balance > 0 {
            expired = previous_balance;
            self.append_entry(
                &database_transaction,
                user_id,
                key,
                -previous_balance,
                0,
                TransactionType::Revoke,
                metadata,
                reset_entry_key,
                descriptions.expire.as_deref(),
            )
            .await?;
        } else if previous_balance < 0 {
            forgiven = -previous_balance;
            self.append_entry(
                &database_transaction,
                user_id,
                key,
                -previous_balance,
                0,
                TransactionType::Adjust,
                metadata,
                reset_entry_key,
                descriptions.forgiven.as_deref(),
            )
            .await?;
        }

        let new_balance = if grants_new_entry {
            self.append_entry(
                &database_transaction,
                user_id,
                key,
                new_allocation,
                new_allocation,
                TransactionType::Grant,
                metadata,
                metadata.idempotency_key.as_deref(),
                descriptions.grant.as_deref(),
            )
            .await?;
            new_allocation
        } else {
            0
        };

        self.write_balance(&database_transaction, user_id, key, new_balance, &effective_currency)
            .await?;

        database_transaction.commit().await?;

        Ok(BalanceResetOutcome { previous_balance, expired, forgiven, new_balance })
    }

    /**
     * Reclama una clave de idempotencia para una operación lógica
     * multi-clave (renovaciones). La clave liga el conjunto completo:
     * el segundo reclamo colisiona y la operación entera se omite.
     */
    pub async fn claim_operation(
        &self,
        idempotency_key: &str,
        operation: &str,
    ) -> Result<(), LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(&self.sql.claim_idempotency_key, params![idempotency_key, operation])
            .await
            .map_err(|database_error| {
                if LedgerError::is_unique_violation(&database_error) {
                    LedgerError::IdempotencyConflict(idempotency_key.to_string())
                } else {
                    LedgerError::QueryError(database_error)
                }
            })?;
        Ok(())
    }

    // =================================================================
    // LECTURAS
    // =================================================================

    /// Saldo actual; cero para parejas (user, key) nunca vistas.
    pub async fn get_balance(&self, user_id: &str, key: &str) -> Result<i64, LedgerError> {
        Ok(self.find_balance_row(user_id, key).await?.map_or(0, |(balance, _)| balance))
    }

    /// Lectura pura: ¿alcanza el saldo para `amount`?
    pub async fn has_credits(
        &self,
        user_id: &str,
        key: &str,
        amount: i64,
    ) -> Result<bool, LedgerError> {
        Ok(self.get_balance(user_id, key).await? >= amount)
    }

    /// Fila de balance cruda, con su ancla de divisa. `None` si no existe.
    pub async fn find_balance_row(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<(i64, Option<String>)>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.sql.select_balance_row, params![user_id, key])
            .await?;

        match query_results.next().await? {
            Some(data_row) => {
                let balance: i64 = data_row.get(0)?;
                let currency = text_or_none(data_row.get_value(1)?);
                Ok(Some((balance, currency)))
            }
            None => Ok(None),
        }
    }

    /// Mapa clave -> saldo del usuario, excluyendo claves reservadas.
    pub async fn get_all_balances(
        &self,
        user_id: &str,
        excluded_keys: &[&str],
    ) -> Result<BTreeMap<String, i64>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.sql.select_all_balances, params![user_id])
            .await?;

        let mut balances_map = BTreeMap::new();
        while let Some(data_row) = query_results.next().await? {
            let key: String = data_row.get(0)?;
            if excluded_keys.contains(&key.as_str()) {
                continue;
            }
            balances_map.insert(key, data_row.get::<i64>(1)?);
        }
        Ok(balances_map)
    }

    /// Historial paginado, más nuevo primero, con desempate intra-transacción
    /// por orden de inserción (id).
    pub async fn get_history(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = match &filter.key {
            Some(key) => {
                database_connection
                    .query(
                        &self.sql.select_history_by_key,
                        params![user_id, key.as_str(), filter.limit as i64, filter.offset as i64],
                    )
                    .await?
            }
            None => {
                database_connection
                    .query(
                        &self.sql.select_history_all,
                        params![user_id, filter.limit as i64, filter.offset as i64],
                    )
                    .await?
            }
        };

        let mut history = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            history.push(map_row_to_entry(&data_row)?);
        }
        Ok(history)
    }

    /// Total otorgado a un usuario por una fuente y correlativo concretos.
    pub async fn sum_granted_by_source(
        &self,
        user_id: &str,
        key: &str,
        source: &str,
        source_id: &str,
    ) -> Result<i64, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.sql.sum_source_grants, params![user_id, key, source, source_id])
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get(0)?),
            None => Ok(0),
        }
    }

    /// Asientos de una fuente en el mes calendario corriente (UTC).
    pub async fn count_monthly_by_source(
        &self,
        user_id: &str,
        key: &str,
        source: &str,
    ) -> Result<u32, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.sql.count_monthly_by_source, params![user_id, key, source])
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u32),
            None => Ok(0),
        }
    }

    // =================================================================
    // HELPERS TRANSACCIONALES
    // =================================================================

    async fn claim_idempotency(
        &self,
        database_transaction: &Transaction,
        idempotency_key: &str,
        operation: &str,
    ) -> Result<(), LedgerError> {
        database_transaction
            .execute(&self.sql.claim_idempotency_key, params![idempotency_key, operation])
            .await
            .map_err(|database_error| {
                if LedgerError::is_unique_violation(&database_error) {
                    LedgerError::IdempotencyConflict(idempotency_key.to_string())
                } else {
                    LedgerError::QueryError(database_error)
                }
            })?;
        Ok(())
    }

    async fn read_balance(
        &self,
        database_transaction: &Transaction,
        user_id: &str,
        key: &str,
    ) -> Result<(i64, Option<String>), LedgerError> {
        let mut query_results = database_transaction
            .query(&self.sql.select_balance_row, params![user_id, key])
            .await?;

        match query_results.next().await? {
            Some(data_row) => {
                let balance: i64 = data_row.get(0)?;
                let currency = text_or_none(data_row.get_value(1)?);
                Ok((balance, currency))
            }
            None => Ok((0, None)),
        }
    }

    async fn write_balance(
        &self,
        database_transaction: &Transaction,
        user_id: &str,
        key: &str,
        balance: i64,
        currency: &Option<String>,
    ) -> Result<(), LedgerError> {
        database_transaction
            .execute(
                &self.sql.upsert_balance_row,
                params![user_id, key, balance, opt_text(currency.clone())],
            )
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_entry(
        &self,
        database_transaction: &Transaction,
        user_id: &str,
        key: &str,
        amount: i64,
        balance_after: i64,
        transaction_type: TransactionType,
        metadata: &DeltaMetadata,
        idempotency_key: Option<&str>,
        description: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let source = metadata.source.clone().unwrap_or_else(|| "manual".to_string());
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let mut query_results = database_transaction
            .query(
                &self.sql.insert_ledger_entry,
                params![
                    user_id,
                    key,
                    amount,
                    balance_after,
                    transaction_type.as_str(),
                    source,
                    opt_text(metadata.source_id.clone()),
                    opt_text(description.map(str::to_string)),
                    opt_text(metadata.currency.clone()),
                    opt_text(idempotency_key.map(str::to_string)),
                    created_at
                ],
            )
            .await
            .map_err(|database_error| {
                if LedgerError::is_unique_violation(&database_error) {
                    LedgerError::IdempotencyConflict(
                        idempotency_key.unwrap_or_default().to_string(),
                    )
                } else {
                    LedgerError::QueryError(database_error)
                }
            })?;

        let id_row = query_results
            .next()
            .await?
            .ok_or_else(|| LedgerError::MappingError("ledger insert returned no id".into()))?;
        Ok(id_row.get(0)?)
    }
}

// =================================================================
// MAPEO Y VALIDACIÓN
// =================================================================

fn require_positive(amount: i64, operation: &str) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(format!(
            "{} requires a positive amount, got {}",
            operation, amount
        )));
    }
    Ok(())
}

/// Una fila anclada a divisa solo admite operaciones con esa divisa.
fn verify_currency_anchor(
    pinned: &Option<String>,
    supplied: &Option<String>,
) -> Result<Option<String>, LedgerError> {
    match (pinned, supplied) {
        (Some(anchor), Some(candidate)) if anchor != candidate => {
            Err(LedgerError::CurrencyMismatch {
                pinned: anchor.clone(),
                supplied: candidate.clone(),
            })
        }
        (Some(anchor), _) => Ok(Some(anchor.clone())),
        (None, candidate) => Ok(candidate.clone()),
    }
}

fn text_or_none(value: libsql::Value) -> Option<String> {
    match value {
        libsql::Value::Text(text) => Some(text),
        _ => None,
    }
}

/// Texto opcional a valor SQL (NULL cuando ausente).
pub(crate) fn opt_text(value: Option<String>) -> libsql::Value {
    match value {
        Some(text) => libsql::Value::Text(text),
        None => libsql::Value::Null,
    }
}

/// Mapea una fila del ledger a su asiento de dominio.
fn map_row_to_entry(data_row: &libsql::Row) -> Result<LedgerEntry, LedgerError> {
    let transaction_type_label: String = data_row.get(5)?;
    let transaction_type = TransactionType::parse(&transaction_type_label).ok_or_else(|| {
        LedgerError::MappingError(format!("unknown transaction_type '{}'", transaction_type_label))
    })?;

    let created_at_label: String = data_row.get(11)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_label)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|parse_fault| {
            LedgerError::MappingError(format!("created_at drift: {}", parse_fault))
        })?;

    Ok(LedgerEntry {
        id: data_row.get(0)?,
        user_id: data_row.get(1)?,
        key: data_row.get(2)?,
        amount: data_row.get(3)?,
        balance_after: data_row.get(4)?,
        transaction_type,
        source: data_row.get(6)?,
        source_id: text_or_none(data_row.get_value(7)?),
        description: text_or_none(data_row.get_value(8)?),
        currency: text_or_none(data_row.get_value(9)?),
        idempotency_key: text_or_none(data_row.get_value(10)?),
        created_at,
    })
}
