// [libs/infra/db/src/repositories/mirror.rs]
/*!
 * =================================================================
 * APARATO: STRIPE MIRROR REPOSITORY (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LECTURAS DEL ESPEJO REPLICADO DE STRIPE
 *
 * Las tablas espejo las puebla el motor de replicación externo; este
 * aparato solo lee (el mapa user -> customer admite escritura para
 * desarrollo local y pruebas). Un espejo vacío nunca es un error.
 * =================================================================
 */

use crate::errors::LedgerError;
use crate::repositories::credits::opt_text;
use crate::LedgerClient;
use chrono::{DateTime, Utc};
use libsql::params;
use serde_json::Value;
use tracing::instrument;

/// Fila espejo de un customer de Stripe.
#[derive(Debug, Clone)]
pub struct CustomerRecord {
    pub id: String,
    pub metadata: Value,
    pub deleted: bool,
    pub invoice_settings: Value,
}

impl CustomerRecord {
    /// Método de pago por defecto declarado en invoice_settings.
    pub fn default_payment_method(&self) -> Option<&str> {
        self.invoice_settings.get("default_payment_method").and_then(Value::as_str)
    }

    /// user_id embebido en la metadata del customer, si el checkout lo selló.
    pub fn mapped_user_id(&self) -> Option<&str> {
        self.metadata.get("user_id").and_then(Value::as_str)
    }
}

/// Fila espejo de una suscripción de Stripe.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub item_id: Option<String>,
    pub quantity: i64,
    pub interval: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub metadata: Value,
}

impl SubscriptionRecord {
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Fila espejo de un precio de Stripe.
#[derive(Debug, Clone)]
pub struct PriceRecord {
    pub id: String,
    pub product_id: Option<String>,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub interval: String,
}

pub struct StripeMirrorRepository {
    database_client: LedgerClient,
    select_customer: String,
    select_price: String,
    select_user_map: String,
    select_user_by_customer: String,
    upsert_user_map: String,
    select_subscriptions_by_customer: String,
    select_subscription_by_id: String,
}

const SUBSCRIPTION_COLUMNS: &str =
    "id, customer_id, status, price_id, item_id, quantity, interval,
     current_period_start, current_period_end, cancel_at_period_end, metadata_json";

impl StripeMirrorRepository {
    pub fn new(client: LedgerClient) -> Self {
        let ns = client.namespace();
        Self {
            select_customer: format!(
                "SELECT id, metadata_json, deleted, invoice_settings_json
                 FROM {ns}_customers WHERE id = ?1"
            ),
            select_price: format!(
                "SELECT id, product_id, unit_amount, currency, interval
                 FROM {ns}_prices WHERE id = ?1"
            ),
            select_user_map: format!(
                "SELECT customer_id FROM {ns}_user_map WHERE user_id = ?1"
            ),
            select_user_by_customer: format!(
                "SELECT user_id FROM {ns}_user_map WHERE customer_id = ?1"
            ),
            upsert_user_map: format!(
                "INSERT INTO {ns}_user_map (user_id, customer_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET customer_id = excluded.customer_id"
            ),
            select_subscriptions_by_customer: format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM {ns}_subscriptions
                 WHERE customer_id = ?1
                 ORDER BY current_period_end DESC"
            ),
            select_subscription_by_id: format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM {ns}_subscriptions WHERE id = ?1"
            ),
            database_client: client,
        }
    }

    pub async fn find_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerRecord>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results =
            database_connection.query(&self.select_customer, params![customer_id]).await?;

        match query_results.next().await? {
            Some(data_row) => {
                let metadata_label: String = data_row.get(1)?;
                let invoice_settings_label: String = data_row.get(3)?;
                Ok(Some(CustomerRecord {
                    id: data_row.get(0)?,
                    metadata: parse_json_column(&metadata_label)?,
                    deleted: data_row.get::<i64>(2)? != 0,
                    invoice_settings: parse_json_column(&invoice_settings_label)?,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn find_price(&self, price_id: &str) -> Result<Option<PriceRecord>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results =
            database_connection.query(&self.select_price, params![price_id]).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(PriceRecord {
                id: data_row.get(0)?,
                product_id: value_as_text(data_row.get_value(1)?),
                unit_amount: value_as_integer(data_row.get_value(2)?),
                currency: data_row.get(3)?,
                interval: data_row.get(4)?,
            })),
            None => Ok(None),
        }
    }

    /// customer mapeado a un usuario del sistema, vía user_map.
    pub async fn customer_for_user(&self, user_id: &str) -> Result<Option<String>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results =
            database_connection.query(&self.select_user_map, params![user_id]).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(data_row.get(0)?)),
            None => Ok(None),
        }
    }

    /**
     * Usuario del sistema detrás de un customer: primero la metadata
     * replicada del customer, luego el mapa inverso user_map.
     */
    #[instrument(skip(self))]
    pub async fn user_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<String>, LedgerError> {
        if let Some(customer) = self.find_customer(customer_id).await? {
            if let Some(user_id) = customer.mapped_user_id() {
                return Ok(Some(user_id.to_string()));
            }
        }

        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.select_user_by_customer, params![customer_id])
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(data_row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Alta o actualización del vínculo user -> customer.
    pub async fn upsert_user_map(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<(), LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(&self.upsert_user_map, params![user_id, customer_id])
            .await?;
        Ok(())
    }

    pub async fn find_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.select_subscription_by_id, params![subscription_id])
            .await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(map_row_to_subscription(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Suscripciones del customer, período más reciente primero.
    pub async fn subscriptions_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<SubscriptionRecord>, LedgerError> {
        let database_connection = self.database_client.get_connection()?;
        let mut query_results = database_connection
            .query(&self.select_subscriptions_by_customer, params![customer_id])
            .await?;

        let mut subscriptions = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            subscriptions.push(map_row_to_subscription(&data_row)?);
        }
        Ok(subscriptions)
    }

    /// Primera suscripción activa o en prueba del customer.
    pub async fn active_subscription_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, LedgerError> {
        let subscriptions = self.subscriptions_for_customer(customer_id).await?;
        Ok(subscriptions.into_iter().find(SubscriptionRecord::is_active))
    }

    /// Siembra de desarrollo: inserta una fila de suscripción espejo.
    pub async fn seed_subscription(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<(), LedgerError> {
        let ns = self.database_client.namespace();
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                &format!(
                    "INSERT INTO {ns}_subscriptions
                        (id, customer_id, status, price_id, item_id, quantity, interval,
                         current_period_start, current_period_end, cancel_at_period_end, metadata_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(id) DO UPDATE SET
                        status = excluded.status,
                        price_id = excluded.price_id,
                        item_id = excluded.item_id,
                        quantity = excluded.quantity,
                        interval = excluded.interval,
                        current_period_start = excluded.current_period_start,
                        current_period_end = excluded.current_period_end,
                        cancel_at_period_end = excluded.cancel_at_period_end,
                        metadata_json = excluded.metadata_json"
                ),
                params![
                    record.id.as_str(),
                    record.customer_id.as_str(),
                    record.status.as_str(),
                    opt_text(record.price_id.clone()),
                    opt_text(record.item_id.clone()),
                    record.quantity,
                    record.interval.as_str(),
                    opt_text(record.current_period_start.map(|t| t.to_rfc3339())),
                    opt_text(record.current_period_end.map(|t| t.to_rfc3339())),
                    if record.cancel_at_period_end { 1i64 } else { 0i64 },
                    record.metadata.to_string()
                ],
            )
            .await?;
        Ok(())
    }

    /// Siembra de desarrollo: inserta una fila de precio espejo.
    pub async fn seed_price(&self, record: &PriceRecord) -> Result<(), LedgerError> {
        let ns = self.database_client.namespace();
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                &format!(
                    "INSERT INTO {ns}_prices (id, product_id, unit_amount, currency, interval)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        product_id = excluded.product_id,
                        unit_amount = excluded.unit_amount,
                        currency = excluded.currency,
                        interval = excluded.interval"
                ),
                params![
                    record.id.as_str(),
                    opt_text(record.product_id.clone()),
                    match record.unit_amount {
                        Some(amount) => libsql::Value::Integer(amount),
                        None => libsql::Value::Null,
                    },
                    record.currency.as_str(),
                    record.interval.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    /// Siembra de desarrollo: inserta una fila de customer espejo.
    pub async fn seed_customer(&self, record: &CustomerRecord) -> Result<(), LedgerError> {
        let ns = self.database_client.namespace();
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                &format!(
                    "INSERT INTO {ns}_customers (id, metadata_json, deleted, invoice_settings_json)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                        metadata_json = excluded.metadata_json,
                        deleted = excluded.deleted,
                        invoice_settings_json = excluded.invoice_settings_json"
                ),
                params![
                    record.id.as_str(),
                    record.metadata.to_string(),
                    if record.deleted { 1i64 } else { 0i64 },
                    record.invoice_settings.to_string()
                ],
            )
            .await?;
        Ok(())
    }
}

fn parse_json_column(raw_json: &str) -> Result<Value, LedgerError> {
    serde_json::from_str(raw_json)
        .map_err(|parse_fault| LedgerError::MappingError(format!("metadata drift: {}", parse_fault)))
}

fn value_as_text(value: libsql::Value) -> Option<String> {
    match value {
        libsql::Value::Text(text) => Some(text),
        _ => None,
    }
}

fn value_as_integer(value: libsql::Value) -> Option<i64> {
    match value {
        libsql::Value::Integer(integer) => Some(integer),
        _ => None,
    }
}

fn map_row_to_subscription(data_row: &libsql::Row) -> Result<SubscriptionRecord, LedgerError> {
    let metadata_label: String = data_row.get(10)?;
    Ok(SubscriptionRecord {
        id: data_row.get(0)?,
        customer_id: data_row.get(1)?,
        status: data_row.get(2)?,
        price_id: value_as_text(data_row.get_value(3)?),
        item_id: value_as_text(data_row.get_value(4)?),
        quantity: data_row.get(5)?,
        interval: data_row.get(6)?,
        current_period_start: parse_timestamp(value_as_text(data_row.get_value(7)?)),
        current_period_end: parse_timestamp(value_as_text(data_row.get_value(8)?)),
        cancel_at_period_end: data_row.get::<i64>(9)? != 0,
        metadata: parse_json_column(&metadata_label)?,
    })
}

fn parse_timestamp(raw_timestamp: Option<String>) -> Option<DateTime<Utc>> {
    raw_timestamp
        .as_deref()
        .and_then(|label| DateTime::parse_from_rfc3339(label).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}
