// [libs/domain/ledger/src/entry.rs]
/*!
 * =================================================================
 * APARATO: LEDGER ENTRY TYPES (V4.0)
 * CLASIFICACIÓN: DOMAIN TYPES (ESTRATO L2)
 * RESPONSABILIDAD: FORMA INMUTABLE DE CADA ASIENTO DEL LEDGER
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Etiquetas nominales de origen de un asiento. `source` es texto libre
/// en el ledger; estas constantes fijan las etiquetas que el sistema emite.
pub mod sources {
    pub const SUBSCRIPTION: &str = "subscription";
    pub const TOPUP: &str = "topup";
    pub const AUTO_TOPUP: &str = "auto_topup";
    pub const SEAT_GRANT: &str = "seat_grant";
    pub const RENEWAL: &str = "renewal";
    pub const CANCELLATION: &str = "cancellation";
    pub const MANUAL: &str = "manual";
}

/// Naturaleza contable del asiento.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Grant,
    Consume,
    Revoke,
    Adjust,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Grant => "grant",
            TransactionType::Consume => "consume",
            TransactionType::Revoke => "revoke",
            TransactionType::Adjust => "adjust",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "grant" => Some(TransactionType::Grant),
            "consume" => Some(TransactionType::Consume),
            "revoke" => Some(TransactionType::Revoke),
            "adjust" => Some(TransactionType::Adjust),
            _ => None,
        }
    }
}

/// Asiento inmutable del ledger. `balance_after` materializa la suma
/// hasta e incluyendo este asiento para la pareja (user_id, key).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    pub key: String,
    pub amount: i64,
    pub balance_after: i64,
    pub transaction_type: TransactionType,
    pub source: String,
    pub source_id: Option<String>,
    pub description: Option<String>,
    pub currency: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
