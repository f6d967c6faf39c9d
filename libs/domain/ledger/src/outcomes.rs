// [libs/domain/ledger/src/outcomes.rs]
/*!
 * =================================================================
 * APARATO: OPERATION OUTCOME CONTRACTS (V4.0)
 * CLASIFICACIÓN: DOMAIN TYPES (ESTRATO L2)
 * RESPONSABILIDAD: FORMAS DE RETORNO DE LAS OPERACIONES DEL LEDGER
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Metadatos opcionales que acompañan a una mutación del ledger.
#[derive(Debug, Clone, Default)]
pub struct DeltaMetadata {
    pub source: Option<String>,
    pub source_id: Option<String>,
    pub description: Option<String>,
    pub currency: Option<String>,
    pub idempotency_key: Option<String>,
}

impl DeltaMetadata {
    pub fn with_source(source: &str) -> Self {
        Self { source: Some(source.to_string()), ..Default::default() }
    }
}

/// Resultado del primitivo transaccional `apply_delta`.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaOutcome {
    pub previous_balance: i64,
    pub new_balance: i64,
    pub entry_id: i64,
}

/// Resultado de `consume`. La bandera de éxito es vestigial: el consumo
/// nunca bloquea y el saldo puede quedar negativo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    pub success: bool,
    pub balance: i64,
}

/// Resultado de `revoke`: el monto efectivo queda acotado por el saldo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeOutcome {
    pub amount_revoked: i64,
    pub balance: i64,
}

/// Resultado de `set_balance`.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBalanceOutcome {
    pub previous_balance: i64,
    pub balance: i64,
}

/// Descripciones de los asientos generados por un reinicio atómico.
#[derive(Debug, Clone, Default)]
pub struct ResetDescriptions {
    pub expire: Option<String>,
    pub forgiven: Option<String>,
    pub grant: Option<String>,
}

/// Resultado del reinicio de doble asiento: expira saldo positivo o
/// perdona deuda, luego otorga la nueva asignación.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResetOutcome {
    pub previous_balance: i64,
    pub expired: i64,
    pub forgiven: i64,
    pub new_balance: i64,
}

/// Página de historial con el orden estable del ledger (más nuevo primero).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub key: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self { key: None, limit: 50, offset: 0 }
    }
}
