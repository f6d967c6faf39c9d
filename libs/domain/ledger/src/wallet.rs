// [libs/domain/ledger/src/wallet.rs]
/*!
 * =================================================================
 * APARATO: WALLET SCALE & VIEW TYPES (V4.0)
 * CLASIFICACIÓN: DOMAIN TYPES (ESTRATO L2)
 * RESPONSABILIDAD: ESCALA MICRO-CENTAVO Y VISTAS DEL MONEDERO
 *
 * El monedero persiste en el mismo ledger bajo la clave reservada
 * 'wallet', escalado a micro-centavos: 1 centavo = 1_000_000 µc,
 * seis decimales de precisión sub-centavo.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Clave reservada del monedero dentro del ledger de créditos.
pub const WALLET_RESERVED_KEY: &str = "wallet";

/// Factor de escala monetaria del monedero.
pub const MICRO_CENTS_PER_CENT: i64 = 1_000_000;

/// Centavos (posiblemente fraccionarios) a micro-centavos enteros.
pub fn cents_to_micro_cents(cents: f64) -> i64 {
    (cents * MICRO_CENTS_PER_CENT as f64).round() as i64
}

/// Micro-centavos enteros a centavos decimales.
pub fn micro_cents_to_cents(micro_cents: i64) -> f64 {
    micro_cents as f64 / MICRO_CENTS_PER_CENT as f64
}

/// Naturaleza de un movimiento visto desde el monedero. El asiento
/// `grant` del ledger se renderiza como `add` en esta superficie.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletEntryKind {
    Add,
    Consume,
    Revoke,
    Adjust,
}

/// Saldo del monedero en unidades de pantalla.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletBalance {
    pub cents: f64,
    pub currency: Option<String>,
    pub formatted: String,
}

/// Movimiento del monedero en unidades de pantalla.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub entry_type: WalletEntryKind,
    pub cents: f64,
    pub balance_after_cents: f64,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
