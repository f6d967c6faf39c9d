// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LEDGER PERSISTENCE ADAPTER (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA ACID DEL LEDGER Y ESPEJO DE STRIPE
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::LedgerClient;
pub use errors::LedgerError;
