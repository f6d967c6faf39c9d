// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 * =================================================================
 */

// --- ESTRATO 1: LEDGER DE CRÉDITOS (CORE) ---

/// Mutaciones ACID de doble asiento e historial.
pub mod credits;
/// Vista monetaria micro-centavo sobre el ledger.
pub mod wallet;

// --- ESTRATO 2: EQUIPOS Y ESPEJO DE STRIPE ---

/// Pertenencia de asientos de equipo.
pub mod seats;
/// Lecturas del espejo replicado (customers, subscriptions, prices).
pub mod mirror;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS API) ---

pub use credits::CreditLedgerRepository;
pub use mirror::{CustomerRecord, PriceRecord, StripeMirrorRepository, SubscriptionRecord};
pub use seats::SeatRepository;
pub use wallet::WalletRepository;
