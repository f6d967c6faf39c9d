// [libs/domain/ledger/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LEDGER GRAMMAR (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN TYPES (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DEL LEDGER DE DOBLE ASIENTO
 * =================================================================
 */

pub mod entry;
pub mod events;
pub mod outcomes;
pub mod wallet;

pub use entry::{sources, LedgerEntry, TransactionType};
pub use events::{AutoTopUpFailure, CreditEvent, CreditEventSink, NoopEventSink, TopUpReceipt};
pub use outcomes::{
    BalanceResetOutcome, ConsumeOutcome, DeltaMetadata, DeltaOutcome, HistoryFilter,
    ResetDescriptions, RevokeOutcome, SetBalanceOutcome,
};
pub use wallet::{
    cents_to_micro_cents, micro_cents_to_cents, WalletBalance, WalletEntry, WalletEntryKind,
    MICRO_CENTS_PER_CENT, WALLET_RESERVED_KEY,
};
