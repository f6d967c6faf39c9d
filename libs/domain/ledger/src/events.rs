// [libs/domain/ledger/src/events.rs]
/*!
 * =================================================================
 * APARATO: CREDIT EVENT SIDE-CHANNEL (V4.0)
 * CLASIFICACIÓN: DOMAIN CONTRACT (ESTRATO L2)
 * RESPONSABILIDAD: GANCHOS OPCIONALES POST-COMMIT
 *
 * Contrato: los consumidores de eventos son canales laterales de solo
 * efecto. Sus fallos se registran y se descartan; jamás alteran el
 * resultado contable ya sellado en el ledger.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Hecho contable ya sellado, notificado tras el commit.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEvent {
    pub user_id: String,
    pub key: String,
    pub amount: i64,
    pub source: String,
    pub source_id: Option<String>,
}

/// Recibo de un top-up completado (manual o automático).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpReceipt {
    pub user_id: String,
    pub key: String,
    pub amount: i64,
    pub charged_cents: i64,
    pub currency: String,
    pub source_id: String,
}

/// Diagnóstico de un auto top-up que no llegó a dispararse.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTopUpFailure {
    pub user_id: String,
    pub key: String,
    pub reason: String,
}

/// Receptor de eventos de crédito. Implementación por defecto: no-op,
/// para que los consumidores sobrescriban solo lo que les interesa.
pub trait CreditEventSink: Send + Sync {
    fn on_credits_granted(&self, _event: &CreditEvent) {}
    fn on_credits_revoked(&self, _event: &CreditEvent) {}
    fn on_balance_reset(&self, _event: &CreditEvent) {}
    fn on_top_up_completed(&self, _receipt: &TopUpReceipt) {}
    fn on_auto_top_up_failed(&self, _failure: &AutoTopUpFailure) {}
}

/// Receptor nulo para procesos sin integraciones externas.
pub struct NoopEventSink;

impl CreditEventSink for NoopEventSink {}
