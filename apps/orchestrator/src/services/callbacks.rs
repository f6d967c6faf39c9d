// [apps/orchestrator/src/services/callbacks.rs]
/*!
 * =================================================================
 * APARATO: CREDIT EVENT LOG SINK (V4.0)
 * CLASIFICACIÓN: APPLICATION SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: CANAL LATERAL DE EVENTOS HACIA EL RASTRO DE TRAZAS
 *
 * Contrato del canal: solo-efecto, jamás altera el resultado contable.
 * Integraciones externas sustituyen este receptor implementando el
 * mismo trait y tragándose sus propios fallos.
 * =================================================================
 */

use tesoro_domain_ledger::{AutoTopUpFailure, CreditEvent, CreditEventSink, TopUpReceipt};
use tracing::{info, warn};

/// Receptor por defecto del orquestador: publica cada hecho contable
/// sellado en el rastro estructurado.
pub struct LoggingEventSink;

impl CreditEventSink for LoggingEventSink {
    fn on_credits_granted(&self, event: &CreditEvent) {
        info!(
            target: "credit_events",
            user = %event.user_id,
            key = %event.key,
            amount = event.amount,
            source = %event.source,
            "💰 [CREDITS_GRANTED]"
        );
    }

    fn on_credits_revoked(&self, event: &CreditEvent) {
        info!(
            target: "credit_events",
            user = %event.user_id,
            key = %event.key,
            amount = event.amount,
            source = %event.source,
            "🔥 [CREDITS_REVOKED]"
        );
    }

    fn on_balance_reset(&self, event: &CreditEvent) {
        info!(
            target: "credit_events",
            user = %event.user_id,
            key = %event.key,
            new_balance = event.amount,
            "♻️ [BALANCE_RESET]"
        );
    }

    fn on_top_up_completed(&self, receipt: &TopUpReceipt) {
        info!(
            target: "credit_events",
            user = %receipt.user_id,
            key = %receipt.key,
            amount = receipt.amount,
            charged_cents = receipt.charged_cents,
            source_id = %receipt.source_id,
            "💳 [TOPUP_COMPLETED]"
        );
    }

    fn on_auto_top_up_failed(&self, failure: &AutoTopUpFailure) {
        warn!(
            target: "credit_events",
            user = %failure.user_id,
            key = %failure.key,
            reason = %failure.reason,
            "⚠️ [AUTO_TOPUP_BLOCKED]"
        );
    }
}
