// [apps/orchestrator/src/services/mod.rs]
/**
 * =================================================================
 * APARATO: SERVICE ORCHESTRATION HUB (V4.0)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS MOTORES DE NEGOCIO
 * =================================================================
 */

/// Canal lateral de eventos contables hacia el rastro de trazas.
pub mod callbacks;
/// Eventos de suscripción -> mutaciones del ledger.
pub mod lifecycle;
/// Alta/baja de asientos de equipo y cantidad por asiento.
pub mod seats;
/// Resolución de solo lectura plan/suscripción.
pub mod subscriptions;
/// Compra de créditos bajo demanda y automática.
pub mod topup;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS) ---

pub use callbacks::LoggingEventSink;
pub use lifecycle::{LifecycleApplier, LifecycleError, LifecycleOutcome, SubscriptionView};
pub use seats::{SeatError, SeatProvisioningService};
pub use subscriptions::SubscriptionQueryService;
pub use topup::{AutoTopUpOutcome, TopUpEngine, TopUpFaultCode, TopUpOutcome};
