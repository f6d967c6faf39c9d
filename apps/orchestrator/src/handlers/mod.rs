// INICIO DEL ARCHIVO [apps/orchestrator/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER ORCHESTRATION HUB (V4.0)
 * CLASIFICACIÓN: APPLICATION ADAPTERS (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE PUNTOS DE ENTRADA
 *
 * # Topología de Módulos:
 * - webhooks:      Sobres de Stripe hacia los motores E/F.
 * - credits:       Saldos, historial y top-up del ledger.
 * - wallet:        Monedero monetario micro-centavo.
 * - checkout:      Sesiones alojadas de alta y portal.
 * - seats:         Alta/baja de usuarios-asiento.
 * - subscriptions: Estado de suscripción de solo lectura.
 * =================================================================
 */

pub mod checkout;
pub mod credits;
pub mod seats;
pub mod subscriptions;
pub mod wallet;
pub mod webhooks;

// FIN DEL ARCHIVO [apps/orchestrator/src/handlers/mod.rs]
