// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V4.0 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 * =================================================================
 */

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Placa base del estado compartido: repositorios, motores y catálogo.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para webhooks y superficie API del ledger.
pub mod handlers;
/// Núcleo de mando para la ignición del servidor.
pub mod kernel;
/// Definición de rutas y topología de red.
pub mod routes;

// --- ESTRATO DE SEGURIDAD Y SOPORTE ---
/// Guardia perimetral de autenticación por token.
pub mod middleware;
/// Motores de negocio: ciclo de vida, top-up, asientos y consultas.
pub mod services;

pub mod prelude {
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::{AppState, BillingSettings};
}
