// [libs/domain/billing/src/resolver.rs]
/*!
 * =================================================================
 * APARATO: PRICE RESOLUTION ENGINE (V4.0)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PRICE_ID -> (PLAN, PUNTO DE PRECIO) Y ESCALADO
 * =================================================================
 */

use crate::catalog::{BillingConfig, BillingInterval, EnvKind, Plan, PricePoint};

/// Resultado de resolver un price_id contra el catálogo.
#[derive(Debug, Clone)]
pub struct PlanResolution<'a> {
    pub plan: &'a Plan,
    pub price_point: &'a PricePoint,
    /// Entorno donde se encontró la coincidencia.
    pub env: EnvKind,
}

/// Escala una asignación mensual al intervalo del punto de precio.
///
/// month -> x1, year -> x12, week -> techo de asignación/4, one_time -> x1.
pub fn allocation_for_interval(allocation: i64, interval: BillingInterval) -> i64 {
    match interval {
        BillingInterval::Month | BillingInterval::OneTime => allocation,
        BillingInterval::Year => allocation * 12,
        BillingInterval::Week => (allocation + 3) / 4,
    }
}

impl BillingConfig {
    /// Busca un price_id en ambos entornos, prefiriendo el activo
    /// cuando el identificador existe en los dos.
    pub fn resolve_plan_by_price_id(
        &self,
        price_id: &str,
        active_env: EnvKind,
    ) -> Option<PlanResolution<'_>> {
        let (first, second) = match active_env {
            EnvKind::Test => (EnvKind::Test, EnvKind::Production),
            EnvKind::Production => (EnvKind::Production, EnvKind::Test),
        };

        self.resolve_in_env(price_id, first)
            .or_else(|| self.resolve_in_env(price_id, second))
    }

    fn resolve_in_env(&self, price_id: &str, env: EnvKind) -> Option<PlanResolution<'_>> {
        for plan in &self.environment(env).plans {
            for price_point in &plan.price {
                if price_point.id.as_deref() == Some(price_id) {
                    return Some(PlanResolution { plan, price_point, env });
                }
            }
        }
        None
    }
}
