// [libs/domain/billing/src/lib.rs]
/*!
 * =================================================================
 * APARATO: BILLING CATALOG GRAMMAR (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: CATÁLOGO DECLARATIVO DE PLANES Y RESOLUCIÓN DE PRECIOS
 *
 * El catálogo es la única fuente de verdad sobre qué créditos otorga
 * cada plan, a qué intervalo y bajo qué reglas de recarga. El resto
 * del sistema (Lifecycle, Top-Up, Seats) lo consulta, nunca lo muta.
 * =================================================================
 */

pub mod catalog;
pub mod currency;
pub mod resolver;

pub use catalog::{
    AutoTopUpRule, BillingCatalogError, BillingConfig, BillingEnvironment, BillingInterval,
    CreditRule, EnvKind, Feature, GrantTarget, OnRenewal, Plan, PricePoint,
};
pub use currency::format_cents;
pub use resolver::{allocation_for_interval, PlanResolution};
