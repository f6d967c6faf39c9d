// [libs/domain/billing/src/catalog.rs]
/*!
 * =================================================================
 * APARATO: PLAN CATALOG TYPES (V4.0 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN TYPES (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA DEL DOCUMENTO DE CONFIGURACIÓN
 *
 * El documento llega como JSON con dos entornos espejo (test y
 * production). Cada plan declara sus puntos de precio y un mapa
 * abierto de features; cada feature es una suma de fragmentos de
 * capacidad (créditos, top-up, uso medido) y no una jerarquía.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use typeshare::typeshare;

#[derive(Error, Debug)]
pub enum BillingCatalogError {
    /// El documento JSON no respeta la gramática del catálogo.
    #[error("[L2_CATALOG_FAULT]: CONFIG_PARSE_REJECTED -> {0}")]
    ParseError(#[from] serde_json::Error),

    /// Un plan declara un feature sin ningún fragmento de capacidad.
    #[error("[L2_CATALOG_FAULT]: EMPTY_FEATURE -> plan '{plan}' feature '{feature}'")]
    EmptyFeature { plan: String, feature: String },
}

/// Entorno activo del proceso. Decide qué rama del catálogo manda
/// cuando un price_id existe en ambas.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvKind {
    Test,
    Production,
}

/// Política de destino de los créditos otorgados por eventos de ciclo de vida.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GrantTarget {
    /// Los créditos aterrizan en el usuario mapeado al customer.
    #[default]
    Subscriber,
    /// Los créditos aterrizan por usuario-asiento (equipos).
    SeatUsers,
    /// El sistema externo otorga a mano; el ciclo de vida no escribe.
    Manual,
}

/// Intervalo de facturación de un punto de precio.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
    Week,
    OneTime,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
            BillingInterval::Week => "week",
            BillingInterval::OneTime => "one_time",
        }
    }

    /// Mapeo tolerante desde el espejo de Stripe (`recurring.interval`).
    pub fn parse(label: &str) -> Self {
        match label {
            "year" => BillingInterval::Year,
            "week" => BillingInterval::Week,
            "one_time" => BillingInterval::OneTime,
            _ => BillingInterval::Month,
        }
    }
}

/// Comportamiento de la asignación mensual en cada renovación.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnRenewal {
    /// Expira el remanente y otorga la asignación completa (doble asiento).
    #[default]
    Reset,
    /// Acumula: suma la asignación sobre el saldo existente.
    Add,
}

/// Asignación periódica de créditos para una clave.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditRule {
    /// Asignación base mensual; el intervalo del precio la escala.
    pub allocation: i64,
    #[serde(default, rename = "onRenewal")]
    pub on_renewal: OnRenewal,
}

/// Recarga automática disparada por umbral de saldo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoTopUpRule {
    /// Dispara estrictamente por debajo de este saldo (la igualdad no dispara).
    pub threshold: i64,
    /// Créditos comprados por disparo.
    pub amount: i64,
    /// Tope de disparos por mes calendario por (usuario, clave).
    #[serde(rename = "maxPerMonth")]
    pub max_per_month: u32,
}

/// Fragmentos de capacidad de un feature. Un feature puede combinar
/// asignación periódica, compra bajo demanda y metadatos de uso medido.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Feature {
    #[serde(default)]
    pub credits: Option<CreditRule>,

    /// Precio en la unidad monetaria mínima por crédito comprado.
    #[serde(default, rename = "pricePerCredit")]
    pub price_per_credit: Option<i64>,
    #[serde(default, rename = "minPerPurchase")]
    pub min_per_purchase: Option<i64>,
    #[serde(default, rename = "maxPerPurchase")]
    pub max_per_purchase: Option<i64>,
    #[serde(default, rename = "autoTopUp")]
    pub auto_top_up: Option<AutoTopUpRule>,

    // Metadatos de uso medido: el ledger no los interpreta.
    #[serde(default, rename = "trackUsage")]
    pub track_usage: Option<bool>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, rename = "meteredPriceId")]
    pub metered_price_id: Option<String>,
}

impl Feature {
    pub fn supports_top_up(&self) -> bool {
        self.price_per_credit.is_some()
    }
}

/// Punto de precio de un plan, espejo del objeto `price` de Stripe.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(default)]
    pub id: Option<String>,
    /// Monto en la unidad monetaria mínima (centavos para USD).
    pub amount: i64,
    pub currency: String,
    pub interval: BillingInterval,
}

/// Plan comercial: puntos de precio más el mapa abierto de features.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub price: Vec<PricePoint>,
    #[serde(default, rename = "perSeat")]
    pub per_seat: bool,
    #[serde(default)]
    pub features: BTreeMap<String, Feature>,

    /// Gramática heredada: mapa plano `credits: { clave -> regla }`.
    /// Se pliega dentro de `features` al validar el documento.
    #[serde(default)]
    credits: BTreeMap<String, CreditRule>,
}

impl Plan {
    /// Features con asignación periódica, en orden estable de clave.
    pub fn credit_features(&self) -> impl Iterator<Item = (&str, &CreditRule)> {
        self.features
            .iter()
            .filter_map(|(key, feature)| feature.credits.as_ref().map(|rule| (key.as_str(), rule)))
    }

    pub fn feature(&self, key: &str) -> Option<&Feature> {
        self.features.get(key)
    }

    /// Claves de crédito declaradas por el plan.
    pub fn credit_keys(&self) -> Vec<String> {
        self.credit_features().map(|(key, _)| key.to_string()).collect()
    }

    fn fold_legacy_credits(&mut self) {
        let legacy = std::mem::take(&mut self.credits);
        for (key, rule) in legacy {
            self.features
                .entry(key)
                .or_insert_with(Feature::default)
                .credits
                .get_or_insert(rule);
        }
    }
}

/// Rama de entorno del catálogo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillingEnvironment {
    #[serde(default)]
    pub plans: Vec<Plan>,
}

/// Documento raíz del catálogo: entornos espejo más la política de destino.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillingConfig {
    #[serde(default)]
    pub test: BillingEnvironment,
    #[serde(default)]
    pub production: BillingEnvironment,
    #[serde(default, rename = "grantTo")]
    pub grant_to: GrantTarget,
}

impl BillingConfig {
    /// Parsea y normaliza el documento (pliegue de la gramática heredada).
    pub fn from_json_str(document: &str) -> Result<Self, BillingCatalogError> {
        let mut config: BillingConfig = serde_json::from_str(document)?;
        for environment in [&mut config.test, &mut config.production] {
            for plan in &mut environment.plans {
                plan.fold_legacy_credits();
            }
        }
        Ok(config)
    }

    pub fn environment(&self, kind: EnvKind) -> &BillingEnvironment {
        match kind {
            EnvKind::Test => &self.test,
            EnvKind::Production => &self.production,
        }
    }
}
