// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: COMPOSICIÓN DE REPOSITORIOS, MOTORES Y CATÁLOGO
 *
 * Placa base del orquestador: todo estrato (handlers, motores,
 * middleware) recibe sus dependencias desde aquí vía Arc<T>.
 * =================================================================
 */

use crate::services::lifecycle::LifecycleApplier;
use crate::services::seats::SeatProvisioningService;
use crate::services::subscriptions::SubscriptionQueryService;
use crate::services::topup::TopUpEngine;
use std::sync::Arc;
use tesoro_domain_billing::{BillingConfig, EnvKind, GrantTarget};
use tesoro_domain_ledger::CreditEventSink;
use tesoro_infra_db::repositories::{
    CreditLedgerRepository, SeatRepository, StripeMirrorRepository, WalletRepository,
};
use tesoro_infra_db::LedgerClient;
use tesoro_infra_stripe::PaymentGateway;

/// Parámetros operativos del proceso, resueltos una vez en la ignición.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// Rama del catálogo que manda en la resolución de precios.
    pub active_env: EnvKind,
    /// Destino de los créditos de ciclo de vida.
    pub grant_to: GrantTarget,
    /// Con configuración fiscal activa, el top-up viaja por factura (B2B).
    pub b2b_invoicing: bool,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub portal_return_url: String,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            active_env: EnvKind::Test,
            grant_to: GrantTarget::Subscriber,
            b2b_invoicing: false,
            checkout_success_url: "https://localhost/billing/success".to_string(),
            checkout_cancel_url: "https://localhost/billing/cancel".to_string(),
            portal_return_url: "https://localhost/billing".to_string(),
        }
    }
}

/// Contenedor de estado compartido (thread-safe) del orquestador.
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico del ledger (libSQL).
    pub ledger_client: LedgerClient,
    /// Ledger de créditos de doble asiento.
    pub credits: Arc<CreditLedgerRepository>,
    /// Vista monetaria micro-centavo.
    pub wallet: Arc<WalletRepository>,
    /// Espejo replicado de Stripe (solo lectura).
    pub mirror: Arc<StripeMirrorRepository>,
    /// Catálogo declarativo de planes.
    pub catalog: Arc<BillingConfig>,
    pub settings: Arc<BillingSettings>,
    /// Puente abstracto hacia el procesador de pagos.
    pub payment_gateway: Arc<dyn PaymentGateway>,

    // --- MOTORES DE NEGOCIO ---
    pub lifecycle: Arc<LifecycleApplier>,
    pub topup: Arc<TopUpEngine>,
    pub seats: Arc<SeatProvisioningService>,
    pub subscriptions: Arc<SubscriptionQueryService>,

    /// Token simétrico para la superficie API; None deja la API abierta
    /// (desarrollo local y Proving Grounds).
    pub api_access_token: Option<Arc<str>>,
}

impl AppState {
    /**
     * Ensambla el estado completo a partir de las piezas de infraestructura.
     * Único punto donde se cablean repositorios con motores.
     */
    pub fn assemble(
        ledger_client: LedgerClient,
        payment_gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<BillingConfig>,
        settings: BillingSettings,
        event_sink: Arc<dyn CreditEventSink>,
        api_access_token: Option<String>,
    ) -> Self {
        let settings = Arc::new(settings);
        let credits = Arc::new(CreditLedgerRepository::new(ledger_client.clone()));
        let wallet = Arc::new(WalletRepository::new(ledger_client.clone()));
        let mirror = Arc::new(StripeMirrorRepository::new(ledger_client.clone()));
        let seat_rows = Arc::new(SeatRepository::new(ledger_client.clone()));

        let lifecycle = Arc::new(LifecycleApplier::new(
            credits.clone(),
            mirror.clone(),
            seat_rows.clone(),
            catalog.clone(),
            settings.clone(),
            event_sink.clone(),
        ));

        let topup = Arc::new(TopUpEngine::new(
            credits.clone(),
            mirror.clone(),
            payment_gateway.clone(),
            catalog.clone(),
            settings.clone(),
            event_sink.clone(),
        ));

        let seats = Arc::new(SeatProvisioningService::new(
            credits.clone(),
            mirror.clone(),
            seat_rows,
            payment_gateway.clone(),
            catalog.clone(),
            settings.clone(),
            event_sink,
        ));

        let subscriptions = Arc::new(SubscriptionQueryService::new(
            mirror.clone(),
            catalog.clone(),
            settings.clone(),
        ));

        Self {
            ledger_client,
            credits,
            wallet,
            mirror,
            catalog,
            settings,
            payment_gateway,
            lifecycle,
            topup,
            seats,
            subscriptions,
            api_access_token: api_access_token.map(Into::into),
        }
    }
}
