// INICIO DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * Orden de ignición: catálogo -> cliente del ledger (aplica esquema)
 * -> gateway -> estado -> socket TCP. El servidor jamás abre el
 * puerto con un catálogo ilegible o un ledger inalcanzable.
 * =================================================================
 */

use crate::routes::create_billing_router;
use crate::services::LoggingEventSink;
use crate::state::{AppState, BillingSettings};
use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tesoro_domain_billing::{BillingConfig, EnvKind, GrantTarget};
use tesoro_infra_db::LedgerClient;
use tesoro_infra_stripe::StripeGateway;
use tracing::{info, instrument};

pub struct OrchestratorKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
}

impl OrchestratorKernel {
    /**
     * Ensambla el kernel desde el entorno del proceso.
     *
     * Variables consumidas: DATABASE_URL, TURSO_AUTH_TOKEN,
     * LEDGER_NAMESPACE, BILLING_CONFIG_PATH, BILLING_ENV,
     * CREDIT_GRANT_TARGET, B2B_INVOICING, STRIPE_SECRET_KEY,
     * API_ACCESS_TOKEN, CHECKOUT_*_URL, PORTAL_RETURN_URL, PORT.
     */
    #[instrument]
    pub async fn ignite_from_environment() -> Result<Self> {
        let database_connection_url =
            env::var("DATABASE_URL").context("CRITICAL_FAULT: DATABASE_URL not defined")?;
        let database_access_token = env::var("TURSO_AUTH_TOKEN").ok();
        let table_namespace = env::var("LEDGER_NAMESPACE").ok();

        let catalog_path = env::var("BILLING_CONFIG_PATH")
            .unwrap_or_else(|_| "billing.config.json".to_string());
        let catalog_document = tokio::fs::read_to_string(&catalog_path)
            .await
            .with_context(|| format!("CATALOG_VOID: cannot read '{}'", catalog_path))?;
        let catalog = BillingConfig::from_json_str(&catalog_document)
            .context("CATALOG_CORRUPTION: billing config rejected")?;

        let settings = BillingSettings {
            active_env: match env::var("BILLING_ENV").as_deref() {
                Ok("production") => EnvKind::Production,
                _ => EnvKind::Test,
            },
            grant_to: match env::var("CREDIT_GRANT_TARGET").as_deref() {
                Ok("seat-users") => GrantTarget::SeatUsers,
                Ok("manual") => GrantTarget::Manual,
                _ => catalog.grant_to,
            },
            b2b_invoicing: env::var("B2B_INVOICING").as_deref() == Ok("true"),
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| BillingSettings::default().checkout_success_url),
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| BillingSettings::default().checkout_cancel_url),
            portal_return_url: env::var("PORTAL_RETURN_URL")
                .unwrap_or_else(|_| BillingSettings::default().portal_return_url),
        };

        let secret_key = env::var("STRIPE_SECRET_KEY")
            .context("CRITICAL_FAULT: STRIPE_SECRET_KEY not defined")?;

        let listening_network_port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let ledger_client =
            LedgerClient::connect(&database_connection_url, database_access_token, table_namespace)
                .await
                .context("FATAL: Ledger link collapse. Ignition aborted.")?;

        let application_state = AppState::assemble(
            ledger_client,
            Arc::new(StripeGateway::new(secret_key)),
            Arc::new(catalog),
            settings,
            Arc::new(LoggingEventSink),
            env::var("API_ACCESS_TOKEN").ok(),
        );

        Ok(Self { server_network_port: listening_network_port, application_state })
    }

    /// Abre el socket y sirve la topología de rutas hasta el apagado.
    pub async fn launch_sovereign_operations(self) -> Result<()> {
        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static bind address"),
            self.server_network_port,
        );

        let billing_router = create_billing_router(self.application_state);

        info!("🛰️  [COMMAND_CENTER]: Billing engine listening on {}", bind_address);
        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .context("SOCKET_BIND_FAULT")?;

        axum::serve(tcp_listener, billing_router)
            .await
            .context("HTTP_SERVE_FAULT")?;
        Ok(())
    }
}
// FIN DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
