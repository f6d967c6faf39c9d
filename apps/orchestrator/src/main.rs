// [apps/orchestrator/src/main.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR MAIN ENTRY POINT (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 * =================================================================
 */

use dotenvy::dotenv;
use tesoro_orchestrator::prelude::*;
use tesoro_shared_heimdall::init_tracing;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (HEIMDALL)
    init_tracing("tesoro_orchestrator");

    // 3. RUNTIME SOBERANO
    let runtime_orchestrator = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_orchestrator.block_on(async {
        info!("🛰️  [COMMAND_CENTER]: Billing engine ignition sequence starting...");

        let kernel_instance = match OrchestratorKernel::ignite_from_environment().await {
            Ok(kernel) => kernel,
            Err(ignition_fault) => {
                error!("❌ [IGNITION_FAULT]: {:#}", ignition_fault);
                std::process::exit(1);
            }
        };

        if let Err(serve_fault) = kernel_instance.launch_sovereign_operations().await {
            error!("❌ [RUNTIME_FAULT]: {:#}", serve_fault);
            std::process::exit(1);
        }
    });

    Ok(())
}
