// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: LEDGER ERROR CATALOG (V4.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * Cada variante con contraparte en el contrato público expone su
 * código canónico vía `code()`, que es lo que viaja a los clientes.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Error de enlace físico o de red con el cluster de base de datos.
    #[error("[L3_LEDGER_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_LEDGER_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_LEDGER_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el dominio Rust.
    #[error("[L3_LEDGER_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    // --- ESTRATO DE VALIDACIÓN CONTABLE ---

    /// Monto cero o negativo en una operación que exige montos positivos.
    #[error("[L3_LEDGER_FAULT]: INVALID_AMOUNT -> {0}")]
    InvalidAmount(String),

    /// La clave de idempotencia ya fue consumida por otra operación.
    #[error("[L3_LEDGER_FAULT]: IDEMPOTENCY_CONFLICT -> key '{0}' already consumed")]
    IdempotencyConflict(String),

    /// La fila de balance está anclada a otra divisa.
    #[error("[L3_LEDGER_FAULT]: CURRENCY_MISMATCH -> balance pinned to '{pinned}', got '{supplied}'")]
    CurrencyMismatch { pinned: String, supplied: String },

    // --- ESTRATO DE ASIENTOS DE EQUIPO ---

    /// El usuario ya ocupa un asiento en otra suscripción.
    #[error("[L3_SEAT_FAULT]: SEAT_CONFLICT -> user already a seat of subscription '{0}'")]
    SeatConflict(String),

    /// No existe fila de asiento para el usuario solicitado.
    #[error("[L3_SEAT_FAULT]: SEAT_NOT_FOUND")]
    SeatNotFound,
}

impl LedgerError {
    /// Código canónico del contrato público para fallos con contraparte API.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::IdempotencyConflict(_) => "IDEMPOTENCY_CONFLICT",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::SeatConflict(_) => "SEAT_CONFLICT",
            LedgerError::SeatNotFound => "SEAT_NOT_FOUND",
            _ => "LEDGER_INFRASTRUCTURE_FAULT",
        }
    }

    /// Discrimina la violación de unicidad de SQLite para traducirla
    /// al conflicto de idempotencia del contrato.
    pub fn is_unique_violation(database_error: &libsql::Error) -> bool {
        database_error.to_string().contains("UNIQUE constraint failed")
    }
}
