// INICIO DEL ARCHIVO [libs/infra/stripe/src/errors.rs]
//! =================================================================
//! APARATO: GATEWAY ERRORS (V4.0)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DEL PROCESADOR DE PAGOS
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("NETWORK_UNREACHABLE: Failed to reach payment processor: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("ENVELOPE_CORRUPTION: Failed to decode processor payload: {0}")]
    DecodingFault(#[from] serde_json::Error),

    /// Error semántico devuelto por el procesador (cuerpo `error`).
    #[error("PROCESSOR_REJECTION[{error_type}]: {message}")]
    ApiFault {
        error_type: String,
        code: Option<String>,
        message: String,
    },

    #[error("GATEWAY_MISUSE: {0}")]
    Misuse(String),
}

impl GatewayError {
    /// Fallo de tarjeta (fondos, vencimiento, rechazo del emisor).
    pub fn is_card_error(&self) -> bool {
        matches!(self, GatewayError::ApiFault { error_type, .. } if error_type == "card_error")
    }

    /// Petición malformada según el procesador (montos fuera de rango).
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            GatewayError::ApiFault { error_type, .. } if error_type == "invalid_request_error"
        )
    }

    pub fn card_declined(message: &str) -> Self {
        GatewayError::ApiFault {
            error_type: "card_error".to_string(),
            code: Some("card_declined".to_string()),
            message: message.to_string(),
        }
    }

    pub fn invalid_request(message: &str) -> Self {
        GatewayError::ApiFault {
            error_type: "invalid_request_error".to_string(),
            code: None,
            message: message.to_string(),
        }
    }
}
// FIN DEL ARCHIVO [libs/infra/stripe/src/errors.rs]
