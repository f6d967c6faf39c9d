// [libs/infra/stripe/src/gateway.rs]
/*!
 * =================================================================
 * APARATO: PAYMENT GATEWAY CONTRACT (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CONTRACT (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDADES DEL PROCESADOR CONSUMIDAS POR EL NÚCLEO
 *
 * Superficie mínima: intentos de pago, facturas, sesiones de checkout
 * y portal, customers y cantidad de ítems de suscripción (asientos).
 * =================================================================
 */

use crate::errors::GatewayError;
use crate::types::{
    CheckoutSession, Customer, Invoice, InvoiceItem, PaymentIntent, PortalSession,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Petición de intento de pago fuera de sesión.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntent {
    pub customer: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub off_session: bool,
    pub confirm: bool,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// Petición de factura en borrador.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub customer: String,
    pub auto_advance: bool,
    /// Recaudación automática con el método en archivo, o envío de factura.
    pub collection_method: String,
    /// Solo para collection_method = send_invoice.
    pub days_until_due: Option<i64>,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// Línea de cargo para una factura en borrador.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub customer: String,
    pub invoice: String,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
}

/// Línea ad-hoc de una sesión de checkout.
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: i64,
}

/// Petición de sesión de checkout alojada. Para suscripciones se
/// referencia un price_id del catálogo; para pagos puntuales se
/// describen líneas ad-hoc con price_data.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSession {
    pub customer: Option<String>,
    pub mode: String,
    pub subscription_price_id: Option<String>,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// Contrato asíncrono del procesador de pagos.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntent,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError>;

    async fn create_invoice(&self, request: CreateInvoice) -> Result<Invoice, GatewayError>;

    async fn create_invoice_item(
        &self,
        request: CreateInvoiceItem,
    ) -> Result<InvoiceItem, GatewayError>;

    async fn finalize_invoice(&self, id: &str) -> Result<Invoice, GatewayError>;

    async fn pay_invoice(&self, id: &str) -> Result<Invoice, GatewayError>;

    async fn void_invoice(&self, id: &str) -> Result<Invoice, GatewayError>;

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSession,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, GatewayError>;

    async fn create_portal_session(
        &self,
        customer: &str,
        return_url: &str,
    ) -> Result<PortalSession, GatewayError>;

    async fn retrieve_customer(&self, id: &str) -> Result<Customer, GatewayError>;

    /// Ajusta la cantidad del ítem de suscripción (planes por asiento).
    async fn update_subscription_item_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> Result<(), GatewayError>;
}
