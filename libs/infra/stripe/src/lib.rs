// [libs/infra/stripe/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PAYMENT GATEWAY BRIDGE (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ENLACE ABSTRACTO CON EL PROCESADOR DE PAGOS
 *
 * El núcleo contable jamás habla HTTP: consume el contrato
 * `PaymentGateway`. El cliente en vivo y el simulado implementan el
 * mismo contrato, lo que mantiene el Proving Grounds sin red.
 * =================================================================
 */

pub mod errors;
pub mod gateway;
pub mod live;
pub mod mock;
pub mod types;

pub use errors::GatewayError;
pub use gateway::{
    CheckoutLineItem, CreateCheckoutSession, CreateInvoice, CreateInvoiceItem,
    CreatePaymentIntent, PaymentGateway,
};
pub use live::StripeGateway;
pub use mock::MockGateway;
pub use types::{
    CheckoutSession, Customer, Invoice, InvoiceItem, PaymentIntent, PaymentIntentStatus,
    PortalSession, StripeEvent, Subscription,
};
