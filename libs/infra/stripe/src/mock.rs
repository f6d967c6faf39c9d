// [libs/infra/stripe/src/mock.rs]
/*!
 * =================================================================
 * APARATO: PROVING GROUNDS GATEWAY (V4.0)
 * CLASIFICACIÓN: TEST DOUBLE (ESTRATO L3-MIRROR)
 * RESPONSABILIDAD: PROCESADOR SIMULADO Y PROGRAMABLE SIN RED
 *
 * Reproduce la semántica observable del procesador que el núcleo
 * consume: estados de intento de pago, idempotencia de creación,
 * facturas pagables/anulables y sesiones alojadas con URL.
 * =================================================================
 */

use crate::errors::GatewayError;
use crate::gateway::{
    CreateCheckoutSession, CreateInvoice, CreateInvoiceItem, CreatePaymentIntent, PaymentGateway,
};
use crate::types::{
    CheckoutSession, Customer, Invoice, InvoiceItem, PaymentIntent, PaymentIntentStatus,
    PortalSession,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct MockLedger {
    /// Estado que adoptará el próximo intento de pago creado.
    scripted_intent_status: Option<PaymentIntentStatus>,
    /// Fallo inyectado para la próxima creación de intento.
    scripted_intent_fault: Option<GatewayError>,
    /// Fallo inyectado para el próximo pago de factura.
    scripted_invoice_pay_fault: Option<GatewayError>,

    /// Idempotencia de creación: misma clave, mismo intento.
    intents_by_idempotency: HashMap<String, PaymentIntent>,
    intents_by_id: HashMap<String, PaymentIntent>,
    invoices_by_id: HashMap<String, Invoice>,
    sessions_by_id: HashMap<String, CheckoutSession>,
    customers_by_id: HashMap<String, Customer>,

    created_intents: Vec<CreatePaymentIntent>,
    voided_invoices: Vec<String>,
    quantity_updates: Vec<(String, i64)>,
}

/// Gateway simulado, programable por test.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockLedger>,
    sequence: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_identifier(&self, prefix: &str) -> String {
        let ordinal = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_{:06}", prefix, ordinal)
    }

    // --- PROGRAMACIÓN DEL ESCENARIO ---

    pub fn script_intent_status(&self, status: PaymentIntentStatus) {
        self.state.lock().unwrap().scripted_intent_status = Some(status);
    }

    pub fn script_intent_fault(&self, fault: GatewayError) {
        self.state.lock().unwrap().scripted_intent_fault = Some(fault);
    }

    pub fn script_invoice_pay_fault(&self, fault: GatewayError) {
        self.state.lock().unwrap().scripted_invoice_pay_fault = Some(fault);
    }

    pub fn register_customer(&self, customer: Customer) {
        self.state.lock().unwrap().customers_by_id.insert(customer.id.clone(), customer);
    }

    // --- EVIDENCIA PARA EL PROVING GROUNDS ---

    pub fn created_intents(&self) -> Vec<CreatePaymentIntent> {
        self.state.lock().unwrap().created_intents.clone()
    }

    pub fn voided_invoices(&self) -> Vec<String> {
        self.state.lock().unwrap().voided_invoices.clone()
    }

    pub fn quantity_updates(&self) -> Vec<(String, i64)> {
        self.state.lock().unwrap().quantity_updates.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntent,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock().unwrap();

        if let Some(fault) = state.scripted_intent_fault.take() {
            return Err(fault);
        }

        // Idempotencia del procesador: la misma clave devuelve el
        // intento original sin crear un segundo cargo.
        if let Some(idempotency_key) = &request.idempotency_key {
            if let Some(existing_intent) = state.intents_by_idempotency.get(idempotency_key) {
                return Ok(existing_intent.clone());
            }
        }

        let status = state
            .scripted_intent_status
            .take()
            .unwrap_or(PaymentIntentStatus::Succeeded);

        drop(state);
        let payment_intent = PaymentIntent {
            id: self.next_identifier("pi"),
            status,
            amount: request.amount,
            currency: request.currency.clone(),
            customer: Some(request.customer.clone()),
            metadata: request.metadata.clone(),
        };
        let mut state = self.state.lock().unwrap();

        if let Some(idempotency_key) = &request.idempotency_key {
            state
                .intents_by_idempotency
                .insert(idempotency_key.clone(), payment_intent.clone());
        }
        state.intents_by_id.insert(payment_intent.id.clone(), payment_intent.clone());
        state.created_intents.push(request);

        Ok(payment_intent)
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        self.state
            .lock()
            .unwrap()
            .intents_by_id
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::invalid_request(&format!("No such payment_intent: {}", id)))
    }

    async fn create_invoice(&self, request: CreateInvoice) -> Result<Invoice, GatewayError> {
        let invoice_id = self.next_identifier("in");
        let invoice = Invoice {
            hosted_invoice_url: Some(format!("https://invoice.stripe.com/i/{}", invoice_id)),
            id: invoice_id,
            status: Some("draft".to_string()),
            customer: Some(request.customer.clone()),
            amount_due: 0,
            currency: "usd".to_string(),
            paid: false,
            billing_reason: Some("manual".to_string()),
            subscription: None,
            metadata: request.metadata.clone(),
        };
        self.state.lock().unwrap().invoices_by_id.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    async fn create_invoice_item(
        &self,
        request: CreateInvoiceItem,
    ) -> Result<InvoiceItem, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let invoice = state
            .invoices_by_id
            .get_mut(&request.invoice)
            .ok_or_else(|| GatewayError::invalid_request("No such invoice"))?;
        invoice.amount_due += request.amount;
        invoice.currency = request.currency.clone();

        Ok(InvoiceItem {
            id: format!("ii_{}", invoice.id),
            invoice: Some(request.invoice.clone()),
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn finalize_invoice(&self, id: &str) -> Result<Invoice, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let invoice = state
            .invoices_by_id
            .get_mut(id)
            .ok_or_else(|| GatewayError::invalid_request("No such invoice"))?;
        invoice.status = Some("open".to_string());
        Ok(invoice.clone())
    }

    async fn pay_invoice(&self, id: &str) -> Result<Invoice, GatewayError> {
        let mut state = self.state.lock().unwrap();

        if let Some(fault) = state.scripted_invoice_pay_fault.take() {
            return Err(fault);
        }

        let invoice = state
            .invoices_by_id
            .get_mut(id)
            .ok_or_else(|| GatewayError::invalid_request("No such invoice"))?;
        invoice.status = Some("paid".to_string());
        invoice.paid = true;
        Ok(invoice.clone())
    }

    async fn void_invoice(&self, id: &str) -> Result<Invoice, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.voided_invoices.push(id.to_string());
        let invoice = state
            .invoices_by_id
            .get_mut(id)
            .ok_or_else(|| GatewayError::invalid_request("No such invoice"))?;
        invoice.status = Some("void".to_string());
        Ok(invoice.clone())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSession,
    ) -> Result<CheckoutSession, GatewayError> {
        let session_id = self.next_identifier("cs");
        let session = CheckoutSession {
            url: Some(format!("https://checkout.stripe.com/c/pay/{}", session_id)),
            id: session_id,
            payment_status: Some("unpaid".to_string()),
            customer: request.customer.clone(),
            metadata: request.metadata.clone(),
        };
        self.state.lock().unwrap().sessions_by_id.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, GatewayError> {
        self.state
            .lock()
            .unwrap()
            .sessions_by_id
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::invalid_request("No such checkout session"))
    }

    async fn create_portal_session(
        &self,
        customer: &str,
        _return_url: &str,
    ) -> Result<PortalSession, GatewayError> {
        Ok(PortalSession {
            id: self.next_identifier("bps"),
            url: format!("https://billing.stripe.com/p/session/{}", customer),
        })
    }

    async fn retrieve_customer(&self, id: &str) -> Result<Customer, GatewayError> {
        self.state
            .lock()
            .unwrap()
            .customers_by_id
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::invalid_request(&format!("No such customer: {}", id)))
    }

    async fn update_subscription_item_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> Result<(), GatewayError> {
        self.state.lock().unwrap().quantity_updates.push((item_id.to_string(), quantity));
        Ok(())
    }
}
