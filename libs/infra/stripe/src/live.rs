// [libs/infra/stripe/src/live.rs]
/*!
 * =================================================================
 * APARATO: LIVE PROCESSOR UPLINK (V4.0 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TÚNEL HTTPS FORM-ENCODED HACIA api.stripe.com
 *
 * El procesador habla application/x-www-form-urlencoded con claves
 * anidadas al estilo metadata[clave]. La clave de idempotencia del
 * núcleo viaja como cabecera Idempotency-Key.
 * =================================================================
 */

use crate::errors::GatewayError;
use crate::gateway::{
    CreateCheckoutSession, CreateInvoice, CreateInvoiceItem, CreatePaymentIntent, PaymentGateway,
};
use crate::types::{
    CheckoutSession, Customer, Invoice, InvoiceItem, PaymentIntent, PortalSession,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

const PROCESSOR_BASE_ENDPOINT: &str = "https://api.stripe.com/v1";

/// Cuerpo `error` devuelto por el procesador ante un rechazo.
#[derive(Deserialize)]
struct ProcessorErrorEnvelope {
    error: ProcessorErrorBody,
}

#[derive(Deserialize)]
struct ProcessorErrorBody {
    #[serde(default, rename = "type")]
    error_type: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

pub struct StripeGateway {
    network_session_client: Client,
    processor_base_endpoint: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            network_session_client: Client::builder()
                .user_agent("Tesoro-Ledger/V4.0")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("FATAL: Gateway client initialization failed."),
            processor_base_endpoint: PROCESSOR_BASE_ENDPOINT.to_string(),
            secret_key,
        }
    }

    /// Redirige el túnel a un endpoint alternativo (stripe-mock local).
    pub fn with_base_endpoint(mut self, base_endpoint: &str) -> Self {
        self.processor_base_endpoint = base_endpoint.trim_end_matches('/').to_string();
        self
    }

    #[instrument(skip(self, form_fields))]
    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        resource_path: &str,
        form_fields: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, GatewayError> {
        let target_url = format!("{}{}", self.processor_base_endpoint, resource_path);

        let mut network_request = self
            .network_session_client
            .post(&target_url)
            .bearer_auth(&self.secret_key)
            .form(form_fields);

        if let Some(key) = idempotency_key {
            network_request = network_request.header("Idempotency-Key", key);
        }

        let network_response = network_request.send().await?;
        let response_status = network_response.status();
        let response_body = network_response.text().await?;

        if response_status == StatusCode::OK {
            debug!("💳 [GATEWAY]: {} accepted.", resource_path);
            Ok(serde_json::from_str(&response_body)?)
        } else {
            let envelope: ProcessorErrorEnvelope = serde_json::from_str(&response_body)
                .unwrap_or(ProcessorErrorEnvelope {
                    error: ProcessorErrorBody {
                        error_type: "api_error".to_string(),
                        code: None,
                        message: format!("HTTP_{}", response_status),
                    },
                });
            Err(GatewayError::ApiFault {
                error_type: envelope.error.error_type,
                code: envelope.error.code,
                message: envelope.error.message,
            })
        }
    }

    async fn get_resource<T: serde::de::DeserializeOwned>(
        &self,
        resource_path: &str,
    ) -> Result<T, GatewayError> {
        let target_url = format!("{}{}", self.processor_base_endpoint, resource_path);
        let network_response = self
            .network_session_client
            .get(&target_url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let response_status = network_response.status();
        let response_body = network_response.text().await?;

        if response_status == StatusCode::OK {
            Ok(serde_json::from_str(&response_body)?)
        } else {
            Err(GatewayError::ApiFault {
                error_type: "api_error".to_string(),
                code: None,
                message: format!("HTTP_{} at {}", response_status, resource_path),
            })
        }
    }
}

fn push_metadata(form_fields: &mut Vec<(String, String)>, metadata: &std::collections::HashMap<String, String>) {
    for (metadata_key, metadata_value) in metadata {
        form_fields.push((format!("metadata[{}]", metadata_key), metadata_value.clone()));
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntent,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut form_fields = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("customer".to_string(), request.customer.clone()),
            ("off_session".to_string(), request.off_session.to_string()),
            ("confirm".to_string(), request.confirm.to_string()),
        ];
        if let Some(payment_method) = &request.payment_method {
            form_fields.push(("payment_method".to_string(), payment_method.clone()));
        }
        push_metadata(&mut form_fields, &request.metadata);

        self.post_form("/payment_intents", &form_fields, request.idempotency_key.as_deref())
            .await
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        self.get_resource(&format!("/payment_intents/{}", id)).await
    }

    async fn create_invoice(&self, request: CreateInvoice) -> Result<Invoice, GatewayError> {
        let mut form_fields = vec![
            ("customer".to_string(), request.customer.clone()),
            ("auto_advance".to_string(), request.auto_advance.to_string()),
            ("collection_method".to_string(), request.collection_method.clone()),
        ];
        if let Some(days_until_due) = request.days_until_due {
            form_fields.push(("days_until_due".to_string(), days_until_due.to_string()));
        }
        push_metadata(&mut form_fields, &request.metadata);

        self.post_form("/invoices", &form_fields, request.idempotency_key.as_deref()).await
    }

    async fn create_invoice_item(
        &self,
        request: CreateInvoiceItem,
    ) -> Result<InvoiceItem, GatewayError> {
        let mut form_fields = vec![
            ("customer".to_string(), request.customer.clone()),
            ("invoice".to_string(), request.invoice.clone()),
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
        ];
        if let Some(description) = &request.description {
            form_fields.push(("description".to_string(), description.clone()));
        }

        self.post_form("/invoiceitems", &form_fields, None).await
    }

    async fn finalize_invoice(&self, id: &str) -> Result<Invoice, GatewayError> {
        self.post_form(&format!("/invoices/{}/finalize", id), &[], None).await
    }

    async fn pay_invoice(&self, id: &str) -> Result<Invoice, GatewayError> {
        self.post_form(&format!("/invoices/{}/pay", id), &[], None).await
    }

    async fn void_invoice(&self, id: &str) -> Result<Invoice, GatewayError> {
        self.post_form(&format!("/invoices/{}/void", id), &[], None).await
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSession,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut form_fields = vec![
            ("mode".to_string(), request.mode.clone()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];
        if let Some(customer) = &request.customer {
            form_fields.push(("customer".to_string(), customer.clone()));
        }
        if let Some(price_id) = &request.subscription_price_id {
            form_fields.push(("line_items[0][price]".to_string(), price_id.clone()));
            form_fields.push(("line_items[0][quantity]".to_string(), "1".to_string()));
        }
        for (item_index, line_item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", item_index);
            form_fields.push((
                format!("{}[price_data][product_data][name]", prefix),
                line_item.name.clone(),
            ));
            form_fields.push((
                format!("{}[price_data][unit_amount]", prefix),
                line_item.unit_amount.to_string(),
            ));
            form_fields.push((
                format!("{}[price_data][currency]", prefix),
                line_item.currency.clone(),
            ));
            form_fields.push((format!("{}[quantity]", prefix), line_item.quantity.to_string()));
        }
        push_metadata(&mut form_fields, &request.metadata);

        self.post_form("/checkout/sessions", &form_fields, None).await
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, GatewayError> {
        self.get_resource(&format!("/checkout/sessions/{}", id)).await
    }

    async fn create_portal_session(
        &self,
        customer: &str,
        return_url: &str,
    ) -> Result<PortalSession, GatewayError> {
        let form_fields = vec![
            ("customer".to_string(), customer.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post_form("/billing_portal/sessions", &form_fields, None).await
    }

    async fn retrieve_customer(&self, id: &str) -> Result<Customer, GatewayError> {
        self.get_resource(&format!("/customers/{}", id)).await
    }

    async fn update_subscription_item_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> Result<(), GatewayError> {
        let form_fields = vec![("quantity".to_string(), quantity.to_string())];
        let _updated: serde_json::Value = self
            .post_form(&format!("/subscription_items/{}", item_id), &form_fields, None)
            .await?;
        Ok(())
    }
}
