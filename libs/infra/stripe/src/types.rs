// [libs/infra/stripe/src/types.rs]
/*!
 * =================================================================
 * APARATO: PROCESSOR WIRE TYPES (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE TYPES (ESTRATO L3)
 * RESPONSABILIDAD: FORMA TIPADA DE LOS OBJETOS DEL PROCESADOR
 *
 * Decodificación tolerante: los objetos de Stripe traen decenas de
 * campos; aquí solo se tipa lo que el núcleo consume y el resto se
 * ignora. La metadata viaja como mapa plano string -> string.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sobre exterior de todo evento de webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
    /// Campos previos en eventos `*.updated` (delta de Stripe).
    #[serde(default)]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEventData {
    /// price_id anterior en un `customer.subscription.updated`.
    pub fn previous_price_id(&self) -> Option<&str> {
        self.previous_attributes
            .as_ref()?
            .pointer("/items/data/0/price/id")
            .and_then(serde_json::Value::as_str)
    }
}

impl StripeEvent {
    /// Decodifica el objeto interior al tipo esperado por la ruta.
    pub fn object_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Estado del intento de pago según el procesador.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    RequiresConfirmation,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: PaymentIntentStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub billing_reason: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice: Option<String>,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInvoiceSettings {
    #[serde(default)]
    pub default_payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub invoice_settings: Option<CustomerInvoiceSettings>,
}

/// Objeto de suscripción tal como llega en los webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub items: SubscriptionItemList,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionItemList {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    pub price: SubscriptionPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPrice {
    pub id: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub recurring: Option<PriceRecurring>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecurring {
    pub interval: String,
}

impl Subscription {
    /// Primer ítem de la suscripción (el modelo de un solo precio).
    pub fn primary_item(&self) -> Option<&SubscriptionItem> {
        self.items.data.first()
    }

    pub fn price_id(&self) -> Option<&str> {
        self.primary_item().map(|item| item.price.id.as_str())
    }

    pub fn item_id(&self) -> Option<&str> {
        self.primary_item().map(|item| item.id.as_str())
    }

    pub fn interval(&self) -> &str {
        self.primary_item()
            .and_then(|item| item.price.recurring.as_ref())
            .map(|recurring| recurring.interval.as_str())
            .unwrap_or("month")
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
