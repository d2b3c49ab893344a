//! Payment gateway integration
//!
//! Orders are created with the gateway for a bill amount in minor units. The
//! hosted checkout returns `(order_id, payment_id, signature)` to the client,
//! and the signature is checked here before any bill is marked paid:
//!
//! ```text
//! signature = hex(HMAC-SHA256(key_secret, order_id + "|" + payment_id))
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{DeskError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Order as acknowledged by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Compute the callback signature for an order/payment pair.
pub fn sign_payment(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex callback signature.
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key_secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Hosted-checkout payment gateway.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> String;

    /// Create an order for `amount_minor` units of `currency`.
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder>;

    /// Check a checkout callback signature.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Razorpay-compatible orders API client.
pub struct RazorpayGateway {
    http: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(api_base: impl Into<String>, key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        let url = format!("{}/v1/orders", self.api_base);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderRequest {
                amount: amount_minor,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| DeskError::Gateway(format!("order request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "Gateway rejected order");
            return Err(DeskError::Gateway(format!("gateway returned {status}")));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| DeskError::Gateway(format!("invalid order response: {e}")))?;
        debug!(order_id = %order.id, amount = order.amount, "Gateway order created");
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

/// Gateway that mints orders locally, for development and tests.
pub struct OfflineGateway {
    key_id: String,
    key_secret: String,
}

impl OfflineGateway {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    /// Sign a payment the way the hosted checkout would.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        sign_payment(&self.key_secret, order_id, payment_id)
    }
}

#[async_trait]
impl PaymentGateway for OfflineGateway {
    fn key_id(&self) -> String {
        self.key_id.clone()
    }

    async fn create_order(&self, amount_minor: i64, currency: &str, _receipt: &str) -> Result<GatewayOrder> {
        if amount_minor <= 0 {
            return Err(DeskError::Gateway("order amount must be positive".into()));
        }
        Ok(GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: amount_minor,
            currency: currency.to_string(),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }
}
