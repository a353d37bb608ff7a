// PayPal Module
// Payment gateway abstraction and the PayPal REST client behind it

pub mod api;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{PayPalConfig, ShopConfig};
use crate::money::Price;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("PayPal create payment error.")]
    Create(String),

    #[error("PayPal execute payment error.")]
    Execute(String),

    #[error("PayPal payments are not enabled.")]
    Disabled,
}

/// One basket line as sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentItem {
    pub sku: i64,
    pub name: String,
    pub description: String,
    pub quantity: u32,
    pub price: Price,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub items: Vec<PaymentItem>,
    pub subtotal: Price,
    pub shipping: Price,
    pub invoice_number: String,
}

impl PaymentRequest {
    pub fn total(&self) -> Price {
        self.subtotal + self.shipping
    }
}

/// Payment awaiting the payer's approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayment {
    pub id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedPayment {
    pub id: String,
    pub state: String,
}

impl ExecutedPayment {
    pub fn is_approved(&self) -> bool {
        self.state == "approved"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, PaymentError>;

    async fn execute_payment(&self, payment_id: &str, payer_id: &str) -> Result<ExecutedPayment, PaymentError>;
}

/// Build the gateway selected by configuration
pub fn gateway_from_config(config: &ShopConfig) -> Arc<dyn PaymentGateway> {
    if config.paypal.enabled {
        Arc::new(PayPalClient::new(
            &config.paypal,
            &config.shop.domain,
            &config.shop.currency,
            &config.shop.title,
        ))
    } else {
        Arc::new(DisabledGateway)
    }
}

/// Gateway used when online payments are switched off
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_payment(&self, _request: &PaymentRequest) -> Result<CreatedPayment, PaymentError> {
        Err(PaymentError::Disabled)
    }

    async fn execute_payment(&self, _payment_id: &str, _payer_id: &str) -> Result<ExecutedPayment, PaymentError> {
        Err(PaymentError::Disabled)
    }
}

struct AccessToken {
    value: String,
    expires: Instant,
}

/// PayPal REST v1 payments client
pub struct PayPalClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    secret: String,
    domain: String,
    currency: String,
    title: String,
    token: Mutex<Option<AccessToken>>,
}

impl PayPalClient {
    pub fn new(config: &PayPalConfig, domain: &str, currency: &str, title: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        info!(api_base = %config.api_base(), mode = ?config.mode, "PayPal client initialized");

        Self {
            http,
            api_base: config.api_base(),
            client_id: config.client_id.clone(),
            secret: config.secret.clone(),
            domain: domain.trim_end_matches('/').to_string(),
            currency: currency.to_string(),
            title: title.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Return URL the payer is sent back to; `approved` selects return or cancel
    pub fn redirect_url(&self, approved: bool) -> String {
        format!("{}/checkout/paypal?paypalPayment={}", self.domain, approved)
    }

    async fn access_token(&self) -> Result<String, reqwest::Error> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|token| token.expires > Instant::now())
            .map(|token| token.value.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        let response: api::TokenResponse = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        *self.token.lock() = Some(AccessToken {
            value: response.access_token.clone(),
            expires: Instant::now() + lifetime,
        });
        debug!(expires_in = response.expires_in, "PayPal access token refreshed");

        Ok(response.access_token)
    }

    async fn try_create(&self, request: &PaymentRequest) -> Result<CreatedPayment, String> {
        let token = self.access_token().await.map_err(|e| e.to_string())?;

        let items = request
            .items
            .iter()
            .map(|item| api::Item {
                sku: item.sku.to_string(),
                name: &item.name,
                description: &item.description,
                quantity: item.quantity.to_string(),
                price: item.price.to_decimal_string(),
                currency: &self.currency,
                url: &item.url,
            })
            .collect();

        let return_url = self.redirect_url(true);
        let cancel_url = self.redirect_url(false);
        let body = api::CreatePaymentBody {
            intent: "sale",
            payer: api::Payer { payment_method: "paypal" },
            transactions: vec![api::Transaction {
                amount: api::Amount {
                    currency: &self.currency,
                    total: request.total().to_decimal_string(),
                    details: api::Details {
                        subtotal: request.subtotal.to_decimal_string(),
                        shipping: request.shipping.to_decimal_string(),
                    },
                },
                description: format!("{} - order payment.", self.title),
                item_list: api::ItemList { items },
                invoice_number: &request.invoice_number,
            }],
            redirect_urls: api::RedirectUrls {
                return_url: &return_url,
                cancel_url: &cancel_url,
            },
        };

        let payment: api::PaymentResponse = self
            .http
            .post(format!("{}/v1/payments/payment", self.api_base))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        let approval_url = payment
            .approval_url()
            .ok_or_else(|| format!("payment {} has no approval link", payment.id))?
            .to_string();

        Ok(CreatedPayment {
            id: payment.id,
            approval_url,
        })
    }

    async fn try_execute(&self, payment_id: &str, payer_id: &str) -> Result<ExecutedPayment, String> {
        let token = self.access_token().await.map_err(|e| e.to_string())?;
        let url = format!("{}/v1/payments/payment/{}", self.api_base, payment_id);

        self.http
            .post(format!("{}/execute", url))
            .bearer_auth(&token)
            .json(&api::ExecuteBody { payer_id })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        let payment: api::PaymentResponse = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        Ok(ExecutedPayment {
            id: payment.id,
            state: payment.state,
        })
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    #[instrument(skip(self, request), fields(invoice = %request.invoice_number))]
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, PaymentError> {
        match self.try_create(request).await {
            Ok(payment) => {
                info!(payment_id = %payment.id, total = %request.total(), "PayPal payment created");
                Ok(payment)
            }
            Err(detail) => {
                warn!(error = %detail, "PayPal create payment failed");
                Err(PaymentError::Create(detail))
            }
        }
    }

    #[instrument(skip(self, payer_id))]
    async fn execute_payment(&self, payment_id: &str, payer_id: &str) -> Result<ExecutedPayment, PaymentError> {
        match self.try_execute(payment_id, payer_id).await {
            Ok(payment) => {
                info!(payment_id = %payment.id, state = %payment.state, "PayPal payment executed");
                Ok(payment)
            }
            Err(detail) => {
                warn!(error = %detail, "PayPal execute payment failed");
                Err(PaymentError::Execute(detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayPalMode;

    fn client() -> PayPalClient {
        let config = PayPalConfig {
            enabled: true,
            mode: PayPalMode::Sandbox,
            client_id: "id".into(),
            secret: "secret".into(),
            api_base: Some("http://127.0.0.1:9".into()),
        };
        PayPalClient::new(&config, "http://shop.example.com/", "GBP", "Inside")
    }

    #[test]
    fn test_redirect_urls() {
        let client = client();
        assert_eq!(
            client.redirect_url(true),
            "http://shop.example.com/checkout/paypal?paypalPayment=true"
        );
        assert_eq!(
            client.redirect_url(false),
            "http://shop.example.com/checkout/paypal?paypalPayment=false"
        );
    }

    #[test]
    fn test_request_total() {
        let request = PaymentRequest {
            items: vec![],
            subtotal: Price(1250),
            shipping: Price(299),
            invoice_number: "inv".into(),
        };
        assert_eq!(request.total(), Price(1549));
    }

    #[tokio::test]
    async fn test_unreachable_api_maps_to_payment_error() {
        let request = PaymentRequest {
            items: vec![],
            subtotal: Price(100),
            shipping: Price::ZERO,
            invoice_number: "inv".into(),
        };

        let err = client().create_payment(&request).await.unwrap_err();
        assert!(matches!(err, PaymentError::Create(_)));
        assert_eq!(err.to_string(), "PayPal create payment error.");

        let err = client().execute_payment("PAY-1", "PAYER").await.unwrap_err();
        assert_eq!(err.to_string(), "PayPal execute payment error.");
    }

    #[tokio::test]
    async fn test_disabled_gateway() {
        let err = DisabledGateway.execute_payment("PAY-1", "PAYER").await.unwrap_err();
        assert!(matches!(err, PaymentError::Disabled));
    }
}
