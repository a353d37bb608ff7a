// Wire payloads of the PayPal REST v1 payments API

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentBody<'a> {
    pub intent: &'static str,
    pub payer: Payer,
    pub transactions: Vec<Transaction<'a>>,
    pub redirect_urls: RedirectUrls<'a>,
}

#[derive(Debug, Serialize)]
pub struct Payer {
    pub payment_method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Transaction<'a> {
    pub amount: Amount<'a>,
    pub description: String,
    pub item_list: ItemList<'a>,
    pub invoice_number: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Amount<'a> {
    pub currency: &'a str,
    pub total: String,
    pub details: Details,
}

#[derive(Debug, Serialize)]
pub struct Details {
    pub subtotal: String,
    pub shipping: String,
}

#[derive(Debug, Serialize)]
pub struct ItemList<'a> {
    pub items: Vec<Item<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Item<'a> {
    pub sku: String,
    pub name: &'a str,
    pub description: &'a str,
    pub quantity: String,
    pub price: String,
    pub currency: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RedirectUrls<'a> {
    pub return_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ExecuteBody<'a> {
    pub payer_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl PaymentResponse {
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "approval_url")
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_url_from_links() {
        let response: PaymentResponse = serde_json::from_str(
            r#"{
                "id": "PAY-1",
                "state": "created",
                "links": [
                    {"href": "https://api.sandbox.paypal.com/v1/payments/payment/PAY-1", "rel": "self", "method": "GET"},
                    {"href": "https://www.sandbox.paypal.com/cgi-bin/webscr?token=EC-1", "rel": "approval_url", "method": "REDIRECT"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            response.approval_url(),
            Some("https://www.sandbox.paypal.com/cgi-bin/webscr?token=EC-1")
        );
    }

    #[test]
    fn test_create_body_shape() {
        let body = CreatePaymentBody {
            intent: "sale",
            payer: Payer { payment_method: "paypal" },
            transactions: vec![Transaction {
                amount: Amount {
                    currency: "GBP",
                    total: "15.49".into(),
                    details: Details {
                        subtotal: "12.50".into(),
                        shipping: "2.99".into(),
                    },
                },
                description: "Inside - order payment.".into(),
                item_list: ItemList { items: vec![] },
                invoice_number: "inv-1",
            }],
            redirect_urls: RedirectUrls {
                return_url: "http://localhost/checkout/paypal?paypalPayment=true",
                cancel_url: "http://localhost/checkout/paypal?paypalPayment=false",
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["intent"], "sale");
        assert_eq!(value["transactions"][0]["amount"]["details"]["shipping"], "2.99");
        assert_eq!(value["payer"]["payment_method"], "paypal");
    }
}
