// End-to-end storefront flows driven through the axum router

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use eshop::config::ShopConfig;
use eshop::database::{seed::seed_demo_data, Database};
use eshop::mail::LogMailer;
use eshop::paypal::{CreatedPayment, ExecutedPayment, PaymentError, PaymentGateway, PaymentRequest};
use eshop::session::{Clock, SessionStore};
use eshop::{http, AppState};

const APPROVAL_URL: &str = "https://www.sandbox.paypal.com/checkoutnow?token=EC-TEST";

struct FakeGateway;

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, PaymentError> {
        assert!(!request.items.is_empty());
        Ok(CreatedPayment {
            id: "PAY-TEST".to_string(),
            approval_url: APPROVAL_URL.to_string(),
        })
    }

    async fn execute_payment(&self, payment_id: &str, payer_id: &str) -> Result<ExecutedPayment, PaymentError> {
        Ok(ExecutedPayment {
            id: payment_id.to_string(),
            state: if payer_id == "PAYER-OK" { "approved" } else { "failed" }.to_string(),
        })
    }
}

/// Browser-like client keeping the session cookie between requests
struct Shop {
    app: Router,
    state: AppState,
    cookie: Option<String>,
    outbox: tempfile::TempDir,
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

impl Shop {
    fn new() -> Self {
        Self::with_clock(Clock::System)
    }

    fn with_clock(clock: Clock) -> Self {
        let outbox = tempfile::tempdir().unwrap();
        let mut config = ShopConfig::default();
        config.paypal.enabled = true;

        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db).unwrap();

        let state = AppState::with_services(
            config.clone(),
            db,
            Arc::new(SessionStore::with_clock(config.session.lifetime(), clock)),
            Arc::new(FakeGateway),
            Arc::new(LogMailer::new(Some(outbox.path().to_path_buf()))),
        );

        Self {
            app: http::router(state.clone()),
            state,
            cookie: None,
            outbox,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();

        if let Some(set_cookie) = headers.get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        Reply { status, headers, body }
    }

    async fn get(&mut self, uri: &str) -> Reply {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> Reply {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn register(&mut self) -> Reply {
        self.post(
            "/register",
            json!({
                "email": "jane@example.com",
                "forename": "Jane",
                "surname": "Doe",
                "password": "secret123",
                "confirmPassword": "secret123"
            }),
        )
        .await
    }

    fn session_id(&self) -> String {
        self.cookie.as_deref().unwrap().trim_start_matches("MAIN=").to_string()
    }
}

fn checkout_form(payment: i64) -> Value {
    json!({
        "email": "jane@example.com",
        "billingForename": "Janet",
        "billingSurname": "Doe",
        "billingAddress": "1 High Street",
        "billingCity": "York",
        "billingZip": "YO1 7HH",
        "shipping": 1,
        "payment": payment,
        "terms": true
    })
}

#[tokio::test]
async fn test_health_sets_cookie_and_security_headers() {
    let mut shop = Shop::new();
    let reply = shop.get("/health").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
    assert_eq!(reply.headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(reply.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(reply.headers[header::X_XSS_PROTECTION], "1; mode=block");
    assert!(reply.headers.contains_key(header::CONTENT_SECURITY_POLICY));

    let cookie = reply.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("MAIN="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_forged_session_id_not_adopted() {
    let mut shop = Shop::new();
    let forged = "MAIN=ForgedSessionIdentifier000001";
    shop.cookie = Some(forged.to_string());

    shop.get("/basket").await;
    assert_ne!(shop.cookie.as_deref(), Some(forged));
    assert!(shop.state.sessions.contains(&shop.session_id()));
}

#[tokio::test]
async fn test_catalog() {
    let mut shop = Shop::new();

    let reply = shop.get("/products").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.as_array().unwrap().len(), 4);
    assert_eq!(reply.body[1]["price"]["formatted"], "£ 12.50");
    assert_eq!(reply.body[1]["image"], "/images/noimg.png");

    let reply = shop.get("/products/99").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["error"], "Product not found.");
}

#[tokio::test]
async fn test_basket_lifecycle() {
    let mut shop = Shop::new();

    let reply = shop.post("/basket/items", json!({ "productId": 2 })).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["count"], 1);

    let reply = shop.post("/basket/items", json!({ "productId": 2, "quantity": 2 })).await;
    assert_eq!(reply.body["count"], 3);
    assert_eq!(reply.body["total"]["amount"], 3750);

    let reply = shop.post("/basket/items", json!({ "productId": 99 })).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = shop
        .send(Method::PUT, "/basket/items/2", Some(json!({ "quantity": 1 })))
        .await;
    assert_eq!(reply.body["count"], 1);

    let reply = shop
        .post("/basket/recalculate", json!({ "quantities": { "2": 4, "4": 1 } }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["count"], 5);
    assert_eq!(reply.body["lines"].as_array().unwrap().len(), 2);

    let reply = shop.send(Method::DELETE, "/basket/items/2", None).await;
    assert_eq!(reply.body["count"], 1);

    let messages = shop.get("/messages").await;
    let texts: Vec<&str> = messages
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert!(texts.contains(&"Basket has been recalculated."));
    assert!(shop.get("/messages").await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_requires_login_and_returns_there() {
    let mut shop = Shop::new();
    shop.post("/basket/items", json!({ "productId": 1 })).await;

    let reply = shop.get("/checkout").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "You have to be logged in to checkout your order.");

    let anonymous = shop.session_id();
    let reply = shop.register().await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["redirect"], "/checkout");
    assert_ne!(shop.session_id(), anonymous);

    let reply = shop.get("/checkout").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["shippingMethods"].as_array().unwrap().len(), 3);
    assert_eq!(reply.body["basket"]["count"], 1);
}

#[tokio::test]
async fn test_checkout_with_empty_basket() {
    let mut shop = Shop::new();
    shop.register().await;

    let reply = shop.post("/checkout", checkout_form(1)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"], "Basket is empty.");
}

#[tokio::test]
async fn test_place_order_and_view_it() {
    let mut shop = Shop::new();
    shop.register().await;
    shop.post("/basket/items", json!({ "productId": 1, "quantity": 2 })).await;

    let mut incomplete = checkout_form(1);
    incomplete["billingCity"] = json!("");
    let reply = shop.post("/checkout", incomplete).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["error"], "Please enter all required fields.");

    let reply = shop.post("/checkout", checkout_form(1)).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["redirect"], "/orders/last");
    let order_id = reply.body["orderId"].as_i64().unwrap();

    let last = shop.get("/orders/last").await;
    assert_eq!(last.status, StatusCode::OK);
    assert_eq!(last.body["id"], order_id);
    assert_eq!(last.body["items"][0]["itemType"], "product");
    assert_eq!(last.body["total"], 2 * 5999 + 299 + 99);

    let basket = shop.get("/basket").await;
    assert_eq!(basket.body["count"], 0);

    let orders = shop.get("/orders").await;
    assert_eq!(orders.body.as_array().unwrap().len(), 1);

    let account = shop.get("/account").await;
    assert_eq!(account.body["forename"], "Janet");

    let mails = std::fs::read_dir(shop.outbox.path()).unwrap().count();
    assert_eq!(mails, 1);
}

#[tokio::test]
async fn test_paypal_checkout_approved() {
    let mut shop = Shop::new();
    shop.register().await;
    shop.post("/basket/items", json!({ "productId": 3 })).await;

    let reply = shop.post("/checkout", checkout_form(2)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["redirect"], APPROVAL_URL);

    let reply = shop
        .get("/checkout/paypal?paypalPayment=true&paymentId=PAY-TEST&PayerID=PAYER-OK")
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let last = shop.get("/orders/last").await;
    assert_eq!(last.body["isPaid"], true);
    assert_eq!(last.body["paymentReference"], "PAY-TEST");

    let replay = shop
        .get("/checkout/paypal?paypalPayment=true&paymentId=PAY-TEST&PayerID=PAYER-OK")
        .await;
    assert_eq!(replay.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_paypal_checkout_cancelled() {
    let mut shop = Shop::new();
    shop.register().await;
    shop.post("/basket/items", json!({ "productId": 3 })).await;
    shop.post("/checkout", checkout_form(2)).await;

    let reply = shop.get("/checkout/paypal?paypalPayment=false").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["redirect"], "/checkout");

    assert_eq!(shop.get("/basket").await.body["count"], 1);
    assert_eq!(shop.get("/orders").await.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_login_logout() {
    let mut shop = Shop::new();
    shop.register().await;
    shop.post("/logout", json!({})).await;
    assert_eq!(shop.get("/account").await.status, StatusCode::UNAUTHORIZED);

    let reply = shop
        .post("/login", json!({ "email": "jane@example.com", "password": "wrong-pass1" }))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"], "The credentials you entered are incorrect.");

    let reply = shop
        .post("/login", json!({ "email": "jane@example.com", "password": "secret123" }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["redirect"], "/account");
    assert_eq!(reply.body["identity"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_account_update() {
    let mut shop = Shop::new();
    shop.register().await;

    let reply = shop
        .send(Method::PUT, "/account", Some(json!({ "surname": "Smith" })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["surname"], "Smith");

    let reply = shop
        .send(Method::PUT, "/account", Some(json!({ "password": "short", "confirmPassword": "short" })))
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_billing_name_adopted_before_order_is_placed() {
    let mut shop = Shop::new();
    shop.register().await;
    shop.post("/basket/items", json!({ "productId": 2 })).await;

    let reply = shop.post("/checkout", checkout_form(42)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["error"], "Invalid payment method entered.");

    let account = shop.get("/account").await;
    assert_eq!(account.body["forename"], "Janet");
    assert_eq!(shop.get("/orders").await.body.as_array().unwrap().len(), 0);
    assert_eq!(shop.get("/basket").await.body["count"], 1);
}

#[tokio::test]
async fn test_paypal_return_rejects_changed_basket() {
    let mut shop = Shop::new();
    shop.register().await;
    shop.post("/basket/items", json!({ "productId": 3 })).await;

    let reply = shop.post("/checkout", checkout_form(2)).await;
    assert_eq!(reply.body["redirect"], APPROVAL_URL);

    shop.post("/basket/items", json!({ "productId": 1, "quantity": 5 })).await;

    let reply = shop
        .get("/checkout/paypal?paypalPayment=true&paymentId=PAY-TEST&PayerID=PAYER-OK")
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        reply.body["error"],
        "Your basket has changed during the PayPal payment. Please confirm your order again."
    );

    assert_eq!(shop.get("/orders").await.body.as_array().unwrap().len(), 0);
    assert_eq!(shop.get("/basket").await.body["count"], 6);
}

#[tokio::test]
async fn test_basket_expiration_refreshed_on_each_request() {
    let clock = Clock::manual(1_700_000_000);
    let mut shop = Shop::with_clock(clock.clone());
    shop.post("/basket/items", json!({ "productId": 2 })).await;

    let basket_expiry = |shop: &Shop| {
        let session = shop.state.sessions.start(Some(&shop.session_id()));
        session.section("basket").expires_at().unwrap()
    };

    let first = basket_expiry(&shop);
    assert_eq!(first, 1_700_000_000 + 14 * 24 * 60 * 60);

    clock.advance(Duration::from_secs(3600));
    shop.get("/products").await;
    assert_eq!(basket_expiry(&shop), first + 3600);
}
