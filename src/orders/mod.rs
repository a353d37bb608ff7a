// Orders Module
// Shipping/payment methods, order placement and order history

pub mod checkout;

pub use checkout::{
    last_order_id, park_checkout, remember_order, take_parked_checkout, ChargedLine, CheckoutForm, ParkedCheckout,
    ORDER_SECTION,
};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::basket::{BasketContents, BasketService};
use crate::config::StoreConfig;
use crate::database::Database;
use crate::error::{ShopError, ShopResult};
use crate::mail::{MailMessage, Mailer};
use crate::money::Price;
use crate::paypal::{PaymentItem, PaymentRequest};
use crate::security::Identity;
use crate::session::SessionSection;

/// Payment method handled through PayPal
pub const PAYMENT_METHOD_ID_PAYPAL: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingMethod {
    pub id: i64,
    pub name: String,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub name: String,
    pub price: Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderItemType {
    Product,
    Shipping,
    Payment,
}

impl OrderItemType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "product" => Some(OrderItemType::Product),
            "shipping" => Some(OrderItemType::Shipping),
            "payment" => Some(OrderItemType::Payment),
            _ => None,
        }
    }
}

/// One order line; names and prices are snapshots taken at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_type: OrderItemType,
    pub reference_id: Option<i64>,
    pub name: String,
    pub quantity: u32,
    pub price: Price,
}

impl OrderItem {
    pub fn total(&self) -> Price {
        self.price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub forename: String,
    pub surname: String,
    pub address: String,
    pub city: String,
    pub zip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub status: String,
    pub is_paid: bool,
    pub payment_reference: Option<String>,
    pub created: String,
    pub email: String,
    pub billing: Address,
    pub shipping_address: Option<Address>,
    pub items: Vec<OrderItem>,
    pub total: Price,
}

/// Everything needed to turn the current basket into an order
pub struct PlaceOrder<'a> {
    pub form: &'a CheckoutForm,
    pub identity: &'a Identity,
    pub basket: &'a BasketService,
    pub order_section: &'a SessionSection,
    pub remote_ip: &'a str,
    /// Reference of an approved online payment; marks the order as paid
    pub payment_reference: Option<&'a str>,
}

pub struct OrderService {
    db: Database,
    mailer: Arc<dyn Mailer>,
    title: String,
    from: String,
    order_expiration: Duration,
}

impl OrderService {
    pub fn new(db: Database, mailer: Arc<dyn Mailer>, shop: &StoreConfig, order_expiration: Duration) -> Self {
        Self {
            db,
            mailer,
            title: shop.title.clone(),
            from: shop.email.clone(),
            order_expiration,
        }
    }

    pub fn all_shipping_methods(&self) -> ShopResult<Vec<ShippingMethod>> {
        let methods = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, price FROM shipping_methods ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(ShippingMethod {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: Price(row.get(2)?),
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        Ok(methods)
    }

    pub fn shipping_method_by_id(&self, id: i64) -> ShopResult<Option<ShippingMethod>> {
        let method = self.db.with_conn(|conn| shipping_method(conn, id))?;
        Ok(method)
    }

    pub fn all_payment_methods(&self) -> ShopResult<Vec<PaymentMethod>> {
        let methods = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, price FROM payment_methods ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(PaymentMethod {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: Price(row.get(2)?),
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        Ok(methods)
    }

    pub fn payment_method_by_id(&self, id: i64) -> ShopResult<Option<PaymentMethod>> {
        let method = self.db.with_conn(|conn| payment_method(conn, id))?;
        Ok(method)
    }

    /// Persist the basket as an order of the logged in user
    ///
    /// The order row and all of its items are written in one transaction.
    /// Afterwards the basket is emptied, the order id is remembered in the
    /// `order` section and a confirmation mail is sent; a failed mail does
    /// not fail the order.
    pub fn place_order(&self, request: &PlaceOrder<'_>) -> ShopResult<i64> {
        let form = request.form.validated()?;
        let contents = request.basket.contents()?;
        if contents.is_empty() {
            return Err(ShopError::EmptyBasket);
        }

        let order_id = self.db.transaction(|tx| {
            let shipping = form
                .shipping
                .map(|id| shipping_method(tx, id))
                .transpose()?
                .flatten()
                .ok_or_else(|| ShopError::Validation("Invalid shipping method entered.".to_string()))?;
            let payment = form
                .payment
                .map(|id| payment_method(tx, id))
                .transpose()?
                .flatten()
                .ok_or_else(|| ShopError::Validation("Invalid payment method entered.".to_string()))?;

            let delivery = |value: &str| form.shipping_address_enabled.then(|| value.to_string());
            tx.execute(
                "INSERT INTO orders (
                    user_id, is_paid, payment_reference, ip, email, forename, surname, address, city, zip,
                    shipping_forename, shipping_surname, shipping_address, shipping_city, shipping_zip
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    request.identity.id,
                    request.payment_reference.is_some(),
                    request.payment_reference,
                    request.remote_ip,
                    form.email,
                    form.billing_forename,
                    form.billing_surname,
                    form.billing_address,
                    form.billing_city,
                    form.billing_zip,
                    delivery(&form.shipping_forename),
                    delivery(&form.shipping_surname),
                    delivery(&form.shipping_address),
                    delivery(&form.shipping_city),
                    delivery(&form.shipping_zip),
                ],
            )?;
            let order_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO order_items (order_id, item_type, shipping_id, price, name)
                 VALUES (?1, 'shipping', ?2, ?3, ?4)",
                params![order_id, shipping.id, shipping.price.minor(), shipping.name],
            )?;
            tx.execute(
                "INSERT INTO order_items (order_id, item_type, payment_id, price, name)
                 VALUES (?1, 'payment', ?2, ?3, ?4)",
                params![order_id, payment.id, payment.price.minor(), payment.name],
            )?;

            let mut insert_product = tx.prepare(
                "INSERT INTO order_items (order_id, item_type, product_id, quantity, price, name)
                 VALUES (?1, 'product', ?2, ?3, ?4, ?5)",
            )?;
            for line in &contents.lines {
                insert_product.execute(params![
                    order_id,
                    line.product.id,
                    line.quantity,
                    line.product.price.minor(),
                    line.product.name,
                ])?;
            }

            Ok(order_id)
        })?;

        request.basket.clear();
        remember_order(request.order_section, order_id, self.order_expiration)?;

        info!(
            order_id = order_id,
            user_id = request.identity.id,
            items = contents.count,
            paid = request.payment_reference.is_some(),
            "Order placed"
        );

        self.send_confirmation(order_id, request.identity);
        Ok(order_id)
    }

    /// Orders of a user, newest first; `order_id` narrows to one order
    pub fn orders_for(&self, user_id: i64, order_id: Option<i64>) -> ShopResult<Vec<Order>> {
        let orders = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM orders
                 WHERE user_id = ?1 AND (?2 IS NULL OR id = ?2)
                 ORDER BY id DESC",
            )?;
            let mut orders = stmt
                .query_map(params![user_id, order_id], order_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut items_stmt = conn.prepare(
                "SELECT item_type, product_id, shipping_id, payment_id, name, quantity, price
                 FROM order_items
                 WHERE order_id = ?1
                 ORDER BY CASE item_type WHEN 'product' THEN 0 WHEN 'shipping' THEN 1 ELSE 2 END, id",
            )?;
            for order in &mut orders {
                order.items = items_stmt
                    .query_map(params![order.id], item_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                order.total = order.items.iter().map(OrderItem::total).sum();
            }

            Ok(orders)
        })?;

        Ok(orders)
    }

    pub fn order_for(&self, user_id: i64, order_id: i64) -> ShopResult<Option<Order>> {
        Ok(self.orders_for(user_id, Some(order_id))?.into_iter().next())
    }

    fn send_confirmation(&self, order_id: i64, identity: &Identity) {
        let order = match self.order_for(identity.id, order_id) {
            Ok(Some(order)) => order,
            Ok(None) => return,
            Err(e) => {
                warn!(order_id = order_id, error = %e, "Failed to load order for confirmation mail");
                return;
            }
        };

        let message = MailMessage {
            from: format!("{} <{}>", self.title, self.from),
            to: format!("{} {} <{}>", order.billing.forename, order.billing.surname, order.email),
            subject: format!("{} - order confirmation", self.title),
            body: confirmation_body(&order),
        };

        if let Err(e) = self.mailer.send(&message) {
            warn!(order_id = order_id, error = %e, "Order confirmation mail failed");
        }
    }
}

/// Provider request for paying the basket plus the chosen shipping
pub fn payment_request(contents: &BasketContents, shipping: &ShippingMethod, product_url: impl Fn(i64) -> String) -> PaymentRequest {
    PaymentRequest {
        items: contents
            .lines
            .iter()
            .map(|line| PaymentItem {
                sku: line.product.id,
                name: line.product.name.clone(),
                description: line.product.description.clone(),
                quantity: line.quantity,
                price: line.product.price,
                url: product_url(line.product.id),
            })
            .collect(),
        subtotal: contents.total,
        shipping: shipping.price,
        invoice_number: uuid::Uuid::new_v4().simple().to_string(),
    }
}

fn shipping_method(conn: &Connection, id: i64) -> rusqlite::Result<Option<ShippingMethod>> {
    conn.query_row(
        "SELECT id, name, price FROM shipping_methods WHERE id = ?1",
        params![id],
        |row| {
            Ok(ShippingMethod {
                id: row.get(0)?,
                name: row.get(1)?,
                price: Price(row.get(2)?),
            })
        },
    )
    .optional()
}

fn payment_method(conn: &Connection, id: i64) -> rusqlite::Result<Option<PaymentMethod>> {
    conn.query_row(
        "SELECT id, name, price FROM payment_methods WHERE id = ?1",
        params![id],
        |row| {
            Ok(PaymentMethod {
                id: row.get(0)?,
                name: row.get(1)?,
                price: Price(row.get(2)?),
            })
        },
    )
    .optional()
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let shipping_forename: Option<String> = row.get("shipping_forename")?;
    let shipping_address = match shipping_forename {
        Some(forename) => Some(Address {
            forename,
            surname: row.get::<_, Option<String>>("shipping_surname")?.unwrap_or_default(),
            address: row.get::<_, Option<String>>("shipping_address")?.unwrap_or_default(),
            city: row.get::<_, Option<String>>("shipping_city")?.unwrap_or_default(),
            zip: row.get::<_, Option<String>>("shipping_zip")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(Order {
        id: row.get("id")?,
        status: row.get("status")?,
        is_paid: row.get("is_paid")?,
        payment_reference: row.get("payment_reference")?,
        created: row.get("created")?,
        email: row.get("email")?,
        billing: Address {
            forename: row.get("forename")?,
            surname: row.get("surname")?,
            address: row.get("address")?,
            city: row.get("city")?,
            zip: row.get("zip")?,
        },
        shipping_address,
        items: Vec::new(),
        total: Price::ZERO,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    let kind: String = row.get(0)?;
    let item_type = OrderItemType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown order item type: {}", kind).into(),
        )
    })?;

    let reference_id = match item_type {
        OrderItemType::Product => row.get(1)?,
        OrderItemType::Shipping => row.get(2)?,
        OrderItemType::Payment => row.get(3)?,
    };

    Ok(OrderItem {
        item_type,
        reference_id,
        name: row.get(4)?,
        quantity: row.get(5)?,
        price: Price(row.get(6)?),
    })
}

fn confirmation_body(order: &Order) -> String {
    let mut body = format!(
        "Dear {} {},\n\nthank you for your order no. {}.\n\n",
        order.billing.forename, order.billing.surname, order.id
    );

    for item in &order.items {
        let _ = match item.item_type {
            OrderItemType::Product => writeln!(body, "{} x {}  {}", item.quantity, item.name, item.total()),
            _ => writeln!(body, "{}  {}", item.name, item.total()),
        };
    }

    let _ = writeln!(body, "\nTotal: {}", order.total);

    let delivery = order.shipping_address.as_ref().unwrap_or(&order.billing);
    let _ = write!(
        body,
        "\nDelivery address:\n{} {}\n{}\n{} {}\n",
        delivery.forename, delivery.surname, delivery.address, delivery.zip, delivery.city
    );

    body
}
