// Response bodies

use serde::Serialize;

use crate::basket::BasketContents;
use crate::catalog::{Product, ProductService};
use crate::money::Price;
use crate::orders::{PaymentMethod, ShippingMethod};
use crate::security::Identity;

/// Price as raw pence plus its display form
#[derive(Debug, Serialize)]
pub struct PriceView {
    pub amount: Price,
    pub formatted: String,
}

impl From<Price> for PriceView {
    fn from(price: Price) -> Self {
        Self {
            amount: price,
            formatted: price.display(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: PriceView,
    pub image: String,
}

impl ProductView {
    pub fn new(product: Product, products: &ProductService) -> Self {
        let image = format!("/{}", products.image_path(&product.image));
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price.into(),
            image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BasketLineView {
    pub product: ProductView,
    pub quantity: u32,
    pub total: PriceView,
}

#[derive(Debug, Serialize)]
pub struct BasketView {
    pub lines: Vec<BasketLineView>,
    pub count: u32,
    pub total: PriceView,
}

impl BasketView {
    pub fn new(contents: BasketContents, products: &ProductService) -> Self {
        Self {
            lines: contents
                .lines
                .into_iter()
                .map(|line| BasketLineView {
                    product: ProductView::new(line.product, products),
                    quantity: line.quantity,
                    total: line.line_total.into(),
                })
                .collect(),
            count: contents.count,
            total: contents.total.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub basket: BasketView,
    pub shipping_methods: Vec<ShippingMethod>,
    pub payment_methods: Vec<PaymentMethod>,
    pub identity: Identity,
    pub paypal_enabled: bool,
}

/// Where the client should navigate next
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectView {
    pub redirect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
}

impl RedirectView {
    pub fn to(redirect: impl Into<String>) -> Self {
        Self {
            redirect: redirect.into(),
            identity: None,
            order_id: None,
        }
    }
}
