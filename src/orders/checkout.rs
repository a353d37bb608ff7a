// Checkout form and the `order` session section

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::basket::BasketContents;
use crate::error::{ShopError, ShopResult};
use crate::money::Price;
use crate::session::SessionSection;

/// Session section holding the last placed order and a parked PayPal checkout
pub const ORDER_SECTION: &str = "order";

const ORDER_ID_KEY: &str = "id";
const PARKED_KEY: &str = "paypal";

/// Submitted checkout form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutForm {
    pub email: String,
    pub billing_forename: String,
    pub billing_surname: String,
    pub billing_address: String,
    pub billing_city: String,
    pub billing_zip: String,
    pub shipping_address_enabled: bool,
    pub shipping_forename: String,
    pub shipping_surname: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_zip: String,
    pub shipping: Option<i64>,
    pub payment: Option<i64>,
    pub terms: bool,
}

impl CheckoutForm {
    /// Trimmed copy of the form with every required field present
    pub fn validated(&self) -> ShopResult<CheckoutForm> {
        let mut form = self.clone();
        for field in [
            &mut form.email,
            &mut form.billing_forename,
            &mut form.billing_surname,
            &mut form.billing_address,
            &mut form.billing_city,
            &mut form.billing_zip,
            &mut form.shipping_forename,
            &mut form.shipping_surname,
            &mut form.shipping_address,
            &mut form.shipping_city,
            &mut form.shipping_zip,
        ] {
            *field = field.trim().to_string();
        }

        let billing = [
            &form.email,
            &form.billing_forename,
            &form.billing_surname,
            &form.billing_address,
            &form.billing_city,
            &form.billing_zip,
        ];
        let shipping = [
            &form.shipping_forename,
            &form.shipping_surname,
            &form.shipping_address,
            &form.shipping_city,
            &form.shipping_zip,
        ];

        let missing = billing.iter().any(|f| f.is_empty())
            || (form.shipping_address_enabled && shipping.iter().any(|f| f.is_empty()))
            || form.shipping.is_none()
            || form.payment.is_none()
            || !form.terms;

        if missing {
            return Err(ShopError::Validation("Please enter all required fields.".to_string()));
        }

        Ok(form)
    }
}

/// One basket line as it was charged to the payer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargedLine {
    pub product_id: i64,
    pub quantity: u32,
    pub price: Price,
}

/// Checkout waiting for the payer to approve a PayPal payment
///
/// Keeps the basket lines and the amount sent to the provider, so the order
/// placed on return can be checked against what was actually charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkedCheckout {
    pub form: CheckoutForm,
    pub payment_id: String,
    pub lines: Vec<ChargedLine>,
    pub total: Price,
}

impl ParkedCheckout {
    pub fn new(form: CheckoutForm, payment_id: String, contents: &BasketContents, total: Price) -> Self {
        Self {
            form,
            payment_id,
            lines: charged_lines(contents),
            total,
        }
    }

    /// True when the basket and shipping still add up to the charged payment
    pub fn matches(&self, contents: &BasketContents, shipping: Price) -> bool {
        self.lines == charged_lines(contents) && contents.total + shipping == self.total
    }
}

fn charged_lines(contents: &BasketContents) -> Vec<ChargedLine> {
    contents
        .lines
        .iter()
        .map(|line| ChargedLine {
            product_id: line.product.id,
            quantity: line.quantity,
            price: line.product.price,
        })
        .collect()
}

/// Remember the placed order for the resume page
pub fn remember_order(section: &SessionSection, order_id: i64, ttl: Duration) -> ShopResult<()> {
    section.set(ORDER_ID_KEY, &order_id)?;
    section.set_expiration(Some(ttl));
    Ok(())
}

/// Id of the order placed by this session, while it is still remembered
pub fn last_order_id(section: &SessionSection) -> Option<i64> {
    section.get(ORDER_ID_KEY)
}

pub fn park_checkout(section: &SessionSection, parked: &ParkedCheckout, ttl: Duration) -> ShopResult<()> {
    section.set(PARKED_KEY, parked)?;
    section.set_variable_expiration(PARKED_KEY, Some(ttl));
    Ok(())
}

pub fn take_parked_checkout(section: &SessionSection) -> Option<ParkedCheckout> {
    let parked = section.get(PARKED_KEY);
    section.remove(PARKED_KEY);
    parked
}
