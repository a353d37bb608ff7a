use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::{info, warn};

use super::blocking;
use crate::error::{ShopError, ShopResult};
use crate::http::extract::Visitor;
use crate::http::views::{BasketView, CheckoutView, RedirectView};
use crate::orders::{
    park_checkout, payment_request, take_parked_checkout, CheckoutForm, ParkedCheckout, PlaceOrder, ShippingMethod,
    ORDER_SECTION, PAYMENT_METHOD_ID_PAYPAL,
};
use crate::security::Identity;
use crate::state::AppState;
use crate::users::UserUpdate;

const LOGIN_REQUIRED: &str = "You have to be logged in to checkout your order.";
const BASKET_CHANGED: &str = "Your basket has changed during the PayPal payment. Please confirm your order again.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalReturn {
    pub paypal_payment: bool,
    pub payment_id: Option<String>,
    #[serde(rename = "PayerID")]
    pub payer_id: Option<String>,
}

pub async fn show(State(state): State<AppState>, visitor: Visitor) -> ShopResult<Json<CheckoutView>> {
    let identity = visitor.require_login(&state, "/checkout", LOGIN_REQUIRED)?;
    let contents = visitor.basket(&state).contents()?;
    if contents.is_empty() {
        return Err(ShopError::EmptyBasket);
    }

    Ok(Json(CheckoutView {
        basket: BasketView::new(contents, &state.products),
        shipping_methods: state.orders.all_shipping_methods()?,
        payment_methods: state.orders.all_payment_methods()?,
        identity,
        paypal_enabled: state.config.paypal.enabled,
    }))
}

/// Place the order, or hand the visitor over to PayPal for approval
pub async fn submit(
    State(state): State<AppState>,
    visitor: Visitor,
    remote: Option<ConnectInfo<SocketAddr>>,
    Json(form): Json<CheckoutForm>,
) -> ShopResult<(StatusCode, Json<RedirectView>)> {
    let identity = visitor.require_login(&state, "/checkout", LOGIN_REQUIRED)?;
    let contents = visitor.basket(&state).contents()?;
    if contents.is_empty() {
        return Err(ShopError::EmptyBasket);
    }

    let form = form.validated()?;

    if form.payment == Some(PAYMENT_METHOD_ID_PAYPAL) {
        let shipping = chosen_shipping(&state, &form)?;

        let domain = state.config.shop.domain.trim_end_matches('/').to_string();
        let request = payment_request(&contents, &shipping, |id| format!("{}/products/{}", domain, id));
        let payment = state.gateway.create_payment(&request).await?;

        park_checkout(
            &visitor.session.section(ORDER_SECTION),
            &ParkedCheckout::new(form, payment.id.clone(), &contents, request.total()),
            state.config.session.order_expiration(),
        )?;
        info!(payment_id = %payment.id, user_id = identity.id, "Checkout parked for PayPal approval");

        return Ok((StatusCode::OK, Json(RedirectView::to(payment.approval_url))));
    }

    let order_id = complete_order(&state, &visitor, identity, form, remote_ip(&remote), None).await?;
    Ok((StatusCode::CREATED, order_placed(order_id)))
}

/// Return from PayPal: execute an approved payment or drop a cancelled one
///
/// The payment is executed only while the basket still holds what was sent
/// to PayPal, so a paid order always matches the charged amount.
pub async fn paypal_return(
    State(state): State<AppState>,
    visitor: Visitor,
    remote: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<PayPalReturn>,
) -> ShopResult<(StatusCode, Json<RedirectView>)> {
    let identity = visitor.require_login(&state, "/checkout", LOGIN_REQUIRED)?;
    let parked = take_parked_checkout(&visitor.session.section(ORDER_SECTION))
        .ok_or_else(|| ShopError::NotFound("Invalid link.".to_string()))?;

    if !query.paypal_payment {
        visitor.messages().warning("PayPal payment has been cancelled.");
        info!(payment_id = %parked.payment_id, "PayPal payment cancelled");
        return Ok((StatusCode::OK, Json(RedirectView::to("/checkout"))));
    }

    let (Some(payment_id), Some(payer_id)) = (query.payment_id, query.payer_id) else {
        return Err(ShopError::Validation("Invalid link.".to_string()));
    };
    if payment_id != parked.payment_id {
        return Err(ShopError::Validation("Invalid link.".to_string()));
    }

    let contents = visitor.basket(&state).contents()?;
    let shipping = chosen_shipping(&state, &parked.form)?;
    if !parked.matches(&contents, shipping.price) {
        warn!(payment_id = %payment_id, "Basket changed while awaiting PayPal approval");
        visitor.messages().warning(BASKET_CHANGED);
        return Err(ShopError::Validation(BASKET_CHANGED.to_string()));
    }

    let payment = state.gateway.execute_payment(&payment_id, &payer_id).await?;
    if !payment.is_approved() {
        visitor.messages().danger("PayPal payment has not been approved.");
        return Err(ShopError::Validation("PayPal payment has not been approved.".to_string()));
    }

    let order_id = complete_order(
        &state,
        &visitor,
        identity,
        parked.form,
        remote_ip(&remote),
        Some(payment.id),
    )
    .await?;
    Ok((StatusCode::CREATED, order_placed(order_id)))
}

fn chosen_shipping(state: &AppState, form: &CheckoutForm) -> ShopResult<ShippingMethod> {
    form.shipping
        .map(|id| state.orders.shipping_method_by_id(id))
        .transpose()?
        .flatten()
        .ok_or_else(|| ShopError::Validation("Invalid shipping method entered.".to_string()))
}

/// Adopt the billing name for the account, then place the order
async fn complete_order(
    state: &AppState,
    visitor: &Visitor,
    identity: Identity,
    form: CheckoutForm,
    remote_ip: String,
    payment_reference: Option<String>,
) -> ShopResult<i64> {
    let state = state.clone();
    let visitor = visitor.clone();

    blocking(move || {
        state.users.update_user(
            identity.id,
            &UserUpdate {
                forename: Some(form.billing_forename.clone()),
                surname: Some(form.billing_surname.clone()),
                ..Default::default()
            },
        )?;
        let identity = match state.users.user_by_id(identity.id)? {
            Some(user) => Identity {
                id: user.id,
                email: user.email,
                forename: user.forename,
                surname: user.surname,
            },
            None => identity,
        };
        visitor.user.set_identity(&identity)?;

        let basket = visitor.basket(&state);
        let order_id = state.orders.place_order(&PlaceOrder {
            form: &form,
            identity: &identity,
            basket: &basket,
            order_section: &visitor.session.section(ORDER_SECTION),
            remote_ip: &remote_ip,
            payment_reference: payment_reference.as_deref(),
        })?;

        visitor.messages().success("Your order has been successfully processed.");
        Ok(order_id)
    })
    .await
}

fn order_placed(order_id: i64) -> Json<RedirectView> {
    Json(RedirectView {
        order_id: Some(order_id),
        ..RedirectView::to("/orders/last")
    })
}

fn remote_ip(remote: &Option<ConnectInfo<SocketAddr>>) -> String {
    remote
        .as_ref()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
