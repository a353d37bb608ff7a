use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::blocking;
use crate::error::{ShopError, ShopResult};
use crate::http::extract::Visitor;
use crate::http::views::RedirectView;
use crate::security::{take_back_link, Identity};
use crate::state::AppState;
use crate::users::{NewUser, UserUpdate};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Create an account and log it in
pub async fn register(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(form): Json<NewUser>,
) -> ShopResult<(StatusCode, Json<RedirectView>)> {
    let user = visitor.user.clone();
    let identity = blocking(move || {
        state.users.create_user(&form)?;
        user.login(&form.email, form.password.trim())
    })
    .await?;
    visitor.messages().success("You have been successfully registered.");

    Ok((StatusCode::CREATED, Json(after_login(&visitor, identity))))
}

pub async fn login(visitor: Visitor, Json(credentials): Json<Credentials>) -> ShopResult<Json<RedirectView>> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(ShopError::Validation("Please enter all required fields.".to_string()));
    }

    let user = visitor.user.clone();
    let identity = blocking(move || user.login(&credentials.email, &credentials.password)).await?;
    visitor.messages().success("You have been successfully logged in.");

    Ok(Json(after_login(&visitor, identity)))
}

pub async fn logout(visitor: Visitor) -> Json<RedirectView> {
    if visitor.user.is_logged_in() {
        visitor.user.logout();
        visitor.messages().success("You have been successfully logged out.");
    }

    Json(RedirectView::to("/"))
}

pub async fn show(State(state): State<AppState>, visitor: Visitor) -> ShopResult<Json<Identity>> {
    let identity = visitor.require_login(&state, "/account", "You have to be logged in to view your account.")?;
    Ok(Json(identity))
}

pub async fn update(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(update): Json<UserUpdate>,
) -> ShopResult<Json<Identity>> {
    let identity = visitor.require_login(&state, "/account", "You have to be logged in to view your account.")?;
    let users = state.users.clone();
    let user = blocking(move || {
        users.update_user(identity.id, &update)?;
        users
            .user_by_id(identity.id)?
            .ok_or_else(|| ShopError::NotFound("User not found.".to_string()))
    })
    .await?;
    let identity = Identity {
        id: user.id,
        email: user.email,
        forename: user.forename,
        surname: user.surname,
    };
    visitor.user.set_identity(&identity)?;
    visitor.messages().success("Your personal information has been updated.");

    Ok(Json(identity))
}

fn after_login(visitor: &Visitor, identity: Identity) -> RedirectView {
    RedirectView {
        identity: Some(identity),
        ..RedirectView::to(take_back_link(&visitor.session).unwrap_or_else(|| "/".to_string()))
    }
}
