// Per-request visitor extractor

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::basket::{BasketService, BASKET_SECTION};
use crate::error::{ShopError, ShopResult};
use crate::messages::{Messages, MESSAGES_SECTION};
use crate::security::{remember_back_link, Identity, UserContext};
use crate::session::Session;
use crate::state::AppState;

/// The current visitor: session plus login state
#[derive(Clone)]
pub struct Visitor {
    pub session: Session,
    pub user: UserContext,
}

#[async_trait]
impl FromRequestParts<AppState> for Visitor {
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ShopError::Internal("session layer missing".to_string()))?;

        let user = UserContext::new(
            session.clone(),
            state.authenticator.clone(),
            Some(state.config.session.login_expiration()),
        );

        Ok(Self { session, user })
    }
}

impl Visitor {
    pub fn basket(&self, state: &AppState) -> BasketService {
        BasketService::new(self.session.section(BASKET_SECTION), state.products.clone())
    }

    pub fn messages(&self) -> Messages {
        Messages::new(self.session.section(MESSAGES_SECTION))
    }

    /// Identity of a logged in visitor; otherwise remember `back_link` and refuse
    pub fn require_login(&self, state: &AppState, back_link: &str, message: &str) -> ShopResult<Identity> {
        if let Some(identity) = self.user.identity() {
            return Ok(identity);
        }

        remember_back_link(&self.session, back_link, state.config.session.back_link_expiration())?;
        self.messages().warning(message);
        Err(ShopError::LoginRequired(message.to_string()))
    }
}
