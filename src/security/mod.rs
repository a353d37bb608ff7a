// Security Module
// Login state kept in the `user` session section

pub mod authenticator;
pub mod passwords;

pub use authenticator::{AuthenticationError, Authenticator, DatabaseAuthenticator};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ShopResult;
use crate::session::{Session, SessionSection};

pub const USER_SECTION: &str = "user";
pub const LOGIN_SECTION: &str = "login";

const IDENTITY_KEY: &str = "identity";
const AUTHENTICATED_KEY: &str = "authenticated";
const BACK_LINK_KEY: &str = "back_link";

/// The logged in customer as remembered by the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub forename: String,
    pub surname: String,
}

/// Per-request view of who the visitor is
#[derive(Clone)]
pub struct UserContext {
    session: Session,
    section: SessionSection,
    authenticator: Arc<dyn Authenticator>,
    expiration: Option<Duration>,
}

impl UserContext {
    /// Bind to the session's user section
    ///
    /// Corrupted login state is discarded. While logged in, the section
    /// expiry slides forward on every request.
    pub fn new(session: Session, authenticator: Arc<dyn Authenticator>, expiration: Option<Duration>) -> Self {
        let section = session.section(USER_SECTION);

        let corrupted = section.try_get::<Identity>(IDENTITY_KEY).is_err()
            || section.try_get::<bool>(AUTHENTICATED_KEY).is_err();
        if corrupted {
            debug!("Discarding invalid login state");
            section.clear();
        }

        let context = Self {
            session,
            section,
            authenticator,
            expiration,
        };

        if context.is_logged_in() && expiration.is_some() {
            context.section.set_expiration(expiration);
        }

        context
    }

    /// Check credentials and mark the session as logged in under a fresh id
    pub fn login(&self, email: &str, password: &str) -> ShopResult<Identity> {
        self.logout();

        let identity = self.authenticator.authenticate(email, password)?;
        self.section.set(IDENTITY_KEY, &identity)?;
        self.section.set(AUTHENTICATED_KEY, &true)?;
        self.section.set_expiration(self.expiration);
        self.session.regenerate_id();

        info!(user_id = identity.id, "User logged in");
        Ok(identity)
    }

    /// Forget the identity; a logged in session also gets a fresh id
    pub fn logout(&self) {
        if self.is_logged_in() {
            if let Some(identity) = self.identity() {
                info!(user_id = identity.id, "User logged out");
            }
            self.section.clear();
            self.session.regenerate_id();
        }

        self.section.remove(IDENTITY_KEY);
        self.section.remove(AUTHENTICATED_KEY);
    }

    pub fn is_logged_in(&self) -> bool {
        self.section.get::<bool>(AUTHENTICATED_KEY).unwrap_or(false) && self.section.contains(IDENTITY_KEY)
    }

    /// The identity of a logged in visitor
    pub fn identity(&self) -> Option<Identity> {
        if !self.is_logged_in() {
            return None;
        }
        self.section.get(IDENTITY_KEY)
    }

    /// Replace the remembered identity, e.g. after a profile change
    pub fn set_identity(&self, identity: &Identity) -> ShopResult<()> {
        self.section.set(IDENTITY_KEY, identity)?;
        Ok(())
    }

    pub fn set_expiration(&self, ttl: Option<Duration>) {
        self.section.set_expiration(ttl);
    }
}

/// Remember where to send the visitor after logging in
pub fn remember_back_link(session: &Session, link: &str, ttl: Duration) -> ShopResult<()> {
    let section = session.section(LOGIN_SECTION);
    section.set(BACK_LINK_KEY, &link)?;
    section.set_variable_expiration(BACK_LINK_KEY, Some(ttl));
    Ok(())
}

/// Consume a remembered back link
pub fn take_back_link(session: &Session) -> Option<String> {
    let section = session.section(LOGIN_SECTION);
    let link = section.get::<String>(BACK_LINK_KEY);
    section.remove(BACK_LINK_KEY);
    link.filter(|link| link.starts_with('/') && !link.starts_with("//"))
}
