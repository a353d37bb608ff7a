// Credential checking against the users table

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{passwords, Identity};
use crate::error::ShopResult;
use crate::users::UserService;

/// Why a login was refused; both cases read the same to the visitor
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("The credentials you entered are incorrect.")]
    IdentityNotFound,

    #[error("The credentials you entered are incorrect.")]
    InvalidCredential,
}

/// Turns credentials into an identity
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, email: &str, password: &str) -> ShopResult<Identity>;
}

/// Authenticator backed by stored Argon2 hashes
pub struct DatabaseAuthenticator {
    users: UserService,
}

impl DatabaseAuthenticator {
    pub fn new(users: UserService) -> Self {
        Self { users }
    }
}

impl Authenticator for DatabaseAuthenticator {
    fn authenticate(&self, email: &str, password: &str) -> ShopResult<Identity> {
        let user = self
            .users
            .user_by_email(email)?
            .ok_or(AuthenticationError::IdentityNotFound)?;

        if !passwords::verify(password, &user.password_hash) {
            debug!(user_id = user.id, "Password rejected");
            return Err(AuthenticationError::InvalidCredential.into());
        }

        if passwords::needs_rehash(&user.password_hash) {
            match passwords::hash(password).and_then(|hash| self.users.store_password_hash(user.id, &hash)) {
                Ok(()) => info!(user_id = user.id, "Password hash upgraded"),
                Err(e) => warn!(user_id = user.id, error = %e, "Failed to upgrade password hash"),
            }
        }

        Ok(Identity {
            id: user.id,
            email: user.email,
            forename: user.forename,
            surname: user.surname,
        })
    }
}
