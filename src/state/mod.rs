// Application state shared by every request handler

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::catalog::ProductService;
use crate::config::ShopConfig;
use crate::database::Database;
use crate::mail::{LogMailer, Mailer};
use crate::orders::OrderService;
use crate::paypal::{self, PaymentGateway};
use crate::security::{Authenticator, DatabaseAuthenticator};
use crate::session::SessionStore;
use crate::users::UserService;

/// Services and configuration of a running storefront
///
/// Cheap to clone; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ShopConfig>,
    pub db: Database,
    pub sessions: Arc<SessionStore>,
    pub products: ProductService,
    pub users: UserService,
    pub orders: Arc<OrderService>,
    pub authenticator: Arc<dyn Authenticator>,
    pub gateway: Arc<dyn PaymentGateway>,

    /// Request counter for log correlation
    request_counter: Arc<AtomicU64>,
}

impl AppState {
    /// Wire the default services for a configuration and an open database
    pub fn new(config: ShopConfig, db: Database) -> Self {
        let gateway = paypal::gateway_from_config(&config);
        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(config.mail.log_dir.clone()));
        let sessions = Arc::new(SessionStore::new(config.session.lifetime()));

        Self::with_services(config, db, sessions, gateway, mailer)
    }

    /// Wire the state around explicitly provided session store, gateway and mailer
    pub fn with_services(
        config: ShopConfig,
        db: Database,
        sessions: Arc<SessionStore>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let products = ProductService::new(db.clone(), config.shop.images_dir.clone());
        let users = UserService::new(db.clone());
        let orders = Arc::new(OrderService::new(
            db.clone(),
            mailer,
            &config.shop,
            config.session.order_expiration(),
        ));
        let authenticator: Arc<dyn Authenticator> = Arc::new(DatabaseAuthenticator::new(users.clone()));

        Self {
            config: Arc::new(config),
            db,
            sessions,
            products,
            users,
            orders,
            authenticator,
            gateway,
            request_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generate a unique request ID
    pub fn next_request_id(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_generation() {
        let state = AppState::new(ShopConfig::default(), Database::open_in_memory().unwrap());
        let id1 = state.next_request_id();
        let id2 = state.clone().next_request_id();
        assert!(id2 > id1);
    }

    #[test]
    fn test_session_lifetime_from_config() {
        let mut config = ShopConfig::default();
        config.session.lifetime_secs = 3600;
        let state = AppState::new(config, Database::open_in_memory().unwrap());
        assert_eq!(state.sessions.lifetime().as_secs(), 3600);
    }
}
