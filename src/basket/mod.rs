// Basket Module
// Session-scoped product quantities, re-joined against the catalog on read

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::catalog::{Product, ProductService};
use crate::error::{ShopError, ShopResult};
use crate::money::Price;
use crate::session::SessionSection;

/// Session section holding the basket
pub const BASKET_SECTION: &str = "basket";

/// Upper bound for a single basket line
pub const MAX_LINE_QUANTITY: u32 = 100;

const PRODUCTS_KEY: &str = "products";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredEntry {
    quantity: i64,
}

type StoredBasket = BTreeMap<i64, StoredEntry>;

/// One product line of the basket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasketLine {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Price,
}

/// Basket joined with current product data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BasketContents {
    pub lines: Vec<BasketLine>,
    /// Total number of items
    pub count: u32,
    pub total: Price,
}

impl BasketContents {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Basket operations for the current visitor
pub struct BasketService {
    section: SessionSection,
    products: ProductService,
    contents: Mutex<Option<BasketContents>>,
}

impl BasketService {
    pub fn new(section: SessionSection, products: ProductService) -> Self {
        Self {
            section,
            products,
            contents: Mutex::new(None),
        }
    }

    /// Add items, increasing the quantity of a product already in the basket
    pub fn add(&self, product_id: i64, quantity: i64) -> ShopResult<()> {
        let quantity = validate_quantity(quantity)?;
        if quantity == 0 {
            return Err(ShopError::Validation("Quantity must be a positive number.".to_string()));
        }
        self.require_product(product_id)?;

        let mut basket = self.stored();
        let current = basket
            .get(&product_id)
            .map(|entry| entry.quantity)
            .filter(|&q| q > 0)
            .unwrap_or(0);
        let updated = current + i64::from(quantity);
        if updated > i64::from(MAX_LINE_QUANTITY) {
            return Err(max_quantity_error());
        }

        basket.insert(product_id, StoredEntry { quantity: updated });
        self.store(&basket)?;

        debug!(product_id = product_id, quantity = updated, "Basket line added");
        Ok(())
    }

    /// Replace the quantity of a line; zero removes it
    pub fn set_quantity(&self, product_id: i64, quantity: i64) -> ShopResult<()> {
        let quantity = validate_quantity(quantity)?;
        if quantity == 0 {
            return self.remove(product_id);
        }
        self.require_product(product_id)?;

        let mut basket = self.stored();
        basket.insert(product_id, StoredEntry { quantity: i64::from(quantity) });
        self.store(&basket)?;

        debug!(product_id = product_id, quantity = quantity, "Basket line updated");
        Ok(())
    }

    /// Apply a whole basket form; nothing changes if any entry is invalid
    pub fn recalculate(&self, quantities: &BTreeMap<i64, i64>) -> ShopResult<()> {
        for (&product_id, &quantity) in quantities {
            if validate_quantity(quantity)? > 0 {
                self.require_product(product_id)?;
            }
        }

        let mut basket = self.stored();
        for (&product_id, &quantity) in quantities {
            if quantity == 0 {
                basket.remove(&product_id);
            } else {
                basket.insert(product_id, StoredEntry { quantity });
            }
        }
        self.store(&basket)?;

        info!(lines = basket.len(), "Basket recalculated");
        Ok(())
    }

    pub fn remove(&self, product_id: i64) -> ShopResult<()> {
        let mut basket = self.stored();
        if basket.remove(&product_id).is_some() {
            self.store(&basket)?;
            debug!(product_id = product_id, "Basket line removed");
        }
        Ok(())
    }

    pub fn clear(&self) {
        self.section.remove(PRODUCTS_KEY);
        *self.contents.lock() = None;
    }

    /// Current basket lines with totals
    ///
    /// Entries pointing at deleted products or holding unusable quantities are
    /// pruned from the session.
    pub fn contents(&self) -> ShopResult<BasketContents> {
        if let Some(contents) = self.contents.lock().as_ref() {
            return Ok(contents.clone());
        }

        let (mut basket, malformed) = self.load();
        let mut contents = BasketContents::default();
        let mut pruned = Vec::new();

        for (&product_id, entry) in &basket {
            let quantity = match u32::try_from(entry.quantity) {
                Ok(q) if (1..=MAX_LINE_QUANTITY).contains(&q) => q,
                _ => {
                    pruned.push(product_id);
                    continue;
                }
            };

            let Some(product) = self.products.product_by_id(product_id)? else {
                pruned.push(product_id);
                continue;
            };

            let line_total = product.price * quantity;
            contents.count += quantity;
            contents.total = contents.total + line_total;
            contents.lines.push(BasketLine {
                product,
                quantity,
                line_total,
            });
        }

        if !pruned.is_empty() || malformed {
            for product_id in &pruned {
                basket.remove(product_id);
            }
            self.store(&basket)?;
            info!(pruned = ?pruned, malformed = malformed, "Stale basket lines pruned");
        }

        *self.contents.lock() = Some(contents.clone());
        Ok(contents)
    }

    fn require_product(&self, product_id: i64) -> ShopResult<()> {
        match self.products.product_by_id(product_id)? {
            Some(_) => Ok(()),
            None => Err(ShopError::NotFound("Product not found.".to_string())),
        }
    }

    fn stored(&self) -> StoredBasket {
        self.load().0
    }

    /// Decode entry by entry; the flag reports entries that had to be dropped
    fn load(&self) -> (StoredBasket, bool) {
        let raw = match self.section.try_get::<BTreeMap<String, Value>>(PRODUCTS_KEY) {
            Ok(raw) => raw.unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "Undecodable basket discarded");
                return (StoredBasket::new(), true);
            }
        };

        let mut basket = StoredBasket::new();
        let mut malformed = false;
        for (key, value) in raw {
            match (key.parse::<i64>(), serde_json::from_value::<StoredEntry>(value)) {
                (Ok(product_id), Ok(entry)) => {
                    basket.insert(product_id, entry);
                }
                _ => malformed = true,
            }
        }

        (basket, malformed)
    }

    fn store(&self, basket: &StoredBasket) -> ShopResult<()> {
        *self.contents.lock() = None;
        if basket.is_empty() {
            self.section.remove(PRODUCTS_KEY);
        } else {
            self.section.set(PRODUCTS_KEY, basket)?;
        }
        Ok(())
    }
}

fn validate_quantity(quantity: i64) -> ShopResult<u32> {
    if quantity < 0 {
        return Err(ShopError::Validation("Quantity must be a positive number.".to_string()));
    }
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(max_quantity_error());
    }
    Ok(quantity as u32)
}

fn max_quantity_error() -> ShopError {
    ShopError::Validation(format!("At most {} pieces of one product can be ordered.", MAX_LINE_QUANTITY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{seed::seed_demo_data, Database};
    use crate::session::{Clock, SessionStore};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        db: Database,
        products: ProductService,
        store: Arc<SessionStore>,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db).unwrap();
        Fixture {
            db: db.clone(),
            products: ProductService::new(db, "images"),
            store: Arc::new(SessionStore::with_clock(
                Duration::from_secs(14 * 24 * 3600),
                Clock::manual(1_000),
            )),
        }
    }

    impl Fixture {
        fn basket(&self, session: &crate::session::Session) -> BasketService {
            BasketService::new(session.section(BASKET_SECTION), self.products.clone())
        }
    }

    #[test]
    fn test_add_accumulates() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);

        basket.add(1, 1).unwrap();
        basket.add(1, 2).unwrap();
        basket.add(2, 1).unwrap();

        let contents = basket.contents().unwrap();
        assert_eq!(contents.lines.len(), 2);
        assert_eq!(contents.count, 4);
        assert_eq!(contents.total, Price(5999 * 3 + 1250));
    }

    #[test]
    fn test_set_quantity_is_idempotent() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);

        basket.set_quantity(2, 3).unwrap();
        let once = basket.contents().unwrap();
        basket.set_quantity(2, 3).unwrap();
        let twice = basket.contents().unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.count, 3);
    }

    #[test]
    fn test_unknown_product_rejected() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);

        let err = basket.add(999, 1).unwrap_err();
        assert_eq!(err.to_string(), "Product not found.");
        assert!(basket.contents().unwrap().is_empty());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);

        assert!(basket.add(1, 0).is_err());
        assert!(basket.add(1, -2).is_err());
        assert!(basket.set_quantity(1, -1).is_err());
        assert!(basket.add(1, 101).is_err());

        basket.add(1, 100).unwrap();
        assert!(basket.add(1, 1).is_err());
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);

        basket.add(1, 2).unwrap();
        basket.set_quantity(1, 0).unwrap();
        assert!(basket.contents().unwrap().is_empty());
        assert!(!session.section(BASKET_SECTION).contains(PRODUCTS_KEY));
    }

    #[test]
    fn test_recalculate_is_atomic() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);
        basket.add(1, 1).unwrap();
        basket.add(2, 1).unwrap();

        let invalid = BTreeMap::from([(1, 5), (999, 1)]);
        assert!(basket.recalculate(&invalid).is_err());
        assert_eq!(basket.contents().unwrap().count, 2);

        let valid = BTreeMap::from([(1, 5), (2, 0)]);
        basket.recalculate(&valid).unwrap();
        let contents = basket.contents().unwrap();
        assert_eq!(contents.lines.len(), 1);
        assert_eq!(contents.count, 5);
    }

    #[test]
    fn test_deleted_product_pruned_on_read() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);
        basket.add(3, 1).unwrap();
        basket.add(4, 2).unwrap();

        fx.db
            .with_conn(|conn| conn.execute("DELETE FROM products WHERE id = 3", []))
            .unwrap();

        let fresh = fx.basket(&session);
        let contents = fresh.contents().unwrap();
        assert_eq!(contents.lines.len(), 1);
        assert_eq!(contents.lines[0].product.id, 4);

        let stored: StoredBasket = session.section(BASKET_SECTION).get(PRODUCTS_KEY).unwrap();
        assert!(!stored.contains_key(&3));
    }

    #[test]
    fn test_corrupt_entry_pruned() {
        let fx = fixture();
        let session = fx.store.start(None);
        let corrupt = BTreeMap::from([(1, StoredEntry { quantity: -4 }), (2, StoredEntry { quantity: 1 })]);
        session.section(BASKET_SECTION).set(PRODUCTS_KEY, &corrupt).unwrap();

        let contents = fx.basket(&session).contents().unwrap();
        assert_eq!(contents.count, 1);
        assert_eq!(contents.total, Price(1250));
    }

    #[test]
    fn test_malformed_entry_pruned_alone() {
        let fx = fixture();
        let session = fx.store.start(None);
        let raw = serde_json::json!({
            "1": { "quantity": "lots" },
            "2": { "quantity": 1 },
            "mug": { "quantity": 1 }
        });
        session.section(BASKET_SECTION).set(PRODUCTS_KEY, &raw).unwrap();

        let contents = fx.basket(&session).contents().unwrap();
        assert_eq!(contents.count, 1);
        assert_eq!(contents.lines[0].product.id, 2);

        let stored: BTreeMap<String, Value> = session.section(BASKET_SECTION).get(PRODUCTS_KEY).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored.contains_key("2"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);
        basket.add(1, 1).unwrap();

        basket.remove(1).unwrap();
        basket.remove(1).unwrap();
        assert!(basket.contents().unwrap().is_empty());
    }

    #[test]
    fn test_basket_expires_with_section() {
        let fx = fixture();
        let session = fx.store.start(None);
        let basket = fx.basket(&session);
        session.section(BASKET_SECTION).set_expiration(Some(Duration::from_secs(60)));
        basket.add(1, 1).unwrap();

        fx.store.clock().advance(Duration::from_secs(61));
        let session = fx.store.start(Some(&session.id()));
        assert!(fx.basket(&session).contents().unwrap().is_empty());
    }
}
