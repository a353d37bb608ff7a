// Demo catalogue used by `eshop init-db --seed` and the test suites

use rusqlite::params;
use tracing::info;

use super::Database;
use crate::catalog::{NewProduct, ProductService};
use crate::error::ShopResult;
use crate::money::Price;
use crate::orders::PAYMENT_METHOD_ID_PAYPAL;

/// (name, description, price in pence, image)
const PRODUCTS: &[(&str, &str, i64, &str)] = &[
    ("Canvas Backpack", "Waxed canvas backpack with a padded laptop sleeve.", 5999, "backpack.jpg"),
    ("Enamel Mug", "Speckled enamel camping mug, 350 ml.", 1250, "mug.jpg"),
    ("Wool Beanie", "Ribbed merino beanie in charcoal.", 1800, "beanie.jpg"),
    ("Notebook", "A5 dotted notebook, 192 pages.", 899, "notebook.jpg"),
];

/// (id, name, price in pence)
const SHIPPING_METHODS: &[(i64, &str, i64)] = &[
    (1, "Royal Mail 2nd Class", 299),
    (2, "Next Day Courier", 699),
    (3, "Personal collection", 0),
];

const PAYMENT_METHODS: &[(i64, &str, i64)] = &[
    (1, "Cash on delivery", 99),
    (PAYMENT_METHOD_ID_PAYPAL, "PayPal", 0),
    (3, "Bank transfer", 0),
];

/// Insert demo rows into empty tables; existing data is left alone
pub fn seed_demo_data(db: &Database) -> ShopResult<usize> {
    let mut inserted = 0;

    let products: i64 = db.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0)))?;
    if products == 0 {
        let catalog = ProductService::new(db.clone(), "");
        for (name, description, price, image) in PRODUCTS {
            catalog.create_product(&NewProduct {
                name: name.to_string(),
                description: description.to_string(),
                price: Price(*price),
                image: image.to_string(),
            })?;
            inserted += 1;
        }
    }

    inserted += db.with_conn(|conn| {
        let mut inserted = 0;

        let shipping: i64 = conn.query_row("SELECT COUNT(*) FROM shipping_methods", [], |row| row.get(0))?;
        if shipping == 0 {
            for (id, name, price) in SHIPPING_METHODS {
                inserted += conn.execute(
                    "INSERT INTO shipping_methods (id, name, price) VALUES (?1, ?2, ?3)",
                    params![id, name, price],
                )?;
            }
        }

        let payment: i64 = conn.query_row("SELECT COUNT(*) FROM payment_methods", [], |row| row.get(0))?;
        if payment == 0 {
            for (id, name, price) in PAYMENT_METHODS {
                inserted += conn.execute(
                    "INSERT INTO payment_methods (id, name, price) VALUES (?1, ?2, ?3)",
                    params![id, name, price],
                )?;
            }
        }

        Ok(inserted)
    })?;

    info!(rows = inserted, "Demo data seeded");
    Ok(inserted)
}
