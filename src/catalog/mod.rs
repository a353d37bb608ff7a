// Catalog Module
// Product listing, product detail and product image resolution

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::database::Database;
use crate::error::ShopResult;
use crate::money::Price;

/// Image shown when a product has no readable picture
pub const NO_IMAGE_PATH: &str = "images/noimg.png";

/// Product row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image: String,
}

impl Product {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            price: Price(row.get("price")?),
            image: row.get("image")?,
        })
    }
}

/// New product data
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
}

/// Read access to the product table
#[derive(Clone)]
pub struct ProductService {
    db: Database,
    images_dir: PathBuf,
}

impl ProductService {
    pub fn new(db: Database, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            images_dir: images_dir.into(),
        }
    }

    pub fn product_by_id(&self, id: i64) -> ShopResult<Option<Product>> {
        let product = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, price, image FROM products WHERE id = ?1",
                params![id],
                Product::from_row,
            )
            .optional()
        })?;

        Ok(product)
    }

    pub fn all_products(&self) -> ShopResult<Vec<Product>> {
        let products = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, description, price, image FROM products ORDER BY id")?;
            let rows = stmt.query_map([], Product::from_row)?;
            rows.collect()
        })?;

        Ok(products)
    }

    pub fn create_product(&self, product: &NewProduct) -> ShopResult<i64> {
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (name, description, price, image) VALUES (?1, ?2, ?3, ?4)",
                params![product.name, product.description, product.price.minor(), product.image],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(id)
    }

    /// Site-relative image path, falling back to the placeholder image
    pub fn image_path(&self, image: &str) -> String {
        let readable = !image.is_empty()
            && !image.contains("..")
            && !image.contains('/')
            && std::fs::File::open(self.images_dir.join("products").join(image)).is_ok();

        if readable {
            format!("images/products/{}", image)
        } else {
            NO_IMAGE_PATH.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::seed::seed_demo_data;

    fn service() -> ProductService {
        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db).unwrap();
        ProductService::new(db, "does-not-exist")
    }

    #[test]
    fn test_all_products() {
        let products = service().all_products().unwrap();
        assert_eq!(products.len(), 4);
        assert_eq!(products[0].name, "Canvas Backpack");
        assert_eq!(products[0].price, Price(5999));
    }

    #[test]
    fn test_product_by_id() {
        let service = service();
        assert_eq!(service.product_by_id(2).unwrap().unwrap().name, "Enamel Mug");
        assert!(service.product_by_id(999).unwrap().is_none());
    }

    #[test]
    fn test_create_product() {
        let service = service();
        let id = service
            .create_product(&NewProduct {
                name: "Poster".into(),
                description: String::new(),
                price: Price(700),
                image: String::new(),
            })
            .unwrap();

        let product = service.product_by_id(id).unwrap().unwrap();
        assert_eq!(product.name, "Poster");
        assert_eq!(product.price, Price(700));
        assert_eq!(service.all_products().unwrap().len(), 5);
    }

    #[test]
    fn test_image_path_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("products")).unwrap();
        std::fs::write(dir.path().join("products").join("mug.jpg"), b"jpeg").unwrap();

        let db = Database::open_in_memory().unwrap();
        let service = ProductService::new(db, dir.path());

        assert_eq!(service.image_path("mug.jpg"), "images/products/mug.jpg");
        assert_eq!(service.image_path("missing.jpg"), NO_IMAGE_PATH);
        assert_eq!(service.image_path("../secret"), NO_IMAGE_PATH);
        assert_eq!(service.image_path(""), NO_IMAGE_PATH);
    }
}
