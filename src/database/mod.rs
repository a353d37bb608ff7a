// Database Module
// SQLite persistence for products, users, shipping/payment methods and orders

pub mod seed;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::sync::Arc;
use tracing::info;

use crate::error::ShopResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL,
    description TEXT    NOT NULL DEFAULT '',
    price       INTEGER NOT NULL CHECK (price >= 0),
    image       TEXT    NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    email    TEXT    NOT NULL UNIQUE,
    forename TEXT    NOT NULL,
    surname  TEXT    NOT NULL,
    password TEXT    NOT NULL,
    created  TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS shipping_methods (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT    NOT NULL,
    price INTEGER NOT NULL CHECK (price >= 0)
);

CREATE TABLE IF NOT EXISTS payment_methods (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    name  TEXT    NOT NULL,
    price INTEGER NOT NULL CHECK (price >= 0)
);

CREATE TABLE IF NOT EXISTS orders (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id           INTEGER NOT NULL REFERENCES users (id),
    status            TEXT    NOT NULL DEFAULT 'Pending',
    is_paid           INTEGER NOT NULL DEFAULT 0,
    payment_reference TEXT,
    ip                TEXT    NOT NULL DEFAULT '',
    email             TEXT    NOT NULL,
    forename          TEXT    NOT NULL,
    surname           TEXT    NOT NULL,
    address           TEXT    NOT NULL,
    city              TEXT    NOT NULL,
    zip               TEXT    NOT NULL,
    shipping_forename TEXT,
    shipping_surname  TEXT,
    shipping_address  TEXT,
    shipping_city     TEXT,
    shipping_zip      TEXT,
    created           TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS order_items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id    INTEGER NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    item_type   TEXT    NOT NULL CHECK (item_type IN ('product', 'shipping', 'payment')),
    product_id  INTEGER,
    shipping_id INTEGER,
    payment_id  INTEGER,
    quantity    INTEGER NOT NULL DEFAULT 1 CHECK (quantity > 0),
    price       INTEGER NOT NULL,
    name        TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_user ON orders (user_id);
CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items (order_id);
"#;

/// Shared SQLite connection
///
/// A single connection behind a mutex; every statement is short and the
/// storefront serves one request per visitor at a time.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .with_context(|| format!("Failed to open database: {}", path))?;

        let db = Self::from_connection(conn).context("Failed to prepare database")?;
        info!(path = %path, "Database ready");

        Ok(db)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create missing tables; safe to run repeatedly
    pub fn migrate(&self) -> rusqlite::Result<()> {
        self.conn.lock().execute_batch(SCHEMA)
    }

    /// Run read/write statements on the connection
    pub fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<R>) -> rusqlite::Result<R> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction, committing only when it succeeds
    pub fn transaction<R>(&self, f: impl FnOnce(&Transaction<'_>) -> ShopResult<R>) -> ShopResult<R> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
