//! SQLite storage for users, menu items, orders and bills.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension, Result as DbResult};
use serde::{Deserialize, Serialize};

pub type SharedStore = Arc<Mutex<Store>>;

const DROP_SCHEMA: &str = r#"
DROP TABLE IF EXISTS bills;
DROP TABLE IF EXISTS orders;
DROP TABLE IF EXISTS items;
DROP TABLE IF EXISTS users;
"#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price REAL NOT NULL,
    popularity INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS orders (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    item_id INTEGER NOT NULL,
    quantity INTEGER NOT NULL,
    order_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (item_id) REFERENCES items (item_id),
    FOREIGN KEY (user_id) REFERENCES users (user_id)
);

CREATE TABLE IF NOT EXISTS bills (
    bill_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    total_cost REAL NOT NULL,
    bill_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users (user_id)
);
"#;

/// One entry of the menu seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub item: String,
    pub quantity: i64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bill {
    pub total_cost: f64,
    pub order_date: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> DbResult<Self> {
        tracing::info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Insert menu items, skipping exact (name, price) repeats. Returns how
    /// many rows were written.
    pub fn seed_menu(&mut self, items: &[MenuItem]) -> DbResult<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_menu(&tx, items)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Drop every table, recreate the schema and seed `items`, all in one
    /// transaction. On error the database is left as it was.
    pub fn reset_with_menu(&mut self, items: &[MenuItem]) -> DbResult<usize> {
        tracing::info!("Resetting database schema");
        let tx = self.conn.transaction()?;
        tx.execute_batch(DROP_SCHEMA)?;
        tx.execute_batch(SCHEMA)?;
        let inserted = insert_menu(&tx, items)?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn find_user(&self, username: &str) -> DbResult<Option<User>> {
        self.conn
            .query_row(
                "SELECT user_id, username, password FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn insert_user(&self, username: &str, password_hash: &str) -> DbResult<i64> {
        self.conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, password_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn menu(&self) -> DbResult<Vec<MenuItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, price FROM items ORDER BY item_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(MenuItem {
                name: row.get(0)?,
                price: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    pub fn item_names(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM items GROUP BY name ORDER BY MIN(item_id)")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    /// Most popular items first; ties go to the earlier menu entry.
    pub fn popular_items(&self, limit: usize) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM items ORDER BY popularity DESC, item_id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;
        rows.collect()
    }

    /// Case-insensitive price lookup, used for chat carts.
    pub fn price_of(&self, name: &str) -> DbResult<Option<f64>> {
        self.conn
            .query_row(
                "SELECT price FROM items WHERE LOWER(name) = ?1 ORDER BY item_id LIMIT 1",
                params![name.to_lowercase()],
                |row| row.get(0),
            )
            .optional()
    }

    /// Record an order. Unknown item names are skipped; a bill row is written
    /// only when the total is positive. Returns the total.
    pub fn place_order(&mut self, user_id: i64, lines: &[(String, i64)]) -> DbResult<f64> {
        let tx = self.conn.transaction()?;
        let mut total_cost = 0.0;

        for (name, quantity) in lines {
            let item: Option<(i64, f64)> = tx
                .query_row(
                    "SELECT item_id, price FROM items WHERE name = ?1 ORDER BY item_id LIMIT 1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((item_id, price)) = item else {
                tracing::warn!("Item '{}' not found in database", name);
                continue;
            };

            total_cost += price * *quantity as f64;
            tx.execute(
                "INSERT INTO orders (user_id, item_id, quantity) VALUES (?1, ?2, ?3)",
                params![user_id, item_id, quantity],
            )?;
            tx.execute(
                "UPDATE items SET popularity = popularity + ?1 WHERE item_id = ?2",
                params![quantity, item_id],
            )?;
        }

        if total_cost > 0.0 {
            tx.execute(
                "INSERT INTO bills (user_id, total_cost) VALUES (?1, ?2)",
                params![user_id, total_cost],
            )?;
            tracing::info!("Inserted bill for user {}: {:.2}", user_id, total_cost);
        } else {
            tracing::info!("No valid items ordered, bill not created");
        }

        tx.commit()?;
        Ok(total_cost)
    }

    pub fn order_history(&self, user_id: i64) -> DbResult<Vec<OrderLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.name, o.quantity, o.order_date FROM orders o
             JOIN items i ON o.item_id = i.item_id
             WHERE o.user_id = ?1
             ORDER BY o.order_date DESC, o.order_id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(OrderLine {
                item: row.get(0)?,
                quantity: row.get(1)?,
                date: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn latest_bill(&self, user_id: i64) -> DbResult<Option<Bill>> {
        self.conn
            .query_row(
                "SELECT total_cost, bill_date FROM bills WHERE user_id = ?1
                 ORDER BY bill_date DESC, bill_id DESC LIMIT 1",
                params![user_id],
                |row| {
                    Ok(Bill {
                        total_cost: row.get(0)?,
                        order_date: row.get(1)?,
                    })
                },
            )
            .optional()
    }
}

fn insert_menu(conn: &Connection, items: &[MenuItem]) -> DbResult<usize> {
    let mut seen: Vec<&MenuItem> = Vec::new();
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }

    let mut stmt = conn.prepare("INSERT INTO items (name, price) VALUES (?1, ?2)")?;
    for item in &seen {
        stmt.execute(params![item.name, item.price])?;
    }
    Ok(seen.len())
}

/// Read a menu seed file: a JSON array of `{name, price}`.
pub fn load_menu(path: &Path) -> anyhow::Result<Vec<MenuItem>> {
    let content = std::fs::read_to_string(path)?;
    let items: Vec<MenuItem> = serde_json::from_str(&content)?;
    Ok(items)
}

/// Rebuild the database at `db` with the menu in `menu`. The menu is read
/// before anything is dropped, so a bad file leaves the database untouched.
pub fn setup(db: &Path, menu: &Path) -> anyhow::Result<usize> {
    let items = load_menu(menu)
        .with_context(|| format!("Failed to read menu {}", menu.display()))?;
    let mut store = Store::open(db)
        .with_context(|| format!("Failed to open database {}", db.display()))?;
    Ok(store.reset_with_menu(&items)?)
}

#[cfg(test)]
pub(crate) fn sample_menu() -> Vec<MenuItem> {
    vec![
        MenuItem { name: "Pilau Rice".to_string(), price: 2.95 },
        MenuItem { name: "Plain Naan".to_string(), price: 2.6 },
        MenuItem { name: "Chicken Tikka Masala".to_string(), price: 8.95 },
        MenuItem { name: "Plain Naan".to_string(), price: 2.6 },
        MenuItem { name: "Mango Chutney".to_string(), price: 0.5 },
    ]
}
