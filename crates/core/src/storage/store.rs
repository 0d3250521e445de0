use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use crate::errors::CoreError;
use crate::models::transaction::{
    format_timestamp, parse_timestamp, NewTransaction, Transaction, TransactionUpdate,
};

use super::schema::apply_schema;

const SELECT_COLUMNS: &str = "id, date, asset, symbol, quantity, purchase_price, \
                              total_cash_invested, current_price, profit_loss";

/// CRUD surface over the `transactions` table.
///
/// Owns a single SQLite connection. The store does not arbitrate concurrent
/// writers, so it is meant to be owned by one tracker on one thread.
pub struct TransactionStore {
    conn: Connection,
    path: PathBuf,
}

impl std::fmt::Debug for TransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStore")
            .field("path", &self.path)
            .finish()
    }
}

impl TransactionStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::info!("Opening transaction store at: {:?}", path);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if let Err(e) = apply_schema(&conn) {
            log::error!("Failed to create transactions table: {}", e);
            return Err(e);
        }

        Ok(Self { conn, path })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a transaction and return its assigned id. Never overwrites.
    pub fn create(&self, tx: &NewTransaction) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO transactions \
             (date, asset, symbol, quantity, purchase_price, total_cash_invested, current_price, profit_loss) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                format_timestamp(&tx.timestamp),
                tx.asset_name,
                tx.asset_symbol,
                tx.quantity,
                tx.purchase_price,
                tx.invested_cash,
                tx.last_price,
                tx.last_profit_loss,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        log::debug!("Inserted transaction {} ({})", id, tx.asset_symbol);
        Ok(id)
    }

    /// All transactions in insertion order.
    pub fn list_all(&self) -> Result<Vec<Transaction>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM transactions ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_transaction)?;
        let transactions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// A single transaction, or `None` if the id does not exist.
    pub fn get(&self, id: i64) -> Result<Option<Transaction>, CoreError> {
        let tx = self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE id = ?1"),
                [id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Apply only the fields set in `update`.
    ///
    /// Returns `false` when the id does not exist. An empty update on an
    /// existing id is a successful no-op.
    pub fn update(&self, id: i64, update: &TransactionUpdate) -> Result<bool, CoreError> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ts) = &update.timestamp {
            assignments.push("date = ?");
            values.push(Value::Text(format_timestamp(ts)));
        }
        if let Some(quantity) = update.quantity {
            assignments.push("quantity = ?");
            values.push(Value::Real(quantity));
        }
        if let Some(price) = update.purchase_price {
            assignments.push("purchase_price = ?");
            values.push(Value::Real(price));
        }
        if let Some(invested) = update.invested_cash {
            assignments.push("total_cash_invested = ?");
            values.push(Value::Real(invested));
        }
        if let Some(last_price) = update.last_price {
            assignments.push("current_price = ?");
            values.push(Value::Real(last_price));
        }
        if let Some(last_pl) = update.last_profit_loss {
            assignments.push("profit_loss = ?");
            values.push(Value::Real(last_pl));
        }

        if assignments.is_empty() {
            return self.exists(id);
        }

        values.push(Value::Integer(id));
        let sql = format!(
            "UPDATE transactions SET {} WHERE id = ?",
            assignments.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    /// Remove one row. Returns `false` (and changes nothing) if absent.
    pub fn delete(&self, id: i64) -> Result<bool, CoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM transactions WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Unconditionally remove every row. Returns how many were removed.
    pub fn clear_all(&self) -> Result<usize, CoreError> {
        let removed = self.conn.execute("DELETE FROM transactions", [])?;
        log::info!("Cleared {} transactions", removed);
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize, CoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    fn exists(&self, id: i64) -> Result<bool, CoreError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM transactions WHERE id = ?1", [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let raw_date: String = row.get(1)?;
    let timestamp = parse_timestamp(&raw_date)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(Transaction {
        id: row.get(0)?,
        timestamp,
        asset_name: row.get(2)?,
        asset_symbol: row.get(3)?,
        quantity: row.get(4)?,
        purchase_price: row.get(5)?,
        invested_cash: row.get(6)?,
        last_price: row.get(7)?,
        last_profit_loss: row.get(8)?,
    })
}
