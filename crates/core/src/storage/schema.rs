use rusqlite::Connection;

use crate::errors::CoreError;

/// Create the transactions table if it does not exist yet.
///
/// Safe to run on every open.
pub fn apply_schema(conn: &Connection) -> Result<(), CoreError> {
    log::debug!("Ensuring transactions schema");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// Column names follow the layout the dashboard has always written:
// `total_cash_invested` is the invested cash, `current_price` and
// `profit_loss` are the last refresh snapshot.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    date                TEXT NOT NULL,
    asset               TEXT NOT NULL,
    symbol              TEXT NOT NULL,
    quantity            REAL NOT NULL,
    purchase_price      REAL NOT NULL,
    total_cash_invested REAL NOT NULL,
    current_price       REAL,
    profit_loss         REAL
);
"#;
