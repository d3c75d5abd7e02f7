use std::time::Duration;

use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::error::SchemaError;

const CREATE_BOOK_SQL: &str = "CREATE TABLE IF NOT EXISTS book (
    book_id TEXT PRIMARY KEY NOT NULL CHECK(length(book_id) > 0),
    book_name TEXT NOT NULL CHECK(length(book_name) > 0),
    author TEXT NOT NULL CHECK(length(author) > 0),
    category TEXT,
    stock INTEGER NOT NULL DEFAULT 0 CHECK(stock >= 0)
)";

const CREATE_READER_SQL: &str = "CREATE TABLE IF NOT EXISTS reader (
    reader_id TEXT PRIMARY KEY NOT NULL CHECK(length(reader_id) > 0),
    reader_name TEXT NOT NULL CHECK(length(reader_name) > 0),
    phone TEXT
)";

// AUTOINCREMENT keeps ids monotonic even after the newest record is cascaded away.
const CREATE_BORROW_SQL: &str = "CREATE TABLE IF NOT EXISTS borrow (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    book_id TEXT NOT NULL,
    reader_id TEXT NOT NULL,
    borrow_time INTEGER NOT NULL,
    return_time INTEGER,
    FOREIGN KEY(book_id) REFERENCES book(book_id) ON DELETE CASCADE,
    FOREIGN KEY(reader_id) REFERENCES reader(reader_id) ON DELETE CASCADE
)";

const CREATE_BORROW_INDEXES_SQL: &str = "
    CREATE INDEX IF NOT EXISTS idx_borrow_book ON borrow(book_id);
    CREATE INDEX IF NOT EXISTS idx_borrow_reader ON borrow(reader_id);
    CREATE INDEX IF NOT EXISTS idx_borrow_outstanding ON borrow(return_time) WHERE return_time IS NULL;
";

/// Open a connection for `config` and apply the per-connection pragmas.
///
/// Foreign keys are off by default in SQLite and must be switched on for every
/// connection, otherwise deleting a book or reader leaves its borrow rows behind.
pub fn open(config: &StoreConfig) -> Result<Connection, SchemaError> {
    let conn = match &config.path {
        Some(path) => Connection::open(path),
        None => Connection::open_in_memory(),
    }
    .map_err(|source| {
        log::error!("failed to open store at {}: {}", config.describe(), source);
        SchemaError::Open {
            path: config.describe(),
            source,
        }
    })?;

    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(SchemaError::Pragma)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(SchemaError::Pragma)?;

    log::info!("opened circulation store at {}", config.describe());
    Ok(conn)
}

/// Create the book, reader and borrow tables if they are missing.
///
/// Safe to run on every start: every statement is `IF NOT EXISTS` and existing
/// rows are never touched.
pub fn ensure_schema(conn: &Connection) -> Result<(), SchemaError> {
    create(conn, "book", CREATE_BOOK_SQL)?;
    create(conn, "reader", CREATE_READER_SQL)?;
    create(conn, "borrow", CREATE_BORROW_SQL)?;
    conn.execute_batch(CREATE_BORROW_INDEXES_SQL)
        .map_err(|source| SchemaError::Create {
            table: "borrow",
            source,
        })?;
    Ok(())
}

fn create(conn: &Connection, table: &'static str, sql: &str) -> Result<(), SchemaError> {
    conn.execute(sql, []).map_err(|source| {
        log::error!("failed to create table {}: {}", table, source);
        SchemaError::Create { table, source }
    })?;
    Ok(())
}

/// Convenience for tests and tools: open `config` and provision the schema.
pub fn open_with_schema(config: &StoreConfig) -> Result<Connection, SchemaError> {
    let conn = open(config)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn ensure_schema_creates_tables() {
        let conn = open_with_schema(&StoreConfig::in_memory()).unwrap();
        assert_eq!(table_names(&conn), vec!["book", "borrow", "reader"]);
    }

    #[test]
    fn ensure_schema_is_idempotent_and_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("library.db"));

        let conn = open_with_schema(&config).unwrap();
        conn.execute(
            "INSERT INTO book (book_id, book_name, author, stock) VALUES ('B1', 'Dune', 'Herbert', 3)",
            [],
        )
        .unwrap();
        ensure_schema(&conn).unwrap();
        drop(conn);

        let conn = open_with_schema(&config).unwrap();
        let stock: i64 = conn
            .query_row("SELECT stock FROM book WHERE book_id = 'B1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stock, 3);
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open(&StoreConfig::in_memory()).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn negative_stock_rejected_by_store() {
        let conn = open_with_schema(&StoreConfig::in_memory()).unwrap();
        let result = conn.execute(
            "INSERT INTO book (book_id, book_name, author, stock) VALUES ('B1', 'Dune', 'Herbert', -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn unopenable_path_is_open_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("missing").join("library.db"));
        assert!(matches!(open(&config), Err(SchemaError::Open { .. })));
    }
}
