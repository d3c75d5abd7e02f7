use rusqlite::Connection;

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod lending;
pub mod models;
pub mod query;

pub use config::StoreConfig;
pub use error::{BorrowError, CatalogError, ConfigError, ReturnError, SchemaError, StoreError};
pub use models::{
  Book, BorrowFilter, BorrowRecord, BorrowStatus, CatalogEntry, NewBook, NewReader, Reader,
  SearchTarget,
};

/// Handle over one store connection. The shell owns it and calls in; there is
/// no process-wide connection.
pub struct Library {
  conn: Connection,
}

impl Library {
  /// Open the store described by `config` and make sure its tables exist.
  pub fn open(config: &StoreConfig) -> Result<Self, SchemaError> {
    let conn = db::open(config)?;
    db::ensure_schema(&conn)?;
    Ok(Self { conn })
  }

  pub fn open_in_memory() -> Result<Self, SchemaError> {
    Self::open(&StoreConfig::in_memory())
  }

  /// Wrap a connection opened elsewhere. Foreign keys are switched on here
  /// because cascade delete depends on them, then the schema check runs.
  pub fn from_connection(conn: Connection) -> Result<Self, SchemaError> {
    conn
      .execute_batch("PRAGMA foreign_keys = ON;")
      .map_err(SchemaError::Pragma)?;
    db::ensure_schema(&conn)?;
    Ok(Self { conn })
  }

  pub fn ensure_schema(&self) -> Result<(), SchemaError> {
    db::ensure_schema(&self.conn)
  }

  pub fn connection(&self) -> &Connection {
    &self.conn
  }

  pub fn borrow(&mut self, book_id: &str, reader_id: &str) -> Result<BorrowRecord, BorrowError> {
    lending::borrow(&mut self.conn, book_id, reader_id)
  }

  pub fn return_book(&mut self, borrow_id: i64) -> Result<(), ReturnError> {
    lending::return_book(&mut self.conn, borrow_id)
  }

  pub fn add_book(&self, book: &NewBook) -> Result<Book, CatalogError> {
    catalog::add_book(&self.conn, book)
  }

  pub fn add_reader(&self, reader: &NewReader) -> Result<Reader, CatalogError> {
    catalog::add_reader(&self.conn, reader)
  }

  pub fn delete_book(&mut self, book_id: &str) -> Result<usize, CatalogError> {
    catalog::delete_book(&mut self.conn, book_id)
  }

  pub fn delete_reader(&mut self, reader_id: &str) -> Result<usize, CatalogError> {
    catalog::delete_reader(&mut self.conn, reader_id)
  }

  pub fn get_book(&self, book_id: &str) -> Result<Option<Book>, StoreError> {
    query::get_book(&self.conn, book_id)
  }

  pub fn get_reader(&self, reader_id: &str) -> Result<Option<Reader>, StoreError> {
    query::get_reader(&self.conn, reader_id)
  }

  pub fn get_borrow(&self, borrow_id: i64) -> Result<Option<BorrowRecord>, StoreError> {
    query::get_borrow(&self.conn, borrow_id)
  }

  pub fn search(
    &self,
    target: SearchTarget,
    keyword: Option<&str>,
  ) -> Result<Vec<CatalogEntry>, StoreError> {
    query::search(&self.conn, target, keyword)
  }

  pub fn search_books(&self, keyword: Option<&str>) -> Result<Vec<Book>, StoreError> {
    query::search_books(&self.conn, keyword)
  }

  pub fn search_readers(&self, keyword: Option<&str>) -> Result<Vec<Reader>, StoreError> {
    query::search_readers(&self.conn, keyword)
  }

  pub fn list_borrows(&self, filter: BorrowFilter) -> Result<Vec<BorrowRecord>, StoreError> {
    query::list_borrows(&self.conn, filter)
  }

  pub fn list_outstanding(&self) -> Result<Vec<BorrowRecord>, StoreError> {
    query::list_outstanding(&self.conn)
  }

  pub fn export_records(&self) -> Result<String, StoreError> {
    export::export_records(&self.conn)
  }

  pub fn write_records<W: std::io::Write>(&self, out: &mut W) -> Result<(), StoreError> {
    export::write_records(&self.conn, out)
  }
}
