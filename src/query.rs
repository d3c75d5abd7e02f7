//! Read side: point lookups, keyword search and borrow listings.
//!
//! Nothing here caches; every call reads the latest committed state.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::StoreError;
use crate::models::{
    millis_to_utc, Book, BorrowFilter, BorrowRecord, CatalogEntry, Reader, SearchTarget,
};

const BOOK_COLUMNS: &str = "book_id, book_name, author, category, stock";
const READER_COLUMNS: &str = "reader_id, reader_name, phone";
const BORROW_COLUMNS: &str = "id, book_id, reader_id, borrow_time, return_time";

pub(crate) fn book_from_row(row: &Row) -> rusqlite::Result<Book> {
    Ok(Book {
        book_id: row.get(0)?,
        name: row.get(1)?,
        author: row.get(2)?,
        category: row.get(3)?,
        stock: row.get(4)?,
    })
}

pub(crate) fn reader_from_row(row: &Row) -> rusqlite::Result<Reader> {
    Ok(Reader {
        reader_id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
    })
}

pub(crate) fn borrow_from_row(row: &Row) -> rusqlite::Result<BorrowRecord> {
    let borrow_millis: i64 = row.get(3)?;
    let return_millis: Option<i64> = row.get(4)?;
    let borrow_time = millis_to_utc(borrow_millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, borrow_millis))?;
    let return_time = match return_millis {
        Some(millis) => {
            Some(millis_to_utc(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(4, millis))?)
        }
        None => None,
    };
    Ok(BorrowRecord {
        id: row.get(0)?,
        book_id: row.get(1)?,
        reader_id: row.get(2)?,
        borrow_time,
        return_time,
    })
}

pub fn get_book(conn: &Connection, book_id: &str) -> Result<Option<Book>, StoreError> {
    let sql = format!("SELECT {BOOK_COLUMNS} FROM book WHERE book_id = ?1");
    Ok(conn
        .query_row(&sql, params![book_id], book_from_row)
        .optional()?)
}

pub fn get_reader(conn: &Connection, reader_id: &str) -> Result<Option<Reader>, StoreError> {
    let sql = format!("SELECT {READER_COLUMNS} FROM reader WHERE reader_id = ?1");
    Ok(conn
        .query_row(&sql, params![reader_id], reader_from_row)
        .optional()?)
}

pub fn get_borrow(conn: &Connection, borrow_id: i64) -> Result<Option<BorrowRecord>, StoreError> {
    let sql = format!("SELECT {BORROW_COLUMNS} FROM borrow WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![borrow_id], borrow_from_row)
        .optional()?)
}

/// Escape LIKE wildcards so the keyword matches as a literal substring.
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Normalizes the caller's keyword; blank means "no filter".
fn normalized_keyword(keyword: Option<&str>) -> Option<&str> {
    keyword.map(str::trim).filter(|k| !k.is_empty())
}

/// Books whose id, name, author or category contain `keyword`; all books when
/// the keyword is absent or blank.
pub fn search_books(conn: &Connection, keyword: Option<&str>) -> Result<Vec<Book>, StoreError> {
    let books = match normalized_keyword(keyword) {
        Some(keyword) => {
            let sql = format!(
                "SELECT {BOOK_COLUMNS} FROM book
                 WHERE book_id LIKE ?1 ESCAPE '\\'
                    OR book_name LIKE ?1 ESCAPE '\\'
                    OR author LIKE ?1 ESCAPE '\\'
                    OR category LIKE ?1 ESCAPE '\\'
                 ORDER BY book_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![like_pattern(keyword)], book_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("SELECT {BOOK_COLUMNS} FROM book ORDER BY book_id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], book_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(books)
}

pub fn search_readers(
    conn: &Connection,
    keyword: Option<&str>,
) -> Result<Vec<Reader>, StoreError> {
    let readers = match normalized_keyword(keyword) {
        Some(keyword) => {
            let sql = format!(
                "SELECT {READER_COLUMNS} FROM reader
                 WHERE reader_id LIKE ?1 ESCAPE '\\'
                    OR reader_name LIKE ?1 ESCAPE '\\'
                    OR phone LIKE ?1 ESCAPE '\\'
                 ORDER BY reader_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![like_pattern(keyword)], reader_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("SELECT {READER_COLUMNS} FROM reader ORDER BY reader_id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], reader_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(readers)
}

pub fn search(
    conn: &Connection,
    target: SearchTarget,
    keyword: Option<&str>,
) -> Result<Vec<CatalogEntry>, StoreError> {
    Ok(match target {
        SearchTarget::Books => search_books(conn, keyword)?
            .into_iter()
            .map(CatalogEntry::Book)
            .collect(),
        SearchTarget::Readers => search_readers(conn, keyword)?
            .into_iter()
            .map(CatalogEntry::Reader)
            .collect(),
    })
}

pub fn list_borrows(
    conn: &Connection,
    filter: BorrowFilter,
) -> Result<Vec<BorrowRecord>, StoreError> {
    let sql = match filter {
        BorrowFilter::All => format!("SELECT {BORROW_COLUMNS} FROM borrow ORDER BY id"),
        BorrowFilter::Outstanding => format!(
            "SELECT {BORROW_COLUMNS} FROM borrow WHERE return_time IS NULL ORDER BY id"
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], borrow_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn list_outstanding(conn: &Connection) -> Result<Vec<BorrowRecord>, StoreError> {
    list_borrows(conn, BorrowFilter::Outstanding)
}
