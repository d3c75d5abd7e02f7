//! Creating and deleting books and readers.
//!
//! Each call validates in a fixed order (required fields, then uniqueness) and
//! persists in one step. Deletes cascade to the entity's borrow records.

use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension};

use crate::error::CatalogError;
use crate::models::{Book, NewBook, NewReader, Reader};

fn required(value: &str, field: &'static str) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::EmptyField(field));
    }
    Ok(value.to_string())
}

/// A primary key collision on insert means another writer added the same id
/// after the uniqueness check.
fn insert_error(err: rusqlite::Error, entity: &'static str, id: &str) -> CatalogError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                ) =>
        {
            CatalogError::DuplicateId {
                entity,
                id: id.to_string(),
            }
        }
        _ => CatalogError::Store(err),
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn add_book(conn: &Connection, new_book: &NewBook) -> Result<Book, CatalogError> {
    let book = Book {
        book_id: required(&new_book.book_id, "book id")?,
        name: required(&new_book.name, "book name")?,
        author: required(&new_book.author, "author")?,
        category: optional(new_book.category.as_deref()),
        stock: new_book.stock,
    };
    if book.stock < 0 {
        return Err(CatalogError::NegativeStock(book.stock));
    }

    let existing: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM book WHERE book_id = ?1",
            params![book.book_id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(CatalogError::DuplicateId {
            entity: "book",
            id: book.book_id,
        });
    }

    conn.execute(
        "INSERT INTO book (book_id, book_name, author, category, stock) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![book.book_id, book.name, book.author, book.category, book.stock],
    )
    .map_err(|err| insert_error(err, "book", &book.book_id))?;
    log::info!("added book {} ({} in stock)", book.book_id, book.stock);
    Ok(book)
}

pub fn add_reader(conn: &Connection, new_reader: &NewReader) -> Result<Reader, CatalogError> {
    let reader = Reader {
        reader_id: required(&new_reader.reader_id, "reader id")?,
        name: required(&new_reader.name, "reader name")?,
        phone: optional(new_reader.phone.as_deref()),
    };

    let existing: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM reader WHERE reader_id = ?1",
            params![reader.reader_id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(CatalogError::DuplicateId {
            entity: "reader",
            id: reader.reader_id,
        });
    }

    conn.execute(
        "INSERT INTO reader (reader_id, reader_name, phone) VALUES (?1, ?2, ?3)",
        params![reader.reader_id, reader.name, reader.phone],
    )
    .map_err(|err| insert_error(err, "reader", &reader.reader_id))?;
    log::info!("added reader {}", reader.reader_id);
    Ok(reader)
}

/// Delete a book and, through the foreign key cascade, all of its borrow
/// records. Returns how many borrow records went with it.
pub fn delete_book(conn: &mut Connection, book_id: &str) -> Result<usize, CatalogError> {
    delete_entity(conn, "book", "book_id", "book id", book_id)
}

/// Delete a reader and all of their borrow records, outstanding or not.
pub fn delete_reader(conn: &mut Connection, reader_id: &str) -> Result<usize, CatalogError> {
    delete_entity(conn, "reader", "reader_id", "reader id", reader_id)
}

fn delete_entity(
    conn: &mut Connection,
    entity: &'static str,
    key: &'static str,
    field: &'static str,
    id: &str,
) -> Result<usize, CatalogError> {
    let id = required(id, field)?;
    let tx = conn.transaction()?;

    let cascaded: i64 = tx.query_row(
        &format!("SELECT COUNT(*) FROM borrow WHERE {key} = ?1"),
        params![id],
        |row| row.get(0),
    )?;
    let deleted = tx.execute(
        &format!("DELETE FROM {entity} WHERE {key} = ?1"),
        params![id],
    )?;
    if deleted == 0 {
        tx.rollback()?;
        return Err(CatalogError::NotFound { entity, id });
    }
    tx.commit()?;

    if cascaded > 0 {
        log::warn!(
            "deleted {} {} together with {} borrow record(s)",
            entity,
            id,
            cascaded
        );
    } else {
        log::info!("deleted {} {}", entity, id);
    }
    Ok(cascaded as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::db;
    use crate::lending;
    use crate::models::BorrowFilter;
    use crate::query;
    use pretty_assertions::assert_eq;

    fn store() -> Connection {
        db::open_with_schema(&StoreConfig::in_memory()).unwrap()
    }

    fn dune(stock: i64) -> NewBook {
        NewBook {
            book_id: "B1".into(),
            name: "Dune".into(),
            author: "Frank Herbert".into(),
            category: Some("sci-fi".into()),
            stock,
        }
    }

    fn ada() -> NewReader {
        NewReader {
            reader_id: "R1".into(),
            name: "Ada".into(),
            phone: None,
        }
    }

    #[test]
    fn add_book_trims_and_normalizes() {
        let conn = store();
        let book = add_book(
            &conn,
            &NewBook {
                book_id: "  B1 ".into(),
                category: Some("   ".into()),
                ..dune(3)
            },
        )
        .unwrap();
        assert_eq!(book.book_id, "B1");
        assert_eq!(book.category, None);
        assert_eq!(query::get_book(&conn, "B1").unwrap().unwrap(), book);
    }

    #[test]
    fn add_book_validation_order() {
        let conn = store();
        let err = add_book(
            &conn,
            &NewBook {
                name: "".into(),
                author: "".into(),
                ..dune(1)
            },
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::EmptyField("book name")));

        assert!(matches!(
            add_book(&conn, &dune(-1)),
            Err(CatalogError::NegativeStock(-1))
        ));

        add_book(&conn, &dune(1)).unwrap();
        assert!(matches!(
            add_book(&conn, &dune(5)),
            Err(CatalogError::DuplicateId { entity: "book", .. })
        ));
        assert_eq!(query::get_book(&conn, "B1").unwrap().unwrap().stock, 1);
    }

    #[test]
    fn add_reader_rejects_duplicates() {
        let conn = store();
        add_reader(&conn, &ada()).unwrap();
        assert!(matches!(
            add_reader(&conn, &ada()),
            Err(CatalogError::DuplicateId { entity: "reader", .. })
        ));
        assert!(matches!(
            add_reader(&conn, &NewReader { name: " ".into(), ..ada() }),
            Err(CatalogError::EmptyField("reader name"))
        ));
    }

    #[test]
    fn deleting_reader_cascades_to_records() {
        let mut conn = store();
        add_book(&conn, &dune(2)).unwrap();
        add_reader(&conn, &ada()).unwrap();
        add_reader(
            &conn,
            &NewReader {
                reader_id: "R2".into(),
                name: "Grace".into(),
                phone: Some("555-0101".into()),
            },
        )
        .unwrap();
        let held = lending::borrow(&mut conn, "B1", "R1").unwrap();
        lending::borrow(&mut conn, "B1", "R2").unwrap();

        assert_eq!(delete_reader(&mut conn, "R1").unwrap(), 1);
        assert!(query::get_borrow(&conn, held.id).unwrap().is_none());
        assert!(query::list_outstanding(&conn)
            .unwrap()
            .iter()
            .all(|r| r.reader_id != "R1"));
        assert_eq!(query::list_borrows(&conn, BorrowFilter::All).unwrap().len(), 1);
        assert!(crate::export::export_records(&conn).unwrap().lines().all(|l| !l.contains("R1")));
    }

    #[test]
    fn deleting_book_cascades_to_records() {
        let mut conn = store();
        add_book(&conn, &dune(1)).unwrap();
        add_reader(&conn, &ada()).unwrap();
        let record = lending::borrow(&mut conn, "B1", "R1").unwrap();
        lending::return_book(&mut conn, record.id).unwrap();

        assert_eq!(delete_book(&mut conn, "B1").unwrap(), 1);
        assert!(query::get_book(&conn, "B1").unwrap().is_none());
        assert!(query::list_borrows(&conn, BorrowFilter::All).unwrap().is_empty());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut conn = store();
        assert!(matches!(
            delete_book(&mut conn, "B9"),
            Err(CatalogError::NotFound { entity: "book", .. })
        ));
        assert!(matches!(
            delete_book(&mut conn, "  "),
            Err(CatalogError::EmptyField("book id"))
        ));
        assert!(matches!(
            delete_reader(&mut conn, ""),
            Err(CatalogError::EmptyField("reader id"))
        ));
    }

    #[test]
    fn primary_key_collision_maps_to_duplicate() {
        let conn = store();
        add_reader(&conn, &ada()).unwrap();
        // Same insert the catalog issues, as if a second writer won the race.
        let err = conn
            .execute(
                "INSERT INTO reader (reader_id, reader_name, phone) VALUES ('R1', 'Other', NULL)",
                [],
            )
            .unwrap_err();
        assert!(matches!(
            insert_error(err, "reader", "R1"),
            CatalogError::DuplicateId { entity: "reader", ref id } if id == "R1"
        ));

        let err = conn
            .execute(
                "INSERT INTO reader (reader_id, reader_name) VALUES ('R2', '')",
                [],
            )
            .unwrap_err();
        assert!(matches!(insert_error(err, "reader", "R2"), CatalogError::Store(_)));
    }
}
