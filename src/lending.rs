//! Borrow and return transactions.
//!
//! Each operation runs its checks and its writes inside one IMMEDIATE
//! transaction, so the write lock is held from the first read. Validation and
//! mutation must never be split across transactions: two borrows of the last
//! copy would both pass the stock check.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::error::{BorrowError, ReturnError};
use crate::models::{millis_to_utc, BorrowRecord};

/// Lend one copy of `book_id` to `reader_id`.
///
/// Checks run in order: book exists, book has stock, reader exists. On success
/// the new record is inserted and the stock decremented in the same commit.
pub fn borrow(
    conn: &mut Connection,
    book_id: &str,
    reader_id: &str,
) -> Result<BorrowRecord, BorrowError> {
    let book_id = book_id.trim();
    let reader_id = reader_id.trim();
    if book_id.is_empty() {
        return Err(BorrowError::EmptyIdentifier("book id"));
    }
    if reader_id.is_empty() {
        return Err(BorrowError::EmptyIdentifier("reader id"));
    }

    let tx = begin(conn).map_err(|err| {
        log::error!("failed to begin borrow transaction: {}", err);
        BorrowError::TransactionFailure(err)
    })?;

    match borrow_in(&tx, book_id, reader_id) {
        Ok(record) => {
            tx.commit().map_err(|err| {
                log::error!("failed to commit borrow of {} by {}: {}", book_id, reader_id, err);
                BorrowError::TransactionFailure(err)
            })?;
            log::info!(
                "borrowed {} by {} (record {})",
                book_id,
                reader_id,
                record.id
            );
            Ok(record)
        }
        Err(err) => {
            rollback(tx);
            if err.is_business_rule() {
                log::warn!("borrow of {} by {} rejected: {}", book_id, reader_id, err);
            } else {
                log::error!("borrow of {} by {} failed: {}", book_id, reader_id, err);
            }
            Err(err)
        }
    }
}

fn borrow_in(
    tx: &Transaction,
    book_id: &str,
    reader_id: &str,
) -> Result<BorrowRecord, BorrowError> {
    let stock: Option<i64> = tx
        .query_row(
            "SELECT stock FROM book WHERE book_id = ?1",
            params![book_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(stock) = stock else {
        return Err(BorrowError::BookNotFound(book_id.to_string()));
    };
    if stock <= 0 {
        return Err(BorrowError::InsufficientStock(book_id.to_string()));
    }

    let reader_exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM reader WHERE reader_id = ?1",
            params![reader_id],
            |row| row.get(0),
        )
        .optional()?;
    if reader_exists.is_none() {
        return Err(BorrowError::ReaderNotFound(reader_id.to_string()));
    }

    let now = Utc::now();
    tx.execute(
        "INSERT INTO borrow (book_id, reader_id, borrow_time, return_time) VALUES (?1, ?2, ?3, NULL)",
        params![book_id, reader_id, now.timestamp_millis()],
    )?;
    let id = tx.last_insert_rowid();

    let updated = tx.execute(
        "UPDATE book SET stock = stock - 1 WHERE book_id = ?1 AND stock > 0",
        params![book_id],
    )?;
    if updated != 1 {
        return Err(BorrowError::InsufficientStock(book_id.to_string()));
    }

    Ok(BorrowRecord {
        id,
        book_id: book_id.to_string(),
        reader_id: reader_id.to_string(),
        // Round-trip through the stored precision so the record equals a re-read.
        borrow_time: millis_to_utc(now.timestamp_millis()).unwrap_or(now),
        return_time: None,
    })
}

/// Close the outstanding record `borrow_id` and put its copy back in stock.
pub fn return_book(conn: &mut Connection, borrow_id: i64) -> Result<(), ReturnError> {
    let tx = begin(conn).map_err(|err| {
        log::error!("failed to begin return transaction: {}", err);
        ReturnError::TransactionFailure(err)
    })?;

    match return_in(&tx, borrow_id) {
        Ok(book_id) => {
            tx.commit().map_err(|err| {
                log::error!("failed to commit return of record {}: {}", borrow_id, err);
                ReturnError::TransactionFailure(err)
            })?;
            log::info!("returned record {} (book {})", borrow_id, book_id);
            Ok(())
        }
        Err(err) => {
            rollback(tx);
            if err.is_business_rule() {
                log::warn!("return of record {} rejected: {}", borrow_id, err);
            } else {
                log::error!("return of record {} failed: {}", borrow_id, err);
            }
            Err(err)
        }
    }
}

fn return_in(tx: &Transaction, borrow_id: i64) -> Result<String, ReturnError> {
    // The book id comes from the same read that proves the record is open.
    let book_id: Option<String> = tx
        .query_row(
            "SELECT book_id FROM borrow WHERE id = ?1 AND return_time IS NULL",
            params![borrow_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(book_id) = book_id else {
        return Err(ReturnError::RecordNotFoundOrAlreadyReturned(borrow_id));
    };

    let now = Utc::now().timestamp_millis();
    let closed = tx.execute(
        "UPDATE borrow SET return_time = ?1 WHERE id = ?2 AND return_time IS NULL",
        params![now, borrow_id],
    )?;
    if closed != 1 {
        return Err(ReturnError::RecordNotFoundOrAlreadyReturned(borrow_id));
    }

    tx.execute(
        "UPDATE book SET stock = stock + 1 WHERE book_id = ?1",
        params![book_id],
    )?;

    Ok(book_id)
}

fn begin(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn rollback(tx: Transaction) {
    if let Err(err) = tx.rollback() {
        log::error!("rollback failed: {}", err);
    }
}
