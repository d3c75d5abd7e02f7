//! CSV projection of the borrow table.

use std::io::Write;

use rusqlite::Connection;

use crate::error::StoreError;
use crate::models::BorrowRecord;
use crate::query::borrow_from_row;

pub const HEADER: &str = "Borrow ID,Book ID,Reader ID,Reader Name,Borrow Time,Status";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Quote a field when it contains a comma, a quote or a line break.
/// Embedded quotes are doubled.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Stream every borrow record, newest first, joined with reader names.
pub fn write_records<W: Write>(conn: &Connection, out: &mut W) -> Result<(), StoreError> {
    // Columns 0..=4 follow the borrow row layout; the reader name comes last.
    let mut stmt = conn.prepare(
        "SELECT b.id, b.book_id, b.reader_id, b.borrow_time, b.return_time, r.reader_name
         FROM borrow b
         LEFT JOIN reader r ON b.reader_id = r.reader_id
         ORDER BY b.borrow_time DESC, b.id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        let record: BorrowRecord = borrow_from_row(row)?;
        let reader_name: Option<String> = row.get(5)?;
        Ok((record, reader_name))
    })?;

    writeln!(out, "{}", HEADER)?;
    for row in rows {
        let (record, reader_name) = row?;
        writeln!(
            out,
            "{},{},{},{},{},{}",
            record.id,
            escape_field(&record.book_id),
            escape_field(&record.reader_id),
            escape_field(reader_name.as_deref().unwrap_or("")),
            escape_field(&record.borrow_time.format(TIME_FORMAT).to_string()),
            record.status().as_str()
        )?;
    }
    Ok(())
}

/// The full export as a string. Writing it somewhere is up to the caller.
pub fn export_records(conn: &Connection) -> Result<String, StoreError> {
    let mut buf = Vec::new();
    write_records(conn, &mut buf)?;
    // Every piece written above comes from a &str.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::db;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_table_is_header_only() {
        let conn = db::open_with_schema(&StoreConfig::in_memory()).unwrap();
        assert_eq!(export_records(&conn).unwrap(), format!("{}\n", HEADER));
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn rows_newest_first_with_status() {
        let conn = db::open_with_schema(&StoreConfig::in_memory()).unwrap();
        conn.execute_batch(
            "INSERT INTO book (book_id, book_name, author, stock) VALUES ('B1', 'Dune', 'Herbert', 5);
             INSERT INTO reader (reader_id, reader_name) VALUES ('R1', 'Lovelace, Ada'), ('R2', 'Grace');
             INSERT INTO borrow (book_id, reader_id, borrow_time, return_time) VALUES
                ('B1', 'R1', 1700000000000, 1700000100000),
                ('B1', 'R2', 1700003600000, NULL);",
        )
        .unwrap();

        let text = export_records(&conn).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                HEADER,
                "2,B1,R2,Grace,2023-11-14 23:13:20,outstanding",
                "1,B1,R1,\"Lovelace, Ada\",2023-11-14 22:13:20,returned",
            ]
        );
    }
}
