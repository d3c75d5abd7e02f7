use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Book {
    pub book_id: String,
    pub name: String,
    pub author: String,
    pub category: Option<String>,
    pub stock: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Reader {
    pub reader_id: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BorrowRecord {
    pub id: i64,
    pub book_id: String,
    pub reader_id: String,
    pub borrow_time: DateTime<Utc>,
    pub return_time: Option<DateTime<Utc>>, // None while outstanding
}

impl BorrowRecord {
    pub fn is_outstanding(&self) -> bool {
        self.return_time.is_none()
    }

    pub fn status(&self) -> BorrowStatus {
        if self.is_outstanding() {
            BorrowStatus::Outstanding
        } else {
            BorrowStatus::Returned
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Outstanding,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BorrowStatus::Outstanding => "outstanding",
            BorrowStatus::Returned => "returned",
        }
    }
}

/// Input for a new catalog book. Fields are trimmed before validation.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewBook {
    pub book_id: String,
    pub name: String,
    pub author: String,
    pub category: Option<String>,
    pub stock: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewReader {
    pub reader_id: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowFilter {
    All,
    Outstanding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Books,
    Readers,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogEntry {
    Book(Book),
    Reader(Reader),
}

/// Converts a stored epoch-millisecond column back into a UTC timestamp.
pub(crate) fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
