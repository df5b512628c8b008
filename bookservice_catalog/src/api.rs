use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Deserializer, Serialize};

pub type BookId = i64;

/// Lifecycle label of a book. Any status can be changed into any other one.
#[derive(
    Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Apiv2Schema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    #[default]
    Available,
    Borrowed,
    Reserved,
    Maintenance,
}

impl BookStatus {
    pub const ALL: [BookStatus; 4] = [
        BookStatus::Available,
        BookStatus::Borrowed,
        BookStatus::Reserved,
        BookStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "AVAILABLE",
            BookStatus::Borrowed => "BORROWED",
            BookStatus::Reserved => "RESERVED",
            BookStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown book status '{0}', expected one of AVAILABLE, BORROWED, RESERVED, MAINTENANCE")]
pub struct UnknownBookStatus(pub String);

impl FromStr for BookStatus {
    type Err = UnknownBookStatus;

    /// Parses status label ignoring case, e.g. `borrowed` and `BORROWED` are both accepted
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BookStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownBookStatus(value.to_string()))
    }
}

/// Reads an explicit `null` like a missing value so it is reported by field validation
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Book fields supplied by the client when creating or fully updating a book.
/// Required fields are kept loose here so that every missing one can be reported at once.
pub struct BookDetails {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    /// Defaults to AVAILABLE when not provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
/// Book as stored in the catalog
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub publication_year: i32,
    pub pages: i32,
    pub isbn: Option<String>,
    pub status: BookStatus,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

impl Book {
    /// Client side view of the stored book, useful for sending it back in a full update
    pub fn details(&self) -> BookDetails {
        BookDetails {
            title: self.title.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            publication_year: Some(self.publication_year),
            pages: Some(self.pages),
            isbn: self.isbn.clone(),
            status: Some(self.status),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// One page of books ordered by id, `page` is zero based
pub struct BooksPage {
    pub items: Vec<Book>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Number of books in the catalog, in total and per status
pub struct BookStatistics {
    pub total: u64,
    pub available: u64,
    pub borrowed: u64,
    pub reserved: u64,
    pub maintenance: u64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct TitleQuery {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct AuthorQuery {
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct KeywordQuery {
    pub keyword: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct TitleAndAuthorQuery {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
/// Inclusive range of publication years
pub struct YearRangeQuery {
    pub from: i32,
    pub to: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Apiv2Schema)]
pub struct StatusQuery {
    pub status: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
/// Body of every 4xx response
pub struct ErrorResponse {
    pub message: String,
    /// Field name to message, present only for validation failures
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
/// Result of the administrative data endpoints
pub struct AdminResponse {
    pub message: String,
    /// Number of books inserted or removed
    pub affected: u64,
}
