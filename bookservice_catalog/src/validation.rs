//! Field rules for incoming book details and the conversion into the stored form.
//!
//! [`BookDetails::validate`] is the only way to obtain a [`NewBook`], so anything that reaches the
//! storage layer has already passed every field check.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::{Book, BookDetails, BookId, BookStatus};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_AUTHOR_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MIN_PUBLICATION_YEAR: i32 = 1000;
pub const MAX_PUBLICATION_YEAR: i32 = 2024;
pub const MIN_PAGES: i32 = 1;

static ISBN_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ISBN(?:-1[03])?:? ").expect("isbn prefix regex should compile"));
static ISBN_SHAPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:97[89][- ]?)?[0-9]{1,5}[- ]?[0-9]+[- ]?[0-9]+[- ]?[0-9X]$")
        .expect("isbn shape regex should compile")
});
static ISBN10_PLAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9X]{10}$").expect("isbn10 regex should compile"));
static ISBN10_SEPARATED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[- 0-9X]{13}$").expect("isbn10 regex should compile"));
static ISBN13_PLAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^97[89][0-9]{10}$").expect("isbn13 regex should compile"));
static ISBN13_SEPARATED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[- 0-9]{17}$").expect("isbn13 regex should compile"));
static THREE_GROUPS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]+[- ]){3}").expect("groups regex should compile"));
static FOUR_GROUPS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]+[- ]){4}").expect("groups regex should compile"));

/// Checks ISBN-10 or ISBN-13 syntax, optionally prefixed with `ISBN`, `ISBN-10:` or `ISBN-13:`.
/// Check digits are not verified.
pub fn is_valid_isbn(candidate: &str) -> bool {
    let body = ISBN_PREFIX_REGEX
        .find(candidate)
        .map(|prefix| &candidate[prefix.end()..])
        .unwrap_or(candidate);

    let has_known_length = ISBN10_PLAIN_REGEX.is_match(body)
        || (THREE_GROUPS_REGEX.is_match(body) && ISBN10_SEPARATED_REGEX.is_match(body))
        || ISBN13_PLAIN_REGEX.is_match(body)
        || (FOUR_GROUPS_REGEX.is_match(body) && ISBN13_SEPARATED_REGEX.is_match(body));

    has_known_length && ISBN_SHAPE_REGEX.is_match(body)
}

/// Per field validation messages, keyed by the camelCase field name used in JSON
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// Records a message for the field, the first message reported for a field wins
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validation failed: ")?;
        for (index, (field, message)) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Book that passed validation, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub publication_year: i32,
    pub pages: i32,
    pub isbn: Option<String>,
    pub status: BookStatus,
}

impl NewBook {
    pub fn into_book(self, id: BookId, today: NaiveDate) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            description: self.description,
            publication_year: self.publication_year,
            pages: self.pages,
            isbn: self.isbn,
            status: self.status,
            created_at: today,
            updated_at: today,
        }
    }
}

impl Book {
    /// Overwrites every mutable field at once. `id` and `created_at` are kept.
    pub fn apply_update(&mut self, update: NewBook, updated_at: NaiveDate) {
        self.title = update.title;
        self.author = update.author;
        self.description = update.description;
        self.publication_year = update.publication_year;
        self.pages = update.pages;
        self.isbn = update.isbn;
        self.status = update.status;
        self.updated_at = updated_at;
    }

    pub fn apply_status(&mut self, status: BookStatus, updated_at: NaiveDate) {
        self.status = status;
        self.updated_at = updated_at;
    }
}

fn check_text(errors: &mut ValidationErrors, field: &str, value: &str, max_length: usize) {
    if value.trim().is_empty() {
        errors.add(field, format!("{} must not be blank", field));
    } else if value.chars().count() > max_length {
        errors.add(
            field,
            format!("{} must not exceed {} characters", field, max_length),
        );
    }
}

impl BookDetails {
    /// Checks every field and converts the details into a [`NewBook`].
    /// A blank ISBN is treated as missing and a missing status becomes AVAILABLE.
    pub fn validate(self) -> Result<NewBook, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        check_text(&mut errors, "title", &self.title, MAX_TITLE_LENGTH);
        check_text(&mut errors, "author", &self.author, MAX_AUTHOR_LENGTH);

        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                errors.add(
                    "description",
                    format!(
                        "description must not exceed {} characters",
                        MAX_DESCRIPTION_LENGTH
                    ),
                );
            }
        }

        match self.publication_year {
            None => errors.add("publicationYear", "publicationYear is required"),
            Some(year) if year < MIN_PUBLICATION_YEAR => errors.add(
                "publicationYear",
                format!("publicationYear must be at least {}", MIN_PUBLICATION_YEAR),
            ),
            Some(year) if year > MAX_PUBLICATION_YEAR => errors.add(
                "publicationYear",
                format!("publicationYear must not be after {}", MAX_PUBLICATION_YEAR),
            ),
            Some(_) => {}
        }

        match self.pages {
            None => errors.add("pages", "pages is required"),
            Some(pages) if pages < MIN_PAGES => {
                errors.add("pages", format!("pages must be at least {}", MIN_PAGES))
            }
            Some(_) => {}
        }

        let isbn = self.isbn.filter(|isbn| !isbn.trim().is_empty());
        if let Some(isbn) = &isbn {
            if !is_valid_isbn(isbn) {
                errors.add("isbn", "isbn must be a valid ISBN-10 or ISBN-13");
            }
        }

        match (self.publication_year, self.pages) {
            (Some(publication_year), Some(pages)) if errors.is_empty() => Ok(NewBook {
                title: self.title,
                author: self.author,
                description: self.description,
                publication_year,
                pages,
                isbn,
                status: self.status.unwrap_or_default(),
            }),
            _ => Err(errors),
        }
    }
}
