#[cfg(test)]
pub(crate) use failing_books_repository::FailingBookRepository;
pub use in_memory_books_repository::InMemoryBookRepository;
pub use postgres_books_repository::{PostgresBooksRepository, PostgresBooksRepositoryConfig};

use chrono::NaiveDate;

use crate::api::{Book, BookId, BookStatus};
use crate::validation::NewBook;

#[cfg(test)]
mod failing_books_repository;
mod in_memory_books_repository;
mod postgres_books_repository;

#[derive(thiserror::Error, Debug)]
pub enum BookRepositoryError {
    #[error("Book {0} not found")]
    NotFound(BookId),

    #[error("Book with ISBN {0} already exists")]
    IsbnTaken(String),

    #[error("Invalid book record: {0}")]
    InvalidRecord(String),

    #[error("DatabaseFailure failure {0}")]
    DatabaseFailure(#[from] tokio_postgres::Error),

    #[error("Other error {0}")]
    Other(String),
}

/// Filter applied by [`BookRepository::find_books`].
/// Text filters are case insensitive substring matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookQuery {
    All,
    TitleContains(String),
    AuthorContains(String),
    /// Matches when either title or description contains the keyword
    TitleOrDescriptionContains(String),
    TitleAndAuthorContain {
        title: String,
        author: String,
    },
    Status(BookStatus),
    PublicationYear(i32),
    /// Inclusive on both ends
    PublicationYearBetween {
        start: i32,
        end: i32,
    },
    /// Sorted by pages ascending
    MinPages(i32),
    /// Sorted by pages descending
    MaxPages(i32),
}

#[async_trait::async_trait]
pub trait BookRepository: Send + Sync {
    /// Stores a new book with both dates set to `today`, returns the book with assigned id.
    /// Fails with `IsbnTaken` when another book already holds the ISBN.
    async fn add_book(&self, book: NewBook, today: NaiveDate) -> Result<Book, BookRepositoryError>;
    /// Retrieves a book by id
    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError>;
    /// Lists books matching the query, ordered by id unless the query defines its own order
    async fn find_books(&self, query: BookQuery) -> Result<Vec<Book>, BookRepositoryError>;
    /// Lists at most `limit` books ordered by id, skipping the first `offset`
    async fn list_books_page(&self, offset: u64, limit: u64)
        -> Result<Vec<Book>, BookRepositoryError>;
    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>, BookRepositoryError>;
    async fn exists_by_isbn(&self, isbn: &str) -> Result<bool, BookRepositoryError>;
    async fn count_books(&self) -> Result<u64, BookRepositoryError>;
    async fn count_books_by_status(&self, status: BookStatus) -> Result<u64, BookRepositoryError>;
    /// Overwrites every mutable field of the book in a single write and sets `updated_at`
    async fn replace_book(
        &self,
        book_id: BookId,
        book: NewBook,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError>;
    /// Changes only the status and `updated_at`
    async fn set_status(
        &self,
        book_id: BookId,
        status: BookStatus,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError>;
    /// Removes the book permanently, fails with `NotFound` if it does not exist
    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError>;
}
