use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;

use crate::api::{Book, BookId, BookStatus};
use crate::books_repository::{
    BookQuery, BookRepository, BookRepositoryError, InMemoryBookRepository,
};
use crate::validation::NewBook;

/// In-memory repository that can be told to fail listings, counts or single deletions
#[derive(Default)]
pub struct FailingBookRepository {
    books: InMemoryBookRepository,
    reads_failing: AtomicBool,
    undeletable: parking_lot::Mutex<HashSet<BookId>>,
}

impl FailingBookRepository {
    /// Every listing and count fails from now on
    pub fn fail_reads(&self) {
        self.reads_failing.store(true, Ordering::SeqCst);
    }

    /// Deleting this book fails from now on
    pub fn refuse_delete(&self, book_id: BookId) {
        self.undeletable.lock().insert(book_id);
    }

    fn check_reads(&self) -> Result<(), BookRepositoryError> {
        if self.reads_failing.load(Ordering::SeqCst) {
            Err(BookRepositoryError::Other("storage unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl BookRepository for FailingBookRepository {
    async fn add_book(&self, book: NewBook, today: NaiveDate) -> Result<Book, BookRepositoryError> {
        self.books.add_book(book, today).await
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        self.books.get_book(book_id).await
    }

    async fn find_books(&self, query: BookQuery) -> Result<Vec<Book>, BookRepositoryError> {
        self.check_reads()?;
        self.books.find_books(query).await
    }

    async fn list_books_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        self.check_reads()?;
        self.books.list_books_page(offset, limit).await
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>, BookRepositoryError> {
        self.books.find_book_by_isbn(isbn).await
    }

    async fn exists_by_isbn(&self, isbn: &str) -> Result<bool, BookRepositoryError> {
        self.books.exists_by_isbn(isbn).await
    }

    async fn count_books(&self) -> Result<u64, BookRepositoryError> {
        self.check_reads()?;
        self.books.count_books().await
    }

    async fn count_books_by_status(&self, status: BookStatus) -> Result<u64, BookRepositoryError> {
        self.check_reads()?;
        self.books.count_books_by_status(status).await
    }

    async fn replace_book(
        &self,
        book_id: BookId,
        book: NewBook,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError> {
        self.books.replace_book(book_id, book, updated_at).await
    }

    async fn set_status(
        &self,
        book_id: BookId,
        status: BookStatus,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError> {
        self.books.set_status(book_id, status, updated_at).await
    }

    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        let refused = self.undeletable.lock().contains(&book_id);
        if refused {
            return Err(BookRepositoryError::Other(format!(
                "book {} is locked",
                book_id
            )));
        }
        self.books.delete_book(book_id).await
    }
}
