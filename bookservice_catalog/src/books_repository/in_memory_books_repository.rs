use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::NaiveDate;

use crate::api::{Book, BookId, BookStatus};
use crate::books_repository::{BookQuery, BookRepository, BookRepositoryError};
use crate::validation::NewBook;

#[derive(Default)]
pub struct InMemoryBookRepository {
    book_sequence_generator: AtomicI64,
    books: parking_lot::RwLock<BTreeMap<BookId, Book>>,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches(query: &BookQuery, book: &Book) -> bool {
    match query {
        BookQuery::All => true,
        BookQuery::TitleContains(title) => contains_ignore_case(&book.title, title),
        BookQuery::AuthorContains(author) => contains_ignore_case(&book.author, author),
        BookQuery::TitleOrDescriptionContains(keyword) => {
            contains_ignore_case(&book.title, keyword)
                || book
                    .description
                    .as_deref()
                    .is_some_and(|description| contains_ignore_case(description, keyword))
        }
        BookQuery::TitleAndAuthorContain { title, author } => {
            contains_ignore_case(&book.title, title) && contains_ignore_case(&book.author, author)
        }
        BookQuery::Status(status) => book.status == *status,
        BookQuery::PublicationYear(year) => book.publication_year == *year,
        BookQuery::PublicationYearBetween { start, end } => {
            (*start..=*end).contains(&book.publication_year)
        }
        BookQuery::MinPages(min_pages) => book.pages >= *min_pages,
        BookQuery::MaxPages(max_pages) => book.pages <= *max_pages,
    }
}

/// Fails if a book other than `book_id` already holds the ISBN
fn ensure_isbn_free(
    books: &BTreeMap<BookId, Book>,
    isbn: Option<&str>,
    book_id: Option<BookId>,
) -> Result<(), BookRepositoryError> {
    let Some(isbn) = isbn else {
        return Ok(());
    };
    let taken = books
        .values()
        .any(|book| Some(book.id) != book_id && book.isbn.as_deref() == Some(isbn));
    if taken {
        Err(BookRepositoryError::IsbnTaken(isbn.to_string()))
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn add_book(&self, book: NewBook, today: NaiveDate) -> Result<Book, BookRepositoryError> {
        let mut locked_books = self.books.write();
        ensure_isbn_free(&locked_books, book.isbn.as_deref(), None)?;

        let id = self.book_sequence_generator.fetch_add(1, Ordering::Relaxed) + 1;
        let book = book.into_book(id, today);
        locked_books.insert(id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        self.books
            .read()
            .get(&book_id)
            .cloned()
            .ok_or(BookRepositoryError::NotFound(book_id))
    }

    async fn find_books(&self, query: BookQuery) -> Result<Vec<Book>, BookRepositoryError> {
        let mut books: Vec<Book> = self
            .books
            .read()
            .values()
            .filter(|book| matches(&query, book))
            .cloned()
            .collect();

        // sort_by_key is stable so books with equal page count stay ordered by id
        match query {
            BookQuery::MinPages(_) => books.sort_by_key(|book| book.pages),
            BookQuery::MaxPages(_) => books.sort_by_key(|book| std::cmp::Reverse(book.pages)),
            _ => {}
        }
        Ok(books)
    }

    async fn list_books_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self
            .books
            .read()
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>, BookRepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .find(|book| book.isbn.as_deref() == Some(isbn))
            .cloned())
    }

    async fn exists_by_isbn(&self, isbn: &str) -> Result<bool, BookRepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .any(|book| book.isbn.as_deref() == Some(isbn)))
    }

    async fn count_books(&self) -> Result<u64, BookRepositoryError> {
        Ok(self.books.read().len() as u64)
    }

    async fn count_books_by_status(&self, status: BookStatus) -> Result<u64, BookRepositoryError> {
        Ok(self
            .books
            .read()
            .values()
            .filter(|book| book.status == status)
            .count() as u64)
    }

    async fn replace_book(
        &self,
        book_id: BookId,
        book: NewBook,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError> {
        let mut locked_books = self.books.write();
        if !locked_books.contains_key(&book_id) {
            return Err(BookRepositoryError::NotFound(book_id));
        }
        ensure_isbn_free(&locked_books, book.isbn.as_deref(), Some(book_id))?;

        let stored = locked_books
            .get_mut(&book_id)
            .ok_or(BookRepositoryError::NotFound(book_id))?;
        stored.apply_update(book, updated_at);
        Ok(stored.clone())
    }

    async fn set_status(
        &self,
        book_id: BookId,
        status: BookStatus,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError> {
        let mut locked_books = self.books.write();
        let stored = locked_books
            .get_mut(&book_id)
            .ok_or(BookRepositoryError::NotFound(book_id))?;
        stored.apply_status(status, updated_at);
        Ok(stored.clone())
    }

    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        self.books
            .write()
            .remove(&book_id)
            .map(|_| ())
            .ok_or(BookRepositoryError::NotFound(book_id))
    }
}
