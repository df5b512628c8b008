use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::{Book, BookDetails, BookId, BookStatistics, BookStatus, BooksPage};
use crate::books_repository::{BookQuery, BookRepository, BookRepositoryError};
use crate::demo_data::demo_books;
use crate::validation::ValidationErrors;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Book with id {0} not found")]
    NotFound(BookId),

    #[error("Book with ISBN {0} not found")]
    IsbnNotFound(String),

    #[error("Book with ISBN {0} already exists")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Storage(BookRepositoryError),
}

impl From<BookRepositoryError> for CatalogError {
    fn from(err: BookRepositoryError) -> Self {
        match err {
            BookRepositoryError::NotFound(book_id) => CatalogError::NotFound(book_id),
            BookRepositoryError::IsbnTaken(isbn) => CatalogError::Conflict(isbn),
            other => CatalogError::Storage(other),
        }
    }
}

/// Source of the current date used for `createdAt` and `updatedAt`
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Book catalog operations: validation, ISBN uniqueness and timestamps on top of a [`BookRepository`]
pub struct BookCatalogService {
    repository: Arc<dyn BookRepository>,
    clock: Arc<dyn Clock>,
}

impl BookCatalogService {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<dyn BookRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn get_all_books(&self) -> Result<Vec<Book>, CatalogError> {
        Ok(self.repository.find_books(BookQuery::All).await?)
    }

    /// Returns a zero based page of books ordered by id.
    /// `size` defaults to [`DEFAULT_PAGE_SIZE`] and must be between 1 and [`MAX_PAGE_SIZE`].
    pub async fn get_books_page(
        &self,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<BooksPage, CatalogError> {
        let page = page.unwrap_or_default();
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(ValidationErrors::single(
                "size",
                format!("size must be between 1 and {}", MAX_PAGE_SIZE),
            )
            .into());
        }

        let offset = u64::from(page) * u64::from(size);
        let items = self
            .repository
            .list_books_page(offset, u64::from(size))
            .await?;
        let total = self.repository.count_books().await?;
        Ok(BooksPage {
            items,
            total,
            page,
            size,
        })
    }

    pub async fn get_book_by_id(&self, book_id: BookId) -> Result<Book, CatalogError> {
        Ok(self.repository.get_book(book_id).await?)
    }

    pub async fn get_book_by_isbn(&self, isbn: &str) -> Result<Book, CatalogError> {
        self.repository
            .find_book_by_isbn(isbn)
            .await?
            .ok_or_else(|| CatalogError::IsbnNotFound(isbn.to_string()))
    }

    pub async fn create_book(&self, details: BookDetails) -> Result<Book, CatalogError> {
        let new_book = details.validate()?;

        if let Some(isbn) = &new_book.isbn {
            if self.repository.exists_by_isbn(isbn).await? {
                return Err(CatalogError::Conflict(isbn.clone()));
            }
        }

        let book = self
            .repository
            .add_book(new_book, self.clock.today())
            .await?;
        tracing::info!("Book {} created", book.id);
        Ok(book)
    }

    /// Replaces every mutable field of the book, status included
    pub async fn update_book(
        &self,
        book_id: BookId,
        details: BookDetails,
    ) -> Result<Book, CatalogError> {
        let new_book = details.validate()?;
        let existing = self.repository.get_book(book_id).await?;

        if let Some(isbn) = &new_book.isbn {
            if existing.isbn.as_ref() != Some(isbn) && self.repository.exists_by_isbn(isbn).await?
            {
                return Err(CatalogError::Conflict(isbn.clone()));
            }
        }

        let book = self
            .repository
            .replace_book(book_id, new_book, self.update_date(&existing))
            .await?;
        tracing::info!("Book {} updated", book.id);
        Ok(book)
    }

    pub async fn change_book_status(
        &self,
        book_id: BookId,
        status: BookStatus,
    ) -> Result<Book, CatalogError> {
        let existing = self.repository.get_book(book_id).await?;
        let book = self
            .repository
            .set_status(book_id, status, self.update_date(&existing))
            .await?;
        tracing::info!("Book {} status changed to {}", book.id, status);
        Ok(book)
    }

    pub async fn delete_book(&self, book_id: BookId) -> Result<(), CatalogError> {
        self.repository.delete_book(book_id).await?;
        tracing::info!("Book {} deleted", book_id);
        Ok(())
    }

    pub async fn search_books_by_title(&self, title: &str) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::TitleContains(title.to_string())).await
    }

    pub async fn search_books_by_author(&self, author: &str) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::AuthorContains(author.to_string()))
            .await
    }

    /// Books whose title or description contains the keyword
    pub async fn search_books_by_keyword(
        &self,
        keyword: &str,
    ) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::TitleOrDescriptionContains(keyword.to_string()))
            .await
    }

    pub async fn search_books_by_title_and_author(
        &self,
        title: &str,
        author: &str,
    ) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::TitleAndAuthorContain {
            title: title.to_string(),
            author: author.to_string(),
        })
        .await
    }

    pub async fn get_books_by_status(&self, status: BookStatus) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::Status(status)).await
    }

    pub async fn get_available_books(&self) -> Result<Vec<Book>, CatalogError> {
        self.get_books_by_status(BookStatus::Available).await
    }

    pub async fn get_books_by_publication_year(
        &self,
        year: i32,
    ) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::PublicationYear(year)).await
    }

    /// Both ends of the range are inclusive, an inverted range yields no books
    pub async fn get_books_by_publication_year_range(
        &self,
        start: i32,
        end: i32,
    ) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::PublicationYearBetween { start, end })
            .await
    }

    pub async fn get_books_with_min_pages(&self, pages: i32) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::MinPages(pages)).await
    }

    pub async fn get_books_with_max_pages(&self, pages: i32) -> Result<Vec<Book>, CatalogError> {
        self.find(BookQuery::MaxPages(pages)).await
    }

    pub async fn get_book_statistics(&self) -> Result<BookStatistics, CatalogError> {
        Ok(BookStatistics {
            total: self.repository.count_books().await?,
            available: self.count_with_status(BookStatus::Available).await?,
            borrowed: self.count_with_status(BookStatus::Borrowed).await?,
            reserved: self.count_with_status(BookStatus::Reserved).await?,
            maintenance: self.count_with_status(BookStatus::Maintenance).await?,
        })
    }

    pub fn all_statuses(&self) -> Vec<BookStatus> {
        BookStatus::ALL.to_vec()
    }

    /// Inserts the demonstration dataset through the regular create path.
    /// Stops at the first failure, books inserted before it are kept.
    pub async fn seed_demo_data(&self) -> Result<u64, CatalogError> {
        let mut inserted = 0;
        for details in demo_books() {
            self.create_book(details).await?;
            inserted += 1;
        }
        tracing::info!("Seeded {} demo books", inserted);
        Ok(inserted)
    }

    /// Deletes every book one by one. Failures of single deletions are logged and skipped,
    /// the returned number counts only books actually removed.
    pub async fn clear_all_data(&self) -> Result<u64, CatalogError> {
        let mut removed = 0;
        for book in self.get_all_books().await? {
            match self.repository.delete_book(book.id).await {
                Ok(()) => removed += 1,
                Err(err) => tracing::warn!("Failed to delete book {} while clearing: {}", book.id, err),
            }
        }
        tracing::info!("Cleared {} books", removed);
        Ok(removed)
    }

    async fn find(&self, query: BookQuery) -> Result<Vec<Book>, CatalogError> {
        Ok(self.repository.find_books(query).await?)
    }

    async fn count_with_status(&self, status: BookStatus) -> Result<u64, CatalogError> {
        Ok(self.repository.count_books_by_status(status).await?)
    }

    /// Today, but never earlier than the creation date of the book
    fn update_date(&self, existing: &Book) -> NaiveDate {
        self.clock.today().max(existing.created_at)
    }
}
