use anyhow::{bail, Context};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_tracing::TracingMiddleware;
use serde::de::DeserializeOwned;

use crate::api::{
    AdminResponse, AuthorQuery, Book, BookDetails, BookId, BookStatistics, BookStatus, BooksPage,
    ErrorResponse, KeywordQuery, PageQuery, StatusQuery, TitleAndAuthorQuery, TitleQuery,
    YearRangeQuery,
};

pub struct BookServiceCatalogClient {
    url: String,
    client: ClientWithMiddleware,
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|error| error.message)
        .unwrap_or_default();
    format!("({}) {}", status, message)
}

impl BookServiceCatalogClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::Client::builder()
            .build()
            .context("Failed to build reqwest client")?;
        let client = ClientBuilder::new(reqwest_client)
            // Insert the tracing middleware
            .with(TracingMiddleware::default())
            .build();

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    /// Sends the request and decodes a successful JSON body
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> anyhow::Result<T> {
        let response = request.send().await?;
        if !response.status().is_success() {
            bail!("Failed to {} {}", what, error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// GET request that maps 404 to None
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Option<T>> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to get {} {}", path, error_message(response).await)
        }
    }

    /// Calls POST /api/books endpoint
    /// Returns the stored book, fails on validation errors and ISBN conflicts
    pub async fn add_book(&self, book_details: BookDetails) -> anyhow::Result<Book> {
        let response = self
            .client
            .post(format!("{}/api/books", self.url))
            .json(&book_details)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to add book {}", error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls GET /api/books/{book_id} endpoint
    /// Returns None if book was not in the catalog
    pub async fn get_book(&self, book_id: BookId) -> anyhow::Result<Option<Book>> {
        self.get_optional(&format!("/api/books/{}", book_id)).await
    }

    /// Calls PUT /api/books/{book_id} endpoint
    pub async fn update_book(
        &self,
        book_id: BookId,
        book_details: BookDetails,
    ) -> anyhow::Result<Book> {
        let response = self
            .client
            .put(format!("{}/api/books/{}", self.url, book_id))
            .json(&book_details)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Failed to update book {}", error_message(response).await)
        }
        Ok(response.json().await?)
    }

    /// Calls DELETE /api/books/{book_id} endpoint
    /// Returns true if the book was deleted and false if it did not exist
    pub async fn delete_book(&self, book_id: BookId) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/api/books/{}", self.url, book_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            Ok(false)
        } else if response.status().is_success() {
            Ok(true)
        } else {
            bail!("Failed to delete book {}", error_message(response).await)
        }
    }

    /// Calls PATCH /api/books/{book_id}/status endpoint
    /// Returns None if book was not in the catalog
    pub async fn change_status(
        &self,
        book_id: BookId,
        status: BookStatus,
    ) -> anyhow::Result<Option<Book>> {
        let response = self
            .client
            .patch(format!("{}/api/books/{}/status", self.url, book_id))
            .query(&StatusQuery {
                status: status.to_string(),
            })
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            Ok(None)
        } else if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            bail!("Failed to change status {}", error_message(response).await)
        }
    }

    /// Calls GET /api/books endpoint
    pub async fn list_books(&self) -> anyhow::Result<Vec<Book>> {
        self.fetch(self.client.get(self.endpoint("/api/books")), "list books")
            .await
    }

    /// Calls GET /api/books/paginated endpoint
    pub async fn list_books_page(&self, page: u32, size: u32) -> anyhow::Result<BooksPage> {
        let query = PageQuery {
            page: Some(page),
            size: Some(size),
        };
        self.fetch(
            self.client
                .get(self.endpoint("/api/books/paginated"))
                .query(&query),
            "list books page",
        )
        .await
    }

    /// Calls GET /api/books/search/title endpoint
    pub async fn search_by_title(&self, title: &str) -> anyhow::Result<Vec<Book>> {
        let query = TitleQuery {
            title: title.to_string(),
        };
        self.fetch(
            self.client
                .get(self.endpoint("/api/books/search/title"))
                .query(&query),
            "search by title",
        )
        .await
    }

    /// Calls GET /api/books/search/author endpoint
    pub async fn search_by_author(&self, author: &str) -> anyhow::Result<Vec<Book>> {
        let query = AuthorQuery {
            author: author.to_string(),
        };
        self.fetch(
            self.client
                .get(self.endpoint("/api/books/search/author"))
                .query(&query),
            "search by author",
        )
        .await
    }

    /// Calls GET /api/books/search endpoint
    pub async fn search_by_keyword(&self, keyword: &str) -> anyhow::Result<Vec<Book>> {
        let query = KeywordQuery {
            keyword: keyword.to_string(),
        };
        self.fetch(
            self.client
                .get(self.endpoint("/api/books/search"))
                .query(&query),
            "search by keyword",
        )
        .await
    }

    /// Calls GET /api/books/search/title-author endpoint
    pub async fn search_by_title_and_author(
        &self,
        title: &str,
        author: &str,
    ) -> anyhow::Result<Vec<Book>> {
        let query = TitleAndAuthorQuery {
            title: title.to_string(),
            author: author.to_string(),
        };
        self.fetch(
            self.client
                .get(self.endpoint("/api/books/search/title-author"))
                .query(&query),
            "search by title and author",
        )
        .await
    }

    /// Calls GET /api/books/status/{status} endpoint
    pub async fn books_by_status(&self, status: BookStatus) -> anyhow::Result<Vec<Book>> {
        let path = format!("/api/books/status/{}", status);
        self.fetch(self.client.get(self.endpoint(&path)), "list books by status")
            .await
    }

    /// Calls GET /api/books/available endpoint
    pub async fn available_books(&self) -> anyhow::Result<Vec<Book>> {
        self.fetch(
            self.client.get(self.endpoint("/api/books/available")),
            "list available books",
        )
        .await
    }

    /// Calls GET /api/books/year/{year} endpoint
    pub async fn books_by_publication_year(&self, year: i32) -> anyhow::Result<Vec<Book>> {
        let path = format!("/api/books/year/{}", year);
        self.fetch(self.client.get(self.endpoint(&path)), "list books by year")
            .await
    }

    /// Calls GET /api/books/year endpoint, both ends are inclusive
    pub async fn books_by_publication_year_range(
        &self,
        from: i32,
        to: i32,
    ) -> anyhow::Result<Vec<Book>> {
        self.fetch(
            self.client
                .get(self.endpoint("/api/books/year"))
                .query(&YearRangeQuery { from, to }),
            "list books by year range",
        )
        .await
    }

    /// Calls GET /api/books/pages/min/{pages} endpoint
    pub async fn books_with_min_pages(&self, pages: i32) -> anyhow::Result<Vec<Book>> {
        let path = format!("/api/books/pages/min/{}", pages);
        self.fetch(self.client.get(self.endpoint(&path)), "list long books")
            .await
    }

    /// Calls GET /api/books/pages/max/{pages} endpoint
    pub async fn books_with_max_pages(&self, pages: i32) -> anyhow::Result<Vec<Book>> {
        let path = format!("/api/books/pages/max/{}", pages);
        self.fetch(self.client.get(self.endpoint(&path)), "list short books")
            .await
    }

    /// Calls GET /api/books/isbn/{isbn} endpoint
    /// Returns None if no book holds the ISBN
    pub async fn book_by_isbn(&self, isbn: &str) -> anyhow::Result<Option<Book>> {
        self.get_optional(&format!("/api/books/isbn/{}", isbn))
            .await
    }

    /// Calls GET /api/books/statistics endpoint
    pub async fn statistics(&self) -> anyhow::Result<BookStatistics> {
        self.fetch(
            self.client.get(self.endpoint("/api/books/statistics")),
            "get statistics",
        )
        .await
    }

    /// Calls GET /api/books/statuses endpoint
    pub async fn statuses(&self) -> anyhow::Result<Vec<BookStatus>> {
        self.fetch(
            self.client.get(self.endpoint("/api/books/statuses")),
            "list statuses",
        )
        .await
    }

    /// Calls POST /api/data/init endpoint
    pub async fn seed_demo_data(&self) -> anyhow::Result<AdminResponse> {
        self.fetch(
            self.client.post(self.endpoint("/api/data/init")),
            "seed demo data",
        )
        .await
    }

    /// Calls DELETE /api/data/clear endpoint
    pub async fn clear_all_data(&self) -> anyhow::Result<AdminResponse> {
        self.fetch(
            self.client.delete(self.endpoint("/api/data/clear")),
            "clear data",
        )
        .await
    }
}
