use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDate;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::api::{Book, BookId, BookStatus};
use crate::books_repository::{BookQuery, BookRepository, BookRepositoryError};
use crate::validation::NewBook;

const BOOK_COLUMNS: &str =
    "id, title, author, description, publication_year, pages, isbn, status, created_at, updated_at";

pub struct PostgresBooksRepository {
    client: Client,
}

pub struct PostgresBooksRepositoryConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl PostgresBooksRepository {
    pub async fn init(config: PostgresBooksRepositoryConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}",
            config.username, config.password, config.hostname
        );
        tracing::info!(
            "Connecting to postgres at {} as {}",
            config.hostname,
            config.username
        );
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Postgres connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS books (
            id                  BIGSERIAL PRIMARY KEY,
            title               VARCHAR(255) NOT NULL,
            author              VARCHAR(255) NOT NULL,
            description         VARCHAR(1000),
            publication_year    INTEGER NOT NULL,
            pages               INTEGER NOT NULL,
            isbn                VARCHAR(255) UNIQUE,
            status              VARCHAR(32) NOT NULL DEFAULT 'AVAILABLE'
                CHECK (status IN ('AVAILABLE', 'BORROWED', 'RESERVED', 'MAINTENANCE')),
            created_at          DATE NOT NULL,
            updated_at          DATE NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup books table")?;
        Ok(Self { client })
    }

    async fn query_books(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Book>, BookRepositoryError> {
        let stmt: Statement = self.client.prepare(sql).await?;
        let rows = self.client.query(&stmt, params).await?;
        rows.iter().map(book_from_row).collect()
    }

    async fn count(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, BookRepositoryError> {
        let stmt: Statement = self.client.prepare(sql).await?;
        let rows = self.client.query(&stmt, params).await?;
        let count: i64 = rows
            .first()
            .ok_or_else(|| BookRepositoryError::Other("Count not returned".to_string()))?
            .try_get(0)?;
        Ok(count as u64)
    }
}

fn book_from_row(row: &Row) -> Result<Book, BookRepositoryError> {
    let status: String = row.try_get("status")?;
    let status = BookStatus::from_str(&status)
        .map_err(|err| BookRepositoryError::InvalidRecord(err.to_string()))?;

    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        description: row.try_get("description")?,
        publication_year: row.try_get("publication_year")?,
        pages: row.try_get("pages")?,
        isbn: row.try_get("isbn")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Maps unique constraint violation on isbn to `IsbnTaken`, passes other errors through
fn map_write_error(err: tokio_postgres::Error, isbn: Option<&str>) -> BookRepositoryError {
    let unique_violation = err
        .as_db_error()
        .map(|db_err| db_err.code() == &SqlState::UNIQUE_VIOLATION)
        .unwrap_or_default();
    match isbn {
        Some(isbn) if unique_violation => BookRepositoryError::IsbnTaken(isbn.to_string()),
        _ => err.into(),
    }
}

fn first_book(rows: Vec<Row>, book_id: BookId) -> Result<Book, BookRepositoryError> {
    rows.first()
        .ok_or(BookRepositoryError::NotFound(book_id))
        .and_then(book_from_row)
}

#[async_trait::async_trait]
impl BookRepository for PostgresBooksRepository {
    async fn add_book(&self, book: NewBook, today: NaiveDate) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "INSERT INTO books (title, author, description, publication_year, pages, isbn, status, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8) RETURNING {}",
                BOOK_COLUMNS
            ))
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &book.title,
                    &book.author,
                    &book.description,
                    &book.publication_year,
                    &book.pages,
                    &book.isbn,
                    &book.status.as_str(),
                    &today,
                ],
            )
            .await
            .map_err(|err| map_write_error(err, book.isbn.as_deref()))?;

        rows.first()
            .ok_or_else(|| BookRepositoryError::Other("Book not returned".to_string()))
            .and_then(book_from_row)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;
        first_book(rows, book_id)
    }

    async fn find_books(&self, query: BookQuery) -> Result<Vec<Book>, BookRepositoryError> {
        let select = format!("SELECT {} FROM books", BOOK_COLUMNS);
        match query {
            BookQuery::All => {
                self.query_books(&format!("{} ORDER BY id", select), &[])
                    .await
            }
            BookQuery::TitleContains(title) => {
                self.query_books(
                    &format!(
                        "{} WHERE strpos(lower(title), lower($1)) > 0 ORDER BY id",
                        select
                    ),
                    &[&title],
                )
                .await
            }
            BookQuery::AuthorContains(author) => {
                self.query_books(
                    &format!(
                        "{} WHERE strpos(lower(author), lower($1)) > 0 ORDER BY id",
                        select
                    ),
                    &[&author],
                )
                .await
            }
            BookQuery::TitleOrDescriptionContains(keyword) => {
                self.query_books(
                    &format!(
                        "{} WHERE strpos(lower(title), lower($1)) > 0 \
                         OR strpos(lower(description), lower($1)) > 0 ORDER BY id",
                        select
                    ),
                    &[&keyword],
                )
                .await
            }
            BookQuery::TitleAndAuthorContain { title, author } => {
                self.query_books(
                    &format!(
                        "{} WHERE strpos(lower(title), lower($1)) > 0 \
                         AND strpos(lower(author), lower($2)) > 0 ORDER BY id",
                        select
                    ),
                    &[&title, &author],
                )
                .await
            }
            BookQuery::Status(status) => {
                self.query_books(
                    &format!("{} WHERE status = $1 ORDER BY id", select),
                    &[&status.as_str()],
                )
                .await
            }
            BookQuery::PublicationYear(year) => {
                self.query_books(
                    &format!("{} WHERE publication_year = $1 ORDER BY id", select),
                    &[&year],
                )
                .await
            }
            BookQuery::PublicationYearBetween { start, end } => {
                self.query_books(
                    &format!(
                        "{} WHERE publication_year BETWEEN $1 AND $2 ORDER BY id",
                        select
                    ),
                    &[&start, &end],
                )
                .await
            }
            BookQuery::MinPages(min_pages) => {
                self.query_books(
                    &format!("{} WHERE pages >= $1 ORDER BY pages ASC, id", select),
                    &[&min_pages],
                )
                .await
            }
            BookQuery::MaxPages(max_pages) => {
                self.query_books(
                    &format!("{} WHERE pages <= $1 ORDER BY pages DESC, id", select),
                    &[&max_pages],
                )
                .await
            }
        }
    }

    async fn list_books_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Book>, BookRepositoryError> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_books(
            &format!(
                "SELECT {} FROM books ORDER BY id LIMIT $1 OFFSET $2",
                BOOK_COLUMNS
            ),
            &[&limit, &offset],
        )
        .await
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>, BookRepositoryError> {
        let books = self
            .query_books(
                &format!("SELECT {} FROM books WHERE isbn = $1", BOOK_COLUMNS),
                &[&isbn],
            )
            .await?;
        Ok(books.into_iter().next())
    }

    async fn exists_by_isbn(&self, isbn: &str) -> Result<bool, BookRepositoryError> {
        Ok(self
            .count("SELECT COUNT(*) FROM books WHERE isbn = $1", &[&isbn])
            .await?
            > 0)
    }

    async fn count_books(&self) -> Result<u64, BookRepositoryError> {
        self.count("SELECT COUNT(*) FROM books", &[]).await
    }

    async fn count_books_by_status(&self, status: BookStatus) -> Result<u64, BookRepositoryError> {
        self.count(
            "SELECT COUNT(*) FROM books WHERE status = $1",
            &[&status.as_str()],
        )
        .await
    }

    async fn replace_book(
        &self,
        book_id: BookId,
        book: NewBook,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "UPDATE books SET title = $1, author = $2, description = $3, publication_year = $4, \
                 pages = $5, isbn = $6, status = $7, updated_at = $8 WHERE id = $9 RETURNING {}",
                BOOK_COLUMNS
            ))
            .await?;

        let rows = self
            .client
            .query(
                &stmt,
                &[
                    &book.title,
                    &book.author,
                    &book.description,
                    &book.publication_year,
                    &book.pages,
                    &book.isbn,
                    &book.status.as_str(),
                    &updated_at,
                    &book_id,
                ],
            )
            .await
            .map_err(|err| map_write_error(err, book.isbn.as_deref()))?;

        first_book(rows, book_id)
    }

    async fn set_status(
        &self,
        book_id: BookId,
        status: BookStatus,
        updated_at: NaiveDate,
    ) -> Result<Book, BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare(&format!(
                "UPDATE books SET status = $1, updated_at = $2 WHERE id = $3 RETURNING {}",
                BOOK_COLUMNS
            ))
            .await?;

        let rows = self
            .client
            .query(&stmt, &[&status.as_str(), &updated_at, &book_id])
            .await?;
        first_book(rows, book_id)
    }

    async fn delete_book(&self, book_id: BookId) -> Result<(), BookRepositoryError> {
        let stmt: Statement = self
            .client
            .prepare("DELETE FROM books WHERE id = $1 RETURNING id")
            .await?;

        let rows = self.client.query(&stmt, &[&book_id]).await?;
        if rows.is_empty() {
            Err(BookRepositoryError::NotFound(book_id))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod postgres_book_repository_tests {
    use chrono::NaiveDate;
    use serial_test::file_serial;
    use testcontainers::core::IntoContainerPort;
    use testcontainers::runners::AsyncRunner;
    use testcontainers::{ContainerAsync, GenericImage, ImageExt};

    use crate::api::BookStatus;
    use crate::books_repository::{
        BookQuery, BookRepository, BookRepositoryError, PostgresBooksRepository,
        PostgresBooksRepositoryConfig,
    };
    use crate::validation::NewBook;

    async fn start_postgres_container_and_init_repo(
    ) -> (ContainerAsync<GenericImage>, PostgresBooksRepository) {
        let _pg_container = GenericImage::new("postgres", "latest")
            .with_mapped_port(5432, 5432.tcp())
            .with_env_var("POSTGRES_USER", "postgres")
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .await
            .expect("Failed to start postgres");

        for _ in 0..10 {
            if let Ok(repo) = PostgresBooksRepository::init(PostgresBooksRepositoryConfig {
                hostname: "127.0.0.1".to_string(),
                username: "postgres".to_string(),
                password: "postgres".to_string(),
            })
            .await
            {
                return (_pg_container, repo);
            }
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }
        panic!("Failed to setup postgres container")
    }

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn new_book(title: &str, author: &str, pages: i32) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: author.to_string(),
            description: None,
            publication_year: 1900,
            pages,
            isbn: None,
            status: BookStatus::Available,
        }
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Tests add, get, isbn uniqueness, replace, status change and delete
    /// for the sake of not starting container multiple times it tests everything in one testcase
    async fn test_book_lifecycle() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;

        let not_existing_book_id = 20000;
        assert!(matches!(
            repo.get_book(not_existing_book_id).await,
            Err(BookRepositoryError::NotFound(..))
        ));

        let details = NewBook {
            description: Some("desc".to_string()),
            isbn: Some("978-0-306-40615-7".to_string()),
            ..new_book("xx", "www", 10)
        };
        let added = repo
            .add_book(details.clone(), day(1))
            .await
            .expect("Failed to add book");
        assert_eq!(added.title, "xx");
        assert_eq!(added.description.as_deref(), Some("desc"));
        assert_eq!(added.status, BookStatus::Available);
        assert_eq!(added.created_at, day(1));
        assert_eq!(added.updated_at, day(1));
        assert_eq!(repo.get_book(added.id).await.unwrap(), added);

        let duplicate = repo.add_book(details.clone(), day(1)).await;
        assert!(matches!(duplicate, Err(BookRepositoryError::IsbnTaken(..))));
        assert!(repo.exists_by_isbn("978-0-306-40615-7").await.unwrap());
        assert_eq!(
            repo.find_book_by_isbn("978-0-306-40615-7")
                .await
                .unwrap()
                .map(|b| b.id),
            Some(added.id)
        );

        let replaced = repo
            .replace_book(
                added.id,
                NewBook {
                    status: BookStatus::Borrowed,
                    ..new_book("patchedTitle", "www", 11)
                },
                day(2),
            )
            .await
            .expect("Failed to replace");
        assert_eq!(replaced.title, "patchedTitle");
        assert_eq!(replaced.isbn, None);
        assert_eq!(replaced.status, BookStatus::Borrowed);
        assert_eq!(replaced.created_at, day(1));
        assert_eq!(replaced.updated_at, day(2));
        assert!(!repo.exists_by_isbn("978-0-306-40615-7").await.unwrap());

        assert!(matches!(
            repo.replace_book(not_existing_book_id, new_book("a", "b", 1), day(2))
                .await,
            Err(BookRepositoryError::NotFound(..))
        ));

        let changed = repo
            .set_status(added.id, BookStatus::Maintenance, day(3))
            .await
            .expect("Failed to set status");
        assert_eq!(changed.status, BookStatus::Maintenance);
        assert_eq!(changed.updated_at, day(3));
        assert_eq!(changed.title, "patchedTitle");
        assert!(matches!(
            repo.set_status(not_existing_book_id, BookStatus::Borrowed, day(3))
                .await,
            Err(BookRepositoryError::NotFound(..))
        ));

        repo.delete_book(added.id).await.expect("Failed to delete");
        assert!(matches!(
            repo.get_book(added.id).await,
            Err(BookRepositoryError::NotFound(..))
        ));
        assert!(matches!(
            repo.delete_book(added.id).await,
            Err(BookRepositoryError::NotFound(..))
        ));
    }

    #[tokio::test]
    #[file_serial(key, path => "../.pgtestslock")]
    /// Tests queries, counts and pagination
    /// for the sake of not starting container multiple times it tests everything in one testcase
    async fn test_queries_and_counts() {
        let (_container, repo) = start_postgres_container_and_init_repo().await;

        assert_eq!(repo.find_books(BookQuery::All).await.unwrap(), vec![]);
        assert_eq!(repo.count_books().await.unwrap(), 0);

        let war = repo
            .add_book(
                NewBook {
                    description: Some("Napoleon invades Russia".to_string()),
                    publication_year: 1869,
                    ..new_book("War and Peace", "Leo Tolstoy", 1274)
                },
                day(1),
            )
            .await
            .unwrap();
        let anna = repo
            .add_book(
                NewBook {
                    publication_year: 1877,
                    status: BookStatus::Borrowed,
                    ..new_book("Anna Karenina", "Leo Tolstoy", 864)
                },
                day(1),
            )
            .await
            .unwrap();
        let crime = repo
            .add_book(
                NewBook {
                    description: Some("A poor student in St Petersburg".to_string()),
                    publication_year: 1866,
                    ..new_book("Crime and Punishment", "Fyodor Dostoevsky", 671)
                },
                day(1),
            )
            .await
            .unwrap();

        let ids = |books: Vec<crate::api::Book>| books.into_iter().map(|b| b.id).collect::<Vec<_>>();

        assert_eq!(
            ids(repo.find_books(BookQuery::All).await.unwrap()),
            vec![war.id, anna.id, crime.id]
        );
        assert_eq!(
            ids(repo
                .find_books(BookQuery::TitleContains("WAR".to_string()))
                .await
                .unwrap()),
            vec![war.id]
        );
        assert_eq!(
            ids(repo
                .find_books(BookQuery::AuthorContains("tolstoy".to_string()))
                .await
                .unwrap()),
            vec![war.id, anna.id]
        );
        assert_eq!(
            ids(repo
                .find_books(BookQuery::TitleOrDescriptionContains("petersburg".to_string()))
                .await
                .unwrap()),
            vec![crime.id]
        );
        assert_eq!(
            ids(repo
                .find_books(BookQuery::TitleAndAuthorContain {
                    title: "anna".to_string(),
                    author: "leo".to_string(),
                })
                .await
                .unwrap()),
            vec![anna.id]
        );
        assert_eq!(
            ids(repo
                .find_books(BookQuery::Status(BookStatus::Borrowed))
                .await
                .unwrap()),
            vec![anna.id]
        );
        assert_eq!(
            ids(repo
                .find_books(BookQuery::PublicationYearBetween {
                    start: 1866,
                    end: 1869
                })
                .await
                .unwrap()),
            vec![war.id, crime.id]
        );
        assert_eq!(
            ids(repo.find_books(BookQuery::MinPages(800)).await.unwrap()),
            vec![anna.id, war.id]
        );
        assert_eq!(
            ids(repo.find_books(BookQuery::MaxPages(900)).await.unwrap()),
            vec![anna.id, crime.id]
        );

        assert_eq!(
            ids(repo.list_books_page(1, 1).await.unwrap()),
            vec![anna.id]
        );
        assert_eq!(repo.count_books().await.unwrap(), 3);
        assert_eq!(
            repo.count_books_by_status(BookStatus::Borrowed)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            repo.count_books_by_status(BookStatus::Maintenance)
                .await
                .unwrap(),
            0
        );
    }
}
