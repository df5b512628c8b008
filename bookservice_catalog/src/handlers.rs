use std::str::FromStr;

use actix_web::http::header::LOCATION;
use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{
    api_v2_operation,
    web::{self},
};

use crate::api::{
    AdminResponse, AuthorQuery, Book, BookDetails, BookId, BookStatus, ErrorResponse,
    KeywordQuery, PageQuery, StatusQuery, TitleAndAuthorQuery, TitleQuery, YearRangeQuery,
};
use crate::catalog_service::{BookCatalogService, CatalogError};

fn error_response(operation: &str, err: CatalogError) -> HttpResponse {
    let message = err.to_string();
    match err {
        CatalogError::Validation(errors) => HttpResponse::BadRequest().json(ErrorResponse {
            message: "Validation failed".to_string(),
            field_errors: errors.into_map(),
        }),
        CatalogError::NotFound(_) | CatalogError::IsbnNotFound(_) => {
            HttpResponse::NotFound().json(ErrorResponse::new(message))
        }
        CatalogError::Conflict(_) => HttpResponse::Conflict().json(ErrorResponse::new(message)),
        CatalogError::Storage(_) => {
            tracing::error!("{} failed {}", operation, message);
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn book_response(operation: &str, result: Result<Book, CatalogError>) -> HttpResponse {
    match result {
        Ok(book) => HttpResponse::Ok().json(book),
        Err(err) => error_response(operation, err),
    }
}

fn books_response(operation: &str, result: Result<Vec<Book>, CatalogError>) -> HttpResponse {
    match result {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(err) => error_response(operation, err),
    }
}

fn parse_status(value: &str) -> Result<BookStatus, HttpResponse> {
    BookStatus::from_str(value)
        .map_err(|err| HttpResponse::BadRequest().json(ErrorResponse::new(err.to_string())))
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn get_all_books(
    catalog: Data<BookCatalogService>,
) -> Result<HttpResponse, Error> {
    Ok(books_response("Get all books", catalog.get_all_books().await))
}

#[api_v2_operation]
pub async fn get_books_paginated(
    catalog: Data<BookCatalogService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, Error> {
    Ok(
        match catalog.get_books_page(query.page, query.size).await {
            Ok(page) => HttpResponse::Ok().json(page),
            Err(err) => error_response("Get books page", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_book(
    catalog: Data<BookCatalogService>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(book_response(
        "Get book",
        catalog.get_book_by_id(book_id.into_inner()).await,
    ))
}

#[api_v2_operation]
pub async fn create_book(
    catalog: Data<BookCatalogService>,
    details: web::Json<BookDetails>,
) -> Result<HttpResponse, Error> {
    Ok(match catalog.create_book(details.into_inner()).await {
        Ok(book) => HttpResponse::Created()
            .append_header((LOCATION, format!("/api/books/{}", book.id)))
            .json(book),
        Err(err) => error_response("Create book", err),
    })
}

#[api_v2_operation]
pub async fn update_book(
    catalog: Data<BookCatalogService>,
    book_id: web::Path<BookId>,
    details: web::Json<BookDetails>,
) -> Result<HttpResponse, Error> {
    Ok(book_response(
        "Update book",
        catalog
            .update_book(book_id.into_inner(), details.into_inner())
            .await,
    ))
}

#[api_v2_operation]
pub async fn delete_book(
    catalog: Data<BookCatalogService>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(match catalog.delete_book(book_id.into_inner()).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => error_response("Delete book", err),
    })
}

#[api_v2_operation]
pub async fn search_books_by_title(
    catalog: Data<BookCatalogService>,
    query: web::Query<TitleQuery>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Search books by title",
        catalog.search_books_by_title(&query.title).await,
    ))
}

#[api_v2_operation]
pub async fn search_books_by_author(
    catalog: Data<BookCatalogService>,
    query: web::Query<AuthorQuery>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Search books by author",
        catalog.search_books_by_author(&query.author).await,
    ))
}

#[api_v2_operation]
pub async fn search_books_by_keyword(
    catalog: Data<BookCatalogService>,
    query: web::Query<KeywordQuery>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Search books by keyword",
        catalog.search_books_by_keyword(&query.keyword).await,
    ))
}

#[api_v2_operation]
pub async fn search_books_by_title_and_author(
    catalog: Data<BookCatalogService>,
    query: web::Query<TitleAndAuthorQuery>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Search books by title and author",
        catalog
            .search_books_by_title_and_author(&query.title, &query.author)
            .await,
    ))
}

#[api_v2_operation]
pub async fn get_books_by_status(
    catalog: Data<BookCatalogService>,
    status: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let status = match parse_status(&status) {
        Ok(status) => status,
        Err(response) => return Ok(response),
    };
    Ok(books_response(
        "Get books by status",
        catalog.get_books_by_status(status).await,
    ))
}

#[api_v2_operation]
pub async fn get_available_books(
    catalog: Data<BookCatalogService>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Get available books",
        catalog.get_available_books().await,
    ))
}

#[api_v2_operation]
pub async fn get_books_by_publication_year(
    catalog: Data<BookCatalogService>,
    year: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Get books by publication year",
        catalog
            .get_books_by_publication_year(year.into_inner())
            .await,
    ))
}

#[api_v2_operation]
pub async fn get_books_by_publication_year_range(
    catalog: Data<BookCatalogService>,
    range: web::Query<YearRangeQuery>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Get books by publication year range",
        catalog
            .get_books_by_publication_year_range(range.from, range.to)
            .await,
    ))
}

#[api_v2_operation]
pub async fn get_books_with_min_pages(
    catalog: Data<BookCatalogService>,
    pages: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Get books with min pages",
        catalog.get_books_with_min_pages(pages.into_inner()).await,
    ))
}

#[api_v2_operation]
pub async fn get_books_with_max_pages(
    catalog: Data<BookCatalogService>,
    pages: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    Ok(books_response(
        "Get books with max pages",
        catalog.get_books_with_max_pages(pages.into_inner()).await,
    ))
}

#[api_v2_operation]
pub async fn get_book_by_isbn(
    catalog: Data<BookCatalogService>,
    isbn: web::Path<String>,
) -> Result<HttpResponse, Error> {
    Ok(book_response(
        "Get book by isbn",
        catalog.get_book_by_isbn(&isbn).await,
    ))
}

#[api_v2_operation]
pub async fn change_book_status(
    catalog: Data<BookCatalogService>,
    book_id: web::Path<BookId>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, Error> {
    let status = match parse_status(&query.status) {
        Ok(status) => status,
        Err(response) => return Ok(response),
    };
    Ok(book_response(
        "Change book status",
        catalog
            .change_book_status(book_id.into_inner(), status)
            .await,
    ))
}

#[api_v2_operation]
pub async fn get_book_statistics(
    catalog: Data<BookCatalogService>,
) -> Result<HttpResponse, Error> {
    Ok(match catalog.get_book_statistics().await {
        Ok(statistics) => HttpResponse::Ok().json(statistics),
        Err(err) => error_response("Get book statistics", err),
    })
}

#[api_v2_operation]
pub async fn get_all_statuses(
    catalog: Data<BookCatalogService>,
) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(catalog.all_statuses()))
}

#[api_v2_operation]
pub async fn init_demo_data(
    catalog: Data<BookCatalogService>,
) -> Result<HttpResponse, Error> {
    Ok(match catalog.seed_demo_data().await {
        Ok(inserted) => HttpResponse::Ok().json(AdminResponse {
            message: format!("Demo data initialized, {} books added", inserted),
            affected: inserted,
        }),
        Err(err @ CatalogError::Storage(_)) => error_response("Init demo data", err),
        Err(err) => HttpResponse::BadRequest().json(ErrorResponse::new(format!(
            "Failed to initialize demo data: {}",
            err
        ))),
    })
}

#[api_v2_operation]
pub async fn clear_all_data(
    catalog: Data<BookCatalogService>,
) -> Result<HttpResponse, Error> {
    Ok(match catalog.clear_all_data().await {
        Ok(removed) => HttpResponse::Ok().json(AdminResponse {
            message: format!("All data cleared, {} books removed", removed),
            affected: removed,
        }),
        Err(err) => error_response("Clear all data", err),
    })
}

#[cfg(test)]
mod handler_tests {
    use std::sync::Arc;

    use actix_web::http::header::LOCATION;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use actix_web::web::Data;
    use paperclip::actix::OpenApiExt;
    use serde_json::json;

    use crate::api::{
        AdminResponse, Book, BookStatistics, BookStatus, BooksPage, ErrorResponse,
    };
    use crate::app_config::{config_app, json_config, query_config};
    use crate::books_repository::{FailingBookRepository, InMemoryBookRepository};
    use crate::catalog_service::BookCatalogService;

    macro_rules! init_test_app {
        () => {{
            let catalog = Data::new(BookCatalogService::new(Arc::new(
                InMemoryBookRepository::default(),
            )));
            test::init_service(
                actix_web::App::new()
                    .wrap_api()
                    .app_data(catalog)
                    .app_data(json_config())
                    .app_data(query_config())
                    .configure(config_app)
                    .build(),
            )
            .await
        }};
    }

    fn war_and_peace() -> serde_json::Value {
        json!({
            "title": "War and Peace",
            "author": "Leo Tolstoy",
            "description": "Epic novel",
            "publicationYear": 1869,
            "pages": 1274,
            "isbn": "978-5-17-102143-9"
        })
    }

    #[actix_web::test]
    async fn health_is_ok() {
        let app = init_test_app!();
        let response =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn create_get_update_delete() {
        let app = init_test_app!();

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/books")
                .set_json(war_and_peace())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get(LOCATION)
            .expect("No location header")
            .to_str()
            .unwrap()
            .to_string();
        let created: Book = test::read_body_json(response).await;
        assert_eq!(location, format!("/api/books/{}", created.id));
        assert_eq!(created.status, BookStatus::Available);
        assert_eq!(created.created_at, created.updated_at);

        let fetched: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri(&location).to_request(),
        )
        .await;
        assert_eq!(fetched, created);

        let mut update = war_and_peace();
        update["title"] = json!("War & Peace");
        update["status"] = json!("BORROWED");
        let updated: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri(&location)
                .set_json(update)
                .to_request(),
        )
        .await;
        assert_eq!(updated.title, "War & Peace");
        assert_eq!(updated.status, BookStatus::Borrowed);

        let response =
            test::call_service(&app, test::TestRequest::delete().uri(&location).to_request())
                .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(test::read_body(response).await.is_empty());

        let response =
            test::call_service(&app, test::TestRequest::get().uri(&location).to_request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response =
            test::call_service(&app, test::TestRequest::delete().uri(&location).to_request())
                .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn invalid_book_is_rejected_with_field_errors() {
        let app = init_test_app!();
        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/books")
                .set_json(json!({"title": " ", "author": "x", "pages": 0, "publicationYear": 3000}))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = test::read_body_json(response).await;
        assert!(error.field_errors.contains_key("title"));
        assert!(error.field_errors.contains_key("pages"));
        assert!(error.field_errors.contains_key("publicationYear"));
        assert!(!error.field_errors.contains_key("author"));
    }

    #[actix_web::test]
    async fn null_title_is_reported_per_field() {
        let app = init_test_app!();
        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/books")
                .set_json(json!({"title": null, "author": "A", "publicationYear": 1900, "pages": 10}))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = test::read_body_json(response).await;
        assert_eq!(
            error.field_errors.get("title").map(String::as_str),
            Some("title must not be blank")
        );
        assert_eq!(error.field_errors.len(), 1);
    }

    #[actix_web::test]
    async fn storage_failure_is_internal_server_error() {
        let repository = Arc::new(FailingBookRepository::default());
        let catalog = Data::new(BookCatalogService::new(repository.clone()));
        let app = test::init_service(
            actix_web::App::new()
                .wrap_api()
                .app_data(catalog)
                .configure(config_app)
                .build(),
        )
        .await;

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/books")
                .set_json(war_and_peace())
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        repository.fail_reads();
        for uri in ["/api/books", "/api/books/search/title?title=war", "/api/books/statistics"] {
            let response =
                test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn malformed_body_is_bad_request() {
        let app = init_test_app!();
        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/books")
                .insert_header(("content-type", "application/json"))
                .set_payload("{not json")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = test::read_body_json(response).await;
        assert!(error.message.starts_with("Invalid request body"));
    }

    #[actix_web::test]
    async fn duplicate_isbn_is_conflict() {
        let app = init_test_app!();
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let response = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/api/books")
                    .set_json(war_and_peace())
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), expected);
        }
    }

    #[actix_web::test]
    async fn status_change_and_filters() {
        let app = init_test_app!();
        let created: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/books")
                .set_json(war_and_peace())
                .to_request(),
        )
        .await;

        let changed: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::patch()
                .uri(&format!("/api/books/{}/status?status=reserved", created.id))
                .to_request(),
        )
        .await;
        assert_eq!(changed.status, BookStatus::Reserved);

        let response = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri(&format!("/api/books/{}/status?status=LOST", created.id))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/books/12345/status?status=BORROWED")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let reserved: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/status/RESERVED")
                .to_request(),
        )
        .await;
        assert_eq!(reserved, vec![changed.clone()]);

        let available: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/available")
                .to_request(),
        )
        .await;
        assert!(available.is_empty());

        let statistics: BookStatistics = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/statistics")
                .to_request(),
        )
        .await;
        assert_eq!(
            statistics,
            BookStatistics {
                total: 1,
                reserved: 1,
                ..BookStatistics::default()
            }
        );

        let statuses: Vec<String> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/books/statuses").to_request(),
        )
        .await;
        assert_eq!(
            statuses,
            vec!["AVAILABLE", "BORROWED", "RESERVED", "MAINTENANCE"]
        );
    }

    #[actix_web::test]
    async fn searches_and_pages() {
        let app = init_test_app!();
        let seeded: AdminResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/data/init").to_request(),
        )
        .await;
        assert_eq!(seeded.affected, 8);

        let by_title: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/search/title?title=war")
                .to_request(),
        )
        .await;
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "War and Peace");

        let by_author: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/search/author?author=TOLSTOY")
                .to_request(),
        )
        .await;
        assert_eq!(by_author.len(), 2);

        let by_keyword: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/search?keyword=napoleonic")
                .to_request(),
        )
        .await;
        assert_eq!(by_keyword.len(), 1);

        let combined: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/search/title-author?title=anna&author=leo")
                .to_request(),
        )
        .await;
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].title, "Anna Karenina");

        let in_year: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/books/year/1866").to_request(),
        )
        .await;
        assert_eq!(in_year.len(), 1);

        let in_range: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/year?from=1860&to=1870")
                .to_request(),
        )
        .await;
        assert_eq!(in_range.len(), 3);

        let thick: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/pages/min/800")
                .to_request(),
        )
        .await;
        assert_eq!(
            thick.iter().map(|b| b.pages).collect::<Vec<_>>(),
            vec![864, 1274]
        );

        let thin: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/pages/max/352")
                .to_request(),
        )
        .await;
        assert_eq!(
            thin.iter().map(|b| b.pages).collect::<Vec<_>>(),
            vec![352, 352, 224, 224]
        );

        let by_isbn: Book = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/isbn/978-5-17-102150-7")
                .to_request(),
        )
        .await;
        assert_eq!(by_isbn.title, "A Hero of Our Time");

        let page: BooksPage = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/books/paginated?page=1&size=3")
                .to_request(),
        )
        .await;
        assert_eq!(page.total, 8);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].title, "Eugene Onegin");

        let response = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/books/paginated?size=0")
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let cleared: AdminResponse = test::call_and_read_body_json(
            &app,
            test::TestRequest::delete().uri("/api/data/clear").to_request(),
        )
        .await;
        assert_eq!(cleared.affected, 8);

        let all: Vec<Book> = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/books").to_request(),
        )
        .await;
        assert!(all.is_empty());
    }
}
