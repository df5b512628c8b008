use actix_web::error::InternalError;
use actix_web::HttpResponse;
use paperclip::actix::web;

use crate::api::ErrorResponse;
use crate::handlers;

/// Answers malformed JSON bodies with 400 and an [`ErrorResponse`]
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest()
            .json(ErrorResponse::new(format!("Invalid request body: {}", err)));
        InternalError::from_response(err, response).into()
    })
}

/// Answers missing or malformed query parameters with 400 and an [`ErrorResponse`]
pub fn query_config() -> actix_web::web::QueryConfig {
    actix_web::web::QueryConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest()
            .json(ErrorResponse::new(format!("Invalid query parameters: {}", err)));
        InternalError::from_response(err, response).into()
    })
}

pub fn config_app(cfg: &mut web::ServiceConfig) {
    // fixed paths go before /{book_id} so they are not captured as ids
    cfg.service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/books")
                        .service(
                            web::resource("")
                                .route(web::get().to(handlers::get_all_books))
                                .route(web::post().to(handlers::create_book)),
                        )
                        .service(
                            web::resource("/paginated")
                                .route(web::get().to(handlers::get_books_paginated)),
                        )
                        .service(
                            web::resource("/available")
                                .route(web::get().to(handlers::get_available_books)),
                        )
                        .service(
                            web::resource("/statistics")
                                .route(web::get().to(handlers::get_book_statistics)),
                        )
                        .service(
                            web::resource("/statuses")
                                .route(web::get().to(handlers::get_all_statuses)),
                        )
                        .service(
                            web::resource("/search")
                                .route(web::get().to(handlers::search_books_by_keyword)),
                        )
                        .service(
                            web::resource("/search/title")
                                .route(web::get().to(handlers::search_books_by_title)),
                        )
                        .service(
                            web::resource("/search/author")
                                .route(web::get().to(handlers::search_books_by_author)),
                        )
                        .service(
                            web::resource("/search/title-author")
                                .route(web::get().to(handlers::search_books_by_title_and_author)),
                        )
                        .service(
                            web::resource("/status/{status}")
                                .route(web::get().to(handlers::get_books_by_status)),
                        )
                        .service(
                            web::resource("/year")
                                .route(web::get().to(handlers::get_books_by_publication_year_range)),
                        )
                        .service(
                            web::resource("/year/{year}")
                                .route(web::get().to(handlers::get_books_by_publication_year)),
                        )
                        .service(
                            web::resource("/pages/min/{pages}")
                                .route(web::get().to(handlers::get_books_with_min_pages)),
                        )
                        .service(
                            web::resource("/pages/max/{pages}")
                                .route(web::get().to(handlers::get_books_with_max_pages)),
                        )
                        .service(
                            web::resource("/isbn/{isbn}")
                                .route(web::get().to(handlers::get_book_by_isbn)),
                        )
                        .service(
                            web::resource("/{book_id}")
                                .route(web::get().to(handlers::get_book))
                                .route(web::put().to(handlers::update_book))
                                .route(web::delete().to(handlers::delete_book)),
                        )
                        .service(
                            web::resource("/{book_id}/status")
                                .route(web::patch().to(handlers::change_book_status)),
                        ),
                )
                .service(
                    web::scope("/data")
                        .service(
                            web::resource("/init").route(web::post().to(handlers::init_demo_data)),
                        )
                        .service(
                            web::resource("/clear")
                                .route(web::delete().to(handlers::clear_all_data)),
                        ),
                ),
        );
}
