//! Book (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{BookDetailQuery, BookListQuery, CreateBook},
        review::CreateReview,
        BookDetails, BookPage, BookView, ReviewView,
    },
};

use super::{ApiResponse, AuthenticatedUser};

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book added", body = BookView),
        (status = 400, description = "Invalid input or duplicate ISBN", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Json(input), _): WithRejection<Json<CreateBook>, AppError>,
) -> AppResult<(StatusCode, Json<ApiResponse<BookView>>)> {
    input.validate()?;

    let book = state.services.catalog.add_book(claims.user_id, input).await?;
    Ok(ApiResponse::created("Book added successfully", book))
}

/// List books, newest first
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookListQuery),
    responses(
        (status = 200, description = "One page of books", body = BookPage),
        (status = 400, description = "Invalid query", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    WithRejection(Query(query), _): WithRejection<Query<BookListQuery>, AppError>,
) -> AppResult<Json<ApiResponse<BookPage>>> {
    query.validate()?;

    let page = state.services.catalog.list_books(&query).await?;
    Ok(ApiResponse::ok("Books fetched successfully", page))
}

/// Get a book with a page of its reviews
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID"),
        BookDetailQuery
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 400, description = "Invalid identifier or query", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<BookDetailQuery>, AppError>,
) -> AppResult<Json<ApiResponse<BookDetails>>> {
    query.validate()?;

    let details = state.services.catalog.get_book(id, &query).await?;
    Ok(ApiResponse::ok("Book details fetched successfully", details))
}

/// Delete a book and all of its reviews
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Book added by another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.catalog.delete_book(id, claims.user_id).await?;
    Ok(ApiResponse::empty("Book deleted successfully"))
}

/// Review a book. Each user may review a book once.
#[utoipa::path(
    post,
    path = "/books/{id}/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review submitted", body = ReviewView),
        (status = 400, description = "Invalid input or already reviewed", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(book_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(input), _): WithRejection<Json<CreateReview>, AppError>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewView>>)> {
    input.validate()?;
    let rating = input
        .rating
        .ok_or_else(|| AppError::invalid_field("rating", "Rating is required"))?;

    let review = state
        .services
        .reviews
        .submit(claims.user_id, book_id, rating, input.comment)
        .await?;
    Ok(ApiResponse::created("Review submitted successfully", review))
}
