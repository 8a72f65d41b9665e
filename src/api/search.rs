//! Search endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{book::SearchQuery, BookPage},
};

use super::ApiResponse;

/// Search books by title or author, best rated first
#[utoipa::path(
    get,
    path = "/search",
    tag = "books",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching books", body = BookPage),
        (status = 400, description = "Missing or invalid query", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, AppError>,
) -> AppResult<Json<ApiResponse<BookPage>>> {
    query.validate()?;

    let page = state.services.catalog.search_books(&query).await?;
    Ok(ApiResponse::ok("Books fetched successfully", page))
}
