//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{pagination::Pagination, review::ReviewView, user::UserSummary};

/// Book record. `average_rating` and `total_ratings` are derived from the
/// book's reviews and only ever written by the rating aggregator.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: Option<String>,
    pub published_year: Option<i32>,
    pub isbn: Option<String>,
    #[serde(skip_serializing)]
    pub added_by: Uuid,
    pub average_rating: f64,
    pub total_ratings: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived rating fields of a book
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average_rating: f64,
    pub total_ratings: i64,
}

impl Book {
    pub fn rating_stats(&self) -> RatingStats {
        RatingStats {
            average_rating: self.average_rating,
            total_ratings: self.total_ratings,
        }
    }
}

/// Book as returned by the API, with its owner resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    #[serde(flatten)]
    pub book: Book,
    pub added_by: Option<UserSummary>,
}

/// One page of books
#[derive(Debug, Serialize, ToSchema)]
pub struct BookPage {
    pub books: Vec<BookView>,
    pub pagination: Pagination,
}

/// A book with one page of its reviews
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    pub book: BookView,
    pub reviews: Vec<ReviewView>,
    pub review_pagination: Pagination,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Title is required and must be at most 200 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Author is required and must be at most 100 characters"))]
    pub author: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Genre is required and must be at most 50 characters"))]
    pub genre: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 1000, message = "Published year must be 1000 or later"))]
    pub published_year: Option<i32>,
    #[validate(length(max = 32, message = "ISBN must be at most 32 characters"))]
    pub isbn: Option<String>,
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookListQuery {
    #[validate(range(min = 1, max = 1000000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Case-insensitive substring of the genre
    pub genre: Option<String>,
}

/// Book detail query parameters (review pagination)
#[derive(Debug, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct BookDetailQuery {
    #[validate(range(min = 1, max = 1000000, message = "Review page must be between 1 and 1000000"))]
    pub review_page: Option<i64>,
    #[validate(range(min = 1, max = 50, message = "Review limit must be between 1 and 50"))]
    pub review_limit: Option<i64>,
}

/// Search query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Matched against title and author
    #[serde(default)]
    #[validate(length(min = 1, message = "Search query is required"))]
    pub q: String,
    #[validate(range(min = 1, max = 1000000, message = "Page must be between 1 and 1000000"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<i64>,
}
