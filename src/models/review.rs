//! Review model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::user::UserSummary;

/// Review model from database. Unique per (user_id, book_id).
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review as returned by the API, with its author resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub user: Option<UserSummary>,
}

/// Submit review request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(
        required(message = "Rating is required"),
        range(min = 1, max = 5, message = "Rating must be between 1 and 5")
    )]
    pub rating: Option<i16>,
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Update review request. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
    #[validate(length(min = 1, max = 1000, message = "Comment must be between 1 and 1000 characters"))]
    pub comment: Option<String>,
}

/// Store-level partial update. `comment: Some(None)` clears the comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPatch {
    pub rating: Option<i16>,
    pub comment: Option<Option<String>>,
}

impl ReviewPatch {
    /// Patch that puts every mutable field back to `review`'s values
    pub fn restoring(review: &Review) -> Self {
        Self {
            rating: Some(review.rating),
            comment: Some(review.comment.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.comment.is_none()
    }
}

impl From<UpdateReview> for ReviewPatch {
    fn from(update: UpdateReview) -> Self {
        Self {
            rating: update.rating,
            // A blank comment clears it, as on submission
            comment: update.comment.map(|c| {
                let c = c.trim();
                (!c.is_empty()).then(|| c.to_string())
            }),
        }
    }
}
