//! Review endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{review::UpdateReview, ReviewView},
};

use super::{ApiResponse, AuthenticatedUser};

/// Update your own review
#[utoipa::path(
    put,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    request_body = UpdateReview,
    responses(
        (status = 200, description = "Review updated", body = ReviewView),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Review written by another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Review not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(input), _): WithRejection<Json<UpdateReview>, AppError>,
) -> AppResult<Json<ApiResponse<ReviewView>>> {
    input.validate()?;

    let review = state
        .services
        .reviews
        .update(id, claims.user_id, input.into())
        .await?;
    Ok(ApiResponse::ok("Review updated successfully", review))
}

/// Delete your own review
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 403, description = "Review written by another user", body = crate::error::ErrorResponse),
        (status = 404, description = "Review not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.reviews.delete(id, claims.user_id).await?;
    Ok(ApiResponse::empty("Review deleted successfully"))
}
