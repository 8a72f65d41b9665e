//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, SignupRequest},
        AuthResponse,
    },
};

use super::ApiResponse;

/// Register a new account
#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, token issued", body = AuthResponse),
        (status = 400, description = "Invalid input or account already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): WithRejection<Json<SignupRequest>, AppError>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    request.validate()?;

    let auth = state.services.auth.signup(request).await?;
    Ok(ApiResponse::created("User created successfully", auth))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input or credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, AppError>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    request.validate()?;

    let auth = state.services.auth.login(request).await?;
    Ok(ApiResponse::ok("Login successful", auth))
}
