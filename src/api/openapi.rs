//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, reviews, search};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "1.0.0",
        description = "Book catalog and review REST API. Every response is wrapped in a \
                       `{success, message, data}` envelope; the schemas below describe `data`.",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::signup,
        auth::login,
        // Books
        books::create_book,
        books::list_books,
        books::get_book,
        books::delete_book,
        search::search_books,
        // Reviews
        books::submit_review,
        reviews::update_review,
        reviews::delete_review,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::SignupRequest,
            crate::models::user::LoginRequest,
            crate::models::user::AuthResponse,
            crate::models::user::User,
            crate::models::user::UserSummary,
            // Books
            crate::models::book::Book,
            crate::models::book::BookView,
            crate::models::book::BookPage,
            crate::models::book::BookDetails,
            crate::models::book::CreateBook,
            crate::models::book::RatingStats,
            crate::models::pagination::Pagination,
            // Reviews
            crate::models::review::Review,
            crate::models::review::ReviewView,
            crate::models::review::CreateReview,
            crate::models::review::UpdateReview,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::FieldError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup and login"),
        (name = "books", description = "Book catalog"),
        (name = "reviews", description = "Book reviews")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
