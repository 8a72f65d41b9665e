//! Repository layer for database operations
//!
//! Each entity store is a trait so services receive their persistence as an
//! injected dependency. PostgreSQL implementations live in `books`, `reviews`
//! and `users`; `memory` provides process-local tables.

pub mod books;
pub mod memory;
pub mod reviews;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, RatingStats, Review, ReviewPatch, User, UserSummary},
};

/// Book selection. Every text criterion is a case-insensitive substring match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub author: Option<String>,
    pub genre: Option<String>,
    /// Matches title OR author
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSort {
    /// created_at descending
    Newest,
    /// average_rating descending, then created_at descending
    TopRated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub book_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn find(
        &self,
        filter: &BookFilter,
        sort: BookSort,
        skip: i64,
        limit: i64,
    ) -> AppResult<Vec<Book>>;

    async fn count(&self, filter: &BookFilter) -> AppResult<i64>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>>;

    /// Fails with `Duplicate` when the ISBN is already taken.
    async fn insert(&self, book: &Book) -> AppResult<Book>;

    /// Overwrite the derived rating fields. Returns false if the book is gone.
    async fn update_rating_stats(&self, id: Uuid, stats: RatingStats) -> AppResult<bool>;

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Newest first
    async fn find(&self, filter: &ReviewFilter, skip: i64, limit: i64) -> AppResult<Vec<Review>>;

    async fn count(&self, filter: &ReviewFilter) -> AppResult<i64>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Review>>;

    /// Every rating currently recorded for a book
    async fn ratings_for_book(&self, book_id: Uuid) -> AppResult<Vec<i16>>;

    /// Fails with `Duplicate` when the (user, book) pair already has a review.
    async fn insert(&self, review: &Review) -> AppResult<Review>;

    async fn update_by_id(&self, id: Uuid, patch: &ReviewPatch) -> AppResult<Option<Review>>;

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool>;

    async fn delete_by_book(&self, book_id: Uuid) -> AppResult<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup used for credential checks. Emails are stored lowercased.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>>;

    /// Fails with `Duplicate` when the username or email is taken.
    async fn insert(&self, user: &User) -> AppResult<User>;
}

/// Main repository struct holding the entity stores
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub reviews: Arc<dyn ReviewStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            reviews: Arc::new(reviews::ReviewsRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Create a repository whose stores share one set of in-memory tables
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            books: store.clone(),
            reviews: store.clone(),
            users: store,
        }
    }
}

/// Translate a unique-constraint violation into `Duplicate`; pass anything else through.
pub(crate) fn map_unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Duplicate(message.to_string())
        }
        _ => err.into(),
    }
}

/// Wrap user input as an ILIKE substring pattern, escaping LIKE metacharacters.
pub(crate) fn contains_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
