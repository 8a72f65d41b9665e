//! In-memory implementation of every entity store.
//!
//! All tables sit behind one lock so unique constraints are checked and
//! applied atomically, mirroring the database indexes.

use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, RatingStats, Review, ReviewPatch, User, UserSummary},
};

use super::{BookFilter, BookSort, BookStore, ReviewFilter, ReviewStore, UserStore};

#[derive(Default)]
struct Tables {
    books: HashMap<Uuid, Book>,
    reviews: HashMap<Uuid, Review>,
    users: HashMap<Uuid, User>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    // Poisoning is ignored: every mutation is a single map operation.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn book_matches(book: &Book, filter: &BookFilter) -> bool {
    filter
        .author
        .as_deref()
        .map_or(true, |a| contains_ignore_case(&book.author, a))
        && filter
            .genre
            .as_deref()
            .map_or(true, |g| contains_ignore_case(&book.genre, g))
        && filter.text.as_deref().map_or(true, |t| {
            contains_ignore_case(&book.title, t) || contains_ignore_case(&book.author, t)
        })
}

fn review_matches(review: &Review, filter: &ReviewFilter) -> bool {
    filter.book_id.map_or(true, |id| review.book_id == id)
        && filter.user_id.map_or(true, |id| review.user_id == id)
}

fn page<T>(items: Vec<T>, skip: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn find(
        &self,
        filter: &BookFilter,
        sort: BookSort,
        skip: i64,
        limit: i64,
    ) -> AppResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .read()
            .books
            .values()
            .filter(|b| book_matches(b, filter))
            .cloned()
            .collect();

        books.sort_by(|a, b| {
            let newest = b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id));
            match sort {
                BookSort::Newest => newest,
                BookSort::TopRated => b
                    .average_rating
                    .total_cmp(&a.average_rating)
                    .then(newest),
            }
        });

        Ok(page(books, skip, limit))
    }

    async fn count(&self, filter: &BookFilter) -> AppResult<i64> {
        let count = self
            .read()
            .books
            .values()
            .filter(|b| book_matches(b, filter))
            .count();
        Ok(count as i64)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        Ok(self.read().books.get(&id).cloned())
    }

    async fn insert(&self, book: &Book) -> AppResult<Book> {
        let mut tables = self.write();
        if let Some(ref isbn) = book.isbn {
            if tables.books.values().any(|b| b.isbn.as_ref() == Some(isbn)) {
                return Err(AppError::Duplicate(
                    "Book with this ISBN already exists".to_string(),
                ));
            }
        }
        tables.books.insert(book.id, book.clone());
        Ok(book.clone())
    }

    async fn update_rating_stats(&self, id: Uuid, stats: RatingStats) -> AppResult<bool> {
        let mut tables = self.write();
        match tables.books.get_mut(&id) {
            Some(book) => {
                book.average_rating = stats.average_rating;
                book.total_ratings = stats.total_ratings;
                book.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.write().books.remove(&id).is_some())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn find(&self, filter: &ReviewFilter, skip: i64, limit: i64) -> AppResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .read()
            .reviews
            .values()
            .filter(|r| review_matches(r, filter))
            .cloned()
            .collect();

        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(page(reviews, skip, limit))
    }

    async fn count(&self, filter: &ReviewFilter) -> AppResult<i64> {
        let count = self
            .read()
            .reviews
            .values()
            .filter(|r| review_matches(r, filter))
            .count();
        Ok(count as i64)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        Ok(self.read().reviews.get(&id).cloned())
    }

    async fn ratings_for_book(&self, book_id: Uuid) -> AppResult<Vec<i16>> {
        Ok(self
            .read()
            .reviews
            .values()
            .filter(|r| r.book_id == book_id)
            .map(|r| r.rating)
            .collect())
    }

    async fn insert(&self, review: &Review) -> AppResult<Review> {
        let mut tables = self.write();
        let taken = tables
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.book_id == review.book_id);
        if taken {
            return Err(AppError::Duplicate(
                "You have already reviewed this book".to_string(),
            ));
        }
        tables.reviews.insert(review.id, review.clone());
        Ok(review.clone())
    }

    async fn update_by_id(&self, id: Uuid, patch: &ReviewPatch) -> AppResult<Option<Review>> {
        let mut tables = self.write();
        let Some(review) = tables.reviews.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(rating) = patch.rating {
            review.rating = rating;
        }
        if let Some(ref comment) = patch.comment {
            review.comment = comment.clone();
        }
        review.updated_at = Utc::now();

        Ok(Some(review.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.write().reviews.remove(&id).is_some())
    }

    async fn delete_by_book(&self, book_id: Uuid) -> AppResult<u64> {
        let mut tables = self.write();
        let before = tables.reviews.len();
        tables.reviews.retain(|_, r| r.book_id != book_id);
        Ok((before - tables.reviews.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>> {
        let tables = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id))
            .map(UserSummary::from)
            .collect())
    }

    async fn insert(&self, user: &User) -> AppResult<User> {
        let mut tables = self.write();
        let mut user = user.clone();
        user.email = user.email.to_lowercase();

        let taken = tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(AppError::Duplicate(
                "User with this email or username already exists".to_string(),
            ));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}
