//! Rating aggregation
//!
//! A book's `average_rating` / `total_ratings` are derived from its reviews.
//! They are recomputed from scratch after every review mutation, while the
//! caller holds that book's lock, so two concurrent mutations on the same
//! book can never interleave their read-all-ratings / write-aggregate steps.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::RatingStats,
    repository::Repository,
};

/// Average and count of a set of ratings.
///
/// The average is rounded to one decimal place, half away from zero. It is
/// computed on integers so `.x5` boundaries are exact: ratings summing to 17
/// over 4 reviews give 4.3, never 4.2.
pub fn aggregate(ratings: &[i16]) -> RatingStats {
    let total = ratings.len() as i64;
    if total == 0 {
        return RatingStats::default();
    }

    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    // round(10 * sum / total) for non-negative operands
    let tenths = (20 * sum + total) / (2 * total);

    RatingStats {
        average_rating: tenths as f64 / 10.0,
        total_ratings: total,
    }
}

/// Per-book mutual exclusion. Entries are held weakly and pruned once no
/// guard for the book is alive.
#[derive(Clone, Default)]
pub struct BookLocks {
    locks: Arc<Mutex<HashMap<Uuid, Weak<AsyncMutex<()>>>>>,
}

impl BookLocks {
    pub async fn acquire(&self, book_id: Uuid) -> BookGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(&book_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(book_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };

        BookGuard {
            book_id,
            _guard: lock.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|w| w.strong_count() > 0).count()
    }
}

/// Proof that the caller holds the lock for `book_id`
pub struct BookGuard {
    book_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl BookGuard {
    pub fn book_id(&self) -> Uuid {
        self.book_id
    }
}

/// Keeps each book's derived rating fields consistent with its reviews
#[derive(Clone)]
pub struct RatingAggregator {
    repository: Repository,
    locks: BookLocks,
}

impl RatingAggregator {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            locks: BookLocks::default(),
        }
    }

    /// Serialize review mutations and aggregation for one book
    pub async fn lock(&self, book_id: Uuid) -> BookGuard {
        self.locks.acquire(book_id).await
    }

    /// Recompute the guarded book's rating fields from its current reviews.
    ///
    /// Returns `None` when the book no longer exists; there is nothing to
    /// update and that is not an error. Idempotent.
    pub async fn recompute(&self, guard: &BookGuard) -> AppResult<Option<RatingStats>> {
        let book_id = guard.book_id();
        let ratings = self.repository.reviews.ratings_for_book(book_id).await?;
        let stats = aggregate(&ratings);

        if !self
            .repository
            .books
            .update_rating_stats(book_id, stats)
            .await?
        {
            tracing::debug!(%book_id, "Rating recompute skipped: book no longer exists");
            return Ok(None);
        }

        tracing::debug!(
            %book_id,
            average = stats.average_rating,
            total = stats.total_ratings,
            "Rating aggregate updated"
        );
        Ok(Some(stats))
    }

    /// Lock the book and recompute. Used for out-of-band reconciliation.
    pub async fn refresh(&self, book_id: Uuid) -> AppResult<Option<RatingStats>> {
        let guard = self.lock(book_id).await;
        self.recompute(&guard).await
    }
}
