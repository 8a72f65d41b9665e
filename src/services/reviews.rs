//! Review lifecycle: uniqueness and ownership checks around every review
//! mutation, followed by a rating recompute for the affected book.

use std::future::Future;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{PageRequest, Pagination, Review, ReviewPatch, ReviewView, UserSummary},
    repository::{ReviewFilter, Repository},
};

use super::{
    ratings::{BookGuard, RatingAggregator},
    user_summaries,
};

#[derive(Clone)]
pub struct ReviewsService {
    repository: Repository,
    ratings: RatingAggregator,
}

impl ReviewsService {
    pub fn new(repository: Repository, ratings: RatingAggregator) -> Self {
        Self {
            repository,
            ratings,
        }
    }

    /// Post the first review of `user_id` on `book_id`
    pub async fn submit(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> AppResult<ReviewView> {
        let guard = self.ratings.lock(book_id).await;

        if self.repository.books.find_by_id(book_id).await?.is_none() {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        let existing = ReviewFilter {
            book_id: Some(book_id),
            user_id: Some(user_id),
        };
        if self.repository.reviews.count(&existing).await? > 0 {
            return Err(AppError::Duplicate(
                "You have already reviewed this book".to_string(),
            ));
        }

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            rating,
            comment: comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            created_at: now,
            updated_at: now,
        };
        let review = self.repository.reviews.insert(&review).await?;

        let reviews = self.repository.reviews.clone();
        let review_id = review.id;
        self.recompute_or_undo(&guard, async move {
            reviews.delete_by_id(review_id).await.map(|_| ())
        })
        .await?;

        tracing::info!(%book_id, review_id = %review.id, rating, "Review submitted");
        Ok(self.with_author(review).await)
    }

    /// Apply the provided fields of `patch` to a review owned by `requester_id`
    pub async fn update(
        &self,
        review_id: Uuid,
        requester_id: Uuid,
        patch: ReviewPatch,
    ) -> AppResult<ReviewView> {
        let (guard, current) = self.lock_owned_review(review_id, requester_id, "update").await?;

        if patch.is_empty() {
            return Ok(self.with_author(current).await);
        }

        let updated = self
            .repository
            .reviews
            .update_by_id(review_id, &patch)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

        if updated.rating != current.rating {
            let reviews = self.repository.reviews.clone();
            let restore = ReviewPatch::restoring(&current);
            self.recompute_or_undo(&guard, async move {
                reviews.update_by_id(review_id, &restore).await.map(|_| ())
            })
            .await?;
        }

        tracing::info!(book_id = %updated.book_id, %review_id, "Review updated");
        Ok(self.with_author(updated).await)
    }

    /// Remove a review owned by `requester_id`
    pub async fn delete(&self, review_id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let (guard, current) = self.lock_owned_review(review_id, requester_id, "delete").await?;

        if !self.repository.reviews.delete_by_id(review_id).await? {
            return Err(AppError::NotFound("Review not found".to_string()));
        }

        let reviews = self.repository.reviews.clone();
        let book_id = current.book_id;
        self.recompute_or_undo(&guard, async move {
            reviews.insert(&current).await.map(|_| ())
        })
        .await?;

        tracing::info!(%book_id, %review_id, "Review deleted");
        Ok(())
    }

    /// Reviews of a book, newest first, with their authors
    pub async fn list_for_book(
        &self,
        book_id: Uuid,
        page: PageRequest,
    ) -> AppResult<(Vec<ReviewView>, Pagination)> {
        let filter = ReviewFilter {
            book_id: Some(book_id),
            user_id: None,
        };
        let reviews = self
            .repository
            .reviews
            .find(&filter, page.skip(), page.limit)
            .await?;
        let total = self.repository.reviews.count(&filter).await?;

        let ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
        let users = user_summaries(&self.repository, &ids).await?;
        let views = reviews
            .into_iter()
            .map(|review| ReviewView {
                user: users.get(&review.user_id).cloned(),
                review,
            })
            .collect();

        Ok((views, Pagination::new(page, total)))
    }

    /// Lock the review's book, then re-read the review under that lock and
    /// check it belongs to `requester_id`.
    async fn lock_owned_review(
        &self,
        review_id: Uuid,
        requester_id: Uuid,
        action: &str,
    ) -> AppResult<(BookGuard, Review)> {
        let not_found = || AppError::NotFound("Review not found".to_string());

        let book_id = self
            .repository
            .reviews
            .find_by_id(review_id)
            .await?
            .ok_or_else(not_found)?
            .book_id;

        let guard = self.ratings.lock(book_id).await;
        let review = self
            .repository
            .reviews
            .find_by_id(review_id)
            .await?
            .ok_or_else(not_found)?;

        if review.user_id != requester_id {
            return Err(AppError::Forbidden(format!(
                "You can only {} your own reviews",
                action
            )));
        }

        Ok((guard, review))
    }

    /// Recompute the guarded book. On failure run `undo` so the review set
    /// matches the stored aggregate again, and fail the request.
    async fn recompute_or_undo<F>(&self, guard: &BookGuard, undo: F) -> AppResult<()>
    where
        F: Future<Output = AppResult<()>>,
    {
        let book_id = guard.book_id();
        let err = match self.ratings.recompute(guard).await {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        tracing::warn!(%book_id, error = %err, "Rating recompute failed, reverting review change");
        if let Err(undo_err) = undo.await {
            tracing::error!(
                %book_id,
                error = %undo_err,
                "Review change could not be reverted; book rating needs reconciliation"
            );
        }

        Err(AppError::Internal(format!(
            "Failed to update rating for book {}: {}",
            book_id, err
        )))
    }

    /// The mutation is already committed here, so a failed author lookup
    /// leaves `user` empty rather than failing the request.
    async fn with_author(&self, review: Review) -> ReviewView {
        let user = match self.repository.users.find_by_id(review.user_id).await {
            Ok(user) => user.map(|u| UserSummary::from(&u)),
            Err(e) => {
                tracing::warn!(review_id = %review.id, error = %e, "Review author lookup failed");
                None
            }
        };
        ReviewView { review, user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Book, RatingStats},
        repository::{memory::MemoryStore, MockBookStore, MockReviewStore, MockUserStore},
    };
    use std::sync::Arc;

    fn new_book() -> Book {
        let now = Utc::now();
        Book {
            id: Uuid::new_v4(),
            title: "Neuromancer".into(),
            author: "William Gibson".into(),
            genre: "Cyberpunk".into(),
            description: None,
            published_year: Some(1984),
            isbn: None,
            added_by: Uuid::new_v4(),
            average_rating: 0.0,
            total_ratings: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(repository: Repository) -> ReviewsService {
        ReviewsService::new(repository.clone(), RatingAggregator::new(repository))
    }

    async fn stats(repository: &Repository, book_id: Uuid) -> RatingStats {
        repository
            .books
            .find_by_id(book_id)
            .await
            .unwrap()
            .unwrap()
            .rating_stats()
    }

    /// Memory-backed stores with the book store swapped for `books`
    fn with_books(books: MockBookStore) -> (Repository, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let repository = Repository {
            books: Arc::new(books),
            reviews: store.clone(),
            users: store.clone(),
        };
        (repository, store)
    }

    fn failing_books(book: Book) -> MockBookStore {
        let mut books = MockBookStore::new();
        books
            .expect_find_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        books
            .expect_update_rating_stats()
            .returning(|_, _| Err(AppError::Internal("connection reset".into())));
        books
    }

    #[tokio::test]
    async fn author_lookup_failure_does_not_fail_submit() {
        let store = Arc::new(MemoryStore::default());
        let mut users = MockUserStore::new();
        users
            .expect_find_by_id()
            .returning(|_| Err(AppError::Internal("connection reset".into())));
        let repository = Repository {
            books: store.clone(),
            reviews: store.clone(),
            users: Arc::new(users),
        };
        let book = repository.books.insert(&new_book()).await.unwrap();

        let view = service(repository.clone())
            .submit(Uuid::new_v4(), book.id, 5, Some("sharp".into()))
            .await
            .unwrap();

        assert!(view.user.is_none());
        assert_eq!(view.review.rating, 5);
        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 5.0, total_ratings: 1 }
        );
    }

    #[tokio::test]
    async fn aggregate_follows_every_mutation() {
        let repository = Repository::in_memory();
        let book = repository.books.insert(&new_book()).await.unwrap();
        let reviews = service(repository.clone());

        let mut posted = Vec::new();
        for rating in [4, 5, 3] {
            let view = reviews
                .submit(Uuid::new_v4(), book.id, rating, None)
                .await
                .unwrap();
            posted.push((view.review.id, view.review.user_id));
        }
        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 4.0, total_ratings: 3 }
        );

        let late_user = Uuid::new_v4();
        let late = reviews.submit(late_user, book.id, 2, None).await.unwrap();
        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 3.5, total_ratings: 4 }
        );

        reviews.delete(late.review.id, late_user).await.unwrap();
        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 4.0, total_ratings: 3 }
        );

        // 3 -> 5 gives 4, 5, 5
        let (third_id, third_user) = posted[2];
        let patch = ReviewPatch { rating: Some(5), comment: None };
        reviews.update(third_id, third_user, patch).await.unwrap();
        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 4.7, total_ratings: 3 }
        );
    }

    #[tokio::test]
    async fn second_review_by_same_user_is_rejected() {
        let repository = Repository::in_memory();
        let book = repository.books.insert(&new_book()).await.unwrap();
        let reviews = service(repository.clone());
        let user = Uuid::new_v4();

        reviews.submit(user, book.id, 5, None).await.unwrap();
        let err = reviews
            .submit(user, book.id, 1, Some("changed my mind".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Duplicate(_)));
        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 5.0, total_ratings: 1 }
        );
    }

    #[tokio::test]
    async fn review_of_missing_book_is_not_found() {
        let reviews = service(Repository::in_memory());
        let err = reviews
            .submit(Uuid::new_v4(), Uuid::new_v4(), 4, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_the_author_may_change_a_review() {
        let repository = Repository::in_memory();
        let book = repository.books.insert(&new_book()).await.unwrap();
        let reviews = service(repository.clone());
        let view = reviews.submit(Uuid::new_v4(), book.id, 4, None).await.unwrap();
        let stranger = Uuid::new_v4();

        let patch = ReviewPatch { rating: Some(1), comment: None };
        let err = reviews.update(view.review.id, stranger, patch).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "You can only update your own reviews"));

        let err = reviews.delete(view.review.id, stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "You can only delete your own reviews"));

        assert_eq!(
            stats(&repository, book.id).await,
            RatingStats { average_rating: 4.0, total_ratings: 1 }
        );
    }

    #[tokio::test]
    async fn missing_review_is_not_found() {
        let reviews = service(Repository::in_memory());
        let err = reviews.delete(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn comment_only_update_skips_recompute() {
        let mut books = MockBookStore::new();
        books.expect_update_rating_stats().never();
        let (repository, store) = with_books(books);

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            rating: 3,
            comment: Some("fine".into()),
            created_at: now,
            updated_at: now,
        };
        crate::repository::ReviewStore::insert(store.as_ref(), &review).await.unwrap();

        let patch = ReviewPatch { rating: None, comment: Some(Some("great, actually".into())) };
        let updated = service(repository)
            .update(review.id, review.user_id, patch)
            .await
            .unwrap();
        assert_eq!(updated.review.comment.as_deref(), Some("great, actually"));
        assert_eq!(updated.review.rating, 3);
    }

    #[tokio::test]
    async fn failed_recompute_reverts_submission() {
        let book = new_book();
        let book_id = book.id;
        let (repository, _) = with_books(failing_books(book));

        let err = service(repository.clone())
            .submit(Uuid::new_v4(), book_id, 5, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert!(repository.reviews.ratings_for_book(book_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_recompute_restores_updated_review() {
        let book = new_book();
        let book_id = book.id;
        let (repository, store) = with_books(failing_books(book));

        let now = Utc::now();
        let original = Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            book_id,
            rating: 2,
            comment: Some("meh".into()),
            created_at: now,
            updated_at: now,
        };
        crate::repository::ReviewStore::insert(store.as_ref(), &original).await.unwrap();

        let patch = ReviewPatch { rating: Some(5), comment: Some(None) };
        let err = service(repository.clone())
            .update(original.id, original.user_id, patch)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        let stored = repository.reviews.find_by_id(original.id).await.unwrap().unwrap();
        assert_eq!(stored.rating, 2);
        assert_eq!(stored.comment.as_deref(), Some("meh"));
    }

    #[tokio::test]
    async fn failed_recompute_reinstates_deleted_review() {
        let book = new_book();
        let book_id = book.id;
        let (repository, store) = with_books(failing_books(book));

        let now = Utc::now();
        let original = Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            book_id,
            rating: 4,
            comment: None,
            created_at: now,
            updated_at: now,
        };
        crate::repository::ReviewStore::insert(store.as_ref(), &original).await.unwrap();

        let err = service(repository.clone())
            .delete(original.id, original.user_id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(
            repository.reviews.find_by_id(original.id).await.unwrap(),
            Some(original)
        );
    }

    #[tokio::test]
    async fn failed_revert_still_fails_the_request() {
        let book = new_book();
        let book_id = book.id;

        let mut books = MockBookStore::new();
        books
            .expect_find_by_id()
            .returning(move |_| Ok(Some(book.clone())));
        books.expect_update_rating_stats().never();

        let mut reviews = MockReviewStore::new();
        reviews.expect_count().returning(|_| Ok(0));
        reviews.expect_insert().times(1).returning(|r| Ok(r.clone()));
        reviews
            .expect_ratings_for_book()
            .returning(|_| Err(AppError::Internal("read timeout".into())));
        reviews
            .expect_delete_by_id()
            .times(1)
            .returning(|_| Err(AppError::Internal("write timeout".into())));

        let store = Arc::new(MemoryStore::default());
        let repository = Repository {
            books: Arc::new(books),
            reviews: Arc::new(reviews),
            users: store,
        };

        let err = service(repository)
            .submit(Uuid::new_v4(), book_id, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_are_all_counted() {
        let repository = Repository::in_memory();
        let book = repository.books.insert(&new_book()).await.unwrap();
        let reviews = service(repository.clone());

        let ratings: Vec<i16> = (0..24).map(|i| (i % 5 + 1) as i16).collect();
        let handles: Vec<_> = ratings
            .iter()
            .map(|&rating| {
                let reviews = reviews.clone();
                let book_id = book.id;
                tokio::spawn(async move {
                    reviews.submit(Uuid::new_v4(), book_id, rating, None).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            stats(&repository, book.id).await,
            crate::services::ratings::aggregate(&ratings)
        );
        assert_eq!(stats(&repository, book.id).await.total_ratings, 24);
    }

    #[tokio::test]
    async fn lists_reviews_by_page() {
        let repository = Repository::in_memory();
        let book = repository.books.insert(&new_book()).await.unwrap();
        let reviews = service(repository.clone());

        for _ in 0..3 {
            reviews.submit(Uuid::new_v4(), book.id, 4, None).await.unwrap();
        }

        let (page, pagination) = reviews
            .list_for_book(book.id, PageRequest::new(Some(2), Some(2), 10))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(pagination.total, 3);
        assert_eq!(pagination.total_pages, 2);
        assert!(pagination.has_prev);
        assert!(!pagination.has_next);
    }
}
