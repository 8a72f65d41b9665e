//! Reviews repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Review, ReviewPatch},
};

use super::{map_unique_violation, ReviewFilter, ReviewStore};

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReviewFilter) {
    qb.push(" WHERE 1=1");

    if let Some(book_id) = filter.book_id {
        qb.push(" AND book_id = ").push_bind(book_id);
    }

    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
}

#[async_trait]
impl ReviewStore for ReviewsRepository {
    async fn find(&self, filter: &ReviewFilter, skip: i64, limit: i64) -> AppResult<Vec<Review>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, user_id, book_id, rating, comment, created_at, updated_at FROM reviews",
        );
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id");
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(skip);

        let reviews = qb.build_query_as::<Review>().fetch_all(&self.pool).await?;
        Ok(reviews)
    }

    async fn count(&self, filter: &ReviewFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM reviews");
        push_filter(&mut qb, filter);

        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, user_id, book_id, rating, comment, created_at, updated_at
            FROM reviews
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn ratings_for_book(&self, book_id: Uuid) -> AppResult<Vec<i16>> {
        let ratings = sqlx::query_scalar::<_, i16>("SELECT rating FROM reviews WHERE book_id = $1")
            .bind(book_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ratings)
    }

    async fn insert(&self, review: &Review) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, user_id, book_id, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, book_id, rating, comment, created_at, updated_at
            "#,
        )
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.book_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "You have already reviewed this book"))
    }

    async fn update_by_id(&self, id: Uuid, patch: &ReviewPatch) -> AppResult<Option<Review>> {
        let (set_comment, comment) = match &patch.comment {
            Some(comment) => (true, comment.clone()),
            None => (false, None),
        };

        let review = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews SET
                rating = COALESCE($1, rating),
                comment = CASE WHEN $2 THEN $3 ELSE comment END,
                updated_at = $4
            WHERE id = $5
            RETURNING id, user_id, book_id, rating, comment, created_at, updated_at
            "#,
        )
        .bind(patch.rating)
        .bind(set_comment)
        .bind(comment)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_book(&self, book_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reviews WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
