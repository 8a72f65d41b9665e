//! Books repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, RatingStats},
};

use super::{contains_pattern, map_unique_violation, BookFilter, BookSort, BookStore};

const BOOK_COLUMNS: &str = r#"
    id, title, author, genre, description, published_year, isbn, added_by,
    average_rating, total_ratings, created_at, updated_at
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &BookFilter) {
    qb.push(" WHERE 1=1");

    if let Some(ref author) = filter.author {
        qb.push(" AND author ILIKE ").push_bind(contains_pattern(author));
    }

    if let Some(ref genre) = filter.genre {
        qb.push(" AND genre ILIKE ").push_bind(contains_pattern(genre));
    }

    if let Some(ref text) = filter.text {
        let pattern = contains_pattern(text);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR author ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn find(
        &self,
        filter: &BookFilter,
        sort: BookSort,
        skip: i64,
        limit: i64,
    ) -> AppResult<Vec<Book>> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
        push_filter(&mut qb, filter);

        qb.push(match sort {
            BookSort::Newest => " ORDER BY created_at DESC, id",
            BookSort::TopRated => " ORDER BY average_rating DESC, created_at DESC, id",
        });
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(skip);

        let books = qb.build_query_as::<Book>().fetch_all(&self.pool).await?;
        Ok(books)
    }

    async fn count(&self, filter: &BookFilter) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM books");
        push_filter(&mut qb, filter);

        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books WHERE id = $1",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn insert(&self, book: &Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (
                id, title, author, genre, description, published_year, isbn, added_by,
                average_rating, total_ratings, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(book.published_year)
        .bind(&book.isbn)
        .bind(book.added_by)
        .bind(book.average_rating)
        .bind(book.total_ratings)
        .bind(book.created_at)
        .bind(book.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Book with this ISBN already exists"))
    }

    async fn update_rating_stats(&self, id: Uuid, stats: RatingStats) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET
                average_rating = $1,
                total_ratings = $2,
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(stats.average_rating)
        .bind(stats.total_ratings)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
