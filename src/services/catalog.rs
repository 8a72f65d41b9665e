//! Catalog management service

use chrono::{Datelike, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, FieldError},
    models::{
        book::{BookDetailQuery, BookListQuery, CreateBook, SearchQuery},
        Book, BookDetails, BookPage, BookView, PageRequest, Pagination,
    },
    repository::{BookFilter, BookSort, Repository},
};

use super::{ratings::RatingAggregator, reviews::ReviewsService, user_summaries};

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    ratings: RatingAggregator,
    reviews: ReviewsService,
}

/// Trimmed value, or `None` when nothing is left
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CatalogService {
    pub fn new(repository: Repository, ratings: RatingAggregator, reviews: ReviewsService) -> Self {
        Self {
            repository,
            ratings,
            reviews,
        }
    }

    /// Create a book owned by `owner`. New books start unrated.
    pub async fn add_book(&self, owner: Uuid, input: CreateBook) -> AppResult<BookView> {
        let title = input.title.trim().to_string();
        let author = input.author.trim().to_string();
        let genre = input.genre.trim().to_string();

        let mut errors = Vec::new();
        for (field, value) in [("title", &title), ("author", &author), ("genre", &genre)] {
            if value.is_empty() {
                errors.push(FieldError::new(field, format!("{} is required", capitalize(field))));
            }
        }
        if let Some(year) = input.published_year {
            if year > Utc::now().year() {
                errors.push(FieldError::new(
                    "publishedYear",
                    "Published year cannot be in the future",
                ));
            }
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4(),
            title,
            author,
            genre,
            description: non_blank(input.description),
            published_year: input.published_year,
            isbn: non_blank(input.isbn),
            added_by: owner,
            average_rating: 0.0,
            total_ratings: 0,
            created_at: now,
            updated_at: now,
        };

        let book = self.repository.books.insert(&book).await?;
        tracing::info!(book_id = %book.id, title = %book.title, "Book added");

        let mut views = self.with_owners(vec![book]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("Inserted book vanished".to_string()))
    }

    /// A book with one page of its reviews
    pub async fn get_book(&self, id: Uuid, query: &BookDetailQuery) -> AppResult<BookDetails> {
        let book = self
            .repository
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        let page = PageRequest::new(query.review_page, query.review_limit, DEFAULT_PAGE_SIZE);
        let (reviews, review_pagination) = self.reviews.list_for_book(id, page).await?;

        let mut views = self.with_owners(vec![book]).await?;
        let book = views
            .pop()
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        Ok(BookDetails {
            book,
            reviews,
            review_pagination,
        })
    }

    /// Newest books first, optionally filtered by author and genre
    pub async fn list_books(&self, query: &BookListQuery) -> AppResult<BookPage> {
        let filter = BookFilter {
            author: non_blank(query.author.clone()),
            genre: non_blank(query.genre.clone()),
            text: None,
        };
        let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        self.page(&filter, BookSort::Newest, page).await
    }

    /// Books whose title or author contains `q`, best rated first
    pub async fn search_books(&self, query: &SearchQuery) -> AppResult<BookPage> {
        let text = query.q.trim();
        if text.is_empty() {
            return Err(AppError::invalid_field("q", "Search query is required"));
        }

        let filter = BookFilter {
            text: Some(text.to_string()),
            ..Default::default()
        };
        let page = PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
        self.page(&filter, BookSort::TopRated, page).await
    }

    /// Remove a book and its reviews. Only the user who added it may do so.
    pub async fn delete_book(&self, id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let _guard = self.ratings.lock(id).await;

        let book = self
            .repository
            .books
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.added_by != requester_id {
            return Err(AppError::Forbidden(
                "You can only delete books you added".to_string(),
            ));
        }

        let removed = self.repository.reviews.delete_by_book(id).await?;
        self.repository.books.delete_by_id(id).await?;

        tracing::info!(book_id = %id, reviews = removed, "Book deleted");
        Ok(())
    }

    /// Round trip to the book store
    pub async fn check_storage(&self) -> AppResult<()> {
        self.repository.books.count(&BookFilter::default()).await?;
        Ok(())
    }

    async fn page(
        &self,
        filter: &BookFilter,
        sort: BookSort,
        page: PageRequest,
    ) -> AppResult<BookPage> {
        let books = self
            .repository
            .books
            .find(filter, sort, page.skip(), page.limit)
            .await?;
        let total = self.repository.books.count(filter).await?;

        Ok(BookPage {
            books: self.with_owners(books).await?,
            pagination: Pagination::new(page, total),
        })
    }

    async fn with_owners(&self, books: Vec<Book>) -> AppResult<Vec<BookView>> {
        let ids: Vec<Uuid> = books.iter().map(|b| b.added_by).collect();
        let users = user_summaries(&self.repository, &ids).await?;
        Ok(books
            .into_iter()
            .map(|book| BookView {
                added_by: users.get(&book.added_by).cloned(),
                book,
            })
            .collect())
    }
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(repository: &Repository) -> CatalogService {
        let ratings = RatingAggregator::new(repository.clone());
        let reviews = ReviewsService::new(repository.clone(), ratings.clone());
        CatalogService::new(repository.clone(), ratings, reviews)
    }

    fn create(title: &str, author: &str) -> CreateBook {
        CreateBook {
            title: title.into(),
            author: author.into(),
            genre: "Fiction".into(),
            description: None,
            published_year: Some(1999),
            isbn: None,
        }
    }

    #[tokio::test]
    async fn new_book_is_trimmed_and_unrated() {
        let repository = Repository::in_memory();
        let catalog = service(&repository);

        let mut input = create("  Middlemarch ", " George Eliot");
        input.isbn = Some("   ".into());
        let view = catalog.add_book(Uuid::new_v4(), input).await.unwrap();

        assert_eq!(view.book.title, "Middlemarch");
        assert_eq!(view.book.author, "George Eliot");
        assert_eq!(view.book.isbn, None);
        assert_eq!(view.book.average_rating, 0.0);
        assert_eq!(view.book.total_ratings, 0);
    }

    #[tokio::test]
    async fn future_publication_year_is_rejected() {
        let repository = Repository::in_memory();
        let mut input = create("Tomorrow", "Nobody");
        input.published_year = Some(Utc::now().year() + 1);

        let err = service(&repository)
            .add_book(Uuid::new_v4(), input)
            .await
            .unwrap_err();
        match err {
            AppError::Validation(fields) => assert_eq!(fields[0].field, "publishedYear"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let repository = Repository::in_memory();
        let err = service(&repository)
            .add_book(Uuid::new_v4(), create("   ", "Someone"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref f) if f[0].field == "title"));
    }

    #[tokio::test]
    async fn search_ranks_by_rating_then_recency() {
        let repository = Repository::in_memory();
        let catalog = service(&repository);
        let owner = Uuid::new_v4();

        let old = catalog.add_book(owner, create("Dune", "Frank Herbert")).await.unwrap();
        let new = catalog.add_book(owner, create("Dune Messiah", "Frank Herbert")).await.unwrap();
        catalog.add_book(owner, create("Emma", "Jane Austen")).await.unwrap();

        // Only the older book gets a rating
        catalog
            .reviews
            .submit(Uuid::new_v4(), old.book.id, 5, None)
            .await
            .unwrap();

        let query = SearchQuery {
            q: "  dune ".into(),
            ..Default::default()
        };
        let found = catalog.search_books(&query).await.unwrap();
        let ids: Vec<_> = found.books.iter().map(|b| b.book.id).collect();
        assert_eq!(ids, vec![old.book.id, new.book.id]);
        assert_eq!(found.pagination.total, 2);
    }

    #[tokio::test]
    async fn blank_search_is_rejected() {
        let repository = Repository::in_memory();
        let query = SearchQuery {
            q: "   ".into(),
            ..Default::default()
        };
        let err = service(&repository).search_books(&query).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_by_genre_ignoring_case() {
        let repository = Repository::in_memory();
        let catalog = service(&repository);
        let owner = Uuid::new_v4();

        let mut poetry = create("Leaves of Grass", "Walt Whitman");
        poetry.genre = "Poetry".into();
        catalog.add_book(owner, poetry).await.unwrap();
        catalog.add_book(owner, create("Ulysses", "James Joyce")).await.unwrap();

        let query = BookListQuery {
            genre: Some("POET".into()),
            ..Default::default()
        };
        let page = catalog.list_books(&query).await.unwrap();
        assert_eq!(page.books.len(), 1);
        assert_eq!(page.books[0].book.title, "Leaves of Grass");
    }

    #[tokio::test]
    async fn only_owner_deletes_book_and_reviews_go_with_it() {
        let repository = Repository::in_memory();
        let catalog = service(&repository);
        let owner = Uuid::new_v4();

        let view = catalog.add_book(owner, create("Beloved", "Toni Morrison")).await.unwrap();
        catalog
            .reviews
            .submit(Uuid::new_v4(), view.book.id, 4, None)
            .await
            .unwrap();

        let err = catalog.delete_book(view.book.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        catalog.delete_book(view.book.id, owner).await.unwrap();
        assert!(repository.books.find_by_id(view.book.id).await.unwrap().is_none());
        assert!(repository
            .reviews
            .ratings_for_book(view.book.id)
            .await
            .unwrap()
            .is_empty());

        let err = catalog
            .get_book(view.book.id, &BookDetailQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
