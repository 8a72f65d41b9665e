//! Business logic services

pub mod auth;
pub mod catalog;
pub mod ratings;
pub mod reviews;

use std::collections::HashMap;

use uuid::Uuid;

use crate::{config::AuthConfig, error::AppResult, models::UserSummary, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub reviews: reviews::ReviewsService,
    pub ratings: ratings::RatingAggregator,
}

impl Services {
    /// Create all services with the given repository. They share one
    /// rating aggregator so per-book locks are process-wide.
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        let ratings = ratings::RatingAggregator::new(repository.clone());
        let reviews = reviews::ReviewsService::new(repository.clone(), ratings.clone());

        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config),
            catalog: catalog::CatalogService::new(repository, ratings.clone(), reviews.clone()),
            reviews,
            ratings,
        }
    }
}

/// `{id, username}` of each distinct user in `ids` that still exists
pub(crate) async fn user_summaries(
    repository: &Repository,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, UserSummary>> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let users = repository.users.find_summaries(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}
