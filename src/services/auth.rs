//! Account registration and authentication service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, SignupRequest, UserClaims},
        AuthResponse, User,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new account and sign it in
    pub async fn signup(&self, request: SignupRequest) -> AppResult<AuthResponse> {
        let user = User {
            id: Uuid::new_v4(),
            username: request.username.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            password_hash: self.hash_password(&request.password)?,
            created_at: Utc::now(),
        };

        let user = self.repository.users.insert(&user).await?;
        let token = self.create_token(&user)?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(AuthResponse { token, user })
    }

    /// Authenticate by email and password and return a JWT token
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .find_by_credentials(&request.email, &request.password)
            .await?;
        let token = self.create_token(&user)?;

        tracing::debug!(user_id = %user.id, "User logged in");
        Ok(AuthResponse { token, user })
    }

    /// Unknown email and wrong password are indistinguishable to the caller
    pub async fn find_by_credentials(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self
            .repository
            .users
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Resolve a bearer token to its claims
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }

    fn create_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.id.to_string(),
            user_id: user.id,
            username: user.username.clone(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
