//! Data models for Bookshelf

pub mod book;
pub mod pagination;
pub mod review;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookDetails, BookPage, BookView, RatingStats};
pub use pagination::{PageRequest, Pagination};
pub use review::{Review, ReviewPatch, ReviewView};
pub use user::{AuthResponse, User, UserSummary};
