//! Server side html rendering for articles.

pub mod article;
pub mod images;
pub mod markdown;
