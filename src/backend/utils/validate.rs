use super::error::{BackendError, BackendResult};
use crate::common::{
    article::{parse_tags, ArticleInput},
    user::{UserSettings, MAX_FAVORITES},
};
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_SUMMARY_LENGTH: usize = 500;
pub const MAX_CONTENT_LENGTH: usize = 100_000;
pub const MAX_IMAGE_SIZE: usize = 2 * 1024 * 1024;
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

pub fn validate_user_name(name: &str) -> BackendResult<()> {
    #[expect(clippy::expect_used)]
    static VALID_USER_NAME_REGEX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,20}$").expect("compile regex"));

    if VALID_USER_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(BackendError::bad_request("Invalid username"))
    }
}

pub fn validate_new_password(password: &str) -> BackendResult<()> {
    let len = password.chars().count();
    if !(8..=60).contains(&len) {
        return Err(BackendError::bad_request(
            "Password must be between 8 and 60 characters",
        ));
    }
    Ok(())
}

pub fn validate_display_name(name: &Option<String>) -> BackendResult<()> {
    if let Some(name) = name {
        let len = name.chars().count();
        if name.contains('@') || !(3..=30).contains(&len) {
            return Err(BackendError::bad_request("Invalid displayname"));
        }
    }
    Ok(())
}

/// Verified writers are keyed by account uid. Email addresses are a common mistake when
/// adding them by hand.
pub fn validate_writer_uid(uid: &str) -> BackendResult<()> {
    let uid = uid.trim();
    if uid.is_empty() {
        return Err(BackendError::bad_request("User id is required"));
    }
    if uid.contains('@') {
        return Err(BackendError::bad_request(
            "Please enter a user id, not an email address",
        ));
    }
    Ok(())
}

/// Checks an uploaded image and returns its lowercase file extension.
pub fn validate_image(file_name: &str, size: usize) -> BackendResult<String> {
    if size == 0 {
        return Err(BackendError::bad_request("Empty file"));
    }
    if size > MAX_IMAGE_SIZE {
        return Err(BackendError::bad_request("Image must be smaller than 2 MB"));
    }
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(BackendError::bad_request(format!(
            "Unsupported image type, allowed are {}",
            IMAGE_EXTENSIONS.join(", ")
        )));
    }
    Ok(extension)
}

/// Normalized article content, ready to be written to the database.
#[derive(Debug, PartialEq)]
pub struct ValidArticle {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub embed: Option<String>,
}

pub fn validate_article(input: &ArticleInput) -> BackendResult<ValidArticle> {
    let title = input.title.trim();
    let summary = input.summary.trim();
    if title.is_empty() {
        return Err(BackendError::bad_request("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BackendError::bad_request("Title is too long"));
    }
    if summary.is_empty() {
        return Err(BackendError::bad_request("Summary is required"));
    }
    if summary.chars().count() > MAX_SUMMARY_LENGTH {
        return Err(BackendError::bad_request("Summary is too long"));
    }
    if input.content.trim().is_empty() {
        return Err(BackendError::bad_request("Content is required"));
    }
    if input.content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(BackendError::bad_request("Content is too long"));
    }
    let categories = input
        .categories
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    let non_empty = |s: &Option<String>| {
        s.as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    Ok(ValidArticle {
        title: title.to_string(),
        summary: summary.to_string(),
        content: input.content.clone(),
        categories,
        tags: parse_tags(&input.tags),
        cover_image_url: non_empty(&input.cover_image_url),
        embed: non_empty(&input.embed),
    })
}

pub fn validate_settings(settings: &UserSettings) -> BackendResult<()> {
    if settings.favorites.len() > MAX_FAVORITES {
        return Err(BackendError::bad_request(format!(
            "Too many favorites, the limit is {MAX_FAVORITES}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::StatusCode;

    fn input() -> ArticleInput {
        ArticleInput {
            title: "  Patch notes  ".to_string(),
            summary: "What changed".to_string(),
            content: "Lots of things".to_string(),
            tags: "update, ,balance".to_string(),
            embed: Some("   ".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_article() -> BackendResult<()> {
        let valid = validate_article(&input())?;
        assert_eq!("Patch notes", valid.title);
        assert_eq!(vec!["update", "balance"], valid.tags);
        assert_eq!(None, valid.embed);
        Ok(())
    }

    #[test]
    fn test_validate_article_limits() {
        let mut long_title = input();
        long_title.title = "a".repeat(MAX_TITLE_LENGTH + 1);
        assert!(validate_article(&long_title).is_err());

        let mut empty_summary = input();
        empty_summary.summary = " ".to_string();
        let err = validate_article(&empty_summary).err();
        assert_eq!(Some(StatusCode::BAD_REQUEST), err.map(|e| e.status));

        let mut long_content = input();
        long_content.content = "a".repeat(MAX_CONTENT_LENGTH + 1);
        assert!(validate_article(&long_content).is_err());
    }

    #[test]
    fn test_validate_user_name() {
        assert!(validate_user_name("player_one").is_ok());
        assert!(validate_user_name("no").is_err());
        assert!(validate_user_name("with space").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name(&None).is_ok());
        assert!(validate_display_name(&Some("Glitch".to_string())).is_ok());
        assert!(validate_display_name(&Some("me@mail".to_string())).is_err());
        assert!(validate_display_name(&Some("ab".to_string())).is_err());
    }

    #[test]
    fn test_validate_image() -> BackendResult<()> {
        assert_eq!("png", validate_image("Cover.PNG", 100)?);
        assert!(validate_image("script.svg", 100).is_err());
        assert!(validate_image("noextension", 100).is_err());
        assert!(validate_image("big.jpg", MAX_IMAGE_SIZE + 1).is_err());
        Ok(())
    }

    #[test]
    fn test_validate_settings() {
        let mut settings = UserSettings {
            favorites: (0..MAX_FAVORITES).map(|i| format!("game-{i}")).collect(),
            ..Default::default()
        };
        assert!(validate_settings(&settings).is_ok());

        settings.favorites.push("one-too-many".to_string());
        let err = validate_settings(&settings).err();
        assert_eq!(Some(StatusCode::BAD_REQUEST), err.map(|e| e.status));
    }

    #[test]
    fn test_validate_writer_uid() {
        assert!(validate_writer_uid("6iZDTXC78aVwX22qrY43BOxDRLt1").is_ok());
        assert!(validate_writer_uid("writer@glitchrealm.ca").is_err());
        assert!(validate_writer_uid("  ").is_err());
    }
}
