use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub mod config;
pub mod error;
pub(super) mod scheduled_tasks;
pub mod validate;

/// Unique storage path for an uploaded file, eg `covers/1736510400000-a8Xk2pQ0Zr.png`.
pub fn generate_object_path(prefix: &str, extension: &str) -> String {
    let random: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!(
        "{prefix}/{}-{random}.{extension}",
        Utc::now().timestamp_millis()
    )
}

/// Only accept redirects to a path on this site, so that the sign-in page cant be used to
/// send users elsewhere.
pub fn safe_redirect(redirect: Option<&str>) -> String {
    match redirect {
        Some(r) if r.starts_with('/') && !r.starts_with("//") && !r.contains('\\') => {
            r.to_string()
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_object_path() {
        let path = generate_object_path("covers", "png");
        let rest = path.strip_prefix("covers/").unwrap_or_default();
        let (millis, random) = rest.split_once('-').unwrap_or_default();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!("png", random.rsplit('.').next().unwrap_or_default());
        assert_eq!(14, random.len());
        assert!(random[..10].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(path, generate_object_path("covers", "png"));
    }

    #[test]
    fn test_safe_redirect() {
        assert_eq!("/news", safe_redirect(Some("/news")));
        assert_eq!("/", safe_redirect(Some("//evil.example")));
        assert_eq!("/", safe_redirect(Some("https://evil.example")));
        assert_eq!("/", safe_redirect(None));
    }
}
