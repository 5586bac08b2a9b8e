//! Image loading hints: prefer WebP variants where the client supports them, and let the
//! browser load images lazily.

use regex::{Captures, Regex};
use std::sync::LazyLock;

const WEBP_SOURCE_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

pub fn accepts_webp(accept: Option<&str>) -> bool {
    accept.is_some_and(|a| {
        a.split(',')
            .any(|part| part.split(';').next().map(str::trim) == Some("image/webp"))
    })
}

/// Path of the WebP variant for png and jpeg images. Query strings and fragments are kept.
pub fn webp_variant(path: &str) -> Option<String> {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let (file, rest) = path.split_at(end);
    let lower = file.to_lowercase();
    let ext = WEBP_SOURCE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))?;
    let stem = &file[..file.len() - ext.len()];
    Some(format!("{stem}.webp{rest}"))
}

pub fn prefer_webp(path: &str, accept: Option<&str>) -> String {
    if accepts_webp(accept) {
        if let Some(webp) = webp_variant(path) {
            return webp;
        }
    }
    path.to_string()
}

/// Adds `loading="lazy"` and `decoding="async"` to image tags which dont set them yet.
pub fn lazy_load_images(html: &str) -> String {
    #[expect(clippy::expect_used)]
    static IMG_TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<img\b([^>]*?)(\s*/?)>").expect("compile regex"));

    IMG_TAG
        .replace_all(html, |caps: &Captures| {
            let attrs = &caps[1];
            let mut extra = String::new();
            if !attrs.contains("loading=") {
                extra.push_str(r#" loading="lazy""#);
            }
            if !attrs.contains("decoding=") {
                extra.push_str(r#" decoding="async""#);
            }
            format!("<img{attrs}{extra}{}>", &caps[2])
        })
        .into_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_webp() {
        assert!(accepts_webp(Some("image/avif,image/webp,*/*;q=0.8")));
        assert!(accepts_webp(Some("image/webp;q=0.9")));
        assert!(!accepts_webp(Some("image/png,*/*")));
        assert!(!accepts_webp(None));
    }

    #[test]
    fn test_webp_variant() {
        assert_eq!(Some("/a/cover.webp".to_string()), webp_variant("/a/cover.png"));
        assert_eq!(Some("x.webp?v=2".to_string()), webp_variant("x.JPEG?v=2"));
        assert_eq!(None, webp_variant("anim.gif"));
        assert_eq!(None, webp_variant("already.webp"));
    }

    #[test]
    fn test_prefer_webp() {
        assert_eq!("c.webp", prefer_webp("c.jpg", Some("image/webp")));
        assert_eq!("c.jpg", prefer_webp("c.jpg", Some("image/png")));
    }

    #[test]
    fn test_lazy_load_images() {
        assert_eq!(
            r#"<img src="a.png" loading="lazy" decoding="async">"#,
            lazy_load_images(r#"<img src="a.png">"#)
        );
        assert_eq!(
            r#"<img src="a.png" loading="eager" decoding="async" />"#,
            lazy_load_images(r#"<img src="a.png" loading="eager" />"#)
        );
        assert_eq!("<p>no images</p>", lazy_load_images("<p>no images</p>"));
    }
}
