use super::{
    access::Owned,
    newtypes::{ArticleId, Uid},
    utils::{jsonb_type, text_enum},
};
use crate::backend::database::schema::article;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::FromSqlRow,
    expression::AsExpression,
    sql_types::{Jsonb, Text},
    Queryable,
    Selectable,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of tags kept for a single article.
pub const MAX_TAGS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum CitationFormat {
    Apa,
    Mla,
    #[default]
    Simple,
}

text_enum!(CitationFormat {
    Apa => "apa",
    Mla => "mla",
    Simple => "simple",
});

/// A cited source, rendered according to the article's [CitationFormat].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub author: Option<String>,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub accessed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct Sources(pub Vec<Source>);
jsonb_type!(Sources);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct ArticleLinks(pub Vec<ArticleLink>);
jsonb_type!(ArticleLinks);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct SocialLinks(pub Vec<SocialLink>);
jsonb_type!(SocialLinks);

/// A news article. Drafts are only visible to those who can edit them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = article, check_for_backend(diesel::pg::Pg))]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub embed: Option<String>,
    pub links: ArticleLinks,
    pub social_links: SocialLinks,
    pub sources: Sources,
    pub citation_format: Option<CitationFormat>,
    pub author_uid: Uid,
    pub author_username: String,
    pub author_verified: bool,
    pub draft: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub published: Option<DateTime<Utc>>,
    pub last_edited: Option<DateTime<Utc>>,
}

impl Owned for Article {
    fn owner(&self) -> &Uid {
        &self.author_uid
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArticleView {
    pub article: Article,
    /// Rendered article body including embed, citations and links
    pub html: String,
    pub can_edit: bool,
}

/// Title of a recently published article, for the "latest" sidebar.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Queryable)]
pub struct ArticleTitle {
    pub id: ArticleId,
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Count how often each tag is used, most frequent first. Ties are ordered alphabetically so
/// the result is stable.
pub fn aggregate_tags<'a, I>(tag_lists: I) -> Vec<TagCount>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tags in tag_lists {
        for t in tags {
            *counts.entry(t.as_str()).or_default() += 1;
        }
    }
    let mut counts: Vec<_> = counts
        .into_iter()
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    counts
}

/// Split comma separated tag input, dropping empty entries.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .take(MAX_TAGS)
        .collect()
}

/// The first save without `draft` sets the publish time. Later saves, including saving as
/// draft again, never change or clear it.
pub fn resolve_published_at(
    previous: Option<DateTime<Utc>>,
    draft: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match previous {
        Some(p) => Some(p),
        None if !draft => Some(now),
        None => None,
    }
}

/// User provided article content, shared by create and edit.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ArticleInput {
    pub title: String,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Comma separated
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub embed: Option<String>,
    #[serde(default)]
    pub links: Vec<ArticleLink>,
    #[serde(default)]
    pub social_links: Vec<SocialLink>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub citation_format: Option<CitationFormat>,
    #[serde(default)]
    pub draft: bool,
}

/// Prefills the publish form when editing.
impl From<&Article> for ArticleInput {
    fn from(article: &Article) -> Self {
        ArticleInput {
            title: article.title.clone(),
            summary: article.summary.clone(),
            content: article.content.clone(),
            categories: article.categories.clone(),
            tags: article.tags.join(", "),
            cover_image_url: article.cover_image_url.clone(),
            embed: article.embed.clone(),
            links: article.links.0.clone(),
            social_links: article.social_links.0.clone(),
            sources: article.sources.0.clone(),
            citation_format: article.citation_format,
            draft: article.draft,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EditArticleParams {
    pub id: ArticleId,
    #[serde(flatten)]
    pub input: ArticleInput,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GetArticleParams {
    pub id: ArticleId,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ListArticlesParams {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PreviewParams {
    pub text: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct UploadParams {
    pub file_name: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct UploadResponse {
    pub url: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn tags(t: &[&str]) -> Vec<String> {
        t.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_aggregate_tags() {
        let lists = [tags(&["a", "b"]), tags(&["b", "c"]), tags(&["b"])];
        let counts = aggregate_tags(lists.iter().map(Vec::as_slice));
        let counts: Vec<_> = counts.iter().map(|c| (c.tag.as_str(), c.count)).collect();
        assert_eq!(vec![("b", 3), ("a", 1), ("c", 1)], counts);
    }

    #[test]
    fn test_aggregate_tags_empty() {
        let lists: [Vec<String>; 0] = [];
        assert!(aggregate_tags(lists.iter().map(Vec::as_slice)).is_empty());
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(tags(&["rust", "games"]), parse_tags(" rust, ,games ,"));
        let many = (0..40).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
        assert_eq!(MAX_TAGS, parse_tags(&many).len());
    }

    #[test]
    fn test_published_at_set_once() {
        let first = Utc::now();
        let later = first + Duration::hours(2);

        let published = resolve_published_at(None, false, first);
        assert_eq!(Some(first), published);

        // republishing keeps the original time
        assert_eq!(Some(first), resolve_published_at(published, false, later));
        // saving as draft does not clear it
        assert_eq!(Some(first), resolve_published_at(published, true, later));
    }

    #[test]
    fn test_draft_stays_unpublished() {
        assert_eq!(None, resolve_published_at(None, true, Utc::now()));
    }

    #[test]
    fn test_citation_format_parse() {
        assert_eq!(CitationFormat::Apa, "apa".parse().expect("parse"));
        assert!("harvard".parse::<CitationFormat>().is_err());
    }
}
