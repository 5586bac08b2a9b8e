use super::{
    images::{lazy_load_images, prefer_webp},
    markdown::render_markdown,
};
use crate::common::{
    article::{Article, ArticleLink, ArticleTitle, CitationFormat, SocialLink, Source, TagCount},
    newtypes::ArticleId,
};
use chrono::{DateTime, Utc};
use leptos::prelude::*;
use std::sync::OnceLock;
use timeago::Formatter;
use url::Url;

/// Number of tags shown in the tag cloud.
pub const TAG_CLOUD_SIZE: usize = 30;

pub fn article_link(id: ArticleId) -> String {
    format!("/news/article?id={}", id.0)
}

/// Full article body as html, for api clients which render it themselves.
pub fn render_article(article: &Article, accept: Option<&str>) -> String {
    let html = view! {
        <ArticleBody article=article.clone() accept=accept.map(ToString::to_string) />
    }
    .to_html();
    lazy_load_images(&html)
}

/// Cover, embed, content, tags, sources and links of an article.
#[component]
pub fn ArticleBody(article: Article, accept: Option<String>) -> impl IntoView {
    let cover = cover_src(&article, accept.as_deref());
    let embed = article.embed.as_deref().and_then(embed_frame);
    let content = render_markdown(&article.content);
    let format = article.citation_format.unwrap_or_default();
    view! {
        {cover
            .map(|src| {
                view! {
                    <div class="article-cover">
                        <img src=src alt="Cover" />
                    </div>
                }
            })}
        {embed.map(|embed| view! { <div class="article-embed">{embed.frame()}</div> })}
        <div class="article-content" inner_html=content></div>
        <TagList tags=article.tags />
        <SourceList sources=article.sources.0 format=format />
        <RelatedLinks links=article.links.0 />
        <SocialLinkList links=article.social_links.0 />
    }
}

fn cover_src(article: &Article, accept: Option<&str>) -> Option<String> {
    article
        .cover_image_url
        .as_deref()
        .and_then(safe_url)
        .map(|cover| prefer_webp(&cover, accept))
}

/// `By {author} · Verified Writer · {categories} · {date}`, leaving out empty parts. The
/// separators come from the stylesheet.
pub fn article_meta(article: &Article) -> impl IntoView {
    let author = format!("By {}", article.author_username);
    let verified = article.author_verified;
    let categories = (!article.categories.is_empty()).then(|| article.categories.join(", "));
    let date = article.published.map(format_date);
    view! {
        <div class="article-meta">
            <span>{author}</span>
            {verified.then(|| view! { <span class="verified-badge">"Verified Writer"</span> })}
            {categories.map(|c| view! { <span class="article-categories">{c}</span> })}
            {date.map(|d| view! { <span class="article-date">{d}</span> })}
        </div>
    }
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%b %-d, %Y").to_string()
}

pub fn time_ago(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    static INSTANCE: OnceLock<Formatter> = OnceLock::new();
    let secs = now.signed_duration_since(time).num_seconds();
    let duration = std::time::Duration::from_secs(secs.try_into().unwrap_or_default());
    INSTANCE.get_or_init(Formatter::new).convert(duration)
}

/// `Edited 3 hours ago`, only for articles which were changed after publishing.
pub fn last_edited_text(article: &Article, now: DateTime<Utc>) -> Option<String> {
    let edited = article.last_edited?;
    if article.published.is_some_and(|p| edited <= p) {
        return None;
    }
    Some(format!("Edited {}", time_ago(edited, now)))
}

/// Only http(s) urls are rendered as links or media sources.
fn safe_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

pub fn youtube_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !(host.ends_with("youtube.com") || host.ends_with("youtu.be")) {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.to_string())
        .or_else(|| {
            url.path_segments()
                .and_then(|mut s| s.next_back())
                .map(ToString::to_string)
        })
        .filter(|id| !id.is_empty())
}

#[derive(Debug, PartialEq, Eq)]
pub enum EmbedFrame {
    YouTube { src: String },
    Page { src: String },
}

impl EmbedFrame {
    fn frame(self) -> impl IntoView {
        match self {
            EmbedFrame::YouTube { src } => view! { <iframe src=src></iframe> }
                .attr("frameborder", "0")
                .attr("allowfullscreen", true)
                .into_any(),
            EmbedFrame::Page { src } => view! { <iframe src=src></iframe> }
                .attr("frameborder", "0")
                .into_any(),
        }
    }
}

/// YouTube links become a player embed, other web pages a plain iframe. Anything else is
/// dropped.
pub fn embed_frame(url: &str) -> Option<EmbedFrame> {
    let url = Url::parse(&safe_url(url)?).ok()?;
    if let Some(id) = youtube_id(&url) {
        let mut src = Url::parse("https://www.youtube.com/embed/").ok()?;
        src.path_segments_mut().ok()?.pop_if_empty().push(&id);
        return Some(EmbedFrame::YouTube { src: src.into() });
    }
    Some(EmbedFrame::Page { src: url.into() })
}

#[component]
fn TagList(tags: Vec<String>) -> impl IntoView {
    (!tags.is_empty()).then(|| {
        view! {
            <div class="article-tags">
                {tags.into_iter().map(|t| view! { <span>{t}</span> }).collect::<Vec<_>>()}
            </div>
        }
    })
}

fn external_link(url: &str, text: String) -> impl IntoView {
    match safe_url(url) {
        Some(href) => view! {
            <a href=href target="_blank" rel="noopener">
                {text}
            </a>
        }
        .into_any(),
        None => view! { <span>{text}</span> }.into_any(),
    }
}

/// Text before and after the link of a citation. The simple format is rendered separately
/// with the title in bold.
pub fn citation_text(source: &Source, format: CitationFormat) -> (String, Option<String>) {
    let title = &source.title;
    match format {
        CitationFormat::Apa => {
            let author = source
                .author
                .as_deref()
                .map(|a| format!("{a} "))
                .unwrap_or_default();
            let year = source.year.as_deref().unwrap_or("n.d.");
            (format!("{author}({year}). {title}. "), None)
        }
        CitationFormat::Mla => {
            let mut before = String::new();
            if let Some(author) = &source.author {
                before.push_str(author.trim_end_matches('.'));
                before.push_str(". ");
            }
            before.push_str(&format!("\"{title}.\" "));
            for part in [&source.publisher, &source.year].into_iter().flatten() {
                before.push_str(part);
                before.push_str(", ");
            }
            let after = source.accessed.as_ref().map(|a| format!(". Accessed {a}"));
            (before, after)
        }
        CitationFormat::Simple => (format!("{title} - "), None),
    }
}

pub fn citation(source: Source, format: CitationFormat) -> impl IntoView {
    let link = external_link(&source.url, source.url.clone());
    if format == CitationFormat::Simple {
        return view! {
            <strong>{source.title}</strong>
            " - "
            {link}
        }
        .into_any();
    }
    let (before, after) = citation_text(&source, format);
    view! {
        {before}
        {link}
        {after}
    }
    .into_any()
}

#[component]
pub fn SourceList(sources: Vec<Source>, format: CitationFormat) -> impl IntoView {
    (!sources.is_empty()).then(|| {
        view! {
            <section class="article-sources">
                <h3>"Sources"</h3>
                <ol>
                    {sources
                        .into_iter()
                        .map(|s| view! { <li>{citation(s, format)}</li> })
                        .collect::<Vec<_>>()}
                </ol>
            </section>
        }
    })
}

#[component]
pub fn RelatedLinks(links: Vec<ArticleLink>) -> impl IntoView {
    (!links.is_empty()).then(|| {
        view! {
            <section class="article-links">
                <h3>"Related"</h3>
                <ul>
                    {links
                        .into_iter()
                        .map(|l| view! { <li>{external_link(&l.url, l.title)}</li> })
                        .collect::<Vec<_>>()}
                </ul>
            </section>
        }
    })
}

fn platform_label(platform: &str) -> String {
    let mut label = platform.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    label
}

#[component]
pub fn SocialLinkList(links: Vec<SocialLink>) -> impl IntoView {
    (!links.is_empty()).then(|| {
        view! {
            <ul class="article-social">
                {links
                    .into_iter()
                    .map(|l| {
                        view! { <li>{external_link(&l.url, platform_label(&l.platform))}</li> }
                    })
                    .collect::<Vec<_>>()}
            </ul>
        }
    })
}

/// Preview card for the article list.
#[component]
pub fn ArticleCard(article: Article, accept: Option<String>) -> impl IntoView {
    let cover = cover_src(&article, accept.as_deref());
    let meta = article_meta(&article);
    let Article {
        id,
        title,
        summary,
        tags,
        ..
    } = article;
    view! {
        <article class="article-card" data-id=id.0.to_string()>
            {cover
                .map(|src| {
                    view! {
                        <div class="article-card-media">
                            <img src=src alt="Cover" />
                        </div>
                    }
                })}
            {meta}
            <h2>{title}</h2>
            <p class="article-summary">{summary}</p>
            <TagList tags=tags />
            <a href=article_link(id) class="read-more">
                "Read More"
            </a>
        </article>
    }
}

#[component]
pub fn LatestArticles(titles: Vec<ArticleTitle>) -> impl IntoView {
    view! {
        <div class="latest-articles">
            {titles
                .into_iter()
                .map(|t| view! { <a href=article_link(t.id)>{t.title}</a> })
                .collect::<Vec<_>>()}
        </div>
    }
}

#[component]
pub fn TagCloud(tags: Vec<TagCount>) -> impl IntoView {
    view! {
        <div class="tag-cloud">
            {tags
                .into_iter()
                .take(TAG_CLOUD_SIZE)
                .map(|t| {
                    let query: String = url::form_urlencoded::Serializer::new(String::new())
                        .append_pair("tag", &t.tag)
                        .finish();
                    view! {
                        <a href=format!("/news?{query}") data-count=t.count.to_string()>
                            {t.tag}
                        </a>
                    }
                })
                .collect::<Vec<_>>()}
        </div>
    }
}

#[component]
pub fn ArticleNotFound() -> impl IntoView {
    view! {
        <div class="empty-state">
            <h2>"Article Not Found"</h2>
        </div>
    }
}
