//! Server rendered pages. Every page shares the header and footer components, and all forms
//! post to page routes which redirect back to html.

use crate::{
    backend::{
        api::{
            account::{authenticate, clear_login, sign_in},
            article::{
                can_publish,
                save_article_edit,
                save_new_article,
                user_can_edit,
                LATEST_COUNT,
            },
            UserExt,
        },
        database::{article::ArticleListQuery, GlitchContext},
        render::{
            article::{
                article_link,
                article_meta,
                last_edited_text,
                time_ago,
                ArticleBody,
                ArticleCard,
                ArticleNotFound,
                LatestArticles,
                TagCloud,
            },
            images::lazy_load_images,
        },
        utils::{error::BackendResult, safe_redirect},
    },
    common::{
        article::{aggregate_tags, parse_tags, Article, ArticleInput, ListArticlesParams},
        newtypes::ArticleId,
        notifications::{MarkAsReadParams, Notification},
        user::{Account, LoginParams},
    },
};
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use axum_macros::debug_handler;
use chrono::Utc;
use http::{header::ACCEPT, HeaderMap, StatusCode};
use leptos::prelude::*;
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

const CSS: &str = include_str!("../../../assets/glitchrealm.css");

pub(super) fn page_routes() -> Router<Arc<GlitchContext>> {
    Router::new()
        .route("/", get(home))
        .route("/news", get(news))
        .route("/news/article", get(news_article))
        .route("/news/publish", get(publish).post(publish_submit))
        .route("/notifications", get(notifications))
        .route("/notifications/read", post(notifications_read))
        .route("/signin", get(signin).post(signin_submit))
        .route("/signout", post(signout))
        .route("/assets/glitchrealm.css", get(css))
}

async fn css() -> impl IntoResponse {
    ([(http::header::CONTENT_TYPE, "text/css")], CSS)
}

#[component]
fn SiteHeader(user: Option<Account>, unread: i64) -> impl IntoView {
    let account = match user {
        Some(user) => view! {
            <span class="account-name">{user.name()}</span>
            <form method="post" action="/signout">
                <button type="submit">"Sign Out"</button>
            </form>
        }
        .into_any(),
        None => view! {
            <a href="/signin" class="signin-link">
                "Sign In"
            </a>
        }
        .into_any(),
    };
    let no_unread = unread <= 0;
    view! {
        <header class="site-header">
            <a href="/" class="site-logo">
                "GlitchRealm"
            </a>
            <nav class="site-nav">
                <a href="/">"Home"</a>
                <a href="/news">"News"</a>
                <a href="/news/publish">"Publish"</a>
                <a href="/notifications" class="notifications-link">
                    "Notifications"
                    <span
                        class="notification-badge"
                        data-count=unread.to_string()
                        hidden=no_unread
                    >
                        {unread.to_string()}
                    </span>
                </a>
            </nav>
            <div class="site-account">{account}</div>
        </header>
    }
}

#[component]
fn SiteFooter() -> impl IntoView {
    view! {
        <footer class="site-footer">
            <nav>
                <a href="/news">"News"</a>
                <a href="/notifications">"Notifications"</a>
            </nav>
            <p>"© GlitchRealm. All rights reserved."</p>
        </footer>
    }
}

fn layout(
    title: &str,
    body: impl IntoView + 'static,
    user: Option<&Account>,
    context: &GlitchContext,
) -> Html<String> {
    let unread = Notification::count_unread(context)
        .inspect_err(|e| warn!("Failed to read unread count: {e}"))
        .unwrap_or(0);
    let title = format!("{title} | GlitchRealm");
    let user = user.cloned();
    let page = view! {
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <title>{title}</title>
                <link rel="stylesheet" href="/assets/glitchrealm.css" />
            </head>
            <body>
                <SiteHeader user=user unread=unread />
                <main>{body}</main>
                <SiteFooter />
            </body>
        </html>
    };
    Html(format!("<!DOCTYPE html>{}", lazy_load_images(&page.to_html())))
}

fn accept_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACCEPT)
        .and_then(|h| h.to_str().ok())
        .map(ToString::to_string)
}

#[derive(Deserialize)]
struct HomeParams {
    #[serde(rename = "passwordChanged")]
    password_changed: Option<String>,
}

#[debug_handler]
async fn home(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    Query(params): Query<HomeParams>,
) -> Html<String> {
    let password_changed = params.password_changed.as_deref() == Some("1");
    let body = view! {
        {password_changed
            .then(|| view! { <div class="toast">"Your password was changed successfully."</div> })}
        <section class="hero">
            <h1>"Welcome to GlitchRealm"</h1>
            <p>"Games, news and a community of players."</p>
            <a href="/news">"Read the latest news"</a>
        </section>
    };
    layout("Home", body, user.as_deref(), &context)
}

#[debug_handler]
async fn news(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    headers: HeaderMap,
    Query(query): Query<ListArticlesParams>,
) -> BackendResult<Html<String>> {
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let tag = query.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let list_query = ArticleListQuery {
        category,
        tag,
        limit: context.conf.options.max_articles_listed.max(1),
    };
    let articles = Article::list_published(&list_query, &context)?;
    let latest = Article::latest_titles(LATEST_COUNT, &context)?;
    let tags = Article::published_tags(&context)?;
    let tags = aggregate_tags(tags.iter().map(Vec::as_slice));

    let filter = category.or(tag).map(ToString::to_string);
    let accept = accept_header(&headers);
    let empty = articles.is_empty();
    let body = view! {
        <div class="news-layout">
            <section class="news-list">
                {filter
                    .map(|filter| {
                        view! {
                            <p class="news-filter">
                                "Showing " <strong>{filter}</strong> <a href="/news">"Clear"</a>
                            </p>
                        }
                    })}
                {empty
                    .then(|| {
                        view! {
                            <div class="empty-state">
                                <h2>"No articles yet"</h2>
                            </div>
                        }
                    })}
                {articles
                    .into_iter()
                    .map(|article| view! { <ArticleCard article=article accept=accept.clone() /> })
                    .collect::<Vec<_>>()}
            </section>
            <aside>
                <h3>"Latest"</h3>
                <LatestArticles titles=latest />
                <h3>"Tags"</h3>
                <TagCloud tags=tags />
            </aside>
        </div>
    };
    Ok(layout("News", body, user.as_deref(), &context))
}

#[derive(Deserialize)]
struct ArticlePageParams {
    id: Option<i32>,
}

/// Missing, unknown and draft articles all show the same not found state.
#[debug_handler]
async fn news_article(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    headers: HeaderMap,
    Query(params): Query<ArticlePageParams>,
) -> Response {
    let user = user.as_deref();
    let article = params
        .id
        .and_then(|id| Article::read(ArticleId(id), &context).ok())
        .filter(|a| !a.draft || user.is_some_and(|u| user_can_edit(u, a, &context)));
    let Some(article) = article else {
        return (
            StatusCode::NOT_FOUND,
            layout("Article Not Found", view! { <ArticleNotFound /> }, user, &context),
        )
            .into_response();
    };
    let title = article.title.clone();
    let meta = article_meta(&article);
    let edited = last_edited_text(&article, Utc::now());
    let accept = accept_header(&headers);
    let body = view! {
        <article class="news-article">
            <h1>{title.clone()}</h1>
            {meta}
            {edited.map(|e| view! { <p class="article-edited">{e}</p> })}
            <ArticleBody article=article accept=accept />
        </article>
    };
    layout(&title, body, user, &context).into_response()
}

#[component]
fn PublishForm(
    editing: Option<ArticleId>,
    input: ArticleInput,
    #[prop(optional)] error: Option<String>,
) -> impl IntoView {
    let heading = if editing.is_some() {
        "Edit Article"
    } else {
        "Publish Article"
    };
    let categories = input.categories.join(", ");
    let cover = input.cover_image_url.unwrap_or_default();
    let embed = input.embed.unwrap_or_default();
    view! {
        <h1>{heading}</h1>
        {error.map(|e| view! { <p class="form-error">{e}</p> })}
        <form class="publish-form" method="post" action="/news/publish">
            {editing.map(|id| view! { <input type="hidden" name="id" value=id.0.to_string() /> })}
            <label>
                "Title" <input name="title" maxlength="200" required=true value=input.title />
            </label>
            <label>
                "Summary"
                <textarea name="summary" maxlength="500" required=true>
                    {input.summary}
                </textarea>
            </label>
            <label>
                "Content" <textarea name="content" rows="20" required=true>
                    {input.content}
                </textarea>
            </label>
            <label>"Categories" <input name="categories" value=categories /></label>
            <label>"Tags" <input name="tags" value=input.tags /></label>
            <label>"Cover image" <input name="cover_image_url" value=cover /></label>
            <label>"Embed" <input name="embed" value=embed /></label>
            <label>
                <input type="checkbox" name="draft" value="true" checked=input.draft />
                " Save as draft"
            </label>
            <button type="submit">"Save"</button>
        </form>
    }
}

/// Flat fields of the publish form. Lists and nested sources are not part of the form, so an
/// edit keeps those of the stored article.
#[derive(Deserialize)]
struct ArticleForm {
    id: Option<i32>,
    title: String,
    summary: String,
    content: String,
    #[serde(default)]
    categories: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    cover_image_url: String,
    #[serde(default)]
    embed: String,
    /// Checkboxes are only sent when checked
    draft: Option<String>,
}

impl ArticleForm {
    fn into_input(self, base: ArticleInput) -> ArticleInput {
        let non_empty = |s: String| Some(s).filter(|s| !s.trim().is_empty());
        ArticleInput {
            title: self.title,
            summary: self.summary,
            content: self.content,
            categories: parse_tags(&self.categories),
            tags: self.tags,
            cover_image_url: non_empty(self.cover_image_url),
            embed: non_empty(self.embed),
            draft: self.draft.is_some(),
            ..base
        }
    }
}

#[derive(Deserialize)]
struct PublishParams {
    edit: Option<i32>,
}

/// Publish form, prefilled with an existing article when editing it is permitted.
#[debug_handler]
async fn publish(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    Query(params): Query<PublishParams>,
) -> Response {
    let Some(user) = user.map(UserExt::inner) else {
        return Redirect::to("/signin?redirect=/news/publish").into_response();
    };
    if !can_publish(&user, &context) {
        let body = view! {
            <div class="empty-state">
                <h2>"You must be a verified writer to publish articles"</h2>
                <p>"Apply for writer verification from your profile."</p>
            </div>
        };
        return (StatusCode::FORBIDDEN, layout("Publish", body, Some(&user), &context))
            .into_response();
    }
    let editing = params
        .edit
        .and_then(|id| Article::read(ArticleId(id), &context).ok())
        .filter(|a| user_can_edit(&user, a, &context));
    let input = editing.as_ref().map(ArticleInput::from).unwrap_or_default();
    let editing = editing.map(|a| a.id);
    let body = view! { <PublishForm editing=editing input=input /> };
    layout("Publish", body, Some(&user), &context).into_response()
}

/// Creates or edits an article from the publish form, then shows it.
#[debug_handler]
async fn publish_submit(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    Form(form): Form<ArticleForm>,
) -> Response {
    let Some(user) = user.map(UserExt::inner) else {
        return Redirect::to("/signin?redirect=/news/publish").into_response();
    };
    let editing = form.id.map(ArticleId);
    let base = match editing {
        Some(id) => Article::read(id, &context).map(|a| ArticleInput::from(&a)),
        None => Ok(ArticleInput::default()),
    };
    let base = match base {
        Ok(base) => base,
        Err(e) => {
            let body = view! { <ArticleNotFound /> };
            return (e.status, layout("Publish", body, Some(&user), &context)).into_response();
        }
    };
    let input = form.into_input(base);
    let saved = match editing {
        Some(id) => save_article_edit(&user, id, &input, &context),
        None => save_new_article(&user, &input, &context),
    };
    match saved {
        Ok(article) => Redirect::to(&article_link(article.id)).into_response(),
        Err(e) => {
            let error = e.to_string();
            let body = view! { <PublishForm editing=editing input=input error=error /> };
            (e.status, layout("Publish", body, Some(&user), &context)).into_response()
        }
    }
}

#[component]
fn NotificationList(notifications: Vec<Notification>, signed_in: bool) -> impl IntoView {
    if notifications.is_empty() {
        return view! {
            <div class="empty-state">
                <h2>"No notifications"</h2>
            </div>
        }
        .into_any();
    }
    let now = Utc::now();
    let any_unread = notifications.iter().any(|n| !n.read);
    let mark_all = (signed_in && any_unread).then(|| {
        view! {
            <form method="post" action="/notifications/read" class="mark-all">
                <button type="submit">"Mark all as read"</button>
            </form>
        }
    });
    let items = notifications
        .into_iter()
        .map(|n| {
            let class = if n.read {
                "notification read"
            } else {
                "notification unread"
            };
            let created = n.created.to_rfc3339();
            let ago = time_ago(n.created, now);
            let id = n.id.0.to_string();
            let mark = (signed_in && !n.read).then(|| {
                view! {
                    <form method="post" action="/notifications/read">
                        <input type="hidden" name="id" value=id />
                        <button type="submit">"Mark as read"</button>
                    </form>
                }
            });
            view! {
                <li class=class data-priority=n.priority.as_str()>
                    <h3>{n.title}</h3>
                    <p>{n.body}</p>
                    <time datetime=created>{ago}</time>
                    {mark}
                </li>
            }
        })
        .collect::<Vec<_>>();
    view! {
        {mark_all}
        <ul class="notification-list">{items}</ul>
    }
    .into_any()
}

/// The feed is public, marking entries as read needs a login.
#[debug_handler]
async fn notifications(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
) -> BackendResult<Html<String>> {
    let notifications = Notification::list(&context)?;
    let signed_in = user.is_some();
    let body = view! {
        <h1>"Notifications"</h1>
        <NotificationList notifications=notifications signed_in=signed_in />
    };
    Ok(layout("Notifications", body, user.as_deref(), &context))
}

#[debug_handler]
async fn notifications_read(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    Form(params): Form<MarkAsReadParams>,
) -> BackendResult<Redirect> {
    if user.is_none() {
        return Ok(Redirect::to("/signin?redirect=/notifications"));
    }
    Notification::mark_as_read(params.id, &context)?;
    Ok(Redirect::to("/notifications"))
}

#[derive(Deserialize)]
struct SigninParams {
    redirect: Option<String>,
}

#[component]
fn SigninForm(redirect: String, #[prop(optional)] error: Option<String>) -> impl IntoView {
    view! {
        <h1>"Sign In"</h1>
        {error.map(|e| view! { <p class="form-error">{e}</p> })}
        <form method="post" action="/signin">
            <input type="hidden" name="redirect" value=redirect />
            <label>"Username" <input name="username" required=true /></label>
            <label>"Password" <input type="password" name="password" required=true /></label>
            <button type="submit">"Sign In"</button>
        </form>
    }
}

#[debug_handler]
async fn signin(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    Query(params): Query<SigninParams>,
) -> Html<String> {
    let redirect = safe_redirect(params.redirect.as_deref());
    let body = view! { <SigninForm redirect=redirect /> };
    layout("Sign In", body, user.as_deref(), &context)
}

#[derive(Deserialize)]
struct SigninSubmit {
    username: String,
    password: String,
    redirect: Option<String>,
}

/// Sign-in without scripts. Redirects to the given same-site path on success.
#[debug_handler]
async fn signin_submit(
    State(context): State<Arc<GlitchContext>>,
    jar: CookieJar,
    Form(form): Form<SigninSubmit>,
) -> Response {
    let redirect = safe_redirect(form.redirect.as_deref());
    let params = LoginParams {
        username: form.username,
        password: form.password,
    };
    let signed_in = authenticate(&params, &context)
        .and_then(|account| sign_in(&account, jar, &context));
    match signed_in {
        Ok(jar) => (jar, Redirect::to(&redirect)).into_response(),
        Err(e) => {
            let error = e.to_string();
            let body = view! { <SigninForm redirect=redirect error=error /> };
            (e.status, layout("Sign In", body, None, &context)).into_response()
        }
    }
}

/// Sign-out form in the header. Also works without a valid login, so a stale cookie can be
/// cleared.
#[debug_handler]
async fn signout(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    jar: CookieJar,
) -> impl IntoResponse {
    let jar = clear_login(user.as_deref(), jar, &context);
    (jar, Redirect::to("/"))
}
