#![expect(clippy::unwrap_used)]

mod common;

use axum::{body::Body, http::Request};
use chrono::{Duration, Utc};
use common::{body_text, login_cookie, send, TestDb};
use diesel::{sql_query, sql_types::Integer, RunQueryDsl};
use glitchrealm::{
    backend::database::{
        account::delete_idle_anonymous,
        article::{ArticleInsertForm, ArticleListQuery},
        notification::NotificationInsertForm,
        report::{sweep_expired_reports, ReportInsertForm},
        verification::VerificationDecisionForm,
        verified::VerifiedWriterForm,
    },
    common::{
        article::{Article, ArticleLinks, SocialLinks, Sources},
        moderation::{
            CreateVerificationParams,
            Report,
            ReportSource,
            ReportStatus,
            VerificationKind,
            VerificationRequest,
            VerificationStatus,
            VerifiedWriter,
        },
        notifications::Notification,
        user::Account,
    },
};
use http::{
    header::{CONTENT_TYPE, COOKIE, LOCATION},
    StatusCode,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::ops::DerefMut;

const FORM: &str = "application/x-www-form-urlencoded";
const PASSWORD: &str = "hunter2hunter2";

/// Registers a verified writer and returns its login cookie.
async fn writer_login(db: &TestDb, username: &str) -> anyhow::Result<String> {
    let account =
        Account::create_local(username.to_string(), PASSWORD, None, None, &db.context).unwrap();
    let form = VerifiedWriterForm {
        uid: account.uid,
        verified: true,
        display_name: None,
        notes: None,
        verified_at: Utc::now(),
        verified_by: None,
    };
    VerifiedWriter::upsert(&form, &db.context).unwrap();

    let req = Request::post("/api/v1/account/login")
        .header(CONTENT_TYPE, FORM)
        .body(Body::from(format!("username={username}&password={PASSWORD}")))?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::OK, res.status());
    Ok(login_cookie(&res).unwrap())
}

fn location(res: &axum::response::Response) -> Option<&str> {
    res.headers().get(LOCATION).and_then(|h| h.to_str().ok())
}

#[tokio::test]
async fn test_sweep_expired_reports() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let context = &db.context;
    let reporter = Account::create_anonymous(context).unwrap();
    let form = |target: &str| ReportInsertForm {
        source: ReportSource::Game,
        target_id: target.to_string(),
        reporter_uid: reporter.uid.clone(),
        reason: "spam".to_string(),
    };
    let open = Report::create(&form("open"), context).unwrap();
    let closed = Report::create(&form("closed"), context).unwrap();
    let legacy = Report::create(&form("legacy"), context).unwrap();
    let closed = Report::update_status(closed.id, ReportStatus::Closed, context).unwrap();
    assert!(closed.expires_at.is_some());
    Report::update_status(legacy.id, ReportStatus::Closed, context).unwrap();

    let mut conn = context.db_pool.get()?;
    sql_query("update report set expires_at = null where id = $1")
        .bind::<Integer, _>(legacy.id.0)
        .execute(conn.deref_mut())?;

    let ttl = context.conf.moderation.report_ttl_hours;
    let (deleted, backfilled) = sweep_expired_reports(conn.deref_mut(), ttl, Utc::now())?;
    assert_eq!((0, 1), (deleted, backfilled));

    let later = Utc::now() + Duration::hours(ttl + 1);
    let (deleted, backfilled) = sweep_expired_reports(conn.deref_mut(), ttl, later)?;
    assert_eq!((2, 0), (deleted, backfilled));
    drop(conn);

    let remaining = Report::list(ReportSource::Game, context).unwrap();
    assert_eq!(1, remaining.len());
    assert_eq!(open.id, remaining[0].id);

    // Reopening cancels the countdown
    let reopened = Report::update_status(open.id, ReportStatus::Open, context).unwrap();
    assert_eq!(None, reopened.expires_at);
    Ok(())
}

#[tokio::test]
async fn test_verification_resubmit() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let context = &db.context;
    let account =
        Account::create_local("applicant".to_string(), PASSWORD, None, None, context).unwrap();
    let params = CreateVerificationParams {
        kind: VerificationKind::Writer,
        display_name: " Applicant ".to_string(),
        message: Some("I write about games".to_string()),
        links: vec!["https://example.com/portfolio".to_string()],
    };
    let decide = |status| VerificationDecisionForm {
        status,
        rejection_reason: Some("Not enough samples".to_string()),
        decided_at: Some(Utc::now()),
        reviewer_id: None,
    };

    let request = VerificationRequest::submit(&account.uid, None, &params, context).unwrap();
    assert_eq!(VerificationStatus::Pending, request.status);
    assert_eq!("Applicant", request.display_name);

    // Pending requests cant be submitted again
    let err = VerificationRequest::submit(&account.uid, None, &params, context).unwrap_err();
    assert_eq!(StatusCode::BAD_REQUEST, err.status);

    // Refused requests can, and the resubmission resets the decision
    VerificationRequest::decide(
        &account.uid,
        VerificationKind::Writer,
        &decide(VerificationStatus::Rejected),
        context,
    )
    .unwrap();
    let request = VerificationRequest::submit(&account.uid, None, &params, context).unwrap();
    assert_eq!(VerificationStatus::Pending, request.status);
    assert_eq!(None, request.rejection_reason);

    VerificationRequest::decide(
        &account.uid,
        VerificationKind::Writer,
        &decide(VerificationStatus::Approved),
        context,
    )
    .unwrap();
    let err = VerificationRequest::submit(&account.uid, None, &params, context).unwrap_err();
    assert_eq!(StatusCode::BAD_REQUEST, err.status);

    // The user badge is requested independently
    let user_params = CreateVerificationParams {
        kind: VerificationKind::User,
        ..params
    };
    VerificationRequest::submit(&account.uid, None, &user_params, context).unwrap();
    Ok(())
}

fn strings(s: &[&str]) -> Vec<String> {
    s.iter().map(ToString::to_string).collect()
}

fn article_form(
    author: &Account,
    title: &str,
    categories: &[&str],
    tags: &[&str],
    published_hours_ago: Option<i64>,
) -> ArticleInsertForm {
    ArticleInsertForm {
        title: title.to_string(),
        summary: "Summary".to_string(),
        content: "Content".to_string(),
        categories: strings(categories),
        tags: strings(tags),
        cover_image_url: None,
        embed: None,
        links: ArticleLinks(vec![]),
        social_links: SocialLinks(vec![]),
        sources: Sources(vec![]),
        citation_format: None,
        author_uid: author.uid.clone(),
        author_username: author.name(),
        author_verified: true,
        draft: published_hours_ago.is_none(),
        published: published_hours_ago.map(|h| Utc::now() - Duration::hours(h)),
    }
}

#[tokio::test]
async fn test_article_filters() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let context = &db.context;
    let author = Account::create_local("author".to_string(), PASSWORD, None, None, context).unwrap();
    let patch = Article::create(
        &article_form(&author, "Patch", &["Games", "Updates"], &["rpg", "patch"], Some(1)),
        context,
    )
    .unwrap();
    let review = Article::create(
        &article_form(&author, "Review", &["Games"], &["rpg"], Some(5)),
        context,
    )
    .unwrap();
    Article::create(
        &article_form(&author, "Draft", &["Updates"], &["rpg"], None),
        context,
    )
    .unwrap();

    let titles = |query: ArticleListQuery| -> Vec<String> {
        Article::list_published(&query, context)
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect()
    };
    let query = |category, tag| ArticleListQuery {
        category,
        tag,
        limit: 10,
    };

    assert_eq!(vec!["Patch", "Review"], titles(query(None, None)));
    assert_eq!(vec!["Patch"], titles(query(Some("Updates"), None)));
    assert_eq!(vec!["Patch", "Review"], titles(query(None, Some("rpg"))));
    assert_eq!(vec!["Patch"], titles(query(Some("Games"), Some("patch"))));
    assert!(titles(query(None, Some("rp"))).is_empty());
    assert!(titles(query(Some("games"), None)).is_empty());

    let latest = Article::latest_titles(1, context).unwrap();
    assert_eq!(patch.id, latest[0].id);
    let tags = Article::published_tags(context).unwrap();
    assert_eq!(2, tags.len());
    assert!(tags.contains(&review.tags));
    Ok(())
}

#[tokio::test]
async fn test_delete_idle_anonymous() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let context = &db.context;
    let anonymous = Account::create_anonymous(context).unwrap();
    let registered =
        Account::create_local("regular".to_string(), PASSWORD, None, None, context).unwrap();
    let params = CreateVerificationParams {
        kind: VerificationKind::User,
        display_name: "Guest".to_string(),
        message: None,
        links: vec![],
    };
    VerificationRequest::submit(&anonymous.uid, None, &params, context).unwrap();

    let ttl = context.conf.moderation.anonymous_session_ttl_hours;
    let mut conn = context.db_pool.get()?;
    assert_eq!(0, delete_idle_anonymous(conn.deref_mut(), ttl, Utc::now())?);

    let later = Utc::now() + Duration::hours(ttl + 1);
    assert_eq!(1, delete_idle_anonymous(conn.deref_mut(), ttl, later)?);
    drop(conn);

    let err = Account::read(&anonymous.uid, context).unwrap_err();
    assert_eq!(StatusCode::NOT_FOUND, err.status);
    let request = VerificationRequest::read(&anonymous.uid, VerificationKind::User, context);
    assert_eq!(None, request.unwrap());
    assert_eq!(registered, Account::read(&registered.uid, context).unwrap());
    Ok(())
}

#[tokio::test]
async fn test_publish_and_edit_article() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let cookie = writer_login(&db, "writer").await?;
    let article_request = |method: &str, body: serde_json::Value| {
        Request::builder()
            .method(method)
            .uri("/api/v1/article")
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, &cookie)
            .body(Body::from(body.to_string()))
    };

    // Drafts have no publish time and are hidden from others
    let req = article_request(
        "POST",
        json!({"title": "Patch notes", "summary": "What changed", "content": "Body", "draft": true}),
    )?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::OK, res.status());
    let draft: Article = serde_json::from_str(&body_text(res).await?)?;
    assert!(draft.draft);
    assert_eq!(None, draft.published);
    assert_eq!("writer", draft.author_username);

    let uri = format!("/news/article?id={}", draft.id.0);
    let res = send(db.app(), Request::get(&uri).body(Body::empty())?).await?;
    assert_eq!(StatusCode::NOT_FOUND, res.status());
    let req = Request::get(&uri).header(COOKIE, &cookie).body(Body::empty())?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::OK, res.status());

    // The first save without draft sets the publish time
    let req = article_request(
        "PATCH",
        json!({"id": draft.id, "title": "Patch notes", "summary": "What changed", "content": "Body"}),
    )?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::OK, res.status());
    let published: Article = serde_json::from_str(&body_text(res).await?)?;
    let published_at = published.published.unwrap();
    assert!(!published.draft);

    // Later edits never move it, even when going back to draft
    let req = article_request(
        "PATCH",
        json!({"id": draft.id, "title": "Patch notes v2", "summary": "What changed", "content": "Body"}),
    )?;
    let res = send(db.app(), req).await?;
    let edited: Article = serde_json::from_str(&body_text(res).await?)?;
    assert_eq!(Some(published_at), edited.published);
    assert!(edited.last_edited.unwrap() > published_at);

    let req = article_request(
        "PATCH",
        json!({"id": draft.id, "title": "Patch notes v2", "summary": "What changed", "content": "Body", "draft": true}),
    )?;
    let res = send(db.app(), req).await?;
    let redrafted: Article = serde_json::from_str(&body_text(res).await?)?;
    assert!(redrafted.draft);
    assert_eq!(Some(published_at), redrafted.published);

    // Only verified writers and developers can publish
    Account::create_local("reader".to_string(), PASSWORD, None, None, &db.context).unwrap();
    let req = Request::post("/api/v1/account/login")
        .header(CONTENT_TYPE, FORM)
        .body(Body::from(format!("username=reader&password={PASSWORD}")))?;
    let reader_cookie = login_cookie(&send(db.app(), req).await?).unwrap();
    let req = Request::post("/api/v1/article")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, &reader_cookie)
        .body(Body::from(
            json!({"title": "Nope", "summary": "S", "content": "C"}).to_string(),
        ))?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::FORBIDDEN, res.status());
    Ok(())
}

#[tokio::test]
async fn test_publish_form() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let cookie = writer_login(&db, "formwriter").await?;
    let form_request = |body: &str| {
        Request::post("/news/publish")
            .header(CONTENT_TYPE, FORM)
            .header(COOKIE, &cookie)
            .body(Body::from(body.to_string()))
    };

    let req = form_request(
        "title=Season+one&summary=New+season&content=Details&categories=News%2C+Games&tags=season%2C+launch",
    )?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::SEE_OTHER, res.status());
    let target = location(&res).unwrap().to_string();
    let id: i32 = target.trim_start_matches("/news/article?id=").parse()?;
    let article = Article::read(glitchrealm::common::newtypes::ArticleId(id), &db.context).unwrap();
    assert_eq!(vec!["News", "Games"], article.categories);
    assert_eq!(vec!["season", "launch"], article.tags);
    let published_at = article.published.unwrap();

    let res = send(db.app(), Request::get(&target).body(Body::empty())?).await?;
    assert_eq!(StatusCode::OK, res.status());
    let html = body_text(res).await?;
    assert!(html.contains("<h1>Season one</h1>"));

    // Editing through the form keeps the publish time
    let req = form_request(&format!(
        "id={id}&title=Season+one+recap&summary=New+season&content=Details&draft=true"
    ))?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::SEE_OTHER, res.status());
    let article = Article::read(article.id, &db.context).unwrap();
    assert_eq!("Season one recap", article.title);
    assert!(article.draft);
    assert_eq!(Some(published_at), article.published);

    // Invalid input shows the form again with the error
    let res = send(db.app(), form_request("title=&summary=S&content=C")?).await?;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    let html = body_text(res).await?;
    assert!(html.contains(r#"<p class="form-error">Title is required</p>"#));
    assert!(html.contains(r#"action="/news/publish""#));
    Ok(())
}

#[tokio::test]
async fn test_notifications_page() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let cookie = writer_login(&db, "reader").await?;
    let form = NotificationInsertForm {
        title: "Server maintenance".to_string(),
        body: "Tonight".to_string(),
        kind: "announcement".to_string(),
        priority: Default::default(),
    };
    let notification = Notification::create(&form, &db.context).unwrap();

    let res = send(db.app(), Request::get("/notifications").body(Body::empty())?).await?;
    assert_eq!(StatusCode::OK, res.status());
    let html = body_text(res).await?;
    assert!(html.contains("Server maintenance"));
    assert!(html.contains(r#"data-count="1""#));
    // Marking as read needs a login
    assert!(!html.contains("Mark as read"));

    let req = Request::post("/notifications/read")
        .header(CONTENT_TYPE, FORM)
        .header(COOKIE, &cookie)
        .body(Body::from(format!("id={}", notification.id.0)))?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::SEE_OTHER, res.status());
    assert_eq!(Some("/notifications"), location(&res));
    assert_eq!(0, Notification::count_unread(&db.context).unwrap());
    Ok(())
}

#[tokio::test]
async fn test_signout_page() -> anyhow::Result<()> {
    let Some(db) = TestDb::start() else {
        return Ok(());
    };
    let cookie = writer_login(&db, "leaver").await?;
    let req = Request::get("/").header(COOKIE, &cookie).body(Body::empty())?;
    let html = body_text(send(db.app(), req).await?).await?;
    assert!(html.contains(r#"action="/signout""#));

    let req = Request::post("/signout").header(COOKIE, &cookie).body(Body::empty())?;
    let res = send(db.app(), req).await?;
    assert_eq!(StatusCode::SEE_OTHER, res.status());
    assert_eq!(Some("/"), location(&res));
    let removed = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .any(|c| c.starts_with("auth=;"));
    assert!(removed);
    Ok(())
}
