use super::{check_is_developer, empty_to_none, UserExt};
use crate::{
    backend::{
        database::{
            article::{ArticleInsertForm, ArticleListQuery, ArticleUpdateForm},
            verified::verified_username,
            GlitchContext,
        },
        render::{article::render_article, markdown::render_markdown},
        storage::image_content_type,
        utils::{
            error::{BackendError, BackendResult},
            generate_object_path,
            validate::{validate_article, validate_image},
        },
    },
    common::{
        access::can_edit,
        article::{
            aggregate_tags,
            resolve_published_at,
            Article,
            ArticleInput,
            ArticleLinks,
            ArticleTitle,
            ArticleView,
            EditArticleParams,
            GetArticleParams,
            ListArticlesParams,
            PreviewParams,
            SocialLinks,
            Sources,
            TagCount,
            UploadParams,
            UploadResponse,
        },
        moderation::VerifiedWriter,
        newtypes::{ArticleId, Uid},
        user::Account,
        SuccessResponse,
    },
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    Form,
    Json,
};
use axum_macros::debug_handler;
use chrono::Utc;
use http::{header::ACCEPT, HeaderMap};
use log::{info, warn};
use std::sync::Arc;

/// Number of titles in the "latest" sidebar.
pub(crate) const LATEST_COUNT: i64 = 6;

pub(crate) fn is_verified_writer(uid: &Uid, context: &GlitchContext) -> bool {
    VerifiedWriter::is_verified(uid, context)
        .inspect_err(|e| warn!("Failed to read writer verification: {e}"))
        .unwrap_or(false)
}

/// Publishing is open to verified writers and developers.
pub(crate) fn can_publish(user: &Account, context: &GlitchContext) -> bool {
    context.is_developer(&user.uid) || is_verified_writer(&user.uid, context)
}

pub(crate) fn user_can_edit(user: &Account, article: &Article, context: &GlitchContext) -> bool {
    can_edit(&user.uid, article, &context.developers, |uid| {
        is_verified_writer(uid, context)
    })
}

/// Validates and stores a new article. `published` is set if it isnt saved as draft.
pub(crate) fn save_new_article(
    user: &Account,
    input: &ArticleInput,
    context: &GlitchContext,
) -> BackendResult<Article> {
    let verified_writer = is_verified_writer(&user.uid, context);
    if !verified_writer && !context.is_developer(&user.uid) {
        return Err(BackendError::forbidden(
            "You must be a verified writer to publish articles",
        ));
    }
    let valid = validate_article(input)?;
    let author_username = verified_username(&user.uid, context)?.unwrap_or_else(|| user.name());
    let form = ArticleInsertForm {
        title: valid.title,
        summary: valid.summary,
        content: valid.content,
        categories: valid.categories,
        tags: valid.tags,
        cover_image_url: valid.cover_image_url,
        embed: valid.embed,
        links: ArticleLinks(input.links.clone()),
        social_links: SocialLinks(input.social_links.clone()),
        sources: Sources(input.sources.clone()),
        citation_format: input.citation_format,
        author_uid: user.uid.clone(),
        author_username,
        author_verified: verified_writer,
        draft: input.draft,
        published: resolve_published_at(None, input.draft, Utc::now()),
    };
    let article = Article::create(&form, context)?;
    info!("Article {} created by {}", article.id.0, user.uid);
    Ok(article)
}

/// Replaces the content of an article. The first save without draft sets `published`, which
/// never changes afterwards.
pub(crate) fn save_article_edit(
    user: &Account,
    id: ArticleId,
    input: &ArticleInput,
    context: &GlitchContext,
) -> BackendResult<Article> {
    let article = Article::read(id, context)?;
    if !user_can_edit(user, &article, context) {
        return Err(BackendError::forbidden(
            "You dont have permission to edit this article",
        ));
    }
    let valid = validate_article(input)?;
    let now = Utc::now();
    let form = ArticleUpdateForm {
        title: valid.title,
        summary: valid.summary,
        content: valid.content,
        categories: valid.categories,
        tags: valid.tags,
        cover_image_url: valid.cover_image_url,
        embed: valid.embed,
        links: ArticleLinks(input.links.clone()),
        social_links: SocialLinks(input.social_links.clone()),
        sources: Sources(input.sources.clone()),
        citation_format: input.citation_format,
        draft: input.draft,
        published: resolve_published_at(article.published, input.draft, now),
        updated: now,
        last_edited: Some(now),
    };
    Article::update(article.id, &form, context)
}

fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(ACCEPT).and_then(|h| h.to_str().ok())
}

/// Drafts are only returned to users who can edit them, everyone else gets not found.
#[debug_handler]
pub(in crate::backend) async fn get_article(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    headers: HeaderMap,
    Query(query): Query<GetArticleParams>,
) -> BackendResult<Json<ArticleView>> {
    let article = Article::read(query.id, &context)?;
    let can_edit = user
        .as_ref()
        .is_some_and(|u| user_can_edit(u, &article, &context));
    if article.draft && !can_edit {
        return Err(BackendError::not_found("Article Not Found"));
    }
    let html = render_article(&article, accept_header(&headers));
    Ok(Json(ArticleView {
        article,
        html,
        can_edit,
    }))
}

#[debug_handler]
pub(in crate::backend) async fn create_article(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Json(input): Json<ArticleInput>,
) -> BackendResult<Json<Article>> {
    Ok(Json(save_new_article(&user, &input, &context)?))
}

#[debug_handler]
pub(in crate::backend) async fn edit_article(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Json(params): Json<EditArticleParams>,
) -> BackendResult<Json<Article>> {
    Ok(Json(save_article_edit(&user, params.id, &params.input, &context)?))
}

/// Only the author or a developer can delete an article.
#[debug_handler]
pub(in crate::backend) async fn delete_article(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(query): Query<GetArticleParams>,
) -> BackendResult<Json<SuccessResponse>> {
    let article = Article::read(query.id, &context)?;
    if !can_edit(&user.uid, &article, &context.developers, |_| false) {
        return Err(BackendError::forbidden(
            "Only the author can delete this article",
        ));
    }
    Article::delete(article.id, &context)?;
    info!("Article {} deleted by {}", article.id.0, user.uid);
    Ok(Json(SuccessResponse::default()))
}

#[debug_handler]
pub(in crate::backend) async fn list_articles(
    State(context): State<Arc<GlitchContext>>,
    Query(mut query): Query<ListArticlesParams>,
) -> BackendResult<Json<Vec<Article>>> {
    empty_to_none(&mut query.category);
    empty_to_none(&mut query.tag);
    let max = context.conf.options.max_articles_listed;
    let params = ArticleListQuery {
        category: query.category.as_deref(),
        tag: query.tag.as_deref(),
        limit: query.limit.unwrap_or(max).min(max).max(1),
    };
    Ok(Json(Article::list_published(&params, &context)?))
}

#[debug_handler]
pub(in crate::backend) async fn list_tags(
    State(context): State<Arc<GlitchContext>>,
) -> BackendResult<Json<Vec<TagCount>>> {
    let tags = Article::published_tags(&context)?;
    Ok(Json(aggregate_tags(tags.iter().map(Vec::as_slice))))
}

#[debug_handler]
pub(in crate::backend) async fn latest_articles(
    State(context): State<Arc<GlitchContext>>,
) -> BackendResult<Json<Vec<ArticleTitle>>> {
    Ok(Json(Article::latest_titles(LATEST_COUNT, &context)?))
}

#[debug_handler]
pub(in crate::backend) async fn list_my_articles(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
) -> BackendResult<Json<Vec<Article>>> {
    Ok(Json(Article::list_by_author(&user.uid, &context)?))
}

#[debug_handler]
pub(in crate::backend) async fn upload_cover(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> BackendResult<Json<UploadResponse>> {
    check_is_developer(&user, &context)?;
    let extension = validate_image(&params.file_name, body.len())?;
    let path = generate_object_path("covers", &extension);
    let url = context
        .storage
        .upload(
            &context.conf.storage.covers_bucket,
            &path,
            body.to_vec(),
            image_content_type(&extension),
        )
        .await?;
    Ok(Json(UploadResponse { url }))
}

#[debug_handler]
pub(in crate::backend) async fn preview_article(
    Form(params): Form<PreviewParams>,
) -> Json<String> {
    Json(render_markdown(&params.text))
}
