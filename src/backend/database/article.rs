use crate::{
    backend::{
        database::{schema::article, GlitchContext},
        utils::error::BackendResult,
    },
    common::{
        article::{Article, ArticleLinks, ArticleTitle, CitationFormat, SocialLinks, Sources},
        newtypes::{ArticleId, Uid},
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    insert_into,
    AsChangeset,
    ExpressionMethods,
    Insertable,
    PgArrayExpressionMethods,
    QueryDsl,
    RunQueryDsl,
};
use std::ops::DerefMut;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = article, check_for_backend(diesel::pg::Pg))]
pub struct ArticleInsertForm {
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
    pub published: Option<DateTime<Utc>>,
}

/// Replaces all user editable fields. Author fields and creation time stay unchanged.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = article, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct ArticleUpdateForm {
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
    pub draft: bool,
    pub published: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
    pub last_edited: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ArticleListQuery<'a> {
    pub category: Option<&'a str>,
    pub tag: Option<&'a str>,
    pub limit: i64,
}

impl Article {
    pub fn create(form: &ArticleInsertForm, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(insert_into(article::table)
            .values(form)
            .get_result(conn.deref_mut())?)
    }

    pub fn update(
        id: ArticleId,
        form: &ArticleUpdateForm,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(diesel::update(article::table.find(id))
            .set(form)
            .get_result(conn.deref_mut())?)
    }

    pub fn delete(id: ArticleId, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(diesel::delete(article::table.find(id)).get_result(conn.deref_mut())?)
    }

    pub fn read(id: ArticleId, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(article::table.find(id).get_result(conn.deref_mut())?)
    }

    /// Published articles, most recently published first.
    pub fn list_published(
        params: &ArticleListQuery,
        context: &GlitchContext,
    ) -> BackendResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        let mut query = article::table
            .filter(article::draft.eq(false))
            .order_by(article::published.desc())
            .limit(params.limit)
            .into_boxed();
        if let Some(category) = params.category {
            query = query.filter(article::categories.contains(vec![category.to_string()]));
        }
        if let Some(tag) = params.tag {
            query = query.filter(article::tags.contains(vec![tag.to_string()]));
        }
        Ok(query.get_results(conn.deref_mut())?)
    }

    /// All articles of a single author including drafts, most recently updated first.
    pub fn list_by_author(uid: &Uid, context: &GlitchContext) -> BackendResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(article::table
            .filter(article::author_uid.eq(uid))
            .order_by(article::updated.desc())
            .get_results(conn.deref_mut())?)
    }

    pub fn latest_titles(limit: i64, context: &GlitchContext) -> BackendResult<Vec<ArticleTitle>> {
        let mut conn = context.db_pool.get()?;
        Ok(article::table
            .filter(article::draft.eq(false))
            .order_by(article::published.desc())
            .limit(limit)
            .select((article::id, article::title))
            .get_results(conn.deref_mut())?)
    }

    /// Tag lists of all published articles, for building the tag cloud.
    pub fn published_tags(context: &GlitchContext) -> BackendResult<Vec<Vec<String>>> {
        let mut conn = context.db_pool.get()?;
        Ok(article::table
            .filter(article::draft.eq(false))
            .select(article::tags)
            .get_results(conn.deref_mut())?)
    }
}
