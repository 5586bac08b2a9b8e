use crate::{
    backend::{
        database::{
            schema::{verified_user, verified_writer},
            GlitchContext,
        },
        utils::error::BackendResult,
    },
    common::{
        moderation::{VerifiedUser, VerifiedWriter},
        newtypes::Uid,
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    insert_into,
    AsChangeset,
    ExpressionMethods,
    Insertable,
    OptionalExtension,
    QueryDsl,
    RunQueryDsl,
};
use log::debug;
use std::ops::DerefMut;

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = verified_writer, check_for_backend(diesel::pg::Pg))]
pub struct VerifiedWriterForm {
    pub uid: Uid,
    pub verified: bool,
    pub display_name: Option<String>,
    pub notes: Option<String>,
    pub verified_at: DateTime<Utc>,
    pub verified_by: Option<Uid>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = verified_user, check_for_backend(diesel::pg::Pg))]
pub struct VerifiedUserForm {
    pub uid: Uid,
    pub verified: bool,
    pub username: Option<String>,
    pub verification_types: Vec<String>,
    pub verified_at: DateTime<Utc>,
    pub reviewer_id: Option<Uid>,
}

impl VerifiedWriter {
    pub fn upsert(form: &VerifiedWriterForm, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(insert_into(verified_writer::table)
            .values(form)
            .on_conflict(verified_writer::uid)
            .do_update()
            .set(form)
            .get_result(conn.deref_mut())?)
    }

    pub fn is_verified(uid: &Uid, context: &GlitchContext) -> BackendResult<bool> {
        let mut conn = context.db_pool.get()?;
        let verified: Option<bool> = verified_writer::table
            .find(uid)
            .select(verified_writer::verified)
            .get_result(conn.deref_mut())
            .optional()?;
        Ok(verified.unwrap_or(false))
    }

    pub fn list(context: &GlitchContext) -> BackendResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(verified_writer::table
            .order_by(verified_writer::verified_at.desc())
            .get_results(conn.deref_mut())?)
    }

    pub fn delete(uid: &Uid, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(diesel::delete(verified_writer::table.find(uid)).get_result(conn.deref_mut())?)
    }
}

impl VerifiedUser {
    pub fn upsert(form: &VerifiedUserForm, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        let user: Self = insert_into(verified_user::table)
            .values(form)
            .on_conflict(verified_user::uid)
            .do_update()
            .set(form)
            .get_result(conn.deref_mut())?;
        context.username_cache.invalidate(&user.uid);
        Ok(user)
    }

    pub fn read(uid: &Uid, context: &GlitchContext) -> BackendResult<Option<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(verified_user::table
            .find(uid)
            .get_result(conn.deref_mut())
            .optional()?)
    }
}

/// Username of a verified user, if there is one. Lookups are cached so that rendering many
/// articles by the same author only reads the database once.
pub fn verified_username(uid: &Uid, context: &GlitchContext) -> BackendResult<Option<String>> {
    if let Some(cached) = context.username_cache.get(uid) {
        return Ok(cached);
    }
    debug!("Reading verified username for {uid}");
    let username = VerifiedUser::read(uid, context)?
        .filter(|u| u.verified)
        .and_then(|u| u.username);
    context.username_cache.insert(uid.clone(), username.clone());
    Ok(username)
}
