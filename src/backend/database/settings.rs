use crate::{
    backend::{
        database::{schema::user_settings, GlitchContext},
        utils::error::BackendResult,
    },
    common::{newtypes::Uid, user::UserSettings},
};
use chrono::Utc;
use diesel::{insert_into, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl};
use std::ops::DerefMut;

impl UserSettings {
    /// Settings of the account, or the defaults if nothing was saved yet.
    pub fn read(uid: &Uid, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        let settings = user_settings::table
            .find(uid)
            .select(user_settings::settings)
            .get_result(conn.deref_mut())
            .optional()?;
        Ok(settings.unwrap_or_default())
    }

    pub fn replace(uid: &Uid, settings: &Self, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        let now = Utc::now();
        Ok(insert_into(user_settings::table)
            .values((
                user_settings::uid.eq(uid),
                user_settings::settings.eq(settings),
                user_settings::updated.eq(now),
            ))
            .on_conflict(user_settings::uid)
            .do_update()
            .set((
                user_settings::settings.eq(settings),
                user_settings::updated.eq(now),
            ))
            .returning(user_settings::settings)
            .get_result(conn.deref_mut())?)
    }
}
