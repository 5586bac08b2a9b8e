use crate::{
    backend::{
        database::{schema::system_status, GlitchContext},
        utils::error::BackendResult,
    },
    common::site::SystemStatus,
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl, RunQueryDsl};
use std::ops::DerefMut;

/// The table holds exactly one row, created by the migration.
const STATUS_ID: i32 = 1;

impl SystemStatus {
    pub fn read(context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(system_status::table
            .find(STATUS_ID)
            .get_result(conn.deref_mut())?)
    }

    pub fn update(
        maintenance: bool,
        message: Option<String>,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(diesel::update(system_status::table.find(STATUS_ID))
            .set((
                system_status::maintenance.eq(maintenance),
                system_status::message.eq(message),
                system_status::updated.eq(Utc::now()),
            ))
            .get_result(conn.deref_mut())?)
    }
}
