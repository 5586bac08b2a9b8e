use crate::{
    backend::{
        database::{schema::notification, GlitchContext},
        utils::error::BackendResult,
    },
    common::{
        newtypes::NotificationId,
        notifications::{Notification, Priority},
    },
};
use diesel::{dsl::count_star, insert_into, ExpressionMethods, Insertable, QueryDsl, RunQueryDsl};
use log::debug;
use std::ops::DerefMut;

const LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notification, check_for_backend(diesel::pg::Pg))]
pub struct NotificationInsertForm {
    pub title: String,
    pub body: String,
    pub kind: String,
    pub priority: Priority,
}

impl Notification {
    pub fn create(form: &NotificationInsertForm, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        let notification = insert_into(notification::table)
            .values(form)
            .get_result(conn.deref_mut())?;
        notify_changed(context);
        Ok(notification)
    }

    pub fn list(context: &GlitchContext) -> BackendResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(notification::table
            .order_by(notification::created.desc())
            .limit(LIST_LIMIT)
            .get_results(conn.deref_mut())?)
    }

    pub fn count_unread(context: &GlitchContext) -> BackendResult<i64> {
        let mut conn = context.db_pool.get()?;
        Ok(notification::table
            .filter(notification::read.eq(false))
            .select(count_star())
            .get_result(conn.deref_mut())?)
    }

    /// Marks a single notification as read, or all of them if no id is given.
    pub fn mark_as_read(id: Option<NotificationId>, context: &GlitchContext) -> BackendResult<()> {
        let mut conn = context.db_pool.get()?;
        let unread = notification::table.filter(notification::read.eq(false));
        if let Some(id) = id {
            diesel::update(unread.filter(notification::id.eq(id)))
                .set(notification::read.eq(true))
                .execute(conn.deref_mut())?;
        } else {
            diesel::update(unread)
                .set(notification::read.eq(true))
                .execute(conn.deref_mut())?;
        }
        notify_changed(context);
        Ok(())
    }
}

fn notify_changed(context: &GlitchContext) {
    // Only fails if nobody is listening
    if context.notification_updates.send(()).is_err() {
        debug!("No listeners for notification updates");
    }
}
