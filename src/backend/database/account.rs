use crate::{
    backend::{
        database::{
            schema::{account, user_settings, verification_request},
            GlitchContext,
        },
        utils::error::BackendResult,
    },
    common::{newtypes::Uid, user::Account},
};
use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use diesel::{
    delete,
    insert_into,
    update,
    AsChangeset,
    Connection,
    ExpressionMethods,
    Insertable,
    PgConnection,
    QueryDsl,
    QueryResult,
    RunQueryDsl,
};
use std::ops::DerefMut;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = account, check_for_backend(diesel::pg::Pg))]
pub struct AccountInsertForm {
    pub uid: Uid,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub password_encrypted: Option<String>,
    pub anonymous: bool,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = account, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct AccountUpdateForm {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Account {
    pub fn create(form: &AccountInsertForm, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(insert_into(account::table)
            .values(form)
            .get_result(conn.deref_mut())?)
    }

    pub fn create_local(
        username: String,
        password: &str,
        display_name: Option<String>,
        email: Option<String>,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        let form = AccountInsertForm {
            uid: Uid::generate(),
            username: Some(username),
            display_name,
            email,
            password_encrypted: Some(hash(password, DEFAULT_COST)?),
            anonymous: false,
        };
        Self::create(&form, context)
    }

    pub fn create_anonymous(context: &GlitchContext) -> BackendResult<Self> {
        let form = AccountInsertForm {
            uid: Uid::generate(),
            username: None,
            display_name: None,
            email: None,
            password_encrypted: None,
            anonymous: true,
        };
        Self::create(&form, context)
    }

    pub fn read(uid: &Uid, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table.find(uid).get_result(conn.deref_mut())?)
    }

    pub fn read_from_name(username: &str, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(account::table
            .filter(account::username.eq(username))
            .get_result(conn.deref_mut())?)
    }

    pub fn update_profile(
        form: &AccountUpdateForm,
        uid: &Uid,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(update(account::table.find(uid))
            .set(form)
            .get_result(conn.deref_mut())?)
    }

    pub fn update_avatar(uid: &Uid, url: &str, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(update(account::table.find(uid))
            .set(account::avatar_url.eq(url))
            .get_result(conn.deref_mut())?)
    }

    pub fn mark_seen(uid: &Uid, context: &GlitchContext) -> BackendResult<()> {
        let mut conn = context.db_pool.get()?;
        update(account::table.find(uid))
            .set(account::last_seen.eq(Utc::now()))
            .execute(conn.deref_mut())?;
        Ok(())
    }

    /// Removes the account together with everything stored for it. Articles and reports
    /// are kept.
    pub fn delete(uid: &Uid, context: &GlitchContext) -> BackendResult<()> {
        let mut conn = context.db_pool.get()?;
        conn.deref_mut()
            .transaction(|conn| delete_accounts(conn, &[uid.clone()]))?;
        Ok(())
    }

    /// Returns true if an anonymous account was deleted. Registered accounts are never
    /// touched.
    pub fn delete_if_anonymous(uid: &Uid, context: &GlitchContext) -> BackendResult<bool> {
        let mut conn = context.db_pool.get()?;
        let deleted = conn.deref_mut().transaction(|conn| {
            let anonymous: Vec<Uid> = account::table
                .filter(account::uid.eq(uid))
                .filter(account::anonymous)
                .select(account::uid)
                .load(conn)?;
            delete_accounts(conn, &anonymous)
        })?;
        Ok(deleted > 0)
    }
}

/// Minimum time between two updates of `last_seen` for the same account.
const SEEN_THROTTLE_MINUTES: i64 = 10;

/// Whether `last_seen` is old enough to be written again.
pub fn needs_seen_update(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_seen >= Duration::minutes(SEEN_THROTTLE_MINUTES)
}

/// Deletes anonymous accounts which were not seen for `ttl_hours`.
pub fn delete_idle_anonymous(
    conn: &mut PgConnection,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    let cutoff = now - Duration::hours(ttl_hours);
    conn.transaction(|conn| {
        let idle: Vec<Uid> = account::table
            .filter(account::anonymous)
            .filter(account::last_seen.lt(cutoff))
            .select(account::uid)
            .load(conn)?;
        delete_accounts(conn, &idle)
    })
}

/// Returns the number of deleted accounts.
fn delete_accounts(conn: &mut PgConnection, uids: &[Uid]) -> QueryResult<usize> {
    if uids.is_empty() {
        return Ok(0);
    }
    delete(verification_request::table.filter(verification_request::uid.eq_any(uids)))
        .execute(conn)?;
    delete(user_settings::table.filter(user_settings::uid.eq_any(uids))).execute(conn)?;
    delete(account::table.filter(account::uid.eq_any(uids))).execute(conn)
}
