use crate::{
    backend::{
        database::{schema::report, GlitchContext},
        utils::error::BackendResult,
    },
    common::{
        moderation::{report_expires_at, Report, ReportSource, ReportStatus},
        newtypes::{ReportId, Uid},
    },
};
use chrono::{DateTime, Utc};
use diesel::{
    delete,
    insert_into,
    sql_query,
    sql_types::{BigInt, Timestamptz},
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

/// Number of reports shown in the moderation console.
const LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = report, check_for_backend(diesel::pg::Pg))]
pub struct ReportInsertForm {
    pub source: ReportSource,
    pub target_id: String,
    pub reporter_uid: Uid,
    pub reason: String,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = report, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
struct ReportStatusForm {
    status: ReportStatus,
    closed_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn create(form: &ReportInsertForm, context: &GlitchContext) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(insert_into(report::table)
            .values(form)
            .get_result(conn.deref_mut())?)
    }

    /// Newest reports of the given source. Expired reports are removed first, so they never
    /// show up in the list even if the scheduled sweep didnt run yet.
    pub fn list(source: ReportSource, context: &GlitchContext) -> BackendResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        sweep_expired_reports(
            conn.deref_mut(),
            context.conf.moderation.report_ttl_hours,
            Utc::now(),
        )?;
        Ok(report::table
            .filter(report::source.eq(source))
            .order_by(report::created.desc())
            .limit(LIST_LIMIT)
            .get_results(conn.deref_mut())?)
    }

    /// Closing starts the countdown until deletion, reopening cancels it.
    pub fn update_status(
        id: ReportId,
        status: ReportStatus,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        let form = if status == ReportStatus::Closed {
            let now = Utc::now();
            ReportStatusForm {
                status,
                closed_at: Some(now),
                expires_at: Some(report_expires_at(
                    now,
                    context.conf.moderation.report_ttl_hours,
                )),
            }
        } else {
            ReportStatusForm {
                status,
                closed_at: None,
                expires_at: None,
            }
        };
        let mut conn = context.db_pool.get()?;
        Ok(diesel::update(report::table.find(id))
            .set(&form)
            .get_result(conn.deref_mut())?)
    }
}

/// Deletes closed reports whose expiry has passed, and sets the expiry on closed reports
/// which dont have one yet. Returns the number of deleted and updated reports.
pub fn sweep_expired_reports(
    conn: &mut PgConnection,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> QueryResult<(usize, usize)> {
    conn.transaction(|conn| {
        let deleted = delete(
            report::table
                .filter(report::status.eq(ReportStatus::Closed))
                .filter(report::expires_at.lt(now)),
        )
        .execute(conn)?;
        let backfilled = sql_query(
            "update report set expires_at = coalesce(closed_at, $1) + make_interval(hours => $2::int)
             where status = 'closed' and expires_at is null",
        )
        .bind::<Timestamptz, _>(now)
        .bind::<BigInt, _>(ttl_hours)
        .execute(conn)?;
        Ok((deleted, backfilled))
    })
}
