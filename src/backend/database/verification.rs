use crate::{
    backend::{
        database::{schema::verification_request, GlitchContext},
        utils::error::{BackendError, BackendResult},
    },
    common::{
        moderation::{
            CreateVerificationParams,
            VerificationFilter,
            VerificationKind,
            VerificationRequest,
            VerificationStatus,
        },
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
use std::ops::DerefMut;

/// Number of requests shown per list, except for denied requests which are all shown.
const LIST_LIMIT: i64 = 50;

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = verification_request, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct VerificationRequestForm {
    pub uid: Uid,
    pub kind: VerificationKind,
    pub status: VerificationStatus,
    pub display_name: String,
    pub email: Option<String>,
    pub message: String,
    pub links: Vec<String>,
    pub rejection_reason: Option<String>,
    pub created: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uid>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = verification_request, check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct VerificationDecisionForm {
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uid>,
}

impl VerificationRequest {
    pub fn read(
        uid: &Uid,
        kind: VerificationKind,
        context: &GlitchContext,
    ) -> BackendResult<Option<Self>> {
        let mut conn = context.db_pool.get()?;
        Ok(verification_request::table
            .find((uid, kind))
            .get_result(conn.deref_mut())
            .optional()?)
    }

    /// Creates a pending request, or replaces a refused one. Requests which are pending or
    /// already approved cant be submitted again.
    pub fn submit(
        uid: &Uid,
        email: Option<String>,
        params: &CreateVerificationParams,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        if let Some(existing) = Self::read(uid, params.kind, context)? {
            if !existing.status.allows_resubmit() {
                return Err(BackendError::bad_request(format!(
                    "Verification request is already {}",
                    existing.status
                )));
            }
        }
        let form = VerificationRequestForm {
            uid: uid.clone(),
            kind: params.kind,
            status: VerificationStatus::Pending,
            display_name: params.display_name.trim().to_string(),
            email,
            message: params.message.clone().unwrap_or_default(),
            links: params.links.clone(),
            rejection_reason: None,
            created: Utc::now(),
            decided_at: None,
            reviewer_id: None,
        };
        let mut conn = context.db_pool.get()?;
        Ok(insert_into(verification_request::table)
            .values(&form)
            .on_conflict((verification_request::uid, verification_request::kind))
            .do_update()
            .set(&form)
            .get_result(conn.deref_mut())?)
    }

    /// Newest first. Only the denied view is unlimited.
    pub fn list(
        kind: VerificationKind,
        filter: VerificationFilter,
        context: &GlitchContext,
    ) -> BackendResult<Vec<Self>> {
        let mut conn = context.db_pool.get()?;
        let mut query = verification_request::table
            .filter(verification_request::kind.eq(kind))
            .order_by(verification_request::created.desc())
            .into_boxed();
        if let Some(status) = filter.status() {
            query = query.filter(verification_request::status.eq(status));
        }
        if filter != VerificationFilter::Denied {
            query = query.limit(LIST_LIMIT);
        }
        Ok(query.get_results(conn.deref_mut())?)
    }

    pub fn decide(
        uid: &Uid,
        kind: VerificationKind,
        form: &VerificationDecisionForm,
        context: &GlitchContext,
    ) -> BackendResult<Self> {
        let mut conn = context.db_pool.get()?;
        Ok(diesel::update(verification_request::table.find((uid, kind)))
            .set(form)
            .get_result(conn.deref_mut())?)
    }
}
