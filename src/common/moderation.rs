use super::{
    newtypes::{ReportId, Uid},
    utils::text_enum,
};
use crate::backend::database::schema::{report, verification_request, verified_user, verified_writer};
use chrono::{DateTime, Duration, TimeDelta, Utc};
use diesel::{
    deserialize::FromSqlRow,
    expression::AsExpression,
    sql_types::Text,
    Queryable,
    Selectable,
};
use serde::{Deserialize, Serialize};

/// Closed reports are deleted this long after closing, unless configured otherwise.
pub const DEFAULT_REPORT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    /// Report about a community post
    #[default]
    Community,
    Game,
}

text_enum!(ReportSource {
    Community => "community",
    Game => "game",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Open,
    Pending,
    Closed,
}

text_enum!(ReportStatus {
    Open => "open",
    Pending => "pending",
    Closed => "closed",
});

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = report, check_for_backend(diesel::pg::Pg))]
pub struct Report {
    pub id: ReportId,
    pub source: ReportSource,
    /// Id of the reported post or game
    pub target_id: String,
    pub reporter_uid: Uid,
    pub reason: String,
    pub status: ReportStatus,
    pub created: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Closed report whose expiry has passed, and which should be deleted.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReportStatus::Closed
            && self.expires_at.is_some_and(|e| is_expired(e, now))
    }

    /// Closed report from before expiry was tracked.
    pub fn needs_expiry(&self) -> bool {
        self.status == ReportStatus::Closed && self.expires_at.is_none()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportView {
    pub report: Report,
    /// Remaining time until deletion, only for closed reports
    pub countdown: Option<String>,
}

pub fn report_expires_at(closed_at: DateTime<Utc>, ttl_hours: i64) -> DateTime<Utc> {
    closed_at + Duration::hours(ttl_hours)
}

pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

/// Human readable time until deletion, eg `1d 02:03:04` or `02:03:04`.
pub fn format_countdown(remaining: TimeDelta) -> String {
    let total = remaining.num_seconds();
    if total <= 0 {
        return "Deleting soon…".to_string();
    }
    let days = total / 86400;
    let hours = (total % 86400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CreateReportParams {
    pub source: ReportSource,
    pub target_id: String,
    pub reason: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ListReportsParams {
    #[serde(default)]
    pub source: ReportSource,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct UpdateReportStatusParams {
    pub id: ReportId,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    /// Verified user badge
    User,
    /// Permission to publish news articles
    Writer,
}

text_enum!(VerificationKind {
    User => "user",
    Writer => "writer",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Denied,
    Rejected,
}

text_enum!(VerificationStatus {
    Pending => "pending",
    Approved => "approved",
    Denied => "denied",
    Rejected => "rejected",
});

impl VerificationStatus {
    /// Status given to a request which is not approved.
    pub fn refused(kind: VerificationKind) -> Self {
        match kind {
            VerificationKind::User => VerificationStatus::Denied,
            VerificationKind::Writer => VerificationStatus::Rejected,
        }
    }

    /// Whether a new request may replace one with this status.
    pub fn allows_resubmit(&self) -> bool {
        matches!(self, VerificationStatus::Denied | VerificationStatus::Rejected)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = verification_request, check_for_backend(diesel::pg::Pg))]
pub struct VerificationRequest {
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

#[derive(Deserialize, Serialize, Clone, Debug, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationFilter {
    #[default]
    Pending,
    Approved,
    Denied,
    Rejected,
    All,
}

impl VerificationFilter {
    pub fn status(&self) -> Option<VerificationStatus> {
        match self {
            VerificationFilter::Pending => Some(VerificationStatus::Pending),
            VerificationFilter::Approved => Some(VerificationStatus::Approved),
            VerificationFilter::Denied => Some(VerificationStatus::Denied),
            VerificationFilter::Rejected => Some(VerificationStatus::Rejected),
            VerificationFilter::All => None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CreateVerificationParams {
    pub kind: VerificationKind,
    pub display_name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MyVerificationParams {
    pub kind: VerificationKind,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ListVerificationParams {
    pub kind: VerificationKind,
    #[serde(default)]
    pub filter: VerificationFilter,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DecideVerificationParams {
    pub uid: Uid,
    pub kind: VerificationKind,
    pub approve: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = verified_writer, check_for_backend(diesel::pg::Pg))]
pub struct VerifiedWriter {
    pub uid: Uid,
    pub verified: bool,
    pub display_name: Option<String>,
    pub notes: Option<String>,
    pub verified_at: DateTime<Utc>,
    pub verified_by: Option<Uid>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = verified_user, check_for_backend(diesel::pg::Pg))]
pub struct VerifiedUser {
    pub uid: Uid,
    pub verified: bool,
    pub username: Option<String>,
    /// Areas the user is verified for, eg `news` or `games`
    pub verification_types: Vec<String>,
    pub verified_at: DateTime<Utc>,
    pub reviewer_id: Option<Uid>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AddWriterParams {
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RemoveWriterParams {
    pub uid: Uid,
}

/// Game submission as returned by the submissions backend. Only the fields shown to
/// moderators are typed, everything else is passed through.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GameSubmission {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "ownerId")]
    pub owner_id: String,
    #[serde(default = "default_submission_status")]
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "coverImageUrl")]
    pub cover_image_url: Option<String>,
    #[serde(default, rename = "playUrl")]
    pub play_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_submission_status() -> String {
    "draft".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ListSubmissionsParams {
    #[serde(default = "default_submission_status")]
    pub status: String,
    pub limit: Option<u32>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SubmissionParams {
    pub id: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn closed_report(expires_at: Option<DateTime<Utc>>) -> Report {
        Report {
            id: ReportId(1),
            source: ReportSource::Community,
            target_id: "post".to_string(),
            reporter_uid: Uid::from("u"),
            reason: "spam".to_string(),
            status: ReportStatus::Closed,
            created: Utc::now(),
            closed_at: Some(Utc::now()),
            expires_at,
        }
    }

    #[test]
    fn test_expiry_is_one_day_after_closing() {
        let closed = Utc
            .with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
            .single()
            .expect("valid date");
        let expires = report_expires_at(closed, DEFAULT_REPORT_TTL_HOURS);
        assert_eq!(closed + Duration::hours(24), expires);
        assert!(!is_expired(expires, expires - Duration::seconds(1)));
        assert!(is_expired(expires, expires + Duration::seconds(1)));
    }

    #[test]
    fn test_report_is_expired() {
        let now = Utc::now();
        assert!(closed_report(Some(now - Duration::minutes(1))).is_expired(now));
        assert!(!closed_report(Some(now + Duration::minutes(1))).is_expired(now));
        assert!(!closed_report(None).is_expired(now));
        assert!(closed_report(None).needs_expiry());

        let mut open = closed_report(Some(now - Duration::minutes(1)));
        open.status = ReportStatus::Open;
        assert!(!open.is_expired(now));
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!("Deleting soon…", format_countdown(TimeDelta::zero()));
        assert_eq!("Deleting soon…", format_countdown(TimeDelta::seconds(-5)));
        assert_eq!("00:00:59", format_countdown(TimeDelta::seconds(59)));
        assert_eq!(
            "23:59:59",
            format_countdown(TimeDelta::hours(24) - TimeDelta::seconds(1))
        );
        assert_eq!(
            "1d 02:03:04",
            format_countdown(
                TimeDelta::days(1)
                    + TimeDelta::hours(2)
                    + TimeDelta::minutes(3)
                    + TimeDelta::seconds(4)
            )
        );
    }

    #[test]
    fn test_refused_status_depends_on_kind() {
        assert_eq!(
            VerificationStatus::Denied,
            VerificationStatus::refused(VerificationKind::User)
        );
        assert_eq!(
            VerificationStatus::Rejected,
            VerificationStatus::refused(VerificationKind::Writer)
        );
        assert!(VerificationStatus::Rejected.allows_resubmit());
        assert!(!VerificationStatus::Pending.allows_resubmit());
    }

    #[test]
    fn test_game_submission_keeps_unknown_fields() -> serde_json::Result<()> {
        let json = r#"{"id":"g1","title":"Byte Wars","ownerId":"u1","genre":"shooter"}"#;
        let submission: GameSubmission = serde_json::from_str(json)?;
        assert_eq!("draft", submission.status);
        assert_eq!("u1", submission.owner_id);
        assert_eq!(
            Some(&serde_json::Value::String("shooter".to_string())),
            submission.extra.get("genre")
        );
        Ok(())
    }
}
