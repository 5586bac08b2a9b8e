use super::{newtypes::NotificationId, utils::text_enum};
use crate::backend::database::schema::notification;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::FromSqlRow,
    expression::AsExpression,
    sql_types::Text,
    Queryable,
    Selectable,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

text_enum!(Priority {
    Low => "low",
    Normal => "normal",
    High => "high",
});

/// Entry in the site-wide notification feed. There is a single feed for all users, so read
/// state is shared as well.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = notification, check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub read: bool,
    /// Free-form category, eg `announcement` or `test`
    pub kind: String,
    pub priority: Priority,
    pub created: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CreateNotificationParams {
    pub title: String,
    pub body: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub priority: Priority,
}

fn default_kind() -> String {
    "announcement".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct MarkAsReadParams {
    /// Mark all notifications as read if not given
    pub id: Option<NotificationId>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnreadCount {
    pub unread: i64,
}
