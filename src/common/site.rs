use super::user::MyProfile;
use crate::backend::{database::schema::system_status, utils::config::Options};
use chrono::{DateTime, Utc};
use diesel::{Queryable, Selectable};
use serde::{Deserialize, Serialize};

/// Site-wide status, eg to announce maintenance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[derive(Queryable, Selectable)]
#[diesel(table_name = system_status, check_for_backend(diesel::pg::Pg))]
pub struct SystemStatus {
    #[serde(skip)]
    pub id: i32,
    pub maintenance: bool,
    pub message: Option<String>,
    pub updated: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct UpdateStatusParams {
    pub maintenance: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SiteView {
    pub status: SystemStatus,
    pub my_profile: Option<MyProfile>,
    pub options: Options,
}
