use diesel_derive_newtype::DieselNewType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity of an account, as issued at registration or anonymous sign-in.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[derive(DieselNewType)]
#[serde(transparent)]
pub struct Uid(pub String);

impl Uid {
    pub fn generate() -> Self {
        Uid(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Uid {
    fn from(value: String) -> Self {
        Uid(value)
    }
}

impl From<&str> for Uid {
    fn from(value: &str) -> Self {
        Uid(value.to_string())
    }
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[derive(DieselNewType)]
pub struct ArticleId(pub i32);

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[derive(DieselNewType)]
pub struct ReportId(pub i32);

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[derive(DieselNewType)]
pub struct NotificationId(pub i32);
