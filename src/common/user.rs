use super::{newtypes::Uid, utils::jsonb_type};
use crate::backend::database::schema::account;
use chrono::{DateTime, Utc};
use diesel::{
    deserialize::FromSqlRow,
    expression::AsExpression,
    sql_types::Jsonb,
    Identifiable,
    Queryable,
    Selectable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of games which can be saved as favorite.
pub const MAX_FAVORITES: usize = 200;

/// A registered or anonymous account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[derive(Queryable, Selectable, Identifiable)]
#[diesel(table_name = account, primary_key(uid), check_for_backend(diesel::pg::Pg))]
pub struct Account {
    pub uid: Uid,
    /// Not set for anonymous accounts
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(skip)]
    pub password_encrypted: Option<String>,
    pub anonymous: bool,
    pub created: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Account {
    /// Name shown to other users, falling back from display name to username.
    pub fn name(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| {
                self.email
                    .as_ref()
                    .and_then(|e| e.split('@').next())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| "Anonymous".to_string())
    }
}

/// Account of the current user together with its privileges.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MyProfile {
    pub account: Account,
    pub developer: bool,
    pub verified_writer: bool,
}

/// Per-account preferences, mirroring what the browser keeps in local storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
pub struct UserSettings {
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    /// Popups which were already shown and should not appear again
    #[serde(default)]
    pub popups_seen: Vec<String>,
    #[serde(default)]
    pub terms_version: Option<String>,
    #[serde(default)]
    pub terms_accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub play_preference: Option<String>,
}
jsonb_type!(UserSettings);

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RegisterParams {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct LoginParams {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct UpdateProfileParams {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn account() -> Account {
        Account {
            uid: Uid::from("abc"),
            username: None,
            display_name: None,
            email: None,
            avatar_url: None,
            password_encrypted: None,
            anonymous: true,
            created: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn test_account_name_fallbacks() {
        let mut a = account();
        assert_eq!("Anonymous", a.name());
        a.email = Some("neo@glitchrealm.ca".to_string());
        assert_eq!("neo", a.name());
        a.username = Some("neo_1".to_string());
        assert_eq!("neo_1", a.name());
        a.display_name = Some("Neo".to_string());
        assert_eq!("Neo", a.name());
    }

    #[test]
    fn test_settings_accept_partial_json() -> serde_json::Result<()> {
        let settings: UserSettings = serde_json::from_str(r#"{"favorites":["bytewars"]}"#)?;
        assert_eq!(vec!["bytewars".to_string()], settings.favorites);
        assert!(settings.features.is_empty());
        Ok(())
    }
}
