use super::{newtypes::Uid, user::Account};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the site which produced a snapshot.
pub const SSO_SOURCE: &str = "glitchRealm";

/// Header carrying the shared secret on messages between sibling sites.
pub const SSO_SECRET_HEADER: &str = "x-glitchrealm-sso";

/// Serialized sign-in state of a user, shared between tabs and sibling sites.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
    pub is_signed_in: bool,
    pub uid: Option<Uid>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl AuthSnapshot {
    pub fn signed_in(account: &Account) -> Self {
        AuthSnapshot {
            is_signed_in: true,
            uid: Some(account.uid.clone()),
            email: account.email.clone(),
            display_name: Some(account.name()),
            photo_url: account.avatar_url.clone(),
            timestamp: Utc::now(),
            source: SSO_SOURCE.to_string(),
        }
    }

    /// Signed out state. Keeps the uid so that subscribers of this user receive it.
    pub fn signed_out(uid: &Uid) -> Self {
        AuthSnapshot {
            is_signed_in: false,
            uid: Some(uid.clone()),
            email: None,
            display_name: None,
            photo_url: None,
            timestamp: Utc::now(),
            source: SSO_SOURCE.to_string(),
        }
    }
}

/// Messages exchanged between sibling sites. Requests and responses are matched by
/// `request_id`, so that concurrent requests to the same site can be told apart.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SsoMessage {
    AuthUpdate {
        snapshot: AuthSnapshot,
    },
    StatusRequest {
        request_id: Uuid,
        uid: Uid,
    },
    StatusResponse {
        request_id: Uuid,
        snapshot: Option<AuthSnapshot>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SsoEnvelope {
    /// Origin of the sending site, where responses are delivered
    pub origin: String,
    pub message: SsoMessage,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SsoStatusParams {
    pub origin: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_wire_format() -> serde_json::Result<()> {
        let request_id = Uuid::nil();
        let message = SsoMessage::StatusRequest {
            request_id,
            uid: Uid::from("u1"),
        };
        let json = serde_json::to_value(&message)?;
        assert_eq!(
            serde_json::json!({
                "type": "status_request",
                "request_id": "00000000-0000-0000-0000-000000000000",
                "uid": "u1"
            }),
            json
        );
        let parsed: SsoMessage = serde_json::from_value(json)?;
        assert_eq!(message, parsed);
        Ok(())
    }
}
