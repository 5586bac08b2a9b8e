pub mod access;
pub mod article;
pub mod moderation;
pub mod newtypes;
pub mod notifications;
pub mod site;
pub mod sso;
pub mod user;
pub mod utils;

use serde::{Deserialize, Serialize};

pub static AUTH_COOKIE: &str = "auth";

/// Raw login token of the current request, if any.
#[derive(Clone, Debug)]
pub struct Auth(pub Option<String>);

#[derive(Deserialize, Serialize, Debug)]
pub struct SuccessResponse {
    success: bool,
}

impl Default for SuccessResponse {
    fn default() -> Self {
        Self { success: true }
    }
}
