use crate::{
    backend::{
        api::account::validate,
        database::{account::needs_seen_update, GlitchContext},
    },
    common::{user::Account, Auth, AUTH_COOKIE},
};
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use axum_macros::debug_middleware;
use chrono::Utc;
use http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};
use log::warn;
use std::{collections::HashSet, sync::Arc};

/// Checks the auth cookie, the `auth` header and bearer tokens (including duplicates) for the
/// first valid login token. Cookies are parsed manually because CookieJar ignores duplicates.
/// If the user is authenticated, sets extensions `Auth` and `Account`, and keeps `last_seen`
/// current so that active anonymous accounts are not cleaned up.
#[debug_middleware]
pub(super) async fn auth_middleware(
    State(context): State<Arc<GlitchContext>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    for token in auth_tokens(request.headers()) {
        if let Ok(account) = validate(&token, &context).await {
            if needs_seen_update(account.last_seen, Utc::now()) {
                Account::mark_seen(&account.uid, &context)
                    .inspect_err(|e| warn!("Failed to update last seen: {e}"))
                    .ok();
            }
            request.extensions_mut().insert(Auth(Some(token)));
            request.extensions_mut().insert(account);
            break;
        }
    }
    next.run(request).await
}

fn auth_tokens(headers: &HeaderMap) -> Vec<String> {
    let cookies = headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .flat_map(|s| s.split_once('='))
        .filter(|s| s.0.trim() == AUTH_COOKIE)
        .map(|s| s.1.trim());
    let auth_headers = headers
        .get_all(AUTH_COOKIE)
        .into_iter()
        .filter_map(|h| h.to_str().ok());
    let bearer = headers
        .get_all(AUTHORIZATION)
        .into_iter()
        .filter_map(|h| h.to_str().ok())
        .filter_map(|h| h.strip_prefix("Bearer "));

    let mut seen = HashSet::new();
    cookies
        .chain(auth_headers)
        .chain(bearer)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
