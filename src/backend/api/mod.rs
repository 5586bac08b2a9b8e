use crate::{
    backend::{
        database::GlitchContext,
        utils::{
            error::{BackendError, BackendResult},
            validate::validate_settings,
        },
    },
    common::{
        site::{SiteView, SystemStatus, UpdateStatusParams},
        user::{Account, UserSettings},
        Auth,
    },
};
use account::{
    anonymous_cleanup,
    anonymous_login,
    delete_account,
    login_user,
    logout_user,
    my_profile,
    my_profile_of,
    register_user,
    update_profile,
    upload_avatar,
};
use article::{
    create_article,
    delete_article,
    edit_article,
    get_article,
    latest_articles,
    list_articles,
    list_my_articles,
    list_tags,
    preview_article,
    upload_cover,
};
use axum::{
    extract::{rejection::ExtensionRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Extension,
    Form,
    Json,
    Router,
};
use axum_macros::{debug_handler, FromRequestParts};
use http::StatusCode;
use moderation::{
    add_writer,
    create_report,
    decide_verification,
    list_reports,
    list_verifications,
    list_writers,
    my_verification,
    remove_writer,
    submit_verification,
    update_report_status,
};
use notifications::{
    count_notifications,
    create_notification,
    list_notifications,
    mark_as_read,
    notification_stream,
};
use sso::{sso_events, sso_inbox, sso_status};
use std::{ops::Deref, sync::Arc};
use submissions::{delete_submission, list_submissions, publish_submission, unpublish_submission};

pub(crate) mod account;
pub(crate) mod article;
mod moderation;
mod notifications;
mod sso;
mod submissions;

pub fn api_routes() -> Router<Arc<GlitchContext>> {
    Router::new()
        .route(
            "/article",
            get(get_article)
                .post(create_article)
                .patch(edit_article)
                .delete(delete_article),
        )
        .route("/article/list", get(list_articles))
        .route("/article/tags", get(list_tags))
        .route("/article/latest", get(latest_articles))
        .route("/article/mine", get(list_my_articles))
        .route("/article/cover", post(upload_cover))
        .route("/article/preview", post(preview_article))
        .route("/report", post(create_report))
        .route("/report/list", get(list_reports))
        .route("/report/status", post(update_report_status))
        .route("/verification", post(submit_verification))
        .route("/verification/mine", get(my_verification))
        .route("/verification/list", get(list_verifications))
        .route("/verification/decide", post(decide_verification))
        .route("/writer", post(add_writer).delete(remove_writer))
        .route("/writer/list", get(list_writers))
        .route("/submission", axum::routing::delete(delete_submission))
        .route("/submission/list", get(list_submissions))
        .route("/submission/publish", post(publish_submission))
        .route("/submission/unpublish", post(unpublish_submission))
        .route("/notifications", post(create_notification))
        .route("/notifications/list", get(list_notifications))
        .route("/notifications/count", get(count_notifications))
        .route("/notifications/mark_as_read", post(mark_as_read))
        .route("/notifications/stream", get(notification_stream))
        .route("/sso/inbox", post(sso_inbox))
        .route("/sso/events", get(sso_events))
        .route("/sso/status", get(sso_status))
        .route("/account/register", post(register_user))
        .route("/account/login", post(login_user))
        .route("/account/anonymous", post(anonymous_login))
        .route("/account/anonymous/cleanup", post(anonymous_cleanup))
        .route("/account/logout", post(logout_user))
        .route("/account/my_profile", get(my_profile))
        .route("/account/update", post(update_profile))
        .route("/account/avatar", post(upload_avatar))
        .route("/account/delete", post(delete_account))
        .route("/user/settings", get(get_settings).put(replace_settings))
        .route("/site", get(site_view))
        .route("/site/status", post(update_status))
}

/// Developers have access to all gated features, eg moderation and cover uploads.
pub fn check_is_developer(user: &Account, context: &GlitchContext) -> BackendResult<()> {
    if !context.is_developer(&user.uid) {
        return Err(BackendError::forbidden(
            "Only developers can perform this action",
        ));
    }
    Ok(())
}

#[debug_handler]
pub(crate) async fn site_view(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
) -> BackendResult<Json<SiteView>> {
    let my_profile = match user {
        Some(user) => Some(my_profile_of(user.inner(), &context)?),
        None => None,
    };
    Ok(Json(SiteView {
        status: SystemStatus::read(&context)?,
        my_profile,
        options: context.conf.options.clone(),
    }))
}

#[debug_handler]
pub(crate) async fn update_status(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(mut params): Form<UpdateStatusParams>,
) -> BackendResult<Json<SystemStatus>> {
    check_is_developer(&user, &context)?;
    empty_to_none(&mut params.message);
    Ok(Json(SystemStatus::update(
        params.maintenance,
        params.message,
        &context,
    )?))
}

#[debug_handler]
pub(crate) async fn get_settings(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
) -> BackendResult<Json<UserSettings>> {
    Ok(Json(UserSettings::read(&user.uid, &context)?))
}

#[debug_handler]
pub(crate) async fn replace_settings(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Json(settings): Json<UserSettings>,
) -> BackendResult<Json<UserSettings>> {
    validate_settings(&settings)?;
    Ok(Json(UserSettings::replace(&user.uid, &settings, &context)?))
}

/// Trims the string param, and converts to None if it is empty
fn empty_to_none(val: &mut Option<String>) {
    if let Some(val_) = val {
        *val_ = val_.trim().to_string();
        if val_.is_empty() {
            *val = None
        }
    }
}

/// Login token of the current request, for calls to other services on behalf of the user.
fn auth_token(auth: &Option<Extension<Auth>>) -> BackendResult<String> {
    auth.as_ref()
        .and_then(|a| a.0 .0.clone())
        .ok_or_else(|| BackendError::forbidden("Login required"))
}

#[derive(FromRequestParts)]
#[from_request(rejection(NotLoggedInError))]
pub struct UserExt {
    #[from_request(via(Extension))]
    account: Account,
}

impl UserExt {
    pub fn inner(self) -> Account {
        self.account
    }
}
impl Deref for UserExt {
    type Target = Account;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}
impl From<ExtensionRejection> for NotLoggedInError {
    fn from(_: ExtensionRejection) -> Self {
        NotLoggedInError
    }
}
pub struct NotLoggedInError;

impl IntoResponse for NotLoggedInError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::FORBIDDEN, "Login required").into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_to_none() {
        let mut val = Some("  ".to_string());
        empty_to_none(&mut val);
        assert_eq!(None, val);

        let mut val = Some(" Neo ".to_string());
        empty_to_none(&mut val);
        assert_eq!(Some("Neo".to_string()), val);
    }

    #[test]
    fn test_not_logged_in_is_forbidden() {
        let res = NotLoggedInError.into_response();
        assert_eq!(StatusCode::FORBIDDEN, res.status());
    }
}
