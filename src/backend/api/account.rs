use super::{empty_to_none, UserExt};
use crate::{
    backend::{
        database::{
            account::AccountUpdateForm,
            read_jwt_secret,
            GlitchContext,
        },
        storage::image_content_type,
        utils::{
            error::{BackendError, BackendResult},
            generate_object_path,
            validate::{
                validate_display_name,
                validate_image,
                validate_new_password,
                validate_user_name,
            },
        },
    },
    common::{
        article::{UploadParams, UploadResponse},
        moderation::VerifiedWriter,
        newtypes::Uid,
        sso::AuthSnapshot,
        user::{Account, LoginParams, MyProfile, RegisterParams, UpdateProfileParams},
        SuccessResponse,
        AUTH_COOKIE,
    },
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    Form,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, Expiration, SameSite};
use axum_macros::debug_handler;
use bcrypt::verify;
use chrono::Utc;
use jsonwebtoken::{
    decode,
    encode,
    get_current_timestamp,
    DecodingKey,
    EncodingKey,
    Header,
    Validation,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use url::Url;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// account.uid
    pub sub: String,
    /// Creation time as unix timestamp
    pub iat: i64,
    /// Expiration time
    pub exp: u64,
}

pub(crate) fn generate_login_token(
    account: &Account,
    context: &GlitchContext,
) -> BackendResult<String> {
    let claims = Claims {
        sub: account.uid.0.clone(),
        iat: Utc::now().timestamp(),
        exp: get_current_timestamp() + 60 * 60 * 24 * 365,
    };

    let secret = read_jwt_secret(context)?;
    let key = EncodingKey::from_secret(secret.as_bytes());
    let jwt = encode(&Header::default(), &claims, &key)?;
    Ok(jwt)
}

pub async fn validate(jwt: &str, context: &GlitchContext) -> BackendResult<Account> {
    let validation = Validation::default();
    let secret = read_jwt_secret(context)?;
    let key = DecodingKey::from_secret(secret.as_bytes());
    let claims = decode::<Claims>(jwt, &key, &validation)?;
    Account::read(&Uid(claims.claims.sub), context)
}

fn validate_password(account: &Account, password: &str) -> BackendResult<()> {
    let valid = account
        .password_encrypted
        .as_ref()
        .and_then(|pw| verify(password, pw).ok())
        .unwrap_or(false);
    if !valid {
        return Err(BackendError::forbidden("Invalid login"));
    }
    Ok(())
}

pub(crate) fn create_cookie(jwt: String, context: &GlitchContext) -> Cookie<'static> {
    let mut cookie = Cookie::build((AUTH_COOKIE, jwt));

    // Must not set cookie domain on localhost
    // https://stackoverflow.com/a/1188145
    let domain = Url::parse(&context.conf.sso.origin)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string));
    if let Some(domain) = domain {
        if domain != "localhost" && domain != "127.0.0.1" {
            cookie = cookie.domain(domain);
        }
    }
    cookie
        .same_site(SameSite::Strict)
        .path("/")
        .http_only(true)
        .secure(!cfg!(debug_assertions))
        .expires(Expiration::DateTime(
            OffsetDateTime::now_utc() + Duration::weeks(52),
        ))
        .build()
}

/// Sets the login cookie and tells other tabs and sibling sites about it.
pub(crate) fn sign_in(
    account: &Account,
    jar: CookieJar,
    context: &GlitchContext,
) -> BackendResult<CookieJar> {
    let token = generate_login_token(account, context)?;
    context.sso.publish(AuthSnapshot::signed_in(account));
    Ok(jar.add(create_cookie(token, context)))
}

fn sign_out(uid: &Uid, jar: CookieJar, context: &GlitchContext) -> CookieJar {
    context.sso.publish(AuthSnapshot::signed_out(uid));
    jar.remove(create_cookie(String::new(), context))
}

/// Removes the login cookie. Other tabs are only notified if the user was signed in.
pub(crate) fn clear_login(
    user: Option<&Account>,
    jar: CookieJar,
    context: &GlitchContext,
) -> CookieJar {
    match user {
        Some(user) => sign_out(&user.uid, jar, context),
        None => jar.remove(create_cookie(String::new(), context)),
    }
}

/// Checks username and password. Unknown users get the same error as wrong passwords.
pub(crate) fn authenticate(params: &LoginParams, context: &GlitchContext) -> BackendResult<Account> {
    let account = Account::read_from_name(&params.username, context)
        .map_err(|_| BackendError::forbidden("Invalid login"))?;
    validate_password(&account, &params.password)?;
    Account::mark_seen(&account.uid, context)?;
    Ok(account)
}

pub(crate) fn my_profile_of(
    account: Account,
    context: &GlitchContext,
) -> BackendResult<MyProfile> {
    let verified_writer = VerifiedWriter::is_verified(&account.uid, context)?;
    Ok(MyProfile {
        developer: context.is_developer(&account.uid),
        verified_writer,
        account,
    })
}

#[debug_handler]
pub(crate) async fn register_user(
    State(context): State<Arc<GlitchContext>>,
    jar: CookieJar,
    Form(mut params): Form<RegisterParams>,
) -> BackendResult<(CookieJar, Json<Account>)> {
    if !context.conf.options.registration_open {
        return Err(BackendError::forbidden("Registration is closed"));
    }
    validate_user_name(&params.username)?;
    validate_new_password(&params.password)?;
    empty_to_none(&mut params.display_name);
    empty_to_none(&mut params.email);
    validate_display_name(&params.display_name)?;
    if Account::read_from_name(&params.username, &context).is_ok() {
        return Err(BackendError::bad_request("Username is already taken"));
    }
    let account = Account::create_local(
        params.username,
        &params.password,
        params.display_name,
        params.email,
        &context,
    )?;
    info!("Registered account {}", account.uid);
    let jar = sign_in(&account, jar, &context)?;
    Ok((jar, Json(account)))
}

#[debug_handler]
pub(crate) async fn login_user(
    State(context): State<Arc<GlitchContext>>,
    jar: CookieJar,
    Form(params): Form<LoginParams>,
) -> BackendResult<(CookieJar, Json<Account>)> {
    let account = authenticate(&params, &context)?;
    let jar = sign_in(&account, jar, &context)?;
    Ok((jar, Json(account)))
}

#[debug_handler]
pub(crate) async fn anonymous_login(
    State(context): State<Arc<GlitchContext>>,
    jar: CookieJar,
) -> BackendResult<(CookieJar, Json<Account>)> {
    let account = Account::create_anonymous(&context)?;
    let jar = sign_in(&account, jar, &context)?;
    Ok((jar, Json(account)))
}

#[debug_handler]
pub(crate) async fn logout_user(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    jar: CookieJar,
) -> BackendResult<(CookieJar, Json<SuccessResponse>)> {
    let jar = clear_login(user.as_deref(), jar, &context);
    Ok((jar, Json(SuccessResponse::default())))
}

#[debug_handler]
pub(crate) async fn my_profile(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
) -> BackendResult<Json<MyProfile>> {
    Account::mark_seen(&user.uid, &context)?;
    Ok(Json(my_profile_of(user.inner(), &context)?))
}

#[debug_handler]
pub(crate) async fn update_profile(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(mut params): Form<UpdateProfileParams>,
) -> BackendResult<Json<Account>> {
    empty_to_none(&mut params.display_name);
    empty_to_none(&mut params.email);
    validate_display_name(&params.display_name)?;
    let form = AccountUpdateForm {
        display_name: params.display_name,
        email: params.email,
    };
    let account = Account::update_profile(&form, &user.uid, &context)?;
    context.sso.publish(AuthSnapshot::signed_in(&account));
    Ok(Json(account))
}

#[debug_handler]
pub(crate) async fn upload_avatar(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> BackendResult<Json<UploadResponse>> {
    let extension = validate_image(&params.file_name, body.len())?;
    let path = generate_object_path("avatars", &extension);
    let url = context
        .storage
        .upload(
            &context.conf.storage.avatars_bucket,
            &path,
            body.to_vec(),
            image_content_type(&extension),
        )
        .await?;
    let account = Account::update_avatar(&user.uid, &url, &context)?;
    context.sso.publish(AuthSnapshot::signed_in(&account));
    Ok(Json(UploadResponse { url }))
}

#[debug_handler]
pub(crate) async fn delete_account(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    jar: CookieJar,
) -> BackendResult<(CookieJar, Json<SuccessResponse>)> {
    Account::delete(&user.uid, &context)?;
    info!("Deleted account {}", user.uid);
    let jar = sign_out(&user.uid, jar, &context);
    context.sso.forget(&user.uid);
    Ok((jar, Json(SuccessResponse::default())))
}

/// Sent by the browser when a tab is closed. Removes anonymous accounts right away instead
/// of waiting for the scheduled cleanup. Never fails, as the browser ignores the response.
#[debug_handler]
pub(crate) async fn anonymous_cleanup(
    State(context): State<Arc<GlitchContext>>,
    user: Option<UserExt>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    let mut jar = jar;
    if let Some(user) = user.filter(|u| u.anonymous) {
        let deleted = Account::delete_if_anonymous(&user.uid, &context)
            .inspect_err(|e| log::warn!("Anonymous cleanup failed: {e}"))
            .unwrap_or(false);
        if deleted {
            jar = sign_out(&user.uid, jar, &context);
            context.sso.forget(&user.uid);
        }
    }
    (jar, Json(SuccessResponse::default()))
}
