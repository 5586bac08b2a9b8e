use super::{auth_token, check_is_developer, UserExt};
use crate::{
    backend::{
        database::GlitchContext,
        submissions::MAX_SUBMISSIONS,
        utils::error::{BackendError, BackendResult},
    },
    common::{
        moderation::{GameSubmission, ListSubmissionsParams, SubmissionParams},
        Auth,
        SuccessResponse,
    },
};
use axum::{
    extract::{Query, State},
    Extension,
    Form,
    Json,
};
use axum_macros::debug_handler;
use log::info;
use std::sync::Arc;

fn check_id(params: &SubmissionParams) -> BackendResult<&str> {
    let id = params.id.trim();
    if id.is_empty() {
        return Err(BackendError::bad_request("Submission id is required"));
    }
    Ok(id)
}

#[debug_handler]
pub(in crate::backend) async fn list_submissions(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    auth: Option<Extension<Auth>>,
    Query(query): Query<ListSubmissionsParams>,
) -> BackendResult<Json<Vec<GameSubmission>>> {
    check_is_developer(&user, &context)?;
    let token = auth_token(&auth)?;
    let limit = query.limit.unwrap_or(MAX_SUBMISSIONS);
    let submissions = context
        .submissions
        .list(&token, &query.status, limit)
        .await?;
    Ok(Json(submissions))
}

#[debug_handler]
pub(in crate::backend) async fn publish_submission(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    auth: Option<Extension<Auth>>,
    Form(params): Form<SubmissionParams>,
) -> BackendResult<Json<SuccessResponse>> {
    check_is_developer(&user, &context)?;
    let token = auth_token(&auth)?;
    let id = check_id(&params)?;
    context.submissions.publish(&token, id).await?;
    info!("Submission {id} published by {}", user.uid);
    Ok(Json(SuccessResponse::default()))
}

#[debug_handler]
pub(in crate::backend) async fn unpublish_submission(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    auth: Option<Extension<Auth>>,
    Form(params): Form<SubmissionParams>,
) -> BackendResult<Json<SuccessResponse>> {
    check_is_developer(&user, &context)?;
    let token = auth_token(&auth)?;
    let id = check_id(&params)?;
    context.submissions.unpublish(&token, id).await?;
    info!("Submission {id} unpublished by {}", user.uid);
    Ok(Json(SuccessResponse::default()))
}

#[debug_handler]
pub(in crate::backend) async fn delete_submission(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    auth: Option<Extension<Auth>>,
    Query(params): Query<SubmissionParams>,
) -> BackendResult<Json<SuccessResponse>> {
    check_is_developer(&user, &context)?;
    let token = auth_token(&auth)?;
    let id = check_id(&params)?;
    context.submissions.delete(&token, id).await?;
    info!("Submission {id} deleted by {}", user.uid);
    Ok(Json(SuccessResponse::default()))
}
