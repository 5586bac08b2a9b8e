use super::{check_is_developer, empty_to_none, UserExt};
use crate::{
    backend::{
        database::{
            report::ReportInsertForm,
            verification::VerificationDecisionForm,
            verified::{VerifiedUserForm, VerifiedWriterForm},
            GlitchContext,
        },
        utils::{
            error::{BackendError, BackendResult},
            validate::validate_writer_uid,
        },
    },
    common::{
        moderation::{
            format_countdown,
            AddWriterParams,
            CreateReportParams,
            CreateVerificationParams,
            DecideVerificationParams,
            ListReportsParams,
            ListVerificationParams,
            MyVerificationParams,
            RemoveWriterParams,
            Report,
            ReportStatus,
            ReportView,
            UpdateReportStatusParams,
            VerificationKind,
            VerificationRequest,
            VerificationStatus,
            VerifiedUser,
            VerifiedWriter,
        },
        newtypes::Uid,
        SuccessResponse,
    },
};
use axum::{
    extract::{Query, State},
    Form,
    Json,
};
use axum_macros::debug_handler;
use chrono::Utc;
use log::info;
use std::sync::Arc;

#[debug_handler]
pub(in crate::backend) async fn create_report(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(params): Form<CreateReportParams>,
) -> BackendResult<Json<Report>> {
    let reason = params.reason.trim();
    if reason.is_empty() || params.target_id.trim().is_empty() {
        return Err(BackendError::bad_request("Report reason is required"));
    }
    let form = ReportInsertForm {
        source: params.source,
        target_id: params.target_id.trim().to_string(),
        reporter_uid: user.uid.clone(),
        reason: reason.to_string(),
    };
    Ok(Json(Report::create(&form, &context)?))
}

/// Reports with the time left until closed ones are deleted.
#[debug_handler]
pub(in crate::backend) async fn list_reports(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(query): Query<ListReportsParams>,
) -> BackendResult<Json<Vec<ReportView>>> {
    check_is_developer(&user, &context)?;
    let now = Utc::now();
    let reports = Report::list(query.source, &context)?
        .into_iter()
        .map(|report| {
            let countdown = report
                .expires_at
                .filter(|_| report.status == ReportStatus::Closed)
                .map(|e| format_countdown(e - now));
            ReportView { report, countdown }
        })
        .collect();
    Ok(Json(reports))
}

#[debug_handler]
pub(in crate::backend) async fn update_report_status(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(params): Form<UpdateReportStatusParams>,
) -> BackendResult<Json<Report>> {
    check_is_developer(&user, &context)?;
    let report = Report::update_status(params.id, params.status, &context)?;
    info!("Report {} set to {} by {}", report.id.0, report.status, user.uid);
    Ok(Json(report))
}

#[debug_handler]
pub(in crate::backend) async fn submit_verification(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Json(mut params): Json<CreateVerificationParams>,
) -> BackendResult<Json<VerificationRequest>> {
    params.display_name = params.display_name.trim().to_string();
    if params.display_name.is_empty() {
        return Err(BackendError::bad_request("Display name is required"));
    }
    empty_to_none(&mut params.message);
    params.links.retain(|l| !l.trim().is_empty());
    let request = VerificationRequest::submit(&user.uid, user.email.clone(), &params, &context)?;
    Ok(Json(request))
}

#[debug_handler]
pub(in crate::backend) async fn my_verification(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(query): Query<MyVerificationParams>,
) -> BackendResult<Json<Option<VerificationRequest>>> {
    Ok(Json(VerificationRequest::read(&user.uid, query.kind, &context)?))
}

#[debug_handler]
pub(in crate::backend) async fn list_verifications(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(query): Query<ListVerificationParams>,
) -> BackendResult<Json<Vec<VerificationRequest>>> {
    check_is_developer(&user, &context)?;
    Ok(Json(VerificationRequest::list(
        query.kind,
        query.filter,
        &context,
    )?))
}

/// Approving grants the verification first, so that a request is never marked approved
/// without the matching record.
#[debug_handler]
pub(in crate::backend) async fn decide_verification(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(mut params): Form<DecideVerificationParams>,
) -> BackendResult<Json<VerificationRequest>> {
    check_is_developer(&user, &context)?;
    let request = VerificationRequest::read(&params.uid, params.kind, &context)?
        .ok_or_else(|| BackendError::not_found("Verification request not found"))?;
    let now = Utc::now();
    let form = if params.approve {
        grant_verification(&request, &user.uid, &context)?;
        VerificationDecisionForm {
            status: VerificationStatus::Approved,
            rejection_reason: None,
            decided_at: Some(now),
            reviewer_id: Some(user.uid.clone()),
        }
    } else {
        empty_to_none(&mut params.reason);
        VerificationDecisionForm {
            status: VerificationStatus::refused(params.kind),
            rejection_reason: params.reason,
            decided_at: Some(now),
            reviewer_id: Some(user.uid.clone()),
        }
    };
    let request = VerificationRequest::decide(&params.uid, params.kind, &form, &context)?;
    info!(
        "Verification of {} as {} {} by {}",
        request.uid, request.kind, request.status, user.uid
    );
    Ok(Json(request))
}

fn grant_verification(
    request: &VerificationRequest,
    reviewer: &Uid,
    context: &GlitchContext,
) -> BackendResult<()> {
    let now = Utc::now();
    match request.kind {
        VerificationKind::Writer => {
            let form = VerifiedWriterForm {
                uid: request.uid.clone(),
                verified: true,
                display_name: Some(request.display_name.clone()),
                notes: None,
                verified_at: now,
                verified_by: Some(reviewer.clone()),
            };
            VerifiedWriter::upsert(&form, context)?;
        }
        VerificationKind::User => {
            let form = VerifiedUserForm {
                uid: request.uid.clone(),
                verified: true,
                username: Some(request.display_name.clone()),
                verification_types: vec!["user".to_string()],
                verified_at: now,
                reviewer_id: Some(reviewer.clone()),
            };
            VerifiedUser::upsert(&form, context)?;
        }
    }
    Ok(())
}

#[debug_handler]
pub(in crate::backend) async fn list_writers(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
) -> BackendResult<Json<Vec<VerifiedWriter>>> {
    check_is_developer(&user, &context)?;
    Ok(Json(VerifiedWriter::list(&context)?))
}

#[debug_handler]
pub(in crate::backend) async fn add_writer(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(mut params): Form<AddWriterParams>,
) -> BackendResult<Json<VerifiedWriter>> {
    check_is_developer(&user, &context)?;
    validate_writer_uid(&params.uid)?;
    empty_to_none(&mut params.display_name);
    empty_to_none(&mut params.notes);
    let form = VerifiedWriterForm {
        uid: Uid::from(params.uid.trim()),
        verified: true,
        display_name: params.display_name,
        notes: params.notes,
        verified_at: Utc::now(),
        verified_by: Some(user.uid.clone()),
    };
    let writer = VerifiedWriter::upsert(&form, &context)?;
    info!("{} added verified writer {}", user.uid, writer.uid);
    Ok(Json(writer))
}

#[debug_handler]
pub(in crate::backend) async fn remove_writer(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(params): Query<RemoveWriterParams>,
) -> BackendResult<Json<SuccessResponse>> {
    check_is_developer(&user, &context)?;
    VerifiedWriter::delete(&params.uid, &context)?;
    info!("{} removed verified writer {}", user.uid, params.uid);
    Ok(Json(SuccessResponse::default()))
}
