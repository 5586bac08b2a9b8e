use super::UserExt;
use crate::{
    backend::{
        database::GlitchContext,
        utils::error::{BackendError, BackendResult},
    },
    common::{
        newtypes::Uid,
        sso::{AuthSnapshot, SsoEnvelope, SsoStatusParams, SSO_SECRET_HEADER},
        SuccessResponse,
    },
};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use axum_macros::debug_handler;
use futures::{stream, Stream};
use http::HeaderMap;
use log::{debug, warn};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};

/// Receives messages from sibling sites.
#[debug_handler]
pub(in crate::backend) async fn sso_inbox(
    State(context): State<Arc<GlitchContext>>,
    headers: HeaderMap,
    Json(envelope): Json<SsoEnvelope>,
) -> BackendResult<Json<SuccessResponse>> {
    let secret = headers.get(SSO_SECRET_HEADER).and_then(|h| h.to_str().ok());
    if !context.sso.verify_secret(secret) {
        return Err(BackendError::forbidden("Invalid sso secret"));
    }
    debug!("Received sso message from {}", envelope.origin);
    context.sso.receive(envelope);
    Ok(Json(SuccessResponse::default()))
}

/// Sign-in changes of the current user, so that all open tabs stay in sync. Starts with the
/// latest known state.
#[debug_handler]
pub(in crate::backend) async fn sso_events(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let uid = user.uid.clone();
    let initial = context.sso.latest(&uid);
    let receiver = context.sso.subscribe();
    let stream = stream::unfold(
        (receiver, initial, uid),
        |(mut receiver, initial, uid)| async move {
            let snapshot = match initial {
                Some(snapshot) => snapshot,
                None => next_for_user(&mut receiver, &uid).await?,
            };
            let event = Ok::<_, Infallible>(snapshot_event(&snapshot));
            Some((event, (receiver, None, uid)))
        },
    );
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Waits for the next snapshot of the given user, `None` once the hub is gone.
async fn next_for_user(
    receiver: &mut broadcast::Receiver<AuthSnapshot>,
    uid: &Uid,
) -> Option<AuthSnapshot> {
    loop {
        match receiver.recv().await {
            Ok(snapshot) if snapshot.uid.as_ref() == Some(uid) => return Some(snapshot),
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => debug!("Sso stream skipped {n} updates"),
            Err(RecvError::Closed) => return None,
        }
    }
}

fn snapshot_event(snapshot: &AuthSnapshot) -> Event {
    Event::default()
        .event("auth")
        .json_data(snapshot)
        .unwrap_or_else(|e| {
            warn!("Failed to serialize auth snapshot: {e}");
            Event::default().event("error").data("Invalid auth snapshot")
        })
}

/// Asks a sibling site for the sign-in state of the current user.
#[debug_handler]
pub(in crate::backend) async fn sso_status(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Query(params): Query<SsoStatusParams>,
) -> BackendResult<Json<Option<AuthSnapshot>>> {
    let snapshot = context.sso.request_status(&params.origin, &user.uid).await?;
    Ok(Json(snapshot))
}
