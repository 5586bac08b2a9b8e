use super::{check_is_developer, UserExt};
use crate::{
    backend::{
        database::{notification::NotificationInsertForm, GlitchContext},
        utils::error::{BackendError, BackendResult},
    },
    common::{
        notifications::{CreateNotificationParams, MarkAsReadParams, Notification, UnreadCount},
        SuccessResponse,
    },
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Form,
    Json,
};
use axum_macros::debug_handler;
use futures::{stream, Stream};
use log::warn;
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast::error::RecvError;

#[debug_handler]
pub(in crate::backend) async fn list_notifications(
    State(context): State<Arc<GlitchContext>>,
) -> BackendResult<Json<Vec<Notification>>> {
    Ok(Json(Notification::list(&context)?))
}

#[debug_handler]
pub(in crate::backend) async fn count_notifications(
    State(context): State<Arc<GlitchContext>>,
) -> BackendResult<Json<UnreadCount>> {
    let unread = Notification::count_unread(&context)?;
    Ok(Json(UnreadCount { unread }))
}

#[debug_handler]
pub(in crate::backend) async fn mark_as_read(
    State(context): State<Arc<GlitchContext>>,
    _user: UserExt,
    Form(params): Form<MarkAsReadParams>,
) -> BackendResult<Json<SuccessResponse>> {
    Notification::mark_as_read(params.id, &context)?;
    Ok(Json(SuccessResponse::default()))
}

#[debug_handler]
pub(in crate::backend) async fn create_notification(
    State(context): State<Arc<GlitchContext>>,
    user: UserExt,
    Form(params): Form<CreateNotificationParams>,
) -> BackendResult<Json<Notification>> {
    check_is_developer(&user, &context)?;
    let title = params.title.trim();
    if title.is_empty() {
        return Err(BackendError::bad_request("Notification title is required"));
    }
    let form = NotificationInsertForm {
        title: title.to_string(),
        body: params.body.trim().to_string(),
        kind: params.kind,
        priority: params.priority,
    };
    Ok(Json(Notification::create(&form, &context)?))
}

/// Emits the unread count right away, and again after every change to the feed.
#[debug_handler]
pub(in crate::backend) async fn notification_stream(
    State(context): State<Arc<GlitchContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = context.notification_updates.subscribe();
    let stream = stream::unfold(
        (context, receiver, true),
        |(context, mut receiver, first)| async move {
            if !first {
                match receiver.recv().await {
                    // Missed updates still mean the count changed
                    Ok(()) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return None,
                }
            }
            let event = unread_event(&context);
            Some((Ok::<_, Infallible>(event), (context, receiver, false)))
        },
    );
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn unread_event(context: &GlitchContext) -> Event {
    let event = Notification::count_unread(context).and_then(|unread| {
        Event::default()
            .event("unread")
            .json_data(UnreadCount { unread })
            .map_err(BackendError::from)
    });
    match event {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to read unread count: {e}");
            Event::default().event("error").data("Failed to read unread count")
        }
    }
}
