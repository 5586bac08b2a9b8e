use crate::backend::{api::api_routes, database::GlitchContext, utils::error::BackendResult};
use axum::{middleware::from_fn_with_state, Router};
use log::info;
use middleware::auth_middleware;
use pages::page_routes;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

mod middleware;
mod pages;
pub(super) mod setup;

/// Complete router with api, pages and middleware.
pub fn app(context: Arc<GlitchContext>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .merge(page_routes())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .route_layer(from_fn_with_state(context.clone(), auth_middleware))
        .with_state(context)
}

pub(super) async fn start_server(
    context: Arc<GlitchContext>,
    override_addr: Option<SocketAddr>,
    notify_start: Option<oneshot::Sender<()>>,
) -> BackendResult<()> {
    let addr = match override_addr {
        Some(addr) => addr,
        None => context.conf.bind_addr()?,
    };
    let app = app(context);

    info!("Listening on {}", &addr);
    let listener = TcpListener::bind(&addr).await?;
    if let Some(notify_start) = notify_start {
        // Receiver may already be gone, which is fine
        let _ = notify_start.send(());
    }
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
