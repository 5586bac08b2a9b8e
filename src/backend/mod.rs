use database::GlitchContext;
use log::info;
use server::{setup::setup_admin, start_server};
use std::{net::SocketAddr, sync::Arc, thread};
use tokio::sync::oneshot;
use utils::{config::GlitchConfig, error::BackendResult, scheduled_tasks};

pub mod api;
pub mod database;
pub mod render;
pub mod server;
pub mod sso;
pub mod storage;
pub mod submissions;
pub mod utils;

pub async fn start(
    config: GlitchConfig,
    override_addr: Option<SocketAddr>,
    notify_start: Option<oneshot::Sender<()>>,
) -> BackendResult<()> {
    let mut context = GlitchContext::init(config)?;

    let admin = setup_admin(&context)?;
    context.developers = context.developers.with(admin);
    info!("{} developer accounts", context.developers.len());

    let db_pool = context.db_pool.clone();
    let moderation = context.conf.moderation.clone();
    thread::spawn(move || {
        scheduled_tasks::start(db_pool, moderation);
    });

    start_server(Arc::new(context), override_addr, notify_start).await?;

    Ok(())
}
