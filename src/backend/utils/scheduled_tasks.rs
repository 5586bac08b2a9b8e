use crate::backend::{
    database::{account::delete_idle_anonymous, report::sweep_expired_reports, DbPool},
    utils::{config::GlitchConfigModeration, error::BackendResult},
};
use chrono::Utc;
use clokwerk::{Scheduler, TimeUnits};
use log::{error, info};
use std::{ops::DerefMut, thread, time::Duration};

pub fn start(pool: DbPool, conf: GlitchConfigModeration) {
    let mut scheduler = Scheduler::new();

    expire_reports(&pool, &conf).inspect_err(|e| error!("{e}")).ok();
    let pool_ = pool.clone();
    let conf_ = conf.clone();
    scheduler.every(1.hour()).run(move || {
        expire_reports(&pool_, &conf_)
            .inspect_err(|e| error!("{e}"))
            .ok();
    });

    scheduler.every(1.hour()).run(move || {
        anonymous_cleanup(&pool, &conf)
            .inspect_err(|e| error!("{e}"))
            .ok();
    });

    // Runs on its own thread, see `backend::start`
    loop {
        scheduler.run_pending();
        thread::sleep(Duration::from_secs(60));
    }
}

fn expire_reports(pool: &DbPool, conf: &GlitchConfigModeration) -> BackendResult<()> {
    let mut conn = pool.get()?;
    let (deleted, backfilled) =
        sweep_expired_reports(conn.deref_mut(), conf.report_ttl_hours, Utc::now())?;
    info!("Deleted {deleted} expired reports, set expiry on {backfilled}");
    Ok(())
}

fn anonymous_cleanup(pool: &DbPool, conf: &GlitchConfigModeration) -> BackendResult<()> {
    let mut conn = pool.get()?;
    let deleted = delete_idle_anonymous(
        conn.deref_mut(),
        conf.anonymous_session_ttl_hours,
        Utc::now(),
    )?;
    info!("Deleted {deleted} idle anonymous accounts");
    Ok(())
}
