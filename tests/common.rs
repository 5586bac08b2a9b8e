#![expect(clippy::unwrap_used)]

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};
use glitchrealm::backend::{
    database::GlitchContext,
    server::app,
    utils::config::{GlitchConfig, GlitchConfigDatabase},
};
use log::{warn, LevelFilter};
use std::{
    env::current_dir,
    fs::create_dir_all,
    process::{Command, Stdio},
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
        Once,
    },
    time::Duration,
};
use tower::ServiceExt;

/// Router backed by a pool which never connects. Requests which dont touch the database behave
/// as in production, the others fail quickly.
pub fn test_app(conf: GlitchConfig) -> Router {
    let manager = ConnectionManager::<PgConnection>::new("postgres://invalid@127.0.0.1:1/none");
    let db_pool = Pool::builder()
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(200))
        .build_unchecked(manager);
    app(Arc::new(GlitchContext::new(db_pool, conf)))
}

pub async fn send(app: Router, request: Request<Body>) -> anyhow::Result<Response> {
    Ok(app.oneshot(request).await?)
}

pub async fn body_text(res: Response) -> anyhow::Result<String> {
    let bytes = to_bytes(res.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// `name=value` of the login cookie set by a response, for sending it back.
pub fn login_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|c| c.starts_with("auth="))
        .and_then(|c| c.split(';').next())
        .map(ToString::to_string)
}

/// Postgres started for a single test, with migrations applied. Stopped again on drop.
pub struct TestDb {
    pub context: Arc<GlitchContext>,
    db_path: String,
}

impl TestDb {
    /// Returns `None` if no postgres server can be started on this machine, so that the test
    /// can skip its storage checks.
    pub fn start() -> Option<Self> {
        Self::start_with(GlitchConfig::default())
    }

    pub fn start_with(conf: GlitchConfig) -> Option<Self> {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            env_logger::builder()
                .filter_level(LevelFilter::Warn)
                .is_test(true)
                .init();
        });

        // Use different db paths to allow parallel tests
        static COUNTER: AtomicI32 = AtomicI32::new(0);
        let current_run = COUNTER.fetch_add(1, Ordering::Relaxed);
        let db_path = generate_db_path(current_run);

        stop_db(&db_path);
        let started = Command::new("./scripts/start_test_db.sh")
            .arg(&db_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success());
        if !started {
            warn!("Failed to start postgres in {db_path}, skipping database test");
            return None;
        }

        let conf = GlitchConfig {
            database: GlitchConfigDatabase {
                connection_url: format!(
                    "postgresql://glitchrealm:password@/glitchrealm?host={db_path}"
                ),
                ..Default::default()
            },
            ..conf
        };
        let context = GlitchContext::init(conf).unwrap();
        Some(Self {
            context: Arc::new(context),
            db_path,
        })
    }

    pub fn app(&self) -> Router {
        app(self.context.clone())
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        stop_db(&self.db_path);
    }
}

/// Generate a unique db path for each postgres so that tests can run in parallel.
fn generate_db_path(run: i32) -> String {
    let path = format!(
        "{}/target/test_db/glitchrealm-{}-{run}",
        current_dir().unwrap().display(),
        std::process::id()
    );
    create_dir_all(&path).unwrap();
    path
}

fn stop_db(db_path: &str) {
    Command::new("./scripts/stop_test_db.sh")
        .arg(db_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok();
}
