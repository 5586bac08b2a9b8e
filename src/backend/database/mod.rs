use crate::{
    backend::{
        sso::SsoHub,
        storage::{ObjectStorage, SupabaseStorage},
        submissions::SubmissionsClient,
        utils::{config::GlitchConfig, error::BackendResult},
    },
    common::{access::DeveloperAllowlist, newtypes::Uid},
};
use anyhow::anyhow;
use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
    QueryDsl,
    RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use moka::sync::Cache;
use schema::jwt_secret;
use std::{env::var, ops::DerefMut, sync::Arc, time::Duration};
use tokio::sync::broadcast;

pub mod account;
pub mod article;
pub mod notification;
pub mod report;
pub(crate) mod schema;
pub mod settings;
pub mod system_status;
pub mod verification;
pub mod verified;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Shared state of the running site, available to all handlers.
#[derive(Clone)]
pub struct GlitchContext {
    pub db_pool: DbPool,
    pub conf: GlitchConfig,
    pub developers: DeveloperAllowlist,
    pub sso: Arc<SsoHub>,
    pub storage: Arc<dyn ObjectStorage>,
    pub submissions: SubmissionsClient,
    /// Fires whenever the notification feed changes
    pub notification_updates: broadcast::Sender<()>,
    /// Verified usernames by uid, `None` if the user is not verified
    pub username_cache: Cache<Uid, Option<String>>,
}

impl GlitchContext {
    /// Connects to the database and runs pending migrations.
    pub fn init(config: GlitchConfig) -> BackendResult<Self> {
        let database_url =
            var("DATABASE_URL").unwrap_or(config.database.connection_url.clone());
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let db_pool = Pool::builder()
            .max_size(config.database.pool_size)
            .build(manager)?;

        db_pool
            .get()?
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
        Ok(Self::new(db_pool, config))
    }

    /// Builds the context around an existing pool, without touching the database.
    pub fn new(db_pool: DbPool, conf: GlitchConfig) -> Self {
        let http = reqwest::Client::new();
        let storage = SupabaseStorage::new(conf.storage.clone(), http.clone());
        let (notification_updates, _) = broadcast::channel(16);
        let username_cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(conf.options.username_cache_secs))
            .build();
        GlitchContext {
            db_pool,
            developers: DeveloperAllowlist::new(conf.access.developers.clone()),
            sso: Arc::new(SsoHub::new(conf.sso.clone(), http.clone())),
            storage: Arc::new(storage),
            submissions: SubmissionsClient::new(conf.submissions.api_base.clone(), http),
            notification_updates,
            username_cache,
            conf,
        }
    }

    pub fn is_developer(&self, uid: &Uid) -> bool {
        self.developers.contains(uid)
    }
}

pub fn read_jwt_secret(context: &GlitchContext) -> BackendResult<String> {
    let mut conn = context.db_pool.get()?;
    Ok(jwt_secret::table
        .select(jwt_secret::dsl::secret)
        .first(conn.deref_mut())?)
}
