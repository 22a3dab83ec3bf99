//! Application state wiring all services together.
//!
//! Services are generic over repository traits; `AppState` pins them to the
//! SQLite implementations and shares one set of generation providers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use avazon_core::content::{CatalogService, MusicService, RemixService, VideoService};
use avazon_core::prompt::{BoxPromptRegistry, PromptService};
use avazon_core::session::{AvatarCreationService, SessionDeps, SessionRegistry};
use avazon_infra::config::Secrets;
use avazon_infra::crypto::token::TokenSigner;
use avazon_infra::llm::create_provider;
use avazon_infra::providers::build_generators;
use avazon_infra::sqlite::pool::database_url;
use avazon_infra::sqlite::{
    DatabasePool, SqliteAvatarRepository, SqliteContentRepository, SqliteCreationRepository,
    SqlitePromptRepository, SqliteRemixRepository,
};
use avazon_types::config::AppConfig;

pub type ConcreteCreationService = AvatarCreationService<SqliteCreationRepository>;
pub type ConcreteMusicService = MusicService<SqliteContentRepository, SqliteAvatarRepository>;
pub type ConcreteVideoService = VideoService<SqliteContentRepository, SqliteAvatarRepository>;
pub type ConcreteRemixService = RemixService<SqliteRemixRepository, SqliteAvatarRepository>;
pub type ConcreteCatalogService = CatalogService<SqliteAvatarRepository>;
pub type ConcretePromptService = PromptService<SqlitePromptRepository>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub creation: Arc<ConcreteCreationService>,
    pub music: Arc<ConcreteMusicService>,
    pub video: Arc<ConcreteVideoService>,
    pub remix: Arc<ConcreteRemixService>,
    pub catalog: Arc<ConcreteCatalogService>,
    pub prompts: Arc<ConcretePromptService>,
    pub tokens: Arc<TokenSigner>,
    /// `None` disables the system prompt routes.
    pub admin_key: Option<Arc<SecretString>>,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Open the database and wire every service.
    ///
    /// # Errors
    ///
    /// Fails without `OPENAI_API_KEY` or `AVAZON_TOKEN_SECRET`, or when the
    /// database cannot be opened.
    pub async fn init(data_dir: PathBuf, config: AppConfig, secrets: Secrets) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let generators = build_generators(&config, &secrets, &data_dir).await;
        let Secrets {
            openai_api_key,
            token_secret,
            admin_key,
            ..
        } = secrets;
        let token_secret = token_secret
            .with_context(|| format!("{} must be set to sign access tokens", Secrets::TOKEN_SECRET))?;
        let llm = create_provider(&config.llm, openai_api_key)
            .with_context(|| format!("{} must be set", Secrets::OPENAI_API_KEY))?;
        let llm = Arc::new(llm);

        let db_pool = DatabasePool::new(&database_url(&data_dir, &config.database.file))
            .await
            .context("opening database")?;

        let creation_repo = Arc::new(SqliteCreationRepository::new(db_pool.clone()));
        let content_repo = Arc::new(SqliteContentRepository::new(db_pool.clone()));
        let avatar_repo = Arc::new(SqliteAvatarRepository::new(db_pool.clone()));
        let remix_repo = Arc::new(SqliteRemixRepository::new(db_pool.clone()));
        let prompt_repo = Arc::new(SqlitePromptRepository::new(db_pool.clone()));

        let prompt_service = PromptService::new(prompt_repo, Arc::clone(&llm), config.llm.model.clone());
        let registry = Arc::new(BoxPromptRegistry::new(prompt_service.clone()));

        let deps = SessionDeps {
            repo: creation_repo,
            prompts: Arc::clone(&registry),
            generators: generators.clone(),
            llm,
            model: config.llm.model.clone(),
            queue_capacity: config.session.queue_capacity,
        };
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(
            config.session.idle_timeout_secs,
        )));

        Ok(Self {
            creation: Arc::new(AvatarCreationService::new(deps, sessions)),
            music: Arc::new(MusicService::new(
                Arc::clone(&content_repo),
                Arc::clone(&avatar_repo),
                Arc::clone(&registry),
                generators.clone(),
            )),
            video: Arc::new(VideoService::new(
                content_repo,
                Arc::clone(&avatar_repo),
                Arc::clone(&registry),
                generators.clone(),
            )),
            remix: Arc::new(RemixService::new(remix_repo, Arc::clone(&avatar_repo), generators)),
            catalog: Arc::new(CatalogService::new(avatar_repo)),
            prompts: Arc::new(prompt_service),
            tokens: Arc::new(TokenSigner::new(token_secret)),
            admin_key: admin_key.map(Arc::new),
            config: Arc::new(config),
            data_dir,
            db_pool,
            shutdown: CancellationToken::new(),
        })
    }

    /// Start the idle session sweeper; it stops with `shutdown`.
    pub fn spawn_session_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let interval = Duration::from_secs(self.config.session.sweep_interval_secs);
        self.creation
            .registry()
            .spawn_sweeper(interval, self.shutdown.clone())
    }

    /// Stop background work and every live session.
    pub fn close(&self) {
        self.shutdown.cancel();
        self.creation.registry().shutdown_all();
    }
}
