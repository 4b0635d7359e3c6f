//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use boxo_commerce::prelude::*;
use tracing::debug;

use crate::config::CliConfig;
use crate::lock::StateLock;
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// File the configuration came from, if any.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
    /// Store snapshot location.
    pub state_path: PathBuf,
}

/// A loaded store and an orchestrator over it. Holds the state lock, so no
/// other boxo process reads or writes the state until the session is dropped.
pub struct Session {
    pub store: Arc<MemoryStore>,
    pub orchestrator: OrderOrchestrator,
    lock: StateLock,
}

impl Session {
    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, state_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(resolve(&cwd, Path::new(path))),
            None => CliConfig::find(&cwd),
        };
        let config = match &config_path {
            Some(path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };

        Ok(Self::new(config, config_path, cwd, state_path, output))
    }

    /// Assemble a context. The state file is resolved against the config
    /// file's directory, or the working directory when given on the
    /// command line or when there is no config file.
    pub fn new(
        config: CliConfig,
        config_path: Option<PathBuf>,
        cwd: PathBuf,
        state_path: Option<&str>,
        output: Output,
    ) -> Self {
        let state_path = match state_path {
            Some(path) => resolve(&cwd, Path::new(path)),
            None => {
                let base = config_path
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.clone());
                resolve(&base, &config.store.state_file)
            }
        };

        Self {
            config,
            config_path,
            output,
            cwd,
            state_path,
        }
    }

    /// Load the persisted store, or seed a fresh one from the config.
    pub fn open_store(&self) -> Result<Arc<MemoryStore>> {
        if self.state_path.exists() {
            let json = std::fs::read_to_string(&self.state_path).with_context(|| {
                format!("Failed to read state file: {}", self.state_path.display())
            })?;
            let store = MemoryStore::from_json(&json).with_context(|| {
                format!("Failed to parse state file: {}", self.state_path.display())
            })?;
            debug!(path = %self.state_path.display(), "Loaded store snapshot");
            return Ok(Arc::new(store));
        }

        let store = MemoryStore::new();
        self.config.seed.apply(&store)?;
        debug!(
            books = self.config.seed.books.len(),
            discounts = self.config.seed.discounts.len(),
            addresses = self.config.seed.addresses.len(),
            "Seeded fresh store"
        );
        Ok(Arc::new(store))
    }

    /// Write the store snapshot, replacing the previous one.
    pub fn save_store(&self, store: &MemoryStore) -> Result<()> {
        if let Some(dir) = self.state_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let json = store.to_json()?;
        let tmp = self.state_path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.state_path).with_context(|| {
            format!("Failed to replace state file: {}", self.state_path.display())
        })?;
        debug!(path = %self.state_path.display(), "Saved store snapshot");
        Ok(())
    }

    /// Lock the state, open the store and build an orchestrator over it.
    pub async fn session(&self) -> Result<Session> {
        let lock = StateLock::acquire(&self.state_path, self.config.store.lock_timeout()).await?;
        let store = self.open_store()?;
        let orchestrator = OrderOrchestrator::new(
            Stores::shared(store.clone()),
            Arc::new(TracingChannel),
            self.config.checkout.clone(),
        );
        Ok(Session {
            store,
            orchestrator,
            lock,
        })
    }

    /// Persist a session's store.
    pub fn commit(&self, session: &Session) -> Result<()> {
        self.save_store(&session.store)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate_default_config;

    fn context_in(dir: &Path) -> Context {
        let config_path = dir.join("boxo.toml");
        std::fs::write(&config_path, generate_default_config()).unwrap();
        let config = CliConfig::load(&config_path).unwrap();
        Context::new(
            config,
            Some(config_path),
            dir.join("elsewhere"),
            None,
            Output::new(false, true),
        )
    }

    #[test]
    fn test_state_path_is_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_in(dir.path());
        assert_eq!(ctx.state_path, dir.path().join(".boxo/state.json"));

        let ctx = Context::new(
            CliConfig::default(),
            None,
            dir.path().to_path_buf(),
            Some("custom.json"),
            Output::new(false, false),
        );
        assert_eq!(ctx.state_path, dir.path().join("custom.json"));
    }

    #[tokio::test]
    async fn test_state_survives_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_in(dir.path());
        let user = UserId::new("demo");
        let book = BookId::new("dac-nhan-tam");

        let session = ctx.session().await.unwrap();
        session
            .orchestrator
            .carts()
            .add_item(&user, &book, 3)
            .await
            .unwrap();
        ctx.commit(&session).unwrap();
        assert!(ctx.state_path.exists());
        drop(session);

        let reopened = ctx.session().await.unwrap();
        let cart = reopened.orchestrator.carts().get_cart(&user).await.unwrap();
        assert_eq!(cart.get_item(&book).unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_sessions_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_in(dir.path());
        ctx.config.store.lock_timeout_ms = 100;
        let user = UserId::new("demo");
        let book = BookId::new("dac-nhan-tam");

        let first = ctx.session().await.unwrap();
        let blocked = ctx.session().await.err().unwrap();
        assert!(blocked.to_string().contains("locked by another boxo process"));

        first
            .orchestrator
            .carts()
            .add_item(&user, &book, 1)
            .await
            .unwrap();
        ctx.commit(&first).unwrap();
        drop(first);

        // The next session starts from the committed state, not a stale copy.
        let second = ctx.session().await.unwrap();
        second
            .orchestrator
            .carts()
            .add_item(&user, &book, 1)
            .await
            .unwrap();
        ctx.commit(&second).unwrap();
        drop(second);

        let third = ctx.session().await.unwrap();
        let cart = third.orchestrator.carts().get_cart(&user).await.unwrap();
        assert_eq!(cart.get_item(&book).unwrap().quantity, 2);
    }

    #[test]
    fn test_fresh_store_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_in(dir.path());
        let store = ctx.open_store().unwrap();
        assert_eq!(store.stock_of(&BookId::new("dac-nhan-tam")), Some(20));
    }
}
