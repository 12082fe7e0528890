use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use scatterview_core::config::{SourceSettings, StoreEnv};
use scatterview_core::error::Result;
use scatterview_core::source::{open_source, ScanList, ScanSource};

use crate::config::ServerConfig;

/// Supplies store URIs and API keys for one request.
pub trait EnvProvider: Send + Sync {
    fn store_env(&self) -> StoreEnv;
}

/// Reads the process environment, falling back to a `.env` file that is
/// re-read on every call. Variables already set in the process win.
pub struct DotenvProvider {
    path: PathBuf,
}

impl DotenvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn file_values(&self) -> HashMap<String, String> {
        match dotenvy::from_path_iter(&self.path) {
            Ok(iter) => iter.filter_map(|item| item.ok()).collect(),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No .env file loaded");
                HashMap::new()
            }
        }
    }
}

impl EnvProvider for DotenvProvider {
    fn store_env(&self) -> StoreEnv {
        let file = self.file_values();
        StoreEnv::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }
}

/// Fixed environment, independent of the process.
pub struct StaticEnv(pub StoreEnv);

impl EnvProvider for StaticEnv {
    fn store_env(&self) -> StoreEnv {
        self.0.clone()
    }
}

/// Opens the scan source a request reads from.
pub trait SourceFactory: Send + Sync {
    fn open(&self, settings: &SourceSettings) -> Result<Box<dyn ScanSource>>;
}

pub struct DefaultSourceFactory;

impl SourceFactory for DefaultSourceFactory {
    fn open(&self, settings: &SourceSettings) -> Result<Box<dyn ScanSource>> {
        open_source(settings)
    }
}

/// Scan order already handed out to clients for one source location.
#[derive(Debug)]
struct Session {
    location: String,
    scans: ScanList,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub env: Arc<dyn EnvProvider>,
    pub sources: Arc<dyn SourceFactory>,
    session: Arc<Mutex<Option<Session>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let env = DotenvProvider::new(config.env_file.clone());
        Self {
            config: Arc::new(config),
            env: Arc::new(env),
            sources: Arc::new(DefaultSourceFactory),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_env(mut self, env: impl EnvProvider + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_sources(mut self, sources: impl SourceFactory + 'static) -> Self {
        self.sources = Arc::new(sources);
        self
    }

    /// Merge a fresh listing into the session order for `location`.
    ///
    /// Scans keep the index they were first served under; a different
    /// location starts a new session.
    pub fn reconcile_scans(&self, location: &str, fresh: ScanList) -> ScanList {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let scans = match session.as_ref() {
            Some(s) if s.location == location => s.scans.reconcile(&fresh),
            Some(s) => {
                info!(previous = %s.location, location, "Scan source changed; resetting order");
                fresh
            }
            None => fresh,
        };
        *session = Some(Session {
            location: location.to_string(),
            scans: scans.clone(),
        });
        scans
    }
}
