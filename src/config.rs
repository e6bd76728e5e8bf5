//! Runtime settings for cache resolution and container reads.
//!
//! Defaults can be overridden through environment variables so deployed
//! jobs can tune limits without code changes:
//!
//! - `LNDB_CACHE_DIR`: cache root for remote objects.
//! - `LNDB_FETCH_TIMEOUT_SECS`: timeout applied to each remote call.
//! - `LNDB_MAX_READ_ELEMS`: upper bound on elements materialized by one read.
//! - `LNDB_CACHE_NAMING`: `basename` or `hashed`.
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_READ_ELEMS: usize = 50_000_000;

/// How a remote identifier maps onto a file below the cache root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheNaming {
    /// `cache_root / basename(remote_id)`. Objects sharing a file name
    /// under different remote directories share one cache file.
    #[default]
    Basename,
    /// `cache_root / sha256(remote parent)[..16] / basename(remote_id)`.
    Hashed,
}

impl CacheNaming {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basename" => Some(CacheNaming::Basename),
            "hashed" => Some(CacheNaming::Hashed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_root: PathBuf,
    pub fetch_timeout: Option<Duration>,
    pub max_read_elems: usize,
    pub cache_naming: CacheNaming,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            fetch_timeout: None,
            max_read_elems: DEFAULT_MAX_READ_ELEMS,
            cache_naming: CacheNaming::default(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with any `LNDB_*` environment variables.
    ///
    /// Unparseable values are ignored rather than rejected.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        if let Some(dir) = env_var("LNDB_CACHE_DIR") {
            settings.cache_root = PathBuf::from(dir);
        }
        if let Some(secs) = env_var("LNDB_FETCH_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&v| v > 0)
        {
            settings.fetch_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(max) = env_var("LNDB_MAX_READ_ELEMS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
        {
            settings.max_read_elems = max;
        }
        if let Some(naming) = env_var("LNDB_CACHE_NAMING")
            .as_deref()
            .and_then(CacheNaming::parse)
        {
            settings.cache_naming = naming;
        }
        settings
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn with_max_read_elems(mut self, max: usize) -> Self {
        self.max_read_elems = max.max(1);
        self
    }

    pub fn with_cache_naming(mut self, naming: CacheNaming) -> Self {
        self.cache_naming = naming;
        self
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_cache_root() -> PathBuf {
    match env_var("HOME") {
        Some(home) => PathBuf::from(home).join(".cache").join("lndb"),
        None => std::env::temp_dir().join("lndb-cache"),
    }
}
