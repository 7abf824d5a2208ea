use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8081/api";
pub const DEFAULT_STORAGE_FILE: &str = "brightaid_storage.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings shared by the CLI and the companion server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub storage_path: PathBuf,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_FILE),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Reads `BRIGHTAID_API_URL`, `BRIGHTAID_STORAGE` and
    /// `BRIGHTAID_TIMEOUT_SECS`, falling back to the defaults.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("BRIGHTAID_API_URL") {
            config.base_url = url;
        }
        if let Ok(path) = env::var("BRIGHTAID_STORAGE") {
            config.storage_path = PathBuf::from(path);
        }
        if let Some(secs) = env::var("BRIGHTAID_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }
}
