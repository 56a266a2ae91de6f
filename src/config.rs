use crate::filter::UrlFilterConfig;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Environment variable that seeds the analysis API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration for element extraction and the surrounding session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// How many links deep recursive extraction follows
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Base timeout for fetching a linked page, grown for long URLs
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Which discovered links recursive extraction may follow
    #[serde(default)]
    pub link_filter: UrlFilterConfig,

    /// Delay between consecutive PDF downloads
    #[serde(default = "default_download_stagger_ms")]
    pub download_stagger_ms: u64,

    /// Directory PDF downloads are written to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Model used for pattern suggestions
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// API root for pattern suggestions
    #[serde(default = "default_gemini_endpoint")]
    pub gemini_endpoint: String,

    /// JSON file holding the persisted session
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl ExtractorConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// API key from the environment, if set and non-empty
    pub fn api_key_from_env() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            user_agent: default_user_agent(),
            link_filter: UrlFilterConfig::default(),
            download_stagger_ms: default_download_stagger_ms(),
            download_dir: default_download_dir(),
            gemini_model: default_gemini_model(),
            gemini_endpoint: default_gemini_endpoint(),
            store_path: default_store_path(),
        }
    }
}

/// Default value for max_depth
fn default_max_depth() -> usize {
    2
}

/// Default value for fetch_timeout_ms
fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("yield-elements/{}", env!("CARGO_PKG_VERSION"))
}

/// Default value for download_stagger_ms
fn default_download_stagger_ms() -> u64 {
    500
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-exp".to_string()
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("yield-elements.json")
}
