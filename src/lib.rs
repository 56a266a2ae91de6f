// Re-export modules
pub mod ai;
pub mod classifier;
pub mod config;
pub mod crawlers;
pub mod dom;
pub mod download;
pub mod error;
pub mod filter;
pub mod parsers;
pub mod pdf;
pub mod protocol;
pub mod resolver;
pub mod results;
pub mod session;
pub mod store;
pub mod tree;
pub mod utils;
pub mod xpath;

// Re-export commonly used types for convenience
pub use config::ExtractorConfig;
pub use crawlers::{Extractor, Fetcher, HttpFetcher};
pub use dom::{Document, NodeId};
pub use protocol::{Host, Request, Response};
pub use results::{ElementRecord, PdfInfo};
pub use session::Session;
pub use tree::ResultTree;

use std::error::Error;
use std::path::Path;

/// Builder for a one-off extraction from a URL
pub struct Extraction {
    url: String,
    patterns: Vec<String>,
    recursive: bool,
    config: ExtractorConfig,
}

impl Extraction {
    /// Create a new extraction of the page at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            patterns: Vec::new(),
            recursive: true,
            config: ExtractorConfig::default(),
        }
    }

    /// Add pattern expressions to evaluate
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Follow links from matched elements (the default)
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set how many links deep recursive extraction goes
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let config = ExtractorConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a string
    pub fn with_config_str(self, config_str: &str) -> Result<Self, Box<dyn Error>> {
        let config = serde_json::from_str(config_str)?;
        Ok(self.with_config(config))
    }

    /// Fetch the page and extract matches, following links when recursive
    pub async fn run(self) -> Result<Vec<ElementRecord>, Box<dyn Error>> {
        let fetcher = HttpFetcher::new(&self.config.user_agent, self.config.fetch_timeout_ms)?;
        let extractor = Extractor::new(fetcher, self.config);
        let records = extractor
            .extract_url(&self.patterns, &self.url, self.recursive)
            .await?;
        Ok(records)
    }
}
