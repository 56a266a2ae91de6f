use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for deciding which discovered links recursive extraction follows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Whether links may leave the start page's domain
    #[serde(default = "default_allow_external")]
    pub allow_external: bool,

    /// Domain restriction (if None, the start page's domain applies when
    /// external links are disallowed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_domain: Option<String>,

    /// Path prefix restriction (if None, all paths are allowed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_path_prefix: Option<String>,

    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

/// Links lead anywhere unless configured otherwise
fn default_allow_external() -> bool {
    true
}

/// Static assets and binary documents are never parsed as pages
fn default_exclude_patterns() -> Vec<String> {
    vec![
        r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|svg|woff|woff2|ttf|eot|pdf|zip|gz|mp3|mp4)$"
            .to_string(),
    ]
}

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            allow_external: default_allow_external(),
            required_domain: None,
            required_path_prefix: None,
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// URL filter that uses regex patterns and scope rules to decide which links to follow
#[derive(Debug)]
pub struct UrlFilter {
    config: UrlFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(UrlFilterConfig::default()).expect("Default regex patterns should be valid")
    }
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Create a filter scoped to the page extraction starts from.
    ///
    /// When external links are disallowed and no domain is configured, the
    /// start page's domain becomes the required one.
    pub fn for_start_page(mut config: UrlFilterConfig, start: &Url) -> Result<Self, regex::Error> {
        if !config.allow_external && config.required_domain.is_none() {
            config.required_domain = start.domain().map(|d| d.to_string());
        }
        Self::new(config)
    }

    /// Determine if a link should be followed based on all filtering rules
    pub fn should_follow(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_domain_scope(url) || !self.is_in_path_scope(url) {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|r| r.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|r| r.is_match(url_str))
    }

    /// Check if a URL is within the allowed domain scope
    fn is_in_domain_scope(&self, url: &Url) -> bool {
        match &self.config.required_domain {
            Some(required) => url.domain() == Some(required.as_str()),
            None => self.config.allow_external,
        }
    }

    /// Check if a URL is within the required path scope
    fn is_in_path_scope(&self, url: &Url) -> bool {
        match &self.config.required_path_prefix {
            Some(prefix) => url.path().starts_with(prefix),
            None => true,
        }
    }

    /// Create a normalized version of the URL (e.g., removing fragments)
    pub fn normalize_url(&self, url: &Url) -> Url {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        normalized
    }
}
