use crate::config::ExtractorConfig;
use crate::crawlers::Fetcher;
use crate::dom::Document;
use crate::error::ExtractError;
use crate::filter::UrlFilter;
use crate::parsers::parse_document;
use crate::results::ElementRecord;
use crate::xpath::XPath;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use url::Url;

type PageFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ElementRecord>, ExtractError>> + Send + 'a>>;

/// State shared by every page of one extraction run
struct Run<'r> {
    current: &'r Document,
    patterns: &'r [XPath],
    filter: UrlFilter,
    /// Normalized URLs already processed in this run
    visited: HashSet<String>,
}

/// Evaluates pattern expressions against a page and, recursively, the pages it links to.
///
/// Linked pages are fetched as static markup and parsed without running
/// scripts. Recursion stops at `max_depth` links from the start page, and a
/// page reachable through several links is only ever evaluated once per run.
pub struct Extractor<F: Fetcher> {
    fetcher: F,
    config: ExtractorConfig,
    cancel: CancellationToken,
}

impl<F: Fetcher> Extractor<F> {
    pub fn new(fetcher: F, config: ExtractorConfig) -> Self {
        Self {
            fetcher,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts runs of this extractor when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Extracts matches from the page at `url`, fetching it first
    pub async fn extract_url(
        &self,
        patterns: &[String],
        url: &str,
        recursive: bool,
    ) -> Result<Vec<ElementRecord>, ExtractError> {
        let page = self.load(url).await?;
        self.extract(patterns, &page, recursive).await
    }

    /// Fetches and parses a page, honouring cancellation
    pub async fn load(&self, url: &str) -> Result<Document, ExtractError> {
        let body = self.fetch(url).await?;
        Ok(parse_document(&body, url))
    }

    /// Extracts matches from `page`, following links from matched elements when `recursive`.
    ///
    /// Blank patterns are ignored; if none remain the call fails before any
    /// work starts. A pattern that fails to compile or evaluate is skipped, as
    /// is a linked page that cannot be fetched.
    pub async fn extract(
        &self,
        patterns: &[String],
        page: &Document,
        recursive: bool,
    ) -> Result<Vec<ElementRecord>, ExtractError> {
        let compiled = compile_patterns(patterns)?;
        let start = Url::parse(&page.url).map_err(|_| ExtractError::UrlResolution {
            href: page.url.clone(),
            base: String::new(),
        })?;

        let mut run = Run {
            current: page,
            patterns: &compiled,
            filter: UrlFilter::for_start_page(self.config.link_filter.clone(), &start)?,
            visited: HashSet::new(),
        };

        ::log::info!(
            "Extracting {} pattern(s) from {} (recursive: {})",
            compiled.len(),
            page.url,
            recursive
        );
        let started = std::time::Instant::now();
        let records = self
            .extract_from_page(&mut run, start, recursive, 0)
            .await?;

        ::log::info!(
            "Extraction complete - {} top-level records from {} page(s) in {:.2} seconds",
            records.len(),
            run.visited.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(records)
    }

    fn extract_from_page<'a, 'r: 'a>(
        &'a self,
        run: &'a mut Run<'r>,
        url: Url,
        recursive: bool,
        depth: usize,
    ) -> PageFuture<'a> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }

            let url = run.filter.normalize_url(&url);
            if !run.visited.insert(url.to_string()) {
                ::log::trace!("Skipping already visited: {}", url);
                return Ok(Vec::new());
            }

            let current = run.current;
            let fetched;
            let doc = if is_same_page(current, &url) {
                current
            } else {
                match self.fetch(url.as_str()).await {
                    Ok(body) => {
                        fetched = parse_document(&body, url.as_str());
                        &fetched
                    }
                    Err(ExtractError::Cancelled) => return Err(ExtractError::Cancelled),
                    Err(e) => {
                        ::log::warn!("Skipping linked page: {}", e);
                        return Ok(Vec::new());
                    }
                }
            };

            let mut records = evaluate_patterns(doc, run.patterns);
            ::log::info!(
                "Found {} records on {} (depth {})",
                records.len(),
                url,
                depth
            );

            if !recursive || depth >= self.config.max_depth || records.is_empty() {
                return Ok(records);
            }

            for (index, link) in links_to_follow(run, &url, &records) {
                let children = self
                    .extract_from_page(run, link, recursive, depth + 1)
                    .await?;
                records[index].children = children;
            }
            Ok(records)
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, ExtractError> {
        if self.cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExtractError::Cancelled),
            body = self.fetcher.fetch_text(url) => body.map_err(ExtractError::from),
        }
    }
}

/// Trims and compiles the pattern list, rejecting lists with no usable entry
fn compile_patterns(patterns: &[String]) -> Result<Vec<XPath>, ExtractError> {
    let sources: Vec<&str> = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if sources.is_empty() {
        return Err(ExtractError::EmptyPatterns);
    }

    let mut compiled = Vec::with_capacity(sources.len());
    for source in sources {
        match XPath::compile(source) {
            Ok(xpath) => compiled.push(xpath),
            Err(e) => {
                let error = ExtractError::PatternEval {
                    pattern: source.to_string(),
                    source: e,
                };
                ::log::warn!("Skipping pattern: {}", error);
            }
        }
    }
    Ok(compiled)
}

/// Records for every match of every pattern, in pattern order then document order
fn evaluate_patterns(doc: &Document, patterns: &[XPath]) -> Vec<ElementRecord> {
    let mut records = Vec::new();
    for pattern in patterns {
        match pattern.select_elements(doc) {
            Ok(elements) => {
                ::log::debug!(
                    "{} matched {} elements on {}",
                    pattern.as_str(),
                    elements.len(),
                    doc.url
                );
                records.extend(
                    elements
                        .into_iter()
                        .map(|id| ElementRecord::from_element(doc, id, pattern.as_str())),
                );
            }
            Err(source) => {
                let error = ExtractError::PatternEval {
                    pattern: pattern.as_str().to_string(),
                    source,
                };
                ::log::warn!("Skipping pattern on {}: {}", doc.url, error);
            }
        }
    }
    records
}

/// Distinct unvisited link targets of `records`, each paired with the first
/// record pointing at it
fn links_to_follow(run: &Run<'_>, page_url: &Url, records: &[ElementRecord]) -> Vec<(usize, Url)> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.href.is_empty() {
            continue;
        }
        let resolved = match page_url.join(&record.href) {
            Ok(resolved) => resolved,
            Err(_) => {
                let error = ExtractError::UrlResolution {
                    href: record.href.clone(),
                    base: page_url.to_string(),
                };
                ::log::warn!("{}", error);
                continue;
            }
        };
        if !run.filter.should_follow(&resolved) {
            ::log::debug!("URL filter rejected: {}", resolved);
            continue;
        }

        let normalized = run.filter.normalize_url(&resolved);
        let key = normalized.to_string();
        if run.visited.contains(&key) || !seen.insert(key) {
            continue;
        }
        ::log::debug!("Queuing link for extraction: {}", normalized);
        links.push((index, normalized));
    }
    links
}

fn is_same_page(page: &Document, url: &Url) -> bool {
    Url::parse(&page.url).is_ok_and(|mut page_url| {
        page_url.set_fragment(None);
        page_url == *url
    })
}
