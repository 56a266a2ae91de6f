use crate::error::FetchError;
use crate::utils::calculate_timeout;
use async_trait::async_trait;
use std::time::Duration;

/// Retrieves linked pages and files
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Body of a page as text
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Raw body, used for downloads
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches over HTTP with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_timeout_ms: u64,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, base_timeout_ms: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_timeout_ms,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn timeout_for(&self, url: &str) -> Duration {
        calculate_timeout(self.base_timeout_ms, url.len())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let limit = self.timeout_for(url);
        let started = std::time::Instant::now();
        let body = tokio::time::timeout(limit, async {
            let response = self.get(url).await?;
            response.text().await.map_err(|e| transport(url, e))
        })
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            millis: limit.as_millis(),
        })??;

        ::log::debug!(
            "Fetched {} ({} bytes) in {:.2} seconds",
            url,
            body.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(body)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let limit = self.timeout_for(url);
        let bytes = tokio::time::timeout(limit, async {
            let response = self.get(url).await?;
            response.bytes().await.map_err(|e| transport(url, e))
        })
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            millis: limit.as_millis(),
        })??;
        Ok(bytes.to_vec())
    }
}

fn transport(url: &str, error: reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: error.to_string(),
    }
}

/// Serves canned pages and records every request
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryFetcher {
    pages: std::collections::HashMap<String, String>,
    hits: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryFetcher {
    pub(crate) fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub(crate) fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.hits.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_text(url).await.map(String::into_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_text_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", "test-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hi</p>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("test-agent", 5_000).unwrap();
        let body = fetcher
            .fetch_text(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("test-agent", 5_000).unwrap();
        let url = format!("{}/down", server.uri());
        assert_eq!(
            fetcher.fetch_text(&url).await,
            Err(FetchError::Status { url, status: 503 })
        );
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("test-agent", 50).unwrap();
        let result = fetcher.fetch_bytes(&format!("{}/slow", server.uri())).await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
    }
}
