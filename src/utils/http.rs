// src/utils/http.rs

//! HTTP client utilities and the page fetcher seam.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetches page snapshots for the crawl pipeline.
///
/// The pipeline only ever sees page text through this trait, which
/// keeps the runner and orchestrator testable against canned HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page body. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Live `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
pub mod testing {
    //! Canned fetcher for pipeline tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{AppError, Result};

    use super::PageFetcher;

    /// Serves pages from a map, with optional per-URL failure budgets.
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, String>,
        /// URL -> number of times the next fetches should fail
        failures: Mutex<HashMap<String, usize>>,
        /// Count of fetches per URL, for assertions
        hits: Mutex<HashMap<String, usize>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
            self.pages.insert(url.into(), html.into());
            self
        }

        /// Make the next `times` fetches of `url` fail before serving.
        pub fn failing(self, url: impl Into<String>, times: usize) -> Self {
            self.failures.lock().unwrap().insert(url.into(), times);
            self
        }

        pub fn hits(&self, url: &str) -> usize {
            self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            *self
                .hits
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_insert(0) += 1;

            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::detail_fetch(url, "injected failure"));
                }
            }
            drop(failures);

            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::detail_fetch(url, "no such page"))
        }
    }
}
