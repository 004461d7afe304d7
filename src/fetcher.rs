use std::future::Future;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use url::Url;

use crate::config::FetchConfig;
use crate::error::PagePulseError;

/// Retrieves the raw body of a page. Implementations do not retry; the
/// caller decides what a failure means for the check.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, PagePulseError>> + Send;
}

pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
    const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

    pub fn new(config: &FetchConfig) -> Result<Self, PagePulseError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(Self::ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(Self::ACCEPT_LANGUAGE));
        // Always ask intermediaries for the live page
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(config.user_agent())
            .default_headers(headers)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(HttpFetcher {
            client,
            timeout_secs: config.timeout_secs(),
        })
    }

    fn map_error(&self, err: reqwest::Error) -> PagePulseError {
        if err.is_timeout() {
            PagePulseError::Timeout(self.timeout_secs)
        } else {
            PagePulseError::HttpError(err)
        }
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, PagePulseError> {
        let parsed = Url::parse(url).map_err(|_| PagePulseError::InvalidUrl(url.to_owned()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PagePulseError::HttpStatus {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            });
        }

        let body = response.text().await.map_err(|e| self.map_error(e))?;
        debug!("Fetched {} ({} bytes)", url, body.len());

        Ok(body)
    }
}
