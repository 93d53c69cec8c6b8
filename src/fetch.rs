use async_trait::async_trait;
use tracing::debug;

use crate::config::Settings;
use crate::error::TransportError;

/// A fetched body together with the HTTP status it came with.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Page {
    #[cfg(test)]
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// `GET url -> page`. Implementations do not retry; callers decide.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, TransportError>;
}

/// reqwest-backed fetcher sharing one connection pool across workers.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, TransportError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::new(url, e))?;

        // Body is returned whatever the status; an error page parses to "no match".
        let status = resp.status();
        if !status.is_success() {
            debug!(url, %status, "non-success status");
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::new(url, e))?;
        Ok(Page {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

/// `{base}?page={n}`
pub fn listing_url(base: &str, page: u32) -> String {
    format!("{}?page={}", base, page)
}

/// `{base}//{id}`; the portal serves detail pages at the double slash.
pub fn detail_url(base: &str, id: &str) -> String {
    format!("{}//{}", base, id)
}

#[cfg(test)]
pub mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory fetcher: canned bodies per URL, plus a number of
    /// transport failures to serve before each URL starts succeeding.
    /// Unknown URLs answer 200 with an empty body, like a blank page.
    #[derive(Default)]
    pub struct FakeFetcher {
        pages: HashMap<String, Page>,
        failures: Mutex<HashMap<String, usize>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.into(), Page::ok(body));
            self
        }

        pub fn with_status(mut self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(
                url.into(),
                Page {
                    status,
                    body: body.into(),
                },
            );
            self
        }

        pub fn failing_first(self, url: impl Into<String>, times: usize) -> Self {
            self.failures.lock().unwrap().insert(url.into(), times);
            self
        }

        pub fn dead(self, url: impl Into<String>) -> Self {
            self.failing_first(url, usize::MAX)
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl Fetch for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Page, TransportError> {
            self.calls.lock().unwrap().push(url.to_string());
            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(left) = failures.get_mut(url) {
                    if *left > 0 {
                        if *left != usize::MAX {
                            *left -= 1;
                        }
                        return Err(TransportError::new(url, "connection reset"));
                    }
                }
            }
            Ok(self.pages.get(url).cloned().unwrap_or_else(|| Page::ok(Vec::new())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls() {
        assert_eq!(listing_url("https://p/stables", 3), "https://p/stables?page=3");
        assert_eq!(detail_url("https://p/stables", "abc"), "https://p/stables//abc");
    }

    #[test]
    fn page_status() {
        assert!(Page::ok("x").is_success());
        assert!(Page { status: 204, body: Vec::new() }.is_success());
        assert!(!Page { status: 503, body: Vec::new() }.is_success());
        assert!(!Page { status: 404, body: Vec::new() }.is_success());
    }
}
