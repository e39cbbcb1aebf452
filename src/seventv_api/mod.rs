mod data;
mod fetch;

use std::time::Duration;

use anyhow::Result;

pub use self::data::*;
pub use self::fetch::*;

pub const DEFAULT_API_BASE: &str = "https://7tv.io/v3";

/// Client for the 7TV v3 REST API and its CDN. Constructed once per run and
/// passed down explicitly; the underlying connection pool lives as long as
/// the client does.
pub struct ApiClient {
    base: String,
    fetcher: Fetcher,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::with_fetcher(base, Fetcher::new(timeout)?))
    }

    pub fn with_fetcher(base: &str, fetcher: Fetcher) -> Self {
        Self {
            base: base.trim_end_matches('/').to_owned(),
            fetcher,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, FetchError> {
        self.fetcher.fetch_json(url).await
    }

    pub async fn emote_set(&self, set_id: &str) -> Result<EmoteSet, FetchError> {
        self.get_json(&format!("{}/emote-sets/{}", self.base, set_id))
            .await
    }

    /// Downloads a file from the CDN.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetcher.fetch_bytes(url).await
    }
}

/// A client whose retries don't wait, for tests talking to a mock server.
#[cfg(test)]
pub(crate) fn test_client(base: &str) -> ApiClient {
    use std::sync::Arc;

    struct NoSleep;

    #[async_trait::async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _: Duration) {}
    }

    let fetcher = Fetcher::new(Duration::from_secs(5))
        .unwrap()
        .with_sleeper(Arc::new(NoSleep));

    ApiClient::with_fetcher(base, fetcher)
}
