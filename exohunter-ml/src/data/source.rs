//! Remote catalog sources for the training dataset.

use crate::error::MlError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Information about a data source for lineage tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// A source of raw catalog CSV text.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full catalog body.
    async fn fetch(&self) -> Result<String, MlError>;

    /// Return metadata about this source for lineage tracking.
    fn source_info(&self) -> DataSourceInfo;
}

// ---------------------------------------------------------------------------
// HttpCatalogSource
// ---------------------------------------------------------------------------

/// Fetches the catalog with a single GET request.
pub struct HttpCatalogSource {
    pub url: String,
    pub timeout: Duration,
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self) -> Result<String, MlError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        debug!(url = %self.url, timeout_secs = self.timeout.as_secs(), "Fetching catalog");
        // The client timeout covers the transfer; the outer one also bounds connection setup.
        let result = tokio::time::timeout(self.timeout, async {
            let response = client.get(&self.url).send().await?;
            if !response.status().is_success() {
                return Err(MlError::dataset(format!(
                    "catalog request failed with status {}",
                    response.status()
                )));
            }
            Ok(response.text().await?)
        })
        .await;

        let timed_out = || {
            MlError::Timeout(format!(
                "catalog fetch timed out after {}s",
                self.timeout.as_secs()
            ))
        };
        match result {
            Ok(Err(MlError::Http(e))) if e.is_timeout() => Err(timed_out()),
            Ok(inner) => inner,
            Err(_) => Err(timed_out()),
        }
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "http".to_string(),
            location: self.url.clone(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryCatalogSource
// ---------------------------------------------------------------------------

/// Serves a fixed body, or a fixed failure. Used to exercise the remote path offline.
pub struct InMemoryCatalogSource {
    body: Result<String, String>,
}

impl InMemoryCatalogSource {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Ok(body.into()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            body: Err(reason.into()),
        }
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalogSource {
    async fn fetch(&self) -> Result<String, MlError> {
        self.body.clone().map_err(MlError::dataset)
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "memory".to_string(),
            location: "memory://catalog".to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}

/// Local address that accepts connections and never answers.
#[cfg(test)]
pub(crate) fn silent_catalog_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://{addr}/koi.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_in_memory_source() {
        let src = InMemoryCatalogSource::new("a,b\n1,2\n");
        assert_eq!(src.fetch().await.unwrap(), "a,b\n1,2\n");
        assert_eq!(src.source_info().source_type, "memory");

        let failing = InMemoryCatalogSource::failing("offline");
        let err = failing.fetch().await.unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_http_source_info() {
        let src = HttpCatalogSource::new("https://example.com/koi.csv", Duration::from_secs(5));
        let info = src.source_info();
        assert_eq!(info.source_type, "http");
        assert_eq!(info.location, "https://example.com/koi.csv");
    }

    #[tokio::test]
    async fn test_http_source_unreachable_is_error() {
        let src = HttpCatalogSource::new("http://127.0.0.1:9/koi.csv", Duration::from_secs(2));
        assert!(src.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_http_source_silent_server_times_out() {
        let src = HttpCatalogSource::new(silent_catalog_url(), Duration::from_secs(1));
        let started = Instant::now();
        let err = src.fetch().await.unwrap_err();
        assert!(matches!(err, MlError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
