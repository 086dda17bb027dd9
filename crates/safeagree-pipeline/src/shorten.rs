use safeagree_core::{Error, Result};
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "https://is.gd/create.php";

/// Client for the is.gd shortening API. An external collaborator boundary:
/// failure here must never block sharing, callers fall back to the long URL.
#[derive(Debug, Clone)]
pub struct Shortener {
    client: reqwest::Client,
    endpoint: String,
}

impl Shortener {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub async fn shorten(&self, url: &str) -> Result<String> {
        if url.trim().is_empty() {
            return Err(Error::Shorten("empty url".to_string()));
        }

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("url", url)])
            .send()
            .await
            .map_err(|e| Error::Shorten(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Shorten(format!("HTTP {status}")));
        }

        let parsed: ShortenResponse = resp.json().await.map_err(|e| Error::Shorten(e.to_string()))?;
        if let Some(code) = parsed.errorcode {
            return Err(Error::Shorten(
                parsed
                    .errormessage
                    .unwrap_or_else(|| format!("shortener error {code}")),
            ));
        }
        parsed
            .shorturl
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Shorten("missing shorturl in response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ShortenResponse {
    shorturl: Option<String>,
    errorcode: Option<i64>,
    errormessage: Option<String>,
}
