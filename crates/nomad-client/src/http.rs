use std::time::Duration;

use nomad_core::error::AppError;
use nomad_core::traits::{HttpClient, HttpResponse, RequestOptions};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// HTTP client using reqwest.
///
/// Sends browser-like default headers, since several career sites serve a
/// stripped or blocked page to obvious bots. Non-success statuses come back as
/// an [`HttpResponse`]; only transport failures become errors.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(default_headers())
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/html,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse, AppError> {
        let timeout = options.timeout.unwrap_or(self.timeout);

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout.as_secs())
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed for {url}: {e}"))
            } else {
                AppError::NetworkError(format!("Request to {url} failed: {e}"))
            }
        })?;

        let status_code = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout.as_secs())
            } else {
                AppError::NetworkError(format!("Failed to read response body from {url}: {e}"))
            }
        })?;

        Ok(HttpResponse { status_code, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_browser_headers() {
        let headers = default_headers();
        assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), "en-US,en;q=0.9");
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
        assert!(BROWSER_USER_AGENT.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn keeps_configured_timeout() {
        let client = ReqwestClient::with_timeout(Duration::from_secs(7)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn connection_failures_are_errors() {
        let client = ReqwestClient::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 on localhost is reserved for discard and is not listening.
        let err = client
            .get("http://127.0.0.1:9/", &RequestOptions::json())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NetworkError(_) | AppError::Timeout(_)
        ));
    }
}
