//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;

use crate::PmuMonitorError;

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> crate::Result<HttpResponse>;

    /// Send a POST request with an empty body; parameters travel in the URL
    async fn post(&self, url: &str) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn with_timeout(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PmuMonitorError::Http(format!("Building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn classify(method: &str, url: &str, e: reqwest::Error) -> PmuMonitorError {
    let msg = format!("{} {} failed: {}", method, url, e);
    if e.is_timeout() {
        PmuMonitorError::Timeout(msg)
    } else if e.is_connect() {
        PmuMonitorError::ConnectionRefused(msg)
    } else {
        PmuMonitorError::Http(msg)
    }
}

async fn into_response(
    method: &str,
    url: &str,
    response: reqwest::Response,
) -> crate::Result<HttpResponse> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| classify(method, url, e))?;

    tracing::debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());
    Ok(HttpResponse { status, body })
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify("GET", url, e))?;
        into_response("GET", url, response).await
    }

    async fn post(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| classify("POST", url, e))?;
        into_response("POST", url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A URL that will always refuse connections (port 1 is reserved and unbound)
    const UNREACHABLE_URL: &str = "http://127.0.0.1:1/api/getpmus";

    #[tokio::test]
    async fn get_connection_refused_is_classified() {
        let client = ReqwestHttpClient::default();
        let err = client.get(UNREACHABLE_URL).await.unwrap_err();

        match &err {
            PmuMonitorError::ConnectionRefused(msg) => {
                assert!(
                    msg.starts_with("GET http://127.0.0.1:1/api/getpmus failed:"),
                    "{msg}"
                );
            }
            other => panic!("expected PmuMonitorError::ConnectionRefused, got {other:?}"),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn post_connection_refused_is_classified() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let err = client.post(UNREACHABLE_URL).await.unwrap_err();

        assert!(
            matches!(err, PmuMonitorError::ConnectionRefused(_)),
            "expected ConnectionRefused, got {err:?}"
        );
    }

    #[test]
    fn success_covers_2xx_only() {
        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        let redirect = HttpResponse {
            status: 302,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }
}
