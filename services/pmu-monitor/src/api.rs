//! Typed client for the PMU backend REST API

use std::sync::Arc;

use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::io::HttpClient;
use crate::model::{MeasurementRow, Phase, PmuList, PowerPoint, PowerSnapshot, Protocol};
use crate::PmuMonitorError;

/// Client for the five backend endpoints the console consumes
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!("Created BackendClient for {}", base_url);
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> crate::Result<String> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        }
        .map_err(|e| PmuMonitorError::Http(format!("Invalid URL {}: {}", raw, e)))?;
        Ok(url.to_string())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> crate::Result<T> {
        let response = self.http.get(url).await?;
        if !response.is_success() {
            return Err(PmuMonitorError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// `GET /api/getpmus`
    pub async fn list_pmus(&self) -> crate::Result<Vec<String>> {
        let url = self.url("/api/getpmus", &[])?;
        let list: PmuList = self.get_json(&url).await?;
        Ok(list.pmus)
    }

    /// `GET /api/power_a?pmu&start&phasor`
    pub async fn power_snapshot(
        &self,
        pmu: &str,
        start: &str,
        phase: Phase,
    ) -> crate::Result<PowerSnapshot> {
        let url = self.url(
            "/api/power_a",
            &[("pmu", pmu), ("start", start), ("phasor", phase.as_str())],
        )?;
        self.get_json(&url).await
    }

    /// `GET /api/data?start&pmu`
    pub async fn measurements(&self, pmu: &str, start: &str) -> crate::Result<Vec<MeasurementRow>> {
        let url = self.url("/api/data", &[("start", start), ("pmu", pmu)])?;
        self.get_json(&url).await
    }

    /// `GET /api/power_timeseries?pmu&start&window`
    pub async fn power_timeseries(
        &self,
        pmu: &str,
        start: &str,
        window: &str,
    ) -> crate::Result<Vec<PowerPoint>> {
        let url = self.url(
            "/api/power_timeseries",
            &[("pmu", pmu), ("start", start), ("window", window)],
        )?;
        self.get_json(&url).await
    }

    /// `POST /api/changeprotocol?protocol=udp|tcp`
    pub async fn change_protocol(&self, protocol: Protocol) -> crate::Result<()> {
        let url = self.url("/api/changeprotocol", &[("protocol", protocol.as_str())])?;
        let response = self.http.post(&url).await?;
        if !response.is_success() {
            return Err(PmuMonitorError::Status {
                status: response.status,
                body: response.body,
            });
        }
        tracing::info!("Backend protocol changed to {}", protocol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::{HttpResponse, MockHttpClient};

    fn ok(body: &'static str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn list_pmus_parses_names() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url == "http://backend:8000/api/getpmus")
            .returning(|_| Box::pin(async { Ok(ok(r#"{"pmus": ["pmu1", "pmu2"]}"#)) }));

        let client = BackendClient::new("http://backend:8000/", Arc::new(mock));
        assert_eq!(client.list_pmus().await.unwrap(), vec!["pmu1", "pmu2"]);
    }

    #[tokio::test]
    async fn list_pmus_defaults_to_empty() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .returning(|_| Box::pin(async { Ok(ok("{}")) }));

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        assert!(client.list_pmus().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn power_snapshot_sends_selection_as_query() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| {
                url.starts_with("http://backend:8000/api/power_a?")
                    && url.contains("pmu=pmu+7")
                    && url.contains("start=-15s")
                    && url.contains("phasor=b")
            })
            .returning(|_| {
                Box::pin(async {
                    Ok(ok(
                        r#"{"P": 100.0, "Q": 20.0, "S": 102.0, "PF": 0.98, "V": 230.0}"#,
                    ))
                })
            });

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        let snapshot = client
            .power_snapshot("pmu 7", "-15s", Phase::B)
            .await
            .unwrap();
        assert_eq!(snapshot.p, Some(100.0));
        assert_eq!(snapshot.v, Some(230.0));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 404,
                    body: r#"{"detail": "Missing fields in DB for PMU 1"}"#.to_string(),
                })
            })
        });

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        let err = client
            .power_snapshot("1", "-1s", Phase::A)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .returning(|_| Box::pin(async { Ok(ok("<html>oops</html>")) }));

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        let err = client.measurements("1", "-1m").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn measurements_and_timeseries_parse_rows() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url.contains("/api/data?") && url.contains("start=-1m"))
            .returning(|_| {
                Box::pin(async {
                    Ok(ok(
                        r#"[{"time": "2024-05-01T10:00:00Z", "v_a": 230.0, "pmu_id": "1"}]"#,
                    ))
                })
            });
        mock.expect_get()
            .withf(|url| url.contains("/api/power_timeseries?") && url.contains("window=10s"))
            .returning(|_| {
                Box::pin(async { Ok(ok(r#"[{"time": "2024-05-01T10:00:00Z", "P": 5.0}]"#)) })
            });

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        let rows = client.measurements("1", "-1m").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pmu_ref(), "1");

        let points = client.power_timeseries("1", "-1h", "10s").await.unwrap();
        assert_eq!(points[0].value("P"), Some(5.0));
    }

    #[tokio::test]
    async fn change_protocol_posts_once() {
        let mut mock = MockHttpClient::new();
        mock.expect_post()
            .withf(|url| url == "http://backend:8000/api/changeprotocol?protocol=tcp")
            .times(1)
            .returning(|_| {
                Box::pin(async { Ok(ok(r#"{"message": "Protocol changed to tcp"}"#)) })
            });

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        client.change_protocol(Protocol::Tcp).await.unwrap();
    }

    #[tokio::test]
    async fn change_protocol_surfaces_server_errors() {
        let mut mock = MockHttpClient::new();
        mock.expect_post().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 500,
                    body: "Failed to update config".to_string(),
                })
            })
        });

        let client = BackendClient::new("http://backend:8000", Arc::new(mock));
        let err = client.change_protocol(Protocol::Udp).await.unwrap_err();
        assert!(err.is_transient());
    }
}
