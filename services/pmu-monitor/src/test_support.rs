//! Shared test doubles for unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::io::{HttpClient, HttpResponse};

/// In-memory backend that records every request and answers by path
#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    requests: Mutex<Vec<String>>,
    pmus: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakeBackend {
    pub(crate) fn with_pmus(pmus: &[&str]) -> Arc<Self> {
        let backend = Self::default();
        *backend.pmus.lock().unwrap() = pmus.iter().map(|p| p.to_string()).collect();
        Arc::new(backend)
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests containing every needle
    pub(crate) fn count(&self, needles: &[&str]) -> usize {
        self.requests()
            .iter()
            .filter(|url| needles.iter().all(|n| url.contains(n)))
            .count()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn respond(&self, url: &str) -> HttpResponse {
        self.requests.lock().unwrap().push(url.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return HttpResponse {
                status: 500,
                body: "InfluxDB query failed".to_string(),
            };
        }

        let body = if url.contains("/api/getpmus") {
            let pmus = self.pmus.lock().unwrap().clone();
            serde_json::json!({ "pmus": pmus }).to_string()
        } else if url.contains("/api/power_a") {
            r#"{"P": 1200.5, "Q": 310.25, "S": 1240.0, "PF": 0.968, "V": 230.0,
                "v_a_ang": 0.0, "v_b_ang": -120.0, "v_c_ang": 120.0,
                "i_a_ang": -15.0, "i_b_ang": -135.0, "i_c_ang": 105.0}"#
                .to_string()
        } else if url.contains("/api/data") {
            r#"[{"time": "2024-05-01T10:00:00Z", "v_a": 230.12, "v_b": 229.9, "v_c": 231.0,
                 "i_a": 5.5, "i_b": 5.25, "i_c": 5.0, "pmu_id": "1"},
                {"time": "2024-05-01T10:00:01Z", "v_a": 230.2, "pmu_id": "2"}]"#
                .to_string()
        } else if url.contains("/api/power_timeseries") {
            r#"[{"time": "2024-05-01T10:00:00Z", "P": 100.0, "Q": 10.0, "PF": 0.99, "P_A": 33.0, "V_A": 230.0, "I_A": 5.0},
                {"time": "2024-05-01T10:00:10Z", "P": 110.0, "Q": 12.0, "PF": 0.98, "P_A": 36.0, "V_A": 231.0, "I_A": 5.2}]"#
                .to_string()
        } else if url.contains("/api/changeprotocol") {
            r#"{"message": "Protocol changed"}"#.to_string()
        } else {
            return HttpResponse {
                status: 404,
                body: "not found".to_string(),
            };
        };
        HttpResponse { status: 200, body }
    }
}

#[async_trait]
impl HttpClient for FakeBackend {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        Ok(self.respond(url))
    }

    async fn post(&self, url: &str) -> crate::Result<HttpResponse> {
        Ok(self.respond(url))
    }
}
