//! Application health probe and infrastructure reachability checks

use crate::error::{Result, WardenError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Outcome of one application health probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppProbeResult {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// `status` field reported by the application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppProbeResult {
    pub fn failed(error: impl Into<String>, response_time_ms: Option<u64>) -> Self {
        Self {
            healthy: false,
            response_time_ms,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Never fails; problems are reported as an unhealthy result
    async fn probe(&self) -> AppProbeResult;
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
    service: Option<String>,
    timestamp: Option<serde_json::Value>,
}

/// Timed `GET` against the application's health endpoint
pub struct HttpHealthProbe {
    client: Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WardenError::Configuration(format!("failed to build probe client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> AppProbeResult {
        let start = Instant::now();
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let error = if e.is_timeout() {
                    format!("health probe timed out after {}ms", elapsed)
                } else {
                    format!("health probe failed: {}", e)
                };
                return AppProbeResult::failed(error, Some(elapsed));
            }
        };

        let status = response.status();
        // Body fields are informational; a non-JSON body does not fail the probe
        let body = response.json::<HealthBody>().await.ok();
        let elapsed = start.elapsed().as_millis() as u64;

        AppProbeResult {
            healthy: status.is_success(),
            status_code: Some(status.as_u16()),
            response_time_ms: Some(elapsed),
            reported_status: body.as_ref().and_then(|b| b.status.clone()),
            service: body.as_ref().and_then(|b| b.service.clone()),
            reported_at: body.and_then(|b| b.timestamp).map(|t| match t {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            }),
            error: if status.is_success() {
                None
            } else {
                Some(format!("health endpoint returned {}", status))
            },
        }
    }
}

/// TCP reachability of one `host:port` target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraCheck {
    pub target: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn check_tcp(target: &str, timeout: Duration) -> InfraCheck {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => InfraCheck {
            target: target.to_string(),
            reachable: true,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Ok(Err(e)) => InfraCheck {
            target: target.to_string(),
            reachable: false,
            latency_ms: None,
            error: Some(e.to_string()),
        },
        Err(_) => InfraCheck {
            target: target.to_string(),
            reachable: false,
            latency_ms: None,
            error: Some(format!("connect timed out after {}s", timeout.as_secs())),
        },
    }
}
