//! HTTP client for the container management API
//!
//! Talks to an endpoint-scoped engine proxy
//! (`{base_url}/api/endpoints/{id}/docker`) authenticated with an API key.
//! The engine API version is negotiated once and cached.

use super::payload::build_create_payload;
use super::{
    ContainerDetails, ContainerEngine, ContainerSummary, CreatedContainer, EngineResult,
    EngineVersion,
};
use crate::config::{EngineSettings, RegistryCredentials};
use crate::error::EngineError;
use crate::models::{ContainerSpec, ContainerState};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Oldest engine API version we can drive
pub const MIN_API_VERSION: &str = "1.24";
/// Newest engine API version we have been validated against
pub const MAX_API_VERSION: &str = "1.43";

const API_KEY_HEADER: &str = "X-API-Key";
const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Container engine API client
pub struct EngineClient {
    http: Client,
    /// Endpoint-scoped base, without a version segment
    base: Url,
    api_key: String,
    pinned_version: Option<String>,
    negotiated_version: RwLock<Option<String>>,
}

impl EngineClient {
    /// Create a new client from engine settings
    pub fn new(settings: &EngineSettings) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| EngineError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        let root = settings.base_url.trim_end_matches('/');
        let base = Url::parse(&format!(
            "{}/api/endpoints/{}/docker",
            root, settings.endpoint_id
        ))
        .map_err(|e| EngineError::InvalidRequest(format!("invalid engine URL: {}", e)))?;

        Ok(Self {
            http,
            base,
            api_key: settings.api_key.clone(),
            pinned_version: settings.api_version.clone(),
            negotiated_version: RwLock::new(None),
        })
    }

    /// Endpoint-scoped base URL
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Negotiate and cache the API version to use
    ///
    /// The engine's version is clamped to `[MIN_API_VERSION, MAX_API_VERSION]`;
    /// an engine older than the minimum is an error.
    pub async fn negotiate_version(&self) -> EngineResult<String> {
        if let Some(pinned) = &self.pinned_version {
            return Ok(pinned.clone());
        }
        if let Some(cached) = self.negotiated_version.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let info = self.fetch_version().await?;
        let negotiated = clamp_version(&info.api_version)?;
        debug!(
            engine_version = %info.version,
            server_api = %info.api_version,
            negotiated = %negotiated,
            "Negotiated engine API version"
        );

        *self.negotiated_version.write().await = Some(negotiated.clone());
        Ok(negotiated)
    }

    async fn fetch_version(&self) -> EngineResult<EngineVersion> {
        let url = join(&self.base, &["version"])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let raw: RawVersion = response.json().await?;
        Ok(EngineVersion {
            api_version: raw.api_version,
            version: raw.version,
            os: raw.os,
        })
    }

    /// Versioned URL for the given path segments
    async fn url(&self, segments: &[&str]) -> EngineResult<Url> {
        match self.negotiate_version().await {
            Ok(version) => {
                let prefix = format!("v{}", version);
                let mut all = Vec::with_capacity(segments.len() + 1);
                all.push(prefix.as_str());
                all.extend_from_slice(segments);
                join(&self.base, &all)
            }
            Err(e) => {
                warn!(error = %e, "API version negotiation failed, using unversioned path");
                join(&self.base, segments)
            }
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Send and map any non-2xx status to `EngineError::Status`
    async fn send(&self, request: RequestBuilder) -> EngineResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    /// Send, treating the listed statuses as success too
    async fn send_allowing(
        &self,
        request: RequestBuilder,
        allowed: &[StatusCode],
    ) -> EngineResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() || allowed.contains(&response.status()) {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }
}

#[async_trait]
impl ContainerEngine for EngineClient {
    async fn list_containers(&self, all: bool) -> EngineResult<Vec<ContainerSummary>> {
        let url = self.url(&["containers", "json"]).await?;
        let request = self
            .request(Method::GET, url)
            .query(&[("all", if all { "true" } else { "false" })]);
        let response = self.send(request).await?;
        let containers: Vec<ContainerSummary> = response.json().await?;
        Ok(containers)
    }

    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerDetails> {
        let url = self.url(&["containers", id, "json"]).await?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let raw: RawInspect = response.json().await?;
        Ok(raw.into_details())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> EngineResult<CreatedContainer> {
        let payload = build_create_payload(spec)?;
        let url = self.url(&["containers", "create"]).await?;
        let request = self
            .request(Method::POST, url)
            .query(&[("name", spec.name.as_str())])
            .json(&payload);
        let response = self.send(request).await?;
        let raw: RawCreated = response.json().await?;
        if raw.id.is_empty() {
            return Err(EngineError::Malformed(
                "create response did not include an Id".to_string(),
            ));
        }
        Ok(CreatedContainer {
            id: raw.id,
            warnings: raw.warnings.unwrap_or_default(),
        })
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        let url = self.url(&["containers", id, "start"]).await?;
        // 304: already started
        self.send_allowing(self.request(Method::POST, url), &[StatusCode::NOT_MODIFIED])
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str, timeout: Duration) -> EngineResult<()> {
        let url = self.url(&["containers", id, "stop"]).await?;
        let request = self
            .request(Method::POST, url)
            .query(&[("t", timeout.as_secs().to_string())])
            .timeout(self.stop_request_timeout(timeout));
        // 304: already stopped
        self.send_allowing(request, &[StatusCode::NOT_MODIFIED]).await?;
        Ok(())
    }

    async fn restart_container(&self, id: &str, timeout: Duration) -> EngineResult<()> {
        let url = self.url(&["containers", id, "restart"]).await?;
        let request = self
            .request(Method::POST, url)
            .query(&[("t", timeout.as_secs().to_string())])
            .timeout(self.stop_request_timeout(timeout));
        self.send(request).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> EngineResult<()> {
        let url = self.url(&["containers", id]).await?;
        let request = self
            .request(Method::DELETE, url)
            .query(&[("force", if force { "true" } else { "false" })]);
        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(container = %id, "Container already removed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn container_logs(&self, id: &str, tail: usize) -> EngineResult<String> {
        let url = self.url(&["containers", id, "logs"]).await?;
        let request = self.request(Method::GET, url).query(&[
            ("stdout", "true".to_string()),
            ("stderr", "true".to_string()),
            ("tail", tail.to_string()),
        ]);
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(demux_log_stream(&bytes))
    }

    async fn pull_image(
        &self,
        image: &str,
        auth: Option<&RegistryCredentials>,
    ) -> EngineResult<()> {
        let (from_image, tag) = split_image_reference(image);
        let url = self.url(&["images", "create"]).await?;
        let mut query = vec![("fromImage", from_image)];
        if let Some(tag) = tag {
            query.push(("tag", tag));
        }
        let mut request = self.request(Method::POST, url).query(&query);
        if let Some(creds) = auth {
            request = request.header(REGISTRY_AUTH_HEADER, registry_auth_header(creds));
        }

        let response = self.send(request).await?;
        // Progress is streamed as JSON lines; failures arrive in-band
        let body = response.text().await?;
        for line in body.lines() {
            if let Ok(progress) = serde_json::from_str::<PullProgress>(line) {
                if let Some(error) = progress.error {
                    return Err(EngineError::Rejected(format!(
                        "pull of {} failed: {}",
                        image, error
                    )));
                }
            }
        }
        Ok(())
    }

    async fn create_network(&self, name: &str) -> EngineResult<()> {
        let url = self.url(&["networks", "create"]).await?;
        let request = self.request(Method::POST, url).json(&json!({
            "Name": name,
            "Driver": "bridge",
            "CheckDuplicate": true,
        }));
        // 409: already exists
        self.send_allowing(request, &[StatusCode::CONFLICT]).await?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> EngineResult<()> {
        let url = self.url(&["networks", name]).await?;
        match self.send(self.request(Method::DELETE, url)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn version(&self) -> EngineResult<EngineVersion> {
        self.fetch_version().await
    }
}

impl EngineClient {
    /// Stop/restart block for the grace period, so the HTTP timeout must outlast it
    fn stop_request_timeout(&self, grace: Duration) -> Duration {
        grace + Duration::from_secs(30)
    }
}

fn join(base: &Url, segments: &[&str]) -> EngineResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| EngineError::InvalidRequest(format!("engine URL {} cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn status_error(response: Response) -> EngineError {
    let code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body
            }
        });
    EngineError::Status { code, message }
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Clamp a server API version into the supported range
fn clamp_version(server: &str) -> EngineResult<String> {
    let server_v = parse_version(server)
        .ok_or_else(|| EngineError::Malformed(format!("unparseable API version '{}'", server)))?;
    let min = parse_version(MIN_API_VERSION).unwrap_or((1, 24));
    let max = parse_version(MAX_API_VERSION).unwrap_or((1, 43));

    if server_v < min {
        return Err(EngineError::Rejected(format!(
            "engine API {} is older than the minimum supported {}",
            server, MIN_API_VERSION
        )));
    }
    let chosen = server_v.min(max);
    Ok(format!("{}.{}", chosen.0, chosen.1))
}

/// Split `repo[:tag]`; digests and tagless references are passed through whole
fn split_image_reference(image: &str) -> (String, Option<String>) {
    if image.contains('@') {
        return (image.to_string(), None);
    }
    let last_slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_slash..].rfind(':') {
        Some(idx) => {
            let split = last_slash + idx;
            (image[..split].to_string(), Some(image[split + 1..].to_string()))
        }
        None => (image.to_string(), Some("latest".to_string())),
    }
}

fn registry_auth_header(creds: &RegistryCredentials) -> String {
    let body = json!({
        "username": creds.username,
        "password": creds.password,
        "serveraddress": creds.server.clone().unwrap_or_default(),
    });
    base64::engine::general_purpose::URL_SAFE.encode(body.to_string())
}

/// Strip the 8-byte frame headers from a multiplexed log stream
///
/// Frames are `[stream, 0, 0, 0, len(u32 BE)] payload`. Streams from
/// TTY containers are not framed and are returned as-is.
fn demux_log_stream(bytes: &[u8]) -> String {
    let framed = bytes.len() >= 8 && bytes[0] <= 2 && bytes[1..4] == [0, 0, 0];
    if !framed {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]])
            as usize;
        let start = pos + 8;
        let end = (start + len).min(bytes.len());
        out.extend_from_slice(&bytes[start..end]);
        pos = end;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PullProgress {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawVersion {
    api_version: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    os: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCreated {
    #[serde(default)]
    id: String,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInspect {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: Option<RawInspectState>,
    #[serde(default)]
    restart_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawInspectState {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    running: bool,
    #[serde(default)]
    paused: bool,
    #[serde(default)]
    exit_code: Option<i64>,
    #[serde(default)]
    started_at: Option<String>,
}

impl RawInspect {
    fn into_details(self) -> ContainerDetails {
        let (state, status, exit_code, started_at) = match self.state {
            Some(s) => {
                // Old engines report only the booleans
                let state = match &s.status {
                    Some(status) => ContainerState::from_engine(status),
                    None if s.paused => ContainerState::Paused,
                    None if s.running => ContainerState::Running,
                    None => ContainerState::Exited,
                };
                let status = s
                    .status
                    .clone()
                    .unwrap_or_else(|| state.as_str().to_string());
                (state, status, s.exit_code, s.started_at)
            }
            None => (ContainerState::Exited, "unknown".to_string(), None, None),
        };

        ContainerDetails {
            id: self.id,
            name: self.name.trim_start_matches('/').to_string(),
            state,
            status,
            exit_code,
            started_at,
            restart_count: self.restart_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContainerSpec;
    use mockito::Matcher;

    const PREFIX: &str = "/api/endpoints/2/docker/v1.41";

    fn settings(base_url: &str) -> EngineSettings {
        EngineSettings {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            endpoint_id: 2,
            api_version: Some("1.41".to_string()),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_list_containers_sends_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("{}/containers/json", PREFIX).as_str())
            .match_query(Matcher::UrlEncoded("all".into(), "true".into()))
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(
                r#"[{"Id":"abc123","Names":["/stack-app"],"Image":"app:1","State":"running","Status":"Up 5 minutes"}]"#,
            )
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        let containers = client.list_containers(true).await.unwrap();

        mock.assert_async().await;
        assert_eq!(containers.len(), 1);
        assert!(containers[0].has_name("stack-app"));
        assert_eq!(containers[0].container_state(), ContainerState::Running);
    }

    #[tokio::test]
    async fn test_version_negotiation_clamps_and_caches() {
        let mut server = mockito::Server::new_async().await;
        let version = server
            .mock("GET", "/api/endpoints/2/docker/version")
            .with_status(200)
            .with_body(r#"{"ApiVersion":"1.45","Version":"26.0.0","Os":"linux"}"#)
            .expect(1)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/api/endpoints/2/docker/v1.43/containers/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .expect(2)
            .create_async()
            .await;

        let mut s = settings(&server.url());
        s.api_version = None;
        let client = EngineClient::new(&s).unwrap();

        client.list_containers(false).await.unwrap();
        client.list_containers(false).await.unwrap();

        version.assert_async().await;
        list.assert_async().await;
    }

    #[test]
    fn test_clamp_version_rejects_ancient_engines() {
        assert_eq!(clamp_version("1.41").unwrap(), "1.41");
        assert_eq!(clamp_version("1.44").unwrap(), "1.43");
        assert!(matches!(clamp_version("1.12"), Err(EngineError::Rejected(_))));
        assert!(matches!(clamp_version("latest"), Err(EngineError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_container_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", format!("{}/containers/gone", PREFIX).as_str())
            .match_query(Matcher::UrlEncoded("force".into(), "true".into()))
            .with_status(404)
            .with_body(r#"{"message":"No such container: gone"}"#)
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        assert!(client.remove_container("gone", true).await.is_ok());
    }

    #[tokio::test]
    async fn test_error_status_carries_engine_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{}/containers/stack-app/restart", PREFIX).as_str())
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"message":"driver failed"}"#)
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        let err = client
            .restart_container("stack-app", Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("driver failed"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_start_already_running_is_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{}/containers/abc/start", PREFIX).as_str())
            .with_status(304)
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        assert!(client.start_container("abc").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_container_posts_normalized_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", format!("{}/containers/create", PREFIX).as_str())
            .match_query(Matcher::UrlEncoded("name".into(), "stack-cache".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "Image": "redis:7-alpine",
                "ExposedPorts": { "6379/tcp": {} },
            })))
            .with_status(201)
            .with_body(r#"{"Id":"new-id","Warnings":[]}"#)
            .create_async()
            .await;

        let mut spec = ContainerSpec::new("stack-cache", "redis:7-alpine");
        spec.ports = vec!["6379".to_string()];

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        let created = client.create_container(&spec).await.unwrap();

        mock.assert_async().await;
        assert_eq!(created.id, "new-id");
    }

    #[tokio::test]
    async fn test_malformed_response_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{}/containers/abc/json", PREFIX).as_str())
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        let err = client.inspect_container("abc").await.unwrap_err();
        assert!(matches!(err, EngineError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        // Nothing listens on port 9 locally
        let client = EngineClient::new(&settings("http://127.0.0.1:9")).unwrap();
        let err = client.list_containers(true).await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
    }

    #[tokio::test]
    async fn test_inspect_normalizes_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{}/containers/stack-db/json", PREFIX).as_str())
            .with_status(200)
            .with_body(
                r#"{"Id":"db1","Name":"/stack-db","RestartCount":3,"State":{"Status":"exited","Running":false,"ExitCode":137}}"#,
            )
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        let details = client.inspect_container("stack-db").await.unwrap();

        assert_eq!(details.name, "stack-db");
        assert_eq!(details.state, ContainerState::Exited);
        assert_eq!(details.exit_code, Some(137));
        assert_eq!(details.restart_count, 3);
    }

    #[tokio::test]
    async fn test_pull_reports_in_band_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{}/images/create", PREFIX).as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("fromImage".into(), "registry.local/app".into()),
                Matcher::UrlEncoded("tag".into(), "2.1".into()),
            ]))
            .match_header("x-registry-auth", Matcher::Any)
            .with_status(200)
            .with_body("{\"status\":\"Pulling\"}\n{\"error\":\"manifest unknown\"}\n")
            .create_async()
            .await;

        let creds = RegistryCredentials {
            username: "deploy".to_string(),
            password: "pw".to_string(),
            server: Some("registry.local".to_string()),
        };
        let client = EngineClient::new(&settings(&server.url())).unwrap();
        let err = client
            .pull_image("registry.local/app:2.1", Some(&creds))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("manifest unknown"));
    }

    #[tokio::test]
    async fn test_create_existing_network_is_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", format!("{}/networks/create", PREFIX).as_str())
            .with_status(409)
            .with_body(r#"{"message":"network with name stack-network already exists"}"#)
            .create_async()
            .await;
        server
            .mock("DELETE", format!("{}/networks/stack-network", PREFIX).as_str())
            .with_status(404)
            .create_async()
            .await;

        let client = EngineClient::new(&settings(&server.url())).unwrap();
        assert!(client.create_network("stack-network").await.is_ok());
        assert!(client.remove_network("stack-network").await.is_ok());
    }

    #[test]
    fn test_split_image_reference() {
        assert_eq!(
            split_image_reference("postgres:15-alpine"),
            ("postgres".to_string(), Some("15-alpine".to_string()))
        );
        assert_eq!(
            split_image_reference("registry:5000/team/app"),
            ("registry:5000/team/app".to_string(), Some("latest".to_string()))
        );
        assert_eq!(
            split_image_reference("app@sha256:abcd"),
            ("app@sha256:abcd".to_string(), None)
        );
    }

    #[test]
    fn test_demux_log_stream() {
        let mut framed = vec![1, 0, 0, 0, 0, 0, 0, 6];
        framed.extend_from_slice(b"hello\n");
        framed.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 4]);
        framed.extend_from_slice(b"err\n");
        assert_eq!(demux_log_stream(&framed), "hello\nerr\n");

        assert_eq!(demux_log_stream(b"plain tty output\n"), "plain tty output\n");
    }
}
