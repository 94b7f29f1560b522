//! Create-payload normalization
//!
//! Callers never hand-build wire payloads: every spec goes through
//! `build_create_payload`, which guarantees that each port binding has a
//! matching exposed port, protocols are explicit and the network is wired
//! through both `HostConfig` and `NetworkingConfig`.

use super::EngineResult;
use crate::error::EngineError;
use crate::models::ContainerSpec;
use serde_json::{json, Map, Value};

/// Label marking containers created by this orchestrator
pub const MANAGED_LABEL: &str = "io.stack-warden.managed";

/// Build the engine create body for a spec
pub fn build_create_payload(spec: &ContainerSpec) -> EngineResult<Value> {
    if spec.image.trim().is_empty() {
        return Err(EngineError::InvalidRequest(format!(
            "container '{}' has no image",
            spec.name
        )));
    }

    let mappings = spec
        .port_mappings()
        .map_err(EngineError::InvalidRequest)?;

    let mut exposed = Map::new();
    let mut bindings: Map<String, Value> = Map::new();
    for mapping in &mappings {
        let key = mapping.container_key();
        exposed.insert(key.clone(), json!({}));

        let mut binding = json!({ "HostPort": mapping.host_port.to_string() });
        if let Some(ip) = &mapping.host_ip {
            binding["HostIp"] = json!(ip);
        }
        match bindings.get_mut(&key) {
            Some(Value::Array(existing)) => existing.push(binding),
            _ => {
                bindings.insert(key, json!([binding]));
            }
        }
    }

    let mut env = Vec::with_capacity(spec.env.len());
    for entry in &spec.env {
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                env.push(format!("{}={}", key.trim(), value));
            }
            _ => {
                return Err(EngineError::InvalidRequest(format!(
                    "env entry '{}' for '{}' must be KEY=VALUE",
                    entry, spec.name
                )))
            }
        }
    }

    for volume in &spec.volumes {
        if volume.split(':').count() < 2 {
            return Err(EngineError::InvalidRequest(format!(
                "volume '{}' for '{}' must be source:target[:mode]",
                volume, spec.name
            )));
        }
    }

    let mut host_config = json!({
        "PortBindings": bindings,
        "Binds": spec.volumes,
        "RestartPolicy": { "Name": spec.restart_policy.as_str() },
    });

    let mut payload = json!({
        "Image": spec.image,
        "Env": env,
        "ExposedPorts": exposed,
        "Labels": { MANAGED_LABEL: "true" },
    });

    if !spec.network.is_empty() {
        host_config["NetworkMode"] = json!(spec.network);
        let mut endpoints = Map::new();
        endpoints.insert(
            spec.network.clone(),
            json!({ "Aliases": [spec.name.clone()] }),
        );
        payload["NetworkingConfig"] = json!({ "EndpointsConfig": endpoints });
    }

    payload["HostConfig"] = host_config;
    Ok(payload)
}
