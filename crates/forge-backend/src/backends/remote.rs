//! Remote generation backend
//!
//! Delegates generation to a hosted text-to-3d API. The job is
//! long-running, so `generate` submits a task, polls with progress
//! output, then downloads and parses the resulting GLB. Transport
//! failures surface as transient errors so the scheduler retries
//! them; a FAILED task status is fatal.
//!
//! Remote services do not guarantee repeatable output, so this
//! backend declares itself non-deterministic and its results are
//! never cached.

use crate::backend::{check_input_supported, BackendInfo, BackendStatus, GenerateCtx, ModelBackend};
use forge_conform::{import_glb_slice, RawMesh};
use forge_core::{BackendKind, ForgeConfig, ForgeError, GenerationRequest, InputPayload, Result};
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.meshy.ai/openapi/v2/text-to-3d";
const POLL_INTERVAL_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_POLL_ATTEMPTS: u32 = 180;

pub struct RemoteBackend {
    api_key: String,
    api_url: String,
}

impl RemoteBackend {
    /// Create a RemoteBackend from config. The API key is required.
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let api_key = config
            .api_key("remote")
            .ok_or_else(|| {
                ForgeError::ConfigError(
                    "Remote API key not configured. Set FORGE_REMOTE_API_KEY or add to .forge/config.toml".to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("remote")
            .unwrap_or(DEFAULT_API_URL)
            .to_string();

        Ok(Self { api_key, api_url })
    }

    /// Submit a text-to-3d task and return the task ID
    fn submit_task(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "mode": "refine",
            "prompt": prompt,
            "should_remesh": true
        });

        let response = self.post_json(&self.api_url, &payload)?;
        parse_submit_response(&response)
    }

    /// Poll task status
    fn poll_task(&self, task_id: &str) -> Result<RemoteTaskStatus> {
        let url = format!("{}/{}", self.api_url, task_id);
        let response = self.get_json(&url)?;
        Ok(parse_poll_response(&response))
    }

    fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let agent = build_agent();
        let mut response = agent
            .post(url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(payload)
            .map_err(|e| classify_transport_error("Remote API request failed", &e))?;

        response.body_mut().read_json().map_err(|e| {
            ForgeError::BackendTransient(format!("Failed to parse API response: {}", e))
        })
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let agent = build_agent();
        let mut response = agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .call()
            .map_err(|e| classify_transport_error("Remote poll failed", &e))?;

        response.body_mut().read_json().map_err(|e| {
            ForgeError::BackendTransient(format!("Failed to parse poll response: {}", e))
        })
    }

    fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let agent = build_agent();
        let response = agent
            .get(url)
            .call()
            .map_err(|e| classify_transport_error("Failed to download model", &e))?;

        let mut reader = response.into_body().into_reader();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut bytes).map_err(|e| {
            ForgeError::BackendTransient(format!("Failed to read model data: {}", e))
        })?;
        Ok(bytes)
    }
}

enum RemoteTaskStatus {
    Processing(u8),
    Complete { model_url: Option<String> },
    Failed(String),
}

impl ModelBackend for RemoteBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "remote".to_string(),
            kind: BackendKind::Remote,
            supported_inputs: vec!["prompt"],
            // No local GPU use; the footprint is a token reservation
            footprint_mb: 0,
            approx_latency_secs: 180.0,
            deterministic: false,
        }
    }

    fn check_installed(&self) -> Result<BackendStatus> {
        if self.api_key.is_empty() {
            return Ok(BackendStatus::NoApiKey);
        }
        Ok(BackendStatus::Available)
    }

    fn load(&self) -> Result<()> {
        Ok(())
    }

    fn generate(&self, request: &GenerationRequest, ctx: &GenerateCtx) -> Result<RawMesh> {
        ctx.check_cancelled()?;
        check_input_supported(&self.info(), request)?;

        let prompt = match &request.input {
            InputPayload::Prompt(p) => p,
            _ => unreachable!("input support checked above"),
        };
        if prompt.trim().is_empty() {
            return Err(ForgeError::InvalidRequest(
                "Prompt must not be empty".to_string(),
            ));
        }

        let task_id = self.submit_task(prompt)?;
        eprintln!("  Submitted remote task: {}", task_id);

        let mut poll_attempts = 0u32;
        loop {
            poll_attempts += 1;
            if poll_attempts > MAX_POLL_ATTEMPTS {
                return Err(ForgeError::BackendTransient(format!(
                    "Remote generation timed out after {} poll attempts",
                    MAX_POLL_ATTEMPTS
                )));
            }

            ctx.check_cancelled()?;
            ctx.check_deadline()?;
            std::thread::sleep(Duration::from_secs(POLL_INTERVAL_SECS));

            match self.poll_task(&task_id)? {
                RemoteTaskStatus::Processing(progress) => {
                    eprintln!("  Processing... {}%", progress);
                }
                RemoteTaskStatus::Complete { model_url } => {
                    let url = model_url.ok_or_else(|| {
                        ForgeError::BackendFatal(
                            "No GLB URL in completion response".to_string(),
                        )
                    })?;
                    let bytes = self.download_bytes(&url)?;
                    return import_glb_slice(&request.name, &bytes);
                }
                RemoteTaskStatus::Failed(msg) => {
                    return Err(ForgeError::BackendFatal(format!(
                        "Remote generation failed: {}",
                        msg
                    )));
                }
            }
        }
    }

    fn unload(&self) -> Result<()> {
        Ok(())
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .build();
    config.into()
}

/// Transport and server-side errors are transient; client errors
/// (bad key, bad request) will not heal on retry
fn classify_transport_error(context: &str, e: &ureq::Error) -> ForgeError {
    let transient = match e {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => true,
        ureq::Error::StatusCode(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
        _ => false,
    };
    if transient {
        ForgeError::BackendTransient(format!("{}: {}", context, e))
    } else {
        ForgeError::BackendFatal(format!("{}: {}", context, e))
    }
}

fn parse_submit_response(response: &serde_json::Value) -> Result<String> {
    response
        .get("result")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ForgeError::BackendFatal(format!(
                "Unexpected submit response: {}",
                serde_json::to_string_pretty(response).unwrap_or_default()
            ))
        })
}

fn parse_poll_response(response: &serde_json::Value) -> RemoteTaskStatus {
    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN");

    let progress = response
        .get("progress")
        .and_then(|p| p.as_u64())
        .unwrap_or(0) as u8;

    match status {
        "SUCCEEDED" => {
            let model_url = response
                .get("model_urls")
                .and_then(|u| u.get("glb"))
                .and_then(|u| u.as_str())
                .map(|s| s.to_string());
            RemoteTaskStatus::Complete { model_url }
        }
        "FAILED" | "EXPIRED" => {
            let msg = response
                .get("task_error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            RemoteTaskStatus::Failed(msg)
        }
        _ => RemoteTaskStatus::Processing(progress),
    }
}
