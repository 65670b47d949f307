//! Generation request and parameter types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Type tag identifying a model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    TextTo3d,
    ImageTo3d,
    MeshRefiner,
    Remote,
    Mock,
}

impl BackendKind {
    /// All statically known backend kinds
    pub fn all() -> &'static [BackendKind] {
        &[
            BackendKind::TextTo3d,
            BackendKind::ImageTo3d,
            BackendKind::MeshRefiner,
            BackendKind::Remote,
            BackendKind::Mock,
        ]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::TextTo3d => "text_to_3d",
            BackendKind::ImageTo3d => "image_to_3d",
            BackendKind::MeshRefiner => "mesh_refiner",
            BackendKind::Remote => "remote",
            BackendKind::Mock => "mock",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BackendKind {
    type Err = crate::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text_to_3d" => Ok(BackendKind::TextTo3d),
            "image_to_3d" => Ok(BackendKind::ImageTo3d),
            "mesh_refiner" => Ok(BackendKind::MeshRefiner),
            "remote" => Ok(BackendKind::Remote),
            "mock" => Ok(BackendKind::Mock),
            other => Err(crate::ForgeError::UnknownBackend(format!(
                "'{}'. Available: text_to_3d, image_to_3d, mesh_refiner, remote, mock",
                other
            ))),
        }
    }
}

/// The kind of input payload a request carries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPayload {
    /// Text prompt for text-to-3D generation
    Prompt(String),
    /// Path to a source image for image-to-3D generation
    Image(PathBuf),
    /// Path to a prior mesh (GLB) for refinement
    Mesh(PathBuf),
}

impl InputPayload {
    /// Short tag used in fingerprints and capability matching
    pub fn kind_tag(&self) -> &'static str {
        match self {
            InputPayload::Prompt(_) => "prompt",
            InputPayload::Image(_) => "image",
            InputPayload::Mesh(_) => "mesh",
        }
    }
}

/// Quality preset controlling generation density and target budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    Fast,
    Balanced,
    Quality,
}

impl Default for QualityMode {
    fn default() -> Self {
        QualityMode::Balanced
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityMode::Fast => write!(f, "fast"),
            QualityMode::Balanced => write!(f, "balanced"),
            QualityMode::Quality => write!(f, "quality"),
        }
    }
}

impl FromStr for QualityMode {
    type Err = crate::ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(QualityMode::Fast),
            "balanced" => Ok(QualityMode::Balanced),
            "quality" => Ok(QualityMode::Quality),
            other => Err(crate::ForgeError::InvalidRequest(format!(
                "Unknown quality mode '{}'. Available: fast, balanced, quality",
                other
            ))),
        }
    }
}

/// Generation parameters shared by all backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default)]
    pub quality: QualityMode,
    /// Target triangle count hint for the backend (not a hard limit;
    /// platform ceilings are enforced by the conformance pipeline)
    #[serde(default)]
    pub target_triangles: Option<u32>,
    /// Requested texture resolution (square, pixels)
    #[serde(default = "default_texture_size")]
    pub texture_size: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_texture_size() -> u32 {
    1024
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            quality: QualityMode::default(),
            target_triangles: None,
            texture_size: default_texture_size(),
            seed: None,
        }
    }
}

/// A request to generate a 3D asset. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Human-readable name for the asset
    pub name: String,
    /// Backend to run
    pub backend: BackendKind,
    /// Generation input
    pub input: InputPayload,
    /// Generation parameters
    #[serde(default)]
    pub params: GenerationParams,
    /// Names of platform profiles the output must conform to
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Caller-supplied deduplication key; when absent the fingerprint
    /// is derived from the request contents
    #[serde(default)]
    pub dedup_key: Option<String>,
}

impl GenerationRequest {
    pub fn new(name: &str, backend: BackendKind, input: InputPayload) -> Self {
        Self {
            name: name.to_string(),
            backend,
            input,
            params: GenerationParams::default(),
            platforms: Vec::new(),
            dedup_key: None,
        }
    }
}
