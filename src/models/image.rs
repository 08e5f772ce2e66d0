use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

pub const MIN_INFERENCE_STEPS: u32 = 10;
pub const MAX_INFERENCE_STEPS: u32 = 150;
pub const MIN_GUIDANCE_SCALE: f32 = 1.0;
pub const MAX_GUIDANCE_SCALE: f32 = 20.0;
/// Guidance scale is entered in increments of this size.
pub const GUIDANCE_SCALE_STEP: f32 = 0.1;

pub const DEFAULT_INFERENCE_STEPS: u32 = 50;
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;

pub fn clamp_inference_steps(steps: u32) -> u32 {
    steps.clamp(MIN_INFERENCE_STEPS, MAX_INFERENCE_STEPS)
}

/// Clamps to the guidance bounds and snaps to the nearest 0.1.
pub fn clamp_guidance_scale(scale: f32) -> f32 {
    if scale.is_nan() {
        return MIN_GUIDANCE_SCALE;
    }
    let snapped = (scale / GUIDANCE_SCALE_STEP).round() / 10.0;
    snapped.clamp(MIN_GUIDANCE_SCALE, MAX_GUIDANCE_SCALE)
}

/// Optional knobs sent alongside the prompt. Absent fields are omitted from
/// the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    pub fn with_inference_steps(mut self, steps: u32) -> Self {
        self.num_inference_steps = Some(steps);
        self
    }

    pub fn with_guidance_scale(mut self, scale: f32) -> Self {
        self.guidance_scale = Some(scale);
        self
    }
}

/// One successful generation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    id: String,
    url: String,
    prompt: String,
    timestamp: DateTime<Utc>,
    options: GenerationOptions,
}

impl GeneratedImage {
    /// Builds a record whose id is the epoch millisecond of `at`. Callers that
    /// create several records close together should use [`GeneratedImage::issued`]
    /// with ids from a monotonic source instead.
    pub fn created_at(
        at: DateTime<Utc>,
        url: impl Into<String>,
        prompt: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        Self::issued(at.timestamp_millis(), at, url, prompt, options)
    }

    /// Builds a record with an explicit time-derived id.
    pub fn issued(
        id: i64,
        at: DateTime<Utc>,
        url: impl Into<String>,
        prompt: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            id: id.to_string(),
            url: url.into(),
            prompt: prompt.into(),
            timestamp: at,
            options,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// ISO-8601 timestamp with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }
}

/// Body of `POST /api/replicate/generate-image`: the prompt with the options
/// flattened next to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub options: GenerationOptions,
}

impl GenerateImageRequest {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateImageResponse {
    #[serde(default)]
    pub output: Option<Vec<String>>,
}

impl GenerateImageResponse {
    /// The produced image is the first entry of `output`.
    pub fn into_image_url(self) -> Result<String> {
        self.output
            .and_then(|output| output.into_iter().next())
            .ok_or_else(|| GenerationError::Response("No image returned by the endpoint".into()))
    }
}
