use std::env;

use crate::error::{GenerationError, Result};
use crate::logger::LogLevel;
use crate::models::{
    clamp_guidance_scale, clamp_inference_steps, DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_GENERATE_PATH: &str = "/api/replicate/generate-image";

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormDefaults {
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub form_defaults: FormDefaults,
    pub log_level: LogLevel,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: DEFAULT_GENERATE_PATH.to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = env::var("RGEN_ENDPOINT_URL").unwrap_or(defaults.base_url);
        let path = env::var("RGEN_ENDPOINT_PATH").unwrap_or(defaults.path);

        EndpointConfig { base_url, path }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Full URL of the generation endpoint.
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

impl Default for FormDefaults {
    fn default() -> Self {
        FormDefaults {
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
        }
    }
}

impl FormDefaults {
    pub fn from_env() -> Result<Self> {
        Self::from_values(
            env::var("RGEN_DEFAULT_STEPS").ok().as_deref(),
            env::var("RGEN_DEFAULT_GUIDANCE").ok().as_deref(),
        )
    }

    /// Parses raw setting values; absent ones keep the UI defaults, present
    /// ones are clamped to the form bounds.
    pub fn from_values(steps: Option<&str>, guidance: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let num_inference_steps = parse_setting("RGEN_DEFAULT_STEPS", steps)?
            .map(clamp_inference_steps)
            .unwrap_or(defaults.num_inference_steps);
        let guidance_scale = parse_setting("RGEN_DEFAULT_GUIDANCE", guidance)?
            .map(clamp_guidance_scale)
            .unwrap_or(defaults.guidance_scale);

        Ok(FormDefaults {
            num_inference_steps,
            guidance_scale,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: EndpointConfig::default(),
            form_defaults: FormDefaults::default(),
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        let log_level = match env::var("RGEN_LOG_LEVEL") {
            Ok(level) => parse_log_level(&level)?,
            Err(_) => LogLevel::Info,
        };

        Ok(Config {
            endpoint: EndpointConfig::from_env(),
            form_defaults: FormDefaults::from_env()?,
            log_level,
        })
    }

    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_form_defaults(mut self, defaults: FormDefaults) -> Self {
        self.form_defaults = FormDefaults {
            num_inference_steps: clamp_inference_steps(defaults.num_inference_steps),
            guidance_scale: clamp_guidance_scale(defaults.guidance_scale),
        };
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

fn parse_setting<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            GenerationError::Config(format!("{} has an invalid value '{}'", name, value))
        }),
    }
}

fn parse_log_level(raw: &str) -> Result<LogLevel> {
    LogLevel::parse(raw).ok_or_else(|| {
        GenerationError::Config(format!("RGEN_LOG_LEVEL has an invalid value '{}'", raw))
    })
}
