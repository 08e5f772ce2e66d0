pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod form;
pub mod generator;
pub mod logger;
pub mod models;

pub use client::{ImageClient, ImageEndpoint};
pub use config::{Config, EndpointConfig, FormDefaults};
pub use display::{render_page, ImageDisplay, ImageGallery};
pub use error::{GenerationError, Result};
pub use form::{DeclineReason, ImageGenerationForm, SubmitHandler, SubmitOutcome};
pub use generator::{GenerationPhase, GeneratorState, ImageGenerator};
pub use models::{GenerateImageRequest, GenerateImageResponse, GeneratedImage, GenerationOptions};
