pub mod image_client;

use crate::{error::Result, models::GenerateImageRequest};
use async_trait::async_trait;

pub use image_client::ImageClient;

/// Anything that can turn a prompt plus options into the URL of a produced
/// image. The generator only talks to this seam.
#[async_trait]
pub trait ImageEndpoint: Send + Sync {
    /// Issues exactly one request. Returns the first produced image URL.
    async fn generate_image(&self, request: &GenerateImageRequest) -> Result<String>;
}
