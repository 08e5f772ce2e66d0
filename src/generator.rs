use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    client::{ImageClient, ImageEndpoint},
    config::EndpointConfig,
    error::{GenerationError, Result},
    form::SubmitHandler,
    logger,
    models::{GenerateImageRequest, GeneratedImage, GenerationOptions},
};

/// What the page should show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPhase {
    Idle,
    Generating,
    Succeeded(GeneratedImage),
    Failed(String),
}

/// The three pieces of state the generator owns. An error and a stale image
/// can be present at the same time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorState {
    pub generating: bool,
    pub error: Option<String>,
    pub current_image: Option<GeneratedImage>,
}

impl GeneratorState {
    pub fn phase(&self) -> GenerationPhase {
        if self.generating {
            GenerationPhase::Generating
        } else if let Some(error) = &self.error {
            GenerationPhase::Failed(error.clone())
        } else if let Some(image) = &self.current_image {
            GenerationPhase::Succeeded(image.clone())
        } else {
            GenerationPhase::Idle
        }
    }
}

/// Runs one generation at a time against an [`ImageEndpoint`] and keeps the
/// result or error for display.
pub struct ImageGenerator {
    endpoint: Arc<dyn ImageEndpoint>,
    state: Mutex<GeneratorState>,
    in_flight: AtomicBool,
    /// Last record id handed out, in epoch milliseconds.
    last_id: AtomicI64,
}

impl ImageGenerator {
    pub fn new(endpoint: Arc<dyn ImageEndpoint>) -> Self {
        Self {
            endpoint,
            state: Mutex::new(GeneratorState::default()),
            in_flight: AtomicBool::new(false),
            last_id: AtomicI64::new(i64::MIN),
        }
    }

    /// Generator backed by the HTTP endpoint described by `config`.
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(Arc::new(ImageClient::new(config)))
    }

    fn lock_state(&self) -> MutexGuard<'_, GeneratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Time-derived id that is strictly greater than any id issued before
    /// by this generator, even within the same millisecond.
    fn issue_id(&self, now_millis: i64) -> i64 {
        let previous = self
            .last_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now_millis.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now_millis.max(previous.saturating_add(1))
    }

    pub fn state(&self) -> GeneratorState {
        self.lock_state().clone()
    }

    pub fn phase(&self) -> GenerationPhase {
        self.lock_state().phase()
    }

    pub fn is_generating(&self) -> bool {
        self.lock_state().generating
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn current_image(&self) -> Option<GeneratedImage> {
        self.lock_state().current_image.clone()
    }

    /// Sends one request for `prompt` with `options` and records the outcome.
    ///
    /// On success the new image replaces the current one. On failure the
    /// error banner is set to [`GenerationError::user_message`] and the
    /// current image is kept. Either way the outcome is also returned.
    ///
    /// A call made while another is in flight returns
    /// [`GenerationError::Busy`] without touching state or sending anything.
    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<GeneratedImage> {
        let _in_flight = InFlight::acquire(self).ok_or(GenerationError::Busy)?;

        let request_id = Uuid::new_v4().to_string();
        let _timer = logger::timer(format!("generate [req:{}]", request_id));
        log::info!("🎨 Generating image [req:{}]: {}", request_id, prompt);

        let request = GenerateImageRequest::new(prompt, options.clone());
        match self.endpoint.generate_image(&request).await {
            Ok(url) => {
                let now = Utc::now();
                let id = self.issue_id(now.timestamp_millis());
                let image = GeneratedImage::issued(id, now, url, prompt, options);
                log::info!(
                    "✅ Image {} ready [req:{}]: {}",
                    image.id(),
                    request_id,
                    image.url()
                );
                self.lock_state().current_image = Some(image.clone());
                Ok(image)
            }
            Err(e) => {
                let message = e.user_message();
                log::error!("❌ Generation failed [req:{}]: {}", request_id, e);
                self.lock_state().error = Some(message);
                Err(e)
            }
        }
    }

    /// Clears the error banner without touching the current image.
    pub fn dismiss_error(&self) {
        self.lock_state().error = None;
    }
}

/// Holds the single-flight slot. Dropping it, on any exit path including a
/// cancelled future, clears the generating flag.
struct InFlight<'a> {
    generator: &'a ImageGenerator,
}

impl<'a> InFlight<'a> {
    fn acquire(generator: &'a ImageGenerator) -> Option<Self> {
        generator
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let mut state = generator.lock_state();
        state.generating = true;
        state.error = None;
        drop(state);

        Some(Self { generator })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.generator.lock_state().generating = false;
        self.generator.in_flight.store(false, Ordering::Release);
    }
}

#[async_trait]
impl SubmitHandler for ImageGenerator {
    type Output = Result<GeneratedImage>;

    fn is_busy(&self) -> bool {
        self.is_generating()
    }

    async fn on_submit(&self, prompt: &str, options: GenerationOptions) -> Self::Output {
        let outcome = self.generate(prompt, options).await;
        if let Err(GenerationError::Busy) = outcome {
            log::warn!("⚠️  Submission ignored: a generation is already in progress");
        }
        outcome
    }
}
