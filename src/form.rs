use async_trait::async_trait;

use crate::{
    config::FormDefaults,
    models::{clamp_guidance_scale, clamp_inference_steps, GenerationOptions},
};

/// Receives submissions from an [`ImageGenerationForm`].
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    /// What a completed submission reports back to the caller.
    type Output: Send;

    /// While this is true the form refuses to submit.
    fn is_busy(&self) -> bool {
        false
    }

    async fn on_submit(&self, prompt: &str, options: GenerationOptions) -> Self::Output;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    EmptyPrompt,
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome<T> {
    Submitted(T),
    Declined(DeclineReason),
}

/// Advanced fields as they are typed, before being packaged into
/// [`GenerationOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedOptions {
    pub negative_prompt: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
}

impl AdvancedOptions {
    fn from_defaults(defaults: FormDefaults) -> Self {
        Self {
            negative_prompt: String::new(),
            num_inference_steps: clamp_inference_steps(defaults.num_inference_steps),
            guidance_scale: clamp_guidance_scale(defaults.guidance_scale),
        }
    }
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self::from_defaults(FormDefaults::default())
    }
}

/// Prompt input plus the collapsible advanced options panel.
///
/// `submit` borrows the form mutably for the whole request, so the same form
/// can be neither edited nor resubmitted until the handler completes.
#[derive(Debug, Clone, Default)]
pub struct ImageGenerationForm {
    prompt: String,
    show_advanced: bool,
    options: AdvancedOptions,
}

impl ImageGenerationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: FormDefaults) -> Self {
        Self {
            options: AdvancedOptions::from_defaults(defaults),
            ..Self::default()
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn show_advanced(&self) -> bool {
        self.show_advanced
    }

    /// Flips panel visibility. Entered values are kept.
    pub fn toggle_advanced(&mut self) {
        self.show_advanced = !self.show_advanced;
    }

    /// Label of the toggle button.
    pub fn toggle_label(&self) -> &'static str {
        if self.show_advanced {
            "Hide Advanced Options"
        } else {
            "Show Advanced Options"
        }
    }

    pub fn advanced(&self) -> &AdvancedOptions {
        &self.options
    }

    pub fn set_negative_prompt(&mut self, negative_prompt: impl Into<String>) {
        self.options.negative_prompt = negative_prompt.into();
    }

    /// Stored clamped to 10..=150.
    pub fn set_inference_steps(&mut self, steps: u32) {
        self.options.num_inference_steps = clamp_inference_steps(steps);
    }

    /// Stored clamped to 1.0..=20.0 in steps of 0.1.
    pub fn set_guidance_scale(&mut self, scale: f32) {
        self.options.guidance_scale = clamp_guidance_scale(scale);
    }

    /// Whether the submit button would be enabled.
    pub fn can_submit(&self, busy: bool) -> bool {
        !busy && !self.prompt.trim().is_empty()
    }

    /// The options that would be sent right now. A blank negative prompt is
    /// left out.
    pub fn generation_options(&self) -> GenerationOptions {
        let negative_prompt = self.options.negative_prompt.trim();
        GenerationOptions {
            negative_prompt: (!negative_prompt.is_empty())
                .then(|| self.options.negative_prompt.clone()),
            num_inference_steps: Some(self.options.num_inference_steps),
            guidance_scale: Some(self.options.guidance_scale),
        }
    }

    /// Hands the prompt and options to `handler` and waits for it. Declines
    /// without calling the handler when the prompt is blank or the handler is
    /// busy.
    pub async fn submit<H>(&mut self, handler: &H) -> SubmitOutcome<H::Output>
    where
        H: SubmitHandler + ?Sized,
    {
        if self.prompt.trim().is_empty() {
            log::debug!("Form declined: empty prompt");
            return SubmitOutcome::Declined(DeclineReason::EmptyPrompt);
        }
        if handler.is_busy() {
            log::debug!("Form declined: handler busy");
            return SubmitOutcome::Declined(DeclineReason::Busy);
        }

        let options = self.generation_options();
        SubmitOutcome::Submitted(handler.on_submit(&self.prompt, options).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        busy: AtomicBool,
        submissions: Mutex<Vec<(String, GenerationOptions)>>,
    }

    impl RecordingHandler {
        fn submissions(&self) -> Vec<(String, GenerationOptions)> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubmitHandler for RecordingHandler {
        type Output = usize;

        fn is_busy(&self) -> bool {
            self.busy.load(Ordering::SeqCst)
        }

        async fn on_submit(&self, prompt: &str, options: GenerationOptions) -> usize {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push((prompt.to_string(), options));
            submissions.len()
        }
    }

    #[test]
    fn test_defaults() {
        let form = ImageGenerationForm::new();
        assert_eq!(form.prompt(), "");
        assert!(!form.show_advanced());
        assert_eq!(form.advanced().num_inference_steps, 50);
        assert_eq!(form.advanced().guidance_scale, 7.5);
        assert_eq!(form.advanced().negative_prompt, "");
    }

    #[tokio::test]
    async fn test_blank_prompts_never_submit() {
        let handler = RecordingHandler::default();
        let mut form = ImageGenerationForm::new();

        for prompt in ["", " ", "\t\n", "    "] {
            form.set_prompt(prompt);
            assert!(!form.can_submit(false));
            assert_eq!(
                form.submit(&handler).await,
                SubmitOutcome::Declined(DeclineReason::EmptyPrompt)
            );
        }
        assert!(handler.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_valid_prompt_submits_once() {
        let handler = RecordingHandler::default();
        let mut form = ImageGenerationForm::new();
        form.set_prompt("A cat");

        assert!(form.can_submit(false));
        assert_eq!(form.submit(&handler).await, SubmitOutcome::Submitted(1));

        let submissions = handler.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].0, "A cat");
        assert_eq!(
            submissions[0].1,
            GenerationOptions::new()
                .with_inference_steps(50)
                .with_guidance_scale(7.5)
        );
    }

    #[tokio::test]
    async fn test_busy_handler_declines() {
        let handler = RecordingHandler::default();
        handler.busy.store(true, Ordering::SeqCst);
        let mut form = ImageGenerationForm::new();
        form.set_prompt("A cat");

        assert!(!form.can_submit(true));
        assert_eq!(
            form.submit(&handler).await,
            SubmitOutcome::Declined(DeclineReason::Busy)
        );
        assert!(handler.submissions().is_empty());
    }

    #[test]
    fn test_toggle_twice_preserves_values() {
        let mut form = ImageGenerationForm::new();
        assert_eq!(form.toggle_label(), "Show Advanced Options");

        form.toggle_advanced();
        assert!(form.show_advanced());
        assert_eq!(form.toggle_label(), "Hide Advanced Options");
        form.set_negative_prompt("blurry");
        form.set_inference_steps(80);
        form.set_guidance_scale(12.3);
        let entered = form.advanced().clone();

        form.toggle_advanced();
        assert!(!form.show_advanced());
        assert_eq!(form.advanced(), &entered);

        form.toggle_advanced();
        form.toggle_advanced();
        assert!(!form.show_advanced());
        assert_eq!(form.advanced(), &entered);
    }

    #[test]
    fn test_numeric_inputs_are_clamped() {
        let mut form = ImageGenerationForm::new();
        form.set_inference_steps(3);
        assert_eq!(form.advanced().num_inference_steps, 10);
        form.set_inference_steps(999);
        assert_eq!(form.advanced().num_inference_steps, 150);
        form.set_guidance_scale(0.0);
        assert_eq!(form.advanced().guidance_scale, 1.0);
        form.set_guidance_scale(25.0);
        assert_eq!(form.advanced().guidance_scale, 20.0);
    }

    #[test]
    fn test_negative_prompt_packaging() {
        let mut form = ImageGenerationForm::new();
        form.set_negative_prompt("   ");
        assert!(form.generation_options().negative_prompt.is_none());

        form.set_negative_prompt("low quality");
        assert_eq!(
            form.generation_options().negative_prompt.as_deref(),
            Some("low quality")
        );
    }

    #[test]
    fn test_configured_defaults() {
        let form = ImageGenerationForm::with_defaults(FormDefaults {
            num_inference_steps: 30,
            guidance_scale: 9.0,
        });
        assert_eq!(form.advanced().num_inference_steps, 30);
        assert_eq!(form.advanced().guidance_scale, 9.0);
    }
}
