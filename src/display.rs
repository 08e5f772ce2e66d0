//! Text rendering of the form, the error banner, the current image and the
//! gallery.

use colored::*;

use crate::{
    form::ImageGenerationForm,
    generator::GeneratorState,
    models::{GeneratedImage, GenerationOptions},
};

pub const PAGE_TITLE: &str = "AI Image Generator";

fn paint(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.color(color).to_string()
    } else {
        text.to_string()
    }
}

fn describe_options(options: &GenerationOptions) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(negative) = &options.negative_prompt {
        lines.push(format!("Negative prompt: {}", negative));
    }
    if let Some(steps) = options.num_inference_steps {
        lines.push(format!("Inference steps: {}", steps));
    }
    if let Some(scale) = options.guidance_scale {
        lines.push(format!("Guidance scale: {:.1}", scale));
    }
    lines
}

/// Shows a single generated image.
pub struct ImageDisplay<'a> {
    image: &'a GeneratedImage,
}

impl<'a> ImageDisplay<'a> {
    pub fn new(image: &'a GeneratedImage) -> Self {
        Self { image }
    }

    pub fn render(&self, colors: bool) -> String {
        let mut out = String::new();
        out.push_str(&paint(self.image.url(), Color::BrightBlue, colors));
        out.push('\n');
        out.push_str(&format!("Prompt: {}\n", self.image.prompt()));
        for line in describe_options(self.image.options()) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&paint(
            &format!("Generated {} (id {})", self.image.timestamp_iso(), self.image.id()),
            Color::BrightBlack,
            colors,
        ));
        out
    }
}

/// Session-local collection of past results, newest first. Nothing is
/// persisted.
#[derive(Debug, Clone, Default)]
pub struct ImageGallery {
    images: Vec<GeneratedImage>,
}

impl ImageGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `image` at the front. An image whose id is already present is
    /// ignored; returns whether it was added.
    pub fn push(&mut self, image: GeneratedImage) -> bool {
        if self.images.iter().any(|existing| existing.id() == image.id()) {
            return false;
        }
        self.images.insert(0, image);
        true
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedImage> {
        self.images.iter()
    }

    pub fn render(&self, colors: bool) -> String {
        if self.images.is_empty() {
            return "No images yet.".to_string();
        }
        self.images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                format!(
                    "{:>3}. {}  {}",
                    index + 1,
                    paint(image.url(), Color::BrightBlue, colors),
                    image.prompt()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_form(form: &ImageGenerationForm, generating: bool, colors: bool) -> String {
    let mut out = String::new();
    out.push_str("Describe your image\n");
    if form.prompt().is_empty() {
        out.push_str(&paint(
            "> A serene landscape with mountains...",
            Color::BrightBlack,
            colors,
        ));
    } else {
        out.push_str(&format!("> {}", form.prompt()));
    }
    out.push('\n');
    out.push_str(&format!("[{}]\n", form.toggle_label()));

    if form.show_advanced() {
        let advanced = form.advanced();
        let negative = if advanced.negative_prompt.is_empty() {
            "(none)"
        } else {
            advanced.negative_prompt.as_str()
        };
        out.push_str(&format!("  Negative Prompt: {}\n", negative));
        out.push_str(&format!(
            "  Inference Steps: {}\n",
            advanced.num_inference_steps
        ));
        out.push_str(&format!(
            "  Guidance Scale: {:.1}\n",
            advanced.guidance_scale
        ));
    }

    let button = if generating {
        "Generating..."
    } else {
        "Generate Image"
    };
    if form.can_submit(generating) {
        out.push_str(&format!("[{}]", paint(button, Color::Green, colors)));
    } else {
        out.push_str(&format!("[{}] (disabled)", button));
    }
    out
}

/// The whole page: title, form, error banner, current image and gallery.
pub fn render_page(
    form: &ImageGenerationForm,
    state: &GeneratorState,
    gallery: &ImageGallery,
    colors: bool,
) -> String {
    let mut sections = vec![
        if colors {
            PAGE_TITLE.bold().to_string()
        } else {
            PAGE_TITLE.to_string()
        },
        render_form(form, state.generating, colors),
    ];

    if let Some(error) = &state.error {
        sections.push(paint(&format!("! {}", error), Color::Red, colors));
    }
    if let Some(image) = &state.current_image {
        sections.push(ImageDisplay::new(image).render(colors));
    }
    sections.push(format!("Gallery ({})\n{}", gallery.len(), gallery.render(colors)));

    sections.join("\n\n")
}
