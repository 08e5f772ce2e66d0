use rgen_studio::{
    logger::{self, LoggerConfig},
    render_page, Config, DeclineReason, GeneratedImage, ImageGallery, ImageGenerationForm,
    ImageGenerator, SubmitOutcome,
};
use std::env;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  prompt <text>     set the prompt
  negative <text>   set the negative prompt (empty clears it)
  steps <n>         inference steps (10-150)
  guidance <x>      guidance scale (1.0-20.0)
  advanced          show/hide advanced options
  generate          submit the form
  gallery           list images from this session
  show              redraw the page
  help              this text
  quit              exit";

#[derive(Debug, PartialEq)]
enum Command {
    Prompt(String),
    Negative(String),
    Steps(u32),
    Guidance(f32),
    Advanced,
    Generate,
    Gallery,
    Show,
    Help,
    Quit,
    Invalid(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "prompt" | "p" => Command::Prompt(rest.to_string()),
        "negative" | "n" => Command::Negative(rest.to_string()),
        "steps" => match rest.parse() {
            Ok(steps) => Command::Steps(steps),
            Err(_) => Command::Invalid(format!("steps expects a whole number, got '{}'", rest)),
        },
        "guidance" => match rest.parse() {
            Ok(scale) => Command::Guidance(scale),
            Err(_) => Command::Invalid(format!("guidance expects a number, got '{}'", rest)),
        },
        "advanced" | "a" => Command::Advanced,
        "generate" | "g" => Command::Generate,
        "gallery" => Command::Gallery,
        "show" | "" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Invalid(format!("unknown command '{}', try 'help'", other)),
    }
}

struct Studio {
    generator: ImageGenerator,
    form: ImageGenerationForm,
    gallery: ImageGallery,
    colors: bool,
}

impl Studio {
    fn new(config: &Config) -> Self {
        Self::with_generator(ImageGenerator::from_config(&config.endpoint), config)
    }

    fn with_generator(generator: ImageGenerator, config: &Config) -> Self {
        Self {
            generator,
            form: ImageGenerationForm::with_defaults(config.form_defaults),
            gallery: ImageGallery::new(),
            colors: env::var_os("NO_COLOR").is_none(),
        }
    }

    fn redraw(&self) {
        println!(
            "{}",
            render_page(
                &self.form,
                &self.generator.state(),
                &self.gallery,
                self.colors
            )
        );
    }

    /// Submits the form. Only a successful generation lands in the gallery.
    async fn submit(&mut self) -> SubmitOutcome<rgen_studio::Result<GeneratedImage>> {
        let outcome = self.form.submit(&self.generator).await;
        match &outcome {
            SubmitOutcome::Submitted(Ok(image)) => {
                self.gallery.push(image.clone());
            }
            SubmitOutcome::Submitted(Err(e)) => {
                log::debug!("Generation did not produce an image: {}", e);
            }
            SubmitOutcome::Declined(DeclineReason::EmptyPrompt) => {
                log::debug!("Nothing to generate: prompt is empty");
            }
            SubmitOutcome::Declined(DeclineReason::Busy) => {
                log::warn!("⚠️  Still generating, try again shortly");
            }
        }
        outcome
    }

    /// Returns false when the loop should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Prompt(text) => self.form.set_prompt(text),
            Command::Negative(text) => self.form.set_negative_prompt(text),
            Command::Steps(steps) => self.form.set_inference_steps(steps),
            Command::Guidance(scale) => self.form.set_guidance_scale(scale),
            Command::Advanced => self.form.toggle_advanced(),
            Command::Generate => {
                self.submit().await;
            }
            Command::Gallery => {
                println!("{}", self.gallery.render(self.colors));
                return true;
            }
            Command::Show => {}
            Command::Help => {
                println!("{}", HELP);
                return true;
            }
            Command::Quit => return false,
            Command::Invalid(message) => {
                println!("{}", message);
                return true;
            }
        }
        self.redraw();
        true
    }
}

async fn run_interactive(mut studio: Studio) -> Result<(), Box<dyn std::error::Error>> {
    studio.redraw();
    println!("\nType 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("rgen> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !studio.handle(parse_command(&line)).await {
            break;
        }
    }

    log::info!("👋 Session ended with {} image(s)", studio.gallery.len());
    Ok(())
}

async fn run_once(mut studio: Studio, prompt: String) -> Result<(), Box<dyn std::error::Error>> {
    studio.form.set_prompt(prompt);
    let outcome = studio.submit().await;
    studio.redraw();

    match outcome {
        SubmitOutcome::Declined(_) => Err("prompt is empty".into()),
        SubmitOutcome::Submitted(Err(e)) => Err(e.user_message().into()),
        SubmitOutcome::Submitted(Ok(_)) => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let config = Config::from_env()?;

    logger::init_with_config(LoggerConfig::new().with_level(config.log_level))?;
    if dotenv_loaded {
        log::debug!("✅ .env file loaded");
    } else {
        log::debug!("No .env file found, using process environment");
    }
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    logger::log_config_info(&config);

    let studio = Studio::new(&config);
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        run_interactive(studio).await
    } else {
        run_once(studio, args.join(" ")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rgen_studio::{GenerateImageRequest, GenerationError, ImageEndpoint};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Answers each request with the next scripted reply.
    struct ScriptedEndpoint {
        replies: Mutex<VecDeque<rgen_studio::Result<String>>>,
    }

    impl ScriptedEndpoint {
        fn new(replies: Vec<rgen_studio::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl ImageEndpoint for ScriptedEndpoint {
        async fn generate_image(&self, _request: &GenerateImageRequest) -> rgen_studio::Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Request("no reply scripted".into())))
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("prompt A cat  "), Command::Prompt("A cat".into()));
        assert_eq!(parse_command("negative"), Command::Negative(String::new()));
        assert_eq!(parse_command("steps 80"), Command::Steps(80));
        assert_eq!(parse_command("guidance 7.5"), Command::Guidance(7.5));
        assert_eq!(parse_command("ADVANCED"), Command::Advanced);
        assert_eq!(parse_command("g"), Command::Generate);
        assert_eq!(parse_command(""), Command::Show);
        assert_eq!(parse_command("exit"), Command::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        assert!(matches!(parse_command("steps many"), Command::Invalid(_)));
        assert!(matches!(parse_command("guidance -"), Command::Invalid(_)));
        assert!(matches!(parse_command("paint"), Command::Invalid(_)));
    }

    #[tokio::test]
    async fn test_generate_with_blank_prompt_sends_nothing() {
        let config = Config::new();
        let mut studio = Studio::new(&config);
        assert!(matches!(
            studio.submit().await,
            SubmitOutcome::Declined(DeclineReason::EmptyPrompt)
        ));
        assert!(studio.gallery.is_empty());
        assert!(studio.generator.error().is_none());
    }

    #[tokio::test]
    async fn test_only_successful_generations_reach_the_gallery() {
        let endpoint = ScriptedEndpoint::new(vec![
            Ok("https://img/1.png".to_string()),
            Err(GenerationError::Status { status: 500 }),
            Ok("https://img/2.png".to_string()),
        ]);
        let mut studio = Studio::with_generator(ImageGenerator::new(endpoint), &Config::new());
        studio.form.set_prompt("A cat");

        assert!(matches!(studio.submit().await, SubmitOutcome::Submitted(Ok(_))));
        assert_eq!(studio.gallery.len(), 1);

        assert!(matches!(studio.submit().await, SubmitOutcome::Submitted(Err(_))));
        assert_eq!(studio.gallery.len(), 1);
        assert_eq!(
            studio.generator.error().as_deref(),
            Some("Failed to generate image")
        );
        assert_eq!(
            studio.generator.current_image().map(|image| image.url().to_string()),
            Some("https://img/1.png".to_string())
        );

        assert!(matches!(studio.submit().await, SubmitOutcome::Submitted(Ok(_))));
        let urls: Vec<_> = studio.gallery.iter().map(|image| image.url()).collect();
        assert_eq!(urls, vec!["https://img/2.png", "https://img/1.png"]);
    }
}
