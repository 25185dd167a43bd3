use clap::Parser;
use iced::widget::{button, checkbox, column, container, image, pick_list, row, text, text_input, TextInput};
use iced::{Alignment, Element, Length, Subscription, Task, Theme};
use parking_lot::Mutex;
use rfd::FileDialog;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rgb_generator::color::{self, MAX_INDEX};
use rgb_generator::generate::naming::Layout;
use rgb_generator::generate::pattern::{ImageSize, Pattern};
use rgb_generator::generate::{GenerationEngine, ProgressCallback, ProgressSnapshot, RunStatus, RunSummary};
use rgb_generator::logging;
use rgb_generator::state::settings::{self, GeneratorConfig};
use rgb_generator::{EngineOptions, GenerationRequest};

mod headless;
mod ui;

/// How often the window pulls the latest snapshot from the workers
const PROGRESS_POLL: Duration = Duration::from_millis(200);

/// Default palette size offered for the mandala pattern
const DEFAULT_COLORS_PER_IMAGE: u32 = 5;

#[derive(Parser, Debug)]
#[command(name = "rgb-generator", version, about = "Enumerate the RGB color space into PNG files")]
struct Cli {
    /// Run a JSON job file without opening the window
    #[arg(long)]
    job: Option<PathBuf>,

    /// With --job: only count the images already on disk
    #[arg(long, requires = "job")]
    inventory: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Pattern choices offered in the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternChoice {
    Single,
    Mandala,
}

impl PatternChoice {
    const ALL: [PatternChoice; 2] = [PatternChoice::Single, PatternChoice::Mandala];
}

impl fmt::Display for PatternChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternChoice::Single => write!(f, "Single"),
            PatternChoice::Mandala => write!(f, "Mandala"),
        }
    }
}

/// Text fields as typed; parsed into a request on Start
#[derive(Debug, Clone)]
struct Form {
    output_dir: String,
    start: String,
    end: String,
    width: String,
    height: String,
    pattern: PatternChoice,
    colors_per_image: String,
    use_buckets: bool,
    gray_start: String,
    gray_end: String,
}

impl Form {
    fn from_request(request: &GenerationRequest) -> Self {
        let (pattern, colors) = match request.pattern {
            Pattern::Single => (PatternChoice::Single, DEFAULT_COLORS_PER_IMAGE),
            Pattern::Mandala { colors_per_image } => (PatternChoice::Mandala, colors_per_image),
        };
        let (use_buckets, gray_start, gray_end) = match request.layout {
            Layout::Canonical => (false, 1, 255),
            Layout::GrayscaleBuckets { gray_start, gray_end } => (true, gray_start, gray_end),
        };

        Self {
            output_dir: request.output_root.display().to_string(),
            start: request.start.to_string(),
            end: request.end.to_string(),
            width: request.size.width.to_string(),
            height: request.size.height.to_string(),
            pattern,
            colors_per_image: colors.to_string(),
            use_buckets,
            gray_start: gray_start.to_string(),
            gray_end: gray_end.to_string(),
        }
    }

    /// Parse every field; the first bad one is reported by name
    fn to_request(&self) -> Result<GenerationRequest, String> {
        let pattern = match self.pattern {
            PatternChoice::Single => Pattern::Single,
            PatternChoice::Mandala => Pattern::Mandala {
                colors_per_image: parse_field(&self.colors_per_image, "Colors per image")?,
            },
        };
        let layout = if self.use_buckets {
            Layout::GrayscaleBuckets {
                gray_start: parse_field(&self.gray_start, "Greyscale start")?,
                gray_end: parse_field(&self.gray_end, "Greyscale end")?,
            }
        } else {
            Layout::Canonical
        };

        let request = GenerationRequest {
            output_root: PathBuf::from(self.output_dir.trim()),
            start: parse_field(&self.start, "Color range start")?,
            end: parse_field(&self.end, "Color range end")?,
            size: ImageSize::new(
                parse_field(&self.width, "Width")?,
                parse_field(&self.height, "Height")?,
            ),
            pattern,
            layout,
        };
        request.validate().map_err(|e| e.to_string())?;
        Ok(request)
    }

    /// Pattern used for the preview, falling back to Single while fields are incomplete
    fn preview_pattern(&self) -> Pattern {
        match self.pattern {
            PatternChoice::Single => Pattern::Single,
            PatternChoice::Mandala => Pattern::Mandala {
                colors_per_image: self.colors_per_image.trim().parse().unwrap_or(DEFAULT_COLORS_PER_IMAGE),
            },
        }
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} is not a valid number: '{}'", name, value))
}

/// Main application state
struct RgbGenerator {
    form: Form,
    /// Engine tuning loaded from settings; not editable in the window
    options: EngineOptions,
    /// Engine of the run in progress
    engine: Option<Arc<GenerationEngine>>,
    /// Latest snapshot written by the workers
    shared_progress: Arc<Mutex<Option<ProgressSnapshot>>>,
    /// Snapshot shown in the window
    progress: Option<ProgressSnapshot>,
    preview: image::Handle,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    OutputDirChanged(String),
    /// User clicked the folder picker button
    BrowseOutput,
    StartChanged(String),
    EndChanged(String),
    WidthChanged(String),
    HeightChanged(String),
    PatternSelected(PatternChoice),
    ColorsPerImageChanged(String),
    BucketsToggled(bool),
    GrayStartChanged(String),
    GrayEndChanged(String),
    Start,
    Stop,
    /// Poll the shared snapshot
    Tick,
    /// Background run reached a terminal state
    Finished(Result<RunSummary, String>),
}

impl RgbGenerator {
    fn new() -> (Self, Task<Message>) {
        let config = GeneratorConfig::load_or_default(&settings::settings_path());
        let form = Form::from_request(&config.request);
        let preview = ui::preview::pattern_preview(form.preview_pattern(), color::decode_unchecked(config.request.start));

        (
            RgbGenerator {
                form,
                options: config.options,
                engine: None,
                shared_progress: Arc::new(Mutex::new(None)),
                progress: None,
                preview,
                status: "Ready.".to_string(),
            },
            Task::none(),
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OutputDirChanged(value) => self.form.output_dir = value,
            Message::BrowseOutput => {
                // Show the native folder picker dialog
                if let Some(folder) = FileDialog::new().set_title("Select Output Folder").pick_folder() {
                    self.form.output_dir = folder.display().to_string();
                }
            }
            Message::StartChanged(value) => {
                self.form.start = value;
                self.refresh_preview();
            }
            Message::EndChanged(value) => self.form.end = value,
            Message::WidthChanged(value) => self.form.width = value,
            Message::HeightChanged(value) => self.form.height = value,
            Message::PatternSelected(choice) => {
                self.form.pattern = choice;
                self.refresh_preview();
            }
            Message::ColorsPerImageChanged(value) => {
                self.form.colors_per_image = value;
                self.refresh_preview();
            }
            Message::BucketsToggled(enabled) => self.form.use_buckets = enabled,
            Message::GrayStartChanged(value) => self.form.gray_start = value,
            Message::GrayEndChanged(value) => self.form.gray_end = value,
            Message::Start => return self.start(),
            Message::Stop => {
                if let Some(engine) = &self.engine {
                    engine.stop();
                    self.status = "Stopping after in-flight images...".to_string();
                }
            }
            Message::Tick => {
                if let Some(snapshot) = *self.shared_progress.lock() {
                    self.progress = Some(snapshot);
                }
            }
            Message::Finished(result) => {
                self.engine = None;
                match result {
                    Ok(summary) => {
                        self.progress = Some(summary.progress);
                        let started = summary.started_at.format("%H:%M:%S");
                        self.status = match summary.status {
                            RunStatus::Completed => {
                                format!("✅ The images have been successfully generated! (started {})", started)
                            }
                            RunStatus::Aborted => format!("⏹️  The image generation has been stopped. (started {})", started),
                            RunStatus::Failed { reason } => format!("❌ An error occurred: {}", reason),
                        };
                    }
                    Err(e) => self.status = format!("❌ An error occurred: {}", e),
                }
            }
        }

        Task::none()
    }

    /// Validate the form, persist it, and launch the run in the background
    fn start(&mut self) -> Task<Message> {
        if self.engine.is_some() {
            return Task::none();
        }

        let request = match self.form.to_request() {
            Ok(request) => request,
            Err(e) => {
                self.status = format!("⚠️  {}", e);
                return Task::none();
            }
        };

        let config = GeneratorConfig::new(request.clone(), self.options);
        if let Err(e) = config.save(&settings::settings_path()) {
            tracing::warn!(error = %e, "Could not save settings");
        }

        // Fresh engine and token for every run
        let engine = Arc::new(GenerationEngine::new(self.options));
        self.engine = Some(engine.clone());
        *self.shared_progress.lock() = None;
        self.progress = None;
        self.status = format!("Generating into {}...", request.output_root.display());

        let shared = self.shared_progress.clone();
        let callback: ProgressCallback = Arc::new(move |snapshot: ProgressSnapshot| {
            *shared.lock() = Some(snapshot);
        });

        Task::perform(run_generation(engine, request, callback), Message::Finished)
    }

    fn refresh_preview(&mut self) {
        let start = self.form.start.trim().parse::<u32>().unwrap_or(0).min(MAX_INDEX);
        self.preview = ui::preview::pattern_preview(self.form.preview_pattern(), color::decode_unchecked(start));
    }

    fn subscription(&self) -> Subscription<Message> {
        let polling = self
            .engine
            .as_ref()
            .is_some_and(|engine| !engine.state().is_terminal());
        if polling {
            iced::time::every(PROGRESS_POLL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let running = self.engine.is_some();

        let output_row = row![
            text("Output dir:").width(Length::Fixed(130.0)),
            text_input("Output folder", &self.form.output_dir)
                .on_input(Message::OutputDirChanged)
                .width(Length::Fill),
            button("Output").on_press(Message::BrowseOutput),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let range_row = row![
            text("Color range:").width(Length::Fixed(130.0)),
            number_input("0", &self.form.start, Message::StartChanged),
            text("to"),
            number_input("16777215", &self.form.end, Message::EndChanged),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let size_row = row![
            text("Image size:").width(Length::Fixed(130.0)),
            number_input("width", &self.form.width, Message::WidthChanged),
            text("x"),
            number_input("height", &self.form.height, Message::HeightChanged),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let pattern_row = row![
            text("Pattern:").width(Length::Fixed(130.0)),
            pick_list(PatternChoice::ALL, Some(self.form.pattern), Message::PatternSelected),
            text("Colors per image:"),
            number_input("5", &self.form.colors_per_image, Message::ColorsPerImageChanged),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let bucket_row = row![
            checkbox("Greyscale buckets (legacy layout)", self.form.use_buckets)
                .on_toggle(Message::BucketsToggled),
            number_input("1", &self.form.gray_start, Message::GrayStartChanged),
            text("to"),
            number_input("255", &self.form.gray_end, Message::GrayEndChanged),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let controls = row![
            button("Start").on_press_maybe((!running).then_some(Message::Start)).padding(10),
            button("Stop").on_press_maybe(running.then_some(Message::Stop)).padding(10),
        ]
        .spacing(20);

        let content = column![
            text("RGB Generator").size(32),
            output_row,
            range_row,
            size_row,
            pattern_row,
            bucket_row,
            image(self.preview.clone()).width(Length::Fixed(96.0)).height(Length::Fixed(96.0)),
            ui::progress::progress_panel(self.progress.as_ref()),
            controls,
            text(&self.status).size(16),
        ]
        .spacing(16)
        .padding(30)
        .align_x(Alignment::Center);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Short numeric text field
fn number_input<'a>(placeholder: &'a str, value: &'a str, on_input: fn(String) -> Message) -> TextInput<'a, Message> {
    text_input(placeholder, value).on_input(on_input).width(Length::Fixed(110.0))
}

/// Run the engine on a blocking thread so the UI stays responsive
async fn run_generation(
    engine: Arc<GenerationEngine>,
    request: GenerationRequest,
    callback: ProgressCallback,
) -> Result<RunSummary, String> {
    tokio::task::spawn_blocking(move || engine.run(&request, Some(callback)).map_err(|e| e.to_string()))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    if let Some(job) = cli.job {
        return headless::run_job(&job, cli.inventory);
    }

    iced::application("RGB Generator", RgbGenerator::update, RgbGenerator::view)
        .subscription(RgbGenerator::subscription)
        .theme(RgbGenerator::theme)
        .centered()
        .run_with(RgbGenerator::new)?;

    Ok(())
}
