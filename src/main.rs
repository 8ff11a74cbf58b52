use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use clap::builder::TypedValueParser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod collation;
mod controller;
mod domain;
mod grid;
mod inputter;
mod loader;
mod model;
mod pages;
mod record;
mod ui;

use controller::Controller;
use domain::{DEFAULT_API_BASE_URL, DEFAULT_LOG_FILE, DEFAULT_PAGE_SIZE, PanicConfig, PanicError};
use model::{Model, Status};
use ui::DashboardUI;

/// Terminal dashboard for incidents, recommendations and the review queue.
#[derive(Parser, Debug)]
#[command(name = "panic", version, about)]
struct Args {
    /// Base URL of the backend API
    #[arg(long, env = "API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Bearer token sent with every API request
    #[arg(long, env = "API_INTERNAL_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Read collections from a directory of json/csv/parquet/arrow files instead of the API
    #[arg(long, env = "PANIC_SNAPSHOT_DIR")]
    snapshot: Option<String>,

    /// Rows per table page
    #[arg(long, env = "PANIC_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE,
          value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    page_size: usize,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Log file
    #[arg(long, env = "PANIC_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: String,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(path).map(|p| p.into_owned()).unwrap_or_else(|_| path.to_string()))
}

impl Args {
    fn into_config(self) -> PanicConfig {
        PanicConfig {
            api_base_url: self.api_base_url,
            api_token: self.api_token,
            snapshot_dir: self.snapshot.as_deref().map(expand),
            page_size: self.page_size,
            request_timeout_ms: self.timeout_ms,
            event_poll_time: self.poll_ms,
            log_file: expand(&self.log_file),
        }
    }
}

fn init_tracing(config: &PanicConfig) -> Result<(), PanicError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| PanicError::Logging(e.to_string()))
}

fn main() -> ExitCode {
    let config = Args::parse().into_config();
    if let Err(e) = init_tracing(&config) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let mut terminal = ratatui::init();
    let result = run(&config, &mut terminal);
    ratatui::restore();

    match result {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(config: &PanicConfig, terminal: &mut ratatui::DefaultTerminal) -> Result<(), PanicError> {
    info!(
        "Starting panic: api {}, snapshot {:?}, page size {}",
        config.api_base_url, config.snapshot_dir, config.page_size
    );

    let mut model = Model::init(config, loader::source_from_config(config)?)?;
    let mut ui = DashboardUI::new();
    let controller = Controller::new(config);

    // One frame before the fetch so the loading state is visible.
    terminal.draw(|f| ui.draw(&model.get_uidata(), f))?;
    model.load();

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model.get_uidata(), f))?;
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye!");
    Ok(())
}
