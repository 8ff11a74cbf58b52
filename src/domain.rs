use std::path::PathBuf;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_LOG_FILE: &str = "~/.panic-tv.log";

#[derive(Debug, thiserror::Error)]
pub enum PanicError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("api responded with status {0}")]
    HttpStatus(u16),
    #[error("invalid json: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("logging setup failed: {0}")]
    Logging(String),
}

#[derive(Debug, Clone)]
pub struct PanicConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub snapshot_dir: Option<PathBuf>,
    pub page_size: usize,
    pub request_timeout_ms: u64,
    pub event_poll_time: u64,
    pub log_file: PathBuf,
}

impl Default for PanicConfig {
    fn default() -> Self {
        PanicConfig {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            snapshot_dir: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_ms: 5000,
            event_poll_time: 100,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// What the command line is currently collecting input for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
    GotoPage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    NextTab,
    PrevTab,
    SelectTab(usize),
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Sort,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    GotoPage,
    Filter,
    ClearFilter,
    Enter,
    Exit,
    Breakdown,
    CopyRow,
    Reload,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Panic! At The Syslog

  Tab / Shift-Tab   next / previous page
  1 2 3 4           Overview, Incidents, Recommendations, Review Queue
  /                 filter rows (Enter keeps, Esc clears)
  x                 clear filter
  Left / Right      select column
  s                 sort by selected column (again to reverse)
  n / p             next / previous page
  g / G             first / last page
  :                 go to page number
  Up / Down         move row selection
  Enter             show the selected record
  h                 value breakdown of the selected column
  y                 copy selected record as JSON
  r                 reload all data
  ?                 this help
  Esc               close popup
  q                 quit";
