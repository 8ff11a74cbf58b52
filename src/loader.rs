//! Collection loading.
//!
//! Every source hands out plain record vectors. Upstream failures (transport
//! errors, non-success status, malformed payloads, unreadable files) are logged
//! and turned into an empty collection, so pages always get a well-defined
//! input.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use polars::prelude::*;
use rayon::prelude::*;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, info, warn};

use crate::domain::{PanicConfig, PanicError};
use crate::record::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Incidents,
    Findings,
    Insights,
    ReviewQueue,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Incidents,
        Collection::Findings,
        Collection::Insights,
        Collection::ReviewQueue,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Collection::Incidents => "incidents",
            Collection::Findings => "findings",
            Collection::Insights => "insights",
            Collection::ReviewQueue => "review-queue",
        }
    }
}

pub trait RecordSource: Send + Sync {
    /// Fetches one collection. Never fails: errors yield an empty vector.
    fn fetch(&self, collection: Collection) -> Vec<Record>;

    fn describe(&self) -> String;
}

fn absorb(collection: Collection, result: Result<Vec<Record>, PanicError>) -> Vec<Record> {
    match result {
        Ok(records) => {
            debug!("Loaded {} {} records", records.len(), collection.path());
            records
        }
        Err(e) => {
            warn!("Loading {} failed, showing none: {e}", collection.path());
            Vec::new()
        }
    }
}

/// Extracts `items` from a `{"items": [...]}` envelope. Non-object items are
/// skipped.
pub fn parse_items(body: &str) -> Result<Vec<Record>, PanicError> {
    let payload: serde_json::Value = serde_json::from_str(body)?;
    let items = match payload {
        serde_json::Value::Object(mut map) => match map.remove("items") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(PanicError::MalformedPayload(
                    "`items` is missing or not an array".into(),
                ));
            }
        },
        _ => return Err(PanicError::MalformedPayload("expected an object".into())),
    };

    let total = items.len();
    let records: Vec<Record> = items
        .into_iter()
        .filter_map(|item| Record::try_from(item).ok())
        .collect();
    if records.len() < total {
        warn!("Skipped {} non-object items", total - records.len());
    }
    Ok(records)
}

/// Blocking client for the backend REST API.
pub struct ApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, PanicError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &PanicConfig) -> Result<Self, PanicError> {
        Self::new(
            &config.api_base_url,
            config.api_token.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn url(&self, collection: Collection) -> String {
        format!("{}/api/v1/{}", self.base_url, collection.path())
    }

    fn get(&self, collection: Collection) -> Result<Vec<Record>, PanicError> {
        let mut request = self.client.get(self.url(collection));
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = request.send()?;
        if !response.status().is_success() {
            return Err(PanicError::HttpStatus(response.status().as_u16()));
        }
        parse_items(&response.text()?)
    }
}

impl RecordSource for ApiClient {
    fn fetch(&self, collection: Collection) -> Vec<Record> {
        absorb(collection, self.get(collection))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[derive(Debug)]
enum FileType {
    JSON,
    CSV,
    PARQUET,
    ARROW,
}

/// Offline source: one exported file per collection in a directory.
pub struct SnapshotDir {
    dir: PathBuf,
}

impl SnapshotDir {
    const EXTENSIONS: [&'static str; 7] = ["json", "csv", "parquet", "pq", "arrow", "ipc", "feather"];

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn find(&self, collection: Collection) -> Option<PathBuf> {
        Self::EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{ext}", collection.path())))
            .find(|p| p.is_file())
    }

    fn read(&self, collection: Collection) -> Result<Vec<Record>, PanicError> {
        let Some(path) = self.find(collection) else {
            debug!("No snapshot for {} in {:?}", collection.path(), self.dir);
            return Ok(Vec::new());
        };
        check_readable(&path)?;
        match detect_file_type(&path)? {
            FileType::JSON => parse_items(&fs::read_to_string(&path)?),
            FileType::CSV => frame_to_records(load_csv(&path)?.collect()?),
            FileType::PARQUET => frame_to_records(load_parquet(&path)?.collect()?),
            FileType::ARROW => frame_to_records(load_arrow(&path)?.collect()?),
        }
    }
}

impl RecordSource for SnapshotDir {
    fn fetch(&self, collection: Collection) -> Vec<Record> {
        absorb(collection, self.read(collection))
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

fn check_readable(path: &Path) -> Result<(), PanicError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PanicError::FileNotFound,
        ErrorKind::PermissionDenied => PanicError::PermissionDenied,
        _ => PanicError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(PanicError::LoadingFailed("Not a file!".into()));
    }
    Ok(())
}

fn detect_file_type(path: &Path) -> Result<FileType, PanicError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("JSON") => Ok(FileType::JSON),
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(PanicError::UnknownFileType),
    }
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

fn is_integer_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
    )
}

fn is_float_type(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Reads one frame column as record values, keeping integers and floats
/// numeric and everything else as text.
fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(name)?;
    let dtype = column.dtype().clone();
    let values = if is_integer_type(&dtype) {
        column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect()
    } else if is_float_type(&dtype) {
        column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect()
    } else {
        column
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(Value::from).unwrap_or(Value::Null))
            .collect()
    };
    Ok(values)
}

fn frame_to_records(df: DataFrame) -> Result<Vec<Record>, PanicError> {
    let mut records = vec![Record::default(); df.height()];
    for name in df.get_column_names() {
        let values = column_values(&df, name)?;
        for (record, value) in records.iter_mut().zip(values) {
            record.insert(name.as_str(), value);
        }
    }
    Ok(records)
}

/// All collections of one load cycle.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub incidents: Vec<Record>,
    pub findings: Vec<Record>,
    pub insights: Vec<Record>,
    pub review_queue: Vec<Record>,
    pub load_time: Duration,
}

impl Collections {
    pub fn get(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Incidents => &self.incidents,
            Collection::Findings => &self.findings,
            Collection::Insights => &self.insights,
            Collection::ReviewQueue => &self.review_queue,
        }
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.get(collection).len()
    }
}

/// Fetches every collection, one rayon task each.
pub fn load_all(source: &dyn RecordSource) -> Collections {
    let start_time = Instant::now();
    let fetched: Vec<(Collection, Vec<Record>)> = Collection::ALL
        .par_iter()
        .map(|&c| (c, source.fetch(c)))
        .collect();

    let mut collections = Collections::default();
    for (collection, records) in fetched {
        match collection {
            Collection::Incidents => collections.incidents = records,
            Collection::Findings => collections.findings = records,
            Collection::Insights => collections.insights = records,
            Collection::ReviewQueue => collections.review_queue = records,
        }
    }
    collections.load_time = start_time.elapsed();
    info!(
        "Loaded collections from {} in {}ms ...",
        source.describe(),
        collections.load_time.as_millis()
    );
    collections
}

pub fn source_from_config(config: &PanicConfig) -> Result<Box<dyn RecordSource>, PanicError> {
    Ok(match &config.snapshot_dir {
        Some(dir) => Box::new(SnapshotDir::new(dir.clone())),
        None => Box::new(ApiClient::from_config(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serves exactly one HTTP response and reports the request head.
    fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            stream.write_all(response.as_bytes()).unwrap();
            tx.send(head).unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn client(base: &str, token: Option<&str>) -> ApiClient {
        ApiClient::new(base, token.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn source_follows_config() {
        let config = PanicConfig {
            api_base_url: "http://localhost:8000/".into(),
            ..PanicConfig::default()
        };
        let source = source_from_config(&config).unwrap();
        assert_eq!(source.describe(), "http://localhost:8000");

        let dir = tempfile::tempdir().unwrap();
        let config = PanicConfig {
            snapshot_dir: Some(dir.path().to_path_buf()),
            ..config
        };
        let source = source_from_config(&config).unwrap();
        assert_eq!(source.describe(), dir.path().display().to_string());
    }

    #[test]
    fn parses_items_envelope() {
        let records = parse_items(r#"{"items": [{"id": 1}, 7, {"id": "b"}], "total": 3}"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id().as_deref(), Some("b"));
    }

    #[test]
    fn rejects_malformed_envelopes() {
        assert!(matches!(parse_items("[]"), Err(PanicError::MalformedPayload(_))));
        assert!(matches!(
            parse_items(r#"{"items": {"id": 1}}"#),
            Err(PanicError::MalformedPayload(_))
        ));
        assert!(matches!(parse_items("not json"), Err(PanicError::JsonError(_))));
    }

    #[test]
    fn fetches_with_bearer_token() {
        let (base, head) = serve_once("200 OK", r#"{"items":[{"id":1,"severity":"high"}]}"#);
        let records = client(&base, Some("s3cret")).fetch(Collection::ReviewQueue);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("severity").as_deref(), Some("high"));

        let head = head.recv().unwrap().to_lowercase();
        assert!(head.starts_with("get /api/v1/review-queue "));
        assert!(head.contains("authorization: bearer s3cret"));
    }

    #[test]
    fn omits_authorization_without_token() {
        let (base, head) = serve_once("200 OK", r#"{"items":[]}"#);
        assert!(client(&base, Some("")).fetch(Collection::Incidents).is_empty());
        assert!(!head.recv().unwrap().to_lowercase().contains("authorization"));
    }

    #[test]
    fn error_status_yields_empty() {
        let (base, _head) = serve_once("503 Service Unavailable", r#"{"items":[{"id":1}]}"#);
        assert!(client(&base, None).fetch(Collection::Incidents).is_empty());
    }

    #[test]
    fn malformed_body_yields_empty() {
        let (base, _head) = serve_once("200 OK", r#"{"data":[{"id":1}]}"#);
        assert!(client(&base, None).fetch(Collection::Findings).is_empty());
    }

    #[test]
    fn unreachable_server_yields_empty() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let api = client(&format!("http://127.0.0.1:{port}/"), None);
        assert_eq!(api.url(Collection::Insights), format!("http://127.0.0.1:{port}/api/v1/insights"));
        assert!(api.fetch(Collection::Insights).is_empty());
    }

    #[test]
    fn snapshot_reads_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("incidents.json"),
            r#"{"items":[{"id":1,"severity":"high"},{"id":2,"severity":null}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("review-queue.csv"),
            "id,priority,score\n1,high,0.5\n2,,1.25\n",
        )
        .unwrap();

        let source = SnapshotDir::new(dir.path());
        let incidents = source.fetch(Collection::Incidents);
        assert_eq!(incidents.len(), 2);
        assert!(incidents[1].present("severity").is_none());

        let review = source.fetch(Collection::ReviewQueue);
        assert_eq!(review.len(), 2);
        assert_eq!(review[0].id().as_deref(), Some("1"));
        assert_eq!(review[0].text("priority").as_deref(), Some("high"));
        assert_eq!(review[1].text("score").as_deref(), Some("1.25"));
        assert!(review[1].present("priority").is_none());

        assert!(source.fetch(Collection::Findings).is_empty());
    }

    #[test]
    fn broken_snapshot_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("insights.json"), "{ nope").unwrap();
        assert!(SnapshotDir::new(dir.path()).fetch(Collection::Insights).is_empty());
    }

    #[test]
    fn file_types_by_extension() {
        assert!(matches!(detect_file_type(Path::new("a.CSV")), Ok(FileType::CSV)));
        assert!(matches!(detect_file_type(Path::new("a.pq")), Ok(FileType::PARQUET)));
        assert!(matches!(detect_file_type(Path::new("a.feather")), Ok(FileType::ARROW)));
        assert!(matches!(detect_file_type(Path::new("a.xlsx")), Err(PanicError::UnknownFileType)));
    }

    struct Fixed;

    impl RecordSource for Fixed {
        fn fetch(&self, collection: Collection) -> Vec<Record> {
            let n: i64 = match collection {
                Collection::Incidents => 3,
                Collection::Findings => 2,
                Collection::Insights => 1,
                Collection::ReviewQueue => 0,
            };
            (0..n).map(|i| Record::from_pairs([("id", i)])).collect()
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    #[test]
    fn load_all_collects_every_collection() {
        let collections = load_all(&Fixed);
        assert_eq!(collections.count(Collection::Incidents), 3);
        assert_eq!(collections.count(Collection::Findings), 2);
        assert_eq!(collections.count(Collection::Insights), 1);
        assert_eq!(collections.count(Collection::ReviewQueue), 0);
    }
}
