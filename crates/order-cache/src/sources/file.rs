//! File and stdin collaborators
//!
//! Snapshots are a JSON array of orders. Live events are newline-delimited
//! JSON, one [`RawEvent`] per line.

use super::{EventStream, LiveEventSource, SnapshotSource};
use crate::error::{CacheError, CacheResult};
use crate::types::{Order, RawEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Snapshot read from a JSON file on disk
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch_all_open_orders(&self) -> CacheResult<Vec<Order>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let orders: Vec<Order> = serde_json::from_slice(&bytes)?;
        debug!(rows = orders.len(), "Snapshot file loaded");
        Ok(orders)
    }
}

enum LineInput {
    Stdin,
    File(PathBuf),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

/// Live events read line by line from stdin, a file or any async reader
///
/// Lines that do not parse are logged and skipped. The stream closes at EOF.
pub struct JsonLinesEventSource {
    input: Mutex<Option<LineInput>>,
}

impl JsonLinesEventSource {
    pub fn stdin() -> Self {
        Self::with_input(LineInput::Stdin)
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::with_input(LineInput::File(path.as_ref().to_path_buf()))
    }

    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_input(LineInput::Reader(Box::new(reader)))
    }

    fn with_input(input: LineInput) -> Self {
        Self {
            input: Mutex::new(Some(input)),
        }
    }
}

#[async_trait]
impl LiveEventSource for JsonLinesEventSource {
    async fn subscribe(&self) -> CacheResult<EventStream> {
        let input = self
            .input
            .lock()
            .take()
            .ok_or_else(|| CacheError::Subscription("line source already subscribed".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        match input {
            // A blocking read on tokio's stdin would hold up runtime shutdown
            LineInput::Stdin => {
                std::thread::Builder::new()
                    .name("stdin-events".to_string())
                    .spawn(move || pump_stdin(tx))
                    .map_err(|e| CacheError::Subscription(format!("stdin reader: {}", e)))?;
            }
            LineInput::File(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| CacheError::Subscription(format!("{}: {}", path.display(), e)))?;
                tokio::spawn(pump_lines(Box::new(file), tx));
            }
            LineInput::Reader(reader) => {
                tokio::spawn(pump_lines(reader, tx));
            }
        }
        Ok(rx)
    }
}

/// Turns raw lines into events, counting what it had to skip
struct LineDecoder {
    tx: mpsc::UnboundedSender<RawEvent>,
    line_no: u64,
    skipped: u64,
}

impl LineDecoder {
    fn new(tx: mpsc::UnboundedSender<RawEvent>) -> Self {
        Self { tx, line_no: 0, skipped: 0 }
    }

    /// Returns false once the receiving side is gone
    fn feed(&mut self, line: &[u8]) -> bool {
        self.line_no += 1;

        let Some(start) = line.iter().position(|b| !b.is_ascii_whitespace()) else {
            return true;
        };
        let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(line.len(), |i| i + 1);
        let trimmed = &line[start..end];

        match serde_json::from_slice::<RawEvent>(trimmed) {
            Ok(event) => self.tx.send(event).is_ok(),
            Err(e) => {
                self.skipped += 1;
                warn!(line = self.line_no, error = %e, "Skipping undecodable event line");
                true
            }
        }
    }

    fn finish(self) {
        info!(lines = self.line_no, skipped = self.skipped, "Live event input closed");
    }
}

async fn pump_lines(reader: Box<dyn AsyncRead + Send + Unpin>, tx: mpsc::UnboundedSender<RawEvent>) {
    let mut reader = BufReader::new(reader);
    let mut decoder = LineDecoder::new(tx);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if !decoder.feed(&buf) {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Live event input failed");
                break;
            }
        }
    }

    decoder.finish();
}

fn pump_stdin(tx: mpsc::UnboundedSender<RawEvent>) {
    let mut stdin = std::io::stdin().lock();
    let mut decoder = LineDecoder::new(tx);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match std::io::BufRead::read_until(&mut stdin, b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if !decoder.feed(&buf) {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Stdin event input failed");
                break;
            }
        }
    }

    decoder.finish();
}
