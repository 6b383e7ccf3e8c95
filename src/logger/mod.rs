//! # Data Logger
//!
//! Durable local record of sensor snapshots.
//!
//! This module handles:
//! - Periodic and button-triggered snapshot logging
//! - CSV (default) and JSON Lines record formats
//! - Segment rotation by record count and retention of the newest segments
//!
//! A record is one line appended to the current segment. Writes go through
//! one `write_all` per line, so a record is either fully present or absent;
//! a partial line on power loss is an accepted risk of the storage medium.
//! Storage failures drop the record, bump a counter and leave every other
//! task untouched.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::stats::PipelineStats;
use crate::store::{SensorSnapshot, SensorStore, SensorChannel};

/// Button-press request for one extra log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTrigger;

/// On-storage record format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Jsonl,
}

impl RecordFormat {
    /// Parse the config `format` string, already validated at load time
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "csv" => Some(RecordFormat::Csv),
            "jsonl" => Some(RecordFormat::Jsonl),
            _ => None,
        }
    }

    /// File extension of segments in this format
    pub fn extension(self) -> &'static str {
        match self {
            RecordFormat::Csv => "csv",
            RecordFormat::Jsonl => "jsonl",
        }
    }
}

/// CSV header line naming every record column
pub fn csv_header() -> String {
    let mut header = String::from("time,uptime_ms");
    for channel in SensorChannel::ALL {
        header.push(',');
        header.push_str(channel.name());
    }
    header
}

/// Format one snapshot as a record line (without the trailing newline)
///
/// Channels that were never written render as empty CSV fields or JSON
/// nulls, so "no data yet" stays distinguishable from a measured zero.
pub fn format_record(format: RecordFormat, snapshot: &SensorSnapshot) -> String {
    let time = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    match format {
        RecordFormat::Csv => {
            let mut line = format!("{},{}", time, snapshot.taken_at_ms());
            for (_, sample) in snapshot.iter() {
                line.push(',');
                if let Some(sample) = sample {
                    line.push_str(&sample.value.to_string());
                }
            }
            line
        }
        RecordFormat::Jsonl => {
            let channels: serde_json::Map<String, serde_json::Value> = snapshot
                .iter()
                .map(|(channel, sample)| {
                    let value = match sample {
                        Some(sample) => serde_json::json!(sample.value),
                        None => serde_json::Value::Null,
                    };
                    (channel.name().to_string(), value)
                })
                .collect();

            serde_json::json!({
                "time": time,
                "uptime_ms": snapshot.taken_at_ms(),
                "channels": channels,
            })
            .to_string()
        }
    }
}

/// Append-only record storage collaborator
#[async_trait]
pub trait RecordStorage: Send {
    /// Append one record line to the current segment
    async fn append(&mut self, record: &str) -> io::Result<()>;

    /// Close the current segment and start a new one
    async fn rotate(&mut self) -> io::Result<()>;
}

/// File-backed record storage with segment retention
pub struct FileStorage {
    dir: PathBuf,
    extension: &'static str,
    max_files_to_keep: usize,
    file: Option<File>,
    segments: Vec<PathBuf>,
    segment_index: u32,
}

impl FileStorage {
    /// Create the storage root directory if needed
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: &'static str,
        max_files_to_keep: usize,
    ) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            extension,
            max_files_to_keep,
            file: None,
            segments: Vec::new(),
            segment_index: 0,
        })
    }

    fn next_segment_path(&mut self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let name = format!("telemetry-{}-{:03}.{}", stamp, self.segment_index, self.extension);
        self.segment_index = self.segment_index.wrapping_add(1);
        self.dir.join(name)
    }

    async fn prune_old_segments(&mut self) {
        while self.segments.len() > self.max_files_to_keep {
            let oldest = self.segments.remove(0);
            match fs::remove_file(&oldest).await {
                Ok(()) => debug!(segment = %oldest.display(), "removed old log segment"),
                Err(error) => warn!(segment = %oldest.display(), %error, "failed to remove old log segment"),
            }
        }
    }
}

#[async_trait]
impl RecordStorage for FileStorage {
    async fn append(&mut self, record: &str) -> io::Result<()> {
        if self.file.is_none() {
            self.rotate().await?;
        }

        // One write per line; flushed so the record survives a crash of the
        // process, if not of the medium
        if let Some(file) = self.file.as_mut() {
            let mut line = record.to_string();
            line.push('\n');
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        Ok(())
    }

    async fn rotate(&mut self) -> io::Result<()> {
        let path = self.next_segment_path();
        let file = File::create(&path).await?;

        info!(segment = %path.display(), "opened log segment");

        self.file = Some(file);
        self.segments.push(path);
        self.prune_old_segments().await;

        Ok(())
    }
}

/// The task appending snapshot records to local storage
pub struct DataLogger {
    store: Arc<SensorStore>,
    storage: Box<dyn RecordStorage>,
    format: RecordFormat,
    max_records_per_file: usize,
    triggers: mpsc::Receiver<LogTrigger>,
    triggers_open: bool,
    stats: Arc<PipelineStats>,
    records_in_segment: usize,
    segment_started: bool,
}

impl DataLogger {
    pub fn new(
        store: Arc<SensorStore>,
        storage: Box<dyn RecordStorage>,
        format: RecordFormat,
        max_records_per_file: usize,
        triggers: mpsc::Receiver<LogTrigger>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            storage,
            format,
            max_records_per_file,
            triggers,
            triggers_open: true,
            stats,
            records_in_segment: 0,
            segment_started: false,
        }
    }

    /// Log on every tick and on every button trigger
    pub async fn run(mut self, period: Duration) {
        info!(period_ms = period.as_millis() as u64, "data logger started");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.log_snapshot().await;
                }
                trigger = self.triggers.recv(), if self.triggers_open => match trigger {
                    Some(LogTrigger) => {
                        debug!("button trigger");
                        self.log_snapshot().await;
                    }
                    None => self.triggers_open = false,
                },
            }
        }
    }

    /// Append one snapshot record, rotating the segment when it is full
    pub async fn log_snapshot(&mut self) {
        if !self.segment_started || self.records_in_segment >= self.max_records_per_file {
            if !self.start_segment().await {
                return;
            }
        }

        let snapshot = self.store.snapshot();
        let record = format_record(self.format, &snapshot);

        match self.storage.append(&record).await {
            Ok(()) => {
                self.records_in_segment += 1;
                self.stats.record_record_written();
            }
            Err(error) => {
                self.stats.record_record_dropped();
                warn!(%error, "record dropped, storage write failed");
            }
        }
    }

    /// Open a fresh segment; on failure the pending record is dropped and
    /// the next trigger tries again
    async fn start_segment(&mut self) -> bool {
        if let Err(error) = self.storage.rotate().await {
            self.stats.record_record_dropped();
            warn!(%error, "record dropped, segment rotation failed");
            return false;
        }

        self.records_in_segment = 0;
        self.segment_started = true;

        if self.format == RecordFormat::Csv {
            if let Err(error) = self.storage.append(&csv_header()).await {
                warn!(%error, "failed to write segment header");
            }
        }

        true
    }
}
