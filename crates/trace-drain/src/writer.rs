//! Framed event-file writer: `events.atf`, `window_metadata.jsonl`, and an
//! optional `manifest.json`.
//!
//! Grounded on `exporter.rs`'s fallible-sink-with-typed-error shape
//! (`SpanExporter`/`JsonFileExporter`), translated from async `tokio::fs` to
//! blocking `std::fs::File` + `BufWriter` since the Writer is the
//! DrainWorker's sole synchronous I/O sink (`spec.md` §5). Record framing
//! and manifest fields per `spec.md` §4.8/§6 and `SPEC_FULL.md`'s
//! supplemented manifest.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use trace_ring::{EventKind, IndexEvent};

use crate::persistence_window::SelectivePersistenceWindow;

/// Errors surfaced by [`Writer`] operations. The Writer is a control-plane
/// component: unlike the capture path, its failures are real `Result`s, not
/// counters.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stack snapshot of {size} bytes exceeds the {max}-byte policy limit")]
    Oversized { size: usize, max: usize },
    #[error("writer has already been finalized")]
    AlreadyFinalized,
}

/// Configuration for [`Writer::init`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub output_root: PathBuf,
    pub pid: u32,
    pub session_id: u64,
    pub enable_manifest: bool,
    pub max_stack_snapshot: usize,
}

impl WriterConfig {
    pub fn new(output_root: impl Into<PathBuf>, pid: u32, session_id: u64) -> Self {
        Self {
            output_root: output_root.into(),
            pid,
            session_id,
            enable_manifest: true,
            max_stack_snapshot: trace_ring::MAX_STACK_SNAPSHOT,
        }
    }
}

#[derive(Debug, Serialize)]
struct Manifest {
    pid: u32,
    session_id: u64,
    started_at_ns: u64,
    finalized_at_ns: u64,
    event_count: u64,
    bytes_written: u64,
    write_errors: u64,
}

/// Appends framed event records and window metadata for one capture
/// session. Owns the only file handles writing to the output directory;
/// `deinit`/`Drop` are both idempotent.
pub struct Writer {
    events_file: BufWriter<File>,
    window_file: BufWriter<File>,
    manifest_path: Option<PathBuf>,
    config: WriterConfig,
    started_at_ns: u64,
    event_count: u64,
    bytes_written: u64,
    write_errors: u64,
    finalized: bool,
}

impl Writer {
    /// Creates `events.atf` and `window_metadata.jsonl` under
    /// `config.output_root`, writing the `events.atf` magic/version header.
    pub fn init(config: WriterConfig, started_at_ns: u64) -> Result<Self, WriterError> {
        std::fs::create_dir_all(&config.output_root)?;

        let events_path = config.output_root.join("events.atf");
        let mut events_file = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&events_path)?,
        );
        events_file.write_all(b"ATF1")?; // magic
        events_file.write_all(&1u32.to_le_bytes())?; // version

        let window_path = config.output_root.join("window_metadata.jsonl");
        let window_file = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&window_path)?,
        );

        let manifest_path = config
            .enable_manifest
            .then(|| config.output_root.join("manifest.json"));

        Ok(Self {
            events_file,
            window_file,
            manifest_path,
            config,
            started_at_ns,
            event_count: 0,
            bytes_written: 0,
            write_errors: 0,
            finalized: false,
        })
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Appends one framed event record:
    /// `u32 length | u8 kind | u64 timestamp_ns | u64 thread_id |
    /// u64 function_id | u8 call_depth | bytes[...]`. `payload` whose
    /// length exceeds the configured policy max is rejected with an
    /// `Oversized` error and counted in `write_errors`, never truncated.
    pub fn write_event(
        &mut self,
        kind: EventKind,
        header: IndexEvent,
        payload: &[u8],
    ) -> Result<(), WriterError> {
        if self.finalized {
            return Err(WriterError::AlreadyFinalized);
        }
        if payload.len() > self.config.max_stack_snapshot {
            self.write_errors += 1;
            return Err(WriterError::Oversized {
                size: payload.len(),
                max: self.config.max_stack_snapshot,
            });
        }

        let body_len = 1 + 8 + 8 + 8 + 1 + payload.len();
        let result = (|| -> std::io::Result<()> {
            self.events_file.write_all(&(body_len as u32).to_le_bytes())?;
            self.events_file.write_all(&[kind as u8])?;
            self.events_file.write_all(&header.timestamp.to_le_bytes())?;
            self.events_file
                .write_all(&(header.thread_id as u64).to_le_bytes())?;
            self.events_file
                .write_all(&header.function_id.to_le_bytes())?;
            self.events_file
                .write_all(&[header.call_depth as u8])?;
            self.events_file.write_all(payload)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.event_count += 1;
                self.bytes_written += 4 + body_len as u64;
                Ok(())
            }
            Err(err) => {
                self.write_errors += 1;
                Err(WriterError::Io(err))
            }
        }
    }

    /// Appends one JSON line to `window_metadata.jsonl`.
    pub fn write_window_metadata(
        &mut self,
        window: &SelectivePersistenceWindow,
    ) -> Result<(), WriterError> {
        let mut line = serde_json::to_vec(window).map_err(std::io::Error::other)?;
        line.push(b'\n');
        self.window_file.write_all(&line)?;
        Ok(())
    }

    /// Flushes buffered writes to the OS without fsyncing.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        self.events_file.flush()?;
        self.window_file.flush()?;
        Ok(())
    }

    /// Fsyncs the events file, flushes and fsyncs the manifest (if
    /// enabled), and marks this writer finalized. Idempotent: calling
    /// `finalize` again after success is a no-op.
    pub fn finalize(&mut self, now_ns: u64) -> Result<(), WriterError> {
        if self.finalized {
            return Ok(());
        }
        self.flush()?;
        self.events_file.get_ref().sync_all()?;
        self.window_file.get_ref().sync_all()?;

        if let Some(path) = &self.manifest_path {
            write_manifest(
                path,
                &Manifest {
                    pid: self.config.pid,
                    session_id: self.config.session_id,
                    started_at_ns: self.started_at_ns,
                    finalized_at_ns: now_ns,
                    event_count: self.event_count,
                    bytes_written: self.bytes_written,
                    write_errors: self.write_errors,
                },
            )?;
        }

        self.finalized = true;
        Ok(())
    }

    /// Idempotent teardown: finalizes if not already finalized, otherwise a
    /// no-op.
    pub fn deinit(&mut self, now_ns: u64) -> Result<(), WriterError> {
        self.finalize(now_ns)
    }
}

fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), WriterError> {
    let json = serde_json::to_vec_pretty(manifest).map_err(std::io::Error::other)?;
    let mut file = File::create(path)?;
    file.write_all(&json)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> IndexEvent {
        IndexEvent::new(1, 2, 3, EventKind::Call, 0)
    }

    #[test]
    fn write_event_counts_bytes_and_rejects_oversized_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WriterConfig::new(dir.path(), 100, 1);
        config.max_stack_snapshot = 4;
        let mut writer = Writer::init(config, 0).unwrap();

        writer.write_event(EventKind::Call, header(), &[1, 2, 3]).unwrap();
        assert_eq!(writer.event_count(), 1);

        let err = writer
            .write_event(EventKind::Call, header(), &[0; 8])
            .unwrap_err();
        assert!(matches!(err, WriterError::Oversized { size: 8, max: 4 }));
        assert_eq!(writer.write_errors(), 1);
    }

    #[test]
    fn finalize_is_idempotent_and_writes_a_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = WriterConfig::new(dir.path(), 100, 1);
        let mut writer = Writer::init(config, 0).unwrap();
        writer.write_event(EventKind::Call, header(), &[]).unwrap();

        writer.finalize(1_000).unwrap();
        writer.finalize(2_000).unwrap();

        let manifest_path = dir.path().join("manifest.json");
        assert!(manifest_path.exists());
        let contents = std::fs::read_to_string(manifest_path).unwrap();
        assert!(contents.contains("\"event_count\": 1"));
    }

    #[test]
    fn write_window_metadata_appends_one_json_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = WriterConfig::new(dir.path(), 100, 1);
        let mut writer = Writer::init(config, 0).unwrap();

        let mut window = SelectivePersistenceWindow::default();
        window.reset(1, 0);
        writer.write_window_metadata(&window).unwrap();
        writer.flush().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("window_metadata.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"window_id\":1"));
    }
}
