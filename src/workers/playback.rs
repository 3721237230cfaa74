use std::{sync::Arc, thread};

use super::{status::StatusIndicators, RecordReceiver};
use crate::{
    config::{PipelineConfig, RetryPolicy},
    display::{SharedSink, SinkError},
    storage::{LineRecord, PersistentStore, StoreError, StoreReader},
    utils::auxiliary::SharableRefExt,
};

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("reading line {record} failed after {attempts} attempts: {source}")]
    StoreRead {
        record: LineRecord,
        attempts: u32,
        source: StoreError,
    },
    #[error("line {record} does not end with the store marker")]
    MissingMarker { record: LineRecord },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Reads back each published line and renders it on the output sink.
pub struct PlaybackWorker<S> {
    records: RecordReceiver,
    store: StoreReader<S>,
    sink: SharedSink,
    status: Arc<StatusIndicators>,
    label: String,
    store_marker: u8,
    read_retry: RetryPolicy,
}

impl<S: PersistentStore> PlaybackWorker<S> {
    pub(crate) fn new(
        records: RecordReceiver,
        store: StoreReader<S>,
        sink: SharedSink,
        status: Arc<StatusIndicators>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            records,
            store,
            sink,
            status,
            label: config.display_label.clone(),
            store_marker: config.store_marker,
            read_retry: config.read_retry,
        }
    }

    /// Worker loop. Plays records as they arrive and returns once the capture worker is gone and
    /// every record it published was played.
    pub fn run(mut self) {
        log::info!("playback worker started");
        while let Ok(record) = self.records.recv() {
            self.handle(record);
        }
        log::info!("playback worker stopped");
    }

    /// Takes the next published record, if any, without blocking.
    pub fn next_record(&self) -> Option<LineRecord> {
        self.records.try_recv().ok()
    }

    /// Plays every record published so far without blocking. Returns how many were shown.
    pub fn play_pending(&mut self) -> usize {
        let mut played = 0;
        while let Some(record) = self.next_record() {
            if self.handle(record) {
                played += 1;
            }
        }
        played
    }

    fn handle(&mut self, record: LineRecord) -> bool {
        self.status.set_playback_busy(true);
        let result = self.play(record);
        self.status.set_playback_busy(false);
        match result {
            Ok(()) => true,
            Err(error) => {
                log::warn!("playback of {record} failed: {error}");
                self.status.playback_failed();
                if let Err(sink_error) = self.sink.lock_sharable().report(&error) {
                    log::error!("could not report playback error: {sink_error}");
                }
                false
            }
        }
    }

    /// Reads `record` from the store and shows it, marker stripped.
    pub fn play(&mut self, record: LineRecord) -> Result<(), PlaybackError> {
        let bytes = self.read_with_retry(record)?;
        let line = bytes
            .strip_suffix(&[self.store_marker])
            .ok_or(PlaybackError::MissingMarker { record })?;
        self.sink.lock_sharable().show_line(&self.label, line)?;
        self.status.line_played();
        log::debug!("played {record}");
        Ok(())
    }

    fn read_with_retry(&self, record: LineRecord) -> Result<Vec<u8>, PlaybackError> {
        let attempts = self.read_retry.attempts;
        let mut attempt = 0;
        loop {
            match self.store.read(record.start, record.length) {
                Ok(bytes) => return Ok(bytes),
                Err(error) if attempt + 1 < attempts => {
                    log::warn!("read of {record} failed ({error}), retrying");
                    thread::sleep(self.read_retry.backoff(attempt));
                    attempt += 1;
                }
                Err(error) => {
                    return Err(PlaybackError::StoreRead {
                        record,
                        attempts,
                        source: error,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::EepromConfig,
        display::{shared_sink, MemorySink},
        pipeline::{Pipeline, PipelineParts},
        storage::MemoryStore,
    };

    fn parts() -> (PipelineParts<MemoryStore>, MemorySink) {
        let config = PipelineConfig::new().read_retry(RetryPolicy::new(
            3,
            Duration::ZERO,
            Duration::ZERO,
        ));
        let store = MemoryStore::new(EepromConfig::new()).unwrap();
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(config, store, shared_sink(sink.clone())).unwrap();
        (pipeline.into_parts(), sink)
    }

    #[test]
    fn test0_stored_line_is_shown_with_its_label() {
        let (mut parts, sink) = parts();
        parts.intake.on_bytes(b"hi\r");
        parts.capture.process_pending().unwrap();
        assert_eq!(parts.playback.play_pending(), 1);
        assert_eq!(sink.lines(), vec!["EEPROM: hi".to_string()]);
        assert_eq!(parts.status.snapshot().lines_played, 1);
    }

    #[test]
    fn test1_records_play_in_publish_order() {
        let (mut parts, sink) = parts();
        parts.intake.on_bytes(b"ab\rcd\r");
        parts.capture.process_pending().unwrap();
        parts.playback.play_pending();
        assert_eq!(sink.lines(), vec!["EEPROM: ab".to_string(), "EEPROM: cd".to_string()]);
    }

    #[test]
    fn test2_transient_read_failures_are_retried() {
        let (mut parts, sink) = parts();
        parts.intake.on_bytes(b"retry\r");
        parts.capture.process_pending().unwrap();
        parts.store.lock().fail_next_reads(2);
        assert_eq!(parts.playback.play_pending(), 1);
        assert_eq!(sink.lines(), vec!["EEPROM: retry".to_string()]);
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test3_unreadable_record_is_reported_and_discarded() {
        let (mut parts, sink) = parts();
        parts.intake.on_bytes(b"lost\rkept\r");
        parts.capture.process_pending().unwrap();
        parts.store.lock().fail_next_reads(3);
        assert_eq!(parts.playback.play_pending(), 1);
        assert_eq!(sink.lines(), vec!["EEPROM: kept".to_string()]);
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("reading line [0, 5) failed after 3 attempts"));
        assert_eq!(parts.status.snapshot().playback_errors, 1);
    }

    #[test]
    fn test4_record_without_marker_is_rejected() {
        let (mut parts, _sink) = parts();
        parts.store.lock().write(0, b"abc").unwrap();
        let record = LineRecord { start: 0, length: 3 };
        assert!(matches!(
            parts.playback.play(record),
            Err(PlaybackError::MissingMarker { .. })
        ));
    }
}
