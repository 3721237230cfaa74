use std::{
    sync::{mpsc::TrySendError, Arc},
    thread,
};

use super::{status::StatusIndicators, RecordSender};
use crate::{
    config::{PipelineConfig, RetryPolicy},
    display::SharedSink,
    pipeline::Shutdown,
    serial::{LineBoundary, LineSource, LineStatus},
    storage::{CursorError, LineRecord, PersistentStore, StoreCursor, StoreError},
    utils::auxiliary::SharableRefExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    WaitingForLine,
    Draining,
    Publishing,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("byte channel full, {len} byte partial line dropped")]
    ChannelFull { len: usize },
    #[error("line longer than {max_line_len} bytes dropped")]
    MalformedLine { max_line_len: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("store full: {length} byte line does not fit at {position} (capacity {capacity})")]
    StoreFull { position: u32, length: u32, capacity: u32 },
    #[error("record channel full, record {record} dropped after {attempts} attempts")]
    RecordChannelFull { record: LineRecord, attempts: u32 },
    #[error("record channel closed, record {record} dropped")]
    RecordChannelClosed { record: LineRecord },
    #[error("store cursor corrupted: at {expected}, line reserved at {found}")]
    CursorCorrupted { expected: u32, found: u32 },
    #[error("byte channel desynchronized: line of {expected} bytes, {found} queued")]
    Desynchronized { expected: usize, found: usize },
}

impl CaptureError {
    /// Fatal errors stop the capture worker; any other one only costs the current line.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::CursorCorrupted { .. })
    }
}

impl From<CursorError> for CaptureError {
    fn from(error: CursorError) -> Self {
        match error {
            CursorError::Full {
                position,
                length,
                capacity,
            } => CaptureError::StoreFull {
                position,
                length,
                capacity,
            },
            CursorError::Corrupted { expected, found } => {
                CaptureError::CursorCorrupted { expected, found }
            }
        }
    }
}

/// Takes complete lines out of the byte channel, stores them with a trailing marker at the
/// store cursor and publishes a [LineRecord] for each.
pub struct CaptureWorker<S> {
    source: LineSource,
    store: S,
    cursor: StoreCursor,
    records: RecordSender,
    sink: SharedSink,
    status: Arc<StatusIndicators>,
    shutdown: Shutdown,
    store_marker: u8,
    max_line_len: usize,
    publish_retry: RetryPolicy,
    state: CaptureState,
    line: Vec<u8>,
}

impl<S: PersistentStore> CaptureWorker<S> {
    pub(crate) fn new(
        source: LineSource,
        store: S,
        records: RecordSender,
        sink: SharedSink,
        status: Arc<StatusIndicators>,
        shutdown: Shutdown,
        config: &PipelineConfig,
    ) -> Self {
        let cursor = StoreCursor::new(store.capacity());
        Self {
            source,
            store,
            cursor,
            records,
            sink,
            status,
            shutdown,
            store_marker: config.store_marker,
            max_line_len: config.max_line_len,
            publish_retry: config.publish_retry,
            state: CaptureState::WaitingForLine,
            line: Vec::with_capacity(config.max_stored_line_len()),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn cursor(&self) -> &StoreCursor {
        &self.cursor
    }

    /// Restarts storing at address 0, e.g. after the store was erased.
    pub fn reset_epoch(&mut self) {
        self.cursor.reset_epoch();
        log::info!("store cursor reset, epoch {}", self.cursor.epoch());
    }

    /// Worker loop. Sleeps until lines are signalled and handles them. Returns once shutdown was
    /// requested and every line signalled before it is handled, or on a fatal error. The record
    /// sender is dropped on return, which ends the playback worker.
    pub fn run(mut self) -> Result<(), CaptureError> {
        log::info!("capture worker started");
        loop {
            self.state = CaptureState::WaitingForLine;
            self.status.set_capture_busy(false);
            self.source.wait_for_line();
            self.status.set_capture_busy(true);

            self.process_pending()?;
            if self.shutdown.is_requested() {
                // Lines may have been signalled between the drain above and the request.
                self.process_pending()?;
                break;
            }
        }
        self.state = CaptureState::WaitingForLine;
        self.status.set_capture_busy(false);
        log::info!("capture worker stopped at address {}", self.cursor.position());
        Ok(())
    }

    /// Handles every line boundary queued so far without blocking. Returns how many lines were
    /// stored and published.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned; the capture status is then marked halted. Any other error
    /// is reported on the sink and the line dropped.
    pub fn process_pending(&mut self) -> Result<usize, CaptureError> {
        let mut captured = 0;
        while let Some(boundary) = self.source.next_boundary() {
            match self.capture_line(boundary) {
                Ok(record) => {
                    log::debug!("line stored at {record}");
                    captured += 1;
                }
                Err(error) if error.is_fatal() => {
                    log::error!("capture halted: {error}");
                    self.status.halt_capture();
                    self.report(&error);
                    return Err(error);
                }
                Err(error) => {
                    log::warn!("line dropped: {error}");
                    self.report(&error);
                }
            }
            self.state = CaptureState::WaitingForLine;
        }
        Ok(captured)
    }

    fn capture_line(&mut self, boundary: LineBoundary) -> Result<LineRecord, CaptureError> {
        self.state = CaptureState::Draining;
        self.line.clear();
        for _ in 0..boundary.len {
            match self.source.pop_byte() {
                Some(byte) => self.line.push(byte),
                None => {
                    return Err(CaptureError::Desynchronized {
                        expected: boundary.len,
                        found: self.line.len(),
                    })
                }
            }
        }
        match boundary.status {
            LineStatus::Complete => {}
            LineStatus::ChannelFull => return Err(CaptureError::ChannelFull { len: boundary.len }),
            LineStatus::TooLong => {
                return Err(CaptureError::MalformedLine {
                    max_line_len: self.max_line_len,
                })
            }
        }
        self.line.push(self.store_marker);

        // The reservation is only committed after the write went through, a failed write leaves
        // the cursor where the line started.
        let reservation = self.cursor.reserve(self.line.len() as u32)?;
        self.store.write(reservation.start(), &self.line)?;
        let record = self.cursor.commit(reservation)?;
        self.status.line_stored();

        self.state = CaptureState::Publishing;
        self.publish(record)?;
        Ok(record)
    }

    fn publish(&mut self, record: LineRecord) -> Result<(), CaptureError> {
        let attempts = self.publish_retry.attempts;
        let mut attempt = 0;
        loop {
            match self.records.try_send(record) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => {
                    return Err(CaptureError::RecordChannelClosed { record })
                }
                Err(TrySendError::Full(_)) if attempt + 1 < attempts => {
                    log::trace!("record channel full, retrying {record}");
                    thread::sleep(self.publish_retry.backoff(attempt));
                    attempt += 1;
                }
                Err(TrySendError::Full(_)) => {
                    return Err(CaptureError::RecordChannelFull { record, attempts })
                }
            }
        }
    }

    fn report(&self, error: &CaptureError) {
        self.status.capture_failed();
        if let Err(sink_error) = self.sink.lock_sharable().report(error) {
            log::error!("could not report capture error: {sink_error}");
        }
    }
}
