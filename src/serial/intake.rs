use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::{
    config::PipelineConfig,
    utils::{
        isr_queues::ISRQueue,
        notification::{Notification, Notifier},
    },
};

/// How a line handed to the capture worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// The terminator arrived.
    Complete,
    /// The byte channel overflowed; the line is partial.
    ChannelFull,
    /// The line grew past the maximum line length.
    TooLong,
}

/// End of a line in the byte channel, queued after the `len` bytes it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBoundary {
    pub len: usize,
    pub status: LineStatus,
}

/// Counters updated from interrupt context.
#[derive(Debug, Default)]
pub struct IntakeStats {
    received: AtomicU32,
    dropped: AtomicU32,
    completed_lines: AtomicU32,
    malformed_lines: AtomicU32,
    overflowed_lines: AtomicU32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeCounters {
    pub received: u32,
    pub dropped: u32,
    pub completed_lines: u32,
    pub malformed_lines: u32,
    pub overflowed_lines: u32,
}

impl IntakeStats {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IntakeCounters {
        IntakeCounters {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed_lines: self.completed_lines.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            overflowed_lines: self.overflowed_lines.load(Ordering::Relaxed),
        }
    }
}

type EchoHook = Box<dyn FnMut(u8) + Send>;

/// Producer end of the byte channel, driven one byte at a time from the serial receive
/// interrupt. It never blocks and never logs.
pub struct ByteIntake {
    bytes: ISRQueue<u8>,
    boundaries: ISRQueue<LineBoundary>,
    notifier: Notifier,
    terminator: u8,
    max_line_len: usize,
    line_len: usize,
    discarding: bool,
    echo: Option<EchoHook>,
    stats: Arc<IntakeStats>,
}

/// Consumer end of the byte channel, owned by the capture worker.
pub struct LineSource {
    bytes: ISRQueue<u8>,
    boundaries: ISRQueue<LineBoundary>,
    line_ready: Notification,
}

/// Creates the byte channel between the receive interrupt and the capture worker.
pub fn line_channel(config: &PipelineConfig) -> (ByteIntake, LineSource) {
    let bytes = ISRQueue::new(config.byte_channel_capacity);
    // Every queued boundary covers at least one queued byte, so this queue never fills up first.
    let boundaries = ISRQueue::new(config.byte_channel_capacity);
    let line_ready = Notification::new();

    let intake = ByteIntake {
        bytes: bytes.clone(),
        boundaries: boundaries.clone(),
        notifier: line_ready.notifier(),
        terminator: config.terminator,
        max_line_len: config.max_line_len,
        line_len: 0,
        discarding: false,
        echo: None,
        stats: Arc::new(IntakeStats::default()),
    };
    let source = LineSource {
        bytes,
        boundaries,
        line_ready,
    };
    (intake, source)
}

impl ByteIntake {
    /// Hook called with every received byte, e.g. to echo it back on the serial line.
    pub fn set_echo<F: FnMut(u8) + Send + 'static>(&mut self, echo: F) {
        self.echo = Some(Box::new(echo));
    }

    pub fn stats(&self) -> Arc<IntakeStats> {
        self.stats.clone()
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.on_byte(*byte);
        }
    }

    pub fn on_byte(&mut self, byte: u8) {
        IntakeStats::bump(&self.stats.received);
        if let Some(echo) = self.echo.as_mut() {
            echo(byte);
        }

        if byte == self.terminator {
            if self.discarding {
                self.discarding = false;
                self.line_len = 0;
            } else if self.line_len > 0 {
                IntakeStats::bump(&self.stats.completed_lines);
                self.end_line(LineStatus::Complete);
            }
            return;
        }

        if self.discarding {
            IntakeStats::bump(&self.stats.dropped);
            return;
        }

        if self.line_len >= self.max_line_len {
            IntakeStats::bump(&self.stats.dropped);
            IntakeStats::bump(&self.stats.malformed_lines);
            self.end_line(LineStatus::TooLong);
            self.discarding = true;
            return;
        }

        match self.bytes.try_send(byte) {
            Ok(()) => self.line_len += 1,
            Err(_) => {
                IntakeStats::bump(&self.stats.dropped);
                IntakeStats::bump(&self.stats.overflowed_lines);
                if self.line_len > 0 {
                    self.end_line(LineStatus::ChannelFull);
                }
                self.discarding = true;
            }
        }
    }

    /// Queues the boundary of the current line, then wakes the capture worker.
    fn end_line(&mut self, status: LineStatus) {
        let boundary = LineBoundary {
            len: self.line_len,
            status,
        };
        if self.boundaries.try_send(boundary).is_err() {
            IntakeStats::bump(&self.stats.overflowed_lines);
        }
        self.line_len = 0;
        self.notifier.notify();
    }
}

impl LineSource {
    pub fn next_boundary(&self) -> Option<LineBoundary> {
        self.boundaries.try_recv().ok()
    }

    pub fn pop_byte(&self) -> Option<u8> {
        self.bytes.try_recv().ok()
    }

    /// Blocks until the intake signals a line boundary (or someone else wakes the worker).
    pub fn wait_for_line(&self) {
        self.line_ready.blocking_wait();
    }

    /// Wakes [LineSource::wait_for_line] without a line, e.g. for shutdown.
    pub fn notifier(&self) -> Notifier {
        self.line_ready.notifier()
    }

    pub fn pending_bytes(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;

    fn channel(max_line_len: usize, capacity: usize) -> (ByteIntake, LineSource) {
        let config = PipelineConfig::new()
            .max_line_len(max_line_len)
            .byte_channel_capacity(capacity);
        line_channel(&config)
    }

    fn drain_line(source: &LineSource) -> Option<(LineBoundary, Vec<u8>)> {
        let boundary = source.next_boundary()?;
        let bytes = (0..boundary.len).filter_map(|_| source.pop_byte()).collect();
        Some((boundary, bytes))
    }

    #[test]
    fn test0_terminated_line_is_queued_with_its_boundary() {
        let (mut intake, source) = channel(80, 81);
        intake.on_bytes(b"hi\r");
        assert!(source.line_ready.is_pending());
        let (boundary, bytes) = drain_line(&source).unwrap();
        assert_eq!(boundary, LineBoundary { len: 2, status: LineStatus::Complete });
        assert_eq!(bytes, b"hi".to_vec());
        assert!(source.next_boundary().is_none());
    }

    #[test]
    fn test1_empty_lines_are_ignored() {
        let (mut intake, source) = channel(80, 81);
        intake.on_bytes(b"\r\r");
        assert!(source.next_boundary().is_none());
        assert!(!source.line_ready.is_pending());
        assert_eq!(intake.stats().snapshot().received, 2);
    }

    #[test]
    fn test2_overflow_aborts_the_line_until_the_terminator() {
        // The worker has not drained the first line, so the second one runs out of room.
        let (mut intake, source) = channel(4, 4);
        intake.on_bytes(b"ab\rcdef\r");
        let (boundary, bytes) = drain_line(&source).unwrap();
        assert_eq!(boundary, LineBoundary { len: 2, status: LineStatus::Complete });
        assert_eq!(bytes, b"ab".to_vec());
        let (boundary, bytes) = drain_line(&source).unwrap();
        assert_eq!(boundary, LineBoundary { len: 2, status: LineStatus::ChannelFull });
        assert_eq!(bytes, b"cd".to_vec());
        assert!(source.next_boundary().is_none());

        intake.on_bytes(b"xy\r");
        let (boundary, bytes) = drain_line(&source).unwrap();
        assert_eq!(boundary.status, LineStatus::Complete);
        assert_eq!(bytes, b"xy".to_vec());

        let counters = intake.stats().snapshot();
        assert_eq!(counters.overflowed_lines, 1);
        assert_eq!(counters.dropped, 2);
        assert_eq!(counters.completed_lines, 2);
    }

    #[test]
    fn test3_too_long_line_is_malformed() {
        let (mut intake, source) = channel(3, 8);
        intake.on_bytes(b"abcde\rok\r");
        let (boundary, bytes) = drain_line(&source).unwrap();
        assert_eq!(boundary, LineBoundary { len: 3, status: LineStatus::TooLong });
        assert_eq!(bytes, b"abc".to_vec());
        let (boundary, bytes) = drain_line(&source).unwrap();
        assert_eq!(boundary.status, LineStatus::Complete);
        assert_eq!(bytes, b"ok".to_vec());
        assert_eq!(intake.stats().snapshot().malformed_lines, 1);
    }

    #[test]
    fn test4_echo_sees_every_byte() {
        let (mut intake, _source) = channel(80, 81);
        let echoed = Arc::new(Mutex::new(Vec::new()));
        let sink = echoed.clone();
        intake.set_echo(move |byte| sink.lock().unwrap().push(byte));
        intake.on_bytes(b"ok\r");
        assert_eq!(*echoed.lock().unwrap(), b"ok\r".to_vec());
    }
}
