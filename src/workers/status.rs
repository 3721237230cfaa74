use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};

use crate::serial::{IntakeCounters, IntakeStats};

/// Busy and halted flags plus counters of both workers, readable from anywhere.
#[derive(Debug)]
pub struct StatusIndicators {
    capture_busy: AtomicBool,
    playback_busy: AtomicBool,
    capture_halted: AtomicBool,
    lines_stored: AtomicU32,
    lines_played: AtomicU32,
    capture_errors: AtomicU32,
    playback_errors: AtomicU32,
    intake: Arc<IntakeStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub capture_busy: bool,
    pub playback_busy: bool,
    pub capture_halted: bool,
    pub lines_stored: u32,
    pub lines_played: u32,
    pub capture_errors: u32,
    pub playback_errors: u32,
    pub intake: IntakeCounters,
}

impl StatusIndicators {
    pub fn new(intake: Arc<IntakeStats>) -> Self {
        Self {
            capture_busy: AtomicBool::new(false),
            playback_busy: AtomicBool::new(false),
            capture_halted: AtomicBool::new(false),
            lines_stored: AtomicU32::new(0),
            lines_played: AtomicU32::new(0),
            capture_errors: AtomicU32::new(0),
            playback_errors: AtomicU32::new(0),
            intake,
        }
    }

    pub(crate) fn set_capture_busy(&self, busy: bool) {
        self.capture_busy.store(busy, Ordering::Release);
    }

    pub(crate) fn set_playback_busy(&self, busy: bool) {
        self.playback_busy.store(busy, Ordering::Release);
    }

    pub(crate) fn halt_capture(&self) {
        self.capture_halted.store(true, Ordering::Release);
    }

    pub(crate) fn line_stored(&self) {
        self.lines_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn line_played(&self) {
        self.lines_played.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn capture_failed(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn playback_failed(&self) {
        self.playback_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_capture_halted(&self) -> bool {
        self.capture_halted.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            capture_busy: self.capture_busy.load(Ordering::Acquire),
            playback_busy: self.playback_busy.load(Ordering::Acquire),
            capture_halted: self.is_capture_halted(),
            lines_stored: self.lines_stored.load(Ordering::Relaxed),
            lines_played: self.lines_played.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            playback_errors: self.playback_errors.load(Ordering::Relaxed),
            intake: self.intake.snapshot(),
        }
    }
}
