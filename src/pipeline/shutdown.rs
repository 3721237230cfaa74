use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::utils::notification::Notifier;

/// Stop request shared by everything that may end the pipeline. Requesting it wakes the capture
/// worker, which finishes the lines already signalled and exits.
#[derive(Clone)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    wake_capture: Notifier,
}

impl Shutdown {
    pub(crate) fn new(wake_capture: Notifier) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            wake_capture,
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.wake_capture.notify();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
