use std::{fmt, io, sync::Arc, sync::Mutex};

use super::lcd::LcdError;
use crate::utils::auxiliary::SharableRef;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("output write failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Lcd(#[from] LcdError),
}

/// Where played back lines and pipeline errors end up.
pub trait OutputSink {
    /// Renders one stored line, prefixed by `label`. `line` carries no terminator or marker.
    fn show_line(&mut self, label: &str, line: &[u8]) -> Result<(), SinkError>;

    fn report(&mut self, error: &dyn fmt::Display) -> Result<(), SinkError>;
}

pub type SharedSink = SharableRef<dyn OutputSink + Send>;

pub fn shared_sink<S: OutputSink + Send + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(sink))
}
