use std::io;

use crate::{config::ConfigError, workers::CaptureError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("could not spawn the {worker} worker: {source}")]
    Spawn {
        worker: &'static str,
        source: io::Error,
    },
    #[error("the {worker} worker panicked")]
    WorkerPanicked { worker: &'static str },
}
