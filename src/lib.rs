//! Serial line logger: lines received byte by byte from an interrupt are stored in an I2C EEPROM
//! by a capture worker, and a playback worker reads them back and shows them.

pub mod config;
pub mod display;
pub mod pipeline;
pub mod serial;
pub mod storage;
pub mod utils;
pub mod workers;

pub use pipeline::{Pipeline, PipelineParts, RunningPipeline, Shutdown};
pub use utils::pipeline_error::PipelineError;
