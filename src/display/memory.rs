use std::fmt;

use bstr::ByteSlice;

use super::sink::{OutputSink, SinkError};
use crate::utils::auxiliary::{SharableRef, SharableRefExt};

#[derive(Default)]
struct Rendered {
    lines: Vec<String>,
    reports: Vec<String>,
}

/// Keeps everything rendered in memory. Clones share the same contents, so a test can keep one
/// handle while the pipeline owns another.
#[derive(Clone)]
pub struct MemorySink {
    rendered: SharableRef<Rendered>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            rendered: SharableRef::new_sharable(Rendered::default()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.rendered.lock_sharable().lines.clone()
    }

    pub fn reports(&self) -> Vec<String> {
        self.rendered.lock_sharable().reports.clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for MemorySink {
    fn show_line(&mut self, label: &str, line: &[u8]) -> Result<(), SinkError> {
        let rendered = format!("{label}{}", line.as_bstr());
        self.rendered.lock_sharable().lines.push(rendered);
        Ok(())
    }

    fn report(&mut self, error: &dyn fmt::Display) -> Result<(), SinkError> {
        self.rendered.lock_sharable().reports.push(error.to_string());
        Ok(())
    }
}
