use std::{fmt, io};

use bstr::ByteSlice;

use super::sink::{OutputSink, SinkError};

/// Writes each line as `label` followed by the line, invalid UTF-8 replaced.
pub struct ConsoleSink<W> {
    out: W,
}

impl<W: io::Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: io::Write> OutputSink for ConsoleSink<W> {
    fn show_line(&mut self, label: &str, line: &[u8]) -> Result<(), SinkError> {
        writeln!(self.out, "{label}{}", line.as_bstr())?;
        self.out.flush()?;
        Ok(())
    }

    fn report(&mut self, error: &dyn fmt::Display) -> Result<(), SinkError> {
        writeln!(self.out, "error: {error}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test0_line_is_printed_after_its_label() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.show_line("EEPROM: ", b"hi").unwrap();
        sink.show_line("EEPROM: ", b"\xffok").unwrap();
        sink.report(&"store not ready").unwrap();
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "EEPROM: hi\nEEPROM: \u{FFFD}ok\nerror: store not ready\n"
        );
    }
}
