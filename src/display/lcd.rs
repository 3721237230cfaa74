//! HD44780 compatible 16x2 character display usable as an [OutputSink].
//!
//! No bus implementation ships with the crate: the board has to implement [LcdBus] over the pins
//! the display is wired to, then hand the [CharacterLcd] to the pipeline through `shared_sink`.

use std::fmt;

use embedded_hal::delay::DelayNs;

use super::sink::{OutputSink, SinkError};

const CMD_FUNCTION_SET_8BIT_2LINE: u8 = 0x38;
const CMD_DISPLAY_ON_CURSOR_BLINK: u8 = 0x0F;
const CMD_CLEAR: u8 = 0x01;
const CMD_SET_DDRAM: u8 = 0x80;

const BUSY_FLAG: u8 = 0x80;
const ADDRESS_MASK: u8 = 0x7F;

const FIRST_LINE: u8 = 0x00;
const SECOND_LINE: u8 = 0x40;
const LINE_WIDTH: u8 = 0x10;

const DEFAULT_BUSY_POLL_LIMIT: u32 = 1_000;
const DEFAULT_SCROLL_DWELL_MS: u32 = 1_000;
const SCROLL_FIRST_WORD_MS: u32 = 250;

/// Register selected by the RS line of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Command,
    Data,
}

/// Parallel bus to an HD44780 compatible controller.
pub trait LcdBus {
    type Error: fmt::Debug;

    fn write(&mut self, register: Register, value: u8) -> Result<(), Self::Error>;

    fn read(&mut self, register: Register) -> Result<u8, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LcdError {
    #[error("lcd bus error")]
    Bus,
    #[error("lcd still busy after {polls} polls")]
    Busy { polls: u32 },
}

/// 16x2 character display.
pub struct CharacterLcd<B, D> {
    bus: B,
    delay: D,
    busy_poll_limit: u32,
    scroll_dwell_ms: u32,
}

impl<B: LcdBus, D: DelayNs> CharacterLcd<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            busy_poll_limit: DEFAULT_BUSY_POLL_LIMIT,
            scroll_dwell_ms: DEFAULT_SCROLL_DWELL_MS,
        }
    }

    pub fn busy_poll_limit(mut self, limit: u32) -> Self {
        self.busy_poll_limit = limit;
        self
    }

    pub fn scroll_dwell_ms(mut self, dwell_ms: u32) -> Self {
        self.scroll_dwell_ms = dwell_ms;
        self
    }

    /// Power-on sequence: 8 bit bus, two lines, display on with a blinking cursor, cleared.
    pub fn init(&mut self) -> Result<(), LcdError> {
        self.delay.delay_ms(30);
        self.write(Register::Command, CMD_FUNCTION_SET_8BIT_2LINE)?;
        self.delay.delay_ms(50);
        self.write(Register::Command, CMD_DISPLAY_ON_CURSOR_BLINK)?;
        self.delay.delay_ms(50);
        self.write(Register::Command, CMD_CLEAR)?;
        self.delay.delay_ms(5);
        Ok(())
    }

    fn read_bus(&mut self) -> Result<u8, LcdError> {
        self.bus.read(Register::Command).map_err(|error| {
            log::warn!("lcd read failed: {error:?}");
            LcdError::Bus
        })
    }

    /// Waits for the busy flag to clear and returns the cursor address.
    fn wait_idle(&mut self) -> Result<u8, LcdError> {
        for _ in 0..self.busy_poll_limit {
            let status = self.read_bus()?;
            if status & BUSY_FLAG == 0 {
                return Ok(status & ADDRESS_MASK);
            }
        }
        Err(LcdError::Busy {
            polls: self.busy_poll_limit,
        })
    }

    fn write(&mut self, register: Register, value: u8) -> Result<(), LcdError> {
        self.wait_idle()?;
        self.bus.write(register, value).map_err(|error| {
            log::warn!("lcd write failed: {error:?}");
            LcdError::Bus
        })
    }

    fn move_to(&mut self, line_start: u8) -> Result<(), LcdError> {
        self.write(Register::Command, CMD_SET_DDRAM | line_start)
    }

    pub fn clear(&mut self) -> Result<(), LcdError> {
        self.write(Register::Command, CMD_CLEAR)
    }

    /// Writes one character. `\r` returns to the start of the current line, `\n` moves to the
    /// start of the other line, and text running off the end of a line continues on the other.
    pub fn putc(&mut self, c: u8) -> Result<(), LcdError> {
        let address = self.wait_idle()?;
        let on_first_line = address < SECOND_LINE;
        match c {
            b'\r' if on_first_line => self.move_to(FIRST_LINE),
            b'\r' => self.move_to(SECOND_LINE),
            b'\n' if on_first_line => self.move_to(SECOND_LINE),
            b'\n' => self.move_to(FIRST_LINE),
            _ => {
                if (LINE_WIDTH..SECOND_LINE).contains(&address) {
                    self.move_to(SECOND_LINE)?;
                } else if address >= SECOND_LINE + LINE_WIDTH {
                    self.move_to(FIRST_LINE)?;
                }
                self.write(Register::Data, c)
            }
        }
    }

    pub fn puts(&mut self, text: &[u8]) -> Result<(), LcdError> {
        text.iter().try_for_each(|c| self.putc(*c))
    }

    /// Shows `text` word by word: each word first appears on the second line, then moves up to
    /// the first line as the next word comes in below it.
    pub fn puts_scroll(&mut self, text: &[u8]) -> Result<(), LcdError> {
        self.clear()?;
        let mut words = text.split(|c| *c == b' ').filter(|word| !word.is_empty());
        let Some(mut bottom) = words.next() else {
            return Ok(());
        };
        self.move_to(SECOND_LINE)?;
        self.puts(bottom)?;
        self.delay.delay_ms(SCROLL_FIRST_WORD_MS);

        for word in words {
            let top = bottom;
            bottom = word;
            self.clear()?;
            self.move_to(FIRST_LINE)?;
            self.puts(top)?;
            self.delay.delay_ms(self.scroll_dwell_ms);
            self.move_to(SECOND_LINE)?;
            self.puts(bottom)?;
            self.delay.delay_ms(self.scroll_dwell_ms);
        }
        Ok(())
    }
}

impl<B: LcdBus, D: DelayNs> OutputSink for CharacterLcd<B, D> {
    fn show_line(&mut self, label: &str, line: &[u8]) -> Result<(), SinkError> {
        self.clear()?;
        self.puts(label.as_bytes())?;
        self.puts(line)?;
        Ok(())
    }

    fn report(&mut self, error: &dyn fmt::Display) -> Result<(), SinkError> {
        self.clear()?;
        self.puts(error.to_string().as_bytes())?;
        Ok(())
    }
}
