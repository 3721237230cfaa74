//! In-memory 24xx EEPROM answering on an `embedded_hal` I2C bus, with injectable latency and
//! failures.

use std::sync::{Arc, Mutex};

use embedded_hal::i2c::{
    ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress,
};

use crate::config::{DEFAULT_EEPROM_ADDR, DEFAULT_EEPROM_CAPACITY, DEFAULT_EEPROM_PAGE_LEN};

struct State {
    memory: Vec<u8>,
    pointer: usize,
    busy_polls: u32,
    write_latency: u32,
    stuck_busy: bool,
    fail_write_at: Option<u32>,
    fail_reads: bool,
    page_writes: Vec<(u32, usize)>,
}

#[derive(Clone)]
pub(crate) struct FakeEeprom {
    state: Arc<Mutex<State>>,
}

impl FakeEeprom {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                memory: vec![0xFF; DEFAULT_EEPROM_CAPACITY as usize],
                pointer: 0,
                busy_polls: 0,
                write_latency: 0,
                stuck_busy: false,
                fail_write_at: None,
                fail_reads: false,
                page_writes: Vec::new(),
            })),
        }
    }

    /// Polls the device refuses after each page write.
    pub(crate) fn set_write_latency(&self, polls: u32) {
        self.state.lock().unwrap().write_latency = polls;
    }

    /// Keeps the device in a write cycle for the next `polls` transactions.
    pub(crate) fn hold_busy(&self, polls: u32) {
        self.state.lock().unwrap().busy_polls = polls;
    }

    pub(crate) fn set_stuck_busy(&self, stuck: bool) {
        self.state.lock().unwrap().stuck_busy = stuck;
    }

    /// NACKs the data of any page write covering `address`.
    pub(crate) fn fail_write_at(&self, address: Option<u32>) {
        self.state.lock().unwrap().fail_write_at = address;
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub(crate) fn memory(&self, address: usize, length: usize) -> Vec<u8> {
        self.state.lock().unwrap().memory[address..address + length].to_vec()
    }

    pub(crate) fn page_writes(&self) -> Vec<(u32, usize)> {
        self.state.lock().unwrap().page_writes.clone()
    }
}

impl State {
    fn write_data(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
        let start = self.pointer as u32;
        if let Some(bad) = self.fail_write_at {
            if (start..start + data.len() as u32).contains(&bad) {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
            }
        }
        // The device wraps inside the current page instead of moving on to the next one.
        let page_base = self.pointer - self.pointer % DEFAULT_EEPROM_PAGE_LEN;
        for (i, byte) in data.iter().enumerate() {
            let offset = (self.pointer % DEFAULT_EEPROM_PAGE_LEN + i) % DEFAULT_EEPROM_PAGE_LEN;
            self.memory[page_base + offset] = *byte;
        }
        self.page_writes.push((start, data.len()));
        self.busy_polls = self.write_latency;
        Ok(())
    }

    fn read_data(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        if self.fail_reads {
            return Err(ErrorKind::Bus);
        }
        for byte in buffer.iter_mut() {
            *byte = self.memory[self.pointer];
            self.pointer = (self.pointer + 1) % self.memory.len();
        }
        Ok(())
    }
}

impl ErrorType for FakeEeprom {
    type Error = ErrorKind;
}

impl I2c<SevenBitAddress> for FakeEeprom {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        if address != DEFAULT_EEPROM_ADDR {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        if state.stuck_busy || state.busy_polls > 0 {
            state.busy_polls = state.busy_polls.saturating_sub(1);
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if bytes.len() < 2 {
                        continue;
                    }
                    state.pointer = (((bytes[0] & 0x7F) as usize) << 8) | bytes[1] as usize;
                    if bytes.len() > 2 {
                        state.write_data(&bytes[2..])?;
                    }
                }
                Operation::Read(buffer) => state.read_data(buffer)?,
            }
        }
        Ok(())
    }
}
