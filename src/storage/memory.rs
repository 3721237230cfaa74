use super::store::{check_range, page_chunks, PersistentStore, StoreError};
use crate::config::{ConfigError, EepromConfig};

/// RAM backed store following the EEPROM paging contract. Used by the host runner and tests,
/// it can be told to misbehave like a faulty device.
pub struct MemoryStore {
    memory: Vec<u8>,
    config: EepromConfig,
    fail_write_at: Option<u32>,
    failing_reads: u32,
    stuck_busy: bool,
    pages_written: usize,
}

impl MemoryStore {
    pub fn new(config: EepromConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            memory: vec![0xFF; config.capacity as usize],
            config,
            fail_write_at: None,
            failing_reads: 0,
            stuck_busy: false,
            pages_written: 0,
        })
    }

    /// Refuses any page write covering `address`.
    pub fn fail_write_at(&mut self, address: Option<u32>) {
        self.fail_write_at = address;
    }

    /// Fails the next `count` reads.
    pub fn fail_next_reads(&mut self, count: u32) {
        self.failing_reads = count;
    }

    /// Keeps the store busy, so no page write starts.
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    pub fn contents(&self, address: u32, length: u32) -> &[u8] {
        &self.memory[address as usize..(address + length) as usize]
    }

    fn wait_ready(&mut self, address: u32) -> Result<(), StoreError> {
        let attempts = self.config.ready_poll_limit;
        if (0..attempts).any(|_| self.poll_ready()) {
            Ok(())
        } else {
            Err(StoreError::Timeout { address, attempts })
        }
    }
}

impl PersistentStore for MemoryStore {
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), StoreError> {
        check_range(address, bytes.len() as u32, self.config.capacity)?;
        for (page_address, chunk) in page_chunks(address, bytes, self.config.page_size) {
            self.wait_ready(page_address)?;
            if let Some(bad) = self.fail_write_at {
                if (page_address..page_address + chunk.len() as u32).contains(&bad) {
                    return Err(StoreError::Write { address: page_address });
                }
            }
            let start = page_address as usize;
            self.memory[start..start + chunk.len()].copy_from_slice(chunk);
            self.pages_written += 1;
        }
        Ok(())
    }

    fn read(&mut self, address: u32, length: u32) -> Result<Vec<u8>, StoreError> {
        check_range(address, length, self.config.capacity)?;
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(StoreError::Read { address, length });
        }
        Ok(self.contents(address, length).to_vec())
    }

    fn poll_ready(&mut self) -> bool {
        !self.stuck_busy
    }

    fn capacity(&self) -> u32 {
        self.config.capacity
    }
}
