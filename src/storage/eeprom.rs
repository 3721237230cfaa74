use embedded_hal::i2c::{Error as _, I2c};

use super::store::{check_range, page_chunks, PersistentStore, StoreError};
use crate::config::{ConfigError, EepromConfig};

const ADDR_HIGH_MASK: u8 = 0x7F;

/// Driver for a 24xx-series serial EEPROM (e.g. 24LC256) behind an I2C bus.
///
/// Every frame starts with the 15 bit memory address, most significant byte first. A write may
/// not cross a page, so longer writes are split per page. The device ignores its own address
/// while a write cycle runs, so it is ACK polled before and after each page.
pub struct Eeprom<I2C> {
    i2c: I2C,
    config: EepromConfig,
}

impl<I2C: I2c> Eeprom<I2C> {
    pub fn new(i2c: I2C, config: EepromConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { i2c, config })
    }

    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    /// Gives back the bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn address_bytes(address: u32) -> [u8; 2] {
        [((address >> 8) as u8) & ADDR_HIGH_MASK, address as u8]
    }

    fn write_page(&mut self, address: u32, chunk: &[u8]) -> Result<(), StoreError> {
        self.wait_ready(address)?;
        let mut frame = Vec::with_capacity(chunk.len() + 2);
        frame.extend_from_slice(&Self::address_bytes(address));
        frame.extend_from_slice(chunk);

        self.i2c
            .write(self.config.i2c_address, &frame)
            .map_err(|error| {
                log::warn!("eeprom page write at {address} failed: {:?}", error.kind());
                StoreError::Write { address }
            })?;
        self.wait_ready(address)
    }

    /// Busy-waits for the write cycle of the page at `address` to end.
    fn wait_ready(&mut self, address: u32) -> Result<(), StoreError> {
        let attempts = self.config.ready_poll_limit;
        for _ in 0..attempts {
            if self.poll_ready() {
                return Ok(());
            }
            std::hint::spin_loop();
        }
        Err(StoreError::Timeout { address, attempts })
    }
}

impl<I2C: I2c> PersistentStore for Eeprom<I2C> {
    fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), StoreError> {
        check_range(address, bytes.len() as u32, self.config.capacity)?;
        for (page_address, chunk) in page_chunks(address, bytes, self.config.page_size) {
            self.write_page(page_address, chunk)?;
        }
        Ok(())
    }

    fn read(&mut self, address: u32, length: u32) -> Result<Vec<u8>, StoreError> {
        check_range(address, length, self.config.capacity)?;
        let mut buffer = vec![0u8; length as usize];
        if length == 0 {
            return Ok(buffer);
        }
        self.i2c
            .write_read(self.config.i2c_address, &Self::address_bytes(address), &mut buffer)
            .map_err(|error| {
                log::warn!("eeprom read at {address} failed: {:?}", error.kind());
                StoreError::Read { address, length }
            })?;
        Ok(buffer)
    }

    /// The device does not acknowledge its address while a write cycle is running.
    fn poll_ready(&mut self) -> bool {
        self.i2c.write(self.config.i2c_address, &[]).is_ok()
    }

    fn capacity(&self) -> u32 {
        self.config.capacity
    }
}
