mod cursor;
mod eeprom;
mod memory;
mod store;

#[cfg(test)]
pub(crate) mod fake_eeprom;

pub use {cursor::*, eeprom::*, memory::*, store::*};
