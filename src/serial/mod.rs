mod intake;
#[cfg(target_os = "espidf")]
mod uart;

pub use intake::*;
#[cfg(target_os = "espidf")]
pub use uart::*;
