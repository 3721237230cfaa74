mod console;
mod lcd;
mod memory;
mod sink;

pub use {console::*, lcd::*, memory::*, sink::*};
