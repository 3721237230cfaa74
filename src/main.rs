//! Stores every line received on the serial port in the EEPROM, then reads it back and prints it.
//!
//! On the board the line arrives on UART1 (GPIO16 tx, GPIO17 rx, 19200 baud, odd parity) and is
//! echoed back, and the EEPROM hangs from I2C0 (GPIO5 sda, GPIO6 scl). On the host, lines come
//! from stdin and go to a RAM store.

use std::error::Error;

use eeprom_logger::{
    config::{EepromConfig, PipelineConfig},
    display::{shared_sink, ConsoleSink},
    pipeline::Pipeline,
};

/// Must stay above both worker priorities.
#[cfg(target_os = "espidf")]
const RECEIVE_PRIORITY: u8 = 6;

#[cfg(target_os = "espidf")]
fn main() -> Result<(), Box<dyn Error>> {
    use eeprom_logger::{
        serial::{SerialLink, DEFAULT_BAUDRATE},
        storage::Eeprom,
        utils::auxiliary::spawn_worker,
    };
    use esp_idf_svc::hal::{
        i2c::{I2cConfig, I2cDriver},
        peripherals::Peripherals,
        units::FromValueType,
    };

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let i2c_config = I2cConfig::new().baudrate(400.kHz().into());
    let i2c = I2cDriver::new(peripherals.i2c0, pins.gpio5, pins.gpio6, &i2c_config)?;
    let eeprom = Eeprom::new(i2c, EepromConfig::new())?;
    let mut link = SerialLink::new(peripherals.uart1, pins.gpio16, pins.gpio17, DEFAULT_BAUDRATE)?;

    let sink = shared_sink(ConsoleSink::stdout());
    let pipeline = Pipeline::new(PipelineConfig::new(), eeprom, sink)?;
    let shutdown = pipeline.shutdown_handle();
    let mut running = pipeline.spawn()?;
    let mut intake = running.take_intake().ok_or("byte intake already taken")?;
    link.echo_into(&mut intake);

    log::info!("waiting for lines on UART1");
    let receiver = spawn_worker("uart-rx", RECEIVE_PRIORITY, move || {
        link.run(&mut intake, &shutdown)
    })?;
    receiver.join().map_err(|_| "uart receiver panicked")??;
    running.shutdown()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<(), Box<dyn Error>> {
    use std::io::Read;

    use eeprom_logger::storage::MemoryStore;

    // Piped input arrives much faster than a serial line.
    let config = PipelineConfig::new()
        .terminator(b'\n')
        .byte_channel_capacity(4096)
        .record_channel_capacity(64);
    let store = MemoryStore::new(EepromConfig::new())?;
    let pipeline = Pipeline::new(config, store, shared_sink(ConsoleSink::stdout()))?;
    let mut running = pipeline.spawn()?;
    let mut intake = running.take_intake().ok_or("byte intake already taken")?;

    let mut buffer = [0u8; 64];
    let mut stdin = std::io::stdin().lock();
    loop {
        let received = stdin.read(&mut buffer)?;
        if received == 0 {
            break;
        }
        intake.on_bytes(&buffer[..received]);
    }
    running.shutdown()?;
    Ok(())
}
