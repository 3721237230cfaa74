use esp_idf_svc::{
    hal::{
        delay::BLOCK,
        gpio::{AnyIOPin, InputPin, OutputPin},
        peripheral::Peripheral,
        uart::{config, Uart, UartDriver, UartRxDriver, UartTxDriver},
        units::Hertz,
    },
    sys::EspError,
};

use super::ByteIntake;
use crate::pipeline::Shutdown;

pub const DEFAULT_BAUDRATE: u32 = 19_200;
const READ_CHUNK: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum UartError {
    #[error("uart driver error: {0}")]
    Driver(#[from] EspError),
}

/// Serial line feeding the byte intake: 8 data bits, odd parity, 1 stop bit.
pub struct SerialLink<'d> {
    tx: Option<UartTxDriver<'d>>,
    rx: UartRxDriver<'d>,
}

impl<'d> SerialLink<'d> {
    pub fn new<UART: Uart>(
        uart: impl Peripheral<P = UART> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
        baudrate: u32,
    ) -> Result<Self, UartError> {
        let config = config::Config::new().baudrate(Hertz(baudrate)).parity_odd();
        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        let (tx, rx) = driver.into_split();
        Ok(Self { tx: Some(tx), rx })
    }

    /// Makes `intake` send every received byte back on the line.
    pub fn echo_into(&mut self, intake: &mut ByteIntake)
    where
        'd: 'static,
    {
        if let Some(tx) = self.tx.take() {
            intake.set_echo(move |byte| {
                if tx.write(&[byte]).is_err() {
                    log::trace!("echo of {byte:#04x} lost");
                }
            });
        }
    }

    /// Feeds received bytes to `intake` until shutdown is requested.
    pub fn run(&self, intake: &mut ByteIntake, shutdown: &Shutdown) -> Result<(), UartError> {
        let mut buffer = [0u8; READ_CHUNK];
        while !shutdown.is_requested() {
            let received = self.rx.read(&mut buffer, BLOCK)?;
            intake.on_bytes(&buffer[..received]);
        }
        Ok(())
    }
}
