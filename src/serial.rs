//! Serial port transport for desktop and Linux handhelds using serialport crate

use crate::transport::{RfidTransport, TransportOpener};
use log::debug;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Short enough that a read never holds up the scan loop's stop check
const READ_TIMEOUT: Duration = Duration::from_millis(10);

pub struct SerialTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, std::io::Error> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(std::io::Error::from)?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::from)?;

        Ok(Self { port: Some(port) })
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, std::io::Error> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(ErrorKind::NotConnected, "serial port closed"))
    }
}

impl RfidTransport for SerialTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        self.port()?
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(std::io::Error::from)
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port()?
            .clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::from)
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        // dropping the handle closes the device
        self.port.take();
        Ok(())
    }
}

/// Opens [`SerialTransport`]s by device path
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    type Transport = SerialTransport;

    fn open(
        &mut self,
        endpoint: &str,
        baud_rate: u32,
        flags: u32,
    ) -> Result<SerialTransport, std::io::Error> {
        if flags != 0 {
            debug!("Ignoring open flags 0x{:X} for serial port {}", flags, endpoint);
        }
        SerialTransport::new(endpoint, baud_rate)
    }
}
