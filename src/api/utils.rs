use std::time::Duration;

use crate::protocol::transport::TransportError;

/// Open a serial port with the requested timeout, enabling exclusive access on Unix systems.
pub fn open_serial_port(
    port: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn serialport::SerialPort>, TransportError> {
    let connection = |source: serialport::Error| TransportError::Connection {
        port: port.to_string(),
        source,
    };

    let builder = serialport::new(port, baud_rate).timeout(timeout);

    #[cfg(unix)]
    {
        let mut handle = builder.open_native().map_err(connection)?;
        handle.set_exclusive(true).map_err(connection)?;
        Ok(Box::new(handle))
    }

    #[cfg(not(unix))]
    {
        builder.open().map_err(connection)
    }
}
