//! Serial port setup.

use bridge_common::errors::{Error, ResultExt};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::config::SerialConfig;

/// Open the servo controller port: 8 data bits, 1 stop bit, no parity,
/// configured read timeout.
///
/// # Errors
/// Returns an error if the device cannot be opened.
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn SerialPort>, Error> {
    let port = serialport::new(config.port_name.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(config.timeout())
        .open()
        .wrap_err_with(|| format!("failed on opening serial port {}", config.port_name))?;

    info!(
        "Opened serial port {} @ {} baud",
        config.port_name, config.baud_rate
    );
    Ok(port)
}
