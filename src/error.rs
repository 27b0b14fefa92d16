//! Our error types for the RTD module.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Error raised by the Modbus transport when an exchange with the module fails.
///
/// These are always recovered per iteration or per write, never fatal to a session.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Modbus protocol error: {0}")]
    ModbusError(rmodbus::ErrorKind),
    #[error("Communication timeout")]
    Timeout,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Response did not fit in the receive buffer")]
    BufferError,
}

impl<I: embedded_io::Error> From<rmodbus::ErrorKind> for Error<I> {
    fn from(err: rmodbus::ErrorKind) -> Self {
        Error::ModbusError(err)
    }
}

/// Errors from the register codec.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CodecError {
    /// The correction is outside `[-327.0, +327.0]`. Values are never clamped.
    #[error("Correction value {0} is outside the range -327.0 to +327.0")]
    OutOfRange(f32),
}

/// Errors raised while validating a calibration batch, before anything is written.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    #[error("Channel {channel} does not exist on a {channels} channel module")]
    InvalidChannel { channel: usize, channels: usize },
    #[error("Channel {0} was given more than one correction")]
    DuplicateChannel(usize),
    #[error("Channel {channel}: {source}")]
    Codec { channel: usize, source: CodecError },
}
