//! The request/response exchange with the module.
//!
//! The polling loop and the calibration writer only see [`RegisterTransport`]. [`ModbusRtu`]
//! implements it over any interface which implements [embedded_io::Read] & [embedded_io::Write],
//! e.g. a serial port configured as 9600 baud, 8 data bits, no parity, 1 stop bit.

use embedded_io::Error as _;

use crate::error::{Error, Result};
use crate::register::RegisterMap;

/// Register level access to an `N` channel module.
///
/// Implementations issue at most one request at a time and apply their own timeouts.
pub trait RegisterTransport<const N: usize> {
    type Error: core::fmt::Debug;

    /// Read the `N` consecutive measurement registers.
    fn read_all_channels(&mut self) -> core::result::Result<[u16; N], Self::Error>;

    /// Write a single register.
    fn write_register(&mut self, address: u16, value: u16)
    -> core::result::Result<(), Self::Error>;
}

impl<T: RegisterTransport<N>, const N: usize> RegisterTransport<N> for &mut T {
    type Error = T::Error;

    fn read_all_channels(&mut self) -> core::result::Result<[u16; N], Self::Error> {
        (**self).read_all_channels()
    }

    fn write_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> core::result::Result<(), Self::Error> {
        (**self).write_register(address, value)
    }
}

/// Modbus RTU client for the module.
///
/// `L` is the capacity of the frame buffers in bytes.
pub struct ModbusRtu<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    interface: S,
    /// Default for the module is 0x01.
    unit_id: u8,
    measurement_base: u16,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> ModbusRtu<S, L> {
    /// Create a new client using the default register map.
    pub fn new(interface: S, unit_id: u8) -> Self {
        Self::with_registers(interface, unit_id, RegisterMap::default())
    }

    pub fn with_registers(interface: S, unit_id: u8, registers: RegisterMap) -> Self {
        Self {
            interface,
            unit_id,
            measurement_base: registers.measurement_base,
        }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Give the interface back, e.g. to close a serial port.
    pub fn release(self) -> S {
        self.interface
    }

    /// Read `count` sequential holding registers (function code 0x03).
    pub fn read_modbus_bulk(
        &mut self,
        start_register: u16,
        count: u16,
    ) -> Result<heapless::Vec<u16, 64>, S::Error> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = rmodbus::client::ModbusRequest::new(self.unit_id, rmodbus::ModbusProto::Rtu);
        req.generate_get_holdings(start_register, count, &mut buff)?;

        self.interface
            .write_all(&buff)
            .map_err(Error::SerialError)?;

        // Reuse same buffer when reading back.
        buff.clear();
        // unit_id + function + byte_count + data + 2 CRC
        self.read_response(&mut buff, 5 + 2 * count as usize)?;

        let mut parsed_data: heapless::Vec<u16, 64> = heapless::Vec::new();
        req.parse_u16(&buff, &mut parsed_data)
            .map_err(|_| Error::InvalidResponse)?;

        if parsed_data.len() < count as usize {
            return Err(Error::InvalidResponse);
        }
        Ok(parsed_data)
    }

    /// Write to a single register (function code 0x06).
    ///
    /// The module echoes the request, so a good write is confirmed by the echo matching.
    /// This says nothing about the stored value, write-only registers can't be read back.
    pub fn write_modbus_single(&mut self, register: u16, data: u16) -> Result<(), S::Error> {
        let mut request: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut response: heapless::Vec<u8, L> = heapless::Vec::new();

        let mut req = rmodbus::client::ModbusRequest::new(self.unit_id, rmodbus::ModbusProto::Rtu);
        req.generate_set_holding(register, data, &mut request)?;

        self.interface
            .write_all(&request)
            .map_err(Error::SerialError)?;

        self.read_response(&mut response, request.len())?;

        // First 6 bytes of message sent should match.
        if response.len() < 6 || request[0..6] != response[0..6] {
            Err(Error::InvalidResponse)
        } else {
            Ok(())
        }
    }

    /// Keep reading until `expected_len` bytes arrived, or the interface runs dry after at
    /// least one byte.
    fn read_response(
        &mut self,
        buff: &mut heapless::Vec<u8, L>,
        expected_len: usize,
    ) -> Result<(), S::Error> {
        let mut temp_buf = [0u8; 8];
        loop {
            match self.interface.read(&mut temp_buf) {
                Ok(0) if buff.is_empty() => return Err(Error::Timeout),
                Ok(0) => return Ok(()),
                Ok(bytes_read) => {
                    if buff.extend_from_slice(&temp_buf[0..bytes_read]).is_err() {
                        return Err(Error::BufferError);
                    }
                    if buff.len() >= expected_len {
                        return Ok(());
                    }
                }
                Err(e) => {
                    let would_block_or_timeout = matches!(
                        e.kind(),
                        embedded_io::ErrorKind::Other | embedded_io::ErrorKind::TimedOut
                    );
                    if would_block_or_timeout && !buff.is_empty() {
                        // Short frame, e.g. an exception response. Let the parser judge it.
                        return Ok(());
                    }
                    if e.kind() == embedded_io::ErrorKind::TimedOut {
                        return Err(Error::Timeout);
                    }
                    return Err(Error::SerialError(e));
                }
            }
        }
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize, const N: usize> RegisterTransport<N>
    for ModbusRtu<S, L>
{
    type Error = Error<S::Error>;

    fn read_all_channels(&mut self) -> core::result::Result<[u16; N], Self::Error> {
        let registers = self.read_modbus_bulk(self.measurement_base, N as u16)?;
        let mut channels = [0u16; N];
        channels.copy_from_slice(&registers[..N]);
        Ok(channels)
    }

    fn write_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> core::result::Result<(), Self::Error> {
        self.write_modbus_single(address, value)
    }
}
