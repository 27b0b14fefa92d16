//! We use this mocking module in unit tests to emulate the serial link to the module.

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Request frames written by the client.
    write_buffer: heapless::Vec<u8, 256>,
    /// Pre-configured response frame returned by reads.
    read_buffer: heapless::Vec<u8, 256>,
    read_position: usize,
    should_error_on_write: bool,
    should_error_on_read: bool,
}

#[derive(Debug)]
pub enum MockSerialError {
    BufferOverflow,
    /// Generic simulated error for testing.
    SimulatedError,
    /// No data left, like a serial read timing out.
    WouldBlock,
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::WouldBlock);
        }

        let remaining = &self.read_buffer[self.read_position..];
        let bytes_to_read = core::cmp::min(buf.len(), remaining.len());
        buf[..bytes_to_read].copy_from_slice(&remaining[..bytes_to_read]);
        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Set the response that will be returned when read() is called.
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Every byte written to the mock so far.
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    #[test]
    fn test_read_in_chunks_then_would_block() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hello World").unwrap();

        let mut buffer = [0u8; 8];
        assert_eq!(mock.read(&mut buffer).unwrap(), 8);
        assert_eq!(&buffer, b"Hello Wo");
        assert_eq!(mock.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"rld");
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockSerialError::WouldBlock)
        ));
    }

    #[test]
    fn test_write_records_frames() {
        let mut mock = MockSerial::new();
        mock.write_all(&[0x01, 0x03]).unwrap();
        mock.write_all(&[0x00, 0x00]).unwrap();
        assert_eq!(mock.written_data(), &[0x01, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let result = mock.write(&[0u8; 300]);
        assert!(matches!(result, Err(MockSerialError::BufferOverflow)));
    }

    #[test]
    fn test_error_flags_toggle() {
        let mut mock = MockSerial::new();

        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        mock.set_write_error(false);
        assert!(mock.write(b"test").is_ok());

        mock.set_read_data(b"data").unwrap();
        let mut buffer = [0u8; 10];
        mock.set_read_error(true);
        assert!(mock.read(&mut buffer).is_err());
        mock.set_read_error(false);
        assert!(mock.read(&mut buffer).is_ok());
    }
}
