//! This module is used to define the register layout of the RTD module.
//!
//! The module exposes one measurement register and one calibration register per channel.
//! Both regions are contiguous, so a channel's register is the region base plus the channel index.

/// Number of RTD channels on the observed module.
pub const NUMBER_OF_CHANNELS: usize = 4;

/// How a register region may be accessed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    /// Writes are accepted but the device never returns the stored value.
    WriteOnly,
}

/// A contiguous block of per-channel registers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum RegisterRegion {
    /// __R__ - Measured temperature of CH0..CH3.
    ///
    /// Value is unsigned u16 in deci-degrees. E.g. 25.0°C => `250`.
    Measurement = 0x0000,
    /// __W__ - Temperature correction of CH0..CH3.
    ///
    /// Value is a signed deci-degree offset folded into u16 with two's complement.
    /// E.g. -5.3°C => `0xFFCB`.
    Correction = 0x0040,
}

impl RegisterRegion {
    pub const fn access(self) -> Access {
        match self {
            RegisterRegion::Measurement => Access::ReadOnly,
            RegisterRegion::Correction => Access::WriteOnly,
        }
    }
}

impl From<RegisterRegion> for u16 {
    fn from(value: RegisterRegion) -> Self {
        value as u16
    }
}

/// Base addresses of the two register regions.
///
/// The defaults match the observed module. Other register-mapped sensor modules
/// sharing the same layout can be driven by changing the bases.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    pub measurement_base: u16,
    pub correction_base: u16,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            measurement_base: RegisterRegion::Measurement.into(),
            correction_base: RegisterRegion::Correction.into(),
        }
    }
}

impl RegisterMap {
    /// Address of the measurement register for `channel`.
    pub fn measurement_address(&self, channel: usize) -> u16 {
        self.measurement_base.wrapping_add(channel as u16)
    }

    /// Address of the write-only correction register for `channel`.
    pub fn correction_address(&self, channel: usize) -> u16 {
        self.correction_base.wrapping_add(channel as u16)
    }
}
