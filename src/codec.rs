//! Conversions between raw register words and physical values.
//!
//! The two register regions use different encodings for the same ×10 fixed-point scale:
//! * Measurement registers are **unsigned**. A raw word is never interpreted as negative,
//!   so `0xFFFF` decodes to `6553.5`, not `-0.1`.
//! * Correction registers are **signed**, stored as two's complement inside the unsigned
//!   16 bit field. `-5.3` is written as `65536 - 53 = 0xFFCB`.
//!
//! [`decode`] must only be used on measurement registers and [`decode_correction`] only on
//! values produced by [`encode_correction`].

use crate::error::CodecError;

/// Scale between register words and physical values. One decimal digit of precision.
pub const SCALE: f32 = 10.0;

/// Smallest correction accepted by [`encode_correction`].
pub const CORRECTION_MIN: f32 = -327.0;
/// Largest correction accepted by [`encode_correction`].
pub const CORRECTION_MAX: f32 = 327.0;

/// A decoded temperature in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Temperature(f32);

impl Temperature {
    pub const fn from_celsius(celsius: f32) -> Self {
        Self(celsius)
    }

    pub const fn celsius(&self) -> f32 {
        self.0
    }
}

impl From<Temperature> for f32 {
    fn from(value: Temperature) -> Self {
        value.0
    }
}

impl core::fmt::Display for Temperature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.1}°C", self.0)
    }
}

/// Decode a measurement register word.
#[inline]
pub fn decode(raw: u16) -> Temperature {
    Temperature(raw as f32 / SCALE)
}

/// Encode a correction offset for a correction register.
///
/// Fails with [`CodecError::OutOfRange`] for values outside
/// [`CORRECTION_MIN`]..=[`CORRECTION_MAX`], including NaN.
pub fn encode_correction(value: f32) -> Result<u16, CodecError> {
    if !(CORRECTION_MIN..=CORRECTION_MAX).contains(&value) {
        return Err(CodecError::OutOfRange(value));
    }
    let mut int_value = libm::roundf(value * SCALE) as i32;
    if int_value < 0 {
        int_value += 0x1_0000;
    }
    Ok((int_value & 0xFFFF) as u16)
}

/// Interpret a correction register word as the signed offset it holds.
#[inline]
pub fn decode_correction(raw: u16) -> f32 {
    raw as i16 as f32 / SCALE
}
