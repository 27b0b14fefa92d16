//! This crate polls multi-channel RTD (e.g. PT100) temperature collector modules and writes
//! their per-channel calibration offsets.
//!
//! It supports `no-std` environments by disabling the default `std` feature.
//!
//! Observed module:
//! * 4 channels, CH0..CH3.
//! * Measurements in holding registers `0x0000`-`0x0003`, unsigned deci-degrees.
//! * Corrections in write-only registers `0x0040`-`0x0043`, signed deci-degrees.
//! * An open sensor reads back as a huge value, anything above 1000.0°C is treated as a fault.
//!
//! It uses Modbus RTU under the hood. The serial port used for comms should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! The polling loop and the calibration writer only depend on [`transport::RegisterTransport`]
//! and [`clock::Clock`], so both can be driven by any transport and time source.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod calibration;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod health;
pub mod poll;
pub mod register;
pub mod transport;

#[cfg(test)]
mod mock_serial;
#[cfg(test)]
mod testing;
