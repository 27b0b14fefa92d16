//! Writing per-channel temperature corrections.
//!
//! Correction registers are write-only: the module acknowledges a write by echoing the
//! request but the stored offset can never be read back. Every [`CalibrationReport`] carries
//! [`Readback::Unsupported`] to make that explicit. The only available check is
//! [`compare_readings`], which looks at the ordinary measurement registers before and after
//! the write. That comparison is indirect and as noisy as the sensors themselves.

use crate::clock::{Clock, Wait};
use crate::codec::{self, Temperature};
use crate::config::{CalibrationConfig, ModuleConfig};
use crate::error::CalibrationError;
use crate::register::{Access, RegisterMap, RegisterRegion};
use crate::transport::RegisterTransport;

/// Whether a written correction can be verified by reading its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readback {
    Supported,
    Unsupported,
}

impl Readback {
    fn of(region: RegisterRegion) -> Self {
        match region.access() {
            Access::WriteOnly => Readback::Unsupported,
            Access::ReadOnly => Readback::Supported,
        }
    }
}

/// A validated correction, ready to be written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedWrite {
    pub channel: usize,
    pub correction: f32,
    pub address: u16,
    /// Encoded register word.
    pub raw: u16,
}

/// A batch of corrections that passed validation, at most one per channel.
///
/// Only [`CalibrationWriter::plan`] builds one, so every channel in it is below `N` and unique.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationPlan<const N: usize> {
    writes: heapless::Vec<PlannedWrite, N>,
}

impl<const N: usize> CalibrationPlan<N> {
    pub fn writes(&self) -> &[PlannedWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl<'a, const N: usize> IntoIterator for &'a CalibrationPlan<N> {
    type Item = &'a PlannedWrite;
    type IntoIter = core::slice::Iter<'a, PlannedWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No correction was requested for this channel.
    Skipped,
    /// The module acknowledged the write.
    Written { address: u16, raw: u16 },
    Failed { address: u16, raw: u16 },
    /// The batch was cancelled before this channel's turn.
    Cancelled,
}

/// Result of a calibration batch, one entry per channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationReport<const N: usize> {
    pub outcomes: [WriteOutcome; N],
    /// The requested correction per channel.
    pub corrections: [Option<f32>; N],
    pub readback: Readback,
}

impl<const N: usize> CalibrationReport<N> {
    fn empty() -> Self {
        Self {
            outcomes: [WriteOutcome::Skipped; N],
            corrections: [None; N],
            readback: Readback::of(RegisterRegion::Correction),
        }
    }

    /// Number of channels a correction was requested for.
    pub fn requested(&self) -> usize {
        self.corrections.iter().filter(|c| c.is_some()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, WriteOutcome::Written { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, WriteOutcome::Failed { .. }))
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.requested()
    }

    fn count(&self, predicate: impl Fn(&WriteOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

/// Applies correction offsets through single-register writes.
///
/// Independent of any polling session and of channel health.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationWriter {
    registers: RegisterMap,
    config: CalibrationConfig,
}

impl CalibrationWriter {
    pub fn new(module: &ModuleConfig, config: CalibrationConfig) -> Self {
        Self {
            registers: module.registers,
            config,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Validate and encode every correction. Nothing is written.
    ///
    /// Fails on the first channel out of range, duplicated channel or correction out of range.
    pub fn plan<const N: usize>(
        &self,
        corrections: &[(usize, f32)],
    ) -> Result<CalibrationPlan<N>, CalibrationError> {
        let mut writes: heapless::Vec<PlannedWrite, N> = heapless::Vec::new();
        for &(channel, correction) in corrections {
            if channel >= N {
                return Err(CalibrationError::InvalidChannel {
                    channel,
                    channels: N,
                });
            }
            if writes.iter().any(|p| p.channel == channel) {
                return Err(CalibrationError::DuplicateChannel(channel));
            }
            let raw = codec::encode_correction(correction)
                .map_err(|source| CalibrationError::Codec { channel, source })?;
            let pushed = writes.push(PlannedWrite {
                channel,
                correction,
                address: self.registers.correction_address(channel),
                raw,
            });
            debug_assert!(pushed.is_ok(), "unique channels below N always fit");
        }
        Ok(CalibrationPlan { writes })
    }

    /// Validate all corrections, then write them one by one.
    ///
    /// A failed write is recorded and the remaining channels are still written.
    pub fn apply<const N: usize, T, C>(
        &self,
        transport: &mut T,
        clock: &mut C,
        corrections: &[(usize, f32)],
    ) -> Result<CalibrationReport<N>, CalibrationError>
    where
        T: RegisterTransport<N>,
        C: Clock,
    {
        let plan = self.plan::<N>(corrections)?;
        Ok(self.write_planned(transport, clock, &plan))
    }

    /// Write a batch previously validated by [`Self::plan`].
    pub fn write_planned<const N: usize, T, C>(
        &self,
        transport: &mut T,
        clock: &mut C,
        plan: &CalibrationPlan<N>,
    ) -> CalibrationReport<N>
    where
        T: RegisterTransport<N>,
        C: Clock,
    {
        let mut report = CalibrationReport::<N>::empty();
        for write in plan {
            report.corrections[write.channel] = Some(write.correction);
            report.outcomes[write.channel] = WriteOutcome::Cancelled;
        }

        for (index, write) in plan.writes().iter().enumerate() {
            if index > 0 && clock.wait(self.config.write_spacing) == Wait::Cancelled {
                log::warn!("Calibration cancelled, {} writes not issued", plan.len() - index);
                break;
            }
            let PlannedWrite {
                channel,
                correction,
                address,
                raw,
            } = *write;
            report.outcomes[channel] = match transport.write_register(address, raw) {
                Ok(()) => {
                    log::info!(
                        "CH{channel} correction {correction:+.1} written to {address:#06X} as {raw:#06X}"
                    );
                    WriteOutcome::Written { address, raw }
                }
                Err(e) => {
                    log::warn!("CH{channel} correction write to {address:#06X} failed: {e:?}");
                    WriteOutcome::Failed { address, raw }
                }
            };
        }

        log::info!(
            "Calibration finished: {}/{} channels written",
            report.succeeded(),
            report.requested()
        );
        report
    }
}

/// Read and decode every measurement register once, without any health tracking.
pub fn read_temperatures<const N: usize, T: RegisterTransport<N>>(
    transport: &mut T,
) -> Result<[Temperature; N], T::Error> {
    Ok(transport.read_all_channels()?.map(codec::decode))
}

/// One channel's measurements around a calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelComparison {
    pub before: Temperature,
    pub after: Temperature,
    /// The correction that was written, if the write was acknowledged.
    pub expected: Option<f32>,
}

impl ChannelComparison {
    pub fn change(&self) -> f32 {
        self.after.celsius() - self.before.celsius()
    }
}

/// Pair up measurements taken before and after a calibration batch.
pub fn compare_readings<const N: usize>(
    before: &[Temperature; N],
    after: &[Temperature; N],
    report: &CalibrationReport<N>,
) -> [ChannelComparison; N] {
    core::array::from_fn(|channel| ChannelComparison {
        before: before[channel],
        after: after[channel],
        expected: match report.outcomes[channel] {
            WriteOutcome::Written { .. } => report.corrections[channel],
            _ => None,
        },
    })
}
