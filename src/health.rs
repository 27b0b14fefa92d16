//! Per-channel fault detection and quarantine.
//!
//! An open or disconnected RTD makes the module report a very large scaled value. Any
//! reading above the fault threshold moves the channel to [`ChannelState::Faulted`] and the
//! channel is no longer decoded or reported. With [`FaultPolicy::Latch`] this is terminal for
//! the rest of the session.

use strum_macros::{Display, EnumIter};

use crate::codec::{self, Temperature};

/// Readings strictly above this value are treated as a sensor fault.
pub const DEFAULT_FAULT_THRESHOLD: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ChannelState {
    Valid,
    Faulted,
}

/// What to do with a channel once it has faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// A faulted channel stays faulted until the session ends. It is not decoded again.
    #[default]
    Latch,
    /// A faulted channel is still decoded every iteration, and returns to
    /// [`ChannelState::Valid`] on the first reading at or below the threshold.
    Reprobe,
}

/// The value reported for one channel in one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelReading {
    Value(Temperature),
    /// Quarantined by the health tracker. Never a zero or a stale value.
    Faulted,
    /// The exchange with the module failed for this iteration.
    Unavailable,
}

impl ChannelReading {
    pub fn value(&self) -> Option<Temperature> {
        match self {
            ChannelReading::Value(t) => Some(*t),
            _ => None,
        }
    }
}

impl core::fmt::Display for ChannelReading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelReading::Value(t) => write!(f, "{t}"),
            ChannelReading::Faulted => f.write_str("faulted"),
            ChannelReading::Unavailable => f.write_str("no data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Channel {
    state: ChannelState,
    last_valid: Option<Temperature>,
}

/// Tracks which of the `N` channels can still be trusted.
///
/// Owned by a single polling session. State only changes through [`Self::evaluate`].
#[derive(Debug, Clone)]
pub struct ChannelHealthTracker<const N: usize> {
    channels: [Channel; N],
    threshold: f32,
    policy: FaultPolicy,
}

impl<const N: usize> Default for ChannelHealthTracker<N> {
    fn default() -> Self {
        Self::new(DEFAULT_FAULT_THRESHOLD, FaultPolicy::default())
    }
}

impl<const N: usize> ChannelHealthTracker<N> {
    /// Create a tracker with every channel [`ChannelState::Valid`].
    pub fn new(threshold: f32, policy: FaultPolicy) -> Self {
        Self {
            channels: [Channel {
                state: ChannelState::Valid,
                last_valid: None,
            }; N],
            threshold,
            policy,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    /// Current state of `channel`, or `None` if it is out of range.
    pub fn state(&self, channel: usize) -> Option<ChannelState> {
        self.channels.get(channel).map(|c| c.state)
    }

    pub fn states(&self) -> [ChannelState; N] {
        self.channels.map(|c| c.state)
    }

    /// The most recent reading of `channel` that passed the threshold check.
    pub fn last_valid(&self, channel: usize) -> Option<Temperature> {
        self.channels.get(channel).and_then(|c| c.last_valid)
    }

    /// Number of channels still [`ChannelState::Valid`].
    pub fn remaining(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.state == ChannelState::Valid)
            .count()
    }

    /// True once no channel is left to report. This is independent of transport failures,
    /// which never change channel state.
    pub fn all_faulted(&self) -> bool {
        self.remaining() == 0
    }

    /// Whether `channel` will be decoded in the next iteration.
    fn is_evaluated(&self, channel: &Channel) -> bool {
        channel.state == ChannelState::Valid || self.policy == FaultPolicy::Reprobe
    }

    /// Run one iteration's raw register words through the tracker.
    ///
    /// Channels that are skipped are not decoded at all. A channel that faults on this
    /// iteration reports [`ChannelReading::Faulted`] for this iteration already.
    pub fn evaluate(&mut self, raw: &[u16; N]) -> [ChannelReading; N] {
        let mut readings = [ChannelReading::Faulted; N];
        for (index, word) in raw.iter().enumerate() {
            if !self.is_evaluated(&self.channels[index]) {
                continue;
            }
            let temperature = codec::decode(*word);
            let channel = &mut self.channels[index];
            if temperature.celsius() > self.threshold {
                if channel.state == ChannelState::Valid {
                    log::warn!(
                        "CH{index} faulted: {temperature} exceeds threshold {:.1}",
                        self.threshold
                    );
                }
                channel.state = ChannelState::Faulted;
                continue;
            }
            if channel.state == ChannelState::Faulted {
                log::info!("CH{index} recovered with {temperature}");
            }
            channel.state = ChannelState::Valid;
            channel.last_valid = Some(temperature);
            readings[index] = ChannelReading::Value(temperature);
        }
        readings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn starts_valid() {
        let tracker: ChannelHealthTracker<4> = ChannelHealthTracker::default();
        for channel in 0..4 {
            assert_eq!(tracker.state(channel), Some(ChannelState::Valid));
            assert_eq!(tracker.last_valid(channel), None);
        }
        assert_eq!(tracker.state(4), None);
        assert_eq!(tracker.remaining(), 4);
    }

    #[test]
    fn close_to_sentinel_is_not_a_fault() {
        let mut tracker: ChannelHealthTracker<4> = ChannelHealthTracker::default();
        let readings = tracker.evaluate(&[250, 9999, 300, 310]);
        let values: [Option<f32>; 4] = readings.map(|r| r.value().map(f32::from));
        assert_eq!(values, [Some(25.0), Some(999.9), Some(30.0), Some(31.0)]);
        assert_eq!(tracker.states(), [ChannelState::Valid; 4]);
    }

    #[test]
    fn threshold_itself_is_not_a_fault() {
        let mut tracker: ChannelHealthTracker<1> = ChannelHealthTracker::default();
        let readings = tracker.evaluate(&[10000]);
        assert_eq!(
            readings,
            [ChannelReading::Value(Temperature::from_celsius(1000.0))]
        );
        assert_eq!(tracker.state(0), Some(ChannelState::Valid));
    }

    #[test]
    fn fault_latches() {
        let mut tracker: ChannelHealthTracker<4> = ChannelHealthTracker::default();
        tracker.evaluate(&[250, 260, 270, 280]);

        let readings = tracker.evaluate(&[251, 0xFFFF, 271, 281]);
        assert_eq!(readings[1], ChannelReading::Faulted);
        assert_eq!(tracker.state(1), Some(ChannelState::Faulted));

        // A plausible value afterwards must not bring the channel back.
        let readings = tracker.evaluate(&[252, 262, 272, 282]);
        assert_eq!(readings[1], ChannelReading::Faulted);
        assert_eq!(tracker.state(1), Some(ChannelState::Faulted));
        assert_eq!(
            tracker.last_valid(1),
            Some(Temperature::from_celsius(26.0))
        );
        assert_eq!(tracker.remaining(), 3);
    }

    #[test]
    fn reports_no_channels_remaining() {
        let mut tracker: ChannelHealthTracker<2> = ChannelHealthTracker::default();
        tracker.evaluate(&[20000, 250]);
        assert!(!tracker.all_faulted());
        tracker.evaluate(&[250, 20000]);
        assert!(tracker.all_faulted());
        assert_eq!(
            tracker.evaluate(&[250, 250]),
            [ChannelReading::Faulted, ChannelReading::Faulted]
        );
    }

    #[test]
    fn reprobe_restores_channel() {
        let mut tracker: ChannelHealthTracker<2> =
            ChannelHealthTracker::new(DEFAULT_FAULT_THRESHOLD, FaultPolicy::Reprobe);
        tracker.evaluate(&[20000, 250]);
        assert_eq!(tracker.state(0), Some(ChannelState::Faulted));

        let readings = tracker.evaluate(&[240, 250]);
        assert_eq!(
            readings[0],
            ChannelReading::Value(Temperature::from_celsius(24.0))
        );
        assert_eq!(tracker.state(0), Some(ChannelState::Valid));
    }

    #[test]
    fn custom_threshold() {
        let mut tracker: ChannelHealthTracker<1> =
            ChannelHealthTracker::new(100.0, FaultPolicy::Latch);
        assert_eq!(tracker.evaluate(&[1001]), [ChannelReading::Faulted]);
    }

    #[test]
    fn state_names() {
        use core::fmt::Write;

        let mut name: heapless::String<8> = heapless::String::new();
        for state in ChannelState::iter() {
            name.clear();
            write!(name, "{state}").unwrap();
            let expected = match state {
                ChannelState::Valid => "Valid",
                ChannelState::Faulted => "Faulted",
            };
            assert_eq!(name.as_str(), expected);
        }
    }
}
