//! Scripted transport and manual clock for exercising the polling loop and calibration flow.

extern crate std;

use std::collections::VecDeque;
use std::vec::Vec;

use crate::clock::{Clock, Duration, Instant, Wait};
use crate::transport::RegisterTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError;

/// Replays a script of read results and records every write.
pub struct ScriptedTransport<const N: usize> {
    reads: VecDeque<Result<[u16; N], FakeError>>,
    /// Returned once the script runs out.
    fallback: Result<[u16; N], FakeError>,
    pub read_calls: usize,
    pub writes: Vec<(u16, u16)>,
    pub failing_addresses: Vec<u16>,
}

impl<const N: usize> ScriptedTransport<N> {
    pub fn new(fallback: Result<[u16; N], FakeError>) -> Self {
        Self {
            reads: VecDeque::new(),
            fallback,
            read_calls: 0,
            writes: Vec::new(),
            failing_addresses: Vec::new(),
        }
    }

    pub fn then(mut self, read: Result<[u16; N], FakeError>) -> Self {
        self.reads.push_back(read);
        self
    }

    pub fn failing_write(mut self, address: u16) -> Self {
        self.failing_addresses.push(address);
        self
    }
}

impl<const N: usize> RegisterTransport<N> for ScriptedTransport<N> {
    type Error = FakeError;

    fn read_all_channels(&mut self) -> Result<[u16; N], FakeError> {
        self.read_calls += 1;
        self.reads.pop_front().unwrap_or(self.fallback)
    }

    fn write_register(&mut self, address: u16, value: u16) -> Result<(), FakeError> {
        self.writes.push((address, value));
        if self.failing_addresses.contains(&address) {
            Err(FakeError)
        } else {
            Ok(())
        }
    }
}

/// Clock that only moves when waited on.
pub struct ManualClock {
    now: Instant,
    pub waits: Vec<Duration>,
    /// The wait with this index (0 based) reports [`Wait::Cancelled`].
    cancel_at: Option<usize>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Instant::from_ticks(0),
            waits: Vec::new(),
            cancel_at: None,
        }
    }

    pub fn cancelling_wait(mut self, index: usize) -> Self {
        self.cancel_at = Some(index);
        self
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now
    }

    fn wait(&mut self, duration: Duration) -> Wait {
        let index = self.waits.len();
        self.waits.push(duration);
        if self.cancel_at == Some(index) {
            return Wait::Cancelled;
        }
        self.now = self.now + duration;
        Wait::Elapsed
    }
}
