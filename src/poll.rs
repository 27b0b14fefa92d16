//! Time bounded acquisition.
//!
//! A session reads every measurement register once per interval until its duration has
//! elapsed. Termination is purely time based: a session keeps polling after every channel
//! has faulted, reporting iterations without readings.

use crate::clock::{Clock, Duration, Instant, Wait};
use crate::codec::Temperature;
use crate::config::{ModuleConfig, PollConfig};
use crate::health::{ChannelHealthTracker, ChannelReading, ChannelState};
use crate::transport::RegisterTransport;

/// Outcome of one iteration as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationStatus {
    /// At least one channel is still valid.
    Acquired,
    /// The read succeeded but no channel remains valid.
    AllFaulted,
    /// The exchange with the module failed. Channel health is untouched.
    TransportFailed,
}

/// Everything observed in one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollRecord<const N: usize> {
    /// Zero based iteration number within the session.
    pub iteration: u32,
    pub at: Instant,
    pub status: IterationStatus,
    pub channels: [ChannelReading; N],
}

impl<const N: usize> PollRecord<N> {
    /// Channels that produced a temperature in this iteration.
    pub fn readings(&self) -> impl Iterator<Item = (usize, Temperature)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(channel, reading)| reading.value().map(|t| (channel, t)))
    }

    pub fn reading_count(&self) -> usize {
        self.readings().count()
    }
}

/// How a session went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary<const N: usize> {
    pub iterations: u32,
    pub transport_failures: u32,
    /// A wait was cancelled before the duration elapsed.
    pub cancelled: bool,
    pub final_states: [ChannelState; N],
}

/// Run state of one polling session.
#[derive(Debug, Clone)]
pub struct PollSession<const N: usize> {
    start: Instant,
    end: Instant,
    tracker: ChannelHealthTracker<N>,
    iterations: u32,
    transport_failures: u32,
}

impl<const N: usize> PollSession<N> {
    /// The end time is fixed here, once.
    pub fn new(start: Instant, duration: Duration, tracker: ChannelHealthTracker<N>) -> Self {
        Self {
            start,
            end: start + duration,
            tracker,
            iterations: 0,
            transport_failures: 0,
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now < self.end
    }

    pub fn tracker(&self) -> &ChannelHealthTracker<N> {
        &self.tracker
    }

    /// Run exactly one iteration: one transport call, no retries.
    pub fn acquire<T: RegisterTransport<N>>(
        &mut self,
        transport: &mut T,
        at: Instant,
    ) -> PollRecord<N> {
        let iteration = self.iterations;
        self.iterations += 1;

        let (status, channels) = match transport.read_all_channels() {
            Ok(raw) => {
                let channels = self.tracker.evaluate(&raw);
                let status = if self.tracker.all_faulted() {
                    IterationStatus::AllFaulted
                } else {
                    IterationStatus::Acquired
                };
                (status, channels)
            }
            Err(e) => {
                log::warn!("Iteration {iteration}: reading channels failed: {e:?}");
                self.transport_failures += 1;
                (
                    IterationStatus::TransportFailed,
                    [ChannelReading::Unavailable; N],
                )
            }
        };

        PollRecord {
            iteration,
            at,
            status,
            channels,
        }
    }

    pub fn summary(&self, cancelled: bool) -> PollSummary<N> {
        PollSummary {
            iterations: self.iterations,
            transport_failures: self.transport_failures,
            cancelled,
            final_states: self.tracker.states(),
        }
    }
}

/// Poll the module for `config.duration`, handing every iteration to `on_record`.
///
/// Returns early only when a wait between iterations is cancelled, in which case no further
/// iteration is started.
pub fn poll<const N: usize, T, C, F>(
    transport: &mut T,
    clock: &mut C,
    config: &PollConfig,
    module: &ModuleConfig,
    mut on_record: F,
) -> PollSummary<N>
where
    T: RegisterTransport<N>,
    C: Clock,
    F: FnMut(&PollRecord<N>),
{
    let mut session = PollSession::new(clock.now(), config.duration, module.health_tracker());
    log::info!(
        "Polling {} channels for {} ms every {} ms",
        N,
        config.duration.to_millis(),
        config.interval.to_millis()
    );

    let mut cancelled = false;
    while session.is_due(clock.now()) {
        let record = session.acquire(transport, clock.now());
        log::debug!(
            "Iteration {}: {:?}, {} readings",
            record.iteration,
            record.status,
            record.reading_count()
        );
        on_record(&record);

        if clock.wait(config.interval) == Wait::Cancelled {
            log::info!("Polling cancelled after {} iterations", record.iteration + 1);
            cancelled = true;
            break;
        }
    }

    let summary = session.summary(cancelled);
    log::info!(
        "Polling finished: {} iterations, {} transport failures, {} channels valid",
        summary.iterations,
        summary.transport_failures,
        session.tracker().remaining()
    );
    summary
}
