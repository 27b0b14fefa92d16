//! Time source used by the polling loop and the calibration writer.
//!
//! Waits are the only suspension points in the crate, so they are also where a session can be
//! stopped. A [`Wait::Cancelled`] result means the caller must not start another iteration.

/// Millisecond instant since an arbitrary, clock specific, origin.
pub type Instant = fugit::TimerInstantU64<1000>;
/// Millisecond duration.
pub type Duration = fugit::MillisDurationU64;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Elapsed,
    Cancelled,
}

pub trait Clock {
    fn now(&self) -> Instant;

    /// Block for `duration`, returning early with [`Wait::Cancelled`] if asked to stop.
    fn wait(&mut self, duration: Duration) -> Wait;
}

#[cfg(feature = "std")]
pub use self::std_clock::{CancelToken, StdClock};

#[cfg(feature = "std")]
mod std_clock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::{Clock, Duration, Instant, Wait};

    /// Longest single sleep, bounds how late a cancellation is noticed.
    const SLICE_MS: u64 = 50;

    /// Shared flag used to stop a running session from another thread.
    #[derive(Debug, Clone, Default)]
    pub struct CancelToken(Arc<AtomicBool>);

    impl CancelToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Wall clock backed by [`std::time::Instant`].
    #[derive(Debug, Clone)]
    pub struct StdClock {
        origin: std::time::Instant,
        cancel: CancelToken,
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new(CancelToken::new())
        }
    }

    impl StdClock {
        pub fn new(cancel: CancelToken) -> Self {
            Self {
                origin: std::time::Instant::now(),
                cancel,
            }
        }

        pub fn cancel_token(&self) -> CancelToken {
            self.cancel.clone()
        }
    }

    impl Clock for StdClock {
        fn now(&self) -> Instant {
            Instant::from_ticks(self.origin.elapsed().as_millis() as u64)
        }

        fn wait(&mut self, duration: Duration) -> Wait {
            let deadline = self.now() + duration;
            loop {
                if self.cancel.is_cancelled() {
                    return Wait::Cancelled;
                }
                let now = self.now();
                if now >= deadline {
                    return Wait::Elapsed;
                }
                let remaining = (deadline - now).to_millis().min(SLICE_MS);
                std::thread::sleep(std::time::Duration::from_millis(remaining));
            }
        }
    }

}
