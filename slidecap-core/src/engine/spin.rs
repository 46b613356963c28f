//! Bounded waiting.
//!
//! Calibration and bootstrap both poll hardware-driven state. Each poll is an
//! attempt; the first few attempts spin, the rest sleep for a fixed backoff.
//! When attempts run out the caller reports an error instead of hanging.

use std::time::Duration;

use crate::error::Result;

/// Attempts that spin before the backoff sleep kicks in.
const SPIN_ATTEMPTS: u32 = 64;

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinOutcome {
    /// The condition held on attempt number `attempts` (1-based).
    Ready { attempts: u32 },
    /// The condition never held.
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct BoundedSpin {
    max_attempts: u32,
    backoff: Duration,
}

impl BoundedSpin {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Poll `ready` until it returns `true` or attempts run out.
    pub fn wait<F: FnMut() -> bool>(&self, mut ready: F) -> SpinOutcome {
        for attempt in 1..=self.max_attempts {
            if ready() {
                return SpinOutcome::Ready { attempts: attempt };
            }
            self.pause(attempt);
        }
        SpinOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }

    /// Like [`wait`](Self::wait) for a fallible check; the first error aborts.
    pub fn try_wait<F: FnMut() -> Result<bool>>(&self, mut ready: F) -> Result<SpinOutcome> {
        for attempt in 1..=self.max_attempts {
            if ready()? {
                return Ok(SpinOutcome::Ready { attempts: attempt });
            }
            self.pause(attempt);
        }
        Ok(SpinOutcome::Exhausted {
            attempts: self.max_attempts,
        })
    }

    fn pause(&self, attempt: u32) {
        if attempt == self.max_attempts {
            return;
        }
        if attempt < SPIN_ATTEMPTS {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(self.backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;

    #[test]
    fn reports_attempt_that_succeeded() {
        let spin = BoundedSpin::new(10, Duration::ZERO);
        let mut polls = 0;
        let outcome = spin.wait(|| {
            polls += 1;
            polls == 4
        });
        assert_eq!(outcome, SpinOutcome::Ready { attempts: 4 });
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let spin = BoundedSpin::new(100, Duration::ZERO);
        let mut polls = 0;
        let outcome = spin.wait(|| {
            polls += 1;
            false
        });
        assert_eq!(outcome, SpinOutcome::Exhausted { attempts: 100 });
        assert_eq!(polls, 100);
    }

    #[test]
    fn fallible_check_propagates_first_error() {
        let spin = BoundedSpin::new(5, Duration::ZERO);
        let result = spin.try_wait(|| Err(CaptureError::SourceNotConnected));
        assert!(matches!(result, Err(CaptureError::SourceNotConnected)));
    }
}
