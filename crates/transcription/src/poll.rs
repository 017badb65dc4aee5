//! Bounded status polling with capped exponential backoff.
//!
//! ```text
//! check ──pending──> sleep(delay_n) ──> check ──> ... ──> PollTimeout
//!   │                    │
//! [done]            [cancelled]
//!   ↓                    ↓
//! Ok(T) / Err(e)     Cancelled
//! ```

use std::thread;
use std::time::Duration;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::TranscriptionError;

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Limits and schedule for a polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// Upper bound on status checks, including the first one.
    pub max_attempts: u32,
    /// Upper bound on the cumulative time spent sleeping between checks.
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            multiplier: 2,
            max_attempts: 120,
            max_wait: Duration::from_secs(30 * 60),
        }
    }
}

impl PollPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            max: self.max_delay,
            multiplier: self.multiplier.max(1),
        }
    }
}

/// Non-decreasing delay sequence, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: u32,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(self.multiplier).min(self.max);
        Some(current)
    }
}

/// Waits between polls.
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`, returning `Cancelled` early if `cancel` fires.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken)
        -> Result<(), TranscriptionError>;
}

/// Blocks the calling thread, waking periodically to observe cancellation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), TranscriptionError> {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return Err(TranscriptionError::Cancelled);
            }
            let slice = remaining.min(CANCEL_CHECK_INTERVAL);
            thread::sleep(slice);
            remaining -= slice;
        }
        if cancel.is_cancelled() {
            return Err(TranscriptionError::Cancelled);
        }
        Ok(())
    }
}

/// Outcome of a single status check.
#[derive(Debug)]
pub enum PollStep<T> {
    Pending,
    Done(T),
}

/// Repeatedly call `check` until it reports `Done`, fails, or the policy is exhausted.
///
/// `check` receives the 1-based attempt number. Errors from `check` end the loop
/// immediately; exhausting the attempt or wait budget yields `PollTimeout`.
pub fn poll_until<T, F>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    check: F,
) -> Result<T, TranscriptionError>
where
    F: FnMut(u32) -> Result<PollStep<T>, TranscriptionError>,
{
    run(policy, sleeper, cancel, false, check)
}

/// Like [`poll_until`], but waits one backoff delay before the first check.
///
/// For handles whose initial state is already known to be pending. Every
/// attempt counted in `PollTimeout` is a real call to `check`.
pub fn poll_until_after_delay<T, F>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    check: F,
) -> Result<T, TranscriptionError>
where
    F: FnMut(u32) -> Result<PollStep<T>, TranscriptionError>,
{
    run(policy, sleeper, cancel, true, check)
}

fn run<T, F>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancellationToken,
    delay_first: bool,
    mut check: F,
) -> Result<T, TranscriptionError>
where
    F: FnMut(u32) -> Result<PollStep<T>, TranscriptionError>,
{
    let mut backoff = policy.backoff();
    let mut waited = Duration::ZERO;
    let mut attempts = 0;
    let mut wait_next = delay_first;

    while attempts < policy.max_attempts {
        if wait_next {
            let delay = backoff.next().unwrap_or(policy.max_delay);
            if waited + delay > policy.max_wait {
                debug!(
                    "Next poll delay {:?} would exceed max wait {:?}",
                    delay, policy.max_wait
                );
                break;
            }

            debug!("Poll attempt {} pending, sleeping {:?}", attempts, delay);
            sleeper.sleep(delay, cancel)?;
            waited += delay;
        }

        if cancel.is_cancelled() {
            return Err(TranscriptionError::Cancelled);
        }

        attempts += 1;
        if let PollStep::Done(value) = check(attempts)? {
            return Ok(value);
        }
        wait_next = true;
    }

    Err(TranscriptionError::PollTimeout { attempts, waited })
}
