#![forbid(unsafe_code)]

//! Trailing-edge debounce.
//!
//! A [`DebounceScheduler`] holds at most one pending payload. Every
//! `schedule` replaces the payload and restarts the quiet period, so a burst
//! of calls closer together than the delay fires exactly once, carrying the
//! last payload.
//!
//! The scheduler owns no timer thread. The host drives it with `poll_at`
//! from its event loop and can size its wait with `time_until_fire`. The
//! `*_at` variants take an explicit `Instant` so tests never sleep.
//!
//! # Invariants
//!
//! 1. At most one payload is pending.
//! 2. A payload fires no earlier than `delay` after the last `schedule`.
//! 3. After `dispose`, nothing is accepted and nothing fires.

use std::time::{Duration, Instant};

use tracing::trace;

#[derive(Debug)]
struct Pending<T> {
    payload: T,
    scheduled_at: Instant,
}

/// Coalesces rapid triggers into one delayed trigger.
#[derive(Debug)]
pub struct DebounceScheduler<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
    disposed: bool,
    fired: u64,
}

impl<T> DebounceScheduler<T> {
    /// Create a scheduler with quiet period `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            disposed: false,
            fired: 0,
        }
    }

    /// Quiet period.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `payload`, replacing any pending one.
    ///
    /// Returns `false` (and drops the payload) once disposed.
    pub fn schedule(&mut self, payload: T) -> bool {
        self.schedule_at(payload, Instant::now())
    }

    /// Schedule `payload` as of `now`.
    pub fn schedule_at(&mut self, payload: T, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        if self.pending.is_some() {
            trace!("debounce restarted");
        }
        self.pending = Some(Pending {
            payload,
            scheduled_at: now,
        });
        true
    }

    /// Fire if the quiet period has elapsed.
    pub fn poll(&mut self) -> Option<T> {
        self.poll_at(Instant::now())
    }

    /// Fire if the quiet period has elapsed as of `now`.
    pub fn poll_at(&mut self, now: Instant) -> Option<T> {
        let scheduled_at = self.pending.as_ref()?.scheduled_at;
        if now.saturating_duration_since(scheduled_at) < self.delay {
            return None;
        }
        let pending = self.pending.take()?;
        self.fired += 1;
        trace!(fired = self.fired, "debounce fired");
        Some(pending.payload)
    }

    /// Fire immediately regardless of elapsed time.
    pub fn flush(&mut self) -> Option<T> {
        let pending = self.pending.take()?;
        self.fired += 1;
        Some(pending.payload)
    }

    /// Discard the pending payload, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Cancel and refuse all future scheduling.
    pub fn dispose(&mut self) {
        self.pending = None;
        self.disposed = true;
    }

    /// Whether a payload is waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether `dispose` was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// How many payloads have fired over the scheduler's lifetime.
    #[must_use]
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    /// Remaining quiet time as of `now`, if a payload is pending.
    #[must_use]
    pub fn time_until_fire(&self, now: Instant) -> Option<Duration> {
        let pending = self.pending.as_ref()?;
        let elapsed = now.saturating_duration_since(pending.scheduled_at);
        Some(self.delay.saturating_sub(elapsed))
    }
}
