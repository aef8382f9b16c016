// This file is part of rotorstat, a time-bucketed rotating stats store.
// Copyright (C) 2026 The rotorstat Authors; see AUTHORS and LICENSE.txt.
// SPDX-License-Identifier: GPL-v3.0-or-later

//! Clock interface and implementations for testability.
//!
//! The store crate's public operations all take an explicit `now_millis: i64`
//! rather than reading a clock themselves — no assumption of wall-clock vs
//! monotonic time is baked in; the caller chooses. This module exists so
//! callers and tests have a consistent, swappable source for that value.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Abstract interface to the system clock. Implement this for testability;
/// production code uses [`RealClocks`].
pub trait Clocks: Send + Sync + 'static {
    /// Returns the current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Sleeps the calling thread for the given duration (or advances a
    /// simulated clock by the same amount, for test implementations).
    fn sleep(&self, how_long: Duration);
}

#[derive(Copy, Clone, Default)]
pub struct RealClocks {}

impl Clocks for RealClocks {
    fn now_millis(&self) -> i64 {
        jiff::Timestamp::now().as_millisecond()
    }

    fn sleep(&self, how_long: Duration) {
        std::thread::sleep(how_long);
    }
}

/// Logs a warning if the guarded operation takes "too long", using the label
/// returned by `label_f`.
pub struct TimerGuard<'a, C: Clocks + ?Sized, S: AsRef<str>, F: FnOnce() -> S + 'a> {
    clocks: &'a C,
    label_f: Option<F>,
    start_millis: i64,
}

impl<'a, C: Clocks + ?Sized, S: AsRef<str>, F: FnOnce() -> S + 'a> TimerGuard<'a, C, S, F> {
    pub fn new(clocks: &'a C, label_f: F) -> Self {
        TimerGuard {
            clocks,
            label_f: Some(label_f),
            start_millis: clocks.now_millis(),
        }
    }
}

impl<'a, C, S, F> Drop for TimerGuard<'a, C, S, F>
where
    C: Clocks + ?Sized,
    S: AsRef<str>,
    F: FnOnce() -> S + 'a,
{
    fn drop(&mut self) {
        let elapsed_ms = self.clocks.now_millis() - self.start_millis;
        if elapsed_ms >= 1000 {
            let label_f = self.label_f.take().unwrap();
            warn!("{} took {} ms", label_f().as_ref(), elapsed_ms);
        }
    }
}

/// Simulated clock for deterministic rotation-timing tests. `now_millis`
/// starts at the `start_millis` given to [`SimulatedClocks::new`] and only
/// advances when `sleep` is called — never from wall-clock time.
#[derive(Clone)]
pub struct SimulatedClocks(Arc<Mutex<i64>>);

impl SimulatedClocks {
    pub fn new(start_millis: i64) -> Self {
        SimulatedClocks(Arc::new(Mutex::new(start_millis)))
    }

    /// Sets the simulated clock to an absolute value, which may move it
    /// forward or backward; useful for scenario tests with literal timestamps.
    pub fn set(&self, millis: i64) {
        *self.0.lock().unwrap() = millis;
    }
}

impl Clocks for SimulatedClocks {
    fn now_millis(&self) -> i64 {
        *self.0.lock().unwrap()
    }

    fn sleep(&self, how_long: Duration) {
        let mut l = self.0.lock().unwrap();
        *l += how_long.as_millis() as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_clocks_advance_only_on_sleep() {
        let c = SimulatedClocks::new(1_000);
        assert_eq!(c.now_millis(), 1_000);
        c.sleep(Duration::from_millis(500));
        assert_eq!(c.now_millis(), 1_500);
        c.set(9_999);
        assert_eq!(c.now_millis(), 9_999);
    }
}
