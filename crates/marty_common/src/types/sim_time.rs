/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    common::types::sim_time.rs

    Defines SimTime, an integer timestamp on the emulated timeline.
    Device models that must be able to replay their own progress deterministically
    (the WD1772 live decoder in particular) cannot use floating point microseconds,
    so time is kept as a count of picoseconds.
*/

use std::{
    fmt::Display,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};

pub const PS_PER_NS: u64 = 1_000;
pub const PS_PER_US: u64 = 1_000_000;
pub const PS_PER_MS: u64 = 1_000_000_000;
pub const PS_PER_SEC: u64 = 1_000_000_000_000;

/// A point on the emulated timeline, in picoseconds.
/// `SimTime::NEVER` is a sentinel for "no such event" and compares greater than any real time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const NEVER: SimTime = SimTime(u64::MAX);

    #[inline]
    pub const fn from_ps(ps: u64) -> Self {
        SimTime(ps)
    }
    #[inline]
    pub const fn from_ns(ns: u64) -> Self {
        SimTime(ns * PS_PER_NS)
    }
    #[inline]
    pub const fn from_us(us: u64) -> Self {
        SimTime(us * PS_PER_US)
    }
    #[inline]
    pub const fn from_ms(ms: u64) -> Self {
        SimTime(ms * PS_PER_MS)
    }

    /// Convert a count of device clock cycles at `clock_hz` into a duration.
    pub fn from_cycles(cycles: u64, clock_hz: u64) -> Self {
        if clock_hz == 0 {
            return SimTime::NEVER;
        }
        let ps = (cycles as u128 * PS_PER_SEC as u128) / clock_hz as u128;
        SimTime(ps.min((u64::MAX - 1) as u128) as u64)
    }

    #[inline]
    pub const fn as_ps(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_never(&self) -> bool {
        self.0 == u64::MAX
    }

    /// Scale a duration by `mul / div`, truncating. Used to split a bit cell into sub-slots.
    pub fn scale(self, mul: u64, div: u64) -> Self {
        if self.is_never() || div == 0 {
            return SimTime::NEVER;
        }
        let ps = (self.0 as u128 * mul as u128) / div as u128;
        SimTime(ps.min((u64::MAX - 1) as u128) as u64)
    }

}

impl Add for SimTime {
    type Output = SimTime;

    /// Adding anything to NEVER stays NEVER, and sums saturate just below it.
    fn add(self, rhs: SimTime) -> SimTime {
        if self.is_never() || rhs.is_never() {
            return SimTime::NEVER;
        }
        SimTime(self.0.saturating_add(rhs.0).min(u64::MAX - 1))
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        if self.is_never() {
            return SimTime::NEVER;
        }
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_never() {
            return write!(f, "never");
        }
        let secs = self.0 / PS_PER_SEC;
        let ns = (self.0 % PS_PER_SEC) / PS_PER_NS;
        write!(
            f,
            "{:4}.{:03},{:03},{:03}",
            secs,
            ns / 1_000_000,
            (ns / 1_000) % 1_000,
            ns % 1_000
        )
    }
}
