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

    devices::wd1772::pll.rs

    Digital data separator.

    Each bit cell is walked in fourteen sub-slots. On every sub-slot an 11-bit phase
    counter is advanced by the current frequency increment, biased during the first eight
    sub-slots by the phase and frequency masks computed from the previous bit. When the
    counter carries into bit 11 a cell is complete, and it reads as a one if a flux
    transition was seen inside it. Where in the window the transition landed decides how
    the next cell's masks nudge phase and frequency, so the separator follows drift
    gradually instead of snapping to each transition.
*/

use marty_common::SimTime;

use crate::device_traits::FloppyMedium;

/// Number of precomputed sub-slot delays. A cell never needs more than 22 sub-slots.
pub const PLL_SLOTS: usize = 42;
pub const PLL_SUBSLOTS_PER_CELL: u64 = 14;

pub const PLL_INCREMENT_RESET: u16 = 146;
pub const PLL_INCREMENT_MIN: u16 = 134;
pub const PLL_INCREMENT_MAX: u16 = 159;
const PLL_PHASE_ADD_STEP: u16 = 258;
const PLL_PHASE_SUB_STEP: u16 = 34;
const PLL_WINDOW_CARRY: u16 = 0x800;
const PLL_NO_TRANSITION: u16 = 0xFFFF;

static PHASE_ADD: [u8; 8] = [0xf, 0x7, 0x3, 0x1, 0, 0, 0, 0];
static PHASE_SUB: [u8; 8] = [0, 0, 0, 0, 0x1, 0x3, 0x7, 0xf];
static FREQ_ADD: [[u8; 8]; 4] = [
    [0xf, 0x7, 0x3, 0x1, 0, 0, 0, 0],
    [0x7, 0x3, 0x1, 0, 0, 0, 0, 0],
    [0x7, 0x3, 0x1, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0, 0, 0],
];
static FREQ_SUB: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0x1, 0x3, 0x7],
    [0, 0, 0, 0, 0, 0x1, 0x3, 0x7],
    [0, 0, 0, 0, 0x1, 0x3, 0x7, 0xf],
];

#[derive(Clone, Debug)]
pub struct Pll {
    counter: u16,
    increment: u16,
    transition_time: u16,
    history: u8,
    slot: usize,
    ctime: SimTime,
    phase_add: u8,
    phase_sub: u8,
    freq_add: u8,
    freq_sub: u8,
    delays: [SimTime; PLL_SLOTS],
}

impl Default for Pll {
    fn default() -> Self {
        Self {
            counter: 0,
            increment: PLL_INCREMENT_RESET,
            transition_time: PLL_NO_TRANSITION,
            history: 0x80,
            slot: 0,
            ctime: SimTime::NEVER,
            phase_add: 0,
            phase_sub: 0,
            freq_add: 0,
            freq_sub: 0,
            delays: [SimTime::ZERO; PLL_SLOTS],
        }
    }
}

impl Pll {
    pub fn new(period: SimTime) -> Self {
        let mut pll = Pll::default();
        pll.set_clock(period);
        pll
    }

    /// Precompute sub-slot offsets for a cell of `period`.
    pub fn set_clock(&mut self, period: SimTime) {
        for (i, delay) in self.delays.iter_mut().enumerate() {
            *delay = period.scale(i as u64 + 1, PLL_SUBSLOTS_PER_CELL);
        }
    }

    pub fn reset(&mut self, when: SimTime) {
        self.counter = 0;
        self.increment = PLL_INCREMENT_RESET;
        self.transition_time = PLL_NO_TRANSITION;
        self.history = 0x80;
        self.slot = 0;
        self.ctime = when;
        self.phase_add = 0;
        self.phase_sub = 0;
        self.freq_add = 0;
        self.freq_sub = 0;
    }

    #[inline]
    pub fn increment(&self) -> u16 {
        self.increment
    }

    /// Clock the next cell out of the medium.
    ///
    /// `tm` is advanced to the time of each sub-slot as it is consumed. Returns `None` if
    /// the cell would extend past `limit`; partial progress is kept so that a later call
    /// resumes the same cell.
    pub fn get_next_bit(&mut self, tm: &mut SimTime, floppy: Option<&dyn FloppyMedium>, limit: SimTime) -> Option<bool> {
        let when = floppy.map_or(SimTime::NEVER, |f| f.get_next_transition(self.ctime));

        loop {
            debug_assert!(self.slot < PLL_SLOTS, "pll slot overrun");
            let etime = self.ctime + self.delays[self.slot.min(PLL_SLOTS - 1)];
            if etime > limit {
                return None;
            }
            if self.transition_time == PLL_NO_TRANSITION && !when.is_never() && etime >= when {
                self.transition_time = self.counter;
            }
            if self.slot < 8 {
                let mask = 1u8 << self.slot;
                if self.phase_add & mask != 0 {
                    self.counter += PLL_PHASE_ADD_STEP;
                }
                else if self.phase_sub & mask != 0 {
                    self.counter += PLL_PHASE_SUB_STEP;
                }
                else {
                    self.counter += self.increment;
                }

                if (self.freq_add & mask != 0) && self.increment < PLL_INCREMENT_MAX {
                    self.increment += 1;
                }
                else if (self.freq_sub & mask != 0) && self.increment > PLL_INCREMENT_MIN {
                    self.increment -= 1;
                }
            }
            else {
                self.counter += self.increment;
            }

            self.slot += 1;
            *tm = etime;
            if self.counter & PLL_WINDOW_CARRY != 0 {
                break;
            }
        }

        let bit = self.transition_time != PLL_NO_TRANSITION;
        if bit {
            let cslot = (self.transition_time >> 8) as usize & 7;
            self.phase_add = PHASE_ADD[cslot];
            self.phase_sub = PHASE_SUB[cslot];
            let late = self.transition_time & 0x400 != 0;
            if self.history & 0x80 != 0 {
                self.history = if late { 0x80 } else { 0x83 };
            }
            else if self.history & 0x40 != 0 {
                self.history = if late { self.history & 2 } else { (self.history & 2) | 1 };
            }
            let hidx = (self.history & 3) as usize;
            self.freq_add = FREQ_ADD[hidx][cslot];
            self.freq_sub = FREQ_SUB[hidx][cslot];
            self.history = if late { (self.history >> 1) | 2 } else { self.history >> 1 };
        }
        else {
            self.phase_add = 0;
            self.phase_sub = 0;
            self.freq_add = 0;
            self.freq_sub = 0;
        }

        self.counter &= PLL_WINDOW_CARRY - 1;
        self.ctime = *tm;
        self.transition_time = PLL_NO_TRANSITION;
        self.slot = 0;

        Some(bit)
    }
}
