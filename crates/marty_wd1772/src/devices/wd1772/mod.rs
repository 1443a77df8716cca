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

    devices::wd1772::mod.rs

    Implementation of the Western Digital WD1772 floppy disk controller.

    The controller is event driven. It never blocks: whenever it has to wait it records
    the sub-state to resume into and either arms one of its timers or waits for an index
    pulse. The host schedules the controller by calling timer_fire() when next_event()
    comes due, index_callback() on each index edge of the selected drive, and read() and
    write() for register accesses.

    Three state machines are layered here:
    - the main state, which command is executing
    - the sub state, which phase of that command is executing
    - the live state, the bit-level decoder (see live.rs)
*/

pub mod command;
mod live;
pub mod pll;
mod registers;
mod sequencer;

#[cfg(test)]
mod tests;

use std::rc::Rc;

use marty_common::{HistoryBuffer, SimTime};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::{
    config::Wd1772Config,
    device_traits::{FdcLines, SharedMedium},
};

use live::LiveInfo;
pub use live::LiveState;

// Register offsets
pub const WD1772_REG_COMMAND: u16 = 0;
pub const WD1772_REG_STATUS: u16 = 0;
pub const WD1772_REG_TRACK: u16 = 1;
pub const WD1772_REG_SECTOR: u16 = 2;
pub const WD1772_REG_DATA: u16 = 3;

// Status register bits
// --------------------------------------------------------------------------------
// Several bits are shared between type I (seek family) and type II/III commands.
pub const S_BUSY: u8 = 0b0000_0001;
pub const S_DRQ: u8 = 0b0000_0010;
pub const S_IP: u8 = 0b0000_0010;
pub const S_TR00: u8 = 0b0000_0100;
pub const S_LOST: u8 = 0b0000_0100;
pub const S_CRC: u8 = 0b0000_1000;
pub const S_RNF: u8 = 0b0001_0000;
pub const S_SPIN: u8 = 0b0010_0000;
pub const S_DDM: u8 = 0b0010_0000;
pub const S_WP: u8 = 0b0100_0000;
pub const S_MON: u8 = 0b1000_0000;

// Register commit delays, in controller clocks.
pub const CMD_COMMIT_CYCLES_DDEN: u32 = 384;
pub const CMD_COMMIT_CYCLES: u32 = 184;
pub const REG_COMMIT_CYCLES_DDEN: u32 = 256;
pub const REG_COMMIT_CYCLES: u32 = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
pub enum TimerId {
    Generic,
    Command,
    Track,
    Sector,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, IntoStaticStr)]
pub enum MainState {
    #[default]
    Idle,
    Restore,
    Seek,
    Step,
    ReadSector,
    ReadTrack,
    ReadId,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, IntoStaticStr)]
pub enum SubState {
    #[default]
    Idle,
    SpinUp,
    SpinUpWait,
    SpinUpDone,
    SeekMove,
    SeekWaitStepTime,
    SeekWaitStepTimeDone,
    SeekWaitStabilizationTime,
    SeekWaitStabilizationTimeDone,
    SeekDone,
    WaitIndex,
    WaitIndexDone,
    ScanId,
    ScanIdFailed,
    SectorRead,
    ReadId,
    TrackDone,
}

#[derive(Clone, Debug, Default)]
pub struct Wd1772DebugState {
    pub main_state: MainState,
    pub sub_state: SubState,
    pub live_state: LiveState,
    pub live_time: SimTime,
    pub command: u8,
    pub status: u8,
    pub track: u8,
    pub sector: u8,
    pub data: u8,
    pub intrq: bool,
    pub drq: bool,
    pub dden: bool,
    pub motor_on: bool,
    pub timers: Vec<(TimerId, SimTime)>,
    pub cmd_log: Vec<String>,
}

pub struct Wd1772 {
    config: Wd1772Config,
    floppy: Option<SharedMedium>,
    lines: Box<dyn FdcLines>,
    now: SimTime,

    dden: bool,
    command: u8,
    main_state: MainState,
    sub_state: SubState,
    track: u8,
    sector: u8,
    data: u8,
    status: u8,
    cmd_buffer: Option<u8>,
    track_buffer: Option<u8>,
    sector_buffer: Option<u8>,

    intrq: bool,
    drq: bool,
    intrq_cond: u8,
    status_type_1: bool,
    motor_timeout: u32,
    sector_size: usize,
    last_dir: bool, // true = outward, toward track 0
    counter: u32,

    timers: [SimTime; 4],

    cur_live: LiveInfo,
    checkpoint_live: LiveInfo,

    cmd_log: HistoryBuffer<String>,
}

impl Wd1772 {
    pub fn new(config: Wd1772Config, lines: Box<dyn FdcLines>) -> Self {
        let cmd_log = HistoryBuffer::new(config.history_len);
        let mut fdc = Self {
            config,
            floppy: None,
            lines,
            now: SimTime::ZERO,

            dden: false,
            command: 0,
            main_state: MainState::Idle,
            sub_state: SubState::Idle,
            track: 0,
            sector: 0,
            data: 0,
            status: 0,
            cmd_buffer: None,
            track_buffer: None,
            sector_buffer: None,

            intrq: false,
            drq: false,
            intrq_cond: 0,
            status_type_1: true,
            motor_timeout: 0,
            sector_size: 0,
            last_dir: true,
            counter: 0,

            timers: [SimTime::NEVER; 4],

            cur_live: LiveInfo::default(),
            checkpoint_live: LiveInfo::default(),

            cmd_log,
        };
        fdc.cur_live.pll.set_clock(fdc.config.cell_period());
        fdc.checkpoint();
        fdc
    }

    /// Hard reset. Registers are cleared and any command in flight is abandoned.
    /// The selected drive and the DDEN pin are external and survive a reset.
    pub fn reset(&mut self) {
        log::debug!("WD1772: reset");
        self.command = 0;
        self.main_state = MainState::Idle;
        self.sub_state = SubState::Idle;
        self.live_abort();
        self.checkpoint();
        if self.status & S_MON != 0 {
            if let Some(floppy) = &self.floppy {
                floppy.borrow_mut().mon_w(false);
            }
        }
        self.track = 0;
        self.sector = 0;
        self.data = 0;
        self.status = 0;
        self.cmd_buffer = None;
        self.track_buffer = None;
        self.sector_buffer = None;
        self.counter = 0;
        self.intrq_cond = 0;
        self.status_type_1 = true;
        self.motor_timeout = 0;
        self.last_dir = true;
        self.timers = [SimTime::NEVER; 4];
        self.drop_drq();
        self.clear_intrq();
        self.cmd_log.clear();
    }

    /// Select a drive, or none. The previously selected drive has its motor line released;
    /// the new drive follows the controller's motor-on output.
    pub fn set_floppy(&mut self, floppy: Option<SharedMedium>) {
        let same = match (&self.floppy, &floppy) {
            (Some(old), Some(new)) => Rc::ptr_eq(old, new),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }

        if let Some(old) = &self.floppy {
            old.borrow_mut().mon_w(false);
        }
        self.floppy = floppy;
        if let Some(new) = &self.floppy {
            new.borrow_mut().mon_w(self.status & S_MON != 0);
        }
        log::debug!("WD1772: drive {}", if self.floppy.is_some() { "selected" } else { "deselected" });
    }

    /// Double density enable pin. Only affects register commit delays.
    pub fn dden_w(&mut self, dden: bool) {
        self.dden = dden;
    }

    #[inline]
    pub fn intrq_r(&self) -> bool {
        self.intrq
    }

    #[inline]
    pub fn drq_r(&self) -> bool {
        self.drq
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.status & S_BUSY != 0
    }

    /// A command register write has not committed yet.
    #[inline]
    pub fn command_pending(&self) -> bool {
        self.cmd_buffer.is_some()
    }

    #[inline]
    pub fn main_state(&self) -> MainState {
        self.main_state
    }

    #[inline]
    pub fn sub_state(&self) -> SubState {
        self.sub_state
    }

    #[inline]
    pub fn live_state(&self) -> LiveState {
        self.cur_live.state
    }

    #[inline]
    pub fn live_time(&self) -> SimTime {
        self.cur_live.tm
    }

    #[inline]
    pub fn config(&self) -> &Wd1772Config {
        &self.config
    }

    /// Return the earliest armed timer. Ties resolve in [TimerId] order.
    pub fn next_event(&self) -> Option<(TimerId, SimTime)> {
        let mut next: Option<(TimerId, SimTime)> = None;
        for id in TimerId::iter() {
            let t = self.timers[id as usize];
            if t.is_never() {
                continue;
            }
            match next {
                Some((_, nt)) if nt <= t => {}
                _ => next = Some((id, t)),
            }
        }
        next
    }

    /// Deliver an expired timer.
    pub fn timer_fire(&mut self, id: TimerId, now: SimTime) {
        self.now = now;
        self.timers[id as usize] = SimTime::NEVER;
        self.live_sync();

        match id {
            TimerId::Generic => self.do_generic(),
            TimerId::Command => self.do_cmd_w(),
            TimerId::Track => self.do_track_w(),
            TimerId::Sector => self.do_sector_w(),
        }

        self.general_continue();
    }

    /// Fire every timer due at or before `until`, in time order.
    /// Index edges are not generated here; the host delivers those through index_callback().
    pub fn run_until(&mut self, until: SimTime) {
        while let Some((id, at)) = self.next_event() {
            if at > until {
                break;
            }
            self.timer_fire(id, at);
        }
        self.now = self.now.max(until);
    }

    pub fn debug_state(&self) -> Wd1772DebugState {
        Wd1772DebugState {
            main_state: self.main_state,
            sub_state: self.sub_state,
            live_state: self.cur_live.state,
            live_time: self.cur_live.tm,
            command: self.command,
            status: self.status,
            track: self.track,
            sector: self.sector,
            data: self.data,
            intrq: self.intrq,
            drq: self.drq,
            dden: self.dden,
            motor_on: self.status & S_MON != 0,
            timers: TimerId::iter()
                .filter(|id| !self.timers[*id as usize].is_never())
                .map(|id| (id, self.timers[id as usize]))
                .collect(),
            cmd_log: self.cmd_log.as_vec(),
        }
    }

    #[inline]
    fn arm_timer(&mut self, id: TimerId, cycles: u32) {
        let at = self.now + self.config.cycles(cycles);
        self.arm_timer_at(id, at);
    }

    #[inline]
    fn arm_timer_at(&mut self, id: TimerId, at: SimTime) {
        self.timers[id as usize] = at;
    }

    #[inline]
    fn disarm_timer(&mut self, id: TimerId) {
        self.timers[id as usize] = SimTime::NEVER;
    }

    fn set_intrq(&mut self) {
        if !self.intrq {
            self.intrq = true;
            self.lines.intrq_w(true);
        }
    }

    fn clear_intrq(&mut self) {
        if self.intrq {
            self.intrq = false;
            self.lines.intrq_w(false);
        }
    }

    /// Present a byte to the host. A byte the host never collected is lost.
    fn set_drq(&mut self) {
        if self.drq {
            self.status |= S_LOST;
        }
        else {
            self.drq = true;
            self.lines.drq_w(true);
        }
    }

    fn drop_drq(&mut self) {
        if self.drq {
            self.drq = false;
            self.lines.drq_w(false);
        }
    }

    fn log_str(&mut self, s: &str) {
        self.cmd_log.push(format!("{}: {}", self.now, s));
        log::debug!("WD1772: {}", s);
    }
}
