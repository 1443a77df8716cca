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

    test_drive.rs

    A synthetic floppy drive for exercising the controller without a disk image layer.

    Tracks are built cell by cell with MfmTrackBuilder and stored as flux transition
    offsets from the index pulse. The disk is always turning at a fixed revolution
    time; the head steps on the rising edge of the step line like a real drive.

    TestBench wires a controller to such a drive and runs both on one event loop,
    delivering controller timers and index edges in time order.
*/

use std::{cell::RefCell, rc::Rc};

use marty_common::SimTime;

use crate::{
    config::Wd1772Config,
    device_traits::{FdcLines, FloppyMedium, SharedMedium},
    devices::wd1772::{LiveState, MainState, Wd1772},
    mfm::{
        crc_ccitt,
        encode_byte,
        CRC_INIT,
        DATA_ADDRESS_MARK,
        GAP_BYTE,
        ID_ADDRESS_MARK,
        INDEX_ADDRESS_MARK,
        MFM_SYNC_A1,
        MFM_SYNC_C2,
    },
};

pub const TEST_CELL_NS: u64 = 2_000;
/// 25000 cells of 2us is one revolution at 1200 rpm, which keeps test runs short.
pub const TEST_TRACK_CELLS: usize = 25_000;
pub const TEST_INDEX_WIDTH_US: u64 = 2_000;
pub const TEST_MAX_CYLINDER: u8 = 83;

#[derive(Clone, Default)]
pub struct MfmTrackBuilder {
    cells: Vec<bool>,
    prev_bit: bool,
}

impl MfmTrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_ct(&self) -> usize {
        self.cells.len()
    }

    fn raw(&mut self, cells: u16) -> &mut Self {
        for i in (0..16).rev() {
            self.cells.push((cells >> i) & 1 != 0);
        }
        self.prev_bit = cells & 1 != 0;
        self
    }

    pub fn bytes(&mut self, byte: u8, count: usize) -> &mut Self {
        for _ in 0..count {
            let cells = encode_byte(byte, self.prev_bit);
            self.raw(cells);
        }
        self
    }

    pub fn data(&mut self, data: &[u8]) -> &mut Self {
        for byte in data {
            self.bytes(*byte, 1);
        }
        self
    }

    pub fn sync_a1(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.raw(MFM_SYNC_A1);
        }
        self
    }

    pub fn sync_c2(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.raw(MFM_SYNC_C2);
        }
        self
    }

    /// Gap, sync and an address-marked field with its CRC. A bad CRC is made by flipping
    /// the low bit of the correct one.
    fn field(&mut self, body: &[u8], bad_crc: bool) -> &mut Self {
        self.bytes(GAP_BYTE, 22).bytes(0x00, 12).sync_a1(3);
        let mut crc = crc_ccitt(CRC_INIT, &[0xA1, 0xA1, 0xA1]);
        crc = crc_ccitt(crc, body);
        if bad_crc {
            crc ^= 0x0001;
        }
        self.data(body).data(&crc.to_be_bytes())
    }

    /// Post-index gap followed by the C2-synced index address mark.
    pub fn index_field(&mut self) -> &mut Self {
        self.bytes(GAP_BYTE, 80)
            .bytes(0x00, 12)
            .sync_c2(3)
            .bytes(INDEX_ADDRESS_MARK, 1)
    }

    pub fn id_field(&mut self, c: u8, h: u8, s: u8, n: u8, bad_crc: bool) -> &mut Self {
        self.field(&[ID_ADDRESS_MARK, c, h, s, n], bad_crc)
    }

    pub fn data_field(&mut self, mark: u8, data: &[u8], bad_crc: bool) -> &mut Self {
        let mut body = Vec::with_capacity(data.len() + 1);
        body.push(mark);
        body.extend_from_slice(data);
        self.field(&body, bad_crc)
    }

    /// Pad with gap bytes, then empty cells, to exactly `cells` cells.
    pub fn fill_to(&mut self, cells: usize) -> &mut Self {
        while self.cells.len() + 16 <= cells {
            self.bytes(GAP_BYTE, 1);
        }
        while self.cells.len() < cells {
            self.cells.push(false);
        }
        self
    }

    /// Flux transition offsets from the start of the track, one at the start of each set cell.
    pub fn transitions(&self, cell: SimTime) -> Vec<SimTime> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(i, _)| SimTime::from_ps(cell.as_ps() * i as u64))
            .collect()
    }
}

/// Deterministic contents for sector `s` of cylinder `c`.
pub fn sector_pattern(c: u8, s: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32 * 7 + c as u32 * 13 + s as u32 * 29) as u8)
        .collect()
}

/// A track of `sectors` sectors of size code `n` with the standard data pattern.
pub fn format_track(c: u8, h: u8, sectors: &[u8], n: u8) -> MfmTrackBuilder {
    let len = 128usize << (n & 3);
    let mut track = MfmTrackBuilder::new();
    track.bytes(GAP_BYTE, 60);
    for s in sectors {
        track
            .id_field(c, h, *s, n, false)
            .data_field(DATA_ADDRESS_MARK, &sector_pattern(c, *s, len), false);
    }
    track.fill_to(TEST_TRACK_CELLS);
    track
}

pub struct SyntheticDrive {
    revolution: SimTime,
    index_width: SimTime,
    cell: SimTime,
    tracks: Vec<Vec<SimTime>>,
    pub cyl: u8,
    pub step_ct: u32,
    pub motor: bool,
    pub write_protect: bool,
    pub disk_present: bool,
    dir_outward: bool,
    stp: bool,
}

impl SyntheticDrive {
    pub fn new() -> Self {
        let cell = SimTime::from_ns(TEST_CELL_NS);
        Self {
            revolution: SimTime::from_ps(cell.as_ps() * TEST_TRACK_CELLS as u64),
            index_width: SimTime::from_us(TEST_INDEX_WIDTH_US),
            cell,
            tracks: Vec::new(),
            cyl: 0,
            step_ct: 0,
            motor: false,
            write_protect: false,
            disk_present: true,
            dir_outward: true,
            stp: false,
        }
    }

    /// A drive with every cylinder up to `cylinders` formatted with sectors 1..=`spt` of size code `n`.
    pub fn formatted(cylinders: u8, spt: u8, n: u8) -> Self {
        let mut drive = Self::new();
        let sectors: Vec<u8> = (1..=spt).collect();
        for c in 0..cylinders {
            drive.set_track(c, &format_track(c, 0, &sectors, n));
        }
        drive
    }

    pub fn revolution(&self) -> SimTime {
        self.revolution
    }

    pub fn set_track(&mut self, cyl: u8, track: &MfmTrackBuilder) {
        assert_eq!(track.cell_ct(), TEST_TRACK_CELLS, "track must fill one revolution");
        let cyl = cyl as usize;
        if self.tracks.len() <= cyl {
            self.tracks.resize(cyl + 1, Vec::new());
        }
        self.tracks[cyl] = track.transitions(self.cell);
    }

    pub fn into_shared(self) -> Rc<RefCell<SyntheticDrive>> {
        Rc::new(RefCell::new(self))
    }

    /// The next index edge strictly after `after`, and whether it is the leading edge.
    pub fn next_index_edge(&self, after: SimTime) -> Option<(SimTime, bool)> {
        if !self.disk_present {
            return None;
        }
        let rev = self.revolution.as_ps();
        let width = self.index_width.as_ps();
        let k = after.as_ps() / rev;
        let o = after.as_ps() % rev;
        if o < width {
            Some((SimTime::from_ps(k * rev + width), false))
        }
        else {
            Some((SimTime::from_ps((k + 1) * rev), true))
        }
    }
}

impl FloppyMedium for SyntheticDrive {
    fn get_next_transition(&self, from: SimTime) -> SimTime {
        if !self.disk_present || from.is_never() {
            return SimTime::NEVER;
        }
        let Some(offsets) = self.tracks.get(self.cyl as usize).filter(|t| !t.is_empty())
        else {
            return SimTime::NEVER;
        };
        let rev = self.revolution.as_ps();
        let k = from.as_ps() / rev;
        let o = SimTime::from_ps(from.as_ps() % rev);
        let i = offsets.partition_point(|t| *t <= o);
        if i < offsets.len() {
            SimTime::from_ps(k * rev + offsets[i].as_ps())
        }
        else {
            SimTime::from_ps((k + 1) * rev + offsets[0].as_ps())
        }
    }

    fn time_next_index(&self, now: SimTime) -> SimTime {
        if !self.disk_present {
            return SimTime::NEVER;
        }
        let rev = self.revolution.as_ps();
        SimTime::from_ps((now.as_ps() / rev + 1) * rev)
    }

    fn index_r(&self, now: SimTime) -> bool {
        self.disk_present && now.as_ps() % self.revolution.as_ps() < self.index_width.as_ps()
    }

    fn trk00_r(&self) -> bool {
        self.cyl == 0
    }

    fn wpt_r(&self) -> bool {
        self.write_protect
    }

    fn mon_w(&mut self, on: bool) {
        self.motor = on;
    }

    fn dir_w(&mut self, outward: bool) {
        self.dir_outward = outward;
    }

    fn stp_w(&mut self, state: bool) {
        if state && !self.stp {
            self.step_ct += 1;
            if self.dir_outward {
                self.cyl = self.cyl.saturating_sub(1);
            }
            else if self.cyl < TEST_MAX_CYLINDER {
                self.cyl += 1;
            }
        }
        self.stp = state;
    }
}

#[derive(Default)]
pub struct LineLog {
    pub intrq: bool,
    pub drq: bool,
    pub intrq_rises: u32,
    pub drq_rises: u32,
}

struct SharedLines(Rc<RefCell<LineLog>>);

impl FdcLines for SharedLines {
    fn intrq_w(&mut self, state: bool) {
        let mut log = self.0.borrow_mut();
        assert_ne!(log.intrq, state, "intrq_w called without a change");
        log.intrq = state;
        if state {
            log.intrq_rises += 1;
        }
    }

    fn drq_w(&mut self, state: bool) {
        let mut log = self.0.borrow_mut();
        assert_ne!(log.drq, state, "drq_w called without a change");
        log.drq = state;
        if state {
            log.drq_rises += 1;
        }
    }
}

/// A controller and a synthetic drive on one event loop.
pub struct TestBench {
    pub fdc: Wd1772,
    pub drive: Rc<RefCell<SyntheticDrive>>,
    pub lines: Rc<RefCell<LineLog>>,
    pub now: SimTime,
    /// Read the data register as soon as DRQ rises.
    pub auto_read: bool,
    pub received: Vec<u8>,
    /// Time INTRQ was last seen rising.
    pub intrq_time: Option<SimTime>,
    index_cursor: SimTime,
}

impl TestBench {
    pub fn new(drive: SyntheticDrive) -> Self {
        Self::with_config(Wd1772Config::default(), drive)
    }

    pub fn with_config(config: Wd1772Config, drive: SyntheticDrive) -> Self {
        let lines = Rc::new(RefCell::new(LineLog::default()));
        let mut fdc = Wd1772::new(config, Box::new(SharedLines(lines.clone())));
        let drive = drive.into_shared();
        let medium: SharedMedium = drive.clone();
        fdc.set_floppy(Some(medium));
        Self {
            fdc,
            drive,
            lines,
            now: SimTime::ZERO,
            auto_read: true,
            received: Vec::new(),
            intrq_time: None,
            index_cursor: SimTime::ZERO,
        }
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        self.fdc.read(reg, self.now)
    }

    pub fn write(&mut self, reg: u8, val: u8) {
        self.fdc.write(reg, val, self.now);
    }

    pub fn advance(&mut self, dt: SimTime) {
        let until = self.now + dt;
        self.run_until(until);
    }

    /// Process the next event at or before `until`. Timers win ties with index edges.
    pub fn step(&mut self, until: SimTime) -> bool {
        let timer = self.fdc.next_event();
        let edge = self.drive.borrow().next_index_edge(self.index_cursor);

        let take_timer = match (timer, edge) {
            (Some((_, tt)), Some((et, _))) => tt <= et,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return false,
        };

        let intrq_before = self.fdc.intrq_r();
        if take_timer {
            let Some((id, at)) = timer
            else {
                return false;
            };
            if at > until {
                return false;
            }
            assert!(at >= self.now, "timer {} armed in the past", id);
            self.now = at;
            self.fdc.timer_fire(id, at);
        }
        else {
            let Some((at, state)) = edge
            else {
                return false;
            };
            if at > until {
                return false;
            }
            self.now = at;
            self.index_cursor = at;
            self.fdc.index_callback(at, state);
        }

        if self.fdc.intrq_r() && !intrq_before {
            self.intrq_time = Some(self.now);
        }
        if self.auto_read && self.fdc.drq_r() {
            let byte = self.fdc.read(3, self.now);
            self.received.push(byte);
        }
        self.check_invariants();
        true
    }

    pub fn run_until(&mut self, until: SimTime) {
        while self.step(until) {}
        self.now = self.now.max(until);
    }

    /// Run until the controller is idle with no command pending. Returns false on timeout.
    pub fn run_until_idle(&mut self, timeout: SimTime) -> bool {
        let until = self.now + timeout;
        loop {
            if self.fdc.main_state() == MainState::Idle && !self.fdc.command_pending() {
                return true;
            }
            if !self.step(until) {
                self.now = self.now.max(until);
                return false;
            }
        }
    }

    /// Write a command and run it to completion.
    pub fn command(&mut self, cmd: u8, timeout: SimTime) -> bool {
        self.write(0, cmd);
        self.run_until_idle(timeout)
    }

    pub fn check_invariants(&self) {
        assert_eq!(
            self.fdc.is_busy(),
            self.fdc.main_state() != MainState::Idle,
            "BUSY disagrees with main state {}",
            self.fdc.main_state()
        );
        assert_eq!(
            self.fdc.live_state() == LiveState::Idle,
            self.fdc.live_time().is_never(),
            "live state {} at {}",
            self.fdc.live_state(),
            self.fdc.live_time()
        );
    }
}
