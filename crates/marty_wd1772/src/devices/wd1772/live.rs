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

    devices::wd1772::live.rs

    The bit-level "live" decoder and its checkpoint/rollback machinery.

    The live decoder free-runs ahead of emulated time, up to the next index pulse, as
    long as it only touches its own snapshot. Anything with an externally visible effect
    (presenting a byte and raising DRQ, finishing a field) is deferred with live_delay():
    the decoder parks on a pending state and arms the generic timer at the time the
    decoder reached. When that timer fires the pending state is committed and executed.

    If the host touches the controller at a time earlier than the decoder has reached,
    the snapshot is rolled back to the last checkpoint and replayed up to that time.
*/

use marty_common::SimTime;
use strum_macros::{Display, IntoStaticStr};

use super::{pll::Pll, SubState, TimerId, Wd1772};
use crate::{
    device_traits::FloppyMedium,
    mfm::{crc_ccitt_bit, CRC_INIT, CRC_SEED_A1, MFM_SYNC_A1, MFM_SYNC_C2},
};

/// How far to run when there is no index pulse to synchronize on.
pub const LIVE_NO_INDEX_SYNC_MS: u64 = 1;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Display, IntoStaticStr)]
pub enum LiveState {
    #[default]
    Idle,
    SearchAddressMark,
    ReadBlockHeader,
    ReadIdBlockToLocal,
    ReadIdBlockToDma,
    ReadIdBlockToDmaByte,
    ReadSectorData,
    ReadSectorDataByte,
    ReadTrackData,
    ReadTrackDataByte,
}

#[derive(Clone, Debug)]
pub struct LiveInfo {
    pub(crate) tm: SimTime,
    pub(crate) state: LiveState,
    pub(crate) next_state: Option<LiveState>,
    pub(crate) shift_reg: u16,
    pub(crate) data_reg: u16,
    pub(crate) crc: u16,
    pub(crate) bit_counter: u32,
    pub(crate) data_separator_phase: bool,
    pub(crate) deleted_mark: bool,
    pub(crate) idbuf: [u8; 6],
    pub(crate) pll: Pll,
}

impl Default for LiveInfo {
    fn default() -> Self {
        Self {
            tm: SimTime::NEVER,
            state: LiveState::Idle,
            next_state: None,
            shift_reg: 0,
            data_reg: 0,
            crc: CRC_INIT,
            bit_counter: 0,
            data_separator_phase: false,
            deleted_mark: false,
            idbuf: [0; 6],
            pll: Pll::default(),
        }
    }
}

#[inline]
fn is_sync(shift_reg: u16) -> bool {
    shift_reg == MFM_SYNC_A1 || shift_reg == MFM_SYNC_C2
}

impl LiveInfo {
    /// Shift in one cell from the data separator. Returns false if `limit` was reached first.
    ///
    /// Every cell goes into the raw shift register; only data-phase cells go into the data
    /// register and the CRC.
    fn read_one_bit(&mut self, floppy: Option<&dyn FloppyMedium>, limit: SimTime) -> bool {
        let Some(bit) = self.pll.get_next_bit(&mut self.tm, floppy, limit)
        else {
            return false;
        };
        self.shift_reg = (self.shift_reg << 1) | bit as u16;
        self.bit_counter += 1;
        if self.data_separator_phase {
            self.data_reg = (self.data_reg << 1) | bit as u16;
            self.crc = crc_ccitt_bit(self.crc, bit);
        }
        self.data_separator_phase = !self.data_separator_phase;
        true
    }

    /// Realign on a sync pattern. A1 restarts the CRC as if the sync byte had just been read.
    fn sync_realign(&mut self) {
        if self.shift_reg == MFM_SYNC_A1 {
            self.crc = CRC_SEED_A1;
        }
        self.data_separator_phase = false;
        self.bit_counter = 0;
    }

    #[inline]
    fn data_byte(&self) -> u8 {
        self.data_reg as u8
    }
}

impl Wd1772 {
    pub(crate) fn live_start(&mut self, state: LiveState) {
        let live = &mut self.cur_live;
        live.tm = self.now;
        live.state = state;
        live.next_state = None;
        live.shift_reg = 0;
        live.crc = CRC_INIT;
        live.bit_counter = 0;
        live.data_separator_phase = false;
        live.deleted_mark = false;
        live.data_reg = 0;
        live.pll.reset(self.now);
        live.pll.set_clock(self.config.cell_period());
        self.checkpoint();

        self.live_run(SimTime::NEVER);
    }

    #[inline]
    pub(crate) fn checkpoint(&mut self) {
        self.checkpoint_live = self.cur_live.clone();
    }

    #[inline]
    pub(crate) fn rollback(&mut self) {
        self.cur_live = self.checkpoint_live.clone();
    }

    /// Park the decoder on `state` until emulated time catches up with it.
    fn live_delay(&mut self, state: LiveState) {
        self.cur_live.next_state = Some(state);
        let at = self.cur_live.tm.max(self.now);
        self.arm_timer_at(TimerId::Generic, at);
    }

    /// Bring the live snapshot to the current time: commit a pending state if its time
    /// has come, or roll back and replay if the decoder ran past the current time.
    pub(crate) fn live_sync(&mut self) {
        if self.cur_live.tm.is_never() {
            return;
        }
        if self.cur_live.tm > self.now {
            log::trace!(
                "live_sync(): rolling back from {} and replaying to {}",
                self.cur_live.tm,
                self.now
            );
            self.rollback();
            self.live_run(self.now);
        }
        else {
            if let Some(next_state) = self.cur_live.next_state {
                self.cur_live.state = next_state;
            }
            if self.cur_live.state == LiveState::Idle {
                self.cur_live.tm = SimTime::NEVER;
            }
        }
        self.cur_live.next_state = None;
        self.checkpoint();
    }

    pub(crate) fn live_abort(&mut self) {
        if !self.cur_live.tm.is_never() {
            // Whatever the generic timer was armed for belonged to the decoder.
            self.disarm_timer(TimerId::Generic);
        }
        self.cur_live.tm = SimTime::NEVER;
        self.cur_live.state = LiveState::Idle;
        self.cur_live.next_state = None;
    }

    /// Run the decoder until `limit`, a deferred state, or the end of the field.
    /// A `limit` of NEVER means "up to the next index pulse".
    pub(crate) fn live_run(&mut self, limit: SimTime) {
        if self.cur_live.state == LiveState::Idle || self.cur_live.next_state.is_some() {
            return;
        }

        let mut limit = limit;
        if limit.is_never() {
            if let Some(floppy) = &self.floppy {
                limit = floppy.borrow().time_next_index(self.now);
            }
            if limit.is_never() {
                // No disk, or no drive attached: no index pulse will ever come to
                // synchronize on, so force one periodically.
                limit = self.now + SimTime::from_ms(LIVE_NO_INDEX_SYNC_MS);
                self.arm_timer_at(TimerId::Generic, limit);
            }
        }

        let floppy_handle = self.floppy.clone();
        let floppy_ref = floppy_handle.as_ref().map(|f| f.borrow());
        let floppy = floppy_ref.as_deref();

        loop {
            match self.cur_live.state {
                LiveState::Idle => {
                    return;
                }

                LiveState::SearchAddressMark => {
                    if !self.cur_live.read_one_bit(floppy, limit) {
                        return;
                    }
                    if is_sync(self.cur_live.shift_reg) {
                        self.cur_live.sync_realign();
                        self.cur_live.state = LiveState::ReadBlockHeader;
                    }
                }

                LiveState::ReadBlockHeader => {
                    if !self.cur_live.read_one_bit(floppy, limit) {
                        return;
                    }
                    if self.cur_live.bit_counter != 16 {
                        if is_sync(self.cur_live.shift_reg) {
                            self.cur_live.sync_realign();
                        }
                        continue;
                    }

                    self.cur_live.bit_counter = 0;
                    if is_sync(self.cur_live.shift_reg) {
                        // Another sync byte in the A1 A1 A1 run.
                        continue;
                    }

                    self.cur_live.state = match self.cur_live.data_reg & 0xfe {
                        0xfa | 0xf8 if self.sub_state == SubState::SectorRead => {
                            self.cur_live.deleted_mark = self.cur_live.data_reg & 0xfe == 0xf8;
                            LiveState::ReadSectorData
                        }
                        0xfe if self.sub_state == SubState::ScanId => LiveState::ReadIdBlockToLocal,
                        0xfe if self.sub_state == SubState::ReadId => LiveState::ReadIdBlockToDma,
                        _ => LiveState::SearchAddressMark,
                    };
                }

                LiveState::ReadIdBlockToLocal => {
                    if !self.cur_live.read_one_bit(floppy, limit) {
                        return;
                    }
                    if self.cur_live.bit_counter & 15 != 0 {
                        continue;
                    }
                    let slot = (self.cur_live.bit_counter >> 4) as usize - 1;
                    self.cur_live.idbuf[slot] = self.cur_live.data_byte();
                    if slot == 5 {
                        self.live_delay(LiveState::Idle);
                        return;
                    }
                }

                LiveState::ReadIdBlockToDma => {
                    if !self.cur_live.read_one_bit(floppy, limit) {
                        return;
                    }
                    if self.cur_live.bit_counter & 15 != 0 {
                        continue;
                    }
                    self.live_delay(LiveState::ReadIdBlockToDmaByte);
                    return;
                }

                LiveState::ReadIdBlockToDmaByte => {
                    let slot = (self.cur_live.bit_counter >> 4) as usize - 1;
                    self.data = self.cur_live.data_byte();
                    self.cur_live.idbuf[slot] = self.data;
                    if slot == 0 {
                        // The track address of the ID field is also loaded into the sector register.
                        self.sector = self.data;
                    }
                    self.set_drq();
                    if slot == 5 {
                        self.live_delay(LiveState::Idle);
                        return;
                    }
                    self.cur_live.state = LiveState::ReadIdBlockToDma;
                    self.checkpoint();
                }

                LiveState::ReadSectorData => {
                    if !self.cur_live.read_one_bit(floppy, limit) {
                        return;
                    }
                    if self.cur_live.bit_counter & 15 != 0 {
                        continue;
                    }
                    let slot = (self.cur_live.bit_counter >> 4) as usize - 1;
                    if slot < self.sector_size {
                        self.live_delay(LiveState::ReadSectorDataByte);
                        return;
                    }
                    else if slot == self.sector_size + 1 {
                        // Both CRC bytes are in.
                        self.live_delay(LiveState::Idle);
                        return;
                    }
                }

                LiveState::ReadSectorDataByte => {
                    self.data = self.cur_live.data_byte();
                    self.set_drq();
                    self.cur_live.state = LiveState::ReadSectorData;
                    self.checkpoint();
                }

                LiveState::ReadTrackData => {
                    if !self.cur_live.read_one_bit(floppy, limit) {
                        return;
                    }
                    if self.cur_live.bit_counter != 16 && !is_sync(self.cur_live.shift_reg) {
                        continue;
                    }

                    // A sync mark a handful of cells into a byte realigns without
                    // presenting the partial byte.
                    let output_byte = self.cur_live.bit_counter > 5;
                    self.cur_live.data_separator_phase = false;
                    self.cur_live.bit_counter = 0;

                    if output_byte {
                        self.live_delay(LiveState::ReadTrackDataByte);
                        return;
                    }
                }

                LiveState::ReadTrackDataByte => {
                    self.data = self.cur_live.data_byte();
                    self.set_drq();
                    self.cur_live.state = LiveState::ReadTrackData;
                    self.checkpoint();
                }
            }
        }
    }
}
