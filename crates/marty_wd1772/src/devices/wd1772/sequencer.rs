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

    devices::wd1772::sequencer.rs

    The command sequencer. Each command is a loop over its sub-states that runs until it
    has to wait on a timer, an index pulse or the live decoder, and is re-entered through
    general_continue() when that wait is over.
*/

use marty_common::SimTime;

use super::{
    command::FI_INDEX_PULSE,
    live::LiveState,
    MainState,
    SubState,
    TimerId,
    Wd1772,
    S_BUSY,
    S_CRC,
    S_DDM,
    S_LOST,
    S_MON,
    S_RNF,
    S_SPIN,
    S_WP,
};
use crate::mfm::SECTOR_SIZES;

impl Wd1772 {
    /// Terminate the current command. This is the only place BUSY is cleared.
    pub(crate) fn command_end(&mut self, raise_intrq: bool) {
        self.main_state = MainState::Idle;
        self.sub_state = SubState::Idle;
        self.status &= !S_BUSY;
        self.motor_timeout = 0;
        if raise_intrq {
            self.set_intrq();
        }
        let msg = format!("command {:02X} end, status {:02X}", self.command, self.status);
        self.log_str(&msg);
    }

    pub(crate) fn general_continue(&mut self) {
        if self.cur_live.state != LiveState::Idle {
            self.live_run(SimTime::NEVER);
            return;
        }

        match self.main_state {
            MainState::Idle => {}
            MainState::Restore | MainState::Seek | MainState::Step => self.seek_continue(),
            MainState::ReadSector => self.read_sector_continue(),
            MainState::ReadTrack => self.read_track_continue(),
            MainState::ReadId => self.read_id_continue(),
        }
    }

    /// The generic timer expired. Outside of seek waits it only serves to bring the live
    /// decoder up to date, which live_sync() has already done.
    pub(crate) fn do_generic(&mut self) {
        match self.sub_state {
            SubState::SeekWaitStepTime => {
                self.sub_state = SubState::SeekWaitStepTimeDone;
            }
            SubState::SeekWaitStabilizationTime => {
                self.sub_state = SubState::SeekWaitStabilizationTimeDone;
            }
            SubState::Idle
            | SubState::ScanId
            | SubState::SectorRead
            | SubState::ReadId
            | SubState::TrackDone => {}
            _ => {
                if self.cur_live.tm.is_never() {
                    log::error!("WD1772: generic timer fired in sub-state {}", self.sub_state);
                }
            }
        }
    }

    /// Start the spindle motor. Unless the command asked to skip it, wait out the spin-up
    /// revolutions.
    fn spinup(&mut self) {
        if self.type_i().no_spinup() {
            self.sub_state = SubState::SpinUpDone;
        }
        else {
            self.sub_state = SubState::SpinUpWait;
            self.counter = 0;
        }

        self.status |= S_MON;
        if let Some(floppy) = &self.floppy {
            floppy.borrow_mut().mon_w(true);
        }
    }

    fn track_zero(&self) -> bool {
        self.floppy.as_ref().is_some_and(|f| f.borrow().trk00_r())
    }

    fn step_track(&mut self) {
        self.track = if self.last_dir {
            self.track.wrapping_sub(1)
        }
        else {
            self.track.wrapping_add(1)
        };
    }

    pub(crate) fn seek_start(&mut self, state: MainState) {
        self.main_state = state;
        self.status = (self.status & !(S_CRC | S_RNF | S_SPIN)) | S_BUSY;
        self.sub_state = SubState::SpinUp;
        self.status_type_1 = true;
        self.seek_continue();
    }

    fn seek_continue(&mut self) {
        loop {
            match self.sub_state {
                SubState::SpinUp => {
                    if self.status & S_MON == 0 {
                        self.spinup();
                        if self.sub_state == SubState::SpinUpWait {
                            return;
                        }
                        continue;
                    }
                    if !self.type_i().no_spinup() {
                        self.status |= S_SPIN;
                    }
                    self.sub_state = SubState::SpinUpDone;
                }

                SubState::SpinUpWait => {
                    return;
                }

                SubState::SpinUpDone => {
                    if self.main_state == MainState::Restore && self.track_zero() {
                        self.track = 0;
                        self.sub_state = SubState::SeekDone;
                    }
                    if self.main_state == MainState::Seek && self.track == self.data {
                        self.sub_state = SubState::SeekDone;
                    }
                    if self.sub_state == SubState::SpinUpDone {
                        self.counter = 0;
                        self.sub_state = SubState::SeekMove;
                    }
                }

                SubState::SeekMove => {
                    if let Some(floppy) = &self.floppy {
                        let mut floppy = floppy.borrow_mut();
                        floppy.dir_w(self.last_dir);
                        floppy.stp_w(false);
                        floppy.stp_w(true);
                    }
                    self.counter += 1;
                    self.sub_state = SubState::SeekWaitStepTime;
                    let rate = self.config.step_rates[self.type_i().rate() as usize];
                    self.arm_timer(TimerId::Generic, rate);
                    return;
                }

                SubState::SeekWaitStepTime => {
                    return;
                }

                SubState::SeekWaitStepTimeDone => {
                    let done = match self.main_state {
                        MainState::Restore => self.floppy.is_none() || self.track_zero(),
                        MainState::Seek => {
                            self.step_track();
                            self.track == self.data
                        }
                        _ => true,
                    };

                    if done || self.counter >= self.config.max_steps {
                        match self.main_state {
                            MainState::Restore => self.track = 0,
                            MainState::Step if self.type_i().update() => self.step_track(),
                            _ => {}
                        }

                        if self.type_i().verify() {
                            self.sub_state = SubState::SeekWaitStabilizationTime;
                            self.arm_timer(TimerId::Generic, self.config.settle_cycles);
                            return;
                        }
                        self.sub_state = SubState::SeekDone;
                    }
                    else {
                        self.sub_state = SubState::SeekMove;
                    }
                }

                SubState::SeekWaitStabilizationTime => {
                    return;
                }

                SubState::SeekWaitStabilizationTimeDone => {
                    self.sub_state = SubState::SeekDone;
                }

                SubState::SeekDone => {
                    if self.type_i().verify() {
                        self.sub_state = SubState::ScanId;
                        self.counter = 0;
                        self.live_start(LiveState::SearchAddressMark);
                        return;
                    }
                    self.command_end(true);
                    return;
                }

                SubState::ScanId => {
                    if self.cur_live.state != LiveState::Idle {
                        return;
                    }
                    if self.cur_live.idbuf[0] != self.track {
                        self.live_start(LiveState::SearchAddressMark);
                        return;
                    }
                    if self.cur_live.crc != 0 {
                        self.status |= S_CRC;
                        self.live_start(LiveState::SearchAddressMark);
                        return;
                    }
                    self.status &= !S_CRC;
                    self.command_end(true);
                    return;
                }

                SubState::ScanIdFailed => {
                    self.status |= S_RNF;
                    self.command_end(true);
                    return;
                }

                _ => {
                    log::error!("WD1772: seek in unexpected sub-state {}", self.sub_state);
                    debug_assert!(false, "seek in unexpected sub-state {}", self.sub_state);
                    return;
                }
            }
        }
    }

    pub(crate) fn read_sector_start(&mut self) {
        self.main_state = MainState::ReadSector;
        self.status = (self.status & !(S_CRC | S_LOST | S_RNF | S_WP | S_DDM)) | S_BUSY;
        self.drop_drq();
        self.sub_state = SubState::SpinUp;
        self.status_type_1 = false;
        self.read_sector_continue();
    }

    fn read_sector_continue(&mut self) {
        loop {
            match self.sub_state {
                SubState::SpinUp => {
                    if self.status & S_MON == 0 {
                        self.spinup();
                        if self.sub_state == SubState::SpinUpWait {
                            return;
                        }
                        continue;
                    }
                    self.sub_state = SubState::SpinUpDone;
                }

                SubState::SpinUpWait => {
                    return;
                }

                SubState::SpinUpDone => {
                    self.sub_state = SubState::ScanId;
                    self.counter = 0;
                    self.live_start(LiveState::SearchAddressMark);
                    return;
                }

                SubState::ScanId => {
                    if self.cur_live.state != LiveState::Idle {
                        return;
                    }
                    let idbuf = self.cur_live.idbuf;
                    if idbuf[0] != self.track || idbuf[2] != self.sector {
                        self.live_start(LiveState::SearchAddressMark);
                        return;
                    }
                    if self.cur_live.crc != 0 {
                        self.status |= S_CRC;
                        self.live_start(LiveState::SearchAddressMark);
                        return;
                    }
                    self.status &= !S_CRC;
                    self.sector_size = SECTOR_SIZES[(idbuf[3] & 3) as usize];
                    log::trace!(
                        "WD1772: found ID c:{} h:{} s:{} n:{} ({} bytes)",
                        idbuf[0],
                        idbuf[1],
                        idbuf[2],
                        idbuf[3],
                        self.sector_size
                    );
                    self.sub_state = SubState::SectorRead;
                    self.live_start(LiveState::SearchAddressMark);
                    return;
                }

                SubState::ScanIdFailed => {
                    self.status |= S_RNF;
                    self.command_end(true);
                    return;
                }

                SubState::SectorRead => {
                    if self.cur_live.state != LiveState::Idle {
                        return;
                    }
                    if self.cur_live.crc != 0 {
                        self.status |= S_CRC;
                    }
                    if self.cur_live.deleted_mark {
                        self.status |= S_DDM;
                    }

                    if self.type_ii().multiple() {
                        self.sector = self.sector.wrapping_add(1);
                        self.sub_state = SubState::SpinUpDone;
                    }
                    else {
                        self.command_end(true);
                        return;
                    }
                }

                _ => {
                    log::error!("WD1772: read sector in unexpected sub-state {}", self.sub_state);
                    debug_assert!(false, "read sector in unexpected sub-state {}", self.sub_state);
                    return;
                }
            }
        }
    }

    pub(crate) fn read_track_start(&mut self) {
        self.main_state = MainState::ReadTrack;
        self.status = (self.status & !(S_LOST | S_RNF)) | S_BUSY;
        self.drop_drq();
        self.sub_state = SubState::SpinUp;
        self.status_type_1 = false;
        self.read_track_continue();
    }

    fn read_track_continue(&mut self) {
        loop {
            match self.sub_state {
                SubState::SpinUp => {
                    if self.status & S_MON == 0 {
                        self.spinup();
                        if self.sub_state == SubState::SpinUpWait {
                            return;
                        }
                        continue;
                    }
                    self.sub_state = SubState::SpinUpDone;
                }

                SubState::SpinUpWait => {
                    return;
                }

                SubState::SpinUpDone => {
                    self.sub_state = SubState::WaitIndex;
                    return;
                }

                SubState::WaitIndex => {
                    return;
                }

                SubState::WaitIndexDone => {
                    self.sub_state = SubState::TrackDone;
                    self.live_start(LiveState::ReadTrackData);
                    return;
                }

                SubState::TrackDone => {
                    if self.cur_live.state != LiveState::Idle {
                        return;
                    }
                    self.command_end(true);
                    return;
                }

                _ => {
                    log::error!("WD1772: read track in unexpected sub-state {}", self.sub_state);
                    debug_assert!(false, "read track in unexpected sub-state {}", self.sub_state);
                    return;
                }
            }
        }
    }

    pub(crate) fn read_id_start(&mut self) {
        self.main_state = MainState::ReadId;
        self.status = (self.status & !(S_CRC | S_LOST | S_RNF)) | S_BUSY;
        self.drop_drq();
        self.sub_state = SubState::SpinUp;
        self.status_type_1 = false;
        self.read_id_continue();
    }

    fn read_id_continue(&mut self) {
        loop {
            match self.sub_state {
                SubState::SpinUp => {
                    if self.status & S_MON == 0 {
                        self.spinup();
                        if self.sub_state == SubState::SpinUpWait {
                            return;
                        }
                        continue;
                    }
                    self.sub_state = SubState::SpinUpDone;
                }

                SubState::SpinUpWait => {
                    return;
                }

                SubState::SpinUpDone => {
                    self.sub_state = SubState::ReadId;
                    self.counter = 0;
                    self.live_start(LiveState::SearchAddressMark);
                    return;
                }

                SubState::ReadId => {
                    if self.cur_live.state != LiveState::Idle {
                        return;
                    }
                    if self.cur_live.crc != 0 {
                        self.status |= S_CRC;
                    }
                    self.command_end(true);
                    return;
                }

                SubState::ScanIdFailed => {
                    self.status |= S_RNF;
                    self.command_end(true);
                    return;
                }

                _ => {
                    log::error!("WD1772: read id in unexpected sub-state {}", self.sub_state);
                    debug_assert!(false, "read id in unexpected sub-state {}", self.sub_state);
                    return;
                }
            }
        }
    }

    /// Index pulse edge from the selected drive. `state` is true on the leading edge.
    pub fn index_callback(&mut self, now: SimTime, state: bool) {
        self.now = now;
        self.live_sync();

        if !state {
            self.general_continue();
            return;
        }

        if self.intrq_cond & FI_INDEX_PULSE != 0 {
            self.set_intrq();
        }

        match self.sub_state {
            SubState::Idle => {
                self.motor_timeout = self.motor_timeout.saturating_add(1);
                if self.motor_timeout >= self.config.motor_off_revolutions && self.status & S_MON != 0 {
                    self.status &= !S_MON;
                    if let Some(floppy) = &self.floppy {
                        floppy.borrow_mut().mon_w(false);
                    }
                    self.log_str("motor off");
                }
            }

            SubState::SpinUpWait => {
                self.counter += 1;
                if self.counter >= self.config.spinup_revolutions {
                    self.sub_state = SubState::SpinUpDone;
                    if self.status_type_1 {
                        self.status |= S_SPIN;
                    }
                }
            }

            SubState::ScanId | SubState::ReadId | SubState::SectorRead => {
                // The search for an ID field (or its data field) gives up after a fixed
                // number of revolutions.
                self.counter += 1;
                if self.counter >= self.config.id_scan_revolutions {
                    self.live_abort();
                    self.sub_state = SubState::ScanIdFailed;
                }
            }

            SubState::WaitIndex => {
                self.sub_state = SubState::WaitIndexDone;
            }

            SubState::TrackDone => {
                self.live_abort();
            }

            SubState::SpinUp
            | SubState::SpinUpDone
            | SubState::SeekMove
            | SubState::SeekWaitStepTime
            | SubState::SeekWaitStepTimeDone
            | SubState::SeekWaitStabilizationTime
            | SubState::SeekWaitStabilizationTimeDone
            | SubState::SeekDone
            | SubState::WaitIndexDone
            | SubState::ScanIdFailed => {}
        }

        self.general_continue();
    }
}
