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

    devices::wd1772::registers.rs

    The host register interface. Writes to the command, track and sector registers take
    effect a few controller clocks after the access; a second write to the same register
    while one is still in flight is lost.
*/

use marty_common::SimTime;

use super::{
    command::Command,
    MainState,
    TimerId,
    Wd1772,
    CMD_COMMIT_CYCLES,
    CMD_COMMIT_CYCLES_DDEN,
    REG_COMMIT_CYCLES,
    REG_COMMIT_CYCLES_DDEN,
    S_BUSY,
    S_DRQ,
    S_IP,
    S_TR00,
    S_WP,
    WD1772_REG_COMMAND,
    WD1772_REG_DATA,
    WD1772_REG_SECTOR,
    WD1772_REG_STATUS,
    WD1772_REG_TRACK,
};
use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    error::FdcError,
};

impl Wd1772 {
    /// Read register `reg` (0-3) at time `now`.
    pub fn read(&mut self, reg: u8, now: SimTime) -> u8 {
        self.now = now;
        self.live_sync();

        let byte = match reg as u16 & 0x03 {
            WD1772_REG_STATUS => self.status_r(),
            WD1772_REG_TRACK => self.track,
            WD1772_REG_SECTOR => self.sector,
            _ => self.data_r(),
        };
        log::trace!("WD1772: read reg {} -> {:02X}", reg & 0x03, byte);
        byte
    }

    /// Write register `reg` (0-3) at time `now`.
    pub fn write(&mut self, reg: u8, val: u8, now: SimTime) {
        self.now = now;
        self.live_sync();

        log::trace!("WD1772: write reg {} <- {:02X}", reg & 0x03, val);
        match reg as u16 & 0x03 {
            WD1772_REG_COMMAND => self.cmd_w(val),
            WD1772_REG_TRACK => self.track_w(val),
            WD1772_REG_SECTOR => self.sector_w(val),
            _ => self.data_w(val),
        }
    }

    pub fn try_read(&mut self, reg: u16, now: SimTime) -> Result<u8, FdcError> {
        if reg > WD1772_REG_DATA {
            return Err(FdcError::BadRegister(reg));
        }
        Ok(self.read(reg as u8, now))
    }

    pub fn try_write(&mut self, reg: u16, val: u8, now: SimTime) -> Result<(), FdcError> {
        if reg > WD1772_REG_DATA {
            return Err(FdcError::BadRegister(reg));
        }
        self.write(reg as u8, val, now);
        Ok(())
    }

    /// Reading status or writing a command acknowledges the interrupt, unless it was
    /// requested by a force interrupt with the immediate condition.
    fn ack_intrq(&mut self) {
        if self.intrq && (self.command & 0xf8) != 0xd8 {
            self.clear_intrq();
        }
    }

    fn cmd_w(&mut self, val: u8) {
        let busy = self.status & S_BUSY != 0 || self.main_state != MainState::Idle;
        if busy && Command::decode(val) != Command::ForceInterrupt {
            log::warn!("WD1772: command {:02X} written while busy, ignored", val);
            return;
        }

        self.ack_intrq();

        if let Some(pending) = self.cmd_buffer {
            log::warn!(
                "WD1772: command {:02X} written with {:02X} still pending, ignored",
                val,
                pending
            );
            return;
        }

        self.cmd_buffer = Some(val);
        let cycles = if self.dden { CMD_COMMIT_CYCLES_DDEN } else { CMD_COMMIT_CYCLES };
        self.arm_timer(TimerId::Command, cycles);
    }

    fn status_r(&mut self) -> u8 {
        self.ack_intrq();

        if self.status_type_1 {
            self.status &= !(S_TR00 | S_WP);
            if let Some(floppy) = &self.floppy {
                let floppy = floppy.borrow();
                if floppy.wpt_r() {
                    self.status |= S_WP;
                }
                if floppy.trk00_r() {
                    self.status |= S_TR00;
                }
            }
        }

        if self.main_state == MainState::Idle || self.status_type_1 {
            let index = self.floppy.as_ref().is_some_and(|f| f.borrow().index_r(self.now));
            if index {
                self.status |= S_IP;
            }
            else {
                self.status &= !S_IP;
            }
        }
        else if self.drq {
            self.status |= S_DRQ;
        }
        else {
            self.status &= !S_DRQ;
        }

        self.status
    }

    pub(crate) fn do_track_w(&mut self) {
        if let Some(track) = self.track_buffer.take() {
            self.track = track;
        }
    }

    fn track_w(&mut self, val: u8) {
        if self.track_buffer.is_some() {
            log::warn!("WD1772: track register write {:02X} lost", val);
            return;
        }
        self.track_buffer = Some(val);
        let cycles = if self.dden { REG_COMMIT_CYCLES_DDEN } else { REG_COMMIT_CYCLES };
        self.arm_timer(TimerId::Track, cycles);
    }

    pub(crate) fn do_sector_w(&mut self) {
        if let Some(sector) = self.sector_buffer.take() {
            self.sector = sector;
        }
    }

    fn sector_w(&mut self, val: u8) {
        if self.sector_buffer.is_some() {
            log::warn!("WD1772: sector register write {:02X} lost", val);
            return;
        }
        self.sector_buffer = Some(val);
        let cycles = if self.dden { REG_COMMIT_CYCLES_DDEN } else { REG_COMMIT_CYCLES };
        self.arm_timer(TimerId::Sector, cycles);
    }

    fn data_w(&mut self, val: u8) {
        self.data = val;
        self.drop_drq();
    }

    fn data_r(&mut self) -> u8 {
        self.drop_drq();
        self.data
    }
}

/// IO Port handlers for the WD1772
impl IoDevice for Wd1772 {
    fn read_u8(&mut self, port: u16, now: SimTime) -> u8 {
        match port.checked_sub(self.config.io_base) {
            Some(reg) if reg <= WD1772_REG_DATA => self.read(reg as u8, now),
            _ => {
                log::warn!("WD1772: read from unmapped port {:04X}", port);
                NO_IO_BYTE
            }
        }
    }

    fn write_u8(&mut self, port: u16, data: u8, now: SimTime) {
        match port.checked_sub(self.config.io_base) {
            Some(reg) if reg <= WD1772_REG_DATA => self.write(reg as u8, data, now),
            _ => {
                log::warn!("WD1772: write to unmapped port {:04X}", port);
            }
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        let base = self.config.io_base;
        vec![
            (String::from("WD1772 Command/Status Register"), base + WD1772_REG_COMMAND),
            (String::from("WD1772 Track Register"), base + WD1772_REG_TRACK),
            (String::from("WD1772 Sector Register"), base + WD1772_REG_SECTOR),
            (String::from("WD1772 Data Register"), base + WD1772_REG_DATA),
        ]
    }
}
