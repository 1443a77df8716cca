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

    devices::wd1772::command.rs

    Command byte decoding and dispatch.
*/

use modular_bitfield::{bitfield, prelude::*};
use strum_macros::{Display, IntoStaticStr};

use super::{MainState, SubState, TimerId, Wd1772, S_BUSY};

/// Force interrupt condition: interrupt on every index pulse.
pub const FI_INDEX_PULSE: u8 = 0x04;
/// Force interrupt condition: interrupt immediately.
pub const FI_IMMEDIATE: u8 = 0x08;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Command {
    Restore,
    Seek,
    Step,
    StepIn,
    StepOut,
    ReadSector,
    WriteSector,
    ReadId,
    ForceInterrupt,
    ReadTrack,
    WriteTrack,
}

impl Command {
    pub fn decode(byte: u8) -> Self {
        match byte >> 4 {
            0x0 => Command::Restore,
            0x1 => Command::Seek,
            0x2 | 0x3 => Command::Step,
            0x4 | 0x5 => Command::StepIn,
            0x6 | 0x7 => Command::StepOut,
            0x8 | 0x9 => Command::ReadSector,
            0xA | 0xB => Command::WriteSector,
            0xC => Command::ReadId,
            0xD => Command::ForceInterrupt,
            0xE => Command::ReadTrack,
            _ => Command::WriteTrack,
        }
    }
}

/// Restore, seek and the step commands.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct TypeICommand {
    pub rate: B2,
    pub verify: bool,
    pub no_spinup: bool,
    pub update: bool,
    pub opcode: B3,
}

/// Sector and track transfer commands, and read address.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct TypeIICommand {
    pub a0: bool,
    pub precomp: bool,
    pub settle: bool,
    pub no_spinup: bool,
    pub multiple: bool,
    pub opcode: B3,
}

#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct ForceInterruptCommand {
    pub not_ready_to_ready: bool,
    pub ready_to_not_ready: bool,
    pub index_pulse: bool,
    pub immediate: bool,
    pub opcode: B4,
}

impl Wd1772 {
    #[inline]
    pub(crate) fn type_i(&self) -> TypeICommand {
        TypeICommand::from_bytes([self.command])
    }

    #[inline]
    pub(crate) fn type_ii(&self) -> TypeIICommand {
        TypeIICommand::from_bytes([self.command])
    }

    /// The command register write has committed.
    pub(crate) fn do_cmd_w(&mut self) {
        let Some(cmd_byte) = self.cmd_buffer.take()
        else {
            return;
        };

        // Only force interrupt is accepted while busy.
        let cmd = Command::decode(cmd_byte);
        if self.main_state != MainState::Idle && cmd != Command::ForceInterrupt {
            log::warn!("WD1772: command {:02X} committed while busy, dropped", cmd_byte);
            return;
        }

        self.command = cmd_byte;
        self.intrq_cond = 0;

        match cmd {
            Command::Restore => {
                self.log_str("restore");
                self.last_dir = true;
                self.seek_start(MainState::Restore);
            }
            Command::Seek => {
                self.log_str(&format!("seek {} -> {}", self.track, self.data));
                self.last_dir = self.data <= self.track;
                self.seek_start(MainState::Seek);
            }
            Command::Step => {
                self.log_str("step");
                self.seek_start(MainState::Step);
            }
            Command::StepIn => {
                self.log_str("step in");
                self.last_dir = false;
                self.seek_start(MainState::Step);
            }
            Command::StepOut => {
                self.log_str("step out");
                self.last_dir = true;
                self.seek_start(MainState::Step);
            }
            Command::ReadSector => {
                self.log_str(&format!(
                    "read sector{} {}, {}",
                    if self.type_ii().multiple() { " multiple" } else { "" },
                    self.track,
                    self.sector
                ));
                self.read_sector_start();
            }
            Command::ReadId => {
                self.log_str("read id");
                self.read_id_start();
            }
            Command::ForceInterrupt => {
                self.log_str(&format!("interrupt {:02X}", cmd_byte));
                self.interrupt_start();
            }
            Command::ReadTrack => {
                self.log_str(&format!("read track {}", self.track));
                self.read_track_start();
            }
            Command::WriteSector | Command::WriteTrack => {
                self.log_str(&format!("unsupported write command {:02X} ignored", cmd_byte));
            }
        }
    }

    pub(crate) fn interrupt_start(&mut self) {
        let fi = ForceInterruptCommand::from_bytes([self.command]);

        if self.status & S_BUSY != 0 {
            self.live_abort();
            self.disarm_timer(TimerId::Generic);
            self.drop_drq();
            self.command_end(fi.immediate());
        }
        else {
            debug_assert_eq!(self.sub_state, SubState::Idle);
            self.status_type_1 = true;
            if fi.immediate() {
                self.set_intrq();
            }
        }

        if fi.not_ready_to_ready() || fi.ready_to_not_ready() {
            // There is no READY input on this part.
            log::debug!("WD1772: ready transition interrupt requested ({:02X}), never fires", self.command);
        }

        if fi.index_pulse() {
            self.intrq_cond |= FI_INDEX_PULSE;
        }
        if fi.immediate() {
            self.intrq_cond |= FI_IMMEDIATE;
        }
        if self.command & 0x0f == 0 {
            self.intrq_cond = 0;
            self.clear_intrq();
        }
    }
}
