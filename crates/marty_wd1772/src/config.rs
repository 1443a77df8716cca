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

    config.rs

    Configuration for the WD1772 core. Timing values are expressed the way the datasheet
    expresses them, in controller clock cycles or disk revolutions, and can be loaded from
    a TOML fragment in the same manner as machine configuration files.
*/

use std::path::Path;

use marty_common::SimTime;
use serde_derive::{Deserialize, Serialize};

use crate::error::FdcError;

pub const DEFAULT_CLOCK_HZ: u64 = 8_000_000;
/// Duration of one MFM cell (clock or data bit) at 250kbps.
pub const DEFAULT_CELL_PERIOD_NS: u64 = 2_000;
/// 6ms, 12ms, 2ms and 3ms at 8MHz.
pub const DEFAULT_STEP_RATES: [u32; 4] = [48_000, 96_000, 16_000, 24_000];
/// 15ms head settle time at 8MHz.
pub const DEFAULT_SETTLE_CYCLES: u32 = 120_000;
pub const DEFAULT_HISTORY_LEN: usize = 1000;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Wd1772Config {
    pub clock_hz: u64,
    /// Base address of the four registers when accessed through [crate::bus::IoDevice].
    pub io_base: u16,
    pub cell_period_ns: u64,
    pub step_rates: [u32; 4],
    pub settle_cycles: u32,
    pub spinup_revolutions: u32,
    pub motor_off_revolutions: u32,
    pub id_scan_revolutions: u32,
    pub max_steps: u32,
    pub history_len: usize,
}

impl Default for Wd1772Config {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            io_base: 0,
            cell_period_ns: DEFAULT_CELL_PERIOD_NS,
            step_rates: DEFAULT_STEP_RATES,
            settle_cycles: DEFAULT_SETTLE_CYCLES,
            spinup_revolutions: 6,
            motor_off_revolutions: 5,
            id_scan_revolutions: 5,
            max_steps: 255,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

impl Wd1772Config {
    /// Parse a configuration from a TOML string. Missing keys take their default values.
    pub fn from_toml(toml_str: &str) -> Result<Self, FdcError> {
        let config = toml::from_str::<Wd1772Config>(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FdcError> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| FdcError::ConfigIo(path.display().to_string(), e.to_string()))?;
        log::debug!("Loading WD1772 configuration from {}", path.display());
        Self::from_toml(&toml_str)
    }

    pub fn validate(&self) -> Result<(), FdcError> {
        if self.clock_hz == 0 {
            return Err(FdcError::InvalidConfig("clock_hz must be non-zero".to_string()));
        }
        if self.cell_period_ns == 0 {
            return Err(FdcError::InvalidConfig("cell_period_ns must be non-zero".to_string()));
        }
        if self.spinup_revolutions == 0 || self.motor_off_revolutions == 0 || self.id_scan_revolutions == 0 {
            return Err(FdcError::InvalidConfig(
                "revolution counts must be non-zero".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(FdcError::InvalidConfig("max_steps must be non-zero".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn cycles(&self, cycles: u32) -> SimTime {
        SimTime::from_cycles(cycles as u64, self.clock_hz)
    }

    #[inline]
    pub fn cell_period(&self) -> SimTime {
        SimTime::from_ns(self.cell_period_ns)
    }
}
