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

    lib.rs

    WD1772 floppy disk controller core.

    The controller is simulated at the level of individual flux transitions: a software
    data separator recovers the bit clock from the transitions reported by the attached
    medium, a bit-level "live" state machine frames MFM address marks and fields, and a
    command engine drives seeks, sector reads, track reads and ID reads on top of it.
*/

pub mod bus;
pub mod config;
pub mod device_traits;
pub mod devices;
pub mod error;
pub mod mfm;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_drive;

pub use crate::{
    config::Wd1772Config,
    devices::wd1772::{LiveState, MainState, SubState, TimerId, Wd1772, Wd1772DebugState},
    error::FdcError,
};
pub use marty_common::SimTime;
