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

    device_traits::floppy.rs

    The interface between a floppy disk controller and the drive mechanism plus medium.
    The controller never owns the drive: it holds a shared handle that may be swapped or
    removed at any time by whatever models drive selection.
*/

use std::{cell::RefCell, rc::Rc};

use marty_common::SimTime;

/// A floppy drive with (possibly) a disk in it, as seen from the controller's cable.
///
/// All signals are active-high here regardless of the polarity on the real cable.
pub trait FloppyMedium {
    /// Return the time of the first flux transition strictly after `from`, or
    /// [SimTime::NEVER] if there is no disk or the track is unformatted.
    fn get_next_transition(&self, from: SimTime) -> SimTime;
    /// Return the time of the next index pulse rising edge strictly after `now`, or
    /// [SimTime::NEVER] if the disk is not turning.
    fn time_next_index(&self, now: SimTime) -> SimTime;
    /// Index hole sensor.
    fn index_r(&self, now: SimTime) -> bool;
    /// Track zero sensor.
    fn trk00_r(&self) -> bool;
    /// Write protect sensor.
    fn wpt_r(&self) -> bool;
    /// Spindle motor enable.
    fn mon_w(&mut self, on: bool);
    /// Step direction. `true` steps outward, toward track 0.
    fn dir_w(&mut self, outward: bool);
    /// Step line. The head moves one cylinder on a rising edge.
    fn stp_w(&mut self, state: bool);
}

pub type SharedMedium = Rc<RefCell<dyn FloppyMedium>>;
