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

    error.rs

    Errors surfaced to the host through the configuration and checked register API.
    Emulated disk errors are never Rust errors; they are reported in the status register
    exactly as the chip would report them.
*/

#[derive(thiserror::Error, Debug)]
pub enum FdcError {
    #[error("Error parsing WD1772 configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("IO Error reading configuration file '{0}': {1}")]
    ConfigIo(String, String),
    #[error("Invalid WD1772 configuration: {0}")]
    InvalidConfig(String),
    #[error("Register offset {0} is out of range (0-3)")]
    BadRegister(u16),
}
