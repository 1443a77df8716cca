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

    mfm.rs

    MFM cell encoding, address mark sync patterns and the CCITT CRC used by IBM-style
    floppy formats. Cells are handled 16 at a time, most significant cell first, with
    the clock cell preceding each data cell.
*/

/// A1 with a missing clock between bits 4 and 5. Precedes ID and data address marks.
pub const MFM_SYNC_A1: u16 = 0x4489;
/// C2 with a missing clock between bits 3 and 4. Precedes the index address mark.
pub const MFM_SYNC_C2: u16 = 0x5224;

pub const CRC_INIT: u16 = 0xFFFF;
/// CRC after a single A1 sync byte starting from [CRC_INIT].
pub const CRC_SEED_A1: u16 = 0x443B;
pub const CRC_POLY: u16 = 0x1021;

pub const ID_ADDRESS_MARK: u8 = 0xFE;
pub const DATA_ADDRESS_MARK: u8 = 0xFB;
pub const DELETED_DATA_ADDRESS_MARK: u8 = 0xF8;
pub const INDEX_ADDRESS_MARK: u8 = 0xFC;
pub const GAP_BYTE: u8 = 0x4E;

/// Sector sizes selected by the low two bits of an ID field's size code.
pub const SECTOR_SIZES: [usize; 4] = [128, 256, 512, 1024];

#[inline]
pub fn crc_ccitt_bit(crc: u16, bit: bool) -> u16 {
    if ((crc ^ if bit { 0x8000 } else { 0x0000 }) & 0x8000) != 0 {
        (crc << 1) ^ CRC_POLY
    }
    else {
        crc << 1
    }
}

pub fn crc_ccitt(mut crc: u16, data: &[u8]) -> u16 {
    for byte in data {
        for i in (0..8).rev() {
            crc = crc_ccitt_bit(crc, (byte >> i) & 1 != 0);
        }
    }
    crc
}

/// Encode a byte into 16 MFM cells. `prev_bit` is the last data bit written before it.
/// A clock cell is set only between two zero data bits.
pub fn encode_byte(byte: u8, prev_bit: bool) -> u16 {
    let mut cells = 0u16;
    let mut prev = prev_bit;
    for i in (0..8).rev() {
        let bit = (byte >> i) & 1 != 0;
        let clock = !prev && !bit;
        cells = (cells << 2) | ((clock as u16) << 1) | (bit as u16);
        prev = bit;
    }
    cells
}

/// Extract the data cells from 16 MFM cells.
pub fn decode_cells(cells: u16) -> u8 {
    let mut byte = 0u8;
    for i in (0..8).rev() {
        byte = (byte << 1) | ((cells >> (i * 2)) & 1) as u8;
    }
    byte
}
