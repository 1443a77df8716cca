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

    devices::wd1772::tests.rs

    Controller tests against a synthetic MFM drive. The bench checks after every event
    that BUSY tracks the main state and that an idle decoder has no live time.
*/

use std::{cell::RefCell, rc::Rc};

use marty_common::SimTime;

use super::*;
use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    device_traits::NullLines,
    error::FdcError,
    mfm::{
        crc_ccitt,
        CRC_INIT,
        DATA_ADDRESS_MARK,
        DELETED_DATA_ADDRESS_MARK,
        GAP_BYTE,
        ID_ADDRESS_MARK,
        INDEX_ADDRESS_MARK,
    },
    test_drive::{format_track, sector_pattern, MfmTrackBuilder, SyntheticDrive, TestBench, TEST_TRACK_CELLS},
};

fn ms(ms: u64) -> SimTime {
    SimTime::from_ms(ms)
}

fn us(us: u64) -> SimTime {
    SimTime::from_us(us)
}

fn bench_at(cyl: u8, mut drive: SyntheticDrive) -> TestBench {
    drive.cyl = cyl;
    TestBench::new(drive)
}

/// Load the track and sector registers and let the writes commit.
fn set_regs(b: &mut TestBench, track: u8, sector: u8) {
    b.write(1, track);
    b.write(2, sector);
    b.advance(us(50));
    assert_eq!(b.read(1), track);
    assert_eq!(b.read(2), sector);
}

/// A single-sector track with a caller-supplied data field.
fn single_sector_track(c: u8, s: u8, mark: u8, data: &[u8], bad_crc: bool) -> MfmTrackBuilder {
    let mut track = MfmTrackBuilder::new();
    track
        .bytes(GAP_BYTE, 60)
        .id_field(c, 0, s, 1, false)
        .data_field(mark, data, bad_crc)
        .fill_to(TEST_TRACK_CELLS);
    track
}

fn step_until_drq(b: &mut TestBench, limit: SimTime) {
    while !b.fdc.drq_r() {
        assert!(b.step(limit), "no DRQ before {}", limit);
    }
}

#[derive(Debug, PartialEq)]
struct Snapshot {
    main_state: MainState,
    sub_state: SubState,
    live_state: LiveState,
    command: u8,
    status: u8,
    track: u8,
    sector: u8,
    data: u8,
    intrq: bool,
    drq: bool,
}

fn snapshot(fdc: &Wd1772) -> Snapshot {
    let d = fdc.debug_state();
    Snapshot {
        main_state: d.main_state,
        sub_state: d.sub_state,
        live_state: d.live_state,
        command: d.command,
        status: d.status,
        track: d.track,
        sector: d.sector,
        data: d.data,
        intrq: d.intrq,
        drq: d.drq,
    }
}

#[test]
fn read_sector_transfers_one_sector() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    set_regs(&mut b, 5, 3);

    // Motor is off, so this includes the six-revolution spin-up.
    assert!(b.command(0x80, ms(1000)));
    assert!(b.fdc.intrq_r());
    assert_eq!(b.received, sector_pattern(5, 3, 256));
    assert_eq!(b.lines.borrow().drq_rises, 256);
    assert_eq!(b.lines.borrow().intrq_rises, 1);

    let status = b.read(0);
    assert_eq!(status & (S_BUSY | S_CRC | S_RNF | S_LOST | S_DDM), 0);
    assert_ne!(status & S_MON, 0);
    assert!(!b.fdc.intrq_r());
    assert_eq!(b.read(1), 5);
    assert_eq!(b.read(2), 3);
}

#[test]
fn read_sector_honours_every_size_code() {
    for n in 0..4u8 {
        let mut b = bench_at(2, SyntheticDrive::formatted(4, 1, n));
        set_regs(&mut b, 2, 1);
        assert!(b.command(0x88, ms(500)));
        let len = 128usize << n;
        assert_eq!(b.received.len(), len, "size code {}", n);
        assert_eq!(b.received, sector_pattern(2, 1, len));
        assert_eq!(b.read(0) & (S_CRC | S_RNF | S_LOST), 0);
    }
}

#[test]
fn restore_steps_out_to_track_zero() {
    let mut b = bench_at(12, SyntheticDrive::new());
    b.write(1, 12);
    b.advance(us(50));

    assert!(b.command(0x08, ms(500)));
    assert_eq!(b.drive.borrow().step_ct, 12);
    assert_eq!(b.drive.borrow().cyl, 0);
    assert_eq!(b.read(1), 0);
    let status = b.read(0);
    assert_ne!(status & S_TR00, 0);
    assert_eq!(status & (S_BUSY | S_RNF), 0);
    // Step rate 0 is 6ms per step.
    assert!(b.now >= ms(72) && b.now < ms(73));
}

#[test]
fn restore_with_spinup_waits_six_revolutions() {
    let mut b = bench_at(12, SyntheticDrive::new());
    b.write(1, 12);
    b.advance(us(50));

    assert!(b.command(0x00, ms(1000)));
    assert_eq!(b.drive.borrow().step_ct, 12);
    assert_eq!(b.read(1), 0);
    let status = b.read(0);
    assert_ne!(status & S_TR00, 0);
    assert_ne!(status & S_SPIN, 0);
    assert_ne!(status & S_MON, 0);
    assert_eq!(status & (S_BUSY | S_RNF), 0);
    // Sixth index pulse at 300ms, then 12 steps of 6ms.
    assert_eq!(b.intrq_time, Some(ms(372)));
}

#[test]
fn restore_at_track_zero_clears_track_register() {
    let mut b = bench_at(0, SyntheticDrive::formatted(8, 1, 1));
    b.write(1, 7);
    b.advance(us(50));
    assert!(b.command(0x08, ms(100)));
    assert_eq!(b.drive.borrow().step_ct, 0);
    assert_eq!(b.read(1), 0);
    assert_eq!(b.read(0) & (S_BUSY | S_RNF), 0);

    // With verify the ID of cylinder 0 must match the cleared register.
    b.write(1, 7);
    b.advance(us(50));
    assert!(b.command(0x0C, ms(500)));
    assert_eq!(b.drive.borrow().step_ct, 0);
    assert_eq!(b.read(1), 0);
    let status = b.read(0);
    assert_ne!(status & S_TR00, 0);
    assert_eq!(status & (S_BUSY | S_RNF | S_CRC), 0);
}

#[test]
fn command_written_while_busy_is_dropped() {
    let mut b = bench_at(12, SyntheticDrive::new());
    b.write(0, 0x08);
    b.advance(ms(10));
    assert!(b.fdc.is_busy());

    b.write(0, 0x80);
    assert!(!b.fdc.command_pending());
    assert!(b.fdc.debug_state().timers.iter().all(|(id, _)| *id != TimerId::Command));

    assert!(b.run_until_idle(ms(500)));
    assert_eq!(b.fdc.debug_state().command, 0x08);
    assert_eq!(b.fdc.main_state(), MainState::Idle);
    assert_eq!(b.drive.borrow().step_ct, 12);
    assert!(b.received.is_empty());
}

#[test]
fn force_interrupt_from_idle_is_idempotent() {
    let mut b = TestBench::new(SyntheticDrive::formatted(2, 1, 1));
    assert!(b.command(0xD0, ms(1)));
    let first = snapshot(&b.fdc);
    assert!(b.command(0xD0, ms(1)));
    let second = snapshot(&b.fdc);
    assert_eq!(first, second);
    assert!(!second.intrq);
    assert_eq!(second.main_state, MainState::Idle);
}

#[test]
fn force_interrupt_inside_decoder_lookahead_is_idempotent() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    b.write(0, 0xC8);
    b.advance(us(30));
    assert_eq!(b.fdc.main_state(), MainState::ReadId);
    assert!(b.fdc.live_time() > b.now);

    // Written while the decoder is ahead of the access time.
    assert!(b.command(0xD0, ms(1)));
    let first = snapshot(&b.fdc);
    let first_lines = (b.lines.borrow().intrq_rises, b.lines.borrow().drq_rises);
    assert_eq!(first.main_state, MainState::Idle);
    assert_eq!(first.live_state, LiveState::Idle);
    assert_eq!(first_lines, (0, 0));
    assert_eq!(b.fdc.next_event(), None);

    assert!(b.command(0xD0, ms(1)));
    let second = snapshot(&b.fdc);
    let second_lines = (b.lines.borrow().intrq_rises, b.lines.borrow().drq_rises);
    assert_eq!(first, second);
    assert_eq!(first_lines, second_lines);
    assert!(b.received.is_empty());
}

#[test]
fn force_interrupt_aborts_a_sector_read() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    set_regs(&mut b, 5, 3);
    b.write(0, 0x88);
    while b.received.len() < 100 {
        assert!(b.step(ms(200)));
    }

    b.write(0, 0xD0);
    b.advance(ms(1));
    assert_eq!(b.fdc.main_state(), MainState::Idle);
    assert_eq!(b.fdc.sub_state(), SubState::Idle);
    assert_eq!(b.fdc.live_state(), LiveState::Idle);
    assert!(!b.fdc.is_busy());
    assert!(!b.fdc.drq_r());
    // 0xD0 terminates without an interrupt.
    assert!(!b.fdc.intrq_r());

    let got = b.received.len();
    assert!(got < 256);
    b.advance(ms(120));
    assert_eq!(b.received.len(), got);
}

#[test]
fn force_interrupt_aborts_a_seek() {
    let mut b = bench_at(40, SyntheticDrive::new());
    b.write(0, 0x0B); // restore, 3ms steps
    b.advance(ms(20));
    b.write(0, 0xD8);
    b.advance(ms(1));
    let steps = b.drive.borrow().step_ct;
    assert!(steps > 0 && steps < 40);
    assert!(b.fdc.intrq_r());
    assert!(!b.fdc.is_busy());

    b.advance(ms(100));
    assert_eq!(b.drive.borrow().step_ct, steps);
}

#[test]
fn immediate_interrupt_holds_until_cleared() {
    let mut b = TestBench::new(SyntheticDrive::new());
    assert!(b.command(0xD8, ms(1)));
    assert!(b.fdc.intrq_r());

    // Status reads do not acknowledge it.
    b.read(0);
    b.read(0);
    assert!(b.fdc.intrq_r());

    // Nor does writing the next command; committing a plain 0xD0 does.
    b.write(0, 0xD0);
    assert!(b.fdc.intrq_r());
    assert!(b.run_until_idle(ms(1)));
    assert!(!b.fdc.intrq_r());
}

#[test]
fn index_interrupt_fires_every_revolution() {
    let mut b = TestBench::new(SyntheticDrive::new());
    assert!(b.command(0xD4, ms(1)));
    assert!(!b.fdc.intrq_r());

    b.run_until(ms(50));
    assert!(b.fdc.intrq_r());
    b.read(0);
    assert!(!b.fdc.intrq_r());

    b.run_until(ms(100));
    assert!(b.fdc.intrq_r());

    assert!(b.command(0xD0, ms(1)));
    assert!(!b.fdc.intrq_r());
    b.run_until(ms(150));
    assert!(!b.fdc.intrq_r());
}

#[test]
fn id_scan_gives_up_on_fifth_index_pulse() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    b.advance(ms(1));
    set_regs(&mut b, 5, 9);
    b.write(0, 0x88);

    b.run_until(ms(200) + us(1));
    assert!(b.fdc.is_busy());
    assert_eq!(b.fdc.sub_state(), SubState::ScanId);

    assert!(b.run_until_idle(ms(500)));
    assert_eq!(b.intrq_time, Some(ms(250)));
    assert_ne!(b.read(0) & S_RNF, 0);
    assert!(b.received.is_empty());
}

fn manual_read_bench() -> TestBench {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    b.auto_read = false;
    set_regs(&mut b, 5, 3);
    b.write(0, 0x88);
    b
}

#[test]
fn early_access_replays_to_the_same_result() {
    let mut a = manual_read_bench();
    let mut b = manual_read_bench();

    step_until_drq(&mut a, ms(200));
    step_until_drq(&mut b, ms(200));
    assert_eq!(a.now, b.now);

    // The decoder has already run on toward the next byte.
    let t = a.now + us(10);
    a.run_until(t);
    b.run_until(t);
    assert!(a.fdc.live_time() > t);

    // A status read in the middle of the decoder's lookahead.
    let s1 = a.read(0);
    let s2 = a.read(0);
    assert_eq!(s1, s2);
    assert_ne!(s1 & S_BUSY, 0);
    assert_ne!(s1 & S_DRQ, 0);
    assert!(a.fdc.live_time() <= t);

    let t = t + us(10);
    a.run_until(t);
    b.run_until(t);
    let first_a = a.read(3);
    let first_b = b.read(3);
    assert_eq!(first_a, first_b);

    a.auto_read = true;
    b.auto_read = true;
    assert!(a.run_until_idle(ms(200)));
    assert!(b.run_until_idle(ms(200)));

    assert_eq!(a.received, b.received);
    assert_eq!(a.now, b.now);
    assert_eq!(a.lines.borrow().drq_rises, b.lines.borrow().drq_rises);
    assert_eq!(a.read(0), b.read(0));

    let mut whole = vec![first_a];
    whole.extend_from_slice(&a.received);
    assert_eq!(whole, sector_pattern(5, 3, 256));
}

#[test]
fn data_register_reads_do_not_advance() {
    let mut b = manual_read_bench();
    step_until_drq(&mut b, ms(200));
    b.advance(us(5));

    let first = b.read(3);
    assert!(!b.fdc.drq_r());
    let live_time = b.fdc.live_time();
    let second = b.read(3);
    assert_eq!(first, second);
    assert_eq!(first, sector_pattern(5, 3, 1)[0]);
    assert_eq!(b.fdc.live_time(), live_time);
    assert_eq!(b.lines.borrow().drq_rises, 1);
}

#[test]
fn unread_bytes_are_lost() {
    let mut b = manual_read_bench();
    assert!(b.run_until_idle(ms(200)));
    assert_ne!(b.read(0) & S_LOST, 0);
    assert_eq!(b.lines.borrow().drq_rises, 1);
    assert!(b.fdc.drq_r());
}

#[test]
fn seek_with_verify_finds_the_track() {
    let mut b = TestBench::new(SyntheticDrive::formatted(8, 1, 1));
    b.write(3, 3);
    // Seek, verify, 6ms steps, with spin-up.
    assert!(b.command(0x14, ms(1000)));
    assert_eq!(b.drive.borrow().cyl, 3);
    assert_eq!(b.read(1), 3);
    let status = b.read(0);
    assert_eq!(status & (S_RNF | S_CRC | S_BUSY), 0);
    assert_ne!(status & S_SPIN, 0);
    assert_ne!(status & S_MON, 0);
}

#[test]
fn seek_verify_fails_on_wrong_cylinder() {
    let mut drive = SyntheticDrive::formatted(8, 1, 1);
    drive.set_track(3, &format_track(7, 0, &[1], 1));
    let mut b = TestBench::new(drive);
    b.write(3, 3);
    assert!(b.command(0x1C, ms(1000)));
    assert_eq!(b.read(1), 3);
    assert_ne!(b.read(0) & S_RNF, 0);
}

#[test]
fn seek_to_current_track_does_not_step() {
    let mut b = bench_at(4, SyntheticDrive::new());
    b.write(1, 4);
    b.write(3, 4);
    b.advance(us(50));
    assert!(b.command(0x18, ms(100)));
    assert_eq!(b.drive.borrow().step_ct, 0);
    assert_eq!(b.read(1), 4);
}

#[test]
fn steps_follow_direction_and_update_flag() {
    let mut b = bench_at(2, SyntheticDrive::new());
    b.write(1, 2);
    b.advance(us(50));

    let drive = b.drive.clone();
    let expect = |b: &mut TestBench, cmd: u8, cyl: u8, track: u8| {
        assert!(b.command(cmd, ms(100)), "command {:02X}", cmd);
        assert_eq!(drive.borrow().cyl, cyl, "command {:02X}", cmd);
        assert_eq!(b.read(1), track, "command {:02X}", cmd);
    };

    expect(&mut b, 0x58, 3, 3); // step in, update
    expect(&mut b, 0x78, 2, 2); // step out, update
    expect(&mut b, 0x48, 3, 2); // step in
    expect(&mut b, 0x28, 4, 2); // step, same direction
    expect(&mut b, 0x38, 5, 3); // step, same direction, update
    expect(&mut b, 0x68, 4, 3); // step out
}

#[test]
fn read_id_streams_first_id_field() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    b.write(2, 0x77);
    b.advance(us(50));
    assert!(b.command(0xC8, ms(200)));

    assert_eq!(b.received.len(), 6);
    let id = &b.received;
    assert_eq!(id[0], 5);
    assert_eq!(id[1], 0);
    assert!((1..=4).contains(&id[2]));
    assert_eq!(id[3], 1);
    let crc = crc_ccitt(CRC_INIT, &[0xA1, 0xA1, 0xA1, ID_ADDRESS_MARK, id[0], id[1], id[2], id[3]]);
    assert_eq!(&id[4..6], &crc.to_be_bytes());

    // The track address lands in the sector register.
    assert_eq!(b.read(2), 5);
    assert_eq!(b.read(0) & (S_CRC | S_RNF | S_LOST), 0);
}

#[test]
fn read_id_without_ids_sets_rnf() {
    let mut b = bench_at(70, SyntheticDrive::formatted(8, 4, 1));
    assert!(b.command(0xC8, ms(500)));
    assert_ne!(b.read(0) & S_RNF, 0);
    assert!(b.received.is_empty());
}

#[test]
fn read_track_returns_one_revolution() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    assert!(b.command(0xE8, ms(300)));

    // One revolution starting and ending at the index pulse.
    assert_eq!(b.intrq_time, Some(ms(100)));
    let len = b.received.len();
    assert!((1540..=1575).contains(&len), "read {} bytes", len);
    for s in 1..=4u8 {
        let header = [0xA1, ID_ADDRESS_MARK, 5, 0, s, 1];
        assert!(
            b.received.windows(header.len()).any(|w| w == header),
            "ID field of sector {} missing",
            s
        );
    }
    assert_eq!(b.read(0) & S_LOST, 0);
}

/// Four 256-byte sectors behind an index address mark.
fn track_with_index_mark(c: u8) -> MfmTrackBuilder {
    let mut track = MfmTrackBuilder::new();
    track.index_field();
    for s in 1..=4u8 {
        track
            .id_field(c, 0, s, 1, false)
            .data_field(DATA_ADDRESS_MARK, &sector_pattern(c, s, 256), false);
    }
    track.fill_to(TEST_TRACK_CELLS);
    track
}

#[test]
fn index_mark_does_not_disturb_sector_crc() {
    for s in [1u8, 4] {
        let mut drive = SyntheticDrive::new();
        drive.set_track(5, &track_with_index_mark(5));
        let mut b = bench_at(5, drive);
        set_regs(&mut b, 5, s);

        assert!(b.command(0x88, ms(200)));
        assert_eq!(b.received, sector_pattern(5, s, 256), "sector {}", s);
        assert_eq!(b.read(0) & (S_CRC | S_RNF | S_LOST), 0, "sector {}", s);
    }
}

#[test]
fn read_track_realigns_on_index_mark() {
    let mut drive = SyntheticDrive::new();
    drive.set_track(5, &track_with_index_mark(5));
    let mut b = bench_at(5, drive);
    assert!(b.command(0xE8, ms(300)));

    let iam = [0xC2, 0xC2, INDEX_ADDRESS_MARK];
    let pos = b
        .received
        .windows(iam.len())
        .position(|w| w == iam)
        .expect("index address mark missing");
    let header = [0xA1, ID_ADDRESS_MARK, 5, 0, 1, 1];
    assert!(b.received[pos..].windows(header.len()).any(|w| w == header));
    assert_eq!(b.read(0) & S_LOST, 0);
}

#[test]
fn data_crc_error_is_reported_after_transfer() {
    let data = sector_pattern(5, 1, 256);
    let mut drive = SyntheticDrive::new();
    drive.set_track(5, &single_sector_track(5, 1, DATA_ADDRESS_MARK, &data, true));
    let mut b = bench_at(5, drive);
    set_regs(&mut b, 5, 1);

    assert!(b.command(0x88, ms(200)));
    assert_eq!(b.received, data);
    let status = b.read(0);
    assert_ne!(status & S_CRC, 0);
    assert_eq!(status & S_RNF, 0);
}

#[test]
fn deleted_data_mark_sets_ddm() {
    let data = sector_pattern(5, 1, 256);
    let mut drive = SyntheticDrive::new();
    drive.set_track(5, &single_sector_track(5, 1, DELETED_DATA_ADDRESS_MARK, &data, false));
    let mut b = bench_at(5, drive);
    set_regs(&mut b, 5, 1);

    assert!(b.command(0x88, ms(200)));
    assert_eq!(b.received, data);
    let status = b.read(0);
    assert_ne!(status & S_DDM, 0);
    assert_eq!(status & (S_CRC | S_RNF), 0);
}

#[test]
fn multiple_sector_read_ends_with_rnf() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    set_regs(&mut b, 5, 1);
    assert!(b.command(0x98, ms(1000)));

    let expected: Vec<u8> = (1..=4).flat_map(|s| sector_pattern(5, s, 256)).collect();
    assert_eq!(b.received, expected);
    assert_eq!(b.read(2), 5);
    assert_ne!(b.read(0) & S_RNF, 0);
}

#[test]
fn motor_stops_after_idle_revolutions() {
    let mut b = TestBench::new(SyntheticDrive::formatted(2, 1, 1));
    assert!(b.command(0x08, ms(1)));
    assert!(b.drive.borrow().motor);
    assert_ne!(b.read(0) & S_MON, 0);

    b.run_until(ms(249));
    assert!(b.drive.borrow().motor);
    b.run_until(ms(251));
    assert!(!b.drive.borrow().motor);
    assert_eq!(b.read(0) & S_MON, 0);
}

#[test]
fn type_i_status_reflects_drive_sensors() {
    let mut drive = SyntheticDrive::new();
    drive.write_protect = true;
    let mut b = TestBench::new(drive);
    assert!(b.command(0x08, ms(1)));

    b.run_until(ms(10));
    let status = b.read(0);
    assert_ne!(status & S_WP, 0);
    assert_ne!(status & S_TR00, 0);
    assert_eq!(status & S_IP, 0);

    // Inside the index hole.
    b.run_until(ms(51));
    assert_ne!(b.read(0) & S_IP, 0);
}

#[test]
fn register_writes_commit_after_delay() {
    let mut fdc = Wd1772::new(Wd1772Config::default(), Box::new(NullLines));
    fdc.write(1, 0x22, SimTime::ZERO);
    fdc.write(1, 0x33, SimTime::ZERO);
    assert_eq!(fdc.read(1, us(15)), 0);
    fdc.run_until(us(16));
    assert_eq!(fdc.read(1, us(16)), 0x22);

    fdc.dden_w(true);
    fdc.write(2, 9, us(100));
    fdc.run_until(us(131));
    assert_eq!(fdc.read(2, us(131)), 0);
    fdc.run_until(us(132));
    assert_eq!(fdc.read(2, us(132)), 9);

    fdc.dden_w(false);
    fdc.write(0, 0xD0, us(200));
    assert!(fdc.command_pending());
    assert_eq!(fdc.next_event(), Some((TimerId::Command, us(223))));
    fdc.run_until(us(223));
    assert!(!fdc.command_pending());
}

#[test]
fn no_medium_keeps_syncing() {
    let mut fdc = Wd1772::new(Wd1772Config::default(), Box::new(NullLines));
    fdc.write(0, 0x88, SimTime::ZERO);
    fdc.run_until(ms(10));
    assert!(fdc.is_busy());
    assert_eq!(fdc.main_state(), MainState::ReadSector);
    let (id, at) = fdc.next_event().expect("decoder sync timer");
    assert_eq!(id, TimerId::Generic);
    assert!(at > ms(10) && at <= ms(11));

    fdc.write(0, 0xD0, ms(10));
    fdc.run_until(ms(11));
    assert!(!fdc.is_busy());
    assert_eq!(fdc.live_state(), LiveState::Idle);
    assert_eq!(fdc.next_event(), None);
}

#[test]
fn io_ports_map_from_base() {
    let config = Wd1772Config {
        io_base: 0xF0,
        ..Default::default()
    };
    let mut fdc = Wd1772::new(config, Box::new(NullLines));
    let ports = fdc.port_list();
    assert_eq!(ports.len(), 4);
    assert_eq!(ports[3].1, 0xF3);

    fdc.write_u8(0xF1, 7, SimTime::ZERO);
    fdc.run_until(us(20));
    assert_eq!(fdc.read_u8(0xF1, us(20)), 7);
    assert_eq!(fdc.read_u8(0xF5, us(20)), NO_IO_BYTE);
    assert_eq!(fdc.read_u8(0x10, us(20)), NO_IO_BYTE);

    assert!(matches!(fdc.try_read(4, us(20)), Err(FdcError::BadRegister(4))));
    assert!(fdc.try_write(2, 1, us(20)).is_ok());
}

#[test]
fn drive_selection_hands_over_motor() {
    let a = SyntheticDrive::new().into_shared();
    let b = SyntheticDrive::new().into_shared();
    let mut fdc = Wd1772::new(Wd1772Config::default(), Box::new(NullLines));
    fdc.set_floppy(Some(a.clone()));

    fdc.write(0, 0x08, SimTime::ZERO);
    fdc.run_until(ms(1));
    assert!(a.borrow().motor);

    fdc.set_floppy(Some(b.clone()));
    assert!(!a.borrow().motor);
    assert!(b.borrow().motor);

    let same: Rc<RefCell<SyntheticDrive>> = b.clone();
    fdc.set_floppy(Some(same));
    assert!(b.borrow().motor);

    fdc.set_floppy(None);
    assert!(!b.borrow().motor);
}

#[test]
fn reset_abandons_command() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    set_regs(&mut b, 5, 3);
    b.write(0, 0x88);
    while b.received.len() < 10 {
        assert!(b.step(ms(200)));
    }
    b.fdc.reset();
    b.check_invariants();
    assert_eq!(b.fdc.main_state(), MainState::Idle);
    assert!(!b.fdc.drq_r());
    assert!(!b.fdc.intrq_r());
    assert_eq!(b.fdc.next_event(), None);
    assert_eq!(b.read(1), 0);
}

#[test]
fn debug_state_keeps_command_history() {
    let config = Wd1772Config {
        history_len: 2,
        ..Default::default()
    };
    let mut drive = SyntheticDrive::new();
    drive.cyl = 1;
    let mut b = TestBench::with_config(config, drive);
    assert!(b.command(0x08, ms(100)));
    let state = b.fdc.debug_state();
    assert_eq!(state.cmd_log.len(), 2);
    assert!(state.cmd_log[0].contains("restore"));
    assert!(state.cmd_log[1].contains("end"));
    assert!(state.motor_on);

    assert!(b.command(0xD0, ms(1)));
    let state = b.fdc.debug_state();
    assert_eq!(state.cmd_log.len(), 2);
    assert!(state.cmd_log[1].contains("interrupt D0"));
}

#[test]
fn unsupported_write_commands_are_ignored() {
    let mut b = bench_at(5, SyntheticDrive::formatted(8, 4, 1));
    assert!(b.command(0xA8, ms(1)));
    assert!(b.command(0xF8, ms(1)));
    assert!(!b.fdc.is_busy());
    assert!(!b.fdc.intrq_r());
    assert!(b.received.is_empty());
}
