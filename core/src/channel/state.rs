//! Per-kind channel state machines (§6/§13), grounded in the three device-class branches inside
//! `chan_proc`'s big switch: `CHAN_UREC`/`CHAN_754` (unit-record, polled one character at a
//! time), `CHAN_7621` (tape, double-buffered A/B five-character parcels with a BCD record-count
//! countdown), and `CHAN_7908` (high-speed, thirty-bit packed five-digit assembly). The drum
//! class dispatches `IO_SDH`/`IO_SDL` through the same high-speed state machine (§13) since the
//! original does not give drums their own transfer shape.

use super::ChannelOutcome;
use crate::device::{ChannelCommand, ChannelModifiers, Device, DeviceEvent};

/// Which per-channel state machine a slot runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelKind {
    /// Unit-record and similar slow polled devices: one character per scheduler tick.
    Polled,
    /// Tape-class devices: double-buffered five-character parcels, record-count aware.
    Tape,
    /// High-speed (drum-class) devices: thirty-bit packed five-digit words.
    HighSpeed,
}

/// Direction of an in-progress transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Direction {
    Read,
    Write,
}

/// Which half of the double buffer is currently draining/filling (tape kind only).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Parcel {
    A,
    B,
}

/// The mutable, kind-specific progress of one channel slot.
pub struct ChannelState {
    kind: ChannelKind,
    busy: bool,
    direction: Direction,
    modifiers: ChannelModifiers,
    /// Next memory address to transfer into/out of.
    addr: u32,
    /// Tape kind: which parcel buffer is active, and how many characters remain in it.
    parcel: Parcel,
    parcel_remaining: u8,
    /// Tape kind: BCD record-count countdown, set by a preceding record-count-set character.
    record_count: Option<u8>,
    /// High-speed kind: digits assembled so far into the current thirty-bit word.
    assembly: Vec<u8>,
}

impl ChannelState {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            busy: false,
            direction: Direction::Read,
            modifiers: ChannelModifiers(0),
            addr: 0,
            parcel: Parcel::A,
            parcel_remaining: 0,
            record_count: None,
            assembly: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.busy
    }

    /// Begin a new transfer at `addr` with the given modifiers. Direction is read from
    /// `modifiers` by convention of the caller (write-select commands set it before calling).
    pub fn begin(&mut self, addr: u32, modifiers: ChannelModifiers) {
        self.busy = true;
        self.addr = addr;
        self.modifiers = modifiers;
        self.direction = if modifiers.control() {
            Direction::Write
        } else {
            Direction::Read
        };
        self.parcel = Parcel::A;
        self.parcel_remaining = 5;
        self.assembly.clear();
    }

    /// Advance this channel's state machine by one character, per its kind.
    pub fn advance(
        &mut self,
        device: &mut dyn Device,
        read_char: &mut impl FnMut(u32) -> u8,
        write_char: &mut impl FnMut(u32, u8),
    ) -> ChannelOutcome {
        match self.kind {
            ChannelKind::Polled => self.advance_polled(device, read_char, write_char),
            ChannelKind::Tape => self.advance_tape(device, read_char, write_char),
            ChannelKind::HighSpeed => self.advance_high_speed(device, read_char, write_char),
        }
    }

    fn advance_polled(
        &mut self,
        device: &mut dyn Device,
        read_char: &mut impl FnMut(u32) -> u8,
        write_char: &mut impl FnMut(u32, u8),
    ) -> ChannelOutcome {
        let outgoing = match self.direction {
            Direction::Write => Some(read_char(self.addr)),
            Direction::Read => None,
        };
        match device.command(None, self.modifiers, outgoing) {
            DeviceEvent::CharacterTransferred(value) => {
                if self.direction == Direction::Read {
                    write_char(self.addr, value);
                }
                let current = self.addr;
                self.addr = self.addr.wrapping_add(1);
                ChannelOutcome::Transferred { addr: current, value }
            }
            DeviceEvent::NotReady => ChannelOutcome::Idle,
            DeviceEvent::Disconnect(status) => {
                self.busy = false;
                ChannelOutcome::Disconnected { eof: status.end_of_file() }
            }
            DeviceEvent::Attention(_) => {
                self.busy = false;
                ChannelOutcome::Attention
            }
        }
    }

    fn advance_tape(
        &mut self,
        device: &mut dyn Device,
        read_char: &mut impl FnMut(u32) -> u8,
        write_char: &mut impl FnMut(u32, u8),
    ) -> ChannelOutcome {
        let outgoing = match self.direction {
            Direction::Write => Some(read_char(self.addr)),
            Direction::Read => None,
        };
        match device.command(None, self.modifiers, outgoing) {
            DeviceEvent::CharacterTransferred(value) => {
                if self.modifiers.record_count_set() && self.parcel_remaining > 0 {
                    self.record_count = Some(value);
                }
                if self.direction == Direction::Read {
                    write_char(self.addr, value);
                }
                let current = self.addr;
                self.addr = self.addr.wrapping_add(1);

                self.parcel_remaining = self.parcel_remaining.saturating_sub(1);
                if self.parcel_remaining == 0 {
                    self.parcel = match self.parcel {
                        Parcel::A => Parcel::B,
                        Parcel::B => Parcel::A,
                    };
                    self.parcel_remaining = 5;
                    if let Some(count) = self.record_count {
                        let remaining = count.saturating_sub(1);
                        self.record_count = if remaining == 0 { None } else { Some(remaining) };
                        if remaining == 0 {
                            self.busy = false;
                            return ChannelOutcome::Disconnected { eof: false };
                        }
                    }
                }
                ChannelOutcome::Transferred { addr: current, value }
            }
            DeviceEvent::NotReady => ChannelOutcome::Idle,
            DeviceEvent::Disconnect(status) => {
                self.busy = false;
                ChannelOutcome::Disconnected { eof: status.end_of_file() }
            }
            DeviceEvent::Attention(_) => {
                self.busy = false;
                ChannelOutcome::Attention
            }
        }
    }

    fn advance_high_speed(
        &mut self,
        device: &mut dyn Device,
        read_char: &mut impl FnMut(u32) -> u8,
        write_char: &mut impl FnMut(u32, u8),
    ) -> ChannelOutcome {
        let outgoing = match self.direction {
            Direction::Write => Some(read_char(self.addr)),
            Direction::Read => None,
        };
        match device.command(None, self.modifiers, outgoing) {
            DeviceEvent::CharacterTransferred(value) => {
                self.assembly.push(value & 0x3F);
                if self.direction == Direction::Read {
                    write_char(self.addr, value);
                }
                let current = self.addr;
                self.addr = self.addr.wrapping_add(1);
                if self.assembly.len() == 5 {
                    self.assembly.clear();
                }
                ChannelOutcome::Transferred { addr: current, value }
            }
            DeviceEvent::NotReady => ChannelOutcome::Idle,
            DeviceEvent::Disconnect(status) => {
                self.busy = false;
                ChannelOutcome::Disconnected { eof: status.end_of_file() }
            }
            DeviceEvent::Attention(_) => {
                self.busy = false;
                ChannelOutcome::Attention
            }
        }
    }
}
