//! C8/C9 (§6): the channel controller.
//!
//! A single-threaded, cooperative scheduler polls up to eleven channel slots in round-robin
//! order once per cycle — grounded in `chan_proc()` (`I7000/i7080_chan.c`), which loops over
//! `chan_unit[]` the same way. Each slot owns one of three state machines (`state`), matching the
//! three device classes the original distinguishes by channel number range: polled unit-record
//! (one character per turnaround), buffered tape (double-buffered A/B five-character parcels with
//! a BCD record-count countdown), and high-speed (thirty-bit packed five-digit assembly).

mod state;

pub use state::{ChannelKind, ChannelState};

use crate::device::{ChannelCommand, ChannelModifiers, Device, DeviceEvent};
use std::collections::HashMap;

/// Maximum number of channel slots, matching the original's `NUM_CHAN`.
pub const MAX_CHANNELS: usize = 11;

/// One channel slot: its kind-specific state machine plus the device currently attached (if any).
pub struct Channel {
    pub kind: ChannelKind,
    pub state: ChannelState,
    device: Option<Box<dyn Device>>,
}

impl Channel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            state: ChannelState::new(kind),
            device: None,
        }
    }

    pub fn attach(&mut self, device: Box<dyn Device>) {
        self.device = Some(device);
    }

    pub fn detach(&mut self) -> Option<Box<dyn Device>> {
        self.device.take()
    }

    pub fn is_idle(&self) -> bool {
        self.device.as_ref().map(|d| !d.is_busy()).unwrap_or(true) && self.state.is_idle()
    }
}

/// Result of one channel's scheduler turn: what the CPU-visible side should do with it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelOutcome {
    /// No event this tick.
    Idle,
    /// One character was moved into or out of memory at `addr`.
    Transferred { addr: u32, value: u8 },
    /// The channel finished its transfer and disconnected. `eof` carries the device's
    /// end-of-file status bit through from the triggering [`crate::device::DeviceStatus`]
    /// (§4.8 point 3), so the scheduler can record it in the per-device io-flags vector.
    Disconnected { eof: bool },
    /// The device raised attention mid-transfer (§8: "Channel attention mid-read").
    Attention,
    /// An error condition (data check, not-ready) was reported.
    Error,
}

/// The full channel subsystem: up to [`MAX_CHANNELS`] slots plus the round-robin cursor.
pub struct Channels {
    slots: Vec<Option<Channel>>,
    cursor: usize,
    /// Per-channel end-of-file latch (§4.8 point 3), set when a disconnect carries the device's
    /// end-of-file status bit. Read (and cleared) by a future "test signal" verb.
    io_flags: Vec<bool>,
}

impl Channels {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_CHANNELS).map(|_| None).collect(),
            cursor: 0,
            io_flags: vec![false; MAX_CHANNELS],
        }
    }

    /// Test-and-clear the end-of-file latch for `channel` (§4.8 point 3).
    pub fn take_io_flag(&mut self, channel: usize) -> bool {
        self.io_flags
            .get_mut(channel)
            .map(|flag| std::mem::take(flag))
            .unwrap_or(false)
    }

    pub fn install(&mut self, index: usize, channel: Channel) {
        self.slots[index % MAX_CHANNELS] = Some(channel);
    }

    pub fn get(&self, index: usize) -> Option<&Channel> {
        self.slots.get(index).and_then(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.slots.get_mut(index).and_then(|c| c.as_mut())
    }

    /// Issue a command to a channel/unit pair, matching `chan_cmd`'s signature.
    pub fn command(
        &mut self,
        channel: usize,
        cmd: ChannelCommand,
        modifiers: ChannelModifiers,
        addr: u32,
    ) -> Option<DeviceEvent> {
        let slot = self.slots.get_mut(channel)?.as_mut()?;
        slot.state.begin(addr, modifiers);
        let device = slot.device.as_mut()?;
        Some(device.command(Some(cmd), modifiers, None))
    }

    /// One round-robin scheduler tick: advance exactly one busy channel's state machine one step
    /// and return its outcome, or [`ChannelOutcome::Idle`] if none were busy. Grounded in
    /// `chan_proc`'s per-call single-channel-advance loop body (the function itself is called
    /// once per simulated cycle by the surrounding CPU loop, not looped to completion here).
    pub fn tick(&mut self, read_char: &mut impl FnMut(u32) -> u8, write_char: &mut impl FnMut(u32, u8)) -> (usize, ChannelOutcome) {
        for offset in 0..MAX_CHANNELS {
            let idx = (self.cursor + offset) % MAX_CHANNELS;
            let outcome = match self.slots[idx].as_mut() {
                Some(slot) if !slot.is_idle() => {
                    let Some(device) = slot.device.as_mut() else {
                        continue;
                    };
                    slot.state.advance(device.as_mut(), read_char, write_char)
                }
                _ => continue,
            };
            self.cursor = (idx + 1) % MAX_CHANNELS;
            match outcome {
                ChannelOutcome::Disconnected { eof } => {
                    log::debug!("channel {idx} disconnected (eof={eof})");
                    if eof {
                        self.io_flags[idx] = true;
                    }
                }
                ChannelOutcome::Attention => log::warn!("channel {idx} raised attention"),
                ChannelOutcome::Error => log::warn!("channel {idx} reported an error"),
                _ => {}
            }
            return (idx, outcome);
        }
        (self.cursor, ChannelOutcome::Idle)
    }

    /// §13: detect duplicate device-number/interrupt-priority/service-request registrations among
    /// enabled devices, returning a human-readable conflict report.
    pub fn validate_configuration(
        &self,
        identities: &[(usize, crate::device::DeviceIdentity)],
    ) -> anyhow::Result<()> {
        let mut seen: HashMap<u16, usize> = HashMap::new();
        let mut conflicts = Vec::new();
        for &(slot, identity) in identities {
            if let Some(&other) = seen.get(&identity.device_number) {
                conflicts.push(format!(
                    "device number {} registered on both channel {} and channel {}",
                    identity.device_number, other, slot
                ));
            } else {
                seen.insert(identity.device_number, slot);
            }
        }
        if conflicts.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("channel configuration conflicts: {}", conflicts.join("; "))
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::{DeviceEvent, DeviceIdentity, DeviceStatus};

    #[test]
    fn round_robin_skips_idle_channels() {
        let channels = Channels::new();
        assert!(channels.get(0).is_none());
    }

    struct OneShotEofDevice {
        delivered: bool,
    }

    impl Device for OneShotEofDevice {
        fn unit(&self) -> u8 {
            0
        }

        fn command(
            &mut self,
            _cmd: Option<ChannelCommand>,
            _modifiers: ChannelModifiers,
            _outgoing: Option<u8>,
        ) -> DeviceEvent {
            if self.delivered {
                let mut status = DeviceStatus(0);
                status.set_end_of_file(true);
                DeviceEvent::Disconnect(status)
            } else {
                self.delivered = true;
                DeviceEvent::CharacterTransferred(1)
            }
        }

        fn is_busy(&self) -> bool {
            true
        }
    }

    #[test]
    fn tick_latches_and_take_io_flag_clears_it() {
        let mut channels = Channels::new();
        let mut channel = Channel::new(ChannelKind::Polled);
        channel.attach(Box::new(OneShotEofDevice { delivered: false }));
        channels.install(0, channel);
        channels.get_mut(0).unwrap().state.begin(0, ChannelModifiers(0));

        channels.tick(&mut |_| 0, &mut |_, _| {});
        assert!(!channels.take_io_flag(0));

        let (idx, outcome) = channels.tick(&mut |_| 0, &mut |_, _| {});
        assert_eq!(idx, 0);
        assert_eq!(outcome, ChannelOutcome::Disconnected { eof: true });
        assert!(channels.take_io_flag(0));
        assert!(!channels.take_io_flag(0));
    }

    #[test]
    fn validate_configuration_reports_duplicate_device_numbers() {
        let channels = Channels::new();
        let a = DeviceIdentity {
            device_number: 5,
            interrupt_priority: 1,
            service_request: 0,
        };
        let b = DeviceIdentity {
            device_number: 5,
            interrupt_priority: 2,
            service_request: 1,
        };
        let result = channels.validate_configuration(&[(0, a), (1, b)]);
        assert!(result.is_err());
    }

    #[test]
    fn validate_configuration_accepts_distinct_devices() {
        let channels = Channels::new();
        let a = DeviceIdentity {
            device_number: 5,
            interrupt_priority: 1,
            service_request: 0,
        };
        let b = DeviceIdentity {
            device_number: 6,
            interrupt_priority: 2,
            service_request: 1,
        };
        assert!(channels.validate_configuration(&[(0, a), (1, b)]).is_ok());
    }
}
