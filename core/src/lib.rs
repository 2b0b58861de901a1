//! `ibm7080_core`: the cycle-faithful decimal CPU and channel-controller simulation core for the
//! IBM-7080-class business computer family (§1).
//!
//! A [`Machine`] owns the character-addressed main store ([`memory::Memory`]), the accumulator
//! window store ([`asu::WindowStore`]), the register file ([`registers::Registers`]), the
//! persistent model configuration ([`model::Config`]), and the channel subsystem
//! ([`channel::Channels`]). [`Machine::step`] advances one instruction per call, returning an
//! [`executor::StepOutcome`] instead of unwinding a `Result` — see §11 for the reasoning.

pub mod asu;
pub mod bcd;
pub mod channel;
pub mod compare;
pub mod decode;
pub mod device;
pub mod digit;
pub mod executor;
pub mod interrupt;
pub mod memory;
pub mod model;
pub mod registers;
pub mod state;

use asu::WindowStore;
use channel::{ChannelKind, ChannelOutcome, Channels};
use executor::{StepOutcome, TraceEntry};
use memory::Memory;
use model::{Config, Model};
use registers::Registers;

const FAULT_MACHINE_CHECK: u16 = 1 << 5;
const FAULT_IO_CHECK: u16 = 1 << 6;
const FAULT_RECORD_CHECK: u16 = 1 << 7;

/// The top-level simulated machine: one CPU, its accumulator window store, and its attached
/// channel subsystem.
pub struct Machine {
    pub memory: Memory,
    pub store: WindowStore,
    pub regs: Registers,
    pub config: Config,
    pub channels: Channels,
    trace: Option<Vec<TraceEntry>>,
}

impl Machine {
    /// Build a freshly configured, powered-down machine for `model` with `installed` characters
    /// of main memory (before model clamping — see [`Config::effective_memory`]).
    pub fn new(model: Model, installed: u32) -> Self {
        let config = Config::new(model, installed);
        let store = if config.has_asus() {
            WindowStore::new_asu()
        } else {
            WindowStore::new_flat()
        };
        Self {
            memory: Memory::new(config.effective_memory()),
            store,
            regs: Registers::new(),
            config,
            channels: Channels::new(),
            trace: None,
        }
    }

    /// Convenience constructor for tests: a Mid-class (20K/40K) machine at its maximum size.
    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self::new(Model::ModelMid, 40_000)
    }

    /// Turn on (or off) the history-trace ring buffer (§13). Off by default; no formatting is
    /// performed here, only retired-instruction bookkeeping.
    pub fn set_trace_enabled(&mut self, enabled: bool) {
        self.trace = if enabled { Some(Vec::new()) } else { None };
    }

    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    /// Advance the machine by exactly one instruction.
    pub fn step(&mut self) -> StepOutcome {
        executor::step(
            &mut self.memory,
            &mut self.store,
            &mut self.regs,
            &self.config,
            self.trace.as_mut(),
        )
    }

    /// Sweep the channel scheduler by exactly one round-robin step (§4.8), the companion call a
    /// run loop makes between (or instead of) `step()` calls per §5's cooperative-scheduling
    /// model. Memory access is routed through `self.memory` the same way the executor's own
    /// channel-facing verbs record `mac` for a later command.
    ///
    /// An [`ChannelOutcome::Attention`] mid-transfer (§8 scenario 5: "channel attention
    /// mid-read") is translated into the matching trap-class flag here, grounded on `chan_proc`'s
    /// branch 2 (§4.8): unit-record-class channels set `io_check`, tape/high-speed-class channels
    /// set `record_check`. Tape/high-speed channels also OR their slot bit into
    /// `regs.pending_channel_irq` on both `Attention` and normal `Disconnected` completion (the
    /// original's "push an interrupt request bit for the channel", raised from two call sites),
    /// feeding [`crate::interrupt::enter_channel`].
    pub fn tick_channels(&mut self) -> (usize, ChannelOutcome) {
        // `Channels::tick` wants two independent closures (read and write). Building both
        // directly over `&mut self.memory` would alias it — one reborrow shared, one exclusive
        // — for the whole call, so route both through a `RefCell` instead: each closure only
        // ever holds the cell's *shared* reference and borrows it mutably just for its own call.
        let memory = std::cell::RefCell::new(&mut self.memory);
        let mut flags = self.regs.flags;
        let mut read_char = |addr: u32| memory.borrow_mut().read_char(addr, FAULT_MACHINE_CHECK, &mut flags);
        let mut write_char = |addr: u32, v: u8| memory.borrow_mut().write_char(addr, v);
        let (idx, outcome) = self.channels.tick(&mut read_char, &mut write_char);
        self.regs.flags = flags;

        let is_completion = matches!(outcome, ChannelOutcome::Attention | ChannelOutcome::Disconnected { .. });
        if is_completion {
            let kind = self.channels.get(idx).map(|c| c.kind);
            match kind {
                Some(ChannelKind::Polled) => {
                    if outcome == ChannelOutcome::Attention {
                        self.regs.flags.latch(FAULT_IO_CHECK);
                    }
                }
                Some(ChannelKind::Tape) | Some(ChannelKind::HighSpeed) => {
                    if outcome == ChannelOutcome::Attention {
                        self.regs.flags.latch(FAULT_RECORD_CHECK);
                    }
                    // §4.8 step 2 / `i7080_chan.c`: both the attention branch and the normal
                    // transfer-complete branch push a per-channel interrupt request bit for
                    // tape/high-speed kinds, consumed by `interrupt::enter_channel`.
                    self.regs.pending_channel_irq |= 1u16 << idx;
                }
                None => {}
            }
        }
        (idx, outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::{Channel, ChannelKind};
    use crate::device::{ChannelCommand, ChannelModifiers, Device, DeviceEvent, DeviceStatus};

    struct StubDevice {
        events: Vec<DeviceEvent>,
    }

    impl Device for StubDevice {
        fn unit(&self) -> u8 {
            0
        }

        fn command(
            &mut self,
            _cmd: Option<ChannelCommand>,
            _modifiers: ChannelModifiers,
            _outgoing: Option<u8>,
        ) -> DeviceEvent {
            if self.events.is_empty() {
                DeviceEvent::Disconnect(DeviceStatus(0))
            } else {
                self.events.remove(0)
            }
        }

        fn is_busy(&self) -> bool {
            !self.events.is_empty()
        }
    }

    #[test]
    fn tick_channels_latches_record_check_on_tape_attention() {
        let mut machine = Machine::new_for_test();
        let mut channel = Channel::new(ChannelKind::Tape);
        channel.attach(Box::new(StubDevice {
            events: vec![DeviceEvent::Attention(DeviceStatus(0))],
        }));
        machine.channels.install(0, channel);
        machine
            .channels
            .get_mut(0)
            .unwrap()
            .state
            .begin(100, ChannelModifiers(0));

        let (idx, outcome) = machine.tick_channels();
        assert_eq!(idx, 0);
        assert_eq!(outcome, ChannelOutcome::Attention);
        assert!(machine.regs.flags.record_check());
    }

    #[test]
    fn fresh_machine_starts_at_ic_four() {
        let machine = Machine::new(Model::ModelMid, 40_000);
        assert_eq!(machine.regs.ic, 4);
    }

    #[test]
    fn trace_is_off_by_default() {
        let machine = Machine::new_for_test();
        assert!(machine.trace().is_none());
    }

    #[test]
    fn enabling_trace_records_retired_instructions() {
        let mut machine = Machine::new_for_test();
        machine.set_trace_enabled(true);
        machine.memory.write_char(4, ibm7080_opcodes::Opcode::Nop as u8);
        machine.memory.write_char(3, 0);
        machine.memory.write_char(2, 0);
        machine.memory.write_char(1, 0);
        machine.memory.write_char(0, 0);
        machine.step();
        assert_eq!(machine.trace().unwrap().len(), 1);
    }
}
