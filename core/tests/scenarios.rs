//! End-to-end scenario tests, one independently-reporting `#[test]` per case, generated with a
//! `paste`-driven macro turning a list of names into distinctly-named test functions — but with
//! scenarios authored here as Rust literals rather than loaded from an external fixture corpus,
//! since no public single-step-test corpus exists for this instruction set (§12).

use ibm7080_core::channel::{Channel, ChannelKind, ChannelOutcome};
use ibm7080_core::device::{ChannelCommand, ChannelModifiers, Device, DeviceEvent, DeviceStatus};
use ibm7080_core::digit::{bin_to_bcd, RECORD_MARK, STORAGE_MARK, ZONE_MINUS, ZONE_PLUS};
use ibm7080_core::executor::{HaltReason, StepOutcome};
use ibm7080_core::model::Model;
use ibm7080_core::registers::{Accumulator, CompareResult};
use ibm7080_core::Machine;

macro_rules! scenario_tests {
    ($($name:ident),+ $(,)?) => {
        $(
            paste::paste! {
                #[test]
                fn [<scenario_ $name>]() {
                    $name();
                }
            }
        )+
    };
}

scenario_tests! {
    two_digit_add,
    sign_change_subtract,
    zero_extend_multiply,
    indirect_instruction,
    interrupt_save_restore_round_trip,
    store_folds_sign_into_units_zone,
    move_memory_copies_block_until_record_mark,
    store_address_round_trips_through_load_address,
    channel_attention_mid_read,
    tip_then_lip_reached_from_decoded_instructions,
}

/// Write a five-character instruction at `ic` (units digit at `ic`, walked backward), matching
/// the layout `decode.rs` expects.
fn write_instruction(machine: &mut Machine, ic: u32, opcode: u8, register: u8, address: u32) {
    machine.memory.write_char(ic, opcode);
    machine.memory.write_char(ic - 1, (address % 10) as u8);
    machine
        .memory
        .write_char(ic - 2, (((address / 10) % 10) as u8) | (((register & 0b11) as u8) << 4));
    machine.memory.write_char(
        ic - 3,
        (((address / 100) % 10) as u8) | ((((register >> 2) & 0b11) as u8) << 4),
    );
    machine.memory.write_char(ic - 4, ((address / 1000) % 10) as u8);
}

/// Write a signed field into memory, units digit at `addr`, walked backward, matching how
/// `bcd::add_sub` reads a memory operand.
fn write_field(machine: &mut Machine, addr: u32, digits: &[u8], negative: bool) {
    let zone = if negative { ZONE_MINUS } else { ZONE_PLUS };
    let mut cursor = addr;
    for (i, &d) in digits.iter().enumerate() {
        let raw = bin_to_bcd(d) | if i == 0 { zone << 4 } else { 0 };
        machine.memory.write_char(cursor, raw);
        cursor = cursor.wrapping_sub(1);
    }
}

/// Write a digit string into the accumulator window store, units-first at `start`.
fn write_acc(machine: &mut Machine, start: u32, digits: &[u8]) {
    let mut addr = start;
    for &d in digits {
        machine.store.set(addr, bin_to_bcd(d));
        addr = machine.store.next(addr);
    }
    machine.store.set(addr, STORAGE_MARK);
}

/// `12 + 34 = 46`: a straightforward two-digit variable-length add with no sign change.
fn two_digit_add() {
    let mut machine = Machine::new(Model::Model10K, 10_000);
    write_acc(&mut machine, 0, &[2, 1]); // "12", units-first
    write_field(&mut machine, 500, &[4, 3], false); // "34" at memory, units-first backward

    write_instruction(&mut machine, 4, ibm7080_opcodes::Opcode::Add as u8, 0, 500);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);

    let result = machine.store.read_string(0);
    assert_eq!(result, vec![6, 4]); // "46" units-first
    assert!(!machine.regs.flags.a_sign());
}

/// `12 - 34 = -22`: a subtract that borrows past the end of the smaller operand and flips sign.
fn sign_change_subtract() {
    let mut machine = Machine::new(Model::Model10K, 10_000);
    write_acc(&mut machine, 0, &[2, 1]); // "12"
    write_field(&mut machine, 500, &[4, 3], false); // "34"

    write_instruction(&mut machine, 4, ibm7080_opcodes::Opcode::Sub as u8, 0, 500);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);

    let result = machine.store.read_string(0);
    assert_eq!(result, vec![2, 2]); // "22"
    assert!(machine.regs.flags.a_sign());
}

/// `99 x 99 = 9801`, verifying the `next_half` mirror positioning for a two-digit-by-two-digit
/// multiply.
fn zero_extend_multiply() {
    let mut machine = Machine::new(Model::Model10K, 10_000);
    write_acc(&mut machine, 0, &[9, 9]); // "99" multiplier
    write_field(&mut machine, 500, &[9, 9], false); // "99" multiplicand

    write_instruction(&mut machine, 4, ibm7080_opcodes::Opcode::Mpy as u8, 0, 500);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);

    let product_start = machine.store.next_half(0);
    let product = machine.store.read_string(product_start);
    let value: u32 = product.iter().rev().fold(0, |acc, &d| acc * 10 + d as u32);
    assert_eq!(value, 9801);
}

/// An instruction executed with the Top model's one-shot `indflag` register set: the decoded
/// address is re-resolved one level through a second instruction word before the verb runs.
fn indirect_instruction() {
    let mut machine = Machine::new(Model::ModelTop, 160_000);
    // TR through an indirect pointer at address 504 (aligned), target 999.
    write_instruction(&mut machine, 199, ibm7080_opcodes::Opcode::Tr as u8, 0, 504);
    write_instruction(&mut machine, 504, 0, 0, 999);
    machine.regs.ic = 199;
    machine.regs.indflag = true;

    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);
    assert_eq!(machine.regs.ic, 999);
}

/// Latching a trap-class flag in non-stop mode saves state and transfers to the interrupt entry
/// point; `LIP` then restores it exactly.
fn interrupt_save_restore_round_trip() {
    let mut machine = Machine::new(Model::ModelMid, 40_000);
    machine.config.non_stop = true;
    machine.regs.ic = 2009;
    machine.regs.spc = 42;

    machine.regs.flags.latch(1 << 8); // overflow
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::InterruptEntered);
    assert!(machine.regs.intprog);
    assert_eq!(machine.regs.ic, ibm7080_core::interrupt::INTERRUPT_ENTRY_IC);

    let mut restored = ibm7080_core::registers::Registers::new();
    ibm7080_core::interrupt::restore(&machine.store, &mut restored);
    assert_eq!(restored.ic, 2009);
    assert_eq!(restored.spc, 42);
    assert!(restored.flags.overflow());

    ibm7080_core::interrupt::leave(&machine.store, &mut machine.regs);
    assert!(!machine.regs.intprog);
    // Clearing trap bits across LIP is the handler's job (§7), not an automatic effect of leaving.
    assert!(machine.regs.flags.overflow());
    assert_eq!(machine.regs.ic, 2009);
}

/// `TIP`/`LIP` reached by actually decoding and executing `CTL2` register 14/15, not by calling
/// `interrupt::enter`/`leave` directly: a program voluntarily enters via `TIP`, the handler runs,
/// then `LIP` (sentinel operand 9: "just restore") returns to the caller's saved state.
fn tip_then_lip_reached_from_decoded_instructions() {
    let mut machine = Machine::new(Model::ModelMid, 40_000);
    machine.regs.ic = 2009; // aligned (2009 % 5 == 4)
    machine.regs.spc = 42;
    machine.regs.flags.latch(1 << 8); // overflow, to confirm TIP's explicit IRQFLAGS clear

    write_instruction(&mut machine, 2009, ibm7080_opcodes::Opcode::Ctl2 as u8, 14, 604);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);
    assert!(machine.regs.intprog);
    assert_eq!(machine.regs.ic, 604);
    assert_eq!(machine.regs.spc, 0x200);
    assert!(!machine.regs.flags.overflow()); // TIP clears the trap-class mask on entry

    write_instruction(&mut machine, 604, ibm7080_opcodes::Opcode::Ctl2 as u8, 15, 9);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);
    assert!(!machine.regs.intprog);
    assert_eq!(machine.regs.ic, 2009);
    assert_eq!(machine.regs.spc, 42);
    assert!(machine.regs.flags.overflow()); // restored from the TIP-time save, not re-cleared
}

/// ST writes the accumulator's digit field to memory, folding its sign into the units digit's
/// zone.
fn store_folds_sign_into_units_zone() {
    let mut machine = Machine::new(Model::Model10K, 10_000);
    write_acc(&mut machine, 0, &[4, 3]); // "34", units-first
    machine.regs.flags.set_sign(Accumulator::A, true); // negative

    write_instruction(&mut machine, 4, ibm7080_opcodes::Opcode::St as u8, 0, 500);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);

    let mut flags = machine.regs.flags;
    let units = machine.memory.read_char(500, 0, &mut flags);
    let tens = machine.memory.read_char(499, 0, &mut flags);
    assert_eq!(units & 0xF, bin_to_bcd(4));
    assert_eq!(units >> 4, ZONE_MINUS);
    assert_eq!(tens, bin_to_bcd(3));
}

/// TMT (register 0) copies five-character blocks from the source backward until a block's units
/// digit is the record mark, then stops after copying that block.
fn move_memory_copies_block_until_record_mark() {
    let mut machine = Machine::new(Model::Model10K, 10_000);
    machine.memory.write_char(510, RECORD_MARK);
    machine.memory.write_char(509, 1);
    machine.memory.write_char(508, 2);
    machine.memory.write_char(507, 3);
    machine.memory.write_char(506, 4);
    machine.regs.mac2 = 520;

    write_instruction(&mut machine, 4, ibm7080_opcodes::Opcode::Tmt as u8, 0, 510);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);

    let mut flags = machine.regs.flags;
    assert_eq!(machine.memory.read_char(520, 0, &mut flags), RECORD_MARK);
    assert_eq!(machine.memory.read_char(519, 0, &mut flags), 1);
    assert_eq!(machine.memory.read_char(518, 0, &mut flags), 2);
    assert_eq!(machine.memory.read_char(517, 0, &mut flags), 3);
    assert_eq!(machine.memory.read_char(516, 0, &mut flags), 4);
}

/// ULA followed by LDA round-trips an address through memory on every model, per the §8
/// store-then-load-address law.
fn store_address_round_trips_through_load_address() {
    let mut machine = Machine::new(Model::ModelTop, 160_000);
    machine.regs.mac = 123_456 % machine.config.effective_memory();

    write_instruction(&mut machine, 4, ibm7080_opcodes::Opcode::Ula as u8, 0, 600);
    let outcome = machine.step();
    assert_eq!(outcome, StepOutcome::Continue);

    let effective_memory = machine.config.effective_memory();
    let mut flags = machine.regs.flags;
    let decoded = ibm7080_core::bcd::address::load_address(
        effective_memory,
        600,
        machine.config.model,
        |addr, fault, f| machine.memory.read_char(addr, fault, f),
        &mut flags,
    );
    assert_eq!(decoded, machine.regs.mac);
}

/// A device that transfers a handful of characters, then raises attention mid-read instead of
/// disconnecting cleanly — the §8 "channel attention mid-read" scenario.
struct AttentionAfterFewCharsDevice {
    remaining: Vec<u8>,
}

impl Device for AttentionAfterFewCharsDevice {
    fn unit(&self) -> u8 {
        0
    }

    fn command(
        &mut self,
        _cmd: Option<ChannelCommand>,
        _modifiers: ChannelModifiers,
        _outgoing: Option<u8>,
    ) -> DeviceEvent {
        if self.remaining.is_empty() {
            DeviceEvent::Attention(DeviceStatus(0))
        } else {
            DeviceEvent::CharacterTransferred(self.remaining.remove(0))
        }
    }

    fn is_busy(&self) -> bool {
        !self.remaining.is_empty()
    }
}

/// A tape-class channel reading from a device that raises attention after three characters: the
/// first three characters land in memory, the channel goes idle, and `record_check` (the
/// tape/high-speed trap-class flag, §4.8 point 2) latches instead of a clean disconnect.
fn channel_attention_mid_read() {
    let mut machine = Machine::new(Model::ModelMid, 40_000);
    let mut channel = Channel::new(ChannelKind::Tape);
    channel.attach(Box::new(AttentionAfterFewCharsDevice {
        remaining: vec![1, 2, 3],
    }));
    machine.channels.install(0, channel);
    machine
        .channels
        .get_mut(0)
        .unwrap()
        .state
        .begin(700, ChannelModifiers(0));

    for _ in 0..3 {
        let (idx, outcome) = machine.tick_channels();
        assert_eq!(idx, 0);
        assert!(matches!(outcome, ChannelOutcome::Transferred { .. }));
    }

    let mut flags = machine.regs.flags;
    assert_eq!(machine.memory.read_char(700, 0, &mut flags), 1);
    assert_eq!(machine.memory.read_char(701, 0, &mut flags), 2);
    assert_eq!(machine.memory.read_char(702, 0, &mut flags), 3);

    let (idx, outcome) = machine.tick_channels();
    assert_eq!(idx, 0);
    assert_eq!(outcome, ChannelOutcome::Attention);
    assert!(machine.regs.flags.record_check());
    assert!(machine.channels.get(0).unwrap().is_idle());
}

#[allow(dead_code)]
fn unused_imports_guard() {
    let _ = (Accumulator::A, CompareResult::Equal, HaltReason::ProgrammedHalt);
}
