//! C5 (§4.3): the instruction executor — the per-cycle state machine that ties fetch/decode,
//! the BCD and compare engines, and the interrupt logic together.
//!
//! Each call checks for a pending trap disposition first, then fetches and decodes the next
//! instruction and dispatches it by verb, returning a status value for the caller to loop on
//! instead of unwinding a `Result`.

use crate::asu::WindowStore;
use crate::decode::{self, Decoded, FAULT_INSTRUCTION};
use crate::digit::Sign;
use crate::interrupt;
use crate::memory::Memory;
use crate::model::Config;
use crate::registers::{Accumulator, Registers};
use ibm7080_opcodes::{operand_class, Opcode, OperandClass, Primitive};

/// Why `step` stopped making progress, for the caller's run loop (§7).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HaltReason {
    ProgrammedHalt,
    UnimplementedInstruction,
    UndefinedInstruction,
    Breakpoint,
    InfiniteLoop,
    ColdLoadComplete,
    ColdDumpComplete,
    AutoRestartDisabled,
    PowerOff,
    /// A latched `instruction` trap was also a stop condition.
    InstructionCheck,
    /// A latched `machine_check` trap was also a stop condition.
    MachineCheck,
    /// A latched `io_check` trap was also a stop condition.
    IoCheck,
    /// A latched `record_check` trap was also a stop condition.
    RecordCheck,
    /// A latched `overflow` trap was also a stop condition.
    Overflow,
    /// A latched `sign_mismatch` trap was also a stop condition.
    SignMismatch,
}

/// The per-step result, threaded through instead of a `Result` (§11/REDESIGN FLAGS).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    Continue,
    Halted(HaltReason),
    InterruptEntered,
}

/// One retired instruction, recorded only when a caller supplies a trace sink (§13).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceEntry {
    pub ic: u32,
    pub opcode: Opcode,
    pub register: u8,
    pub address: u32,
    /// Which BCD-engine primitive this opcode bottoms out in, independent of which of several
    /// opcodes sharing that primitive (`ADD`/`RAD`, `SUB`/`RSU`, ...) triggered it.
    pub primitive: Option<Primitive>,
}

/// Step the machine by one instruction.
///
/// Checks for a pending trap-class disposition first (§4.7: an interrupt takes priority over the
/// next fetch), then fetches/decodes at `regs.ic`, dispatches by [`OperandClass`], and advances
/// `ic` to the next five-character boundary.
pub fn step(
    memory: &mut Memory,
    store: &mut WindowStore,
    regs: &mut Registers,
    config: &Config,
    trace: Option<&mut Vec<TraceEntry>>,
) -> StepOutcome {
    if regs.flags.any_flag() && !regs.intprog {
        let latched = regs.flags.latched_traps();
        match interrupt::disposition(latched, config.stop_flags, config.non_stop) {
            interrupt::TrapDisposition::Halt => {
                let reason = match interrupt::trap_class(latched, config.stop_flags) {
                    Some(interrupt::TrapClass::Instruction) => HaltReason::InstructionCheck,
                    Some(interrupt::TrapClass::MachineCheck) => HaltReason::MachineCheck,
                    Some(interrupt::TrapClass::IoCheck) => HaltReason::IoCheck,
                    Some(interrupt::TrapClass::RecordCheck) => HaltReason::RecordCheck,
                    Some(interrupt::TrapClass::Overflow) => HaltReason::Overflow,
                    Some(interrupt::TrapClass::SignMismatch) => HaltReason::SignMismatch,
                    None => HaltReason::UnimplementedInstruction,
                };
                return StepOutcome::Halted(reason);
            }
            interrupt::TrapDisposition::Enter => {
                interrupt::enter(store, regs);
                return StepOutcome::InterruptEntered;
            }
        }
    }

    // Channel-vectored entry (§4.7, §4.8 step 2): a separate trigger from the trap-class ladder
    // above, gated on `pending_channel_irq` rather than the flag word, matching the main loop's
    // second, independent interrupt branch.
    if regs.chwait.is_none()
        && !regs.indflag
        && !regs.bkcmp
        && !regs.intprog
        && regs.intmode
        && regs.pending_channel_irq != 0
    {
        interrupt::enter_channel(store, regs);
        return StepOutcome::InterruptEntered;
    }

    if !decode::is_aligned(regs.ic) {
        regs.flags.latch(FAULT_INSTRUCTION);
        return StepOutcome::Continue;
    }

    let effective_memory = config.effective_memory();
    let read_char = |addr: u32, fault: u16, flags: &mut crate::registers::Flags| {
        memory.read_char(addr, fault, flags)
    };

    let decoded = match decode::decode(
        read_char,
        regs.ic,
        config.model,
        effective_memory,
        regs.indflag,
        &mut regs.flags,
    ) {
        Some(d) => d,
        None => {
            regs.ic = (regs.ic + 5) % effective_memory;
            return StepOutcome::Continue;
        }
    };
    regs.indflag = false;

    let Some(opcode) = Opcode::try_from_u8(decoded.opcode_digit) else {
        regs.flags.latch(FAULT_INSTRUCTION);
        regs.ic = (regs.ic + 5) % effective_memory;
        return StepOutcome::Continue;
    };

    if let Some(trace) = trace {
        trace.push(TraceEntry {
            ic: regs.ic,
            opcode,
            register: decoded.register,
            address: decoded.address,
            primitive: Primitive::for_opcode(opcode),
        });
    }

    let ic_before_dispatch = regs.ic;
    let outcome = dispatch(opcode, &decoded, memory, store, regs, config);

    match outcome {
        StepOutcome::Continue => {
            // Only fall through to the next instruction word if the verb didn't already set a
            // new `ic` itself (a transfer) — matches `do_tr`'s direct `IC = addr` assignment in
            // the source, which skips the normal "fetch advances IC by 5" step entirely.
            if regs.ic == ic_before_dispatch {
                regs.ic = (regs.ic + 5) % effective_memory;
            }
            StepOutcome::Continue
        }
        StepOutcome::Halted(reason) => {
            log::info!("halted at ic={}: {reason:?}", regs.ic);
            StepOutcome::Halted(reason)
        }
        other => other,
    }
}

fn acc_for_register(register: u8, config: &Config) -> Accumulator {
    if !config.has_asus() && register & 0b1 != 0 {
        Accumulator::B
    } else {
        Accumulator::A
    }
}

fn acc_start(register: u8, regs: &Registers, store: &WindowStore, config: &Config) -> u32 {
    match acc_for_register(register, config) {
        Accumulator::A if register == 0 || !config.has_asus() => regs.spc as u32,
        Accumulator::B => regs.spcb as u32,
        Accumulator::A => {
            if register == 0 {
                regs.spc as u32
            } else {
                store.asu_start(regs.spc, register)
            }
        }
    }
}

fn dispatch(
    opcode: Opcode,
    decoded: &Decoded,
    memory: &mut Memory,
    store: &mut WindowStore,
    regs: &mut Registers,
    config: &Config,
) -> StepOutcome {
    let effective_memory = config.effective_memory();
    let read_char = |addr: u32, fault: u16, flags: &mut crate::registers::Flags| {
        memory.read_char(addr, fault, flags)
    };

    match operand_class(opcode) {
        OperandClass::Plain => match opcode {
            Opcode::Hlt => StepOutcome::Halted(HaltReason::ProgrammedHalt),
            _ => StepOutcome::Continue,
        },
        OperandClass::Control => match opcode {
            Opcode::Tr | Opcode::Tra | Opcode::Trs => {
                regs.ic = decoded.address;
                StepOutcome::Continue
            }
            Opcode::Ctl2 => match decoded.register {
                // TIP (optbl `CTL2|001600`): transfer to interrupt program at the operand
                // address. A programmed, voluntary entry distinct from `interrupt::enter`'s
                // trap-triggered one — IC goes to `decoded.address` itself, not a fixed slot.
                14 => {
                    if decoded.address % 5 != 4 {
                        regs.flags.latch(FAULT_INSTRUCTION);
                    } else {
                        interrupt::save(store, regs);
                        regs.intprog = true;
                        regs.spc = 0x200;
                        regs.ic = decoded.address;
                        regs.flags.clear_traps();
                    }
                    StepOutcome::Continue
                }
                // LIP (optbl `CTL2|001700`): leave interrupt program. Operand address 9 means
                // "just restore"; any other address additionally stashes the current context at
                // a computed alternate slot before the unconditional full restore.
                15 => {
                    if decoded.address != 9 {
                        let target = interrupt::lip_partial_save_target(decoded.address);
                        interrupt::save_partial(store, regs, target);
                    }
                    interrupt::leave(store, regs);
                    StepOutcome::Continue
                }
                // Other CTL2 sub-ops (SPC, LFC, UFC, LSB, USB, EIM, LIM, TCT, B, EIA, CNO, TLU,
                // TLH) are not yet implemented; fall back to recording the operand like the
                // other channel-facing verbs below.
                _ => {
                    regs.mac = decoded.address;
                    StepOutcome::Continue
                }
            },
            Opcode::Wr | Opcode::Rd | Opcode::Wre | Opcode::Ctl | Opcode::Ctl3 => {
                // Channel-facing verbs: issuing the actual command is the channel subsystem's
                // job (invoked by the caller's run loop, which owns the `Channels` instance).
                // The executor only records the operand address here.
                regs.mac = decoded.address;
                StepOutcome::Continue
            }
            Opcode::Blm => {
                // Blank memory from `mac2` backwards for `decoded.address` units (register==0:
                // five-char blocks; otherwise single characters), grounded on `OP_BLM`.
                let mac2 = regs.mac2;
                crate::bcd::blank_memory(
                    effective_memory,
                    decoded.register,
                    decoded.address,
                    mac2,
                    |addr, v| memory.write_char(addr, v),
                );
                StepOutcome::Continue
            }
            _ => StepOutcome::Continue,
        },
        OperandClass::Asu => {
            let acc = acc_for_register(decoded.register, config);
            let start = acc_start(decoded.register, regs, store, config);

            match opcode {
                Opcode::Add => {
                    crate::bcd::add_sub(
                        store,
                        start,
                        acc,
                        &mut regs.flags,
                        effective_memory,
                        decoded.address,
                        read_char,
                        false,
                        false,
                    );
                    StepOutcome::Continue
                }
                Opcode::Sub => {
                    crate::bcd::add_sub(
                        store,
                        start,
                        acc,
                        &mut regs.flags,
                        effective_memory,
                        decoded.address,
                        read_char,
                        true,
                        false,
                    );
                    StepOutcome::Continue
                }
                Opcode::Rad => {
                    crate::bcd::add_sub(
                        store,
                        start,
                        acc,
                        &mut regs.flags,
                        effective_memory,
                        decoded.address,
                        read_char,
                        false,
                        true,
                    );
                    StepOutcome::Continue
                }
                Opcode::Rsu => {
                    crate::bcd::add_sub(
                        store,
                        start,
                        acc,
                        &mut regs.flags,
                        effective_memory,
                        decoded.address,
                        read_char,
                        true,
                        true,
                    );
                    StepOutcome::Continue
                }
                Opcode::Mpy => {
                    let new_start =
                        crate::bcd::multiply(store, start, acc, &mut regs.flags, effective_memory, decoded.address, read_char);
                    if acc == Accumulator::B {
                        regs.spcb = new_start as u16;
                    } else {
                        regs.spc = new_start as u16;
                    }
                    StepOutcome::Continue
                }
                Opcode::Div => {
                    crate::bcd::divide(
                        store,
                        start,
                        acc,
                        &mut regs.flags,
                        effective_memory,
                        decoded.address,
                        read_char,
                    );
                    StepOutcome::Continue
                }
                Opcode::Shr => {
                    let n = decoded.register as u32;
                    let new_start = crate::bcd::shift_right(store, start, acc, &mut regs.flags, n);
                    if acc == Accumulator::B {
                        regs.spcb = new_start as u16;
                    } else {
                        regs.spc = new_start as u16;
                    }
                    StepOutcome::Continue
                }
                Opcode::Lng => {
                    crate::bcd::length(store, start, acc, &mut regs.flags, decoded.register as u32);
                    StepOutcome::Continue
                }
                Opcode::Rnd => {
                    crate::bcd::round(store, start, acc, &mut regs.flags);
                    StepOutcome::Continue
                }
                Opcode::Set => {
                    crate::bcd::set(store, start, acc, &mut regs.flags, decoded.register as u32);
                    StepOutcome::Continue
                }
                Opcode::Spr => {
                    crate::bcd::store_print(store, start, acc, &regs.flags);
                    StepOutcome::Continue
                }
                Opcode::Cmp => {
                    let digits = store.read_string(start);
                    crate::compare::compare(
                        &mut regs.flags,
                        acc,
                        &digits,
                        effective_memory,
                        decoded.address,
                        read_char,
                    );
                    StepOutcome::Continue
                }
                Opcode::Tmt => {
                    // Memory-to-memory move (§4.3): `decoded.address` supplies the source
                    // (`MAC`), `regs.mac2` the destination, matching the register file's
                    // "MAC2: secondary-operand effective address" role.
                    let acc_len = store.read_string(start).len();
                    regs.mac = decoded.address;
                    let mac = regs.mac;
                    let mac2 = regs.mac2;
                    crate::bcd::move_memory(
                        effective_memory,
                        decoded.register,
                        acc_len,
                        mac,
                        mac2,
                        memory,
                        &mut regs.flags,
                    );
                    StepOutcome::Continue
                }
                Opcode::Trh => {
                    if regs.flags.compare() == crate::registers::CompareResult::High {
                        regs.ic = decoded.address;
                    }
                    StepOutcome::Continue
                }
                Opcode::Trp => {
                    if regs.flags.compare() != crate::registers::CompareResult::Low {
                        regs.ic = decoded.address;
                    }
                    StepOutcome::Continue
                }
                Opcode::Trz => {
                    if regs.flags.zero(acc) {
                        regs.ic = decoded.address;
                    }
                    StepOutcome::Continue
                }
                Opcode::Tre => {
                    if regs.flags.compare() == crate::registers::CompareResult::Equal {
                        regs.ic = decoded.address;
                    }
                    StepOutcome::Continue
                }
                Opcode::Sgn => {
                    regs.flags.set_sign(acc, Sign::Minus.is_negative());
                    StepOutcome::Continue
                }
                Opcode::Sel => {
                    regs.spc = decoded.address as u16;
                    StepOutcome::Continue
                }
                Opcode::Unl => {
                    // UNL writes the accumulator's raw per-character cells (which on the real
                    // machine already carry a live zone/sign nibble) out to memory; ST instead
                    // derives the units digit's zone fresh from the flag word. This crate's
                    // window-store cells hold bare digit values with the sign tracked once in
                    // `Flags` rather than per character, so under this model the two verbs write
                    // the same field — `store` already does exactly this.
                    crate::bcd::store(
                        store,
                        start,
                        acc,
                        &regs.flags,
                        decoded.address,
                        |addr, v| memory.write_char(addr, v),
                    );
                    StepOutcome::Continue
                }
                Opcode::Ula => {
                    crate::bcd::address::store_address(
                        effective_memory,
                        decoded.address,
                        config.model,
                        regs.mac,
                        |addr, v| memory.write_char(addr, v),
                    );
                    StepOutcome::Continue
                }
                Opcode::St => {
                    crate::bcd::store(
                        store,
                        start,
                        acc,
                        &regs.flags,
                        decoded.address,
                        |addr, v| memory.write_char(addr, v),
                    );
                    StepOutcome::Continue
                }
                Opcode::Snd => {
                    let acc_len = store.read_string(start).len();
                    let mac = decoded.address;
                    let mac2 = regs.mac2;
                    crate::bcd::send(
                        effective_memory,
                        acc_len,
                        mac,
                        mac2,
                        memory,
                        &mut regs.flags,
                    );
                    StepOutcome::Continue
                }
                Opcode::Lod => {
                    regs.indflag = config.indirect_enabled();
                    StepOutcome::Continue
                }
                Opcode::Lda => {
                    let addr = crate::bcd::address::load_address(
                        effective_memory,
                        decoded.address,
                        config.model,
                        read_char,
                        &mut regs.flags,
                    );
                    regs.mac = addr;
                    StepOutcome::Continue
                }
                Opcode::Aam => {
                    // Add-to-Memory (§4.5): the inverse direction of ADD — the accumulator is
                    // only read here, and the memory field at `decoded.address` is the one that
                    // gets rewritten.
                    crate::bcd::add_to_memory(
                        memory,
                        store,
                        start,
                        &mut regs.flags,
                        effective_memory,
                        decoded.address,
                        config.model,
                    );
                    StepOutcome::Continue
                }
                Opcode::Rww => {
                    // Same channel-facing "record the operand, let the run loop issue the
                    // command" handling as the other channel verbs, just classified `Asu` rather
                    // than `Control` in the base-opcode table.
                    regs.mac = decoded.address;
                    StepOutcome::Continue
                }
                Opcode::Nop => StepOutcome::Continue,
                _ => StepOutcome::Continue,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Model;

    fn fresh(model: Model) -> (Memory, WindowStore, Registers, Config) {
        let config = Config::new(model, 10_000.max(match model {
            Model::Model10K => 10_000,
            Model::ModelMid => 40_000,
            Model::ModelSeriesIii => 80_000,
            Model::ModelTop => 160_000,
        }));
        let memory = Memory::new(config.effective_memory());
        let store = if config.has_asus() {
            WindowStore::new_asu()
        } else {
            WindowStore::new_flat()
        };
        let regs = Registers::new();
        (memory, store, regs, config)
    }

    fn write_instruction(memory: &mut Memory, ic: u32, opcode: u8, reg: u8, addr: u32) {
        memory.write_char(ic, opcode);
        memory.write_char(ic - 1, (addr % 10) as u8);
        memory.write_char(ic - 2, (((addr / 10) % 10) as u8) | (((reg & 0b11) as u8) << 4));
        memory.write_char(ic - 3, (((addr / 100) % 10) as u8) | ((((reg >> 2) & 0b11) as u8) << 4));
        memory.write_char(ic - 4, ((addr / 1000) % 10) as u8);
    }

    #[test]
    fn halt_instruction_halts() {
        let (mut memory, mut store, mut regs, config) = fresh(Model::ModelMid);
        regs.ic = 4;
        write_instruction(&mut memory, 4, Opcode::Hlt as u8, 0, 0);
        let outcome = step(&mut memory, &mut store, &mut regs, &config, None);
        assert_eq!(outcome, StepOutcome::Halted(HaltReason::ProgrammedHalt));
    }

    #[test]
    fn unconditional_transfer_sets_ic() {
        let (mut memory, mut store, mut regs, config) = fresh(Model::ModelMid);
        regs.ic = 4;
        write_instruction(&mut memory, 4, Opcode::Tr as u8, 0, 509);
        let outcome = step(&mut memory, &mut store, &mut regs, &config, None);
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(regs.ic, 509);
    }

    #[test]
    fn misaligned_ic_latches_instruction_fault() {
        let (mut memory, mut store, mut regs, config) = fresh(Model::ModelMid);
        regs.ic = 5;
        let outcome = step(&mut memory, &mut store, &mut regs, &config, None);
        assert_eq!(outcome, StepOutcome::Continue);
        assert!(regs.flags.instruction());
    }

    #[test]
    fn stop_mode_halt_reports_the_specific_trap_class() {
        let (mut memory, mut store, mut regs, mut config) = fresh(Model::ModelMid);
        config.non_stop = true;
        config.stop_flags = 1 << 8; // overflow is a stop condition
        regs.ic = 4;
        regs.flags.latch(1 << 8);
        let outcome = step(&mut memory, &mut store, &mut regs, &config, None);
        assert_eq!(outcome, StepOutcome::Halted(HaltReason::Overflow));
    }
}
