//! C7 (§4.7): the interrupt/trap state machine.
//!
//! On a trap-class flag (see `registers::TRAP_CLASS_MASK`), the machine either halts (if the bit
//! is also set in `stop_flags`) or, in non-stop mode, saves its state to a fixed window-store
//! offset and transfers control to the interrupt entry point — grounded in `store_cpu`/`load_cpu`
//! (`I7000/i7080_cpu.c`), whose byte layout this mirrors.
//!
//! The main loop in the source runs two distinct entry branches, both reachable from this module:
//! a CPU-trap-class branch gated on the flag word (`enter`, fixed entry IC) and a separate
//! channel-vectored branch gated on a per-channel pending-request mask (`enter_channel`, entry IC
//! picked by `select_channel_slot`). `TIP`/`LIP` (executed from `executor::dispatch`'s `Ctl2` arm)
//! are the programmed counterparts: `TIP` enters voluntarily at an operand-supplied address, `LIP`
//! always leaves via the fixed save area regardless of which branch entered.

use crate::asu::WindowStore;
use crate::digit::{bin_to_bcd, STORAGE_MARK};
use crate::registers::Registers;

/// Window-store offset of the interrupt save area (§4.7).
pub const SAVE_AREA: u32 = 0x3E0;
/// IC value the machine resumes at on interrupt entry.
pub const INTERRUPT_ENTRY_IC: u32 = 0x200 + 4;

/// What a trap-class flag resolves to once latched.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrapDisposition {
    /// At least one latched trap bit is also set in `stop_flags`: halt instead of entering the
    /// handler.
    Halt,
    /// No latched bit is a stop condition (and non-stop mode is active): save state and enter the
    /// handler.
    Enter,
}

/// Decide what a newly-latched set of trap bits should do, per §4.7 and §8 invariant 4.
pub fn disposition(latched_traps: u16, stop_flags: u16, non_stop: bool) -> TrapDisposition {
    if latched_traps & stop_flags != 0 || !non_stop {
        TrapDisposition::Halt
    } else {
        TrapDisposition::Enter
    }
}

/// Which trap class forced a [`TrapDisposition::Halt`], in the fixed priority order the main
/// loop's stop-condition ladder checks them in (instruction, machine-check, io-check,
/// record-check, overflow, sign-mismatch — each its own `if` with its own `break`, so the first
/// one present wins).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrapClass {
    Instruction,
    MachineCheck,
    IoCheck,
    RecordCheck,
    Overflow,
    SignMismatch,
}

/// Classify a halting trap for the caller's [`crate::executor::HaltReason`] mapping. Checks the
/// bits the stop mask actually caught first (mirroring the masked `stop_flags & flags` ladder);
/// if stop mode forced the halt with no mask hit (`!non_stop`), falls back to the unmasked
/// `flags` ladder the source runs in that case.
pub fn trap_class(latched_traps: u16, stop_flags: u16) -> Option<TrapClass> {
    let masked = latched_traps & stop_flags;
    let ladder = if masked != 0 { masked } else { latched_traps };
    if ladder & (1 << 4) != 0 {
        Some(TrapClass::Instruction)
    } else if ladder & (1 << 5) != 0 {
        Some(TrapClass::MachineCheck)
    } else if ladder & (1 << 6) != 0 {
        Some(TrapClass::IoCheck)
    } else if ladder & (1 << 7) != 0 {
        Some(TrapClass::RecordCheck)
    } else if ladder & (1 << 8) != 0 {
        Some(TrapClass::Overflow)
    } else if ladder & (1 << 9) != 0 {
        Some(TrapClass::SignMismatch)
    } else {
        None
    }
}

/// Fold one 4-bit flag-word nibble into `store_cpu`'s encoded byte, verbatim from `040 | ((t+8) &
/// 027)`. The `+8` rotates the nibble into a range where the `&027` mask (which clears bit 3)
/// happens not to lose information — `unpack_flags_nibble` is `load_cpu`'s exact inverse.
fn pack_flags_nibble(nibble: u8) -> u8 {
    0o40 | ((nibble as u16 + 8) & 0o27) as u8
}

/// Recover a nibble packed by [`pack_flags_nibble`], verbatim from `load_cpu`'s
/// `(t & 0x7) | ((t >> 1) & 0x8)`.
fn unpack_flags_nibble(byte: u8) -> u8 {
    (byte & 0x7) | ((byte >> 1) & 0x8)
}

/// Pack the top two flag-word bits (13:12), stored unfolded per `040 | t` in `store_cpu`.
fn pack_flags_top(bits: u8) -> u8 {
    0o40 | (bits & 0x3)
}

fn unpack_flags_top(byte: u8) -> u8 {
    byte & 0x3
}

/// Save the running machine's architectural state into the window store at `area`. `full` mirrors
/// `store_cpu`'s second argument: when false, only IC and the flag word are written (the shape the
/// channel-vectored entry and `LIP`'s alternate-slot save use); when true, `spc`/`mac2`/`selreg`
/// and the trailing storage mark follow.
fn save_at(store: &mut WindowStore, regs: &Registers, area: u32, full: bool) {
    let mut addr = area;

    // IC, four BCD digits, units-first.
    let mut ic = regs.ic;
    for _ in 0..4 {
        store.set(addr, bin_to_bcd((ic % 10) as u8));
        ic /= 10;
        addr = store.next(addr);
    }

    // Flag word, folded into four nibble groups: bits 3:0, 7:4, 11:8, each through
    // `pack_flags_nibble`, then the top two bits 13:12 unfolded (`store_cpu`'s four-write loop).
    let raw_flags = regs.flags.into_raw();
    store.set(addr, pack_flags_nibble((raw_flags & 0xF) as u8));
    addr = store.next(addr);
    store.set(addr, pack_flags_nibble(((raw_flags >> 4) & 0xF) as u8));
    addr = store.next(addr);
    store.set(addr, pack_flags_nibble(((raw_flags >> 8) & 0xF) as u8));
    addr = store.next(addr);
    store.set(addr, pack_flags_top(((raw_flags >> 12) & 0x3) as u8));
    addr = store.next(addr);

    if !full {
        return;
    }

    // spc, four BCD-shifted digits.
    let mut spc = regs.spc;
    for _ in 0..4 {
        store.set(addr, bin_to_bcd((spc % 10) as u8));
        spc /= 10;
        addr = store.next(addr);
    }

    // MAC2, stored as a four-digit address field.
    let mut mac2 = regs.mac2;
    for _ in 0..4 {
        store.set(addr, bin_to_bcd((mac2 % 10) as u8));
        mac2 /= 10;
        addr = store.next(addr);
    }

    // selreg, one hex-style digit.
    store.set(addr, bin_to_bcd((regs.selreg % 10) as u8));
    addr = store.next(addr);
    store.set(addr, STORAGE_MARK);
}

/// Restore the running machine's architectural state from `area`. `full` mirrors `load_cpu`'s
/// second argument: when false, only IC and the flag word are read back.
fn restore_at(store: &WindowStore, regs: &mut Registers, area: u32, full: bool) {
    let mut addr = area;

    let mut ic = 0u32;
    let mut scale = 1u32;
    for _ in 0..4 {
        let raw = store.get(addr);
        ic += crate::digit::bcd_to_bin(raw) as u32 * scale;
        scale *= 10;
        addr = store.next(addr);
    }
    regs.ic = ic;

    let mut raw_flags = 0u16;
    raw_flags |= unpack_flags_nibble(store.get(addr)) as u16;
    addr = store.next(addr);
    raw_flags |= (unpack_flags_nibble(store.get(addr)) as u16) << 4;
    addr = store.next(addr);
    raw_flags |= (unpack_flags_nibble(store.get(addr)) as u16) << 8;
    addr = store.next(addr);
    raw_flags |= (unpack_flags_top(store.get(addr)) as u16) << 12;
    addr = store.next(addr);
    regs.flags = crate::registers::Flags(raw_flags);

    if !full {
        return;
    }

    let mut spc = 0u16;
    let mut scale = 1u16;
    for _ in 0..4 {
        let raw = store.get(addr);
        spc += crate::digit::bcd_to_bin(raw) as u16 * scale;
        scale *= 10;
        addr = store.next(addr);
    }
    regs.spc = spc;

    let mut mac2 = 0u32;
    let mut scale = 1u32;
    for _ in 0..4 {
        let raw = store.get(addr);
        mac2 += crate::digit::bcd_to_bin(raw) as u32 * scale;
        scale *= 10;
        addr = store.next(addr);
    }
    regs.mac2 = mac2;

    let raw = store.get(addr);
    regs.selreg = crate::digit::bcd_to_bin(raw) as u16;
}

/// Save the running machine's architectural state into the window store at [`SAVE_AREA`] (full
/// layout: IC, flags, `spc`, `MAC2`, `selreg`).
pub fn save(store: &mut WindowStore, regs: &Registers) {
    save_at(store, regs, SAVE_AREA, true);
}

/// `TIP`'s and the channel-vectored path's `store_cpu(addr, 0)`: IC and flags only, no
/// `spc`/`MAC2`/`selreg`, at a caller-supplied address rather than the fixed save area.
pub fn save_partial(store: &mut WindowStore, regs: &Registers, area: u32) {
    save_at(store, regs, area, false);
}

/// Restore the running machine's architectural state from [`SAVE_AREA`] (the `LIP` verb's full
/// restore, also used by interrupt return).
pub fn restore(store: &WindowStore, regs: &mut Registers) {
    restore_at(store, regs, SAVE_AREA, true);
}

/// Pick a channel-vectored entry slot from `pending`, mirroring the main loop's `temp`/`addr`
/// scan: starting from the lowest channel bit, each miss advances the slot address by 32 and
/// shifts to the next bit, switching banks once five slots have been scanned. Returns the winning
/// bit (to clear from `pending`) and its slot address, or `None` if nothing is pending.
pub fn select_channel_slot(pending: u16) -> Option<(u16, u32)> {
    if pending == 0 {
        return None;
    }
    let mut temp: u16 = 1;
    let mut addr: u32 = 0x200;
    while temp & pending == 0 {
        temp <<= 1;
        addr += 32;
        if temp == 0x20 {
            addr = 0x400;
        }
    }
    Some((temp, addr))
}

/// Enter the interrupt handler on a CPU trap-class flag: save state, clear the one-shot bits
/// §4.7 says entry clears, and point `ic` at [`INTERRUPT_ENTRY_IC`].
pub fn enter(store: &mut WindowStore, regs: &mut Registers) {
    save(store, regs);
    log::debug!("interrupt entry: saved ic={}, spc={}", regs.ic, regs.spc);
    regs.intprog = true;
    regs.indflag = false;
    regs.ic = INTERRUPT_ENTRY_IC;
    // §4.7: "On interrupt entry, intprog := 1, spc := 0x200, ..." — the handler runs against a
    // dedicated accumulator window, independent of whatever `spc` user code was running with.
    regs.spc = 0x200;
}

/// Enter the interrupt handler on a pending channel request (§4.7, §4.8 step 2): full save at
/// [`SAVE_AREA`], then a partial load from the slot `select_channel_slot` picks for
/// `regs.pending_channel_irq`. Panics if no bit is pending — callers must check first.
pub fn enter_channel(store: &mut WindowStore, regs: &mut Registers) {
    save(store, regs);
    let (bit, addr) = select_channel_slot(regs.pending_channel_irq)
        .expect("enter_channel requires a pending channel irq");
    regs.pending_channel_irq &= !bit;
    restore_at(store, regs, addr, false);
    log::debug!("channel interrupt entry: slot={addr:#x}, ic={}", regs.ic);
    regs.intprog = true;
    regs.indflag = false;
    regs.spc = 0x200;
}

/// LIP: a full restore from the save area, clearing `intprog`. Trap-class bits are left exactly
/// as the save area had them — clearing them is the handler's job (§7), not an effect of leaving.
pub fn leave(store: &WindowStore, regs: &mut Registers) {
    restore(store, regs);
    log::debug!("interrupt exit: restored ic={}, spc={}", regs.ic, regs.spc);
    regs.intprog = false;
}

/// `LIP`'s alternate-slot address, decoded from the operand digits (units/tens/hundreds/thousands
/// select one of 8 chars, 4 words, 8 word-sets, and 8 banks respectively) — verbatim from
/// `i7080_cpu.c`'s `OP_CTL2` case 15.
pub fn lip_partial_save_target(address: u32) -> u32 {
    let mut addr = address;
    let mut temp = (addr % 10) & 7;
    addr /= 10;
    temp += (addr % 10 & 3) << 3;
    addr /= 10;
    temp += (addr % 10 & 7) << 5;
    addr /= 10;
    temp += (addr % 10 & 7) << 8;
    temp
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::asu::WindowStore;

    #[test]
    fn save_and_restore_round_trips_ic_spc_mac2_selreg() {
        let mut store = WindowStore::new_asu();
        let mut regs = Registers::new();
        regs.ic = 1234;
        regs.spc = 789;
        regs.mac2 = 4321;
        regs.selreg = 7;

        save(&mut store, &regs);
        let mut restored = Registers::new();
        restore(&store, &mut restored);

        assert_eq!(restored.ic, 1234);
        assert_eq!(restored.spc, 789);
        assert_eq!(restored.mac2, 4321);
        assert_eq!(restored.selreg, 7);
    }

    #[test]
    fn save_and_restore_round_trips_every_flag_bit() {
        let mut store = WindowStore::new_asu();
        let mut regs = Registers::new();
        regs.flags.latch(1 << 5); // machine_check
        regs.flags.latch(1 << 8); // overflow
        regs.flags.set_eight_mode(true);
        regs.flags.set_high_compare(true);

        save(&mut store, &regs);
        let mut restored = Registers::new();
        restore(&store, &mut restored);

        assert_eq!(restored.flags.into_raw(), regs.flags.into_raw());
    }

    #[test]
    fn pack_and_unpack_flags_nibble_round_trips_every_value() {
        for nibble in 0u8..16 {
            assert_eq!(unpack_flags_nibble(pack_flags_nibble(nibble)), nibble);
        }
    }

    #[test]
    fn enter_sets_entry_ic_and_clears_indirect() {
        let mut store = WindowStore::new_asu();
        let mut regs = Registers::new();
        regs.indflag = true;
        enter(&mut store, &mut regs);
        assert_eq!(regs.ic, INTERRUPT_ENTRY_IC);
        assert!(regs.intprog);
        assert!(!regs.indflag);
    }

    #[test]
    fn select_channel_slot_picks_the_lowest_pending_bit() {
        let (bit, addr) = select_channel_slot(0b0110).unwrap();
        assert_eq!(bit, 0b0010);
        assert_eq!(addr, 0x200 + 32);
    }

    #[test]
    fn select_channel_slot_switches_bank_after_five_slots() {
        let (bit, addr) = select_channel_slot(1 << 5).unwrap();
        assert_eq!(bit, 1 << 5);
        assert_eq!(addr, 0x400);
    }

    #[test]
    fn select_channel_slot_is_none_when_nothing_pending() {
        assert_eq!(select_channel_slot(0), None);
    }

    #[test]
    fn enter_channel_saves_then_partially_loads_the_selected_slot() {
        let mut store = WindowStore::new_asu();
        let mut regs = Registers::new();
        regs.ic = 1234;
        regs.spc = 99;
        regs.pending_channel_irq = 0b0001; // channel 0

        enter_channel(&mut store, &mut regs);

        assert!(regs.intprog);
        assert_eq!(regs.spc, 0x200);
        assert_eq!(regs.pending_channel_irq, 0);

        // The selected slot (0x200) was never written before this call, so its IC/flags decode
        // as whatever the fresh window store holds there — zero.
        assert_eq!(regs.ic, 0);

        // The full save at SAVE_AREA still captured the pre-entry state.
        let mut saved = Registers::new();
        restore(&store, &mut saved);
        assert_eq!(saved.ic, 1234);
        assert_eq!(saved.spc, 99);
    }

    #[test]
    fn lip_partial_save_target_matches_the_packed_digit_layout() {
        // Units 3, tens 1, hundreds 0, thousands 0 -> temp = 3 + (1&3)<<3 = 3 + 8 = 11.
        assert_eq!(lip_partial_save_target(13), 11);
    }

    #[test]
    fn stop_flag_bit_forces_halt_even_in_non_stop_mode() {
        let disp = disposition(1 << 5, 1 << 5, true);
        assert_eq!(disp, TrapDisposition::Halt);
    }

    #[test]
    fn non_stop_mode_enters_handler_when_not_a_stop_condition() {
        let disp = disposition(1 << 8, 1 << 5, true);
        assert_eq!(disp, TrapDisposition::Enter);
    }

    #[test]
    fn stop_mode_always_halts() {
        let disp = disposition(1 << 8, 0, false);
        assert_eq!(disp, TrapDisposition::Halt);
    }

    #[test]
    fn trap_class_picks_the_masked_bit_in_priority_order() {
        let latched = (1 << 6) | (1 << 8); // io_check, overflow
        let stop_flags = (1 << 6) | (1 << 8);
        assert_eq!(trap_class(latched, stop_flags), Some(TrapClass::IoCheck));
    }

    #[test]
    fn trap_class_falls_back_to_the_unmasked_ladder_when_stop_mode_forces_the_halt() {
        let latched = 1 << 9; // sign_mismatch, not a stop condition
        assert_eq!(trap_class(latched, 0), Some(TrapClass::SignMismatch));
    }

    #[test]
    fn trap_class_is_none_when_nothing_is_latched() {
        assert_eq!(trap_class(0, 0xFFFF), None);
    }
}
