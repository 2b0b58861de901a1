//! C2: the register file — program counter, flag word, sense switches/lights, interrupt-mode
//! state, channel selection registers, and the byte-compare direction bit.

use proc_bitfield::bitfield;

bitfield! {
    /// The 16-bit flag word. Trap-class bits (instruction, machine-check, io-check, record-check,
    /// overflow, sign-mismatch) are latched by `Flags::latch` and OR into `any_flag`.
    #[derive(Clone, Copy, Eq, PartialEq)]
    pub struct Flags(u16): Debug, FromRaw, IntoRaw, DerefRaw {
        /// A-accumulator sign bit (set = negative).
        pub a_sign: bool @ 0,
        /// B-accumulator sign bit (10K machine only).
        pub b_sign: bool @ 1,
        /// A-accumulator is zero.
        pub a_zero: bool @ 2,
        /// B-accumulator is zero (10K machine only).
        pub b_zero: bool @ 3,
        /// Bad opcode digit, misaligned IC, reserved sub-op, invalid ASU, or unaligned indirect
        /// target.
        pub instruction: bool @ 4,
        /// Memory read of an invalid or uninitialized character.
        pub machine_check: bool @ 5,
        /// Channel command returned NODEV/IOERR, or a device was addressed on a dead/wrong-kind
        /// channel.
        pub io_check: bool @ 6,
        /// A device raised attention mid-transfer.
        pub record_check: bool @ 7,
        /// Arithmetic carry-out past the storage mark on add; quotient-digit overflow on divide;
        /// lost significance on shift-left.
        pub overflow: bool @ 8,
        /// A memory operand of add/sub/multiply carried an illegal sign nibble.
        pub sign_mismatch: bool @ 9,
        /// Aggregate: set whenever any trap-class bit above is set.
        pub any_flag: bool @ 10,
        /// Eight-mode (160K / full zone decoding) indicator.
        pub eight_mode: bool @ 11,
        /// Comparison latch: memory operand compared higher than the accumulator.
        pub high_compare: bool @ 12,
        /// Comparison latch: memory operand compared lower than the accumulator.
        pub low_compare: bool @ 13,
    }
}

/// Mask of every trap-class bit (§7, §8 invariant 4).
pub const TRAP_CLASS_MASK: u16 = (1 << 4) | (1 << 5) | (1 << 6) | (1 << 7) | (1 << 8) | (1 << 9);

impl Flags {
    /// Latch one or more trap-class bits (a mask over the same bit positions as the flag word)
    /// and set the aggregate `any_flag` bit if any of them are trap-class bits. Used by every
    /// hot-path fault site instead of returning a `Result`.
    pub fn latch(&mut self, mask: u16) {
        self.0 |= mask;
        if self.0 & TRAP_CLASS_MASK != 0 {
            self.0 |= 1 << 10;
        }
    }

    /// Clear every trap-class bit and the aggregate bit (what an interrupt handler is expected
    /// to do explicitly before returning, per §7).
    pub fn clear_traps(&mut self) {
        self.0 &= !(TRAP_CLASS_MASK | (1 << 10));
    }

    /// The subset of currently-latched trap-class bits.
    pub fn latched_traps(&self) -> u16 {
        self.0 & TRAP_CLASS_MASK
    }
}

/// Which accumulator a BCD-engine verb is operating on. Every model has an A-accumulator; only
/// the 10K machine's flat two-window store gives B its own sign/zero bits and start pointer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Accumulator {
    A,
    B,
}

impl Flags {
    /// Sign bit for the given accumulator (set = negative).
    pub fn sign(&self, acc: Accumulator) -> bool {
        match acc {
            Accumulator::A => self.a_sign(),
            Accumulator::B => self.b_sign(),
        }
    }

    pub fn set_sign(&mut self, acc: Accumulator, negative: bool) {
        match acc {
            Accumulator::A => self.set_a_sign(negative),
            Accumulator::B => self.set_b_sign(negative),
        }
    }

    /// Zero flag for the given accumulator.
    pub fn zero(&self, acc: Accumulator) -> bool {
        match acc {
            Accumulator::A => self.a_zero(),
            Accumulator::B => self.b_zero(),
        }
    }

    pub fn set_zero(&mut self, acc: Accumulator, is_zero: bool) {
        match acc {
            Accumulator::A => self.set_a_zero(is_zero),
            Accumulator::B => self.set_b_zero(is_zero),
        }
    }
}

/// A three-way comparison result, latched into `high_compare`/`low_compare`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareResult {
    Low,
    Equal,
    High,
}

impl Flags {
    pub fn set_compare(&mut self, result: CompareResult) {
        match result {
            CompareResult::Low => {
                self.set_low_compare(true);
                self.set_high_compare(false);
            }
            CompareResult::High => {
                self.set_low_compare(false);
                self.set_high_compare(true);
            }
            CompareResult::Equal => {
                self.set_low_compare(false);
                self.set_high_compare(false);
            }
        }
    }

    pub fn compare(&self) -> CompareResult {
        if self.high_compare() {
            CompareResult::High
        } else if self.low_compare() {
            CompareResult::Low
        } else {
            CompareResult::Equal
        }
    }
}

/// The full CPU register file outside the accumulator window store.
#[derive(Clone, Copy, Debug)]
pub struct Registers {
    /// Points at the units-digit position of the *next* instruction.
    pub ic: u32,
    pub flags: Flags,
    /// Sense-switch snapshot (6 bits).
    pub sw: u8,
    /// Sense-light snapshot (6 bits).
    pub sl: u8,
    /// Subset of `flags`'s trap-class bits that halts rather than traps.
    pub stop_flags: u16,
    /// A-accumulator current start pointer (window store).
    pub spc: u16,
    /// B-accumulator current start pointer (10K machine only).
    pub spcb: u16,
    pub selreg: u16,
    pub selreg2: u16,
    /// One-shot indirect-addressing enable (Series III / eight-mode).
    pub indflag: bool,
    /// Interrupts enabled.
    pub intmode: bool,
    /// Currently executing inside an interrupt handler.
    pub intprog: bool,
    /// Next Compare runs toward lower addresses (one-shot, set by ECB).
    pub bkcmp: bool,
    /// Operand effective address.
    pub mac: u32,
    /// Secondary-operand effective address.
    pub mac2: u32,
    /// Channel id (0-based) the CPU is waiting on, or `None` if not waiting.
    pub chwait: Option<u8>,
    /// Per-channel pending-interrupt-request bitmask (tape/high-speed kinds only), one bit per
    /// channel slot. Consulted by `interrupt::enter_channel` to pick a save slot (§4.7).
    pub pending_channel_irq: u16,
}

impl Registers {
    pub fn new() -> Self {
        Self {
            ic: 4,
            flags: Flags(0),
            sw: 0,
            sl: 0,
            stop_flags: 0,
            spc: 0,
            spcb: 0,
            selreg: 0,
            selreg2: 0,
            indflag: false,
            intmode: false,
            intprog: false,
            bkcmp: false,
            mac: 0,
            mac2: 0,
            chwait: None,
            pending_channel_irq: 0,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn latching_a_trap_class_bit_sets_any_flag() {
        let mut flags = Flags(0);
        flags.latch(1 << 8); // overflow
        assert!(flags.any_flag());
        assert!(flags.overflow());
    }

    #[test]
    fn latching_non_trap_bit_does_not_set_any_flag() {
        let mut flags = Flags(0);
        flags.latch(1 << 12); // high_compare, not a trap class
        assert!(!flags.any_flag());
    }

    #[test]
    fn clear_traps_clears_any_flag_too() {
        let mut flags = Flags(0);
        flags.latch(1 << 5);
        flags.clear_traps();
        assert!(!flags.any_flag());
        assert!(!flags.machine_check());
    }

    #[test]
    fn sign_and_zero_are_addressed_by_accumulator() {
        let mut flags = Flags(0);
        flags.set_sign(Accumulator::B, true);
        flags.set_zero(Accumulator::A, true);
        assert!(flags.sign(Accumulator::B));
        assert!(!flags.sign(Accumulator::A));
        assert!(flags.zero(Accumulator::A));
        assert!(!flags.zero(Accumulator::B));
    }

    #[test]
    fn compare_round_trips() {
        let mut flags = Flags(0);
        for r in [CompareResult::Low, CompareResult::Equal, CompareResult::High] {
            flags.set_compare(r);
            assert_eq!(flags.compare(), r);
        }
    }
}
