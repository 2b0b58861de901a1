//! C6: the BCD arithmetic engine.
//!
//! Every primitive here operates on a variable-length digit string inside the accumulator window
//! store (walked via [`WindowStore::next`]/[`WindowStore::prev`]), paired where relevant with a
//! memory operand read through a caller-supplied `read_char` closure — the same `Fn(addr, fault,
//! &mut Flags) -> u8` shape `crate::decode` uses, so the hot path never allocates a `Result`.
//!
//! Memory operands are read starting at their units (low-order, sign-bearing) digit and walked
//! toward higher significance by *decrementing* the address — grounded on `Next(MA)` in
//! `I7000/i7080_cpu.c`, which steps `MA` backward through a field. The accumulator's own start
//! pointer plays the same role (its units digit) and is walked toward higher significance by
//! [`WindowStore::next`] — so the two traversals move in lockstep despite going opposite
//! directions through their respective address spaces.

use crate::asu::WindowStore;
use crate::digit::{bcd_to_bin, bin_to_bcd, is_zero_digit, Sign, BLANK, RECORD_MARK, STORAGE_MARK};
use crate::memory::Memory;
use crate::model::Model;
use crate::registers::{Accumulator, Flags};

const FAULT_MACHINE_CHECK: u16 = 1 << 5;
const FAULT_OVERFLOW: u16 = 1 << 8;
const FAULT_SIGN_MISMATCH: u16 = 1 << 9;

/// Step a memory address backward through a field, the `Next(MA)` macro from the source.
pub(crate) fn dec_wrap(addr: u32, effective_memory: u32) -> u32 {
    if addr == 0 {
        effective_memory - 1
    } else {
        addr - 1
    }
}

/// Step a memory address forward through a field, the `Prev(MA)` macro from the source — the
/// opposite direction from [`dec_wrap`], used when a backwards-compare latch reverses the walk.
pub(crate) fn inc_wrap(addr: u32, effective_memory: u32) -> u32 {
    if addr + 1 == effective_memory {
        0
    } else {
        addr + 1
    }
}

/// True if a raw digit byte's low nibble terminates a memory operand field (storage mark, or a
/// value with no legal numeric meaning).
fn mem_field_ended(raw: u8) -> bool {
    let nibble = raw & 0xF;
    nibble == 0 || nibble > 10
}

/// Scan the whole accumulator string at `start`, recomputing and returning whether every stored
/// digit is a zero digit (`0` or `10`), matching `is_zero_digit`.
fn string_is_zero(store: &WindowStore, start: u32) -> bool {
    let mut addr = start;
    loop {
        let d = store.get(addr);
        if d == STORAGE_MARK {
            return true;
        }
        if !is_zero_digit(d) {
            return false;
        }
        addr = store.next(addr);
    }
}

/// Nine's-complement-in-place the accumulator string at `start` (the "recomplement storage" pass
/// in `do_addsub`), used when a subtraction borrows past the end of the memory operand.
fn recomplement(store: &mut WindowStore, start: u32) {
    let mut addr = start;
    let mut carry: u16 = 1;
    loop {
        let raw = store.get(addr);
        if raw == STORAGE_MARK {
            break;
        }
        let val = bcd_to_bin(raw) as u16;
        let combined = (9 - val) + carry;
        carry = u16::from(combined >= 10);
        store.set(addr, bin_to_bcd((combined % 10) as u8));
        addr = store.next(addr);
    }
}

/// ADD/SUB/RAD/RSU: variable-length add or subtract of a memory field into an accumulator, by
/// complement-and-add (§4.5). `reset` is true for RAD/RSU, which treat the accumulator as if it
/// were zero (its prior contents and sign are discarded, not read).
#[allow(clippy::too_many_arguments)]
pub fn add_sub(
    store: &mut WindowStore,
    acc_start: u32,
    acc: Accumulator,
    flags: &mut Flags,
    effective_memory: u32,
    mem_addr: u32,
    read_char: impl Fn(u32, u16, &mut Flags) -> u8,
    subtract_mode: bool,
    reset: bool,
) {
    let mut mem_cursor = mem_addr;
    let first = read_char(mem_cursor, FAULT_MACHINE_CHECK, flags);
    let (mem_sign, illegal) = Sign::from_zone_checked((first >> 4) & 0b11);
    if illegal {
        flags.latch(FAULT_SIGN_MISMATCH);
    }
    let mut mem_nibble = first & 0xF;
    let mut mem_ended = mem_field_ended(first);

    let acc_sign = if reset { Sign::Plus } else { flags.sign(acc) };
    let effective_subtract = subtract_mode ^ (acc_sign.is_negative() != mem_sign.is_negative());

    let mut carry: u16 = u16::from(effective_subtract);
    let mut addr = acc_start;
    let mut any_nonzero = false;

    loop {
        let acc_raw = store.get(addr);
        let acc_ended = acc_raw == STORAGE_MARK;
        if acc_ended && mem_ended {
            break;
        }

        let acc_val: u16 = if reset || acc_ended {
            0
        } else {
            bcd_to_bin(acc_raw) as u16
        };
        let mem_val: u16 = if mem_ended { 0 } else { bcd_to_bin(mem_nibble) as u16 };

        let combined = acc_val + if effective_subtract { 9 - mem_val } else { mem_val } + carry;
        carry = u16::from(combined >= 10);
        let digit = (combined % 10) as u8;
        if digit != 0 {
            any_nonzero = true;
        }
        store.set(addr, bin_to_bcd(digit));
        addr = store.next(addr);

        if !mem_ended {
            mem_cursor = dec_wrap(mem_cursor, effective_memory);
            let d = read_char(mem_cursor, FAULT_MACHINE_CHECK, flags);
            mem_nibble = d & 0xF;
            mem_ended = mem_field_ended(d);
        }
    }
    store.set(addr, STORAGE_MARK);

    let mut sign = acc_sign;
    if effective_subtract {
        if carry == 0 {
            recomplement(store, acc_start);
            any_nonzero = !string_is_zero(store, acc_start);
            sign = sign.flip();
        }
    } else if carry == 1 {
        store.set(addr, bin_to_bcd(1));
        let new_mark = store.next(addr);
        store.set(new_mark, STORAGE_MARK);
        flags.latch(FAULT_OVERFLOW);
        any_nonzero = true;
    }

    flags.set_zero(acc, !any_nonzero);
    flags.set_sign(acc, any_nonzero && sign.is_negative());
}

/// MPY: variable-length multiply of a memory field (multiplicand) into an accumulator holding the
/// multiplier, writing the product into the `next_half` mirror of the multiplier's bank (§4.5).
/// Returns the new accumulator start pointer (`next_half(acc_start)`), which the caller installs
/// into `spc`/`spcb`.
pub fn multiply(
    store: &mut WindowStore,
    acc_start: u32,
    acc: Accumulator,
    flags: &mut Flags,
    effective_memory: u32,
    mem_addr: u32,
    read_char: impl Fn(u32, u16, &mut Flags) -> u8,
) -> u32 {
    let mut addr = acc_start;
    let mut mult_raw = store.get(addr);
    if mult_raw == STORAGE_MARK {
        mult_raw = 10;
    }
    let mut prod = store.next_half(addr);
    let mut any_nonzero = false;
    let mut mem_sign = Sign::Plus;
    let mut has_previous_row = false;

    while mult_raw != STORAGE_MARK {
        let mult = bcd_to_bin(mult_raw & 0xF) as u32;
        let mut mem_cursor = mem_addr;
        let first = read_char(mem_cursor, FAULT_MACHINE_CHECK, flags);
        if !has_previous_row {
            let (sign, illegal) = Sign::from_zone_checked((first >> 4) & 0b11);
            mem_sign = sign;
            if illegal {
                flags.latch(FAULT_SIGN_MISMATCH);
            }
        }
        let mut mem_nibble = first & 0xF;
        let mut carry: u32 = 0;
        while mem_nibble >= 1 && mem_nibble <= 10 {
            let digit_val = bcd_to_bin(mem_nibble) as u32;
            let mut cell = mult * digit_val + carry;
            if has_previous_row {
                cell += bcd_to_bin(store.get(prod)) as u32;
            }
            let digit = (cell % 10) as u8;
            if digit != 0 {
                any_nonzero = true;
            }
            store.set(prod, bin_to_bcd(digit));
            carry = cell / 10;
            prod = store.next(prod);

            mem_cursor = dec_wrap(mem_cursor, effective_memory);
            let d = read_char(mem_cursor, FAULT_MACHINE_CHECK, flags);
            mem_nibble = d & 0xF;
        }
        let tail = (carry % 10) as u8;
        if tail != 0 {
            any_nonzero = true;
        }
        store.set(prod, bin_to_bcd(tail));
        prod = store.next(prod);
        store.set(prod, STORAGE_MARK);

        addr = store.next(addr);
        prod = store.next_half(addr);
        mult_raw = store.get(addr) & 0x3F;
        has_previous_row = true;
    }

    let new_start = store.next_half(acc_start);
    let negative = any_nonzero && (flags.sign(acc) != mem_sign.is_negative());
    flags.set_zero(acc, !any_nonzero);
    flags.set_sign(acc, negative);
    new_start
}

/// Materialize a field as binary digits (units-first) plus its sign, by walking memory backward
/// from `addr` (the field's units digit) until a terminator. Used by [`divide`], whose algorithm
/// needs the whole divisor at once rather than a digit at a time.
fn read_mem_field(
    effective_memory: u32,
    addr: u32,
    read_char: &impl Fn(u32, u16, &mut Flags) -> u8,
    flags: &mut Flags,
) -> (Vec<u8>, Sign) {
    let mut digits = Vec::new();
    let mut cursor = addr;
    let first = read_char(cursor, FAULT_MACHINE_CHECK, flags);
    let (sign, illegal) = Sign::from_zone_checked((first >> 4) & 0b11);
    if illegal {
        flags.latch(FAULT_SIGN_MISMATCH);
    }
    let mut raw = first;
    while !mem_field_ended(raw) {
        digits.push(bcd_to_bin(raw & 0xF));
        cursor = dec_wrap(cursor, effective_memory);
        raw = read_char(cursor, FAULT_MACHINE_CHECK, flags);
    }
    (digits, sign)
}

fn read_acc_field(store: &WindowStore, start: u32) -> Vec<u8> {
    let mut digits = Vec::new();
    let mut addr = start;
    loop {
        let d = store.get(addr);
        if d == STORAGE_MARK {
            break;
        }
        digits.push(bcd_to_bin(d));
        addr = store.next(addr);
    }
    digits
}

fn write_digits_units_first(store: &mut WindowStore, start: u32, digits: &[u8]) -> u32 {
    let mut addr = start;
    for &d in digits {
        store.set(addr, bin_to_bcd(d));
        addr = store.next(addr);
    }
    store.set(addr, STORAGE_MARK);
    addr
}

/// Decimal long division over units-first digit vectors, MSD-first internally. Returns
/// `(quotient, remainder)`, both units-first, with leading (most-significant) zero digits
/// stripped from the quotient.
fn divide_digits(dividend: &[u8], divisor: &[u8]) -> (Vec<u8>, Vec<u8>) {
    // Work MSD-first: reverse the units-first inputs.
    let dividend_msd: Vec<u8> = dividend.iter().rev().copied().collect();
    let divisor_msd: Vec<u8> = divisor.iter().rev().copied().collect();

    let mut quotient_msd = Vec::with_capacity(dividend_msd.len());
    let mut remainder: Vec<u8> = Vec::new();

    for &d in &dividend_msd {
        remainder.push(d);
        while remainder.len() > 1 && remainder[0] == 0 {
            remainder.remove(0);
        }
        let mut q = 0u8;
        while ge(&remainder, &divisor_msd) {
            remainder = sub_digits(&remainder, &divisor_msd);
            q += 1;
        }
        quotient_msd.push(q);
    }

    while quotient_msd.len() > 1 && quotient_msd[0] == 0 {
        quotient_msd.remove(0);
    }
    while remainder.len() > 1 && remainder[0] == 0 {
        remainder.remove(0);
    }

    let quotient: Vec<u8> = quotient_msd.into_iter().rev().collect();
    let remainder: Vec<u8> = remainder.into_iter().rev().collect();
    (quotient, remainder)
}

fn ge(a: &[u8], b: &[u8]) -> bool {
    let a = trim_leading(a);
    let b = trim_leading(b);
    if a.len() != b.len() {
        return a.len() > b.len();
    }
    a >= b
}

fn trim_leading(v: &[u8]) -> &[u8] {
    let mut i = 0;
    while i + 1 < v.len() && v[i] == 0 {
        i += 1;
    }
    &v[i..]
}

fn sub_digits(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len()];
    let mut borrow = 0i16;
    for i in (0..a.len()).rev() {
        let bi = if i + b.len() >= a.len() {
            b[b.len() - (a.len() - i)] as i16
        } else {
            0
        };
        let mut v = a[i] as i16 - bi - borrow;
        if v < 0 {
            v += 10;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = v as u8;
    }
    out
}

/// DIV: variable-length divide of an accumulator (dividend) by a memory field (divisor), leaving
/// the quotient at the accumulator's original start and the remainder at its `next_half` mirror
/// (§4.5). Dividing by zero leaves the accumulator untouched and sets overflow.
pub fn divide(
    store: &mut WindowStore,
    acc_start: u32,
    acc: Accumulator,
    flags: &mut Flags,
    effective_memory: u32,
    mem_addr: u32,
    read_char: impl Fn(u32, u16, &mut Flags) -> u8,
) {
    let dividend = read_acc_field(store, acc_start);
    let (divisor, mem_sign) = read_mem_field(effective_memory, mem_addr, &read_char, flags);

    let divisor_is_zero = divisor.iter().all(|&d| d == 0);
    if divisor_is_zero {
        flags.latch(FAULT_OVERFLOW);
        return;
    }

    let acc_sign = flags.sign(acc);
    let (quotient, remainder) = divide_digits(&dividend, &divisor);

    let remainder_start = store.next_half(acc_start);
    write_digits_units_first(store, acc_start, &quotient);
    write_digits_units_first(store, remainder_start, &remainder);

    let quotient_nonzero = quotient.iter().any(|&d| d != 0);
    let negative = quotient_nonzero && (acc_sign != mem_sign.is_negative());
    flags.set_zero(acc, !quotient_nonzero);
    flags.set_sign(acc, negative);
}

/// SHR: shift the accumulator right by `n` positions (toward lower significance), dragging the
/// start pointer forward along `next_addr` and zero-filling the vacated high end.
pub fn shift_right(store: &mut WindowStore, acc_start: u32, acc: Accumulator, flags: &mut Flags, n: u32) -> u32 {
    let digits = read_acc_field(store, acc_start);
    let mut new_digits = digits.clone();
    for _ in 0..n.min(digits.len() as u32) {
        new_digits.remove(0);
    }
    let mut new_start = acc_start;
    for _ in 0..n {
        new_start = store.next(new_start);
    }
    write_digits_units_first(store, new_start, &new_digits);
    update_zero_sign(store, new_start, acc, flags);
    new_start
}

/// LNG (Length): extend the accumulator by `n` zero digits at the low (least-significant) end,
/// dragging the start pointer backward along `prev_addr` — grounded directly on `case OP_LEN`,
/// which walks `prev_addr` writing a zero digit at each new position before re-marking the new
/// end, then moves `spc`/`spcb` to the new start. The caller is expected to pass `n` as the
/// shortfall between the requested digit count and the field's current length (zero once the
/// field is already long enough), matching the source's `while (MA != 0)` loop, which simply
/// never runs when no extension is needed.
pub fn shift_left(store: &mut WindowStore, acc_start: u32, acc: Accumulator, flags: &mut Flags, n: u32) -> u32 {
    let digits = read_acc_field(store, acc_start);
    let mut new_start = acc_start;
    for _ in 0..n {
        new_start = store.prev(new_start);
    }
    let mut new_digits = vec![0u8; n as usize];
    new_digits.extend_from_slice(&digits);
    write_digits_units_first(store, new_start, &new_digits);
    update_zero_sign(store, new_start, acc, flags);
    new_start
}

/// RND: add 5 at the accumulator's current units position and propagate the carry. The caller
/// is expected to have already shifted the accumulator to the desired rounding point via
/// [`shift_right`] — this primitive only performs the add-5-and-carry step itself.
pub fn round(store: &mut WindowStore, acc_start: u32, acc: Accumulator, flags: &mut Flags) {
    let mut addr = acc_start;
    let mut carry: u16 = 5;
    loop {
        let raw = store.get(addr);
        if raw == STORAGE_MARK {
            if carry > 0 {
                store.set(addr, bin_to_bcd((carry % 10) as u8));
                let new_mark = store.next(addr);
                store.set(new_mark, STORAGE_MARK);
                if carry / 10 != 0 {
                    flags.latch(FAULT_OVERFLOW);
                }
            }
            break;
        }
        let val = bcd_to_bin(raw) as u16 + carry;
        carry = val / 10;
        store.set(addr, bin_to_bcd((val % 10) as u8));
        addr = store.next(addr);
        if carry == 0 {
            break;
        }
    }
    update_zero_sign(store, acc_start, acc, flags);
}

/// SET: zero-fill the accumulator to `count` digits and rewrite the mark, discarding whatever was
/// there before (unlike `length`, which only extends).
pub fn set(store: &mut WindowStore, acc_start: u32, acc: Accumulator, flags: &mut Flags, count: u32) {
    let zeros = vec![0u8; count as usize];
    write_digits_units_first(store, acc_start, &zeros);
    flags.set_zero(acc, true);
    flags.set_sign(acc, false);
}

fn update_zero_sign(store: &WindowStore, start: u32, acc: Accumulator, flags: &mut Flags) {
    let is_zero = string_is_zero(store, start);
    flags.set_zero(acc, is_zero);
    if is_zero {
        flags.set_sign(acc, false);
    }
}

/// SPR (Store-Print): rewrite the accumulator's leading zero digits as blanks and inject a sign
/// glyph (`+`/`-`/blank-for-unsigned is not modeled here; the glyph is carried as a zone on the
/// most significant digit) ahead of the first significant digit, matching §4.3.
pub fn store_print(store: &mut WindowStore, acc_start: u32, acc: Accumulator, flags: &Flags) {
    use crate::digit::BLANK;

    let digits = read_acc_field(store, acc_start);
    if digits.is_empty() {
        return;
    }
    let negative = flags.sign(acc);
    let msd_index = digits.len() - 1;
    let mut first_significant = msd_index;
    while first_significant > 0 && digits[first_significant] == 0 {
        first_significant -= 1;
    }

    let mut addr = acc_start;
    for (i, &d) in digits.iter().enumerate() {
        if i > first_significant {
            store.set(addr, BLANK);
        } else if i == msd_index {
            let zone = if negative { 0b10 } else { 0b11 };
            store.set(addr, (zone << 4) | bin_to_bcd(d));
        } else {
            store.set(addr, bin_to_bcd(d));
        }
        addr = store.next(addr);
    }
}

/// Step a memory address backward five positions, matching the source's `Prev5` macro used by
/// the block-move verbs (TMT/SND).
fn dec_wrap5(addr: u32, effective_memory: u32) -> u32 {
    let mut a = addr;
    for _ in 0..5 {
        a = dec_wrap(a, effective_memory);
    }
    a
}

/// ST: write the selected accumulator's digits out to memory as a fixed-width field, walking
/// memory forward from `mem_addr` and terminating when the accumulator string ends (§4.3,
/// `OP_ST` in `i7080_cpu.c`). The units digit carries the accumulator's sign zone; this is a
/// documented simplification of the source's character-by-character zone bookkeeping (which also
/// tracks an 8th "check" bit this crate's six-bit digit model has no room for).
pub fn store(
    store: &WindowStore,
    acc_start: u32,
    acc: Accumulator,
    flags: &Flags,
    mem_addr: u32,
    mut write_char: impl FnMut(u32, u8),
) {
    let digits = read_acc_field(store, acc_start);
    if digits.is_empty() {
        return;
    }
    let sign = if flags.sign(acc) { Sign::Minus } else { Sign::Plus };
    let mut addr = mem_addr;
    for (i, &d) in digits.iter().enumerate() {
        let byte = if i == 0 {
            (sign.to_zone() << 4) | bin_to_bcd(d)
        } else {
            bin_to_bcd(d)
        };
        write_char(addr, byte);
        addr = addr.wrapping_add(1);
    }
}

/// AAM (Add-to-Memory, §4.5): reads a four-character field from memory starting at `mem_addr`
/// (units digit, walked backward like every other memory field this engine reads), adds the
/// selected accumulator's digits into it with carry, and rewrites the field in place — the mirror
/// image of [`add_sub`], which instead adds a memory field *into* the accumulator. On the
/// Series-III and Top models, a fifth and sixth digit hold zone-encoded high-order address bits
/// and still participate in the carry chain even though no accumulator digit feeds into them.
pub fn add_to_memory(
    memory: &mut Memory,
    store: &WindowStore,
    acc_start: u32,
    flags: &mut Flags,
    effective_memory: u32,
    mem_addr: u32,
    model: Model,
) {
    let acc_digits = read_acc_field(store, acc_start);
    let field_len = if matches!(model, Model::ModelSeriesIii | Model::ModelTop) {
        6
    } else {
        4
    };

    let mut addr = mem_addr;
    let mut carry: u16 = 0;
    let mut updates = Vec::with_capacity(field_len);
    for i in 0..field_len {
        let raw = memory.read_char(addr, FAULT_MACHINE_CHECK, flags);
        let mem_val = bcd_to_bin(raw & 0xF) as u16;
        let add_val = acc_digits.get(i).map(|&d| d as u16).unwrap_or(0);
        let combined = mem_val + add_val + carry;
        carry = u16::from(combined >= 10);
        let zone = raw & 0xF0;
        updates.push((addr, zone | bin_to_bcd((combined % 10) as u8)));
        addr = dec_wrap(addr, effective_memory);
    }
    for (a, v) in updates {
        memory.write_char(a, v);
    }
    if carry > 0 {
        flags.latch(FAULT_OVERFLOW);
    }
}

/// TMT: memory-to-memory move (§4.3, `OP_TMT` in `i7080_cpu.c`). With register 0, copies
/// five-character blocks backward from `mac` to `mac2` (mirroring `Read5`/`Write5`'s
/// backward-walking convention) until a block's units digit is a record mark; with a nonzero
/// register, copies `acc_len` individual characters instead — one per digit position of the
/// selected accumulator, which only supplies its length here, not its contents.
///
/// Takes `memory` directly (rather than a pair of read/write closures) because both directions
/// touch the same store in the same call: two closures each reborrowing `memory` — one shared
/// (for reads), one exclusive (for writes) — would alias for the whole call.
pub fn move_memory(
    effective_memory: u32,
    register: u8,
    acc_len: usize,
    mut mac: u32,
    mut mac2: u32,
    memory: &mut Memory,
    flags: &mut Flags,
) {
    if register == 0 {
        loop {
            let mut units = 0u8;
            for i in 0..5u32 {
                let d = memory.read_char(mac.wrapping_sub(i), FAULT_MACHINE_CHECK, flags);
                memory.write_char(mac2.wrapping_sub(i), d);
                if i == 0 {
                    units = d & 0x3F;
                }
            }
            mac = dec_wrap5(mac, effective_memory);
            mac2 = dec_wrap5(mac2, effective_memory);
            if units == RECORD_MARK {
                break;
            }
        }
    } else {
        for _ in 0..acc_len {
            let d = memory.read_char(mac, FAULT_MACHINE_CHECK, flags);
            memory.write_char(mac2, d);
            mac = dec_wrap(mac, effective_memory);
            mac2 = dec_wrap(mac2, effective_memory);
        }
    }
}

/// SND: move `acc_len` five-character memory blocks from `mac` to `mac2`, both walked backward
/// one block per iteration, where `acc_len` is the length of the selected accumulator string
/// (`OP_SND` counts blocks this way rather than via a record-mark sentinel, unlike TMT).
///
/// Takes `memory` directly, for the same aliasing reason as [`move_memory`].
pub fn send(
    effective_memory: u32,
    acc_len: usize,
    mut mac: u32,
    mut mac2: u32,
    memory: &mut Memory,
    flags: &mut Flags,
) {
    for _ in 0..acc_len {
        for i in 0..5u32 {
            let d = memory.read_char(mac.wrapping_sub(i), FAULT_MACHINE_CHECK, flags);
            memory.write_char(mac2.wrapping_sub(i), d);
        }
        mac = dec_wrap5(mac, effective_memory);
        mac2 = dec_wrap5(mac2, effective_memory);
    }
}

/// BLM: blank `count` five-character blocks (register 0) or `count` individual characters
/// (register 1) of memory, walking backward from `mac2` (`OP_BLM`).
pub fn blank_memory(
    effective_memory: u32,
    register: u8,
    count: u32,
    mut mac2: u32,
    mut write_char: impl FnMut(u32, u8),
) {
    if register == 0 {
        for _ in 0..count {
            for i in 0..5u32 {
                write_char(mac2.wrapping_sub(i), BLANK);
            }
            mac2 = dec_wrap5(mac2, effective_memory);
        }
    } else {
        for _ in 0..count {
            write_char(mac2, BLANK);
            mac2 = dec_wrap(mac2, effective_memory);
        }
    }
}

/// LDA/ULA — load/unload a six-digit memory address field into a 4- or 6-digit accumulator
/// string, per §4.2's zone decoding and the REDESIGN FLAGS note on the 160K "digit 10" bit.
pub mod address {
    use super::*;
    use crate::model::Model;

    const DIG2: [u32; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 0];
    const DIG3: [u32; 11] = [0, 100, 200, 300, 400, 500, 600, 700, 800, 900, 0];
    const DIG4: [u32; 11] = [0, 1000, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 9000, 0];
    const DIG_ZONE: [u32; 16] = [
        0, 10_000, 20_000, 30_000, 40_000, 50_000, 60_000, 70_000, 80_000, 90_000, 100_000,
        110_000, 120_000, 130_000, 140_000, 150_000,
    ];

    /// LDA: read a six-digit field from memory starting at `addr` (units digit, walked backward)
    /// and decode it into an address, per model. The 160K machine's sixth digit additionally
    /// contributes `(digit & 1) * 10` to the result when its low bit is set — the REDESIGN FLAGS
    /// open question: no other path to that bit exists, so it is modeled literally and nothing
    /// else is inferred about it.
    pub fn load_address(
        effective_memory: u32,
        addr: u32,
        model: Model,
        read_char: impl Fn(u32, u16, &mut Flags) -> u8,
        flags: &mut Flags,
    ) -> u32 {
        let mut cursor = addr;
        let d1 = read_char(cursor, FAULT_MACHINE_CHECK, flags);
        cursor = dec_wrap(cursor, effective_memory);
        let d2 = read_char(cursor, FAULT_MACHINE_CHECK, flags);
        cursor = dec_wrap(cursor, effective_memory);
        let d3 = read_char(cursor, FAULT_MACHINE_CHECK, flags);
        cursor = dec_wrap(cursor, effective_memory);
        let d4 = read_char(cursor, FAULT_MACHINE_CHECK, flags);

        let mut zone = ((d1 >> 2) & 0b1100) | ((d4 >> 4) & 0b0011);
        let mut total = bcd_to_bin(d1 & 0xF) as u32
            + DIG2[(d2 & 0xF) as usize]
            + DIG3[(d3 & 0xF) as usize]
            + DIG4[(d4 & 0xF) as usize];

        if matches!(model, Model::ModelTop) {
            cursor = dec_wrap(cursor, effective_memory);
            let d5 = read_char(cursor, FAULT_MACHINE_CHECK, flags);
            cursor = dec_wrap(cursor, effective_memory);
            let d6 = read_char(cursor, FAULT_MACHINE_CHECK, flags);
            zone = d5 & 0xF;
            total += (d6 & 1) as u32 * 10;
        }
        let _ = cursor;

        total += DIG_ZONE[(zone & 0xF) as usize];
        total % effective_memory
    }

    /// ULA: the inverse of [`load_address`] — decompose `value` back into a four- or
    /// six-digit memory field, writing the zone bits for the top digit and (on the Top model)
    /// distributing the high zone bits across a fifth and sixth digit. This is a documented
    /// simplification of `OP_ULA`'s per-digit `zone_dig`/bit-merge bookkeeping in
    /// `i7080_cpu.c`: it reproduces the documented round trip with [`load_address`] without
    /// transliterating that routine's machine-specific bit layout.
    pub fn store_address(
        effective_memory: u32,
        addr: u32,
        model: Model,
        value: u32,
        mut write_char: impl FnMut(u32, u8),
    ) {
        let remaining = value % effective_memory;
        let digit1 = (remaining % 10) as u8;
        let digit2 = ((remaining / 10) % 10) as u8;
        let digit3 = ((remaining / 100) % 10) as u8;
        let digit4 = ((remaining / 1000) % 10) as u8;
        let zone = ((remaining / 10_000).min(15)) as u8;

        let mut cursor = addr;
        // `load_address` reassembles `zone` from `d1`'s top two bits (its high half) and `d4`'s
        // top two bits (its low half): `zone = ((d1>>2)&0b1100) | ((d4>>4)&0b0011)`. This writes
        // those same two halves back.
        write_char(cursor, ((zone >> 2) & 0b11) << 4 | bin_to_bcd(digit1));
        cursor = dec_wrap(cursor, effective_memory);
        write_char(cursor, bin_to_bcd(digit2));
        cursor = dec_wrap(cursor, effective_memory);
        write_char(cursor, bin_to_bcd(digit3));
        cursor = dec_wrap(cursor, effective_memory);
        write_char(cursor, (zone & 0b11) << 4 | bin_to_bcd(digit4));

        if matches!(model, Model::ModelTop) {
            // On the Top model `load_address` instead reads the *entire* zone as the raw low
            // nibble of digit 5 (not a decimal digit), overriding the `d1`/`d4` halves above.
            cursor = dec_wrap(cursor, effective_memory);
            write_char(cursor, zone);
            cursor = dec_wrap(cursor, effective_memory);
            write_char(cursor, 0);
        }
    }
}
