//! C3: the accumulator window store (the "ASU" / accumulator storage).
//!
//! A byte-addressable overlay distinct from main memory, divided into fixed-size banks. On
//! numbered-ASU machines each 256-character bank holds a 128-character "A" region (conventionally
//! addressed by `spc`) and fifteen 16-character ASU sub-windows in its upper half. The 10K machine
//! instead exposes two independent 512-character banks, "A" and "B", addressed by `spc`/`spcb`
//! with no numbered ASUs.
//!
//! The three permutation tables (`next_addr`, `prev_addr`, `next_half`) are precomputed once from
//! the bank geometry at construction time, per the REDESIGN FLAGS note, rather than branching on
//! model in the hot traversal path.

use crate::digit::STORAGE_MARK;

/// Number of 256-character banks on numbered-ASU machines. 6 * 256 = 1,536, matching the
/// documented store size.
const ASU_BANK_COUNT: usize = 6;
const ASU_BANK_SIZE: usize = 256;

/// Number of 512-character banks on the 10K machine (the "A" and "B" windows).
const FLAT_BANK_COUNT: usize = 2;
const FLAT_BANK_SIZE: usize = 512;

/// The accumulator window store, with its geometry-dependent navigation tables.
pub struct WindowStore {
    cells: Vec<u8>,
    bank_size: usize,
    next_addr: Vec<u16>,
    prev_addr: Vec<u16>,
    next_half: Vec<u16>,
}

impl WindowStore {
    /// Build the store for a numbered-ASU machine (20K and up).
    pub fn new_asu() -> Self {
        Self::new_with_geometry(ASU_BANK_COUNT, ASU_BANK_SIZE)
    }

    /// Build the store for the 10K machine (flat A/B windows, no numbered ASUs).
    pub fn new_flat() -> Self {
        Self::new_with_geometry(FLAT_BANK_COUNT, FLAT_BANK_SIZE)
    }

    fn new_with_geometry(bank_count: usize, bank_size: usize) -> Self {
        let total = bank_count * bank_size;
        let mut next_addr = vec![0u16; total];
        let mut prev_addr = vec![0u16; total];
        let mut next_half = vec![0u16; total];

        let half = bank_size / 2;
        for i in 0..total {
            let bank_base = (i / bank_size) * bank_size;
            let offset = i % bank_size;
            next_addr[i] = (bank_base + (offset + 1) % bank_size) as u16;
            prev_addr[i] = (bank_base + (offset + bank_size - 1) % bank_size) as u16;
            next_half[i] = (bank_base + (offset + half) % bank_size) as u16;
        }

        Self {
            cells: vec![STORAGE_MARK; total],
            bank_size,
            next_addr,
            prev_addr,
            next_half,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn bank_size(&self) -> usize {
        self.bank_size
    }

    fn wrap(&self, addr: u32) -> usize {
        (addr as usize) % self.cells.len()
    }

    pub fn get(&self, addr: u32) -> u8 {
        self.cells[self.wrap(addr)]
    }

    pub fn set(&mut self, addr: u32, value: u8) {
        let idx = self.wrap(addr);
        self.cells[idx] = value;
    }

    pub fn next(&self, addr: u32) -> u32 {
        self.next_addr[self.wrap(addr)] as u32
    }

    pub fn prev(&self, addr: u32) -> u32 {
        self.prev_addr[self.wrap(addr)] as u32
    }

    pub fn next_half(&self, addr: u32) -> u32 {
        self.next_half[self.wrap(addr)] as u32
    }

    /// The start-pointer for ASU `k` (1..=15) given the current A-accumulator pointer `spc`, per
    /// the formula in §3: same bank as A, fixed offset, 16-character slots, capped to the bank.
    pub fn asu_start(&self, spc: u16, k: u8) -> u32 {
        let bank_base = (spc as u32) & !((self.bank_size - 1) as u32);
        let offset = 0x100 | (((k.saturating_sub(1)) as u32) << 4);
        self.wrap(bank_base | (offset % self.bank_size as u32)) as u32
    }

    /// True if the string starting at `start` is empty (a storage mark at its first position).
    pub fn is_empty_string(&self, start: u32) -> bool {
        self.get(start) == STORAGE_MARK
    }

    /// Walk a string starting at `start`, collecting digits up to (not including) the storage
    /// mark. Used by tests and by verbs that need the whole value materialized (compare,
    /// load/store address).
    pub fn read_string(&self, start: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let mut addr = start;
        loop {
            let d = self.get(addr);
            if d == STORAGE_MARK {
                break;
            }
            out.push(d);
            addr = self.next(addr);
            if out.len() > self.cells.len() {
                // Defensive: a corrupted store with no mark in-bank must not loop forever.
                break;
            }
        }
        out
    }
}
