//! Generated by `build.rs` from `opcodes.json`. Do not edit by hand; edit `opcodes.json` and
//! rebuild instead.

/// One of the 45 distinct instruction-character values this machine family decodes.
///
/// `optbl`'s roughly eighty named verbs collapse onto these 45 characters: several external
/// mnemonics (`TSL`, `TAA`..`TNS`, `TLU`, `LIP`, ...) share a base [`Opcode`] here and are
/// distinguished at dispatch time by the register-select sub-field rather than by a separate
/// variant — see [`OperandClass::Control`]. Only a subset of those sub-op dispatches are
/// implemented in the executor; see its control-verb match arms for which ones.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Tr = 0,
    Sel = 1,
    Ctl = 2,
    Cmp = 3,
    Spr = 4,
    Adm = 5,
    Unl = 6,
    Lod = 7,
    Tmt = 8,
    Trs = 9,
    Nop = 10,
    Set = 11,
    Shr = 12,
    Lng = 13,
    Rnd = 14,
    St = 15,
    Add = 16,
    Rad = 17,
    Tra = 18,
    Hlt = 19,
    Trh = 20,
    Tre = 21,
    Trp = 22,
    Trz = 23,
    Sub = 24,
    Rsu = 25,
    Wr = 26,
    Rww = 27,
    Sgn = 28,
    Rcv = 29,
    Mpy = 30,
    Div = 31,
    Ntr = 32,
    Rd = 33,
    Wre = 34,
    Aam = 35,
    Ctl2 = 36,
    Lda = 37,
    Ula = 38,
    Snd = 39,
    Blm = 40,
    Sbz = 41,
    Tzb = 42,
    Ctl3 = 43,
    Smt = 44,
}

impl Opcode {
    /// Number of distinct base opcodes assigned in this machine family.
    pub const COUNT: u8 = 45;

    /// Decode a raw instruction-character value into an [`Opcode`], or `None` if the value has
    /// no verb assigned (the executor must raise the instruction flag).
    pub fn try_from_u8(opcode: u8) -> Option<Self> {
        match opcode {
            0 => Some(Self::Tr),
            1 => Some(Self::Sel),
            2 => Some(Self::Ctl),
            3 => Some(Self::Cmp),
            4 => Some(Self::Spr),
            5 => Some(Self::Adm),
            6 => Some(Self::Unl),
            7 => Some(Self::Lod),
            8 => Some(Self::Tmt),
            9 => Some(Self::Trs),
            10 => Some(Self::Nop),
            11 => Some(Self::Set),
            12 => Some(Self::Shr),
            13 => Some(Self::Lng),
            14 => Some(Self::Rnd),
            15 => Some(Self::St),
            16 => Some(Self::Add),
            17 => Some(Self::Rad),
            18 => Some(Self::Tra),
            19 => Some(Self::Hlt),
            20 => Some(Self::Trh),
            21 => Some(Self::Tre),
            22 => Some(Self::Trp),
            23 => Some(Self::Trz),
            24 => Some(Self::Sub),
            25 => Some(Self::Rsu),
            26 => Some(Self::Wr),
            27 => Some(Self::Rww),
            28 => Some(Self::Sgn),
            29 => Some(Self::Rcv),
            30 => Some(Self::Mpy),
            31 => Some(Self::Div),
            32 => Some(Self::Ntr),
            33 => Some(Self::Rd),
            34 => Some(Self::Wre),
            35 => Some(Self::Aam),
            36 => Some(Self::Ctl2),
            37 => Some(Self::Lda),
            38 => Some(Self::Ula),
            39 => Some(Self::Snd),
            40 => Some(Self::Blm),
            41 => Some(Self::Sbz),
            42 => Some(Self::Tzb),
            43 => Some(Self::Ctl3),
            44 => Some(Self::Smt),
            _ => None,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Tr => "TR",
                Self::Sel => "SEL",
                Self::Ctl => "CTL",
                Self::Cmp => "CMP",
                Self::Spr => "SPR",
                Self::Adm => "ADM",
                Self::Unl => "UNL",
                Self::Lod => "LOD",
                Self::Tmt => "TMT",
                Self::Trs => "TRS",
                Self::Nop => "NOP",
                Self::Set => "SET",
                Self::Shr => "SHR",
                Self::Lng => "LNG",
                Self::Rnd => "RND",
                Self::St => "ST",
                Self::Add => "ADD",
                Self::Rad => "RAD",
                Self::Tra => "TRA",
                Self::Hlt => "HLT",
                Self::Trh => "TRH",
                Self::Tre => "TRE",
                Self::Trp => "TRP",
                Self::Trz => "TRZ",
                Self::Sub => "SUB",
                Self::Rsu => "RSU",
                Self::Wr => "WR",
                Self::Rww => "RWW",
                Self::Sgn => "SGN",
                Self::Rcv => "RCV",
                Self::Mpy => "MPY",
                Self::Div => "DIV",
                Self::Ntr => "NTR",
                Self::Rd => "RD",
                Self::Wre => "WRE",
                Self::Aam => "AAM",
                Self::Ctl2 => "CTL2",
                Self::Lda => "LDA",
                Self::Ula => "ULA",
                Self::Snd => "SND",
                Self::Blm => "BLM",
                Self::Sbz => "SBZ",
                Self::Tzb => "TZB",
                Self::Ctl3 => "CTL3",
                Self::Smt => "SMT",
            }
        )
    }
}

/// How an instruction's register-select field (the fourth and fifth instruction characters' low
/// nibbles) is interpreted for a given base [`Opcode`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OperandClass {
    /// The field selects an accumulator-storage-unit; 0 selects the A (or B) accumulator.
    Asu,
    /// The field hosts a sub-op: a family of related verbs riding one base opcode (e.g. `CTL2`
    /// register `0o16` is `TIP`). Sub-op behavior, where implemented, is hand-written in the
    /// executor's control-verb match arms; this table only records that the field means "sub-op"
    /// rather than "ASU" for this base opcode.
    Control,
    /// The field must be zero; the verb takes no register operand.
    Plain,
}

/// Look up how to interpret the register-select field for a given [`Opcode`].
pub fn operand_class(op: Opcode) -> OperandClass {
    match op {
        Opcode::Tr => OperandClass::Control,
        Opcode::Sel => OperandClass::Asu,
        Opcode::Ctl => OperandClass::Control,
        Opcode::Cmp => OperandClass::Asu,
        Opcode::Spr => OperandClass::Asu,
        Opcode::Adm => OperandClass::Asu,
        Opcode::Unl => OperandClass::Asu,
        Opcode::Lod => OperandClass::Asu,
        Opcode::Tmt => OperandClass::Asu,
        Opcode::Trs => OperandClass::Control,
        Opcode::Nop => OperandClass::Asu,
        Opcode::Set => OperandClass::Asu,
        Opcode::Shr => OperandClass::Asu,
        Opcode::Lng => OperandClass::Asu,
        Opcode::Rnd => OperandClass::Asu,
        Opcode::St => OperandClass::Asu,
        Opcode::Add => OperandClass::Asu,
        Opcode::Rad => OperandClass::Asu,
        Opcode::Tra => OperandClass::Control,
        Opcode::Hlt => OperandClass::Plain,
        Opcode::Trh => OperandClass::Asu,
        Opcode::Tre => OperandClass::Asu,
        Opcode::Trp => OperandClass::Asu,
        Opcode::Trz => OperandClass::Asu,
        Opcode::Sub => OperandClass::Asu,
        Opcode::Rsu => OperandClass::Asu,
        Opcode::Wr => OperandClass::Control,
        Opcode::Rww => OperandClass::Asu,
        Opcode::Sgn => OperandClass::Asu,
        Opcode::Rcv => OperandClass::Asu,
        Opcode::Mpy => OperandClass::Asu,
        Opcode::Div => OperandClass::Asu,
        Opcode::Ntr => OperandClass::Asu,
        Opcode::Rd => OperandClass::Control,
        Opcode::Wre => OperandClass::Control,
        Opcode::Aam => OperandClass::Asu,
        Opcode::Ctl2 => OperandClass::Control,
        Opcode::Lda => OperandClass::Asu,
        Opcode::Ula => OperandClass::Asu,
        Opcode::Snd => OperandClass::Asu,
        Opcode::Blm => OperandClass::Control,
        Opcode::Sbz => OperandClass::Control,
        Opcode::Tzb => OperandClass::Asu,
        Opcode::Ctl3 => OperandClass::Control,
        Opcode::Smt => OperandClass::Asu,
    }
}
