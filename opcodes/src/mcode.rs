/// The BCD-engine primitive an arithmetic or data-movement verb bottoms out in.
///
/// Several distinct [`crate::Opcode`]s (`ADD`/`RAD`, `SUB`/`RSU`, ...) share one of these
/// primitives and differ only in sign handling or direction. Kept here, alongside the opcode
/// table, so the executor's trace hook can record "what the verb actually did" independently of
/// which opcode triggered it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Primitive {
    Add,
    Subtract,
    Multiply,
    Divide,
    ShiftRight,
    ShiftLeft,
    Round,
    Length,
    Set,
    Unload,
    SignExtract,
    LoadAddress,
    StoreAddress,
    Compare,
    Move,
    Control,
}

impl Primitive {
    /// Map a base opcode to the primitive it bottoms out in, or `None` for verbs the trace hook
    /// has nothing distinct to say about (transfers, channel commands, `NOP`, `HLT`).
    pub fn for_opcode(opcode: crate::Opcode) -> Option<Primitive> {
        use crate::Opcode::*;
        Some(match opcode {
            Add | Rad | Aam => Primitive::Add,
            Sub | Rsu => Primitive::Subtract,
            Mpy => Primitive::Multiply,
            Div => Primitive::Divide,
            Shr => Primitive::ShiftRight,
            Lng => Primitive::Length,
            Rnd => Primitive::Round,
            Set => Primitive::Set,
            Unl => Primitive::Unload,
            St => Primitive::Unload,
            Sgn => Primitive::SignExtract,
            Lda => Primitive::LoadAddress,
            Ula => Primitive::StoreAddress,
            Cmp => Primitive::Compare,
            Tmt | Snd | Blm => Primitive::Move,
            Wr | Rd | Wre | Rww | Ctl | Ctl2 | Ctl3 => Primitive::Control,
            _ => return None,
        })
    }
}
