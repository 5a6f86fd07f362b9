//! The closed set of PEX opcodes with their typed operands.
//!
//! Branch targets are absolute instruction indices within the owning
//! function; the external serializer converts them to the wire encoding.

use smallvec::SmallVec;
use strum::IntoStaticStr;

use super::{PexStringId, PexValue};

/// Argument list for call opcodes; most calls pass only a few values.
pub type CallArgs = SmallVec<[PexValue; 4]>;

/// A typed PEX instruction.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum PexOpcode {
    Assign { dest: PexValue, src: PexValue },
    Cast { dest: PexValue, src: PexValue },
    Ret { value: PexValue },

    CallMethod {
        function: PexStringId,
        base: PexValue,
        dest: PexValue,
        args: CallArgs,
    },
    CallStatic {
        object: PexStringId,
        function: PexStringId,
        dest: PexValue,
        args: CallArgs,
    },

    IAdd { dest: PexValue, a: PexValue, b: PexValue },
    ISub { dest: PexValue, a: PexValue, b: PexValue },
    IMul { dest: PexValue, a: PexValue, b: PexValue },
    IDiv { dest: PexValue, a: PexValue, b: PexValue },
    IMod { dest: PexValue, a: PexValue, b: PexValue },
    FAdd { dest: PexValue, a: PexValue, b: PexValue },
    FSub { dest: PexValue, a: PexValue, b: PexValue },
    FMul { dest: PexValue, a: PexValue, b: PexValue },
    FDiv { dest: PexValue, a: PexValue, b: PexValue },

    INeg { dest: PexValue, src: PexValue },
    FNeg { dest: PexValue, src: PexValue },
    Not { dest: PexValue, src: PexValue },

    CmpEq { dest: PexValue, a: PexValue, b: PexValue },
    CmpLt { dest: PexValue, a: PexValue, b: PexValue },
    CmpLe { dest: PexValue, a: PexValue, b: PexValue },
    CmpGt { dest: PexValue, a: PexValue, b: PexValue },
    CmpGe { dest: PexValue, a: PexValue, b: PexValue },

    StrCat { dest: PexValue, a: PexValue, b: PexValue },

    Jmp { target: u32 },
    JmpT { cond: PexValue, target: u32 },
    JmpF { cond: PexValue, target: u32 },

    PropGet {
        property: PexStringId,
        object: PexValue,
        dest: PexValue,
    },
    PropSet {
        property: PexStringId,
        object: PexValue,
        value: PexValue,
    },
    StructGet {
        dest: PexValue,
        strukt: PexValue,
        member: PexStringId,
    },
    StructSet {
        strukt: PexValue,
        member: PexStringId,
        value: PexValue,
    },

    ArrayCreate { dest: PexValue, size: PexValue },
    ArrayLength { dest: PexValue, array: PexValue },
    ArrayGetElement {
        dest: PexValue,
        array: PexValue,
        index: PexValue,
    },
    ArraySetElement {
        array: PexValue,
        index: PexValue,
        value: PexValue,
    },
    ArrayFindElement {
        array: PexValue,
        dest: PexValue,
        value: PexValue,
        start_index: PexValue,
    },
    ArrayRFindElement {
        array: PexValue,
        dest: PexValue,
        value: PexValue,
        start_index: PexValue,
    },
    ArrayFindStruct {
        array: PexValue,
        dest: PexValue,
        member: PexValue,
        value: PexValue,
        start_index: PexValue,
    },
    ArrayRFindStruct {
        array: PexValue,
        dest: PexValue,
        member: PexValue,
        value: PexValue,
        start_index: PexValue,
    },
    ArrayAdd {
        array: PexValue,
        value: PexValue,
        count: PexValue,
    },
    ArrayClear { array: PexValue },
    ArrayInsert {
        array: PexValue,
        value: PexValue,
        index: PexValue,
    },
    ArrayRemove {
        array: PexValue,
        index: PexValue,
        count: PexValue,
    },
    ArrayRemoveLast { array: PexValue },
}

impl PexOpcode {
    /// The assembler mnemonic, as written in disassembly listings.
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }
}
