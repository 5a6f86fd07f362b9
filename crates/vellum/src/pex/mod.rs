//! The typed PEX model the emitter populates.
//!
//! `PexFile` and its nested records are the contract with the external
//! binary serializer: object, state, function, variable, property,
//! user-flag, string-table, and debug-function tables, all well-formed and
//! within engine limits. The bit layout of `.pex` is the serializer's
//! business.
//!
//! # Module Structure
//!
//! - `op` - the closed opcode set
//! - `builder` - `PexFunctionBuilder` for emitting function bodies
//! - `emit` - lowering from the resolved AST into this model

pub use builder::{JumpPatch, PexFunctionBuilder};
pub use emit::{build_script_pex, Emitter};
pub use op::{CallArgs, PexOpcode};

pub mod builder;
pub mod emit;
pub mod op;

use indexmap::IndexSet;

/// Handle into a [`PexFile`]'s deduplicated string pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PexStringId(u32);

impl PexStringId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value operand of an instruction or a declaration default.
#[derive(Debug, Clone, PartialEq)]
pub enum PexValue {
    None,
    Identifier(PexStringId),
    String(PexStringId),
    Integer(i32),
    Float(f32),
    Bool(bool),
}

impl PexValue {
    /// True for everything except `None`; used for the initial-value count.
    pub fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// The compiled container for one script.
#[derive(Debug, Default, PartialEq)]
pub struct PexFile {
    strings: IndexSet<String>,
    pub source_file_name: String,
    /// Distinct user flags as `(name, bit index)` in registration order.
    pub user_flags: Vec<(PexStringId, u8)>,
    pub objects: Vec<PexObject>,
    pub debug_info: Option<PexDebugInfo>,
}

impl PexFile {
    pub fn new(source_file_name: impl Into<String>, with_debug_info: bool) -> Self {
        Self {
            strings: IndexSet::new(),
            source_file_name: source_file_name.into(),
            user_flags: Vec::new(),
            objects: Vec::new(),
            debug_info: with_debug_info.then(PexDebugInfo::default),
        }
    }

    /// Interns a string, case-sensitively, and returns its handle.
    ///
    /// Two calls return the same handle iff the strings are identical; the
    /// pool keeps insertion order, which is what makes repeated runs over
    /// the same input produce identical files.
    pub fn get_string(&mut self, s: &str) -> PexStringId {
        if let Some(index) = self.strings.get_index_of(s) {
            return PexStringId(index as u32);
        }
        let (index, _) = self.strings.insert_full(s.to_owned());
        PexStringId(index as u32)
    }

    /// Looks a pooled string back up.
    ///
    /// # Panics
    /// Panics if the handle did not come from this file.
    pub fn string(&self, id: PexStringId) -> &str {
        self.strings.get_index(id.index()).expect("foreign PexStringId")
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    /// Registers a user flag and returns its bit index; re-registration of
    /// the same name returns the existing bit.
    pub fn register_user_flag(&mut self, name: &str) -> u8 {
        let id = self.get_string(name);
        if let Some(&(_, bit)) = self.user_flags.iter().find(|(existing, _)| *existing == id) {
            return bit;
        }
        let bit = self.user_flags.len() as u8;
        self.user_flags.push((id, bit));
        bit
    }
}

/// One compiled object.
#[derive(Debug, PartialEq)]
pub struct PexObject {
    pub name: PexStringId,
    /// Empty string when the object has no parent.
    pub parent_class_name: PexStringId,
    pub documentation_string: PexStringId,
    pub is_const: bool,
    /// Empty string when no auto state was declared.
    pub auto_state_name: PexStringId,
    pub user_flags: u32,
    pub structs: Vec<PexStruct>,
    pub variables: Vec<PexVariable>,
    pub properties: Vec<PexProperty>,
    pub states: Vec<PexState>,
}

#[derive(Debug, PartialEq)]
pub struct PexStruct {
    pub name: PexStringId,
    pub members: Vec<PexStructMember>,
}

#[derive(Debug, PartialEq)]
pub struct PexStructMember {
    pub name: PexStringId,
    pub type_name: PexStringId,
    pub user_flags: u32,
    pub default_value: PexValue,
    pub is_const: bool,
    pub documentation_string: PexStringId,
}

#[derive(Debug, PartialEq)]
pub struct PexVariable {
    pub name: PexStringId,
    pub type_name: PexStringId,
    pub user_flags: u32,
    pub default_value: PexValue,
    pub is_const: bool,
}

#[derive(Debug, PartialEq)]
pub struct PexProperty {
    pub name: PexStringId,
    pub type_name: PexStringId,
    pub documentation_string: PexStringId,
    pub user_flags: u32,
    pub is_readable: bool,
    pub is_writable: bool,
    pub is_auto: bool,
    /// Backing variable name for auto properties.
    pub auto_var_name: Option<PexStringId>,
    pub read_function: Option<PexFunction>,
    pub write_function: Option<PexFunction>,
}

#[derive(Debug, PartialEq)]
pub struct PexState {
    pub name: PexStringId,
    pub functions: Vec<PexFunction>,
}

#[derive(Debug, Default, PartialEq)]
pub struct PexFunction {
    /// `None` for property accessors, whose identity comes from the property.
    pub name: Option<PexStringId>,
    pub documentation_string: Option<PexStringId>,
    pub return_type_name: PexStringId,
    pub user_flags: u32,
    pub is_global: bool,
    pub is_native: bool,
    pub parameters: Vec<PexFunctionParameter>,
    pub locals: Vec<PexLocal>,
    pub instructions: Vec<PexOpcode>,
}

#[derive(Debug, PartialEq)]
pub struct PexFunctionParameter {
    pub name: PexStringId,
    pub type_name: PexStringId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PexLocal {
    pub name: PexStringId,
    pub type_name: PexStringId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PexDebugFunctionType {
    Normal,
    Getter,
    Setter,
}

/// One function's debug record: where it lives and its per-instruction
/// line map.
#[derive(Debug, PartialEq)]
pub struct PexDebugFunctionInfo {
    pub object_name: PexStringId,
    /// Empty for property accessors.
    pub state_name: PexStringId,
    pub function_name: PexStringId,
    pub function_type: PexDebugFunctionType,
    pub instruction_line_map: Vec<u16>,
}

#[derive(Debug, Default, PartialEq)]
pub struct PexDebugInfo {
    pub functions: Vec<PexDebugFunctionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_pool_interns_case_sensitively() {
        let mut file = PexFile::new("Test.psc", false);
        let a = file.get_string("Health");
        let b = file.get_string("Health");
        let c = file.get_string("health");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(file.string(a), "Health");
        assert_eq!(file.string(c), "health");
        assert_eq!(file.string_count(), 2);
    }

    #[test]
    fn test_user_flag_registration_dedups() {
        let mut file = PexFile::new("Test.psc", false);
        let hidden = file.register_user_flag("hidden");
        let conditional = file.register_user_flag("conditional");
        assert_eq!(hidden, 0);
        assert_eq!(conditional, 1);
        assert_eq!(file.register_user_flag("hidden"), 0);
        assert_eq!(file.user_flags.len(), 2);
    }
}
