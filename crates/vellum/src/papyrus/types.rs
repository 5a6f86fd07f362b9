//! The Papyrus type model.

use crate::{
    ident::caseless_eq,
    papyrus::script::{ObjectRef, ScriptStore, StructRef},
};

/// A Papyrus type as it moves through resolution.
///
/// Types start out structural (`Unresolved` names straight from the parser,
/// possibly nested in `Array`) and are rewritten in place by
/// `ResolutionContext::resolve_type` into their resolved forms. After
/// resolution no `Unresolved` survives; the emitter relies on that.
#[derive(Debug, Clone, Default)]
pub enum PapyrusType {
    #[default]
    None,
    Bool,
    Float,
    Int,
    String,
    /// The dynamic `Var` type; holds any value at runtime.
    Var,
    Array(Box<PapyrusType>),
    Unresolved(String),
    ResolvedObject(ObjectRef),
    ResolvedStruct(StructRef),
}

impl PartialEq for PapyrusType {
    /// Structural for primitives, recursive for arrays, nominal (handle
    /// identity) for resolved objects and structs, and case-insensitive on
    /// the name for unresolved types.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None)
            | (Self::Bool, Self::Bool)
            | (Self::Float, Self::Float)
            | (Self::Int, Self::Int)
            | (Self::String, Self::String)
            | (Self::Var, Self::Var) => true,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Unresolved(a), Self::Unresolved(b)) => caseless_eq(a, b),
            (Self::ResolvedObject(a), Self::ResolvedObject(b)) => a == b,
            (Self::ResolvedStruct(a), Self::ResolvedStruct(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PapyrusType {}

impl PapyrusType {
    /// The element type of an array, if this is one.
    pub fn element_type(&self) -> Option<&Self> {
        match self {
            Self::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        match self {
            Self::Unresolved(_) => true,
            Self::Array(element) => element.is_unresolved(),
            _ => false,
        }
    }

    /// Canonical string rendering: primitives in title case, arrays with a
    /// `[]` suffix, resolved objects lowercased, resolved structs as
    /// `<parentobject>#<struct>` lowercased.
    pub fn type_string(&self, store: &ScriptStore) -> String {
        match self {
            Self::None => "None".to_owned(),
            Self::Bool => "Bool".to_owned(),
            Self::Float => "Float".to_owned(),
            Self::Int => "Int".to_owned(),
            Self::String => "String".to_owned(),
            Self::Var => "Var".to_owned(),
            Self::Array(element) => format!("{}[]", element.type_string(store)),
            Self::Unresolved(name) => name.clone(),
            Self::ResolvedObject(object) => store.object(*object).name.to_ascii_lowercase(),
            Self::ResolvedStruct(strukt) => {
                let name = format!(
                    "{}#{}",
                    store.object(strukt.object).name,
                    store.strukt(*strukt).name
                );
                name.to_ascii_lowercase()
            }
        }
    }
}
