//! Identifier resolution results.

use strum::EnumString;

use crate::papyrus::{
    ast::LocalSlot,
    script::{FunctionRef, MemberRef, PropertyRef, ScriptStore, VariableRef},
    types::PapyrusType,
};

/// The builtin functions callable on array values.
///
/// `find`/`rfind` classify to the struct-searching forms when the array's
/// element type is a resolved struct; the struct forms never parse directly
/// from a source name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BuiltinArrayFunctionKind {
    Find,
    #[strum(disabled)]
    FindStruct,
    RFind,
    #[strum(disabled)]
    RFindStruct,
    Add,
    Clear,
    Insert,
    Remove,
    RemoveLast,
}

/// What a name turned out to mean.
///
/// Starts as `Unresolved` straight from the parser; the resolution context
/// rewrites it into one of the bound forms. Bound forms refer to their
/// targets through store handles (or, for locals, through the owning
/// function's locals table) so later renames stay visible at emission.
#[derive(Debug, Clone, PartialEq)]
pub enum PapyrusIdentifier {
    Unresolved {
        name: String,
    },
    LocalVariable {
        slot: LocalSlot,
        local_type: PapyrusType,
    },
    Parameter {
        name: String,
        parameter_type: PapyrusType,
    },
    Variable(VariableRef),
    Property(PropertyRef),
    StructMember(MemberRef),
    Function(FunctionRef),
    BuiltinArrayFunction {
        kind: BuiltinArrayFunctionKind,
        element_type: Box<PapyrusType>,
    },
}

impl PapyrusIdentifier {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::Unresolved { name: name.into() }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }

    /// The type of the value this identifier denotes.
    ///
    /// Functions and array builtins answer with their return type; an
    /// unresolved identifier answers `None` as the best-effort placeholder.
    pub fn value_type(&self, store: &ScriptStore) -> PapyrusType {
        match self {
            Self::Unresolved { .. } => PapyrusType::None,
            Self::LocalVariable { local_type, .. } => local_type.clone(),
            Self::Parameter { parameter_type, .. } => parameter_type.clone(),
            Self::Variable(r) => store.variable(*r).variable_type.clone(),
            Self::Property(r) => store.property(*r).property_type.clone(),
            Self::StructMember(r) => store.member(*r).member_type.clone(),
            Self::Function(r) => store.function(*r).return_type.clone(),
            Self::BuiltinArrayFunction { kind, .. } => match kind {
                BuiltinArrayFunctionKind::Find
                | BuiltinArrayFunctionKind::FindStruct
                | BuiltinArrayFunctionKind::RFind
                | BuiltinArrayFunctionKind::RFindStruct => PapyrusType::Int,
                _ => PapyrusType::None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_builtin_classification_is_caseless() {
        assert_eq!(
            BuiltinArrayFunctionKind::from_str("Find").unwrap(),
            BuiltinArrayFunctionKind::Find
        );
        assert_eq!(
            BuiltinArrayFunctionKind::from_str("REMOVELAST").unwrap(),
            BuiltinArrayFunctionKind::RemoveLast
        );
        assert!(BuiltinArrayFunctionKind::from_str("findstruct").is_err());
        assert!(BuiltinArrayFunctionKind::from_str("sort").is_err());
    }
}
