//! The Papyrus AST data model.
//!
//! Nodes are created by the parser collaborator, mutated only during the
//! three resolution passes, frozen before emission, and dropped with the
//! `ScriptStore`. Ownership follows the source structure: a script owns its
//! objects, an object its structs/variables/property groups/states, a state
//! its functions, a function its parameters and statements.

use crate::{
    location::SourceLocation,
    papyrus::{statements::Statement, types::PapyrusType},
};

/// One parsed `.psc` file.
#[derive(Debug)]
pub struct Script {
    /// Source file name, carried into the emitted debug info.
    pub source_file_name: String,
    pub objects: Vec<Object>,
}

impl Script {
    /// The script's registry key: its first object's name.
    ///
    /// # Panics
    /// Panics if the script has no objects; the parser never produces one.
    pub fn name(&self) -> &str {
        &self.objects[0].name
    }
}

/// Engine-defined metadata bits attached to declarations.
///
/// The set of valid flag names is configured externally; the core models the
/// ones resolution and emission care about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFlags {
    pub is_const: bool,
    pub is_hidden: bool,
    pub is_conditional: bool,
}

impl UserFlags {
    /// The names of the set flags, in their fixed bit order.
    pub fn flag_names(self) -> impl Iterator<Item = &'static str> {
        [
            self.is_const.then_some("const"),
            self.is_hidden.then_some("hidden"),
            self.is_conditional.then_some("conditional"),
        ]
        .into_iter()
        .flatten()
    }
}

/// A top-level declaration in a script.
#[derive(Debug)]
pub struct Object {
    pub name: String,
    pub documentation: String,
    pub user_flags: UserFlags,
    pub parent_class: PapyrusType,
    /// Name of the state entered at construction, if the source declared one.
    pub auto_state_name: Option<String>,
    pub location: SourceLocation,
    pub imports: Vec<(SourceLocation, String)>,
    pub structs: Vec<Struct>,
    pub variables: Vec<Variable>,
    pub property_groups: Vec<PropertyGroup>,
    /// The root (empty-named) state is always present at index 0.
    pub states: Vec<State>,
    /// Resolved index of the auto state, set during the semantic pass.
    pub(crate) auto_state: Option<u32>,
    root_property_group: Option<u32>,
}

impl Object {
    pub fn new(location: SourceLocation, name: impl Into<String>, parent_class: PapyrusType) -> Self {
        Self {
            name: name.into(),
            documentation: String::new(),
            user_flags: UserFlags::default(),
            parent_class,
            auto_state_name: None,
            location: location.clone(),
            imports: Vec::new(),
            structs: Vec::new(),
            variables: Vec::new(),
            property_groups: Vec::new(),
            states: vec![State::root(location)],
            auto_state: None,
            root_property_group: None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.user_flags.is_const
    }

    pub fn root_state(&self) -> &State {
        &self.states[0]
    }

    pub fn root_state_mut(&mut self) -> &mut State {
        &mut self.states[0]
    }

    /// The unnamed property group, created on first use.
    pub fn root_property_group_mut(&mut self) -> &mut PropertyGroup {
        let index = match self.root_property_group {
            Some(index) => index,
            None => {
                let index = self.property_groups.len() as u32;
                self.property_groups.push(PropertyGroup {
                    name: String::new(),
                    documentation: String::new(),
                    user_flags: UserFlags::default(),
                    location: self.location.clone(),
                    properties: Vec::new(),
                });
                self.root_property_group = Some(index);
                index
            }
        };
        &mut self.property_groups[index as usize]
    }

    /// The resolved auto state's name, if any.
    pub fn auto_state(&self) -> Option<&State> {
        self.auto_state.map(|index| &self.states[index as usize])
    }
}

/// A named container of typed fields.
#[derive(Debug)]
pub struct Struct {
    pub name: String,
    pub location: SourceLocation,
    pub members: Vec<StructMember>,
}

/// A field of a [`Struct`].
#[derive(Debug)]
pub struct StructMember {
    pub name: String,
    pub location: SourceLocation,
    pub member_type: PapyrusType,
    pub user_flags: UserFlags,
    pub documentation: String,
    pub default_value: Option<Literal>,
}

/// A named bundle of functions; the empty-named state is the root.
#[derive(Debug)]
pub struct State {
    pub name: String,
    pub location: SourceLocation,
    pub functions: Vec<Function>,
}

impl State {
    pub fn root(location: SourceLocation) -> Self {
        Self {
            name: String::new(),
            location,
            functions: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }
}

/// A display grouping of properties.
#[derive(Debug)]
pub struct PropertyGroup {
    pub name: String,
    pub documentation: String,
    pub user_flags: UserFlags,
    pub location: SourceLocation,
    pub properties: Vec<Property>,
}

/// A property of an object.
///
/// Auto properties get an engine-backed variable; full properties carry
/// explicit getter and/or setter functions.
#[derive(Debug)]
pub struct Property {
    pub name: String,
    pub location: SourceLocation,
    pub property_type: PapyrusType,
    pub user_flags: UserFlags,
    pub documentation: String,
    pub is_auto: bool,
    pub default_value: Option<Literal>,
    pub read_function: Option<Function>,
    pub write_function: Option<Function>,
}

/// How a script variable has been touched, accumulated during `semantic2`
/// and consumed by the unused-variable diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableReferenceState {
    pub is_read: bool,
    pub is_written: bool,
    pub is_initialized: bool,
}

/// An object-level (script) variable.
#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub location: SourceLocation,
    pub variable_type: PapyrusType,
    pub user_flags: UserFlags,
    pub default_value: Option<Literal>,
    pub reference_state: VariableReferenceState,
}

/// A function parameter.
#[derive(Debug)]
pub struct Parameter {
    pub name: String,
    pub location: SourceLocation,
    pub parameter_type: PapyrusType,
    pub default_value: Option<Literal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    Function,
    Event,
    Getter,
    Setter,
}

/// Index of a local declaration in its function's locals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalSlot(pub(crate) u32);

impl LocalSlot {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A local variable discovered during `semantic2`.
///
/// The name here is kept in sync with the declare statement's own name when
/// mangling rewrites it; identifier loads emitted later read the name
/// through the slot so they always see the mangled form.
#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub local_type: PapyrusType,
}

/// A function or event.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub location: SourceLocation,
    pub documentation: String,
    pub user_flags: UserFlags,
    pub return_type: PapyrusType,
    pub parameters: Vec<Parameter>,
    pub statements: Vec<Statement>,
    pub function_type: FunctionType,
    pub is_global: bool,
    pub is_native: bool,
    /// Locals table filled by `semantic2`; empty until then.
    pub locals: Vec<LocalDecl>,
}

impl Function {
    pub fn new(
        location: SourceLocation,
        name: impl Into<String>,
        function_type: FunctionType,
        return_type: PapyrusType,
    ) -> Self {
        Self {
            name: name.into(),
            location,
            documentation: String::new(),
            user_flags: UserFlags::default(),
            return_type,
            parameters: Vec::new(),
            statements: Vec::new(),
            function_type,
            is_global: false,
            is_native: false,
            locals: Vec::new(),
        }
    }
}

/// A literal value usable as a default or in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
}

impl Literal {
    pub fn literal_type(&self) -> PapyrusType {
        match self {
            Self::None => PapyrusType::None,
            Self::Int(_) => PapyrusType::Int,
            Self::Float(_) => PapyrusType::Float,
            Self::Bool(_) => PapyrusType::Bool,
            Self::String(_) => PapyrusType::String,
        }
    }
}
