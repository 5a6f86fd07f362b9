//! The loaded-scripts arena and the handles that reference into it.
//!
//! Every script loaded during a compilation lives in one [`ScriptStore`].
//! Scripts own their objects, objects own their members, and everything that
//! needs to point *across* that ownership tree (resolved types, resolved
//! identifiers) does so with small `Copy` handles resolved through the
//! store. Handles stay valid for the lifetime of the store because scripts
//! are only ever appended, never removed.

use ahash::AHashMap;

use crate::{
    ident::CaselessKey,
    papyrus::ast::{Function, Object, Property, Script, Struct, StructMember, Variable},
};

/// Index of a loaded script in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId(u32);

impl ScriptId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("script count exceeds u32"))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an object (top-level declaration) inside a loaded script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub script: ScriptId,
    pub index: u32,
}

/// Handle to a struct declared inside an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructRef {
    pub object: ObjectRef,
    pub index: u32,
}

/// Handle to a field of a struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub strukt: StructRef,
    pub index: u32,
}

/// Handle to a property inside one of an object's property groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    pub object: ObjectRef,
    pub group: u32,
    pub index: u32,
}

/// Handle to an object-level (script) variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableRef {
    pub object: ObjectRef,
    pub index: u32,
}

/// Handle to a function inside one of an object's states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub object: ObjectRef,
    pub state: u32,
    pub index: u32,
}

/// Owner of every script loaded during one compilation.
///
/// The registry maps each script's key (its first object's name,
/// case-insensitive) to its id; `insert` registers the script before its
/// semantic passes run, which is what breaks import cycles.
#[derive(Debug, Default)]
pub struct ScriptStore {
    scripts: Vec<Script>,
    registry: AHashMap<CaselessKey, ScriptId>,
}

impl ScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an already-loaded script by name, case-insensitively.
    pub fn get_loaded(&self, name: &str) -> Option<ScriptId> {
        self.registry.get(&CaselessKey::new(name)).copied()
    }

    /// Adds a parsed script and registers it under its first object's name.
    ///
    /// # Panics
    /// Panics if the script has no objects; the parser never produces one.
    pub fn insert(&mut self, script: Script) -> ScriptId {
        let id = ScriptId::new(self.scripts.len());
        let key = CaselessKey::new(&script.objects[0].name);
        self.registry.insert(key, id);
        self.scripts.push(script);
        id
    }

    pub fn script(&self, id: ScriptId) -> &Script {
        &self.scripts[id.index()]
    }

    pub fn script_mut(&mut self, id: ScriptId) -> &mut Script {
        &mut self.scripts[id.index()]
    }

    pub fn object(&self, r: ObjectRef) -> &Object {
        &self.scripts[r.script.index()].objects[r.index as usize]
    }

    pub fn object_mut(&mut self, r: ObjectRef) -> &mut Object {
        &mut self.scripts[r.script.index()].objects[r.index as usize]
    }

    pub fn strukt(&self, r: StructRef) -> &Struct {
        &self.object(r.object).structs[r.index as usize]
    }

    pub fn member(&self, r: MemberRef) -> &StructMember {
        &self.strukt(r.strukt).members[r.index as usize]
    }

    pub fn property(&self, r: PropertyRef) -> &Property {
        &self.object(r.object).property_groups[r.group as usize].properties[r.index as usize]
    }

    pub fn variable(&self, r: VariableRef) -> &Variable {
        &self.object(r.object).variables[r.index as usize]
    }

    pub fn variable_mut(&mut self, r: VariableRef) -> &mut Variable {
        &mut self.object_mut(r.object).variables[r.index as usize]
    }

    pub fn function(&self, r: FunctionRef) -> &Function {
        &self.object(r.object).states[r.state as usize].functions[r.index as usize]
    }

    pub fn function_mut(&mut self, r: FunctionRef) -> &mut Function {
        &mut self.object_mut(r.object).states[r.state as usize].functions[r.index as usize]
    }

    /// Iterates the objects of a script together with their handles.
    pub fn objects(&self, id: ScriptId) -> impl Iterator<Item = (ObjectRef, &Object)> {
        self.scripts[id.index()].objects.iter().enumerate().map(move |(index, object)| {
            (
                ObjectRef {
                    script: id,
                    index: index as u32,
                },
                object,
            )
        })
    }
}
