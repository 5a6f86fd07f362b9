//! The multi-pass symbol resolver.
//!
//! A `ResolutionContext` is the mutable coordinator threaded through the
//! passes of one compilation:
//!
//! 1. `pre_semantic` resolves each object's parent class.
//! 2. `semantic` resolves the public API: imports, struct members, variable
//!    types, property types, state members, function signatures. Reference
//!    scripts stop here and release their bodies.
//! 3. `semantic2` resolves function bodies against the local-scope stack,
//!    detects inherited identifier conflicts, mangles reused local names,
//!    and reports unused script variables.
//!
//! The context owns the import list, the identifier scope stack, and the
//! per-function locals accumulator; the loaded-scripts registry lives in the
//! shared `ScriptStore`, so scripts loaded while resolving an import persist
//! for the rest of the compilation.

use std::str::FromStr;

use ahash::{AHashMap, AHashSet};

use crate::{
    config::CompilerConfig,
    diagnostics::{CompileResult, Diagnostics, Warning},
    ident::{caseless_eq, CaselessKey},
    location::SourceLocation,
    parse::{locate_script, ScriptParser},
    papyrus::{
        ast::{Function, LocalDecl, LocalSlot, Variable, VariableReferenceState},
        identifier::{BuiltinArrayFunctionKind, PapyrusIdentifier},
        script::{
            FunctionRef, MemberRef, ObjectRef, PropertyRef, ScriptId, ScriptStore, StructRef, VariableRef,
        },
        statements::{for_each_declare, Statement},
        types::PapyrusType,
    },
};

const UNRESOLVED_PARENT: &str = "Something is wrong here, this should already have been resolved!";

/// Owns declarations released early from reference scripts.
///
/// Imported scripts only contribute signatures; their variable declarations
/// and function bodies are transferred here during `semantic` and dropped
/// together when the context is torn down.
#[derive(Debug, Default)]
struct DropSink {
    statements: Vec<Vec<Statement>>,
    variables: Vec<Variable>,
}

impl DropSink {
    fn discard_statements(&mut self, statements: Vec<Statement>) {
        if !statements.is_empty() {
            self.statements.push(statements);
        }
    }

    fn discard_variables(&mut self, variables: Vec<Variable>) {
        self.variables.extend(variables);
    }
}

/// Addresses one function within an object, wherever it lives.
#[derive(Debug, Clone, Copy)]
enum FnSlot {
    State { state: u32, index: u32 },
    Getter { group: u32, index: u32 },
    Setter { group: u32, index: u32 },
}

fn slot_mut(store: &mut ScriptStore, object: ObjectRef, slot: FnSlot) -> &mut Function {
    match slot {
        FnSlot::State { state, index } => {
            &mut store.object_mut(object).states[state as usize].functions[index as usize]
        }
        FnSlot::Getter { group, index } => store.object_mut(object).property_groups[group as usize]
            .properties[index as usize]
            .read_function
            .as_mut()
            .expect("getter slot addresses an existing function"),
        FnSlot::Setter { group, index } => store.object_mut(object).property_groups[group as usize]
            .properties[index as usize]
            .write_function
            .as_mut()
            .expect("setter slot addresses an existing function"),
    }
}

/// The mutable coordinator for one script's resolution.
pub struct ResolutionContext<'a> {
    pub config: &'a CompilerConfig,
    pub diags: &'a mut Diagnostics,
    parser: &'a mut dyn ScriptParser,
    pub store: &'a mut ScriptStore,
    imported_scripts: Vec<ScriptId>,
    /// Innermost scope last.
    identifier_stack: Vec<AHashMap<CaselessKey, PapyrusIdentifier>>,
    pub(crate) object: Option<ObjectRef>,
    pub(crate) function: Option<FunctionRef>,
    /// Locals of the function currently in `semantic2`.
    locals: Vec<LocalDecl>,
    resolving_reference_script: bool,
    is_external_resolution: bool,
    drop_sink: DropSink,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        config: &'a CompilerConfig,
        diags: &'a mut Diagnostics,
        parser: &'a mut dyn ScriptParser,
        store: &'a mut ScriptStore,
    ) -> Self {
        Self {
            config,
            diags,
            parser,
            store,
            imported_scripts: Vec::new(),
            identifier_stack: Vec::new(),
            object: None,
            function: None,
            locals: Vec::new(),
            resolving_reference_script: false,
            is_external_resolution: false,
            drop_sink: DropSink::default(),
        }
    }

    /// Runs all resolution passes over a script.
    pub fn resolve_script(&mut self, script: ScriptId) -> CompileResult<()> {
        self.pre_semantic(script)?;
        let object_count = self.store.script(script).objects.len();
        for index in 0..object_count {
            self.object_semantic(ObjectRef {
                script,
                index: index as u32,
            })?;
        }
        Ok(())
    }

    fn pre_semantic(&mut self, script: ScriptId) -> CompileResult<()> {
        let object_count = self.store.script(script).objects.len();
        for index in 0..object_count {
            let object = ObjectRef {
                script,
                index: index as u32,
            };
            let (parent, location) = {
                let o = self.store.object(object);
                (o.parent_class.clone(), o.location.clone())
            };
            let resolved = self.resolve_type(parent, &location)?;
            self.store.object_mut(object).parent_class = resolved;
        }
        Ok(())
    }

    // === Imports and script loading ===

    /// Loads and records an imported script.
    ///
    /// A missing script is fatal. Importing the same script twice warns
    /// (W4002) but otherwise succeeds.
    pub fn add_import(&mut self, location: &SourceLocation, name: &str) -> CompileResult<()> {
        let Some(id) = self.load_script(name)? else {
            return Err(self
                .diags
                .fatal(location, format!("Failed to find imported script '{name}.psc'!")));
        };
        if self.imported_scripts.contains(&id) {
            self.diags
                .warning(location, &Warning::DuplicateImport { name: name.to_owned() });
            return Ok(());
        }
        self.imported_scripts.push(id);
        Ok(())
    }

    /// Returns the script registered under `name`, loading it on demand.
    ///
    /// The registry answer comes first, which also breaks import cycles:
    /// scripts are registered before their own semantic passes run, so a
    /// cyclic import finds the half-resolved script instead of recursing
    /// forever. Returns `None` when no import directory holds the script.
    pub fn load_script(&mut self, name: &str) -> CompileResult<Option<ScriptId>> {
        if let Some(id) = self.store.get_loaded(name) {
            return Ok(Some(id));
        }
        let dirs = self.config.import_directories.clone();
        for dir in &dirs {
            let Some(path) = locate_script(dir, name) else {
                continue;
            };
            let script = self.parser.parse_script(&path)?;
            let id = self.store.insert(script);
            self.resolve_external(id)?;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Resolves a freshly loaded script in reference mode, with this
    /// context's registry shared so transitively loaded scripts persist.
    fn resolve_external(&mut self, script: ScriptId) -> CompileResult<()> {
        let saved_imports = std::mem::take(&mut self.imported_scripts);
        let saved_stack = std::mem::take(&mut self.identifier_stack);
        let saved_object = self.object.take();
        let saved_function = self.function.take();
        let saved_reference = std::mem::replace(&mut self.resolving_reference_script, true);
        let saved_external = std::mem::replace(&mut self.is_external_resolution, true);

        let result = self.resolve_script(script);

        self.imported_scripts = saved_imports;
        self.identifier_stack = saved_stack;
        self.object = saved_object;
        self.function = saved_function;
        self.resolving_reference_script = saved_reference;
        self.is_external_resolution = saved_external;
        result
    }

    // === Type resolution ===

    /// Resolves a type reference, loading other scripts as needed.
    ///
    /// Already-resolved types pass through unchanged; arrays resolve their
    /// element type. An unresolved name is searched, in order, in the
    /// current object's structs, the current object itself, every imported
    /// script's structs, and finally a script of the same name loaded on
    /// demand. Failure is fatal.
    pub fn resolve_type(
        &mut self,
        tp: PapyrusType,
        location: &SourceLocation,
    ) -> CompileResult<PapyrusType> {
        let name = match tp {
            PapyrusType::Array(element) => {
                let resolved = self.resolve_type(*element, location)?;
                return Ok(PapyrusType::Array(Box::new(resolved)));
            }
            PapyrusType::Unresolved(name) => name,
            other => return Ok(other),
        };

        if self.config.enable_decompiled_struct_name_refs {
            if let Some(pos) = name.find('#') {
                return self.resolve_decompiled_struct_ref(&name, pos, location);
            }
        }

        if let Some(object) = self.object {
            let o = self.store.object(object);
            for (index, strukt) in o.structs.iter().enumerate() {
                if caseless_eq(&strukt.name, &name) {
                    return Ok(PapyrusType::ResolvedStruct(StructRef {
                        object,
                        index: index as u32,
                    }));
                }
            }
            if caseless_eq(&o.name, &name) {
                return Ok(PapyrusType::ResolvedObject(object));
            }
        }

        let imported = self.imported_scripts.clone();
        for id in imported {
            for (object, o) in self.store.objects(id) {
                for (index, strukt) in o.structs.iter().enumerate() {
                    if caseless_eq(&strukt.name, &name) {
                        return Ok(PapyrusType::ResolvedStruct(StructRef {
                            object,
                            index: index as u32,
                        }));
                    }
                }
            }
        }

        if let Some(id) = self.load_script(&name)? {
            for (object, o) in self.store.objects(id) {
                if caseless_eq(&o.name, &name) {
                    return Ok(PapyrusType::ResolvedObject(object));
                }
            }
        }

        Err(self
            .diags
            .fatal(location, format!("Unable to resolve type '{name}'!")))
    }

    /// Resolves a `<script>#<struct>` reference produced by decompilers.
    fn resolve_decompiled_struct_ref(
        &mut self,
        name: &str,
        separator: usize,
        location: &SourceLocation,
    ) -> CompileResult<PapyrusType> {
        let script_name = &name[..separator];
        let struct_name = &name[separator + 1..];
        let Some(id) = self.load_script(script_name)? else {
            return Err(self.diags.fatal(
                location,
                format!("Unable to find script '{script_name}' referenced by '{name}'!"),
            ));
        };
        for (object, o) in self.store.objects(id) {
            for (index, strukt) in o.structs.iter().enumerate() {
                if caseless_eq(&strukt.name, struct_name) {
                    return Ok(PapyrusType::ResolvedStruct(StructRef {
                        object,
                        index: index as u32,
                    }));
                }
            }
        }
        Err(self.diags.fatal(
            location,
            format!("Unable to resolve a struct named '{struct_name}' in script '{script_name}'!"),
        ))
    }

    // === Identifier resolution ===

    /// Resolves a bare identifier against the scope stack, falling back to
    /// members of the parent class. Returns the input unchanged when nothing
    /// matches.
    pub fn try_resolve_identifier(
        &mut self,
        ident: PapyrusIdentifier,
    ) -> CompileResult<PapyrusIdentifier> {
        let name = match &ident {
            PapyrusIdentifier::Unresolved { name } => name.clone(),
            _ => return Ok(ident),
        };
        let key = CaselessKey::new(&name);
        for scope in self.identifier_stack.iter().rev() {
            if let Some(found) = scope.get(&key) {
                return Ok(found.clone());
            }
        }
        let Some(object) = self.object else {
            return Ok(ident);
        };
        let parent = self.store.object(object).parent_class.clone();
        if parent != PapyrusType::None {
            if !matches!(parent, PapyrusType::ResolvedObject(_)) {
                return Err(self.diags.logical_fatal(UNRESOLVED_PARENT));
            }
            return self.try_resolve_member_identifier(&parent, ident);
        }
        Ok(ident)
    }

    /// Resolves a member name against a base type: struct members for
    /// resolved structs, properties (walking the parent chain) for resolved
    /// objects. Returns the input unchanged when nothing matches.
    pub fn try_resolve_member_identifier(
        &mut self,
        base_type: &PapyrusType,
        ident: PapyrusIdentifier,
    ) -> CompileResult<PapyrusIdentifier> {
        let name = match &ident {
            PapyrusIdentifier::Unresolved { name } => name.clone(),
            _ => return Ok(ident),
        };
        match base_type {
            PapyrusType::ResolvedStruct(r) => {
                let strukt = self.store.strukt(*r);
                for (index, member) in strukt.members.iter().enumerate() {
                    if caseless_eq(&member.name, &name) {
                        return Ok(PapyrusIdentifier::StructMember(MemberRef {
                            strukt: *r,
                            index: index as u32,
                        }));
                    }
                }
                Ok(ident)
            }
            PapyrusType::ResolvedObject(r) => {
                {
                    let o = self.store.object(*r);
                    for (group, g) in o.property_groups.iter().enumerate() {
                        for (index, property) in g.properties.iter().enumerate() {
                            if caseless_eq(&property.name, &name) {
                                return Ok(PapyrusIdentifier::Property(PropertyRef {
                                    object: *r,
                                    group: group as u32,
                                    index: index as u32,
                                }));
                            }
                        }
                    }
                }
                let parent = self.store.object(*r).parent_class.clone();
                if parent != PapyrusType::None {
                    if !matches!(parent, PapyrusType::ResolvedObject(_)) {
                        return Err(self.diags.logical_fatal(UNRESOLVED_PARENT));
                    }
                    return self.try_resolve_member_identifier(&parent, ident);
                }
                Ok(ident)
            }
            _ => Ok(ident),
        }
    }

    /// Like [`Self::try_resolve_member_identifier`], but reports an error
    /// when the name stays unresolved. The unresolved identifier is returned
    /// so the surrounding expression can keep going with a placeholder.
    pub fn resolve_member_identifier(
        &mut self,
        base_type: &PapyrusType,
        ident: PapyrusIdentifier,
        location: &SourceLocation,
    ) -> CompileResult<PapyrusIdentifier> {
        let resolved = self.try_resolve_member_identifier(base_type, ident)?;
        if let PapyrusIdentifier::Unresolved { name } = &resolved {
            self.diags
                .error(location, format!("Unresolved identifier '{name}'!"));
        }
        Ok(resolved)
    }

    /// Resolves a call target.
    ///
    /// With no base type, searches every state of the current object, then
    /// global functions of imported scripts. On an array, classifies the
    /// name into the builtin set (`find`/`rfind` become their struct forms
    /// when the element type is a resolved struct). On a resolved object,
    /// searches its states and then the parent chain. Unresolved names are
    /// fatal.
    pub fn resolve_function_identifier(
        &mut self,
        base_type: &PapyrusType,
        ident: PapyrusIdentifier,
        location: &SourceLocation,
    ) -> CompileResult<PapyrusIdentifier> {
        let name = match &ident {
            PapyrusIdentifier::Unresolved { name } => name.clone(),
            _ => return Ok(ident),
        };
        match base_type {
            PapyrusType::None => {
                if let Some(object) = self.object {
                    if let Some(found) = find_state_function(self.store, object, &name, false) {
                        return Ok(PapyrusIdentifier::Function(found));
                    }
                }
                let imported = self.imported_scripts.clone();
                for id in imported {
                    let object_count = self.store.script(id).objects.len();
                    for index in 0..object_count {
                        let object = ObjectRef {
                            script: id,
                            index: index as u32,
                        };
                        if let Some(found) = find_state_function(self.store, object, &name, true) {
                            return Ok(PapyrusIdentifier::Function(found));
                        }
                    }
                }
            }
            PapyrusType::Array(element) => {
                let Ok(mut kind) = BuiltinArrayFunctionKind::from_str(&name) else {
                    return Err(self.diags.fatal(
                        location,
                        format!("Unknown function '{name}' called on an array expression!"),
                    ));
                };
                let element_is_struct = matches!(**element, PapyrusType::ResolvedStruct(_));
                kind = match kind {
                    BuiltinArrayFunctionKind::Find if element_is_struct => {
                        BuiltinArrayFunctionKind::FindStruct
                    }
                    BuiltinArrayFunctionKind::RFind if element_is_struct => {
                        BuiltinArrayFunctionKind::RFindStruct
                    }
                    other => other,
                };
                return Ok(PapyrusIdentifier::BuiltinArrayFunction {
                    kind,
                    element_type: element.clone(),
                });
            }
            PapyrusType::ResolvedObject(r) => {
                if let Some(found) = find_state_function(self.store, *r, &name, false) {
                    return Ok(PapyrusIdentifier::Function(found));
                }
                let parent = self.store.object(*r).parent_class.clone();
                if parent != PapyrusType::None {
                    if !matches!(parent, PapyrusType::ResolvedObject(_)) {
                        return Err(self.diags.logical_fatal(UNRESOLVED_PARENT));
                    }
                    return self.resolve_function_identifier(&parent, ident, location);
                }
            }
            _ => {}
        }
        Err(self
            .diags
            .fatal(location, format!("Unresolved function name '{name}'!")))
    }

    // === Local variable scopes ===

    pub fn push_local_variable_scope(&mut self) {
        self.identifier_stack.push(AHashMap::new());
    }

    pub fn pop_local_variable_scope(&mut self) {
        self.identifier_stack.pop();
    }

    /// Binds a name in the innermost scope.
    pub(crate) fn bind_identifier(&mut self, name: &str, ident: PapyrusIdentifier) {
        if let Some(scope) = self.identifier_stack.last_mut() {
            scope.insert(CaselessKey::new(name), ident);
        }
    }

    /// Registers a local declaration with the current function and binds it
    /// in the innermost scope.
    pub(crate) fn declare_local(&mut self, name: &str, local_type: &PapyrusType) -> LocalSlot {
        let slot = LocalSlot(self.locals.len() as u32);
        self.locals.push(LocalDecl {
            name: name.to_owned(),
            local_type: local_type.clone(),
        });
        self.bind_identifier(
            name,
            PapyrusIdentifier::LocalVariable {
                slot,
                local_type: local_type.clone(),
            },
        );
        slot
    }

    /// How many declarations (variable lists and function bodies) have been
    /// released from reference scripts into the drop sink so far. The sink
    /// keeps them alive until the context is torn down.
    pub fn released_reference_declarations(&self) -> usize {
        self.drop_sink.statements.len() + self.drop_sink.variables.len()
    }

    pub(crate) fn mark_variable_read(&mut self, variable: VariableRef) {
        self.store.variable_mut(variable).reference_state.is_read = true;
    }

    pub(crate) fn mark_variable_written(&mut self, variable: VariableRef) {
        self.store.variable_mut(variable).reference_state.is_written = true;
    }

    // === The semantic pass over one object ===

    fn object_semantic(&mut self, object: ObjectRef) -> CompileResult<()> {
        self.object = Some(object);

        let imports = self.store.object(object).imports.clone();
        for (location, name) in &imports {
            self.add_import(location, name)?;
        }

        self.structs_semantic(object)?;
        self.variables_semantic(object)?;
        self.property_groups_semantic(object)?;
        self.states_semantic(object)?;

        if !self.resolving_reference_script {
            self.check_inherited_conflicts(object)?;
            self.object_semantic2(object)?;
            self.report_unused_variables(object);
        }

        self.object = None;
        Ok(())
    }

    fn structs_semantic(&mut self, object: ObjectRef) -> CompileResult<()> {
        {
            let o = self.store.object(object);
            ensure_names_unique(
                self.diags,
                "struct",
                o.structs.iter().map(|s| (s.name.as_str(), &s.location)),
            );
        }
        let struct_count = self.store.object(object).structs.len();
        for si in 0..struct_count {
            {
                let strukt = &self.store.object(object).structs[si];
                ensure_names_unique(
                    self.diags,
                    "struct member",
                    strukt.members.iter().map(|m| (m.name.as_str(), &m.location)),
                );
            }
            let member_count = self.store.object(object).structs[si].members.len();
            for mi in 0..member_count {
                let (tp, location) = {
                    let member = &self.store.object(object).structs[si].members[mi];
                    (member.member_type.clone(), member.location.clone())
                };
                let resolved = self.resolve_type(tp, &location)?;
                self.store.object_mut(object).structs[si].members[mi].member_type = resolved;
            }
        }
        Ok(())
    }

    fn variables_semantic(&mut self, object: ObjectRef) -> CompileResult<()> {
        if self.resolving_reference_script {
            let variables = std::mem::take(&mut self.store.object_mut(object).variables);
            self.drop_sink.discard_variables(variables);
            return Ok(());
        }
        {
            let o = self.store.object(object);
            ensure_names_unique(
                self.diags,
                "variable",
                o.variables.iter().map(|v| (v.name.as_str(), &v.location)),
            );
        }
        let variable_count = self.store.object(object).variables.len();
        for vi in 0..variable_count {
            let (tp, location, initialized) = {
                let variable = &self.store.object(object).variables[vi];
                (
                    variable.variable_type.clone(),
                    variable.location.clone(),
                    variable.default_value.is_some(),
                )
            };
            let resolved = self.resolve_type(tp, &location)?;
            let variable = &mut self.store.object_mut(object).variables[vi];
            variable.variable_type = resolved;
            variable.reference_state.is_initialized = initialized;
        }
        Ok(())
    }

    fn property_groups_semantic(&mut self, object: ObjectRef) -> CompileResult<()> {
        {
            let o = self.store.object(object);
            ensure_names_unique(
                self.diags,
                "property group",
                o.property_groups.iter().map(|g| (g.name.as_str(), &g.location)),
            );
        }
        let group_count = self.store.object(object).property_groups.len();
        for gi in 0..group_count {
            let property_count = self.store.object(object).property_groups[gi].properties.len();
            for pi in 0..property_count {
                let (tp, location) = {
                    let property = &self.store.object(object).property_groups[gi].properties[pi];
                    (property.property_type.clone(), property.location.clone())
                };
                let resolved = self.resolve_type(tp, &location)?;
                self.store.object_mut(object).property_groups[gi].properties[pi].property_type =
                    resolved;
                if self.store.object(object).property_groups[gi].properties[pi]
                    .read_function
                    .is_some()
                {
                    self.function_signature_semantic(object, FnSlot::Getter {
                        group: gi as u32,
                        index: pi as u32,
                    })?;
                }
                if self.store.object(object).property_groups[gi].properties[pi]
                    .write_function
                    .is_some()
                {
                    self.function_signature_semantic(object, FnSlot::Setter {
                        group: gi as u32,
                        index: pi as u32,
                    })?;
                }
            }
        }
        Ok(())
    }

    fn states_semantic(&mut self, object: ObjectRef) -> CompileResult<()> {
        {
            let o = self.store.object(object);
            ensure_names_unique(
                self.diags,
                "state",
                o.states.iter().map(|s| (s.name.as_str(), &s.location)),
            );
        }

        // Resolve the auto state by name.
        let auto = self.store.object(object).auto_state_name.clone();
        if let Some(auto_name) = auto {
            let found = self
                .store
                .object(object)
                .states
                .iter()
                .position(|s| caseless_eq(&s.name, &auto_name));
            match found {
                Some(index) => self.store.object_mut(object).auto_state = Some(index as u32),
                None => {
                    if !self.is_external_resolution {
                        let location = self.store.object(object).location.clone();
                        self.diags
                            .warning(&location, &Warning::StateDoesntExist { name: auto_name });
                    }
                }
            }
        }

        let state_count = self.store.object(object).states.len();
        for sti in 0..state_count {
            {
                let state = &self.store.object(object).states[sti];
                ensure_names_unique(
                    self.diags,
                    "function",
                    state.functions.iter().map(|f| (f.name.as_str(), &f.location)),
                );
            }
            let function_count = self.store.object(object).states[sti].functions.len();
            for fi in 0..function_count {
                self.function_signature_semantic(object, FnSlot::State {
                    state: sti as u32,
                    index: fi as u32,
                })?;
            }
        }
        Ok(())
    }

    /// Resolves a function's public signature: return type and parameters.
    /// In reference mode the body is released to the drop sink; only the
    /// signature survives.
    fn function_signature_semantic(&mut self, object: ObjectRef, slot: FnSlot) -> CompileResult<()> {
        let (return_type, location) = {
            let f = slot_mut(self.store, object, slot);
            (f.return_type.clone(), f.location.clone())
        };
        let resolved = self.resolve_type(return_type, &location)?;
        slot_mut(self.store, object, slot).return_type = resolved;

        {
            let f = slot_mut(self.store, object, slot);
            let items: Vec<(String, SourceLocation)> = f
                .parameters
                .iter()
                .map(|p| (p.name.clone(), p.location.clone()))
                .collect();
            ensure_names_unique(
                self.diags,
                "parameter",
                items.iter().map(|(n, l)| (n.as_str(), l)),
            );
        }

        let parameter_count = slot_mut(self.store, object, slot).parameters.len();
        for pi in 0..parameter_count {
            let (tp, location) = {
                let parameter = &slot_mut(self.store, object, slot).parameters[pi];
                (parameter.parameter_type.clone(), parameter.location.clone())
            };
            let resolved = self.resolve_type(tp, &location)?;
            slot_mut(self.store, object, slot).parameters[pi].parameter_type = resolved;
        }

        if self.resolving_reference_script {
            let statements = std::mem::take(&mut slot_mut(self.store, object, slot).statements);
            self.drop_sink.discard_statements(statements);
        }
        Ok(())
    }

    // === semantic2: function bodies ===

    fn object_semantic2(&mut self, object: ObjectRef) -> CompileResult<()> {
        self.push_object_scope(object);

        let group_count = self.store.object(object).property_groups.len();
        for gi in 0..group_count {
            let property_count = self.store.object(object).property_groups[gi].properties.len();
            for pi in 0..property_count {
                let property = &self.store.object(object).property_groups[gi].properties[pi];
                let has_getter = property.read_function.is_some();
                let has_setter = property.write_function.is_some();
                if has_getter {
                    self.function_body_semantic2(object, FnSlot::Getter {
                        group: gi as u32,
                        index: pi as u32,
                    })?;
                }
                if has_setter {
                    self.function_body_semantic2(object, FnSlot::Setter {
                        group: gi as u32,
                        index: pi as u32,
                    })?;
                }
            }
        }

        let state_count = self.store.object(object).states.len();
        for sti in 0..state_count {
            let function_count = self.store.object(object).states[sti].functions.len();
            for fi in 0..function_count {
                self.function_body_semantic2(object, FnSlot::State {
                    state: sti as u32,
                    index: fi as u32,
                })?;
            }
        }

        self.pop_local_variable_scope();
        Ok(())
    }

    /// The bottom identifier scope of an object: its own variables and
    /// properties. Inherited members resolve through the parent-class
    /// fallback instead.
    fn push_object_scope(&mut self, object: ObjectRef) {
        let mut scope: AHashMap<CaselessKey, PapyrusIdentifier> = AHashMap::new();
        let o = self.store.object(object);
        for (index, variable) in o.variables.iter().enumerate() {
            scope.insert(
                CaselessKey::new(&variable.name),
                PapyrusIdentifier::Variable(VariableRef {
                    object,
                    index: index as u32,
                }),
            );
        }
        for (group, g) in o.property_groups.iter().enumerate() {
            for (index, property) in g.properties.iter().enumerate() {
                scope.insert(
                    CaselessKey::new(&property.name),
                    PapyrusIdentifier::Property(PropertyRef {
                        object,
                        group: group as u32,
                        index: index as u32,
                    }),
                );
            }
        }
        self.identifier_stack.push(scope);
    }

    fn function_body_semantic2(&mut self, object: ObjectRef, slot: FnSlot) -> CompileResult<()> {
        self.function = match slot {
            FnSlot::State { state, index } => Some(FunctionRef {
                object,
                state,
                index,
            }),
            _ => None,
        };

        let mut statements = std::mem::take(&mut slot_mut(self.store, object, slot).statements);
        self.locals.clear();
        self.push_local_variable_scope();

        let parameters: Vec<(String, PapyrusType)> = slot_mut(self.store, object, slot)
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.parameter_type.clone()))
            .collect();
        for (name, parameter_type) in parameters {
            let ident = PapyrusIdentifier::Parameter {
                name: name.clone(),
                parameter_type,
            };
            self.bind_identifier(&name, ident);
        }

        let mut result = Ok(());
        for statement in &mut statements {
            result = statement.semantic(self);
            if result.is_err() {
                break;
            }
        }
        self.pop_local_variable_scope();

        let mut locals = std::mem::take(&mut self.locals);
        mangle_local_names(&mut statements, &mut locals);

        let f = slot_mut(self.store, object, slot);
        f.statements = statements;
        f.locals = locals;
        self.function = None;
        result
    }

    // === Inherited identifier conflicts ===

    /// Walks the inheritance chain from the root down, recording each
    /// member name. A local redefinition of an inherited name, or a second
    /// definition within the same object, is an error.
    fn check_inherited_conflicts(&mut self, object: ObjectRef) -> CompileResult<()> {
        let mut chain = Vec::new();
        let mut current = Some(object);
        while let Some(o) = current {
            chain.push(o);
            current = match &self.store.object(o).parent_class {
                PapyrusType::None => None,
                PapyrusType::ResolvedObject(parent) => Some(*parent),
                _ => return Err(self.diags.logical_fatal(UNRESOLVED_PARENT)),
            };
        }

        let mut seen: AHashMap<CaselessKey, (bool, &'static str)> = AHashMap::new();
        for &ancestor in chain.iter().rev() {
            let inherited = ancestor != object;
            let items: Vec<(String, SourceLocation, &'static str)> = {
                let o = self.store.object(ancestor);
                let mut items = Vec::new();
                for g in &o.property_groups {
                    for p in &g.properties {
                        items.push((p.name.clone(), p.location.clone(), "property"));
                    }
                }
                for s in &o.structs {
                    items.push((s.name.clone(), s.location.clone(), "struct"));
                }
                if !inherited {
                    for v in &o.variables {
                        items.push((v.name.clone(), v.location.clone(), "variable"));
                    }
                }
                items
            };
            for (name, location, kind) in items {
                match seen.get(&CaselessKey::new(&name)) {
                    Some(&(from_parent, other_kind)) => {
                        if from_parent {
                            self.diags.error(
                                &location,
                                format!("A parent object already defines a {other_kind} named '{name}'."),
                            );
                        } else {
                            self.diags.error(
                                &location,
                                format!("A {other_kind} named '{name}' was already defined in this object."),
                            );
                        }
                    }
                    None => {
                        seen.insert(CaselessKey::new(&name), (inherited, kind));
                    }
                }
            }
        }
        Ok(())
    }

    // === Unused variable diagnostics ===

    fn report_unused_variables(&mut self, object: ObjectRef) {
        let infos: Vec<(String, SourceLocation, VariableReferenceState)> = self
            .store
            .object(object)
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.location.clone(), v.reference_state))
            .collect();
        for (name, location, state) in infos {
            if !state.is_read {
                if !state.is_initialized {
                    if state.is_written {
                        self.diags
                            .warning(&location, &Warning::ScriptVariableOnlyWritten { name });
                    } else {
                        self.diags
                            .warning(&location, &Warning::UnreferencedScriptVariable { name });
                    }
                } else {
                    self.diags.warning(
                        &location,
                        &Warning::ScriptVariableInitializedNeverUsed { name },
                    );
                }
            } else if !state.is_initialized && !state.is_written {
                self.diags
                    .warning(&location, &Warning::UnwrittenScriptVariable { name });
            }
        }
    }
}

/// Reports an error for every name that appears more than once,
/// case-insensitively.
pub(crate) fn ensure_names_unique<'x>(
    diags: &mut Diagnostics,
    kind: &str,
    items: impl Iterator<Item = (&'x str, &'x SourceLocation)>,
) {
    let mut seen: AHashSet<CaselessKey> = AHashSet::new();
    for (name, location) in items {
        if !seen.insert(CaselessKey::new(name)) {
            diags.error(
                location,
                format!("A {kind} named '{name}' was already defined in this object."),
            );
        }
    }
}

/// Rewrites locals whose name is reused across distinct scopes of one
/// function to `::mangled_<base>_<i>`, keeping the locals table in sync so
/// identifier loads see the rewritten name.
fn mangle_local_names(statements: &mut [Statement], locals: &mut [LocalDecl]) {
    let mut seen: AHashSet<CaselessKey> = AHashSet::new();
    for_each_declare(statements, &mut |declare| {
        let base = declare.name.clone();
        let mut i = 0;
        while seen.contains(&CaselessKey::new(&declare.name)) {
            declare.name = format!("::mangled_{base}_{i}");
            i += 1;
        }
        seen.insert(CaselessKey::new(&declare.name));
        if let Some(slot) = declare.slot {
            locals[slot.index()].name = declare.name.clone();
        }
    });
}

/// Searches an object's states for a function by name; optionally only
/// global functions (for imported-script lookups).
fn find_state_function(
    store: &ScriptStore,
    object: ObjectRef,
    name: &str,
    globals_only: bool,
) -> Option<FunctionRef> {
    let o = store.object(object);
    for (state, st) in o.states.iter().enumerate() {
        for (index, function) in st.functions.iter().enumerate() {
            if (!globals_only || function.is_global) && caseless_eq(&function.name, name) {
                return Some(FunctionRef {
                    object,
                    state: state as u32,
                    index: index as u32,
                });
            }
        }
    }
    None
}
