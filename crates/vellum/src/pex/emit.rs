//! Lowering from the resolved AST into the typed PEX model.
//!
//! Emission walks an object top-down: structs, variables, property groups,
//! states, functions. Engine limits are checked against the counts of what
//! was actually emitted, and each function gets a debug record when the file
//! carries a debug-info section.

use smallvec::smallvec;

use crate::{
    diagnostics::{CompileResult, Diagnostics},
    ident::caseless_eq,
    limits::{EngineLimitCaps, LimitKind},
    location::SourceLocation,
    papyrus::{
        ast::{Function, FunctionType, Literal, Parameter, UserFlags},
        script::{ObjectRef, ScriptId, ScriptStore},
        statements::build_statement_list,
        types::PapyrusType,
    },
    pex::{
        builder::PexFunctionBuilder, op::PexOpcode, PexDebugFunctionInfo, PexDebugFunctionType,
        PexFile, PexFunction, PexFunctionParameter, PexObject, PexProperty, PexState, PexStringId,
        PexStruct, PexStructMember, PexValue, PexVariable,
    },
};

/// Shared context for one emission walk.
pub struct Emitter<'a> {
    pub store: &'a ScriptStore,
    pub diags: &'a mut Diagnostics,
    pub limits: &'a EngineLimitCaps,
}

/// Where an emitted function lives, for naming and debug records.
enum FunctionHome<'n> {
    State {
        object_name: PexStringId,
        state_name: &'n str,
    },
    /// Property accessor; carries no state name and takes its identity from
    /// the property.
    Accessor {
        object_name: PexStringId,
        property_name: PexStringId,
    },
}

/// The function names whose bodies the compiler always synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReservedFunction {
    GetState,
    GotoState,
}

fn reserved_function(name: &str) -> Option<ReservedFunction> {
    if caseless_eq(name, "GetState") {
        Some(ReservedFunction::GetState)
    } else if caseless_eq(name, "GotoState") {
        Some(ReservedFunction::GotoState)
    } else {
        None
    }
}

/// Emits a fully resolved script into a fresh [`PexFile`].
pub fn build_script_pex(
    store: &ScriptStore,
    diags: &mut Diagnostics,
    limits: &EngineLimitCaps,
    script: ScriptId,
    emit_debug_info: bool,
) -> CompileResult<PexFile> {
    let mut file = PexFile::new(store.script(script).source_file_name.clone(), emit_debug_info);
    let mut em = Emitter { store, diags, limits };
    let object_count = store.script(script).objects.len();
    for index in 0..object_count {
        let object = ObjectRef {
            script,
            index: index as u32,
        };
        build_object(&mut em, object, &mut file)?;
    }
    let location = store.script(script).objects[0].location.clone();
    em.limits.check_limit(
        em.diags,
        &location,
        LimitKind::PexFileUserFlagCount,
        file.user_flags.len(),
        None,
    );
    Ok(file)
}

fn encode_user_flags(file: &mut PexFile, flags: UserFlags) -> u32 {
    let mut mask = 0;
    for name in flags.flag_names() {
        let bit = file.register_user_flag(name);
        mask |= 1 << bit;
    }
    mask
}

fn default_value(file: &mut PexFile, literal: Option<&Literal>) -> PexValue {
    match literal {
        None => PexValue::None,
        Some(Literal::None) => PexValue::None,
        Some(Literal::Int(v)) => PexValue::Integer(*v),
        Some(Literal::Float(v)) => PexValue::Float(*v),
        Some(Literal::Bool(v)) => PexValue::Bool(*v),
        Some(Literal::String(v)) => PexValue::String(file.get_string(v)),
    }
}

fn build_object(em: &mut Emitter<'_>, object: ObjectRef, file: &mut PexFile) -> CompileResult<()> {
    let store = em.store;
    let o = store.object(object);

    let parent_name = match &o.parent_class {
        PapyrusType::None => String::new(),
        PapyrusType::ResolvedObject(parent) => store.object(*parent).name.clone(),
        _ => {
            return Err(em
                .diags
                .logical_fatal("Something is wrong here, this should already have been resolved!"));
        }
    };

    let name = file.get_string(&o.name);
    let parent_class_name = file.get_string(&parent_name);
    let documentation_string = file.get_string(&o.documentation);
    let auto_state_name = file.get_string(o.auto_state().map_or("", |s| s.name.as_str()));
    let user_flags = encode_user_flags(file, o.user_flags);
    let mut pex_object = PexObject {
        name,
        parent_class_name,
        documentation_string,
        is_const: o.is_const(),
        auto_state_name,
        user_flags,
        structs: Vec::new(),
        variables: Vec::new(),
        properties: Vec::new(),
        states: Vec::new(),
    };

    for strukt in &o.structs {
        let struct_name = file.get_string(&strukt.name);
        let mut members = Vec::with_capacity(strukt.members.len());
        for member in &strukt.members {
            let type_string = member.member_type.type_string(store);
            let member_name = file.get_string(&member.name);
            let type_name = file.get_string(&type_string);
            let member_flags = encode_user_flags(file, member.user_flags);
            let member_default = default_value(file, member.default_value.as_ref());
            let member_docs = file.get_string(&member.documentation);
            members.push(PexStructMember {
                name: member_name,
                type_name,
                user_flags: member_flags,
                default_value: member_default,
                is_const: member.user_flags.is_const,
                documentation_string: member_docs,
            });
        }
        pex_object.structs.push(PexStruct {
            name: struct_name,
            members,
        });
    }

    for variable in &o.variables {
        let type_string = variable.variable_type.type_string(store);
        let variable_name = file.get_string(&variable.name);
        let type_name = file.get_string(&type_string);
        let variable_flags = encode_user_flags(file, variable.user_flags);
        let variable_default = default_value(file, variable.default_value.as_ref());
        pex_object.variables.push(PexVariable {
            name: variable_name,
            type_name,
            user_flags: variable_flags,
            default_value: variable_default,
            is_const: variable.user_flags.is_const,
        });
    }

    for group in &o.property_groups {
        for property in &group.properties {
            let type_string = property.property_type.type_string(store);
            let property_name = file.get_string(&property.name);
            let type_name = file.get_string(&type_string);
            let property_docs = file.get_string(&property.documentation);
            let property_flags = encode_user_flags(file, property.user_flags);
            let mut pex_property = PexProperty {
                name: property_name,
                type_name,
                documentation_string: property_docs,
                user_flags: property_flags,
                is_readable: false,
                is_writable: false,
                is_auto: property.is_auto,
                auto_var_name: None,
                read_function: None,
                write_function: None,
            };
            if property.is_auto {
                // Auto properties read and write through a hidden backing
                // variable.
                let backing = format!("::{}_var", property.name);
                let backing_name = file.get_string(&backing);
                let backing_default = default_value(file, property.default_value.as_ref());
                pex_object.variables.push(PexVariable {
                    name: backing_name,
                    type_name,
                    user_flags: 0,
                    default_value: backing_default,
                    is_const: property.user_flags.is_const,
                });
                pex_property.auto_var_name = Some(backing_name);
                pex_property.is_readable = true;
                pex_property.is_writable = true;
            } else {
                if let Some(getter) = &property.read_function {
                    pex_property.is_readable = true;
                    let home = FunctionHome::Accessor {
                        object_name: name,
                        property_name,
                    };
                    pex_property.read_function = Some(build_function(em, getter, file, home)?);
                }
                if let Some(setter) = &property.write_function {
                    pex_property.is_writable = true;
                    let home = FunctionHome::Accessor {
                        object_name: name,
                        property_name,
                    };
                    pex_property.write_function = Some(build_function(em, setter, file, home)?);
                }
            }
            pex_object.properties.push(pex_property);
        }
    }

    let mut named_state_count = 0;
    for state in &o.states {
        if !state.is_root() {
            named_state_count += 1;
        }
        let state_name = file.get_string(&state.name);
        let mut pex_state = PexState {
            name: state_name,
            functions: Vec::new(),
        };
        for function in &state.functions {
            let home = FunctionHome::State {
                object_name: name,
                state_name: &state.name,
            };
            pex_state.functions.push(build_function(em, function, file, home)?);
        }
        if state.is_root() {
            // The engine calls these on every object; synthesize any the
            // source did not declare.
            if !state.functions.iter().any(|f| reserved_function(&f.name) == Some(ReservedFunction::GetState)) {
                let synth = synthesized_get_state(o.location.clone());
                let home = FunctionHome::State {
                    object_name: name,
                    state_name: &state.name,
                };
                pex_state.functions.push(build_function(em, &synth, file, home)?);
            }
            if !state.functions.iter().any(|f| reserved_function(&f.name) == Some(ReservedFunction::GotoState)) {
                let synth = synthesized_goto_state(o.location.clone());
                let home = FunctionHome::State {
                    object_name: name,
                    state_name: &state.name,
                };
                pex_state.functions.push(build_function(em, &synth, file, home)?);
            }
        }
        let function_count = pex_state.functions.len();
        if state.is_root() {
            em.limits.check_limit(
                em.diags,
                &state.location,
                LimitKind::PexObjectEmptyStateFunctionCount,
                function_count,
                None,
            );
        } else {
            em.limits.check_limit(
                em.diags,
                &state.location,
                LimitKind::PexStateFunctionCount,
                function_count,
                Some(&state.name),
            );
        }
        pex_object.states.push(pex_state);
    }

    let static_function_count = o
        .states
        .iter()
        .flat_map(|s| &s.functions)
        .filter(|f| f.is_global)
        .count();
    let initial_value_count = pex_object
        .variables
        .iter()
        .filter(|v| v.default_value.is_some())
        .count();

    em.limits.check_limit(
        em.diags,
        &o.location,
        LimitKind::PexObjectInitialValueCount,
        initial_value_count,
        None,
    );
    em.limits.check_limit(
        em.diags,
        &o.location,
        LimitKind::PexObjectNamedStateCount,
        named_state_count,
        None,
    );
    em.limits.check_limit(
        em.diags,
        &o.location,
        LimitKind::PexObjectPropertyCount,
        pex_object.properties.len(),
        None,
    );
    em.limits.check_limit(
        em.diags,
        &o.location,
        LimitKind::PexObjectStaticFunctionCount,
        static_function_count,
        None,
    );
    em.limits.check_limit(
        em.diags,
        &o.location,
        LimitKind::PexObjectVariableCount,
        pex_object.variables.len(),
        None,
    );

    file.objects.push(pex_object);
    Ok(())
}

fn build_function(
    em: &mut Emitter<'_>,
    func: &Function,
    file: &mut PexFile,
    home: FunctionHome<'_>,
) -> CompileResult<PexFunction> {
    let store = em.store;

    let function_type = match func.function_type {
        FunctionType::Function | FunctionType::Event => PexDebugFunctionType::Normal,
        FunctionType::Getter => PexDebugFunctionType::Getter,
        FunctionType::Setter => PexDebugFunctionType::Setter,
    };
    let (object_name, state_name, function_name, shell_name) = match home {
        FunctionHome::State {
            object_name,
            state_name,
        } => {
            let state_name = file.get_string(state_name);
            let function_name = file.get_string(&func.name);
            (object_name, state_name, function_name, Some(function_name))
        }
        FunctionHome::Accessor {
            object_name,
            property_name,
        } => {
            let empty = file.get_string("");
            (object_name, empty, property_name, None)
        }
    };
    let mut debug = PexDebugFunctionInfo {
        object_name,
        state_name,
        function_name,
        function_type,
        instruction_line_map: Vec::new(),
    };

    let reserved = reserved_function(&func.name);
    let return_type_name = match reserved {
        Some(ReservedFunction::GotoState) => file.get_string(""),
        _ => {
            let type_string = func.return_type.type_string(store);
            file.get_string(&type_string)
        }
    };

    let mut pex_func = PexFunction {
        name: shell_name,
        documentation_string: Some(file.get_string(&func.documentation)),
        return_type_name,
        user_flags: encode_user_flags(file, func.user_flags),
        is_global: func.is_global,
        is_native: func.is_native,
        parameters: Vec::with_capacity(func.parameters.len()),
        locals: Vec::new(),
        instructions: Vec::new(),
    };
    for parameter in &func.parameters {
        let type_string = parameter.parameter_type.type_string(store);
        let parameter_name = file.get_string(&parameter.name);
        let type_name = file.get_string(&type_string);
        pex_func.parameters.push(PexFunctionParameter {
            name: parameter_name,
            type_name,
        });
    }
    em.limits.check_limit(
        em.diags,
        &func.location,
        LimitKind::PexFunctionParameterCount,
        func.parameters.len(),
        Some(&func.name),
    );

    if !func.is_native {
        let mut bldr = PexFunctionBuilder::new(&func.location, file);
        match reserved {
            Some(ReservedFunction::GetState) => emit_get_state_body(&mut bldr),
            Some(ReservedFunction::GotoState) => emit_goto_state_body(&mut bldr, &func.location),
            None => build_statement_list(&func.statements, em, func, &mut bldr)?,
        }
        bldr.finish(&mut pex_func, &mut debug);
    }

    if let Some(debug_info) = &mut file.debug_info {
        debug_info.functions.push(debug);
    }
    Ok(pex_func)
}

/// `GetState` returns the engine's hidden `::State` string.
fn emit_get_state_body(bldr: &mut PexFunctionBuilder<'_>) {
    let state_var = bldr.get_string("::State");
    bldr.emit(PexOpcode::Ret {
        value: PexValue::Identifier(state_var),
    });
}

/// `GotoState` saves the old state, fires `OnEndState`, switches, and fires
/// `OnBeginState`. The leading integer `1` is a flag argument the engine
/// expects on both events.
fn emit_goto_state_body(bldr: &mut PexFunctionBuilder<'_>, location: &SourceLocation) {
    let none_local = bldr.get_none_local(location);
    let sold_state = bldr.allocate_local("soldState", "String");
    let state_var_name = bldr.get_string("::State");
    let state_var = PexValue::Identifier(state_var_name);
    let self_name = bldr.get_string("self");
    let as_new_state_name = bldr.get_string("asNewState");
    let as_new_state = PexValue::Identifier(as_new_state_name);
    let on_end_state = bldr.get_string("OnEndState");
    let on_begin_state = bldr.get_string("OnBeginState");

    bldr.emit(PexOpcode::Assign {
        dest: sold_state.clone(),
        src: state_var.clone(),
    });
    bldr.emit(PexOpcode::CallMethod {
        function: on_end_state,
        base: PexValue::Identifier(self_name),
        dest: none_local.clone(),
        args: smallvec![PexValue::Integer(1), as_new_state.clone()],
    });
    bldr.emit(PexOpcode::Assign {
        dest: state_var,
        src: as_new_state,
    });
    bldr.emit(PexOpcode::CallMethod {
        function: on_begin_state,
        base: PexValue::Identifier(self_name),
        dest: none_local,
        args: smallvec![PexValue::Integer(1), sold_state],
    });
}

fn synthesized_get_state(location: SourceLocation) -> Function {
    Function::new(location, "GetState", FunctionType::Function, PapyrusType::String)
}

fn synthesized_goto_state(location: SourceLocation) -> Function {
    let mut func = Function::new(
        location.clone(),
        "GotoState",
        FunctionType::Function,
        PapyrusType::None,
    );
    func.parameters.push(Parameter {
        name: "asNewState".to_owned(),
        location,
        parameter_type: PapyrusType::String,
        default_value: None,
    });
    func
}
