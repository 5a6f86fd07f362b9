//! Import-graph loading, type resolution, and identifier resolution across
//! scripts.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use vellum::{
    CollectDiagnostics, CompilerConfig, Diagnostics, Expression, FunctionCallExpression,
    MemberAccessExpression, PapyrusIdentifier, PapyrusType, PexOpcode, ResolutionContext,
    ScriptStore, Statement, StructMember,
};

fn import_dir(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(format!("{name}.psc")), "").unwrap();
    }
    dir
}

fn with_import(mut obj: vellum::Object, name: &str) -> vellum::Object {
    obj.imports.push((loc(1, 1), name.to_owned()));
    obj
}

// === Script loading ===

#[test]
fn load_script_is_idempotent() {
    let dir = import_dir(&["Util"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    let mut parser = FakeParser::new();
    parser.provide("Util", || script(vec![object("Util", None)]));

    let mut diags = Diagnostics::with_writer(Box::new(CollectDiagnostics::new()));
    let mut store = ScriptStore::new();
    let mut ctx = ResolutionContext::new(&config, &mut diags, &mut parser, &mut store);
    let first = ctx.load_script("Util").unwrap().unwrap();
    let second = ctx.load_script("util").unwrap().unwrap();
    assert_eq!(first, second);
}

#[test]
fn import_cycles_terminate() {
    let dir = import_dir(&["Alpha", "Beta"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    let mut parser = FakeParser::new();
    parser.provide("Alpha", || script(vec![with_import(object("Alpha", None), "Beta")]));
    parser.provide("Beta", || script(vec![with_import(object("Beta", None), "Alpha")]));

    // The main script pulls in Alpha, which imports Beta, which imports
    // Alpha again; the registry entry made before Alpha's semantic pass
    // breaks the cycle.
    let main = script(vec![with_import(object("Main", None), "Alpha")]);
    let outcome = compile(&config, &mut parser, main);
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.errors, 0);
}

#[test]
fn missing_import_is_fatal() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let main = script(vec![with_import(object("Main", None), "Nowhere")]);
    let outcome = compile(&config, &mut parser, main);
    let fatal = outcome.result.unwrap_err();
    assert_eq!(fatal.message, "Failed to find imported script 'Nowhere.psc'!");
}

#[test]
fn duplicate_import_warns_and_succeeds() {
    let dir = import_dir(&["Util"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    let mut parser = FakeParser::new();
    parser.provide("Util", || script(vec![object("Util", None)]));

    let mut obj = with_import(object("Main", None), "Util");
    obj = with_import(obj, "util");
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.warnings, 1);
    assert!(outcome.has_line("Test.psc(1,1): Warning W4002: Duplicate import of 'util'."));
}

// === Type resolution ===

#[test]
fn unresolvable_type_is_fatal() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Main", None);
    obj.variables.push(variable(
        "target",
        PapyrusType::Unresolved("Missing".to_owned()),
        None,
    ));
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let fatal = outcome.result.unwrap_err();
    assert_eq!(fatal.message, "Unable to resolve type 'Missing'!");
}

#[test]
fn self_reference_resolves_to_own_object() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.disabled_warnings.insert(4004);
    let mut obj = object("Main", None);
    obj.variables.push(variable(
        "other",
        PapyrusType::Unresolved("Main".to_owned()),
        None,
    ));
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    let pex_variable = &file.objects[0].variables[0];
    assert_eq!(file.string(pex_variable.type_name), "main");
}

#[test]
fn type_loads_script_of_same_name_on_demand() {
    let dir = import_dir(&["Armor"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    config.disabled_warnings.insert(4004);
    let mut parser = FakeParser::new();
    parser.provide("Armor", || script(vec![object("Armor", None)]));

    let mut obj = object("Main", None);
    obj.variables.push(variable(
        "best",
        PapyrusType::Unresolved("armor".to_owned()),
        None,
    ));
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    assert_eq!(file.string(file.objects[0].variables[0].type_name), "armor");
}

#[test]
fn decompiled_struct_ref_resolves_across_scripts() {
    let dir = import_dir(&["Bar"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    config.enable_decompiled_struct_name_refs = true;
    config.disabled_warnings.insert(4004);
    let mut parser = FakeParser::new();
    parser.provide("Bar", || {
        let mut obj = object("Bar", None);
        obj.structs.push(vellum::Struct {
            name: "Point".to_owned(),
            location: loc(2, 1),
            members: vec![
                StructMember {
                    name: "X".to_owned(),
                    location: loc(3, 1),
                    member_type: PapyrusType::Int,
                    user_flags: Default::default(),
                    documentation: String::new(),
                    default_value: None,
                },
            ],
        });
        script(vec![obj])
    });

    let mut obj = object("Main", None);
    obj.variables.push(variable(
        "origin",
        PapyrusType::Unresolved("Bar#point".to_owned()),
        None,
    ));
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    assert_eq!(file.string(file.objects[0].variables[0].type_name), "bar#point");
}

#[test]
fn decompiled_struct_ref_requires_config_flag() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Main", None);
    obj.variables.push(variable(
        "origin",
        PapyrusType::Unresolved("Bar#Point".to_owned()),
        None,
    ));
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let fatal = outcome.result.unwrap_err();
    assert_eq!(fatal.message, "Unable to resolve type 'Bar#Point'!");
}

// === Identifier and function resolution ===

#[test]
fn parent_property_resolves_through_inheritance() {
    let dir = import_dir(&["Actor"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    let mut parser = FakeParser::new();
    parser.provide("Actor", || {
        let mut obj = object("Actor", None);
        let prop = vellum::Property {
            name: "Health".to_owned(),
            location: loc(2, 1),
            property_type: PapyrusType::Int,
            user_flags: Default::default(),
            documentation: String::new(),
            is_auto: true,
            default_value: None,
            read_function: None,
            write_function: None,
        };
        obj.root_property_group_mut().properties.push(prop);
        script(vec![obj])
    });

    let mut obj = object("Main", Some("Actor"));
    let mut func = function("OnInit", PapyrusType::None);
    func.statements
        .push(declare("h", PapyrusType::Int, Some(ident_expr("health"))));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert_eq!(outcome.errors, 0);
    let file = outcome.file();
    let on_init = find_function(file, "", "OnInit");
    let prop_get = on_init
        .instructions
        .iter()
        .find_map(|op| match op {
            PexOpcode::PropGet { property, object, .. } => {
                Some((file.string(*property).to_owned(), value_str(file, object)))
            }
            _ => None,
        })
        .expect("parent property read lowers to propget");
    assert_eq!(prop_get, ("Health".to_owned(), "self".to_owned()));
}

#[test]
fn unknown_array_function_is_fatal() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Main", None);
    let mut func = function("OnInit", PapyrusType::None);
    func.statements.push(declare(
        "values",
        PapyrusType::Array(Box::new(PapyrusType::Int)),
        None,
    ));
    func.statements.push(Statement::Expression(vellum::ExpressionStatement {
        location: loc(7, 1),
        expression: Expression::FunctionCall(FunctionCallExpression {
            location: loc(7, 1),
            base: Some(Box::new(ident_expr("values"))),
            function: PapyrusIdentifier::unresolved("sort"),
            arguments: vec![],
        }),
    }));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let fatal = outcome.result.unwrap_err();
    assert_eq!(fatal.message, "Unknown function 'sort' called on an array expression!");
}

#[test]
fn array_find_classifies_by_element_type() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.disabled_warnings.insert(4004);

    // Plain element type: find lowers to arrayfindelement.
    let mut obj = object("Main", None);
    let mut func = function("OnInit", PapyrusType::None);
    func.statements.push(declare(
        "values",
        PapyrusType::Array(Box::new(PapyrusType::Int)),
        None,
    ));
    func.statements.push(Statement::Expression(vellum::ExpressionStatement {
        location: loc(7, 1),
        expression: Expression::FunctionCall(FunctionCallExpression {
            location: loc(7, 1),
            base: Some(Box::new(ident_expr("values"))),
            function: PapyrusIdentifier::unresolved("Find"),
            arguments: vec![int_lit(7)],
        }),
    }));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert_eq!(outcome.errors, 0);
    let file = outcome.file();
    let on_init = find_function(file, "", "OnInit");
    let find = on_init
        .instructions
        .iter()
        .find(|op| matches!(op, PexOpcode::ArrayFindElement { .. }))
        .expect("find lowers to arrayfindelement");
    match find {
        PexOpcode::ArrayFindElement { value, start_index, .. } => {
            assert_eq!(*value, vellum::PexValue::Integer(7));
            assert_eq!(*start_index, vellum::PexValue::Integer(0));
        }
        _ => unreachable!(),
    }
}

#[test]
fn struct_array_find_uses_struct_opcode() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.disabled_warnings.insert(4004);

    let mut obj = object("Main", None);
    obj.structs.push(vellum::Struct {
        name: "Entry".to_owned(),
        location: loc(2, 1),
        members: vec![StructMember {
            name: "Key".to_owned(),
            location: loc(3, 1),
            member_type: PapyrusType::String,
            user_flags: Default::default(),
            documentation: String::new(),
            default_value: None,
        }],
    });
    let mut func = function("OnInit", PapyrusType::None);
    func.statements.push(declare(
        "entries",
        PapyrusType::Array(Box::new(PapyrusType::Unresolved("Entry".to_owned()))),
        None,
    ));
    func.statements.push(Statement::Expression(vellum::ExpressionStatement {
        location: loc(7, 1),
        expression: Expression::FunctionCall(FunctionCallExpression {
            location: loc(7, 1),
            base: Some(Box::new(ident_expr("entries"))),
            function: PapyrusIdentifier::unresolved("find"),
            arguments: vec![],
        }),
    }));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert_eq!(outcome.errors, 0);
    let file = outcome.file();
    let on_init = find_function(file, "", "OnInit");
    assert!(on_init
        .instructions
        .iter()
        .any(|op| matches!(op, PexOpcode::ArrayFindStruct { .. })));
}

#[test]
fn struct_member_access_lowers_to_structget() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.disabled_warnings.insert(4004);

    let mut obj = object("Main", None);
    obj.structs.push(vellum::Struct {
        name: "Entry".to_owned(),
        location: loc(2, 1),
        members: vec![StructMember {
            name: "Key".to_owned(),
            location: loc(3, 1),
            member_type: PapyrusType::String,
            user_flags: Default::default(),
            documentation: String::new(),
            default_value: None,
        }],
    });
    let mut func = function("OnInit", PapyrusType::None);
    func.statements.push(declare(
        "entry",
        PapyrusType::Unresolved("Entry".to_owned()),
        None,
    ));
    func.statements.push(declare(
        "k",
        PapyrusType::String,
        Some(Expression::MemberAccess(MemberAccessExpression {
            location: loc(7, 5),
            base: Box::new(ident_expr("entry")),
            member: PapyrusIdentifier::unresolved("key"),
        })),
    ));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert_eq!(outcome.errors, 0);
    let file = outcome.file();
    let on_init = find_function(file, "", "OnInit");
    let member = on_init
        .instructions
        .iter()
        .find_map(|op| match op {
            PexOpcode::StructGet { member, .. } => Some(file.string(*member).to_owned()),
            _ => None,
        })
        .expect("member access lowers to structget");
    assert_eq!(member, "Key");
}

#[test]
fn reference_script_bodies_are_released() {
    let dir = import_dir(&["Helper"]);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());
    let mut parser = FakeParser::new();
    parser.provide("Helper", || {
        let mut obj = object("Helper", None);
        obj.variables.push(variable("counter", PapyrusType::Int, None));
        let mut func = function("Bump", PapyrusType::None);
        func.statements.push(assign(ident_expr("counter"), int_lit(1)));
        obj.root_state_mut().functions.push(func);
        script(vec![obj])
    });

    let mut diags = Diagnostics::with_writer(Box::new(CollectDiagnostics::new()));
    let mut store = ScriptStore::new();
    let mut ctx = ResolutionContext::new(&config, &mut diags, &mut parser, &mut store);
    let id = ctx.load_script("Helper").unwrap().unwrap();
    assert!(ctx.released_reference_declarations() > 0);

    // Signatures survive; bodies and variables do not.
    let helper = store.script(id);
    assert!(helper.objects[0].variables.is_empty());
    let bump = &helper.objects[0].states[0].functions[0];
    assert_eq!(bump.name, "Bump");
    assert!(bump.statements.is_empty());
}
