//! End-to-end emission tests: synthesized state accessors, unary lowering,
//! engine limits, debug info, and double-run determinism.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use vellum::{
    CompilerConfig, EngineLimitCaps, Expression, Literal, PapyrusType, PexOpcode, PexValue,
    Property, UnaryOpExpression, UnaryOperator,
};

fn empty_parent_dir(parser: &mut FakeParser) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Bar.psc"), "").unwrap();
    parser.provide("Bar", || script(vec![object("Bar", None)]));
    dir
}

// === GetState / GotoState synthesis ===

#[test]
fn goto_state_body_is_synthesized() {
    let mut parser = FakeParser::new();
    let dir = empty_parent_dir(&mut parser);
    let mut config = CompilerConfig::default();
    config.import_directories.push(dir.path().to_path_buf());

    let main = script(vec![object("Foo", Some("Bar"))]);
    let outcome = compile(&config, &mut parser, main);
    let file = outcome.file();

    let goto_state = find_function(file, "", "GotoState");
    assert_eq!(file.string(goto_state.return_type_name), "");
    assert_eq!(goto_state.parameters.len(), 1);
    assert_eq!(file.string(goto_state.parameters[0].name), "asNewState");
    assert_eq!(file.string(goto_state.parameters[0].type_name), "String");

    assert_eq!(goto_state.instructions.len(), 4);
    match &goto_state.instructions[0] {
        PexOpcode::Assign { dest, src } => {
            assert_eq!(value_str(file, dest), "soldState");
            assert_eq!(value_str(file, src), "::State");
        }
        other => panic!("expected assign, got {other:?}"),
    }
    match &goto_state.instructions[1] {
        PexOpcode::CallMethod { function, base, dest, args } => {
            assert_eq!(file.string(*function), "OnEndState");
            assert_eq!(value_str(file, base), "self");
            assert_eq!(value_str(file, dest), "::nonevar");
            assert_eq!(args.len(), 2);
            assert_eq!(args[0], PexValue::Integer(1));
            assert_eq!(value_str(file, &args[1]), "asNewState");
        }
        other => panic!("expected callmethod, got {other:?}"),
    }
    match &goto_state.instructions[2] {
        PexOpcode::Assign { dest, src } => {
            assert_eq!(value_str(file, dest), "::State");
            assert_eq!(value_str(file, src), "asNewState");
        }
        other => panic!("expected assign, got {other:?}"),
    }
    match &goto_state.instructions[3] {
        PexOpcode::CallMethod { function, base, dest, args } => {
            assert_eq!(file.string(*function), "OnBeginState");
            assert_eq!(value_str(file, base), "self");
            assert_eq!(value_str(file, dest), "::nonevar");
            assert_eq!(args[0], PexValue::Integer(1));
            assert_eq!(value_str(file, &args[1]), "soldState");
        }
        other => panic!("expected callmethod, got {other:?}"),
    }
}

#[test]
fn get_state_body_is_synthesized() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let outcome = compile(&config, &mut parser, script(vec![object("Foo", None)]));
    let file = outcome.file();

    let get_state = find_function(file, "", "GetState");
    assert_eq!(file.string(get_state.return_type_name), "String");
    assert!(get_state.parameters.is_empty());
    assert_eq!(get_state.instructions.len(), 1);
    match &get_state.instructions[0] {
        PexOpcode::Ret { value } => assert_eq!(value_str(file, value), "::State"),
        other => panic!("expected ret, got {other:?}"),
    }
}

#[test]
fn user_declared_goto_state_body_is_replaced() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();

    let mut obj = object("Foo", None);
    let mut goto = function("GotoState", PapyrusType::None);
    goto.parameters.push(parameter("asNewState", PapyrusType::String));
    // A user body that would emit a ret; the synthesized body wins.
    goto.statements.push(vellum::Statement::Return(vellum::ReturnStatement {
        location: loc(6, 1),
        value: None,
    }));
    obj.root_state_mut().functions.push(goto);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    let goto_state = find_function(file, "", "GotoState");
    assert_eq!(goto_state.instructions.len(), 4);
    assert!(matches!(goto_state.instructions[0], PexOpcode::Assign { .. }));
}

// === Unary operator lowering ===

fn negate(inner: Expression) -> Expression {
    Expression::Unary(UnaryOpExpression {
        location: loc(6, 9),
        operation: UnaryOperator::Negate,
        inner: Box::new(inner),
    })
}

#[test]
fn negate_float_emits_fneg() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Foo", None);
    let mut func = function("OnInit", PapyrusType::None);
    func.statements
        .push(declare("x", PapyrusType::Int, Some(negate(float_lit(1.5)))));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    let on_init = find_function(file, "", "OnInit");
    assert!(on_init
        .instructions
        .iter()
        .any(|op| matches!(op, PexOpcode::FNeg { .. })));
}

#[test]
fn negate_int_emits_ineg() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Foo", None);
    let mut func = function("OnInit", PapyrusType::None);
    func.statements
        .push(declare("y", PapyrusType::Float, Some(negate(int_lit(1)))));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    let on_init = find_function(file, "", "OnInit");
    assert!(on_init
        .instructions
        .iter()
        .any(|op| matches!(op, PexOpcode::INeg { .. })));
}

#[test]
fn negate_bool_is_fatal() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Foo", None);
    let mut func = function("OnInit", PapyrusType::None);
    func.statements
        .push(declare("b", PapyrusType::Bool, Some(negate(bool_lit(true)))));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let fatal = outcome.result.unwrap_err();
    assert_eq!(fatal.message, "You can only negate integers and floats!");
    assert_eq!(fatal.location, Some(loc(6, 9)));
}

// === Engine limits ===

fn auto_property(name: &str) -> Property {
    Property {
        name: name.to_owned(),
        location: loc(3, 1),
        property_type: PapyrusType::Int,
        user_flags: Default::default(),
        documentation: String::new(),
        is_auto: true,
        default_value: None,
        read_function: None,
        write_function: None,
    }
}

#[test]
fn property_count_limit_warns_once() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.engine_limits = EngineLimitCaps {
        pex_object_property_count: 3,
        ..EngineLimitCaps::unlimited()
    };

    let mut obj = object("Foo", None);
    for name in ["A", "B", "C", "D"] {
        obj.root_property_group_mut().properties.push(auto_property(name));
    }
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert_eq!(outcome.warnings, 1);
    assert!(outcome.has_line(
        "Test.psc(1,1): Warning W2007: There are 4 properties in this object, \
         but the engine limit is 3 properties."
    ));
}

#[test]
fn zero_cap_disables_property_count_warning() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.engine_limits = EngineLimitCaps::unlimited();

    let mut obj = object("Foo", None);
    for name in ["A", "B", "C", "D"] {
        obj.root_property_group_mut().properties.push(auto_property(name));
    }
    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert_eq!(outcome.warnings, 0);
}

#[test]
fn parameter_count_limit_names_the_function() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.engine_limits = EngineLimitCaps {
        pex_function_parameter_count: 1,
        ..EngineLimitCaps::unlimited()
    };

    let mut obj = object("Foo", None);
    let mut func = function("Configure", PapyrusType::None);
    func.parameters.push(parameter("a", PapyrusType::Int));
    func.parameters.push(parameter("b", PapyrusType::Int));
    obj.root_state_mut().functions.push(func);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    assert!(outcome.has_line(
        "Test.psc(5,1): Warning W2003: There are 2 parameters declared for the 'Configure' \
         function, but the engine limit is 1 parameters."
    ));
}

// === Auto properties and variables ===

#[test]
fn auto_property_gets_backing_variable() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let mut obj = object("Foo", None);
    let mut prop = auto_property("Health");
    prop.default_value = Some(Literal::Int(100));
    obj.root_property_group_mut().properties.push(prop);

    let outcome = compile(&config, &mut parser, script(vec![obj]));
    let file = outcome.file();
    let pex_object = &file.objects[0];
    assert_eq!(pex_object.properties.len(), 1);
    let property = &pex_object.properties[0];
    assert!(property.is_auto && property.is_readable && property.is_writable);
    let backing = property.auto_var_name.expect("auto property has a backing variable");
    assert_eq!(file.string(backing), "::Health_var");
    let variable = pex_object
        .variables
        .iter()
        .find(|v| v.name == backing)
        .expect("backing variable emitted");
    assert_eq!(variable.default_value, PexValue::Integer(100));
}

// === Debug info ===

#[test]
fn debug_records_cover_synthesized_functions() {
    let mut parser = FakeParser::new();
    let config = CompilerConfig::default();
    let outcome = compile(&config, &mut parser, script(vec![object("Foo", None)]));
    let file = outcome.file();
    let debug = file.debug_info.as_ref().expect("debug info emitted by default");
    let names: Vec<&str> = debug
        .functions
        .iter()
        .map(|f| file.string(f.function_name))
        .collect();
    assert!(names.contains(&"GetState"));
    assert!(names.contains(&"GotoState"));
}

#[test]
fn debug_info_can_be_disabled() {
    let mut parser = FakeParser::new();
    let mut config = CompilerConfig::default();
    config.emit_debug_info = false;
    let outcome = compile(&config, &mut parser, script(vec![object("Foo", None)]));
    assert!(outcome.file().debug_info.is_none());
}

// === Determinism ===

#[test]
fn identical_runs_produce_identical_files() {
    fn main_script() -> vellum::Script {
        let mut obj = object("Foo", None);
        obj.root_property_group_mut().properties.push(auto_property("Health"));
        let mut func = function("OnInit", PapyrusType::None);
        func.statements
            .push(declare("x", PapyrusType::Int, Some(int_lit(3))));
        func.statements.push(assign(ident_expr("x"), int_lit(4)));
        obj.root_state_mut().functions.push(func);
        script(vec![obj])
    }

    let config = CompilerConfig::default();
    let first = compile(&config, &mut FakeParser::new(), main_script());
    let second = compile(&config, &mut FakeParser::new(), main_script());
    assert_eq!(first.errors, 0);
    assert_eq!(first.file(), second.file());
}
