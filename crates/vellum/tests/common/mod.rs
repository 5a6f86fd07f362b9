//! Shared helpers for the integration tests: a canned-AST parser standing in
//! for the external `.psc` parser, terse AST constructors, and a one-call
//! compile harness that captures diagnostics.

use std::{collections::HashMap, path::Path};

use vellum::{
    compile_script, CollectDiagnostics, CompileResult, CompilerConfig, DeclareStatement,
    Diagnostics, Expression, Fatal, Function, FunctionType, IdentifierExpression, Literal,
    LiteralExpression, Object, PapyrusIdentifier, PapyrusType, Parameter, PexFile, PexFunction,
    PexValue, Script, ScriptParser, ScriptStore, SourceLocation, Statement, Variable,
    VariableReferenceState,
};

/// A location inside the conventional test file.
pub fn loc(line: u32, column: u32) -> SourceLocation {
    SourceLocation::new("Test.psc", line, column)
}

/// Parser collaborator that answers with canned ASTs keyed by file stem.
///
/// `load_script` probes the real filesystem, so tests put empty `.psc`
/// files in a temp directory and register a factory for each stem here.
#[derive(Default)]
pub struct FakeParser {
    scripts: HashMap<String, Box<dyn Fn() -> Script>>,
}

impl FakeParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&mut self, name: &str, factory: impl Fn() -> Script + 'static) {
        self.scripts.insert(name.to_ascii_lowercase(), Box::new(factory));
    }
}

impl ScriptParser for FakeParser {
    fn parse_script(&mut self, path: &Path) -> CompileResult<Script> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .expect("script path has a stem")
            .to_ascii_lowercase();
        let factory = self
            .scripts
            .get(&stem)
            .unwrap_or_else(|| panic!("no canned script registered for '{stem}'"));
        Ok(factory())
    }
}

pub fn script(objects: Vec<Object>) -> Script {
    Script {
        source_file_name: "Test.psc".to_owned(),
        objects,
    }
}

pub fn object(name: &str, parent: Option<&str>) -> Object {
    let parent_class = match parent {
        Some(parent) => PapyrusType::Unresolved(parent.to_owned()),
        None => PapyrusType::None,
    };
    Object::new(loc(1, 1), name, parent_class)
}

pub fn variable(name: &str, variable_type: PapyrusType, default: Option<Literal>) -> Variable {
    Variable {
        name: name.to_owned(),
        location: loc(2, 1),
        variable_type,
        user_flags: Default::default(),
        default_value: default,
        reference_state: VariableReferenceState::default(),
    }
}

pub fn function(name: &str, return_type: PapyrusType) -> Function {
    Function::new(loc(5, 1), name, FunctionType::Function, return_type)
}

pub fn parameter(name: &str, parameter_type: PapyrusType) -> Parameter {
    Parameter {
        name: name.to_owned(),
        location: loc(5, 10),
        parameter_type,
        default_value: None,
    }
}

pub fn int_lit(value: i32) -> Expression {
    Expression::Literal(LiteralExpression {
        location: loc(6, 1),
        value: Literal::Int(value),
    })
}

pub fn float_lit(value: f32) -> Expression {
    Expression::Literal(LiteralExpression {
        location: loc(6, 1),
        value: Literal::Float(value),
    })
}

pub fn bool_lit(value: bool) -> Expression {
    Expression::Literal(LiteralExpression {
        location: loc(6, 1),
        value: Literal::Bool(value),
    })
}

pub fn ident_expr(name: &str) -> Expression {
    Expression::Identifier(IdentifierExpression {
        location: loc(6, 5),
        identifier: PapyrusIdentifier::unresolved(name),
    })
}

pub fn declare(name: &str, declared_type: PapyrusType, initializer: Option<Expression>) -> Statement {
    Statement::Declare(DeclareStatement {
        location: loc(6, 1),
        name: name.to_owned(),
        declared_type,
        initializer,
        slot: None,
    })
}

pub fn assign(target: Expression, value: Expression) -> Statement {
    Statement::Assign(vellum::AssignStatement {
        location: loc(7, 1),
        target,
        value,
    })
}

/// Everything a test wants to know about one compile run.
pub struct CompileOutcome {
    pub result: Result<PexFile, Fatal>,
    pub lines: Vec<String>,
    pub errors: usize,
    pub warnings: usize,
}

impl CompileOutcome {
    pub fn file(&self) -> &PexFile {
        self.result.as_ref().expect("compilation succeeded")
    }

    pub fn has_line(&self, expected: &str) -> bool {
        self.lines.iter().any(|line| line == expected)
    }
}

/// Runs the full pipeline over `main` with diagnostics captured.
pub fn compile(config: &CompilerConfig, parser: &mut FakeParser, main: Script) -> CompileOutcome {
    let collector = CollectDiagnostics::new();
    let mut diags = Diagnostics::with_writer(Box::new(collector.clone()));
    diags.configure_warnings(config.disabled_warnings.clone(), config.warnings_as_errors.clone());
    let mut store = ScriptStore::new();
    let id = store.insert(main);
    let result = compile_script(config, &mut diags, parser, &mut store, id);
    CompileOutcome {
        result,
        lines: collector.lines(),
        errors: diags.error_count(),
        warnings: diags.warning_count(),
    }
}

/// Finds an emitted function by state and name in the first object.
pub fn find_function<'f>(file: &'f PexFile, state_name: &str, name: &str) -> &'f PexFunction {
    let object = &file.objects[0];
    for state in &object.states {
        if file.string(state.name) != state_name {
            continue;
        }
        for function in &state.functions {
            if function.name.map(|id| file.string(id)) == Some(name) {
                return function;
            }
        }
    }
    panic!("no function '{name}' in state '{state_name}'");
}

/// Renders a value operand for compact assertions.
pub fn value_str(file: &PexFile, value: &PexValue) -> String {
    match value {
        PexValue::None => "none".to_owned(),
        PexValue::Identifier(id) => file.string(*id).to_owned(),
        PexValue::String(id) => format!("{:?}", file.string(*id)),
        PexValue::Integer(v) => v.to_string(),
        PexValue::Float(v) => v.to_string(),
        PexValue::Bool(v) => v.to_string(),
    }
}
