//! Semantic core of a Papyrus-to-PEX script compiler.
//!
//! Vellum takes the parsed AST of a `.psc` script, resolves cross-script
//! types and identifiers across the import graph, validates the script
//! against language rules and engine-imposed limits, and lowers it into a
//! typed PEX model with debug metadata. Lexing/parsing and the final binary
//! serialization are external collaborators reached through the
//! [`ScriptParser`] trait and the populated [`PexFile`].
//!
//! The pipeline per script is three resolution passes followed by emission;
//! [`compile_script`] runs all of it. Everything is synchronous and
//! single-threaded; the only state shared between scripts is the
//! [`ScriptStore`] registry of loaded scripts and the [`Diagnostics`]
//! counters, both plain values owned by the caller.

mod compile;
mod config;
mod diagnostics;
mod ident;
mod limits;
mod location;
mod parse;
pub mod papyrus;
pub mod pex;

pub use crate::{
    compile::compile_script,
    config::CompilerConfig,
    diagnostics::{
        CollectDiagnostics, CompileResult, DiagnosticWriter, Diagnostics, Fatal, StderrWriter,
        Warning,
    },
    limits::{EngineLimitCaps, LimitKind},
    location::SourceLocation,
    parse::ScriptParser,
    papyrus::{
        ast::{
            Function, FunctionType, Literal, LocalDecl, LocalSlot, Object, Parameter, Property,
            PropertyGroup, Script, State, Struct, StructMember, UserFlags, Variable,
            VariableReferenceState,
        },
        expressions::{
            ArrayIndexExpression, ArrayLengthExpression, BinaryOperator, BinaryOpExpression,
            CastExpression, Expression, FunctionCallExpression, IdentifierExpression,
            LiteralExpression, MemberAccessExpression, NewArrayExpression, SelfExpression,
            UnaryOperator, UnaryOpExpression,
        },
        identifier::{BuiltinArrayFunctionKind, PapyrusIdentifier},
        resolution::ResolutionContext,
        script::{
            FunctionRef, MemberRef, ObjectRef, PropertyRef, ScriptId, ScriptStore, StructRef,
            VariableRef,
        },
        statements::{
            AssignStatement, DeclareStatement, ExpressionStatement, IfBranch, IfStatement,
            ReturnStatement, Statement, WhileStatement,
        },
        types::PapyrusType,
    },
    pex::{
        PexDebugFunctionInfo, PexDebugFunctionType, PexDebugInfo, PexFile, PexFunction,
        PexFunctionBuilder, PexFunctionParameter, PexLocal, PexObject, PexOpcode, PexProperty,
        PexState, PexStringId, PexStruct, PexStructMember, PexValue, PexVariable,
    },
};
