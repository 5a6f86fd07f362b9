//! Statement nodes: resolution (`semantic`) and opcode emission (`build_pex`).

use crate::{
    diagnostics::CompileResult,
    location::SourceLocation,
    papyrus::{
        ast::{Function, LocalSlot},
        expressions::Expression,
        resolution::ResolutionContext,
        types::PapyrusType,
    },
    pex::{builder::PexFunctionBuilder, emit::Emitter, op::PexOpcode, PexValue},
};

/// A statement in a function body.
#[derive(Debug)]
pub enum Statement {
    Declare(DeclareStatement),
    Assign(AssignStatement),
    Expression(ExpressionStatement),
    Return(ReturnStatement),
    If(IfStatement),
    While(WhileStatement),
}

/// A local variable declaration, with optional initializer.
///
/// The name is mutable: when the same name is declared in distinct scopes of
/// one function, later declarations are rewritten to a mangled form after
/// `semantic2`, and that mangled name is what emission uses.
#[derive(Debug)]
pub struct DeclareStatement {
    pub location: SourceLocation,
    pub name: String,
    pub declared_type: PapyrusType,
    pub initializer: Option<Expression>,
    /// Slot in the owning function's locals table, assigned during `semantic2`.
    pub slot: Option<LocalSlot>,
}

#[derive(Debug)]
pub struct AssignStatement {
    pub location: SourceLocation,
    pub target: Expression,
    pub value: Expression,
}

#[derive(Debug)]
pub struct ExpressionStatement {
    pub location: SourceLocation,
    pub expression: Expression,
}

#[derive(Debug)]
pub struct ReturnStatement {
    pub location: SourceLocation,
    pub value: Option<Expression>,
}

#[derive(Debug)]
pub struct IfBranch {
    pub condition: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug)]
pub struct IfStatement {
    pub location: SourceLocation,
    /// The `if` branch followed by any `elseif` branches; never empty.
    pub branches: Vec<IfBranch>,
    pub else_body: Vec<Statement>,
}

#[derive(Debug)]
pub struct WhileStatement {
    pub location: SourceLocation,
    pub condition: Expression,
    pub body: Vec<Statement>,
}

impl Statement {
    /// Resolves this statement and everything under it.
    pub(crate) fn semantic(&mut self, ctx: &mut ResolutionContext) -> CompileResult<()> {
        match self {
            Self::Declare(s) => {
                let declared = std::mem::take(&mut s.declared_type);
                s.declared_type = ctx.resolve_type(declared, &s.location)?;
                if let Some(initializer) = &mut s.initializer {
                    initializer.semantic(ctx)?;
                }
                s.slot = Some(ctx.declare_local(&s.name, &s.declared_type));
                Ok(())
            }
            Self::Assign(s) => {
                s.value.semantic(ctx)?;
                s.target.semantic_as_target(ctx)
            }
            Self::Expression(s) => s.expression.semantic(ctx),
            Self::Return(s) => {
                if let Some(value) = &mut s.value {
                    value.semantic(ctx)?;
                    if let Some(function) = ctx.function {
                        if ctx.store.function(function).return_type == PapyrusType::None {
                            ctx.diags.error(
                                &s.location,
                                "Cannot return a value from a function that does not return a value!",
                            );
                        }
                    }
                }
                Ok(())
            }
            Self::If(s) => {
                for branch in &mut s.branches {
                    branch.condition.semantic(ctx)?;
                    ctx.push_local_variable_scope();
                    for statement in &mut branch.body {
                        statement.semantic(ctx)?;
                    }
                    ctx.pop_local_variable_scope();
                }
                ctx.push_local_variable_scope();
                for statement in &mut s.else_body {
                    statement.semantic(ctx)?;
                }
                ctx.pop_local_variable_scope();
                Ok(())
            }
            Self::While(s) => {
                s.condition.semantic(ctx)?;
                ctx.push_local_variable_scope();
                for statement in &mut s.body {
                    statement.semantic(ctx)?;
                }
                ctx.pop_local_variable_scope();
                Ok(())
            }
        }
    }

    /// Emits this statement's opcodes.
    pub(crate) fn build_pex(
        &self,
        em: &mut Emitter<'_>,
        func: &Function,
        bldr: &mut PexFunctionBuilder<'_>,
    ) -> CompileResult<()> {
        match self {
            Self::Declare(s) => {
                let type_name = s.declared_type.type_string(em.store);
                let local = bldr.allocate_local(&s.name, &type_name);
                if let Some(initializer) = &s.initializer {
                    let value = initializer.generate_load(em, func, bldr)?;
                    bldr.set_location(&s.location);
                    bldr.emit(PexOpcode::Assign { dest: local, src: value });
                }
                Ok(())
            }
            Self::Assign(s) => {
                let value = s.value.generate_load(em, func, bldr)?;
                s.target.generate_store(value, em, func, bldr)
            }
            Self::Expression(s) => {
                s.expression.generate_load(em, func, bldr).map(|_| ())
            }
            Self::Return(s) => {
                let value = match &s.value {
                    Some(value) => value.generate_load(em, func, bldr)?,
                    None => PexValue::None,
                };
                bldr.set_location(&s.location);
                bldr.emit(PexOpcode::Ret { value });
                Ok(())
            }
            Self::If(s) => {
                let mut end_jumps = Vec::with_capacity(s.branches.len());
                for branch in &s.branches {
                    let condition = branch.condition.generate_load(em, func, bldr)?;
                    bldr.set_location(branch.condition.location());
                    let skip = bldr.emit_jump_false(condition);
                    bldr.free_statement_temps();
                    build_statement_list(&branch.body, em, func, bldr)?;
                    end_jumps.push(bldr.emit_jump());
                    bldr.patch_jump(skip);
                }
                build_statement_list(&s.else_body, em, func, bldr)?;
                for jump in end_jumps {
                    bldr.patch_jump(jump);
                }
                Ok(())
            }
            Self::While(s) => {
                let top = bldr.next_instruction();
                let condition = s.condition.generate_load(em, func, bldr)?;
                bldr.set_location(s.condition.location());
                let exit = bldr.emit_jump_false(condition);
                bldr.free_statement_temps();
                build_statement_list(&s.body, em, func, bldr)?;
                bldr.set_location(&s.location);
                bldr.emit(PexOpcode::Jmp { target: top });
                bldr.patch_jump(exit);
                Ok(())
            }
        }
    }
}

/// Emits a statement list, releasing pooled temporaries at each statement
/// boundary.
pub(crate) fn build_statement_list(
    statements: &[Statement],
    em: &mut Emitter<'_>,
    func: &Function,
    bldr: &mut PexFunctionBuilder<'_>,
) -> CompileResult<()> {
    for statement in statements {
        statement.build_pex(em, func, bldr)?;
        bldr.free_statement_temps();
    }
    Ok(())
}

/// Visits every declare statement in the tree, outermost first, in source
/// order. Used by local-name mangling after `semantic2`.
pub(crate) fn for_each_declare(statements: &mut [Statement], visit: &mut impl FnMut(&mut DeclareStatement)) {
    for statement in statements {
        match statement {
            Statement::Declare(s) => visit(s),
            Statement::If(s) => {
                for branch in &mut s.branches {
                    for_each_declare(&mut branch.body, visit);
                }
                for_each_declare(&mut s.else_body, visit);
            }
            Statement::While(s) => for_each_declare(&mut s.body, visit),
            _ => {}
        }
    }
}
