//! Expression nodes: resolution (`semantic`) and opcode emission
//! (`generate_load` / `generate_store`).
//!
//! Expressions form a closed variant family. `semantic` resolves types and
//! identifiers through the `ResolutionContext`; `generate_load` lowers the
//! expression into opcodes on a `PexFunctionBuilder` and returns the value
//! holding the result. Lvalue expressions additionally support
//! `generate_store`.

use smallvec::SmallVec;

use crate::{
    diagnostics::{CompileResult, Warning},
    limits::LimitKind,
    location::SourceLocation,
    papyrus::{
        ast::{Function, Literal},
        identifier::{BuiltinArrayFunctionKind, PapyrusIdentifier},
        resolution::ResolutionContext,
        types::PapyrusType,
    },
    pex::{
        builder::PexFunctionBuilder,
        emit::Emitter,
        op::PexOpcode,
        PexValue,
    },
};

/// An expression in a function body.
#[derive(Debug)]
pub enum Expression {
    Literal(LiteralExpression),
    Identifier(IdentifierExpression),
    MemberAccess(MemberAccessExpression),
    ArrayIndex(ArrayIndexExpression),
    ArrayLength(ArrayLengthExpression),
    FunctionCall(FunctionCallExpression),
    Unary(UnaryOpExpression),
    Binary(BinaryOpExpression),
    Cast(CastExpression),
    NewArray(NewArrayExpression),
    SelfRef(SelfExpression),
}

#[derive(Debug)]
pub struct LiteralExpression {
    pub location: SourceLocation,
    pub value: Literal,
}

#[derive(Debug)]
pub struct IdentifierExpression {
    pub location: SourceLocation,
    pub identifier: PapyrusIdentifier,
}

#[derive(Debug)]
pub struct MemberAccessExpression {
    pub location: SourceLocation,
    pub base: Box<Expression>,
    pub member: PapyrusIdentifier,
}

#[derive(Debug)]
pub struct ArrayIndexExpression {
    pub location: SourceLocation,
    pub base: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug)]
pub struct ArrayLengthExpression {
    pub location: SourceLocation,
    pub base: Box<Expression>,
}

#[derive(Debug)]
pub struct FunctionCallExpression {
    pub location: SourceLocation,
    /// Receiver expression; `None` for unqualified calls.
    pub base: Option<Box<Expression>>,
    pub function: PapyrusIdentifier,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Unset; the parser never leaves this in a well-formed tree.
    None,
    Not,
    Negate,
}

#[derive(Debug)]
pub struct UnaryOpExpression {
    pub location: SourceLocation,
    pub operation: UnaryOperator,
    pub inner: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    BooleanAnd,
    BooleanOr,
}

#[derive(Debug)]
pub struct BinaryOpExpression {
    pub location: SourceLocation,
    pub left: Box<Expression>,
    pub operation: BinaryOperator,
    pub right: Box<Expression>,
}

#[derive(Debug)]
pub struct CastExpression {
    pub location: SourceLocation,
    pub inner: Box<Expression>,
    pub target_type: PapyrusType,
}

#[derive(Debug)]
pub struct NewArrayExpression {
    pub location: SourceLocation,
    pub element_type: PapyrusType,
    pub size: Box<Expression>,
}

#[derive(Debug)]
pub struct SelfExpression {
    pub location: SourceLocation,
    /// Filled in by `semantic` with the current object's type.
    pub object_type: PapyrusType,
}

impl Expression {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Literal(e) => &e.location,
            Self::Identifier(e) => &e.location,
            Self::MemberAccess(e) => &e.location,
            Self::ArrayIndex(e) => &e.location,
            Self::ArrayLength(e) => &e.location,
            Self::FunctionCall(e) => &e.location,
            Self::Unary(e) => &e.location,
            Self::Binary(e) => &e.location,
            Self::Cast(e) => &e.location,
            Self::NewArray(e) => &e.location,
            Self::SelfRef(e) => &e.location,
        }
    }

    /// Resolves identifiers and types in this expression tree.
    pub(crate) fn semantic(&mut self, ctx: &mut ResolutionContext) -> CompileResult<()> {
        match self {
            Self::Literal(_) => Ok(()),
            Self::Identifier(e) => {
                let ident = std::mem::replace(&mut e.identifier, PapyrusIdentifier::unresolved(""));
                let resolved = ctx.try_resolve_identifier(ident)?;
                if let PapyrusIdentifier::Unresolved { name } = &resolved {
                    ctx.diags
                        .error(&e.location, format!("Unresolved identifier '{name}'!"));
                }
                if let PapyrusIdentifier::Variable(r) = &resolved {
                    ctx.mark_variable_read(*r);
                }
                e.identifier = resolved;
                Ok(())
            }
            Self::MemberAccess(e) => {
                e.base.semantic(ctx)?;
                let base_type = e.base.result_type(ctx.store);
                let member = std::mem::replace(&mut e.member, PapyrusIdentifier::unresolved(""));
                e.member = ctx.resolve_member_identifier(&base_type, member, &e.location)?;
                Ok(())
            }
            Self::ArrayIndex(e) => {
                e.base.semantic(ctx)?;
                e.index.semantic(ctx)
            }
            Self::ArrayLength(e) => e.base.semantic(ctx),
            Self::FunctionCall(e) => {
                if let Some(base) = &mut e.base {
                    base.semantic(ctx)?;
                }
                for argument in &mut e.arguments {
                    argument.semantic(ctx)?;
                }
                let base_type = match &e.base {
                    Some(base) => base.result_type(ctx.store),
                    None => PapyrusType::None,
                };
                let function = std::mem::replace(&mut e.function, PapyrusIdentifier::unresolved(""));
                e.function = ctx.resolve_function_identifier(&base_type, function, &e.location)?;
                Ok(())
            }
            Self::Unary(e) => e.inner.semantic(ctx),
            Self::Binary(e) => {
                e.left.semantic(ctx)?;
                e.right.semantic(ctx)
            }
            Self::Cast(e) => {
                e.inner.semantic(ctx)?;
                let target = std::mem::take(&mut e.target_type);
                e.target_type = ctx.resolve_type(target, &e.location)?;
                if e.target_type == e.inner.result_type(ctx.store) {
                    let warning = Warning::UnnecessaryCast {
                        from: e.inner.result_type(ctx.store).type_string(ctx.store),
                        to: e.target_type.type_string(ctx.store),
                    };
                    ctx.diags.warning(&e.location, &warning);
                }
                Ok(())
            }
            Self::NewArray(e) => {
                let element = std::mem::take(&mut e.element_type);
                e.element_type = ctx.resolve_type(element, &e.location)?;
                e.size.semantic(ctx)
            }
            Self::SelfRef(e) => {
                let Some(object) = ctx.object else {
                    return Err(ctx
                        .diags
                        .logical_fatal("'self' resolved outside of any object!"));
                };
                e.object_type = PapyrusType::ResolvedObject(object);
                Ok(())
            }
        }
    }

    /// Resolves this expression as an assignment target.
    ///
    /// Identifier targets are resolved without marking a read; reads still
    /// happen for the base of member and element targets, since storing
    /// through them loads the container first.
    pub(crate) fn semantic_as_target(&mut self, ctx: &mut ResolutionContext) -> CompileResult<()> {
        match self {
            Self::Identifier(e) => {
                let ident = std::mem::replace(&mut e.identifier, PapyrusIdentifier::unresolved(""));
                let resolved = ctx.try_resolve_identifier(ident)?;
                if let PapyrusIdentifier::Unresolved { name } = &resolved {
                    ctx.diags
                        .error(&e.location, format!("Unresolved identifier '{name}'!"));
                }
                if let PapyrusIdentifier::Variable(r) = &resolved {
                    ctx.mark_variable_written(*r);
                }
                e.identifier = resolved;
                Ok(())
            }
            Self::MemberAccess(e) => {
                e.base.semantic(ctx)?;
                let base_type = e.base.result_type(ctx.store);
                let member = std::mem::replace(&mut e.member, PapyrusIdentifier::unresolved(""));
                e.member = ctx.resolve_member_identifier(&base_type, member, &e.location)?;
                Ok(())
            }
            Self::ArrayIndex(e) => {
                e.base.semantic(ctx)?;
                e.index.semantic(ctx)
            }
            other => {
                ctx.diags
                    .error(other.location(), "Cannot assign to this expression.");
                Ok(())
            }
        }
    }

    /// The type this expression evaluates to.
    pub fn result_type(&self, store: &crate::papyrus::script::ScriptStore) -> PapyrusType {
        match self {
            Self::Literal(e) => e.value.literal_type(),
            Self::Identifier(e) => e.identifier.value_type(store),
            Self::MemberAccess(e) => e.member.value_type(store),
            Self::ArrayIndex(e) => e
                .base
                .result_type(store)
                .element_type()
                .cloned()
                .unwrap_or(PapyrusType::None),
            Self::ArrayLength(_) => PapyrusType::Int,
            Self::FunctionCall(e) => e.function.value_type(store),
            Self::Unary(e) => e.inner.result_type(store),
            Self::Binary(e) => match e.operation {
                BinaryOperator::CmpEq
                | BinaryOperator::CmpNe
                | BinaryOperator::CmpLt
                | BinaryOperator::CmpLe
                | BinaryOperator::CmpGt
                | BinaryOperator::CmpGe
                | BinaryOperator::BooleanAnd
                | BinaryOperator::BooleanOr => PapyrusType::Bool,
                BinaryOperator::Add
                    if e.left.result_type(store) == PapyrusType::String
                        || e.right.result_type(store) == PapyrusType::String =>
                {
                    PapyrusType::String
                }
                _ => {
                    if e.left.result_type(store) == PapyrusType::Float
                        || e.right.result_type(store) == PapyrusType::Float
                    {
                        PapyrusType::Float
                    } else {
                        PapyrusType::Int
                    }
                }
            },
            Self::Cast(e) => e.target_type.clone(),
            Self::NewArray(e) => PapyrusType::Array(Box::new(e.element_type.clone())),
            Self::SelfRef(e) => e.object_type.clone(),
        }
    }

    /// Emits the opcodes that load this expression's value, returning the
    /// value holding the result.
    pub(crate) fn generate_load(
        &self,
        em: &mut Emitter<'_>,
        func: &Function,
        bldr: &mut PexFunctionBuilder<'_>,
    ) -> CompileResult<PexValue> {
        match self {
            Self::Literal(e) => Ok(literal_value(&e.value, bldr)),
            Self::Identifier(e) => load_identifier(&e.identifier, &e.location, em, func, bldr),
            Self::MemberAccess(e) => {
                let store = em.store;
                let base_value = e.base.generate_load(em, func, bldr)?;
                match &e.member {
                    PapyrusIdentifier::StructMember(r) => {
                        let member = store.member(*r);
                        let member_name = bldr.get_string(&member.name);
                        let dest = bldr.alloc_temp(&member.member_type.type_string(store));
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::StructGet {
                            dest: dest.clone(),
                            strukt: base_value,
                            member: member_name,
                        });
                        Ok(dest)
                    }
                    PapyrusIdentifier::Property(r) => {
                        let property = store.property(*r);
                        let property_name = bldr.get_string(&property.name);
                        let dest = bldr.alloc_temp(&property.property_type.type_string(store));
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::PropGet {
                            property: property_name,
                            object: base_value,
                            dest: dest.clone(),
                        });
                        Ok(dest)
                    }
                    // A resolution error was already reported; keep emitting.
                    PapyrusIdentifier::Unresolved { .. } => Ok(PexValue::None),
                    _ => Err(em
                        .diags
                        .logical_fatal("Unknown member identifier while generating the pex opcodes!")),
                }
            }
            Self::ArrayIndex(e) => {
                let store = em.store;
                let array = e.base.generate_load(em, func, bldr)?;
                let index = e.index.generate_load(em, func, bldr)?;
                let dest = bldr.alloc_temp(&self.result_type(store).type_string(store));
                bldr.set_location(&e.location);
                bldr.emit(PexOpcode::ArrayGetElement {
                    dest: dest.clone(),
                    array,
                    index,
                });
                Ok(dest)
            }
            Self::ArrayLength(e) => {
                let array = e.base.generate_load(em, func, bldr)?;
                let dest = bldr.alloc_temp("Int");
                bldr.set_location(&e.location);
                bldr.emit(PexOpcode::ArrayLength {
                    dest: dest.clone(),
                    array,
                });
                Ok(dest)
            }
            Self::FunctionCall(e) => e.generate_call(em, func, bldr),
            Self::Unary(e) => {
                let store = em.store;
                let inner_value = e.inner.generate_load(em, func, bldr)?;
                let dest = bldr.alloc_temp(&self.result_type(store).type_string(store));
                bldr.set_location(&e.location);
                match e.operation {
                    UnaryOperator::Negate => match e.inner.result_type(store) {
                        PapyrusType::Float => bldr.emit(PexOpcode::FNeg {
                            dest: dest.clone(),
                            src: inner_value,
                        }),
                        PapyrusType::Int => bldr.emit(PexOpcode::INeg {
                            dest: dest.clone(),
                            src: inner_value,
                        }),
                        _ => {
                            return Err(em
                                .diags
                                .fatal(&e.location, "You can only negate integers and floats!"));
                        }
                    },
                    UnaryOperator::Not => bldr.emit(PexOpcode::Not {
                        dest: dest.clone(),
                        src: inner_value,
                    }),
                    UnaryOperator::None => {
                        return Err(em
                            .diags
                            .logical_fatal("Unknown unary operator while generating the pex opcodes!"));
                    }
                }
                Ok(dest)
            }
            Self::Binary(e) => e.generate_binary(em, func, bldr),
            Self::Cast(e) => {
                let store = em.store;
                let inner_value = e.inner.generate_load(em, func, bldr)?;
                let dest = bldr.alloc_temp(&e.target_type.type_string(store));
                bldr.set_location(&e.location);
                bldr.emit(PexOpcode::Cast {
                    dest: dest.clone(),
                    src: inner_value,
                });
                Ok(dest)
            }
            Self::NewArray(e) => {
                let store = em.store;
                let size = e.size.generate_load(em, func, bldr)?;
                if let PexValue::Integer(count) = size {
                    em.limits.check_limit(
                        em.diags,
                        &e.location,
                        LimitKind::ArrayLength,
                        count.max(0) as usize,
                        None,
                    );
                }
                let dest = bldr.alloc_temp(&self.result_type(store).type_string(store));
                bldr.set_location(&e.location);
                bldr.emit(PexOpcode::ArrayCreate {
                    dest: dest.clone(),
                    size,
                });
                Ok(dest)
            }
            Self::SelfRef(_) => {
                let self_name = bldr.get_string("self");
                Ok(PexValue::Identifier(self_name))
            }
        }
    }

    /// Emits the opcodes that store `value` into this lvalue expression.
    pub(crate) fn generate_store(
        &self,
        value: PexValue,
        em: &mut Emitter<'_>,
        func: &Function,
        bldr: &mut PexFunctionBuilder<'_>,
    ) -> CompileResult<()> {
        match self {
            Self::Identifier(e) => {
                let store = em.store;
                match &e.identifier {
                    PapyrusIdentifier::LocalVariable { slot, .. } => {
                        let name = bldr.get_string(&func.locals[slot.index()].name);
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::Assign {
                            dest: PexValue::Identifier(name),
                            src: value,
                        });
                        Ok(())
                    }
                    PapyrusIdentifier::Parameter { name, .. } => {
                        let name = bldr.get_string(name);
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::Assign {
                            dest: PexValue::Identifier(name),
                            src: value,
                        });
                        Ok(())
                    }
                    PapyrusIdentifier::Variable(r) => {
                        let name = bldr.get_string(&store.variable(*r).name);
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::Assign {
                            dest: PexValue::Identifier(name),
                            src: value,
                        });
                        Ok(())
                    }
                    PapyrusIdentifier::Property(r) => {
                        let property_name = bldr.get_string(&store.property(*r).name);
                        let self_name = bldr.get_string("self");
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::PropSet {
                            property: property_name,
                            object: PexValue::Identifier(self_name),
                            value,
                        });
                        Ok(())
                    }
                    // A resolution error was already reported; emit nothing.
                    PapyrusIdentifier::Unresolved { .. } => Ok(()),
                    _ => Err(em
                        .diags
                        .logical_fatal("Unknown store identifier while generating the pex opcodes!")),
                }
            }
            Self::MemberAccess(e) => {
                let store = em.store;
                let base_value = e.base.generate_load(em, func, bldr)?;
                match &e.member {
                    PapyrusIdentifier::StructMember(r) => {
                        let member_name = bldr.get_string(&store.member(*r).name);
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::StructSet {
                            strukt: base_value,
                            member: member_name,
                            value,
                        });
                        Ok(())
                    }
                    PapyrusIdentifier::Property(r) => {
                        let property_name = bldr.get_string(&store.property(*r).name);
                        bldr.set_location(&e.location);
                        bldr.emit(PexOpcode::PropSet {
                            property: property_name,
                            object: base_value,
                            value,
                        });
                        Ok(())
                    }
                    PapyrusIdentifier::Unresolved { .. } => Ok(()),
                    _ => Err(em
                        .diags
                        .logical_fatal("Unknown store identifier while generating the pex opcodes!")),
                }
            }
            Self::ArrayIndex(e) => {
                let array = e.base.generate_load(em, func, bldr)?;
                let index = e.index.generate_load(em, func, bldr)?;
                bldr.set_location(&e.location);
                bldr.emit(PexOpcode::ArraySetElement { array, index, value });
                Ok(())
            }
            // Flagged during resolution; emit nothing.
            _ => Ok(()),
        }
    }
}

impl FunctionCallExpression {
    fn generate_call(
        &self,
        em: &mut Emitter<'_>,
        func: &Function,
        bldr: &mut PexFunctionBuilder<'_>,
    ) -> CompileResult<PexValue> {
        let store = em.store;
        match &self.function {
            PapyrusIdentifier::Function(r) => {
                let callee = store.function(*r);
                let mut args: SmallVec<[PexValue; 4]> = SmallVec::new();
                for argument in &self.arguments {
                    args.push(argument.generate_load(em, func, bldr)?);
                }
                let dest = if callee.return_type == PapyrusType::None {
                    bldr.get_none_local(&self.location)
                } else {
                    bldr.alloc_temp(&callee.return_type.type_string(store))
                };
                if callee.is_global {
                    let object_name = bldr.get_string(&store.object(r.object).name);
                    let function_name = bldr.get_string(&callee.name);
                    bldr.set_location(&self.location);
                    bldr.emit(PexOpcode::CallStatic {
                        object: object_name,
                        function: function_name,
                        dest: dest.clone(),
                        args,
                    });
                } else {
                    let base_value = match &self.base {
                        Some(base) => base.generate_load(em, func, bldr)?,
                        None => {
                            let self_name = bldr.get_string("self");
                            PexValue::Identifier(self_name)
                        }
                    };
                    let function_name = bldr.get_string(&callee.name);
                    bldr.set_location(&self.location);
                    bldr.emit(PexOpcode::CallMethod {
                        function: function_name,
                        base: base_value,
                        dest: dest.clone(),
                        args,
                    });
                }
                Ok(dest)
            }
            PapyrusIdentifier::BuiltinArrayFunction { kind, .. } => {
                let Some(base) = &self.base else {
                    return Err(em
                        .diags
                        .logical_fatal("Array builtin call without a receiver while generating the pex opcodes!"));
                };
                let array = base.generate_load(em, func, bldr)?;
                let mut args = Vec::with_capacity(self.arguments.len());
                for argument in &self.arguments {
                    args.push(argument.generate_load(em, func, bldr)?);
                }
                let arg = |index: usize, default: PexValue| args.get(index).cloned().unwrap_or(default);
                bldr.set_location(&self.location);
                match kind {
                    BuiltinArrayFunctionKind::Find => {
                        let dest = bldr.alloc_temp("Int");
                        bldr.set_location(&self.location);
                        bldr.emit(PexOpcode::ArrayFindElement {
                            array,
                            dest: dest.clone(),
                            value: arg(0, PexValue::None),
                            start_index: arg(1, PexValue::Integer(0)),
                        });
                        Ok(dest)
                    }
                    BuiltinArrayFunctionKind::RFind => {
                        let dest = bldr.alloc_temp("Int");
                        bldr.set_location(&self.location);
                        bldr.emit(PexOpcode::ArrayRFindElement {
                            array,
                            dest: dest.clone(),
                            value: arg(0, PexValue::None),
                            start_index: arg(1, PexValue::Integer(-1)),
                        });
                        Ok(dest)
                    }
                    BuiltinArrayFunctionKind::FindStruct => {
                        let dest = bldr.alloc_temp("Int");
                        bldr.set_location(&self.location);
                        bldr.emit(PexOpcode::ArrayFindStruct {
                            array,
                            dest: dest.clone(),
                            member: arg(0, PexValue::None),
                            value: arg(1, PexValue::None),
                            start_index: arg(2, PexValue::Integer(0)),
                        });
                        Ok(dest)
                    }
                    BuiltinArrayFunctionKind::RFindStruct => {
                        let dest = bldr.alloc_temp("Int");
                        bldr.set_location(&self.location);
                        bldr.emit(PexOpcode::ArrayRFindStruct {
                            array,
                            dest: dest.clone(),
                            member: arg(0, PexValue::None),
                            value: arg(1, PexValue::None),
                            start_index: arg(2, PexValue::Integer(-1)),
                        });
                        Ok(dest)
                    }
                    BuiltinArrayFunctionKind::Add => {
                        bldr.emit(PexOpcode::ArrayAdd {
                            array,
                            value: arg(0, PexValue::None),
                            count: arg(1, PexValue::Integer(1)),
                        });
                        Ok(PexValue::None)
                    }
                    BuiltinArrayFunctionKind::Clear => {
                        bldr.emit(PexOpcode::ArrayClear { array });
                        Ok(PexValue::None)
                    }
                    BuiltinArrayFunctionKind::Insert => {
                        bldr.emit(PexOpcode::ArrayInsert {
                            array,
                            value: arg(0, PexValue::None),
                            index: arg(1, PexValue::Integer(0)),
                        });
                        Ok(PexValue::None)
                    }
                    BuiltinArrayFunctionKind::Remove => {
                        bldr.emit(PexOpcode::ArrayRemove {
                            array,
                            index: arg(0, PexValue::Integer(0)),
                            count: arg(1, PexValue::Integer(1)),
                        });
                        Ok(PexValue::None)
                    }
                    BuiltinArrayFunctionKind::RemoveLast => {
                        bldr.emit(PexOpcode::ArrayRemoveLast { array });
                        Ok(PexValue::None)
                    }
                }
            }
            // A resolution error was already reported; keep emitting.
            PapyrusIdentifier::Unresolved { .. } => Ok(PexValue::None),
            _ => Err(em
                .diags
                .logical_fatal("Unknown function identifier while generating the pex opcodes!")),
        }
    }
}

impl BinaryOpExpression {
    fn generate_binary(
        &self,
        em: &mut Emitter<'_>,
        func: &Function,
        bldr: &mut PexFunctionBuilder<'_>,
    ) -> CompileResult<PexValue> {
        let store = em.store;

        // Short-circuit forms evaluate the right side conditionally.
        if matches!(self.operation, BinaryOperator::BooleanAnd | BinaryOperator::BooleanOr) {
            let dest = bldr.alloc_temp("Bool");
            let left_value = self.left.generate_load(em, func, bldr)?;
            bldr.set_location(&self.location);
            bldr.emit(PexOpcode::Assign {
                dest: dest.clone(),
                src: left_value,
            });
            let skip = if self.operation == BinaryOperator::BooleanAnd {
                bldr.emit_jump_false(dest.clone())
            } else {
                bldr.emit_jump_true(dest.clone())
            };
            let right_value = self.right.generate_load(em, func, bldr)?;
            bldr.set_location(&self.location);
            bldr.emit(PexOpcode::Assign {
                dest: dest.clone(),
                src: right_value,
            });
            bldr.patch_jump(skip);
            return Ok(dest);
        }

        let left_type = self.left.result_type(store);
        let right_type = self.right.result_type(store);
        let left = self.left.generate_load(em, func, bldr)?;
        let right = self.right.generate_load(em, func, bldr)?;
        let dest = bldr.alloc_temp(&self.result_type_string(store));
        bldr.set_location(&self.location);

        let is_string = left_type == PapyrusType::String || right_type == PapyrusType::String;
        let is_float = left_type == PapyrusType::Float || right_type == PapyrusType::Float;
        let d = dest.clone();
        match self.operation {
            BinaryOperator::Add => {
                if is_string {
                    bldr.emit(PexOpcode::StrCat { dest: d, a: left, b: right });
                } else if is_float {
                    bldr.emit(PexOpcode::FAdd { dest: d, a: left, b: right });
                } else if left_type == PapyrusType::Int {
                    bldr.emit(PexOpcode::IAdd { dest: d, a: left, b: right });
                } else {
                    return Err(em
                        .diags
                        .fatal(&self.location, "You can only add integers, floats, and strings!"));
                }
            }
            BinaryOperator::Subtract => {
                if is_float {
                    bldr.emit(PexOpcode::FSub { dest: d, a: left, b: right });
                } else if left_type == PapyrusType::Int {
                    bldr.emit(PexOpcode::ISub { dest: d, a: left, b: right });
                } else {
                    return Err(em
                        .diags
                        .fatal(&self.location, "You can only subtract integers and floats!"));
                }
            }
            BinaryOperator::Multiply => {
                if is_float {
                    bldr.emit(PexOpcode::FMul { dest: d, a: left, b: right });
                } else if left_type == PapyrusType::Int {
                    bldr.emit(PexOpcode::IMul { dest: d, a: left, b: right });
                } else {
                    return Err(em
                        .diags
                        .fatal(&self.location, "You can only multiply integers and floats!"));
                }
            }
            BinaryOperator::Divide => {
                if is_float {
                    bldr.emit(PexOpcode::FDiv { dest: d, a: left, b: right });
                } else if left_type == PapyrusType::Int {
                    bldr.emit(PexOpcode::IDiv { dest: d, a: left, b: right });
                } else {
                    return Err(em
                        .diags
                        .fatal(&self.location, "You can only divide integers and floats!"));
                }
            }
            BinaryOperator::Modulus => {
                if left_type == PapyrusType::Int && right_type == PapyrusType::Int {
                    bldr.emit(PexOpcode::IMod { dest: d, a: left, b: right });
                } else {
                    return Err(em
                        .diags
                        .fatal(&self.location, "You can only use the modulus operator on integers!"));
                }
            }
            BinaryOperator::CmpEq => bldr.emit(PexOpcode::CmpEq { dest: d, a: left, b: right }),
            BinaryOperator::CmpNe => {
                bldr.emit(PexOpcode::CmpEq {
                    dest: d.clone(),
                    a: left,
                    b: right,
                });
                bldr.emit(PexOpcode::Not { dest: d, src: dest.clone() });
            }
            BinaryOperator::CmpLt => bldr.emit(PexOpcode::CmpLt { dest: d, a: left, b: right }),
            BinaryOperator::CmpLe => bldr.emit(PexOpcode::CmpLe { dest: d, a: left, b: right }),
            BinaryOperator::CmpGt => bldr.emit(PexOpcode::CmpGt { dest: d, a: left, b: right }),
            BinaryOperator::CmpGe => bldr.emit(PexOpcode::CmpGe { dest: d, a: left, b: right }),
            BinaryOperator::BooleanAnd | BinaryOperator::BooleanOr => unreachable!(),
        }
        Ok(dest)
    }

    fn result_type_string(&self, store: &crate::papyrus::script::ScriptStore) -> String {
        match self.operation {
            BinaryOperator::CmpEq
            | BinaryOperator::CmpNe
            | BinaryOperator::CmpLt
            | BinaryOperator::CmpLe
            | BinaryOperator::CmpGt
            | BinaryOperator::CmpGe
            | BinaryOperator::BooleanAnd
            | BinaryOperator::BooleanOr => "Bool".to_owned(),
            BinaryOperator::Add
                if self.left.result_type(store) == PapyrusType::String
                    || self.right.result_type(store) == PapyrusType::String =>
            {
                "String".to_owned()
            }
            _ => {
                if self.left.result_type(store) == PapyrusType::Float
                    || self.right.result_type(store) == PapyrusType::Float
                {
                    "Float".to_owned()
                } else {
                    "Int".to_owned()
                }
            }
        }
    }
}

fn literal_value(literal: &Literal, bldr: &mut PexFunctionBuilder<'_>) -> PexValue {
    match literal {
        Literal::None => PexValue::None,
        Literal::Int(v) => PexValue::Integer(*v),
        Literal::Float(v) => PexValue::Float(*v),
        Literal::Bool(v) => PexValue::Bool(*v),
        Literal::String(v) => {
            let id = bldr.get_string(v);
            PexValue::String(id)
        }
    }
}

fn load_identifier(
    identifier: &PapyrusIdentifier,
    location: &SourceLocation,
    em: &mut Emitter<'_>,
    func: &Function,
    bldr: &mut PexFunctionBuilder<'_>,
) -> CompileResult<PexValue> {
    let store = em.store;
    match identifier {
        PapyrusIdentifier::LocalVariable { slot, .. } => {
            let name = bldr.get_string(&func.locals[slot.index()].name);
            Ok(PexValue::Identifier(name))
        }
        PapyrusIdentifier::Parameter { name, .. } => {
            let name = bldr.get_string(name);
            Ok(PexValue::Identifier(name))
        }
        PapyrusIdentifier::Variable(r) => {
            let name = bldr.get_string(&store.variable(*r).name);
            Ok(PexValue::Identifier(name))
        }
        PapyrusIdentifier::Property(r) => {
            let property = store.property(*r);
            let property_name = bldr.get_string(&property.name);
            let self_name = bldr.get_string("self");
            let dest = bldr.alloc_temp(&property.property_type.type_string(store));
            bldr.set_location(location);
            bldr.emit(PexOpcode::PropGet {
                property: property_name,
                object: PexValue::Identifier(self_name),
                dest: dest.clone(),
            });
            Ok(dest)
        }
        // A resolution error was already reported; keep emitting.
        PapyrusIdentifier::Unresolved { .. } => Ok(PexValue::None),
        _ => Err(em
            .diags
            .logical_fatal("Unknown identifier while generating the pex opcodes!")),
    }
}
