//! Value types and the inference rules shared by every visitor handler.
//!
//! Scratch has two slot shapes (boolean and value) but ScratchScript source carries no type
//! annotations, so types are deduced from use: the first concrete use of an untyped value
//! decides its type and every later use must agree.

use crate::block::{Literal, Operand};
use crate::custom_block::CustomBlockBuilder;
use crate::target::TargetCompiler;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    Boolean,
    Number,
    String,
    Color,
    #[default]
    Unresolved,
    Void,
}

impl ValueType {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ValueType::Unresolved)
    }

    /// Initial value written into `project.json` for a variable of this type.
    pub fn default_value(&self) -> serde_json::Value {
        match self {
            ValueType::Number => serde_json::json!(0),
            ValueType::Boolean => serde_json::json!("false"),
            _ => serde_json::json!(""),
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Color => "color",
            ValueType::Unresolved => "unresolved",
            ValueType::Void => "void",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: ValueType,
    pub found: ValueType,
}

pub fn is_decimal(text: &str) -> bool {
    static DECIMAL: OnceLock<Regex> = OnceLock::new();
    DECIMAL
        .get_or_init(|| {
            Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)\s*$").expect("decimal pattern is valid")
        })
        .is_match(text)
}

pub fn literal_type(literal: &Literal) -> ValueType {
    match literal {
        Literal::Number(_) => ValueType::Number,
        Literal::Bool(_) => ValueType::Boolean,
        Literal::Color(_) => ValueType::Color,
        Literal::Text(text) if is_decimal(text) => ValueType::Number,
        Literal::Text(_) => ValueType::String,
    }
}

pub fn expected_type(
    target: &TargetCompiler,
    function: Option<&CustomBlockBuilder>,
    operand: &Operand,
) -> ValueType {
    match operand {
        Operand::Literal(literal) => literal_type(literal),
        Operand::Variable(variable) => target
            .variable(&variable.name)
            .map(|v| v.ty)
            .unwrap_or_default(),
        Operand::Call(call) => target
            .function(&call.function)
            .map(|f| f.return_type)
            .unwrap_or_default(),
        Operand::Block(id) => {
            let Some(block) = target.block(id) else {
                return ValueType::Unresolved;
            };
            match (&block.argument, function) {
                (Some(argument), Some(builder)) => {
                    builder.argument_type(argument).unwrap_or(block.inferred)
                }
                _ => block.inferred,
            }
        }
    }
}

/// Checks every operand against `ty`, adopting it wherever the operand is still unresolved.
/// Stops at the first operand that disagrees.
pub fn assert_type(
    target: &mut TargetCompiler,
    mut function: Option<&mut CustomBlockBuilder>,
    ty: ValueType,
    operands: &[Operand],
) -> Result<(), TypeMismatch> {
    for operand in operands {
        match operand {
            Operand::Literal(literal) => {
                let found = literal_type(literal);
                if found != ty {
                    return Err(TypeMismatch { expected: ty, found });
                }
            }
            Operand::Variable(variable) => {
                let found = target
                    .variable(&variable.name)
                    .map(|v| v.ty)
                    .unwrap_or_default();
                if found != ty {
                    return Err(TypeMismatch { expected: ty, found });
                }
            }
            Operand::Call(call) => {
                let Some(callee) = target.function_mut(&call.function) else {
                    continue;
                };
                if !callee.return_type.is_resolved() {
                    callee.return_type = ty;
                } else if callee.return_type != ty {
                    return Err(TypeMismatch {
                        expected: ty,
                        found: callee.return_type,
                    });
                }
            }
            Operand::Block(id) => {
                let argument = target.block(id).and_then(|b| b.argument.clone());
                if let (Some(argument), Some(builder)) = (argument, function.as_deref_mut()) {
                    if builder.has_argument(&argument) {
                        builder.resolve_argument(&argument, ty, target)?;
                        continue;
                    }
                }
                let Some(block) = target.block_mut(id) else {
                    continue;
                };
                if !block.inferred.is_resolved() {
                    block.inferred = ty;
                } else if block.inferred != ty {
                    return Err(TypeMismatch {
                        expected: ty,
                        found: block.inferred,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Adopts `ty` for unresolved operands only. Never reports.
pub fn hint_type(
    target: &mut TargetCompiler,
    mut function: Option<&mut CustomBlockBuilder>,
    ty: ValueType,
    operands: &[Operand],
) {
    if !ty.is_resolved() {
        return;
    }
    for operand in operands {
        if expected_type(target, function.as_deref(), operand).is_resolved() {
            continue;
        }
        let _ = assert_type(target, function.as_deref_mut(), ty, std::slice::from_ref(operand));
    }
}
