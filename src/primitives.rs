//! Pure factories for the opcodes the compiler emits. Operands left as `None` are
//! filled later through the target's attachment scopes.

use crate::block::{Block, Mutation, Operand, SlotKind, VariableRef};
use crate::builder::{BlockBuilder, FieldBuilder, IdGenerator, InputBuilder};
use crate::types::ValueType;

fn binary(
    ids: &mut IdGenerator,
    opcode: &str,
    slots: [&str; 2],
    kind: SlotKind,
    result: ValueType,
    first: Option<&Operand>,
    second: Option<&Operand>,
) -> Block {
    BlockBuilder::new(ids.next_block(), opcode)
        .with_input(InputBuilder::new(slots[0], kind).with_operand(first))
        .with_input(InputBuilder::new(slots[1], kind).with_operand(second))
        .inferred(result)
        .build()
}

fn arithmetic(ids: &mut IdGenerator, opcode: &str, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    binary(ids, opcode, ["NUM1", "NUM2"], SlotKind::Number, ValueType::Number, a, b)
}

fn comparison(ids: &mut IdGenerator, opcode: &str, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    binary(ids, opcode, ["OPERAND1", "OPERAND2"], SlotKind::Text, ValueType::Boolean, a, b)
}

fn logical(ids: &mut IdGenerator, opcode: &str, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    binary(ids, opcode, ["OPERAND1", "OPERAND2"], SlotKind::Boolean, ValueType::Boolean, a, b)
}

pub fn add(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    arithmetic(ids, "operator_add", a, b)
}

pub fn subtract(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    arithmetic(ids, "operator_subtract", a, b)
}

pub fn multiply(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    arithmetic(ids, "operator_multiply", a, b)
}

pub fn divide(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    arithmetic(ids, "operator_divide", a, b)
}

pub fn modulo(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    arithmetic(ids, "operator_mod", a, b)
}

pub fn less_than(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    comparison(ids, "operator_lt", a, b)
}

pub fn greater_than(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    comparison(ids, "operator_gt", a, b)
}

pub fn equals(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    comparison(ids, "operator_equals", a, b)
}

pub fn and(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    logical(ids, "operator_and", a, b)
}

pub fn or(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    logical(ids, "operator_or", a, b)
}

pub fn not(ids: &mut IdGenerator, operand: Option<&Operand>) -> Block {
    BlockBuilder::new(ids.next_block(), "operator_not")
        .with_input(InputBuilder::boolean("OPERAND").with_operand(operand))
        .inferred(ValueType::Boolean)
        .build()
}

pub fn join(ids: &mut IdGenerator, a: Option<&Operand>, b: Option<&Operand>) -> Block {
    binary(ids, "operator_join", ["STRING1", "STRING2"], SlotKind::Text, ValueType::String, a, b)
}

pub fn control_if(ids: &mut IdGenerator, condition: Option<&Operand>) -> Block {
    BlockBuilder::new(ids.next_block(), "control_if")
        .with_input(InputBuilder::boolean("CONDITION").with_operand(condition))
        .with_input(InputBuilder::substack("SUBSTACK"))
        .inferred(ValueType::Void)
        .build()
}

pub fn control_if_else(ids: &mut IdGenerator, condition: Option<&Operand>) -> Block {
    BlockBuilder::new(ids.next_block(), "control_if_else")
        .with_input(InputBuilder::boolean("CONDITION").with_operand(condition))
        .with_input(InputBuilder::substack("SUBSTACK"))
        .with_input(InputBuilder::substack("SUBSTACK2"))
        .inferred(ValueType::Void)
        .build()
}

/// `option` is one of Scratch's menu values, e.g. `"this script"`.
pub fn stop(ids: &mut IdGenerator, option: &str) -> Block {
    BlockBuilder::new(ids.next_block(), "control_stop")
        .with_field(FieldBuilder::new("STOP_OPTION", option))
        .mutation(Mutation {
            hasnext: Some(false),
            ..Mutation::default()
        })
        .inferred(ValueType::Void)
        .build()
}

pub fn set_variable_to(ids: &mut IdGenerator, variable: &VariableRef, value: Option<&Operand>) -> Block {
    BlockBuilder::new(ids.next_block(), "data_setvariableto")
        .with_input(InputBuilder::text("VALUE").with_operand(value))
        .with_field(FieldBuilder::new("VARIABLE", &variable.name).with_id(&variable.id))
        .inferred(ValueType::Void)
        .build()
}

pub fn when_flag_clicked(ids: &mut IdGenerator) -> Block {
    BlockBuilder::new(ids.next_block(), "event_whenflagclicked")
        .top_level(true)
        .inferred(ValueType::Void)
        .build()
}

pub fn argument_reporter_opcode(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Boolean => "argument_reporter_boolean",
        _ => "argument_reporter_string_number",
    }
}

/// Reporter for a procedure argument, either the prototype's shadow or an in-body use.
pub fn argument_reporter(ids: &mut IdGenerator, name: &str, ty: ValueType, shadow: bool) -> Block {
    BlockBuilder::new(ids.next_block(), argument_reporter_opcode(ty))
        .with_field(FieldBuilder::new("VALUE", name))
        .shadow(shadow)
        .argument(name)
        .inferred(ty)
        .build()
}
