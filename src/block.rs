//! Block graph model and its `project.json` encoding.
//!
//! Inputs serialise to Scratch's compressed arrays:
//! `[1, [4, "1"]]` for a literal, `[2, id]` for a boolean or substack block,
//! `[3, id, [4, ""]]` for a reporter covering a default value and
//! `[3, [12, name, id], [10, ""]]` for a variable reporter.

use crate::types::ValueType;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowMode {
    NoShadow = 1,
    Shadow = 2,
    ObscuredShadow = 3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Number(String),
    Color(String),
    Text(String),
    Variable { name: String, id: String },
}

impl Payload {
    pub fn code(&self) -> u8 {
        match self {
            Payload::Number(_) => 4,
            Payload::Color(_) => 9,
            Payload::Text(_) => 10,
            Payload::Variable { .. } => 12,
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Number(value) | Payload::Color(value) | Payload::Text(value) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&self.code())?;
                seq.serialize_element(value)?;
                seq.end()
            }
            Payload::Variable { name, id } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&self.code())?;
                seq.serialize_element(name)?;
                seq.serialize_element(id)?;
                seq.end()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Number,
    Text,
    Boolean,
    Substack,
    /// Procedure plumbing: prototype → reporter, definition → prototype.
    Argument,
}

impl SlotKind {
    pub fn default_payload(&self) -> Option<Payload> {
        match self {
            SlotKind::Number => Some(Payload::Number(String::new())),
            SlotKind::Text => Some(Payload::Text(String::new())),
            SlotKind::Boolean | SlotKind::Substack | SlotKind::Argument => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Empty,
    Block(String),
    Literal(Payload),
}

impl From<Payload> for SlotValue {
    fn from(payload: Payload) -> Self {
        SlotValue::Literal(payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub mode: ShadowMode,
    pub value: SlotValue,
    pub shadow: Option<Payload>,
    pub kind: SlotKind,
}

impl Input {
    pub fn new(kind: SlotKind, value: SlotValue) -> Self {
        let (mode, shadow) = match (&value, kind) {
            (SlotValue::Empty, _) => (ShadowMode::NoShadow, None),
            (SlotValue::Literal(Payload::Variable { .. }), SlotKind::Boolean) => (ShadowMode::Shadow, None),
            (SlotValue::Literal(Payload::Variable { .. }), _) => (
                ShadowMode::ObscuredShadow,
                kind.default_payload().or(Some(Payload::Text(String::new()))),
            ),
            (SlotValue::Literal(_), _) => {
                debug_assert!(kind != SlotKind::Substack, "literal placed in a substack slot");
                (ShadowMode::NoShadow, None)
            }
            (SlotValue::Block(_), SlotKind::Boolean | SlotKind::Substack) => (ShadowMode::Shadow, None),
            (SlotValue::Block(_), SlotKind::Argument) => (ShadowMode::NoShadow, None),
            (SlotValue::Block(_), _) => (ShadowMode::ObscuredShadow, kind.default_payload()),
        };
        Self {
            mode,
            value,
            shadow,
            kind,
        }
    }

    pub fn empty(kind: SlotKind) -> Self {
        Self::new(kind, SlotValue::Empty)
    }

    pub fn is_filled(&self) -> bool {
        self.value != SlotValue::Empty
    }

    pub fn block_id(&self) -> Option<&str> {
        match &self.value {
            SlotValue::Block(id) => Some(id),
            _ => None,
        }
    }

    pub fn set(&mut self, value: SlotValue) {
        *self = Input::new(self.kind, value);
    }

    /// Empty boolean and substack slots are left out of `project.json` entirely.
    fn is_omitted(&self) -> bool {
        !self.is_filled() && self.kind.default_payload().is_none()
    }
}

impl Serialize for Input {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        seq.serialize_element(&(self.mode as u8))?;
        match &self.value {
            SlotValue::Empty => seq.serialize_element(&self.kind.default_payload())?,
            SlotValue::Literal(payload) => seq.serialize_element(payload)?,
            SlotValue::Block(id) => seq.serialize_element(id)?,
        }
        if let Some(shadow) = &self.shadow {
            seq.serialize_element(shadow)?;
        }
        seq.end()
    }
}

fn serialize_inputs<S: Serializer>(
    inputs: &IndexMap<String, Input>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(None)?;
    for (name, input) in inputs.iter().filter(|(_, input)| !input.is_omitted()) {
        map.serialize_entry(name, input)?;
    }
    map.end()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: String,
    pub id: Option<String>,
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.value)?;
        seq.serialize_element(&self.id)?;
        seq.end()
    }
}

fn serialize_flag<S: Serializer>(flag: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match flag {
        Some(value) => serializer.serialize_str(if *value { "true" } else { "false" }),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub tag_name: String,
    pub children: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proccode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argumentids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argumentnames: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argumentdefaults: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_flag")]
    pub warp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_flag")]
    pub hasnext: Option<bool>,
}

impl Default for Mutation {
    fn default() -> Self {
        Self {
            tag_name: "mutation".to_string(),
            children: Vec::new(),
            proccode: None,
            argumentids: None,
            argumentnames: None,
            argumentdefaults: None,
            warp: None,
            hasnext: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(skip)]
    pub id: String,
    pub opcode: String,
    pub next: Option<String>,
    pub parent: Option<String>,
    #[serde(serialize_with = "serialize_inputs")]
    pub inputs: IndexMap<String, Input>,
    pub fields: IndexMap<String, Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<Mutation>,
    pub shadow: bool,
    pub top_level: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip)]
    pub inferred: ValueType,
    /// Function argument this reporter stands for.
    #[serde(skip)]
    pub argument: Option<String>,
}

impl Block {
    pub fn new(id: impl Into<String>, opcode: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            opcode: opcode.into(),
            next: None,
            parent: None,
            inputs: IndexMap::new(),
            fields: IndexMap::new(),
            mutation: None,
            shadow: false,
            top_level: false,
            x: None,
            y: None,
            inferred: ValueType::Unresolved,
            argument: None,
        }
    }

    /// Index and name of the first unfilled input at or after `from`.
    pub fn first_unfilled_slot(&self, from: usize) -> Option<(usize, &str)> {
        self.inputs
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, (_, input))| !input.is_filled())
            .map(|(index, (name, _))| (index, name.as_str()))
    }

    pub fn child_ids(&self) -> Vec<String> {
        self.inputs
            .values()
            .filter_map(|input| input.block_id().map(str::to_string))
            .collect()
    }

    pub fn input_block(&self, slot: &str) -> Option<&str> {
        self.inputs.get(slot).and_then(Input::block_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub block_id: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub minimized: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
    Color(String),
}

impl Literal {
    pub fn payload(&self) -> Payload {
        match self {
            Literal::Number(value) => Payload::Number(format_num(*value)),
            Literal::Text(text) => Payload::Text(text.clone()),
            Literal::Bool(value) => Payload::Text(value.to_string()),
            Literal::Color(color) => Payload::Color(color.clone()),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Literal::Number(value) => *value == 0.0,
            Literal::Text(text) => text.trim().parse::<f64>().map(|v| v == 0.0).unwrap_or(false),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    pub name: String,
    pub id: String,
}

impl VariableRef {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            name: name.to_string(),
            id: id.to_string(),
        }
    }

    pub fn payload(&self) -> Payload {
        Payload::Variable {
            name: self.name.clone(),
            id: self.id.clone(),
        }
    }
}

/// Value of a user function call, read back from its return variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub function: String,
    pub variable: Option<VariableRef>,
}

/// What visiting an expression yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    Variable(VariableRef),
    Block(String),
    Call(CallResult),
}

impl Operand {
    pub fn slot_value(&self) -> SlotValue {
        match self {
            Operand::Literal(literal) => SlotValue::Literal(literal.payload()),
            Operand::Variable(variable) => SlotValue::Literal(variable.payload()),
            Operand::Block(id) => SlotValue::Block(id.clone()),
            Operand::Call(call) => call
                .variable
                .as_ref()
                .map(|v| SlotValue::Literal(v.payload()))
                .unwrap_or(SlotValue::Empty),
        }
    }
}

pub fn format_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_input_encoding() {
        let input = Input::new(SlotKind::Number, Literal::Number(1.0).payload().into());
        assert_eq!(serde_json::to_value(&input).unwrap(), json!([1, [4, "1"]]));
    }

    #[test]
    fn test_reporter_in_value_slot_keeps_obscured_default() {
        let input = Input::new(SlotKind::Number, SlotValue::Block("b1".into()));
        assert_eq!(serde_json::to_value(&input).unwrap(), json!([3, "b1", [4, ""]]));
    }

    #[test]
    fn test_boolean_block_encoding() {
        let input = Input::new(SlotKind::Boolean, SlotValue::Block("cond".into()));
        assert_eq!(serde_json::to_value(&input).unwrap(), json!([2, "cond"]));
    }

    #[test]
    fn test_variable_reporter_encoding() {
        let var = VariableRef::new("score", "var_1");
        let input = Input::new(SlotKind::Text, var.payload().into());
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!([3, [12, "score", "var_1"], [10, ""]])
        );
    }

    #[test]
    fn test_empty_slots() {
        assert_eq!(
            serde_json::to_value(Input::empty(SlotKind::Text)).unwrap(),
            json!([1, [10, ""]])
        );
        let mut block = Block::new("if", "control_if");
        block.inputs.insert("CONDITION".into(), Input::empty(SlotKind::Boolean));
        block.inputs.insert("SUBSTACK".into(), Input::empty(SlotKind::Substack));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["inputs"], json!({}));
    }

    #[test]
    fn test_block_skips_transient_fields() {
        let mut block = Block::new("b1", "operator_add");
        block.inferred = ValueType::Number;
        block.argument = Some("a".into());
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["opcode"], "operator_add");
        assert_eq!(value["topLevel"], false);
        assert!(value.get("inferred").is_none());
        assert!(value.get("argument").is_none());
        assert!(value.get("id").is_none());
        assert!(value.get("x").is_none());
    }

    #[test]
    fn test_mutation_flags_are_strings() {
        let mutation = Mutation {
            proccode: Some("f %s".into()),
            warp: Some(false),
            ..Mutation::default()
        };
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["tagName"], "mutation");
        assert_eq!(value["warp"], "false");
        assert!(value.get("argumentnames").is_none());
    }

    #[test]
    fn test_first_unfilled_slot_skips_filled() {
        let mut block = Block::new("b", "operator_add");
        block.inputs.insert(
            "NUM1".into(),
            Input::new(SlotKind::Number, Literal::Number(2.0).payload().into()),
        );
        block.inputs.insert("NUM2".into(), Input::empty(SlotKind::Number));
        assert_eq!(block.first_unfilled_slot(0), Some((1, "NUM2")));
        assert_eq!(block.first_unfilled_slot(2), None);
    }

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(3.0), "3");
        assert_eq!(format_num(-0.5), "-0.5");
        assert_eq!(format_num(1.25), "1.25");
        assert_eq!(format_num(-0.0), "0");
        assert_eq!(format_num(1e20), "100000000000000000000");
        assert_eq!(format_num(0.0000001), "0.0000001");
    }
}
