//! Procedures: `procedures_definition` → `procedures_prototype` → one shadow reporter per
//! argument, plus `procedures_call` blocks for call sites.
//!
//! Argument types start unresolved and are settled by their first typed use inside the body.
//! Every in-body reporter of an argument is tracked so its opcode can follow that decision.

use crate::block::{Block, Mutation, SlotKind, VariableRef};
use crate::builder::{BlockBuilder, IdGenerator, InputBuilder};
use crate::primitives;
use crate::target::TargetCompiler;
use crate::types::{TypeMismatch, ValueType};
use indexmap::IndexMap;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSlot {
    pub id: String,
    pub ty: ValueType,
    reporters: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CustomBlockBuilder {
    name: String,
    definition_id: String,
    prototype_id: String,
    arguments: IndexMap<String, ArgumentSlot>,
    return_type: ValueType,
    return_variable: Option<VariableRef>,
    warp: bool,
}

impl CustomBlockBuilder {
    pub fn new(name: &str, ids: &mut IdGenerator) -> Self {
        Self {
            name: name.to_string(),
            definition_id: ids.next_block(),
            prototype_id: ids.next_block(),
            arguments: IndexMap::new(),
            return_type: ValueType::Unresolved,
            return_variable: None,
            warp: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns false when the name is already taken.
    pub fn add_argument(&mut self, name: &str, ids: &mut IdGenerator) -> bool {
        if self.arguments.contains_key(name) {
            return false;
        }
        self.arguments.insert(
            name.to_string(),
            ArgumentSlot {
                id: ids.next("argument"),
                ty: ValueType::Unresolved,
                reporters: Vec::new(),
            },
        );
        true
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    pub fn argument_type(&self, name: &str) -> Option<ValueType> {
        self.arguments.get(name).map(|arg| arg.ty)
    }

    pub fn unresolved_arguments(&self) -> Vec<String> {
        self.arguments
            .iter()
            .filter(|(_, arg)| !arg.ty.is_resolved())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// In-body reporter for `name`, shaped after the argument's current type.
    pub fn reporter(&self, name: &str, ids: &mut IdGenerator) -> Option<Block> {
        let ty = self.argument_type(name)?;
        Some(primitives::argument_reporter(ids, name, ty, false))
    }

    pub fn track_reporter(&mut self, name: &str, block_id: &str) {
        if let Some(arg) = self.arguments.get_mut(name) {
            arg.reporters.push(block_id.to_string());
        }
    }

    /// `Unresolved → ty` happens at most once; confirming the same type again is a no-op.
    pub fn resolve_argument(
        &mut self,
        name: &str,
        ty: ValueType,
        target: &mut TargetCompiler,
    ) -> Result<(), TypeMismatch> {
        debug_assert!(ty.is_resolved(), "arguments resolve to a concrete type");
        let Some(arg) = self.arguments.get_mut(name) else {
            return Ok(());
        };
        if arg.ty == ty {
            return Ok(());
        }
        if arg.ty.is_resolved() {
            return Err(TypeMismatch {
                expected: ty,
                found: arg.ty,
            });
        }
        arg.ty = ty;
        log::debug!("argument '{}' of '{}' resolved to {}", name, self.name, ty);
        for reporter in &arg.reporters {
            if let Some(block) = target.block_mut(reporter) {
                block.opcode = primitives::argument_reporter_opcode(ty).to_string();
                block.inferred = ty;
            }
        }
        Ok(())
    }

    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    pub fn set_return_type(&mut self, ty: ValueType) {
        self.return_type = ty;
    }

    pub fn return_variable(&self) -> Option<&VariableRef> {
        self.return_variable.as_ref()
    }

    pub fn set_return_variable(&mut self, variable: VariableRef) {
        self.return_variable = Some(variable);
    }

    fn proccode(&self) -> String {
        let mut proccode = self.name.clone();
        for arg in self.arguments.values() {
            proccode.push_str(if arg.ty == ValueType::Boolean { " %b" } else { " %s" });
        }
        proccode
    }

    fn mutation(&self) -> Mutation {
        let ids: Vec<&str> = self.arguments.values().map(|a| a.id.as_str()).collect();
        let names: Vec<&str> = self.arguments.keys().map(String::as_str).collect();
        let defaults: Vec<&str> = self
            .arguments
            .values()
            .map(|a| if a.ty == ValueType::Boolean { "false" } else { "" })
            .collect();
        Mutation {
            proccode: Some(self.proccode()),
            argumentids: Some(json!(ids).to_string()),
            argumentnames: Some(json!(names).to_string()),
            argumentdefaults: Some(json!(defaults).to_string()),
            warp: Some(self.warp),
            ..Mutation::default()
        }
    }

    /// Registers the definition, prototype and prototype reporters on `target` and links
    /// `body` as the definition's script.
    pub fn build(self, target: &mut TargetCompiler, body: Option<&str>) -> CustomBlock {
        let mutation = self.mutation();

        let mut prototype = BlockBuilder::new(&self.prototype_id, "procedures_prototype")
            .parent(Some(self.definition_id.clone()))
            .shadow(true)
            .mutation(mutation.clone());
        let mut reporters = Vec::new();
        for (name, arg) in &self.arguments {
            let mut reporter = primitives::argument_reporter(target.ids_mut(), name, arg.ty, true);
            reporter.parent = Some(self.prototype_id.clone());
            let reporter_id = target.register(reporter);
            prototype = prototype.with_input(InputBuilder::new(&arg.id, SlotKind::Argument).with_block(&reporter_id));
            reporters.push(reporter_id);
        }
        let prototype = target.register(prototype.build());

        let (x, y) = target.next_script_position();
        let mut definition = BlockBuilder::new(&self.definition_id, "procedures_definition")
            .top_level(true)
            .position(x, y)
            .with_input(InputBuilder::new("custom_block", SlotKind::Argument).with_block(&prototype))
            .inferred(ValueType::Void)
            .build();
        definition.next = body.map(str::to_string);
        let definition = target.register(definition);
        if let Some(head) = body.and_then(|id| target.block_mut(id)) {
            head.parent = Some(definition.clone());
            head.top_level = false;
        }

        let return_type = if self.return_type.is_resolved() {
            self.return_type
        } else {
            ValueType::Void
        };
        CustomBlock {
            name: self.name,
            mutation,
            arguments: self
                .arguments
                .into_iter()
                .map(|(name, arg)| (name, (arg.id, arg.ty)))
                .collect(),
            prototype,
            definition,
            reporters,
            return_type,
            return_variable: self.return_variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomBlock {
    pub name: String,
    pub mutation: Mutation,
    /// Argument name → (argument id, type), in declaration order.
    pub arguments: IndexMap<String, (String, ValueType)>,
    pub prototype: String,
    pub definition: String,
    pub reporters: Vec<String>,
    pub return_type: ValueType,
    pub return_variable: Option<VariableRef>,
}

impl CustomBlock {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_variable_name(function: &str, target: &str) -> String {
        format!("{}_{}_ReturnValue", function, target)
    }

    pub fn call_block(&self, ids: &mut IdGenerator) -> Block {
        let mut builder = BlockBuilder::new(ids.next_block(), "procedures_call")
            .mutation(Mutation {
                proccode: self.mutation.proccode.clone(),
                argumentids: self.mutation.argumentids.clone(),
                warp: self.mutation.warp,
                ..Mutation::default()
            })
            .inferred(self.return_type);
        for (id, ty) in self.arguments.values() {
            let kind = if *ty == ValueType::Boolean {
                SlotKind::Boolean
            } else {
                SlotKind::Text
            };
            builder = builder.with_input(InputBuilder::new(id, kind));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetCompiler {
        TargetCompiler::new("Sprite1", false, 1)
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let mut t = target();
        let mut builder = CustomBlockBuilder::new("f", t.ids_mut());
        assert!(builder.add_argument("a", t.ids_mut()));
        assert!(!builder.add_argument("a", t.ids_mut()));
    }

    #[test]
    fn test_signature_encoding() {
        let mut t = target();
        let mut builder = CustomBlockBuilder::new("move", t.ids_mut());
        builder.add_argument("steps", t.ids_mut());
        builder.add_argument("fast", t.ids_mut());
        builder.resolve_argument("steps", ValueType::Number, &mut t).unwrap();
        builder.resolve_argument("fast", ValueType::Boolean, &mut t).unwrap();
        let function = builder.build(&mut t, None);

        let mutation = &function.mutation;
        assert_eq!(mutation.proccode.as_deref(), Some("move %s %b"));
        let (steps_id, _) = &function.arguments["steps"];
        let (fast_id, _) = &function.arguments["fast"];
        assert_eq!(
            mutation.argumentids.clone().unwrap(),
            format!("[\"{}\",\"{}\"]", steps_id, fast_id)
        );
        assert_eq!(mutation.argumentnames.as_deref(), Some("[\"steps\",\"fast\"]"));
        assert_eq!(mutation.argumentdefaults.as_deref(), Some("[\"\",\"false\"]"));
        assert_eq!(function.return_type, ValueType::Void);
    }

    #[test]
    fn test_build_registers_prototype_chain() {
        let mut t = target();
        let mut builder = CustomBlockBuilder::new("f", t.ids_mut());
        builder.add_argument("a", t.ids_mut());
        builder.resolve_argument("a", ValueType::Boolean, &mut t).unwrap();
        let function = builder.build(&mut t, None);

        let definition = t.block(&function.definition).unwrap();
        assert!(definition.top_level);
        assert_eq!(definition.input_block("custom_block"), Some(function.prototype.as_str()));

        let prototype = t.block(&function.prototype).unwrap();
        assert!(prototype.shadow);
        assert_eq!(prototype.parent.as_deref(), Some(function.definition.as_str()));
        let (arg_id, _) = &function.arguments["a"];
        let reporter_id = prototype.input_block(arg_id).unwrap();
        let reporter = t.block(reporter_id).unwrap();
        assert_eq!(reporter.opcode, "argument_reporter_boolean");
        assert!(reporter.shadow);
        assert_eq!(
            serde_json::to_value(&prototype.inputs[arg_id.as_str()]).unwrap(),
            json!([1, reporter_id])
        );
    }

    #[test]
    fn test_resolve_patches_tracked_reporters_once() {
        let mut t = target();
        let mut builder = CustomBlockBuilder::new("f", t.ids_mut());
        builder.add_argument("a", t.ids_mut());
        let first = builder.reporter("a", t.ids_mut()).unwrap();
        let first = t.register(first);
        builder.track_reporter("a", &first);
        let second = builder.reporter("a", t.ids_mut()).unwrap();
        let second = t.register(second);
        builder.track_reporter("a", &second);

        builder.resolve_argument("a", ValueType::Boolean, &mut t).unwrap();
        assert!(builder.resolve_argument("a", ValueType::Boolean, &mut t).is_ok());
        for id in [&first, &second] {
            assert_eq!(t.block(id).unwrap().opcode, "argument_reporter_boolean");
        }
        let err = builder.resolve_argument("a", ValueType::String, &mut t).unwrap_err();
        assert_eq!(err.found, ValueType::Boolean);
    }

    #[test]
    fn test_call_block_slots_follow_argument_types() {
        let mut t = target();
        let mut builder = CustomBlockBuilder::new("f", t.ids_mut());
        builder.add_argument("a", t.ids_mut());
        builder.add_argument("b", t.ids_mut());
        builder.resolve_argument("a", ValueType::Boolean, &mut t).unwrap();
        builder.resolve_argument("b", ValueType::String, &mut t).unwrap();
        let function = builder.build(&mut t, None);
        let call = function.call_block(t.ids_mut());

        assert_eq!(call.opcode, "procedures_call");
        let kinds: Vec<SlotKind> = call.inputs.values().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![SlotKind::Boolean, SlotKind::Text]);
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["mutation"]["proccode"], "f %b %s");
        assert!(value["mutation"].get("argumentnames").is_none());
    }

    #[test]
    fn test_return_variable_name() {
        assert_eq!(
            CustomBlock::return_variable_name("f", "Sprite1"),
            "f_Sprite1_ReturnValue"
        );
    }
}
