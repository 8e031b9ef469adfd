use crate::block::{Block, Field, Input, Mutation, Operand, SlotKind, SlotValue};
use crate::types::ValueType;

/// Per-target id source. Ids look like `block_12`.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    counter: usize,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{}_{}", prefix, self.counter)
    }

    pub fn next_block(&mut self) -> String {
        self.next("block")
    }
}

#[derive(Debug, Clone)]
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    pub fn new(id: impl Into<String>, opcode: impl Into<String>) -> Self {
        Self {
            block: Block::new(id, opcode),
        }
    }

    /// Copy-with-modification starting point.
    pub fn from_block(block: &Block) -> Self {
        Self {
            block: block.clone(),
        }
    }

    pub fn opcode(mut self, opcode: impl Into<String>) -> Self {
        self.block.opcode = opcode.into();
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.block.id = id.into();
        self
    }

    pub fn parent(mut self, parent: Option<String>) -> Self {
        self.block.parent = parent;
        self
    }

    pub fn position(mut self, x: i32, y: i32) -> Self {
        self.block.x = Some(x);
        self.block.y = Some(y);
        self
    }

    pub fn shadow(mut self, shadow: bool) -> Self {
        self.block.shadow = shadow;
        self
    }

    pub fn top_level(mut self, top_level: bool) -> Self {
        self.block.top_level = top_level;
        self
    }

    pub fn mutation(mut self, mutation: Mutation) -> Self {
        self.block.mutation = Some(mutation);
        self
    }

    pub fn inferred(mut self, ty: ValueType) -> Self {
        self.block.inferred = ty;
        self
    }

    pub fn argument(mut self, name: impl Into<String>) -> Self {
        self.block.argument = Some(name.into());
        self
    }

    pub fn with_input(mut self, input: InputBuilder) -> Self {
        let (name, input) = input.build();
        self.block.inputs.insert(name, input);
        self
    }

    pub fn with_field(mut self, field: FieldBuilder) -> Self {
        let (name, field) = field.build();
        self.block.fields.insert(name, field);
        self
    }

    pub fn build(self) -> Block {
        self.block
    }
}

#[derive(Debug, Clone)]
pub struct InputBuilder {
    name: String,
    kind: SlotKind,
    value: SlotValue,
}

impl InputBuilder {
    pub fn new(name: impl Into<String>, kind: SlotKind) -> Self {
        Self {
            name: name.into(),
            kind,
            value: SlotValue::Empty,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Number)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Boolean)
    }

    pub fn substack(name: impl Into<String>) -> Self {
        Self::new(name, SlotKind::Substack)
    }

    /// Leaves the slot empty for `None`, to be filled later through an attachment scope.
    pub fn with_operand(mut self, operand: Option<&Operand>) -> Self {
        self.value = operand.map(Operand::slot_value).unwrap_or(SlotValue::Empty);
        self
    }

    pub fn with_block(mut self, id: impl Into<String>) -> Self {
        self.value = SlotValue::Block(id.into());
        self
    }

    pub fn build(self) -> (String, Input) {
        (self.name, Input::new(self.kind, self.value))
    }
}

#[derive(Debug, Clone)]
pub struct FieldBuilder {
    name: String,
    value: String,
    id: Option<String>,
}

impl FieldBuilder {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn build(self) -> (String, Field) {
        (
            self.name,
            Field {
                value: self.value,
                id: self.id,
            },
        )
    }
}
