use crate::attach::{AttachInfo, AttachmentStack, Placement};
use crate::block::{Block, Comment, Input, Operand, SlotKind, SlotValue, VariableRef};
use crate::builder::{BlockBuilder, IdGenerator};
use crate::custom_block::CustomBlock;
use crate::primitives;
use crate::types::ValueType;
use indexmap::IndexMap;

const SCRIPT_SPACING: i32 = 320;
const COMMENT_WIDTH: u32 = 200;
const COMMENT_HEIGHT: u32 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct ScratchVariable {
    pub name: String,
    pub id: String,
    pub ty: ValueType,
    /// Set once the declaring statement has settled the type.
    pub built: bool,
}

impl ScratchVariable {
    pub fn reference(&self) -> VariableRef {
        VariableRef::new(&self.name, &self.id)
    }
}

/// One sprite or the stage: its block graph plus the tables the visitor consults.
#[derive(Debug)]
pub struct TargetCompiler {
    pub name: String,
    pub is_stage: bool,
    pub layer_order: i32,
    blocks: IndexMap<String, Block>,
    comments: IndexMap<String, Comment>,
    variables: IndexMap<String, ScratchVariable>,
    functions: IndexMap<String, CustomBlock>,
    attachments: AttachmentStack,
    ids: IdGenerator,
    entry: Option<String>,
    scripts: i32,
}

impl TargetCompiler {
    pub fn new(name: &str, is_stage: bool, layer_order: i32) -> Self {
        Self {
            name: name.to_string(),
            is_stage,
            layer_order,
            blocks: IndexMap::new(),
            comments: IndexMap::new(),
            variables: IndexMap::new(),
            functions: IndexMap::new(),
            attachments: AttachmentStack::new(),
            ids: IdGenerator::new(),
            entry: None,
            scripts: 0,
        }
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    pub fn blocks(&self) -> &IndexMap<String, Block> {
        &self.blocks
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn comments(&self) -> &IndexMap<String, Comment> {
        &self.comments
    }

    pub fn variables(&self) -> &IndexMap<String, ScratchVariable> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&ScratchVariable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut ScratchVariable> {
        self.variables.get_mut(name)
    }

    pub fn functions(&self) -> &IndexMap<String, CustomBlock> {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&CustomBlock> {
        self.functions.get(name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut CustomBlock> {
        self.functions.get_mut(name)
    }

    pub fn add_function(&mut self, function: CustomBlock) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// True once anything besides the green-flag hat exists.
    pub fn has_content(&self) -> bool {
        !self.variables.is_empty()
            || self
                .blocks
                .keys()
                .any(|id| Some(id.as_str()) != self.entry.as_deref())
    }

    /// Creates a variable once; later calls with the same name return the existing one.
    pub fn create_variable(&mut self, name: &str, ty: ValueType) -> VariableRef {
        if let Some(existing) = self.variables.get(name) {
            return existing.reference();
        }
        let id = format!("{}_{}", self.name, self.ids.next("var"));
        let variable = ScratchVariable {
            name: name.to_string(),
            id,
            ty,
            built: false,
        };
        let reference = variable.reference();
        self.variables.insert(name.to_string(), variable);
        reference
    }

    pub fn add_comment(&mut self, text: &str) -> String {
        let id = self.ids.next("comment");
        let y = self.comments.len() as i32 * (COMMENT_HEIGHT as i32 + 20);
        self.comments.insert(
            id.clone(),
            Comment {
                block_id: None,
                x: -(COMMENT_WIDTH as i32) - 40,
                y,
                width: COMMENT_WIDTH,
                height: COMMENT_HEIGHT,
                minimized: false,
                text: text.to_string(),
            },
        );
        id
    }

    /// Canvas position for the next top-level script.
    pub fn next_script_position(&mut self) -> (i32, i32) {
        let position = (0, 30 + self.scripts * SCRIPT_SPACING);
        self.scripts += 1;
        position
    }

    pub fn enter_attachment_scope(&mut self, info: AttachInfo) {
        self.attachments.enter(info);
    }

    pub fn exit_attachment_scope(&mut self) -> Option<AttachInfo> {
        self.attachments.exit()
    }

    pub fn current_statement(&self) -> Option<String> {
        self.attachments.current_statement().map(str::to_string)
    }

    /// Adds the green-flag hat the first time a top-level statement needs a script.
    pub fn ensure_entry_point(&mut self) {
        if self.entry.is_some() {
            return;
        }
        let hat = primitives::when_flag_clicked(&mut self.ids);
        let id = self.add_block(hat);
        self.attachments.enter(AttachInfo::next(Some(&id)));
        self.entry = Some(id);
    }

    /// Places `block` through the innermost attachment scope, then upserts it.
    pub fn add_block(&mut self, mut block: Block) -> String {
        let id = block.id.clone();
        match self.attachments.resolve(&id, &self.blocks) {
            Placement::TopLevel => {
                block.parent = None;
                block.top_level = true;
                let (x, y) = self.next_script_position();
                block.x = Some(x);
                block.y = Some(y);
            }
            Placement::Head => {
                block.parent = None;
                block.top_level = false;
            }
            Placement::Next { previous } => {
                if let Some(previous_block) = self.blocks.get_mut(&previous) {
                    previous_block.next = Some(id.clone());
                }
                block.parent = Some(previous);
            }
            Placement::Input { parent, slot } => {
                self.fill_slot(&parent, &slot, SlotValue::Block(id.clone()));
                block.parent = Some(parent);
            }
            Placement::Detached => {}
        }
        self.register(block)
    }

    /// Upserts without attachment. Blocks referenced from the inputs are reparented.
    pub fn register(&mut self, mut block: Block) -> String {
        if block.parent.is_some() {
            block.top_level = false;
        }
        let id = block.id.clone();
        for child in block.child_ids() {
            if let Some(child) = self.blocks.get_mut(&child) {
                child.parent = Some(id.clone());
                child.top_level = false;
            }
        }
        self.blocks.insert(id.clone(), block);
        id
    }

    /// Fills the innermost input scope's next slot with a non-block value. An empty value
    /// still claims its slot so later operands keep their positions.
    pub fn try_assign(&mut self, operand: &Operand) {
        if matches!(operand, Operand::Block(_)) {
            return;
        }
        let value = operand.slot_value();
        if let Some((parent, slot)) = self.attachments.resolve_value(&self.blocks) {
            if value != SlotValue::Empty {
                self.fill_slot(&parent, &slot, value);
            }
        }
    }

    pub fn fill_slot(&mut self, block_id: &str, slot: &str, value: SlotValue) {
        if let Some(input) = self
            .blocks
            .get_mut(block_id)
            .and_then(|block| block.inputs.get_mut(slot))
        {
            input.set(value);
        }
    }

    pub fn set_next(&mut self, block_id: &str, next: Option<String>) {
        if let Some(block) = self.blocks.get_mut(block_id) {
            block.next = next;
        }
    }

    /// Wires `head` as the body chain of `block_id`'s substack `slot`.
    pub fn set_substack(&mut self, block_id: &str, slot: &str, head: &str) {
        let Some(block) = self.blocks.get_mut(block_id) else {
            return;
        };
        match block.inputs.get_mut(slot) {
            Some(input) => input.set(SlotValue::Block(head.to_string())),
            None => {
                block.inputs.insert(
                    slot.to_string(),
                    Input::new(SlotKind::Substack, SlotValue::Block(head.to_string())),
                );
            }
        }
        if let Some(head) = self.blocks.get_mut(head) {
            head.parent = Some(block_id.to_string());
            head.top_level = false;
        }
    }

    /// Splices `block_id` into the chain directly in front of `statement`.
    pub fn insert_before(&mut self, statement: &str, block_id: &str) {
        let Some(stmt) = self.blocks.get(statement) else {
            return;
        };
        let parent = stmt.parent.clone();
        let (top_level, x, y) = (stmt.top_level, stmt.x, stmt.y);

        match parent.as_deref().and_then(|p| self.blocks.get(p)) {
            Some(parent_block) if parent_block.next.as_deref() == Some(statement) => {
                let parent_id = parent_block.id.clone();
                self.set_next(&parent_id, Some(block_id.to_string()));
            }
            Some(parent_block) => {
                let parent_id = parent_block.id.clone();
                let slot = parent_block
                    .inputs
                    .iter()
                    .find(|(_, input)| input.block_id() == Some(statement))
                    .map(|(name, _)| name.clone());
                if let Some(slot) = slot {
                    self.fill_slot(&parent_id, &slot, SlotValue::Block(block_id.to_string()));
                }
            }
            None => {
                for scope in self.attachments.scopes_mut() {
                    if scope.head.as_deref() == Some(statement) {
                        scope.head = Some(block_id.to_string());
                    }
                }
            }
        }

        if let Some(block) = self.blocks.get_mut(block_id) {
            block.parent = parent;
            block.next = Some(statement.to_string());
            block.top_level = top_level;
            block.x = x;
            block.y = y;
        }
        if let Some(stmt) = self.blocks.get_mut(statement) {
            stmt.parent = Some(block_id.to_string());
            stmt.top_level = false;
            stmt.x = None;
            stmt.y = None;
        }
    }

    /// Deep-copies the reporter subtree rooted at `root` with fresh ids under `parent`.
    /// Returns the new ids, root first.
    pub fn duplicate_subtree(&mut self, root: &str, parent: &str) -> Vec<String> {
        let mut created = Vec::new();
        self.duplicate_into(root, parent, &mut created);
        created
    }

    fn duplicate_into(&mut self, source: &str, parent: &str, created: &mut Vec<String>) -> Option<String> {
        let original = self.blocks.get(source)?.clone();
        let id = self.ids.next_block();
        let mut copy = BlockBuilder::from_block(&original)
            .id(&id)
            .parent(Some(parent.to_string()))
            .top_level(false)
            .build();
        copy.next = None;
        created.push(id.clone());
        for (slot, input) in original.inputs.iter() {
            let Some(child) = input.block_id() else {
                continue;
            };
            if let Some(child_copy) = self.duplicate_into(child, &id, created) {
                if let Some(input) = copy.inputs.get_mut(slot) {
                    input.set(SlotValue::Block(child_copy));
                }
            }
        }
        self.blocks.insert(id.clone(), copy);
        Some(id)
    }
}
