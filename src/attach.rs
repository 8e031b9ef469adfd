//! Cursor stack deciding where the next generated block attaches.
//!
//! A sequencing scope chains statements through `next`; an input scope fills the anchor's
//! unfilled input slots in declaration order. With no scope active a block is a new
//! top-level script.

use crate::block::Block;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachInfo {
    pub anchor: Option<String>,
    pub child_is_next: bool,
    pub input_index: usize,
    /// First block chained through a sequencing scope.
    pub head: Option<String>,
}

impl AttachInfo {
    pub fn next(anchor: Option<&str>) -> Self {
        Self {
            anchor: anchor.map(str::to_string),
            child_is_next: true,
            input_index: 0,
            head: None,
        }
    }

    pub fn input(anchor: &str) -> Self {
        Self {
            anchor: Some(anchor.to_string()),
            child_is_next: false,
            input_index: 0,
            head: None,
        }
    }

    pub fn starting_at(mut self, index: usize) -> Self {
        self.input_index = index;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    TopLevel,
    /// First block of an anchorless sequencing scope; the caller wires it up.
    Head,
    Next { previous: String },
    Input { parent: String, slot: String },
    /// Input scope with every slot already filled.
    Detached,
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentStack {
    scopes: Vec<AttachInfo>,
}

impl AttachmentStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, info: AttachInfo) {
        self.scopes.push(info);
    }

    pub fn exit(&mut self) -> Option<AttachInfo> {
        self.scopes.pop()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn scopes_mut(&mut self) -> impl Iterator<Item = &mut AttachInfo> {
        self.scopes.iter_mut()
    }

    /// Anchor of the innermost sequencing scope: the statement being generated.
    pub fn current_statement(&self) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.child_is_next)
            .and_then(|scope| scope.anchor.as_deref())
    }

    pub fn resolve(&mut self, block_id: &str, blocks: &IndexMap<String, Block>) -> Placement {
        let Some(scope) = self.scopes.last_mut() else {
            return Placement::TopLevel;
        };
        if scope.child_is_next {
            let previous = scope.anchor.replace(block_id.to_string());
            if scope.head.is_none() {
                scope.head = Some(block_id.to_string());
            }
            return match previous {
                Some(previous) => Placement::Next { previous },
                None => Placement::Head,
            };
        }
        match Self::claim_slot(scope, blocks) {
            Some((parent, slot)) => Placement::Input { parent, slot },
            None => Placement::Detached,
        }
    }

    /// Slot for a non-block value, if the innermost scope is an input scope with room left.
    pub fn resolve_value(&mut self, blocks: &IndexMap<String, Block>) -> Option<(String, String)> {
        let scope = self.scopes.last_mut()?;
        if scope.child_is_next {
            return None;
        }
        Self::claim_slot(scope, blocks)
    }

    fn claim_slot(scope: &mut AttachInfo, blocks: &IndexMap<String, Block>) -> Option<(String, String)> {
        let anchor = scope.anchor.as_deref()?;
        let block = blocks.get(anchor)?;
        let (index, slot) = block.first_unfilled_slot(scope.input_index)?;
        scope.input_index = index + 1;
        Some((anchor.to_string(), slot.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IdGenerator;
    use crate::primitives;

    fn store(blocks: Vec<Block>) -> IndexMap<String, Block> {
        blocks.into_iter().map(|b| (b.id.clone(), b)).collect()
    }

    #[test]
    fn test_no_scope_is_top_level() {
        let mut stack = AttachmentStack::new();
        assert_eq!(stack.resolve("b", &IndexMap::new()), Placement::TopLevel);
    }

    #[test]
    fn test_sequencing_scope_advances_anchor() {
        let mut stack = AttachmentStack::new();
        stack.enter(AttachInfo::next(Some("hat")));
        let blocks = IndexMap::new();
        assert_eq!(
            stack.resolve("a", &blocks),
            Placement::Next {
                previous: "hat".into()
            }
        );
        assert_eq!(
            stack.resolve("b", &blocks),
            Placement::Next {
                previous: "a".into()
            }
        );
        assert_eq!(stack.current_statement(), Some("b"));
        let info = stack.exit().unwrap();
        assert_eq!(info.head.as_deref(), Some("a"));
        assert_eq!(info.anchor.as_deref(), Some("b"));
    }

    #[test]
    fn test_anchorless_scope_records_head() {
        let mut stack = AttachmentStack::new();
        stack.enter(AttachInfo::next(None));
        assert_eq!(stack.current_statement(), None);
        assert_eq!(stack.resolve("first", &IndexMap::new()), Placement::Head);
        assert_eq!(stack.current_statement(), Some("first"));
    }

    #[test]
    fn test_input_scope_fills_slots_in_order_then_detaches() {
        let mut ids = IdGenerator::new();
        let add = primitives::add(&mut ids, None, None);
        let add_id = add.id.clone();
        let blocks = store(vec![add]);
        let mut stack = AttachmentStack::new();
        stack.enter(AttachInfo::input(&add_id));
        assert_eq!(
            stack.resolve_value(&blocks),
            Some((add_id.clone(), "NUM1".to_string()))
        );
        assert_eq!(
            stack.resolve("r", &blocks),
            Placement::Input {
                parent: add_id.clone(),
                slot: "NUM2".into()
            }
        );
        assert_eq!(stack.resolve("s", &blocks), Placement::Detached);
        assert_eq!(stack.resolve_value(&blocks), None);
    }

    #[test]
    fn test_starting_index_skips_earlier_slots() {
        let mut ids = IdGenerator::new();
        let join = primitives::join(&mut ids, None, None);
        let join_id = join.id.clone();
        let blocks = store(vec![join]);
        let mut stack = AttachmentStack::new();
        stack.enter(AttachInfo::input(&join_id).starting_at(1));
        assert_eq!(
            stack.resolve_value(&blocks),
            Some((join_id, "STRING2".to_string()))
        );
    }

    #[test]
    fn test_current_statement_looks_through_input_scopes() {
        let mut stack = AttachmentStack::new();
        stack.enter(AttachInfo::next(Some("stmt")));
        stack.enter(AttachInfo::input("expr"));
        assert_eq!(stack.current_statement(), Some("stmt"));
        assert_eq!(stack.depth(), 2);
    }
}
