//! Conversation tree construction and active-path resolution
//!
//! The backend returns each chat as a flat, unordered message list. This
//! module rebuilds the branching structure from it: an id-keyed arena with
//! derived child lists, a deterministic "active path" walk that follows
//! each node's selected branch, and the branch metadata the navigation
//! controls consume. Building never mutates its input and traversal has no
//! side effects, so any mutation elsewhere is made visible by simply
//! rebuilding and re-walking.

use crate::chat::message::{Message, Role};
use std::collections::{HashMap, HashSet};

/// Branch metadata for a node with more than one child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchInfo {
    /// Currently selected child index (already clamped)
    pub active_index: usize,
    /// Total number of sibling branches
    pub total_branches: usize,
}

struct Node {
    message: Message,
    children: Vec<String>,
}

/// A branching conversation reconstructed from a flat message list
pub struct ConversationTree {
    nodes: HashMap<String, Node>,
    roots: Vec<String>,
}

impl ConversationTree {
    /// Builds a tree from a flat message list
    ///
    /// System-role messages are configuration, not conversation, and are
    /// excluded entirely. A message whose parent id is not in the index is
    /// dropped (backend data referencing a deleted ancestor must not break
    /// traversal). Children and roots are sorted by timestamp ascending so
    /// branch order is stable across reloads regardless of arrival order.
    pub fn build(messages: &[Message]) -> Self {
        let mut nodes: HashMap<String, Node> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                (
                    m.id.clone(),
                    Node {
                        message: m.clone(),
                        children: Vec::new(),
                    },
                )
            })
            .collect();

        let mut roots: Vec<String> = Vec::new();
        for message in messages.iter().filter(|m| m.role != Role::System) {
            match &message.parent_id {
                None => roots.push(message.id.clone()),
                Some(parent_id) => {
                    if nodes.contains_key(parent_id) {
                        if let Some(parent) = nodes.get_mut(parent_id) {
                            parent.children.push(message.id.clone());
                        }
                    } else {
                        tracing::warn!(
                            "Dropping message {} with missing parent {}",
                            message.id,
                            parent_id
                        );
                        nodes.remove(&message.id);
                    }
                }
            }
        }

        let timestamps: HashMap<String, f64> = nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.message.timestamp))
            .collect();
        let ts = |id: &String| timestamps.get(id).copied().unwrap_or(0.0);

        for node in nodes.values_mut() {
            node.children.sort_by(|a, b| ts(a).total_cmp(&ts(b)));
        }
        roots.sort_by(|a, b| ts(a).total_cmp(&ts(b)));

        Self { nodes, roots }
    }

    /// Resolves the active path across all roots
    ///
    /// For each root in time order: emit the node, then follow its
    /// selected child until a leaf. Deterministic and side-effect free. A
    /// visited set guards the walk so accidentally cyclic data terminates
    /// instead of spinning.
    pub fn active_path(&self) -> Vec<&Message> {
        let mut path = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        for root in &self.roots {
            self.walk_from(root, &mut visited, &mut path);
        }
        path
    }

    fn walk_from<'a>(
        &'a self,
        root: &str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a Message>,
    ) {
        let mut current = match self.nodes.get_key_value(root) {
            Some((id, _)) => id.as_str(),
            None => return,
        };
        loop {
            if !visited.insert(current) {
                tracing::warn!("Cycle detected at message {}, stopping walk", current);
                return;
            }
            let Some(node) = self.nodes.get(current) else {
                return;
            };
            path.push(&node.message);
            if node.children.is_empty() {
                return;
            }
            current = node.children[selected_index(
                node.message.active_child_index,
                node.children.len(),
            )]
            .as_str();
        }
    }

    /// Branch metadata for every node with more than one child
    ///
    /// This is the only state the branch-navigation controls consume.
    pub fn branch_info(&self) -> HashMap<String, BranchInfo> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.children.len() > 1)
            .map(|(id, node)| {
                let total = node.children.len();
                (
                    id.clone(),
                    BranchInfo {
                        active_index: selected_index(node.message.active_child_index, total),
                        total_branches: total,
                    },
                )
            })
            .collect()
    }

    /// The (time-sorted) children of a node
    pub fn children_of(&self, id: &str) -> Vec<&Message> {
        self.nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.nodes.get(child).map(|n| &n.message))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Id of the last message on the first root's active path
    ///
    /// Determines the correct parent for a new user message or generation
    /// request: with a non-default branch active, new messages must attach
    /// to the active leaf, not the most recently added node.
    pub fn last_active_message_id(messages: &[Message]) -> Option<String> {
        let tree = Self::build(messages);
        let root = tree.roots.first()?;
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        tree.walk_from(root, &mut visited, &mut path);
        path.last().map(|m| m.id.clone())
    }
}

/// Selects a child index, falling back to 0 when out of range
///
/// An out-of-range persisted index (a child was deleted) must not cause an
/// out-of-bounds access; the first branch is the defined fallback.
fn selected_index(active_child_index: usize, child_count: usize) -> usize {
    if active_child_index < child_count {
        active_child_index
    } else {
        0
    }
}
