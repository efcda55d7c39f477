//! A single conversation: tree snapshot, active leaf and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::tree::{self, Message, NodeMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationState {
    Empty,
    Active,
    Branched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Text,
    Markdown,
}

/// Document produced by a message, shown in the artifacts tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub message_id: String,
}

/// Storage shape shared with the client. Older records only carry
/// `messages`; newer ones add the full tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_map: Option<NodeMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_leaf_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub artifacts: Vec<Artifact>,
    pub tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    nodes: NodeMap,
    current_leaf_id: Option<String>,
    state: ConversationState,
    strict: bool,
}

impl Conversation {
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artifacts: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            nodes: NodeMap::new(),
            current_leaf_id: None,
            state: ConversationState::Empty,
            strict: false,
        }
    }

    /// Reject dangling or looping links on insertion instead of tolerating them.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn current_leaf_id(&self) -> Option<&str> {
        self.current_leaf_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Appends `message` after the current leaf and makes it the new leaf.
    pub fn append(&mut self, message: Message) -> Result<(), TreeError> {
        match self.current_leaf_id.clone() {
            Some(leaf) => self.attach(&leaf, message),
            None => {
                if self.nodes.contains(&message.id) {
                    return Err(TreeError::DuplicateNode(message.id));
                }
                self.updated_at = message.timestamp;
                self.current_leaf_id = Some(message.id.clone());
                self.nodes.insert(Message {
                    parent_id: None,
                    children_ids: Vec::new(),
                    ..message
                });
                self.state = ConversationState::Active;
                Ok(())
            }
        }
    }

    /// Starts a new branch below `node_id` (e.g. an edited prompt or a
    /// regenerated answer) and switches to it.
    pub fn branch_from(&mut self, node_id: &str, message: Message) -> Result<(), TreeError> {
        if !self.nodes.contains(node_id) {
            return Err(TreeError::UnknownNode(node_id.to_string()));
        }
        self.attach(node_id, message)
    }

    /// Makes `node_id` the tip of the active branch.
    pub fn select_node(&mut self, node_id: &str) -> Result<(), TreeError> {
        if !self.nodes.contains(node_id) {
            return Err(TreeError::UnknownNode(node_id.to_string()));
        }
        self.current_leaf_id = Some(node_id.to_string());
        Ok(())
    }

    /// Switches to the newest tip below `node_id`, typically one of the ids
    /// returned by [`Conversation::siblings`].
    pub fn select_leaf(&mut self, node_id: &str) -> Result<(), TreeError> {
        let tip = tree::latest_descendant(&self.nodes, node_id)
            .ok_or_else(|| TreeError::UnknownNode(node_id.to_string()))?;
        self.current_leaf_id = Some(tip);
        Ok(())
    }

    pub fn siblings(&self, node_id: &str) -> Vec<String> {
        tree::get_branch_siblings(&self.nodes, node_id)
    }

    /// Root-to-leaf messages of the active branch, as sent to a model.
    pub fn linear_messages(&self) -> Vec<Message> {
        match self.current_leaf_id.as_deref() {
            Some(leaf) => tree::get_linear_history(&self.nodes, leaf),
            None => Vec::new(),
        }
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.nodes = NodeMap::new();
        self.current_leaf_id = None;
        self.artifacts.clear();
        self.state = ConversationState::Empty;
        self.updated_at = now;
    }

    pub fn to_record(&self) -> ConversationRecord {
        ConversationRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            messages: self.linear_messages(),
            node_map: Some(self.nodes.clone()),
            current_leaf_id: self.current_leaf_id.clone(),
            artifacts: self.artifacts.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Restores a stored conversation, building a tree from the flat
    /// message list when the record predates branching.
    pub fn from_record(record: ConversationRecord) -> Self {
        let (nodes, current_leaf_id) = match record.node_map {
            Some(nodes) => {
                let leaf = record
                    .current_leaf_id
                    .filter(|id| nodes.contains(id))
                    .or_else(|| record.messages.last().map(|m| m.id.clone()))
                    .filter(|id| nodes.contains(id));
                (nodes, leaf)
            }
            None => {
                let (nodes, leaf) = tree::create_tree_from_linear(&record.messages);
                let leaf = if leaf.is_empty() { None } else { Some(leaf) };
                (nodes, leaf)
            }
        };
        let state = derive_state(&nodes);
        Self {
            id: record.id,
            title: record.title,
            artifacts: record.artifacts,
            tags: record.tags,
            created_at: record.created_at,
            updated_at: record.updated_at,
            nodes,
            current_leaf_id,
            state,
            strict: false,
        }
    }

    fn attach(&mut self, parent_id: &str, message: Message) -> Result<(), TreeError> {
        // Leniency covers unknown parents only; an existing node is never replaced.
        if self.nodes.contains(&message.id) {
            return Err(TreeError::DuplicateNode(message.id));
        }
        let timestamp = message.timestamp;
        let child_id = message.id.clone();
        let next = if self.strict {
            tree::try_add_child(&self.nodes, parent_id, message)?
        } else {
            tree::add_child(&self.nodes, parent_id, message)
        };
        let forked = next
            .get(parent_id)
            .map(|parent| parent.children_ids.len() > 1)
            .unwrap_or(false);
        self.nodes = next;
        self.current_leaf_id = Some(child_id);
        self.updated_at = timestamp;
        self.state = match self.state {
            ConversationState::Branched => ConversationState::Branched,
            _ if forked => ConversationState::Branched,
            _ => ConversationState::Active,
        };
        if forked {
            tracing::debug!(conversation = %self.id, parent = %parent_id, "conversation branched");
        }
        Ok(())
    }
}

fn derive_state(nodes: &NodeMap) -> ConversationState {
    if nodes.is_empty() {
        ConversationState::Empty
    } else if nodes.iter().any(|node| node.children_ids.len() > 1) {
        ConversationState::Branched
    } else {
        ConversationState::Active
    }
}
