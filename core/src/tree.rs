//! Branching message history stored as an id-indexed arena.
//!
//! Nodes refer to each other by id only: a child names its parent in
//! `parent_id` and a parent lists its children in `children_ids`. Maps are
//! treated as immutable snapshots; every "mutation" returns a new map that
//! shares untouched nodes with its input.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TreeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A single chat turn plus its tree linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp,
            parent_id: None,
            children_ids: Vec::new(),
            attachments: Vec::new(),
            response_time_ms: None,
            token_count: None,
            cost: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Insertion-ordered map from message id to node.
///
/// Cloning is shallow: node payloads are reference counted and only
/// copied when a snapshot rewrites them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeMap {
    nodes: IndexMap<String, Arc<Message>>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.nodes.values().map(Arc::as_ref)
    }

    /// Stores `message` as-is, replacing any node with the same id.
    pub fn insert(&mut self, message: Message) {
        self.nodes.insert(message.id.clone(), Arc::new(message));
    }

    /// True when both maps hold the very same allocation for `id`.
    pub fn shares_node(&self, other: &NodeMap, id: &str) -> bool {
        match (self.nodes.get(id), other.nodes.get(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.nodes.get_mut(id).map(Arc::make_mut)
    }
}

impl FromIterator<Message> for NodeMap {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        let mut map = NodeMap::new();
        for message in iter {
            map.insert(message);
        }
        map
    }
}

/// Messages from the root down to `leaf_id`.
///
/// A `parent_id` that names a missing node ends the walk and the partial
/// history collected so far is returned.
pub fn get_linear_history(map: &NodeMap, leaf_id: &str) -> Vec<Message> {
    ancestor_chain(map, leaf_id)
        .into_iter()
        .rev()
        .cloned()
        .collect()
}

/// Ids of the branch options at `node_id`: its parent's children, or just
/// the node itself when it is a root or its parent lists no children.
pub fn get_branch_siblings(map: &NodeMap, node_id: &str) -> Vec<String> {
    let parent = map
        .get(node_id)
        .and_then(|node| node.parent_id.as_deref())
        .and_then(|parent_id| map.get(parent_id));
    match parent {
        Some(parent) if !parent.children_ids.is_empty() => parent.children_ids.clone(),
        _ => vec![node_id.to_string()],
    }
}

/// New map with `child` attached under `parent_id`; the input is untouched.
///
/// An unknown parent still inserts the child as an orphan. Imported and
/// shared conversations can arrive out of order, so the lenient path never
/// rejects; use [`try_add_child`] for checked insertion.
pub fn add_child(map: &NodeMap, parent_id: &str, child: Message) -> NodeMap {
    let mut next = map.clone();
    let child_id = child.id.clone();
    next.insert(Message {
        parent_id: Some(parent_id.to_string()),
        ..child
    });
    match next.node_mut(parent_id) {
        Some(parent) => parent.children_ids.push(child_id),
        None => tracing::debug!(
            child = %child_id,
            parent = %parent_id,
            "inserted orphan node with unknown parent"
        ),
    }
    next
}

/// Checked variant of [`add_child`].
pub fn try_add_child(map: &NodeMap, parent_id: &str, child: Message) -> Result<NodeMap, TreeError> {
    if !map.contains(parent_id) {
        return Err(TreeError::UnknownParent(parent_id.to_string()));
    }
    if map.contains(&child.id) {
        return Err(TreeError::DuplicateNode(child.id));
    }
    // The child is new, so it can only close a loop through an orphan that
    // already names it as parent.
    let closes_loop = ancestor_chain(map, parent_id)
        .iter()
        .any(|node| node.parent_id.as_deref() == Some(child.id.as_str()));
    if child.id == parent_id || closes_loop {
        return Err(TreeError::Cycle {
            child: child.id,
            parent: parent_id.to_string(),
        });
    }
    Ok(add_child(map, parent_id, child))
}

/// Converts an ordered transcript into a single-branch tree and returns it
/// with the id of the last message (empty when there are no messages).
pub fn create_tree_from_linear(messages: &[Message]) -> (NodeMap, String) {
    let mut map = NodeMap::new();
    let mut previous: Option<&str> = None;
    for (idx, message) in messages.iter().enumerate() {
        let children_ids = messages
            .get(idx + 1)
            .map(|next| vec![next.id.clone()])
            .unwrap_or_default();
        map.insert(Message {
            parent_id: previous.map(str::to_string),
            children_ids,
            ..message.clone()
        });
        previous = Some(message.id.as_str());
    }
    let leaf_id = messages.last().map(|m| m.id.clone()).unwrap_or_default();
    (map, leaf_id)
}

/// Newest tip below `node_id`, following the most recently added child.
pub fn latest_descendant(map: &NodeMap, node_id: &str) -> Option<String> {
    let mut current = map.get(node_id)?;
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(current.id.as_str());
    while let Some(next) = current
        .children_ids
        .iter()
        .rev()
        .find_map(|id| map.get(id))
    {
        if !seen.insert(next.id.as_str()) {
            break;
        }
        current = next;
    }
    Some(current.id.clone())
}

/// Ids on the path from `leaf_id` up to its root.
pub fn active_path(map: &NodeMap, leaf_id: &str) -> HashSet<String> {
    ancestor_chain(map, leaf_id)
        .into_iter()
        .map(|node| node.id.clone())
        .collect()
}

/// Leaf first, root last. Stops at a missing parent or a repeated node.
fn ancestor_chain<'a>(map: &'a NodeMap, leaf_id: &str) -> Vec<&'a Message> {
    let mut chain: Vec<&Message> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = map.get(leaf_id);
    while let Some(node) = current {
        if !seen.insert(node.id.as_str()) {
            tracing::debug!(node = %node.id, "parent chain loops; stopping traversal");
            break;
        }
        chain.push(node);
        current = match node.parent_id.as_deref() {
            Some(parent_id) => {
                let parent = map.get(parent_id);
                if parent.is_none() {
                    tracing::debug!(
                        node = %node.id,
                        parent = %parent_id,
                        "parent missing; history truncated"
                    );
                }
                parent
            }
            None => None,
        };
    }
    chain
}

/// Referential problems found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TreeIssue {
    DanglingParent { node: String, parent: String },
    MissingBackLink { node: String, parent: String },
    DanglingChild { node: String, child: String },
    ChildParentMismatch { node: String, child: String },
    Cycle { node: String },
}

impl fmt::Display for TreeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeIssue::DanglingParent { node, parent } => {
                write!(f, "`{node}` points to missing parent `{parent}`")
            }
            TreeIssue::MissingBackLink { node, parent } => {
                write!(f, "parent `{parent}` does not list child `{node}`")
            }
            TreeIssue::DanglingChild { node, child } => {
                write!(f, "`{node}` lists missing child `{child}`")
            }
            TreeIssue::ChildParentMismatch { node, child } => {
                write!(f, "`{node}` lists `{child}` whose parent is elsewhere")
            }
            TreeIssue::Cycle { node } => write!(f, "`{node}` is its own ancestor"),
        }
    }
}

/// Reports broken links without modifying the map.
pub fn validate(map: &NodeMap) -> Vec<TreeIssue> {
    let mut issues = Vec::new();
    for node in map.iter() {
        if let Some(parent_id) = node.parent_id.as_deref() {
            match map.get(parent_id) {
                None => issues.push(TreeIssue::DanglingParent {
                    node: node.id.clone(),
                    parent: parent_id.to_string(),
                }),
                Some(parent) if !parent.children_ids.contains(&node.id) => {
                    issues.push(TreeIssue::MissingBackLink {
                        node: node.id.clone(),
                        parent: parent_id.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        for child_id in &node.children_ids {
            match map.get(child_id) {
                None => issues.push(TreeIssue::DanglingChild {
                    node: node.id.clone(),
                    child: child_id.clone(),
                }),
                Some(child) if child.parent_id.as_deref() != Some(node.id.as_str()) => {
                    issues.push(TreeIssue::ChildParentMismatch {
                        node: node.id.clone(),
                        child: child_id.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        if is_own_ancestor(map, node) {
            issues.push(TreeIssue::Cycle {
                node: node.id.clone(),
            });
        }
    }
    issues
}

fn is_own_ancestor(map: &NodeMap, node: &Message) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = node.parent_id.as_deref();
    while let Some(id) = current {
        if id == node.id {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = map.get(id).and_then(|n| n.parent_id.as_deref());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(id: &str, role: Role, secs: i64) -> Message {
        Message::new(id, role, format!("content of {id}"), at(secs))
    }

    fn transcript() -> Vec<Message> {
        vec![
            msg("m1", Role::User, 0),
            msg("m2", Role::Assistant, 1),
            msg("m3", Role::User, 2),
        ]
    }

    #[test]
    fn linear_round_trip_preserves_order() {
        let messages = transcript();
        let (map, leaf) = create_tree_from_linear(&messages);
        assert_eq!(leaf, "m3");
        let ids: Vec<String> = get_linear_history(&map, &leaf)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn linear_tree_links_neighbours() {
        let (map, _) = create_tree_from_linear(&transcript());
        let m2 = map.get("m2").unwrap();
        assert_eq!(m2.parent_id.as_deref(), Some("m1"));
        assert_eq!(m2.children_ids, vec!["m3"]);
        assert!(map.get("m1").unwrap().is_root());
        assert!(map.get("m3").unwrap().children_ids.is_empty());
    }

    #[test]
    fn empty_transcript_has_empty_leaf() {
        let (map, leaf) = create_tree_from_linear(&[]);
        assert!(map.is_empty());
        assert_eq!(leaf, "");
        assert!(get_linear_history(&map, &leaf).is_empty());
    }

    #[test]
    fn history_stops_at_missing_parent() {
        let (map, _) = create_tree_from_linear(&transcript());
        let map = add_child(&map, "gone", msg("m4", Role::Assistant, 4));
        let map = add_child(&map, "m4", msg("m5", Role::User, 5));
        let ids: Vec<String> = get_linear_history(&map, "m5")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m4", "m5"]);
    }

    #[test]
    fn history_of_unknown_leaf_is_empty() {
        let (map, _) = create_tree_from_linear(&transcript());
        assert!(get_linear_history(&map, "nope").is_empty());
    }

    #[test]
    fn history_survives_cycles() {
        let mut a = msg("a", Role::User, 0);
        let mut b = msg("b", Role::Assistant, 1);
        a.parent_id = Some("b".into());
        b.parent_id = Some("a".into());
        let map: NodeMap = vec![a, b].into_iter().collect();
        assert_eq!(get_linear_history(&map, "a").len(), 2);
    }

    #[test]
    fn add_child_leaves_input_untouched() {
        let (map, _) = create_tree_from_linear(&transcript());
        let before = map.clone();
        let next = add_child(&map, "m2", msg("alt", Role::User, 3));
        assert_eq!(map, before);
        assert_eq!(map.len(), 3);
        assert_eq!(next.len(), 4);
        assert_eq!(next.get("m2").unwrap().children_ids, vec!["m3", "alt"]);
        assert_eq!(next.get("alt").unwrap().parent_id.as_deref(), Some("m2"));
    }

    #[test]
    fn add_child_shares_untouched_nodes() {
        let (map, _) = create_tree_from_linear(&transcript());
        let next = add_child(&map, "m2", msg("alt", Role::User, 3));
        assert!(next.shares_node(&map, "m1"));
        assert!(next.shares_node(&map, "m3"));
        assert!(!next.shares_node(&map, "m2"));
    }

    #[test]
    fn add_child_with_unknown_parent_inserts_orphan() {
        let (map, _) = create_tree_from_linear(&transcript());
        let next = add_child(&map, "ghost", msg("x", Role::User, 9));
        assert_eq!(next.len(), 4);
        assert_eq!(next.get("x").unwrap().parent_id.as_deref(), Some("ghost"));
        assert_eq!(get_linear_history(&next, "x").len(), 1);
    }

    #[test]
    fn strict_insert_rejects_bad_links() {
        let (map, _) = create_tree_from_linear(&transcript());
        assert_eq!(
            try_add_child(&map, "ghost", msg("x", Role::User, 9)).unwrap_err(),
            TreeError::UnknownParent("ghost".into())
        );
        assert_eq!(
            try_add_child(&map, "m3", msg("m1", Role::User, 9)).unwrap_err(),
            TreeError::DuplicateNode("m1".into())
        );
        assert!(try_add_child(&map, "m3", msg("m4", Role::Assistant, 9)).is_ok());
    }

    #[test]
    fn strict_insert_rejects_cycles_through_orphans() {
        let mut dangling = msg("p", Role::User, 1);
        dangling.parent_id = Some("c".into());
        let map: NodeMap = vec![dangling].into_iter().collect();
        let err = try_add_child(&map, "p", msg("c", Role::User, 2)).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));
    }

    #[test]
    fn siblings_of_root_is_itself() {
        let (map, _) = create_tree_from_linear(&transcript());
        assert_eq!(get_branch_siblings(&map, "m1"), vec!["m1"]);
        assert_eq!(get_branch_siblings(&map, "unknown"), vec!["unknown"]);
    }

    #[test]
    fn siblings_list_all_forks() {
        let (map, _) = create_tree_from_linear(&transcript());
        let map = add_child(&map, "m2", msg("alt", Role::User, 3));
        assert_eq!(get_branch_siblings(&map, "m3"), vec!["m3", "alt"]);
        assert_eq!(get_branch_siblings(&map, "alt"), vec!["m3", "alt"]);
    }

    #[test]
    fn siblings_fall_back_to_node_when_parent_lacks_back_link() {
        let (mut map, _) = create_tree_from_linear(&transcript());
        let mut unlinked = msg("u", Role::User, 8);
        unlinked.parent_id = Some("m1".into());
        map.insert(unlinked);
        let mut childless = msg("p", Role::User, 9);
        childless.parent_id = None;
        map.insert(childless);
        let mut stray = msg("s", Role::Assistant, 10);
        stray.parent_id = Some("p".into());
        map.insert(stray);
        assert_eq!(get_branch_siblings(&map, "u"), vec!["m2"]);
        assert_eq!(get_branch_siblings(&map, "s"), vec!["s"]);
    }

    #[test]
    fn latest_descendant_follows_newest_child() {
        let (map, _) = create_tree_from_linear(&transcript());
        let map = add_child(&map, "m1", msg("b1", Role::Assistant, 5));
        let map = add_child(&map, "b1", msg("b2", Role::User, 6));
        assert_eq!(latest_descendant(&map, "m1").as_deref(), Some("b2"));
        assert_eq!(latest_descendant(&map, "m2").as_deref(), Some("m3"));
        assert_eq!(latest_descendant(&map, "zzz"), None);
    }

    #[test]
    fn validate_reports_broken_links() {
        let (mut map, _) = create_tree_from_linear(&transcript());
        let mut orphan = msg("o", Role::User, 7);
        orphan.parent_id = Some("ghost".into());
        map.insert(orphan);
        let mut unlinked = msg("u", Role::User, 8);
        unlinked.parent_id = Some("m1".into());
        map.insert(unlinked);

        let issues = validate(&map);
        assert!(issues.contains(&TreeIssue::DanglingParent {
            node: "o".into(),
            parent: "ghost".into()
        }));
        assert!(issues.contains(&TreeIssue::MissingBackLink {
            node: "u".into(),
            parent: "m1".into()
        }));
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn validate_accepts_consistent_trees() {
        let (map, _) = create_tree_from_linear(&transcript());
        let map = add_child(&map, "m2", msg("alt", Role::User, 3));
        assert!(validate(&map).is_empty());
    }

    #[test]
    fn message_json_uses_client_field_names() {
        let (map, _) = create_tree_from_linear(&transcript());
        let json = serde_json::to_value(map.get("m2").unwrap()).unwrap();
        assert_eq!(json["parentId"], "m1");
        assert_eq!(json["childrenIds"][0], "m3");
        assert_eq!(json["role"], "assistant");
    }
}
