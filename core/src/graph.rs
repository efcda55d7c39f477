//! Graphviz description of a conversation tree for the branch picker.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::tree::{active_path, NodeMap, Role};

/// Default number of content characters shown in a vertex label.
pub const PREVIEW_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub message_id: String,
    pub role: Role,
    pub label: String,
    pub on_active_path: bool,
    pub is_current_leaf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub highlighted: bool,
}

/// Vertices and edges in layout order, renderable as DOT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDescription {
    pub dark_mode: bool,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

struct Palette {
    background: &'static str,
    fill: &'static str,
    font: &'static str,
    border: &'static str,
    edge: &'static str,
    active_fill: &'static str,
    active_border: &'static str,
    leaf_fill: &'static str,
    leaf_font: &'static str,
    highlight: &'static str,
}

const LIGHT: Palette = Palette {
    background: "transparent",
    fill: "#f4f4f5",
    font: "#18181b",
    border: "#d4d4d8",
    edge: "#a1a1aa",
    active_fill: "#dbeafe",
    active_border: "#2563eb",
    leaf_fill: "#2563eb",
    leaf_font: "#ffffff",
    highlight: "#2563eb",
};

const DARK: Palette = Palette {
    background: "transparent",
    fill: "#27272a",
    font: "#e4e4e7",
    border: "#3f3f46",
    edge: "#52525b",
    active_fill: "#1e3a8a",
    active_border: "#60a5fa",
    leaf_fill: "#3b82f6",
    leaf_font: "#ffffff",
    highlight: "#60a5fa",
};

/// Builds the graph for `map`, highlighting the branch ending at
/// `current_leaf_id`.
///
/// Nodes are laid out by timestamp (then id), so equal inputs always
/// produce identical output. Edges to parents absent from the map are
/// omitted.
pub fn generate_graph_description(
    map: &NodeMap,
    current_leaf_id: Option<&str>,
    dark_mode: bool,
) -> GraphDescription {
    generate_with_preview(map, current_leaf_id, dark_mode, PREVIEW_CHARS)
}

pub fn generate_with_preview(
    map: &NodeMap,
    current_leaf_id: Option<&str>,
    dark_mode: bool,
    preview_chars: usize,
) -> GraphDescription {
    let path = current_leaf_id
        .map(|leaf| active_path(map, leaf))
        .unwrap_or_default();

    let mut ordered: Vec<_> = map.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let nodes = ordered
        .iter()
        .map(|message| GraphNode {
            message_id: message.id.clone(),
            role: message.role,
            label: format!(
                "{}: {}",
                message.role.label(),
                preview(&message.content, preview_chars)
            ),
            on_active_path: path.contains(&message.id),
            is_current_leaf: current_leaf_id == Some(message.id.as_str()),
        })
        .collect();

    let edges = ordered
        .iter()
        .filter_map(|message| {
            let parent_id = message.parent_id.as_deref()?;
            if !map.contains(parent_id) {
                return None;
            }
            Some(GraphEdge {
                from: parent_id.to_string(),
                to: message.id.clone(),
                highlighted: path.contains(parent_id) && path.contains(&message.id),
            })
        })
        .collect();

    GraphDescription {
        dark_mode,
        nodes,
        edges,
    }
}

/// DOT text for [`generate_graph_description`].
pub fn generate_dot(map: &NodeMap, current_leaf_id: Option<&str>, dark_mode: bool) -> String {
    generate_graph_description(map, current_leaf_id, dark_mode).to_dot()
}

impl GraphDescription {
    pub fn to_dot(&self) -> String {
        let palette = if self.dark_mode { &DARK } else { &LIGHT };
        let mut out = String::new();
        out.push_str("digraph ConversationTree {\n");
        let _ = writeln!(out, "  bgcolor=\"{}\";", palette.background);
        out.push_str("  rankdir=TB;\n");
        let _ = writeln!(
            out,
            "  node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\", fontsize=10, fillcolor=\"{}\", fontcolor=\"{}\", color=\"{}\"];",
            palette.fill, palette.font, palette.border
        );
        let _ = writeln!(out, "  edge [color=\"{}\", arrowsize=0.6];", palette.edge);

        for node in &self.nodes {
            let _ = write!(
                out,
                "  \"node_{}\" [label=\"{}\"",
                escape_id(&node.message_id),
                node.label
            );
            if node.is_current_leaf {
                let _ = write!(
                    out,
                    ", fillcolor=\"{}\", fontcolor=\"{}\", color=\"{}\", penwidth=3",
                    palette.leaf_fill, palette.leaf_font, palette.active_border
                );
            } else if node.on_active_path {
                let _ = write!(
                    out,
                    ", fillcolor=\"{}\", color=\"{}\", penwidth=2",
                    palette.active_fill, palette.active_border
                );
            }
            out.push_str("];\n");
        }

        for edge in &self.edges {
            let _ = write!(
                out,
                "  \"node_{}\" -> \"node_{}\"",
                escape_id(&edge.from),
                escape_id(&edge.to)
            );
            if edge.highlighted {
                let _ = write!(out, " [color=\"{}\", penwidth=2]", palette.highlight);
            }
            out.push_str(";\n");
        }

        out.push_str("}\n");
        out
    }
}

impl fmt::Display for GraphDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dot())
    }
}

/// First `limit` characters of `content`, escaped for a quoted DOT label.
fn preview(content: &str, limit: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(limit).collect();
    let truncated = chars.next().is_some();

    let mut escaped = String::with_capacity(head.len() + 3);
    for ch in head.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    if truncated {
        escaped.push_str("...");
    }
    escaped
}

fn escape_id(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{add_child, create_tree_from_linear, Message};
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, role: Role, secs: i64, content: &str) -> Message {
        Message::new(
            id,
            role,
            content,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    fn forked() -> NodeMap {
        let (map, _) = create_tree_from_linear(&[
            msg("a", Role::User, 0, "What is consideration?"),
            msg("b", Role::Assistant, 1, "Consideration is something of value."),
            msg("c", Role::User, 2, "Thanks"),
        ]);
        add_child(&map, "b", msg("d", Role::User, 3, "Give an \"example\"\nplease"))
    }

    #[test]
    fn marks_active_path_and_leaf() {
        let graph = generate_graph_description(&forked(), Some("d"), false);
        let flags: Vec<(&str, bool, bool)> = graph
            .nodes
            .iter()
            .map(|n| (n.message_id.as_str(), n.on_active_path, n.is_current_leaf))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("a", true, false),
                ("b", true, false),
                ("c", false, false),
                ("d", true, true)
            ]
        );
        let highlighted: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .filter(|e| e.highlighted)
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(highlighted, vec![("a", "b"), ("b", "d")]);
        assert_eq!(graph.edges.len(), 3);
    }

    #[test]
    fn labels_are_truncated_and_escaped() {
        let graph = generate_graph_description(&forked(), None, false);
        let b = graph.nodes.iter().find(|n| n.message_id == "b").unwrap();
        assert_eq!(b.label, "Assistant: Consideration is something of ...");
        let d = graph.nodes.iter().find(|n| n.message_id == "d").unwrap();
        assert_eq!(d.label, "User: Give an \\\"example\\\"\\nplease");
    }

    #[test]
    fn nodes_sorted_by_timestamp() {
        let map: NodeMap = vec![
            msg("late", Role::User, 10, "x"),
            msg("early", Role::User, 1, "y"),
            msg("tie-b", Role::User, 5, "z"),
            msg("tie-a", Role::User, 5, "z"),
        ]
        .into_iter()
        .collect();
        let order: Vec<String> = generate_graph_description(&map, None, true)
            .nodes
            .into_iter()
            .map(|n| n.message_id)
            .collect();
        assert_eq!(order, vec!["early", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn dot_output_is_deterministic() {
        let map = forked();
        let first = generate_dot(&map, Some("c"), true);
        let second = generate_dot(&map.clone(), Some("c"), true);
        assert_eq!(first, second);
        assert!(first.starts_with("digraph ConversationTree {"));
        assert!(first.contains("\"node_a\" -> \"node_b\" [color=\"#60a5fa\", penwidth=2];"));
        assert!(first.contains("\"node_b\" -> \"node_d\";"));
        assert!(first.contains("\"node_c\" [label=\"User: Thanks\", fillcolor=\"#3b82f6\""));
    }

    #[test]
    fn dark_mode_changes_palette() {
        let map = forked();
        assert_ne!(
            generate_dot(&map, Some("c"), true),
            generate_dot(&map, Some("c"), false)
        );
    }

    #[test]
    fn missing_parent_yields_no_edge() {
        let map = add_child(&NodeMap::new(), "ghost", msg("x", Role::User, 0, "hi"));
        let graph = generate_graph_description(&map, Some("x"), false);
        assert!(graph.edges.is_empty());
        assert!(graph.nodes[0].is_current_leaf);
    }

    #[test]
    fn empty_map_renders_empty_graph() {
        let dot = generate_dot(&NodeMap::new(), None, false);
        assert!(dot.starts_with("digraph"));
        assert!(!dot.contains("node_"));
    }
}
