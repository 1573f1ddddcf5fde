//! Accessibility tree snapshot.
//!
//! Turns Chrome's flat `Accessibility.getFullAXTree` node list into a tree and
//! renders it as indented text, one `- role "name" [state]` line per node.

use serde_json::Value;
use std::collections::HashMap;

/// Longest snapshot text returned to the client, in characters.
pub const MAX_SNAPSHOT_CHARS: usize = 5000;

const MAX_RENDER_DEPTH: usize = 15;

/// Containers that carry no information of their own.
const STRUCTURAL_ROLES: &[&str] = &[
    "generic",
    "none",
    "presentation",
    "group",
    "region",
    "GenericContainer",
    "Section",
    "LineBreak",
];

#[derive(Debug, Clone, Default)]
pub struct AXNode {
    pub role: String,
    pub name: String,
    pub value: String,
    pub ignored: bool,
    pub focused: bool,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub expanded: Option<bool>,
    pub level: Option<i64>,
    pub children: Vec<AXNode>,
}

impl AXNode {
    fn is_structural(&self) -> bool {
        STRUCTURAL_ROLES
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&self.role))
    }
}

/// Build the node tree from a `getFullAXTree` response. The first node in
/// the list is the root.
pub fn parse_ax_tree(response: &Value) -> Option<AXNode> {
    let nodes = response.get("nodes")?.as_array()?;
    let by_id: HashMap<&str, &Value> = nodes
        .iter()
        .filter_map(|n| Some((n.get("nodeId")?.as_str()?, n)))
        .collect();
    let root_id = nodes.first()?.get("nodeId")?.as_str()?;
    Some(build_node(root_id, &by_id, 0))
}

fn build_node(id: &str, by_id: &HashMap<&str, &Value>, depth: usize) -> AXNode {
    let Some(raw) = by_id.get(id) else {
        return AXNode {
            role: "unknown".to_string(),
            ..Default::default()
        };
    };

    let mut node = AXNode {
        role: ax_string(raw, "role"),
        name: ax_string(raw, "name"),
        value: ax_string(raw, "value"),
        ignored: raw.get("ignored").and_then(|v| v.as_bool()).unwrap_or(false),
        ..Default::default()
    };

    for prop in raw
        .get("properties")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        let value = prop.get("value").and_then(|v| v.get("value"));
        match prop.get("name").and_then(|v| v.as_str()).unwrap_or("") {
            "focused" => node.focused = value.and_then(|v| v.as_bool()).unwrap_or(false),
            "checked" => {
                // Tri-state checkboxes report the string "mixed".
                node.checked = Some(value.and_then(|v| v.as_bool()).unwrap_or(false))
            }
            "disabled" => node.disabled = value.and_then(|v| v.as_bool()).unwrap_or(false),
            "expanded" => node.expanded = value.and_then(|v| v.as_bool()),
            "level" => node.level = value.and_then(|v| v.as_i64()),
            _ => {}
        }
    }

    if depth < MAX_RENDER_DEPTH * 4 {
        node.children = raw
            .get("childIds")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|c| c.as_str())
            .map(|c| build_node(c, by_id, depth + 1))
            .collect();
    }
    node
}

/// CDP wraps role/name/value as `{type, value}`.
fn ax_string(raw: &Value, field: &str) -> String {
    raw.get(field)
        .and_then(|v| v.get("value").and_then(|inner| inner.as_str()).or_else(|| v.as_str()))
        .unwrap_or("")
        .to_string()
}

/// Render the tree compactly: ignored nodes and unnamed structural
/// containers are elided (their children move up a level), empty text runs
/// are dropped.
pub fn render_tree(root: &AXNode) -> String {
    let mut out = String::new();
    render_node(&mut out, root, 0);
    out
}

fn render_node(out: &mut String, node: &AXNode, indent: usize) {
    if indent > MAX_RENDER_DEPTH {
        return;
    }
    if node.ignored || (node.is_structural() && node.name.is_empty()) {
        for child in &node.children {
            render_node(out, child, indent);
        }
        return;
    }
    if node.role == "StaticText" && node.name.trim().is_empty() {
        return;
    }

    out.push_str(&"  ".repeat(indent));
    out.push_str("- ");
    out.push_str(&node.role);
    if !node.name.is_empty() {
        out.push_str(&format!(" \"{}\"", clip(&node.name, 80)));
    }
    if let Some(level) = node.level {
        out.push_str(&format!(" [level={}]", level));
    }
    if node.focused {
        out.push_str(" [focused]");
    }
    if node.checked == Some(true) {
        out.push_str(" [checked]");
    }
    if node.disabled {
        out.push_str(" [disabled]");
    }
    match node.expanded {
        Some(true) => out.push_str(" [expanded]"),
        Some(false) => out.push_str(" [collapsed]"),
        None => {}
    }
    if !node.value.is_empty() && node.value != node.name {
        out.push_str(&format!(" value=\"{}\"", clip(&node.value, 60)));
    }
    out.push('\n');

    for child in &node.children {
        render_node(out, child, indent + 1);
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut clipped: String = s.chars().take(max_chars - 3).collect();
    clipped.push_str("...");
    clipped
}

/// Cap snapshot text at [`MAX_SNAPSHOT_CHARS`] characters.
pub fn truncate_snapshot(text: &str) -> String {
    text.chars().take(MAX_SNAPSHOT_CHARS).collect()
}
