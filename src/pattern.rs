use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tree::{NodeId, SyntaxTree};

/// Extra constraints for a named caret marker.
#[derive(Debug, Default, Clone)]
pub struct MarkerDef {
    /// Climb from the marked leaf to the nearest enclosing node of this kind.
    pub of_type: Option<&'static str>,
    /// Relax the kind check at this pattern position ("any" matches all).
    pub marker_type: Option<&'static str>,
}

/// Structural pattern over a parsed snippet. Comment lines below the code
/// carry `^` markers naming the leaf directly above; the unnamed (or `match`)
/// marker is the pattern root. `_any` leaves match any node, `_name` any
/// identifier, `_<kind>` any node of that kind.
#[derive(Debug)]
pub struct AstPattern {
    tree: SyntaxTree,
    pattern: NodeId,
    marker_types: HashMap<NodeId, &'static str>,
}

impl AstPattern {
    pub fn new(source: &str, definitions: &[(&str, MarkerDef)]) -> Result<AstPattern> {
        let source = source.trim();
        let tree = SyntaxTree::parse(source, Some("<pattern>"))?;

        let mut pattern = None;
        let mut marker_types = HashMap::new();
        let comments: Vec<NodeId> = tree
            .leaves()
            .filter(|&id| tree.kind(id) == "comment")
            .collect();
        for comment in comments {
            let node = tree.node(comment);
            let text = tree.leaf_value(comment);
            let carets: Vec<usize> = text
                .char_indices()
                .filter(|&(_, c)| c == '^')
                .map(|(i, _)| i)
                .collect();
            for (i, &caret) in carets.iter().enumerate() {
                let name_end = carets.get(i + 1).copied().unwrap_or(text.len());
                let name = text[caret + 1..name_end].trim();
                let column = node.column + caret;
                let row = node.row.checked_sub(1).ok_or_else(|| {
                    Error::Config("pattern marker on the first line has no target".to_string())
                })?;
                let mut target = tree.find_leaf_at(row, column).ok_or_else(|| {
                    Error::Config(format!("pattern marker at {row}:{column} hits no token"))
                })?;
                let def = definitions
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, d)| d.clone())
                    .unwrap_or_default();
                if let Some(of_type) = def.of_type {
                    while tree.kind(target) != of_type {
                        target = tree.parent(target).ok_or_else(|| {
                            Error::Config(format!("no enclosing {of_type} for pattern marker"))
                        })?;
                    }
                }
                if let Some(marker_type) = def.marker_type {
                    marker_types.insert(target, marker_type);
                }
                if name.is_empty() || name == "match" {
                    if pattern.replace(target).is_some() {
                        return Err(Error::Config(
                            "pattern has more than one root marker".to_string(),
                        ));
                    }
                }
            }
        }
        let pattern = pattern
            .ok_or_else(|| Error::Config("pattern has no root marker".to_string()))?;
        Ok(AstPattern {
            tree,
            pattern,
            marker_types,
        })
    }

    /// Does `node` (with its ancestor chain) match this pattern?
    pub fn matches(&self, subject: &SyntaxTree, node: NodeId) -> bool {
        self.match_nodes(subject, node, self.pattern, None, None)
    }

    fn match_nodes(
        &self,
        subject: &SyntaxTree,
        node: NodeId,
        pattern: NodeId,
        skip_child: Option<NodeId>,
        skip_pattern: Option<NodeId>,
    ) -> bool {
        let pattern_node = self.tree.node(pattern);
        let subject_node = subject.node(node);

        let mut check_value = true;
        let mut check_children = true;
        if is_wildcard(pattern_node.kind, self.tree.leaf_value(pattern), subject_node.kind) {
            check_value = false;
        } else if let Some(&marker_type) = self.marker_types.get(&pattern) {
            if marker_type == "any" || marker_type == subject_node.kind {
                check_value = false;
                check_children = false;
            }
        } else if pattern_node.kind != subject_node.kind {
            return false;
        }

        if check_children && !pattern_node.children.is_empty() {
            if pattern_node.children.len() != subject_node.children.len() {
                return false;
            }
            for (&pattern_child, &subject_child) in
                pattern_node.children.iter().zip(&subject_node.children)
            {
                if Some(subject_child) == skip_child {
                    // The child we ascended from must sit at the same
                    // position as the pattern node we ascended from.
                    if Some(pattern_child) != skip_pattern {
                        return false;
                    }
                    continue;
                }
                if !self.match_nodes(
                    subject,
                    subject_child,
                    pattern_child,
                    Some(subject_child),
                    Some(pattern_child),
                ) {
                    return false;
                }
            }
        }

        if check_value
            && pattern_node.is_leaf()
            && self.tree.leaf_value(pattern) != subject.leaf_value(node)
        {
            return false;
        }

        // Walk up through the ancestors until the pattern runs out, unless we
        // got here from the child loop (the node's own subtree is the match).
        if skip_child != Some(node) {
            if let Some(pattern_parent) = pattern_node.parent {
                if self.tree.kind(pattern_parent) != "module" {
                    let Some(subject_parent) = subject_node.parent else {
                        return false;
                    };
                    return self.match_nodes(
                        subject,
                        subject_parent,
                        pattern_parent,
                        Some(node),
                        Some(pattern),
                    );
                }
            }
        }
        true
    }
}

fn is_wildcard(pattern_kind: &str, pattern_value: &str, subject_kind: &str) -> bool {
    if pattern_kind != "identifier" {
        return false;
    }
    let Some(rest) = pattern_value.strip_prefix('_') else {
        return false;
    };
    rest == "any" || rest == subject_kind || (rest == "name" && subject_kind == "identifier")
}
