use tree_sitter::{Node as TsNode, Parser};

use crate::error::{Error, Result};

pub type NodeId = usize;

/// One node of the arena tree. Interior nodes only carry structure; leaves
/// additionally own their token text and the `prefix` bytes between the
/// previous token's end and this token's start (whitespace, newlines and any
/// text the grammar hides, such as indentation tokens).
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub kind: &'static str,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// 0-based start row of the node's first token.
    pub row: usize,
    /// Byte column of the node's first token.
    pub column: usize,
    pub leaf: Option<Leaf>,
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub prefix: String,
    pub value: String,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }
}

/// Lossless concrete syntax tree for one Python source file. Serializing an
/// unmodified tree reproduces the input byte-for-byte; mutations edit leaf
/// `prefix`/`value` fields and serialize the result.
#[derive(Debug)]
pub struct SyntaxTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    leaf_order: Vec<NodeId>,
}

impl SyntaxTree {
    pub fn parse(source: &str, filename: Option<&str>) -> Result<SyntaxTree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("Failed to set Python grammar");
        let display_name = || filename.unwrap_or("<source>").to_string();
        let ts_tree = parser.parse(source, None).ok_or_else(|| Error::Parse {
            filename: display_name(),
            detail: "parser produced no tree".to_string(),
        })?;
        let ts_root = ts_tree.root_node();
        if ts_root.has_error() {
            return Err(Error::Parse {
                filename: display_name(),
                detail: format!("syntax error near row {}", first_error_row(ts_root)),
            });
        }

        let mut tree = SyntaxTree {
            nodes: Vec::new(),
            root: 0,
            leaf_order: Vec::new(),
        };
        let mut last_end = 0usize;
        let root = tree.build(ts_root, None, source, &mut last_end);
        tree.root = root.unwrap_or(0);

        // Trailing bytes after the final token (or the whole input when the
        // grammar produced no tokens at all) live on a synthetic end marker.
        let endmarker = tree.nodes.len();
        tree.nodes.push(TreeNode {
            kind: "endmarker",
            parent: None,
            children: Vec::new(),
            row: ts_root.end_position().row,
            column: ts_root.end_position().column,
            leaf: Some(Leaf {
                prefix: source[last_end..].to_string(),
                value: String::new(),
            }),
        });
        tree.leaf_order.push(endmarker);
        Ok(tree)
    }

    fn build(
        &mut self,
        ts_node: TsNode<'_>,
        parent: Option<NodeId>,
        source: &str,
        last_end: &mut usize,
    ) -> Option<NodeId> {
        // Zero-width nodes carry no text and nothing to mutate.
        if ts_node.child_count() == 0 && ts_node.start_byte() == ts_node.end_byte() {
            return None;
        }
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            kind: ts_node.kind(),
            parent,
            children: Vec::new(),
            row: ts_node.start_position().row,
            column: ts_node.start_position().column,
            leaf: None,
        });
        if ts_node.child_count() == 0 {
            let start = ts_node.start_byte();
            let end = ts_node.end_byte();
            self.nodes[id].leaf = Some(Leaf {
                prefix: source[*last_end..start].to_string(),
                value: source[start..end].to_string(),
            });
            *last_end = end;
            self.leaf_order.push(id);
        } else {
            for i in 0..ts_node.child_count() {
                if let Some(child) = ts_node.child(i) {
                    if let Some(child_id) = self.build(child, Some(id), source, last_end) {
                        self.nodes[id].children.push(child_id);
                    }
                }
            }
        }
        Some(id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn kind(&self, id: NodeId) -> &'static str {
        self.nodes[id].kind
    }

    /// Leaf value, or "" for interior nodes.
    pub fn leaf_value(&self, id: NodeId) -> &str {
        self.nodes[id]
            .leaf
            .as_ref()
            .map(|l| l.value.as_str())
            .unwrap_or("")
    }

    /// Overwrite a leaf's text. `prefix: None` leaves the prefix untouched.
    pub fn set_leaf(&mut self, id: NodeId, prefix: Option<String>, value: String) {
        if let Some(leaf) = self.nodes[id].leaf.as_mut() {
            if let Some(prefix) = prefix {
                leaf.prefix = prefix;
            }
            leaf.value = value;
        }
    }

    /// All leaves in source order, including the end marker.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.leaf_order.iter().copied()
    }

    /// Leaves under `id`, leftmost first.
    pub fn subtree_leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(id, &mut out);
        out
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if self.nodes[id].is_leaf() {
            out.push(id);
            return;
        }
        for &child in &self.nodes[id].children {
            self.collect_leaves(child, out);
        }
    }

    /// The leaf whose token spans the given 0-based row and byte column.
    pub fn find_leaf_at(&self, row: usize, column: usize) -> Option<NodeId> {
        self.leaf_order.iter().copied().find(|&id| {
            let node = &self.nodes[id];
            let len = node.leaf.as_ref().map(|l| l.value.len()).unwrap_or(0);
            node.row == row && column >= node.column && column < node.column + len
        })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for &id in &self.leaf_order {
            if let Some(leaf) = &self.nodes[id].leaf {
                out.push_str(&leaf.prefix);
                out.push_str(&leaf.value);
            }
        }
        out
    }
}

fn first_error_row(node: TsNode<'_>) -> usize {
    if node.is_error() || node.is_missing() {
        return node.start_position().row;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            return first_error_row(child);
        }
    }
    node.start_position().row
}
