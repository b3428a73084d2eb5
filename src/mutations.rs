use std::sync::OnceLock;

use crate::context::MutationContext;
use crate::pattern::AstPattern;
use crate::tree::{NodeId, SyntaxTree, TreeNode};

/// One leaf rewrite. `prefix: None` keeps the leaf's existing prefix.
#[derive(Debug, Clone)]
pub struct LeafEdit {
    pub leaf: NodeId,
    pub prefix: Option<String>,
    pub value: String,
}

/// One complete mutant: all its leaf edits applied together.
#[derive(Debug, Clone)]
pub struct MutantEdit {
    pub edits: Vec<LeafEdit>,
}

impl MutantEdit {
    fn value(leaf: NodeId, value: impl Into<String>) -> MutantEdit {
        MutantEdit {
            edits: vec![LeafEdit {
                leaf,
                prefix: None,
                value: value.into(),
            }],
        }
    }
}

/// Alternative mutations for the node, if any, tagged with the operator kind
/// used for enable/disable filtering. One node is one mutation site; a site
/// may offer several alternatives (e.g. `+=` -> `-=` and `+=` -> `=`).
pub fn mutants_for(
    tree: &SyntaxTree,
    id: NodeId,
    context: &MutationContext,
) -> Option<(&'static str, Vec<MutantEdit>)> {
    let node = tree.node(id);
    if node.is_leaf() {
        return leaf_mutants(tree, id, node);
    }
    match node.kind {
        "string" => string_mutants(tree, id),
        "lambda" => lambda_mutants(tree, id).map(|m| ("lambda", m)),
        "assignment" => assignment_mutants(tree, id),
        "decorator" => Some(("decorator", decorator_mutants(tree, id))),
        "keyword_argument" => argument_mutants(tree, id, context).map(|m| ("argument", m)),
        _ => None,
    }
}

fn leaf_mutants(
    tree: &SyntaxTree,
    id: NodeId,
    node: &TreeNode,
) -> Option<(&'static str, Vec<MutantEdit>)> {
    let value = tree.leaf_value(id);
    match node.kind {
        "integer" | "float" => {
            number_mutation(value).map(|n| ("number", vec![MutantEdit::value(id, n)]))
        }
        "identifier" => name_mutants(tree, id, value).map(|m| ("name", m)),
        "true" => Some(("keyword", vec![MutantEdit::value(id, "False")])),
        "false" => Some(("keyword", vec![MutantEdit::value(id, "True")])),
        "break" => Some(("keyword", vec![MutantEdit::value(id, "continue")])),
        "continue" => Some(("keyword", vec![MutantEdit::value(id, "break")])),
        "not" => Some(("keyword", vec![MutantEdit::value(id, "")])),
        "in" | "is" => {
            // Not mutated where the swap is structurally invalid: as half of
            // the two-word comparison operators (the grammar emits `not in`
            // and `is not` as sibling tokens) and in for/comprehension
            // clauses. The `not` token next to them is still removable, which
            // yields the undone comparison as the mutant.
            let parent_kind = node.parent.map(|p| tree.kind(p)).unwrap_or("");
            if matches!(parent_kind, "for_statement" | "for_in_clause") {
                return None;
            }
            if sibling_is_not(tree, id, node) {
                return None;
            }
            let replacement = if node.kind == "in" { "not in" } else { "is not" };
            Some(("keyword", vec![MutantEdit::value(id, replacement)]))
        }
        "and" => Some(("and_or", vec![MutantEdit::value(id, "or")])),
        "or" => Some(("and_or", vec![MutantEdit::value(id, "and")])),
        _ => operator_mutants(tree, id, node, value).map(|m| ("operator", m)),
    }
}

/// True when the leaf is the `in` of `not in` or the `is` of `is not`.
fn sibling_is_not(tree: &SyntaxTree, id: NodeId, node: &TreeNode) -> bool {
    let Some(parent) = node.parent else {
        return false;
    };
    let siblings = &tree.node(parent).children;
    let Some(position) = siblings.iter().position(|&c| c == id) else {
        return false;
    };
    let neighbor = if node.kind == "in" {
        position.checked_sub(1).map(|p| siblings[p])
    } else {
        siblings.get(position + 1).copied()
    };
    neighbor.map(|n| tree.kind(n) == "not").unwrap_or(false)
}

fn operator_mutants(
    tree: &SyntaxTree,
    id: NodeId,
    node: &TreeNode,
    value: &str,
) -> Option<Vec<MutantEdit>> {
    if (value == "*" || value == "**") && splat_excluded(tree, id, node) {
        return None;
    }
    if value == "*" && star_import_pattern().matches(tree, id) {
        return None;
    }
    let replacements: &[&str] = match value {
        "+" => &["-"],
        "-" => &["+"],
        "*" => &["/"],
        "/" => &["*"],
        "//" => &["/"],
        "%" => &["/"],
        "<<" => &[">>"],
        ">>" => &["<<"],
        "&" => &["|"],
        "|" => &["&"],
        "^" => &["&"],
        "**" => &["*"],
        "~" => &[""],
        "+=" => &["-=", "="],
        "-=" => &["+=", "="],
        "*=" => &["/=", "="],
        "/=" => &["*=", "="],
        "//=" => &["/=", "="],
        "%=" => &["/=", "="],
        "<<=" => &[">>=", "="],
        ">>=" => &["<<=", "="],
        "&=" => &["|=", "="],
        "|=" => &["&=", "="],
        "^=" => &["&=", "="],
        "**=" => &["*=", "="],
        "~=" => &["="],
        "<" => &["<="],
        "<=" => &["<"],
        ">" => &[">="],
        ">=" => &[">"],
        "==" => &["!="],
        "!=" => &["=="],
        "<>" => &["=="],
        _ => return None,
    };
    Some(
        replacements
            .iter()
            .map(|r| MutantEdit::value(id, *r))
            .collect(),
    )
}

/// `*`/`**` in parameter lists and call arguments are unpacking markers, not
/// arithmetic.
fn splat_excluded(tree: &SyntaxTree, _id: NodeId, node: &TreeNode) -> bool {
    let Some(parent) = node.parent else {
        return false;
    };
    match tree.kind(parent) {
        "parameters" | "lambda_parameters" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            true
        }
        "list_splat" | "dictionary_splat" => tree
            .parent(parent)
            .map(|gp| tree.kind(gp) == "argument_list")
            .unwrap_or(false),
        _ => false,
    }
}

fn number_mutation(value: &str) -> Option<String> {
    let mut text = value.to_string();
    let mut suffix = String::new();
    if let Some(last) = text.chars().last() {
        if matches!(last, 'l' | 'L' | 'j' | 'J') {
            suffix.push(last);
            text.pop();
        }
    }
    let lower = text.to_lowercase();
    let (radix, prefix_len) = if lower.starts_with("0x") {
        (16, 2)
    } else if lower.starts_with("0o") {
        (8, 2)
    } else if lower.starts_with("0b") {
        (2, 2)
    } else {
        (10, 0)
    };
    let prefix = &text[..prefix_len];
    let digits = text[prefix_len..].replace('_', "");

    let result = if let Ok(parsed) = u128::from_str_radix(&digits, radix) {
        let incremented = parsed.checked_add(1)?;
        match radix {
            16 => format!("{prefix}{incremented:x}"),
            8 => format!("{prefix}{incremented:o}"),
            2 => format!("{prefix}{incremented:b}"),
            _ => incremented.to_string(),
        }
    } else {
        let parsed: f64 = digits.parse().ok()?;
        let mutated = if (1e-5 < parsed.abs() && parsed.abs() < 1e5) || parsed == 0.0 {
            parsed + 1.0
        } else {
            parsed * 2.0
        };
        if mutated.fract() == 0.0 && mutated.abs() < 1e16 {
            format!("{mutated:.1}")
        } else {
            format!("{mutated}")
        }
    };
    if result.ends_with(&suffix) {
        Some(result)
    } else {
        Some(format!("{result}{suffix}"))
    }
}

fn name_mutants(tree: &SyntaxTree, id: NodeId, value: &str) -> Option<Vec<MutantEdit>> {
    let simple = match value {
        "True" => Some("False"),
        "False" => Some("True"),
        "None" => Some("\"\""),
        "deepcopy" => Some("copy"),
        _ => None,
    };
    if let Some(replacement) = simple {
        return Some(vec![MutantEdit::value(id, replacement)]);
    }
    if array_subscript_pattern().matches(tree, id) || function_call_pattern().matches(tree, id) {
        return Some(vec![MutantEdit::value(id, "None")]);
    }
    None
}

fn string_mutants(tree: &SyntaxTree, id: NodeId) -> Option<(&'static str, Vec<MutantEdit>)> {
    let children = &tree.node(id).children;
    let start = children
        .iter()
        .copied()
        .find(|&c| tree.kind(c) == "string_start")?;
    let end = children
        .iter()
        .copied()
        .rfind(|&c| tree.kind(c) == "string_end")?;
    let start_value = tree.leaf_value(start);
    let quote_at = start_value.find(['"', '\''])?;
    let quote = &start_value[quote_at..];
    if quote.starts_with("\"\"\"") || quote.starts_with("'''") {
        // Triple-quoted strings are overwhelmingly docstrings.
        return None;
    }
    let kind = if start_value[..quote_at].to_lowercase().contains('f') {
        "fstring"
    } else {
        "string"
    };
    let edits = vec![
        LeafEdit {
            leaf: start,
            prefix: None,
            value: format!("{start_value}XX"),
        },
        LeafEdit {
            leaf: end,
            prefix: None,
            value: format!("XX{}", tree.leaf_value(end)),
        },
    ];
    Some((kind, vec![MutantEdit { edits }]))
}

fn lambda_mutants(tree: &SyntaxTree, id: NodeId) -> Option<Vec<MutantEdit>> {
    let children = &tree.node(id).children;
    let colon = children.iter().position(|&c| tree.kind(c) == ":")?;
    let body = &children[colon + 1..];
    let first_body = body.first().copied()?;
    if body.len() == 1 && tree.kind(first_body) == "none" {
        return Some(vec![MutantEdit {
            edits: vec![LeafEdit {
                leaf: first_body,
                prefix: Some(String::new()),
                value: " 0".to_string(),
            }],
        }]);
    }
    let mut leaves = Vec::new();
    for &node in body {
        leaves.extend(tree.subtree_leaves(node));
    }
    Some(vec![replace_leaves_with(&leaves, " None")])
}

fn assignment_mutants(tree: &SyntaxTree, id: NodeId) -> Option<(&'static str, Vec<MutantEdit>)> {
    let children = &tree.node(id).children;
    let has_eq = children.iter().any(|&c| tree.kind(c) == "=");
    let annotated = children.iter().any(|&c| tree.kind(c) == ":");
    if !has_eq {
        return None;
    }
    let right = *children.last()?;
    if tree.kind(right) == "assignment" {
        // Chained assignment; only the innermost value is a mutation site.
        return None;
    }
    let leaves = tree.subtree_leaves(right);
    let replacement = if leaves.len() == 1 && tree.kind(right) == "none" {
        " \"\""
    } else {
        " None"
    };
    let kind = if annotated { "annassign" } else { "expr_stmt" };
    Some((kind, vec![replace_leaves_with(&leaves, replacement)]))
}

fn decorator_mutants(tree: &SyntaxTree, id: NodeId) -> Vec<MutantEdit> {
    // Blank every token; the statement's trailing newline lives in the next
    // leaf's prefix and survives.
    let edits = tree
        .subtree_leaves(id)
        .into_iter()
        .map(|leaf| LeafEdit {
            leaf,
            prefix: Some(String::new()),
            value: String::new(),
        })
        .collect();
    vec![MutantEdit { edits }]
}

fn argument_mutants(
    tree: &SyntaxTree,
    id: NodeId,
    context: &MutationContext,
) -> Option<Vec<MutantEdit>> {
    let argument_list = tree.parent(id)?;
    if tree.kind(argument_list) != "argument_list" {
        return None;
    }
    let call = tree.parent(argument_list)?;
    if tree.kind(call) != "call" {
        return None;
    }
    let callee = *tree.node(call).children.first()?;
    if tree.kind(callee) != "identifier"
        || !context
            .dict_synonyms
            .iter()
            .any(|s| s == tree.leaf_value(callee))
    {
        return None;
    }
    let name = *tree.node(id).children.first()?;
    if tree.kind(name) != "identifier" {
        return None;
    }
    let mutated = format!("{}XX", tree.leaf_value(name));
    Some(vec![MutantEdit::value(name, mutated)])
}

/// Blank all `leaves`, writing `replacement` (with an empty prefix) into the
/// first one.
fn replace_leaves_with(leaves: &[NodeId], replacement: &str) -> MutantEdit {
    let edits = leaves
        .iter()
        .enumerate()
        .map(|(i, &leaf)| LeafEdit {
            leaf,
            prefix: Some(String::new()),
            value: if i == 0 {
                replacement.to_string()
            } else {
                String::new()
            },
        })
        .collect();
    MutantEdit { edits }
}

fn array_subscript_pattern() -> &'static AstPattern {
    static PATTERN: OnceLock<AstPattern> = OnceLock::new();
    PATTERN.get_or_init(|| {
        AstPattern::new("_name[_any]\n#       ^\n", &[]).expect("builtin subscript pattern")
    })
}

fn function_call_pattern() -> &'static AstPattern {
    static PATTERN: OnceLock<AstPattern> = OnceLock::new();
    PATTERN.get_or_init(|| {
        AstPattern::new("_name(_any)\n#       ^\n", &[]).expect("builtin call pattern")
    })
}

fn star_import_pattern() -> &'static AstPattern {
    static PATTERN: OnceLock<AstPattern> = OnceLock::new();
    PATTERN.get_or_init(|| {
        AstPattern::new("from _name import *\n#                 ^\n", &[])
            .expect("builtin star-import pattern")
    })
}
