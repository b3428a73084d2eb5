use std::fs;

use crate::context::{MutationContext, MutationId, MutationSelection};
use crate::error::{Error, Result};
use crate::hooks::MutationHooks;
use crate::mutations;
use crate::tree::{NodeId, SyntaxTree};

/// Module-level assignments to these names describe packaging metadata and
/// are never worth mutating.
const DUNDER_WHITELIST: &[&str] = &[
    "all",
    "version",
    "title",
    "package_name",
    "author",
    "description",
    "email",
    "license",
    "copyright",
];

/// Parse the context's source and apply its selected mutation(s). Returns the
/// mutated source and the number of mutations performed.
pub fn mutate_from_context(
    context: &mut MutationContext,
    hooks: &dyn MutationHooks,
) -> Result<(String, usize)> {
    let mut tree = SyntaxTree::parse(&context.source, context.filename.as_deref())?;
    let root = tree.root();
    mutate_children(&mut tree, root, context, hooks)?;

    // `is` -> `is not` on an already negated comparison produces a double
    // negation; collapse it textually.
    let mut mutated = tree.serialize().replace(" not not ", " ");
    let mut original = context.source.clone();
    if context.remove_newline_at_end {
        if mutated.ends_with('\n') {
            mutated.pop();
        }
        if original.ends_with('\n') {
            original.pop();
        }
    }
    if !context.performed.is_empty() && mutated == original {
        let name = context
            .filename
            .clone()
            .unwrap_or_else(|| "<source>".to_string());
        return Err(Error::UnchangedMutation(name));
    }
    Ok((mutated, context.performed.len()))
}

/// Enumerate every mutation in the context's source, in application order.
pub fn list_mutations(
    context: &mut MutationContext,
    hooks: &dyn MutationHooks,
) -> Result<Vec<MutationId>> {
    debug_assert!(context.selection == MutationSelection::All);
    mutate_from_context(context, hooks)?;
    Ok(context.performed.clone())
}

/// Apply the context's selected mutation to the file on disk, optionally
/// leaving a `.bak` copy beside it. Returns (original, mutated) source.
pub fn mutate_file(
    backup: bool,
    context: &mut MutationContext,
    hooks: &dyn MutationHooks,
) -> Result<(String, String)> {
    let filename = context
        .filename
        .clone()
        .ok_or_else(|| Error::Config("mutation context has no filename".to_string()))?;
    let original = fs::read_to_string(&filename)?;
    if backup {
        fs::write(format!("{filename}.bak"), &original)?;
    }
    context.set_source(&original);
    let (mutated, _) = mutate_from_context(context, hooks)?;
    fs::write(&filename, &mutated)?;
    Ok((original, mutated))
}

fn done(context: &MutationContext) -> bool {
    !context.performed.is_empty() && context.selection != MutationSelection::All
}

fn mutate_node(
    tree: &mut SyntaxTree,
    id: NodeId,
    context: &mut MutationContext,
    hooks: &dyn MutationHooks,
) -> Result<()> {
    context.stack.push(id);
    let result = mutate_node_inner(tree, id, context, hooks);
    context.stack.pop();
    result
}

fn mutate_node_inner(
    tree: &mut SyntaxTree,
    id: NodeId,
    context: &mut MutationContext,
    hooks: &dyn MutationHooks,
) -> Result<()> {
    let kind = tree.kind(id);
    match kind {
        "import_statement" | "import_from_statement" | "future_import_statement" => return Ok(()),
        "type" if annotation_skipped(tree, id) => return Ok(()),
        _ => {}
    }
    if kind == "call" && call_target_is(tree, id, "__import__") {
        return Ok(());
    }

    let row = tree.node(id).row;
    if row != context.current_line_index {
        context.current_line_index = row;
        context.index = 0;
    }

    if kind == "assignment" {
        if let Some(&first) = tree.node(id).children.first() {
            if tree.kind(first) == "identifier" && is_whitelisted_dunder(tree.leaf_value(first)) {
                return Ok(());
            }
        }
        if is_bare_annotation(tree, id) {
            return Ok(());
        }
    }

    if !tree.node(id).children.is_empty() {
        mutate_children(tree, id, context, hooks)?;
        if done(context) {
            return Ok(());
        }
    }

    let Some((mutation_kind, alternatives)) = mutations::mutants_for(tree, id, context) else {
        return Ok(());
    };
    if context.exclude_line() {
        // Excluded sites still consume indices so that ids elsewhere on the
        // line stay stable when exclusions change.
        context.index += alternatives.len();
        return Ok(());
    }
    // Reverse order so the last applied alternative is the historical default.
    for alternative in alternatives.iter().rev() {
        hooks.pre_mutation_ast(context);
        if context.should_mutate(mutation_kind) {
            context.performed.push(context.mutation_id_of_current_index());
            for edit in &alternative.edits {
                tree.set_leaf(edit.leaf, edit.prefix.clone(), edit.value.clone());
            }
        }
        context.index += 1;
        if done(context) {
            return Ok(());
        }
    }
    Ok(())
}

fn mutate_children(
    tree: &mut SyntaxTree,
    id: NodeId,
    context: &mut MutationContext,
    hooks: &dyn MutationHooks,
) -> Result<()> {
    let children = tree.node(id).children.clone();
    let mut in_return_annotation = false;
    for child in children {
        let child_kind = tree.kind(child);
        if child_kind == "->" {
            in_return_annotation = true;
        }
        if in_return_annotation && child_kind == ":" {
            in_return_annotation = false;
        }
        if in_return_annotation {
            continue;
        }
        mutate_node(tree, child, context, hooks)?;
        if done(context) {
            return Ok(());
        }
    }
    Ok(())
}

fn annotation_skipped(tree: &SyntaxTree, id: NodeId) -> bool {
    // Parameter and return-type annotations are types, not behavior.
    // Annotations on assignments are still walked for their value-like
    // subexpressions.
    matches!(
        tree.parent(id).map(|p| tree.kind(p)).unwrap_or(""),
        "typed_parameter" | "typed_default_parameter" | "function_definition"
    )
}

fn call_target_is(tree: &SyntaxTree, id: NodeId, name: &str) -> bool {
    tree.node(id)
        .children
        .first()
        .map(|&callee| tree.kind(callee) == "identifier" && tree.leaf_value(callee) == name)
        .unwrap_or(false)
}

fn is_bare_annotation(tree: &SyntaxTree, id: NodeId) -> bool {
    let children = &tree.node(id).children;
    children.iter().any(|&c| tree.kind(c) == ":") && !children.iter().any(|&c| tree.kind(c) == "=")
}

fn is_whitelisted_dunder(name: &str) -> bool {
    name.strip_prefix("__")
        .and_then(|n| n.strip_suffix("__"))
        .map(|n| DUNDER_WHITELIST.contains(&n))
        .unwrap_or(false)
}
