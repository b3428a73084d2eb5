use pymut::error::Error;
use pymut::tree::SyntaxTree;

fn round_trips(source: &str) {
    let tree = SyntaxTree::parse(source, None).unwrap();
    assert_eq!(tree.serialize(), source);
}

#[test]
fn serialization_reproduces_the_input() {
    round_trips("x = 1\n");
    round_trips("");
    round_trips("# only a comment\n");
    round_trips("x = 1");
}

#[test]
fn serialization_preserves_odd_spacing_and_comments() {
    round_trips(
        "#!/usr/bin/env python\n\
         # leading comment\n\
         \n\
         import os\n\
         \n\
         \n\
         def foo(a,   b = 2):  # trailing\n\
         \tx = {'k': [1, 2],}\n\
         \ts = f\"{a}!\"\n\
         \treturn a   +b\n\
         \n\
         class C:\n\
         \t\"\"\"doc\"\"\"\n\
         \tpass\n",
    );
}

#[test]
fn serialization_preserves_crlf_line_endings() {
    round_trips("x = 1\r\ny = 2\r\n");
}

#[test]
fn serialization_preserves_trailing_whitespace() {
    round_trips("x = 1   \n\n   \n");
}

#[test]
fn syntax_errors_fail_the_parse() {
    let result = SyntaxTree::parse("def f(:\n", Some("broken.py"));
    match result {
        Err(Error::Parse { filename, .. }) => assert_eq!(filename, "broken.py"),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn leaves_come_back_in_source_order() {
    let tree = SyntaxTree::parse("a = b + c\n", None).unwrap();
    let values: Vec<&str> = tree.leaves().map(|id| tree.leaf_value(id)).collect();
    assert_eq!(values, vec!["a", "=", "b", "+", "c", ""]);
}

#[test]
fn find_leaf_at_hits_the_spanning_token() {
    let tree = SyntaxTree::parse("foo = barbaz\n", None).unwrap();
    let leaf = tree.find_leaf_at(0, 8).unwrap();
    assert_eq!(tree.leaf_value(leaf), "barbaz");
    assert!(tree.find_leaf_at(0, 3).is_none());
    assert!(tree.find_leaf_at(5, 0).is_none());
}

#[test]
fn editing_a_leaf_changes_only_that_token() {
    let mut tree = SyntaxTree::parse("a = b + c\n", None).unwrap();
    let plus = tree
        .leaves()
        .find(|&id| tree.leaf_value(id) == "+")
        .unwrap();
    tree.set_leaf(plus, None, "-".to_string());
    assert_eq!(tree.serialize(), "a = b - c\n");
}

#[test]
fn subtree_leaves_are_leftmost_first() {
    let tree = SyntaxTree::parse("a = b + c\n", None).unwrap();
    let plus = tree
        .leaves()
        .find(|&id| tree.leaf_value(id) == "+")
        .unwrap();
    let expr = tree.parent(plus).unwrap();
    let values: Vec<&str> = tree
        .subtree_leaves(expr)
        .into_iter()
        .map(|id| tree.leaf_value(id))
        .collect();
    assert_eq!(values, vec!["b", "+", "c"]);
}
