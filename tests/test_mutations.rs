use pymut::config::Config;
use pymut::context::{MutationContext, MutationId, MutationSelection};
use pymut::hooks::NoHooks;
use pymut::mutate;

fn list(source: &str) -> Vec<MutationId> {
    let mut context = MutationContext::new(
        source.to_string(),
        MutationSelection::All,
        Vec::new(),
        None,
        None,
    );
    mutate::list_mutations(&mut context, &NoHooks).unwrap()
}

fn apply(source: &str, id: &MutationId) -> String {
    let mut context = MutationContext::new(
        source.to_string(),
        MutationSelection::Id(id.clone()),
        Vec::new(),
        None,
        None,
    );
    mutate::mutate_from_context(&mut context, &NoHooks).unwrap().0
}

fn all_mutants(source: &str) -> Vec<String> {
    list(source).iter().map(|id| apply(source, id)).collect()
}

#[test]
fn binary_expression_enumerates_children_before_parent() {
    assert_eq!(all_mutants("1+1"), vec!["2+1", "1-1", "1+2"]);
}

#[test]
fn assignment_value_becomes_none_after_child_sites() {
    assert_eq!(all_mutants("a = b + c"), vec!["a = b - c", "a = None"]);
}

#[test]
fn compound_assignment_yields_two_ordered_alternatives() {
    assert_eq!(all_mutants("x += 1"), vec!["x = 1", "x -= 1", "x += 2"]);
}

#[test]
fn enumeration_is_deterministic() {
    let source = "a = b + c\nx = [1, 2]\n";
    assert_eq!(list(source), list(source));
    assert_eq!(all_mutants(source), all_mutants(source));
}

#[test]
fn pragma_comment_excludes_the_whole_line() {
    assert!(all_mutants("a = b + c  # pragma: no mutate").is_empty());
    let mutants = all_mutants("a = b + c  # pragma: no mutate\nx = 1\n");
    assert_eq!(
        mutants,
        vec![
            "a = b + c  # pragma: no mutate\nx = 2\n",
            "a = b + c  # pragma: no mutate\nx = None\n",
        ]
    );
}

#[test]
fn mutation_ids_carry_line_text_and_per_line_index() {
    let ids = list("a = b + c\nx = 1\n");
    assert_eq!(ids[0].line, "a = b + c");
    assert_eq!(ids[0].index, 0);
    assert_eq!(ids[0].line_number, 0);
    assert_eq!(ids[1].line, "a = b + c");
    assert_eq!(ids[1].index, 1);
    assert_eq!(ids[2].line, "x = 1");
    assert_eq!(ids[2].index, 0);
    assert_eq!(ids[2].line_number, 1);
}

#[test]
fn disabled_operator_kinds_still_consume_indices() {
    let mut config = Config::with_test_command("true");
    config.mutation_types_to_apply.remove("operator");
    let mut context = MutationContext::new(
        "a = b + c".to_string(),
        MutationSelection::All,
        Vec::new(),
        None,
        Some(config),
    );
    let ids = mutate::list_mutations(&mut context, &NoHooks).unwrap();
    // The operator site is filtered out but its index is not reused.
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].index, 1);
}

#[test]
fn string_gets_xx_markers_inside_the_quotes() {
    assert_eq!(
        all_mutants("a = \"foo\""),
        vec!["a = \"XXfooXX\"", "a = None"]
    );
}

#[test]
fn empty_string_still_changes() {
    assert_eq!(all_mutants("a = ''"), vec!["a = 'XXXX'", "a = None"]);
}

#[test]
fn triple_quoted_strings_are_left_alone() {
    assert!(all_mutants("def f():\n    \"\"\"doc\"\"\"\n").is_empty());
}

#[test]
fn fstring_mutates_delimiters_and_inner_expressions_separately() {
    let mutants = all_mutants("a = f\"{x + y}!\"");
    assert!(mutants.contains(&"a = f\"{x - y}!\"".to_string()));
    assert!(mutants.contains(&"a = f\"XX{x + y}!XX\"".to_string()));
    assert!(mutants.contains(&"a = None".to_string()));
    assert_eq!(mutants.len(), 3);
}

#[test]
fn number_mutations_preserve_radix_and_suffix() {
    assert_eq!(all_mutants("x = 0x10"), vec!["x = 0x11", "x = None"]);
    assert_eq!(all_mutants("x = 0b101"), vec!["x = 0b110", "x = None"]);
    assert_eq!(all_mutants("x = 0o17"), vec!["x = 0o20", "x = None"]);
    assert_eq!(all_mutants("x = 5j"), vec!["x = 6j", "x = None"]);
    assert_eq!(all_mutants("x = 1_000"), vec!["x = 1001", "x = None"]);
}

#[test]
fn float_mutations_increment_in_range_and_double_outside() {
    assert_eq!(all_mutants("x = 1.5"), vec!["x = 2.5", "x = None"]);
    assert_eq!(all_mutants("x = 100.0"), vec!["x = 101.0", "x = None"]);
    assert_eq!(all_mutants("x = 0.0"), vec!["x = 1.0", "x = None"]);
    assert_eq!(all_mutants("x = 1e6"), vec!["x = 2000000.0", "x = None"]);
}

#[test]
fn comparison_operators_swap() {
    assert_eq!(all_mutants("a < b"), vec!["a <= b"]);
    assert_eq!(all_mutants("a <= b"), vec!["a < b"]);
    assert_eq!(all_mutants("a > b"), vec!["a >= b"]);
    assert_eq!(all_mutants("a == b"), vec!["a != b"]);
    assert_eq!(all_mutants("a != b"), vec!["a == b"]);
}

#[test]
fn membership_and_identity_swaps() {
    assert_eq!(all_mutants("a in b"), vec!["a not in b"]);
    assert_eq!(all_mutants("a is b"), vec!["a is not b"]);

    // The two-word forms only lose their `not`; the surrounding whitespace
    // stays put.
    assert_eq!(all_mutants("a not in b"), vec!["a  in b"]);
    assert_eq!(all_mutants("a is not b"), vec!["a is  b"]);
}

#[test]
fn in_is_not_mutated_in_loops_and_comprehensions() {
    assert!(all_mutants("for x in y:\n    pass\n").is_empty());
    assert_eq!(all_mutants("a = [x for x in y]"), vec!["a = None"]);
}

#[test]
fn not_operator_is_removed() {
    assert_eq!(all_mutants("not x"), vec![" x"]);
}

#[test]
fn break_and_continue_swap() {
    assert_eq!(
        all_mutants("while True:\n    break\n"),
        vec![
            "while False:\n    break\n",
            "while True:\n    continue\n",
        ]
    );
}

#[test]
fn boolean_operators_swap() {
    assert_eq!(all_mutants("a and b"), vec!["a or b"]);
    assert_eq!(all_mutants("a or b"), vec!["a and b"]);
}

#[test]
fn arithmetic_and_bitwise_operators_swap() {
    assert_eq!(all_mutants("a * b"), vec!["a / b"]);
    assert_eq!(all_mutants("a // b"), vec!["a / b"]);
    assert_eq!(all_mutants("a % b"), vec!["a / b"]);
    assert_eq!(all_mutants("a << b"), vec!["a >> b"]);
    assert_eq!(all_mutants("a & b"), vec!["a | b"]);
    assert_eq!(all_mutants("a ^ b"), vec!["a & b"]);
    assert_eq!(all_mutants("a ** b"), vec!["a * b"]);
}

#[test]
fn none_assignment_turns_into_empty_string() {
    assert_eq!(all_mutants("x = None"), vec!["x = \"\""]);
}

#[test]
fn true_and_false_flip() {
    assert_eq!(all_mutants("x = True"), vec!["x = False", "x = None"]);
    assert_eq!(all_mutants("x = False"), vec!["x = True", "x = None"]);
}

#[test]
fn chained_assignment_only_mutates_the_innermost_value() {
    assert_eq!(all_mutants("a = b = c"), vec!["a = b = None"]);
}

#[test]
fn annotated_assignment_keeps_its_annotation() {
    assert_eq!(all_mutants("x: int = 5"), vec!["x: int = 6", "x: int = None"]);
    assert!(all_mutants("x: int").is_empty());
}

#[test]
fn return_type_annotations_are_not_mutated() {
    let mutants = all_mutants("def f() -> int:\n    return 1\n");
    assert_eq!(mutants, vec!["def f() -> int:\n    return 2\n"]);
}

#[test]
fn lambda_body_becomes_none_and_back() {
    assert_eq!(
        all_mutants("f = lambda: 0"),
        vec!["f = lambda: 1", "f = lambda: None", "f = None"]
    );
    assert_eq!(
        all_mutants("f = lambda: None"),
        vec!["f = lambda: 0", "f = None"]
    );
}

#[test]
fn decorator_is_deleted_keeping_the_newline() {
    assert_eq!(
        all_mutants("@foo\ndef bar():\n    pass\n"),
        vec!["\ndef bar():\n    pass\n"]
    );
}

#[test]
fn imports_are_never_mutated() {
    assert!(all_mutants("import os\n").is_empty());
    assert!(all_mutants("from os import path\n").is_empty());
    assert!(all_mutants("from os import *\n").is_empty());
}

#[test]
fn dunder_metadata_assignments_are_skipped() {
    assert!(all_mutants("__version__ = '1.0'\n").is_empty());
    assert!(all_mutants("__all__ = ['a']\n").is_empty());
    // Unknown dunders are fair game.
    assert_eq!(all_mutants("__weird__ = 2\n").len(), 2);
}

#[test]
fn import_dunder_calls_are_skipped() {
    // Nothing inside the call is touched; the statement-level site remains.
    assert_eq!(
        all_mutants("mod = __import__('x')\n"),
        vec!["mod = None\n"]
    );
}

#[test]
fn splat_markers_are_not_arithmetic() {
    assert!(all_mutants("foo(*args)").is_empty());
    assert!(all_mutants("foo(**kwargs)").is_empty());
    assert!(all_mutants("def f(*args, **kwargs):\n    pass\n").is_empty());
}

#[test]
fn dict_splats_are_plain_operators() {
    // Unlike call-argument splats, `**` inside a dictionary display is an
    // ordinary operator site.
    assert_eq!(
        all_mutants("x = {**a, **b}"),
        vec!["x = {*a, **b}", "x = {**a, *b}", "x = None"]
    );
}

#[test]
fn deepcopy_becomes_copy() {
    // The argument is not a bare-statement call argument, so only the name
    // substitution and the assignment site fire.
    assert_eq!(
        all_mutants("b = deepcopy(a)"),
        vec!["b = copy(a)", "b = None"]
    );
    assert_eq!(all_mutants("deepcopy(a)"), vec!["copy(a)", "deepcopy(None)"]);
}

#[test]
fn subscript_index_name_becomes_none_only_as_a_statement() {
    assert_eq!(all_mutants("foo[bar]"), vec!["foo[None]"]);
    assert_eq!(
        all_mutants("foo[bar] = 1"),
        vec!["foo[bar] = 2", "foo[bar] = None"]
    );
}

#[test]
fn single_call_argument_name_becomes_none() {
    assert_eq!(all_mutants("foo(bar)"), vec!["foo(None)"]);
    // Multiple arguments don't match the single-argument shape.
    assert!(all_mutants("foo(bar, baz)").is_empty());
}

#[test]
fn dict_call_keyword_arguments_get_suffixed() {
    assert_eq!(
        all_mutants("a = dict(b=1)"),
        vec!["a = dict(b=2)", "a = dict(bXX=1)", "a = None"]
    );
}

#[test]
fn dict_synonyms_extend_the_keyword_argument_rule() {
    let mut context = MutationContext::new(
        "a = OrderedDict(b=1)".to_string(),
        MutationSelection::All,
        vec!["OrderedDict".to_string()],
        None,
        None,
    );
    let ids = mutate::list_mutations(&mut context, &NoHooks).unwrap();
    let mutants: Vec<String> = ids
        .iter()
        .map(|id| {
            let mut context = MutationContext::new(
                "a = OrderedDict(b=1)".to_string(),
                MutationSelection::Id(id.clone()),
                vec!["OrderedDict".to_string()],
                None,
                None,
            );
            mutate::mutate_from_context(&mut context, &NoHooks).unwrap().0
        })
        .collect();
    assert!(mutants.contains(&"a = OrderedDict(bXX=1)".to_string()));
}

#[test]
fn applying_by_id_reproduces_the_enumerated_mutant() {
    let source = "def f(a, b):\n    if a < b:\n        return a * b\n    return not a\n";
    let ids = list(source);
    assert!(!ids.is_empty());
    for id in &ids {
        let mutated = apply(source, id);
        assert_ne!(mutated, source, "mutant {id:?} must change the source");
    }
}

#[test]
fn sources_without_trailing_newline_stay_that_way() {
    for mutant in all_mutants("x = 1") {
        assert!(!mutant.ends_with('\n'));
    }
}
