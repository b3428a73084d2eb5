use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Operator-kind names accepted by `--enable-mutation-types` /
/// `--disable-mutation-types`.
pub const MUTATION_KINDS: &[&str] = &[
    "number",
    "string",
    "fstring",
    "operator",
    "keyword",
    "name",
    "and_or",
    "lambda",
    "expr_stmt",
    "annassign",
    "argument",
    "decorator",
];

pub const DEFAULT_TEST_COMMAND: &str = "python -m pytest -x --assert=plain";

/// Parameters for one mutation-testing run. Cloned into every worker's
/// mutation context.
#[derive(Debug, Clone)]
pub struct Config {
    pub swallow_output: bool,
    pub test_command: String,
    pub default_test_command: String,
    /// `filename -> 1-based covered line numbers`. `Some` enables
    /// coverage-based exclusion; a file absent from the map is fully excluded.
    pub covered_lines_by_filename: Option<HashMap<String, HashSet<usize>>>,
    pub baseline_time_elapsed: f64,
    pub test_time_multiplier: f64,
    pub test_time_base: f64,
    pub dict_synonyms: Vec<String>,
    /// Total number of mutants in this run. A total of 1 marks a forced
    /// single-mutant run, which bypasses the cached-status short-circuit.
    pub total: usize,
    pub tests_dirs: Vec<PathBuf>,
    pub hash_of_tests: String,
    pub pre_mutation: Option<String>,
    pub post_mutation: Option<String>,
    pub paths_to_mutate: Vec<PathBuf>,
    pub mutation_types_to_apply: HashSet<String>,
    pub no_progress: bool,
    pub ci: bool,
    pub rerun_all: bool,
}

impl Config {
    /// A config with defaults suitable for driving the engine directly,
    /// e.g. from tests or library callers.
    pub fn with_test_command(test_command: &str) -> Self {
        Config {
            swallow_output: true,
            test_command: test_command.to_string(),
            default_test_command: test_command.to_string(),
            covered_lines_by_filename: None,
            baseline_time_elapsed: 1.0,
            test_time_multiplier: 2.0,
            test_time_base: 0.0,
            dict_synonyms: vec!["dict".to_string()],
            total: 0,
            tests_dirs: Vec::new(),
            hash_of_tests: String::new(),
            pre_mutation: None,
            post_mutation: None,
            paths_to_mutate: Vec::new(),
            mutation_types_to_apply: MUTATION_KINDS.iter().map(|k| k.to_string()).collect(),
            no_progress: true,
            ci: false,
            rerun_all: false,
        }
    }
}
