use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use pymut::cache::{self, Cache};
use pymut::config::{Config, DEFAULT_TEST_COMMAND, MUTATION_KINDS};
use pymut::context::{MutationContext, MutationId, MutationSelection};
use pymut::hooks::NoHooks;
use pymut::mutate;
use pymut::output::{self, OutputLegend};
use pymut::scheduler::{self, Progress, RunOptions};
use pymut::{guess_paths_to_mutate, python_source_files, runner};

#[derive(Parser)]
#[command(name = "pymut", version, about = "Mutation testing for Python projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation testing
    Run(RunArgs),
    /// Print the results of previous runs, grouped by verdict
    Results,
    /// Show the diff of a mutant by id
    Show {
        id: u64,
    },
    /// Write a mutant to disk (a .bak copy is left beside the file)
    Apply {
        id: u64,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Only run the mutant with this id
    id: Option<u64>,
    /// Paths to mutate (guessed when omitted)
    #[arg(long = "paths-to-mutate", value_delimiter = ',')]
    paths: Vec<PathBuf>,
    /// Test command to run against mutations
    #[arg(long, default_value = DEFAULT_TEST_COMMAND)]
    runner: String,
    /// Directory containing the tests (repeatable)
    #[arg(long = "tests-dir")]
    tests_dirs: Vec<PathBuf>,
    /// Multiplier on the baseline time before a kill turns suspicious
    #[arg(long, default_value = "2.0")]
    test_time_multiplier: f64,
    /// Flat addition to the suspicious-time allowance, in seconds
    #[arg(long, default_value = "0.0")]
    test_time_base: f64,
    /// Show test output instead of swallowing it
    #[arg(long)]
    show_output: bool,
    /// Function names treated like dict() for keyword-argument mutation
    #[arg(long = "dict-synonyms", value_delimiter = ',')]
    dict_synonyms: Vec<String>,
    /// Only apply these mutation types (comma separated)
    #[arg(long = "enable-mutation-types", value_delimiter = ',')]
    enabled_types: Vec<String>,
    /// Apply all but these mutation types (comma separated)
    #[arg(long = "disable-mutation-types", value_delimiter = ',')]
    disabled_types: Vec<String>,
    /// JSON file mapping filenames to covered line numbers; uncovered lines
    /// are not mutated
    #[arg(long = "use-coverage")]
    coverage: Option<PathBuf>,
    /// File or directory names to leave alone (repeatable, `*` at either end)
    #[arg(long = "paths-to-exclude")]
    paths_to_exclude: Vec<String>,
    /// ASCII progress symbols instead of emoji
    #[arg(long)]
    simple_output: bool,
    /// Don't redraw the progress line
    #[arg(long)]
    no_progress: bool,
    /// Collapse the exit code to 0/1
    #[arg(long)]
    ci: bool,
    /// Re-test survivors of a narrowed test command against the full suite
    #[arg(long)]
    rerun_all: bool,
    /// Number of parallel workers, each with its own project copy
    #[arg(long, default_value = "1")]
    parallelize: usize,
    /// Shell command to run before each mutant
    #[arg(long = "pre-mutation")]
    pre_mutation: Option<String>,
    /// Shell command to run after each mutant is restored
    #[arg(long = "post-mutation")]
    post_mutation: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Results => cmd_results(),
        Commands::Show { id } => cmd_show(id),
        Commands::Apply { id } => cmd_apply(id),
    };

    process::exit(exit_code);
}

fn mutation_types_to_apply(args: &RunArgs) -> Result<HashSet<String>, String> {
    if !args.enabled_types.is_empty() && !args.disabled_types.is_empty() {
        return Err(
            "You can't combine --enable-mutation-types and --disable-mutation-types".to_string(),
        );
    }
    let all: HashSet<String> = MUTATION_KINDS.iter().map(|k| k.to_string()).collect();
    let selection = if !args.enabled_types.is_empty() {
        args.enabled_types.clone()
    } else {
        args.disabled_types.clone()
    };
    for kind in &selection {
        if !all.contains(kind) {
            return Err(format!(
                "The mutation type '{kind}' does not exist. Available: {}",
                MUTATION_KINDS.join(", ")
            ));
        }
    }
    if !args.enabled_types.is_empty() {
        Ok(selection.into_iter().collect())
    } else {
        Ok(all
            .into_iter()
            .filter(|k| !selection.contains(k))
            .collect())
    }
}

fn load_coverage_map(
    path: &PathBuf,
) -> Result<HashMap<String, HashSet<usize>>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read coverage file {}: {e}", path.display()))?;
    let raw: HashMap<String, Vec<usize>> = serde_json::from_str(&text)
        .map_err(|e| format!("invalid coverage file {}: {e}", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|(file, lines)| (file, lines.into_iter().collect()))
        .collect())
}

/// Look up a single mutant by pk, remapping the cached line numbers of its
/// file first so an edited source still resolves to the right line.
fn resolve_single_mutant(
    cache: &mut Cache,
    id: u64,
) -> pymut::error::Result<(String, MutationId)> {
    let (filename, _) = cache.filename_and_mutation_id_from_pk(id)?;
    cache.update_line_numbers(&filename)?;
    cache.filename_and_mutation_id_from_pk(id)
}

fn cmd_run(args: RunArgs) -> i32 {
    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            output::print_error(&format!("failed to resolve working directory: {e}"));
            return 1;
        }
    };

    let tests_dirs = if args.tests_dirs.is_empty() {
        vec![PathBuf::from("tests")]
    } else {
        args.tests_dirs.clone()
    };
    if !tests_dirs.iter().any(|d| d.is_dir()) {
        output::print_error(&format!(
            "No test directory found (looked for {})",
            tests_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        return 1;
    }

    let paths_to_mutate = if args.paths.is_empty() {
        match guess_paths_to_mutate() {
            Ok(path) => vec![path],
            Err(e) => {
                output::print_error(&e.to_string());
                return 1;
            }
        }
    } else {
        args.paths.clone()
    };

    let mutation_types = match mutation_types_to_apply(&args) {
        Ok(types) => types,
        Err(message) => {
            output::print_error(&message);
            return 1;
        }
    };

    let covered_lines_by_filename = match &args.coverage {
        Some(path) => match load_coverage_map(path) {
            Ok(map) => Some(map),
            Err(message) => {
                output::print_error(&message);
                return 1;
            }
        },
        None => None,
    };

    let mut cache = Cache::open(&project_root);
    let hash_of_tests = match cache::hash_of_tests(&tests_dirs) {
        Ok(hash) => hash,
        Err(e) => {
            output::print_error(&e.to_string());
            return 1;
        }
    };

    let mut config = Config {
        swallow_output: !args.show_output,
        test_command: args.runner.clone(),
        default_test_command: args.runner.clone(),
        covered_lines_by_filename,
        baseline_time_elapsed: 1.0,
        test_time_multiplier: args.test_time_multiplier,
        test_time_base: args.test_time_base,
        dict_synonyms: args.dict_synonyms.clone(),
        total: 0,
        tests_dirs: tests_dirs.clone(),
        hash_of_tests: hash_of_tests.clone(),
        pre_mutation: args.pre_mutation.clone(),
        post_mutation: args.post_mutation.clone(),
        paths_to_mutate: paths_to_mutate.clone(),
        mutation_types_to_apply: mutation_types,
        no_progress: args.no_progress,
        ci: args.ci,
        rerun_all: args.rerun_all,
    };

    // Baseline: reuse the cached timing while the test suite is unchanged.
    let cached_time = cache.cached_test_time();
    let baseline = match (cached_time, cache.cached_hash_of_tests()) {
        (Some(time), Some(cached_hash)) if cached_hash == hash_of_tests => {
            println!("1. Using cached time for baseline tests");
            time
        }
        _ => {
            println!("1. Running tests without mutations");
            let mut feedback = |line: &str| {
                if !config.swallow_output {
                    println!("{line}");
                }
            };
            match runner::time_test_suite(&config, &project_root, &mut feedback) {
                Ok(time) => {
                    cache.set_cached_test_time(time, &hash_of_tests);
                    time
                }
                Err(e) => {
                    output::print_error(&e.to_string());
                    return 1;
                }
            }
        }
    };
    config.baseline_time_elapsed = baseline;

    println!("2. Checking mutants");
    let mut mutations_by_file: BTreeMap<String, Vec<MutationId>> = BTreeMap::new();
    if let Some(id) = args.id {
        match resolve_single_mutant(&mut cache, id) {
            Ok((filename, mutation_id)) => {
                mutations_by_file.insert(filename, vec![mutation_id]);
            }
            Err(e) => {
                output::print_error(&e.to_string());
                return 1;
            }
        }
    } else {
        for path in &paths_to_mutate {
            let files = match python_source_files(path, &tests_dirs, &args.paths_to_exclude) {
                Ok(files) => files,
                Err(e) => {
                    output::print_error(&e.to_string());
                    return 1;
                }
            };
            for file in files {
                let filename = file.to_string_lossy().to_string();
                if let Err(e) = cache.update_line_numbers(&filename) {
                    output::print_error(&e.to_string());
                    return 1;
                }
                let source = match fs::read_to_string(&file) {
                    Ok(source) => source,
                    Err(e) => {
                        output::print_error(&format!("failed to read {filename}: {e}"));
                        return 1;
                    }
                };
                let mut context = MutationContext::new(
                    source,
                    MutationSelection::All,
                    config.dict_synonyms.clone(),
                    Some(filename.clone()),
                    Some(config.clone()),
                );
                match mutate::list_mutations(&mut context, &NoHooks) {
                    Ok(mutations) => {
                        if !mutations.is_empty() {
                            mutations_by_file.insert(filename, mutations);
                        }
                    }
                    Err(e) => {
                        output::print_error(&e.to_string());
                        return 1;
                    }
                }
            }
        }
    }

    config.total = mutations_by_file.values().map(|m| m.len()).sum();
    let legend = if args.simple_output {
        OutputLegend::simple()
    } else {
        OutputLegend::emoji()
    };
    let mut progress = Progress::new(config.total, legend, config.no_progress);

    let options = RunOptions {
        num_workers: args.parallelize.max(1),
        parallel: args.parallelize > 1,
        project_root,
    };
    let fatal = match scheduler::run_mutation_tests(
        &config,
        &mut cache,
        &mut progress,
        &mutations_by_file,
        Arc::new(NoHooks),
        &options,
    ) {
        Ok(fatal) => fatal,
        Err(e) => {
            output::print_error(&e.to_string());
            true
        }
    };
    println!();

    let exit_code = scheduler::compute_exit_code(&progress, fatal, config.ci);
    if exit_code == 0 {
        output::print_success(&format!(
            "{}/{} mutants killed",
            progress.killed_mutants, progress.total
        ));
    } else {
        output::print_results(&cache);
    }
    exit_code
}

fn cmd_results() -> i32 {
    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            output::print_error(&format!("failed to resolve working directory: {e}"));
            return 1;
        }
    };
    let cache = Cache::open(&project_root);
    output::print_results(&cache);
    0
}

fn cmd_show(id: u64) -> i32 {
    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            output::print_error(&format!("failed to resolve working directory: {e}"));
            return 1;
        }
    };
    let mut cache = Cache::open(&project_root);
    match cache.get_unified_diff(id, &[], true, None) {
        Ok(diff) if diff.is_empty() => {
            output::print_warning("mutant can't be seen (the source may have changed)");
            0
        }
        Ok(diff) => {
            print!("{diff}");
            0
        }
        Err(e) => {
            output::print_error(&e.to_string());
            1
        }
    }
}

fn cmd_apply(id: u64) -> i32 {
    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            output::print_error(&format!("failed to resolve working directory: {e}"));
            return 1;
        }
    };
    let cache = Cache::open(&project_root);
    let (filename, mutation_id) = match cache.filename_and_mutation_id_from_pk(id) {
        Ok(found) => found,
        Err(e) => {
            output::print_error(&e.to_string());
            return 1;
        }
    };
    let source = match fs::read_to_string(&filename) {
        Ok(source) => source,
        Err(e) => {
            output::print_error(&format!("failed to read {filename}: {e}"));
            return 1;
        }
    };
    let mut context = MutationContext::new(
        source,
        MutationSelection::Id(mutation_id),
        Vec::new(),
        Some(filename.clone()),
        None,
    );
    match mutate::mutate_file(true, &mut context, &NoHooks) {
        Ok((_, _)) if context.performed.is_empty() => {
            output::print_warning("mutant no longer maps to the source; nothing written");
            0
        }
        Ok(_) => {
            output::print_success(&format!("applied mutant {id} to {filename}"));
            0
        }
        Err(e) => {
            output::print_error(&e.to_string());
            1
        }
    }
}
