use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use pymut::cache::Cache;
use pymut::config::Config;
use pymut::context::{MutationContext, MutationId, MutationSelection};
use pymut::hooks::NoHooks;
use pymut::mutate;
use pymut::output::OutputLegend;
use pymut::scheduler::{Progress, RunOptions, compute_exit_code, run_mutation_tests};
use pymut::status::MutantStatus;

const SOURCE: &str = "def f():\n    return 1 + 2\n";

struct Project {
    dir: TempDir,
    filename: String,
    config: Config,
    cache: Cache,
    mutations: BTreeMap<String, Vec<MutationId>>,
}

fn project(command: &str) -> Project {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foo.py");
    fs::write(&path, SOURCE).unwrap();
    let filename = path.to_string_lossy().to_string();

    let mut cache = Cache::open(dir.path());
    cache.update_line_numbers(&filename).unwrap();

    let mut context = MutationContext::new(
        SOURCE.to_string(),
        MutationSelection::All,
        Vec::new(),
        Some(filename.clone()),
        None,
    );
    let ids = mutate::list_mutations(&mut context, &NoHooks).unwrap();
    assert_eq!(ids.len(), 3);

    let mut config = Config::with_test_command(command);
    config.baseline_time_elapsed = 0.1;
    config.hash_of_tests = "tests-hash".to_string();
    config.total = ids.len();

    let mut mutations = BTreeMap::new();
    mutations.insert(filename.clone(), ids);
    Project {
        dir,
        filename,
        config,
        cache,
        mutations,
    }
}

fn progress_for(config: &Config) -> Progress {
    Progress::new(config.total, OutputLegend::simple(), true)
}

fn options(project: &Project, num_workers: usize, parallel: bool) -> RunOptions {
    RunOptions {
        num_workers,
        parallel,
        project_root: project.dir.path().to_path_buf(),
    }
}

#[test]
fn a_passing_suite_leaves_every_mutant_surviving() {
    let mut project = project("true");
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    let fatal = run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();
    assert!(!fatal);
    assert_eq!(progress.progress, 3);
    assert_eq!(progress.surviving_mutants, 3);
    assert_eq!(progress.killed_mutants, 0);
    assert_eq!(compute_exit_code(&progress, fatal, false), 2);
    assert_eq!(compute_exit_code(&progress, fatal, true), 1);

    // The source file is back to its original content.
    assert_eq!(fs::read_to_string(&project.filename).unwrap(), SOURCE);
}

#[test]
fn a_failing_suite_kills_every_mutant() {
    let mut project = project("false");
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    let fatal = run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();
    assert!(!fatal);
    assert_eq!(progress.killed_mutants, 3);
    assert_eq!(compute_exit_code(&progress, fatal, false), 0);
}

#[test]
fn results_are_persisted_for_the_results_listing() {
    let mut project = project("true");
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();

    let reopened = Cache::open(project.dir.path());
    let survivors = reopened.mutants_with_status(&[MutantStatus::Survived]);
    assert_eq!(survivors.len(), 3);
    assert!(survivors.iter().all(|(_, f, _)| *f == project.filename));
}

#[test]
fn a_second_run_resolves_everything_from_the_cache() {
    let mut project = project("true");
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();

    // Same tests hash, but a command that would kill everything: cached
    // verdicts win, nothing is retested.
    project.config.test_command = "false".to_string();
    project.config.default_test_command = "false".to_string();
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();
    assert_eq!(progress.surviving_mutants, 3);
    assert_eq!(progress.killed_mutants, 0);
}

#[test]
fn a_changed_test_suite_invalidates_survivors() {
    let mut project = project("true");
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();

    project.config.test_command = "false".to_string();
    project.config.default_test_command = "false".to_string();
    project.config.hash_of_tests = "new-tests-hash".to_string();
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 1, false);
    run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();
    assert_eq!(progress.killed_mutants, 3);
    assert_eq!(progress.surviving_mutants, 0);
}

#[test]
fn parallel_workers_mutate_their_own_copies() {
    let mut project = project("false");
    let mut progress = progress_for(&project.config);
    let opts = options(&project, 2, true);
    let fatal = run_mutation_tests(
        &project.config,
        &mut project.cache,
        &mut progress,
        &project.mutations,
        Arc::new(NoHooks),
        &opts,
    )
    .unwrap();
    assert!(!fatal);
    assert_eq!(progress.killed_mutants, 3);
    // The original tree was never touched.
    assert_eq!(fs::read_to_string(&project.filename).unwrap(), SOURCE);
}

#[test]
fn exit_codes_combine_failure_modes() {
    let mut progress = Progress::new(10, OutputLegend::simple(), true);
    assert_eq!(compute_exit_code(&progress, false, false), 0);
    assert_eq!(compute_exit_code(&progress, true, false), 1);

    progress.surviving_mutants = 1;
    progress.surviving_mutants_timeout = 1;
    assert_eq!(compute_exit_code(&progress, false, false), 6);
    progress.suspicious_mutants = 1;
    assert_eq!(compute_exit_code(&progress, true, false), 15);
    assert_eq!(compute_exit_code(&progress, true, true), 1);
}

#[test]
fn progress_counts_by_verdict_and_ignores_untested() {
    let mut progress = Progress::new(5, OutputLegend::simple(), true);
    progress.register(MutantStatus::Killed);
    progress.register(MutantStatus::Survived);
    progress.register(MutantStatus::Timeout);
    progress.register(MutantStatus::Suspicious);
    progress.register(MutantStatus::Skipped);
    progress.register(MutantStatus::Untested);
    assert_eq!(progress.progress, 5);
    assert_eq!(progress.killed_mutants, 1);
    assert_eq!(progress.surviving_mutants, 1);
    assert_eq!(progress.surviving_mutants_timeout, 1);
    assert_eq!(progress.suspicious_mutants, 1);
    assert_eq!(progress.skipped, 1);
}
