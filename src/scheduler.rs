use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::cache::Cache;
use crate::config::Config;
use crate::context::{MutationContext, MutationId, MutationSelection};
use crate::copy_tree;
use crate::error::Result;
use crate::hooks::MutationHooks;
use crate::output::{self, OutputLegend};
use crate::runner;
use crate::status::MutantStatus;

/// Workers retire after this many mutants and a fresh one takes over, so
/// leaked state in a long-running test process cannot pile up forever.
pub const CYCLE_PROCESS_AFTER: usize = 100;

const QUEUE_SIZE: usize = 100;

/// Work item sent from producer to workers. One `End` per worker.
pub enum Dispatch {
    Mutant(Box<MutationContext>),
    End,
}

/// Event sent from producer/workers back to the coordinator.
pub enum WorkerEvent {
    /// A mutant finished testing; write the status through to the cache.
    Status {
        filename: String,
        mutation_id: MutationId,
        status: MutantStatus,
    },
    /// The producer resolved this mutant from the cache; progress only.
    CachedStatus(MutantStatus),
    /// A line of test output to surface or swallow.
    Progress(String),
    /// The worker in this slot retired; spawn a replacement.
    Cycle(usize),
    End,
    Fatal(String),
}

/// Live counters for one run, drawn as a single redrawn line.
#[derive(Debug)]
pub struct Progress {
    pub total: usize,
    pub progress: usize,
    pub killed_mutants: usize,
    pub surviving_mutants: usize,
    pub surviving_mutants_timeout: usize,
    pub suspicious_mutants: usize,
    pub skipped: usize,
    no_progress: bool,
    legend: OutputLegend,
}

impl Progress {
    pub fn new(total: usize, legend: OutputLegend, no_progress: bool) -> Progress {
        Progress {
            total,
            progress: 0,
            killed_mutants: 0,
            surviving_mutants: 0,
            surviving_mutants_timeout: 0,
            suspicious_mutants: 0,
            skipped: 0,
            no_progress,
            legend,
        }
    }

    pub fn register(&mut self, status: MutantStatus) {
        match status {
            MutantStatus::Killed => self.killed_mutants += 1,
            MutantStatus::Survived => self.surviving_mutants += 1,
            MutantStatus::Timeout => self.surviving_mutants_timeout += 1,
            MutantStatus::Suspicious => self.suspicious_mutants += 1,
            MutantStatus::Skipped => self.skipped += 1,
            MutantStatus::Untested => return,
        }
        self.progress += 1;
        self.print();
    }

    pub fn print(&self) {
        if self.no_progress {
            return;
        }
        output::print_status_line(&format!(
            "{}/{}  {} {}  {} {}  {} {}  {} {}  {} {}",
            self.progress,
            self.total,
            self.legend.killed,
            self.killed_mutants,
            self.legend.timeout,
            self.surviving_mutants_timeout,
            self.legend.suspicious,
            self.suspicious_mutants,
            self.legend.survived,
            self.surviving_mutants,
            self.legend.skipped,
            self.skipped,
        ));
    }
}

/// Bit-OR of the run's failure modes; `--ci` collapses everything to 0/1.
pub fn compute_exit_code(progress: &Progress, exception: bool, ci: bool) -> i32 {
    let mut code = 0;
    if exception {
        code |= 1;
    }
    if progress.surviving_mutants > 0 {
        code |= 2;
    }
    if progress.surviving_mutants_timeout > 0 {
        code |= 4;
    }
    if progress.suspicious_mutants > 0 {
        code |= 8;
    }
    if ci {
        i32::from(code != 0)
    } else {
        code
    }
}

pub struct RunOptions {
    pub num_workers: usize,
    /// When set, each worker mutates its own temp copy of the project.
    pub parallel: bool,
    pub project_root: PathBuf,
}

struct WorkerDir {
    /// Where this worker's tree lives; a temp copy in parallel mode.
    root: PathBuf,
    /// The root the plan's filenames are given against.
    original: PathBuf,
    _keep: Option<tempfile::TempDir>,
}

impl WorkerDir {
    /// Rebase a plan filename (relative to, or under, the original root)
    /// into this worker's tree.
    fn rebase(&self, filename: &str) -> PathBuf {
        match Path::new(filename).strip_prefix(&self.original) {
            Ok(relative) => self.root.join(relative),
            Err(_) => self.root.join(filename),
        }
    }
}

struct FilePlan {
    filename: String,
    source: String,
    entries: Vec<(MutationId, MutantStatus)>,
}

/// Run every listed mutant through the producer/worker pipeline, updating
/// `progress` and the cache as results arrive. Returns whether a fatal
/// error occurred.
pub fn run_mutation_tests(
    config: &Config,
    cache: &mut Cache,
    progress: &mut Progress,
    mutations_by_file: &BTreeMap<String, Vec<MutationId>>,
    hooks: Arc<dyn MutationHooks + Send + Sync>,
    options: &RunOptions,
) -> Result<bool> {
    hooks.init();

    // Cache lookups happen up front on this thread; workers never touch the
    // cache, they only report over the result channel.
    let mut plan = Vec::new();
    for (filename, mutations) in mutations_by_file {
        let statuses = cache.cached_mutation_statuses(filename, mutations, &config.hash_of_tests)?;
        let source = fs::read_to_string(filename)?;
        let entries = mutations
            .iter()
            .map(|m| {
                let status = statuses.get(m).copied().unwrap_or(MutantStatus::Untested);
                (m.clone(), status)
            })
            .collect();
        plan.push(FilePlan {
            filename: filename.clone(),
            source,
            entries,
        });
    }

    let num_workers = options.num_workers.max(1);
    let (dispatch_tx, dispatch_rx) = sync_channel::<Dispatch>(QUEUE_SIZE);
    let (results_tx, results_rx) = sync_channel::<WorkerEvent>(QUEUE_SIZE);
    let dispatch_rx = Arc::new(Mutex::new(dispatch_rx));

    let producer_config = config.clone();
    let producer_results = results_tx.clone();
    let producer = thread::spawn(move || {
        for file in plan {
            for (mutation_id, status) in file.entries {
                if status != MutantStatus::Untested && producer_config.total != 1 {
                    let _ = producer_results.send(WorkerEvent::CachedStatus(status));
                    continue;
                }
                let context = MutationContext::new(
                    file.source.clone(),
                    MutationSelection::Id(mutation_id),
                    producer_config.dict_synonyms.clone(),
                    Some(file.filename.clone()),
                    Some(producer_config.clone()),
                );
                if dispatch_tx.send(Dispatch::Mutant(Box::new(context))).is_err() {
                    return;
                }
            }
        }
        for _ in 0..num_workers {
            let _ = dispatch_tx.send(Dispatch::End);
        }
    });

    let mut dirs: Vec<Arc<WorkerDir>> = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        if options.parallel {
            let session_id = format!("{:08x}", fastrand::u32(..));
            let (temp, root) = copy_tree::make_worker_copy(&options.project_root, &session_id)?;
            dirs.push(Arc::new(WorkerDir {
                root,
                original: options.project_root.clone(),
                _keep: Some(temp),
            }));
        } else {
            dirs.push(Arc::new(WorkerDir {
                root: options.project_root.clone(),
                original: options.project_root.clone(),
                _keep: None,
            }));
        }
    }

    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    for slot in 0..num_workers {
        handles.push(spawn_worker(
            slot,
            dirs[slot].clone(),
            dispatch_rx.clone(),
            results_tx.clone(),
            hooks.clone(),
        ));
    }

    let mut open_streams = num_workers;
    let mut fatal = false;
    while open_streams > 0 {
        let event = match results_rx.recv() {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            WorkerEvent::Status {
                filename,
                mutation_id,
                status,
            } => {
                progress.register(status);
                if let Err(e) =
                    cache.update_mutant_status(&filename, &mutation_id, status, &config.hash_of_tests)
                {
                    output::print_error(&e.to_string());
                    fatal = true;
                }
            }
            WorkerEvent::CachedStatus(status) => progress.register(status),
            WorkerEvent::Progress(line) => {
                if !config.swallow_output {
                    println!("{line}");
                } else {
                    progress.print();
                }
            }
            WorkerEvent::Cycle(slot) => {
                handles.push(spawn_worker(
                    slot,
                    dirs[slot].clone(),
                    dispatch_rx.clone(),
                    results_tx.clone(),
                    hooks.clone(),
                ));
            }
            WorkerEvent::Fatal(message) => {
                output::print_error(&message);
                fatal = true;
            }
            WorkerEvent::End => open_streams -= 1,
        }
    }

    // Unblock the producer if the workers went away early.
    drop(dispatch_rx);
    let _ = producer.join();
    for handle in handles {
        let _ = handle.join();
    }
    cache.save()?;
    Ok(fatal)
}

fn spawn_worker(
    slot: usize,
    dir: Arc<WorkerDir>,
    dispatch_rx: Arc<Mutex<Receiver<Dispatch>>>,
    results: SyncSender<WorkerEvent>,
    hooks: Arc<dyn MutationHooks + Send + Sync>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut count = 0;
        let mut cycled = false;
        loop {
            let item = match dispatch_rx.lock() {
                Ok(guard) => guard.recv().unwrap_or(Dispatch::End),
                Err(_) => Dispatch::End,
            };
            match item {
                Dispatch::End => break,
                Dispatch::Mutant(mut context) => {
                    let report_name = context.filename.clone().unwrap_or_default();
                    let mutation_id = match &context.selection {
                        MutationSelection::Id(id) => id.clone(),
                        MutationSelection::All => continue,
                    };
                    // Point the context at this worker's copy of the tree.
                    let full_path = dir.rebase(&report_name);
                    context.filename = Some(full_path.to_string_lossy().to_string());

                    let mut feedback = |line: &str| {
                        let _ = results.send(WorkerEvent::Progress(line.to_string()));
                    };
                    match runner::run_mutation(
                        &mut context,
                        MutantStatus::Untested,
                        hooks.as_ref(),
                        &dir.root,
                        &mut feedback,
                    ) {
                        Ok(status) => {
                            let _ = results.send(WorkerEvent::Status {
                                filename: report_name,
                                mutation_id,
                                status,
                            });
                        }
                        Err(error) => {
                            let _ = results.send(WorkerEvent::Fatal(error.to_string()));
                            break;
                        }
                    }
                    count += 1;
                    if count == CYCLE_PROCESS_AFTER {
                        let _ = results.send(WorkerEvent::Cycle(slot));
                        cycled = true;
                        break;
                    }
                }
            }
        }
        if !cycled {
            let _ = results.send(WorkerEvent::End);
        }
    })
}
