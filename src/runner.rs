use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::context::{MutationContext, MutationSelection};
use crate::error::{Error, Result};
use crate::hooks::{HookAction, MutationHooks};
use crate::mutate::mutate_file;
use crate::status::MutantStatus;

/// Outcome of one test-suite invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    /// Nonzero exit: the suite noticed something.
    Failed,
    Timeout,
}

fn parse_test_command(command: &str) -> (String, Vec<String>) {
    let mut parts = command.split_whitespace().map(|s| s.to_string());
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}

/// Read a child's pipe to the end on its own thread. The child blocks on
/// write once the pipe buffer fills, so draining must run while we poll.
fn drain_pipe<R: io::Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut captured = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut captured);
        }
        captured
    })
}

/// Run a test command, polling for completion and force-killing it when the
/// timeout elapses. Completed output is forwarded line by line to `feedback`,
/// stdout first, then stderr.
pub fn run_test_command(
    command: &str,
    working_dir: &Path,
    timeout: Option<Duration>,
    feedback: &mut dyn FnMut(&str),
) -> Result<TestOutcome> {
    let (program, args) = parse_test_command(command);
    if program.is_empty() {
        return Err(Error::Config("empty test command".to_string()));
    }
    let mut child = Command::new(&program)
        .args(&args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Config(format!("failed to run '{command}': {e}")))?;
    let stdout = drain_pipe(child.stdout.take());
    let stderr = drain_pipe(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if let Some(limit) = timeout {
                    if start.elapsed() > limit {
                        let _ = child.kill();
                        let _ = child.wait();
                        break None;
                    }
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(Error::Io(e)),
        }
    };

    // The child is gone either way, so the readers hit EOF and finish.
    for captured in [stdout, stderr] {
        for line in captured.join().unwrap_or_default().lines() {
            feedback(line);
        }
    }
    Ok(match status {
        Some(status) if status.success() => TestOutcome::Passed,
        Some(_) => TestOutcome::Failed,
        None => TestOutcome::Timeout,
    })
}

/// Run the full suite once against the unmutated project and measure it.
/// A failing baseline is a configuration error: mutation results would be
/// meaningless.
pub fn time_test_suite(
    config: &Config,
    working_dir: &Path,
    feedback: &mut dyn FnMut(&str),
) -> Result<f64> {
    let start = Instant::now();
    match run_test_command(&config.default_test_command, working_dir, None, feedback)? {
        TestOutcome::Passed => Ok(start.elapsed().as_secs_f64()),
        _ => Err(Error::Config(format!(
            "Tests don't run cleanly without mutations. Test command was: {}",
            config.default_test_command
        ))),
    }
}

/// A detected mutant that took too long to detect may only have been caught
/// by the slowdown itself: strictly above the allowance is suspicious, at or
/// below it is a clean kill.
pub fn classify_detected(time_elapsed: f64, config: &Config) -> MutantStatus {
    let allowance =
        config.test_time_base + config.baseline_time_elapsed * config.test_time_multiplier;
    if time_elapsed > allowance {
        MutantStatus::Suspicious
    } else {
        MutantStatus::Killed
    }
}

/// Apply one mutant to disk, run the suite, and classify the outcome. The
/// original file is always restored, even when the test cycle errors, and a
/// restoration failure propagates.
pub fn run_mutation(
    context: &mut MutationContext,
    cached_status: MutantStatus,
    hooks: &dyn MutationHooks,
    working_dir: &Path,
    feedback: &mut dyn FnMut(&str),
) -> Result<MutantStatus> {
    let config = context
        .config
        .clone()
        .ok_or_else(|| Error::Config("mutation context has no config".to_string()))?;
    if cached_status != MutantStatus::Untested && config.total != 1 {
        return Ok(cached_status);
    }

    if let MutationSelection::Id(id) = &context.selection {
        context.current_line_index = id.line_number;
    }
    if hooks.pre_mutation(context) == HookAction::Skip || context.skip {
        return Ok(MutantStatus::Skipped);
    }
    if let Some(command) = &config.pre_mutation {
        run_shell_command(command, working_dir, config.swallow_output, feedback)?;
    }

    let filename = context
        .filename
        .clone()
        .ok_or_else(|| Error::Config("mutation context has no filename".to_string()))?;
    mutate_file(true, context, hooks)?;

    let result = run_test_cycle(context, &config, working_dir, feedback);

    restore_backup(&filename)?;
    if let Some(active) = context.config.as_mut() {
        active.test_command = active.default_test_command.clone();
    }
    hooks.post_mutation(context);
    if let Some(command) = &config.post_mutation {
        run_shell_command(command, working_dir, config.swallow_output, feedback)?;
    }
    result
}

fn run_test_cycle(
    context: &MutationContext,
    config: &Config,
    working_dir: &Path,
    feedback: &mut dyn FnMut(&str),
) -> Result<MutantStatus> {
    // A pre-mutation hook may have narrowed the command on the context.
    let active_command = context
        .config
        .as_ref()
        .map(|c| c.test_command.clone())
        .unwrap_or_else(|| config.test_command.clone());
    let timeout = Duration::from_secs_f64(config.baseline_time_elapsed * 10.0);

    let start = Instant::now();
    let mut outcome = run_test_command(&active_command, working_dir, Some(timeout), feedback)?;
    if outcome == TestOutcome::Passed
        && config.rerun_all
        && active_command != config.default_test_command
    {
        // Survived a narrowed run; only the full suite decides survival.
        outcome = run_test_command(
            &config.default_test_command,
            working_dir,
            Some(timeout),
            feedback,
        )?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    Ok(match outcome {
        TestOutcome::Timeout => MutantStatus::Timeout,
        TestOutcome::Passed => MutantStatus::Survived,
        TestOutcome::Failed => classify_detected(elapsed, config),
    })
}

fn restore_backup(filename: &str) -> Result<()> {
    let backup = format!("{filename}.bak");
    fs::rename(&backup, filename)?;
    Ok(())
}

fn run_shell_command(
    command: &str,
    working_dir: &Path,
    swallow_output: bool,
    feedback: &mut dyn FnMut(&str),
) -> Result<()> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .output()?;
    if !swallow_output {
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            feedback(line);
        }
    }
    Ok(())
}
