use std::io::Write;

use console::Style;

use crate::cache::Cache;
use crate::status::MutantStatus;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_warning(msg: &str) {
    let style = Style::new().yellow().bold();
    eprintln!("{} {}", style.apply_to("!"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

/// Symbols used in the one-line progress display.
#[derive(Debug, Clone, Copy)]
pub struct OutputLegend {
    pub killed: &'static str,
    pub timeout: &'static str,
    pub suspicious: &'static str,
    pub survived: &'static str,
    pub skipped: &'static str,
}

impl OutputLegend {
    pub fn emoji() -> OutputLegend {
        OutputLegend {
            killed: "🎉",
            timeout: "⏰",
            suspicious: "🤔",
            survived: "🙁",
            skipped: "🔇",
        }
    }

    pub fn simple() -> OutputLegend {
        OutputLegend {
            killed: "killed:",
            timeout: "timeout:",
            suspicious: "suspicious:",
            survived: "survived:",
            skipped: "skipped:",
        }
    }
}

/// Redraw the in-place progress line.
pub fn print_status_line(line: &str) {
    print!("\r{line}");
    let _ = std::io::stdout().flush();
}

/// Compact display of sorted ids: `1-3, 5, 7-9`.
pub fn ranges(numbers: &[u64]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut i = 0;
    while i < numbers.len() {
        let start = numbers[i];
        let mut end = start;
        while i + 1 < numbers.len() && numbers[i + 1] == end + 1 {
            end = numbers[i + 1];
            i += 1;
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
        i += 1;
    }
    parts.join(", ")
}

fn print_status_group(cache: &Cache, title: &str, statuses: &[MutantStatus]) {
    let mutants = cache.mutants_with_status(statuses);
    if mutants.is_empty() {
        return;
    }
    let bold = Style::new().bold();
    println!();
    println!("{}", bold.apply_to(title));
    println!();
    let mut current_file: Option<String> = None;
    let mut ids: Vec<u64> = Vec::new();
    for (id, filename, _) in mutants {
        if current_file.as_deref() != Some(filename.as_str()) {
            if let Some(file) = current_file.take() {
                println!("---- {} ({}) ----", file, ids.len());
                println!();
                println!("{}", ranges(&ids));
                println!();
                ids.clear();
            }
            current_file = Some(filename);
        }
        ids.push(id);
    }
    if let Some(file) = current_file {
        println!("---- {} ({}) ----", file, ids.len());
        println!();
        println!("{}", ranges(&ids));
        println!();
    }
}

/// The `results` listing: every non-killed mutant grouped by verdict and
/// file, with the id ranges usable with `show` and `apply`.
pub fn print_results(cache: &Cache) {
    println!("To apply a mutant on disk:");
    println!("    pymut apply <id>");
    println!();
    println!("To show a mutant:");
    println!("    pymut show <id>");
    print_status_group(cache, "Timed out ⏰", &[MutantStatus::Timeout]);
    print_status_group(cache, "Suspicious 🤔", &[MutantStatus::Suspicious]);
    print_status_group(cache, "Survived 🙁", &[MutantStatus::Survived]);
    print_status_group(
        cache,
        "Untested/skipped 🔇",
        &[MutantStatus::Untested, MutantStatus::Skipped],
    );
}
