use std::fs;
use std::path::{Path, PathBuf};

pub mod cache;
pub mod config;
pub mod context;
pub mod copy_tree;
pub mod error;
pub mod hooks;
pub mod mutate;
pub mod mutations;
pub mod output;
pub mod pattern;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod tree;

use error::{Error, Result};

/// All Python files under `path` (or `path` itself when it is a file),
/// skipping test directories and excluded names. Deterministic order.
pub fn python_source_files(
    path: &Path,
    tests_dirs: &[PathBuf],
    paths_to_exclude: &[String],
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect_python_files(path, tests_dirs, paths_to_exclude, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_python_files(
    path: &Path,
    tests_dirs: &[PathBuf],
    paths_to_exclude: &[String],
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if paths_to_exclude.iter().any(|p| name_matches(p, &name)) {
        return Ok(());
    }
    if path.is_dir() {
        if tests_dirs.iter().any(|t| t.as_path() == path) {
            return Ok(());
        }
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            collect_python_files(&entry.path(), tests_dirs, paths_to_exclude, out)?;
        }
    } else if name.ends_with(".py") {
        out.push(path.to_path_buf());
    }
    Ok(())
}

/// Shell-style name match supporting `*` at either end.
fn name_matches(pattern: &str, name: &str) -> bool {
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(suffix), _) if !suffix.is_empty() => name.ends_with(suffix),
        (_, Some(prefix)) if !prefix.is_empty() => name.starts_with(prefix),
        _ => pattern == name,
    }
}

/// Pick the conventional source location when none was given: `lib`, `src`,
/// the working directory's own name, or its dash-to-underscore variant.
pub fn guess_paths_to_mutate() -> Result<PathBuf> {
    for candidate in ["lib", "src"] {
        if Path::new(candidate).is_dir() {
            return Ok(PathBuf::from(candidate));
        }
    }
    let cwd = std::env::current_dir()?;
    if let Some(dir_name) = cwd.file_name().map(|n| n.to_string_lossy().to_string()) {
        if Path::new(&dir_name).is_dir() {
            return Ok(PathBuf::from(dir_name));
        }
        let underscored = dir_name.replace('-', "_");
        if Path::new(&underscored).is_dir() {
            return Ok(PathBuf::from(underscored));
        }
    }
    Err(Error::Config(
        "Could not figure out where the code to mutate is. Use the paths argument.".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matching_supports_star_edges() {
        assert!(name_matches("*.py", "app.py"));
        assert!(name_matches("generated*", "generated_pb2.py"));
        assert!(name_matches("migrations", "migrations"));
        assert!(!name_matches("migrations", "migration"));
        assert!(!name_matches("*.py", "app.pyc"));
    }
}
