use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::CACHE_FILENAME;
use crate::error::Result;

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".eggs",
    "dist",
    "build",
    CACHE_FILENAME,
];

const SKIP_SUFFIXES: &[&str] = &[".bak", ".pyc", ".pyo"];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if should_skip(&name_str) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // Skip symlinks and other special files
    }
    Ok(())
}

/// Copy a project tree into `dest_root`, leaving out VCS metadata, caches,
/// virtualenvs, compiled artifacts and our own state files.
pub fn copy_project(project_root: &Path, dest_root: &Path) -> std::io::Result<()> {
    copy_dir_filtered(project_root, dest_root)
}

/// Give a parallel worker its own filtered copy of the project. The returned
/// `TempDir` owns the copy's lifetime.
pub fn make_worker_copy(
    project_root: &Path,
    session_id: &str,
) -> Result<(tempfile::TempDir, PathBuf)> {
    let temp_dir = tempfile::Builder::new()
        .prefix(&format!("pymut-{session_id}-"))
        .tempdir()?;
    let root = temp_dir.path().join("project");
    copy_project(project_root, &root)?;
    Ok((temp_dir, root))
}
