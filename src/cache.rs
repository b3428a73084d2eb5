use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use similar::{Algorithm, DiffOp, TextDiff, capture_diff_slices};

use crate::context::{MutationContext, MutationId, MutationSelection};
use crate::error::{Error, Result};
use crate::hooks::NoHooks;
use crate::mutate::mutate_from_context;
use crate::output;
use crate::status::MutantStatus;

pub const CACHE_FILENAME: &str = ".pymut-cache.json";

/// Bumped whenever the stored shape changes; a mismatch wipes the cache.
pub const CURRENT_CACHE_VERSION: u32 = 4;

/// Sentinel stored as `tested_against_hash` when no test files were found.
/// Never matches a real hash, so such results are retested once tests appear.
pub const NO_TESTS_FOUND: &str = "NO TESTS FOUND";

const BASELINE_TIME_KEY: &str = "baseline_time_elapsed";
const HASH_OF_TESTS_KEY: &str = "hash_of_tests";

#[derive(Debug, Serialize, Deserialize)]
struct SourceFileRecord {
    id: u64,
    filename: String,
    hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LineRecord {
    id: u64,
    sourcefile: u64,
    line: String,
    line_number: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct MutantRecord {
    id: u64,
    line: u64,
    index: usize,
    tested_against_hash: Option<String>,
    status: MutantStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheData {
    version: u32,
    misc: BTreeMap<String, String>,
    source_files: Vec<SourceFileRecord>,
    lines: Vec<LineRecord>,
    mutants: Vec<MutantRecord>,
    next_id: u64,
}

impl CacheData {
    fn fresh() -> CacheData {
        CacheData {
            version: CURRENT_CACHE_VERSION,
            misc: BTreeMap::new(),
            source_files: Vec::new(),
            lines: Vec::new(),
            mutants: Vec::new(),
            next_id: 0,
        }
    }
}

/// Result cache persisted as a JSON document beside the project. Holds the
/// baseline timing, per-file line snapshots and per-mutant outcomes keyed by
/// `(line text, line number, index)`.
#[derive(Debug)]
pub struct Cache {
    path: PathBuf,
    data: CacheData,
}

impl Cache {
    pub fn open(project_root: &Path) -> Cache {
        let path = project_root.join(CACHE_FILENAME);
        let data = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CacheData>(&text) {
                Ok(data) if data.version == CURRENT_CACHE_VERSION => data,
                Ok(_) => {
                    output::print_warning("result cache is out of date, clearing it");
                    CacheData::fresh()
                }
                Err(_) => {
                    output::print_warning("result cache is unreadable, clearing it");
                    CacheData::fresh()
                }
            },
            Err(_) => CacheData::fresh(),
        };
        Cache { path, data }
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| Error::Cache(format!("failed to serialize cache: {e}")))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn alloc_id(&mut self) -> u64 {
        self.data.next_id += 1;
        self.data.next_id
    }

    fn source_file_id(&mut self, filename: &str) -> u64 {
        if let Some(record) = self.data.source_files.iter().find(|s| s.filename == filename) {
            return record.id;
        }
        let id = self.alloc_id();
        self.data.source_files.push(SourceFileRecord {
            id,
            filename: filename.to_string(),
            hash: None,
        });
        id
    }

    fn line_id(&self, sourcefile: u64, line: &str, line_number: usize) -> Option<u64> {
        self.data
            .lines
            .iter()
            .find(|l| l.sourcefile == sourcefile && l.line == line && l.line_number == line_number)
            .map(|l| l.id)
    }

    fn mutant_index(&self, line: u64, index: usize) -> Option<usize> {
        self.data
            .mutants
            .iter()
            .position(|m| m.line == line && m.index == index)
    }

    fn get_or_create_mutant(&mut self, line: u64, index: usize) -> usize {
        if let Some(position) = self.mutant_index(line, index) {
            return position;
        }
        let id = self.alloc_id();
        self.data.mutants.push(MutantRecord {
            id,
            line,
            index,
            tested_against_hash: None,
            status: MutantStatus::Untested,
        });
        self.data.mutants.len() - 1
    }

    /// Align the cached line snapshot of `filename` with its current content.
    /// Unchanged lines that moved are renumbered so their mutants keep their
    /// results; deleted lines take their mutants with them; new lines start
    /// empty. No-op when the stored content hash already matches.
    pub fn update_line_numbers(&mut self, filename: &str) -> Result<()> {
        let hash = hash_of_file(Path::new(filename))?;
        let sourcefile = self.source_file_id(filename);
        let stored_hash = self
            .data
            .source_files
            .iter()
            .find(|s| s.id == sourcefile)
            .and_then(|s| s.hash.clone());
        if stored_hash.as_deref() == Some(hash.as_str()) {
            return Ok(());
        }

        let content = fs::read_to_string(filename)?;
        let existing: Vec<String> = content.lines().map(|l| l.to_string()).collect();

        let mut cached: Vec<(u64, String, usize)> = self
            .data
            .lines
            .iter()
            .filter(|l| l.sourcefile == sourcefile)
            .map(|l| (l.id, l.line.clone(), l.line_number))
            .collect();
        cached.sort_by_key(|&(_, _, number)| number);

        if cached.is_empty() {
            for (number, line) in existing.iter().enumerate() {
                let id = self.alloc_id();
                self.data.lines.push(LineRecord {
                    id,
                    sourcefile,
                    line: line.clone(),
                    line_number: number,
                });
            }
        } else {
            let cached_texts: Vec<String> = cached.iter().map(|(_, text, _)| text.clone()).collect();
            let ops = capture_diff_slices(Algorithm::Myers, &cached_texts, &existing);
            let mut deleted: Vec<u64> = Vec::new();
            let mut renumbered: Vec<(u64, usize)> = Vec::new();
            let mut inserted: Vec<(String, usize)> = Vec::new();
            for op in ops {
                match op {
                    DiffOp::Equal {
                        old_index,
                        new_index,
                        len,
                    } => {
                        for k in 0..len {
                            if old_index + k != new_index + k {
                                renumbered.push((cached[old_index + k].0, new_index + k));
                            }
                        }
                    }
                    DiffOp::Delete {
                        old_index, old_len, ..
                    } => {
                        for k in 0..old_len {
                            deleted.push(cached[old_index + k].0);
                        }
                    }
                    DiffOp::Insert {
                        new_index, new_len, ..
                    } => {
                        for k in 0..new_len {
                            inserted.push((existing[new_index + k].clone(), new_index + k));
                        }
                    }
                    DiffOp::Replace {
                        old_index,
                        old_len,
                        new_index,
                        new_len,
                    } => {
                        for k in 0..old_len.max(new_len) {
                            if k < old_len {
                                deleted.push(cached[old_index + k].0);
                            }
                            if k < new_len {
                                inserted.push((existing[new_index + k].clone(), new_index + k));
                            }
                        }
                    }
                }
            }
            for line_id in &deleted {
                self.data.mutants.retain(|m| m.line != *line_id);
            }
            self.data.lines.retain(|l| !deleted.contains(&l.id));
            for (line_id, new_number) in renumbered {
                if let Some(line) = self.data.lines.iter_mut().find(|l| l.id == line_id) {
                    line.line_number = new_number;
                }
            }
            for (text, number) in inserted {
                let id = self.alloc_id();
                self.data.lines.push(LineRecord {
                    id,
                    sourcefile,
                    line: text,
                    line_number: number,
                });
            }
        }

        if let Some(record) = self.data.source_files.iter_mut().find(|s| s.id == sourcefile) {
            record.hash = Some(hash);
        }
        Ok(())
    }

    fn effective_status(record: &MutantRecord, hash_of_tests: &str) -> MutantStatus {
        // A kill is permanent evidence; everything else is only as fresh as
        // the test suite it was measured against.
        if record.status == MutantStatus::Killed {
            return MutantStatus::Killed;
        }
        match record.tested_against_hash.as_deref() {
            Some(NO_TESTS_FOUND) => MutantStatus::Untested,
            Some(tested) if tested == hash_of_tests => record.status,
            _ => MutantStatus::Untested,
        }
    }

    /// Cached status for every listed mutation, creating untested records on
    /// first sight.
    pub fn cached_mutation_statuses(
        &mut self,
        filename: &str,
        mutations: &[MutationId],
        hash_of_tests: &str,
    ) -> Result<HashMap<MutationId, MutantStatus>> {
        let sourcefile = self.source_file_id(filename);
        let mut result = HashMap::with_capacity(mutations.len());
        for mutation_id in mutations {
            let line = self
                .line_id(sourcefile, &mutation_id.line, mutation_id.line_number)
                .ok_or_else(|| {
                    Error::Cache(format!(
                        "no cached line for {filename}:{}",
                        mutation_id.line_number + 1
                    ))
                })?;
            let position = self.get_or_create_mutant(line, mutation_id.index);
            let status = Self::effective_status(&self.data.mutants[position], hash_of_tests);
            result.insert(mutation_id.clone(), status);
        }
        Ok(result)
    }

    pub fn cached_mutation_status(
        &mut self,
        filename: &str,
        mutation_id: &MutationId,
        hash_of_tests: &str,
    ) -> Result<MutantStatus> {
        let statuses =
            self.cached_mutation_statuses(filename, std::slice::from_ref(mutation_id), hash_of_tests)?;
        Ok(statuses
            .get(mutation_id)
            .copied()
            .unwrap_or(MutantStatus::Untested))
    }

    pub fn update_mutant_status(
        &mut self,
        filename: &str,
        mutation_id: &MutationId,
        status: MutantStatus,
        tests_hash: &str,
    ) -> Result<()> {
        let sourcefile = self.source_file_id(filename);
        let line = self
            .line_id(sourcefile, &mutation_id.line, mutation_id.line_number)
            .ok_or_else(|| {
                Error::Cache(format!(
                    "no cached line for {filename}:{}",
                    mutation_id.line_number + 1
                ))
            })?;
        let position = self.get_or_create_mutant(line, mutation_id.index);
        let record = &mut self.data.mutants[position];
        record.status = status;
        record.tested_against_hash = Some(tests_hash.to_string());
        Ok(())
    }

    /// Resolve a mutant primary key back to its file and mutation identity.
    pub fn filename_and_mutation_id_from_pk(&self, pk: u64) -> Result<(String, MutationId)> {
        let mutant = self
            .data
            .mutants
            .iter()
            .find(|m| m.id == pk)
            .ok_or_else(|| Error::Cache(format!("no mutant with id {pk}")))?;
        let line = self
            .data
            .lines
            .iter()
            .find(|l| l.id == mutant.line)
            .ok_or_else(|| Error::Cache(format!("mutant {pk} references a missing line")))?;
        let sourcefile = self
            .data
            .source_files
            .iter()
            .find(|s| s.id == line.sourcefile)
            .ok_or_else(|| Error::Cache(format!("mutant {pk} references a missing file")))?;
        let mutation_id = MutationId {
            line: line.line.clone(),
            index: mutant.index,
            line_number: line.line_number,
            filename: Some(sourcefile.filename.clone()),
        };
        Ok((sourcefile.filename.clone(), mutation_id))
    }

    /// `(pk, filename, line_number)` of every mutant in one of the given
    /// states, ordered by pk.
    pub fn mutants_with_status(&self, statuses: &[MutantStatus]) -> Vec<(u64, String, usize)> {
        let mut out: Vec<(u64, String, usize)> = self
            .data
            .mutants
            .iter()
            .filter(|m| statuses.contains(&m.status))
            .filter_map(|m| {
                let line = self.data.lines.iter().find(|l| l.id == m.line)?;
                let file = self
                    .data
                    .source_files
                    .iter()
                    .find(|s| s.id == line.sourcefile)?;
                Some((m.id, file.filename.clone(), line.line_number))
            })
            .collect();
        out.sort();
        out
    }

    pub fn cached_test_time(&self) -> Option<f64> {
        self.data
            .misc
            .get(BASELINE_TIME_KEY)
            .and_then(|v| v.parse().ok())
    }

    pub fn cached_hash_of_tests(&self) -> Option<String> {
        self.data.misc.get(HASH_OF_TESTS_KEY).cloned()
    }

    pub fn set_cached_test_time(&mut self, baseline: f64, hash_of_tests: &str) {
        self.data
            .misc
            .insert(BASELINE_TIME_KEY.to_string(), baseline.to_string());
        self.data
            .misc
            .insert(HASH_OF_TESTS_KEY.to_string(), hash_of_tests.to_string());
    }

    /// Unified diff of the mutant against the current (or provided) source.
    /// Empty when the stored identity no longer maps to a mutation site.
    pub fn get_unified_diff(
        &mut self,
        pk: u64,
        dict_synonyms: &[String],
        update_cache: bool,
        source: Option<&str>,
    ) -> Result<String> {
        let (filename, mutation_id) = self.filename_and_mutation_id_from_pk(pk)?;
        if update_cache {
            self.update_line_numbers(&filename)?;
        }
        let source = match source {
            Some(text) => text.to_string(),
            None => fs::read_to_string(&filename)?,
        };
        let mut context = MutationContext::new(
            source.clone(),
            MutationSelection::Id(mutation_id),
            dict_synonyms.to_vec(),
            Some(filename.clone()),
            None,
        );
        let (mutated, performed) = mutate_from_context(&mut context, &NoHooks)?;
        if performed == 0 {
            return Ok(String::new());
        }
        let diff = TextDiff::from_lines(&source, &mutated);
        Ok(diff
            .unified_diff()
            .header(&filename, &filename)
            .to_string())
    }
}

pub fn hash_of_file(path: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut file = fs::File::open(path)?;
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash of every test file under the given directories, in sorted order so
/// the result is stable across platforms. Returns [`NO_TESTS_FOUND`] when no
/// test-looking file exists.
pub fn hash_of_tests(tests_dirs: &[PathBuf]) -> Result<String> {
    let mut files = Vec::new();
    for dir in tests_dirs {
        collect_test_files(dir, dir, &mut files)?;
    }
    if files.is_empty() {
        return Ok(NO_TESTS_FOUND.to_string());
    }
    files.sort();
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(fs::read(&file)?);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_test_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_test_files(root, &path, out)?;
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".py") {
            continue;
        }
        let in_test_dir = dir.to_string_lossy().contains("test");
        if name.starts_with("test") || name.ends_with("_tests.py") || in_test_dir {
            out.push(path);
        }
    }
    Ok(())
}
