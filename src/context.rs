use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::tree::NodeId;

pub const PRAGMA_NO_MUTATE: &str = "pragma: no mutate";

/// Identity of one mutation site, stable across edits elsewhere in the file:
/// the exact line text, the per-line mutation index, and the line number as a
/// disambiguating hint. The filename is carried for convenience but excluded
/// from equality and hashing, like the rest of the identity it travels with
/// the cache key (line text, index).
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct MutationId {
    pub line: String,
    pub index: usize,
    pub line_number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl PartialEq for MutationId {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line
            && self.index == other.index
            && self.line_number == other.line_number
    }
}

impl Hash for MutationId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.line.hash(state);
        self.index.hash(state);
        self.line_number.hash(state);
    }
}

/// Which mutations to apply during a traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationSelection {
    /// Apply every mutation (enumeration mode).
    All,
    /// Apply exactly the named mutation.
    Id(MutationId),
}

/// Mutable state threaded through one traversal of one file.
#[derive(Debug)]
pub struct MutationContext {
    pub source: String,
    pub filename: Option<String>,
    pub selection: MutationSelection,
    pub performed: Vec<MutationId>,
    /// 0-based row of the node currently being visited.
    pub current_line_index: usize,
    /// Per-line mutation counter; resets when the row changes.
    pub index: usize,
    /// Ancestor node ids, innermost last.
    pub stack: Vec<NodeId>,
    pub dict_synonyms: Vec<String>,
    pub config: Option<Config>,
    /// Set by a pre-mutation hook to skip the current mutant.
    pub skip: bool,
    pub remove_newline_at_end: bool,
    lines: Vec<String>,
    pragma_no_mutate_lines: Option<HashSet<usize>>,
    covered_lines: Option<HashSet<usize>>,
}

impl MutationContext {
    pub fn new(
        source: String,
        selection: MutationSelection,
        dict_synonyms: Vec<String>,
        filename: Option<String>,
        config: Option<Config>,
    ) -> Self {
        let mut synonyms = dict_synonyms;
        if !synonyms.iter().any(|s| s == "dict") {
            synonyms.push("dict".to_string());
        }
        let mut context = MutationContext {
            source: String::new(),
            filename,
            selection,
            performed: Vec::new(),
            current_line_index: 0,
            index: 0,
            stack: Vec::new(),
            dict_synonyms: synonyms,
            config,
            skip: false,
            remove_newline_at_end: false,
            lines: Vec::new(),
            pragma_no_mutate_lines: None,
            covered_lines: None,
        };
        context.set_source(&source);
        context
    }

    /// Install new source text and reset all traversal state. The source is
    /// normalized to end with a newline; serialization strips it back off.
    pub fn set_source(&mut self, source: &str) {
        if source.ends_with('\n') || source.is_empty() {
            self.source = source.to_string();
            self.remove_newline_at_end = false;
        } else {
            self.source = format!("{source}\n");
            self.remove_newline_at_end = true;
        }
        self.lines = self.source.split('\n').map(|l| l.to_string()).collect();
        self.performed.clear();
        self.current_line_index = 0;
        self.index = 0;
        self.stack.clear();
        self.pragma_no_mutate_lines = None;
    }

    pub fn current_source_line(&self) -> &str {
        self.lines
            .get(self.current_line_index)
            .map(|l| l.as_str())
            .unwrap_or("")
    }

    pub fn mutation_id_of_current_index(&self) -> MutationId {
        MutationId {
            line: self.current_source_line().to_string(),
            index: self.index,
            line_number: self.current_line_index,
            filename: self.filename.clone(),
        }
    }

    fn pragma_lines(&mut self) -> &HashSet<usize> {
        let lines = &self.lines;
        self.pragma_no_mutate_lines.get_or_insert_with(|| {
            lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.contains(PRAGMA_NO_MUTATE))
                .map(|(i, _)| i)
                .collect()
        })
    }

    fn excluded_by_coverage(&mut self) -> bool {
        let covered_map = match self.config.as_ref() {
            Some(config) => match &config.covered_lines_by_filename {
                Some(map) => map,
                None => return false,
            },
            None => return false,
        };
        let filename = &self.filename;
        let covered = self.covered_lines.get_or_insert_with(|| {
            filename
                .as_ref()
                .and_then(|f| covered_map.get(f))
                .cloned()
                .unwrap_or_default()
        });
        if covered.is_empty() {
            return true;
        }
        // Coverage maps use 1-based line numbers.
        !covered.contains(&(self.current_line_index + 1))
    }

    /// True when the current line is excluded from mutation, either by a
    /// `pragma: no mutate` comment or by the coverage map.
    pub fn exclude_line(&mut self) -> bool {
        let line = self.current_line_index;
        self.pragma_lines().contains(&line) || self.excluded_by_coverage()
    }

    /// True when a mutation of the given kind at the current position should
    /// actually be applied (as opposed to merely counted).
    pub fn should_mutate(&self, mutation_kind: &str) -> bool {
        if let Some(config) = &self.config {
            if !config.mutation_types_to_apply.contains(mutation_kind) {
                return false;
            }
        }
        match &self.selection {
            MutationSelection::All => true,
            MutationSelection::Id(id) => *id == self.mutation_id_of_current_index(),
        }
    }
}
