use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal and pending states of a mutant. The stored serde names match the
/// on-disk cache format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutantStatus {
    #[serde(rename = "untested")]
    Untested,
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "ok_killed")]
    Killed,
    #[serde(rename = "bad_survived")]
    Survived,
    #[serde(rename = "ok_suspicious")]
    Suspicious,
    #[serde(rename = "bad_timeout")]
    Timeout,
}

impl fmt::Display for MutantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutantStatus::Untested => "untested",
            MutantStatus::Skipped => "skipped",
            MutantStatus::Killed => "killed",
            MutantStatus::Survived => "survived",
            MutantStatus::Suspicious => "suspicious",
            MutantStatus::Timeout => "timeout",
        };
        f.write_str(name)
    }
}
