// SPDX-License-Identifier: GPL-3.0-or-later

//! Counters of a combine run.
//!
//! The engine updates the counters as it walks through the candidates. After
//! the run they are logged, which gives insight into what was discovered,
//! merged, skipped and removed.

use std::fmt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CombineStatistics {
    /// Number of candidate data files found.
    pub candidates_discovered: usize,

    /// Number of files read from the existing primary data file (append mode).
    pub files_from_existing: usize,

    /// Number of candidate data files merged into the target.
    pub candidates_merged: usize,

    /// Number of candidate data files which could not be read.
    pub candidates_unreadable: usize,

    /// Number of merged candidate data files removed from disk.
    pub candidates_removed: usize,

    /// Number of measured files in the combined data.
    pub measured_files: usize,
}

impl fmt::Display for CombineStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Combine pipeline:")?;
        writeln!(f, "  candidates discovered: {}", self.candidates_discovered)?;
        writeln!(f, "  previous measured files: {}", self.files_from_existing)?;
        writeln!(f, "  candidates merged: {}", self.candidates_merged)?;
        writeln!(f, "  candidates unreadable: {}", self.candidates_unreadable)?;
        writeln!(f, "  candidates removed: {}", self.candidates_removed)?;
        write!(f, "  total measured files: {}", self.measured_files)
    }
}
