// SPDX-License-Identifier: GPL-3.0-or-later

//! This module merges the data files of many processes into one.
//!
//! The candidates are the parallel siblings of the primary data file (or the
//! explicitly named files and directories). Each candidate is read, its file
//! names are made canonical, and its facts are merged into the target store.
//! The target is then written to the primary data file.
//!
//! A candidate which can't be read does not abort the run. It is reported as
//! a warning, skipped and left on disk. When no candidate could be read at
//! all, the run fails after every candidate was tried.

mod statistics;
mod warning;

pub use statistics::CombineStatistics;
pub use warning::{Warning, WarningKind};

use crate::data::{CoverageData, DataError, DataFile, SerializationError};
use crate::paths::{Canonicalizer, PathResolutionError, normalize_lexically};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("No data to combine")]
    NoData,
    #[error("No usable data files")]
    NoUsableData { warnings: Vec<Warning> },
    #[error("Couldn't list data files in '{}': {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Couldn't read data file to append to '{}': {source}", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: SerializationError,
    },
    #[error("Couldn't canonicalize file names of '{}': {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: PathResolutionError,
    },
    #[error("Couldn't combine '{}': {source}", path.display())]
    Data {
        path: PathBuf,
        #[source]
        source: DataError,
    },
    #[error("Couldn't write combined data file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: SerializationError,
    },
    #[error("Couldn't remove data file '{}': {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineOptions {
    /// Keep the merged candidate files on disk.
    pub keep: bool,
    /// Fail when there is nothing to combine.
    pub strict: bool,
    /// Start from the content of the existing primary data file.
    pub append: bool,
}

#[derive(Debug)]
pub struct CombineOutcome {
    /// Number of candidate files merged.
    pub combined: usize,
    /// The recovered problems, in the order of occurrence.
    pub warnings: Vec<Warning>,
    pub statistics: CombineStatistics,
}

/// The combine engine of a measurement session.
#[derive(Debug, Clone)]
pub struct Combiner {
    data_file: DataFile,
    canonicalizer: Canonicalizer,
}

impl Combiner {
    pub fn new(data_file: DataFile, canonicalizer: Canonicalizer) -> Self {
        Self { data_file, canonicalizer }
    }

    pub fn data_file(&self) -> &DataFile {
        &self.data_file
    }

    /// Merges the candidates into the target and writes it to the primary
    /// data file.
    ///
    /// With no candidates given, the directory of the primary data file is
    /// searched. A directory candidate is searched the same way, a file
    /// candidate is taken as it is.
    pub fn combine(
        &self,
        target: &mut CoverageData,
        candidates: &[PathBuf],
        options: &CombineOptions,
    ) -> Result<CombineOutcome, CombineError> {
        let mut warnings = Vec::new();
        let mut statistics = CombineStatistics::default();

        if options.append {
            self.seed(target, &mut warnings, &mut statistics)?;
        }

        let files = self.discover(candidates, &mut warnings)?;
        statistics.candidates_discovered = files.len();
        if files.is_empty() {
            if options.strict {
                return Err(CombineError::NoData);
            }
            log::info!("No data files to combine.");
            return Ok(CombineOutcome { combined: 0, warnings, statistics });
        }

        let mut merged = Vec::new();
        for path in files {
            log::debug!("Combining data file: {}", path.display());
            let data = match CoverageData::read(&path) {
                Ok(data) => data,
                Err(error) => {
                    let warning = Warning::new(
                        WarningKind::UnreadableDataFile,
                        format!("Couldn't use data file '{}': {error}", path.display()),
                    );
                    log::warn!("{warning}");
                    warnings.push(warning);
                    statistics.candidates_unreadable += 1;
                    continue;
                }
            };
            self.merge(target, data, &path)?;
            merged.push(path);
        }
        statistics.candidates_merged = merged.len();

        if merged.is_empty() {
            let warning = Warning::new(WarningKind::NoUsableDataFiles, "No usable data files");
            log::warn!("{warning}");
            warnings.push(warning);
            return Err(CombineError::NoUsableData { warnings });
        }

        let primary = self.data_file.primary();
        target
            .write(primary)
            .map_err(|source| CombineError::Write { path: primary.to_path_buf(), source })?;
        log::debug!("Combined data written: {}", primary.display());

        if !options.keep {
            for path in &merged {
                fs::remove_file(path)
                    .map_err(|source| CombineError::Remove { path: path.clone(), source })?;
                log::debug!("Data file removed: {}", path.display());
                statistics.candidates_removed += 1;
            }
        }

        statistics.measured_files = target.measured_files().len();
        log::info!("{statistics}");

        Ok(CombineOutcome { combined: merged.len(), warnings, statistics })
    }

    /// Loads the existing primary data file into the target.
    fn seed(
        &self,
        target: &mut CoverageData,
        warnings: &mut Vec<Warning>,
        statistics: &mut CombineStatistics,
    ) -> Result<(), CombineError> {
        let primary = self.data_file.primary();
        if !primary.exists() {
            let warning = Warning::new(
                WarningKind::MissingAppendSource,
                format!("No data to append, '{}' does not exist", primary.display()),
            );
            log::warn!("{warning}");
            warnings.push(warning);
            return Ok(());
        }

        let existing = CoverageData::read(primary)
            .map_err(|source| CombineError::Append { path: primary.to_path_buf(), source })?;
        statistics.files_from_existing = existing.measured_files().len();
        self.merge(target, existing, primary)
    }

    /// Canonicalizes the file names of the data, then merges it into the target.
    fn merge(&self, target: &mut CoverageData, data: CoverageData, path: &Path) -> Result<(), CombineError> {
        let origin = data
            .working_directory()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_origin());
        let data = data
            .map_paths(|file| self.canonicalizer.canonicalize(file, &origin))
            .map_err(|source| CombineError::Path { path: path.to_path_buf(), source })?;
        target
            .update(&data)
            .map_err(|source| CombineError::Data { path: path.to_path_buf(), source })
    }

    /// Collects the candidate files, sorted and without the primary data file.
    fn discover(
        &self,
        candidates: &[PathBuf],
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<PathBuf>, CombineError> {
        let locator = self.data_file.parallel_files();
        let scan = |directory: &Path| {
            locator
                .find_in(directory)
                .map_err(|source| CombineError::Scan { path: directory.to_path_buf(), source })
        };

        let mut found = BTreeSet::new();
        if candidates.is_empty() {
            found.extend(scan(&self.default_origin())?.iter().map(|path| resolve(path)));
        }
        for candidate in candidates {
            if candidate.is_dir() {
                found.extend(scan(candidate)?.iter().map(|path| resolve(path)));
            } else if candidate.is_file() {
                found.insert(resolve(candidate));
            } else {
                let warning = Warning::new(
                    WarningKind::NonexistentPath,
                    format!("Couldn't combine from non-existent path '{}'", candidate.display()),
                );
                log::warn!("{warning}");
                warnings.push(warning);
            }
        }
        found.remove(&resolve(self.data_file.primary()));

        Ok(found.into_iter().collect())
    }

    /// The directory of the primary data file.
    fn default_origin(&self) -> PathBuf {
        self.data_file.primary().parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

/// The name which identifies a file, regardless of how it was spelled.
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path))
}
