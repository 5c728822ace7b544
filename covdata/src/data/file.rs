// SPDX-License-Identifier: GPL-3.0-or-later

//! This module names and locates the data files on disk.
//!
//! A session writes to a primary file (`.coverage` by default). In parallel
//! mode every process writes to a sibling of the primary file instead, which
//! carries a process unique suffix: `.coverage.<host>.<pid>.X<random>`.
//! Those siblings are what the combine step collects.

use super::{CoverageData, DataError, SerializationError};
use crate::context::Context;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataFileError {
    #[error("Couldn't read data file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: SerializationError,
    },
    #[error("Couldn't write data file '{}': {source}", path.display())]
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
    #[error("Couldn't list data files in '{}': {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Couldn't merge into data file '{}': {source}", path.display())]
    Data {
        path: PathBuf,
        #[source]
        source: DataError,
    },
}

/// The data file of the current process.
#[derive(Debug, Clone)]
pub struct DataFile {
    primary: PathBuf,
    parallel: bool,
    suffix: String,
}

impl DataFile {
    /// Creates the data file handle.
    ///
    /// A relative primary name is taken relative to the current directory of
    /// the context.
    pub fn new(primary: impl Into<PathBuf>, parallel: bool, context: &Context) -> Self {
        let primary = context.current_directory.join(primary.into());
        Self { primary, parallel, suffix: context.process_suffix() }
    }

    /// The primary data file, which is also the output of the combine step.
    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// The file this process writes its measurement into.
    pub fn target(&self) -> PathBuf {
        if self.parallel {
            let mut name = self.primary.clone().into_os_string();
            name.push(".");
            name.push(&self.suffix);
            PathBuf::from(name)
        } else {
            self.primary.clone()
        }
    }

    /// The locator of the parallel siblings of the primary file.
    pub fn parallel_files(&self) -> ParallelFiles {
        ParallelFiles::of(&self.primary)
    }

    /// Writes the measurement into the target file.
    ///
    /// With append, the existing content of the target is merged in first.
    /// Returns the path of the written file.
    pub fn save(&self, data: &CoverageData, append: bool) -> Result<PathBuf, DataFileError> {
        let target = self.target();

        let mut content = data.clone();
        if append && target.exists() {
            let mut existing = CoverageData::read(&target)
                .map_err(|source| DataFileError::Read { path: target.clone(), source })?;
            existing
                .update(data)
                .map_err(|source| DataFileError::Data { path: target.clone(), source })?;
            content = existing;
        } else if append {
            log::debug!("Data file does not exist, nothing to append to: {}", target.display());
        }

        content
            .write(&target)
            .map_err(|source| DataFileError::Write { path: target.clone(), source })?;
        log::debug!("Data file written: {}", target.display());
        Ok(target)
    }

    /// Deletes the primary file and all of its parallel siblings.
    ///
    /// Returns the removed files. Missing files are not an error.
    pub fn erase(&self) -> Result<Vec<PathBuf>, DataFileError> {
        let mut candidates = self
            .parallel_files()
            .find()
            .map_err(|source| DataFileError::Scan { path: self.directory(), source })?;
        candidates.insert(0, self.primary.clone());

        let mut removed = Vec::new();
        for path in candidates {
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::debug!("Data file removed: {}", path.display());
                    removed.push(path);
                }
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(DataFileError::Remove { path, source }),
            }
        }
        Ok(removed)
    }

    fn directory(&self) -> PathBuf {
        self.primary.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

/// Finds the parallel data files of a primary data file.
///
/// A file is a parallel sibling when its name starts with the primary file
/// name followed by a dot, and something comes after the dot.
#[derive(Debug, Clone)]
pub struct ParallelFiles {
    directory: PathBuf,
    prefix: OsString,
}

impl ParallelFiles {
    pub fn of(primary: &Path) -> Self {
        let directory = primary.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut prefix = primary.file_name().map(OsStr::to_os_string).unwrap_or_default();
        prefix.push(".");
        Self { directory, prefix }
    }

    /// Tells if the file name belongs to a parallel data file.
    pub fn matches(&self, name: &OsStr) -> bool {
        let name = name.as_encoded_bytes();
        let prefix = self.prefix.as_encoded_bytes();
        name.len() > prefix.len() && name.starts_with(prefix)
    }

    /// Lists the parallel data files next to the primary file.
    pub fn find(&self) -> io::Result<Vec<PathBuf>> {
        self.find_in(&self.directory)
    }

    /// Lists the files in the directory which match the parallel file names.
    ///
    /// The result is sorted, which makes the processing order deterministic.
    pub fn find_in(&self, directory: &Path) -> io::Result<Vec<PathBuf>> {
        let directory = if directory.as_os_str().is_empty() { Path::new(".") } else { directory };

        let mut result = Vec::new();
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file() && self.matches(&entry.file_name()) {
                result.push(entry.path());
            }
        }
        result.sort();
        Ok(result)
    }
}
