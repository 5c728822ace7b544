// SPDX-License-Identifier: GPL-3.0-or-later

//! This module declares the persisted form of a coverage data store.
//!
//! The file is a single JSON document. The header identifies the document
//! and its version, the measurement carries the facts per file.
//!
//! ```json
//! {
//!   "format": "covdata",
//!   "version": 1,
//!   "working_directory": "/home/user/project",
//!   "measurement": {
//!     "mode": "lines",
//!     "files": {
//!       "/home/user/project/main.py": [[1, []], [2, ["test_main"]]]
//!     }
//!   }
//! }
//! ```
//!
//! Arcs are written as `[from, to, [labels...]]` triplets.
//!
//! # Note
//! The context label of the store is not persisted, only the labels which
//! were attached to the facts.

use super::{Arc, CoverageData, Facts, LineNumber, Measurement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

const FORMAT_NAME: &str = "covdata";
const FORMAT_VERSION: u32 = 1;

/// Represents errors that can occur while reading or writing a data file.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Generic IO error: {0}")]
    Io(#[from] io::Error),
    #[error("File is not a valid coverage data file: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("File has invalid coverage data: {0}")]
    Semantic(String),
}

#[derive(Debug, Deserialize, Serialize)]
struct Document {
    #[serde(deserialize_with = "validate_format_name")]
    format: String,
    #[serde(deserialize_with = "validate_format_version")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_directory: Option<PathBuf>,
    measurement: Stored,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum Stored {
    Empty { files: BTreeSet<PathBuf> },
    Lines { files: BTreeMap<PathBuf, Vec<(LineNumber, BTreeSet<String>)>> },
    Arcs { files: BTreeMap<PathBuf, Vec<(LineNumber, LineNumber, BTreeSet<String>)>> },
}

impl CoverageData {
    /// Reads a store from the given file.
    pub fn read(path: &Path) -> Result<Self, SerializationError> {
        let file = fs::File::open(path).map(io::BufReader::new)?;
        Self::read_from(file)
    }

    /// Writes the store to the given file.
    ///
    /// The content is written to a temporary file next to the destination,
    /// which is then renamed. A concurrent reader sees either the previous
    /// or the new content, never a partial one.
    pub fn write(&self, path: &Path) -> Result<(), SerializationError> {
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temporary = tempfile::Builder::new()
            .prefix(".covdata-")
            .suffix(".tmp")
            .tempfile_in(directory)?;
        {
            let mut writer = io::BufWriter::new(temporary.as_file_mut());
            self.write_to(&mut writer)?;
            io::Write::flush(&mut writer)?;
        }
        temporary.persist(path).map_err(|error| SerializationError::Io(error.error))?;
        Ok(())
    }

    pub(crate) fn read_from(reader: impl io::Read) -> Result<Self, SerializationError> {
        let document: Document = serde_json::from_reader(reader)?;
        CoverageData::try_from(document)
    }

    pub(crate) fn write_to(&self, writer: impl io::Write) -> Result<(), SerializationError> {
        let document = Document::from(self);
        serde_json::to_writer(writer, &document)?;
        Ok(())
    }
}

impl From<&CoverageData> for Document {
    fn from(data: &CoverageData) -> Self {
        let measurement = match &data.measurement {
            Measurement::Empty(files) => Stored::Empty { files: files.clone() },
            Measurement::Lines(files) => Stored::Lines {
                files: files
                    .iter()
                    .map(|(file, facts)| {
                        let entries = facts.iter().map(|(line, labels)| (*line, labels.clone())).collect();
                        (file.clone(), entries)
                    })
                    .collect(),
            },
            Measurement::Arcs(files) => Stored::Arcs {
                files: files
                    .iter()
                    .map(|(file, facts)| {
                        let entries = facts
                            .iter()
                            .map(|(arc, labels)| (arc.from, arc.to, labels.clone()))
                            .collect();
                        (file.clone(), entries)
                    })
                    .collect(),
            },
        };
        Document {
            format: String::from(FORMAT_NAME),
            version: FORMAT_VERSION,
            working_directory: data.working_directory.clone(),
            measurement,
        }
    }
}

impl TryFrom<Document> for CoverageData {
    type Error = SerializationError;

    fn try_from(document: Document) -> Result<Self, Self::Error> {
        let measurement = match document.measurement {
            Stored::Empty { files } => Measurement::Empty(files),
            Stored::Lines { files } => {
                let mut result = BTreeMap::new();
                for (file, entries) in files {
                    let mut facts: Facts<LineNumber> = Facts::new();
                    for (line, labels) in entries {
                        if line <= 0 {
                            return Err(invalid_line(&file, line));
                        }
                        facts.entry(line).or_default().extend(labels);
                    }
                    result.insert(file, facts);
                }
                Measurement::Lines(result)
            }
            Stored::Arcs { files } => {
                let mut result = BTreeMap::new();
                for (file, entries) in files {
                    let mut facts: Facts<Arc> = Facts::new();
                    for (from, to, labels) in entries {
                        if from == 0 || to == 0 {
                            return Err(invalid_line(&file, 0));
                        }
                        facts.entry(Arc::new(from, to)).or_default().extend(labels);
                    }
                    result.insert(file, facts);
                }
                Measurement::Arcs(result)
            }
        };
        Ok(CoverageData { working_directory: document.working_directory, context: None, measurement })
    }
}

fn invalid_line(file: &Path, line: LineNumber) -> SerializationError {
    SerializationError::Semantic(format!("invalid line number {line} for '{}'", file.display()))
}

fn validate_format_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name: String = Deserialize::deserialize(deserializer)?;
    if name != FORMAT_NAME {
        use serde::de::Error;
        Err(Error::custom(format!("Unknown format: {name}. Expected: {FORMAT_NAME}")))
    } else {
        Ok(name)
    }
}

fn validate_format_version<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let version: u32 = Deserialize::deserialize(deserializer)?;
    if version != FORMAT_VERSION {
        use serde::de::Error;
        Err(Error::custom(format!("Unsupported version: {version}. Expected: {FORMAT_VERSION}")))
    } else {
        Ok(version)
    }
}
