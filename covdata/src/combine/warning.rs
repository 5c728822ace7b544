// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a recovered problem.
///
/// Every kind has a stable name, which the configuration uses to silence it.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum WarningKind {
    /// A candidate data file could not be read. It was skipped.
    #[serde(rename = "couldnt-use-data-file")]
    UnreadableDataFile,
    /// None of the candidate data files could be read.
    #[serde(rename = "no-usable-data-files")]
    NoUsableDataFiles,
    /// Append was asked, but there was no primary data file.
    #[serde(rename = "no-data-to-append")]
    MissingAppendSource,
    /// An explicitly named candidate does not exist.
    #[serde(rename = "couldnt-combine-from-nonexistent-path")]
    NonexistentPath,
}

impl WarningKind {
    pub fn slug(&self) -> &'static str {
        match self {
            WarningKind::UnreadableDataFile => "couldnt-use-data-file",
            WarningKind::NoUsableDataFiles => "no-usable-data-files",
            WarningKind::MissingAppendSource => "no-data-to-append",
            WarningKind::NonexistentPath => "couldnt-combine-from-nonexistent-path",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// A recovered problem of the combine step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
