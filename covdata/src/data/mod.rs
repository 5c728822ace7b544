// SPDX-License-Identifier: GPL-3.0-or-later

//! This module holds the coverage data of a measurement session.
//!
//! A store records, per source file, either the executed line numbers or the
//! executed arcs (line to line transitions). The two kinds never mix: the
//! store starts empty and the first data added decides its mode. Every fact
//! can carry context labels, which tell which run contributed it.
//!
//! Facts only accumulate. The only way to forget them is to erase the whole
//! store.

mod file;
mod format;

pub use file::{DataFile, DataFileError, ParallelFiles};
pub use format::SerializationError;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A line number in a source file. Real lines are positive.
pub type LineNumber = i32;

/// The line number marking the entry to or exit from a code object.
pub const SENTINEL: LineNumber = -1;

/// An observed transition from one line to another.
///
/// The ordering is lexicographic on `(from, to)`.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Arc {
    pub from: LineNumber,
    pub to: LineNumber,
}

impl Arc {
    pub fn new(from: LineNumber, to: LineNumber) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// The kind of data a store holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    Empty,
    Lines,
    Arcs,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Empty => "no",
            Mode::Lines => "line",
            Mode::Arcs => "arc",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("Can't add {attempted} data to a store holding {existing} data")]
    Mode { existing: Mode, attempted: Mode },
    #[error("Invalid line number {line} for '{}'", file.display())]
    InvalidLineNumber { file: PathBuf, line: LineNumber },
}

type Labels = BTreeSet<String>;
type Facts<T> = BTreeMap<T, Labels>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Measurement {
    /// Files known to the store without any execution recorded.
    Empty(BTreeSet<PathBuf>),
    Lines(BTreeMap<PathBuf, Facts<LineNumber>>),
    Arcs(BTreeMap<PathBuf, Facts<Arc>>),
}

impl Default for Measurement {
    fn default() -> Self {
        Measurement::Empty(BTreeSet::new())
    }
}

/// The coverage data of one process, or of many processes once combined.
///
/// Two stores compare equal when they hold the same facts, regardless of
/// their recording context.
#[derive(Clone, Debug, Default)]
pub struct CoverageData {
    /// The directory of the process which recorded the data.
    working_directory: Option<PathBuf>,
    /// The label attached to facts added from now on.
    context: Option<String>,
    measurement: Measurement,
}

impl PartialEq for CoverageData {
    fn eq(&self, other: &Self) -> bool {
        self.measurement == other.measurement
    }
}

impl Eq for CoverageData {}

impl CoverageData {
    /// Creates an empty store without a recorded working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store for a process running in the given directory.
    pub fn with_working_directory(directory: impl Into<PathBuf>) -> Self {
        Self { working_directory: Some(directory.into()), ..Self::default() }
    }

    /// The directory relative file names of this store are resolved against.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Sets the context label for the facts added afterwards.
    pub fn set_context(&mut self, context: Option<String>) {
        self.context = context;
    }

    pub fn mode(&self) -> Mode {
        match &self.measurement {
            Measurement::Empty(_) => Mode::Empty,
            Measurement::Lines(_) => Mode::Lines,
            Measurement::Arcs(_) => Mode::Arcs,
        }
    }

    /// True when the store does not know about any file.
    pub fn is_empty(&self) -> bool {
        match &self.measurement {
            Measurement::Empty(files) => files.is_empty(),
            Measurement::Lines(files) => files.is_empty(),
            Measurement::Arcs(files) => files.is_empty(),
        }
    }

    /// Adds executed lines per file.
    ///
    /// Fails when the store holds arc data, or when a line number is not
    /// positive. The store is unchanged on failure.
    pub fn add_lines<I, P, L>(&mut self, mapping: I) -> Result<(), DataError>
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<PathBuf>,
        L: IntoIterator<Item = LineNumber>,
    {
        self.ensure_compatible(Mode::Lines)?;

        let mut validated = Vec::new();
        for (file, lines) in mapping {
            let file = file.into();
            let lines: Vec<LineNumber> = lines.into_iter().collect();
            if let Some(line) = lines.iter().find(|line| **line <= 0) {
                return Err(DataError::InvalidLineNumber { file, line: *line });
            }
            validated.push((file, lines));
        }

        let labels = self.current_labels();
        let files = self.lines_mut()?;
        for (file, lines) in validated {
            let facts = files.entry(file).or_default();
            for line in lines {
                facts.entry(line).or_default().extend(labels.iter().cloned());
            }
        }
        Ok(())
    }

    /// Adds executed arcs per file.
    ///
    /// Fails when the store holds line data, or when an endpoint is zero.
    /// The store is unchanged on failure.
    pub fn add_arcs<I, P, A>(&mut self, mapping: I) -> Result<(), DataError>
    where
        I: IntoIterator<Item = (P, A)>,
        P: Into<PathBuf>,
        A: IntoIterator<Item = Arc>,
    {
        self.ensure_compatible(Mode::Arcs)?;

        let mut validated = Vec::new();
        for (file, arcs) in mapping {
            let file = file.into();
            let arcs: Vec<Arc> = arcs.into_iter().collect();
            if arcs.iter().any(|arc| arc.from == 0 || arc.to == 0) {
                return Err(DataError::InvalidLineNumber { file, line: 0 });
            }
            validated.push((file, arcs));
        }

        let labels = self.current_labels();
        let files = self.arcs_mut()?;
        for (file, arcs) in validated {
            let facts = files.entry(file).or_default();
            for arc in arcs {
                facts.entry(arc).or_default().extend(labels.iter().cloned());
            }
        }
        Ok(())
    }

    /// Makes sure the file is known, even if nothing was executed in it.
    pub fn touch_file(&mut self, file: impl Into<PathBuf>) {
        let file = file.into();
        match &mut self.measurement {
            Measurement::Empty(files) => {
                files.insert(file);
            }
            Measurement::Lines(files) => {
                files.entry(file).or_default();
            }
            Measurement::Arcs(files) => {
                files.entry(file).or_default();
            }
        }
    }

    /// The files known to the store, in sorted order.
    pub fn measured_files(&self) -> Vec<&Path> {
        match &self.measurement {
            Measurement::Empty(files) => files.iter().map(PathBuf::as_path).collect(),
            Measurement::Lines(files) => files.keys().map(PathBuf::as_path).collect(),
            Measurement::Arcs(files) => files.keys().map(PathBuf::as_path).collect(),
        }
    }

    /// The executed lines of a file, or `None` when the file is unknown.
    ///
    /// With arc data, a line is executed when it is a real endpoint of any
    /// recorded arc.
    pub fn lines(&self, file: &Path) -> Option<BTreeSet<LineNumber>> {
        match &self.measurement {
            Measurement::Empty(files) => files.contains(file).then(BTreeSet::new),
            Measurement::Lines(files) => files.get(file).map(|facts| facts.keys().copied().collect()),
            Measurement::Arcs(files) => files.get(file).map(|facts| {
                facts
                    .keys()
                    .flat_map(|arc| [arc.from, arc.to])
                    .filter(|line| *line > 0)
                    .collect()
            }),
        }
    }

    /// The executed arcs of a file.
    ///
    /// `None` when the file is unknown or the store holds line data.
    pub fn arcs(&self, file: &Path) -> Option<BTreeSet<Arc>> {
        match &self.measurement {
            Measurement::Empty(files) => files.contains(file).then(BTreeSet::new),
            Measurement::Lines(_) => None,
            Measurement::Arcs(files) => files.get(file).map(|facts| facts.keys().copied().collect()),
        }
    }

    /// The context labels which contributed the execution of a line.
    pub fn line_contexts(&self, file: &Path, line: LineNumber) -> BTreeSet<String> {
        match &self.measurement {
            Measurement::Empty(_) => BTreeSet::new(),
            Measurement::Lines(files) => files
                .get(file)
                .and_then(|facts| facts.get(&line))
                .cloned()
                .unwrap_or_default(),
            Measurement::Arcs(files) => files
                .get(file)
                .map(|facts| {
                    facts
                        .iter()
                        .filter(|(arc, _)| arc.from == line || arc.to == line)
                        .flat_map(|(_, labels)| labels.iter().cloned())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// The context labels which contributed an arc.
    pub fn arc_contexts(&self, file: &Path, arc: Arc) -> BTreeSet<String> {
        match &self.measurement {
            Measurement::Arcs(files) => files
                .get(file)
                .and_then(|facts| facts.get(&arc))
                .cloned()
                .unwrap_or_default(),
            _ => BTreeSet::new(),
        }
    }

    /// The number of executed lines per file.
    pub fn line_counts(&self) -> BTreeMap<PathBuf, usize> {
        self.measured_files()
            .into_iter()
            .map(|file| {
                let count = self.lines(file).map(|lines| lines.len()).unwrap_or_default();
                (file.to_path_buf(), count)
            })
            .collect()
    }

    /// Merges the facts of another store into this one.
    ///
    /// File names are taken as they are, the caller is responsible to make
    /// them canonical first. Fails when the two stores hold different kinds
    /// of data; this store is unchanged in that case.
    pub fn update(&mut self, other: &CoverageData) -> Result<(), DataError> {
        match &other.measurement {
            Measurement::Empty(files) => {
                for file in files {
                    self.touch_file(file.clone());
                }
            }
            Measurement::Lines(other_files) => {
                self.ensure_compatible(Mode::Lines)?;
                let files = self.lines_mut()?;
                for (file, facts) in other_files {
                    union(files.entry(file.clone()).or_default(), facts);
                }
            }
            Measurement::Arcs(other_files) => {
                self.ensure_compatible(Mode::Arcs)?;
                let files = self.arcs_mut()?;
                for (file, facts) in other_files {
                    union(files.entry(file.clone()).or_default(), facts);
                }
            }
        }
        Ok(())
    }

    /// Forgets every recorded fact, the store becomes empty.
    pub fn erase(&mut self) {
        self.measurement = Measurement::default();
    }

    /// Renames every file with the given function.
    ///
    /// Files which are mapped to the same name are merged.
    pub fn map_paths<F, E>(self, mut function: F) -> Result<Self, E>
    where
        F: FnMut(&Path) -> Result<PathBuf, E>,
    {
        let measurement = match self.measurement {
            Measurement::Empty(files) => Measurement::Empty(
                files.iter().map(|file| function(file)).collect::<Result<_, _>>()?,
            ),
            Measurement::Lines(files) => Measurement::Lines(rekey(files, &mut function)?),
            Measurement::Arcs(files) => Measurement::Arcs(rekey(files, &mut function)?),
        };
        Ok(Self { measurement, ..self })
    }

    fn ensure_compatible(&self, attempted: Mode) -> Result<(), DataError> {
        match self.mode() {
            Mode::Empty => Ok(()),
            existing if existing == attempted => Ok(()),
            existing => Err(DataError::Mode { existing, attempted }),
        }
    }

    fn current_labels(&self) -> Labels {
        self.context.iter().cloned().collect()
    }

    fn lines_mut(&mut self) -> Result<&mut BTreeMap<PathBuf, Facts<LineNumber>>, DataError> {
        if let Measurement::Empty(touched) = &mut self.measurement {
            let files = std::mem::take(touched).into_iter().map(|file| (file, Facts::new())).collect();
            self.measurement = Measurement::Lines(files);
        }
        match &mut self.measurement {
            Measurement::Lines(files) => Ok(files),
            _ => Err(DataError::Mode { existing: Mode::Arcs, attempted: Mode::Lines }),
        }
    }

    fn arcs_mut(&mut self) -> Result<&mut BTreeMap<PathBuf, Facts<Arc>>, DataError> {
        if let Measurement::Empty(touched) = &mut self.measurement {
            let files = std::mem::take(touched).into_iter().map(|file| (file, Facts::new())).collect();
            self.measurement = Measurement::Arcs(files);
        }
        match &mut self.measurement {
            Measurement::Arcs(files) => Ok(files),
            _ => Err(DataError::Mode { existing: Mode::Lines, attempted: Mode::Arcs }),
        }
    }
}

fn union<T: Ord + Clone>(into: &mut Facts<T>, from: &Facts<T>) {
    for (fact, labels) in from {
        into.entry(fact.clone()).or_default().extend(labels.iter().cloned());
    }
}

fn rekey<T, F, E>(
    files: BTreeMap<PathBuf, Facts<T>>,
    function: &mut F,
) -> Result<BTreeMap<PathBuf, Facts<T>>, E>
where
    T: Ord + Clone,
    F: FnMut(&Path) -> Result<PathBuf, E>,
{
    let mut result: BTreeMap<PathBuf, Facts<T>> = BTreeMap::new();
    for (file, facts) in files {
        let renamed = function(&file)?;
        union(result.entry(renamed).or_default(), &facts);
    }
    Ok(result)
}
