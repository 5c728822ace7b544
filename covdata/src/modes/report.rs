// SPDX-License-Identifier: GPL-3.0-or-later

//! User facing messages of the application.
//!
//! Warnings and errors go to the error stream, prefixed with the program
//! name. Warnings carry their kind, so the user can find the name to
//! silence them in the configuration.

use crate::combine::Warning;
use crate::config;
use crate::data::CoverageData;
use std::io::{self, Write};
use std::path::Path;

const PROGRAM: &str = "covdata";

pub(super) struct Reporter<'a> {
    filter: &'a config::Warnings,
    quiet: bool,
}

impl<'a> Reporter<'a> {
    pub(super) fn new(filter: &'a config::Warnings, quiet: bool) -> Self {
        Self { filter, quiet }
    }

    /// Prints the warnings which are not disabled.
    pub(super) fn warnings(&self, output: &mut impl Write, warnings: &[Warning]) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        for warning in warnings.iter().filter(|warning| self.filter.is_enabled(warning.kind)) {
            writeln!(output, "{PROGRAM}: warning ({}): {}", warning.kind, warning.message)?;
        }
        Ok(())
    }

    pub(super) fn summary(&self, output: &mut impl Write, combined: usize, target: &Path) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(output, "Combined {combined} data file(s) into {}", target.display())
    }
}

/// Prints the terminating message of a failed run.
pub(super) fn error(output: &mut impl Write, error: &dyn std::error::Error) -> io::Result<()> {
    writeln!(output, "{PROGRAM}: {error}")
}

/// Prints the summary of a data file.
pub(super) fn data_summary(output: &mut impl Write, path: &Path, data: Option<&CoverageData>) -> io::Result<()> {
    writeln!(output, "data file: {}", path.display())?;
    let Some(data) = data else {
        return writeln!(output, "No data collected: file doesn't exist");
    };

    writeln!(output, "mode: {}", data.mode())?;
    let counts = data.line_counts();
    writeln!(output, "measured files: {}", counts.len())?;
    for (file, count) in counts {
        writeln!(output, "{}: {count} lines", file.display())?;
    }
    Ok(())
}
