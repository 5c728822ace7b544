// SPDX-License-Identifier: GPL-3.0-or-later

mod report;

use crate::combine::{CombineError, CombineOptions, Combiner};
use crate::context::Context;
use crate::data::{CoverageData, DataFile};
use crate::paths::{Aliases, Canonicalizer, PathResolutionError};
use crate::{args, config};
use report::Reporter;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Represent the modes the application can run in.
///
/// - combine: merge the parallel data files into the primary data file.
/// - erase: remove the primary data file and its parallel data files.
/// - debug: print what the primary data file contains.
pub enum Mode {
    Combine(Combination),
    Erase(DataFile),
    Debug(DataFile),
}

/// Everything a combine run needs, resolved from arguments and configuration.
pub struct Combination {
    combiner: Combiner,
    candidates: Vec<PathBuf>,
    options: CombineOptions,
    working_directory: PathBuf,
    warnings: config::Warnings,
    quiet: bool,
}

impl Mode {
    /// Configure the application mode based on the command line arguments and the configuration.
    ///
    /// Command line flags take precedence over the configuration. Relative
    /// names are taken relative to the current directory.
    pub fn configure(
        context: Context,
        args: args::Arguments,
        config: config::Main,
    ) -> Result<Self, ConfigurationError> {
        let file = args.data_file.map(PathBuf::from).unwrap_or_else(|| config.data.file.clone());
        let data_file = DataFile::new(file, config.data.parallel, &context);
        log::debug!("Primary data file: {}", data_file.primary().display());

        match args.mode {
            args::Mode::Combine(combine) => {
                log::debug!("Mode: combine data files");

                let aliases = Aliases::from_config(&config.paths, &context.current_directory)
                    .map_err(ConfigurationError::InvalidAlias)?;
                let combiner = Combiner::new(data_file, Canonicalizer::new(aliases));

                let options = CombineOptions {
                    keep: combine.keep || config.combine.keep,
                    append: combine.append || config.combine.append,
                    strict: true,
                };
                let candidates =
                    combine.paths.iter().map(|path| context.current_directory.join(path)).collect();

                Ok(Self::Combine(Combination {
                    combiner,
                    candidates,
                    options,
                    working_directory: context.current_directory,
                    warnings: config.warnings,
                    quiet: combine.quiet,
                }))
            }
            args::Mode::Erase => {
                log::debug!("Mode: erase data files");
                Ok(Self::Erase(data_file))
            }
            args::Mode::Debug => {
                log::debug!("Mode: print data file summary");
                Ok(Self::Debug(data_file))
            }
        }
    }

    /// It actually runs the application mode.
    ///
    /// These errors are all run-time errors, the user was passing valid
    /// arguments and configuration.
    pub fn run(self) -> ExitCode {
        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr().lock();

        let status = match self {
            Self::Combine(combination) => combination.run(&mut stdout, &mut stderr),
            Self::Erase(data_file) => erase(&data_file),
            Self::Debug(data_file) => debug(&data_file, &mut stdout),
        };
        status.unwrap_or_else(|error| {
            log::error!("covdata: {error}");
            // Nothing else to do when the error stream is gone.
            let _ = report::error(&mut stderr, error.as_ref());
            ExitCode::FAILURE
        })
    }
}

type RunResult = Result<ExitCode, Box<dyn std::error::Error>>;

impl Combination {
    fn run(self, stdout: &mut impl Write, stderr: &mut impl Write) -> RunResult {
        let reporter = Reporter::new(&self.warnings, self.quiet);
        let mut target = CoverageData::with_working_directory(&self.working_directory);

        match self.combiner.combine(&mut target, &self.candidates, &self.options) {
            Ok(outcome) => {
                reporter.warnings(stderr, &outcome.warnings)?;
                reporter.summary(stdout, outcome.combined, self.combiner.data_file().primary())?;
                Ok(ExitCode::SUCCESS)
            }
            Err(CombineError::NoUsableData { warnings }) => {
                reporter.warnings(stderr, &warnings)?;
                Err(Box::new(CombineError::NoUsableData { warnings: vec![] }))
            }
            Err(error) => Err(Box::new(error)),
        }
    }
}

fn erase(data_file: &DataFile) -> RunResult {
    let removed = data_file.erase()?;
    log::info!("Data files removed: {}", removed.len());
    Ok(ExitCode::SUCCESS)
}

fn debug(data_file: &DataFile, stdout: &mut impl Write) -> RunResult {
    let path = data_file.primary();
    if !path.exists() {
        report::data_summary(stdout, path, None)?;
        return Ok(ExitCode::SUCCESS);
    }
    let data = CoverageData::read(path)?;
    report::data_summary(stdout, path, Some(&data))?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid path alias configuration: {0}")]
    InvalidAlias(PathResolutionError),
}
