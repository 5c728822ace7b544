// SPDX-License-Identifier: GPL-3.0-or-later

//! This module contains the command line interface of the application.
//!
//! The command line parsing is implemented using the `clap` library.
//! The module is defining types to represent a structured form of the
//! program invocation. The `Arguments` type is used to represent all
//! possible invocations of the program.

use anyhow::anyhow;
use clap::{ArgAction, ArgMatches, Command, arg, command};
use std::fmt;

/// Common constants used in the module.
const MODE_COMBINE_SUBCOMMAND: &str = "combine";
const MODE_ERASE_SUBCOMMAND: &str = "erase";
const MODE_DEBUG_SUBCOMMAND: &str = "debug";

/// Represents the command line arguments of the application.
#[derive(Debug, PartialEq)]
pub struct Arguments {
    // The path of the configuration file.
    pub config: Option<String>,
    // The primary data file, overrides the configuration.
    pub data_file: Option<String>,
    // The mode of the application.
    pub mode: Mode,
}

/// Represents the mode of the application.
#[derive(Debug, PartialEq)]
pub enum Mode {
    Combine(Combine),
    Erase,
    Debug,
}

/// Represents the combine invocation.
#[derive(Debug, PartialEq)]
pub struct Combine {
    /// Data files or directories to combine. Empty means the default location.
    pub paths: Vec<String>,
    pub append: bool,
    pub keep: bool,
    pub quiet: bool,
}

impl TryFrom<ArgMatches> for Arguments {
    type Error = anyhow::Error;

    fn try_from(matches: ArgMatches) -> Result<Self, Self::Error> {
        let config = matches.get_one::<String>("config").map(String::to_string);
        let data_file = matches.get_one::<String>("data-file").map(String::to_string);

        let mode = match matches.subcommand() {
            Some((MODE_COMBINE_SUBCOMMAND, combine_matches)) => {
                Mode::Combine(Combine::try_from(combine_matches)?)
            }
            Some((MODE_ERASE_SUBCOMMAND, _)) => Mode::Erase,
            Some((MODE_DEBUG_SUBCOMMAND, _)) => Mode::Debug,
            _ => return Err(anyhow!("unrecognized subcommand")),
        };
        Ok(Arguments { config, data_file, mode })
    }
}

impl TryFrom<&ArgMatches> for Combine {
    type Error = anyhow::Error;

    fn try_from(matches: &ArgMatches) -> Result<Self, Self::Error> {
        let paths = matches
            .get_many::<String>("PATH")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let append = matches.get_flag("append");
        let keep = matches.get_flag("keep");
        let quiet = matches.get_flag("quiet");
        Ok(Combine { paths, append, keep, quiet })
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Arguments:")?;
        writeln!(f, "  config: {}", self.config.as_deref().unwrap_or("-"))?;
        writeln!(f, "  data file: {}", self.data_file.as_deref().unwrap_or("-"))?;
        match &self.mode {
            Mode::Combine(combine) => write!(
                f,
                "  mode: combine (paths: {:?}, append: {}, keep: {}, quiet: {})",
                combine.paths, combine.append, combine.keep, combine.quiet
            ),
            Mode::Erase => write!(f, "  mode: erase"),
            Mode::Debug => write!(f, "  mode: debug"),
        }
    }
}

/// Represents the command line interface of the application.
///
/// This describes how the user can interact with the application.
/// The different modes of the application are represented as subcommands.
pub fn cli() -> Command {
    command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(&[
            arg!(-v --verbose ... "Sets the level of verbosity").action(ArgAction::Count),
            arg!(-c --config <FILE> "Path of the config file"),
            arg!(--"data-file" <FILE> "Path of the primary data file"),
        ])
        .subcommand(
            Command::new(MODE_COMBINE_SUBCOMMAND)
                .about("combine the data files of parallel runs")
                .args(&[
                    arg!([PATH] "Data files or directories to combine")
                        .action(ArgAction::Append)
                        .num_args(0..),
                    arg!(-a --append "Append to the existing primary data file")
                        .action(ArgAction::SetTrue),
                    arg!(--keep "Keep the combined data files").action(ArgAction::SetTrue),
                    arg!(-q --quiet "Don't print warnings").action(ArgAction::SetTrue),
                ]),
        )
        .subcommand(
            Command::new(MODE_ERASE_SUBCOMMAND)
                .about("erase the primary data file and its parallel data files"),
        )
        .subcommand(
            Command::new(MODE_DEBUG_SUBCOMMAND).about("print a summary of the primary data file"),
        )
}
