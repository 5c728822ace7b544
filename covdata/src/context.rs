// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::{Context as AnyhowContext, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Application context containing runtime environment information.
///
/// The context is captured once at startup. Everything which identifies the
/// running process (the directory, the host and the process id) comes from
/// here, so the configuration and the combine phases do not query the
/// system again.
#[derive(Debug, Clone)]
pub struct Context {
    /// Path to the current executable
    pub current_executable: PathBuf,
    /// Current working directory when the program was invoked
    pub current_directory: PathBuf,
    /// Name of the machine
    pub host_name: String,
    /// Identifier of the current process
    pub process_id: u32,
    /// Random number to tell apart processes which reuse a process id
    pub random: u32,
}

impl Context {
    /// Capture the current application context.
    ///
    /// This function performs I/O operations to gather system state and should
    /// be called early in the application lifecycle, before any validation phase.
    pub fn capture() -> Result<Self> {
        let current_executable =
            env::current_exe().with_context(|| "Failed to get current executable path")?;

        let current_directory =
            env::current_dir().with_context(|| "Failed to get current working directory")?;

        Ok(Context {
            current_executable,
            current_directory,
            host_name: host_name(),
            process_id: std::process::id(),
            random: random_number(),
        })
    }

    /// The suffix which makes a data file name unique to this process.
    ///
    /// The format is `<host>.<pid>.X<random>`, where the random part is
    /// six digits long.
    pub fn process_suffix(&self) -> String {
        format!("{}.{}.X{:06}", self.host_name, self.process_id, self.random % 1_000_000)
    }
}

/// Falls back to `unknown`, the context capture does not fail over the host name.
fn host_name() -> String {
    whoami::fallible::hostname().unwrap_or_else(|error| {
        log::debug!("Failed to get host name: {error}");
        String::from("unknown")
    })
}

fn random_number() -> u32 {
    rand::random::<u32>() % 1_000_000
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application Context:")?;
        writeln!(f, "Current Executable: {}", self.current_executable.display())?;
        writeln!(f, "Current Directory: {}", self.current_directory.display())?;
        writeln!(f, "Host Name: {}", self.host_name)?;
        writeln!(f, "Process Id: {}", self.process_id)?;
        Ok(())
    }
}
