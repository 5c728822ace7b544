// SPDX-License-Identifier: GPL-3.0-or-later

//! Test infrastructure for the process level tests
//!
//! This module provides utilities for setting up test directories, writing
//! data files as a measured process would, running the `covdata` binary and
//! validating its outputs.
//!
//! # Verbose Output Support
//!
//! Set `COVDATA_TEST_VERBOSE=1` environment variable to show the output of
//! the last `covdata` run when a test fails.
//!
//! ```ignore
//! let env = TestEnvironment::new("test_name")?;
//! env.record_lines(".coverage.1", "main.py", &[1, 2, 3])?;
//! let output = env.run_covdata_success(&["combine"])?;
//! env.load_data(".coverage")?.assert_line_count("main.py", 3)?;
//! ```

use anyhow::{Context, Result};
use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use covdata::data::{CoverageData, LineNumber, ParallelFiles};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

const COVDATA_BIN: &str = "covdata";

/// Test environment for the process level tests
///
/// Manages a temporary directory which is the working directory of the
/// executed binary.
#[derive(Debug)]
pub struct TestEnvironment {
    temp_dir: TempDir,
    root: PathBuf,
    test_name: String,
    verbose: bool,
    last_output: RefCell<Option<CovdataOutput>>,
}

impl TestEnvironment {
    /// Create a new test environment
    pub fn new(test_name: &str) -> Result<Self> {
        let temp_dir = TempDir::new()
            .with_context(|| format!("Failed to create temp dir for test: {}", test_name))?;
        let root = temp_dir.path().canonicalize()?;

        let verbose = std::env::var("COVDATA_TEST_VERBOSE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            temp_dir,
            root,
            test_name: test_name.to_string(),
            verbose,
            last_output: RefCell::new(None),
        })
    }

    /// The test directory, with symbolic links resolved
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The absolute path of a file in the test directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create files with the given content in the test directory
    pub fn create_files(&self, files: &[(&str, &str)]) -> Result<()> {
        for (path, content) in files {
            self.temp_dir
                .child(path)
                .write_str(content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        Ok(())
    }

    /// Create a configuration file, which the binary picks up from its working directory
    pub fn create_config(&self, config_yaml: &str) -> Result<PathBuf> {
        let config_path = self.path("covdata.yml");
        fs::write(&config_path, config_yaml)?;
        Ok(config_path)
    }

    /// Write a data file as a process running in the test directory would do
    pub fn record_lines(&self, data_file: &str, source: &str, lines: &[LineNumber]) -> Result<()> {
        let mut data = CoverageData::with_working_directory(self.root());
        data.add_lines([(source, lines.to_vec())])?;
        self.write_data(data_file, &data)
    }

    /// Write a data file with the given content
    pub fn write_data(&self, data_file: &str, data: &CoverageData) -> Result<()> {
        let path = self.path(data_file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        data.write(&path).with_context(|| format!("Failed to write data file: {}", data_file))?;
        Ok(())
    }

    /// Read a data file from the test directory
    pub fn load_data(&self, data_file: &str) -> Result<DataFileContent> {
        let data = CoverageData::read(&self.path(data_file))
            .with_context(|| format!("Failed to read data file: {}", data_file))?;
        Ok(DataFileContent { data, root: self.root.clone() })
    }

    /// Check if a file exists in the test directory
    pub fn file_exists(&self, path: &str) -> bool {
        self.path(path).exists()
    }

    /// The names of the parallel data files of a primary data file
    pub fn parallel_files(&self, primary: &str) -> Result<Vec<String>> {
        let found = ParallelFiles::of(&self.path(primary)).find()?;
        Ok(found
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect())
    }

    /// Run covdata with the given arguments
    pub fn run_covdata(&self, args: &[&str]) -> Result<CovdataOutput> {
        let mut cmd = Command::cargo_bin(COVDATA_BIN)?;
        cmd.current_dir(self.root()).env("RUST_LOG", "debug").env("RUST_BACKTRACE", "1").args(args);

        let output = cmd.output()?;
        let result = CovdataOutput { output };

        *self.last_output.borrow_mut() = Some(result.clone());

        Ok(result)
    }

    pub fn run_covdata_success(&self, args: &[&str]) -> Result<CovdataOutput> {
        let result = self.run_covdata(args)?;
        result.assert_success()?;
        Ok(result)
    }

    pub fn run_covdata_failure(&self, args: &[&str]) -> Result<CovdataOutput> {
        let result = self.run_covdata(args)?;
        result.assert_failure()?;
        Ok(result)
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        if self.verbose && std::thread::panicking() {
            eprintln!("\n=== Covdata Output (Test: {}) ===", self.test_name);
            match &*self.last_output.borrow() {
                Some(output) => output.show(),
                None => eprintln!("No covdata output available to show"),
            }
            eprintln!("=== End Covdata Output ===\n");
        }
    }
}

/// Covdata command output wrapper
#[derive(Debug, Clone)]
pub struct CovdataOutput {
    output: Output,
}

impl CovdataOutput {
    fn show(&self) {
        eprintln!("stdout:\n{}", self.stdout());
        eprintln!("stderr:\n{}", self.stderr());
        eprintln!("exit code: {:?}", self.exit_code());
    }

    /// Assert that covdata command succeeded
    pub fn assert_success(&self) -> Result<()> {
        if !self.output.status.success() {
            anyhow::bail!(
                "Covdata command failed with exit code: {:?}\nstdout: {}\nstderr: {}",
                self.output.status.code(),
                self.stdout(),
                self.stderr()
            );
        }
        Ok(())
    }

    /// Assert that covdata command failed
    pub fn assert_failure(&self) -> Result<()> {
        if self.output.status.success() {
            anyhow::bail!("Expected covdata command to fail, but it succeeded\nstdout: {}", self.stdout());
        }
        Ok(())
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).to_string()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.output.status.code()
    }

    /// The user facing warning lines of the given kind
    pub fn warnings(&self, kind: &str) -> Vec<String> {
        let prefix = format!("covdata: warning ({kind}): ");
        self.stderr()
            .lines()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(String::from)
            .collect()
    }
}

/// Data file wrapper with assertion helpers
#[derive(Debug)]
pub struct DataFileContent {
    data: CoverageData,
    root: PathBuf,
}

impl DataFileContent {
    pub fn data(&self) -> &CoverageData {
        &self.data
    }

    /// Assert the number of executed lines of a source file in the test directory
    pub fn assert_line_count(&self, source: &str, expected: usize) -> Result<()> {
        let path = self.root.join(source);
        let counts = self.data.line_counts();
        match counts.get(&path) {
            Some(actual) if *actual == expected => Ok(()),
            Some(actual) => anyhow::bail!(
                "Expected {} lines for {}, found {}",
                expected,
                path.display(),
                actual
            ),
            None => anyhow::bail!("File {} is not measured, files: {:?}", path.display(), counts.keys()),
        }
    }

    /// Assert that a source file in the test directory is not measured
    pub fn assert_not_measured(&self, source: &str) -> Result<()> {
        let path = self.root.join(source);
        if self.data.line_counts().contains_key(&path) {
            anyhow::bail!("File {} is not expected to be measured", path.display());
        }
        Ok(())
    }

    pub fn measured_file_count(&self) -> usize {
        self.data.measured_files().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_creation() -> Result<()> {
        let env = TestEnvironment::new("test_creation")?;
        assert!(env.root().exists());
        assert!(env.root().is_absolute());
        Ok(())
    }

    #[test]
    fn data_file_creation() -> Result<()> {
        let env = TestEnvironment::new("test_data_files")?;
        env.record_lines(".coverage.1", "main.py", &[1, 2])?;
        env.create_files(&[(".coverage.bad", "garbage"), ("other.txt", "")])?;

        assert_eq!(env.parallel_files(".coverage")?, vec![".coverage.1", ".coverage.bad"]);

        let content = env.load_data(".coverage.1")?;
        assert_eq!(content.measured_file_count(), 1);
        Ok(())
    }
}
