// SPDX-License-Identifier: GPL-3.0-or-later

//! This module defines the configuration of the application.
//!
//! The configuration is either loaded from a file or used with default
//! values, which are defined in the code.
//!
//! The configuration file syntax is based on the YAML format.
//! The default configuration file name is `covdata.yml`.
//!
//! The configuration file location is searched in the following order:
//! 1. The current working directory
//! 2. The local configuration directory of the user
//! 3. The configuration directory of the user
//! 4. The local configuration directory of the application
//! 5. The configuration directory of the application
//!
//! ```yaml
//! schema: 1.0
//!
//! data:
//!   file: .coverage
//!   parallel: true
//!
//! paths:
//!   - canonical: src
//!     patterns: ["*/d1", "/ci/build/*/src"]
//!
//! combine:
//!   keep: false
//!   append: false
//!
//! warnings:
//!   disabled: [couldnt-use-data-file]
//! ```

// Re-Export the types and the loader module content.
pub use loader::{ConfigError, Loader};
pub use types::*;
pub use validation::Validator;

mod types {
    use crate::combine::WarningKind;
    use serde::Deserialize;
    use std::fmt;
    use std::path::PathBuf;

    /// Represents the application configuration.
    #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Main {
        #[serde(deserialize_with = "validate_schema_version")]
        pub schema: String,
        #[serde(default)]
        pub data: Data,
        #[serde(default)]
        pub paths: Vec<PathAlias>,
        #[serde(default)]
        pub combine: Combine,
        #[serde(default)]
        pub warnings: Warnings,
    }

    impl Default for Main {
        fn default() -> Self {
            Self {
                schema: String::from(SUPPORTED_SCHEMA_VERSION),
                data: Data::default(),
                paths: vec![],
                combine: Combine::default(),
                warnings: Warnings::default(),
            }
        }
    }

    impl fmt::Display for Main {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "Configuration:")?;
            let yaml_string = serde_yml::to_string(self).map_err(|_| fmt::Error)?;
            for line in yaml_string.lines() {
                writeln!(f, "{}", line)?;
            }
            Ok(())
        }
    }

    /// Where the measurement data is stored.
    #[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Data {
        /// The primary data file.
        #[serde(default = "default_data_file")]
        pub file: PathBuf,
        /// Every process writes its own data file next to the primary.
        #[serde(default)]
        pub parallel: bool,
    }

    impl Default for Data {
        fn default() -> Self {
            Self { file: default_data_file(), parallel: false }
        }
    }

    /// An alias rule: file names matching any of the patterns are reported
    /// under the canonical directory.
    #[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct PathAlias {
        pub canonical: PathBuf,
        pub patterns: Vec<String>,
    }

    #[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Combine {
        /// Keep the combined data files.
        #[serde(default)]
        pub keep: bool,
        /// Merge into the existing primary data file.
        #[serde(default)]
        pub append: bool,
    }

    #[derive(Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize)]
    pub struct Warnings {
        /// Warnings which are not printed.
        #[serde(default)]
        pub disabled: Vec<WarningKind>,
    }

    impl Warnings {
        pub fn is_enabled(&self, kind: WarningKind) -> bool {
            !self.disabled.contains(&kind)
        }
    }

    pub(super) const SUPPORTED_SCHEMA_VERSION: &str = "1.0";

    fn default_data_file() -> PathBuf {
        PathBuf::from(".coverage")
    }

    // Custom deserialization function to validate the schema version
    fn validate_schema_version<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let schema: String = Deserialize::deserialize(deserializer)?;
        if schema != SUPPORTED_SCHEMA_VERSION {
            use serde::de::Error;
            Err(Error::custom(format!(
                "Unsupported schema version: {schema}. Expected: {SUPPORTED_SCHEMA_VERSION}"
            )))
        } else {
            Ok(schema)
        }
    }
}

pub mod validation {

    use super::types::*;
    use thiserror::Error;

    /// Trait for validating configuration objects
    pub trait Validator<T> {
        type Error: std::error::Error;

        fn validate(config: &T) -> Result<(), Self::Error>;
    }

    /// Validation errors for configuration
    #[derive(Debug, Error)]
    pub enum ValidationError {
        #[error("Empty string value for field '{field}'")]
        EmptyString { field: String },
        #[error("Empty list for field '{field}'")]
        EmptyList { field: String },
        #[error("Duplicate {field} entry at: {idx}")]
        DuplicateEntry { field: &'static str, idx: usize },
        #[error("Multiple validation errors: {errors:?}")]
        Multiple { errors: Vec<ValidationError> },
    }

    /// Combinator for collecting and handling validation errors
    #[derive(Default)]
    struct ValidationCollector {
        errors: Vec<ValidationError>,
    }

    impl ValidationCollector {
        fn new() -> Self {
            Self { errors: Vec::new() }
        }

        fn add(&mut self, error: ValidationError) {
            self.errors.push(error);
        }

        fn add_result(&mut self, result: Result<(), ValidationError>) {
            if let Err(error) = result {
                match error {
                    ValidationError::Multiple { errors } => {
                        self.errors.extend(errors);
                    }
                    single_error => self.errors.push(single_error),
                }
            }
        }

        fn finish(mut self) -> Result<(), ValidationError> {
            match self.errors.len() {
                0 => Ok(()),
                1 => Err(self.errors.remove(0)),
                _ => Err(ValidationError::Multiple { errors: self.errors }),
            }
        }
    }

    impl Validator<Main> for Main {
        type Error = ValidationError;

        fn validate(config: &Main) -> Result<(), Self::Error> {
            let mut collector = ValidationCollector::new();

            collector.add_result(Data::validate(&config.data));

            for (idx, alias) in config.paths.iter().enumerate() {
                collector.add_result(PathAlias::validate(alias).map_err(|error| match error {
                    ValidationError::EmptyString { field } => {
                        ValidationError::EmptyString { field: format!("paths[{idx}].{field}") }
                    }
                    ValidationError::EmptyList { field } => {
                        ValidationError::EmptyList { field: format!("paths[{idx}].{field}") }
                    }
                    other => other,
                }));
            }

            // Check for duplicate canonical paths
            let mut seen_paths = std::collections::HashSet::new();
            for (idx, alias) in config.paths.iter().enumerate() {
                if !seen_paths.insert(&alias.canonical) {
                    collector.add(ValidationError::DuplicateEntry { field: "paths", idx });
                }
            }

            collector.finish()
        }
    }

    impl Validator<Data> for Data {
        type Error = ValidationError;

        fn validate(config: &Data) -> Result<(), Self::Error> {
            if config.file.as_os_str().is_empty() {
                Err(ValidationError::EmptyString { field: "data.file".to_string() })
            } else {
                Ok(())
            }
        }
    }

    impl Validator<PathAlias> for PathAlias {
        type Error = ValidationError;

        fn validate(config: &PathAlias) -> Result<(), Self::Error> {
            let mut collector = ValidationCollector::new();

            if config.canonical.as_os_str().is_empty() {
                collector.add(ValidationError::EmptyString { field: "canonical".to_string() });
            }
            if config.patterns.is_empty() {
                collector.add(ValidationError::EmptyList { field: "patterns".to_string() });
            }
            for (idx, pattern) in config.patterns.iter().enumerate() {
                if pattern.trim().is_empty() {
                    collector.add(ValidationError::EmptyString { field: format!("patterns[{idx}]") });
                }
            }

            collector.finish()
        }
    }

}

pub mod loader {
    use super::{Main, Validator};
    use directories::{BaseDirs, ProjectDirs};
    use log::{debug, info};
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};
    use thiserror::Error;

    pub struct Loader {}

    impl Loader {
        /// Loads the configuration from the specified file or the default locations.
        ///
        /// If the configuration file is specified, it will be used. Otherwise, the default locations
        /// will be searched for the configuration file. If the configuration file is not found, the
        /// default configuration will be returned.
        pub fn load(
            context: &crate::context::Context,
            filename: &Option<String>,
        ) -> Result<Main, ConfigError> {
            if let Some(path) = filename {
                Self::from_file(&context.current_directory.join(path))
            } else {
                let locations = Self::file_locations(context);
                for location in locations {
                    debug!("Checking configuration file: {}", location.display());
                    if location.exists() {
                        return Self::from_file(location.as_path());
                    }
                }
                debug!("Configuration file not found. Using the default configuration.");
                Ok(Main::default())
            }
        }

        /// The default locations where the configuration file can be found.
        ///
        /// The locations are searched in the following order:
        /// - The current working directory.
        /// - The local configuration directory of the user.
        /// - The configuration directory of the user.
        /// - The local configuration directory of the application.
        /// - The configuration directory of the application.
        fn file_locations(context: &crate::context::Context) -> Vec<PathBuf> {
            let mut locations = Vec::new();

            locations.push(context.current_directory.clone());
            if let Some(base_dirs) = BaseDirs::new() {
                locations.push(base_dirs.config_local_dir().to_path_buf());
                locations.push(base_dirs.config_dir().to_path_buf());
            }

            if let Some(proj_dirs) = ProjectDirs::from("com.github", "rizsotto", "covdata") {
                locations.push(proj_dirs.config_local_dir().to_path_buf());
                locations.push(proj_dirs.config_dir().to_path_buf());
            }
            // filter out duplicate elements from the list
            locations.dedup();
            // append the default configuration file name to the locations
            locations.iter().map(|p| p.join("covdata.yml")).collect()
        }

        /// Loads the configuration from the specified file.
        pub fn from_file(path: &Path) -> Result<Main, ConfigError> {
            info!("Loading configuration file: {}", path.display());

            let reader = OpenOptions::new()
                .read(true)
                .open(path)
                .map_err(|source| ConfigError::FileAccess { path: path.to_path_buf(), source })?;

            let content: Main = Self::from_reader(reader)
                .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })?;

            Main::validate(&content)
                .map_err(|source| ConfigError::ValidationError { path: path.to_path_buf(), source })?;

            Ok(content)
        }

        /// Define the deserialization format of the config file.
        fn from_reader<R, T>(rdr: R) -> serde_yml::Result<T>
        where
            R: std::io::Read,
            T: serde::de::DeserializeOwned,
        {
            serde_yml::from_reader(rdr)
        }
    }

    /// Represents all possible configuration-related errors.
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// Error when opening or reading a configuration file.
        #[error("Failed to access configuration file '{path}': {source}")]
        FileAccess {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        /// Error when parsing the configuration file format.
        #[error("Failed to parse configuration from file '{path}': {source}")]
        ParseError {
            path: PathBuf,
            #[source]
            source: serde_yml::Error,
        },
        /// Error when configuration validation fails.
        #[error("Configuration validation failed for '{path}': {source}")]
        ValidationError {
            path: PathBuf,
            #[source]
            source: crate::config::validation::ValidationError,
        },
    }

}
