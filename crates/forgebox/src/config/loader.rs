//! Configuration file loading for Forgebox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("workspace_root is empty".into()));
        }
        match self.toolchain.command.first() {
            Some(program) if !program.is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "toolchain command is empty".into(),
                ));
            }
        }
        if self.toolchain.build_subcommand.is_empty() {
            return Err(ConfigError::Invalid(
                "toolchain build_subcommand is empty".into(),
            ));
        }
        if self.limits.build_timeout_ms == 0 {
            return Err(ConfigError::Invalid("build_timeout_ms must be positive".into()));
        }
        if self.limits.run_timeout_ms == 0 {
            return Err(ConfigError::Invalid("run_timeout_ms must be positive".into()));
        }
        if self.limits.max_output_bytes == 0 {
            return Err(ConfigError::Invalid("max_output_bytes must be positive".into()));
        }
        if self.execution.shell.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("execution shell is empty".into()));
        }

        Ok(())
    }
}
