//! Config file rendering
//!
//! Single source of truth for the on-disk formats: the commented TOML
//! config file and the generated `.env` projection artifact.

use super::Config;
use crate::error::ControlError;

/// Header prepended to generated config files
const TOML_HEADER: &str = "\
# fwdctl configuration
#
# Resolution order: process environment > this file > built-in defaults.
# Structured sections ([[forward]], [rate_limit], ...) mirror the
# environment keys the forwarder consumes; run `fwdctl gen-config` to
# materialize the flat .env form.

";

impl Config {
    /// Serialize the model to a commented TOML document
    pub fn to_toml(&self) -> String {
        // Config only holds maps, sequences, and scalars, all of which
        // the TOML serializer accepts; a failure here is a programming
        // error in the model, not a user input problem.
        let body = toml::to_string_pretty(self)
            .unwrap_or_else(|e| format!("# serialization failed: {e}\n"));
        format!("{TOML_HEADER}{body}")
    }

    /// Write the TOML form to the config path, creating parent directories
    pub fn save(&self) -> Result<(), ControlError> {
        let Some(path) = Self::config_path() else {
            return Err(ControlError::config("could not determine config path"));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_toml())?;
        Ok(())
    }

    /// Render the `.env` artifact: one KEY=value line per projected key
    pub fn render_env_file(&self) -> Result<String, ControlError> {
        let env = self.to_env()?;
        let lines: Vec<String> = env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        Ok(lines.join("\n"))
    }

    /// Write the `.env` artifact into a directory, returning the path
    pub fn write_env_file(&self, dir: &std::path::Path) -> Result<std::path::PathBuf, ControlError> {
        let path = dir.join(".env");
        std::fs::write(&path, self.render_env_file()?)?;
        Ok(path)
    }
}
