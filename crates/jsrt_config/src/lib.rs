//! The `jsrt.json` runtime configuration file.
//!
//! ```json
//! {
//!   "attributes": ["allow_script_interrupt"],
//!   "version": "edge",
//!   "cache_parsed_scripts": true,
//!   "memory_limit": 67108864
//! }
//! ```

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

/// Runtime creation flags, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeAttribute {
    DisableBackgroundWork,
    AllowScriptInterrupt,
    EnableIdleProcessing,
    DisableNativeCodeGeneration,
    DisableEval,
    EnableExperimentalFeatures,
    DispatchSetExceptionsToDebugger,
    DisableFatalOnOom,
    DisableExecutablePageAllocation,
}

/// Engine language level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeVersion {
    V10,
    V11,
    #[default]
    Edge,
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V10 => "v10",
            Self::V11 => "v11",
            Self::Edge => "edge",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<RuntimeAttribute>,
    pub version: RuntimeVersion,
    /// Parse each script once per context and reuse the parsed function
    pub cache_parsed_scripts: bool,
    /// Bytes; absent means unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,

    #[serde(skip)]
    path: Option<Utf8PathBuf>,
}

impl RuntimeConfig {
    /// `./jsrt.json`
    pub fn default_path() -> Utf8PathBuf {
        Utf8PathBuf::from("jsrt.json")
    }

    /// Where [`save`](Self::save) writes to.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_attributes(
        mut self,
        attributes: impl IntoIterator<Item = RuntimeAttribute>,
    ) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: RuntimeVersion) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_cache_parsed_scripts(mut self, cache: bool) -> Self {
        self.cache_parsed_scripts = cache;
        self
    }

    /// `None` lifts the limit.
    #[must_use]
    pub fn with_memory_limit(mut self, limit: Option<u64>) -> Self {
        self.memory_limit = limit;
        self
    }

    pub fn path(&self) -> Utf8PathBuf {
        self.path.clone().unwrap_or_else(Self::default_path)
    }

    /// Reads a config file. A missing file yields the defaults, bound to
    /// `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {path}, using defaults");
            return Ok(Self::default().with_path(path));
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {path}"))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {path}"))?;
        debug!("Loaded config from {path}");
        Ok(config.with_path(path))
    }

    /// Writes the config as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails when the file or its directory cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent}"))?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, contents + "\n")
            .with_context(|| format!("Failed to write config {path}"))?;
        debug!("Saved config to {path}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("temp dir should be UTF-8")
    }

    #[test]
    fn test_parse_documented_example() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{
                "attributes": ["allow_script_interrupt"],
                "version": "edge",
                "cache_parsed_scripts": true,
                "memory_limit": 67108864
            }"#,
        )
        .expect("example should parse");

        assert_eq!(config.attributes, vec![RuntimeAttribute::AllowScriptInterrupt]);
        assert_eq!(config.version, RuntimeVersion::Edge);
        assert!(config.cache_parsed_scripts);
        assert_eq!(config.memory_limit, Some(64 << 20));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: RuntimeConfig = serde_json::from_str(r#"{ "version": "v11" }"#)
            .expect("partial config should parse");

        assert!(config.attributes.is_empty());
        assert_eq!(config.version, RuntimeVersion::V11);
        assert!(!config.cache_parsed_scripts);
        assert_eq!(config.memory_limit, None);
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let result = serde_json::from_str::<RuntimeConfig>(r#"{ "attributes": ["turbo"] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_serialize_compactly() {
        let json = serde_json::to_value(RuntimeConfig::default()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "version": "edge", "cache_parsed_scripts": false })
        );
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "absent.json");

        let config = RuntimeConfig::load(&path).expect("load should succeed");

        assert_eq!(config, RuntimeConfig::default().with_path(&path));
        assert_eq!(config.path(), path);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "nested/jsrt.json");
        let config = RuntimeConfig {
            attributes: vec![
                RuntimeAttribute::DisableEval,
                RuntimeAttribute::EnableIdleProcessing,
            ],
            version: RuntimeVersion::V10,
            cache_parsed_scripts: true,
            memory_limit: Some(1024),
            ..RuntimeConfig::default()
        }
        .with_path(&path);

        config.save().expect("save should succeed");
        let loaded = RuntimeConfig::load(&path).expect("load should succeed");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = temp_path(&dir, "broken.json");
        fs::write(&path, "{ not json").expect("write");

        let err = RuntimeConfig::load(&path).unwrap_err();

        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_builder_matches_parsed_config() {
        let built = RuntimeConfig::default()
            .with_attributes([RuntimeAttribute::DisableEval])
            .with_version(RuntimeVersion::V11)
            .with_cache_parsed_scripts(true)
            .with_memory_limit(Some(2048));
        let parsed: RuntimeConfig = serde_json::from_str(
            r#"{
                "attributes": ["disable_eval"],
                "version": "v11",
                "cache_parsed_scripts": true,
                "memory_limit": 2048
            }"#,
        )
        .expect("config should parse");

        assert_eq!(built, parsed);
        assert_eq!(built.with_memory_limit(None).memory_limit, None);
    }

    #[test]
    fn test_default_path() {
        assert_eq!(RuntimeConfig::default_path(), "jsrt.json");
        assert_eq!(RuntimeConfig::default().path(), "jsrt.json");
    }
}
