use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{CommandRegistry, Operation};
use crate::fs::{FileSystem, FsError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Fs(#[from] FsError),
    #[error("Failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("Failed to parse config: {0}")]
    ParseJson(#[source] serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeJson(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub model: String,
    pub provider: String,
    pub endpoint: Option<String>,
    pub features: Vec<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            model: "codellama".to_string(),
            provider: "ollama".to_string(),
            endpoint: Some("http://localhost:11434".to_string()),
            features: ["completion", "chat", "explain", "refactor"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Container settings. Keys other than `enabled` and `images` are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub images: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Per-project settings stored at the project root.
///
/// `name` and `languages` are required; every per-operation map is keyed by
/// language identifier and holds a shell-style command line that takes
/// precedence over the built-in registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub languages: Vec<String>,
    #[serde(default)]
    pub build: BTreeMap<String, String>,
    #[serde(default)]
    pub run: BTreeMap<String, String>,
    #[serde(default)]
    pub test: BTreeMap<String, String>,
    #[serde(default)]
    pub lint: BTreeMap<String, String>,
    #[serde(default)]
    pub format: BTreeMap<String, String>,
    #[serde(default)]
    pub ai: AiSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lsp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerSettings>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::default_for("untitled")
    }
}

impl ProjectConfig {
    /// Default document: every built-in command, stock AI settings, docker off.
    pub fn default_for(name: &str) -> Self {
        let registry = CommandRegistry::builtin();
        let mut config = Self {
            name: name.to_string(),
            version: Some("0.1.0".to_string()),
            description: None,
            languages: registry
                .languages()
                .into_iter()
                .map(String::from)
                .collect(),
            build: BTreeMap::new(),
            run: BTreeMap::new(),
            test: BTreeMap::new(),
            lint: BTreeMap::new(),
            format: BTreeMap::new(),
            ai: AiSettings::default(),
            lsp: None,
            docker: Some(DockerSettings::default()),
        };
        for (operation, language, invocation) in registry.entries() {
            config
                .commands_mut(operation)
                .insert(language.to_string(), invocation.command_line());
        }
        config
    }

    pub fn commands(&self, operation: Operation) -> &BTreeMap<String, String> {
        match operation {
            Operation::Build => &self.build,
            Operation::Run => &self.run,
            Operation::Test => &self.test,
            Operation::Lint => &self.lint,
            Operation::Format => &self.format,
        }
    }

    pub fn commands_mut(&mut self, operation: Operation) -> &mut BTreeMap<String, String> {
        match operation {
            Operation::Build => &mut self.build,
            Operation::Run => &mut self.run,
            Operation::Test => &mut self.test,
            Operation::Lint => &mut self.lint,
            Operation::Format => &mut self.format,
        }
    }

    /// Command-line override for `language`; exact key first, then case-insensitive.
    pub fn override_for(&self, operation: Operation, language: &str) -> Option<&str> {
        let commands = self.commands(operation);
        let language = language.trim();
        commands
            .get(language)
            .or_else(|| {
                commands
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(language))
                    .map(|(_, line)| line)
            })
            .map(String::as_str)
            .filter(|line| !line.trim().is_empty())
    }
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".codeshell.toml", ".codeshell.json"]
}

pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(".codeshell.toml")
}

pub fn find_config<F: FileSystem + ?Sized>(fs: &F, project_root: &Path) -> Option<PathBuf> {
    config_filename_candidates()
        .into_iter()
        .map(|name| project_root.join(name))
        .find(|path| fs.exists(path))
}

pub fn parse_config(text: &str, format: ConfigFormat) -> Result<ProjectConfig, ConfigError> {
    match format {
        ConfigFormat::Toml => Ok(toml::from_str(text)?),
        ConfigFormat::Json => serde_json::from_str(text).map_err(ConfigError::ParseJson),
    }
}

pub fn render_config(config: &ProjectConfig, format: ConfigFormat) -> Result<String, ConfigError> {
    match format {
        ConfigFormat::Toml => Ok(toml::to_string_pretty(config)?),
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(ConfigError::SerializeJson)
        }
    }
}

/// Reads the document at `path`; a missing or malformed file yields the
/// defaults named after the containing directory.
pub fn load<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> ProjectConfig {
    let fallback = || ProjectConfig::default_for(&default_name(path));
    let text = match fs.read_file(path) {
        Ok(text) => text,
        Err(err) if err.is_not_found() => {
            debug!(path = %path.display(), "no project config, using defaults");
            return fallback();
        }
        Err(err) => {
            warn!(error = %err, "project config unreadable, using defaults");
            return fallback();
        }
    };
    match parse_config(&text, ConfigFormat::from_path(path)) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "project config invalid, using defaults");
            fallback()
        }
    }
}

/// Loads the first config candidate under `project_root`, or the defaults.
pub fn load_project<F: FileSystem + ?Sized>(fs: &F, project_root: &Path) -> ProjectConfig {
    match find_config(fs, project_root) {
        Some(path) => load(fs, &path),
        None => ProjectConfig::default_for(&directory_name(project_root)),
    }
}

pub fn save<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    config: &ProjectConfig,
) -> Result<(), ConfigError> {
    let body = render_config(config, ConfigFormat::from_path(path))?;
    fs.save_file(path, &body)?;
    info!(path = %path.display(), "project config saved");
    Ok(())
}

fn default_name(config_path: &Path) -> String {
    config_path
        .parent()
        .map(directory_name)
        .unwrap_or_else(|| "untitled".to_string())
}

fn directory_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or("untitled")
        .to_string()
}
