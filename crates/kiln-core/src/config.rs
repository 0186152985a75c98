//! Configuration schema (kiln.toml)

use globset::Glob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::options::CompileOption;

/// Project layout configuration (`[project]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used in logs and reports
    #[serde(default = "default_name")]
    pub name: String,

    /// Directory scanned for sources, relative to the project root
    #[serde(default = "default_sources")]
    pub sources: PathBuf,

    /// File name globs a source must match
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// File name globs that exclude an otherwise matching source
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Output directory for compiled artifacts
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Location of the persisted dependency graph snapshot
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,

    /// Classpath entries handed to the compiler
    #[serde(default)]
    pub classpath: Vec<PathBuf>,
}

fn default_name() -> String {
    "project".to_string()
}

fn default_sources() -> PathBuf {
    PathBuf::from("src")
}

fn default_include() -> Vec<String> {
    vec!["*.scala".to_string(), "*.java".to_string()]
}

fn default_output() -> PathBuf {
    PathBuf::from("target/classes")
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("target/kiln-graph.json")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            sources: default_sources(),
            include: default_include(),
            exclude: Vec::new(),
            output: default_output(),
            snapshot: default_snapshot(),
            classpath: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Check if a file name matches any pattern in the list
    fn matches_pattern(file_name: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| glob_match(pattern, file_name))
    }

    /// Reject include or exclude patterns that are not valid globs
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in self.include.iter().chain(&self.exclude) {
            Glob::new(pattern).map_err(|e| {
                ConfigError::ParseError(format!("Invalid pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Check if a file name is selected as a source
    pub fn is_source(&self, file_name: &str) -> bool {
        Self::matches_pattern(file_name, &self.include)
            && !Self::matches_pattern(file_name, &self.exclude)
    }
}

/// External compiler configuration (`[compiler]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Compiler executable
    #[serde(default = "default_program")]
    pub program: String,

    /// Extra arguments placed before everything else
    #[serde(default)]
    pub args: Vec<String>,

    /// Compile options
    #[serde(default)]
    pub options: Vec<CompileOption>,

    /// Dependency facts file the compiler writes into the output directory
    #[serde(default = "default_analysis_file")]
    pub analysis_file: String,
}

fn default_program() -> String {
    "scalac".to_string()
}

fn default_analysis_file() -> String {
    "kiln-analysis.json".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            options: Vec::new(),
            analysis_file: default_analysis_file(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Project layout
    #[serde(default)]
    pub project: ProjectConfig,

    /// Compiler invocation
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }
}

/// Match a file name against a glob; an invalid glob only matches itself
fn glob_match(pattern: &str, text: &str) -> bool {
    match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(text),
        Err(_) => pattern == text,
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
