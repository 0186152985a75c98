//! Kiln Core
//!
//! Shared domain types for the kiln build engine: configuration, compile
//! options, the project context, build errors and the build report.
//! The report layout is versioned - bump the version on breaking changes.

pub mod config;
pub mod error;
pub mod options;
pub mod project;
pub mod report;

pub use config::{CompilerConfig, Config, ConfigError, ProjectConfig};
pub use error::{BuildError, BuildResult};
pub use options::CompileOption;
pub use project::ProjectContext;
pub use report::{BuildReport, BuildSummary, ReportVersion};
