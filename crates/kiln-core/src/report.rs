//! Build report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for one build invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Sources found on disk
    pub sources: usize,

    /// Sources that changed themselves (new or newer than their outputs)
    pub directly_modified: usize,

    /// Sources invalidated through a dependency
    pub indirectly_invalidated: usize,

    /// Previously tracked sources no longer on disk
    pub removed: usize,

    /// Sources handed to the compiler
    pub compiled: usize,

    /// Outputs tracked by the graph after the build
    pub outputs: usize,
}

/// Build report (build-report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Schema version
    pub version: ReportVersion,

    /// Project name
    pub project: String,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: BuildSummary,

    /// Failure message; `None` for a successful build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl BuildReport {
    /// Create a successful report
    pub fn success(project: impl Into<String>, summary: BuildSummary) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            project: project.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary,
            failure: None,
        }
    }

    /// Create a failed report
    pub fn failure(
        project: impl Into<String>,
        summary: BuildSummary,
        message: impl Into<String>,
    ) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::success(project, summary)
        }
    }

    /// Check if the build succeeded
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
