//! Build error taxonomy
//!
//! Every failure inside a build step maps onto one of these variants. The
//! driver turns them into a single failure message; they never cross the
//! driver boundary as a panic.

/// Result alias used across the build engine
pub type BuildResult<T> = Result<T, BuildError>;

/// Build error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Precondition violation, e.g. probing a source that is not on disk
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external compiler reported an error
    #[error("Compilation failed: {0}")]
    CompilationFailure(String),

    /// The graph snapshot could not be read or written
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl BuildError {
    /// Stable short name for the error category, used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::CompilationFailure(_) => "compilation_failure",
            Self::PersistenceFailure(_) => "persistence_failure",
        }
    }
}
