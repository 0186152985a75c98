//! Incremental build engine
//!
//! Decides what has to be recompiled after an edit and drives the external
//! compiler over exactly that set.
//!
//! ## Architecture
//!
//! - **Detection**: a source is modified if it has no record, or if any of
//!   its recorded outputs is missing or older than the source
//! - **Propagation**: dirtiness flows from a source to everything that
//!   depends on it, transitively, until a fixpoint
//! - **Driver**: scan, propagate, compile, then merge and save on success or
//!   reload the last snapshot on failure
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiln_incremental::{BuildDriver, CommandCompiler, PatternFinder};
//!
//! let ctx = ProjectContext::from_config(&config);
//! let mut driver = BuildDriver::open(&ctx)?;
//! let finder = PatternFinder::from_context(&ctx);
//! let mut compiler = CommandCompiler::from_config(&config.compiler);
//!
//! let report = driver.build(&finder, &mut compiler);
//! ```

pub mod detect;
pub mod propagate;
pub mod compiler;
pub mod finder;
pub mod driver;

pub use detect::{Change, ChangeDetector};
pub use propagate::{Invalidation, Propagator};
pub use compiler::{CommandCompiler, CompileRequest, Compiler, SourceFacts};
pub use finder::{PatternFinder, SourceFinder};
pub use driver::{BuildDriver, BuildPhase};
