//! External compiler collaborator
//!
//! The engine never compiles anything itself. It hands the dirty set to a
//! [`Compiler`] and, after a successful compile, asks the same compiler for
//! the outputs and dependencies of every source it just compiled.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use kiln_core::{CompileOption, CompilerConfig};
use kiln_graph::Source;

/// One compiler invocation
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    /// Sources to compile
    pub sources: &'a BTreeSet<Source>,

    /// Full classpath, platform separated
    pub classpath: String,

    /// Directory receiving compiled artifacts
    pub output_dir: &'a Path,

    /// Compile options
    pub options: &'a [CompileOption],
}

/// Outputs and dependencies of one compiled source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFacts {
    #[serde(default)]
    pub outputs: BTreeSet<PathBuf>,

    #[serde(default)]
    pub dependencies: BTreeSet<Source>,
}

/// A black-box compiler
pub trait Compiler {
    /// Compile every source in the request, or fail with a message
    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<(), String>;

    /// Facts for sources compiled by the last successful `compile`
    ///
    /// Sources missing from the returned map are recorded without outputs.
    fn facts(&mut self, sources: &BTreeSet<Source>) -> Result<BTreeMap<Source, SourceFacts>, String>;
}

/// Runs a compiler executable and reads the dependency facts it writes
///
/// The command line is
/// `<program> <args...> <options...> -classpath <cp> -d <output> <sources...>`.
/// The program must write `<output>/<analysis_file>` containing a JSON object
/// keyed by source path with `outputs` and `dependencies` arrays.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    analysis_file: String,
    last_output_dir: Option<PathBuf>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>, analysis_file: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            analysis_file: analysis_file.into(),
            last_output_dir: None,
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.analysis_file.clone())
    }

    /// Arguments passed to the program for a request
    pub fn command_args(&self, request: &CompileRequest<'_>) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(CompileOption::args_for(request.options));
        args.push("-classpath".to_string());
        args.push(request.classpath.clone());
        args.push("-d".to_string());
        args.push(request.output_dir.display().to_string());
        args.extend(request.sources.iter().map(|s| s.to_string()));
        args
    }

    fn analysis_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.analysis_file)
    }
}

impl Compiler for CommandCompiler {
    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<(), String> {
        fs::create_dir_all(request.output_dir).map_err(|e| {
            format!("Failed to create output directory {}: {}", request.output_dir.display(), e)
        })?;

        // A stale analysis file must never be mistaken for this run's facts
        let analysis = self.analysis_path(request.output_dir);
        if analysis.exists() {
            fs::remove_file(&analysis)
                .map_err(|e| format!("Failed to remove {}: {}", analysis.display(), e))?;
        }
        self.last_output_dir = None;

        let args = self.command_args(request);
        tracing::debug!(program = %self.program, ?args, "running compiler");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| format!("Failed to run compiler '{}': {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if !stderr.trim().is_empty() { stderr } else { stdout };
            return Err(if detail.trim().is_empty() {
                format!("Compiler '{}' exited with {}", self.program, output.status)
            } else {
                detail.trim_end().to_string()
            });
        }

        self.last_output_dir = Some(request.output_dir.to_path_buf());
        Ok(())
    }

    fn facts(&mut self, sources: &BTreeSet<Source>) -> Result<BTreeMap<Source, SourceFacts>, String> {
        let output_dir = self
            .last_output_dir
            .as_ref()
            .ok_or_else(|| "No successful compilation to report facts for".to_string())?;
        let path = self.analysis_path(output_dir);

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Compiler did not write {}: {}", path.display(), e))?;
        let mut facts: BTreeMap<Source, SourceFacts> = serde_json::from_str(&contents)
            .map_err(|e| format!("Invalid analysis file {}: {}", path.display(), e))?;

        facts.retain(|source, _| sources.contains(source));
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(sources: &'a BTreeSet<Source>, output_dir: &'a Path, options: &'a [CompileOption]) -> CompileRequest<'a> {
        CompileRequest {
            sources,
            classpath: "out:lib/a.jar".to_string(),
            output_dir,
            options,
        }
    }

    #[test]
    fn command_line_layout() {
        let compiler = CommandCompiler::new("scalac", vec!["-nowarn".to_string()], "kiln-analysis.json");
        let sources = BTreeSet::from([Source::from("src/B.scala"), Source::from("src/A.scala")]);
        let options = [CompileOption::Deprecation];

        let args = compiler.command_args(&request(&sources, Path::new("out"), &options));
        assert_eq!(
            args,
            vec![
                "-nowarn", "-deprecation", "-classpath", "out:lib/a.jar", "-d", "out",
                "src/A.scala", "src/B.scala",
            ]
        );
    }

    #[test]
    fn missing_program_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut compiler = CommandCompiler::new("kiln-no-such-compiler", vec![], "a.json");
        let sources = BTreeSet::from([Source::from("A.scala")]);

        let result = compiler.compile(&request(&sources, dir.path(), &[]));
        assert!(result.unwrap_err().contains("kiln-no-such-compiler"));
    }

    #[test]
    fn facts_before_compile_is_error() {
        let mut compiler = CommandCompiler::new("scalac", vec![], "a.json");
        assert!(compiler.facts(&BTreeSet::new()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = "echo 'A.scala:1: error: not found' >&2; exit 1";
        let mut compiler = CommandCompiler::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            "a.json",
        );
        let sources = BTreeSet::from([Source::from("A.scala")]);

        let result = compiler.compile(&request(&sources, dir.path(), &[]));
        assert_eq!(result.unwrap_err(), "A.scala:1: error: not found");
    }

    #[cfg(unix)]
    #[test]
    fn reads_analysis_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        // $4 is the output directory: -classpath <cp> -d <out>
        let script = r#"printf '{"A.scala":{"outputs":["A.class"]},"B.scala":{"outputs":["B.class"],"dependencies":["A.scala"]},"X.scala":{}}' > "$4/kiln-analysis.json""#;
        let mut compiler = CommandCompiler::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            "kiln-analysis.json",
        );
        let sources = BTreeSet::from([Source::from("A.scala"), Source::from("B.scala")]);

        compiler.compile(&request(&sources, &out, &[])).unwrap();
        let facts = compiler.facts(&sources).unwrap();

        assert_eq!(facts.len(), 2);
        assert_eq!(
            facts[&Source::from("B.scala")].dependencies,
            BTreeSet::from([Source::from("A.scala")])
        );
    }
}
