//! Compiler options
//!
//! Options are a closed set. Each variant knows how to render itself as
//! compiler command-line arguments, and anything outside the known set must
//! be spelled out as a raw flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single option passed to the external compiler
///
/// In `kiln.toml` options are written as short strings:
/// `"deprecation"`, `"target:jvm-1.8"`, `"encoding:UTF-8"`, or a raw flag
/// starting with `-` such as `"-Xfatal-warnings"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompileOption {
    /// Emit warning and location for usages of deprecated APIs
    Deprecation,

    /// Enable detailed unchecked (erasure) warnings
    Unchecked,

    /// Print a message for each compiler phase
    Verbose,

    /// Enable optimizations
    Optimise,

    /// Explain type errors in more detail
    ExplainTypes,

    /// Target platform for generated code (e.g. `jvm-1.8`)
    Target(String),

    /// Source file encoding (e.g. `UTF-8`)
    Encoding(String),

    /// A raw flag passed through unchanged
    Raw(String),
}

impl CompileOption {
    /// Render the option as compiler arguments
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Deprecation => vec!["-deprecation".to_string()],
            Self::Unchecked => vec!["-unchecked".to_string()],
            Self::Verbose => vec!["-verbose".to_string()],
            Self::Optimise => vec!["-optimise".to_string()],
            Self::ExplainTypes => vec!["-explaintypes".to_string()],
            Self::Target(target) => vec![format!("-target:{}", target)],
            Self::Encoding(encoding) => vec!["-encoding".to_string(), encoding.clone()],
            Self::Raw(flag) => vec![flag.clone()],
        }
    }

    /// Render a list of options as a flat argument list
    pub fn args_for(options: &[CompileOption]) -> Vec<String> {
        options.iter().flat_map(|o| o.to_args()).collect()
    }
}

impl fmt::Display for CompileOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deprecation => write!(f, "deprecation"),
            Self::Unchecked => write!(f, "unchecked"),
            Self::Verbose => write!(f, "verbose"),
            Self::Optimise => write!(f, "optimise"),
            Self::ExplainTypes => write!(f, "explaintypes"),
            Self::Target(target) => write!(f, "target:{}", target),
            Self::Encoding(encoding) => write!(f, "encoding:{}", encoding),
            Self::Raw(flag) => write!(f, "{}", flag),
        }
    }
}

impl FromStr for CompileOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Ok(Self::Raw(s.to_string()));
        }

        match s.split_once(':') {
            Some(("target", value)) if !value.is_empty() => Ok(Self::Target(value.to_string())),
            Some(("encoding", value)) if !value.is_empty() => Ok(Self::Encoding(value.to_string())),
            Some((name, _)) => Err(format!("Unknown or incomplete compile option '{}'", name)),
            None => match s {
                "deprecation" => Ok(Self::Deprecation),
                "unchecked" => Ok(Self::Unchecked),
                "verbose" => Ok(Self::Verbose),
                "optimise" | "optimize" => Ok(Self::Optimise),
                "explaintypes" => Ok(Self::ExplainTypes),
                other => Err(format!(
                    "Unknown compile option '{}' (prefix raw flags with '-')",
                    other
                )),
            },
        }
    }
}

impl TryFrom<String> for CompileOption {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CompileOption> for String {
    fn from(option: CompileOption) -> Self {
        option.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_options() {
        assert_eq!("deprecation".parse::<CompileOption>().unwrap(), CompileOption::Deprecation);
        assert_eq!("optimize".parse::<CompileOption>().unwrap(), CompileOption::Optimise);
        assert_eq!(
            "target:jvm-1.8".parse::<CompileOption>().unwrap(),
            CompileOption::Target("jvm-1.8".to_string())
        );
        assert_eq!(
            "-Xfatal-warnings".parse::<CompileOption>().unwrap(),
            CompileOption::Raw("-Xfatal-warnings".to_string())
        );
    }

    #[test]
    fn reject_unknown_options() {
        assert!("fast".parse::<CompileOption>().is_err());
        assert!("target:".parse::<CompileOption>().is_err());
        assert!("level:3".parse::<CompileOption>().is_err());
    }

    #[test]
    fn render_arguments() {
        let options = vec![
            CompileOption::Deprecation,
            CompileOption::Encoding("UTF-8".to_string()),
            CompileOption::Target("jvm-1.8".to_string()),
        ];

        assert_eq!(
            CompileOption::args_for(&options),
            vec!["-deprecation", "-encoding", "UTF-8", "-target:jvm-1.8"]
        );
    }

    #[test]
    fn display_parses_back() {
        let option = CompileOption::Encoding("UTF-8".to_string());
        assert_eq!(option.to_string().parse::<CompileOption>().unwrap(), option);
    }
}
