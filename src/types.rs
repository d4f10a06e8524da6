use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source language accepted by the code execution service.
///
/// Each language maps to one interpreter executable and one file extension
/// for the temporary source file handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
}

impl Language {
    /// File extension (without the dot) used for temporary source files.
    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
        }
    }

    /// Platform default interpreter executable.
    ///
    /// Windows installs Python as `python`; everywhere else the canonical
    /// launcher is `python3`.
    pub fn default_interpreter(self) -> &'static str {
        match self {
            Language::Python if cfg!(windows) => "python",
            Language::Python => "python3",
            Language::JavaScript => "node",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => f.write_str("python"),
            Language::JavaScript => f.write_str("javascript"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            other => Err(format!(
                "Unsupported language: {other} (expected \"python\" or \"javascript\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert_eq!(" js ".parse::<Language>(), Ok(Language::JavaScript));
        assert_eq!("node".parse::<Language>(), Ok(Language::JavaScript));
    }

    #[test]
    fn rejects_unknown_language() {
        let err = "ruby".parse::<Language>().unwrap_err();
        assert!(err.contains("ruby"));
    }

    #[test]
    fn extensions_match_language() {
        assert_eq!(Language::Python.extension(), "py");
        assert_eq!(Language::JavaScript.extension(), "js");
    }
}
