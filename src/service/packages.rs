// src/service/packages.rs

//! Package installer: `pip install` / `pip list` through the process runner.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ExecutionSection, PackagesSection};
use crate::exec::{CHILD_ENV, ExecutionResult, ProcessBackend, ProcessSpec};
use crate::fs::FileSystem;
use crate::types::Language;

/// A single pip requirement: name, optional extras, optional version clauses.
static REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9._-]*(\[[A-Za-z0-9._, -]+\])?(\s*(===|==|>=|<=|~=|!=|>|<)\s*[A-Za-z0-9.*+!_-]+)?(\s*,\s*(===|==|>=|<=|~=|!=|>|<)\s*[A-Za-z0-9.*+!_-]+)*$",
    )
    .expect("requirement pattern is valid")
});

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInstallRequest {
    #[serde(default)]
    pub packages: Vec<String>,
    /// Install from the configured requirements file instead of `packages`.
    #[serde(default)]
    pub use_requirements: bool,
}

/// Wire shape `{success, output, error, installedPackages}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResult {
    pub success: bool,
    pub output: Vec<String>,
    pub error: Option<String>,
    pub installed_packages: Vec<String>,
}

impl PackageResult {
    fn from_execution(result: ExecutionResult, installed_packages: Vec<String>) -> Self {
        Self {
            success: result.success,
            output: result.output,
            error: result.error,
            installed_packages,
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self::from_execution(ExecutionResult::rejected(error), Vec::new())
    }
}

pub struct PackageInstaller {
    python: String,
    install_timeout: Duration,
    list_timeout: Duration,
    requirements_file: std::path::PathBuf,
    fs: Arc<dyn FileSystem>,
    backend: Arc<dyn ProcessBackend>,
}

impl PackageInstaller {
    pub fn new(
        execution: &ExecutionSection,
        packages: &PackagesSection,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn ProcessBackend>,
    ) -> Self {
        Self {
            python: execution.interpreter_for(Language::Python),
            install_timeout: Duration::from_millis(packages.timeout_ms),
            list_timeout: Duration::from_millis(execution.default_timeout_ms),
            requirements_file: packages.requirements_file.clone(),
            fs,
            backend,
        }
    }

    /// Install the requested packages (or the requirements file) in one pip
    /// invocation.
    ///
    /// Short-circuits without spawning when nothing was requested, a
    /// specifier looks malformed, or the requirements file is missing.
    pub async fn install(&self, request: PackageInstallRequest) -> PackageResult {
        let requested: Vec<String> = request
            .packages
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let spec = if request.use_requirements {
            if !self.fs.is_file(&self.requirements_file) {
                return PackageResult::rejected(format!(
                    "Requirements file not found: {}",
                    self.requirements_file.display()
                ));
            }
            self.pip(self.install_timeout)
                .args(["install", "-r"])
                .arg(self.requirements_file.to_string_lossy())
        } else {
            if requested.is_empty() {
                return PackageResult::rejected("No packages specified");
            }
            if let Some(bad) = requested.iter().find(|p| !REQUIREMENT.is_match(p)) {
                debug!(package = %bad, "rejecting malformed package specifier");
                return PackageResult::rejected(format!("Invalid package specifier: {bad}"));
            }
            self.pip(self.install_timeout)
                .arg("install")
                .args(requested.iter().cloned())
        };

        info!(command = %spec, "installing packages");
        let result = self.backend.run(spec).await;

        let installed = if result.success {
            let reported = parse_installed(&result.output);
            if reported.is_empty() { requested } else { reported }
        } else {
            Vec::new()
        };

        PackageResult::from_execution(result, installed)
    }

    /// Raw `pip list` output. `installed_packages` is always empty: the
    /// listing is informational and structuring it is left to the caller.
    pub async fn list(&self) -> PackageResult {
        let spec = self.pip(self.list_timeout).arg("list");
        let result = self.backend.run(spec).await;
        PackageResult::from_execution(result, Vec::new())
    }

    fn pip(&self, timeout: Duration) -> ProcessSpec {
        ProcessSpec::new(self.python.clone(), timeout)
            .args(["-m", "pip"])
            .envs(&CHILD_ENV)
    }
}

/// Package names from pip's `Successfully installed a-1.0 b_c-2.3` line.
fn parse_installed(output: &[String]) -> Vec<String> {
    output
        .iter()
        .filter_map(|line| line.trim().strip_prefix("Successfully installed "))
        .flat_map(str::split_whitespace)
        .map(|token| match token.rsplit_once('-') {
            Some((name, version)) if version.starts_with(|c: char| c.is_ascii_digit()) => {
                name.to_string()
            }
            _ => token.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_names_without_versions() {
        let output = vec![
            "Collecting requests".to_string(),
            "Successfully installed certifi-2024.2.2 charset-normalizer-3.3.2 requests-2.31.0"
                .to_string(),
        ];
        assert_eq!(
            parse_installed(&output),
            vec!["certifi", "charset-normalizer", "requests"]
        );
    }

    #[test]
    fn requirement_pattern_accepts_common_specifiers() {
        for ok in ["numpy", "requests==2.31.0", "pandas>=2,<3", "uvicorn[standard]", "a.b_c-d"] {
            assert!(REQUIREMENT.is_match(ok), "{ok} should be accepted");
        }
        for bad in ["--index-url", "-e .", "numpy; rm -rf /", "pkg name"] {
            assert!(!REQUIREMENT.is_match(bad), "{bad} should be rejected");
        }
    }
}
