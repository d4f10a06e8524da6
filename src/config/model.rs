// src/config/model.rs

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::Language;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// listen = "127.0.0.1:3001"
///
/// [execution]
/// default_timeout_ms = 30000
/// python = "python3.12"
///
/// [packages]
/// timeout_ms = 300000
/// requirements_file = "requirements.txt"
///
/// [terminal]
/// default_timeout_ms = 30000
///
/// [robot]
/// move_power = 50
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub execution: ExecutionSection,

    #[serde(default)]
    pub packages: PackagesSection,

    #[serde(default)]
    pub terminal: TerminalSection,

    #[serde(default)]
    pub robot: RobotSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on timeouts being non-zero and the listen address being
/// well-formed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub execution: ExecutionSection,
    pub packages: PackagesSection,
    pub terminal: TerminalSection,
    pub robot: RobotSection,
    listen: SocketAddr,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, listen: SocketAddr) -> Self {
        Self {
            server: raw.server,
            execution: raw.execution,
            packages: raw.packages,
            terminal: raw.terminal,
            robot: raw.robot,
            listen,
        }
    }

    /// Parsed `[server].listen` address.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen
    }

    /// Override the listen address (e.g. from `--listen`).
    pub fn with_listen(mut self, addr: SocketAddr) -> Self {
        self.server.listen = addr.to_string();
        self.listen = addr;
        self
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        let listen = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));
        Self::new_unchecked(raw, listen)
    }
}

const DEFAULT_PORT: u16 = 3001;

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Socket address the HTTP API binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// `[execution]` section: submitted source code runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    /// Timeout applied when a request does not carry its own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Directory for temporary source files. Defaults to the OS temp dir.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Override for the Python interpreter executable.
    #[serde(default)]
    pub python: Option<String>,

    /// Override for the JavaScript interpreter executable.
    #[serde(default)]
    pub node: Option<String>,
}

impl ExecutionSection {
    /// Interpreter executable for `language`, honouring overrides.
    pub fn interpreter_for(&self, language: Language) -> String {
        let configured = match language {
            Language::Python => self.python.as_deref(),
            Language::JavaScript => self.node.as_deref(),
        };
        configured
            .unwrap_or_else(|| language.default_interpreter())
            .to_string()
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            temp_dir: None,
            python: None,
            node: None,
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// `[packages]` section: pip install / list.
#[derive(Debug, Clone, Deserialize)]
pub struct PackagesSection {
    /// Installs are network-bound, so this is minutes rather than seconds.
    #[serde(default = "default_install_timeout_ms")]
    pub timeout_ms: u64,

    /// Manifest used when a request sets `useRequirements`.
    #[serde(default = "default_requirements_file")]
    pub requirements_file: PathBuf,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_install_timeout_ms(),
            requirements_file: default_requirements_file(),
        }
    }
}

fn default_install_timeout_ms() -> u64 {
    300_000
}

fn default_requirements_file() -> PathBuf {
    PathBuf::from("requirements.txt")
}

/// `[terminal]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalSection {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Shell used for delegated commands. Defaults to `sh` (`cmd` on Windows).
    #[serde(default)]
    pub shell: Option<String>,

    /// Directory used when a request does not carry `workingDirectory`.
    /// Defaults to the server's current directory.
    #[serde(default)]
    pub default_dir: Option<PathBuf>,
}

impl Default for TerminalSection {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            shell: None,
            default_dir: None,
        }
    }
}

/// `[robot]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RobotSection {
    /// Motor power (1..=100) applied by `move` commands.
    #[serde(default = "default_move_power")]
    pub move_power: u8,
}

impl Default for RobotSection {
    fn default() -> Self {
        Self {
            move_power: default_move_power(),
        }
    }
}

fn default_move_power() -> u8 {
    50
}
