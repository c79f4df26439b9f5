//! TOML-based configuration for dmfo.
//!
//! Every section is optional; a missing file means built-in defaults. The
//! file is looked up in this order:
//!
//! 1. the path given with `--config`;
//! 2. the `DMFO_CONFIG` environment variable;
//! 3. `<config_dir>/dmfo/config.toml` (e.g. `~/.config/dmfo/config.toml`).
//!
//! Only the last location may be absent without an error.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::ErrorCodes;
use crate::errors::ConfigError;
use crate::models::HostApp;
use crate::staging::AbortPolicy;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DMFO_CONFIG";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmfoConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub lfs: LfsConfig,

    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub drivers: DriversConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Severity threshold for a log sink.
///
/// Accepts the classic level names as well (`CRITICAL`, `FATAL`, `WARNING`,
/// `NOTSET`), case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OFF" => Ok(Self::Off),
            "CRITICAL" | "FATAL" | "ERROR" => Ok(Self::Error),
            "WARNING" | "WARN" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            "DEBUG" => Ok(Self::Debug),
            "TRACE" | "NOTSET" => Ok(Self::Trace),
            _ => Err(ConfigError::InvalidValue {
                field: "log level".into(),
                detail: format!("unknown level '{s}'"),
            }),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, ConfigError> {
        s.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_directive().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Default thresholds for the console and the per-invocation log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_console_level")]
    pub console_level: LogLevel,

    #[serde(default = "default_file_level")]
    pub file_level: LogLevel,
}

fn default_console_level() -> LogLevel {
    LogLevel::Info
}
fn default_file_level() -> LogLevel {
    LogLevel::Debug
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_level: default_console_level(),
            file_level: default_file_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// LFS
// ---------------------------------------------------------------------------

/// How to reach the Git LFS filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfsConfig {
    /// Program and leading arguments; `lfs <subcommand>` is appended.
    #[serde(default = "default_git_command")]
    pub command: Vec<String>,
}

fn default_git_command() -> Vec<String> {
    vec!["git".into()]
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            command: default_git_command(),
        }
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Fate of auxiliary files when staging fails halfway.
    #[serde(default)]
    pub on_abort: AbortPolicy,
}

// ---------------------------------------------------------------------------
// Automation
// ---------------------------------------------------------------------------

/// Automation bridge and error-code heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Bridge program and its arguments. The bridge speaks the line-JSON
    /// protocol described in [`crate::backend::bridge`]; none ships with dmfo.
    #[serde(default = "default_bridge")]
    pub bridge: Vec<String>,

    /// Error codes meaning "the document was closed by the user".
    #[serde(default = "default_document_closed_codes")]
    pub document_closed_codes: Vec<i32>,

    /// Error codes meaning "the application itself went away".
    #[serde(default = "default_session_closed_codes")]
    pub session_closed_codes: Vec<i32>,
}

fn default_bridge() -> Vec<String> {
    vec!["dmfo-bridge".into()]
}
fn default_document_closed_codes() -> Vec<i32> {
    ErrorCodes::default().document_closed
}
fn default_session_closed_codes() -> Vec<i32> {
    ErrorCodes::default().session_closed
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            bridge: default_bridge(),
            document_closed_codes: default_document_closed_codes(),
            session_closed_codes: default_session_closed_codes(),
        }
    }
}

impl AutomationConfig {
    pub fn error_codes(&self) -> ErrorCodes {
        ErrorCodes {
            document_closed: self.document_closed_codes.clone(),
            session_closed: self.session_closed_codes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Which extensions each backend handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriversConfig {
    #[serde(default = "default_word_extensions")]
    pub word_extensions: Vec<String>,

    #[serde(default = "default_presentation_extensions")]
    pub presentation_extensions: Vec<String>,
}

fn default_word_extensions() -> Vec<String> {
    vec![".doc".into(), ".docx".into()]
}
fn default_presentation_extensions() -> Vec<String> {
    vec![".ppt".into(), ".pptx".into()]
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            word_extensions: default_word_extensions(),
            presentation_extensions: default_presentation_extensions(),
        }
    }
}

impl DriversConfig {
    /// The application owning `extension`, if any.
    ///
    /// Extensions compare exactly, like the suffix check in staging, so
    /// `.DOCX` is not a Word document.
    pub fn backend_for(&self, extension: &str) -> Option<HostApp> {
        let listed = |list: &[String]| list.iter().any(|e| e == extension);
        if extension.is_empty() {
            return None;
        }
        if listed(&self.word_extensions) {
            return Some(HostApp::Word);
        }
        if listed(&self.presentation_extensions) {
            return Some(HostApp::PowerPoint);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Install
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Command Git should run for the drivers.
    #[serde(default = "default_executable")]
    pub executable: String,
}

fn default_executable() -> String {
    "dmfo".into()
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl DmfoConfig {
    /// Load a [`DmfoConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: DmfoConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Find, load and validate the configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = dirs::config_dir().map(|d| d.join("dmfo").join("config.toml"));
        Self::load_from(explicit, std::env::var_os(CONFIG_ENV), default_path)
    }

    fn load_from(
        explicit: Option<&Path>,
        env: Option<OsString>,
        default_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from));

        let config = match (named, default_path) {
            (Some(path), _) => Self::load_from_file(path)?,
            (None, Some(path)) if path.exists() => Self::load_from_file(path)?,
            _ => {
                debug!("no configuration file, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate that command lines and extension lists are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lfs.command.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lfs.command".into(),
                detail: "command must not be empty".into(),
            });
        }
        if self.automation.bridge.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "automation.bridge".into(),
                detail: "command must not be empty".into(),
            });
        }
        if self.install.executable.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "install.executable".into(),
                detail: "executable must not be empty".into(),
            });
        }
        let lists = [
            ("drivers.word_extensions", &self.drivers.word_extensions),
            (
                "drivers.presentation_extensions",
                &self.drivers.presentation_extensions,
            ),
        ];
        for (field, list) in lists {
            if let Some(bad) = list.iter().find(|e| !e.starts_with('.') || e.len() < 2) {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: format!("'{bad}' must start with a dot"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[logging]
console_level = "WARNING"
file_level = "notset"

[lfs]
command = ["/usr/bin/git", "-c", "core.quotepath=off"]

[staging]
on_abort = "leave"

[automation]
bridge = ["powershell", "-File", "C:\\tools\\dmfo-bridge.ps1"]
document_closed_codes = [-1]

[drivers]
word_extensions = [".docx", ".docm"]
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: DmfoConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.logging.console_level, LogLevel::Warn);
        assert_eq!(config.logging.file_level, LogLevel::Trace);
        assert_eq!(config.lfs.command[0], "/usr/bin/git");
        assert_eq!(config.staging.on_abort, AbortPolicy::Leave);
        assert_eq!(config.automation.bridge.len(), 3);
        assert_eq!(config.automation.document_closed_codes, vec![-1]);
        assert_eq!(
            config.automation.session_closed_codes,
            vec![-2147023174, -2147023179]
        );
        assert_eq!(config.drivers.presentation_extensions, vec![".ppt", ".pptx"]);
        assert_eq!(config.install.executable, "dmfo");
    }

    #[test]
    fn test_defaults() {
        let config: DmfoConfig = toml::from_str("").unwrap();
        assert_eq!(config, DmfoConfig::default());
        assert_eq!(config.logging.console_level, LogLevel::Info);
        assert_eq!(config.logging.file_level, LogLevel::Debug);
        assert_eq!(config.lfs.command, vec!["git"]);
        assert_eq!(config.staging.on_abort, AbortPolicy::Rollback);
        assert_eq!(config.automation.bridge, vec!["dmfo-bridge"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = DmfoConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.drivers.word_extensions, vec![".docx", ".docm"]);
    }

    #[test]
    fn test_file_not_found() {
        let result = DmfoConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_lookup_order() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[install]\nexecutable = \"explicit\"\n").unwrap();
        let from_env = dir.path().join("env.toml");
        std::fs::write(&from_env, "[install]\nexecutable = \"env\"\n").unwrap();
        let fallback = dir.path().join("default.toml");
        std::fs::write(&fallback, "[install]\nexecutable = \"default\"\n").unwrap();

        let load = |explicit: Option<&Path>, env: Option<&Path>| {
            DmfoConfig::load_from(
                explicit,
                env.map(|p| p.as_os_str().to_owned()),
                Some(fallback.clone()),
            )
            .unwrap()
            .install
            .executable
        };
        assert_eq!(load(Some(&explicit), Some(&from_env)), "explicit");
        assert_eq!(load(None, Some(&from_env)), "env");
        assert_eq!(load(None, None), "default");
    }

    #[test]
    fn test_missing_default_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            DmfoConfig::load_from(None, None, Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, DmfoConfig::default());
    }

    #[test]
    fn test_missing_named_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DmfoConfig::load_from(
            None,
            Some(dir.path().join("absent.toml").into_os_string()),
            None,
        );
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_empty_commands() {
        let mut config = DmfoConfig::default();
        config.lfs.command.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "lfs.command"
        ));

        let mut config = DmfoConfig::default();
        config.automation.bridge.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "automation.bridge"
        ));
    }

    #[test]
    fn test_validate_rejects_extension_without_dot() {
        let mut config = DmfoConfig::default();
        config.drivers.presentation_extensions.push("pptm".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. })
                if field == "drivers.presentation_extensions"
        ));
    }

    #[test]
    fn test_log_level_names() {
        for (name, level) in [
            ("CRITICAL", LogLevel::Error),
            ("fatal", LogLevel::Error),
            ("Warning", LogLevel::Warn),
            ("warn", LogLevel::Warn),
            ("INFO", LogLevel::Info),
            ("debug", LogLevel::Debug),
            ("NOTSET", LogLevel::Trace),
            ("off", LogLevel::Off),
        ] {
            assert_eq!(name.parse::<LogLevel>().unwrap(), level, "{name}");
        }
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_backend_for_extension() {
        let drivers = DriversConfig::default();
        assert_eq!(drivers.backend_for(".docx"), Some(HostApp::Word));
        assert_eq!(drivers.backend_for(".doc"), Some(HostApp::Word));
        assert_eq!(drivers.backend_for(".pptx"), Some(HostApp::PowerPoint));
        assert_eq!(drivers.backend_for(".xlsx"), None);
        assert_eq!(drivers.backend_for(""), None);
    }

    #[test]
    fn test_backend_for_is_case_sensitive() {
        let drivers = DriversConfig::default();
        assert_eq!(drivers.backend_for(".DOCX"), None);
        assert_eq!(drivers.backend_for(".Ppt"), None);
    }
}
