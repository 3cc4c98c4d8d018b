//! Configuration management for the prodrec CLI.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.prodrec/config.yaml)
//!
//! The configuration is workspace-centric, with most state stored in `.prodrec/`.
//! Recommender-specific settings (index spec, timings, embedding model) live in
//! the engine crate and are loaded separately.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Supported index backends.
pub const KNOWN_BACKENDS: [&str; 2] = ["memory", "pinecone"];

/// Environment variable holding the index service API key when no
/// `apiKeyEnv` is configured.
pub const DEFAULT_API_KEY_ENV: &str = "PINECONE_API_KEY";

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// CLI behavior across commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .prodrec/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Index backend ("memory" or "pinecone")
    pub backend: String,

    /// Explicit API key for the index service
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Backend settings from config.yaml
    pub backend_config: Option<BackendConfig>,
}

/// Index backend configuration from config.yaml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: Option<String>,

    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,

    /// Control plane base URL (defaults to the public service endpoint)
    #[serde(rename = "controlUrl")]
    pub control_url: Option<String>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    backend: Option<BackendConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            backend: "memory".to_string(), // Runs without credentials
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            backend_config: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `PRODREC_WORKSPACE`: Override workspace path
    /// - `PRODREC_CONFIG`: Path to config file
    /// - `PRODREC_BACKEND`: Index backend
    /// - `PRODREC_API_KEY`: Index service API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use prodrec_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("PRODREC_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("PRODREC_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.prodrec_dir().join("config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(backend) = std::env::var("PRODREC_BACKEND") {
            config.backend = backend;
        }

        config.api_key = std::env::var("PRODREC_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(backend) = config_file.backend {
            if let Some(ref kind) = backend.kind {
                result.backend = kind.clone();
            }
            result.backend_config = Some(backend);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and YAML.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        backend: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(backend) = backend {
            self.backend = backend;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .prodrec directory.
    pub fn prodrec_dir(&self) -> PathBuf {
        self.workspace.join(".prodrec")
    }

    /// Ensure the .prodrec directory exists.
    pub fn ensure_prodrec_dir(&self) -> AppResult<()> {
        let dir = self.prodrec_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .prodrec directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Control plane URL override, if configured.
    pub fn control_url(&self) -> Option<&str> {
        self.backend_config
            .as_ref()
            .and_then(|b| b.control_url.as_deref())
    }

    /// Name of the environment variable the API key is read from.
    pub fn api_key_env(&self) -> &str {
        self.backend_config
            .as_ref()
            .and_then(|b| b.api_key_env.as_deref())
            .unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Resolve the index service API key.
    ///
    /// `PRODREC_API_KEY` wins; otherwise the variable named by `apiKeyEnv`
    /// (default `PINECONE_API_KEY`) is consulted.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        std::env::var(self.api_key_env())
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    /// Validate configuration for the active backend.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_BACKENDS.contains(&self.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown backend: {}. Supported: {}",
                self.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        if self.backend == "pinecone" && self.resolve_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found: set PRODREC_API_KEY or {}",
                self.api_key_env()
            )));
        }

        Ok(())
    }
}
