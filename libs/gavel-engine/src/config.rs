// Judge configuration: limits, job-directory root and per-language toolchains
use anyhow::{Context, Result, bail};
use gavel_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/judge.json";

/// Binary and flags used to build or interpret one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Compiler for compiled languages, interpreter for interpreted ones
    pub command: String,
    /// Separate runtime launcher (the JVM for java)
    #[serde(default)]
    pub runtime: Option<String>,
    /// Extra flags passed to `command`
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolchainConfig {
    fn new(command: &str, runtime: Option<&str>, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            runtime: runtime.map(str::to_string),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Root under which every job gets its own uniquely named directory
    pub workspace_root: PathBuf,
    pub default_time_limit_ms: u64,
    pub default_memory_limit_mb: u64,
    pub compile_timeout_ms: u64,
    pub max_output_bytes: usize,
    pub toolchains: HashMap<Language, ToolchainConfig>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        let toolchains = HashMap::from([
            (Language::C, ToolchainConfig::new("gcc", None, &["-O2", "-std=c11", "-lm"])),
            (Language::Cpp, ToolchainConfig::new("g++", None, &["-O2", "-std=c++17"])),
            (Language::Java, ToolchainConfig::new("javac", Some("java"), &["-encoding", "UTF-8"])),
            (Language::Python, ToolchainConfig::new("python3", None, &[])),
        ]);

        Self {
            workspace_root: std::env::temp_dir().join("gavel-jobs"),
            default_time_limit_ms: 2000,
            default_memory_limit_mb: 256,
            compile_timeout_ms: 10_000,
            max_output_bytes: 16 * 1024 * 1024,
            toolchains,
        }
    }
}

impl JudgeConfig {
    /// Load judge configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Judge config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let mut config: JudgeConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        // Languages missing from the file keep their built-in toolchain
        for (language, toolchain) in JudgeConfig::default().toolchains {
            config.toolchains.entry(language).or_insert(toolchain);
        }

        config.validate()?;
        Ok(config.with_env_overrides())
    }

    /// Load from `GAVEL_CONFIG` or config/judge.json, using built-in defaults
    /// when no file is present
    pub fn load_default() -> Result<Self> {
        let path = std::env::var("GAVEL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if path.exists() {
            Self::load(&path)
        } else {
            tracing::info!(path = %path.display(), "No judge config file, using defaults");
            Ok(Self::default().with_env_overrides())
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("GAVEL_WORKSPACE_ROOT") {
            if !root.trim().is_empty() {
                self.workspace_root = PathBuf::from(root);
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.default_time_limit_ms == 0 {
            bail!("default_time_limit_ms must be positive");
        }
        if self.default_memory_limit_mb == 0 {
            bail!("default_memory_limit_mb must be positive");
        }
        if self.compile_timeout_ms == 0 {
            bail!("compile_timeout_ms must be positive");
        }
        for (language, toolchain) in &self.toolchains {
            if toolchain.command.trim().is_empty() {
                bail!("Toolchain command for {} is empty", language);
            }
        }
        Ok(())
    }

    /// Get the toolchain for a specific language
    pub fn toolchain(&self, language: Language) -> Result<&ToolchainConfig> {
        self.toolchains
            .get(&language)
            .ok_or_else(|| anyhow::anyhow!("No toolchain configured for language: {}", language))
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.toolchains.keys().map(|l| l.to_string()).collect();
        names.sort();
        names
    }
}
