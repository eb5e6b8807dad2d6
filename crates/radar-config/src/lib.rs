//! Layered TOML configuration for radar.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use radar_mcp::McpServerConfig;
use radar_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default chat model.
pub const DEFAULT_MODEL: &str = "doubao-seed-1-6-251015";

/// The default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// The default cap on model rounds per conversation.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Browser tools exposed to the model unless configured otherwise.
pub const DEFAULT_ALLOWED_TOOLS: [&str; 3] = ["navigate_page", "evaluate_script", "take_snapshot"];

/// An `allowed_tools` entry that exposes every tool the server offers.
pub const ALL_TOOLS: &str = "*";

/// Resolved configuration for a radar run.
#[derive(Debug, Clone)]
pub struct RadarConfig {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub mcp: McpServerConfig,
    pub output: OutputConfig,
    /// The settings file that was read, if any.
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_rounds: usize,
    pub allowed_tools: Vec<String>,
    pub parallel_tool_calls: bool,
}

impl AgentConfig {
    /// The tool allow-list, or `None` when every tool is allowed.
    pub fn tool_filter(&self) -> Option<&[String]> {
        if self.allowed_tools.iter().any(|t| t == ALL_TOOLS) {
            None
        } else {
            Some(self.allowed_tools.as_slice())
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub articles_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub concurrency: usize,
    pub chunk_chars: usize,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub mcp: Option<McpServerConfig>,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    pub max_rounds: Option<usize>,
    pub allowed_tools: Option<Vec<String>>,
    pub parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    pub articles_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub chunk_chars: Option<usize>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub max_rounds: Option<usize>,
}

impl RadarConfig {
    /// Load configuration from all sources, reading the process environment.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`RADAR_MODEL`, `OPENAPI_API_KEY`, `OPENAPI_ENDPOINT`)
    /// 3. `--config` file, else `./radar.toml`, else `~/.radar/config.toml`
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(overrides, |key| std::env::var(key).ok())
    }

    /// Like [`RadarConfig::load`], with environment lookups routed through `env`.
    pub fn load_with_env(
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let (settings, source) = match &overrides.config_path {
            Some(path) => (read_settings_file(path)?, Some(path.clone())),
            None => match find_settings_file(&env) {
                Some(path) => (load_settings_file(&path), Some(path)),
                None => (SettingsFile::default(), None),
            },
        };
        if let Some(path) = &source {
            tracing::debug!("Using config file {}", path.display());
        }

        Self::resolve(settings, overrides, env, source)
    }

    fn resolve(
        settings: SettingsFile,
        overrides: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        source: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("OPENAPI_API_KEY")
            .or(settings.model.api_key)
            .ok_or_else(|| ConfigError::MissingKey {
                key: "model.api_key (set OPENAPI_API_KEY or add it to radar.toml)".into(),
            })?;

        let base_url = non_empty("OPENAPI_ENDPOINT")
            .or(settings.model.base_url)
            .ok_or_else(|| ConfigError::MissingKey {
                key: "model.base_url (set OPENAPI_ENDPOINT or add it to radar.toml)".into(),
            })?;

        let name = overrides
            .model
            .or_else(|| non_empty("RADAR_MODEL"))
            .or(settings.model.name)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = settings.model.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "model.temperature".into(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let max_rounds = overrides
            .max_rounds
            .or(settings.agent.max_rounds)
            .unwrap_or(DEFAULT_MAX_ROUNDS);
        require_positive("agent.max_rounds", max_rounds)?;

        let allowed_tools = settings.agent.allowed_tools.unwrap_or_else(|| {
            DEFAULT_ALLOWED_TOOLS
                .iter()
                .map(|t| t.to_string())
                .collect()
        });

        let output = OutputConfig {
            articles_dir: settings
                .output
                .articles_dir
                .unwrap_or_else(|| PathBuf::from("articles")),
            logs_dir: settings
                .output
                .logs_dir
                .unwrap_or_else(|| PathBuf::from("logs")),
            concurrency: settings.output.concurrency.unwrap_or(4),
            chunk_chars: settings.output.chunk_chars.unwrap_or(20_000),
        };
        require_positive("output.concurrency", output.concurrency)?;
        require_positive("output.chunk_chars", output.chunk_chars)?;

        let mcp = settings.mcp.unwrap_or_default();
        if mcp.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "mcp.command".into(),
                message: "must not be empty".into(),
            });
        }

        Ok(RadarConfig {
            model: ModelConfig {
                name,
                api_key,
                base_url,
                temperature,
                max_tokens: settings.model.max_tokens,
            },
            agent: AgentConfig {
                max_rounds,
                allowed_tools,
                parallel_tool_calls: settings.agent.parallel_tool_calls.unwrap_or(false),
            },
            mcp,
            output,
            source,
        })
    }
}

fn require_positive(key: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "must be at least 1".into(),
        });
    }
    Ok(())
}

/// Get the radar config directory path (~/.radar/).
pub fn config_dir(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env("RADAR_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".radar")
}

fn find_settings_file(env: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    [
        PathBuf::from("radar.toml"),
        config_dir(env).join("config.toml"),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// Read a file the user named explicitly. Any failure is an error.
fn read_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| parse_err(e.to_string()))?;
    toml::from_str(&content).map_err(|e| parse_err(e.to_string()))
}

/// Load and parse a discovered settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn credentials() -> Vec<(&'static str, &'static str)> {
        vec![
            ("OPENAPI_API_KEY", "sk-test"),
            ("OPENAPI_ENDPOINT", "https://ark.example.com/api/v3"),
        ]
    }

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("radar.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_apply_with_only_credentials() {
        let config = RadarConfig::resolve(
            SettingsFile::default(),
            CliOverrides::default(),
            env_from(&credentials()),
            None,
        )
        .unwrap();

        assert_eq!(config.model.name, DEFAULT_MODEL);
        assert_eq!(config.model.api_key, "sk-test");
        assert!((config.model.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.agent.max_rounds, 10);
        assert_eq!(
            config.agent.tool_filter().unwrap(),
            &["navigate_page", "evaluate_script", "take_snapshot"]
        );
        assert!(!config.agent.parallel_tool_calls);
        assert_eq!(config.mcp.command, "npx");
        assert_eq!(config.mcp.tool_timeout_ms, 120_000);
        assert_eq!(config.output.articles_dir, PathBuf::from("articles"));
        assert_eq!(config.output.concurrency, 4);
        assert_eq!(config.output.chunk_chars, 20_000);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let result = RadarConfig::resolve(
            SettingsFile::default(),
            CliOverrides::default(),
            env_from(&[("OPENAPI_ENDPOINT", "https://x")]),
            None,
        );
        match result {
            Err(ConfigError::MissingKey { key }) => assert!(key.contains("OPENAPI_API_KEY")),
            other => panic!("Expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn blank_env_value_does_not_count() {
        let result = RadarConfig::resolve(
            SettingsFile::default(),
            CliOverrides::default(),
            env_from(&[("OPENAPI_API_KEY", "  "), ("OPENAPI_ENDPOINT", "https://x")]),
            None,
        );
        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn precedence_cli_over_env_over_file() {
        let settings: SettingsFile = toml::from_str(
            r#"
[model]
name = "from-file"
api_key = "file-key"
base_url = "https://file.example.com"

[agent]
max_rounds = 4
"#,
        )
        .unwrap();

        let mut pairs = credentials();
        pairs.push(("RADAR_MODEL", "from-env"));

        let from_env =
            RadarConfig::resolve(settings.clone(), CliOverrides::default(), env_from(&pairs), None)
                .unwrap();
        assert_eq!(from_env.model.name, "from-env");
        assert_eq!(from_env.model.api_key, "sk-test");
        assert_eq!(from_env.agent.max_rounds, 4);

        let overrides = CliOverrides {
            model: Some("from-cli".into()),
            max_rounds: Some(2),
            ..CliOverrides::default()
        };
        let from_cli = RadarConfig::resolve(settings, overrides, env_from(&pairs), None).unwrap();
        assert_eq!(from_cli.model.name, "from-cli");
        assert_eq!(from_cli.agent.max_rounds, 2);
    }

    #[test]
    fn wildcard_exposes_all_tools() {
        let settings: SettingsFile = toml::from_str(
            r#"
[agent]
allowed_tools = ["*"]
parallel_tool_calls = true
"#,
        )
        .unwrap();
        let config =
            RadarConfig::resolve(settings, CliOverrides::default(), env_from(&credentials()), None)
                .unwrap();
        assert!(config.agent.tool_filter().is_none());
        assert!(config.agent.parallel_tool_calls);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for body in [
            "[model]\ntemperature = 3.5",
            "[agent]\nmax_rounds = 0",
            "[output]\nconcurrency = 0",
            "[mcp]\ncommand = \"\"",
        ] {
            let settings: SettingsFile = toml::from_str(body).unwrap();
            let result = RadarConfig::resolve(
                settings,
                CliOverrides::default(),
                env_from(&credentials()),
                None,
            );
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{body} should be rejected"
            );
        }
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[model]
api_key = "file-key"
base_url = "https://file.example.com"
max_tokens = 4096

[mcp]
command = "node"
args = ["server.js"]
tool_timeout_ms = 5000

[output]
articles_dir = "/tmp/radar-articles"
"#,
        );

        let overrides = CliOverrides {
            config_path: Some(path.clone()),
            ..CliOverrides::default()
        };
        let config = RadarConfig::load_with_env(overrides, env_from(&[])).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.model.api_key, "file-key");
        assert_eq!(config.model.max_tokens, Some(4096));
        assert_eq!(config.mcp.command, "node");
        assert_eq!(config.mcp.timeout_ms, 30_000);
        assert_eq!(config.mcp.tool_timeout_ms, 5000);
        assert_eq!(config.output.articles_dir, PathBuf::from("/tmp/radar-articles"));
    }

    #[test]
    fn explicit_config_file_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[model\nname = ");
        let overrides = CliOverrides {
            config_path: Some(path),
            ..CliOverrides::default()
        };
        let result = RadarConfig::load_with_env(overrides, env_from(&credentials()));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/definitely/not/here/radar.toml")),
            ..CliOverrides::default()
        };
        let result = RadarConfig::load_with_env(overrides, env_from(&credentials()));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn discovered_file_with_errors_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "this is not toml = = =");
        let settings = load_settings_file(&path);
        assert!(settings.model.name.is_none());
        assert!(settings.mcp.is_none());
    }

    #[test]
    fn config_dir_honors_override() {
        let env = env_from(&[("RADAR_CONFIG_DIR", "/opt/radar")]);
        assert_eq!(config_dir(env), PathBuf::from("/opt/radar"));
    }
}
