//! pd-config - 配置加载库

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// 路径规则配置
///
/// `effect` 取值 "allow" / "deny"，`pattern` 支持 `*` 和 `prefix*`
#[derive(Debug, Clone, Deserialize)]
pub struct PathRuleConfig {
    pub name: String,
    pub effect: String,
    pub pattern: String,
}

/// 私有文件访问配置
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// 受保护根目录
    pub protected_root: PathBuf,
    /// 优先级策略 (allow_overrides_deny / deny_overrides_allow / first_decider_wins)
    #[serde(default = "default_priority")]
    pub priority: String,
    /// 单个 provider 的超时时间 (毫秒)
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// 路径中包含这些子串时拒绝访问
    #[serde(default)]
    pub forbidden_substrings: Vec<String>,
    /// 按顺序匹配的路径规则
    #[serde(default)]
    pub rules: Vec<PathRuleConfig>,
}

fn default_priority() -> String {
    "deny_overrides_allow".to_string()
}

fn default_provider_timeout_ms() -> u64 {
    2000
}

impl AccessConfig {
    pub fn new(protected_root: impl Into<PathBuf>) -> Self {
        Self {
            protected_root: protected_root.into(),
            priority: default_priority(),
            provider_timeout_ms: default_provider_timeout_ms(),
            forbidden_substrings: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub access: AccessConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_for_env(config_dir, &env)
    }

    /// 按指定环境加载: default.toml -> {env}.toml -> PD_ 前缀环境变量
    pub fn load_for_env(config_dir: &str, env: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("PD_").split("__"));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
