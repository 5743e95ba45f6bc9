//! 配置管理系统 (Configuration Management)
//!
//! 负责 `metarouter.toml` 的反序列化及其层级结构映射，支持环境变量覆盖与默认值回退机制。

use std::path::Path;
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::core::error::Result;
use crate::interception::matcher::DEFAULT_BLOCKED_DOMAINS;

const CONFIG_FILE: &str = "metarouter.toml";
const ENV_PREFIX: &str = "METAROUTER";

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct AppConfig {
    /// 底层分析客户端参数
    #[serde(default)]
    #[builder(default)]
    pub analytics: AnalyticsSettings,

    /// 请求拦截层参数
    #[serde(default)]
    #[builder(default)]
    pub interception: InterceptionConfig,

    /// HTTP 传输层参数
    #[serde(default)]
    #[builder(default)]
    pub transport: TransportConfig,
}

/// 分析客户端配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AnalyticsSettings {
    #[serde(default)]
    #[builder(default)]
    pub write_key: String,
    /// 数据采集集群地址
    #[serde(default = "default_api_host")]
    #[builder(default = default_api_host())]
    pub api_host: String,
    #[serde(default = "default_flush_interval")]
    #[builder(default = default_flush_interval())]
    pub flush_interval_secs: u64,
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub track_lifecycle_events: bool,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            write_key: String::new(),
            api_host: default_api_host(),
            flush_interval_secs: default_flush_interval(),
            track_lifecycle_events: true,
        }
    }
}

/// 拦截模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockingMode {
    /// 不拦截
    #[default]
    Off,
    /// 持续拦截所有匹配请求
    Always,
    /// 仅拦截下一个匹配请求
    Next,
}

/// 拦截层配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct InterceptionConfig {
    /// 初始拦截域名片段
    #[serde(default = "default_blocked_domains")]
    #[builder(default = default_blocked_domains())]
    pub blocked_domains: Vec<String>,
    #[serde(default)]
    #[builder(default)]
    pub mode: BlockingMode,
    /// 启动时立即激活拦截装饰器
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub install_on_start: bool,
    /// 是否注册 Segment 阻断协议处理器
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub register_protocol_handler: bool,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            blocked_domains: default_blocked_domains(),
            mode: BlockingMode::Off,
            install_on_start: true,
            register_protocol_handler: true,
        }
    }
}

/// 传输层配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout")]
    #[builder(default = default_connect_timeout())]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    #[builder(default = default_timeout())]
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            user_agent: None,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_host() -> String {
    "api.segment.io/v1".to_string()
}
fn default_flush_interval() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_blocked_domains() -> Vec<String> {
    DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()).collect()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_timeout() -> u64 {
    30
}

impl AppConfig {
    /// 从文件系统与环境变量中加载并解析配置
    ///
    /// 环境变量形如 `METAROUTER__ANALYTICS__WRITE_KEY`。
    pub fn load() -> Result<Self> {
        let config_path = Path::new(CONFIG_FILE);
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// 从 TOML 文本解析配置（不读取环境变量）
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_falls_back_to_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.analytics.flush_interval_secs, 10);
        assert!(cfg.analytics.track_lifecycle_events);
        assert_eq!(cfg.interception.blocked_domains, vec!["cdn-settings.segment.com"]);
        assert_eq!(cfg.interception.mode, BlockingMode::Off);
        assert!(cfg.interception.install_on_start);
        assert_eq!(cfg.transport.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [analytics]
            write_key = "wk_123"
            api_host = "collector.example.com/v1"

            [interception]
            blocked_domains = ["cdn-settings.segment.com", "x.io"]
            mode = "next"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.analytics.write_key, "wk_123");
        assert_eq!(cfg.analytics.api_host, "collector.example.com/v1");
        assert_eq!(cfg.interception.blocked_domains.len(), 2);
        assert_eq!(cfg.interception.mode, BlockingMode::Next);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = AppConfig::from_toml_str("[interception]\nmode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, crate::core::error::MetaRouterError::Config(_)));
    }

    #[test]
    fn mode_parses_from_cli_text() {
        assert_eq!("always".parse::<BlockingMode>().unwrap(), BlockingMode::Always);
        assert_eq!(BlockingMode::Next.to_string(), "next");
    }

    #[test]
    fn builder_matches_serde_defaults() {
        let cfg = AppConfig::builder()
            .analytics(AnalyticsSettings::builder().write_key("wk".into()).build())
            .build();
        assert_eq!(cfg.analytics.api_host, "api.segment.io/v1");
        assert_eq!(cfg.interception.blocked_domains, default_blocked_domains());
    }
}
