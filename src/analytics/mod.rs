//! 分析客户端门面 (Analytics Facade)
//!
//! 底层分析客户端（批处理、持久化、重试、刷新）由外部 SDK 提供；
//! 此处仅负责以固定参数构造它，并原样转发 track / identify / screen。

mod facade;

use std::time::Duration;

use bon::Builder;

pub use facade::MetaRouter;

/// 任意键值属性
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// 默认刷新间隔
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// 底层分析客户端的构造参数
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct AnalyticsConfiguration {
    #[builder(into)]
    pub write_key: String,
    /// 数据采集集群地址
    #[builder(into)]
    pub api_host: String,
    #[builder(default = true)]
    pub track_application_lifecycle_events: bool,
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
}

/// 底层分析客户端
///
/// 调用失败的语义完全由实现方决定，门面不做校验、缓冲或错误转换。
pub trait AnalyticsClient: Send + Sync {
    fn track(&self, name: &str, properties: Option<Properties>);

    fn identify(&self, user_id: &str, traits: Option<Properties>);

    fn screen(&self, title: &str, properties: Option<Properties>);
}

impl<T: AnalyticsClient + ?Sized> AnalyticsClient for std::sync::Arc<T> {
    fn track(&self, name: &str, properties: Option<Properties>) {
        (**self).track(name, properties)
    }

    fn identify(&self, user_id: &str, traits: Option<Properties>) {
        (**self).identify(user_id, traits)
    }

    fn screen(&self, title: &str, properties: Option<Properties>) {
        (**self).screen(title, properties)
    }
}
