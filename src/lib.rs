//! MetaRouter
//!
//! 分析 SDK 的轻量封装：在共享 HTTP 传输层上挂载请求拦截，
//! 丢弃发往遥测配置域名的请求，其余流量原样交给底层传输。
//!
//! 宿主应用通常在启动阶段调用一次 [`install`]，之后通过
//! [`enable_blocking`] / [`block_next_request`] 等函数控制拦截行为。

pub mod analytics;
pub mod core;
pub mod interception;
pub mod network;

pub use crate::analytics::{AnalyticsClient, AnalyticsConfiguration, MetaRouter, Properties};
pub use crate::core::config::{AppConfig, BlockingMode};
pub use crate::core::error::{MetaRouterError, Result};
pub use crate::interception::{BlockList, InterceptionPolicy, PolicyState, matches};
pub use crate::network::protocol::SegmentBlockerProtocol;
pub use crate::network::service::HttpTransport;
pub use crate::network::task::{DataTask, TaskResponse};

/// 在共享传输层上激活拦截（幂等）
pub fn install() {
    HttpTransport::shared().install();
}

pub fn enable_blocking() {
    HttpTransport::shared().enable_blocking();
}

pub fn disable_blocking() {
    HttpTransport::shared().disable_blocking();
}

/// 仅拦截下一个匹配请求，必要时自动安装
pub fn block_next_request() {
    HttpTransport::shared().block_next_request();
}

pub fn add_blocked_domain(domain: impl Into<String>) {
    HttpTransport::shared().add_blocked_domain(domain);
}

pub fn remove_blocked_domain(domain: &str) {
    HttpTransport::shared().remove_blocked_domain(domain);
}
