use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::analytics::{AnalyticsClient, AnalyticsConfiguration, Properties};
use crate::core::config::AppConfig;
use crate::network::protocol::SegmentBlockerProtocol;
use crate::network::service::HttpTransport;

/// 面向宿主应用的门面
///
/// 构造时向传输层注册 Segment 阻断处理器，并以调用方工厂构造一次底层客户端。
pub struct MetaRouter<A> {
    analytics: A,
    transport: HttpTransport,
}

impl<A: AnalyticsClient> MetaRouter<A> {
    /// 使用进程级共享传输层
    pub fn new<F>(write_key: impl Into<String>, cluster_host: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce(AnalyticsConfiguration, &HttpTransport) -> A,
    {
        Self::with_transport(HttpTransport::shared().clone(), write_key, cluster_host, factory)
    }

    pub fn with_transport<F>(
        transport: HttpTransport,
        write_key: impl Into<String>,
        cluster_host: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: FnOnce(AnalyticsConfiguration, &HttpTransport) -> A,
    {
        let configuration = AnalyticsConfiguration::builder()
            .write_key(write_key)
            .api_host(cluster_host)
            .track_application_lifecycle_events(true)
            .flush_interval(Duration::from_secs(10))
            .build();
        Self::assemble(transport, configuration, true, factory)
    }

    /// 按配置文件组装：注册处理器、预置拦截列表、安装并应用拦截模式
    pub fn from_config<F>(config: &AppConfig, transport: HttpTransport, factory: F) -> Self
    where
        F: FnOnce(AnalyticsConfiguration, &HttpTransport) -> A,
    {
        let interception = &config.interception;
        transport.set_blocked_domains(interception.blocked_domains.iter().cloned());
        if interception.install_on_start {
            transport.install();
        }
        transport.apply_mode(interception.mode);

        let configuration = AnalyticsConfiguration::builder()
            .write_key(config.analytics.write_key.as_str())
            .api_host(config.analytics.api_host.as_str())
            .track_application_lifecycle_events(config.analytics.track_lifecycle_events)
            .flush_interval(Duration::from_secs(config.analytics.flush_interval_secs))
            .build();
        Self::assemble(
            transport,
            configuration,
            interception.register_protocol_handler,
            factory,
        )
    }

    fn assemble<F>(
        transport: HttpTransport,
        configuration: AnalyticsConfiguration,
        register_handler: bool,
        factory: F,
    ) -> Self
    where
        F: FnOnce(AnalyticsConfiguration, &HttpTransport) -> A,
    {
        if register_handler {
            transport.register_protocol(Arc::new(SegmentBlockerProtocol::shared(
                transport.policy().clone(),
            )));
        }

        info!("初始化分析客户端: {}", configuration.api_host);
        let analytics = factory(configuration, &transport);
        Self {
            analytics,
            transport,
        }
    }

    pub fn track(&self, event: &str, properties: Option<Properties>) {
        self.analytics.track(event, properties);
    }

    pub fn identify(&self, user_id: &str, traits: Option<Properties>) {
        self.analytics.identify(user_id, traits);
    }

    pub fn screen(&self, title: &str, properties: Option<Properties>) {
        self.analytics.screen(title, properties);
    }

    pub fn analytics(&self) -> &A {
        &self.analytics
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn install(&self) {
        self.transport.install();
    }

    pub fn enable_blocking(&self) {
        self.transport.enable_blocking();
    }

    pub fn disable_blocking(&self) {
        self.transport.disable_blocking();
    }

    pub fn block_next_request(&self) {
        self.transport.block_next_request();
    }

    pub fn add_blocked_domain(&self, domain: impl Into<String>) {
        self.transport.add_blocked_domain(domain);
    }

    pub fn remove_blocked_domain(&self, domain: &str) {
        self.transport.remove_blocked_domain(domain);
    }
}
