use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Request, StatusCode};

use crate::core::error::MetaRouterError;
use crate::interception::matcher::{DEFAULT_BLOCKED_DOMAINS, matches};
use crate::interception::policy::InterceptionPolicy;
use crate::network::ResponseHead;
use crate::network::loader::{LoadingClient, ProtocolHandler};

/// 伪造 404 的响应体
pub const NOT_FOUND_BODY: &str = r#"{"error": "Not Found"}"#;

/// 处理器使用的拦截列表来源
#[derive(Debug, Clone)]
pub enum BlockSource {
    /// 固定列表，不随策略变化
    Fixed(&'static [&'static str]),
    /// 与传输层共享同一策略：受拦截开关、安装标记与单次拦截约束
    Shared(Arc<InterceptionPolicy>),
}

impl BlockSource {
    /// 判定是否接管；`Shared` 经由策略判定，命中时会消费单次拦截标记
    fn claims(&self, host: &str) -> bool {
        match self {
            BlockSource::Fixed(list) => matches(host, list.iter()),
            BlockSource::Shared(policy) => policy.evaluate(Some(host)).is_blocked(),
        }
    }
}

/// Segment 配置请求阻断处理器
///
/// 接管命中列表的请求并返回伪造的 404。
/// 固定列表不受拦截开关影响；共享策略时与传输层拦截中间件遵循同一套开关。
#[derive(Debug, Clone)]
pub struct SegmentBlockerProtocol {
    source: BlockSource,
}

impl Default for SegmentBlockerProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentBlockerProtocol {
    pub const NAME: &'static str = "segment-blocker";

    pub fn new() -> Self {
        Self {
            source: BlockSource::Fixed(DEFAULT_BLOCKED_DOMAINS),
        }
    }

    pub fn shared(policy: Arc<InterceptionPolicy>) -> Self {
        Self {
            source: BlockSource::Shared(policy),
        }
    }
}

impl ProtocolHandler for SegmentBlockerProtocol {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn can_handle(&self, request: &Request) -> bool {
        request
            .url()
            .host_str()
            .is_some_and(|host| self.source.claims(host))
    }

    fn start(&self, request: &Request, client: &mut dyn LoadingClient) {
        let url = request.url();
        if url.host_str().is_none() {
            client.did_fail(MetaRouterError::BadUrl(url.to_string()));
            return;
        }

        let mut head = ResponseHead::new(StatusCode::NOT_FOUND, url.as_str());
        head.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        client.did_receive_response(head);
        client.did_load(Bytes::from_static(NOT_FOUND_BODY.as_bytes()));
        client.did_finish();
    }
}
