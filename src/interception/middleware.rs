use std::sync::Arc;
use std::time::Duration;

use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tracing::{info, warn};

use crate::core::error::MetaRouterError;
use crate::core::event::EventSender;
use crate::interception::policy::{InterceptionPolicy, Verdict};

/// 伪造失败前的延迟，保证调用方不会在同步路径上收到完成回调
pub const FABRICATION_DELAY: Duration = Duration::from_millis(1);

/// 拦截跳过标记
///
/// 已在数据任务入口完成判定的请求携带此标记，中间件不再重复判定。
#[derive(Clone, Debug)]
pub struct SkipInterception;

/// 拦截中间件 (Transport Interceptor)
///
/// 位于装饰器链最前端。未安装时透明放行；安装后按策略判定，
/// 命中的请求不会进入后续链路，而是在短暂延迟后以取消错误结束。
#[derive(Debug)]
pub struct BlockingMiddleware {
    policy: Arc<InterceptionPolicy>,
    events: Option<EventSender>,
}

impl BlockingMiddleware {
    pub fn new(policy: Arc<InterceptionPolicy>, events: Option<EventSender>) -> Self {
        Self { policy, events }
    }
}

#[async_trait::async_trait]
impl Middleware for BlockingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if extensions.get::<SkipInterception>().is_some() {
            return next.run(req, extensions).await;
        }

        if let Verdict::Block { one_shot } = self.policy.evaluate(req.url().host_str()) {
            let url = req.url().to_string();
            report_block(&url, one_shot, self.events.as_ref());

            tokio::time::sleep(FABRICATION_DELAY).await;
            return Err(MetaRouterError::cancelled(url).into_middleware());
        }

        next.run(req, extensions).await
    }
}

pub(crate) fn report_block(url: &str, one_shot: bool, events: Option<&EventSender>) {
    warn!("🚫 已拦截网络请求: {}", url);
    if one_shot {
        info!("单次拦截已消费，拦截自动关闭");
    }
    if let Some(events) = events {
        events.blocked(url, one_shot);
    }
}
