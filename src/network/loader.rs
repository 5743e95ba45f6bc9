//! URL 加载子系统 (URL Loader)
//!
//! 在真实网络传输之前依次询问已注册的协议处理器，
//! 第一个声明接管的处理器负责产出响应，请求不再进入网络层。

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use tracing::{debug, info};

use crate::core::error::{MetaRouterError, Result};
use crate::core::event::EventSender;
use crate::network::ResponseHead;

/// 协议处理器的回调通道
///
/// 处理器按 "响应头 → 数据 → 结束" 的顺序通知，或以 `did_fail` 报告错误。
pub trait LoadingClient: Send {
    fn did_receive_response(&mut self, head: ResponseHead);
    fn did_load(&mut self, data: Bytes);
    fn did_finish(&mut self);
    fn did_fail(&mut self, error: MetaRouterError);
}

/// 可插拔的协议处理器
pub trait ProtocolHandler: Send + Sync + std::fmt::Debug {
    /// 处理器名称，注册时按名称去重
    fn name(&self) -> &str;

    /// 是否接管该请求
    fn can_handle(&self, request: &Request) -> bool;

    fn canonicalize(&self, request: Request) -> Request {
        request
    }

    /// 开始加载；结果通过 `client` 回报
    fn start(&self, request: &Request, client: &mut dyn LoadingClient);

    fn stop(&self, _request: &Request) {}
}

/// 将处理器通知收集为 Response
#[derive(Debug, Default)]
pub struct ResponseCollector {
    head: Option<ResponseHead>,
    body: BytesMut,
    finished: bool,
    error: Option<MetaRouterError>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_response(self, handler: &str) -> Result<Response> {
        if let Some(error) = self.error {
            return Err(error);
        }
        match self.head {
            Some(head) if self.finished => head.rebuild(self.body.freeze()),
            _ => Err(MetaRouterError::IncompleteLoad {
                handler: handler.to_string(),
            }),
        }
    }
}

impl LoadingClient for ResponseCollector {
    fn did_receive_response(&mut self, head: ResponseHead) {
        self.head = Some(head);
    }

    fn did_load(&mut self, data: Bytes) {
        self.body.extend_from_slice(&data);
    }

    fn did_finish(&mut self) {
        self.finished = true;
    }

    fn did_fail(&mut self, error: MetaRouterError) {
        self.error = Some(error);
    }
}

/// URL 加载子系统
#[derive(Debug, Default)]
pub struct UrlLoader {
    handlers: RwLock<Vec<Arc<dyn ProtocolHandler>>>,
    events: Option<EventSender>,
}

impl UrlLoader {
    pub fn new(events: Option<EventSender>) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            events,
        }
    }

    /// 注册处理器；同名处理器已存在时忽略并返回 false
    pub fn register(&self, handler: Arc<dyn ProtocolHandler>) -> bool {
        let mut handlers = self.handlers.write();
        if handlers.iter().any(|h| h.name() == handler.name()) {
            debug!("协议处理器已注册，忽略: {}", handler.name());
            return false;
        }
        info!("注册协议处理器: {}", handler.name());
        handlers.push(handler);
        true
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| h.name() != name);
        handlers.len() != before
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.handlers
            .read()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }

    /// 按注册顺序查找第一个接管请求的处理器
    pub fn handler_for(&self, request: &Request) -> Option<Arc<dyn ProtocolHandler>> {
        self.handlers
            .read()
            .iter()
            .find(|h| h.can_handle(request))
            .cloned()
    }

    /// 由指定处理器完成一次加载
    pub fn load(&self, handler: &dyn ProtocolHandler, request: Request) -> Result<Response> {
        let request = handler.canonicalize(request);
        let mut collector = ResponseCollector::new();

        handler.start(&request, &mut collector);
        handler.stop(&request);

        collector.into_response(handler.name())
    }
}

#[async_trait::async_trait]
impl Middleware for UrlLoader {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let Some(handler) = self.handler_for(&req) else {
            return next.run(req, extensions).await;
        };

        debug!("协议处理器 {} 接管请求: {}", handler.name(), req.url());
        if let Some(events) = &self.events {
            events.handler_claimed(handler.name(), req.url().as_str());
        }

        self.load(handler.as_ref(), req)
            .map_err(MetaRouterError::into_middleware)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode};
    use url::Url;

    #[derive(Debug)]
    struct Echo(&'static str);

    impl ProtocolHandler for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn can_handle(&self, request: &Request) -> bool {
            request.url().scheme() == "echo"
        }

        fn start(&self, request: &Request, client: &mut dyn LoadingClient) {
            client.did_receive_response(ResponseHead::new(StatusCode::OK, request.url().as_str()));
            client.did_load(Bytes::from_static(b"ec"));
            client.did_load(Bytes::from_static(b"ho"));
            client.did_finish();
        }
    }

    #[derive(Debug)]
    struct Unfinished;

    impl ProtocolHandler for Unfinished {
        fn name(&self) -> &str {
            "unfinished"
        }

        fn can_handle(&self, _request: &Request) -> bool {
            true
        }

        fn start(&self, request: &Request, client: &mut dyn LoadingClient) {
            client.did_receive_response(ResponseHead::new(StatusCode::OK, request.url().as_str()));
        }
    }

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn test_register_deduplicates_by_name() {
        let loader = UrlLoader::default();
        assert!(loader.register(Arc::new(Echo("echo"))));
        assert!(!loader.register(Arc::new(Echo("echo"))));
        assert_eq!(loader.handler_names(), vec!["echo".to_string()]);

        assert!(loader.unregister("echo"));
        assert!(loader.handler_names().is_empty());
    }

    #[test]
    fn test_first_claiming_handler_wins() {
        let loader = UrlLoader::default();
        loader.register(Arc::new(Echo("first")));
        loader.register(Arc::new(Echo("second")));

        let handler = loader.handler_for(&request("echo://host/path")).unwrap();
        assert_eq!(handler.name(), "first");
        assert!(loader.handler_for(&request("https://host/path")).is_none());
    }

    #[tokio::test]
    async fn test_load_concatenates_data() {
        let loader = UrlLoader::default();
        let resp = loader.load(&Echo("echo"), request("echo://host/")).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "echo");
    }

    #[test]
    fn test_unfinished_load_is_an_error() {
        let loader = UrlLoader::default();
        let err = loader.load(&Unfinished, request("https://host/")).unwrap_err();
        assert!(matches!(
            err,
            MetaRouterError::IncompleteLoad { handler } if handler == "unfinished"
        ));
    }
}
