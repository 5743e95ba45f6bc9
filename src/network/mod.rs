pub mod loader;
pub mod protocol;
pub mod service;
pub mod task;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode, Version};

use crate::core::error::Result;

/// URL 扩展类型，用于在伪造的 Response 上保留原始 URL
#[derive(Clone, Debug)]
pub struct OriginalUrl(pub String);

/// 响应头元数据，用于构造或重建 Response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub url: String,
}

impl ResponseHead {
    pub fn new(status: StatusCode, url: impl Into<String>) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            url: url.into(),
        }
    }

    pub fn from_response(resp: &Response) -> Self {
        Self {
            status: resp.status(),
            version: resp.version(),
            headers: resp.headers().clone(),
            url: resp.original_url().to_string(),
        }
    }

    pub fn rebuild(self, body: Bytes) -> Result<Response> {
        let http_resp = http::Response::builder()
            .status(self.status)
            .version(self.version)
            .body(body)?;

        let mut new_resp = Response::from(http_resp);

        // 复制所有 Headers
        *new_resp.headers_mut() = self.headers;

        // 保留原始 URL 扩展
        new_resp.extensions_mut().insert(OriginalUrl(self.url));

        Ok(new_resp)
    }
}

/// 响应扩展 Trait
pub trait ResponseExt {
    /// 获取原始 URL (优先从扩展中读取，否则从 Response 自带的 URL 读取)
    fn original_url(&self) -> &str;
}

impl ResponseExt for Response {
    fn original_url(&self) -> &str {
        self.extensions()
            .get::<OriginalUrl>()
            .map(|u| u.0.as_str())
            .unwrap_or_else(|| self.url().as_str())
    }
}
