//! 错误处理体系 (Error Handling System)
//!
//! 定义拦截层相关的错误类型以及全局 Result 别名。

use thiserror::Error;

/// 全局错误定义 (MetaRouter Domain Errors)
#[derive(Error, Debug)]
pub enum MetaRouterError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// 请求被拦截层取消（等价于平台的 "cancelled" 错误码）
    #[error("Request blocked by interceptor: {url}")]
    Cancelled { url: String },

    /// 请求缺少可解析的 URL / Host
    #[error("Bad URL: {0}")]
    BadUrl(String),

    /// 协议处理器结束时既没有响应也没有错误
    #[error("Protocol handler `{handler}` finished without a response")]
    IncompleteLoad { handler: String },

    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Other error: {0}")]
    Custom(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, MetaRouterError>;

impl MetaRouterError {
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// 判断是否为拦截层产生的取消错误
    ///
    /// 支持中间件嵌套错误的分层解包 (Downcasting)。
    pub fn is_cancelled(&self) -> bool {
        match self {
            MetaRouterError::Cancelled { .. } => true,
            MetaRouterError::Middleware(reqwest_middleware::Error::Middleware(anyhow_err)) => {
                anyhow_err
                    .downcast_ref::<MetaRouterError>()
                    .is_some_and(|e| e.is_cancelled())
            }
            _ => false,
        }
    }

    /// 包装为中间件错误，以便穿过 reqwest_middleware 的边界
    pub fn into_middleware(self) -> reqwest_middleware::Error {
        reqwest_middleware::Error::from(anyhow::Error::new(self))
    }

    /// 从中间件错误中还原领域错误；无法还原时原样保留
    pub fn from_middleware(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => MetaRouterError::Network(e),
            reqwest_middleware::Error::Middleware(e) => match e.downcast::<MetaRouterError>() {
                Ok(domain) => domain,
                Err(other) => {
                    MetaRouterError::Middleware(reqwest_middleware::Error::Middleware(other))
                }
            },
        }
    }
}
