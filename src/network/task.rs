//! 数据任务句柄 (Data Task)
//!
//! 回调式入口返回的句柄。被拦截的请求返回一个已取消的诱饵任务，从不触网。

use std::borrow::Cow;

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::core::error::Result;
use crate::network::ResponseHead;

/// 诱饵任务使用的占位地址
pub const DECOY_URL: &str = "data:,";

/// 完成回调：成功时携带响应头与完整响应体，失败时仅携带错误
pub type Completion = Box<dyn FnOnce(Result<TaskResponse>) + Send + 'static>;

/// 数据任务的完整结果
#[derive(Debug, Clone)]
pub struct TaskResponse {
    pub head: ResponseHead,
    pub body: Bytes,
}

impl TaskResponse {
    /// 读取完整响应体
    pub async fn read(resp: Response) -> Result<Self> {
        let head = ResponseHead::from_response(&resp);
        let body = resp.bytes().await?;
        Ok(Self { head, body })
    }

    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// 数据任务句柄
#[derive(Debug, Clone)]
pub struct DataTask {
    url: String,
    token: CancellationToken,
    decoy: bool,
}

impl DataTask {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: CancellationToken::new(),
            decoy: false,
        }
    }

    /// 构造并立即取消一个诱饵任务
    pub(crate) fn decoy() -> Self {
        let task = Self {
            decoy: true,
            ..Self::new(DECOY_URL)
        };
        task.cancel();
        task
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 取消任务；运行中的真实请求会以取消错误结束
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_decoy(&self) -> bool {
        self.decoy
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoy_is_born_cancelled() {
        let task = DataTask::decoy();
        assert!(task.is_decoy());
        assert!(task.is_cancelled());
        assert_eq!(task.url(), DECOY_URL);
    }

    #[test]
    fn real_task_cancels_on_request() {
        let task = DataTask::new("https://api.segment.io/v1/t");
        assert!(!task.is_cancelled());

        let observer = task.clone();
        task.cancel();
        assert!(observer.is_cancelled());
    }
}
