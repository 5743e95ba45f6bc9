//! 事件系统定义
//!
//! 拦截层通过事件通道向宿主应用报告安装、拦截与解除武装，与日志输出解耦。

use flume::{Receiver, Sender};

/// 拦截事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptionEvent {
    /// 拦截装饰器已激活（每个传输层仅一次）
    Installed,

    /// 请求被拦截
    Blocked { url: String, one_shot: bool },

    /// 单次拦截已消费，拦截自动关闭
    Disarmed,

    /// 协议处理器接管了请求
    HandlerClaimed { handler: String, url: String },
}

/// 事件发送器
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: Sender<InterceptionEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<InterceptionEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件
    pub fn emit(&self, event: InterceptionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn installed(&self) {
        self.emit(InterceptionEvent::Installed);
    }

    /// 发送拦截事件；单次拦截会紧跟一个 Disarmed
    pub fn blocked(&self, url: &str, one_shot: bool) {
        self.emit(InterceptionEvent::Blocked {
            url: url.to_string(),
            one_shot,
        });
        if one_shot {
            self.emit(InterceptionEvent::Disarmed);
        }
    }

    pub fn handler_claimed(&self, handler: &str, url: &str) {
        self.emit(InterceptionEvent::HandlerClaimed {
            handler: handler.to_string(),
            url: url.to_string(),
        });
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<InterceptionEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<InterceptionEvent>) -> Self {
        Self { rx }
    }

    /// 异步接收事件；所有发送端释放后返回 `None`
    pub async fn recv_async(&self) -> Option<InterceptionEvent> {
        self.rx.recv_async().await.ok()
    }

    /// 取出当前已到达的全部事件
    pub fn drain(&self) -> Vec<InterceptionEvent> {
        self.rx.try_iter().collect()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
