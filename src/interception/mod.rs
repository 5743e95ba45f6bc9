//! 请求拦截层
//!
//! - **matcher**: 域名子串匹配与可变拦截列表
//! - **policy**: 拦截开关、单次拦截与安装标记，统一由一把锁保护
//! - **middleware**: 装配在传输层装饰器链最前端的拦截中间件

pub mod matcher;
pub mod middleware;
pub mod policy;

pub use matcher::{BlockList, DEFAULT_BLOCKED_DOMAINS, matches};
pub use middleware::{BlockingMiddleware, FABRICATION_DELAY, SkipInterception};
pub use policy::{InterceptionPolicy, PolicyState, Verdict};
