//! 拦截策略状态 (Interception Policy)
//!
//! 进程级共享的拦截开关与拦截列表。所有字段由同一把互斥锁保护，
//! "检查-匹配-消费单次标记" 在一个临界区内完成。

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::interception::matcher::BlockList;

static SHARED: LazyLock<Arc<InterceptionPolicy>> =
    LazyLock::new(|| Arc::new(InterceptionPolicy::new()));

/// 策略状态快照
///
/// 不变式：`block_next_only == true` 蕴含 `enabled == true`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyState {
    pub enabled: bool,
    pub block_next_only: bool,
    pub installed: bool,
}

/// 单次请求的判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 放行，交给真实传输层
    Proceed,
    /// 拦截；`one_shot` 表示本次拦截消费了单次标记
    Block { one_shot: bool },
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Block { .. })
    }
}

#[derive(Debug)]
struct PolicyInner {
    state: PolicyState,
    block_list: BlockList,
}

/// 拦截策略服务
#[derive(Debug)]
pub struct InterceptionPolicy {
    inner: Mutex<PolicyInner>,
}

impl Default for InterceptionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptionPolicy {
    /// 以默认拦截列表创建，初始未启用、未安装
    pub fn new() -> Self {
        Self::with_block_list(BlockList::with_defaults())
    }

    pub fn with_block_list(block_list: BlockList) -> Self {
        Self {
            inner: Mutex::new(PolicyInner {
                state: PolicyState::default(),
                block_list,
            }),
        }
    }

    /// 进程级共享实例
    pub fn shared() -> Arc<Self> {
        SHARED.clone()
    }

    /// 持续拦截所有匹配请求
    pub fn enable_blocking(&self) {
        let mut inner = self.inner.lock();
        inner.state.enabled = true;
        inner.state.block_next_only = false;
        debug!("拦截已启用");
    }

    pub fn disable_blocking(&self) {
        let mut inner = self.inner.lock();
        inner.state.enabled = false;
        inner.state.block_next_only = false;
        debug!("拦截已关闭");
    }

    /// 仅拦截下一个匹配请求，随后自动关闭
    ///
    /// 不负责安装；需要自动安装时使用 `HttpTransport::block_next_request`。
    pub fn block_next_request(&self) {
        let mut inner = self.inner.lock();
        inner.state.block_next_only = true;
        inner.state.enabled = true;
        debug!("已设置单次拦截");
    }

    pub fn add_blocked_domain(&self, domain: impl Into<String>) {
        let domain = domain.into();
        debug!("添加拦截域名: {}", domain);
        self.inner.lock().block_list.insert(domain);
    }

    pub fn remove_blocked_domain(&self, domain: &str) {
        debug!("移除拦截域名: {}", domain);
        self.inner.lock().block_list.remove(domain);
    }

    /// 以给定列表整体替换拦截列表（包括默认域名）
    pub fn set_blocked_domains<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let block_list: BlockList = domains.into_iter().collect();
        debug!("替换拦截列表: {} 项", block_list.len());
        self.inner.lock().block_list = block_list;
    }

    /// 标记为已安装；仅首次调用返回 true
    pub fn mark_installed(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.installed {
            return false;
        }
        inner.state.installed = true;
        true
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().state.installed
    }

    pub fn state(&self) -> PolicyState {
        self.inner.lock().state
    }

    pub fn blocked_domains(&self) -> Vec<String> {
        self.inner.lock().block_list.iter().map(str::to_string).collect()
    }

    /// 仅按拦截列表匹配，不考虑开关状态
    pub fn matches_host(&self, host: &str) -> bool {
        self.inner.lock().block_list.matches(host)
    }

    /// 对一次出站请求做出判定
    ///
    /// Host 缺失、未安装或未启用时一律放行（fail open）。
    /// 命中且处于单次模式时，在同一临界区内清除 `enabled` 与 `block_next_only`。
    pub fn evaluate(&self, host: Option<&str>) -> Verdict {
        let Some(host) = host else {
            return Verdict::Proceed;
        };

        let mut inner = self.inner.lock();
        let state = inner.state;
        if !state.installed || !state.enabled || !inner.block_list.matches(host) {
            return Verdict::Proceed;
        }

        if state.block_next_only {
            inner.state.enabled = false;
            inner.state.block_next_only = false;
        }

        Verdict::Block {
            one_shot: state.block_next_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEGMENT: &str = "cdn-settings.segment.com";

    fn installed_policy() -> InterceptionPolicy {
        let policy = InterceptionPolicy::new();
        assert!(policy.mark_installed());
        policy
    }

    #[test]
    fn test_initial_state() {
        let policy = InterceptionPolicy::new();
        assert_eq!(policy.state(), PolicyState::default());
        assert_eq!(policy.blocked_domains(), vec![SEGMENT.to_string()]);
    }

    #[test]
    fn test_block_next_implies_enabled() {
        let policy = InterceptionPolicy::new();
        policy.block_next_request();
        let state = policy.state();
        assert!(state.enabled && state.block_next_only);

        policy.enable_blocking();
        let state = policy.state();
        assert!(state.enabled && !state.block_next_only);

        policy.block_next_request();
        policy.disable_blocking();
        assert_eq!(policy.state(), PolicyState::default());
    }

    #[test]
    fn test_one_shot_disarms_after_first_match() {
        let policy = installed_policy();
        policy.block_next_request();

        assert_eq!(policy.evaluate(Some(SEGMENT)), Verdict::Block { one_shot: true });
        let state = policy.state();
        assert!(!state.enabled && !state.block_next_only);

        assert_eq!(policy.evaluate(Some(SEGMENT)), Verdict::Proceed);
    }

    #[test]
    fn test_one_shot_ignores_unmatched_hosts() {
        let policy = installed_policy();
        policy.block_next_request();

        assert_eq!(policy.evaluate(Some("api.segment.io")), Verdict::Proceed);
        assert!(policy.state().block_next_only);
        assert!(policy.evaluate(Some(SEGMENT)).is_blocked());
    }

    #[test]
    fn test_enabled_blocks_until_disabled() {
        let policy = installed_policy();
        policy.enable_blocking();

        for _ in 0..5 {
            assert_eq!(policy.evaluate(Some(SEGMENT)), Verdict::Block { one_shot: false });
            assert!(!policy.state().block_next_only);
        }

        policy.disable_blocking();
        assert_eq!(policy.evaluate(Some(SEGMENT)), Verdict::Proceed);
    }

    #[test]
    fn test_fail_open() {
        let policy = installed_policy();
        policy.enable_blocking();
        assert_eq!(policy.evaluate(None), Verdict::Proceed);

        let uninstalled = InterceptionPolicy::new();
        uninstalled.enable_blocking();
        assert_eq!(uninstalled.evaluate(Some(SEGMENT)), Verdict::Proceed);
    }

    #[test]
    fn test_mark_installed_once() {
        let policy = InterceptionPolicy::new();
        assert!(policy.mark_installed());
        assert!(!policy.mark_installed());
        assert!(!policy.mark_installed());
        assert!(policy.is_installed());
    }

    #[test]
    fn test_dynamic_domains() {
        let policy = installed_policy();
        policy.enable_blocking();
        policy.add_blocked_domain("x.io");

        assert!(policy.evaluate(Some("foo.x.io.evil.com")).is_blocked());

        policy.remove_blocked_domain("x.io");
        assert_eq!(policy.evaluate(Some("foo.x.io.evil.com")), Verdict::Proceed);
    }

    #[test]
    fn test_set_blocked_domains_replaces_defaults() {
        let policy = installed_policy();
        policy.enable_blocking();
        policy.set_blocked_domains(["x.io"]);

        assert_eq!(policy.blocked_domains(), vec!["x.io".to_string()]);
        assert_eq!(
            policy.evaluate(Some("cdn-settings.segment.com")),
            Verdict::Proceed
        );
        assert!(policy.evaluate(Some("api.x.io")).is_blocked());

        policy.set_blocked_domains(Vec::<String>::new());
        assert!(policy.blocked_domains().is_empty());
        assert_eq!(policy.evaluate(Some("api.x.io")), Verdict::Proceed);
    }

    #[test]
    fn test_one_shot_consumed_exactly_once_across_threads() {
        let policy = Arc::new(installed_policy());
        policy.block_next_request();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let policy = policy.clone();
                std::thread::spawn(move || policy.evaluate(Some(SEGMENT)).is_blocked())
            })
            .collect();

        let blocked = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|b| *b)
            .count();
        assert_eq!(blocked, 1);
    }

    #[test]
    fn test_shared_is_singleton() {
        assert!(Arc::ptr_eq(&InterceptionPolicy::shared(), &InterceptionPolicy::shared()));
    }
}
