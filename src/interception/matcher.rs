//! 域名匹配器 (Domain Matcher)
//!
//! 判断目标 Host 是否命中拦截列表。匹配采用子串包含语义：
//! 列表项 `x.com` 同样会命中 `notx.comx`。这是有意的宽松匹配，不作为安全边界使用。

use std::collections::HashSet;

/// 默认拦截的遥测配置域名
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &["cdn-settings.segment.com"];

/// 当 `host` 包含任一列表项时返回 true；空列表恒为 false
pub fn matches<I, S>(host: &str, block_list: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    block_list
        .into_iter()
        .any(|fragment| host.contains(fragment.as_ref()))
}

/// 可变的域名片段集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    fragments: HashSet<String>,
}

impl BlockList {
    /// 空列表
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅包含默认拦截域名的列表
    pub fn with_defaults() -> Self {
        DEFAULT_BLOCKED_DOMAINS.iter().copied().collect()
    }

    pub fn insert(&mut self, fragment: impl Into<String>) -> bool {
        self.fragments.insert(fragment.into())
    }

    pub fn remove(&mut self, fragment: &str) -> bool {
        self.fragments.remove(fragment)
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.fragments.contains(fragment)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(String::as_str)
    }

    /// 对当前列表执行匹配
    pub fn matches(&self, host: &str) -> bool {
        matches(host, self.iter())
    }
}

impl<S: Into<String>> FromIterator<S> for BlockList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            fragments: iter.into_iter().map(Into::into).collect(),
        }
    }
}
