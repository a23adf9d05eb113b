//! # 实体引用模块
//!
//! 定义脚本侧引用宿主实体的路径、查询与动作。
//!
//! ## 设计说明
//!
//! - 实体目录本身由宿主协作方持有；核心只定义引用类型和匹配规则
//! - 末尾 `*` 表示通配查询：对所有共享前缀的活动实体生效。
//!   通配判定**只看最后一个字符**
//! - 开头 `@` 是别名记号，解析前剥离；它的存在不影响通配判定

use serde::{Deserialize, Serialize};

/// 实体路径
///
/// 宿主目录中一个实体的完整名字（不含通配符）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityPath(String);

impl EntityPath {
    /// 创建实体路径，剥离开头的别名记号 `@`
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.strip_prefix('@') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 实体查询
///
/// 精确名字或末尾带 `*` 的通配模式。内建函数对两种形式透明支持。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityQuery(String);

impl EntityQuery {
    /// 创建查询，剥离开头的别名记号 `@`
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.strip_prefix('@') {
            Some(stripped) => Self(stripped.to_string()),
            None => Self(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 是否是通配查询（只看最后一个字符）
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with('*')
    }

    /// 通配前缀（非通配查询即完整名字）
    pub fn prefix(&self) -> &str {
        if self.is_wildcard() {
            &self.0[..self.0.len() - 1]
        } else {
            &self.0
        }
    }

    /// 判断一个实体名是否命中本查询
    pub fn matches(&self, path: &str) -> bool {
        if self.is_wildcard() {
            path.starts_with(self.prefix())
        } else {
            path == self.0
        }
    }
}

impl std::fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 实体动作
///
/// `Request` 内建按实体类别分发的离散动作；
/// 宿主忽略无法识别的（类别, 动作）组合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityAction {
    Lock,
    Unlock,
    Enable,
    Disable,
    Destroy,
    DestroyWhenIdle,
    /// 启动/重启线程
    Start,
    /// 恢复挂起的线程
    Resume,
    /// 暂停线程
    Pause,
    /// 停止线程
    Stop,
    SetAdditiveBlend,
    SetReverseSubtractiveBlend,
    SetMultiplicativeBlend,
    EnableFiltering,
}

impl EntityAction {
    /// 从脚本里的动作名解析（不区分大小写）
    pub fn from_name(name: &str) -> Option<EntityAction> {
        let action = match name.to_ascii_lowercase().as_str() {
            "lock" => Self::Lock,
            "unlock" => Self::Unlock,
            "enable" => Self::Enable,
            "disable" => Self::Disable,
            "destroy" => Self::Destroy,
            "destroywhenidle" => Self::DestroyWhenIdle,
            "start" => Self::Start,
            "resume" => Self::Resume,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "additiveblend" => Self::SetAdditiveBlend,
            "subtractiveblend" => Self::SetReverseSubtractiveBlend,
            "multiplicativeblend" => Self::SetMultiplicativeBlend,
            "smoothing" => Self::EnableFiltering,
            _ => return None,
        };
        Some(action)
    }

    /// 是否是破坏性动作（对锁定实体跳过）
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Destroy | Self::DestroyWhenIdle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_sigil_is_stripped() {
        assert_eq!(EntityPath::new("@鸟01").as_str(), "鸟01");
        assert_eq!(EntityPath::new("鸟01").as_str(), "鸟01");
        assert_eq!(EntityQuery::new("@鸟*").as_str(), "鸟*");
    }

    #[test]
    fn test_wildcard_detection_only_inspects_last_char() {
        assert!(EntityQuery::new("a*").is_wildcard());
        assert!(!EntityQuery::new("a").is_wildcard());
        // 别名记号不影响通配判定
        assert!(EntityQuery::new("@a*").is_wildcard());
        // 中间的 * 不构成通配
        assert!(!EntityQuery::new("a*b").is_wildcard());
    }

    #[test]
    fn test_exact_match() {
        let query = EntityQuery::new("bg0");
        assert!(query.matches("bg0"));
        assert!(!query.matches("bg01"));
        assert!(!query.matches("bg"));
    }

    #[test]
    fn test_wildcard_match() {
        let query = EntityQuery::new("a*");
        assert!(query.matches("a1"));
        assert!(query.matches("a2"));
        assert!(query.matches("a"));
        assert!(!query.matches("b1"));
    }

    #[test]
    fn test_action_from_name() {
        assert_eq!(EntityAction::from_name("Lock"), Some(EntityAction::Lock));
        assert_eq!(EntityAction::from_name("START"), Some(EntityAction::Start));
        assert_eq!(
            EntityAction::from_name("AdditiveBlend"),
            Some(EntityAction::SetAdditiveBlend)
        );
        assert_eq!(EntityAction::from_name("no-such-action"), None);
    }

    #[test]
    fn test_destructive_actions() {
        assert!(EntityAction::Destroy.is_destructive());
        assert!(EntityAction::DestroyWhenIdle.is_destructive());
        assert!(!EntityAction::Lock.is_destructive());
        assert!(!EntityAction::Stop.is_destructive());
    }
}
