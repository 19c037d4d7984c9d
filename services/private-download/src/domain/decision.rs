//! 访问决策结果

use std::time::Duration;

use pd_common::{ProviderId, ResourcePath};
use pd_errors::{AppError, AppResult};

use super::policy::PriorityPolicy;

/// Provider 故障类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// provider 返回了错误
    Error(String),
    /// 超时未返回
    TimedOut(Duration),
    /// provider 内部 panic
    Panicked,
}

impl FaultKind {
    pub fn label(&self) -> &'static str {
        match self {
            FaultKind::Error(_) => "error",
            FaultKind::TimedOut(_) => "timeout",
            FaultKind::Panicked => "panic",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Error(msg) => write!(f, "provider error: {}", msg),
            FaultKind::TimedOut(after) => write!(f, "timed out after {}ms", after.as_millis()),
            FaultKind::Panicked => write!(f, "provider panicked"),
        }
    }
}

/// 单个 provider 的故障记录，按弃权处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFault {
    pub provider: ProviderId,
    pub kind: FaultKind,
}

/// 最终访问决策
#[derive(Debug, Clone)]
pub struct AccessDecision {
    /// 规范化后的请求路径
    pub path: ResourcePath,
    /// 是否允许
    pub allowed: bool,
    /// 决定结果的 provider (诊断用)
    pub deciding_provider: Option<ProviderId>,
    /// 生效的策略
    pub policy: PriorityPolicy,
    /// 本次决策中出现的 provider 故障
    pub faults: Vec<ProviderFault>,
}

impl AccessDecision {
    /// 没有任何 provider 表态，按默认拒绝处理
    pub fn is_fail_closed(&self) -> bool {
        !self.allowed && self.deciding_provider.is_none()
    }

    /// 拒绝时转换为 Forbidden 错误
    pub fn ensure_allowed(&self) -> AppResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::forbidden("access to this file is denied"))
        }
    }
}
