//! 优先级策略
//!
//! 多个 provider 意见冲突时，由管理员选定的策略决定最终结果。

use pd_common::ProviderId;
use pd_errors::AppError;
use serde::{Deserialize, Serialize};

use super::verdict::Verdict;

/// 冲突解决策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityPolicy {
    /// 任一 provider 允许即允许
    AllowOverridesDeny,
    /// 任一 provider 拒绝即拒绝
    #[default]
    DenyOverridesAllow,
    /// 按注册顺序第一个表态的 provider 说了算
    FirstDeciderWins,
}

/// 策略解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub allowed: bool,
    /// 决定最终结果的 provider；全部弃权时为 None
    pub deciding_provider: Option<ProviderId>,
}

impl Resolution {
    fn allow(provider: &ProviderId) -> Self {
        Self {
            allowed: true,
            deciding_provider: Some(provider.clone()),
        }
    }

    fn deny(provider: Option<&ProviderId>) -> Self {
        Self {
            allowed: false,
            deciding_provider: provider.cloned(),
        }
    }

    /// 无人表态时的默认拒绝
    fn fail_closed() -> Self {
        Self::deny(None)
    }
}

impl PriorityPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityPolicy::AllowOverridesDeny => "allow_overrides_deny",
            PriorityPolicy::DenyOverridesAllow => "deny_overrides_allow",
            PriorityPolicy::FirstDeciderWins => "first_decider_wins",
        }
    }

    /// 解析按注册顺序排列的裁决序列
    ///
    /// 弃权项直接跳过；没有任何表态时拒绝。
    pub fn resolve(&self, verdicts: &[(ProviderId, Verdict)]) -> Resolution {
        let first = |target: Verdict| {
            verdicts
                .iter()
                .find(|(_, verdict)| *verdict == target)
                .map(|(id, _)| id)
        };

        match self {
            PriorityPolicy::AllowOverridesDeny => match first(Verdict::Allow) {
                Some(id) => Resolution::allow(id),
                None => Resolution::deny(first(Verdict::Deny)),
            },
            PriorityPolicy::DenyOverridesAllow => match first(Verdict::Deny) {
                Some(id) => Resolution::deny(Some(id)),
                None => match first(Verdict::Allow) {
                    Some(id) => Resolution::allow(id),
                    None => Resolution::fail_closed(),
                },
            },
            PriorityPolicy::FirstDeciderWins => verdicts
                .iter()
                .find(|(_, verdict)| !verdict.is_abstain())
                .map(|(id, verdict)| match verdict {
                    Verdict::Allow => Resolution::allow(id),
                    _ => Resolution::deny(Some(id)),
                })
                .unwrap_or_else(Resolution::fail_closed),
        }
    }
}

impl std::fmt::Display for PriorityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriorityPolicy {
    type Err = AppError;

    /// 额外接受 "allow" / "deny" 简写 (对应后台的 Allow/Deny priority 选项)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow_overrides_deny" | "allow" => Ok(PriorityPolicy::AllowOverridesDeny),
            "deny_overrides_allow" | "deny" => Ok(PriorityPolicy::DenyOverridesAllow),
            "first_decider_wins" => Ok(PriorityPolicy::FirstDeciderWins),
            _ => Err(AppError::configuration(format!(
                "Unknown priority policy: {}",
                s
            ))),
        }
    }
}
