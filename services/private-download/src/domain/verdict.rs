//! Provider 裁决

use pd_errors::AppError;
use serde::{Deserialize, Serialize};

/// 单个 provider 对一次访问请求的三态意见
///
/// `Abstain` 表示 provider 不负责该文件，既不算允许也不算拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 允许
    Allow,
    /// 拒绝
    Deny,
    /// 弃权
    Abstain,
}

impl Verdict {
    pub fn is_abstain(self) -> bool {
        matches!(self, Verdict::Abstain)
    }

    /// 转回 hook 约定: Some(true) / Some(false) / None
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Verdict::Allow => Some(true),
            Verdict::Deny => Some(false),
            Verdict::Abstain => None,
        }
    }
}

impl From<bool> for Verdict {
    fn from(allowed: bool) -> Self {
        if allowed { Verdict::Allow } else { Verdict::Deny }
    }
}

impl From<Option<bool>> for Verdict {
    fn from(value: Option<bool>) -> Self {
        value.map(Verdict::from).unwrap_or(Verdict::Abstain)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allow => write!(f, "ALLOW"),
            Verdict::Deny => write!(f, "DENY"),
            Verdict::Abstain => write!(f, "ABSTAIN"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALLOW" => Ok(Verdict::Allow),
            "DENY" => Ok(Verdict::Deny),
            "ABSTAIN" => Ok(Verdict::Abstain),
            _ => Err(AppError::configuration(format!("Unknown verdict: {}", s))),
        }
    }
}
