//! 通用类型定义

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Provider 标识
///
/// 仅用于诊断和日志，不要求唯一
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_display() {
        let id = ProviderId::new("forbidden_substring");
        assert_eq!(id.to_string(), "forbidden_substring");
        assert_eq!(id, ProviderId::from("forbidden_substring"));
    }

    #[test]
    fn test_provider_id_serializes_as_plain_string() {
        let id = ProviderId::from("rules");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"rules\"");
    }
}
