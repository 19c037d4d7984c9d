//! 禁止子串 provider
//!
//! 路径中包含任一配置子串时拒绝访问，否则不表态。

use async_trait::async_trait;
use pd_common::ResourcePath;
use pd_errors::AppResult;

use crate::domain::{AccessProvider, Verdict};

#[derive(Debug, Clone)]
pub struct ForbiddenSubstringProvider {
    substrings: Vec<String>,
}

impl ForbiddenSubstringProvider {
    /// 空字符串会匹配所有路径，这里直接丢弃
    pub fn new<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            substrings: substrings
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.substrings.is_empty()
    }
}

#[async_trait]
impl AccessProvider for ForbiddenSubstringProvider {
    async fn decide(&self, path: &ResourcePath) -> AppResult<Verdict> {
        let forbidden = self
            .substrings
            .iter()
            .any(|needle| path.as_str().contains(needle.as_str()));

        Ok(if forbidden { Verdict::Deny } else { Verdict::Abstain })
    }
}
