//! 受保护资源路径
//!
//! 所有进入访问决策的路径都必须先解析成 [`ResourcePath`]，
//! 解析后的路径一定是相对路径，且不含 `..` 段。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pd_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// 相对于受保护根目录的规范化路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// 解析并规范化路径
    ///
    /// 规则:
    /// 1. `\` 视为分隔符
    /// 2. 去掉开头的分隔符、空段和 `.` 段
    /// 3. 出现 `..` 段直接拒绝
    /// 4. 拒绝 NUL、盘符前缀 (e.g., `C:`) 和空路径
    /// 5. 结果做 NFC 规范化
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.contains('\0') {
            return Err(AppError::invalid_path("path contains NUL character"));
        }

        let normalized: String = raw.nfc().collect();
        let mut segments: Vec<&str> = Vec::new();

        for segment in normalized.split(['/', '\\']) {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(AppError::invalid_path(format!(
                        "path traversal segment in '{}'",
                        raw
                    )));
                }
                s => segments.push(s),
            }
        }

        let Some(first) = segments.first() else {
            return Err(AppError::invalid_path("path is empty"));
        };

        if is_drive_prefix(first) {
            return Err(AppError::invalid_path(format!(
                "path '{}' escapes the protected root",
                raw
            )));
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 路径段
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// 最后一段 (文件名)
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// 拼接到受保护根目录下
    pub fn resolve_under(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ResourcePath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}
