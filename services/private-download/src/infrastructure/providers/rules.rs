//! 基于配置的路径规则 provider

use async_trait::async_trait;
use pd_common::ResourcePath;
use pd_config::PathRuleConfig;
use pd_errors::{AppError, AppResult};
use tracing::debug;

use crate::domain::{AccessProvider, Verdict};

/// 路径匹配模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `*`
    Any,
    /// `prefix*`
    Prefix(String),
    /// 精确匹配
    Exact(String),
}

impl PathPattern {
    /// 解析规则模式
    ///
    /// 模式文本按 `ResourcePath` 的规则规范化 (NFC、`\` 分隔符、空段和 `.` 段)，
    /// 与请求路径在同一形式下比较。`..` 段视为配置错误。
    pub fn parse(pattern: &str) -> AppResult<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(AppError::configuration("path rule pattern cannot be empty"));
        }

        match pattern.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(only_trailing_wildcard(pattern)),
            Some(prefix) => Ok(normalize_prefix(prefix, pattern)?
                .map_or(Self::Any, Self::Prefix)),
            None if pattern.contains('*') => Err(only_trailing_wildcard(pattern)),
            None => Ok(Self::Exact(normalize(pattern, pattern)?.into())),
        }
    }

    pub fn matches(&self, path: &ResourcePath) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => path.as_str().starts_with(prefix.as_str()),
            Self::Exact(exact) => path.as_str() == exact,
        }
    }
}

fn only_trailing_wildcard(pattern: &str) -> AppError {
    AppError::configuration(format!(
        "only a trailing '*' is supported in path rule '{}'",
        pattern
    ))
}

fn normalize(text: &str, pattern: &str) -> AppResult<ResourcePath> {
    ResourcePath::parse(text).map_err(|e| {
        AppError::configuration(format!("invalid path rule '{}': {}", pattern, e))
    })
}

/// 规范化 `prefix*` 的前缀部分；前缀为空 (如 `./*`) 时返回 `None`
fn normalize_prefix(prefix: &str, pattern: &str) -> AppResult<Option<String>> {
    let (dir, partial) = match prefix.rfind(['/', '\\']) {
        Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
        None => ("", prefix),
    };

    let dir_is_empty = dir.split(['/', '\\']).all(|seg| seg.is_empty() || seg == ".");
    let mut normalized = if dir_is_empty {
        String::new()
    } else {
        let mut dir = normalize(dir, pattern)?.as_str().to_string();
        dir.push('/');
        dir
    };

    match partial {
        "" => {}
        "." | ".." => normalized.push_str(partial),
        name => normalized.push_str(normalize(name, pattern)?.as_str()),
    }

    Ok((!normalized.is_empty()).then_some(normalized))
}

/// 单条规则
#[derive(Debug, Clone)]
pub struct PathRule {
    pub name: String,
    pub effect: Verdict,
    pub pattern: PathPattern,
}

impl PathRule {
    pub fn new(name: impl Into<String>, effect: Verdict, pattern: &str) -> AppResult<Self> {
        let name = name.into();
        if effect.is_abstain() {
            return Err(AppError::configuration(format!(
                "path rule '{}' must allow or deny",
                name
            )));
        }
        Ok(Self {
            name,
            effect,
            pattern: PathPattern::parse(pattern)?,
        })
    }

    pub fn from_config(config: &PathRuleConfig) -> AppResult<Self> {
        Self::new(config.name.clone(), config.effect.parse()?, &config.pattern)
    }
}

/// 按顺序匹配规则，第一条命中的规则决定结果；无命中则弃权
#[derive(Debug, Clone)]
pub struct PathRuleProvider {
    rules: Vec<PathRule>,
}

impl PathRuleProvider {
    pub fn new(rules: Vec<PathRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(configs: &[PathRuleConfig]) -> AppResult<Self> {
        let rules = configs
            .iter()
            .map(PathRule::from_config)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn evaluate(&self, path: &ResourcePath) -> Verdict {
        match self.rules.iter().find(|rule| rule.pattern.matches(path)) {
            Some(rule) => {
                debug!(rule = %rule.name, path = %path, effect = %rule.effect, "Path rule matched");
                rule.effect
            }
            None => Verdict::Abstain,
        }
    }
}

#[async_trait]
impl AccessProvider for PathRuleProvider {
    async fn decide(&self, path: &ResourcePath) -> AppResult<Verdict> {
        Ok(self.evaluate(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> ResourcePath {
        ResourcePath::parse(raw).unwrap()
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!(PathPattern::parse("*").unwrap(), PathPattern::Any);
        assert_eq!(
            PathPattern::parse("/docs/*").unwrap(),
            PathPattern::Prefix("docs/".to_string())
        );
        assert_eq!(
            PathPattern::parse("docs/readme.txt").unwrap(),
            PathPattern::Exact("docs/readme.txt".to_string())
        );
        assert!(PathPattern::parse("").is_err());
        assert!(PathPattern::parse("docs/*/x").is_err());
        assert!(PathPattern::parse("*.pdf*").is_err());
    }

    #[test]
    fn test_pattern_normalized_like_request_paths() {
        assert_eq!(
            PathPattern::parse("./internal/*").unwrap(),
            PathPattern::Prefix("internal/".to_string())
        );
        assert_eq!(
            PathPattern::parse("secret\\*").unwrap(),
            PathPattern::Prefix("secret/".to_string())
        );
        assert_eq!(
            PathPattern::parse("docs//./x.txt").unwrap(),
            PathPattern::Exact("docs/x.txt".to_string())
        );
        assert_eq!(
            PathPattern::parse("Cafe\u{0301}/*").unwrap(),
            PathPattern::Prefix("Caf\u{00e9}/".to_string())
        );
        assert_eq!(
            PathPattern::parse("reports//q1*").unwrap(),
            PathPattern::Prefix("reports/q1".to_string())
        );
        assert_eq!(
            PathPattern::parse("docs/.*").unwrap(),
            PathPattern::Prefix("docs/.".to_string())
        );
        assert_eq!(PathPattern::parse("./*").unwrap(), PathPattern::Any);
    }

    #[test]
    fn test_pattern_with_traversal_rejected() {
        assert!(matches!(
            PathPattern::parse("../secret/*"),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            PathPattern::parse("docs/../x.txt"),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_unnormalized_deny_rule_still_matches() {
        let provider = PathRuleProvider::new(vec![
            PathRule::new("deny-internal", Verdict::Deny, "./internal/*").unwrap(),
            PathRule::new("deny-secret", Verdict::Deny, "secret\\*").unwrap(),
            PathRule::new("deny-cafe", Verdict::Deny, "Cafe\u{0301}/*").unwrap(),
            PathRule::new("allow-rest", Verdict::Allow, "*").unwrap(),
        ]);

        assert_eq!(provider.evaluate(&path("internal/x.txt")), Verdict::Deny);
        assert_eq!(provider.evaluate(&path("secret/plan.txt")), Verdict::Deny);
        assert_eq!(provider.evaluate(&path("Caf\u{00e9}/menu.pdf")), Verdict::Deny);
        assert_eq!(provider.evaluate(&path("public/x.txt")), Verdict::Allow);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let provider = PathRuleProvider::new(vec![
            PathRule::new("drafts", Verdict::Deny, "docs/drafts/*").unwrap(),
            PathRule::new("docs", Verdict::Allow, "docs/*").unwrap(),
        ]);

        assert_eq!(provider.evaluate(&path("docs/drafts/x.md")), Verdict::Deny);
        assert_eq!(provider.evaluate(&path("docs/final.md")), Verdict::Allow);
        assert_eq!(provider.evaluate(&path("other/final.md")), Verdict::Abstain);
    }

    #[test]
    fn test_exact_rule() {
        let provider =
            PathRuleProvider::new(vec![PathRule::new("one", Verdict::Allow, "a/b.txt").unwrap()]);
        assert_eq!(provider.evaluate(&path("a/b.txt")), Verdict::Allow);
        assert_eq!(provider.evaluate(&path("a/b.txt.bak")), Verdict::Abstain);
    }

    #[test]
    fn test_abstain_rule_rejected() {
        assert!(PathRule::new("noop", Verdict::Abstain, "*").is_err());
    }

    #[test]
    fn test_from_config() {
        let configs = vec![
            PathRuleConfig {
                name: "public".to_string(),
                effect: "allow".to_string(),
                pattern: "public/*".to_string(),
            },
            PathRuleConfig {
                name: "everything-else".to_string(),
                effect: "DENY".to_string(),
                pattern: "*".to_string(),
            },
        ];
        let provider = PathRuleProvider::from_config(&configs).unwrap();

        assert_eq!(provider.len(), 2);
        assert_eq!(provider.evaluate(&path("public/a.png")), Verdict::Allow);
        assert_eq!(provider.evaluate(&path("private/a.png")), Verdict::Deny);
    }

    #[test]
    fn test_from_config_bad_effect() {
        let configs = vec![PathRuleConfig {
            name: "bad".to_string(),
            effect: "sometimes".to_string(),
            pattern: "*".to_string(),
        }];
        assert!(matches!(
            PathRuleProvider::from_config(&configs),
            Err(AppError::Configuration(_))
        ));
    }
}
