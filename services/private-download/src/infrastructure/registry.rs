//! 根据配置装配聚合器

use std::time::Duration;

use pd_config::AccessConfig;
use pd_errors::{AppError, AppResult};
use tracing::{info, warn};

use crate::application::AccessAggregator;
use crate::domain::PriorityPolicy;
use crate::infrastructure::providers::{ForbiddenSubstringProvider, PathRuleProvider};

pub const PATH_RULES_PROVIDER: &str = "path_rules";
pub const FORBIDDEN_SUBSTRING_PROVIDER: &str = "forbidden_substring";

/// 在注册阶段写入策略、超时和内置 provider
///
/// 所有配置先解析完毕再写入，解析失败时聚合器保持原样。
pub fn register_configured_providers(
    aggregator: &AccessAggregator,
    config: &AccessConfig,
) -> AppResult<()> {
    let policy: PriorityPolicy = config.priority.parse()?;
    if config.provider_timeout_ms == 0 {
        return Err(AppError::configuration(
            "provider_timeout_ms must be greater than zero",
        ));
    }
    let timeout = Duration::from_millis(config.provider_timeout_ms);
    let rules = PathRuleProvider::from_config(&config.rules)?;
    let forbidden = ForbiddenSubstringProvider::new(config.forbidden_substrings.iter().cloned());

    aggregator.set_policy(policy)?;
    aggregator.set_provider_timeout(timeout)?;

    if !rules.is_empty() {
        aggregator.register(PATH_RULES_PROVIDER, rules)?;
    }
    if !forbidden.is_empty() {
        aggregator.register(FORBIDDEN_SUBSTRING_PROVIDER, forbidden)?;
    }

    Ok(())
}

/// 首次装配并封存
pub fn configure(aggregator: &AccessAggregator, config: &AccessConfig) -> AppResult<()> {
    register_configured_providers(aggregator, config)?;
    aggregator.seal()?;

    info!(
        providers = aggregator.provider_count(),
        policy = %config.priority,
        "Access aggregator configured"
    );
    Ok(())
}

/// 用新配置替换当前快照
///
/// 替换期间旧快照继续服务；失败时丢弃新注册内容。
pub fn reload(aggregator: &AccessAggregator, config: &AccessConfig) -> AppResult<()> {
    aggregator.begin_reload()?;

    if let Err(e) = register_configured_providers(aggregator, config) {
        warn!(error = %e, "Access configuration reload failed, keeping previous providers");
        aggregator.abort_reload()?;
        return Err(e);
    }

    aggregator.seal()?;
    info!(
        providers = aggregator.provider_count(),
        policy = %config.priority,
        "Access configuration reloaded"
    );
    Ok(())
}
