//! 访问决策聚合器
//!
//! 生命周期分两个阶段:
//! 1. 注册阶段: register / set_policy / set_provider_timeout
//! 2. 服务阶段 (seal 之后): 注册结果变为只读快照，decide 可被任意多个请求并发调用
//!
//! 重新加载配置时通过 begin_reload 打开新的注册阶段，
//! 旧快照继续服务，直到新的注册结果 seal。

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use futures::future::join_all;
use metrics::{counter, histogram};
use pd_common::{ProviderId, ResourcePath};
use pd_errors::{AppError, AppResult};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    AccessDecision, AccessProvider, FaultKind, FnProvider, PriorityPolicy, ProviderFault,
    RegisteredProvider, Verdict,
};

/// 默认单个 provider 超时时间
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
struct Registration {
    providers: Vec<RegisteredProvider>,
    policy: PriorityPolicy,
    provider_timeout: Duration,
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            policy: PriorityPolicy::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    /// 当前服务中的快照
    serving: Option<Arc<Registration>>,
    /// 正在进行的注册阶段
    pending: Option<Registration>,
}

/// 访问决策聚合器
pub struct AccessAggregator {
    state: RwLock<State>,
}

impl AccessAggregator {
    /// 创建聚合器，处于注册阶段
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                serving: None,
                pending: Some(Registration::default()),
            }),
        }
    }

    fn read_state(&self) -> AppResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| AppError::internal("aggregator state lock poisoned"))
    }

    fn write_state(&self) -> AppResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| AppError::internal("aggregator state lock poisoned"))
    }

    fn with_pending<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut Registration) -> T,
    ) -> AppResult<T> {
        let mut state = self.write_state()?;
        match state.pending.as_mut() {
            Some(pending) => Ok(f(pending)),
            None => Err(AppError::configuration(format!(
                "{} is only allowed during the registration phase",
                operation
            ))),
        }
    }

    /// 追加一个 provider，按注册顺序查询；允许重名
    pub fn register<P>(&self, id: impl Into<ProviderId>, provider: P) -> AppResult<()>
    where
        P: AccessProvider + 'static,
    {
        self.register_shared(id, Arc::new(provider))
    }

    pub fn register_shared(
        &self,
        id: impl Into<ProviderId>,
        provider: Arc<dyn AccessProvider>,
    ) -> AppResult<()> {
        let id = id.into();
        self.with_pending("register", |pending| {
            debug!(
                provider = %id,
                position = pending.providers.len(),
                "Registering access provider"
            );
            pending.providers.push(RegisteredProvider { id, provider });
        })
    }

    /// 注册闭包形式的 provider
    pub fn register_fn<F>(&self, id: impl Into<ProviderId>, decide: F) -> AppResult<()>
    where
        F: Fn(&ResourcePath) -> AppResult<Verdict> + Send + Sync + 'static,
    {
        self.register(id, FnProvider::new(decide))
    }

    pub fn set_policy(&self, policy: PriorityPolicy) -> AppResult<()> {
        self.with_pending("set_policy", |pending| pending.policy = policy)
    }

    pub fn set_provider_timeout(&self, timeout: Duration) -> AppResult<()> {
        if timeout.is_zero() {
            return Err(AppError::configuration(
                "provider timeout must be greater than zero",
            ));
        }
        self.with_pending("set_provider_timeout", |pending| {
            pending.provider_timeout = timeout
        })
    }

    /// 结束注册阶段，发布只读快照
    pub fn seal(&self) -> AppResult<()> {
        let mut state = self.write_state()?;
        let Some(registration) = state.pending.take() else {
            return Err(AppError::configuration(
                "seal called without an open registration phase",
            ));
        };

        info!(
            providers = registration.providers.len(),
            policy = %registration.policy,
            timeout_ms = registration.provider_timeout.as_millis() as u64,
            "Access aggregator sealed"
        );
        state.serving = Some(Arc::new(registration));
        Ok(())
    }

    /// 重新打开注册阶段；provider 列表清空，策略和超时沿用当前值
    pub fn begin_reload(&self) -> AppResult<()> {
        let mut state = self.write_state()?;
        if state.pending.is_some() {
            return Err(AppError::configuration(
                "a registration phase is already open",
            ));
        }

        let next = match &state.serving {
            Some(current) => Registration {
                providers: Vec::new(),
                policy: current.policy,
                provider_timeout: current.provider_timeout,
            },
            None => Registration::default(),
        };
        state.pending = Some(next);
        info!("Access aggregator reopened for registration");
        Ok(())
    }

    /// 放弃正在进行的重新加载，继续使用旧快照
    pub fn abort_reload(&self) -> AppResult<()> {
        let mut state = self.write_state()?;
        if state.serving.is_none() {
            return Err(AppError::configuration(
                "no sealed registration to fall back to",
            ));
        }
        if state.pending.take().is_none() {
            return Err(AppError::configuration("no reload in progress"));
        }
        warn!("Access aggregator reload aborted, keeping previous providers");
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.read_state()
            .map(|state| state.serving.is_some())
            .unwrap_or(false)
    }

    pub fn is_registering(&self) -> bool {
        self.read_state()
            .map(|state| state.pending.is_some())
            .unwrap_or(false)
    }

    /// 服务中快照的 provider 数量
    pub fn provider_count(&self) -> usize {
        self.read_state()
            .ok()
            .and_then(|state| state.serving.as_ref().map(|s| s.providers.len()))
            .unwrap_or(0)
    }

    /// 服务中快照的 provider 标识，按注册顺序
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.read_state()
            .ok()
            .and_then(|state| {
                state
                    .serving
                    .as_ref()
                    .map(|s| s.providers.iter().map(|p| p.id.clone()).collect())
            })
            .unwrap_or_default()
    }

    pub fn policy(&self) -> Option<PriorityPolicy> {
        self.read_state()
            .ok()
            .and_then(|state| state.serving.as_ref().map(|s| s.policy))
    }

    fn snapshot(&self) -> AppResult<Arc<Registration>> {
        self.read_state()?
            .serving
            .clone()
            .ok_or_else(|| AppError::configuration("access aggregator has not been sealed"))
    }

    /// 对原始路径做访问决策
    pub async fn decide(&self, raw_path: &str) -> AppResult<AccessDecision> {
        self.decide_with_cancel(raw_path, &CancellationToken::new())
            .await
    }

    /// 对原始路径做访问决策；`cancel` 触发时放弃进行中的查询
    pub async fn decide_with_cancel(
        &self,
        raw_path: &str,
        cancel: &CancellationToken,
    ) -> AppResult<AccessDecision> {
        let start = Instant::now();
        let result = match ResourcePath::parse(raw_path) {
            Ok(path) => self.evaluate(path, cancel).await,
            Err(e) => {
                debug!(path = raw_path, error = %e, "Rejected access request path");
                Err(e)
            }
        };
        record_metrics(&result, start);
        result
    }

    /// 对已解析的路径做访问决策
    pub async fn decide_path(
        &self,
        path: &ResourcePath,
        cancel: &CancellationToken,
    ) -> AppResult<AccessDecision> {
        let start = Instant::now();
        let result = self.evaluate(path.clone(), cancel).await;
        record_metrics(&result, start);
        result
    }

    /// 内部决策逻辑
    ///
    /// 算法:
    /// 1. 取当前快照
    /// 2. 并发查询所有 provider，每个 provider 单独限时
    /// 3. 出错、超时、panic 的 provider 记为故障并按弃权处理
    /// 4. 按优先级策略解析，无人表态时拒绝
    async fn evaluate(
        &self,
        path: ResourcePath,
        cancel: &CancellationToken,
    ) -> AppResult<AccessDecision> {
        let snapshot = self.snapshot()?;

        let queries = snapshot
            .providers
            .iter()
            .map(|entry| query_provider(entry, &path, snapshot.provider_timeout));

        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path = %path, "Access decision cancelled");
                return Err(AppError::cancelled(format!(
                    "access decision for '{}' was cancelled",
                    path
                )));
            }
            outcomes = join_all(queries) => outcomes,
        };

        let mut verdicts = Vec::with_capacity(outcomes.len());
        let mut faults = Vec::new();

        for (entry, outcome) in snapshot.providers.iter().zip(outcomes) {
            match outcome {
                Ok(verdict) => verdicts.push((entry.id.clone(), verdict)),
                Err(kind) => {
                    warn!(
                        provider = %entry.id,
                        path = %path,
                        fault = %kind,
                        "Access provider fault, treating as abstain"
                    );
                    counter!(
                        "private_download_provider_faults_total",
                        "provider" => entry.id.to_string(),
                        "kind" => kind.label()
                    )
                    .increment(1);
                    verdicts.push((entry.id.clone(), Verdict::Abstain));
                    faults.push(ProviderFault {
                        provider: entry.id.clone(),
                        kind,
                    });
                }
            }
        }

        let resolution = snapshot.policy.resolve(&verdicts);

        debug!(
            path = %path,
            policy = %snapshot.policy,
            allowed = resolution.allowed,
            deciding_provider = ?resolution.deciding_provider,
            faults = faults.len(),
            "Access decision resolved"
        );

        Ok(AccessDecision {
            path,
            allowed: resolution.allowed,
            deciding_provider: resolution.deciding_provider,
            policy: snapshot.policy,
            faults,
        })
    }
}

impl Default for AccessAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// 在独立任务中查询单个 provider
///
/// 超时或调用方取消时任务会被 abort。
async fn query_provider(
    entry: &RegisteredProvider,
    path: &ResourcePath,
    timeout: Duration,
) -> Result<Verdict, FaultKind> {
    let provider = Arc::clone(&entry.provider);
    let path = path.clone();
    let task = AbortOnDropHandle::new(tokio::spawn(async move { provider.decide(&path).await }));

    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(FaultKind::TimedOut(timeout)),
        Ok(Err(join_err)) if join_err.is_panic() => Err(FaultKind::Panicked),
        Ok(Err(join_err)) => Err(FaultKind::Error(join_err.to_string())),
        Ok(Ok(Err(e))) => Err(FaultKind::Error(e.to_string())),
        Ok(Ok(Ok(verdict))) => Ok(verdict),
    }
}

fn record_metrics(result: &AppResult<AccessDecision>, start: Instant) {
    match result {
        Ok(decision) => {
            counter!(
                "private_download_decisions_total",
                "policy" => decision.policy.as_str(),
                "allowed" => decision.allowed.to_string()
            )
            .increment(1);
        }
        Err(e) => {
            counter!("private_download_decision_errors_total", "kind" => e.kind()).increment(1);
        }
    }

    histogram!("private_download_decision_duration_ms")
        .record(start.elapsed().as_secs_f64() * 1000.0);
}
