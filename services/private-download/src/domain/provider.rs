//! 访问决策 provider
//!
//! 宿主在启动 (或重新加载配置) 时把每个实现注册进聚合器。

use std::sync::Arc;

use async_trait::async_trait;
use pd_common::{ProviderId, ResourcePath};
use pd_errors::{AppError, AppResult};

use super::verdict::Verdict;

/// 决定某个私有文件能否被当前请求访问
///
/// 不负责该文件时返回 `Verdict::Abstain`。返回错误会被聚合器记录为故障，
/// 并按弃权处理。
#[async_trait]
pub trait AccessProvider: Send + Sync {
    async fn decide(&self, path: &ResourcePath) -> AppResult<Verdict>;
}

/// 已注册的 provider
#[derive(Clone)]
pub struct RegisteredProvider {
    pub id: ProviderId,
    pub provider: Arc<dyn AccessProvider>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// 闭包形式的 provider
///
/// 闭包在 blocking 线程池中执行，可以同步阻塞 (例如查询数据库)。
pub struct FnProvider<F> {
    decide: Arc<F>,
}

impl<F> FnProvider<F>
where
    F: Fn(&ResourcePath) -> AppResult<Verdict> + Send + Sync + 'static,
{
    pub fn new(decide: F) -> Self {
        Self {
            decide: Arc::new(decide),
        }
    }
}

#[async_trait]
impl<F> AccessProvider for FnProvider<F>
where
    F: Fn(&ResourcePath) -> AppResult<Verdict> + Send + Sync + 'static,
{
    async fn decide(&self, path: &ResourcePath) -> AppResult<Verdict> {
        let decide = Arc::clone(&self.decide);
        let path = path.clone();

        match tokio::task::spawn_blocking(move || decide(&path)).await {
            Ok(result) => result,
            // 闭包 panic 继续向上传播，由聚合器记为 Panicked
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(AppError::provider_fault(e.to_string())),
        }
    }
}

/// 把 hook 风格的函数 (`Some(true)` / `Some(false)` / `None`) 包装成 provider
///
/// hook 收到的是相对于私有目录的路径字符串。
pub fn hook_provider<H>(
    hook: H,
) -> FnProvider<impl Fn(&ResourcePath) -> AppResult<Verdict> + Send + Sync + 'static>
where
    H: Fn(&str) -> Option<bool> + Send + Sync + 'static,
{
    FnProvider::new(move |path: &ResourcePath| Ok(Verdict::from(hook(path.as_str()))))
}
