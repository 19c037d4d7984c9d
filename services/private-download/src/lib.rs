//! 私有文件下载访问控制
//!
//! 多个 provider 对同一路径给出 允许 / 拒绝 / 弃权，
//! 聚合器按优先级策略合成最终结论，无人表态时拒绝。

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod runtime;

pub use application::AccessAggregator;
pub use domain::{AccessDecision, AccessProvider, PriorityPolicy, Verdict};
