//! 领域模型: 裁决、优先级策略、provider 契约

pub mod decision;
pub mod policy;
pub mod provider;
pub mod verdict;

pub use decision::{AccessDecision, FaultKind, ProviderFault};
pub use policy::{PriorityPolicy, Resolution};
pub use provider::{AccessProvider, FnProvider, RegisteredProvider, hook_provider};
pub use verdict::Verdict;
