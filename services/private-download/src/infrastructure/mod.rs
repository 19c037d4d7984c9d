//! 基础设施层

pub mod providers;
pub mod registry;

pub use providers::{ForbiddenSubstringProvider, PathRule, PathRuleProvider};
pub use registry::{configure, register_configured_providers, reload};
