//! 内置 provider

pub mod forbidden;
pub mod rules;

pub use forbidden::ForbiddenSubstringProvider;
pub use rules::{PathPattern, PathRule, PathRuleProvider};
