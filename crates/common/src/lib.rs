//! pd-common - 通用类型和工具库

pub mod path;
pub mod types;

pub use path::*;
pub use types::*;
