//! 工具模块

pub mod logger;

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use shared::util::{new_id, now_millis};
