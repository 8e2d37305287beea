use thiserror::Error;

/// 服务器启动/运行期错误
///
/// 请求级错误走 `shared::AppError`，这里只覆盖进程级故障。
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("数据库初始化失败: {0}")]
    Database(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误")]
    Internal(#[from] anyhow::Error),
}

/// 服务器层 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
