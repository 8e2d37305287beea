//! Repository Module
//!
//! Provides CRUD operations for SurrealDB tables.
//!
//! 并发约定：所有会竞争的写入都走带守卫的单条 `UPDATE ... WHERE <guard>`
//! 或 `BEGIN TRANSACTION ... COMMIT` 块；守卫不满足时更新零行，
//! 调用方据此区分冲突与缺失，仓储层绝不做读-改-写。

pub mod coupon;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;

// Re-exports
pub use coupon::CouponRepository;
pub use inventory::InventoryRepository;
pub use notification::NotificationRepository;
pub use order::{Compensation, OrderRepository, TransitionFields};
pub use payment::PaymentRepository;
pub use product::ProductRepository;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl RepoError {
    /// Whether the underlying failure is a unique-index violation
    pub fn is_duplicate_violation(msg: &str) -> bool {
        let msg = msg.to_lowercase();
        msg.contains("unique") || msg.contains("already exists") || msg.contains("duplicate")
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}
