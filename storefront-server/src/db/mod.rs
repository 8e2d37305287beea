//! Database Module
//!
//! 嵌入式 SurrealDB 连接与表结构定义

pub mod repository;

use shared::error::AppError;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

/// 启动时应用的表结构
///
/// 业务键唯一索引承担约束职责：重复写入在存储层失败，
/// 不依赖进程内检查。`orders` 表名复数形式避开 SurrealQL 关键字。
const SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS product SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_product_id ON TABLE product COLUMNS product_id UNIQUE;

    DEFINE TABLE IF NOT EXISTS inventory SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_inventory_product ON TABLE inventory COLUMNS product_id UNIQUE;

    DEFINE TABLE IF NOT EXISTS coupon SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_coupon_code ON TABLE coupon COLUMNS code UNIQUE;

    DEFINE TABLE IF NOT EXISTS orders SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_orders_order_id ON TABLE orders COLUMNS order_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_orders_user ON TABLE orders COLUMNS user_id;

    DEFINE TABLE IF NOT EXISTS payment SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_payment_id ON TABLE payment COLUMNS payment_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_payment_order ON TABLE payment COLUMNS order_id;

    DEFINE TABLE IF NOT EXISTS notification SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_notification_id ON TABLE notification COLUMNS notification_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_notification_dedup ON TABLE notification COLUMNS dedup_key UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_notification_recipient ON TABLE notification COLUMNS recipient;
"#;

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Create a new database service backed by RocksDB at `db_path`
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
        let service = Self::init(db).await?;
        tracing::info!("Database connection established (SurrealDB RocksDB at {db_path})");
        Ok(service)
    }

    /// In-memory database (tests)
    pub async fn memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open in-memory database: {e}")))?;
        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns("storefront")
            .use_db("core")
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        db.query(SCHEMA)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply schema: {e}")))?
            .check()
            .map_err(|e| AppError::database(format!("Schema statement failed: {e}")))?;

        tracing::info!("Database schema applied");
        Ok(Self { db })
    }
}
