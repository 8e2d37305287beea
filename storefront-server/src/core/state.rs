use std::path::PathBuf;
use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::core::Config;
use crate::db::DbService;
use crate::notify::NotificationService;
use crate::payments::GatewayRegistry;

/// 服务器状态 - 持有所有服务的单例引用
///
/// ServerState 是订单核心的顶层数据结构，持有所有服务的共享引用。
/// 使用 Arc 实现浅拷贝，克隆成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | Surreal<Db> | 嵌入式数据库 |
/// | gateways | Arc<GatewayRegistry> | 支付网关注册表 |
/// | notifier | NotificationService | 通知服务 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 嵌入式数据库 (SurrealDB)
    pub db: Surreal<Db>,
    /// 支付网关注册表 (按支付方式解析能力实现)
    pub gateways: Arc<GatewayRegistry>,
    /// 通知服务
    pub notifier: NotificationService,
}

impl ServerState {
    /// 创建服务器状态 (手动构造)
    ///
    /// 通常使用 [`Self::initialize()`] 方法代替
    pub fn new(
        config: Config,
        db: Surreal<Db>,
        gateways: Arc<GatewayRegistry>,
        notifier: NotificationService,
    ) -> Self {
        Self {
            config,
            db,
            gateways,
            notifier,
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/storefront.db, 含表结构定义)
    /// 3. 支付网关注册表、通知服务
    ///
    /// # Panics
    ///
    /// 数据库初始化失败时 panic
    pub async fn initialize(config: &Config) -> Self {
        // 0. Ensure work_dir structure exists
        let db_dir = PathBuf::from(&config.work_dir).join("database");
        std::fs::create_dir_all(&db_dir).expect("Failed to create work directory structure");

        // 1. Initialize DB
        let db_path = config.database_path();
        let db_service = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        Self::with_db(config.clone(), db_service.db)
    }

    /// 用已有数据库连接构造状态 (测试场景用内存引擎)
    pub fn with_db(config: Config, db: Surreal<Db>) -> Self {
        let gateways = Arc::new(GatewayRegistry::new(config.gateway.clone()));
        let notifier = NotificationService::new(
            db.clone(),
            config.notify_timeout_ms,
            config.notify_dedup_window_ms,
        );
        Self::new(config, db, gateways, notifier)
    }

    /// 获取数据库实例
    pub fn get_db(&self) -> Surreal<Db> {
        self.db.clone()
    }

    /// 获取工作目录
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }
}
