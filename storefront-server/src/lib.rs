//! Storefront Server - 订单核心服务
//!
//! # 架构概述
//!
//! 本模块是 Storefront 订单核心的主入口，提供以下核心功能：
//!
//! - **订单** (`orders`): 结账、状态机、定价快照
//! - **库存** (`inventory`): 预留/提交/释放的原子库存账本
//! - **优惠券** (`coupons`): 校验与折扣计算引擎
//! - **支付** (`payments`): 托管网关跳转 + 回调验签 + COD
//! - **通知** (`notify`): 尽力而为的事件通知
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! storefront-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── db/            # 嵌入式 SurrealDB 与仓储层
//! ├── orders/        # 订单服务与金额计算
//! ├── inventory/     # 库存账本
//! ├── coupons/       # 优惠券引擎
//! ├── payments/      # 支付网关与回调
//! ├── notify/        # 通知服务
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 工具函数
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod coupons;
pub mod db;
pub mod inventory;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use coupons::CouponEngine;
pub use inventory::InventoryLedger;
pub use notify::NotificationService;
pub use orders::OrderService;
pub use payments::{GatewayRegistry, PaymentService};

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
   _____ __                  ____                 __
  / ___// /_____  ________  / __/________  ____  / /_
  \__ \/ __/ __ \/ ___/ _ \/ /_/ ___/ __ \/ __ \/ __/
 ___/ / /_/ /_/ / /  /  __/ __/ /  / /_/ / / / / /_
/____/\__/\____/_/   \___/_/ /_/   \____/_/ /_/\__/
    "#
    );
}

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
    Ok(())
}
