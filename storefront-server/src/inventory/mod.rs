//! 库存模块
//!
//! 预留/提交/释放三段式库存流：下单预留，确认提交出库，
//! 取消或支付失败释放。所有写入都是存储层原子条件更新。

mod ledger;

pub use ledger::InventoryLedger;
