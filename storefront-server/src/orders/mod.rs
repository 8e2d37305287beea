//! 订单模块
//!
//! 状态机转移表在 `shared::models::order::OrderStatus` 上；
//! 本模块提供金额计算和编排服务 (创建、流转、取消、清除)。

pub mod money;
mod service;

pub use service::{
    CreateOrderRequest, CreateOrderResponse, OrderItemRequest, OrderListQuery, OrderService,
    TransitionRequest,
};
