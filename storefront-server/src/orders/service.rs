//! Order Service
//!
//! 创建是全有或全无：落库的订单一定有配套的库存预留，任何一步
//! 失败都会把已做的预留退回去。流转按 `WHERE status = $from`
//! 线性化，取消的库存补偿和状态翻转在同一个存储事务里。

use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    NotificationKind, Order, OrderLineItem, OrderPaymentState, OrderStatus, Payment,
    PaymentMethod, ShippingAddress, StatusStamp, StockState,
};
use shared::util::{new_id, now_millis};
use validator::Validate;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::coupons::CouponEngine;
use crate::db::repository::{
    Compensation, OrderRepository, ProductRepository, RepoError, TransitionFields,
};
use crate::inventory::InventoryLedger;
use crate::notify::{self, NotificationService};
use crate::payments::PaymentService;

use super::money;

// ====== 请求/响应 ======

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1), nested)]
    pub items: Vec<OrderItemRequest>,
    pub coupon_code: Option<String>,
    #[validate(range(min = 0.0))]
    pub shipping_fee: f64,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    pub payment: Option<Payment>,
    /// 在线支付的网关跳转地址
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderListQuery {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ====== 服务 ======

#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    products: ProductRepository,
    ledger: InventoryLedger,
    coupons: CouponEngine,
    payments: PaymentService,
    notifier: NotificationService,
}

impl OrderService {
    pub fn new(state: &ServerState) -> Self {
        Self {
            orders: OrderRepository::new(state.db.clone()),
            products: ProductRepository::new(state.db.clone()),
            ledger: InventoryLedger::new(state.db.clone()),
            coupons: CouponEngine::new(state.db.clone()),
            payments: PaymentService::new(state),
            notifier: state.notifier.clone(),
        }
    }

    /// 结账
    pub async fn create(&self, actor: &Actor, req: CreateOrderRequest) -> AppResult<CreateOrderResponse> {
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;
        money::validate_amount(req.shipping_fee, "shipping_fee")?;
        validate_address(&req.shipping_address)?;

        // 1. 行项目快照 (价格/名称取自当前商品，落单后不再变)
        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let product = self
                .products
                .find_by_product_id(&line.product_id)
                .await
                .map_err(|e| AppError::database(e.to_string()))?
                .ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::ProductNotFound,
                        format!("Product {} not found", line.product_id),
                    )
                })?;
            if !product.is_active {
                return Err(AppError::with_message(
                    ErrorCode::ProductInactive,
                    format!("Product {} is not for sale", product.product_id),
                ));
            }
            items.push(OrderLineItem {
                product_id: product.product_id,
                name: product.name,
                price: product.price,
                quantity: line.quantity,
                image: product.image,
            });
        }

        // 2. 金额
        let subtotal = money::subtotal(&items);
        let product_ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
        let (coupon_code, discount) = match &req.coupon_code {
            Some(code) => {
                let coupon = self.coupons.get(code).await?;
                self.coupons
                    .validate(&coupon, &actor.user_id, subtotal, &product_ids, now_millis())?;
                let discount = self.coupons.calculate_discount(&coupon, subtotal);
                (Some(coupon.code), discount)
            }
            None => (None, 0.0),
        };
        let total = money::order_total(subtotal, discount, req.shipping_fee);

        // 3. 预留库存，部分失败回退已预留的行
        let order_id = new_id();
        let mut reserved: Vec<(String, i64)> = Vec::new();
        for item in &items {
            match self
                .ledger
                .reserve(&item.product_id, item.quantity, &order_id)
                .await
            {
                Ok(_) => reserved.push((item.product_id.clone(), item.quantity)),
                Err(e) => {
                    self.rollback_reservations(&reserved, &order_id).await;
                    return Err(e);
                }
            }
        }

        // 4. 落库
        let now = now_millis();
        let order = Order {
            order_id: order_id.clone(),
            user_id: actor.user_id.clone(),
            items,
            subtotal,
            discount,
            shipping_fee: money::round2(req.shipping_fee),
            total,
            coupon_code: coupon_code.clone(),
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
            payment_state: OrderPaymentState::Pending,
            status: OrderStatus::Pending,
            stock_state: StockState::Reserved,
            status_history: vec![StatusStamp {
                status: OrderStatus::Pending,
                actor: actor.user_id.clone(),
                at: now,
            }],
            note: req.note,
            created_at: now,
            updated_at: now,
        };

        let order = match self.orders.create(order).await {
            Ok(o) => o,
            Err(e) => {
                self.rollback_reservations(&reserved, &order_id).await;
                return Err(AppError::database(e.to_string()));
            }
        };

        // 5. 核销优惠券 (按 order_id 幂等)
        if let Some(code) = &coupon_code
            && let Err(e) = self
                .coupons
                .mark_used(code, &actor.user_id, &order_id, subtotal, &product_ids)
                .await
        {
            self.abort_created_order(&order, &reserved).await;
            return Err(e);
        }

        // 6. 支付
        let (order, payment, redirect_url) = match req.payment_method {
            PaymentMethod::Online => {
                let (payment, redirect_url) = match self.payments.create_for_order(&order).await {
                    Ok(r) => r,
                    Err(e) => {
                        self.abort_created_order(&order, &reserved).await;
                        return Err(e);
                    }
                };
                let order = self
                    .plain_transition(&order, OrderStatus::PaymentPending, "system", TransitionFields::default())
                    .await?
                    .unwrap_or(order);
                (order, Some(payment), redirect_url)
            }
            PaymentMethod::Cod => {
                let (payment, _) = match self.payments.create_for_order(&order).await {
                    Ok(r) => r,
                    Err(e) => {
                        self.abort_created_order(&order, &reserved).await;
                        return Err(e);
                    }
                };
                // 货到付款没有支付回调，下单即确认并提交预留
                let order = self.enter_confirmed(&order, "system").await?;
                self.notify_transition(&order, OrderStatus::Confirmed);
                (order, Some(payment), None)
            }
        };

        self.notifier.dispatch_async(
            order.user_id.clone(),
            NotificationKind::OrderCreated,
            "Order created".into(),
            format!("Order {} was created", order.order_id),
            Some(order.order_id.clone()),
        );

        tracing::info!(order_id = %order.order_id, user_id = %order.user_id, total, "Order created");
        Ok(CreateOrderResponse {
            order,
            payment,
            redirect_url,
        })
    }

    pub async fn get(&self, actor: &Actor, order_id: &str) -> AppResult<Order> {
        let order = self.find(order_id).await?;
        if !actor.is_admin() && order.user_id != actor.user_id {
            return Err(AppError::new(ErrorCode::PermissionDenied));
        }
        Ok(order)
    }

    /// 列表：客户只能看自己的
    pub async fn list(&self, actor: &Actor, query: OrderListQuery) -> AppResult<Vec<Order>> {
        let user_filter = if actor.is_admin() {
            query.user_id
        } else {
            Some(actor.user_id.clone())
        };
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);
        self.orders
            .list(user_filter.as_deref(), query.status, limit, offset)
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }

    /// 状态流转
    ///
    /// 边不合法 → `InvalidTransition`；非管理员只能从
    /// `{PENDING, CONFIRMED}` 取消自己的订单。
    pub async fn transition(
        &self,
        actor: &Actor,
        order_id: &str,
        target: OrderStatus,
        note: Option<String>,
    ) -> AppResult<Order> {
        let order = self.find(order_id).await?;

        if !order.status.can_transition_to(target) {
            return Err(AppError::invalid_transition(
                order.status.as_str(),
                target.as_str(),
            ));
        }

        if !actor.is_admin() {
            if order.user_id != actor.user_id {
                return Err(AppError::new(ErrorCode::PermissionDenied));
            }
            if target != OrderStatus::Cancelled {
                return Err(AppError::with_message(
                    ErrorCode::PermissionDenied,
                    "Customers may only cancel their own orders",
                ));
            }
            if !order.status.is_customer_cancellable() {
                return Err(AppError::with_message(
                    ErrorCode::OrderNotCancellable,
                    format!(
                        "Orders in {} cannot be cancelled by the customer",
                        order.status.as_str()
                    ),
                ));
            }
        }

        let actor_label = if actor.is_admin() { "admin" } else { actor.user_id.as_str() };
        let updated = match target {
            OrderStatus::Cancelled => self.enter_cancelled(&order, actor_label).await?,
            OrderStatus::Confirmed => self.enter_confirmed(&order, actor_label).await?,
            OrderStatus::Pending => self.reenter_pending(&order, actor_label).await?,
            _ => {
                // 货到付款在签收时收款，支付单一并落账
                let cod_settles =
                    target == OrderStatus::Delivered && order.payment_method == PaymentMethod::Cod;
                let mut fields = TransitionFields::default();
                if cod_settles {
                    fields.payment_state = Some(OrderPaymentState::Paid);
                }
                let updated = self
                    .plain_transition(&order, target, actor_label, fields)
                    .await?
                    .ok_or_else(|| transition_conflict(order.status, target))?;
                if cod_settles {
                    self.payments.settle_cod(&order.order_id).await?;
                }
                updated
            }
        };

        if let Some(note) = note {
            tracing::info!(order_id = %order_id, note = %note, "Transition note");
        }

        self.notify_transition(&updated, target);
        Ok(updated)
    }

    /// 客户取消入口
    pub async fn cancel(&self, actor: &Actor, order_id: &str) -> AppResult<Order> {
        self.transition(actor, order_id, OrderStatus::Cancelled, None)
            .await
    }

    /// 管理端清除：仅终态 cancelled / 滞留 pending，连带释放存活预留
    pub async fn purge(&self, actor: &Actor, order_id: &str) -> AppResult<()> {
        actor.require_admin()?;
        let order = self.find(order_id).await?;

        if !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Pending) {
            return Err(AppError::with_message(
                ErrorCode::OrderNotPurgeable,
                format!("Orders in {} cannot be purged", order.status.as_str()),
            ));
        }

        let items_to_release: Vec<(String, i64)> = if order.stock_state == StockState::Reserved {
            order
                .items
                .iter()
                .map(|i| (i.product_id.clone(), i.quantity))
                .collect()
        } else {
            vec![]
        };

        match self
            .orders
            .purge_with_release(
                order_id,
                vec![OrderStatus::Cancelled, OrderStatus::Pending],
                &items_to_release,
                now_millis(),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(order_id = %order_id, "Order purged");
                Ok(())
            }
            Err(RepoError::Validation(_)) => Err(AppError::new(ErrorCode::OrderNotPurgeable)),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    // ====== 内部 ======

    async fn find(&self, order_id: &str) -> AppResult<Order> {
        self.orders
            .find_by_order_id(order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order {order_id} not found"))
            })
    }

    async fn plain_transition(
        &self,
        order: &Order,
        target: OrderStatus,
        actor_label: &str,
        fields: TransitionFields,
    ) -> AppResult<Option<Order>> {
        self.orders
            .transition(
                &order.order_id,
                order.status,
                target,
                StatusStamp {
                    status: target,
                    actor: actor_label.to_string(),
                    at: now_millis(),
                },
                fields,
                now_millis(),
            )
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }

    /// 进入 confirmed：状态翻转和预留提交在同一事务
    ///
    /// 任一预留守卫不满足时整体回滚，订单停留在原状态，
    /// 不会出现"已确认但未出库"的账目。
    async fn enter_confirmed(&self, order: &Order, actor_label: &str) -> AppResult<Order> {
        let items: Vec<(String, i64)> = if order.stock_state == StockState::Reserved {
            order
                .items
                .iter()
                .map(|i| (i.product_id.clone(), i.quantity))
                .collect()
        } else {
            vec![]
        };

        match self
            .orders
            .confirm_with_commit(
                &order.order_id,
                order.status,
                StatusStamp {
                    status: OrderStatus::Confirmed,
                    actor: actor_label.to_string(),
                    at: now_millis(),
                },
                &items,
                None,
                now_millis(),
            )
            .await
        {
            Ok(()) => {
                let ids: Vec<String> = items.iter().map(|(p, _)| p.clone()).collect();
                self.ledger.check_reorder_levels(&ids).await;
                self.find(&order.order_id).await
            }
            Err(RepoError::Validation(msg)) if msg.contains("stock_conflict") => {
                Err(AppError::with_message(
                    ErrorCode::InsufficientStock,
                    format!(
                        "Reservation for order {} no longer covers its items",
                        order.order_id
                    ),
                ))
            }
            Err(RepoError::Validation(_)) => {
                Err(transition_conflict(order.status, OrderStatus::Confirmed))
            }
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// 进入 cancelled：状态翻转 + 库存补偿在同一事务
    async fn enter_cancelled(&self, order: &Order, actor_label: &str) -> AppResult<Order> {
        let compensation = match order.stock_state {
            StockState::Reserved => Compensation::Release,
            StockState::Committed => Compensation::Restock,
            StockState::Released => Compensation::None,
        };
        let items: Vec<(String, i64)> = order
            .items
            .iter()
            .map(|i| (i.product_id.clone(), i.quantity))
            .collect();

        match self
            .orders
            .cancel_with_compensation(
                &order.order_id,
                order.status,
                StatusStamp {
                    status: OrderStatus::Cancelled,
                    actor: actor_label.to_string(),
                    at: now_millis(),
                },
                &items,
                compensation,
                now_millis(),
            )
            .await
        {
            Ok(()) => self.find(&order.order_id).await,
            Err(RepoError::Validation(_)) => {
                Err(transition_conflict(order.status, OrderStatus::Cancelled))
            }
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// payment_failed → pending 重试：先重新预留，再翻状态
    async fn reenter_pending(&self, order: &Order, actor_label: &str) -> AppResult<Order> {
        let mut reserved: Vec<(String, i64)> = Vec::new();
        if order.stock_state == StockState::Released {
            for item in &order.items {
                match self
                    .ledger
                    .reserve(&item.product_id, item.quantity, &order.order_id)
                    .await
                {
                    Ok(_) => reserved.push((item.product_id.clone(), item.quantity)),
                    Err(e) => {
                        self.rollback_reservations(&reserved, &order.order_id).await;
                        return Err(e);
                    }
                }
            }
        }

        let fields = TransitionFields {
            payment_state: Some(OrderPaymentState::Pending),
            stock_state: Some(StockState::Reserved),
        };
        match self
            .plain_transition(order, OrderStatus::Pending, actor_label, fields)
            .await?
        {
            Some(updated) => Ok(updated),
            None => {
                self.rollback_reservations(&reserved, &order.order_id).await;
                Err(transition_conflict(order.status, OrderStatus::Pending))
            }
        }
    }

    async fn rollback_reservations(&self, reserved: &[(String, i64)], order_id: &str) {
        for (product_id, qty) in reserved {
            if let Err(e) = self.ledger.release(product_id, *qty, order_id).await {
                tracing::error!(
                    order_id = %order_id,
                    product_id = %product_id,
                    error = %e,
                    "Failed to roll back stock reservation"
                );
            }
        }
    }

    /// 创建中途失败的补偿：释放预留并删除已落库的订单
    async fn abort_created_order(&self, order: &Order, reserved: &[(String, i64)]) {
        self.rollback_reservations(reserved, &order.order_id).await;
        if let Err(e) = self
            .orders
            .purge_with_release(&order.order_id, vec![OrderStatus::Pending], &[], now_millis())
            .await
        {
            tracing::error!(order_id = %order.order_id, error = %e, "Failed to remove aborted order");
        }
    }

    /// 每次成功流转：客户始终收通知，confirmed/cancelled 额外通知管理端
    fn notify_transition(&self, order: &Order, target: OrderStatus) {
        let (kind, title) = match target {
            OrderStatus::Confirmed => (NotificationKind::OrderConfirmed, "Order confirmed"),
            OrderStatus::Cancelled => (NotificationKind::OrderCancelled, "Order cancelled"),
            _ => (NotificationKind::OrderStatusChanged, "Order updated"),
        };
        let message = format!("Order {} is now {}", order.order_id, target.as_str());

        self.notifier.dispatch_async(
            order.user_id.clone(),
            kind,
            title.into(),
            message.clone(),
            Some(order.order_id.clone()),
        );
        if matches!(target, OrderStatus::Confirmed | OrderStatus::Cancelled) {
            self.notifier.dispatch_async(
                notify::ADMIN_RECIPIENT.into(),
                kind,
                title.into(),
                message,
                Some(order.order_id.clone()),
            );
        }
    }
}

fn transition_conflict(from: OrderStatus, to: OrderStatus) -> AppError {
    AppError::with_message(
        ErrorCode::TransitionConflict,
        format!(
            "Concurrent transition won the race for {} -> {}",
            from.as_str(),
            to.as_str()
        ),
    )
}

fn validate_address(address: &ShippingAddress) -> AppResult<()> {
    let required = [
        ("recipient", &address.recipient),
        ("phone", &address.phone),
        ("line1", &address.line1),
        ("city", &address.city),
        ("country", &address.country),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::with_message(
                ErrorCode::RequiredField,
                format!("Shipping address field {field} is required"),
            ));
        }
    }
    Ok(())
}
