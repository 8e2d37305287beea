//! Payment Service
//!
//! 回调应用路径：先验签，后幂等检查，再条件流转。
//! 浏览器回跳和服务器 IPN 两个通道共用同一入口，IPN 为准；
//! 验签失败硬失败，不做任何状态变更。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    NotificationKind, Order, OrderPaymentState, OrderStatus, Payment, PaymentMethod,
    PaymentStatus, Refund, StockState,
};
use shared::util::{new_id, now_millis};
use validator::Validate;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::db::repository::payment::CallbackFields;
use crate::db::repository::{OrderRepository, PaymentRepository, RepoError, TransitionFields};
use crate::inventory::InventoryLedger;
use crate::notify::{self, NotificationService};
use crate::orders::money;

use super::gateway::{CallbackAck, GatewayRegistry};
use super::hosted::{REFERENCE_FIELD, RESPONSE_CODE_FIELD};

/// 管理端退款请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(range(min = 0.01))]
    pub amount: f64,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
}

#[derive(Clone)]
pub struct PaymentService {
    payments: PaymentRepository,
    orders: OrderRepository,
    ledger: InventoryLedger,
    gateways: Arc<GatewayRegistry>,
    notifier: NotificationService,
}

impl PaymentService {
    pub fn new(state: &ServerState) -> Self {
        Self {
            payments: PaymentRepository::new(state.db.clone()),
            orders: OrderRepository::new(state.db.clone()),
            ledger: InventoryLedger::new(state.db.clone()),
            gateways: state.gateways.clone(),
            notifier: state.notifier.clone(),
        }
    }

    /// 为订单创建支付单；在线支付同时返回网关跳转地址
    pub async fn create_for_order(&self, order: &Order) -> AppResult<(Payment, Option<String>)> {
        let now = now_millis();
        let payment = Payment {
            payment_id: new_id(),
            order_id: order.order_id.clone(),
            amount: order.total,
            method: order.payment_method,
            status: PaymentStatus::Pending,
            gateway_txn_id: None,
            bank_code: None,
            pay_date: None,
            response_code: None,
            callback_verified: false,
            refunds: vec![],
            created_at: now,
            updated_at: now,
        };

        let created = match self.payments.create(payment).await {
            Ok(p) => p,
            Err(RepoError::Duplicate(msg)) => return Err(AppError::already_exists(msg)),
            Err(e) => return Err(AppError::database(e.to_string())),
        };

        let gateway = self.gateways.resolve(order.payment_method);
        let request = gateway.build_request(&created, order)?;
        Ok((created, request.redirect_url))
    }

    pub async fn get(&self, actor: &Actor, payment_id: &str) -> AppResult<Payment> {
        let payment = self.find(payment_id).await?;
        self.check_access(actor, &payment).await?;
        Ok(payment)
    }

    pub async fn list_by_order(&self, actor: &Actor, order_id: &str) -> AppResult<Vec<Payment>> {
        if !actor.is_admin() {
            let order = self
                .orders
                .find_by_order_id(order_id)
                .await
                .map_err(|e| AppError::database(e.to_string()))?
                .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
            if order.user_id != actor.user_id {
                return Err(AppError::new(ErrorCode::PermissionDenied));
            }
        }
        self.payments
            .list_by_order(order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }

    /// 应用网关回调 (return / IPN 共用)
    ///
    /// 幂等：已 SUCCESS 的支付单重放回调是纯 no-op，
    /// 以 `AlreadyProcessed` 返回 (HTTP 200，IPN 应答 02)。
    pub async fn apply_callback(&self, params: &BTreeMap<String, String>) -> AppResult<Payment> {
        let reference = params
            .get(REFERENCE_FIELD)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::new(ErrorCode::PaymentNotFound))?;

        let payment = self.find(reference).await?;
        let gateway = self.gateways.resolve(payment.method);
        if !gateway.expects_callback() {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvalidMethod,
                "Payment method does not receive callbacks",
            ));
        }

        // Verify first. A failed check mutates nothing.
        if let Err(e) = gateway.verify_callback(params) {
            tracing::warn!(
                payment_id = %payment.payment_id,
                "Rejected gateway callback with invalid signature"
            );
            return Err(e);
        }

        if payment.status == PaymentStatus::Success {
            return Err(AppError::new(ErrorCode::AlreadyProcessed));
        }

        let response_code = params
            .get(RESPONSE_CODE_FIELD)
            .cloned()
            .unwrap_or_default();
        let fields = CallbackFields {
            gateway_txn_id: params.get("txn_id").cloned(),
            bank_code: params.get("bank_code").cloned(),
            pay_date: params.get("pay_date").cloned(),
            response_code: Some(response_code.clone()),
        };

        if response_code == "00" {
            self.apply_success(&payment, fields).await
        } else {
            let reason = gateway.map_response_code(&response_code);
            self.apply_failure(&payment, fields, reason).await
        }
    }

    /// AppResult → 网关应答码
    pub fn ack_for(result: &AppResult<Payment>) -> CallbackAck {
        match result {
            Ok(_) => CallbackAck::Ok,
            Err(e) => match e.code {
                ErrorCode::AlreadyProcessed => CallbackAck::AlreadyProcessed,
                ErrorCode::SignatureMismatch => CallbackAck::BadSignature,
                ErrorCode::PaymentNotFound | ErrorCode::OrderNotFound => CallbackAck::NotFound,
                _ => CallbackAck::Internal,
            },
        }
    }

    /// 管理端退款：追加退款分录并流转到 REFUNDED / PARTIALLY_REFUNDED
    pub async fn refund(
        &self,
        actor: &Actor,
        payment_id: &str,
        req: RefundRequest,
    ) -> AppResult<Payment> {
        actor.require_admin()?;
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;
        money::validate_amount(req.amount, "amount")?;

        let payment = self.find(payment_id).await?;
        let refunded = money::round2(payment.refunded_amount() + req.amount);
        if refunded > payment.amount {
            return Err(AppError::with_message(
                ErrorCode::RefundExceedsAmount,
                format!(
                    "Refund total {refunded} exceeds payment amount {}",
                    payment.amount
                ),
            ));
        }
        let target = if refunded >= payment.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };

        let refund = Refund {
            amount: money::round2(req.amount),
            reason: req.reason,
            at: now_millis(),
        };
        self.payments
            .add_refund(payment_id, refund, target, now_millis())
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::PaymentStateInvalid,
                    "Only successful payments can be refunded",
                )
            })
    }

    /// 货到付款签收收款：支付单同步 PENDING → SUCCESS
    pub async fn settle_cod(&self, order_id: &str) -> AppResult<()> {
        let rows = self
            .payments
            .list_by_order(order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        let Some(pending) = rows.iter().find(|p| {
            p.method == PaymentMethod::Cod
                && matches!(p.status, PaymentStatus::Pending | PaymentStatus::Processing)
        }) else {
            return Ok(());
        };

        self.payments
            .transition(
                &pending.payment_id,
                vec![PaymentStatus::Pending, PaymentStatus::Processing],
                PaymentStatus::Success,
                CallbackFields::default(),
                false,
                now_millis(),
            )
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        Ok(())
    }

    // ====== 内部 ======

    async fn find(&self, payment_id: &str) -> AppResult<Payment> {
        self.payments
            .find_by_payment_id(payment_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::PaymentNotFound,
                    format!("Payment {payment_id} not found"),
                )
            })
    }

    async fn check_access(&self, actor: &Actor, payment: &Payment) -> AppResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        let order = self
            .orders
            .find_by_order_id(&payment.order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if order.user_id != actor.user_id {
            return Err(AppError::new(ErrorCode::PermissionDenied));
        }
        Ok(())
    }

    async fn apply_success(
        &self,
        payment: &Payment,
        fields: CallbackFields,
    ) -> AppResult<Payment> {
        let updated = self
            .payments
            .transition(
                &payment.payment_id,
                vec![PaymentStatus::Pending, PaymentStatus::Processing],
                PaymentStatus::Success,
                fields,
                true,
                now_millis(),
            )
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let updated = match updated {
            Some(p) => p,
            None => {
                // Lost the race against a concurrent delivery
                let current = self.find(&payment.payment_id).await?;
                if current.status == PaymentStatus::Success {
                    return Err(AppError::new(ErrorCode::AlreadyProcessed));
                }
                return Err(AppError::new(ErrorCode::PaymentStateInvalid));
            }
        };

        self.confirm_order_after_payment(&updated).await?;

        tracing::info!(
            payment_id = %updated.payment_id,
            order_id = %updated.order_id,
            "Payment confirmed by gateway"
        );
        Ok(updated)
    }

    async fn apply_failure(
        &self,
        payment: &Payment,
        fields: CallbackFields,
        reason: &'static str,
    ) -> AppResult<Payment> {
        let updated = self
            .payments
            .transition(
                &payment.payment_id,
                vec![PaymentStatus::Pending, PaymentStatus::Processing],
                PaymentStatus::Failed,
                fields,
                true,
                now_millis(),
            )
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let updated = match updated {
            Some(p) => p,
            None => {
                let current = self.find(&payment.payment_id).await?;
                if current.status == PaymentStatus::Success
                    || current.status == PaymentStatus::Failed
                {
                    return Err(AppError::new(ErrorCode::AlreadyProcessed));
                }
                return Err(AppError::new(ErrorCode::PaymentStateInvalid));
            }
        };

        self.fail_order_after_payment(&updated, reason).await?;

        tracing::info!(
            payment_id = %updated.payment_id,
            order_id = %updated.order_id,
            reason,
            "Payment failed at gateway"
        );
        Ok(updated)
    }

    /// 支付成功 → 订单 confirmed，状态翻转与预留提交在同一事务
    async fn confirm_order_after_payment(&self, payment: &Payment) -> AppResult<()> {
        let order = self
            .orders
            .find_by_order_id(&payment.order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::PaymentPending
        ) {
            // Order moved on (e.g. admin action); just record the paid state
            self.orders
                .set_payment_state(&order.order_id, OrderPaymentState::Paid, now_millis())
                .await
                .map_err(|e| AppError::database(e.to_string()))?;
            return Ok(());
        }

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
                shared::models::StatusStamp {
                    status: OrderStatus::Confirmed,
                    actor: "gateway".into(),
                    at: now_millis(),
                },
                &items,
                Some(OrderPaymentState::Paid),
                now_millis(),
            )
            .await
        {
            Ok(()) => {}
            Err(RepoError::Validation(msg)) if msg.contains("stock_conflict") => {
                // The whole transaction rolled back; the order did not confirm
                tracing::error!(
                    order_id = %order.order_id,
                    payment_id = %payment.payment_id,
                    "Reservation no longer covers the paid order"
                );
                return Err(AppError::with_message(
                    ErrorCode::InsufficientStock,
                    format!(
                        "Reservation for order {} no longer covers its items",
                        order.order_id
                    ),
                ));
            }
            Err(RepoError::Validation(_)) => {
                // Another writer flipped the order first; paid state still applies
                self.orders
                    .set_payment_state(&order.order_id, OrderPaymentState::Paid, now_millis())
                    .await
                    .map_err(|e| AppError::database(e.to_string()))?;
                return Ok(());
            }
            Err(e) => return Err(AppError::database(e.to_string())),
        }

        let ids: Vec<String> = items.iter().map(|(p, _)| p.clone()).collect();
        self.ledger.check_reorder_levels(&ids).await;

        let confirmed = self
            .orders
            .find_by_order_id(&order.order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

        self.notifier.dispatch_async(
            confirmed.user_id.clone(),
            NotificationKind::PaymentReceived,
            "Payment received".into(),
            format!("Payment for order {} was received", confirmed.order_id),
            Some(confirmed.order_id.clone()),
        );
        self.notifier.dispatch_async(
            confirmed.user_id.clone(),
            NotificationKind::OrderConfirmed,
            "Order confirmed".into(),
            format!("Order {} is confirmed", confirmed.order_id),
            Some(confirmed.order_id.clone()),
        );
        self.notifier.dispatch_async(
            notify::ADMIN_RECIPIENT.into(),
            NotificationKind::OrderConfirmed,
            "Order confirmed".into(),
            format!("Order {} was paid and confirmed", confirmed.order_id),
            Some(confirmed.order_id.clone()),
        );

        Ok(())
    }

    /// 支付失败 → 订单 payment_failed，释放库存预留
    async fn fail_order_after_payment(
        &self,
        payment: &Payment,
        reason: &'static str,
    ) -> AppResult<()> {
        let order = self
            .orders
            .find_by_order_id(&payment.order_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::PaymentPending
        ) {
            return Ok(());
        }

        let flipped = self
            .orders
            .transition(
                &order.order_id,
                order.status,
                OrderStatus::PaymentFailed,
                shared::models::StatusStamp {
                    status: OrderStatus::PaymentFailed,
                    actor: "gateway".into(),
                    at: now_millis(),
                },
                TransitionFields {
                    payment_state: Some(OrderPaymentState::Failed),
                    stock_state: Some(StockState::Released),
                },
                now_millis(),
            )
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let Some(failed) = flipped else {
            return Ok(());
        };

        if order.stock_state == StockState::Reserved {
            for item in &failed.items {
                if let Err(e) = self
                    .ledger
                    .release(&item.product_id, item.quantity, &failed.order_id)
                    .await
                {
                    tracing::error!(
                        order_id = %failed.order_id,
                        product_id = %item.product_id,
                        error = %e,
                        "Failed to release stock reservation after payment failure"
                    );
                }
            }
        }

        self.notifier.dispatch_async(
            failed.user_id.clone(),
            NotificationKind::PaymentFailed,
            "Payment failed".into(),
            format!("Payment for order {} failed: {reason}", failed.order_id),
            Some(failed.order_id.clone()),
        );

        Ok(())
    }
}
