//! 通知模块
//!
//! 只负责落通知行并做去重，投递由外部协作方完成。
//! 尽力而为：失败记日志，绝不阻塞或回滚触发它的订单/支付变更。

use std::time::Duration;

use shared::error::{AppError, AppResult};
use shared::models::{Notification, NotificationKind};
use shared::util::{new_id, now_millis};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::repository::{NotificationRepository, RepoError};

/// 管理端收件箱的固定收件人
pub const ADMIN_RECIPIENT: &str = "admin";

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    timeout: Duration,
    dedup_window_ms: i64,
}

impl NotificationService {
    pub fn new(db: Surreal<Db>, timeout_ms: u64, dedup_window_ms: i64) -> Self {
        Self {
            repo: NotificationRepository::new(db),
            timeout: Duration::from_millis(timeout_ms),
            dedup_window_ms,
        }
    }

    /// 创建通知；去重窗口内相同 (recipient, order, kind) 返回已有记录
    ///
    /// 滑动窗口查询挡住常规重复；dedup_key 上的唯一索引裁决并发
    /// 双投：同一窗口桶内只有一个写入者能落行，输家读回赢家的行。
    pub async fn dispatch(
        &self,
        recipient: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        order_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> AppResult<Notification> {
        let now = now_millis();
        let since = now - self.dedup_window_ms;
        let bucket = now / self.dedup_window_ms.max(1);
        let dedup_key = format!(
            "{recipient}:{}:{}:{bucket}",
            kind.as_str(),
            order_id.unwrap_or("-"),
        );

        if let Some(existing) = self
            .repo
            .find_recent(recipient, kind, order_id, since)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
        {
            tracing::debug!(
                recipient,
                kind = kind.as_str(),
                "Duplicate notification suppressed"
            );
            return Ok(existing);
        }

        let notification = Notification {
            notification_id: new_id(),
            dedup_key: dedup_key.clone(),
            recipient: recipient.to_string(),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            order_id: order_id.map(|s| s.to_string()),
            metadata,
            created_at: now,
        };

        match self.repo.create(notification).await {
            Ok(created) => Ok(created),
            Err(RepoError::Duplicate(_)) => self
                .repo
                .find_by_dedup_key(&dedup_key)
                .await
                .map_err(|e| AppError::database(e.to_string()))?
                .ok_or_else(|| AppError::internal("Winning notification row not found")),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Fire-and-forget：spawn + 有界超时，失败只记日志
    pub fn dispatch_async(
        &self,
        recipient: String,
        kind: NotificationKind,
        title: String,
        message: String,
        order_id: Option<String>,
    ) {
        let service = self.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                timeout,
                service.dispatch(
                    &recipient,
                    kind,
                    &title,
                    &message,
                    order_id.as_deref(),
                    None,
                ),
            )
            .await;

            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(recipient = %recipient, kind = kind.as_str(), error = %e, "Notification dispatch failed");
                }
                Err(_) => {
                    tracing::warn!(recipient = %recipient, kind = kind.as_str(), "Notification dispatch timed out");
                }
            }
        });
    }

    pub async fn list(&self, recipient: &str, limit: i64) -> AppResult<Vec<Notification>> {
        self.repo
            .list_by_recipient(recipient, limit)
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }
}
