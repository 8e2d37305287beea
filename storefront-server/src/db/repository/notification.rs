//! Notification Repository

use super::{BaseRepository, RepoError, RepoResult};
use shared::models::{Notification, NotificationKind};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct NotificationRepository {
    base: BaseRepository,
}

impl NotificationRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, notification: Notification) -> RepoResult<Notification> {
        let dedup_key = notification.dedup_key.clone();
        let result: Result<Vec<Notification>, surrealdb::Error> = async {
            let created = self
                .base
                .db()
                .query("CREATE notification CONTENT $notification RETURN AFTER")
                .bind(("notification", notification))
                .await?
                .check()?
                .take(0)?;
            Ok(created)
        }
        .await;

        match result {
            Ok(mut rows) => rows
                .pop()
                .ok_or_else(|| RepoError::Database("Create returned no row".into())),
            Err(e) => {
                let msg = e.to_string();
                if RepoError::is_duplicate_violation(&msg) {
                    Err(RepoError::Duplicate(format!("Notification {dedup_key}")))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    pub async fn find_by_dedup_key(&self, dedup_key: &str) -> RepoResult<Option<Notification>> {
        let mut rows: Vec<Notification> = self
            .base
            .db()
            .query("SELECT * FROM notification WHERE dedup_key = $dedup_key LIMIT 1")
            .bind(("dedup_key", dedup_key.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 去重窗口内最近一条同 (recipient, order, kind) 的通知
    pub async fn find_recent(
        &self,
        recipient: &str,
        kind: NotificationKind,
        order_id: Option<&str>,
        since: i64,
    ) -> RepoResult<Option<Notification>> {
        let mut rows: Vec<Notification> = self
            .base
            .db()
            .query(
                "SELECT * FROM notification \
                 WHERE recipient = $recipient \
                   AND kind = $kind \
                   AND order_id = $order_id \
                   AND created_at >= $since \
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(("recipient", recipient.to_string()))
            .bind(("kind", kind))
            .bind(("order_id", order_id.map(|s| s.to_string())))
            .bind(("since", since))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    pub async fn list_by_recipient(
        &self,
        recipient: &str,
        limit: i64,
    ) -> RepoResult<Vec<Notification>> {
        let rows: Vec<Notification> = self
            .base
            .db()
            .query(
                "SELECT * FROM notification WHERE recipient = $recipient \
                 ORDER BY created_at DESC LIMIT $limit",
            )
            .bind(("recipient", recipient.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows)
    }
}
