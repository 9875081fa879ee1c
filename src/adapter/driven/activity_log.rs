use crate::domain::port::{ActivityEntry, ActivityLog, Logger};
use async_trait::async_trait;
use sqlx::{MySql, Pool};
use std::collections::HashMap;
use std::sync::Arc;

/// MySQL活動ログ
/// 監査用の活動記録をデータベースへ書き込む。
/// 記録はfire-and-forgetであり、失敗しても呼び出し元の業務処理は
/// 失敗させない（失敗はログに残す）。
pub struct MySqlActivityLog {
    pool: Pool<MySql>,
    logger: Arc<dyn Logger>,
}

impl MySqlActivityLog {
    /// 新しいMySQL活動ログを作成
    pub fn new(pool: Pool<MySql>, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }
}

#[async_trait]
impl ActivityLog for MySqlActivityLog {
    async fn record(&self, entry: ActivityEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO activity_log (
                actor_id, action, description, related_kind, related_id, occurred_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.actor.map(|actor| actor.to_string()))
        .bind(&entry.action)
        .bind(&entry.description)
        .bind(entry.related.map(|related| related.kind().to_string()))
        .bind(entry.related.map(|related| related.entity_id().to_string()))
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            let mut context = HashMap::new();
            context.insert("action".to_string(), entry.action.clone());
            self.logger.warn(
                "MySqlActivityLog",
                &format!("活動ログの記録に失敗しました: {}", e),
                None,
                Some(context),
            );
        }
    }
}
