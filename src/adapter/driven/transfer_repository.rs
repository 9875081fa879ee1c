use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{
    ActorId, BranchId, OrderId, ProductId, Transfer, TransferId, TransferLine, TransferReason,
    TransferStatus, WarehouseId,
};
use crate::domain::port::{RepositoryError, TransferRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, Pool, Row};

/// MySQL移送リポジトリ
/// 移送ヘッダーと明細を同一トランザクションで永続化する
pub struct MySqlTransferRepository {
    pool: Pool<MySql>,
}

impl MySqlTransferRepository {
    /// 新しいMySQL移送リポジトリを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// JOINされた行から移送集約を再構築する
    fn build_transfer_from_rows(
        rows: &[sqlx::mysql::MySqlRow],
    ) -> Result<Transfer, RepositoryError> {
        let first_row = &rows[0];

        let transfer_id = TransferId::from_string(first_row.get("id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("移送IDの解析に失敗しました: {}", e))
        })?;
        let source_branch_id = BranchId::from_string(first_row.get("source_branch_id"))
            .map_err(|e| {
                RepositoryError::FetchFailed(format!("出荷元店舗IDの解析に失敗しました: {}", e))
            })?;
        let destination_branch_id =
            BranchId::from_string(first_row.get("destination_branch_id")).map_err(|e| {
                RepositoryError::FetchFailed(format!("受入先店舗IDの解析に失敗しました: {}", e))
            })?;
        let reason = TransferReason::from_string(first_row.get("reason")).map_err(|e| {
            RepositoryError::FetchFailed(format!("移送理由の解析に失敗しました: {}", e))
        })?;
        let status = TransferStatus::from_string(first_row.get("status")).map_err(|e| {
            RepositoryError::FetchFailed(format!("移送ステータスの解析に失敗しました: {}", e))
        })?;
        let order_id = first_row
            .get::<Option<String>, _>("order_id")
            .map(|raw| {
                OrderId::from_string(&raw).map_err(|e| {
                    RepositoryError::FetchFailed(format!("注文IDの解析に失敗しました: {}", e))
                })
            })
            .transpose()?;
        let created_by = first_row
            .get::<Option<String>, _>("created_by")
            .map(|raw| {
                ActorId::from_string(&raw).map_err(|e| {
                    RepositoryError::FetchFailed(format!("作成者IDの解析に失敗しました: {}", e))
                })
            })
            .transpose()?;
        let comments = first_row
            .get::<Option<String>, _>("comments")
            .map(|raw| raw.lines().map(|line| line.to_string()).collect())
            .unwrap_or_default();
        let requested_at: DateTime<Utc> = first_row.get("requested_at");
        let dispatched_at: Option<DateTime<Utc>> = first_row.get("dispatched_at");
        let received_at: Option<DateTime<Utc>> = first_row.get("received_at");

        let mut lines = Vec::new();
        for row in rows {
            if let (Some(product_id_str), Some(requested_quantity)) = (
                row.get::<Option<String>, _>("product_id"),
                row.get::<Option<u32>, _>("requested_quantity"),
            ) {
                let product_id = ProductId::from_string(&product_id_str).map_err(|e| {
                    RepositoryError::FetchFailed(format!("商品IDの解析に失敗しました: {}", e))
                })?;
                let source_warehouse_id = WarehouseId::from_string(
                    &row.get::<Option<String>, _>("source_warehouse_id")
                        .unwrap_or_default(),
                )
                .map_err(|e| {
                    RepositoryError::FetchFailed(format!("出荷元倉庫IDの解析に失敗しました: {}", e))
                })?;
                let destination_warehouse_id = WarehouseId::from_string(
                    &row.get::<Option<String>, _>("destination_warehouse_id")
                        .unwrap_or_default(),
                )
                .map_err(|e| {
                    RepositoryError::FetchFailed(format!("受入先倉庫IDの解析に失敗しました: {}", e))
                })?;

                lines.push(TransferLine::reconstruct(
                    product_id,
                    requested_quantity,
                    row.get::<Option<u32>, _>("sent_quantity"),
                    row.get::<Option<u32>, _>("received_quantity"),
                    source_warehouse_id,
                    destination_warehouse_id,
                ));
            }
        }

        Ok(Transfer::reconstruct(
            transfer_id,
            source_branch_id,
            destination_branch_id,
            reason,
            status,
            order_id,
            created_by,
            comments,
            lines,
            requested_at,
            dispatched_at,
            received_at,
        ))
    }

    fn build_transfers_from_rows(
        rows: Vec<sqlx::mysql::MySqlRow>,
    ) -> Result<Vec<Transfer>, RepositoryError> {
        let mut groups: Vec<(String, Vec<sqlx::mysql::MySqlRow>)> = Vec::new();
        for row in rows {
            let transfer_id: String = row.get("id");
            match groups.iter_mut().find(|(id, _)| *id == transfer_id) {
                Some((_, group)) => group.push(row),
                None => groups.push((transfer_id, vec![row])),
            }
        }

        let mut transfers = Vec::new();
        for (_, group) in groups {
            transfers.push(Self::build_transfer_from_rows(&group)?);
        }
        Ok(transfers)
    }
}

const TRANSFER_SELECT: &str = r#"
    SELECT
        t.id, t.source_branch_id, t.destination_branch_id, t.reason, t.status,
        t.order_id, t.created_by, t.comments, t.requested_at, t.dispatched_at, t.received_at,
        tl.product_id, tl.requested_quantity, tl.sent_quantity, tl.received_quantity,
        tl.source_warehouse_id, tl.destination_warehouse_id
    FROM transfers t
    LEFT JOIN transfer_lines tl ON t.id = tl.transfer_id
"#;

#[async_trait]
impl TransferRepository for MySqlTransferRepository {
    async fn save(&self, transfer: &Transfer) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| {
                DatabaseError::ConnectionError(format!(
                    "トランザクション開始に失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)?;

        let comments = if transfer.comments().is_empty() {
            None
        } else {
            Some(transfer.comments().join("\n"))
        };

        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, source_branch_id, destination_branch_id, reason, status,
                order_id, created_by, comments, requested_at, dispatched_at, received_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                comments = VALUES(comments),
                dispatched_at = VALUES(dispatched_at),
                received_at = VALUES(received_at)
            "#,
        )
        .bind(transfer.id().to_string())
        .bind(transfer.source_branch_id().to_string())
        .bind(transfer.destination_branch_id().to_string())
        .bind(transfer.reason().to_string())
        .bind(transfer.status().to_string())
        .bind(transfer.order_id().map(|id| id.to_string()))
        .bind(transfer.created_by().map(|id| id.to_string()))
        .bind(comments)
        .bind(transfer.requested_at())
        .bind(transfer.dispatched_at())
        .bind(transfer.received_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("移送の保存に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        sqlx::query("DELETE FROM transfer_lines WHERE transfer_id = ?")
            .bind(transfer.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("移送明細の削除に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        for line in transfer.lines() {
            sqlx::query(
                r#"
                INSERT INTO transfer_lines (
                    transfer_id, product_id, requested_quantity,
                    sent_quantity, received_quantity,
                    source_warehouse_id, destination_warehouse_id
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(transfer.id().to_string())
            .bind(line.product_id().to_string())
            .bind(line.requested_quantity())
            .bind(line.sent_quantity())
            .bind(line.received_quantity())
            .bind(line.source_warehouse_id().to_string())
            .bind(line.destination_warehouse_id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("移送明細の保存に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;
        }

        tx.commit()
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!(
                    "トランザクションのコミットに失敗しました: {}",
                    e
                ))
            })
            .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<Transfer>, RepositoryError> {
        let rows = sqlx::query(&format!("{} WHERE t.id = ?", TRANSFER_SELECT))
            .bind(transfer_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("移送の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::build_transfer_from_rows(&rows)?))
    }

    async fn find_all(&self) -> Result<Vec<Transfer>, RepositoryError> {
        let rows = sqlx::query(&format!("{} ORDER BY t.requested_at DESC", TRANSFER_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("移送一覧の取得に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        Self::build_transfers_from_rows(rows)
    }

    async fn find_pending_duplicate(
        &self,
        order_id: OrderId,
        destination_branch_id: BranchId,
        product_id: ProductId,
        destination_warehouse_id: WarehouseId,
    ) -> Result<Option<Transfer>, RepositoryError> {
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT t.id
            FROM transfers t
            JOIN transfer_lines tl ON t.id = tl.transfer_id
            WHERE t.order_id = ?
              AND t.destination_branch_id = ?
              AND t.status = 'Pending'
              AND tl.product_id = ?
              AND tl.destination_warehouse_id = ?
            LIMIT 1
            "#,
        )
        .bind(order_id.to_string())
        .bind(destination_branch_id.to_string())
        .bind(product_id.to_string())
        .bind(destination_warehouse_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("移送の検索に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        match id {
            Some(id) => {
                let transfer_id = TransferId::from_string(&id).map_err(|e| {
                    RepositoryError::FetchFailed(format!("移送IDの解析に失敗しました: {}", e))
                })?;
                self.find_by_id(transfer_id).await
            }
            None => Ok(None),
        }
    }

    async fn find_pending_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Transfer>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE t.order_id = ? AND t.status = 'Pending' AND t.reason = 'OrderCompletion'",
            TRANSFER_SELECT
        ))
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("移送の検索に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        Self::build_transfers_from_rows(rows)
    }

    fn next_identity(&self) -> TransferId {
        TransferId::new()
    }
}
