use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{BranchId, BranchInventory, ProductId, StockRecord, WarehouseId};
use crate::domain::port::{RepositoryError, StockRepository, StockSummaryRow};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, Pool, Row};

/// MySQL在庫リポジトリ
///
/// 増減は `quantity = quantity ± ?` の相対更新として発行する。
/// 同じ在庫レコードへ並行して到達した操作は行レベルの原子的更新で
/// 直列化され、読み出してから書き戻す方式による更新の喪失は起きない。
pub struct MySqlStockRepository {
    pool: Pool<MySql>,
}

impl MySqlStockRepository {
    /// 新しいMySQL在庫リポジトリを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// 店舗在庫（BranchInventory）を遅延作成する
    async fn ensure_branch_inventory(&self, branch_id: BranchId) -> Result<(), RepositoryError> {
        let inventory = BranchInventory::new(branch_id);
        sqlx::query(
            r#"
            INSERT INTO branch_inventories (branch_id, created_at)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE branch_id = branch_id
            "#,
        )
        .bind(inventory.branch_id().to_string())
        .bind(inventory.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("店舗在庫の作成に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    fn record_from_row(row: &sqlx::mysql::MySqlRow) -> Result<StockRecord, RepositoryError> {
        let branch_id = BranchId::from_string(row.get("branch_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("店舗IDの解析に失敗しました: {}", e))
        })?;
        let warehouse_id = WarehouseId::from_string(row.get("warehouse_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("倉庫IDの解析に失敗しました: {}", e))
        })?;
        let product_id = ProductId::from_string(row.get("product_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("商品IDの解析に失敗しました: {}", e))
        })?;
        Ok(StockRecord::reconstruct(
            branch_id,
            warehouse_id,
            product_id,
            row.get::<u32, _>("quantity"),
            row.get::<Option<u32>, _>("min_threshold"),
            row.get::<Option<u32>, _>("max_threshold"),
        ))
    }
}

#[async_trait]
impl StockRepository for MySqlStockRepository {
    async fn get_or_create(
        &self,
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<StockRecord, RepositoryError> {
        self.ensure_branch_inventory(branch_id).await?;

        // (倉庫, 商品) が初めて操作されたときに数量0で遅延作成する
        sqlx::query(
            r#"
            INSERT INTO stock_records (branch_id, warehouse_id, product_id, quantity, updated_at)
            VALUES (?, ?, ?, 0, ?)
            ON DUPLICATE KEY UPDATE warehouse_id = warehouse_id
            "#,
        )
        .bind(branch_id.to_string())
        .bind(warehouse_id.to_string())
        .bind(product_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("在庫レコードの作成に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;

        let record = self.find(warehouse_id, product_id).await?;
        record.ok_or_else(|| {
            RepositoryError::FetchFailed("作成した在庫レコードを取得できませんでした".to_string())
        })
    }

    async fn find(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<StockRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT branch_id, warehouse_id, product_id, quantity, min_threshold, max_threshold
            FROM stock_records
            WHERE warehouse_id = ? AND product_id = ?
            "#,
        )
        .bind(warehouse_id.to_string())
        .bind(product_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("在庫レコードの取得に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;

        row.map(|row| Self::record_from_row(&row)).transpose()
    }

    async fn increment(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = quantity + ?, updated_at = ?
            WHERE warehouse_id = ? AND product_id = ?
            "#,
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(warehouse_id.to_string())
        .bind(product_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("在庫の加算に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::OperationFailed(format!(
                "在庫レコードが存在しません: 倉庫 {} 商品 {}",
                warehouse_id, product_id
            )));
        }
        Ok(())
    }

    async fn decrement(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        // quantity >= ? のガードにより、負になる更新は行ごと対象外になる
        let result = sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = quantity - ?, updated_at = ?
            WHERE warehouse_id = ? AND product_id = ? AND quantity >= ?
            "#,
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(warehouse_id.to_string())
        .bind(product_id.to_string())
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("在庫の減算に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::OperationFailed(format!(
                "在庫が不足しているため減算できません: 倉庫 {} 商品 {} 数量 {}",
                warehouse_id, product_id, quantity
            )));
        }
        Ok(())
    }

    async fn upsert_add(
        &self,
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
        min_threshold: Option<u32>,
        max_threshold: Option<u32>,
    ) -> Result<(), RepositoryError> {
        self.ensure_branch_inventory(branch_id).await?;

        sqlx::query(
            r#"
            INSERT INTO stock_records (
                branch_id, warehouse_id, product_id, quantity,
                min_threshold, max_threshold, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                quantity = quantity + VALUES(quantity),
                min_threshold = COALESCE(VALUES(min_threshold), min_threshold),
                max_threshold = COALESCE(VALUES(max_threshold), max_threshold),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(branch_id.to_string())
        .bind(warehouse_id.to_string())
        .bind(product_id.to_string())
        .bind(quantity)
        .bind(min_threshold)
        .bind(max_threshold)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("在庫の一括反映に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_sources(
        &self,
        product_id: ProductId,
        min_quantity: u32,
        exclude_warehouse: WarehouseId,
    ) -> Result<Vec<StockRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT branch_id, warehouse_id, product_id, quantity, min_threshold, max_threshold
            FROM stock_records
            WHERE product_id = ? AND quantity >= ? AND warehouse_id <> ?
            ORDER BY quantity DESC, warehouse_id ASC
            "#,
        )
        .bind(product_id.to_string())
        .bind(min_quantity)
        .bind(exclude_warehouse.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("出荷元の検索に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn branch_summary(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<StockSummaryRow>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, SUM(quantity) AS total_quantity, MIN(min_threshold) AS min_threshold
            FROM stock_records
            WHERE branch_id = ?
            GROUP BY product_id
            ORDER BY product_id
            "#,
        )
        .bind(branch_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("在庫集計の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        rows.iter()
            .map(|row| {
                let product_id = ProductId::from_string(row.get("product_id")).map_err(|e| {
                    RepositoryError::FetchFailed(format!("商品IDの解析に失敗しました: {}", e))
                })?;
                let total: Option<rust_decimal::Decimal> = row.get("total_quantity");
                let total_quantity = total
                    .and_then(|value| u32::try_from(value.trunc().mantissa()).ok())
                    .unwrap_or(0);
                Ok(StockSummaryRow {
                    product_id,
                    total_quantity,
                    min_threshold: row.get::<Option<u32>, _>("min_threshold"),
                })
            })
            .collect()
    }
}
