use crate::adapter::database_error::DatabaseError;
use sqlx::{MySql, Pool};

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        // マイグレーションファイルのリスト
        let migrations = vec![
            include_str!("../../migrations/001_create_branches_table.sql"),
            include_str!("../../migrations/002_create_warehouses_table.sql"),
            include_str!("../../migrations/003_create_products_table.sql"),
            include_str!("../../migrations/004_create_branch_inventories_table.sql"),
            include_str!("../../migrations/005_create_stock_records_table.sql"),
            include_str!("../../migrations/006_create_orders_table.sql"),
            include_str!("../../migrations/007_create_order_lines_table.sql"),
            include_str!("../../migrations/008_create_transfers_table.sql"),
            include_str!("../../migrations/009_create_transfer_lines_table.sql"),
            include_str!("../../migrations/010_create_payments_table.sql"),
            include_str!("../../migrations/011_create_activity_log_table.sql"),
        ];

        // 各マイグレーションを順番に実行
        for (index, migration_sql) in migrations.iter().enumerate() {
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DatabaseError::MigrationError(format!(
                        "Migration {} failed: {}",
                        index + 1,
                        e
                    ))
                })?;
        }

        Ok(())
    }
}
