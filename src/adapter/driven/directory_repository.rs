use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{
    Branch, BranchId, Product, ProductId, Warehouse, WarehouseId, WarehouseKind,
};
use crate::domain::port::{BranchDirectory, ProductCatalog, RepositoryError};
use async_trait::async_trait;
use sqlx::{MySql, Pool, Row};

/// MySQL店舗・倉庫ディレクトリ
/// 店舗・倉庫マスタの参照のみを提供する（本コアは変更しない）
pub struct MySqlBranchDirectory {
    pool: Pool<MySql>,
}

impl MySqlBranchDirectory {
    /// 新しいMySQLディレクトリを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn warehouse_from_row(row: &sqlx::mysql::MySqlRow) -> Result<Warehouse, RepositoryError> {
        let warehouse_id = WarehouseId::from_string(row.get("id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("倉庫IDの解析に失敗しました: {}", e))
        })?;
        let branch_id = BranchId::from_string(row.get("branch_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("店舗IDの解析に失敗しました: {}", e))
        })?;
        let kind = WarehouseKind::from_string(row.get("kind")).map_err(|e| {
            RepositoryError::FetchFailed(format!("倉庫種別の解析に失敗しました: {}", e))
        })?;
        Ok(Warehouse {
            id: warehouse_id,
            branch_id,
            kind,
            active: row.get("active"),
        })
    }
}

#[async_trait]
impl BranchDirectory for MySqlBranchDirectory {
    async fn find_branch(&self, branch_id: BranchId) -> Result<Option<Branch>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, active FROM branches WHERE id = ?")
            .bind(branch_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("店舗の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        row.map(|row| {
            let id = BranchId::from_string(row.get("id")).map_err(|e| {
                RepositoryError::FetchFailed(format!("店舗IDの解析に失敗しました: {}", e))
            })?;
            Ok(Branch {
                id,
                name: row.get("name"),
                active: row.get("active"),
            })
        })
        .transpose()
    }

    async fn find_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Option<Warehouse>, RepositoryError> {
        let row = sqlx::query("SELECT id, branch_id, kind, active FROM warehouses WHERE id = ?")
            .bind(warehouse_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("倉庫の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        row.map(|row| Self::warehouse_from_row(&row)).transpose()
    }

    async fn active_warehouses(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<Warehouse>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, branch_id, kind, active
            FROM warehouses
            WHERE branch_id = ? AND active = TRUE
            ORDER BY id
            "#,
        )
        .bind(branch_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("倉庫一覧の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        rows.iter().map(Self::warehouse_from_row).collect()
    }
}

/// MySQL商品カタログ
/// 商品マスタの参照のみを提供する（本コアは変更しない）
pub struct MySqlProductCatalog {
    pool: Pool<MySql>,
}

impl MySqlProductCatalog {
    /// 新しいMySQLカタログを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn product_from_row(row: &sqlx::mysql::MySqlRow) -> Result<Product, RepositoryError> {
        let product_id = ProductId::from_string(row.get("id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("商品IDの解析に失敗しました: {}", e))
        })?;
        Ok(Product {
            id: product_id,
            sku: row.get("sku"),
            name: row.get("name"),
        })
    }
}

#[async_trait]
impl ProductCatalog for MySqlProductCatalog {
    async fn find_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT id, sku, name FROM products WHERE id = ?")
            .bind(product_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("商品の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        row.map(|row| Self::product_from_row(&row)).transpose()
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT id, sku, name FROM products WHERE sku = ?")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("商品の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        row.map(|row| Self::product_from_row(&row)).transpose()
    }
}
