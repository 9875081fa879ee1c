use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{Order, OrderId, OrderStatus};
use crate::domain::port::{OrderRepository, RepositoryError};
use async_trait::async_trait;

use crate::domain::model::{
    ActorId, BranchId, CustomerId, Money, OrderLine, PreparationStatus, ProductId, ShippingMethod,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, Pool, Row};

/// MySQL注文リポジトリ
/// 注文ヘッダーと明細を同一トランザクションで永続化する
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySQL注文リポジトリを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    /// JOINされた行から注文集約を再構築する
    fn build_order_from_rows(
        &self,
        rows: &[sqlx::mysql::MySqlRow],
    ) -> Result<Order, RepositoryError> {
        let first_row = &rows[0];

        let order_id = OrderId::from_string(first_row.get("id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("注文IDの解析に失敗しました: {}", e))
        })?;
        let customer_id = CustomerId::from_string(first_row.get("customer_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("顧客IDの解析に失敗しました: {}", e))
        })?;
        let branch_id = BranchId::from_string(first_row.get("branch_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("店舗IDの解析に失敗しました: {}", e))
        })?;
        let shipping_method = ShippingMethod::from_string(first_row.get("shipping_method"))
            .map_err(|e| {
                RepositoryError::FetchFailed(format!("配送方法の解析に失敗しました: {}", e))
            })?;
        let status = OrderStatus::from_string(first_row.get("status")).map_err(|e| {
            RepositoryError::FetchFailed(format!("注文ステータスの解析に失敗しました: {}", e))
        })?;
        let preparation_status =
            PreparationStatus::from_string(first_row.get("preparation_status")).map_err(|e| {
                RepositoryError::FetchFailed(format!("準備ステータスの解析に失敗しました: {}", e))
            })?;
        let assigned_picker = first_row
            .get::<Option<String>, _>("assigned_picker")
            .map(|raw| {
                ActorId::from_string(&raw).map_err(|e| {
                    RepositoryError::FetchFailed(format!("担当者IDの解析に失敗しました: {}", e))
                })
            })
            .transpose()?;
        let stock_applied: bool = first_row.get("stock_applied");
        let tax_total = Money::new(first_row.get::<Decimal, _>("tax_total"), "CLP".to_string())
            .map_err(|e| {
                RepositoryError::FetchFailed(format!("税額の構築に失敗しました: {}", e))
            })?;
        let notes = first_row
            .get::<Option<String>, _>("notes")
            .map(|raw| raw.lines().map(|line| line.to_string()).collect())
            .unwrap_or_default();
        let ordered_at: DateTime<Utc> = first_row.get("ordered_at");
        let delivered_at: Option<DateTime<Utc>> = first_row.get("delivered_at");

        // 注文明細を再構築
        let mut order_lines = Vec::new();
        for row in rows {
            if let (Some(product_id_str), Some(quantity), Some(unit_price), Some(discounted)) = (
                row.get::<Option<String>, _>("product_id"),
                row.get::<Option<u32>, _>("line_quantity"),
                row.get::<Option<Decimal>, _>("unit_price"),
                row.get::<Option<Decimal>, _>("discounted_unit_price"),
            ) {
                let product_id = ProductId::from_string(&product_id_str).map_err(|e| {
                    RepositoryError::FetchFailed(format!("商品IDの解析に失敗しました: {}", e))
                })?;
                let unit_price = Money::new(unit_price, "CLP".to_string()).map_err(|e| {
                    RepositoryError::FetchFailed(format!("単価の構築に失敗しました: {}", e))
                })?;
                let discounted = Money::new(discounted, "CLP".to_string()).map_err(|e| {
                    RepositoryError::FetchFailed(format!("割引後単価の構築に失敗しました: {}", e))
                })?;
                let pending_quantity = row
                    .get::<Option<u32>, _>("pending_quantity")
                    .unwrap_or(0);

                let order_line = OrderLine::reconstruct(
                    product_id,
                    quantity,
                    unit_price,
                    discounted,
                    pending_quantity,
                )
                .map_err(|e| {
                    RepositoryError::FetchFailed(format!("注文明細の構築に失敗しました: {}", e))
                })?;
                order_lines.push(order_line);
            }
        }

        Order::reconstruct(
            order_id,
            customer_id,
            branch_id,
            shipping_method,
            order_lines,
            status,
            preparation_status,
            assigned_picker,
            stock_applied,
            tax_total,
            notes,
            ordered_at,
            delivered_at,
        )
        .map_err(|e| {
            RepositoryError::FetchFailed(format!("注文集約の再構築に失敗しました: {}", e))
        })
    }

    /// 複数注文分のJOIN結果を注文IDごとにグループ化して再構築する
    fn build_orders_from_rows(
        &self,
        rows: Vec<sqlx::mysql::MySqlRow>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut order_groups: Vec<(String, Vec<sqlx::mysql::MySqlRow>)> = Vec::new();
        for row in rows {
            let order_id: String = row.get("id");
            match order_groups.iter_mut().find(|(id, _)| *id == order_id) {
                Some((_, group)) => group.push(row),
                None => order_groups.push((order_id, vec![row])),
            }
        }

        let mut orders = Vec::new();
        for (_, group) in order_groups {
            orders.push(self.build_order_from_rows(&group)?);
        }
        Ok(orders)
    }
}

const ORDER_SELECT: &str = r#"
    SELECT
        o.id, o.customer_id, o.branch_id, o.shipping_method,
        o.status, o.preparation_status, o.assigned_picker, o.stock_applied,
        o.tax_total, o.notes, o.ordered_at, o.delivered_at,
        ol.product_id, ol.quantity AS line_quantity,
        ol.unit_price, ol.discounted_unit_price, ol.pending_quantity
    FROM orders o
    LEFT JOIN order_lines ol ON o.id = ol.order_id
"#;

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
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

        let notes = if order.notes().is_empty() {
            None
        } else {
            Some(order.notes().join("\n"))
        };

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, branch_id, shipping_method,
                status, preparation_status, assigned_picker, stock_applied,
                subtotal, discount_total, tax_total, total,
                notes, ordered_at, delivered_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                preparation_status = VALUES(preparation_status),
                assigned_picker = VALUES(assigned_picker),
                stock_applied = VALUES(stock_applied),
                subtotal = VALUES(subtotal),
                discount_total = VALUES(discount_total),
                tax_total = VALUES(tax_total),
                total = VALUES(total),
                notes = VALUES(notes),
                delivered_at = VALUES(delivered_at)
            "#,
        )
        .bind(order.id().to_string())
        .bind(order.customer_id().to_string())
        .bind(order.branch_id().to_string())
        .bind(order.shipping_method().to_string())
        .bind(order.status().to_string())
        .bind(order.preparation_status().to_string())
        .bind(order.assigned_picker().map(|picker| picker.to_string()))
        .bind(order.stock_applied())
        .bind(order.subtotal().amount())
        .bind(order.discount_total().amount())
        .bind(order.tax_total().amount())
        .bind(order.total().amount())
        .bind(notes)
        .bind(order.ordered_at())
        .bind(order.delivered_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("注文の保存に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        // 既存の注文明細を削除してから挿入し直す
        sqlx::query("DELETE FROM order_lines WHERE order_id = ?")
            .bind(order.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("注文明細の削除に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        for line in order.lines() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    order_id, product_id, quantity,
                    unit_price, discounted_unit_price, pending_quantity
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(order.id().to_string())
            .bind(line.product_id().to_string())
            .bind(line.quantity())
            .bind(line.unit_price().amount())
            .bind(line.discounted_unit_price().amount())
            .bind(line.pending_quantity())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("注文明細の保存に失敗しました: {}", e))
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

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let rows = sqlx::query(&format!("{} WHERE o.id = ?", ORDER_SELECT))
            .bind(order_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("注文の取得に失敗しました: {}", e)))
            .map_err(RepositoryError::from)?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.build_order_from_rows(&rows)?))
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!("{} ORDER BY o.ordered_at DESC", ORDER_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("注文一覧の取得に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        self.build_orders_from_rows(rows)
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE o.status = ? ORDER BY o.ordered_at DESC",
            ORDER_SELECT
        ))
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!(
                "ステータス別注文一覧の取得に失敗しました: {}",
                e
            ))
        })
        .map_err(RepositoryError::from)?;

        self.build_orders_from_rows(rows)
    }

    async fn count_active_preparations(&self, picker: ActorId) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM orders
            WHERE assigned_picker = ?
              AND preparation_status IN ('Assigned', 'InPreparation')
            "#,
        )
        .bind(picker.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::QueryError(format!("担当件数の取得に失敗しました: {}", e))
        })
        .map_err(RepositoryError::from)?;

        Ok(count as u32)
    }

    fn next_identity(&self) -> OrderId {
        OrderId::new()
    }
}
