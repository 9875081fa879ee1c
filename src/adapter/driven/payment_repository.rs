use crate::adapter::database_error::DatabaseError;
use crate::domain::model::{
    ConfirmationStatus, InstallmentKind, InstallmentPlan, Money, OrderId, Payment, PaymentId,
    PaymentMethod, PaymentStatus,
};
use crate::domain::port::{PaymentRepository, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, Pool, Row};

/// MySQL支払いリポジトリ
pub struct MySqlPaymentRepository {
    pool: Pool<MySql>,
}

impl MySqlPaymentRepository {
    /// 新しいMySQL支払いリポジトリを作成
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    fn payment_from_row(row: &sqlx::mysql::MySqlRow) -> Result<Payment, RepositoryError> {
        let payment_id = PaymentId::from_string(row.get("id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("支払いIDの解析に失敗しました: {}", e))
        })?;
        let order_id = OrderId::from_string(row.get("order_id")).map_err(|e| {
            RepositoryError::FetchFailed(format!("注文IDの解析に失敗しました: {}", e))
        })?;
        let amount = Money::new(row.get::<Decimal, _>("amount"), "CLP".to_string())
            .map_err(|e| {
                RepositoryError::FetchFailed(format!("金額の構築に失敗しました: {}", e))
            })?;
        let method = PaymentMethod::from_string(row.get("method")).map_err(|e| {
            RepositoryError::FetchFailed(format!("支払い方法の解析に失敗しました: {}", e))
        })?;
        let status = PaymentStatus::from_string(row.get("status")).map_err(|e| {
            RepositoryError::FetchFailed(format!("支払いステータスの解析に失敗しました: {}", e))
        })?;

        let installments = match (
            row.get::<Option<String>, _>("installment_kind"),
            row.get::<Option<u32>, _>("installment_count"),
        ) {
            (Some(kind), Some(count)) => Some(InstallmentPlan {
                kind: InstallmentKind::from_string(&kind).map_err(|e| {
                    RepositoryError::FetchFailed(format!(
                        "分割払い種別の解析に失敗しました: {}",
                        e
                    ))
                })?,
                count,
            }),
            _ => None,
        };
        let confirmation = row
            .get::<Option<String>, _>("confirmation")
            .map(|raw| {
                ConfirmationStatus::from_string(&raw).map_err(|e| {
                    RepositoryError::FetchFailed(format!(
                        "確認ステータスの解析に失敗しました: {}",
                        e
                    ))
                })
            })
            .transpose()?;
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(Payment::reconstruct(
            payment_id,
            order_id,
            amount,
            method,
            status,
            row.get::<Option<String>, _>("gateway_token"),
            row.get::<Option<String>, _>("gateway_transaction_id"),
            installments,
            confirmation,
            created_at,
        ))
    }
}

const PAYMENT_SELECT: &str = r#"
    SELECT
        id, order_id, amount, method, status,
        gateway_token, gateway_transaction_id,
        installment_kind, installment_count, confirmation, created_at
    FROM payments
"#;

#[async_trait]
impl PaymentRepository for MySqlPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, amount, method, status,
                gateway_token, gateway_transaction_id,
                installment_kind, installment_count, confirmation, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                gateway_token = VALUES(gateway_token),
                gateway_transaction_id = VALUES(gateway_transaction_id),
                installment_kind = VALUES(installment_kind),
                installment_count = VALUES(installment_count),
                confirmation = VALUES(confirmation)
            "#,
        )
        .bind(payment.id().to_string())
        .bind(payment.order_id().to_string())
        .bind(payment.amount().amount())
        .bind(payment.method().to_string())
        .bind(payment.status().to_string())
        .bind(payment.gateway_token())
        .bind(payment.gateway_transaction_id())
        .bind(payment.installments().map(|plan| plan.kind.to_string()))
        .bind(payment.installments().map(|plan| plan.count))
        .bind(payment.confirmation().map(|status| status.to_string()))
        .bind(payment.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("支払いの保存に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", PAYMENT_SELECT))
            .bind(payment_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("支払いの取得に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        row.map(|row| Self::payment_from_row(&row)).transpose()
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE gateway_token = ?", PAYMENT_SELECT))
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::QueryError(format!("支払いの取得に失敗しました: {}", e))
            })
            .map_err(RepositoryError::from)?;

        row.map(|row| Self::payment_from_row(&row)).transpose()
    }

    async fn find_pending_gateway_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{} WHERE order_id = ? AND method = 'Gateway' AND status = 'Pending' LIMIT 1",
            PAYMENT_SELECT
        ))
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("支払いの検索に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        row.map(|row| Self::payment_from_row(&row)).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE order_id = ? ORDER BY created_at DESC",
            PAYMENT_SELECT
        ))
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("支払い一覧の取得に失敗しました: {}", e)))
        .map_err(RepositoryError::from)?;

        rows.iter().map(Self::payment_from_row).collect()
    }

    fn next_identity(&self) -> PaymentId {
        PaymentId::new()
    }
}
