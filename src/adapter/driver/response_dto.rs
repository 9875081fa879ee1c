use crate::domain::model::{Order, Payment, Transfer};
use crate::domain::port::StockSummaryRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 注文明細のレスポンスDTO
/// 金額は固定小数点の文字列表現で返す
#[derive(Serialize, Deserialize)]
pub struct OrderLineResponse {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: String,
    pub discounted_unit_price: String,
    pub line_discount: String,
    pub pending_quantity: u32,
}

/// 注文詳細のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub shipping_method: String,
    pub status: String,
    pub preparation_status: String,
    pub assigned_picker: Option<Uuid>,
    pub stock_applied: bool,
    pub subtotal: String,
    pub discount_total: String,
    pub tax_total: String,
    pub total: String,
    pub notes: Vec<String>,
    pub ordered_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub lines: Vec<OrderLineResponse>,
}

impl OrderResponse {
    /// 注文集約からレスポンスDTOを構築する
    pub fn from_order(order: &Order) -> Self {
        let lines = order
            .lines()
            .iter()
            .map(|line| OrderLineResponse {
                product_id: line.product_id().as_uuid(),
                quantity: line.quantity(),
                unit_price: line.unit_price().amount().to_string(),
                discounted_unit_price: line.discounted_unit_price().amount().to_string(),
                line_discount: line
                    .line_discount()
                    .map(|discount| discount.amount().to_string())
                    .unwrap_or_else(|_| "0".to_string()),
                pending_quantity: line.pending_quantity(),
            })
            .collect();

        Self {
            id: order.id().as_uuid(),
            customer_id: order.customer_id().as_uuid(),
            branch_id: order.branch_id().as_uuid(),
            shipping_method: order.shipping_method().to_string(),
            status: order.status().to_string(),
            preparation_status: order.preparation_status().to_string(),
            assigned_picker: order.assigned_picker().map(|picker| picker.as_uuid()),
            stock_applied: order.stock_applied(),
            subtotal: order.subtotal().amount().to_string(),
            discount_total: order.discount_total().amount().to_string(),
            tax_total: order.tax_total().amount().to_string(),
            total: order.total().amount().to_string(),
            notes: order.notes().to_vec(),
            ordered_at: order.ordered_at(),
            delivered_at: order.delivered_at(),
            lines,
        }
    }
}

/// 移送明細のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct TransferLineResponse {
    pub product_id: Uuid,
    pub requested_quantity: u32,
    pub sent_quantity: Option<u32>,
    pub received_quantity: Option<u32>,
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
}

/// 移送のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct TransferResponse {
    pub id: Uuid,
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub reason: String,
    pub status: String,
    pub order_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub comments: Vec<String>,
    pub requested_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub lines: Vec<TransferLineResponse>,
}

impl TransferResponse {
    /// 移送集約からレスポンスDTOを構築する
    pub fn from_transfer(transfer: &Transfer) -> Self {
        let lines = transfer
            .lines()
            .iter()
            .map(|line| TransferLineResponse {
                product_id: line.product_id().as_uuid(),
                requested_quantity: line.requested_quantity(),
                sent_quantity: line.sent_quantity(),
                received_quantity: line.received_quantity(),
                source_warehouse_id: line.source_warehouse_id().as_uuid(),
                destination_warehouse_id: line.destination_warehouse_id().as_uuid(),
            })
            .collect();

        Self {
            id: transfer.id().as_uuid(),
            source_branch_id: transfer.source_branch_id().as_uuid(),
            destination_branch_id: transfer.destination_branch_id().as_uuid(),
            reason: transfer.reason().to_string(),
            status: transfer.status().to_string(),
            order_id: transfer.order_id().map(|id| id.as_uuid()),
            created_by: transfer.created_by().map(|id| id.as_uuid()),
            comments: transfer.comments().to_vec(),
            requested_at: transfer.requested_at(),
            dispatched_at: transfer.dispatched_at(),
            received_at: transfer.received_at(),
            lines,
        }
    }
}

/// 分割払いのレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct InstallmentResponse {
    pub kind: String,
    pub count: u32,
}

/// 支払いのレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: String,
    pub method: String,
    pub status: String,
    pub gateway_transaction_id: Option<String>,
    pub installments: Option<InstallmentResponse>,
    pub confirmation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentResponse {
    /// 支払い集約からレスポンスDTOを構築する
    pub fn from_payment(payment: &Payment) -> Self {
        Self {
            id: payment.id().as_uuid(),
            order_id: payment.order_id().as_uuid(),
            amount: payment.amount().amount().to_string(),
            method: payment.method().to_string(),
            status: payment.status().to_string(),
            gateway_transaction_id: payment
                .gateway_transaction_id()
                .map(|id| id.to_string()),
            installments: payment.installments().map(|plan| InstallmentResponse {
                kind: plan.kind.to_string(),
                count: plan.count,
            }),
            confirmation: payment.confirmation().map(|status| status.to_string()),
            created_at: payment.created_at(),
        }
    }
}

/// ゲートウェイ決済開始のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct GatewayInitiateResponse {
    pub token: String,
    pub url_redirect: String,
    pub order_id: Uuid,
}

/// ゲートウェイ戻り処理のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct GatewayReturnResponse {
    pub outcome: String,
    pub order_id: Uuid,
}

/// 店舗在庫集計のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct StockSummaryResponse {
    pub product_id: Uuid,
    pub total_quantity: u32,
    pub min_threshold: Option<u32>,
}

impl StockSummaryResponse {
    pub fn from_row(row: &StockSummaryRow) -> Self {
        Self {
            product_id: row.product_id.as_uuid(),
            total_quantity: row.total_quantity,
            min_threshold: row.min_threshold,
        }
    }
}

/// 在庫一括取り込みのレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct StockImportResponse {
    pub processed_rows: usize,
    pub applied_records: usize,
    pub errors: Vec<String>,
}

/// 在庫手動調整のレスポンスDTO
#[derive(Serialize, Deserialize)]
pub struct AdjustStockResponse {
    pub new_quantity: u32,
}
