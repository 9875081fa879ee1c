use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// チェックアウト明細のリクエストDTO
/// 単価・割引後単価は価格計算コラボレーターが確定した整数ペソ
#[derive(Serialize, Deserialize)]
pub struct CheckoutLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: i64,
    pub discounted_unit_price: Option<i64>,
}

/// チェックアウト（注文作成）のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: Option<Uuid>,
    pub branch_id: Uuid,
    pub shipping_method: String,
    pub payment_method: String,
    pub lines: Vec<CheckoutLineRequest>,
    pub tax_total: Option<i64>,
    pub actor_id: Option<Uuid>,
}

/// 注文状態変更のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct ChangeOrderStatusRequest {
    pub status: String,
    pub actor_id: Option<Uuid>,
}

/// 操作者のみを運ぶリクエストDTO（キャンセル・発送・配達など）
#[derive(Serialize, Deserialize, Default)]
pub struct ActorRequest {
    pub actor_id: Option<Uuid>,
}

/// ピッキング引き受けのリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct TakePreparationRequest {
    pub picker_id: Uuid,
    pub picker_branch_id: Uuid,
}

/// ピッキング作業のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct PreparationRequest {
    pub picker_id: Uuid,
}

/// ゲートウェイ決済開始のリクエストDTO
#[derive(Serialize, Deserialize, Default)]
pub struct InitiateGatewayPaymentRequest {
    pub session_id: Option<String>,
    pub actor_id: Option<Uuid>,
}

/// ゲートウェイからの戻りのクエリパラメータ
/// 正常な確定フローでは token_ws、フォーム上でのキャンセル・
/// タイムアウトでは TBK_TOKEN（と TBK_ORDEN_COMPRA）が届く
#[derive(Deserialize)]
pub struct GatewayReturnParams {
    pub token_ws: Option<String>,
    #[serde(rename = "TBK_TOKEN")]
    pub tbk_token: Option<String>,
    #[serde(rename = "TBK_ORDEN_COMPRA")]
    pub tbk_orden_compra: Option<String>,
}

/// 手動支払い登録のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct ManualPaymentRequest {
    pub order_id: Uuid,
    pub method: String,
    pub actor_id: Option<Uuid>,
}

/// 銀行振込確認のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct ReviewBankTransferRequest {
    pub approve: bool,
    pub actor_id: Option<Uuid>,
}

/// 移送明細のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct TransferLineRequest {
    pub product_id: Uuid,
    pub requested_quantity: u32,
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
}

/// 移送作成のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateTransferRequest {
    pub source_branch_id: Uuid,
    pub destination_branch_id: Uuid,
    pub reason: String,
    pub lines: Vec<TransferLineRequest>,
    pub actor_id: Option<Uuid>,
}

/// 移送の数量記録（出荷・受領）のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct TransferQuantityRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// 移送出荷のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct DispatchTransferRequest {
    pub sent: Vec<TransferQuantityRequest>,
    pub actor_id: Option<Uuid>,
}

/// 移送完了のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CompleteTransferRequest {
    pub received: Vec<TransferQuantityRequest>,
    pub actor_id: Option<Uuid>,
}

/// 移送キャンセルのリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CancelTransferRequest {
    pub reason: String,
    pub actor_id: Option<Uuid>,
}

/// 在庫手動調整のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct AdjustStockRequest {
    pub product_sku: String,
    pub warehouse_id: Uuid,
    pub delta: i64,
    pub reason: String,
    pub actor_id: Option<Uuid>,
}

/// 注文一覧取得用のクエリパラメータ
#[derive(Deserialize)]
pub struct OrdersQueryParams {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_request_deserialization() {
        let json = r#"{
            "branch_id": "4bb38569-1ab9-40e4-9c7f-7fa235bd1c72",
            "shipping_method": "StorePickup",
            "payment_method": "Cash",
            "lines": [
                {"product_id": "8b9cfb0c-6b06-49a9-9d6f-2a3047b5a331", "quantity": 2, "unit_price": 4990}
            ]
        }"#;
        let request: CheckoutRequest = serde_json::from_str(json).unwrap();
        assert!(request.customer_id.is_none());
        assert_eq!(request.lines.len(), 1);
        assert_eq!(request.lines[0].quantity, 2);
        assert!(request.lines[0].discounted_unit_price.is_none());
    }

    #[test]
    fn test_gateway_return_params_commit_flow() {
        let params: GatewayReturnParams =
            serde_json::from_str(r#"{"token_ws": "tok-123"}"#).unwrap();
        assert_eq!(params.token_ws.as_deref(), Some("tok-123"));
        assert!(params.tbk_token.is_none());
    }

    #[test]
    fn test_gateway_return_params_abort_flow() {
        let params: GatewayReturnParams = serde_json::from_str(
            r#"{"TBK_TOKEN": "tok-456", "TBK_ORDEN_COMPRA": "order-1"}"#,
        )
        .unwrap();
        assert!(params.token_ws.is_none());
        assert_eq!(params.tbk_token.as_deref(), Some("tok-456"));
        assert_eq!(params.tbk_orden_compra.as_deref(), Some("order-1"));
    }

    #[test]
    fn test_change_order_status_request_serialization() {
        let request = ChangeOrderStatusRequest {
            status: "Paid".to_string(),
            actor_id: Some(Uuid::new_v4()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Paid"));
    }
}
