use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapter::driver::request_dto::{
    ActorRequest, AdjustStockRequest, CancelTransferRequest, ChangeOrderStatusRequest,
    CheckoutRequest, CompleteTransferRequest, CreateTransferRequest, DispatchTransferRequest,
    GatewayReturnParams, InitiateGatewayPaymentRequest, ManualPaymentRequest, OrdersQueryParams,
    PreparationRequest, ReviewBankTransferRequest, TakePreparationRequest,
};
use crate::adapter::driver::response_dto::{
    AdjustStockResponse, GatewayInitiateResponse, GatewayReturnResponse, OrderResponse,
    PaymentResponse, StockImportResponse, StockSummaryResponse, TransferResponse,
};
use crate::application::service::{
    CheckoutCommand, CheckoutLine, GatewayReturnOutcome, OrderApplicationService,
    PaymentApplicationService, StockApplicationService, TransferApplicationService,
    TransferLineInput,
};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    ActorId, BranchId, CustomerId, Money, OrderId, OrderStatus, PaymentId, PaymentMethod,
    ProductId, ShippingMethod, TransferId, TransferReason, WarehouseId,
};

/// APIエラーレスポンス
#[derive(Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

// アプリケーションサービスを含む状態
pub type AppState = AppStateInner;

#[derive(Clone)]
pub struct AppStateInner {
    pub order_service: Arc<OrderApplicationService>,
    pub payment_service: Arc<PaymentApplicationService>,
    pub transfer_service: Arc<TransferApplicationService>,
    pub stock_service: Arc<StockApplicationService>,
}

/// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        // 注文
        .route("/orders", post(checkout))
        .route("/orders", get(get_orders))
        .route("/orders/:order_id", get(get_order_by_id))
        .route("/orders/:order_id/status", post(change_order_status))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route("/orders/:order_id/ship", post(ship_order))
        .route("/orders/:order_id/deliver", post(deliver_order))
        .route("/orders/:order_id/take-preparation", post(take_preparation))
        .route(
            "/orders/:order_id/start-preparation",
            post(start_preparation),
        )
        .route(
            "/orders/:order_id/confirm-preparation",
            post(confirm_preparation),
        )
        .route("/orders/:order_id/payments", get(get_order_payments))
        // 支払い
        .route(
            "/payments/gateway/:order_id/initiate",
            post(initiate_gateway_payment),
        )
        .route("/payments/gateway/return", get(gateway_return))
        .route("/payments/manual", post(register_manual_payment))
        .route("/payments/:payment_id/review", post(review_bank_transfer))
        .route("/payments/:payment_id/refund", post(refund_payment))
        // 移送
        .route("/transfers", post(create_transfer))
        .route("/transfers", get(get_transfers))
        .route("/transfers/:transfer_id", get(get_transfer_by_id))
        .route("/transfers/:transfer_id/dispatch", post(dispatch_transfer))
        .route("/transfers/:transfer_id/receive", post(receive_transfer))
        .route("/transfers/:transfer_id/complete", post(complete_transfer))
        .route("/transfers/:transfer_id/cancel", post(cancel_transfer))
        // 在庫
        .route("/stock/import", post(import_stock))
        .route("/stock/adjust", post(adjust_stock))
        .route("/stock/summary/:branch_id", get(branch_stock_summary))
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "hardware-order-fulfillment",
        "version": "0.1.0"
    }))
}

// チェックアウト（注文作成）エンドポイント
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), (StatusCode, Json<ApiError>)> {
    let shipping_method =
        ShippingMethod::from_string(&request.shipping_method).map_err(map_domain_error)?;
    let payment_method =
        PaymentMethod::from_string(&request.payment_method).map_err(map_domain_error)?;

    let customer_id = request
        .customer_id
        .map(CustomerId::from_uuid)
        .unwrap_or_else(CustomerId::new);

    let lines = request
        .lines
        .iter()
        .map(|line| {
            let unit_price = Money::clp(line.unit_price);
            let discounted_unit_price = line
                .discounted_unit_price
                .map(Money::clp)
                .unwrap_or(unit_price);
            CheckoutLine {
                product_id: ProductId::from_uuid(line.product_id),
                quantity: line.quantity,
                unit_price,
                discounted_unit_price,
            }
        })
        .collect();

    let command = CheckoutCommand {
        customer_id,
        branch_id: BranchId::from_uuid(request.branch_id),
        shipping_method,
        payment_method,
        lines,
        tax_total: Money::clp(request.tax_total.unwrap_or(0)),
        actor: request.actor_id.map(ActorId::from_uuid),
    };

    match state.order_service.checkout(command).await {
        Ok(order) => Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order)))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文一覧取得エンドポイント
async fn get_orders(
    State(state): State<AppState>,
    Query(params): Query<OrdersQueryParams>,
) -> Result<Json<Vec<OrderResponse>>, (StatusCode, Json<ApiError>)> {
    let orders = if let Some(status_str) = params.status {
        match state
            .order_service
            .get_orders_by_status_string(status_str)
            .await
        {
            Ok(orders) => orders,
            Err(err) => return Err(map_application_error(err)),
        }
    } else {
        match state.order_service.get_all_orders().await {
            Ok(orders) => orders,
            Err(err) => return Err(map_application_error(err)),
        }
    };

    let response: Vec<OrderResponse> = orders.iter().map(OrderResponse::from_order).collect();
    Ok(Json(response))
}

// 注文詳細取得エンドポイント
async fn get_order_by_id(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    let order_id = OrderId::from_uuid(order_id);

    match state.order_service.get_order_by_id(order_id).await {
        Ok(Some(order)) => Ok(Json(OrderResponse::from_order(&order))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: "指定された注文が見つかりません".to_string(),
                code: "ORDER_NOT_FOUND".to_string(),
            }),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文状態変更エンドポイント
async fn change_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ChangeOrderStatusRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    let status = OrderStatus::from_string(&request.status).map_err(map_domain_error)?;
    let actor = request.actor_id.map(ActorId::from_uuid);

    match state
        .order_service
        .change_status(OrderId::from_uuid(order_id), status, actor)
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文キャンセルエンドポイント
async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .order_service
        .cancel_order(
            OrderId::from_uuid(order_id),
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文発送エンドポイント
async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .order_service
        .ship_order(
            OrderId::from_uuid(order_id),
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文配達完了エンドポイント
async fn deliver_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .order_service
        .deliver_order(
            OrderId::from_uuid(order_id),
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// ピッキング引き受けエンドポイント
async fn take_preparation(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<TakePreparationRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .order_service
        .take_order_for_preparation(
            OrderId::from_uuid(order_id),
            ActorId::from_uuid(request.picker_id),
            BranchId::from_uuid(request.picker_branch_id),
        )
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// ピッキング開始エンドポイント
async fn start_preparation(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<PreparationRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .order_service
        .start_preparation(
            OrderId::from_uuid(order_id),
            ActorId::from_uuid(request.picker_id),
        )
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// ピッキング完了エンドポイント
async fn confirm_preparation(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<PreparationRequest>,
) -> Result<Json<OrderResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .order_service
        .confirm_preparation(
            OrderId::from_uuid(order_id),
            ActorId::from_uuid(request.picker_id),
        )
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文の支払い一覧取得エンドポイント
async fn get_order_payments(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, (StatusCode, Json<ApiError>)> {
    match state
        .payment_service
        .get_payments_for_order(OrderId::from_uuid(order_id))
        .await
    {
        Ok(payments) => Ok(Json(
            payments.iter().map(PaymentResponse::from_payment).collect(),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// ゲートウェイ決済開始エンドポイント
async fn initiate_gateway_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<InitiateGatewayPaymentRequest>,
) -> Result<Json<GatewayInitiateResponse>, (StatusCode, Json<ApiError>)> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match state
        .payment_service
        .initiate_gateway_payment(
            OrderId::from_uuid(order_id),
            session_id,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(redirect) => Ok(Json(GatewayInitiateResponse {
            token: redirect.token,
            url_redirect: redirect.redirect_url,
            order_id: redirect.order_id.as_uuid(),
        })),
        Err(err) => Err(map_application_error(err)),
    }
}

// ゲートウェイ戻りエンドポイント
// 正常な確定フローでは token_ws、フォーム上でのキャンセル・タイムアウトでは
// TBK_TOKEN（と TBK_ORDEN_COMPRA）が届く
async fn gateway_return(
    State(state): State<AppState>,
    Query(params): Query<GatewayReturnParams>,
) -> Result<Json<GatewayReturnResponse>, (StatusCode, Json<ApiError>)> {
    if let Some(token) = params.token_ws {
        let outcome = state
            .payment_service
            .commit_gateway_return(&token)
            .await
            .map_err(map_application_error)?;
        let (outcome_str, order_id) = match outcome {
            GatewayReturnOutcome::Approved(order_id) => ("approved", order_id),
            GatewayReturnOutcome::AwaitingReplenishment(order_id) => {
                ("awaiting_replenishment", order_id)
            }
            GatewayReturnOutcome::RejectedForStock(order_id) => ("rejected_stock", order_id),
            GatewayReturnOutcome::Declined(order_id) => ("declined", order_id),
        };
        return Ok(Json(GatewayReturnResponse {
            outcome: outcome_str.to_string(),
            order_id: order_id.as_uuid(),
        }));
    }

    if params.tbk_token.is_some() {
        let order_id_str = params.tbk_orden_compra.ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: "TBK_ORDEN_COMPRAがありません".to_string(),
                    code: "INVALID_PARAMETER".to_string(),
                }),
            )
        })?;
        let order_id = OrderId::from_string(&order_id_str).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: "無効な注文ID形式です".to_string(),
                    code: "INVALID_UUID".to_string(),
                }),
            )
        })?;
        let order = state
            .payment_service
            .handle_gateway_abort(order_id)
            .await
            .map_err(map_application_error)?;
        return Ok(Json(GatewayReturnResponse {
            outcome: "aborted".to_string(),
            order_id: order.id().as_uuid(),
        }));
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: "ゲートウェイのトークンがありません".to_string(),
            code: "INVALID_PARAMETER".to_string(),
        }),
    ))
}

// 手動支払い登録エンドポイント
async fn register_manual_payment(
    State(state): State<AppState>,
    Json(request): Json<ManualPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), (StatusCode, Json<ApiError>)> {
    let method = PaymentMethod::from_string(&request.method).map_err(map_domain_error)?;

    match state
        .payment_service
        .register_manual_payment(
            OrderId::from_uuid(request.order_id),
            method,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(payment) => Ok((
            StatusCode::CREATED,
            Json(PaymentResponse::from_payment(&payment)),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 銀行振込確認エンドポイント
async fn review_bank_transfer(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<ReviewBankTransferRequest>,
) -> Result<Json<PaymentResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .payment_service
        .review_bank_transfer(
            PaymentId::from_uuid(payment_id),
            request.approve,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(payment) => Ok(Json(PaymentResponse::from_payment(&payment))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 返金エンドポイント
async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<PaymentResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .payment_service
        .refund_payment(
            PaymentId::from_uuid(payment_id),
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(payment) => Ok(Json(PaymentResponse::from_payment(&payment))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送作成エンドポイント
async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), (StatusCode, Json<ApiError>)> {
    let reason = TransferReason::from_string(&request.reason).map_err(map_domain_error)?;
    let lines = request
        .lines
        .iter()
        .map(|line| TransferLineInput {
            product_id: ProductId::from_uuid(line.product_id),
            requested_quantity: line.requested_quantity,
            source_warehouse_id: WarehouseId::from_uuid(line.source_warehouse_id),
            destination_warehouse_id: WarehouseId::from_uuid(line.destination_warehouse_id),
        })
        .collect();

    match state
        .transfer_service
        .create_transfer(
            BranchId::from_uuid(request.source_branch_id),
            BranchId::from_uuid(request.destination_branch_id),
            reason,
            lines,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(transfer) => Ok((
            StatusCode::CREATED,
            Json(TransferResponse::from_transfer(&transfer)),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送一覧取得エンドポイント
async fn get_transfers(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransferResponse>>, (StatusCode, Json<ApiError>)> {
    match state.transfer_service.get_all_transfers().await {
        Ok(transfers) => Ok(Json(
            transfers
                .iter()
                .map(TransferResponse::from_transfer)
                .collect(),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送詳細取得エンドポイント
async fn get_transfer_by_id(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> Result<Json<TransferResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .transfer_service
        .get_transfer_by_id(TransferId::from_uuid(transfer_id))
        .await
    {
        Ok(Some(transfer)) => Ok(Json(TransferResponse::from_transfer(&transfer))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: "指定された移送が見つかりません".to_string(),
                code: "TRANSFER_NOT_FOUND".to_string(),
            }),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送出荷エンドポイント
async fn dispatch_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(request): Json<DispatchTransferRequest>,
) -> Result<Json<TransferResponse>, (StatusCode, Json<ApiError>)> {
    let sent = request
        .sent
        .iter()
        .map(|entry| (ProductId::from_uuid(entry.product_id), entry.quantity))
        .collect();

    match state
        .transfer_service
        .dispatch_transfer(
            TransferId::from_uuid(transfer_id),
            sent,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(transfer) => Ok(Json(TransferResponse::from_transfer(&transfer))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送到着記録エンドポイント
async fn receive_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<TransferResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .transfer_service
        .receive_transfer(
            TransferId::from_uuid(transfer_id),
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(transfer) => Ok(Json(TransferResponse::from_transfer(&transfer))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送完了エンドポイント
async fn complete_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(request): Json<CompleteTransferRequest>,
) -> Result<Json<TransferResponse>, (StatusCode, Json<ApiError>)> {
    let received = request
        .received
        .iter()
        .map(|entry| (ProductId::from_uuid(entry.product_id), entry.quantity))
        .collect();

    match state
        .transfer_service
        .complete_transfer(
            TransferId::from_uuid(transfer_id),
            received,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(transfer) => Ok(Json(TransferResponse::from_transfer(&transfer))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 移送キャンセルエンドポイント
async fn cancel_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
    Json(request): Json<CancelTransferRequest>,
) -> Result<Json<TransferResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .transfer_service
        .cancel_transfer(
            TransferId::from_uuid(transfer_id),
            request.reason,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(transfer) => Ok(Json(TransferResponse::from_transfer(&transfer))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫一括取り込みエンドポイント
// リクエストボディはCSVテキスト
async fn import_stock(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<StockImportResponse>), (StatusCode, Json<ApiError>)> {
    match state.stock_service.import_stock(&body, None).await {
        Ok(report) => {
            let status = if report.errors.is_empty() {
                StatusCode::CREATED
            } else if report.applied_records > 0 {
                StatusCode::MULTI_STATUS
            } else {
                StatusCode::BAD_REQUEST
            };
            Ok((
                status,
                Json(StockImportResponse {
                    processed_rows: report.processed_rows,
                    applied_records: report.applied_records,
                    errors: report.errors,
                }),
            ))
        }
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫手動調整エンドポイント
async fn adjust_stock(
    State(state): State<AppState>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<AdjustStockResponse>, (StatusCode, Json<ApiError>)> {
    match state
        .stock_service
        .adjust_stock(
            &request.product_sku,
            WarehouseId::from_uuid(request.warehouse_id),
            request.delta,
            request.reason,
            request.actor_id.map(ActorId::from_uuid),
        )
        .await
    {
        Ok(new_quantity) => Ok(Json(AdjustStockResponse { new_quantity })),
        Err(err) => Err(map_application_error(err)),
    }
}

// 店舗在庫集計エンドポイント
async fn branch_stock_summary(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Vec<StockSummaryResponse>>, (StatusCode, Json<ApiError>)> {
    match state
        .stock_service
        .branch_stock_summary(BranchId::from_uuid(branch_id))
        .await
    {
        Ok(rows) => Ok(Json(rows.iter().map(StockSummaryResponse::from_row).collect())),
        Err(err) => Err(map_application_error(err)),
    }
}

// アプリケーションエラーをHTTPエラーにマッピング
fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    match err {
        ApplicationError::DomainError(domain_err) => map_domain_error(domain_err),
        ApplicationError::RepositoryError(repo_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: format!("{}", repo_err),
                code: "REPOSITORY_ERROR".to_string(),
            }),
        ),
        ApplicationError::GatewayError(gateway_err) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiError {
                error: format!("{}", gateway_err),
                code: "GATEWAY_ERROR".to_string(),
            }),
        ),
        ApplicationError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: msg,
                code: "NOT_FOUND".to_string(),
            }),
        ),
        ApplicationError::Forbidden(msg) => (
            StatusCode::FORBIDDEN,
            Json(ApiError {
                error: msg,
                code: "FORBIDDEN".to_string(),
            }),
        ),
        ApplicationError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "VALIDATION_ERROR".to_string(),
            }),
        ),
    }
}

// ドメインエラーを適切なHTTPステータスコードとエラーコードにマッピング
fn map_domain_error(domain_err: DomainError) -> (StatusCode, Json<ApiError>) {
    match domain_err {
        DomainError::InvalidOrderState(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "INVALID_ORDER_STATE".to_string(),
            }),
        ),
        DomainError::InvalidTransferState(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "INVALID_TRANSFER_STATE".to_string(),
            }),
        ),
        DomainError::InvalidPaymentState(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "INVALID_PAYMENT_STATE".to_string(),
            }),
        ),
        DomainError::InsufficientStock(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "INSUFFICIENT_STOCK".to_string(),
            }),
        ),
        DomainError::InvalidQuantity => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: "無効な数量です".to_string(),
                code: "INVALID_QUANTITY".to_string(),
            }),
        ),
        DomainError::WarehouseMismatch(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "WAREHOUSE_MISMATCH".to_string(),
            }),
        ),
        // 構成エラーは業務エラーではないため5xxとして扱う
        DomainError::ConfigurationError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: msg,
                code: "CONFIGURATION_ERROR".to_string(),
            }),
        ),
        DomainError::CurrencyMismatch => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: "通貨が一致しません".to_string(),
                code: "CURRENCY_MISMATCH".to_string(),
            }),
        ),
        DomainError::InvalidValue(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: msg,
                code: "INVALID_VALUE".to_string(),
            }),
        ),
        DomainError::RepositoryError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                error: msg,
                code: "REPOSITORY_ERROR".to_string(),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_from_string_valid() {
        assert!(OrderStatus::from_string("Pending").is_ok());
        assert!(OrderStatus::from_string("PendingReplenishment").is_ok());
        assert!(OrderStatus::from_string("RejectedStock").is_ok());
        assert!(OrderStatus::from_string("Delivered").is_ok());
    }

    #[test]
    fn test_order_status_from_string_invalid() {
        assert!(OrderStatus::from_string("Invalid").is_err());
        assert!(OrderStatus::from_string("pending").is_err()); // 大文字小文字が違う
        assert!(OrderStatus::from_string("").is_err());
    }

    #[test]
    fn test_map_application_error_not_found() {
        let app_error = ApplicationError::NotFound("リソースが見つかりません".to_string());
        let (status, Json(api_error)) = map_application_error(app_error);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.code, "NOT_FOUND");
        assert_eq!(api_error.error, "リソースが見つかりません");
    }

    #[test]
    fn test_map_domain_error_insufficient_stock() {
        let (status, Json(api_error)) =
            map_domain_error(DomainError::InsufficientStock("在庫不足".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.code, "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_map_domain_error_configuration_is_5xx() {
        let (status, Json(api_error)) =
            map_domain_error(DomainError::ConfigurationError("倉庫なし".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.code, "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_api_error_structure() {
        let api_error = ApiError {
            error: "テストエラー".to_string(),
            code: "TEST_ERROR".to_string(),
        };

        let json = serde_json::to_string(&api_error).unwrap();
        assert!(json.contains("テストエラー"));
        assert!(json.contains("TEST_ERROR"));

        let deserialized: ApiError = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.error, "テストエラー");
        assert_eq!(deserialized.code, "TEST_ERROR");
    }
}
