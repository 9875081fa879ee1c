use hardware_order_fulfillment::adapter::driven::{
    ConsoleLogger, InMemoryActivityLog, InMemoryBranchDirectory, InMemoryOrderRepository,
    InMemoryPaymentRepository, InMemoryProductCatalog, InMemoryStockRepository,
    InMemoryTransferRepository,
};
use hardware_order_fulfillment::application::service::{
    CheckoutCommand, CheckoutLine, GatewayReturnOutcome, OrderApplicationService,
    PaymentApplicationService,
};
use hardware_order_fulfillment::domain::model::{
    Branch, BranchId, CustomerId, Money, OrderStatus, PaymentMethod, PaymentStatus, Product,
    ProductId, ShippingMethod, Warehouse, WarehouseId, WarehouseKind,
};
use hardware_order_fulfillment::domain::port::{
    GatewayCommit, GatewayError, GatewayTransaction, OrderRepository, PaymentGateway,
    PaymentRepository, StockRepository, TransferRepository,
};
use hardware_order_fulfillment::domain::service::StockMutationService;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// テスト用のモックゲートウェイ
/// createで発行したトークンと注文番号の対応を保持し、
/// commitで設定された応答を返す
struct MockGateway {
    approve: bool,
    response_code: i32,
    installments_number: Option<u32>,
    payment_type_code: Option<String>,
    tokens: Mutex<HashMap<String, (String, i64)>>,
    counter: Mutex<u32>,
}

impl MockGateway {
    fn approving() -> Self {
        Self {
            approve: true,
            response_code: 0,
            installments_number: None,
            payment_type_code: None,
            tokens: Mutex::new(HashMap::new()),
            counter: Mutex::new(0),
        }
    }

    fn declining() -> Self {
        Self {
            approve: false,
            response_code: -1,
            installments_number: None,
            payment_type_code: None,
            tokens: Mutex::new(HashMap::new()),
            counter: Mutex::new(0),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create(
        &self,
        buy_order: &str,
        _session_id: &str,
        amount: i64,
        _return_url: &str,
    ) -> Result<GatewayTransaction, GatewayError> {
        let mut counter = self.counter.lock().await;
        *counter += 1;
        let token = format!("tok-{}", *counter);
        self.tokens
            .lock()
            .await
            .insert(token.clone(), (buy_order.to_string(), amount));
        Ok(GatewayTransaction {
            token: token.clone(),
            redirect_url: format!("https://gateway.example/webpay?token={}", token),
        })
    }

    async fn commit(&self, token: &str) -> Result<GatewayCommit, GatewayError> {
        let tokens = self.tokens.lock().await;
        let (buy_order, amount) = tokens
            .get(token)
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse("unknown token".to_string()))?;
        Ok(GatewayCommit {
            status: if self.approve {
                "AUTHORIZED".to_string()
            } else {
                "FAILED".to_string()
            },
            response_code: self.response_code,
            authorization_code: if self.approve {
                Some("1213".to_string())
            } else {
                None
            },
            amount,
            buy_order,
            installments_number: self.installments_number,
            payment_type_code: self.payment_type_code.clone(),
        })
    }
}

/// テスト用の環境一式
struct World {
    order_repository: Arc<InMemoryOrderRepository>,
    stock_repository: Arc<InMemoryStockRepository>,
    transfer_repository: Arc<InMemoryTransferRepository>,
    payment_repository: Arc<InMemoryPaymentRepository>,
    directory: Arc<InMemoryBranchDirectory>,
    catalog: Arc<InMemoryProductCatalog>,
    activity_log: Arc<InMemoryActivityLog>,
    order_service: Arc<OrderApplicationService>,
    payment_service: Arc<PaymentApplicationService>,
}

impl World {
    fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        let order_repository = Arc::new(InMemoryOrderRepository::new());
        let stock_repository = Arc::new(InMemoryStockRepository::new());
        let transfer_repository = Arc::new(InMemoryTransferRepository::new());
        let payment_repository = Arc::new(InMemoryPaymentRepository::new());
        let directory = Arc::new(InMemoryBranchDirectory::new());
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let activity_log = Arc::new(InMemoryActivityLog::new());
        let logger = Arc::new(ConsoleLogger::new());

        let stock_service = Arc::new(StockMutationService::new(
            stock_repository.clone(),
            transfer_repository.clone(),
            directory.clone(),
        ));
        let order_service = Arc::new(OrderApplicationService::new(
            order_repository.clone(),
            transfer_repository.clone(),
            directory.clone(),
            catalog.clone(),
            stock_service.clone(),
            activity_log.clone(),
            logger.clone(),
        ));
        let payment_service = Arc::new(PaymentApplicationService::new(
            payment_repository.clone(),
            order_repository.clone(),
            transfer_repository.clone(),
            stock_service,
            gateway,
            activity_log.clone(),
            logger,
            "http://localhost:3000/payments/gateway/return".to_string(),
        ));

        Self {
            order_repository,
            stock_repository,
            transfer_repository,
            payment_repository,
            directory,
            catalog,
            activity_log,
            order_service,
            payment_service,
        }
    }

    async fn add_branch_with_warehouse(&self) -> (BranchId, WarehouseId) {
        let branch_id = BranchId::new();
        let warehouse_id = WarehouseId::new();
        self.directory
            .add_branch(Branch {
                id: branch_id,
                name: format!("店舗-{}", branch_id),
                active: true,
            })
            .await;
        self.directory
            .add_warehouse(Warehouse {
                id: warehouse_id,
                branch_id,
                kind: WarehouseKind::SalesFloor,
                active: true,
            })
            .await;
        (branch_id, warehouse_id)
    }

    async fn add_product(&self, sku: &str) -> ProductId {
        let product_id = ProductId::new();
        self.catalog
            .add_product(Product {
                id: product_id,
                sku: sku.to_string(),
                name: format!("商品-{}", sku),
            })
            .await;
        product_id
    }

    fn checkout_command(
        &self,
        branch_id: BranchId,
        product_id: ProductId,
        quantity: u32,
        payment_method: PaymentMethod,
    ) -> CheckoutCommand {
        CheckoutCommand {
            customer_id: CustomerId::new(),
            branch_id,
            shipping_method: ShippingMethod::HomeDelivery,
            payment_method,
            lines: vec![CheckoutLine {
                product_id,
                quantity,
                unit_price: Money::clp(2500),
                discounted_unit_price: Money::clp(2500),
            }],
            tax_total: Money::zero(),
            actor: None,
        }
    }

    async fn order_status(
        &self,
        order_id: hardware_order_fulfillment::domain::model::OrderId,
    ) -> OrderStatus {
        self.order_repository
            .find_by_id(order_id)
            .await
            .unwrap()
            .unwrap()
            .status()
    }
}

/// ゲートウェイ決済ではチェックアウト時点で在庫が引き当てられず、
/// 承認後に初めて引き当てられて注文がPaidになる
#[tokio::test]
async fn test_gateway_approval_applies_stock_and_marks_paid() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("GW-01").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Gateway))
        .await
        .unwrap();
    // 在庫は作成時点では引き当てられない
    assert!(!order.stock_applied());
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );

    let redirect = world
        .payment_service
        .initiate_gateway_payment(order.id(), "session-1".to_string(), None)
        .await
        .unwrap();
    assert!(redirect.redirect_url.contains(&redirect.token));

    let outcome = world
        .payment_service
        .commit_gateway_return(&redirect.token)
        .await
        .unwrap();
    assert_eq!(outcome, GatewayReturnOutcome::Approved(order.id()));

    assert_eq!(world.order_status(order.id()).await, OrderStatus::Paid);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );

    let payments = world
        .payment_repository
        .find_by_order(order.id())
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status(), PaymentStatus::Completed);
    assert_eq!(payments[0].gateway_transaction_id(), Some("1213"));
}

/// 承認後の引き当てが部分充足なら注文は補充待ちになる
#[tokio::test]
async fn test_gateway_approval_with_shortfall_awaits_replenishment() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("GW-02").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 2)
        .await;
    world
        .stock_repository
        .seed(other_branch_id, other_warehouse_id, product_id, 10)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 5, PaymentMethod::Gateway))
        .await
        .unwrap();
    let redirect = world
        .payment_service
        .initiate_gateway_payment(order.id(), "session-2".to_string(), None)
        .await
        .unwrap();

    let outcome = world
        .payment_service
        .commit_gateway_return(&redirect.token)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        GatewayReturnOutcome::AwaitingReplenishment(order.id())
    );
    assert_eq!(
        world.order_status(order.id()).await,
        OrderStatus::PendingReplenishment
    );
    assert_eq!(world.transfer_repository.find_all().await.unwrap().len(), 1);
}

/// 支払い完了後にどの倉庫からも補充できない場合、注文は在庫拒否へ
/// 強制され、支払いはCompletedのまま不整合がメモに記録される
#[tokio::test]
async fn test_post_payment_stock_error_rejects_order_explicitly() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("GW-03").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Gateway))
        .await
        .unwrap();
    let redirect = world
        .payment_service
        .initiate_gateway_payment(order.id(), "session-3".to_string(), None)
        .await
        .unwrap();

    // リダイレクト中に在庫が他の注文に奪われたケース
    world
        .stock_repository
        .decrement(warehouse_id, product_id, 5)
        .await
        .unwrap();

    let outcome = world
        .payment_service
        .commit_gateway_return(&redirect.token)
        .await
        .unwrap();
    assert_eq!(outcome, GatewayReturnOutcome::RejectedForStock(order.id()));

    let order = world
        .order_repository
        .find_by_id(order.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status(), OrderStatus::RejectedStock);
    assert!(!order.notes().is_empty());

    // 支払いは完了のまま残り、不整合は活動ログにも記録される
    let payments = world
        .payment_repository
        .find_by_order(order.id())
        .await
        .unwrap();
    assert_eq!(payments[0].status(), PaymentStatus::Completed);
    assert_eq!(
        world
            .activity_log
            .count_action("POST_PAYMENT_STOCK_ERROR")
            .await,
        1
    );
}

/// ゲートウェイに拒否された場合、注文はFailedになり在庫は動かない
#[tokio::test]
async fn test_gateway_decline_fails_order_without_stock_effect() {
    let world = World::new(Arc::new(MockGateway::declining()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("GW-04").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Gateway))
        .await
        .unwrap();
    let redirect = world
        .payment_service
        .initiate_gateway_payment(order.id(), "session-4".to_string(), None)
        .await
        .unwrap();

    let outcome = world
        .payment_service
        .commit_gateway_return(&redirect.token)
        .await
        .unwrap();
    assert_eq!(outcome, GatewayReturnOutcome::Declined(order.id()));
    assert_eq!(world.order_status(order.id()).await, OrderStatus::Failed);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );
}

/// 確定前の離脱（キャンセル・タイムアウト）ではPendingの注文が
/// キャンセルされ、在庫への影響はない
#[tokio::test]
async fn test_gateway_abort_cancels_pending_order() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("GW-05").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Gateway))
        .await
        .unwrap();
    world
        .payment_service
        .initiate_gateway_payment(order.id(), "session-5".to_string(), None)
        .await
        .unwrap();

    world
        .payment_service
        .handle_gateway_abort(order.id())
        .await
        .unwrap();

    assert_eq!(world.order_status(order.id()).await, OrderStatus::Cancelled);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );
    let payments = world
        .payment_repository
        .find_by_order(order.id())
        .await
        .unwrap();
    assert_eq!(payments[0].status(), PaymentStatus::Failed);
}

/// シナリオD: 現金で支払い済みになった注文をキャンセルすると
/// 在庫が戻り、注文はCancelledになる
#[tokio::test]
async fn test_cancelling_paid_manual_order_reverses_stock() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("CASH-01").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    // 現金払いでは作成時に在庫が引き当てられる
    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );

    // 現金支払いは即時完了し、注文はPaidへ
    world
        .payment_service
        .register_manual_payment(order.id(), PaymentMethod::Cash, None)
        .await
        .unwrap();
    assert_eq!(world.order_status(order.id()).await, OrderStatus::Paid);

    // キャンセルで在庫が戻る
    world
        .order_service
        .cancel_order(order.id(), None)
        .await
        .unwrap();
    assert_eq!(world.order_status(order.id()).await, OrderStatus::Cancelled);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );
}

/// 銀行振込は確認されるまで注文を進めない
#[tokio::test]
async fn test_bank_transfer_requires_manual_confirmation() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("BT-01").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::BankTransfer))
        .await
        .unwrap();
    let payment = world
        .payment_service
        .register_manual_payment(order.id(), PaymentMethod::BankTransfer, None)
        .await
        .unwrap();

    // 確認されるまで注文はPendingのまま
    assert_eq!(payment.status(), PaymentStatus::Pending);
    assert_eq!(world.order_status(order.id()).await, OrderStatus::Pending);

    // 確認すると注文はPaidへ（在庫は作成時に引き当て済みのまま）
    world
        .payment_service
        .review_bank_transfer(payment.id(), true, None)
        .await
        .unwrap();
    assert_eq!(world.order_status(order.id()).await, OrderStatus::Paid);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );
}

/// 銀行振込の却下では事前に引き当てた在庫が戻り、注文はFailedになる
#[tokio::test]
async fn test_bank_transfer_rejection_reverses_prededucted_stock() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("BT-02").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::BankTransfer))
        .await
        .unwrap();
    let payment = world
        .payment_service
        .register_manual_payment(order.id(), PaymentMethod::BankTransfer, None)
        .await
        .unwrap();

    world
        .payment_service
        .review_bank_transfer(payment.id(), false, None)
        .await
        .unwrap();

    assert_eq!(world.order_status(order.id()).await, OrderStatus::Failed);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );
}

/// 支払い確認後も補充待ちの注文はPendingReplenishmentのまま
/// （支払いは確認されたが在庫を待っている）
#[tokio::test]
async fn test_confirmed_payment_keeps_replenishment_wait() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("BT-03").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 1)
        .await;
    world
        .stock_repository
        .seed(other_branch_id, other_warehouse_id, product_id, 10)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 4, PaymentMethod::BankTransfer))
        .await
        .unwrap();
    assert_eq!(
        world.order_status(order.id()).await,
        OrderStatus::PendingReplenishment
    );

    let payment = world
        .payment_service
        .register_manual_payment(order.id(), PaymentMethod::BankTransfer, None)
        .await
        .unwrap();
    world
        .payment_service
        .review_bank_transfer(payment.id(), true, None)
        .await
        .unwrap();

    // 支払い完了後もPendingReplenishmentのまま
    assert_eq!(
        world.order_status(order.id()).await,
        OrderStatus::PendingReplenishment
    );
}

/// 返金では引き当て済みの在庫が戻り、注文はキャンセルされる
#[tokio::test]
async fn test_refund_reverses_stock_and_cancels_order() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("RF-01").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash))
        .await
        .unwrap();
    let payment = world
        .payment_service
        .register_manual_payment(order.id(), PaymentMethod::Cash, None)
        .await
        .unwrap();

    world
        .payment_service
        .refund_payment(payment.id(), None)
        .await
        .unwrap();

    assert_eq!(world.order_status(order.id()).await, OrderStatus::Cancelled);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );
    let payments = world
        .payment_repository
        .find_by_order(order.id())
        .await
        .unwrap();
    assert_eq!(payments[0].status(), PaymentStatus::Refunded);
}

/// Failedからの復帰では在庫が再引き当てされる
/// （失敗時に在庫が戻されているため）
#[tokio::test]
async fn test_recovery_from_failed_reapplies_stock() {
    let world = World::new(Arc::new(MockGateway::approving()));
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("FR-01").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::BankTransfer))
        .await
        .unwrap();
    let payment = world
        .payment_service
        .register_manual_payment(order.id(), PaymentMethod::BankTransfer, None)
        .await
        .unwrap();

    // 却下で在庫が戻り、注文はFailedに
    world
        .payment_service
        .review_bank_transfer(payment.id(), false, None)
        .await
        .unwrap();
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        5
    );

    // Failed → Paid では在庫が再引き当てされる
    world
        .order_service
        .change_status(order.id(), OrderStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(world.order_status(order.id()).await, OrderStatus::Paid);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );
}
