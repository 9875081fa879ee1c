use hardware_order_fulfillment::adapter::driven::{
    ConsoleLogger, InMemoryActivityLog, InMemoryBranchDirectory, InMemoryOrderRepository,
    InMemoryProductCatalog, InMemoryStockRepository, InMemoryTransferRepository,
};
use hardware_order_fulfillment::application::service::{
    CheckoutCommand, CheckoutLine, OrderApplicationService, TransferApplicationService,
};
use hardware_order_fulfillment::application::ApplicationError;
use hardware_order_fulfillment::domain::error::DomainError;
use hardware_order_fulfillment::domain::model::{
    Branch, BranchId, CustomerId, Money, OrderStatus, PaymentMethod, Product, ProductId,
    ShippingMethod, TransferReason, TransferStatus, Warehouse, WarehouseId, WarehouseKind,
};
use hardware_order_fulfillment::domain::port::{
    BranchDirectory, OrderRepository, StockRepository, TransferRepository,
};
use hardware_order_fulfillment::domain::service::StockMutationService;

use std::sync::Arc;

/// テスト用の環境一式
struct World {
    order_repository: Arc<InMemoryOrderRepository>,
    stock_repository: Arc<InMemoryStockRepository>,
    transfer_repository: Arc<InMemoryTransferRepository>,
    directory: Arc<InMemoryBranchDirectory>,
    catalog: Arc<InMemoryProductCatalog>,
    activity_log: Arc<InMemoryActivityLog>,
    stock_service: Arc<StockMutationService>,
    order_service: Arc<OrderApplicationService>,
    transfer_service: Arc<TransferApplicationService>,
}

impl World {
    fn new() -> Self {
        let order_repository = Arc::new(InMemoryOrderRepository::new());
        let stock_repository = Arc::new(InMemoryStockRepository::new());
        let transfer_repository = Arc::new(InMemoryTransferRepository::new());
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
        let transfer_service = Arc::new(TransferApplicationService::new(
            transfer_repository.clone(),
            stock_repository.clone(),
            order_repository.clone(),
            directory.clone(),
            stock_service.clone(),
            activity_log.clone(),
            logger,
        ));

        Self {
            order_repository,
            stock_repository,
            transfer_repository,
            directory,
            catalog,
            activity_log,
            stock_service,
            order_service,
            transfer_service,
        }
    }

    /// 売場倉庫を1つ持つ店舗を登録する
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
            shipping_method: ShippingMethod::StorePickup,
            payment_method,
            lines: vec![CheckoutLine {
                product_id,
                quantity,
                unit_price: Money::clp(1000),
                discounted_unit_price: Money::clp(1000),
            }],
            tax_total: Money::zero(),
            actor: None,
        }
    }
}

/// シナリオA: 倉庫Wに5個、5個の注文 → Satisfied、W残0、注文Pending
#[tokio::test]
async fn test_exact_stock_is_fully_satisfied() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("HAMMER-01").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 5, PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(order.status(), OrderStatus::Pending);
    assert!(order.stock_applied());
    assert!(!order.has_pending_stock());
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        0
    );
}

/// シナリオB: Wに2個、別店舗のW2に10個、5個の注文
/// → W残0、不足3の移送（Pending）が作成され、注文はPendingReplenishment
#[tokio::test]
async fn test_shortfall_opens_automatic_transfer() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("DRILL-02").await;
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
        .checkout(world.checkout_command(branch_id, product_id, 5, PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(order.status(), OrderStatus::PendingReplenishment);
    assert!(order.has_pending_stock());
    assert_eq!(order.lines()[0].pending_quantity(), 3);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        0
    );

    let transfers = world.transfer_repository.find_all().await.unwrap();
    assert_eq!(transfers.len(), 1);
    let transfer = &transfers[0];
    assert_eq!(transfer.status(), TransferStatus::Pending);
    assert_eq!(transfer.reason(), TransferReason::OrderCompletion);
    assert_eq!(transfer.source_branch_id(), other_branch_id);
    assert_eq!(transfer.destination_branch_id(), branch_id);
    assert_eq!(transfer.order_id(), Some(order.id()));
    assert_eq!(transfer.lines().len(), 1);
    assert_eq!(transfer.lines()[0].requested_quantity(), 3);
    assert_eq!(transfer.lines()[0].source_warehouse_id(), other_warehouse_id);
    assert_eq!(transfer.lines()[0].destination_warehouse_id(), warehouse_id);
}

/// シナリオC: どの倉庫にも不足分をカバーする在庫がない
/// → InsufficientStock、在庫は一切変更されず、注文も永続化されない
#[tokio::test]
async fn test_uncoverable_shortfall_aborts_creation() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("SAW-03").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 2)
        .await;
    // 不足3に対して2しかないため移送元になれない
    world
        .stock_repository
        .seed(other_branch_id, other_warehouse_id, product_id, 2)
        .await;

    let result = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 5, PaymentMethod::Cash))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::DomainError(
            DomainError::InsufficientStock(_)
        ))
    ));
    // 在庫は一切変更されない
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );
    assert_eq!(
        world
            .stock_repository
            .quantity_of(other_warehouse_id, product_id)
            .await,
        2
    );
    // 注文も移送も永続化されない
    assert!(world.order_repository.find_all().await.unwrap().is_empty());
    assert!(world
        .transfer_repository
        .find_all()
        .await
        .unwrap()
        .is_empty());
}

/// シナリオE: 移送の出荷・受領・完了が在庫を動かし、
/// 完了時に待機中の注文が自動で再引き当てされてSatisfiedに到達する
#[tokio::test]
async fn test_transfer_completion_retries_waiting_order() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("WRENCH-04").await;
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
        .checkout(world.checkout_command(branch_id, product_id, 5, PaymentMethod::Cash))
        .await
        .unwrap();
    let transfers = world.transfer_repository.find_all().await.unwrap();
    let transfer_id = transfers[0].id();

    // PENDING → IN_TRANSIT: 出荷元から出荷数量が引き落とされる
    let transfer = world
        .transfer_service
        .dispatch_transfer(transfer_id, vec![(product_id, 3)], None)
        .await
        .unwrap();
    assert_eq!(transfer.status(), TransferStatus::InTransit);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(other_warehouse_id, product_id)
            .await,
        7
    );

    // IN_TRANSIT → RECEIVED_PENDING_VERIFICATION: 在庫への影響なし
    world
        .transfer_service
        .receive_transfer(transfer_id, None)
        .await
        .unwrap();
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        0
    );

    // RECEIVED_PENDING_VERIFICATION → COMPLETED:
    // 受入先に加算され、待機中の注文が再引き当てでSatisfiedに到達する
    let transfer = world
        .transfer_service
        .complete_transfer(transfer_id, vec![(product_id, 3)], None)
        .await
        .unwrap();
    assert_eq!(transfer.status(), TransferStatus::Completed);

    let order = world
        .order_repository
        .find_by_id(order.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Processing);
    assert!(!order.has_pending_stock());
    // 補充された3個が残量分として引き当てられ、倉庫は再び0になる
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        0
    );
    assert_eq!(
        world
            .activity_log
            .count_action("ORDER_REPLENISHMENT_RETRIED")
            .await,
        1
    );
}

/// 順方向→逆方向の往復で、触れたすべての在庫レコードが元の数量に戻る
#[tokio::test]
async fn test_forward_then_reverse_restores_stock_exactly() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_a = world.add_product("NAIL-05").await;
    let product_b = world.add_product("SCREW-06").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_a, 8)
        .await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_b, 12)
        .await;

    let mut command = world.checkout_command(branch_id, product_a, 3, PaymentMethod::Cash);
    command.lines.push(CheckoutLine {
        product_id: product_b,
        quantity: 7,
        unit_price: Money::clp(500),
        discounted_unit_price: Money::clp(500),
    });
    let order = world.order_service.checkout(command).await.unwrap();

    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_a)
            .await,
        5
    );
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_b)
            .await,
        5
    );

    // キャンセルで逆方向パスが実行される
    world
        .order_service
        .cancel_order(order.id(), None)
        .await
        .unwrap();

    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_a)
            .await,
        8
    );
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_b)
            .await,
        12
    );
}

/// 逆方向パスを2回連続で呼んでも二重に在庫が戻らない（冪等性）
#[tokio::test]
async fn test_double_reversal_does_not_double_credit() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("BOLT-07").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 10)
        .await;

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 4, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        6
    );

    let mut order = world
        .order_repository
        .find_by_id(order.id())
        .await
        .unwrap()
        .unwrap();

    // 1回目の逆適用で在庫が戻る
    world
        .stock_service
        .apply_order_stock_effect(&mut order, true, None)
        .await
        .unwrap();
    assert!(!order.stock_applied());
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        10
    );

    // 2回目の逆適用は何もしない
    world
        .stock_service
        .apply_order_stock_effect(&mut order, true, None)
        .await
        .unwrap();
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        10
    );
}

/// 補充待ちの注文をキャンセルすると、部分消費分が戻り、
/// Pendingの自動移送も連動キャンセルされる
#[tokio::test]
async fn test_cancel_waiting_order_reverses_partial_and_cancels_transfer() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("TAPE-08").await;
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
        .checkout(world.checkout_command(branch_id, product_id, 5, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(order.status(), OrderStatus::PendingReplenishment);

    world
        .order_service
        .cancel_order(order.id(), None)
        .await
        .unwrap();

    // 実際に消費された2個だけが戻る（移送で届いていない3個は戻らない）
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );
    let transfers = world.transfer_repository.find_all().await.unwrap();
    assert_eq!(transfers[0].status(), TransferStatus::Cancelled);
}

/// 同じ注文・商品・受入先に対するPendingの移送は重複作成されない
#[tokio::test]
async fn test_duplicate_pending_transfer_is_not_created() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("GLUE-09").await;
    // 引き当て店舗側の在庫レコードは意図的に投入しない
    // （(店舗, 商品, 倉庫) が初めて操作されたときに遅延作成される）
    world
        .stock_repository
        .seed(other_branch_id, other_warehouse_id, product_id, 10)
        .await;
    assert!(!world.stock_repository.has_branch_inventory(branch_id).await);

    let order = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(order.status(), OrderStatus::PendingReplenishment);
    assert_eq!(world.transfer_repository.find_all().await.unwrap().len(), 1);
    // 店舗在庫と在庫レコードが遅延作成されている
    assert!(world.stock_repository.has_branch_inventory(branch_id).await);

    // 再引き当てを直接実行しても既存のPendingの移送が再利用される
    let mut order = world
        .order_repository
        .find_by_id(order.id())
        .await
        .unwrap()
        .unwrap();
    let opened = world
        .stock_service
        .try_open_automatic_transfer(
            &order,
            product_id,
            3,
            &world
                .directory
                .find_warehouse(warehouse_id)
                .await
                .unwrap()
                .unwrap(),
            None,
        )
        .await
        .unwrap();
    assert!(opened);
    assert_eq!(world.transfer_repository.find_all().await.unwrap().len(), 1);

    // 順方向パスの再実行でも重複は作られない
    let application = world
        .stock_service
        .apply_order_stock_effect(&mut order, false, None)
        .await
        .unwrap();
    assert_eq!(
        application,
        hardware_order_fulfillment::domain::service::StockApplication::Partial
    );
    assert_eq!(world.transfer_repository.find_all().await.unwrap().len(), 1);
}

/// 稼働中の倉庫が存在しない店舗への注文は構成エラーになる
#[tokio::test]
async fn test_missing_operating_warehouse_is_configuration_error() {
    let world = World::new();
    let branch_id = BranchId::new();
    world
        .directory
        .add_branch(Branch {
            id: branch_id,
            name: "倉庫なし店舗".to_string(),
            active: true,
        })
        .await;
    let product_id = world.add_product("PIPE-10").await;

    let result = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 1, PaymentMethod::Cash))
        .await;

    assert!(matches!(
        result,
        Err(ApplicationError::DomainError(
            DomainError::ConfigurationError(_)
        ))
    ));
}

/// 売場倉庫が引き当てで優先される
#[tokio::test]
async fn test_sales_floor_warehouse_is_preferred() {
    let world = World::new();
    let branch_id = BranchId::new();
    world
        .directory
        .add_branch(Branch {
            id: branch_id,
            name: "2倉庫店舗".to_string(),
            active: true,
        })
        .await;
    let backroom_id = WarehouseId::new();
    let sales_floor_id = WarehouseId::new();
    world
        .directory
        .add_warehouse(Warehouse {
            id: backroom_id,
            branch_id,
            kind: WarehouseKind::Backroom,
            active: true,
        })
        .await;
    world
        .directory
        .add_warehouse(Warehouse {
            id: sales_floor_id,
            branch_id,
            kind: WarehouseKind::SalesFloor,
            active: true,
        })
        .await;

    let product_id = world.add_product("LAMP-11").await;
    world
        .stock_repository
        .seed(branch_id, backroom_id, product_id, 5)
        .await;
    world
        .stock_repository
        .seed(branch_id, sales_floor_id, product_id, 5)
        .await;

    world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash))
        .await
        .unwrap();

    // 売場から引き当てられ、バックヤードは動かない
    assert_eq!(
        world
            .stock_repository
            .quantity_of(sales_floor_id, product_id)
            .await,
        2
    );
    assert_eq!(
        world
            .stock_repository
            .quantity_of(backroom_id, product_id)
            .await,
        5
    );
}

/// 同じ在庫レコードを奪い合う2つの注文が並行しても、
/// 成功するのは1つだけで在庫が負になることはない
#[tokio::test]
async fn test_concurrent_orders_never_drive_stock_negative() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("CABLE-12").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 5)
        .await;

    let first = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash));
    let second = world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash));
    let (first, second) = tokio::join!(first, second);

    let successes = [&first, &second]
        .iter()
        .filter(|result| result.is_ok())
        .count();
    assert_eq!(successes, 1);
    assert_eq!(
        world
            .stock_repository
            .quantity_of(warehouse_id, product_id)
            .await,
        2
    );
}

/// InTransitの移送のキャンセルは拒否される
#[tokio::test]
async fn test_in_transit_transfer_cannot_be_cancelled() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("FUSE-13").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 0)
        .await;
    world
        .stock_repository
        .seed(other_branch_id, other_warehouse_id, product_id, 10)
        .await;

    world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash))
        .await
        .unwrap();
    let transfer_id = world.transfer_repository.find_all().await.unwrap()[0].id();

    world
        .transfer_service
        .dispatch_transfer(transfer_id, vec![(product_id, 3)], None)
        .await
        .unwrap();

    let result = world
        .transfer_service
        .cancel_transfer(transfer_id, "テスト".to_string(), None)
        .await;
    assert!(matches!(
        result,
        Err(ApplicationError::DomainError(
            DomainError::InvalidTransferState(_)
        ))
    ));
}

/// 出荷元の在庫が不足している移送は出荷できず、在庫も変更されない
#[tokio::test]
async fn test_dispatch_with_insufficient_source_stock_fails_cleanly() {
    let world = World::new();
    let (branch_id, warehouse_id) = world.add_branch_with_warehouse().await;
    let (other_branch_id, other_warehouse_id) = world.add_branch_with_warehouse().await;
    let product_id = world.add_product("VALVE-14").await;
    world
        .stock_repository
        .seed(branch_id, warehouse_id, product_id, 0)
        .await;
    world
        .stock_repository
        .seed(other_branch_id, other_warehouse_id, product_id, 5)
        .await;

    world
        .order_service
        .checkout(world.checkout_command(branch_id, product_id, 3, PaymentMethod::Cash))
        .await
        .unwrap();
    let transfer_id = world.transfer_repository.find_all().await.unwrap()[0].id();

    // 出荷前に出荷元の在庫が別の理由で減ってしまったケース
    world
        .stock_repository
        .decrement(other_warehouse_id, product_id, 4)
        .await
        .unwrap();

    let result = world
        .transfer_service
        .dispatch_transfer(transfer_id, vec![(product_id, 3)], None)
        .await;
    assert!(matches!(
        result,
        Err(ApplicationError::DomainError(
            DomainError::InsufficientStock(_)
        ))
    ));
    assert_eq!(
        world
            .stock_repository
            .quantity_of(other_warehouse_id, product_id)
            .await,
        1
    );
}
