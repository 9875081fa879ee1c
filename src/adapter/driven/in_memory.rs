// インメモリアダプター実装
// 開発・テスト用。永続化層の契約（遅延作成、相対更新、決定的な並び順）を
// MySQL実装と同じ意味論で満たす。

use crate::domain::model::{
    ActorId, Branch, BranchId, BranchInventory, Order, OrderId, OrderStatus, Payment, PaymentId,
    PaymentMethod, PaymentStatus, PreparationStatus, Product, ProductId, StockRecord, Transfer,
    TransferId, TransferReason, TransferStatus, Warehouse, WarehouseId,
};
use crate::domain::port::{
    ActivityEntry, ActivityLog, BranchDirectory, OrderRepository, PaymentRepository,
    ProductCatalog, RepositoryError, StockRepository, StockSummaryRow, TransferRepository,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// インメモリ注文リポジトリ
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.lock().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.lock().await;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| b.ordered_at().cmp(&a.ordered_at()));
        Ok(all)
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.lock().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| order.status() == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.ordered_at().cmp(&a.ordered_at()));
        Ok(matching)
    }

    async fn count_active_preparations(&self, picker: ActorId) -> Result<u32, RepositoryError> {
        let orders = self.orders.lock().await;
        let count = orders
            .values()
            .filter(|order| {
                order.assigned_picker() == Some(picker)
                    && matches!(
                        order.preparation_status(),
                        PreparationStatus::Assigned | PreparationStatus::InPreparation
                    )
            })
            .count();
        Ok(count as u32)
    }

    fn next_identity(&self) -> OrderId {
        OrderId::new()
    }
}

/// インメモリ在庫リポジトリ
/// 相対更新の意味論（負になる減算の拒否）をMySQL実装と揃えている
#[derive(Clone, Default)]
pub struct InMemoryStockRepository {
    records: Arc<Mutex<HashMap<(WarehouseId, ProductId), StockRecord>>>,
    branch_inventories: Arc<Mutex<HashMap<BranchId, BranchInventory>>>,
}

impl InMemoryStockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// テスト準備用: 在庫レコードを数量付きで投入する
    pub async fn seed(
        &self,
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) {
        let mut records = self.records.lock().await;
        records.insert(
            (warehouse_id, product_id),
            StockRecord::reconstruct(branch_id, warehouse_id, product_id, quantity, None, None),
        );
        self.branch_inventories
            .lock()
            .await
            .entry(branch_id)
            .or_insert_with(|| BranchInventory::new(branch_id));
    }

    /// 店舗在庫が遅延作成済みかどうか（テスト検証用）
    pub async fn has_branch_inventory(&self, branch_id: BranchId) -> bool {
        self.branch_inventories.lock().await.contains_key(&branch_id)
    }

    /// 現在の在庫数を返す（テスト検証用、レコード未作成なら0）
    pub async fn quantity_of(&self, warehouse_id: WarehouseId, product_id: ProductId) -> u32 {
        let records = self.records.lock().await;
        records
            .get(&(warehouse_id, product_id))
            .map(|record| record.quantity())
            .unwrap_or(0)
    }
}

#[async_trait]
impl StockRepository for InMemoryStockRepository {
    async fn get_or_create(
        &self,
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<StockRecord, RepositoryError> {
        self.branch_inventories
            .lock()
            .await
            .entry(branch_id)
            .or_insert_with(|| BranchInventory::new(branch_id));
        let mut records = self.records.lock().await;
        let record = records
            .entry((warehouse_id, product_id))
            .or_insert_with(|| StockRecord::new(branch_id, warehouse_id, product_id));
        Ok(record.clone())
    }

    async fn find(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<StockRecord>, RepositoryError> {
        let records = self.records.lock().await;
        Ok(records.get(&(warehouse_id, product_id)).cloned())
    }

    async fn increment(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&(warehouse_id, product_id))
            .ok_or_else(|| {
                RepositoryError::OperationFailed(format!(
                    "在庫レコードが存在しません: 倉庫 {} 商品 {}",
                    warehouse_id, product_id
                ))
            })?;
        record
            .credit(quantity)
            .map_err(|e| RepositoryError::OperationFailed(e.to_string()))?;
        Ok(())
    }

    async fn decrement(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&(warehouse_id, product_id))
            .ok_or_else(|| {
                RepositoryError::OperationFailed(format!(
                    "在庫レコードが存在しません: 倉庫 {} 商品 {}",
                    warehouse_id, product_id
                ))
            })?;
        record
            .deduct(quantity)
            .map_err(|e| RepositoryError::OperationFailed(e.to_string()))?;
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
        self.branch_inventories
            .lock()
            .await
            .entry(branch_id)
            .or_insert_with(|| BranchInventory::new(branch_id));
        let mut records = self.records.lock().await;
        let record = records
            .entry((warehouse_id, product_id))
            .or_insert_with(|| StockRecord::new(branch_id, warehouse_id, product_id));
        if quantity > 0 {
            record
                .credit(quantity)
                .map_err(|e| RepositoryError::OperationFailed(e.to_string()))?;
        }
        record.set_thresholds(min_threshold, max_threshold);
        Ok(())
    }

    async fn find_sources(
        &self,
        product_id: ProductId,
        min_quantity: u32,
        exclude_warehouse: WarehouseId,
    ) -> Result<Vec<StockRecord>, RepositoryError> {
        let records = self.records.lock().await;
        let mut sources: Vec<StockRecord> = records
            .values()
            .filter(|record| {
                record.product_id() == product_id
                    && record.quantity() >= min_quantity
                    && record.warehouse_id() != exclude_warehouse
            })
            .cloned()
            .collect();
        // 数量の降順、同数の場合は倉庫IDの昇順（決定的なタイブレーク）
        sources.sort_by(|a, b| {
            b.quantity()
                .cmp(&a.quantity())
                .then(a.warehouse_id().cmp(&b.warehouse_id()))
        });
        Ok(sources)
    }

    async fn branch_summary(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<StockSummaryRow>, RepositoryError> {
        let records = self.records.lock().await;
        let mut summary: BTreeMap<ProductId, StockSummaryRow> = BTreeMap::new();
        for record in records.values() {
            if record.branch_id() != branch_id {
                continue;
            }
            let row = summary
                .entry(record.product_id())
                .or_insert(StockSummaryRow {
                    product_id: record.product_id(),
                    total_quantity: 0,
                    min_threshold: None,
                });
            row.total_quantity += record.quantity();
            row.min_threshold = match (row.min_threshold, record.min_threshold()) {
                (Some(current), Some(new)) => Some(current.min(new)),
                (current, new) => current.or(new),
            };
        }
        Ok(summary.into_values().collect())
    }
}

/// インメモリ移送リポジトリ
#[derive(Clone, Default)]
pub struct InMemoryTransferRepository {
    transfers: Arc<Mutex<HashMap<TransferId, Transfer>>>,
}

impl InMemoryTransferRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferRepository for InMemoryTransferRepository {
    async fn save(&self, transfer: &Transfer) -> Result<(), RepositoryError> {
        let mut transfers = self.transfers.lock().await;
        transfers.insert(transfer.id(), transfer.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<Transfer>, RepositoryError> {
        let transfers = self.transfers.lock().await;
        Ok(transfers.get(&transfer_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Transfer>, RepositoryError> {
        let transfers = self.transfers.lock().await;
        let mut all: Vec<Transfer> = transfers.values().cloned().collect();
        all.sort_by(|a, b| b.requested_at().cmp(&a.requested_at()));
        Ok(all)
    }

    async fn find_pending_duplicate(
        &self,
        order_id: OrderId,
        destination_branch_id: BranchId,
        product_id: ProductId,
        destination_warehouse_id: WarehouseId,
    ) -> Result<Option<Transfer>, RepositoryError> {
        let transfers = self.transfers.lock().await;
        Ok(transfers
            .values()
            .find(|transfer| {
                transfer.order_id() == Some(order_id)
                    && transfer.destination_branch_id() == destination_branch_id
                    && transfer.status() == TransferStatus::Pending
                    && transfer.lines().iter().any(|line| {
                        line.product_id() == product_id
                            && line.destination_warehouse_id() == destination_warehouse_id
                    })
            })
            .cloned())
    }

    async fn find_pending_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Transfer>, RepositoryError> {
        let transfers = self.transfers.lock().await;
        Ok(transfers
            .values()
            .filter(|transfer| {
                transfer.order_id() == Some(order_id)
                    && transfer.status() == TransferStatus::Pending
                    && transfer.reason() == TransferReason::OrderCompletion
            })
            .cloned()
            .collect())
    }

    fn next_identity(&self) -> TransferId {
        TransferId::new()
    }
}

/// インメモリ支払いリポジトリ
#[derive(Clone, Default)]
pub struct InMemoryPaymentRepository {
    payments: Arc<Mutex<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<(), RepositoryError> {
        let mut payments = self.payments.lock().await;
        payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let payments = self.payments.lock().await;
        Ok(payments.get(&payment_id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Payment>, RepositoryError> {
        let payments = self.payments.lock().await;
        Ok(payments
            .values()
            .find(|payment| payment.gateway_token() == Some(token))
            .cloned())
    }

    async fn find_pending_gateway_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let payments = self.payments.lock().await;
        Ok(payments
            .values()
            .find(|payment| {
                payment.order_id() == order_id
                    && payment.method() == PaymentMethod::Gateway
                    && payment.status() == PaymentStatus::Pending
            })
            .cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError> {
        let payments = self.payments.lock().await;
        let mut matching: Vec<Payment> = payments
            .values()
            .filter(|payment| payment.order_id() == order_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(matching)
    }

    fn next_identity(&self) -> PaymentId {
        PaymentId::new()
    }
}

/// インメモリ店舗・倉庫ディレクトリ
#[derive(Clone, Default)]
pub struct InMemoryBranchDirectory {
    branches: Arc<Mutex<HashMap<BranchId, Branch>>>,
    warehouses: Arc<Mutex<HashMap<WarehouseId, Warehouse>>>,
}

impl InMemoryBranchDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// テスト準備用: 店舗を登録する
    pub async fn add_branch(&self, branch: Branch) {
        self.branches.lock().await.insert(branch.id, branch);
    }

    /// テスト準備用: 倉庫を登録する
    pub async fn add_warehouse(&self, warehouse: Warehouse) {
        self.warehouses.lock().await.insert(warehouse.id, warehouse);
    }
}

#[async_trait]
impl BranchDirectory for InMemoryBranchDirectory {
    async fn find_branch(&self, branch_id: BranchId) -> Result<Option<Branch>, RepositoryError> {
        let branches = self.branches.lock().await;
        Ok(branches.get(&branch_id).cloned())
    }

    async fn find_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Option<Warehouse>, RepositoryError> {
        let warehouses = self.warehouses.lock().await;
        Ok(warehouses.get(&warehouse_id).cloned())
    }

    async fn active_warehouses(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<Warehouse>, RepositoryError> {
        let warehouses = self.warehouses.lock().await;
        let mut matching: Vec<Warehouse> = warehouses
            .values()
            .filter(|warehouse| warehouse.branch_id == branch_id && warehouse.active)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }
}

/// インメモリ商品カタログ
#[derive(Clone, Default)]
pub struct InMemoryProductCatalog {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// テスト準備用: 商品を登録する
    pub async fn add_product(&self, product: Product) {
        self.products.lock().await.insert(product.id, product);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.lock().await;
        Ok(products.get(&product_id).cloned())
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.lock().await;
        Ok(products.values().find(|product| product.sku == sku).cloned())
    }
}

/// インメモリ活動ログ
/// 記録されたエントリをテストから検証できるように保持する
#[derive(Clone, Default)]
pub struct InMemoryActivityLog {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl InMemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録されたすべてのエントリを返す
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().await.clone()
    }

    /// 指定されたアクションのエントリ数を返す
    pub async fn count_action(&self, action: &str) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.action == action)
            .count()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn record(&self, entry: ActivityEntry) {
        self.entries.lock().await.push(entry);
    }
}
