use crate::domain::error::DomainError;
use crate::domain::model::{BranchId, ProductId, WarehouseId};
use chrono::{DateTime, Utc};

/// 在庫レコード
/// (店舗, 倉庫, 商品) ごとに一意で、数量は常に0以上
/// 最小・最大の閾値は報告・助言目的のみで、書き込み時の制約としては扱わない
#[derive(Debug, Clone, PartialEq)]
pub struct StockRecord {
    branch_id: BranchId,
    warehouse_id: WarehouseId,
    product_id: ProductId,
    quantity: u32,
    min_threshold: Option<u32>,
    max_threshold: Option<u32>,
}

impl StockRecord {
    /// 新しい在庫レコードを作成
    pub fn new(branch_id: BranchId, warehouse_id: WarehouseId, product_id: ProductId) -> Self {
        Self {
            branch_id,
            warehouse_id,
            product_id,
            quantity: 0,
            min_threshold: None,
            max_threshold: None,
        }
    }

    /// 永続化層から取得したデータで在庫レコードを再構築
    pub fn reconstruct(
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
        min_threshold: Option<u32>,
        max_threshold: Option<u32>,
    ) -> Self {
        Self {
            branch_id,
            warehouse_id,
            product_id,
            quantity,
            min_threshold,
            max_threshold,
        }
    }

    pub fn branch_id(&self) -> BranchId {
        self.branch_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// 在庫数を取得
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn min_threshold(&self) -> Option<u32> {
        self.min_threshold
    }

    pub fn max_threshold(&self) -> Option<u32> {
        self.max_threshold
    }

    /// 閾値を設定（助言目的のみ）
    pub fn set_thresholds(&mut self, min: Option<u32>, max: Option<u32>) {
        if min.is_some() {
            self.min_threshold = min;
        }
        if max.is_some() {
            self.max_threshold = max;
        }
    }

    /// 在庫を引き当てる
    ///
    /// # Returns
    /// * `Ok(())` - 引き当て成功
    /// * `Err(DomainError::InsufficientStock)` - 在庫不足
    pub fn deduct(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if self.quantity < quantity {
            return Err(DomainError::InsufficientStock(format!(
                "在庫 {} に対して {} を引き当てようとしました",
                self.quantity, quantity
            )));
        }
        self.quantity -= quantity;
        Ok(())
    }

    /// 在庫を戻す（キャンセル・移送受け入れ時など）
    pub fn credit(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        self.quantity += quantity;
        Ok(())
    }

    /// 利用可能な在庫をすべて引き当てて0にする（部分消費）
    /// 消費した数量を返す
    pub fn consume_all(&mut self) -> u32 {
        let consumed = self.quantity;
        self.quantity = 0;
        consumed
    }

    /// 指定された数量が引き当て可能かチェック
    pub fn has_available(&self, quantity: u32) -> bool {
        self.quantity >= quantity
    }

    /// 在庫が最小閾値を下回っているかどうか（報告用）
    pub fn is_below_minimum(&self) -> bool {
        match self.min_threshold {
            Some(min) => self.quantity < min,
            None => false,
        }
    }
}

/// 店舗在庫
/// 店舗ごとに1件（1:1）で、その店舗の在庫レコードの集合を束ねる
/// (店舗, 商品, 倉庫) の組が初めて操作された際に遅延作成される
#[derive(Debug, Clone, PartialEq)]
pub struct BranchInventory {
    branch_id: BranchId,
    created_at: DateTime<Utc>,
}

impl BranchInventory {
    /// 新しい店舗在庫を作成
    pub fn new(branch_id: BranchId) -> Self {
        Self {
            branch_id,
            created_at: Utc::now(),
        }
    }

    /// 永続化層から取得したデータで再構築
    pub fn reconstruct(branch_id: BranchId, created_at: DateTime<Utc>) -> Self {
        Self {
            branch_id,
            created_at,
        }
    }

    pub fn branch_id(&self) -> BranchId {
        self.branch_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
