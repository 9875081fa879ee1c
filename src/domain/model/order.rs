use crate::domain::error::DomainError;
use crate::domain::model::{
    ActorId, BranchId, CustomerId, Money, OrderId, OrderStatus, PreparationStatus, ProductId,
    ShippingMethod,
};
use chrono::{DateTime, Utc};

/// 注文明細を表す値オブジェクト
/// pending_quantity は移送による補充を待っている数量（通常は0）
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    product_id: ProductId,
    quantity: u32,
    unit_price: Money,
    discounted_unit_price: Money,
    pending_quantity: u32,
}

impl OrderLine {
    /// 新しい注文明細を作成
    /// 数量は1以上、割引後単価は単価以下である必要がある
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        discounted_unit_price: Money,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if discounted_unit_price.amount() < rust_decimal::Decimal::ZERO {
            return Err(DomainError::InvalidValue(
                "単価は負にできません".to_string(),
            ));
        }
        if discounted_unit_price.amount() > unit_price.amount() {
            return Err(DomainError::InvalidValue(
                "割引後単価が単価を超えています".to_string(),
            ));
        }
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            discounted_unit_price,
            pending_quantity: 0,
        })
    }

    /// 永続化層から取得したデータで注文明細を再構築
    pub fn reconstruct(
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        discounted_unit_price: Money,
        pending_quantity: u32,
    ) -> Result<Self, DomainError> {
        if pending_quantity > quantity {
            return Err(DomainError::InvalidValue(
                "補充待ち数量が注文数量を超えています".to_string(),
            ));
        }
        let mut line = Self::new(product_id, quantity, unit_price, discounted_unit_price)?;
        line.pending_quantity = pending_quantity;
        Ok(line)
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn discounted_unit_price(&self) -> Money {
        self.discounted_unit_price
    }

    /// 移送による補充を待っている数量
    pub fn pending_quantity(&self) -> u32 {
        self.pending_quantity
    }

    /// 既に在庫から消費された数量
    pub fn consumed_quantity(&self) -> u32 {
        self.quantity - self.pending_quantity
    }

    /// 割引前の小計（単価 × 数量）
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// 割引後の小計（割引後単価 × 数量）
    pub fn discounted_subtotal(&self) -> Money {
        self.discounted_unit_price.multiply(self.quantity)
    }

    /// この明細の割引額
    pub fn line_discount(&self) -> Result<Money, DomainError> {
        self.subtotal().subtract(&self.discounted_subtotal())
    }

    /// 数量を増加させる（同じ商品を追加する場合）
    pub fn increase_quantity(&mut self, additional_quantity: u32) -> Result<(), DomainError> {
        if additional_quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        self.quantity += additional_quantity;
        Ok(())
    }

    pub(crate) fn set_pending_quantity(&mut self, pending: u32) -> Result<(), DomainError> {
        if pending > self.quantity {
            return Err(DomainError::InvalidValue(
                "補充待ち数量が注文数量を超えています".to_string(),
            ));
        }
        self.pending_quantity = pending;
        Ok(())
    }
}

/// 注文集約
/// 注文のライフサイクル、倉庫でのピッキング作業状態、
/// および在庫引き当ての適用状態を管理する
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    branch_id: BranchId,
    shipping_method: ShippingMethod,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    preparation_status: PreparationStatus,
    assigned_picker: Option<ActorId>,
    /// 在庫の引き当てが現在有効かどうか
    /// 逆方向パス（在庫の戻し）の二重実行を防ぐ
    stock_applied: bool,
    subtotal: Money,
    discount_total: Money,
    tax_total: Money,
    total: Money,
    notes: Vec<String>,
    ordered_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// 新しい注文を作成
    /// 初期ステータスはPending、準備状態はPendingAssignment
    pub fn new(
        id: OrderId,
        customer_id: CustomerId,
        branch_id: BranchId,
        shipping_method: ShippingMethod,
    ) -> Self {
        Self {
            id,
            customer_id,
            branch_id,
            shipping_method,
            lines: Vec::new(),
            status: OrderStatus::Pending,
            preparation_status: PreparationStatus::PendingAssignment,
            assigned_picker: None,
            stock_applied: false,
            subtotal: Money::zero(),
            discount_total: Money::zero(),
            tax_total: Money::zero(),
            total: Money::zero(),
            notes: Vec::new(),
            ordered_at: Utc::now(),
            delivered_at: None,
        }
    }

    /// 永続化層から取得したデータで注文を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: OrderId,
        customer_id: CustomerId,
        branch_id: BranchId,
        shipping_method: ShippingMethod,
        lines: Vec<OrderLine>,
        status: OrderStatus,
        preparation_status: PreparationStatus,
        assigned_picker: Option<ActorId>,
        stock_applied: bool,
        tax_total: Money,
        notes: Vec<String>,
        ordered_at: DateTime<Utc>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        let mut order = Self {
            id,
            customer_id,
            branch_id,
            shipping_method,
            lines,
            status,
            preparation_status,
            assigned_picker,
            stock_applied,
            subtotal: Money::zero(),
            discount_total: Money::zero(),
            tax_total,
            total: Money::zero(),
            notes,
            ordered_at,
            delivered_at,
        };
        order.recalculate_totals()?;
        Ok(order)
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn branch_id(&self) -> BranchId {
        self.branch_id
    }

    pub fn shipping_method(&self) -> ShippingMethod {
        self.shipping_method
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn preparation_status(&self) -> PreparationStatus {
        self.preparation_status
    }

    pub fn assigned_picker(&self) -> Option<ActorId> {
        self.assigned_picker
    }

    pub fn stock_applied(&self) -> bool {
        self.stock_applied
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_total(&self) -> Money {
        self.discount_total
    }

    pub fn tax_total(&self) -> Money {
        self.tax_total
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn ordered_at(&self) -> DateTime<Utc> {
        self.ordered_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    /// 商品を注文に追加
    /// 同じ商品が既に存在する場合は数量を増加させ、合計金額を再計算する
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
        discounted_unit_price: Money,
    ) -> Result<(), DomainError> {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id() == product_id)
        {
            existing.increase_quantity(quantity)?;
        } else {
            let line = OrderLine::new(product_id, quantity, unit_price, discounted_unit_price)?;
            self.lines.push(line);
        }
        self.recalculate_totals()
    }

    /// 税額を設定して合計を再計算
    /// 税額は価格計算コラボレーターから渡される不透明な入力として扱う
    pub fn set_tax_total(&mut self, tax_total: Money) -> Result<(), DomainError> {
        self.tax_total = tax_total;
        self.recalculate_totals()
    }

    /// 合計金額を現在の明細から再計算する
    /// 合計 = 小計 - 割引 + 税
    /// 明細が変わるたびに必ず呼ばれ、合計は明細の純粋関数であり続ける
    pub fn recalculate_totals(&mut self) -> Result<(), DomainError> {
        let mut subtotal = Money::zero();
        let mut discount = Money::zero();
        for line in &self.lines {
            subtotal = subtotal.add(&line.subtotal())?;
            discount = discount.add(&line.line_discount()?)?;
        }
        self.subtotal = subtotal;
        self.discount_total = discount;
        self.total = subtotal.subtract(&discount)?.add(&self.tax_total)?;
        Ok(())
    }

    /// メモを追記する（在庫不整合の記録など）
    pub fn add_note(&mut self, note: String) {
        self.notes.push(note);
    }

    /// 補充待ちの明細が残っているかどうか
    pub fn has_pending_stock(&self) -> bool {
        self.lines.iter().any(|line| line.pending_quantity() > 0)
    }

    pub(crate) fn set_stock_applied(&mut self, applied: bool) {
        self.stock_applied = applied;
    }

    pub(crate) fn set_line_pending(
        &mut self,
        product_id: ProductId,
        pending: u32,
    ) -> Result<(), DomainError> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.product_id() == product_id)
            .ok_or_else(|| {
                DomainError::InvalidValue(format!("注文に存在しない商品です: {}", product_id))
            })?;
        line.set_pending_quantity(pending)
    }

    pub(crate) fn clear_pending_quantities(&mut self) {
        for line in &mut self.lines {
            // 再構築時の検証を通っているため0は常に設定可能
            let _ = line.set_pending_quantity(0);
        }
    }

    /// 注文を支払い済みにする
    /// 事前条件: ステータスがPending、Processing、またはFailed
    pub fn mark_paid(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Failed => {
                self.status = OrderStatus::Paid;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を支払い済みにはできません",
                other
            ))),
        }
    }

    /// 注文を処理中にする
    /// 補充完了後の再処理（PendingReplenishmentから）と
    /// 支払い失敗からの復帰（Failedから）を含む
    pub fn mark_processing(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending
            | OrderStatus::Paid
            | OrderStatus::PendingReplenishment
            | OrderStatus::Failed => {
                self.status = OrderStatus::Processing;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を処理中にはできません",
                other
            ))),
        }
    }

    /// 注文を補充待ちにする
    /// 在庫引き当てが部分的にしか満たせなかった場合に使用する
    pub fn mark_pending_replenishment(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Processing => {
                self.status = OrderStatus::PendingReplenishment;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を補充待ちにはできません",
                other
            ))),
        }
    }

    /// 注文を発送済みにする
    pub fn mark_shipped(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Paid | OrderStatus::Processing => {
                self.status = OrderStatus::Shipped;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を発送済みにはできません",
                other
            ))),
        }
    }

    /// 注文を配達完了にする
    pub fn mark_delivered(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Shipped => {
                self.status = OrderStatus::Delivered;
                self.delivered_at = Some(Utc::now());
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を配達完了にはできません",
                other
            ))),
        }
    }

    /// 注文をキャンセルする
    /// 在庫の戻しは呼び出し側（在庫変更サービス）の責務
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending
            | OrderStatus::Processing
            | OrderStatus::PendingReplenishment
            | OrderStatus::Paid
            | OrderStatus::Shipped => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文はキャンセルできません",
                other
            ))),
        }
    }

    /// 注文を失敗にする（支払い失敗など）
    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending
            | OrderStatus::Processing
            | OrderStatus::PendingReplenishment
            | OrderStatus::Paid
            | OrderStatus::Shipped => {
                self.status = OrderStatus::Failed;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を失敗にはできません",
                other
            ))),
        }
    }

    /// 注文を在庫不足による拒否にする
    /// 補充不可能な不足が確定した場合の終端状態
    pub fn mark_rejected_stock(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending
            | OrderStatus::Processing
            | OrderStatus::PendingReplenishment
            | OrderStatus::Paid
            | OrderStatus::Shipped => {
                self.status = OrderStatus::RejectedStock;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "{} の注文を在庫拒否にはできません",
                other
            ))),
        }
    }

    /// ピッキング担当者を割り当てる
    /// 事前条件:
    /// - ステータスがPaidまたはProcessing
    /// - 他の担当者に割り当てられていない
    pub fn assign_picker(&mut self, picker: ActorId) -> Result<(), DomainError> {
        if !matches!(self.status, OrderStatus::Paid | OrderStatus::Processing) {
            return Err(DomainError::InvalidOrderState(
                "ピッキング対象にできるのは支払い済みまたは処理中の注文のみです".to_string(),
            ));
        }
        match self.assigned_picker {
            Some(current) if current != picker => {
                return Err(DomainError::InvalidOrderState(format!(
                    "この注文は既に {} に割り当てられています",
                    current
                )));
            }
            Some(_) => return Ok(()), // 同じ担当者への再割り当ては何もしない
            None => {}
        }
        self.assigned_picker = Some(picker);
        self.preparation_status = PreparationStatus::Assigned;
        Ok(())
    }

    /// ピッキング作業を開始する
    pub fn start_preparation(&mut self, picker: ActorId) -> Result<(), DomainError> {
        if self.assigned_picker != Some(picker) {
            return Err(DomainError::InvalidOrderState(
                "この注文はあなたに割り当てられていません".to_string(),
            ));
        }
        match self.preparation_status {
            PreparationStatus::Assigned => {
                self.preparation_status = PreparationStatus::InPreparation;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "準備状態 {} からピッキングを開始できません",
                other
            ))),
        }
    }

    /// ピッキング作業を完了し、引き渡し準備完了にする
    pub fn finish_preparation(&mut self, picker: ActorId) -> Result<(), DomainError> {
        if self.assigned_picker != Some(picker) {
            return Err(DomainError::InvalidOrderState(
                "この注文はあなたに割り当てられていません".to_string(),
            ));
        }
        match self.preparation_status {
            PreparationStatus::Assigned | PreparationStatus::InPreparation => {
                self.preparation_status = PreparationStatus::ReadyForHandoff;
                Ok(())
            }
            other => Err(DomainError::InvalidOrderState(format!(
                "準備状態 {} から準備完了にはできません",
                other
            ))),
        }
    }
}
