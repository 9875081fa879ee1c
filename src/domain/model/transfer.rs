use crate::domain::error::DomainError;
use crate::domain::model::{ActorId, BranchId, OrderId, ProductId, TransferId, Warehouse, WarehouseId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// 移送のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    /// 作成済み・出荷待ち
    Pending,
    /// 輸送中（出荷元の在庫は引き落とし済み）
    InTransit,
    /// 受領済み・数量検証待ち
    ReceivedPendingVerification,
    /// 完了（受入先の在庫へ加算済み）
    Completed,
    /// キャンセル済み
    Cancelled,
}

impl TransferStatus {
    /// 文字列からTransferStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "Pending" => Ok(TransferStatus::Pending),
            "InTransit" => Ok(TransferStatus::InTransit),
            "ReceivedPendingVerification" => Ok(TransferStatus::ReceivedPendingVerification),
            "Completed" => Ok(TransferStatus::Completed),
            "Cancelled" => Ok(TransferStatus::Cancelled),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な移送ステータス: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            TransferStatus::Pending => "Pending",
            TransferStatus::InTransit => "InTransit",
            TransferStatus::ReceivedPendingVerification => "ReceivedPendingVerification",
            TransferStatus::Completed => "Completed",
            TransferStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", status_str)
    }
}

/// 移送の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferReason {
    /// 定期的な補充
    Replenishment,
    /// 店舗間の直接移動
    Direct,
    /// 顧客注文の不足分を補充するための自動移送
    OrderCompletion,
    /// 棚卸し調整
    InventoryAdjustment,
}

impl TransferReason {
    /// 文字列からTransferReasonを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "Replenishment" => Ok(TransferReason::Replenishment),
            "Direct" => Ok(TransferReason::Direct),
            "OrderCompletion" => Ok(TransferReason::OrderCompletion),
            "InventoryAdjustment" => Ok(TransferReason::InventoryAdjustment),
            _ => Err(DomainError::InvalidValue(format!("無効な移送理由: {}", s))),
        }
    }
}

impl fmt::Display for TransferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason_str = match self {
            TransferReason::Replenishment => "Replenishment",
            TransferReason::Direct => "Direct",
            TransferReason::OrderCompletion => "OrderCompletion",
            TransferReason::InventoryAdjustment => "InventoryAdjustment",
        };
        write!(f, "{}", reason_str)
    }
}

/// 移送明細
/// 出荷元・受入先の倉庫は明細単位で指定する
#[derive(Debug, Clone, PartialEq)]
pub struct TransferLine {
    product_id: ProductId,
    requested_quantity: u32,
    sent_quantity: Option<u32>,
    received_quantity: Option<u32>,
    source_warehouse_id: WarehouseId,
    destination_warehouse_id: WarehouseId,
}

impl TransferLine {
    /// 永続化層から取得したデータで移送明細を再構築
    pub fn reconstruct(
        product_id: ProductId,
        requested_quantity: u32,
        sent_quantity: Option<u32>,
        received_quantity: Option<u32>,
        source_warehouse_id: WarehouseId,
        destination_warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            product_id,
            requested_quantity,
            sent_quantity,
            received_quantity,
            source_warehouse_id,
            destination_warehouse_id,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn requested_quantity(&self) -> u32 {
        self.requested_quantity
    }

    pub fn sent_quantity(&self) -> Option<u32> {
        self.sent_quantity
    }

    pub fn received_quantity(&self) -> Option<u32> {
        self.received_quantity
    }

    pub fn source_warehouse_id(&self) -> WarehouseId {
        self.source_warehouse_id
    }

    pub fn destination_warehouse_id(&self) -> WarehouseId {
        self.destination_warehouse_id
    }
}

/// 移送集約
/// 店舗間の在庫移動を独自のライフサイクルで管理する
#[derive(Debug, Clone)]
pub struct Transfer {
    id: TransferId,
    source_branch_id: BranchId,
    destination_branch_id: BranchId,
    reason: TransferReason,
    status: TransferStatus,
    /// この移送を発生させた顧客注文（自動移送の場合のみ）
    order_id: Option<OrderId>,
    created_by: Option<ActorId>,
    comments: Vec<String>,
    lines: Vec<TransferLine>,
    requested_at: DateTime<Utc>,
    dispatched_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// 新しい移送を作成
    /// 初期ステータスはPending
    pub fn new(
        id: TransferId,
        source_branch_id: BranchId,
        destination_branch_id: BranchId,
        reason: TransferReason,
        order_id: Option<OrderId>,
        created_by: Option<ActorId>,
    ) -> Self {
        Self {
            id,
            source_branch_id,
            destination_branch_id,
            reason,
            status: TransferStatus::Pending,
            order_id,
            created_by,
            comments: Vec::new(),
            lines: Vec::new(),
            requested_at: Utc::now(),
            dispatched_at: None,
            received_at: None,
        }
    }

    /// 永続化層から取得したデータで移送を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: TransferId,
        source_branch_id: BranchId,
        destination_branch_id: BranchId,
        reason: TransferReason,
        status: TransferStatus,
        order_id: Option<OrderId>,
        created_by: Option<ActorId>,
        comments: Vec<String>,
        lines: Vec<TransferLine>,
        requested_at: DateTime<Utc>,
        dispatched_at: Option<DateTime<Utc>>,
        received_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            source_branch_id,
            destination_branch_id,
            reason,
            status,
            order_id,
            created_by,
            comments,
            lines,
            requested_at,
            dispatched_at,
            received_at,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn source_branch_id(&self) -> BranchId {
        self.source_branch_id
    }

    pub fn destination_branch_id(&self) -> BranchId {
        self.destination_branch_id
    }

    pub fn reason(&self) -> TransferReason {
        self.reason
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn created_by(&self) -> Option<ActorId> {
        self.created_by
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn lines(&self) -> &[TransferLine] {
        &self.lines
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// 顧客注文の不足分を補充するための自動移送かどうか
    pub fn is_order_completion(&self) -> bool {
        self.reason == TransferReason::OrderCompletion && self.order_id.is_some()
    }

    /// 明細を追加する
    /// 明細の出荷元・受入先の倉庫は、ヘッダーの出荷元・受入先の店舗に
    /// 属している必要がある（作成時に検証される不変条件）
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        requested_quantity: u32,
        source_warehouse: &Warehouse,
        destination_warehouse: &Warehouse,
    ) -> Result<(), DomainError> {
        if self.status != TransferStatus::Pending {
            return Err(DomainError::InvalidTransferState(
                "明細を追加できるのはPending状態のみです".to_string(),
            ));
        }
        if requested_quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if source_warehouse.branch_id != self.source_branch_id {
            return Err(DomainError::WarehouseMismatch(format!(
                "出荷元倉庫 {} は出荷元店舗 {} に属していません",
                source_warehouse.id, self.source_branch_id
            )));
        }
        if destination_warehouse.branch_id != self.destination_branch_id {
            return Err(DomainError::WarehouseMismatch(format!(
                "受入先倉庫 {} は受入先店舗 {} に属していません",
                destination_warehouse.id, self.destination_branch_id
            )));
        }
        if self.lines.iter().any(|line| line.product_id == product_id) {
            return Err(DomainError::InvalidValue(format!(
                "商品 {} は既にこの移送に含まれています",
                product_id
            )));
        }
        self.lines.push(TransferLine {
            product_id,
            requested_quantity,
            sent_quantity: None,
            received_quantity: None,
            source_warehouse_id: source_warehouse.id,
            destination_warehouse_id: destination_warehouse.id,
        });
        Ok(())
    }

    /// 出荷数量を記録する
    /// 0より大きく、依頼数量以下である必要がある
    pub fn record_sent(&mut self, product_id: ProductId, quantity: u32) -> Result<(), DomainError> {
        if self.status != TransferStatus::Pending {
            return Err(DomainError::InvalidTransferState(
                "出荷数量を記録できるのはPending状態のみです".to_string(),
            ));
        }
        let line = self.line_mut(product_id)?;
        if quantity == 0 || quantity > line.requested_quantity {
            return Err(DomainError::InvalidValue(format!(
                "出荷数量 {} が不正です（依頼数量: {}）",
                quantity, line.requested_quantity
            )));
        }
        line.sent_quantity = Some(quantity);
        Ok(())
    }

    /// 受領数量を記録する
    /// 0より大きく、出荷数量以下である必要がある
    pub fn record_received(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), DomainError> {
        if self.status != TransferStatus::ReceivedPendingVerification {
            return Err(DomainError::InvalidTransferState(
                "受領数量を記録できるのは検証待ち状態のみです".to_string(),
            ));
        }
        let line = self.line_mut(product_id)?;
        let sent = line.sent_quantity.ok_or_else(|| {
            DomainError::InvalidValue("出荷数量が記録されていません".to_string())
        })?;
        if quantity == 0 || quantity > sent {
            return Err(DomainError::InvalidValue(format!(
                "受領数量 {} が不正です（出荷数量: {}）",
                quantity, sent
            )));
        }
        line.received_quantity = Some(quantity);
        Ok(())
    }

    /// 移送を輸送中にする
    /// 全明細に出荷数量が記録されている必要がある
    /// （出荷元倉庫の引き落としは呼び出し側の責務）
    pub fn mark_in_transit(&mut self) -> Result<(), DomainError> {
        if self.status != TransferStatus::Pending {
            return Err(DomainError::InvalidTransferState(format!(
                "{} の移送を輸送中にはできません",
                self.status
            )));
        }
        if self.lines.is_empty() {
            return Err(DomainError::InvalidTransferState(
                "明細のない移送は出荷できません".to_string(),
            ));
        }
        for line in &self.lines {
            match line.sent_quantity {
                Some(quantity) if quantity > 0 && quantity <= line.requested_quantity => {}
                _ => {
                    return Err(DomainError::InvalidTransferState(format!(
                        "商品 {} の出荷数量が記録されていないか不正です",
                        line.product_id
                    )));
                }
            }
        }
        self.status = TransferStatus::InTransit;
        self.dispatched_at = Some(Utc::now());
        Ok(())
    }

    /// 移送を受領済み（検証待ち）にする
    /// 在庫への影響はない
    pub fn mark_received(&mut self) -> Result<(), DomainError> {
        if self.status != TransferStatus::InTransit {
            return Err(DomainError::InvalidTransferState(format!(
                "{} の移送を受領済みにはできません",
                self.status
            )));
        }
        self.status = TransferStatus::ReceivedPendingVerification;
        self.received_at = Some(Utc::now());
        Ok(())
    }

    /// 移送を完了する
    /// 全明細に受領数量が記録されている必要がある
    /// （受入先倉庫への加算は呼び出し側の責務）
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if self.status != TransferStatus::ReceivedPendingVerification {
            return Err(DomainError::InvalidTransferState(format!(
                "{} の移送を完了にはできません",
                self.status
            )));
        }
        for line in &self.lines {
            let sent = line.sent_quantity.unwrap_or(0);
            match line.received_quantity {
                Some(quantity) if quantity > 0 && quantity <= sent => {}
                _ => {
                    return Err(DomainError::InvalidTransferState(format!(
                        "商品 {} の受領数量が記録されていないか不正です",
                        line.product_id
                    )));
                }
            }
        }
        self.status = TransferStatus::Completed;
        Ok(())
    }

    /// 移送をキャンセルする
    /// PendingとReceivedPendingVerificationからのみ許可する。
    /// InTransitでは出荷元の在庫が既に引き落とされているため、
    /// キャンセルは受け付けない（受領して検証待ちからキャンセルする）。
    pub fn cancel(&mut self, reason: String) -> Result<(), DomainError> {
        match self.status {
            TransferStatus::Pending | TransferStatus::ReceivedPendingVerification => {
                self.status = TransferStatus::Cancelled;
                self.comments.push(reason);
                Ok(())
            }
            other => Err(DomainError::InvalidTransferState(format!(
                "{} の移送はキャンセルできません",
                other
            ))),
        }
    }

    /// コメントを追記する
    pub fn add_comment(&mut self, comment: String) {
        self.comments.push(comment);
    }

    fn line_mut(&mut self, product_id: ProductId) -> Result<&mut TransferLine, DomainError> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
            .ok_or_else(|| {
                DomainError::InvalidValue(format!("移送に存在しない商品です: {}", product_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::WarehouseKind;

    fn warehouse_of(branch_id: BranchId) -> Warehouse {
        Warehouse {
            id: WarehouseId::new(),
            branch_id,
            kind: WarehouseKind::SalesFloor,
            active: true,
        }
    }

    fn transfer_with_line(requested: u32) -> (Transfer, ProductId) {
        let source_branch = BranchId::new();
        let destination_branch = BranchId::new();
        let mut transfer = Transfer::new(
            TransferId::new(),
            source_branch,
            destination_branch,
            TransferReason::OrderCompletion,
            Some(OrderId::new()),
            None,
        );
        let product_id = ProductId::new();
        transfer
            .add_line(
                product_id,
                requested,
                &warehouse_of(source_branch),
                &warehouse_of(destination_branch),
            )
            .unwrap();
        (transfer, product_id)
    }

    #[test]
    fn test_new_transfer_is_pending() {
        let (transfer, _) = transfer_with_line(3);
        assert_eq!(transfer.status(), TransferStatus::Pending);
        assert!(transfer.is_order_completion());
    }

    #[test]
    fn test_add_line_rejects_foreign_source_warehouse() {
        let source_branch = BranchId::new();
        let destination_branch = BranchId::new();
        let mut transfer = Transfer::new(
            TransferId::new(),
            source_branch,
            destination_branch,
            TransferReason::Direct,
            None,
            None,
        );
        // 出荷元店舗に属さない倉庫
        let result = transfer.add_line(
            ProductId::new(),
            1,
            &warehouse_of(BranchId::new()),
            &warehouse_of(destination_branch),
        );
        assert!(matches!(result, Err(DomainError::WarehouseMismatch(_))));
    }

    #[test]
    fn test_add_line_rejects_foreign_destination_warehouse() {
        let source_branch = BranchId::new();
        let mut transfer = Transfer::new(
            TransferId::new(),
            source_branch,
            BranchId::new(),
            TransferReason::Direct,
            None,
            None,
        );
        let result = transfer.add_line(
            ProductId::new(),
            1,
            &warehouse_of(source_branch),
            &warehouse_of(BranchId::new()),
        );
        assert!(matches!(result, Err(DomainError::WarehouseMismatch(_))));
    }

    #[test]
    fn test_add_duplicate_product_fails() {
        let source_branch = BranchId::new();
        let destination_branch = BranchId::new();
        let mut transfer = Transfer::new(
            TransferId::new(),
            source_branch,
            destination_branch,
            TransferReason::Direct,
            None,
            None,
        );
        let product_id = ProductId::new();
        transfer
            .add_line(
                product_id,
                1,
                &warehouse_of(source_branch),
                &warehouse_of(destination_branch),
            )
            .unwrap();
        let result = transfer.add_line(
            product_id,
            2,
            &warehouse_of(source_branch),
            &warehouse_of(destination_branch),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mark_in_transit_requires_sent_quantities() {
        let (mut transfer, product_id) = transfer_with_line(3);

        // 出荷数量未記録では失敗
        assert!(transfer.mark_in_transit().is_err());

        transfer.record_sent(product_id, 3).unwrap();
        assert!(transfer.mark_in_transit().is_ok());
        assert_eq!(transfer.status(), TransferStatus::InTransit);
        assert!(transfer.dispatched_at().is_some());
    }

    #[test]
    fn test_record_sent_above_requested_fails() {
        let (mut transfer, product_id) = transfer_with_line(3);
        assert!(transfer.record_sent(product_id, 4).is_err());
        assert!(transfer.record_sent(product_id, 0).is_err());
    }

    #[test]
    fn test_complete_requires_received_quantities() {
        let (mut transfer, product_id) = transfer_with_line(3);
        transfer.record_sent(product_id, 3).unwrap();
        transfer.mark_in_transit().unwrap();
        transfer.mark_received().unwrap();

        // 受領数量未記録では失敗
        assert!(transfer.complete().is_err());

        transfer.record_received(product_id, 3).unwrap();
        assert!(transfer.complete().is_ok());
        assert_eq!(transfer.status(), TransferStatus::Completed);
    }

    #[test]
    fn test_record_received_above_sent_fails() {
        let (mut transfer, product_id) = transfer_with_line(5);
        transfer.record_sent(product_id, 3).unwrap();
        transfer.mark_in_transit().unwrap();
        transfer.mark_received().unwrap();
        assert!(transfer.record_received(product_id, 4).is_err());
        assert!(transfer.record_received(product_id, 3).is_ok());
    }

    #[test]
    fn test_cancel_from_pending() {
        let (mut transfer, _) = transfer_with_line(3);
        assert!(transfer.cancel("注文がキャンセルされたため".to_string()).is_ok());
        assert_eq!(transfer.status(), TransferStatus::Cancelled);
        assert_eq!(transfer.comments().len(), 1);
    }

    #[test]
    fn test_cancel_from_in_transit_is_rejected() {
        let (mut transfer, product_id) = transfer_with_line(3);
        transfer.record_sent(product_id, 3).unwrap();
        transfer.mark_in_transit().unwrap();
        let result = transfer.cancel("取り消し".to_string());
        assert!(matches!(result, Err(DomainError::InvalidTransferState(_))));
    }

    #[test]
    fn test_cancel_from_received_pending_verification() {
        let (mut transfer, product_id) = transfer_with_line(3);
        transfer.record_sent(product_id, 3).unwrap();
        transfer.mark_in_transit().unwrap();
        transfer.mark_received().unwrap();
        assert!(transfer.cancel("数量不一致".to_string()).is_ok());
    }

    #[test]
    fn test_complete_from_in_transit_fails() {
        let (mut transfer, product_id) = transfer_with_line(3);
        transfer.record_sent(product_id, 3).unwrap();
        transfer.mark_in_transit().unwrap();
        assert!(transfer.complete().is_err());
    }
}
