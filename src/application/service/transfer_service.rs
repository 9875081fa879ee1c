use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    ActorId, BranchId, OrderStatus, ProductId, RelatedEntity, Transfer, TransferId,
    TransferReason, WarehouseId,
};
use crate::domain::port::{
    ActivityEntry, ActivityLog, BranchDirectory, Logger, OrderRepository, StockRepository,
    TransferRepository,
};
use crate::domain::service::{StockApplication, StockMutationService};
use std::collections::HashMap;
use std::sync::Arc;

/// 移送作成時の明細入力
#[derive(Debug, Clone)]
pub struct TransferLineInput {
    pub product_id: ProductId,
    pub requested_quantity: u32,
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
}

/// 移送アプリケーションサービス
/// 移送のライフサイクルと、その在庫への副作用を担当する。
/// 注文補充のための移送が完了した際は、待機中の注文の
/// 在庫引き当てを同一処理内で再実行する。
pub struct TransferApplicationService {
    transfer_repository: Arc<dyn TransferRepository>,
    stock_repository: Arc<dyn StockRepository>,
    order_repository: Arc<dyn OrderRepository>,
    directory: Arc<dyn BranchDirectory>,
    stock_service: Arc<StockMutationService>,
    activity_log: Arc<dyn ActivityLog>,
    logger: Arc<dyn Logger>,
}

impl TransferApplicationService {
    /// 新しい移送アプリケーションサービスを作成
    pub fn new(
        transfer_repository: Arc<dyn TransferRepository>,
        stock_repository: Arc<dyn StockRepository>,
        order_repository: Arc<dyn OrderRepository>,
        directory: Arc<dyn BranchDirectory>,
        stock_service: Arc<StockMutationService>,
        activity_log: Arc<dyn ActivityLog>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            transfer_repository,
            stock_repository,
            order_repository,
            directory,
            stock_service,
            activity_log,
            logger,
        }
    }

    /// スタッフ操作による移送を作成する
    /// 明細の倉庫がヘッダーの店舗に属することは集約の作成時に検証される
    pub async fn create_transfer(
        &self,
        source_branch_id: BranchId,
        destination_branch_id: BranchId,
        reason: TransferReason,
        lines: Vec<TransferLineInput>,
        actor: Option<ActorId>,
    ) -> Result<Transfer, ApplicationError> {
        if lines.is_empty() {
            return Err(ApplicationError::Validation(
                "移送には少なくとも1つの明細が必要です".to_string(),
            ));
        }

        let mut transfer = Transfer::new(
            self.transfer_repository.next_identity(),
            source_branch_id,
            destination_branch_id,
            reason,
            None,
            actor,
        );
        for line in &lines {
            let source_warehouse = self.find_warehouse(line.source_warehouse_id).await?;
            let destination_warehouse =
                self.find_warehouse(line.destination_warehouse_id).await?;
            transfer.add_line(
                line.product_id,
                line.requested_quantity,
                &source_warehouse,
                &destination_warehouse,
            )?;
        }

        self.transfer_repository.save(&transfer).await?;
        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "TRANSFER_CREATED",
                format!(
                    "移送 {} を作成しました（{} → {}、理由: {}）",
                    transfer.id(),
                    source_branch_id,
                    destination_branch_id,
                    reason
                ),
                Some(RelatedEntity::Transfer(transfer.id())),
            ))
            .await;

        Ok(transfer)
    }

    /// 移送を出荷する（PENDING → IN_TRANSIT）
    /// 各明細の出荷数量だけ出荷元倉庫の在庫を引き落とす。
    /// どの明細も在庫が不足する場合は何も変更せずに失敗する。
    pub async fn dispatch_transfer(
        &self,
        transfer_id: TransferId,
        sent_quantities: Vec<(ProductId, u32)>,
        actor: Option<ActorId>,
    ) -> Result<Transfer, ApplicationError> {
        let mut transfer = self.find_transfer(transfer_id).await?;

        for (product_id, quantity) in &sent_quantities {
            transfer.record_sent(*product_id, *quantity)?;
        }
        // 遷移の検証（全明細の出荷数量が記録されているか）を先に行う
        transfer.mark_in_transit()?;

        // 計画フェーズ: 在庫を変更する前に全明細の在庫を確認する
        for line in transfer.lines() {
            let sent = line.sent_quantity().unwrap_or(0);
            let record = self
                .stock_repository
                .get_or_create(
                    transfer.source_branch_id(),
                    line.source_warehouse_id(),
                    line.product_id(),
                )
                .await?;
            if !record.has_available(sent) {
                return Err(ApplicationError::DomainError(
                    DomainError::InsufficientStock(format!(
                        "出荷元倉庫 {} の商品 {} の在庫が不足しています（在庫: {}、出荷: {}）",
                        line.source_warehouse_id(),
                        line.product_id(),
                        record.quantity(),
                        sent
                    )),
                ));
            }
        }
        // 適用フェーズ
        for line in transfer.lines() {
            let sent = line.sent_quantity().unwrap_or(0);
            self.stock_repository
                .decrement(line.source_warehouse_id(), line.product_id(), sent)
                .await?;
        }

        self.transfer_repository.save(&transfer).await?;
        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "TRANSFER_DISPATCHED",
                format!("移送 {} を出荷しました", transfer.id()),
                Some(RelatedEntity::Transfer(transfer.id())),
            ))
            .await;

        Ok(transfer)
    }

    /// 移送の到着を記録する（IN_TRANSIT → RECEIVED_PENDING_VERIFICATION）
    /// 在庫への影響はない。受入先は数量を検証してから完了させる。
    pub async fn receive_transfer(
        &self,
        transfer_id: TransferId,
        actor: Option<ActorId>,
    ) -> Result<Transfer, ApplicationError> {
        let mut transfer = self.find_transfer(transfer_id).await?;
        transfer.mark_received()?;
        self.transfer_repository.save(&transfer).await?;

        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "TRANSFER_RECEIVED",
                format!("移送 {} の到着を記録しました（検証待ち）", transfer.id()),
                Some(RelatedEntity::Transfer(transfer.id())),
            ))
            .await;

        Ok(transfer)
    }

    /// 移送を完了する（RECEIVED_PENDING_VERIFICATION → COMPLETED）
    /// 各明細の受領数量だけ受入先倉庫の在庫へ加算する。
    ///
    /// 注文補充のための移送だった場合、補充待ちの注文を処理中へ戻し、
    /// 在庫引き当てを同一処理内で再実行する。
    pub async fn complete_transfer(
        &self,
        transfer_id: TransferId,
        received_quantities: Vec<(ProductId, u32)>,
        actor: Option<ActorId>,
    ) -> Result<Transfer, ApplicationError> {
        let mut transfer = self.find_transfer(transfer_id).await?;

        for (product_id, quantity) in &received_quantities {
            transfer.record_received(*product_id, *quantity)?;
        }
        transfer.complete()?;

        // 受入先倉庫へ加算する
        for line in transfer.lines() {
            let received = line.received_quantity().unwrap_or(0);
            self.stock_repository
                .get_or_create(
                    transfer.destination_branch_id(),
                    line.destination_warehouse_id(),
                    line.product_id(),
                )
                .await?;
            self.stock_repository
                .increment(line.destination_warehouse_id(), line.product_id(), received)
                .await?;
        }

        self.transfer_repository.save(&transfer).await?;
        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "TRANSFER_COMPLETED",
                format!("移送 {} を完了しました", transfer.id()),
                Some(RelatedEntity::Transfer(transfer.id())),
            ))
            .await;

        // 注文補充のための移送なら、待機中の注文の在庫引き当てを再実行する
        if transfer.is_order_completion() {
            if let Some(order_id) = transfer.order_id() {
                self.retry_waiting_order(order_id, transfer.id(), actor)
                    .await?;
            }
        }

        Ok(transfer)
    }

    /// 移送をキャンセルする
    /// InTransitからのキャンセルは集約側で拒否される
    pub async fn cancel_transfer(
        &self,
        transfer_id: TransferId,
        reason: String,
        actor: Option<ActorId>,
    ) -> Result<Transfer, ApplicationError> {
        let mut transfer = self.find_transfer(transfer_id).await?;
        transfer.cancel(reason)?;
        self.transfer_repository.save(&transfer).await?;

        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "TRANSFER_CANCELLED",
                format!("移送 {} をキャンセルしました", transfer.id()),
                Some(RelatedEntity::Transfer(transfer.id())),
            ))
            .await;

        Ok(transfer)
    }

    /// 移送IDで取得
    pub async fn get_transfer_by_id(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<Transfer>, ApplicationError> {
        self.transfer_repository
            .find_by_id(transfer_id)
            .await
            .map_err(ApplicationError::from)
    }

    /// すべての移送を取得（依頼日時の降順）
    pub async fn get_all_transfers(&self) -> Result<Vec<Transfer>, ApplicationError> {
        self.transfer_repository
            .find_all()
            .await
            .map_err(ApplicationError::from)
    }

    /// 補充待ちの注文の在庫引き当てを再実行する
    ///
    /// - `Satisfied`: 注文は処理中のまま進行可能になる
    /// - `Partial`: 別の不足が残っているため補充待ちへ戻る
    /// - `InsufficientStock`: 補充不可能と確定したため在庫拒否へ強制する
    async fn retry_waiting_order(
        &self,
        order_id: crate::domain::model::OrderId,
        transfer_id: TransferId,
        actor: Option<ActorId>,
    ) -> Result<(), ApplicationError> {
        let mut order = match self.order_repository.find_by_id(order_id).await? {
            Some(order) => order,
            None => return Ok(()),
        };
        if order.status() != OrderStatus::PendingReplenishment {
            return Ok(());
        }

        order.add_note(format!(
            "移送 {} の完了により在庫が補充されました。引き当てを再実行します",
            transfer_id
        ));
        order.mark_processing()?;

        match self
            .stock_service
            .apply_order_stock_effect(&mut order, false, actor)
            .await
        {
            Ok(StockApplication::Satisfied) => {}
            Ok(StockApplication::Partial) => {
                order.mark_pending_replenishment()?;
            }
            Err(DomainError::InsufficientStock(msg)) => {
                order.add_note(format!("補充後の再引き当てに失敗: {}", msg));
                order.mark_rejected_stock()?;
                self.logger.error(
                    "TransferApplicationService",
                    "Replenishment retry failed",
                    None,
                    Some(HashMap::from([
                        ("order_id".to_string(), order.id().to_string()),
                        ("reason".to_string(), msg),
                    ])),
                );
            }
            Err(err) => return Err(err.into()),
        }

        self.order_repository.save(&order).await?;
        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "ORDER_REPLENISHMENT_RETRIED",
                format!(
                    "移送 {} の完了を受けて注文 {} の引き当てを再実行しました（状態: {}）",
                    transfer_id,
                    order.id(),
                    order.status()
                ),
                Some(RelatedEntity::Order(order.id())),
            ))
            .await;

        Ok(())
    }

    async fn find_transfer(&self, transfer_id: TransferId) -> Result<Transfer, ApplicationError> {
        self.transfer_repository
            .find_by_id(transfer_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("移送が見つかりません: {}", transfer_id))
            })
    }

    async fn find_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<crate::domain::model::Warehouse, ApplicationError> {
        self.directory
            .find_warehouse(warehouse_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::Validation(format!("倉庫が見つかりません: {}", warehouse_id))
            })
    }
}
