pub mod payment_service;
pub mod stock_service;
pub mod transfer_service;

pub use payment_service::{GatewayRedirect, GatewayReturnOutcome, PaymentApplicationService};
pub use stock_service::{StockApplicationService, StockImportReport};
pub use transfer_service::{TransferApplicationService, TransferLineInput};

use crate::application::ApplicationError;
use crate::domain::model::{
    ActorId, BranchId, CustomerId, Money, Order, OrderId, OrderStatus, PaymentMethod, ProductId,
    RelatedEntity, ShippingMethod,
};
use crate::domain::port::{
    ActivityEntry, ActivityLog, BranchDirectory, Logger, OrderRepository, ProductCatalog,
    TransferRepository,
};
use crate::domain::service::{StockApplication, StockMutationService};
use std::collections::HashMap;
use std::sync::Arc;

/// チェックアウト時の明細入力
/// 単価と割引後単価は価格計算コラボレーターが供給する不透明な入力
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub discounted_unit_price: Money,
}

/// チェックアウトコマンド
#[derive(Debug, Clone)]
pub struct CheckoutCommand {
    pub customer_id: CustomerId,
    pub branch_id: BranchId,
    pub shipping_method: ShippingMethod,
    pub payment_method: PaymentMethod,
    pub lines: Vec<CheckoutLine>,
    pub tax_total: Money,
    pub actor: Option<ActorId>,
}

/// 注文アプリケーションサービス
/// チェックアウト、注文状態遷移、倉庫でのピッキング作業を担当する
pub struct OrderApplicationService {
    order_repository: Arc<dyn OrderRepository>,
    transfer_repository: Arc<dyn TransferRepository>,
    directory: Arc<dyn BranchDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    stock_service: Arc<StockMutationService>,
    activity_log: Arc<dyn ActivityLog>,
    logger: Arc<dyn Logger>,
}

impl OrderApplicationService {
    /// 新しい注文アプリケーションサービスを作成
    pub fn new(
        order_repository: Arc<dyn OrderRepository>,
        transfer_repository: Arc<dyn TransferRepository>,
        directory: Arc<dyn BranchDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        stock_service: Arc<StockMutationService>,
        activity_log: Arc<dyn ActivityLog>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            order_repository,
            transfer_repository,
            directory,
            catalog,
            stock_service,
            activity_log,
            logger,
        }
    }

    /// チェックアウト: 新しい注文を作成する
    ///
    /// 手動の支払い方法（現金・銀行振込）では作成時に在庫を引き当てる。
    /// ゲートウェイ決済では在庫の引き当てを支払い成功後まで遅延させる。
    ///
    /// # Returns
    /// * `Ok(Order)` - 作成された注文（`Satisfied`ならPending、
    ///   `Partial`ならPendingReplenishment）
    /// * `Err(ApplicationError)` - 在庫不足などで作成が中止された
    ///   （注文は永続化されない）
    pub async fn checkout(&self, command: CheckoutCommand) -> Result<Order, ApplicationError> {
        let branch = self
            .directory
            .find_branch(command.branch_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::Validation(format!(
                    "引き当て店舗が見つかりません: {}",
                    command.branch_id
                ))
            })?;
        if !branch.active {
            return Err(ApplicationError::Validation(format!(
                "店舗 {} は稼働していません",
                branch.name
            )));
        }
        if command.lines.is_empty() {
            return Err(ApplicationError::Validation(
                "注文明細が空です".to_string(),
            ));
        }

        let mut order = Order::new(
            self.order_repository.next_identity(),
            command.customer_id,
            command.branch_id,
            command.shipping_method,
        );
        for line in &command.lines {
            // 商品はカタログ側の管理対象であり、ここでは存在確認のみ行う
            self.catalog
                .find_product(line.product_id)
                .await?
                .ok_or_else(|| {
                    ApplicationError::Validation(format!(
                        "商品が見つかりません: {}",
                        line.product_id
                    ))
                })?;
            order.add_line(
                line.product_id,
                line.quantity,
                line.unit_price,
                line.discounted_unit_price,
            )?;
        }
        order.set_tax_total(command.tax_total)?;

        if !order.total().is_positive() {
            return Err(ApplicationError::Validation(
                "注文の合計金額は0より大きい必要があります".to_string(),
            ));
        }

        // 手動の支払い方法では作成時に在庫を引き当てる
        // 在庫不足エラーの場合は注文自体が永続化されない
        if !command.payment_method.is_gateway() {
            let application = self
                .stock_service
                .apply_order_stock_effect(&mut order, false, command.actor)
                .await?;
            if application == StockApplication::Partial {
                order.mark_pending_replenishment()?;
            }
        }

        self.order_repository.save(&order).await?;

        let mut context = HashMap::new();
        context.insert("order_id".to_string(), order.id().to_string());
        context.insert("status".to_string(), order.status().to_string());
        self.logger.info(
            "OrderApplicationService",
            "Order created",
            None,
            Some(context),
        );
        self.activity_log
            .record(ActivityEntry::new(
                command.actor,
                "ORDER_CREATED",
                format!(
                    "注文 {} を作成しました（状態: {}）",
                    order.id(),
                    order.status()
                ),
                Some(RelatedEntity::Order(order.id())),
            ))
            .await;

        Ok(order)
    }

    /// 注文の状態を遷移させる
    ///
    /// 遷移規則:
    /// - `Failed` → `Paid` / `Processing`: 失敗時に在庫が戻されているため、
    ///   順方向の在庫引き当てを再実行する
    /// - → `Cancelled` / `Failed` / `RejectedStock`: 在庫が引き当て済みなら
    ///   戻す。補充待ちだった場合はPendingの自動移送も連動キャンセルする
    pub async fn change_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        actor: Option<ActorId>,
    ) -> Result<Order, ApplicationError> {
        let mut order = self.find_order(order_id).await?;
        let prior = order.status();

        match new_status {
            OrderStatus::Paid | OrderStatus::Processing if prior == OrderStatus::Failed => {
                // 失敗からの復帰: 在庫は失敗時に戻されているため再引き当て
                match self
                    .stock_service
                    .apply_order_stock_effect(&mut order, false, actor)
                    .await
                {
                    Ok(application) => {
                        if new_status == OrderStatus::Paid {
                            order.mark_paid()?;
                        } else {
                            order.mark_processing()?;
                        }
                        if application == StockApplication::Partial {
                            order.mark_pending_replenishment()?;
                        }
                    }
                    Err(err) => {
                        order.add_note(format!("失敗からの復帰時の在庫エラー: {}", err));
                        self.order_repository.save(&order).await?;
                        return Err(err.into());
                    }
                }
            }
            OrderStatus::Cancelled | OrderStatus::Failed | OrderStatus::RejectedStock => {
                // ドメインの遷移検証を先に行う（無効な遷移では在庫に触れない）
                match new_status {
                    OrderStatus::Cancelled => order.cancel()?,
                    OrderStatus::Failed => order.mark_failed()?,
                    OrderStatus::RejectedStock => order.mark_rejected_stock()?,
                    _ => unreachable!(),
                }
                if order.stock_applied() {
                    self.stock_service
                        .apply_order_stock_effect(&mut order, true, actor)
                        .await?;
                }
                if prior == OrderStatus::PendingReplenishment {
                    self.cancel_pending_transfers(&order, actor).await?;
                }
            }
            OrderStatus::Paid => order.mark_paid()?,
            OrderStatus::Processing => order.mark_processing()?,
            OrderStatus::PendingReplenishment => order.mark_pending_replenishment()?,
            OrderStatus::Shipped => order.mark_shipped()?,
            OrderStatus::Delivered => order.mark_delivered()?,
            OrderStatus::Pending => {
                return Err(ApplicationError::Validation(
                    "Pendingへは遷移できません".to_string(),
                ));
            }
        }

        self.order_repository.save(&order).await?;

        let mut context = HashMap::new();
        context.insert("order_id".to_string(), order.id().to_string());
        context.insert("from".to_string(), prior.to_string());
        context.insert("to".to_string(), order.status().to_string());
        self.logger.info(
            "OrderApplicationService",
            "Order status changed",
            None,
            Some(context),
        );
        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "ORDER_STATUS_CHANGED",
                format!(
                    "注文 {} の状態を {} から {} に変更しました",
                    order.id(),
                    prior,
                    order.status()
                ),
                Some(RelatedEntity::Order(order.id())),
            ))
            .await;

        Ok(order)
    }

    /// 注文を発送済みにする
    pub async fn ship_order(
        &self,
        order_id: OrderId,
        actor: Option<ActorId>,
    ) -> Result<Order, ApplicationError> {
        self.change_status(order_id, OrderStatus::Shipped, actor)
            .await
    }

    /// 注文を配達完了にする
    pub async fn deliver_order(
        &self,
        order_id: OrderId,
        actor: Option<ActorId>,
    ) -> Result<Order, ApplicationError> {
        self.change_status(order_id, OrderStatus::Delivered, actor)
            .await
    }

    /// 注文をキャンセルする
    /// 引き当て済みの在庫は戻され、補充待ちの自動移送も連動キャンセルされる
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        actor: Option<ActorId>,
    ) -> Result<Order, ApplicationError> {
        self.change_status(order_id, OrderStatus::Cancelled, actor)
            .await
    }

    /// ピッキング担当者として注文を引き受ける
    ///
    /// 業務ルール:
    /// - 担当者は自店舗の注文のみ引き受けられる
    /// - 同時に担当できるのは3件まで（Assigned / InPreparation）
    pub async fn take_order_for_preparation(
        &self,
        order_id: OrderId,
        picker: ActorId,
        picker_branch: BranchId,
    ) -> Result<Order, ApplicationError> {
        let mut order = self.find_order(order_id).await?;

        if order.branch_id() != picker_branch {
            return Err(ApplicationError::Forbidden(
                "この店舗の注文を引き受ける権限がありません".to_string(),
            ));
        }

        // 既に自分に割り当てられている場合は何もしない
        if order.assigned_picker() == Some(picker) {
            return Ok(order);
        }

        let active = self
            .order_repository
            .count_active_preparations(picker)
            .await?;
        if active >= 3 {
            return Err(ApplicationError::Forbidden(
                "既に3件の注文を担当しています。完了してから新しい注文を引き受けてください"
                    .to_string(),
            ));
        }

        order.assign_picker(picker)?;
        self.order_repository.save(&order).await?;

        self.activity_log
            .record(ActivityEntry::new(
                Some(picker),
                "PREPARATION_ASSIGNED",
                format!("注文 {} のピッキングを引き受けました", order.id()),
                Some(RelatedEntity::Order(order.id())),
            ))
            .await;

        Ok(order)
    }

    /// ピッキング作業を開始する
    pub async fn start_preparation(
        &self,
        order_id: OrderId,
        picker: ActorId,
    ) -> Result<Order, ApplicationError> {
        let mut order = self.find_order(order_id).await?;
        order.start_preparation(picker)?;
        self.order_repository.save(&order).await?;

        self.activity_log
            .record(ActivityEntry::new(
                Some(picker),
                "PREPARATION_STARTED",
                format!("注文 {} のピッキングを開始しました", order.id()),
                Some(RelatedEntity::Order(order.id())),
            ))
            .await;

        Ok(order)
    }

    /// ピッキング作業を完了し、引き渡し準備完了にする
    pub async fn confirm_preparation(
        &self,
        order_id: OrderId,
        picker: ActorId,
    ) -> Result<Order, ApplicationError> {
        let mut order = self.find_order(order_id).await?;
        order.finish_preparation(picker)?;
        self.order_repository.save(&order).await?;

        self.activity_log
            .record(ActivityEntry::new(
                Some(picker),
                "PREPARATION_READY",
                format!("注文 {} のピッキングが完了しました", order.id()),
                Some(RelatedEntity::Order(order.id())),
            ))
            .await;

        Ok(order)
    }

    /// 注文IDで注文を取得
    pub async fn get_order_by_id(&self, id: OrderId) -> Result<Option<Order>, ApplicationError> {
        self.order_repository
            .find_by_id(id)
            .await
            .map_err(ApplicationError::from)
    }

    /// すべての注文を取得
    /// 注文日時の降順で並べて返す
    pub async fn get_all_orders(&self) -> Result<Vec<Order>, ApplicationError> {
        self.order_repository
            .find_all()
            .await
            .map_err(ApplicationError::from)
    }

    /// 指定されたステータスの注文を取得
    pub async fn get_orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<Order>, ApplicationError> {
        self.order_repository
            .find_by_status(status)
            .await
            .map_err(ApplicationError::from)
    }

    /// 指定されたステータス文字列の注文を取得
    pub async fn get_orders_by_status_string(
        &self,
        status_str: String,
    ) -> Result<Vec<Order>, ApplicationError> {
        let status = OrderStatus::from_string(&status_str)
            .map_err(|_| ApplicationError::Validation(format!("無効なステータス値: {}", status_str)))?;
        self.get_orders_by_status(status).await
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Order, ApplicationError> {
        self.order_repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("注文が見つかりません: {}", order_id))
            })
    }

    /// 注文のために開かれた、まだPendingの自動移送をキャンセルする
    async fn cancel_pending_transfers(
        &self,
        order: &Order,
        actor: Option<ActorId>,
    ) -> Result<(), ApplicationError> {
        let transfers = self
            .transfer_repository
            .find_pending_for_order(order.id())
            .await?;
        for mut transfer in transfers {
            transfer.cancel(format!(
                "注文 {} の終了に伴い自動キャンセルされました",
                order.id()
            ))?;
            self.transfer_repository.save(&transfer).await?;

            self.activity_log
                .record(ActivityEntry::new(
                    actor,
                    "TRANSFER_CANCELLED",
                    format!(
                        "移送 {} を注文 {} の終了に伴いキャンセルしました",
                        transfer.id(),
                        order.id()
                    ),
                    Some(RelatedEntity::Transfer(transfer.id())),
                ))
                .await;
        }
        Ok(())
    }
}
