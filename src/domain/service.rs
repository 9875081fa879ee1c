// ドメインサービス
// 複数の集約にまたがるビジネスロジックを実装

use crate::domain::error::DomainError;
use crate::domain::model::{
    ActorId, Order, ProductId, Transfer, TransferReason, Warehouse, WarehouseKind,
};
use crate::domain::port::{BranchDirectory, StockRepository, TransferRepository};
use std::sync::Arc;

/// 在庫引き当ての結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockApplication {
    /// すべての明細を倉庫から直接引き当てた
    Satisfied,
    /// 少なくとも1つの明細が移送による補充を待っている
    Partial,
}

/// 明細ごとの適用計画
/// 変更を加える前に全明細を検証し、失敗時に部分的な
/// 在庫変更が残らないようにする
enum LinePlan {
    /// 既に引き当て済み（再試行時）
    Covered,
    /// 全量を直接引き当てる
    Deduct { product_id: ProductId, quantity: u32 },
    /// 利用可能分を消費し、不足分の移送を開く
    Shortfall {
        product_id: ProductId,
        consume: u32,
        shortfall: u32,
    },
}

/// 在庫変更サービス
/// 注文の在庫影響を原子的に適用・逆適用する。
/// 引き当て先の店舗で在庫が不足する場合は移送サブシステムを起動する。
pub struct StockMutationService {
    stock_repository: Arc<dyn StockRepository>,
    transfer_repository: Arc<dyn TransferRepository>,
    directory: Arc<dyn BranchDirectory>,
}

impl StockMutationService {
    /// 新しい在庫変更サービスを作成
    pub fn new(
        stock_repository: Arc<dyn StockRepository>,
        transfer_repository: Arc<dyn TransferRepository>,
        directory: Arc<dyn BranchDirectory>,
    ) -> Self {
        Self {
            stock_repository,
            transfer_repository,
            directory,
        }
    }

    /// 注文の引き当てに使う稼働倉庫を解決する
    /// 売場倉庫を優先し、なければ店舗の稼働中の倉庫を使う。
    /// 1つもない場合は業務エラーではなく構成エラーとして扱う。
    pub async fn operating_warehouse(
        &self,
        branch_id: crate::domain::model::BranchId,
    ) -> Result<Warehouse, DomainError> {
        let warehouses = self
            .directory
            .active_warehouses(branch_id)
            .await
            .map_err(|e| DomainError::RepositoryError(format!("倉庫の取得に失敗: {}", e)))?;

        if let Some(sales_floor) = warehouses
            .iter()
            .find(|warehouse| warehouse.kind == WarehouseKind::SalesFloor)
        {
            return Ok(sales_floor.clone());
        }

        warehouses.into_iter().next().ok_or_else(|| {
            DomainError::ConfigurationError(format!(
                "店舗 {} に稼働中の倉庫が存在しません",
                branch_id
            ))
        })
    }

    /// 注文の在庫影響を適用または逆適用する
    ///
    /// 順方向（reverse = false）:
    /// - 初回パスでは各明細の全量を、再試行パスでは補充待ち数量のみを引き当てる
    /// - 在庫が不足する明細は利用可能分を消費して0にし、不足分ちょうどを
    ///   カバーする移送を開いて `Partial` の一部として継続する
    /// - どの倉庫からも不足分を補充できない場合は `InsufficientStock` で
    ///   全体を失敗させる（在庫は一切変更されない）
    ///
    /// 逆方向（reverse = true）:
    /// - 実際に消費された数量を倉庫へ戻す
    /// - 引き当てが有効でない注文への逆適用は何もしない（冪等）
    ///
    /// # Returns
    /// * `Ok(StockApplication::Satisfied)` - すべての明細を直接引き当てた
    /// * `Ok(StockApplication::Partial)` - 補充待ちの明細がある
    /// * `Err(DomainError::InsufficientStock)` - 補充不可能な不足
    /// * `Err(DomainError::ConfigurationError)` - 稼働倉庫が存在しない
    pub async fn apply_order_stock_effect(
        &self,
        order: &mut Order,
        reverse: bool,
        actor: Option<ActorId>,
    ) -> Result<StockApplication, DomainError> {
        if reverse {
            return self.reverse_order_stock(order).await;
        }

        let warehouse = self.operating_warehouse(order.branch_id()).await?;
        let retry = order.stock_applied();

        // 計画フェーズ: 在庫を変更する前に全明細を検証する
        let mut plans = Vec::with_capacity(order.lines().len());
        for line in order.lines() {
            let outstanding = if retry {
                line.pending_quantity()
            } else {
                line.quantity()
            };
            if outstanding == 0 {
                plans.push(LinePlan::Covered);
                continue;
            }

            let record = self
                .stock_repository
                .get_or_create(order.branch_id(), warehouse.id, line.product_id())
                .await
                .map_err(|e| {
                    DomainError::RepositoryError(format!("在庫レコードの取得に失敗: {}", e))
                })?;

            if record.has_available(outstanding) {
                plans.push(LinePlan::Deduct {
                    product_id: line.product_id(),
                    quantity: outstanding,
                });
            } else {
                let available = record.quantity();
                let shortfall = outstanding - available;
                let coverable = self
                    .can_cover_shortfall(order, line.product_id(), shortfall, &warehouse)
                    .await?;
                if !coverable {
                    return Err(DomainError::InsufficientStock(format!(
                        "商品 {} の不足分 {} をどの倉庫からも補充できません",
                        line.product_id(),
                        shortfall
                    )));
                }
                plans.push(LinePlan::Shortfall {
                    product_id: line.product_id(),
                    consume: available,
                    shortfall,
                });
            }
        }

        // 適用フェーズ
        let mut partial = false;
        for plan in plans {
            match plan {
                LinePlan::Covered => {}
                LinePlan::Deduct {
                    product_id,
                    quantity,
                } => {
                    self.stock_repository
                        .decrement(warehouse.id, product_id, quantity)
                        .await
                        .map_err(|e| {
                            DomainError::RepositoryError(format!("在庫の引き当てに失敗: {}", e))
                        })?;
                    order.set_line_pending(product_id, 0)?;
                }
                LinePlan::Shortfall {
                    product_id,
                    consume,
                    shortfall,
                } => {
                    if consume > 0 {
                        self.stock_repository
                            .decrement(warehouse.id, product_id, consume)
                            .await
                            .map_err(|e| {
                                DomainError::RepositoryError(format!(
                                    "在庫の部分消費に失敗: {}",
                                    e
                                ))
                            })?;
                    }
                    let opened = self
                        .try_open_automatic_transfer(
                            order,
                            product_id,
                            shortfall,
                            &warehouse,
                            actor,
                        )
                        .await?;
                    if !opened {
                        // 計画フェーズで補充可能性を確認済みのため通常は到達しない
                        return Err(DomainError::InsufficientStock(format!(
                            "商品 {} の移送を開けませんでした",
                            product_id
                        )));
                    }
                    order.set_line_pending(product_id, shortfall)?;
                    partial = true;
                }
            }
        }

        order.set_stock_applied(true);
        Ok(if partial {
            StockApplication::Partial
        } else {
            StockApplication::Satisfied
        })
    }

    /// 不足分をカバーする自動移送を開こうと試みる
    ///
    /// 受入先の倉庫を除き、数量が不足分以上の在庫レコードのうち
    /// 最も数量の多いもの（同数なら倉庫IDの昇順）を出荷元に選ぶ。
    /// 同じ注文・商品・受入先に対するPendingの移送が既にあれば
    /// 重複を作らず処理済みとして扱う。
    ///
    /// # Returns
    /// * `Ok(true)` - 移送を開いた、または既存の移送が見つかった
    /// * `Ok(false)` - どの倉庫も不足分をカバーできない
    pub async fn try_open_automatic_transfer(
        &self,
        order: &Order,
        product_id: ProductId,
        shortfall: u32,
        destination_warehouse: &Warehouse,
        actor: Option<ActorId>,
    ) -> Result<bool, DomainError> {
        if shortfall == 0 {
            return Err(DomainError::InvalidQuantity);
        }

        let existing = self
            .transfer_repository
            .find_pending_duplicate(
                order.id(),
                order.branch_id(),
                product_id,
                destination_warehouse.id,
            )
            .await
            .map_err(|e| DomainError::RepositoryError(format!("移送の検索に失敗: {}", e)))?;
        if existing.is_some() {
            return Ok(true);
        }

        let sources = self
            .stock_repository
            .find_sources(product_id, shortfall, destination_warehouse.id)
            .await
            .map_err(|e| DomainError::RepositoryError(format!("出荷元の検索に失敗: {}", e)))?;
        let source = match sources.into_iter().next() {
            Some(source) => source,
            None => return Ok(false),
        };

        let source_warehouse = self
            .directory
            .find_warehouse(source.warehouse_id())
            .await
            .map_err(|e| DomainError::RepositoryError(format!("倉庫の取得に失敗: {}", e)))?
            .ok_or_else(|| {
                DomainError::ConfigurationError(format!(
                    "在庫レコードの倉庫 {} がディレクトリに存在しません",
                    source.warehouse_id()
                ))
            })?;

        let mut transfer = Transfer::new(
            self.transfer_repository.next_identity(),
            source_warehouse.branch_id,
            order.branch_id(),
            TransferReason::OrderCompletion,
            Some(order.id()),
            actor,
        );
        transfer.add_line(product_id, shortfall, &source_warehouse, destination_warehouse)?;

        self.transfer_repository
            .save(&transfer)
            .await
            .map_err(|e| DomainError::RepositoryError(format!("移送の保存に失敗: {}", e)))?;
        Ok(true)
    }

    /// 不足分が既存の移送または新規の移送でカバー可能かを
    /// 在庫を変更せずに確認する（計画フェーズ用）
    async fn can_cover_shortfall(
        &self,
        order: &Order,
        product_id: ProductId,
        shortfall: u32,
        destination_warehouse: &Warehouse,
    ) -> Result<bool, DomainError> {
        let existing = self
            .transfer_repository
            .find_pending_duplicate(
                order.id(),
                order.branch_id(),
                product_id,
                destination_warehouse.id,
            )
            .await
            .map_err(|e| DomainError::RepositoryError(format!("移送の検索に失敗: {}", e)))?;
        if existing.is_some() {
            return Ok(true);
        }

        let sources = self
            .stock_repository
            .find_sources(product_id, shortfall, destination_warehouse.id)
            .await
            .map_err(|e| DomainError::RepositoryError(format!("出荷元の検索に失敗: {}", e)))?;
        Ok(!sources.is_empty())
    }

    /// 注文の在庫影響を逆適用する（キャンセル・支払い失敗・返金時）
    /// 実際に消費された数量のみを稼働倉庫へ戻す
    async fn reverse_order_stock(
        &self,
        order: &mut Order,
    ) -> Result<StockApplication, DomainError> {
        // 二重戻しの防止: 引き当てが有効でない場合は何もしない
        if !order.stock_applied() {
            return Ok(StockApplication::Satisfied);
        }

        let warehouse = self.operating_warehouse(order.branch_id()).await?;
        for line in order.lines() {
            let consumed = line.consumed_quantity();
            if consumed == 0 {
                continue;
            }
            self.stock_repository
                .get_or_create(order.branch_id(), warehouse.id, line.product_id())
                .await
                .map_err(|e| {
                    DomainError::RepositoryError(format!("在庫レコードの取得に失敗: {}", e))
                })?;
            self.stock_repository
                .increment(warehouse.id, line.product_id(), consumed)
                .await
                .map_err(|e| DomainError::RepositoryError(format!("在庫の戻しに失敗: {}", e)))?;
        }

        order.clear_pending_quantities();
        order.set_stock_applied(false);
        Ok(StockApplication::Satisfied)
    }
}
