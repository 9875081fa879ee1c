use crate::application::ApplicationError;
use crate::domain::model::{ActorId, BranchId, ProductId, RelatedEntity, WarehouseId};
use crate::domain::port::{
    ActivityEntry, ActivityLog, BranchDirectory, Logger, ProductCatalog, StockRepository,
    StockSummaryRow,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 一括取り込みの結果レポート
#[derive(Debug, Clone, PartialEq)]
pub struct StockImportReport {
    /// 処理した行数（ヘッダーを除く）
    pub processed_rows: usize,
    /// 集約後に反映された在庫レコード数
    pub applied_records: usize,
    /// 行単位のエラー（行番号付き）
    pub errors: Vec<String>,
}

/// 集約キーごとの取り込みデータ
struct ImportEntry {
    branch_id: BranchId,
    quantity: u32,
    min_threshold: Option<u32>,
    max_threshold: Option<u32>,
}

/// 在庫アプリケーションサービス
/// 表形式ファイルからの一括取り込み、手動調整、店舗別集計を担当する
pub struct StockApplicationService {
    stock_repository: Arc<dyn StockRepository>,
    catalog: Arc<dyn ProductCatalog>,
    directory: Arc<dyn BranchDirectory>,
    activity_log: Arc<dyn ActivityLog>,
    logger: Arc<dyn Logger>,
}

impl StockApplicationService {
    /// 新しい在庫アプリケーションサービスを作成
    pub fn new(
        stock_repository: Arc<dyn StockRepository>,
        catalog: Arc<dyn ProductCatalog>,
        directory: Arc<dyn BranchDirectory>,
        activity_log: Arc<dyn ActivityLog>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            stock_repository,
            catalog,
            directory,
            activity_log,
            logger,
        }
    }

    /// CSV形式の在庫データを一括で取り込む
    ///
    /// 必須列: `product_sku`, `warehouse_id`, `quantity`
    /// 任意列: `min_threshold`, `max_threshold`
    ///
    /// 同一ファイル内で (商品, 倉庫) が重複する行は、上書きではなく
    /// 数量を合算してから反映する。行単位のエラーは収集して返し、
    /// 有効な行は取り込みを続行する。
    pub async fn import_stock(
        &self,
        content: &str,
        actor: Option<ActorId>,
    ) -> Result<StockImportReport, ApplicationError> {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header_line = lines.next().ok_or_else(|| {
            ApplicationError::Validation("取り込みファイルが空です".to_string())
        })?;

        // 列名を正規化する（前後の空白を除去、小文字化、空白をアンダースコアに）
        let headers: Vec<String> = header_line
            .split(',')
            .map(|column| column.trim().to_lowercase().replace(' ', "_"))
            .collect();
        let column = |name: &str| headers.iter().position(|header| header == name);

        let sku_idx = column("product_sku");
        let warehouse_idx = column("warehouse_id");
        let quantity_idx = column("quantity");
        let missing: Vec<&str> = [
            ("product_sku", sku_idx),
            ("warehouse_id", warehouse_idx),
            ("quantity", quantity_idx),
        ]
        .iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            return Err(ApplicationError::Validation(format!(
                "必須列が不足しています: {}",
                missing.join(", ")
            )));
        }
        let sku_idx = sku_idx.unwrap();
        let warehouse_idx = warehouse_idx.unwrap();
        let quantity_idx = quantity_idx.unwrap();
        let min_idx = column("min_threshold");
        let max_idx = column("max_threshold");

        let mut errors = Vec::new();
        let mut processed_rows = 0usize;
        // (商品, 倉庫) ごとに数量を合算する（決定的な反映順のためBTreeMap）
        let mut aggregated: BTreeMap<(ProductId, WarehouseId), ImportEntry> = BTreeMap::new();

        for (index, line) in lines.enumerate() {
            processed_rows += 1;
            // ヘッダーが1行目にあるため、データは2行目から
            let row_number = index + 2;
            let fields: Vec<&str> = line.split(',').map(|field| field.trim()).collect();

            let field = |idx: usize| fields.get(idx).copied().unwrap_or("");
            let sku = field(sku_idx);
            let warehouse_str = field(warehouse_idx);
            let quantity_str = field(quantity_idx);
            if sku.is_empty() || warehouse_str.is_empty() || quantity_str.is_empty() {
                errors.push(format!(
                    "{}行目: product_sku、warehouse_id、quantityは空にできません",
                    row_number
                ));
                continue;
            }

            let quantity = match quantity_str.parse::<u32>() {
                Ok(quantity) => quantity,
                Err(_) => {
                    errors.push(format!(
                        "{}行目: 数量 '{}' が不正です",
                        row_number, quantity_str
                    ));
                    continue;
                }
            };

            let warehouse_id = match WarehouseId::from_string(warehouse_str) {
                Ok(id) => id,
                Err(_) => {
                    errors.push(format!(
                        "{}行目: 倉庫ID '{}' が不正です",
                        row_number, warehouse_str
                    ));
                    continue;
                }
            };

            let product = match self.catalog.find_by_sku(sku).await? {
                Some(product) => product,
                None => {
                    errors.push(format!(
                        "{}行目: SKU '{}' の商品が見つかりません",
                        row_number, sku
                    ));
                    continue;
                }
            };

            let warehouse = match self.directory.find_warehouse(warehouse_id).await? {
                Some(warehouse) => warehouse,
                None => {
                    errors.push(format!(
                        "{}行目: 倉庫 '{}' が見つかりません",
                        row_number, warehouse_str
                    ));
                    continue;
                }
            };

            let parse_threshold = |idx: Option<usize>| -> Result<Option<u32>, String> {
                let Some(idx) = idx else { return Ok(None) };
                let raw = field(idx);
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<u32>()
                    .map(Some)
                    .map_err(|_| format!("{}行目: 閾値 '{}' が不正です", row_number, raw))
            };
            let min_threshold = match parse_threshold(min_idx) {
                Ok(value) => value,
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            };
            let max_threshold = match parse_threshold(max_idx) {
                Ok(value) => value,
                Err(message) => {
                    errors.push(message);
                    continue;
                }
            };

            let entry = aggregated
                .entry((product.id, warehouse.id))
                .or_insert(ImportEntry {
                    branch_id: warehouse.branch_id,
                    quantity: 0,
                    min_threshold: None,
                    max_threshold: None,
                });
            entry.quantity += quantity;
            if min_threshold.is_some() {
                entry.min_threshold = min_threshold;
            }
            if max_threshold.is_some() {
                entry.max_threshold = max_threshold;
            }
        }

        let applied_records = aggregated.len();
        for ((product_id, warehouse_id), entry) in aggregated {
            self.stock_repository
                .upsert_add(
                    entry.branch_id,
                    warehouse_id,
                    product_id,
                    entry.quantity,
                    entry.min_threshold,
                    entry.max_threshold,
                )
                .await?;
        }

        let mut context = HashMap::new();
        context.insert("processed_rows".to_string(), processed_rows.to_string());
        context.insert("applied_records".to_string(), applied_records.to_string());
        context.insert("errors".to_string(), errors.len().to_string());
        self.logger.info(
            "StockApplicationService",
            "Bulk stock import finished",
            None,
            Some(context),
        );
        if applied_records > 0 {
            self.activity_log
                .record(ActivityEntry::new(
                    actor,
                    "STOCK_IMPORTED",
                    format!(
                        "在庫の一括取り込みを実行しました（{}件反映、{}件エラー）",
                        applied_records,
                        errors.len()
                    ),
                    None,
                ))
                .await;
        }

        Ok(StockImportReport {
            processed_rows,
            applied_records,
            errors,
        })
    }

    /// 在庫を手動で調整する（棚卸しなど）
    /// 在庫が負になる調整は拒否される
    ///
    /// # Returns
    /// * `Ok(u32)` - 調整後の在庫数
    pub async fn adjust_stock(
        &self,
        sku: &str,
        warehouse_id: WarehouseId,
        delta: i64,
        reason: String,
        actor: Option<ActorId>,
    ) -> Result<u32, ApplicationError> {
        if delta == 0 {
            return Err(ApplicationError::Validation(
                "調整数量は0以外である必要があります".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(ApplicationError::Validation(
                "調整理由は必須です".to_string(),
            ));
        }

        let product = self.catalog.find_by_sku(sku).await?.ok_or_else(|| {
            ApplicationError::NotFound(format!("SKU '{}' の商品が見つかりません", sku))
        })?;
        let warehouse = self
            .directory
            .find_warehouse(warehouse_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("倉庫が見つかりません: {}", warehouse_id))
            })?;

        let record = self
            .stock_repository
            .get_or_create(warehouse.branch_id, warehouse.id, product.id)
            .await?;

        let new_quantity = if delta > 0 {
            let amount = delta as u32;
            self.stock_repository
                .increment(warehouse.id, product.id, amount)
                .await?;
            record.quantity() + amount
        } else {
            let amount = (-delta) as u32;
            if record.quantity() < amount {
                return Err(ApplicationError::Validation(format!(
                    "調整によって在庫が負になります（在庫: {}、調整: {}）",
                    record.quantity(),
                    delta
                )));
            }
            self.stock_repository
                .decrement(warehouse.id, product.id, amount)
                .await?;
            record.quantity() - amount
        };

        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "STOCK_ADJUSTED",
                format!(
                    "商品 {} の在庫を倉庫 {} で {} 調整しました（理由: {}、調整後: {}）",
                    product.sku, warehouse.id, delta, reason, new_quantity
                ),
                Some(RelatedEntity::Product(product.id)),
            ))
            .await;

        Ok(new_quantity)
    }

    /// 店舗の商品別在庫集計を取得する（倉庫ダッシュボード用）
    pub async fn branch_stock_summary(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<StockSummaryRow>, ApplicationError> {
        self.directory
            .find_branch(branch_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("店舗が見つかりません: {}", branch_id))
            })?;
        self.stock_repository
            .branch_summary(branch_id)
            .await
            .map_err(ApplicationError::from)
    }
}
