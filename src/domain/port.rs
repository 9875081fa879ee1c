// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{
    ActorId, Branch, BranchId, Order, OrderId, OrderStatus, Payment, PaymentId, Product,
    ProductId, RelatedEntity, StockRecord, Transfer, TransferId, Warehouse, WarehouseId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// ログレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    /// データベース接続に失敗
    ConnectionFailed(String),
    /// 操作に失敗
    OperationFailed(String),
    /// データの取得に失敗
    FetchFailed(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            RepositoryError::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
            RepositoryError::FetchFailed(msg) => write!(f, "Fetch failed: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// 注文リポジトリトレイト
/// 注文集約の永続化を抽象化する
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 注文を保存する（ヘッダーと明細を同一トランザクションで）
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// 注文IDで注文を検索する
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// すべての注文を取得する
    /// 注文日時の降順で並べて返す
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// 指定されたステータスの注文を取得する
    /// 注文日時の降順で並べて返す
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError>;

    /// 指定された担当者に割り当てられ、準備作業が進行中
    /// （AssignedまたはInPreparation）の注文件数を返す
    async fn count_active_preparations(&self, picker: ActorId) -> Result<u32, RepositoryError>;

    /// 新しい一意の注文IDを生成する
    fn next_identity(&self) -> OrderId;
}

/// 店舗別の在庫集計行（倉庫ダッシュボード用）
#[derive(Debug, Clone, PartialEq)]
pub struct StockSummaryRow {
    pub product_id: ProductId,
    pub total_quantity: u32,
    pub min_threshold: Option<u32>,
}

/// 在庫リポジトリトレイト
/// 在庫レコードと店舗在庫（遅延作成）の永続化を抽象化する
///
/// 増減は相対的な更新として表現する。同じ在庫レコードに対する
/// 並行操作はストレージ層の原子的更新で直列化され、
/// アプリケーション側のロックには依存しない。
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// (店舗, 倉庫, 商品) の在庫レコードを取得する。
    /// 存在しない場合は数量0で遅延作成する。
    /// 店舗在庫（BranchInventory）もこのとき遅延作成される。
    async fn get_or_create(
        &self,
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<StockRecord, RepositoryError>;

    /// (倉庫, 商品) の在庫レコードを検索する
    async fn find(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<Option<StockRecord>, RepositoryError>;

    /// 在庫数を相対的に加算する
    async fn increment(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    /// 在庫数を相対的に減算する
    /// 結果が負になる場合は失敗し、何も変更しない
    async fn decrement(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    /// 一括取り込み用: 在庫数を加算し、閾値があれば更新する
    /// レコードが存在しない場合は作成する
    async fn upsert_add(
        &self,
        branch_id: BranchId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: u32,
        min_threshold: Option<u32>,
        max_threshold: Option<u32>,
    ) -> Result<(), RepositoryError>;

    /// 指定された商品について、数量が min_quantity 以上の在庫レコードを
    /// 検索する。exclude_warehouse は除外する。
    /// 数量の降順、同数の場合は倉庫IDの昇順（決定的なタイブレーク）で返す。
    async fn find_sources(
        &self,
        product_id: ProductId,
        min_quantity: u32,
        exclude_warehouse: WarehouseId,
    ) -> Result<Vec<StockRecord>, RepositoryError>;

    /// 店舗の商品別在庫集計を返す（商品IDの昇順）
    async fn branch_summary(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<StockSummaryRow>, RepositoryError>;
}

/// 移送リポジトリトレイト
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// 移送を保存する（ヘッダーと明細を同一トランザクションで）
    async fn save(&self, transfer: &Transfer) -> Result<(), RepositoryError>;

    /// 移送IDで検索する
    async fn find_by_id(&self, transfer_id: TransferId)
        -> Result<Option<Transfer>, RepositoryError>;

    /// すべての移送を取得する（依頼日時の降順）
    async fn find_all(&self) -> Result<Vec<Transfer>, RepositoryError>;

    /// 同じ注文・商品・受入先に対するPendingの自動移送が
    /// 既に存在するか検索する（重複作成の抑止に使用）
    async fn find_pending_duplicate(
        &self,
        order_id: OrderId,
        destination_branch_id: BranchId,
        product_id: ProductId,
        destination_warehouse_id: WarehouseId,
    ) -> Result<Option<Transfer>, RepositoryError>;

    /// 指定された注文のために開かれた、まだPendingの自動移送を返す
    /// （注文キャンセル時の連動キャンセルに使用）
    async fn find_pending_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Transfer>, RepositoryError>;

    /// 新しい一意の移送IDを生成する
    fn next_identity(&self) -> TransferId;
}

/// 支払いリポジトリトレイト
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// 支払いを保存する
    async fn save(&self, payment: &Payment) -> Result<(), RepositoryError>;

    /// 支払いIDで検索する
    async fn find_by_id(&self, payment_id: PaymentId)
        -> Result<Option<Payment>, RepositoryError>;

    /// ゲートウェイのトークンで検索する
    async fn find_by_token(&self, token: &str) -> Result<Option<Payment>, RepositoryError>;

    /// 注文に紐づくPendingのゲートウェイ支払いを検索する
    /// （同一注文への再試行時にトークンを更新するため）
    async fn find_pending_gateway_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError>;

    /// 注文に紐づくすべての支払いを取得する（作成日時の降順）
    async fn find_by_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError>;

    /// 新しい一意の支払いIDを生成する
    fn next_identity(&self) -> PaymentId;
}

/// 店舗・倉庫ディレクトリトレイト
/// 店舗と倉庫の参照のみを提供する（本コアは変更しない）
#[async_trait]
pub trait BranchDirectory: Send + Sync {
    /// 店舗を検索する
    async fn find_branch(&self, branch_id: BranchId) -> Result<Option<Branch>, RepositoryError>;

    /// 倉庫を検索する
    async fn find_warehouse(
        &self,
        warehouse_id: WarehouseId,
    ) -> Result<Option<Warehouse>, RepositoryError>;

    /// 店舗の稼働中の倉庫を倉庫IDの昇順で返す
    async fn active_warehouses(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<Warehouse>, RepositoryError>;
}

/// 商品カタログトレイト
/// 商品の参照のみを提供する（本コアは変更しない）
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// 商品IDで検索する
    async fn find_product(&self, product_id: ProductId)
        -> Result<Option<Product>, RepositoryError>;

    /// SKUで検索する
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError>;
}

/// 活動ログのエントリ
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub actor: Option<ActorId>,
    pub action: String,
    pub description: String,
    pub related: Option<RelatedEntity>,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// 新しい活動ログエントリを作成
    pub fn new(
        actor: Option<ActorId>,
        action: &str,
        description: String,
        related: Option<RelatedEntity>,
    ) -> Self {
        Self {
            actor,
            action: action.to_string(),
            description,
            related,
            occurred_at: Utc::now(),
        }
    }
}

/// 活動ログトレイト
/// 書き込みのみ（fire-and-forget）。記録の失敗は呼び出し元の
/// 業務処理を失敗させない。
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// 活動を記録する
    async fn record(&self, entry: ActivityEntry);
}

/// 決済ゲートウェイエラー
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),
    #[error("Gateway returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// トークン発行の応答
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayTransaction {
    pub token: String,
    pub redirect_url: String,
}

/// トランザクション確定の応答
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCommit {
    pub status: String,
    pub response_code: i32,
    pub authorization_code: Option<String>,
    pub amount: i64,
    pub buy_order: String,
    pub installments_number: Option<u32>,
    pub payment_type_code: Option<String>,
}

impl GatewayCommit {
    /// 承認されたかどうか
    /// status が AUTHORIZED かつ response_code が 0 の場合のみ承認
    pub fn is_approved(&self) -> bool {
        self.status == "AUTHORIZED" && self.response_code == 0
    }
}

/// 決済ゲートウェイトレイト
/// リダイレクト型の外部決済とのハンドシェイクを抽象化する
///
/// create と commit は別々のトランザクションとして実行され、
/// リダイレクトの往復中にデータベーストランザクションを保持しない。
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// トランザクショントークンを発行する
    async fn create(
        &self,
        buy_order: &str,
        session_id: &str,
        amount: i64,
        return_url: &str,
    ) -> Result<GatewayTransaction, GatewayError>;

    /// トークンでトランザクションを確定する
    async fn commit(&self, token: &str) -> Result<GatewayCommit, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_commit_approval() {
        let commit = GatewayCommit {
            status: "AUTHORIZED".to_string(),
            response_code: 0,
            authorization_code: Some("1213".to_string()),
            amount: 1000,
            buy_order: "abc".to_string(),
            installments_number: None,
            payment_type_code: None,
        };
        assert!(commit.is_approved());
    }

    #[test]
    fn test_gateway_commit_rejected_by_response_code() {
        let commit = GatewayCommit {
            status: "AUTHORIZED".to_string(),
            response_code: -1,
            authorization_code: None,
            amount: 1000,
            buy_order: "abc".to_string(),
            installments_number: None,
            payment_type_code: None,
        };
        assert!(!commit.is_approved());
    }

    #[test]
    fn test_gateway_commit_rejected_by_status() {
        let commit = GatewayCommit {
            status: "FAILED".to_string(),
            response_code: 0,
            authorization_code: None,
            amount: 1000,
            buy_order: "abc".to_string(),
            installments_number: None,
            payment_type_code: None,
        };
        assert!(!commit.is_approved());
    }
}
