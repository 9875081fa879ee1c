use crate::domain::error::DomainError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// 注文の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// 新しい一意のOrderIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから OrderId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からOrderIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

/// 商品の一意識別子
/// 商品マスタ自体はカタログ側の管理対象であり、本コアではIDのみ参照する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

/// 店舗の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchId(Uuid);

impl BranchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 倉庫の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarehouseId(Uuid);

impl WarehouseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 移送の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

/// 支払いの一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

/// 顧客の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(Uuid);

impl CustomerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

/// 操作実行者（スタッフまたは顧客）の識別子
/// 活動ログの記録者、移送の作成者、ピッキング担当者などに使用する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 通貨
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// チリ・ペソ
    #[allow(clippy::upper_case_acronyms)]
    CLP,
}

/// 金額を表す値オブジェクト
/// 固定小数点（Decimal）で保持し、浮動小数点は使用しない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// 金額と通貨から作成
    /// 負の金額は拒否する
    pub fn new(amount: Decimal, currency: String) -> Result<Self, DomainError> {
        let currency = match currency.as_str() {
            "CLP" => Currency::CLP,
            _ => {
                return Err(DomainError::InvalidValue(format!(
                    "サポートされていない通貨: {}",
                    currency
                )))
            }
        };
        if amount < Decimal::ZERO {
            return Err(DomainError::InvalidValue(format!(
                "金額は負にできません: {}",
                amount
            )));
        }
        Ok(Self { amount, currency })
    }

    /// チリ・ペソの金額を作成
    pub fn clp(amount: i64) -> Self {
        Self {
            amount: Decimal::from(amount),
            currency: Currency::CLP,
        }
    }

    /// ゼロ金額を作成
    pub fn zero() -> Self {
        Self::clp(0)
    }

    /// 金額を取得
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// 通貨を文字列として取得
    pub fn currency(&self) -> String {
        match self.currency {
            Currency::CLP => "CLP".to_string(),
        }
    }

    /// 金額を加算
    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch);
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    /// 金額を減算
    /// 結果が負になる場合はエラー
    pub fn subtract(&self, other: &Money) -> Result<Money, DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::CurrencyMismatch);
        }
        if other.amount > self.amount {
            return Err(DomainError::InvalidValue(format!(
                "減算の結果が負になります: {} - {}",
                self.amount, other.amount
            )));
        }
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    /// 金額を乗算
    pub fn multiply(&self, factor: u32) -> Money {
        Money {
            amount: self.amount * Decimal::from(factor),
            currency: self.currency,
        }
    }

    /// 金額が正であるかチェック
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// 決済ゲートウェイへ送る整数金額に変換
    /// ゲートウェイは通貨の端数を受け付けないため、整数部のみを使用する
    pub fn to_gateway_amount(&self) -> Result<i64, DomainError> {
        self.amount.trunc().to_i64().ok_or_else(|| {
            DomainError::InvalidValue(format!("金額を整数に変換できません: {}", self.amount))
        })
    }
}

/// 注文のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// 保留中（作成直後、支払い待ち）
    Pending,
    /// 処理中（在庫補充後の再処理を含む）
    Processing,
    /// 補充待ち（不足分の移送の完了待ち）
    PendingReplenishment,
    /// 支払い済み
    Paid,
    /// 発送済み
    Shipped,
    /// 配達完了
    Delivered,
    /// キャンセル済み
    Cancelled,
    /// 在庫不足による拒否（補充不可能）
    RejectedStock,
    /// 失敗（支払い失敗など）
    Failed,
}

impl OrderStatus {
    /// 終端状態かどうか
    /// 終端状態の注文は以後の遷移を受け付けない
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::RejectedStock
        )
    }

    /// 文字列からOrderStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Processing" => Ok(OrderStatus::Processing),
            "PendingReplenishment" => Ok(OrderStatus::PendingReplenishment),
            "Paid" => Ok(OrderStatus::Paid),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "RejectedStock" => Ok(OrderStatus::RejectedStock),
            "Failed" => Ok(OrderStatus::Failed),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な注文ステータス: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::PendingReplenishment => "PendingReplenishment",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::RejectedStock => "RejectedStock",
            OrderStatus::Failed => "Failed",
        };
        write!(f, "{}", status_str)
    }
}

/// 倉庫でのピッキング作業の進行状態
/// 注文ステータスとは独立した軸として管理する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreparationStatus {
    /// 担当者未割り当て
    PendingAssignment,
    /// 担当者割り当て済み
    Assigned,
    /// ピッキング中
    InPreparation,
    /// 引き渡し準備完了
    ReadyForHandoff,
}

impl PreparationStatus {
    /// 文字列からPreparationStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "PendingAssignment" => Ok(PreparationStatus::PendingAssignment),
            "Assigned" => Ok(PreparationStatus::Assigned),
            "InPreparation" => Ok(PreparationStatus::InPreparation),
            "ReadyForHandoff" => Ok(PreparationStatus::ReadyForHandoff),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な準備ステータス: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for PreparationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            PreparationStatus::PendingAssignment => "PendingAssignment",
            PreparationStatus::Assigned => "Assigned",
            PreparationStatus::InPreparation => "InPreparation",
            PreparationStatus::ReadyForHandoff => "ReadyForHandoff",
        };
        write!(f, "{}", status_str)
    }
}

/// 配送方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingMethod {
    /// 店舗受け取り
    StorePickup,
    /// 自宅配送
    HomeDelivery,
}

impl ShippingMethod {
    /// 文字列からShippingMethodを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "StorePickup" => Ok(ShippingMethod::StorePickup),
            "HomeDelivery" => Ok(ShippingMethod::HomeDelivery),
            _ => Err(DomainError::InvalidValue(format!("無効な配送方法: {}", s))),
        }
    }
}

impl fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method_str = match self {
            ShippingMethod::StorePickup => "StorePickup",
            ShippingMethod::HomeDelivery => "HomeDelivery",
        };
        write!(f, "{}", method_str)
    }
}

/// 活動ログの関連エンティティ
/// 対象となり得る種別を閉じた集合として型で表現する
/// （種別文字列 + IDの組による無型付けの参照は使わない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedEntity {
    Order(OrderId),
    Payment(PaymentId),
    Transfer(TransferId),
    Product(ProductId),
    Branch(BranchId),
}

impl RelatedEntity {
    /// 種別名を取得（永続化・表示用）
    pub fn kind(&self) -> &'static str {
        match self {
            RelatedEntity::Order(_) => "Order",
            RelatedEntity::Payment(_) => "Payment",
            RelatedEntity::Transfer(_) => "Transfer",
            RelatedEntity::Product(_) => "Product",
            RelatedEntity::Branch(_) => "Branch",
        }
    }

    /// 対象エンティティのUUIDを取得
    pub fn entity_id(&self) -> Uuid {
        match self {
            RelatedEntity::Order(id) => id.as_uuid(),
            RelatedEntity::Payment(id) => id.as_uuid(),
            RelatedEntity::Transfer(id) => id.as_uuid(),
            RelatedEntity::Product(id) => id.as_uuid(),
            RelatedEntity::Branch(id) => id.as_uuid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_creation() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2, "Each OrderId should be unique");
    }

    #[test]
    fn test_money_addition() {
        let money1 = Money::clp(1000);
        let money2 = Money::clp(500);
        let result = money1.add(&money2).unwrap();
        assert_eq!(result.amount(), Decimal::from(1500));
    }

    #[test]
    fn test_money_subtraction() {
        let money1 = Money::clp(1000);
        let money2 = Money::clp(300);
        let result = money1.subtract(&money2).unwrap();
        assert_eq!(result, Money::clp(700));
    }

    #[test]
    fn test_money_subtraction_negative_result_fails() {
        let money1 = Money::clp(100);
        let money2 = Money::clp(300);
        assert!(money1.subtract(&money2).is_err());
    }

    #[test]
    fn test_money_multiplication() {
        let money = Money::clp(100);
        let result = money.multiply(5);
        assert_eq!(result, Money::clp(500));
    }

    #[test]
    fn test_money_rejects_negative_amount() {
        let result = Money::new(Decimal::from(-1), "CLP".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_money_rejects_unknown_currency() {
        let result = Money::new(Decimal::from(100), "JPY".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_money_gateway_amount_truncates() {
        let money = Money::new(Decimal::new(149990, 2), "CLP".to_string()).unwrap();
        assert_eq!(money.to_gateway_amount().unwrap(), 1499);
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::RejectedStock.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Failed.is_terminal());
    }

    #[test]
    fn test_order_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::PendingReplenishment,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::RejectedStock,
            OrderStatus::Failed,
        ] {
            let parsed = OrderStatus::from_string(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_order_status_from_string_invalid() {
        assert!(OrderStatus::from_string("Invalid").is_err());
        assert!(OrderStatus::from_string("pending").is_err()); // 大文字小文字が違う
        assert!(OrderStatus::from_string("").is_err());
    }

    #[test]
    fn test_related_entity_kind() {
        let order_id = OrderId::new();
        let entity = RelatedEntity::Order(order_id);
        assert_eq!(entity.kind(), "Order");
        assert_eq!(entity.entity_id(), order_id.as_uuid());
    }
}
