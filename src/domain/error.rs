/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 無効な注文状態（例: 配達完了済みの注文をキャンセルしようとした）
    InvalidOrderState(String),
    /// 無効な移送状態（例: 輸送中の移送をキャンセルしようとした）
    InvalidTransferState(String),
    /// 無効な支払い状態（例: 完了していない支払いを返金しようとした）
    InvalidPaymentState(String),
    /// 在庫不足（どの倉庫からも不足分を補充できない）
    InsufficientStock(String),
    /// 無効な数量（例: 0の数量）
    InvalidQuantity,
    /// 倉庫の所属不一致（移送明細の倉庫がヘッダーの店舗に属していない）
    WarehouseMismatch(String),
    /// 店舗構成エラー（稼働中の倉庫が存在しないなど、業務エラーではなく設定ミス）
    ConfigurationError(String),
    /// 通貨の不一致
    CurrencyMismatch,
    /// 無効な値
    InvalidValue(String),
    /// リポジトリ操作の失敗（ドメインサービス経由で発生）
    RepositoryError(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::InvalidOrderState(msg) => write!(f, "Invalid order state: {}", msg),
            DomainError::InvalidTransferState(msg) => write!(f, "Invalid transfer state: {}", msg),
            DomainError::InvalidPaymentState(msg) => write!(f, "Invalid payment state: {}", msg),
            DomainError::InsufficientStock(msg) => write!(f, "Insufficient stock: {}", msg),
            DomainError::InvalidQuantity => write!(f, "Invalid quantity"),
            DomainError::WarehouseMismatch(msg) => write!(f, "Warehouse mismatch: {}", msg),
            DomainError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            DomainError::CurrencyMismatch => write!(f, "Currency mismatch"),
            DomainError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            DomainError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
