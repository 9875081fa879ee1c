use crate::domain::error::DomainError;
use crate::domain::port::{GatewayError, RepositoryError};

/// アプリケーション層のエラー型
/// ドメインエラー、リポジトリエラー、ゲートウェイエラーをラップする
#[derive(Debug)]
pub enum ApplicationError {
    /// ドメインエラー（ビジネスルール違反）
    DomainError(DomainError),
    /// リポジトリエラー（永続化の失敗）
    RepositoryError(RepositoryError),
    /// 決済ゲートウェイエラー（ハンドシェイクまたは確定の失敗）
    GatewayError(GatewayError),
    /// エンティティが見つからない
    NotFound(String),
    /// 操作が許可されていない（担当者の店舗違いなど）
    Forbidden(String),
    /// 入力の検証失敗
    Validation(String),
}

impl std::fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationError::DomainError(err) => write!(f, "Domain error: {}", err),
            ApplicationError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            ApplicationError::GatewayError(err) => write!(f, "Gateway error: {}", err),
            ApplicationError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApplicationError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApplicationError::Validation(msg) => write!(f, "Validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ApplicationError {}

// From実装でエラー変換を簡潔に
impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        ApplicationError::DomainError(err)
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        ApplicationError::RepositoryError(err)
    }
}

impl From<GatewayError> for ApplicationError {
    fn from(err: GatewayError) -> Self {
        ApplicationError::GatewayError(err)
    }
}
