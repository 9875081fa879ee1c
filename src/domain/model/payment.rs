use crate::domain::error::DomainError;
use crate::domain::model::{Money, OrderId, PaymentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// 支払い方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// 決済ゲートウェイ（リダイレクト型カード決済）
    Gateway,
    /// 銀行振込（スタッフによる手動確認が必要）
    BankTransfer,
    /// 現金（店頭）
    Cash,
}

impl PaymentMethod {
    /// ゲートウェイ決済かどうか
    /// ゲートウェイ決済では在庫の引き当てを支払い成功後まで遅延させる
    pub fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Gateway)
    }

    /// 文字列からPaymentMethodを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "Gateway" => Ok(PaymentMethod::Gateway),
            "BankTransfer" => Ok(PaymentMethod::BankTransfer),
            "Cash" => Ok(PaymentMethod::Cash),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な支払い方法: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method_str = match self {
            PaymentMethod::Gateway => "Gateway",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::Cash => "Cash",
        };
        write!(f, "{}", method_str)
    }
}

/// 支払いのステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// 文字列からPaymentStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な支払いステータス: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        };
        write!(f, "{}", status_str)
    }
}

/// 分割払いの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentKind {
    /// 一括払い
    None,
    /// 通常の分割払い
    Regular,
    /// 無利子分割払い
    InterestFree,
}

impl InstallmentKind {
    /// 文字列からInstallmentKindを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "None" => Ok(InstallmentKind::None),
            "Regular" => Ok(InstallmentKind::Regular),
            "InterestFree" => Ok(InstallmentKind::InterestFree),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な分割払い種別: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for InstallmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_str = match self {
            InstallmentKind::None => "None",
            InstallmentKind::Regular => "Regular",
            InstallmentKind::InterestFree => "InterestFree",
        };
        write!(f, "{}", kind_str)
    }
}

/// 分割払いのメタデータ（ゲートウェイの確定応答から取得）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub kind: InstallmentKind,
    pub count: u32,
}

/// 銀行振込の手動確認サブステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// スタッフによる確認待ち
    AwaitingReview,
    /// 確認済み
    Confirmed,
    /// 却下
    Rejected,
}

impl ConfirmationStatus {
    /// 文字列からConfirmationStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "AwaitingReview" => Ok(ConfirmationStatus::AwaitingReview),
            "Confirmed" => Ok(ConfirmationStatus::Confirmed),
            "Rejected" => Ok(ConfirmationStatus::Rejected),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な確認ステータス: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            ConfirmationStatus::AwaitingReview => "AwaitingReview",
            ConfirmationStatus::Confirmed => "Confirmed",
            ConfirmationStatus::Rejected => "Rejected",
        };
        write!(f, "{}", status_str)
    }
}

/// 支払い集約
/// 1つの注文に対する1回の支払い試行を表す
/// 注文は複数回の支払い試行を持ち得る（失敗後の再試行など）
#[derive(Debug, Clone)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    amount: Money,
    method: PaymentMethod,
    status: PaymentStatus,
    /// ゲートウェイのリダイレクト用トランザクショントークン
    gateway_token: Option<String>,
    /// ゲートウェイ側のトランザクションID（承認コード）
    gateway_transaction_id: Option<String>,
    installments: Option<InstallmentPlan>,
    /// 銀行振込の手動確認状態（銀行振込のみ）
    confirmation: Option<ConfirmationStatus>,
    created_at: DateTime<Utc>,
}

impl Payment {
    /// ゲートウェイ決済の支払い試行を作成
    pub fn new_gateway(id: PaymentId, order_id: OrderId, amount: Money) -> Self {
        Self {
            id,
            order_id,
            amount,
            method: PaymentMethod::Gateway,
            status: PaymentStatus::Pending,
            gateway_token: None,
            gateway_transaction_id: None,
            installments: None,
            confirmation: None,
            created_at: Utc::now(),
        }
    }

    /// 現金払いの支払いを作成
    /// 店頭での現金受領は即時完了として扱う
    pub fn new_cash(id: PaymentId, order_id: OrderId, amount: Money) -> Self {
        Self {
            id,
            order_id,
            amount,
            method: PaymentMethod::Cash,
            status: PaymentStatus::Completed,
            gateway_token: None,
            gateway_transaction_id: None,
            installments: None,
            confirmation: None,
            created_at: Utc::now(),
        }
    }

    /// 銀行振込の支払いを作成
    /// スタッフによる確認が完了するまでPendingのまま
    pub fn new_bank_transfer(id: PaymentId, order_id: OrderId, amount: Money) -> Self {
        Self {
            id,
            order_id,
            amount,
            method: PaymentMethod::BankTransfer,
            status: PaymentStatus::Pending,
            gateway_token: None,
            gateway_transaction_id: None,
            installments: None,
            confirmation: Some(ConfirmationStatus::AwaitingReview),
            created_at: Utc::now(),
        }
    }

    /// 永続化層から取得したデータで支払いを再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: PaymentId,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        status: PaymentStatus,
        gateway_token: Option<String>,
        gateway_transaction_id: Option<String>,
        installments: Option<InstallmentPlan>,
        confirmation: Option<ConfirmationStatus>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            amount,
            method,
            status,
            gateway_token,
            gateway_transaction_id,
            installments,
            confirmation,
            created_at,
        }
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn gateway_token(&self) -> Option<&str> {
        self.gateway_token.as_deref()
    }

    pub fn gateway_transaction_id(&self) -> Option<&str> {
        self.gateway_transaction_id.as_deref()
    }

    pub fn installments(&self) -> Option<InstallmentPlan> {
        self.installments
    }

    pub fn confirmation(&self) -> Option<ConfirmationStatus> {
        self.confirmation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// ゲートウェイのトークンを設定する（トークン発行後）
    /// トークンの発行と確定は別々のトランザクションで行われる
    pub fn set_gateway_token(&mut self, token: String) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidPaymentState(
                "トークンを設定できるのはPending状態のみです".to_string(),
            ));
        }
        self.gateway_token = Some(token);
        Ok(())
    }

    /// 支払いを完了にする
    pub fn complete(
        &mut self,
        transaction_id: Option<String>,
        installments: Option<InstallmentPlan>,
    ) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidPaymentState(format!(
                "{} の支払いを完了にはできません",
                self.status
            )));
        }
        self.status = PaymentStatus::Completed;
        self.gateway_transaction_id = transaction_id;
        self.installments = installments;
        if self.confirmation.is_some() {
            self.confirmation = Some(ConfirmationStatus::Confirmed);
        }
        Ok(())
    }

    /// 支払いを失敗にする
    pub fn fail(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidPaymentState(format!(
                "{} の支払いを失敗にはできません",
                self.status
            )));
        }
        self.status = PaymentStatus::Failed;
        if self.confirmation.is_some() {
            self.confirmation = Some(ConfirmationStatus::Rejected);
        }
        Ok(())
    }

    /// 支払いを返金済みにする
    pub fn refund(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Completed {
            return Err(DomainError::InvalidPaymentState(format!(
                "{} の支払いは返金できません",
                self.status
            )));
        }
        self.status = PaymentStatus::Refunded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_payment_starts_pending() {
        let payment = Payment::new_gateway(PaymentId::new(), OrderId::new(), Money::clp(1000));
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert!(payment.confirmation().is_none());
    }

    #[test]
    fn test_cash_payment_is_completed_immediately() {
        let payment = Payment::new_cash(PaymentId::new(), OrderId::new(), Money::clp(1000));
        assert_eq!(payment.status(), PaymentStatus::Completed);
    }

    #[test]
    fn test_bank_transfer_awaits_review() {
        let payment =
            Payment::new_bank_transfer(PaymentId::new(), OrderId::new(), Money::clp(1000));
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert_eq!(
            payment.confirmation(),
            Some(ConfirmationStatus::AwaitingReview)
        );
    }

    #[test]
    fn test_complete_records_transaction_and_installments() {
        let mut payment = Payment::new_gateway(PaymentId::new(), OrderId::new(), Money::clp(1000));
        payment
            .complete(
                Some("AUTH-123".to_string()),
                Some(InstallmentPlan {
                    kind: InstallmentKind::Regular,
                    count: 3,
                }),
            )
            .unwrap();
        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.gateway_transaction_id(), Some("AUTH-123"));
        assert_eq!(payment.installments().unwrap().count, 3);
    }

    #[test]
    fn test_complete_bank_transfer_confirms() {
        let mut payment =
            Payment::new_bank_transfer(PaymentId::new(), OrderId::new(), Money::clp(1000));
        payment.complete(None, None).unwrap();
        assert_eq!(payment.confirmation(), Some(ConfirmationStatus::Confirmed));
    }

    #[test]
    fn test_fail_bank_transfer_rejects() {
        let mut payment =
            Payment::new_bank_transfer(PaymentId::new(), OrderId::new(), Money::clp(1000));
        payment.fail().unwrap();
        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(payment.confirmation(), Some(ConfirmationStatus::Rejected));
    }

    #[test]
    fn test_complete_twice_fails() {
        let mut payment = Payment::new_gateway(PaymentId::new(), OrderId::new(), Money::clp(1000));
        payment.complete(None, None).unwrap();
        assert!(payment.complete(None, None).is_err());
    }

    #[test]
    fn test_refund_requires_completed() {
        let mut payment = Payment::new_gateway(PaymentId::new(), OrderId::new(), Money::clp(1000));
        assert!(payment.refund().is_err());

        payment.complete(None, None).unwrap();
        assert!(payment.refund().is_ok());
        assert_eq!(payment.status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_set_gateway_token_only_while_pending() {
        let mut payment = Payment::new_gateway(PaymentId::new(), OrderId::new(), Money::clp(1000));
        assert!(payment.set_gateway_token("tok-1".to_string()).is_ok());
        payment.complete(None, None).unwrap();
        assert!(payment.set_gateway_token("tok-2".to_string()).is_err());
    }
}
