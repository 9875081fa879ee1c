use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    ActorId, InstallmentKind, InstallmentPlan, Order, OrderId, OrderStatus, Payment, PaymentId,
    PaymentMethod, RelatedEntity,
};
use crate::domain::port::{
    ActivityEntry, ActivityLog, GatewayCommit, Logger, OrderRepository, PaymentGateway,
    PaymentRepository, TransferRepository,
};
use crate::domain::reconciler::{self, OrderDirective, StockDirective};
use crate::domain::service::{StockApplication, StockMutationService};
use std::collections::HashMap;
use std::sync::Arc;

/// ゲートウェイへのリダイレクト情報
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRedirect {
    pub token: String,
    pub redirect_url: String,
    pub order_id: OrderId,
}

/// ゲートウェイからの戻り処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayReturnOutcome {
    /// 承認され、在庫も引き当てられた
    Approved(OrderId),
    /// 承認されたが、一部の在庫が移送による補充を待っている
    AwaitingReplenishment(OrderId),
    /// 承認されたが、在庫を補充できず注文は拒否された
    /// （支払いは完了のまま、不整合はメモとして記録される）
    RejectedForStock(OrderId),
    /// 承認されなかった
    Declined(OrderId),
}

/// リコンサイラー実行の内部結果
enum ReactionOutcome {
    Done,
    AwaitingReplenishment,
    RejectedForStock,
}

/// 支払いアプリケーションサービス
/// ゲートウェイとのハンドシェイク、手動支払いの登録・確認、返金、
/// および支払い状態の変化に対する注文⇄在庫のリコンサイルを担当する
pub struct PaymentApplicationService {
    payment_repository: Arc<dyn PaymentRepository>,
    order_repository: Arc<dyn OrderRepository>,
    transfer_repository: Arc<dyn TransferRepository>,
    stock_service: Arc<StockMutationService>,
    gateway: Arc<dyn PaymentGateway>,
    activity_log: Arc<dyn ActivityLog>,
    logger: Arc<dyn Logger>,
    /// ゲートウェイが支払い後に戻ってくるURL
    return_url: String,
}

impl PaymentApplicationService {
    /// 新しい支払いアプリケーションサービスを作成
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_repository: Arc<dyn PaymentRepository>,
        order_repository: Arc<dyn OrderRepository>,
        transfer_repository: Arc<dyn TransferRepository>,
        stock_service: Arc<StockMutationService>,
        gateway: Arc<dyn PaymentGateway>,
        activity_log: Arc<dyn ActivityLog>,
        logger: Arc<dyn Logger>,
        return_url: String,
    ) -> Self {
        Self {
            payment_repository,
            order_repository,
            transfer_repository,
            stock_service,
            gateway,
            activity_log,
            logger,
            return_url,
        }
    }

    /// ゲートウェイ決済を開始する
    ///
    /// トークンの発行と確定は別々のトランザクションであり、
    /// リダイレクトの往復中にデータベーストランザクションは保持しない。
    /// 発行されたトークンは支払いレコードに永続化され、
    /// 戻り処理はトークンで支払いを特定する。
    pub async fn initiate_gateway_payment(
        &self,
        order_id: OrderId,
        session_id: String,
        actor: Option<ActorId>,
    ) -> Result<GatewayRedirect, ApplicationError> {
        let order = self.find_order(order_id).await?;

        if !matches!(
            order.status(),
            OrderStatus::Pending | OrderStatus::Failed | OrderStatus::PendingReplenishment
        ) {
            return Err(ApplicationError::Validation(format!(
                "注文 {} は支払いを開始できる状態ではありません（現在: {}）",
                order.id(),
                order.status()
            )));
        }
        if !order.total().is_positive() {
            return Err(ApplicationError::Validation(
                "注文の合計金額は0より大きい必要があります".to_string(),
            ));
        }

        let amount = order.total().to_gateway_amount()?;
        let transaction = self
            .gateway
            .create(
                &order.id().to_string(),
                &session_id,
                amount,
                &self.return_url,
            )
            .await?;

        // 同じ注文へのPendingのゲートウェイ支払いがあればトークンを更新し、
        // なければ新しい支払い試行を作成する
        let mut payment = match self
            .payment_repository
            .find_pending_gateway_payment(order_id)
            .await?
        {
            Some(payment) => payment,
            None => Payment::new_gateway(
                self.payment_repository.next_identity(),
                order_id,
                order.total(),
            ),
        };
        payment.set_gateway_token(transaction.token.clone())?;
        self.payment_repository.save(&payment).await?;

        let mut context = HashMap::new();
        context.insert("order_id".to_string(), order.id().to_string());
        context.insert("token".to_string(), transaction.token.clone());
        self.logger.info(
            "PaymentApplicationService",
            "Gateway payment initiated",
            None,
            Some(context),
        );
        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "GATEWAY_PAYMENT_INITIATED",
                format!("注文 {} のゲートウェイ決済を開始しました", order.id()),
                Some(RelatedEntity::Payment(payment.id())),
            ))
            .await;

        Ok(GatewayRedirect {
            token: transaction.token,
            redirect_url: transaction.redirect_url,
            order_id,
        })
    }

    /// ゲートウェイからの戻りを処理し、トークンでトランザクションを確定する
    ///
    /// 承認された場合はこの時点で初めて在庫を引き当てる
    /// （ゲートウェイ決済では注文作成時に在庫は引き当てられていない）。
    /// 支払い完了後に在庫を補充できないことが判明した場合、注文は
    /// RejectedStockへ強制され、不整合はメモとして明示的に記録される。
    /// 支払いがCompletedのまま放置されることはない。
    pub async fn commit_gateway_return(
        &self,
        token: &str,
    ) -> Result<GatewayReturnOutcome, ApplicationError> {
        let mut payment = self
            .payment_repository
            .find_by_token(token)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!(
                    "トークンに対応する支払いが見つかりません: {}",
                    token
                ))
            })?;
        if payment.status() != crate::domain::model::PaymentStatus::Pending {
            return Err(ApplicationError::Validation(
                "この支払いは既に処理されています".to_string(),
            ));
        }

        let commit = self.gateway.commit(token).await?;
        let mut order = self.find_order(payment.order_id()).await?;

        if commit.is_approved() {
            payment.complete(
                commit.authorization_code.clone(),
                installment_plan_from(&commit),
            )?;
            self.payment_repository.save(&payment).await?;
            self.activity_log
                .record(ActivityEntry::new(
                    None,
                    "GATEWAY_PAYMENT_COMPLETED",
                    format!(
                        "注文 {} のゲートウェイ決済が承認されました（承認コード: {}）",
                        order.id(),
                        commit.authorization_code.as_deref().unwrap_or("-")
                    ),
                    Some(RelatedEntity::Payment(payment.id())),
                ))
                .await;

            let outcome = self.react_to_payment(&payment, &mut order, None).await?;
            self.order_repository.save(&order).await?;

            Ok(match outcome {
                ReactionOutcome::Done => GatewayReturnOutcome::Approved(order.id()),
                ReactionOutcome::AwaitingReplenishment => {
                    GatewayReturnOutcome::AwaitingReplenishment(order.id())
                }
                ReactionOutcome::RejectedForStock => {
                    GatewayReturnOutcome::RejectedForStock(order.id())
                }
            })
        } else {
            payment.fail()?;
            self.payment_repository.save(&payment).await?;

            let mut context = HashMap::new();
            context.insert("order_id".to_string(), order.id().to_string());
            context.insert(
                "response_code".to_string(),
                commit.response_code.to_string(),
            );
            self.logger.warn(
                "PaymentApplicationService",
                "Gateway payment declined",
                None,
                Some(context),
            );
            self.activity_log
                .record(ActivityEntry::new(
                    None,
                    "GATEWAY_PAYMENT_FAILED",
                    format!(
                        "注文 {} のゲートウェイ決済が拒否されました（応答コード: {}）",
                        order.id(),
                        commit.response_code
                    ),
                    Some(RelatedEntity::Payment(payment.id())),
                ))
                .await;

            self.react_to_payment(&payment, &mut order, None).await?;
            self.order_repository.save(&order).await?;

            Ok(GatewayReturnOutcome::Declined(order.id()))
        }
    }

    /// ゲートウェイ側でのキャンセル・タイムアウト（確定前の離脱）を処理する
    /// 注文がまだPendingならキャンセルする。在庫への影響はない。
    pub async fn handle_gateway_abort(
        &self,
        order_id: OrderId,
    ) -> Result<Order, ApplicationError> {
        let mut order = self.find_order(order_id).await?;

        // 未確定のゲートウェイ支払いが残っていれば失敗として閉じる
        if let Some(mut payment) = self
            .payment_repository
            .find_pending_gateway_payment(order_id)
            .await?
        {
            payment.fail()?;
            self.payment_repository.save(&payment).await?;
        }

        if reconciler::on_gateway_abort(order.status()) == OrderDirective::MarkCancelled {
            order.cancel()?;
            self.order_repository.save(&order).await?;
            self.activity_log
                .record(ActivityEntry::new(
                    None,
                    "GATEWAY_PAYMENT_ABORTED",
                    format!(
                        "注文 {} のゲートウェイ決済が確定前に中断されたためキャンセルしました",
                        order.id()
                    ),
                    Some(RelatedEntity::Order(order.id())),
                ))
                .await;
        }

        Ok(order)
    }

    /// 手動の支払い（現金・銀行振込）を登録する
    /// 現金は即時完了、銀行振込はスタッフの確認待ちとなる
    pub async fn register_manual_payment(
        &self,
        order_id: OrderId,
        method: PaymentMethod,
        actor: Option<ActorId>,
    ) -> Result<Payment, ApplicationError> {
        let mut order = self.find_order(order_id).await?;

        let payment = match method {
            PaymentMethod::Cash => Payment::new_cash(
                self.payment_repository.next_identity(),
                order_id,
                order.total(),
            ),
            PaymentMethod::BankTransfer => Payment::new_bank_transfer(
                self.payment_repository.next_identity(),
                order_id,
                order.total(),
            ),
            PaymentMethod::Gateway => {
                return Err(ApplicationError::Validation(
                    "ゲートウェイ決済はリダイレクトフローで開始してください".to_string(),
                ));
            }
        };
        self.payment_repository.save(&payment).await?;

        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "PAYMENT_REGISTERED",
                format!(
                    "注文 {} の支払い {} を登録しました（方法: {}、状態: {}）",
                    order.id(),
                    payment.id(),
                    payment.method(),
                    payment.status()
                ),
                Some(RelatedEntity::Payment(payment.id())),
            ))
            .await;

        self.react_to_payment(&payment, &mut order, actor).await?;
        self.order_repository.save(&order).await?;

        Ok(payment)
    }

    /// 銀行振込の入金をスタッフが確認または却下する
    pub async fn review_bank_transfer(
        &self,
        payment_id: PaymentId,
        approve: bool,
        actor: Option<ActorId>,
    ) -> Result<Payment, ApplicationError> {
        let mut payment = self.find_payment(payment_id).await?;

        if payment.method() != PaymentMethod::BankTransfer {
            return Err(ApplicationError::Validation(
                "銀行振込以外の支払いは確認できません".to_string(),
            ));
        }

        if approve {
            payment.complete(None, None)?;
        } else {
            payment.fail()?;
        }
        self.payment_repository.save(&payment).await?;

        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "BANK_TRANSFER_REVIEWED",
                format!(
                    "支払い {} の銀行振込を{}しました",
                    payment.id(),
                    if approve { "確認" } else { "却下" }
                ),
                Some(RelatedEntity::Payment(payment.id())),
            ))
            .await;

        let mut order = self.find_order(payment.order_id()).await?;
        self.react_to_payment(&payment, &mut order, actor).await?;
        self.order_repository.save(&order).await?;

        Ok(payment)
    }

    /// 完了済みの支払いを返金する
    /// 引き当て済みの在庫は戻され、注文はキャンセルされる
    pub async fn refund_payment(
        &self,
        payment_id: PaymentId,
        actor: Option<ActorId>,
    ) -> Result<Payment, ApplicationError> {
        let mut payment = self.find_payment(payment_id).await?;
        payment.refund()?;
        self.payment_repository.save(&payment).await?;

        self.activity_log
            .record(ActivityEntry::new(
                actor,
                "PAYMENT_REFUNDED",
                format!("支払い {} を返金しました", payment.id()),
                Some(RelatedEntity::Payment(payment.id())),
            ))
            .await;

        let mut order = self.find_order(payment.order_id()).await?;
        self.react_to_payment(&payment, &mut order, actor).await?;
        self.order_repository.save(&order).await?;

        Ok(payment)
    }

    /// 注文に紐づくすべての支払いを取得
    pub async fn get_payments_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, ApplicationError> {
        self.payment_repository
            .find_by_order(order_id)
            .await
            .map_err(ApplicationError::from)
    }

    /// 支払いの状態変化に対するリコンサイラーの判定を実行する
    /// 呼び出し側は実行後に注文を保存する責務を持つ
    async fn react_to_payment(
        &self,
        payment: &Payment,
        order: &mut Order,
        actor: Option<ActorId>,
    ) -> Result<ReactionOutcome, ApplicationError> {
        let prior = order.status();
        let reaction = reconciler::on_payment_saved(
            payment.method(),
            payment.status(),
            prior,
            order.stock_applied(),
        );

        if reaction.stock == StockDirective::ApplyForward {
            // ゲートウェイ決済の承認: 注文を先にPaidへ進めてから在庫を引き当てる
            if reaction.order == OrderDirective::MarkPaid {
                order.mark_paid()?;
            }
            return match self
                .stock_service
                .apply_order_stock_effect(order, false, actor)
                .await
            {
                Ok(StockApplication::Satisfied) => Ok(ReactionOutcome::Done),
                Ok(StockApplication::Partial) => {
                    order.mark_pending_replenishment()?;
                    Ok(ReactionOutcome::AwaitingReplenishment)
                }
                Err(DomainError::InsufficientStock(msg)) => {
                    // 支払いは完了しているが履行できない。不整合を明示的に記録し、
                    // 自動での再試行は行わない。
                    order.add_note(format!("支払い完了後の在庫引き当てに失敗: {}", msg));
                    order.mark_rejected_stock()?;
                    self.logger.error(
                        "PaymentApplicationService",
                        "Post-payment stock application failed",
                        None,
                        Some(HashMap::from([
                            ("order_id".to_string(), order.id().to_string()),
                            ("reason".to_string(), msg.clone()),
                        ])),
                    );
                    self.activity_log
                        .record(ActivityEntry::new(
                            actor,
                            "POST_PAYMENT_STOCK_ERROR",
                            format!(
                                "注文 {} は支払い完了後に在庫を引き当てられませんでした: {}",
                                order.id(),
                                msg
                            ),
                            Some(RelatedEntity::Order(order.id())),
                        ))
                        .await;
                    Ok(ReactionOutcome::RejectedForStock)
                }
                Err(err) => Err(err.into()),
            };
        }

        if reaction.stock == StockDirective::Reverse {
            self.stock_service
                .apply_order_stock_effect(order, true, actor)
                .await?;
        }

        match reaction.order {
            OrderDirective::None => {}
            OrderDirective::MarkPaid => order.mark_paid()?,
            OrderDirective::MarkFailed => {
                order.mark_failed()?;
                if prior == OrderStatus::PendingReplenishment {
                    self.cancel_pending_transfers(order, actor).await?;
                }
            }
            OrderDirective::MarkCancelled => {
                order.cancel()?;
                if prior == OrderStatus::PendingReplenishment {
                    self.cancel_pending_transfers(order, actor).await?;
                }
            }
        }

        Ok(ReactionOutcome::Done)
    }

    async fn find_order(&self, order_id: OrderId) -> Result<Order, ApplicationError> {
        self.order_repository
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("注文が見つかりません: {}", order_id))
            })
    }

    async fn find_payment(&self, payment_id: PaymentId) -> Result<Payment, ApplicationError> {
        self.payment_repository
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("支払いが見つかりません: {}", payment_id))
            })
    }

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

/// ゲートウェイの確定応答から分割払いメタデータを構築する
fn installment_plan_from(commit: &GatewayCommit) -> Option<InstallmentPlan> {
    let count = commit.installments_number.unwrap_or(0);
    match commit.payment_type_code.as_deref() {
        // 無利子分割払い
        Some("SI") | Some("S2") | Some("SC") => Some(InstallmentPlan {
            kind: InstallmentKind::InterestFree,
            count,
        }),
        _ => {
            if count > 0 {
                Some(InstallmentPlan {
                    kind: InstallmentKind::Regular,
                    count,
                })
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_with(payment_type_code: Option<&str>, installments: Option<u32>) -> GatewayCommit {
        GatewayCommit {
            status: "AUTHORIZED".to_string(),
            response_code: 0,
            authorization_code: Some("1213".to_string()),
            amount: 1000,
            buy_order: "order".to_string(),
            installments_number: installments,
            payment_type_code: payment_type_code.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_installment_plan_interest_free() {
        let plan = installment_plan_from(&commit_with(Some("SI"), Some(3))).unwrap();
        assert_eq!(plan.kind, InstallmentKind::InterestFree);
        assert_eq!(plan.count, 3);
    }

    #[test]
    fn test_installment_plan_regular() {
        let plan = installment_plan_from(&commit_with(Some("VC"), Some(6))).unwrap();
        assert_eq!(plan.kind, InstallmentKind::Regular);
        assert_eq!(plan.count, 6);
    }

    #[test]
    fn test_installment_plan_none_for_single_payment() {
        assert!(installment_plan_from(&commit_with(Some("VD"), Some(0))).is_none());
        assert!(installment_plan_from(&commit_with(None, None)).is_none());
    }
}
