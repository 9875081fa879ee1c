// 支払い⇄注文のリコンサイラー
// 支払いの状態変化が注文の状態と在庫に与える影響を決定する規則集。
// 元の仕組みにあった暗黙のシグナル配送ではなく、支払いを保存した
// アプリケーションサービスが同一処理内で同期的に実行する明示的な
// フックとして実装している。判定は純粋関数で、実行は呼び出し側が行う。

use crate::domain::model::{OrderStatus, PaymentMethod, PaymentStatus};

/// 在庫への指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirective {
    /// 在庫には触れない
    None,
    /// 順方向の在庫引き当てを実行する
    ApplyForward,
    /// 在庫を戻す
    Reverse,
}

/// 注文への指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirective {
    /// 注文状態は変更しない
    None,
    /// 支払い済みへ進める
    MarkPaid,
    /// 失敗にする
    MarkFailed,
    /// キャンセルにする
    MarkCancelled,
}

/// リコンサイラーの判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaction {
    pub stock: StockDirective,
    pub order: OrderDirective,
}

impl Reaction {
    fn none() -> Self {
        Self {
            stock: StockDirective::None,
            order: OrderDirective::None,
        }
    }
}

/// 支払いが保存されるたびに呼ばれ、注文と在庫への指示を返す
///
/// 規則:
/// - 完了 + ゲートウェイ: 在庫はこの方法では注文作成時に引き当てられて
///   いないため、ここで順方向を実行する。注文はPaidへ（部分充足の場合の
///   PendingReplenishmentへの上書きは実行側が行う）。
/// - 完了 + 手動（現金・銀行振込）: 在庫は作成時に引き当て済み。
///   注文がPendingならPaidへ進める。PendingReplenishmentはそのまま
///   （支払いは確認されたが在庫を待っている）。
/// - 失敗 + 手動: 在庫が引き当て済み（Pending / PendingReplenishment）
///   なら戻す。注文はFailedへ。
/// - 失敗 + ゲートウェイ: 在庫は引き当てられていないため戻さない。
///   注文はFailedへ。
/// - 返金: 在庫が引き当て済みなら戻す。注文はCancelledへ。
pub fn on_payment_saved(
    method: PaymentMethod,
    payment_status: PaymentStatus,
    order_status: OrderStatus,
    stock_applied: bool,
) -> Reaction {
    match payment_status {
        PaymentStatus::Pending => Reaction::none(),

        PaymentStatus::Completed => {
            if method.is_gateway() {
                Reaction {
                    stock: StockDirective::ApplyForward,
                    order: OrderDirective::MarkPaid,
                }
            } else {
                let order = if order_status == OrderStatus::Pending {
                    OrderDirective::MarkPaid
                } else {
                    OrderDirective::None
                };
                Reaction {
                    stock: StockDirective::None,
                    order,
                }
            }
        }

        PaymentStatus::Failed => {
            let stock = if !method.is_gateway()
                && stock_applied
                && matches!(
                    order_status,
                    OrderStatus::Pending | OrderStatus::PendingReplenishment
                ) {
                StockDirective::Reverse
            } else {
                StockDirective::None
            };
            let order = if order_status.is_terminal() || order_status == OrderStatus::Failed {
                OrderDirective::None
            } else {
                OrderDirective::MarkFailed
            };
            Reaction { stock, order }
        }

        PaymentStatus::Refunded => {
            let stock = if stock_applied {
                StockDirective::Reverse
            } else {
                StockDirective::None
            };
            let order = if order_status.is_terminal() {
                OrderDirective::None
            } else {
                OrderDirective::MarkCancelled
            };
            Reaction { stock, order }
        }
    }
}

/// ゲートウェイ側でのキャンセル・タイムアウト（確定前の離脱）
/// 在庫は引き当てられていないため在庫への影響はない
pub fn on_gateway_abort(order_status: OrderStatus) -> OrderDirective {
    if order_status == OrderStatus::Pending {
        OrderDirective::MarkCancelled
    } else {
        OrderDirective::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_gateway_applies_stock_and_marks_paid() {
        let reaction = on_payment_saved(
            PaymentMethod::Gateway,
            PaymentStatus::Completed,
            OrderStatus::Pending,
            false,
        );
        assert_eq!(reaction.stock, StockDirective::ApplyForward);
        assert_eq!(reaction.order, OrderDirective::MarkPaid);
    }

    #[test]
    fn test_completed_manual_marks_paid_from_pending() {
        let reaction = on_payment_saved(
            PaymentMethod::Cash,
            PaymentStatus::Completed,
            OrderStatus::Pending,
            true,
        );
        assert_eq!(reaction.stock, StockDirective::None);
        assert_eq!(reaction.order, OrderDirective::MarkPaid);
    }

    #[test]
    fn test_completed_manual_keeps_pending_replenishment() {
        // 支払いは確認されたが在庫はまだ補充待ち
        let reaction = on_payment_saved(
            PaymentMethod::BankTransfer,
            PaymentStatus::Completed,
            OrderStatus::PendingReplenishment,
            true,
        );
        assert_eq!(reaction.stock, StockDirective::None);
        assert_eq!(reaction.order, OrderDirective::None);
    }

    #[test]
    fn test_failed_manual_reverses_prededucted_stock() {
        let reaction = on_payment_saved(
            PaymentMethod::BankTransfer,
            PaymentStatus::Failed,
            OrderStatus::Pending,
            true,
        );
        assert_eq!(reaction.stock, StockDirective::Reverse);
        assert_eq!(reaction.order, OrderDirective::MarkFailed);
    }

    #[test]
    fn test_failed_manual_without_applied_stock_does_not_reverse() {
        let reaction = on_payment_saved(
            PaymentMethod::BankTransfer,
            PaymentStatus::Failed,
            OrderStatus::Pending,
            false,
        );
        assert_eq!(reaction.stock, StockDirective::None);
        assert_eq!(reaction.order, OrderDirective::MarkFailed);
    }

    #[test]
    fn test_failed_gateway_never_touches_stock() {
        let reaction = on_payment_saved(
            PaymentMethod::Gateway,
            PaymentStatus::Failed,
            OrderStatus::Pending,
            false,
        );
        assert_eq!(reaction.stock, StockDirective::None);
        assert_eq!(reaction.order, OrderDirective::MarkFailed);
    }

    #[test]
    fn test_refund_reverses_applied_stock_and_cancels() {
        let reaction = on_payment_saved(
            PaymentMethod::Cash,
            PaymentStatus::Refunded,
            OrderStatus::Paid,
            true,
        );
        assert_eq!(reaction.stock, StockDirective::Reverse);
        assert_eq!(reaction.order, OrderDirective::MarkCancelled);
    }

    #[test]
    fn test_refund_of_delivered_order_only_reverses_stock() {
        // 終端状態の注文は遷移させないが、在庫の戻しは行う
        let reaction = on_payment_saved(
            PaymentMethod::Gateway,
            PaymentStatus::Refunded,
            OrderStatus::Delivered,
            true,
        );
        assert_eq!(reaction.stock, StockDirective::Reverse);
        assert_eq!(reaction.order, OrderDirective::None);
    }

    #[test]
    fn test_pending_payment_is_a_noop() {
        let reaction = on_payment_saved(
            PaymentMethod::BankTransfer,
            PaymentStatus::Pending,
            OrderStatus::Pending,
            true,
        );
        assert_eq!(reaction.stock, StockDirective::None);
        assert_eq!(reaction.order, OrderDirective::None);
    }

    #[test]
    fn test_gateway_abort_cancels_pending_order_only() {
        assert_eq!(
            on_gateway_abort(OrderStatus::Pending),
            OrderDirective::MarkCancelled
        );
        assert_eq!(on_gateway_abort(OrderStatus::Paid), OrderDirective::None);
        assert_eq!(
            on_gateway_abort(OrderStatus::Cancelled),
            OrderDirective::None
        );
    }
}
