use crate::domain::error::DomainError;
use crate::domain::model::{BranchId, ProductId, WarehouseId};
use serde::{Deserialize, Serialize};

use std::fmt;

// 店舗・倉庫ディレクトリとカタログの参照モデル
// 本コアはこれらを参照するのみで、変更は行わない

/// 倉庫の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseKind {
    /// 売場（注文の引き当てで優先される）
    SalesFloor,
    /// バックヤード
    Backroom,
}

impl WarehouseKind {
    /// 文字列からWarehouseKindを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "SalesFloor" => Ok(WarehouseKind::SalesFloor),
            "Backroom" => Ok(WarehouseKind::Backroom),
            _ => Err(DomainError::InvalidValue(format!("無効な倉庫種別: {}", s))),
        }
    }
}

impl fmt::Display for WarehouseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_str = match self {
            WarehouseKind::SalesFloor => "SalesFloor",
            WarehouseKind::Backroom => "Backroom",
        };
        write!(f, "{}", kind_str)
    }
}

/// 店舗（物理的な販売拠点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub active: bool,
}

/// 倉庫（店舗内の在庫保管場所）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub branch_id: BranchId,
    pub kind: WarehouseKind,
    pub active: bool,
}

/// 商品（カタログの参照モデル）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
}
