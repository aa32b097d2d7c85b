//! Outcomes of ledger operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of an allocate, free, or transfer.
///
/// Every variant except [`AllocationStatus::Success`] means the ledger was
/// left exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// The operation went through.
    Success,
    /// A `before*` event trigger vetoed the operation.
    Abort,
    /// Allocations must be strictly positive.
    ZeroOrNegativeAmount,
    /// The resource only allows whole-number allocations.
    AllocateIntRequired,
    /// The allocation would exceed the resource's total supply.
    TotalAmountExceeded,
    /// The allocation would exceed the holder's individual cap.
    MaxPerDepositorExceeded,
    /// Frees cannot be negative.
    FreeNegativeValue,
    /// The resource only allows whole-number frees.
    FreeIntRequired,
    /// The holder does not hold that much.
    FreeExceedsAllocation,
}

impl AllocationStatus {
    /// Whether the operation went through.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::Abort => "aborted by event trigger",
            Self::ZeroOrNegativeAmount => "amount must be greater than zero",
            Self::AllocateIntRequired => "amount must be a whole number",
            Self::TotalAmountExceeded => "not enough of the resource is available",
            Self::MaxPerDepositorExceeded => "holder cannot hold that much",
            Self::FreeNegativeValue => "amount to free cannot be negative",
            Self::FreeIntRequired => "amount to free must be a whole number",
            Self::FreeExceedsAllocation => "holder does not have that much",
        };
        f.write_str(text)
    }
}
