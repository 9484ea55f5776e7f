//! Account summary rows streamed back for `request_account_summary`.
use strum_macros::{Display, EnumString};

use crate::{AccountCode, RequestId};

/// A subset of the broker's account summary tags; `Unknown` keeps the
/// mapping total instead of failing the whole row on an unrecognized tag.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
pub enum AccountValueKey {
    AccountType,
    NetLiquidation,
    TotalCashValue,
    BuyingPower,
    GrossPositionValue,
    AvailableFunds,
    ExcessLiquidity,
    #[strum(default)]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountValue {
    pub req_id: RequestId,
    pub account: AccountCode,
    pub key: AccountValueKey,
    pub value: String,
    pub currency: String,
}
