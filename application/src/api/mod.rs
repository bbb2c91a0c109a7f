//! REST API definitions.

pub mod availability;
pub mod host;
pub mod payment;
pub mod reservation;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::money::Currency;

/// Monetary amount with its [`Currency`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Money {
    /// Amount of the [`Currency`].
    pub amount: Decimal,

    /// [`Currency`] of the amount.
    pub currency: Currency,
}

impl From<common::Money> for Money {
    fn from(money: common::Money) -> Self {
        Self {
            amount: money.amount,
            currency: money.currency,
        }
    }
}

impl From<Money> for common::Money {
    fn from(money: Money) -> Self {
        Self {
            amount: money.amount,
            currency: money.currency,
        }
    }
}
