//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use derive_more::{Display, Error};
use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Creates a new zero [`Money`] amount in the provided [`Currency`].
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Indicates whether this [`Money`] amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Sums this [`Money`] amount with the provided one.
    ///
    /// # Errors
    ///
    /// If the [`Currency`]ies of the amounts differ.
    pub fn checked_add(self, rhs: Self) -> Result<Self, CurrencyMismatch> {
        self.same_currency(rhs)?;
        Ok(Self {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        })
    }

    /// Subtracts the provided [`Money`] amount from this one, clamping the
    /// result at zero.
    ///
    /// # Errors
    ///
    /// If the [`Currency`]ies of the amounts differ.
    pub fn saturating_sub(self, rhs: Self) -> Result<Self, CurrencyMismatch> {
        self.same_currency(rhs)?;
        Ok(Self {
            amount: (self.amount - rhs.amount).max(Decimal::ZERO),
            currency: self.currency,
        })
    }

    /// Multiplies this [`Money`] amount by the provided factor.
    #[must_use]
    pub fn times(self, factor: u32) -> Self {
        Self {
            amount: self.amount * Decimal::from(factor),
            currency: self.currency,
        }
    }

    /// Checks this [`Money`] amount to be in the same [`Currency`] as the
    /// provided one.
    ///
    /// # Errors
    ///
    /// If the [`Currency`]ies of the amounts differ.
    fn same_currency(self, rhs: Self) -> Result<(), CurrencyMismatch> {
        if self.currency == rhs.currency {
            Ok(())
        } else {
            Err(CurrencyMismatch {
                lhs: self.currency,
                rhs: rhs.currency,
            })
        }
    }
}

/// Error of combining [`Money`] amounts in different [`Currency`]ies.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("cannot combine `Money` in `{lhs}` with `Money` in `{rhs}`")]
pub struct CurrencyMismatch {
    /// [`Currency`] of the left-hand side amount.
    pub lhs: Currency,

    /// [`Currency`] of the right-hand side amount.
    pub rhs: Currency,
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "US Dollar."]
        Usd = 1,

        #[doc = "Euro."]
        Eur = 2,

        #[doc = "Russian Ruble."]
        Rub = 3,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn usd(s: &str) -> Money {
        Money {
            amount: decimal(s),
            currency: Currency::Usd,
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("123.45USD").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            },
        );

        assert_eq!(
            Money::from_str("123.45EUR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Us").is_err());
        assert!(Money::from_str("123.45Usdollar").is_err());

        assert!(Money::from_str("123.00USD").is_ok());
        assert!(Money::from_str("123.0USD").is_ok());
        assert!(Money::from_str("123USD").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(usd("123.45").to_string(), "123.45USD");
        assert_eq!(usd("123.00").to_string(), "123USD");
        assert_eq!(usd("123.0").to_string(), "123USD");
        assert_eq!(usd("123").to_string(), "123USD");
    }

    #[test]
    fn times_multiplies_amount() {
        assert_eq!(usd("100").times(7), usd("700"));
        assert_eq!(usd("19.99").times(2), usd("39.98"));
        assert_eq!(usd("5").times(0), usd("0"));
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        assert_eq!(usd("700").saturating_sub(usd("50")).unwrap(), usd("650"));
        assert_eq!(usd("10").saturating_sub(usd("25")).unwrap(), usd("0"));
    }

    #[test]
    fn arithmetic_rejects_currency_mismatch() {
        let eur = Money {
            amount: decimal("1"),
            currency: Currency::Eur,
        };

        assert!(usd("1").checked_add(eur).is_err());
        assert!(usd("1").saturating_sub(eur).is_err());
    }
}
