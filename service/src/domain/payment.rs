//! [`Payment`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{
    define_kind,
    money::{self, Money},
    unit, DateTimeOf,
};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reservation;
#[cfg(doc)]
use crate::domain::Reservation;

/// Settlement of a [`Reservation`]'s quoted price.
///
/// At most one [`Payment`] exists per [`Reservation`].
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`Reservation`] this [`Payment`] settles.
    pub reservation_id: reservation::Id,

    /// Settled amount.
    pub amount: Money,

    /// Current [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`Method`] this [`Payment`] was made with.
    pub method: Method,

    /// Total amount refunded so far, if any.
    ///
    /// Never exceeds the [`Payment::amount`].
    pub refunded_amount: Option<Money>,

    /// [`DateTime`] when this [`Payment`] was settled.
    pub paid_at: SettlementDateTime,

    /// [`DateTime`] of the latest refund, if any.
    pub refunded_at: Option<RefundDateTime>,
}

impl Payment {
    /// Refunds the provided `amount` of this [`Payment`].
    ///
    /// Repeated refunds accumulate. Returns whether this [`Payment`] is now
    /// refunded in full, moving it to [`Status::Refunded`] (or
    /// [`Status::PartiallyRefunded`] otherwise).
    ///
    /// # Errors
    ///
    /// - [`RefundError::NotSettled`] if this [`Payment`] hasn't been settled
    ///   or is already refunded in full.
    /// - [`RefundError::ExceedsPayment`] if the accumulated refund would pass
    ///   the settled [`Payment::amount`].
    /// - [`RefundError::CurrencyMismatch`] if the `amount` is expressed in
    ///   another currency.
    pub fn refund(
        &mut self,
        amount: Money,
        at: RefundDateTime,
    ) -> Result<bool, RefundError> {
        use Status as S;

        if !matches!(self.status, S::Completed | S::PartiallyRefunded) {
            return Err(RefundError::NotSettled { status: self.status });
        }

        let refunded = self
            .refunded_amount
            .unwrap_or(Money::zero(self.amount.currency))
            .checked_add(amount)?;
        if refunded.amount > self.amount.amount {
            return Err(RefundError::ExceedsPayment {
                refunded,
                amount: self.amount,
            });
        }

        let full = refunded.amount == self.amount.amount;
        self.refunded_amount = Some(refunded);
        self.refunded_at = Some(at);
        self.status = if full { S::Refunded } else { S::PartiallyRefunded };
        Ok(full)
    }

    /// Returns the amount of this [`Payment`] remaining with the host after
    /// refunds.
    #[must_use]
    pub fn net_amount(&self) -> Money {
        let refunded = self
            .refunded_amount
            .map_or_else(rust_decimal::Decimal::default, |m| m.amount);
        Money {
            amount: self.amount.amount - refunded,
            currency: self.amount.currency,
        }
    }
}

/// ID of a [`Payment`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Initiated, not yet handed to the processor."]
        Pending = 1,

        #[doc = "In flight at the processor."]
        Processing = 2,

        #[doc = "Settled successfully."]
        Completed = 3,

        #[doc = "Rejected by the processor."]
        Failed = 4,

        #[doc = "Refunded in full."]
        Refunded = 5,

        #[doc = "Refunded partially."]
        PartiallyRefunded = 6,

        #[doc = "Disputed by the payer."]
        Disputed = 7,
    }
}

define_kind! {
    #[doc = "Method a [`Payment`] is made with."]
    enum Method {
        #[doc = "Debit or credit card."]
        Card = 1,

        #[doc = "Direct bank transfer."]
        BankTransfer = 2,

        #[doc = "Platform wallet balance."]
        Wallet = 3,
    }
}

/// Error of refunding a [`Payment`].
#[derive(Clone, Copy, Debug, Display, Error, From)]
pub enum RefundError {
    /// Accumulated refund would exceed the settled [`Payment::amount`].
    #[display("cannot refund {refunded} out of {amount} payment")]
    #[from(ignore)]
    ExceedsPayment {
        /// Total amount that would be refunded.
        refunded: Money,

        /// Settled [`Payment::amount`].
        amount: Money,
    },

    /// [`Payment`] is not in a refundable [`Status`].
    #[display("cannot refund `{status}` payment")]
    #[from(ignore)]
    NotSettled {
        /// Current [`Status`] of the [`Payment`].
        status: Status,
    },

    /// Refund amount is expressed in another currency.
    #[display("{_0}")]
    CurrencyMismatch(money::CurrencyMismatch),
}

/// [`DateTime`] when a [`Payment`] was settled.
pub type SettlementDateTime = DateTimeOf<(Payment, unit::Settlement)>;

/// [`DateTime`] when a [`Payment`] was (partially) refunded.
pub type RefundDateTime = DateTimeOf<(Payment, unit::Refund)>;

#[cfg(test)]
mod spec {
    use common::{money::Currency, DateTime, Money};

    use crate::domain::reservation;

    use super::{Id, Method, Payment, RefundError, Status};

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.parse().unwrap(),
            currency: Currency::Usd,
        }
    }

    fn payment(amount: &str) -> Payment {
        Payment {
            id: Id::new(),
            reservation_id: reservation::Id::new(),
            amount: usd(amount),
            status: Status::Completed,
            method: Method::Card,
            refunded_amount: None,
            paid_at: DateTime::now().coerce(),
            refunded_at: None,
        }
    }

    #[test]
    fn full_refund_switches_to_refunded() {
        let mut p = payment("500");
        let full = p.refund(usd("500"), DateTime::now().coerce()).unwrap();
        assert!(full);
        assert_eq!(p.status, Status::Refunded);
        assert_eq!(p.refunded_amount, Some(usd("500")));
        assert!(p.refunded_at.is_some());
        assert!(p.net_amount().is_zero());
    }

    #[test]
    fn partial_refund_switches_to_partially_refunded() {
        let mut p = payment("500");
        let full = p.refund(usd("200"), DateTime::now().coerce()).unwrap();
        assert!(!full);
        assert_eq!(p.status, Status::PartiallyRefunded);
        assert_eq!(p.net_amount(), usd("300"));
    }

    #[test]
    fn partial_refunds_accumulate_to_full() {
        let mut p = payment("500");
        assert!(!p.refund(usd("200"), DateTime::now().coerce()).unwrap());
        let full = p.refund(usd("300"), DateTime::now().coerce()).unwrap();
        assert!(full);
        assert_eq!(p.status, Status::Refunded);
    }

    #[test]
    fn refund_over_amount_is_rejected() {
        let mut p = payment("500");
        let e = p.refund(usd("501"), DateTime::now().coerce()).unwrap_err();
        assert!(matches!(e, RefundError::ExceedsPayment { .. }));
        assert_eq!(p.status, Status::Completed);
        assert_eq!(p.refunded_amount, None);
    }

    #[test]
    fn accumulated_refund_over_amount_is_rejected() {
        let mut p = payment("500");
        assert!(!p.refund(usd("400"), DateTime::now().coerce()).unwrap());
        let e = p.refund(usd("200"), DateTime::now().coerce()).unwrap_err();
        assert!(matches!(e, RefundError::ExceedsPayment { .. }));
        assert_eq!(p.refunded_amount, Some(usd("400")));
    }

    #[test]
    fn unsettled_payment_is_not_refundable() {
        let mut p = payment("500");
        p.status = Status::Failed;
        let e = p.refund(usd("100"), DateTime::now().coerce()).unwrap_err();
        assert!(
            matches!(e, RefundError::NotSettled { status: Status::Failed }),
        );
    }

    #[test]
    fn currency_mismatch_is_rejected() {
        let mut p = payment("500");
        let eur = Money {
            amount: "100".parse().unwrap(),
            currency: Currency::Eur,
        };
        let e = p.refund(eur, DateTime::now().coerce()).unwrap_err();
        assert!(matches!(e, RefundError::CurrencyMismatch(_)));
    }
}
