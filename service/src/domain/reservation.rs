//! [`Reservation`] definitions.

use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(doc)]
use common::DateTime;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::inventory::Unit;
use crate::domain::{
    experience::Seats,
    inventory::{Span, UnitId},
    user::{self, Role},
};

/// Booking of a [`Unit`] by a guest [`User`].
///
/// [`User`]: crate::domain::User
#[derive(Clone, Debug)]
pub struct Reservation {
    /// ID of this [`Reservation`].
    pub id: Id,

    /// ID of the guest [`User`] holding this [`Reservation`].
    ///
    /// [`User`]: crate::domain::User
    pub guest_id: user::Id,

    /// ID of the booked [`Unit`].
    pub unit_id: UnitId,

    /// Booked [`Span`] of the [`Unit`].
    pub span: Span,

    /// Number of guests this [`Reservation`] is made for.
    ///
    /// Consumed as [`Seats`] of every session slot for experiences, and
    /// ignored by listing inventory (a listing is booked whole).
    pub party_size: Seats,

    /// Current [`Status`] of this [`Reservation`].
    pub status: Status,

    /// Total price quoted at creation time.
    pub total_price: Money,

    /// [`DateTime`] when this [`Reservation`] was created.
    pub created_at: CreationDateTime,
}

impl Reservation {
    /// Confirms this [`Reservation`].
    ///
    /// # Errors
    ///
    /// If this [`Reservation`] is not [`Status::Pending`].
    pub fn confirm(&mut self) -> Result<(), IllegalTransition> {
        self.transition_to(Status::Confirmed, &[Status::Pending])
    }

    /// Cancels this [`Reservation`] on behalf of a [`User`] acting in the
    /// provided [`Role`].
    ///
    /// A guest cancellation and a host (or admin, acting for the host)
    /// cancellation are recorded as distinct terminal [`Status`]es.
    ///
    /// # Errors
    ///
    /// If this [`Reservation`] cannot be cancelled anymore.
    ///
    /// [`User`]: crate::domain::User
    pub fn cancel(&mut self, role: Role) -> Result<(), IllegalTransition> {
        use Status as S;

        let cancelled = match role {
            Role::Guest => S::CancelledByGuest,
            Role::Host | Role::Admin => S::CancelledByHost,
        };
        self.transition_to(cancelled, &[S::Pending, S::Confirmed, S::Paid])
    }

    /// Marks this [`Reservation`] as completed once its checkout has passed.
    ///
    /// # Errors
    ///
    /// If this [`Reservation`] is neither [`Status::Confirmed`] nor
    /// [`Status::Paid`].
    pub fn mark_completed(&mut self) -> Result<(), IllegalTransition> {
        use Status as S;

        self.transition_to(S::Completed, &[S::Confirmed, S::Paid])
    }

    /// Marks the guest of this [`Reservation`] as not shown up.
    ///
    /// # Errors
    ///
    /// If this [`Reservation`] has already reached a terminal [`Status`].
    pub fn mark_no_show(&mut self) -> Result<(), IllegalTransition> {
        use Status as S;

        self.transition_to(S::NoShow, &[S::Pending, S::Confirmed, S::Paid])
    }

    /// Reflects a completed [`Payment`] in this [`Reservation`].
    ///
    /// Calling this method on an already [`Status::Paid`] [`Reservation`] is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// If this [`Reservation`] cannot accept a [`Payment`] anymore.
    ///
    /// [`Payment`]: crate::domain::Payment
    pub fn payment_completed(&mut self) -> Result<(), IllegalTransition> {
        use Status as S;

        if self.status == S::Paid {
            return Ok(());
        }
        self.transition_to(S::Paid, &[S::Pending, S::Confirmed])
    }

    /// Reflects a refunded [`Payment`] in this [`Reservation`].
    ///
    /// Only a `full` refund moves this [`Reservation`] to
    /// [`Status::Refunded`]; a partial one leaves its [`Status`] untouched.
    /// A full refund of an already cancelled or no-show [`Reservation`] keeps
    /// the existing terminal [`Status`].
    ///
    /// # Errors
    ///
    /// If this [`Reservation`] is [`Status::Completed`], whose consumed
    /// inventory and status are kept as history.
    ///
    /// [`Payment`]: crate::domain::Payment
    pub fn payment_refunded(
        &mut self,
        full: bool,
    ) -> Result<(), IllegalTransition> {
        use Status as S;

        if !full {
            return Ok(());
        }
        match self.status {
            S::Pending | S::Confirmed | S::Paid => {
                self.status = S::Refunded;
                Ok(())
            }
            S::CancelledByGuest | S::CancelledByHost | S::NoShow
            | S::Refunded => Ok(()),
            S::Completed => Err(IllegalTransition {
                from: self.status,
                attempted: S::Refunded,
            }),
        }
    }

    fn transition_to(
        &mut self,
        to: Status,
        from: &[Status],
    ) -> Result<(), IllegalTransition> {
        if from.contains(&self.status) {
            self.status = to;
            Ok(())
        } else {
            Err(IllegalTransition { from: self.status, attempted: to })
        }
    }
}

/// ID of a [`Reservation`].
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
    #[doc = "Status of a [`Reservation`]."]
    enum Status {
        #[doc = "Created, awaiting confirmation."]
        Pending = 1,

        #[doc = "Confirmed by the host or the platform."]
        Confirmed = 2,

        #[doc = "Linked to a completed [`Payment`].\n\n\
                 [`Payment`]: crate::domain::Payment"]
        Paid = 3,

        #[doc = "Checkout passed without cancellation. Consumed slots stay \
                 consumed."]
        Completed = 4,

        #[doc = "Cancelled by the guest."]
        CancelledByGuest = 5,

        #[doc = "Cancelled by the host (or an admin)."]
        CancelledByHost = 6,

        #[doc = "Guest did not show up."]
        NoShow = 7,

        #[doc = "Fully refunded."]
        Refunded = 8,
    }
}

impl Status {
    /// Indicates whether this [`Status`] is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        use Status as S;

        matches!(
            self,
            S::Completed
                | S::CancelledByGuest
                | S::CancelledByHost
                | S::NoShow
                | S::Refunded,
        )
    }

    /// Indicates whether reaching this [`Status`] hands the held inventory
    /// back to the availability calendar.
    ///
    /// [`Status::Completed`] never does: its slots remain consumed as
    /// history.
    #[must_use]
    pub fn releases_inventory(self) -> bool {
        use Status as S;

        matches!(
            self,
            S::CancelledByGuest | S::CancelledByHost | S::NoShow,
        )
    }
}

/// Error of moving a [`Reservation`] into a [`Status`] its current one
/// doesn't permit.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("cannot move `{from}` reservation to `{attempted}`")]
pub struct IllegalTransition {
    /// Current [`Status`] of the [`Reservation`].
    pub from: Status,

    /// [`Status`] the [`Reservation`] was attempted to be moved into.
    pub attempted: Status,
}

/// [`DateTime`] when a [`Reservation`] was created.
pub type CreationDateTime = DateTimeOf<(Reservation, unit::Creation)>;

#[cfg(test)]
mod spec {
    use common::{money::Currency, DateTime, Money};
    use uuid::Uuid;

    use crate::domain::{
        inventory::Span,
        user::{self, Role},
    };

    use super::{Id, Reservation, Status};

    fn reservation(status: Status) -> Reservation {
        Reservation {
            id: Id::new(),
            guest_id: user::Id::from(Uuid::new_v4()),
            unit_id: crate::domain::inventory::UnitId::Listing(
                Uuid::new_v4().into(),
            ),
            span: Span::nights(
                "2025-01-10".parse().unwrap(),
                "2025-01-12".parse().unwrap(),
            )
            .unwrap(),
            party_size: 2,
            status,
            total_price: Money {
                amount: "200".parse().unwrap(),
                currency: Currency::Usd,
            },
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn confirms_pending_only() {
        let mut r = reservation(Status::Pending);
        r.confirm().unwrap();
        assert_eq!(r.status, Status::Confirmed);

        let mut r = reservation(Status::Paid);
        let e = r.confirm().unwrap_err();
        assert_eq!(e.from, Status::Paid);
        assert_eq!(e.attempted, Status::Confirmed);
    }

    #[test]
    fn cancellation_records_acting_role() {
        let mut r = reservation(Status::Confirmed);
        r.cancel(Role::Guest).unwrap();
        assert_eq!(r.status, Status::CancelledByGuest);

        let mut r = reservation(Status::Paid);
        r.cancel(Role::Host).unwrap();
        assert_eq!(r.status, Status::CancelledByHost);

        let mut r = reservation(Status::Pending);
        r.cancel(Role::Admin).unwrap();
        assert_eq!(r.status, Status::CancelledByHost);
    }

    #[test]
    fn cannot_cancel_completed() {
        let mut r = reservation(Status::Completed);
        let e = r.cancel(Role::Guest).unwrap_err();
        assert_eq!(e.from, Status::Completed);
        assert_eq!(r.status, Status::Completed);
    }

    #[test]
    fn completes_confirmed_and_paid_only() {
        let mut r = reservation(Status::Confirmed);
        r.mark_completed().unwrap();
        assert_eq!(r.status, Status::Completed);

        let mut r = reservation(Status::Paid);
        r.mark_completed().unwrap();
        assert_eq!(r.status, Status::Completed);

        let mut r = reservation(Status::Pending);
        assert!(r.mark_completed().is_err());
    }

    #[test]
    fn payment_completed_is_idempotent() {
        let mut r = reservation(Status::Pending);
        r.payment_completed().unwrap();
        assert_eq!(r.status, Status::Paid);
        r.payment_completed().unwrap();
        assert_eq!(r.status, Status::Paid);
    }

    #[test]
    fn payment_on_cancelled_is_illegal() {
        let mut r = reservation(Status::CancelledByGuest);
        assert!(r.payment_completed().is_err());
        assert_eq!(r.status, Status::CancelledByGuest);
    }

    #[test]
    fn full_refund_moves_to_refunded() {
        let mut r = reservation(Status::Paid);
        r.payment_refunded(true).unwrap();
        assert_eq!(r.status, Status::Refunded);
    }

    #[test]
    fn partial_refund_keeps_status() {
        let mut r = reservation(Status::Paid);
        r.payment_refunded(false).unwrap();
        assert_eq!(r.status, Status::Paid);
    }

    #[test]
    fn refund_keeps_existing_terminal_status() {
        let mut r = reservation(Status::CancelledByHost);
        r.payment_refunded(true).unwrap();
        assert_eq!(r.status, Status::CancelledByHost);
    }

    #[test]
    fn refund_of_completed_is_illegal() {
        let mut r = reservation(Status::Completed);
        assert!(r.payment_refunded(true).is_err());
        assert_eq!(r.status, Status::Completed);
    }

    #[test]
    fn no_show_from_non_terminal_only() {
        let mut r = reservation(Status::Confirmed);
        r.mark_no_show().unwrap();
        assert_eq!(r.status, Status::NoShow);

        let mut r = reservation(Status::Refunded);
        assert!(r.mark_no_show().is_err());
    }
}
