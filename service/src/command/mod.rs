//! [`Command`] definition.

pub mod cancel_reservation;
pub mod complete_reservation;
pub mod confirm_reservation;
pub mod create_reservation;
pub mod record_payment;
pub mod refund_payment;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    cancel_reservation::CancelReservation,
    complete_reservation::CompleteReservation,
    confirm_reservation::ConfirmReservation,
    create_reservation::CreateReservation, record_payment::RecordPayment,
    refund_payment::RefundPayment,
};

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared fixtures of [`Command`] tests.

    use std::time::Duration;

    use common::{operations::Insert, DateTime, Money};

    use crate::{
        domain::{
            experience::{self, Experience, GroupTiers},
            listing::{self, Listing},
            pricing::StayDiscounts,
            user::{self, Actor, Role},
            Unit, User,
        },
        infra::{database::InMemory, Database as _},
        task, Config, Service,
    };

    pub(crate) fn usd(amount: &str) -> Money {
        Money {
            amount: amount.parse().unwrap(),
            currency: common::money::Currency::Usd,
        }
    }

    pub(crate) async fn service() -> (Service<InMemory>, InMemory) {
        let db = InMemory::new();
        let (service, _bg) = Service::new(
            Config {
                complete_elapsed_reservations:
                    task::complete_elapsed_reservations::Config {
                        interval: Duration::from_secs(60),
                    },
            },
            db.clone(),
        );
        (service, db)
    }

    pub(crate) async fn user(db: &InMemory, role: Role) -> Actor {
        let user = User {
            id: user::Id::new(),
            name: "John Doe".parse().unwrap(),
            role,
            created_at: DateTime::now().coerce(),
        };
        let actor = Actor {
            id: user.id,
            role,
        };
        db.execute(Insert(user)).await.unwrap();
        actor
    }

    pub(crate) async fn listing(db: &InMemory, host_id: user::Id) -> Listing {
        let listing = Listing {
            id: listing::Id::new(),
            host_id,
            title: "Cabin by the lake".parse().unwrap(),
            nightly_rate: usd("100"),
            discounts: StayDiscounts::default(),
            max_guests: 4,
            created_at: DateTime::now().coerce(),
        };
        db.execute(Insert(Unit::Listing(listing.clone()))).await.unwrap();
        listing
    }

    pub(crate) async fn experience(
        db: &InMemory,
        host_id: user::Id,
        seats: u16,
    ) -> Experience {
        let experience = Experience {
            id: experience::Id::new(),
            host_id,
            title: "Pottery class".parse().unwrap(),
            price_per_person: usd("50"),
            duration: Duration::from_secs(2 * 60 * 60),
            seats,
            tiers: GroupTiers::new(vec![]).unwrap(),
            created_at: DateTime::now().coerce(),
        };
        db.execute(Insert(Unit::Experience(experience.clone())))
            .await
            .unwrap();
        experience
    }
}
