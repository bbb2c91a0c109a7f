//! [`Earnings`] definition.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{database, Database},
    read,
    Query, Service,
};

/// [`Query`] to calculate net earnings of a host.
///
/// Net earnings are the sum of settled [`Payment`] amounts minus their
/// refunded parts, grouped by currency, across all the host's [`Unit`]s.
///
/// [`Payment`]: crate::domain::Payment
/// [`Unit`]: crate::domain::Unit
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Earnings {
    /// ID of the host [`User`].
    pub host_id: user::Id,
}

impl<Db> Query<Earnings> for Service<Db>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::Earnings, user::Id>>,
            Ok = read::Earnings,
            Err = Traced<database::Error>,
        >,
{
    type Ok = read::Earnings;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Earnings { host_id }: Earnings,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        self.database()
            .execute(Select(By::<Option<User>, _>::new(host_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(host_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        self.database()
            .execute(Select(By::<read::Earnings, _>::new(host_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`Earnings`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::Date;

    use crate::{
        command::{
            fixtures, ConfirmReservation, CreateReservation, RecordPayment,
            RefundPayment,
        },
        domain::{
            inventory::{Span, UnitId},
            payment::Method,
            user::{self, Role},
        },
        Command as _, Query as _,
    };

    use super::{Earnings, ExecutionError};

    fn nights(from: &str, to: &str) -> Span {
        let date = |s: &str| s.parse::<Date>().unwrap();
        Span::nights(date(from), date(to)).unwrap()
    }

    #[tokio::test]
    async fn sums_settled_payments_net_of_refunds() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        // Two stays: $300 settled untouched, $200 settled then $50 refunded.
        for (span, refund) in [
            (nights("2025-10-01", "2025-10-04"), None),
            (nights("2025-10-10", "2025-10-12"), Some("50")),
        ] {
            let reservation = service
                .execute(CreateReservation {
                    actor: guest,
                    unit_id: UnitId::Listing(listing.id),
                    span,
                    party_size: 2,
                })
                .await
                .unwrap();
            _ = service
                .execute(ConfirmReservation {
                    actor: host,
                    reservation_id: reservation.id,
                })
                .await
                .unwrap();
            let payment = service
                .execute(RecordPayment {
                    actor: guest,
                    reservation_id: reservation.id,
                    amount: reservation.total_price,
                    method: Method::Card,
                })
                .await
                .unwrap();
            if let Some(amount) = refund {
                _ = service
                    .execute(RefundPayment {
                        actor: host,
                        payment_id: payment.id,
                        amount: fixtures::usd(amount),
                    })
                    .await
                    .unwrap();
            }
        }

        let earnings = service
            .execute(Earnings { host_id: host.id })
            .await
            .unwrap();

        assert_eq!(earnings.totals, vec![fixtures::usd("450")]);
        assert_eq!(earnings.payments_count, 2);
    }

    #[tokio::test]
    async fn reports_a_missing_host() {
        let (service, _db) = fixtures::service().await;

        let err = service
            .execute(Earnings {
                host_id: user::Id::new(),
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::UserNotExists(_)));
    }
}
