//! [`Query`] of a [`Unit`]'s availability calendar.

use common::{
    operations::{By, Select},
    Date,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{Calendar, OfUnitWithin},
        inventory::{self, Span, UnitId},
        AvailabilityRecord, Unit,
    },
    infra::{database, Database},
    Query, Service,
};

/// [`Query`] of a [`Unit`]'s [`AvailabilityRecord`]s within a date range.
///
/// For a listing, a default-available record is synthesized for every night
/// lacking a stored one. Experience sessions exist only where a host opened
/// them, so only stored records are returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Availability {
    /// ID of the [`Unit`].
    pub unit_id: UnitId,

    /// First [`Date`] of the range, inclusive.
    pub from: Date,

    /// Last [`Date`] of the range, exclusive.
    pub to: Date,
}

impl<Db> Query<Availability> for Service<Db>
where
    Db: Database<
            Select<By<Option<Unit>, UnitId>>,
            Ok = Option<Unit>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<AvailabilityRecord>, OfUnitWithin>>,
            Ok = Vec<AvailabilityRecord>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Vec<AvailabilityRecord>;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Availability { unit_id, from, to }: Availability,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let unit = self
            .database()
            .execute(Select(By::<Option<Unit>, _>::new(unit_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UnitNotExists(unit_id))
            .map_err(tracerr::wrap!())?;

        match &unit {
            Unit::Listing(_) => {
                let span = Span::nights(from, to)
                    .map_err(tracerr::from_and_wrap!(=> E))?;
                let existing = self
                    .database()
                    .execute(Select(By::<Vec<AvailabilityRecord>, _>::new(
                        OfUnitWithin::spanning(&unit, &span),
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                Ok(Calendar::new(&unit, &span, existing).into_records())
            }
            Unit::Experience(_) => {
                if from.days_until(to) <= 0 {
                    return Err(tracerr::new!(E::InvalidRange(
                        inventory::InvalidRange {
                            check_in: from,
                            check_out: to,
                        },
                    )));
                }
                self.database()
                    .execute(Select(By::<Vec<AvailabilityRecord>, _>::new(
                        OfUnitWithin {
                            unit_id,
                            from: from.midnight(),
                            until: to.midnight(),
                        },
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
            }
        }
    }
}

/// Error of [`Availability`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested date range is empty or inverted.
    #[display("invalid date range: {_0}")]
    #[from]
    InvalidRange(inventory::InvalidRange),

    /// [`Unit`] with the provided ID does not exist.
    #[display("unit `{_0:?}` does not exist")]
    UnitNotExists(#[error(not(source))] UnitId),
}

#[cfg(test)]
mod spec {
    use common::{operations::Insert, Date};

    use crate::{
        command::{fixtures, CreateReservation},
        domain::{
            availability::{AvailabilityRecord, Slot},
            inventory::{Span, UnitId},
            user::Role,
        },
        infra::Database as _,
        Command as _, Query as _,
    };

    use super::{Availability, ExecutionError};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn synthesizes_open_nights_for_a_listing() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        _ = service
            .execute(CreateReservation {
                actor: guest,
                unit_id: UnitId::Listing(listing.id),
                span: Span::nights(date("2025-09-02"), date("2025-09-03"))
                    .unwrap(),
                party_size: 1,
            })
            .await
            .unwrap();

        let records = service
            .execute(Availability {
                unit_id: UnitId::Listing(listing.id),
                from: date("2025-09-01"),
                to: date("2025-09-04"),
            })
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records[0].is_available, "untouched night stays open");
        assert!(!records[1].is_available, "booked night is taken");
        assert!(records[2].is_available);
    }

    #[tokio::test]
    async fn returns_only_scheduled_sessions_for_an_experience() {
        let (service, db) = fixtures::service().await;
        let host = fixtures::user(&db, Role::Host).await;
        let experience = fixtures::experience(&db, host.id, 8).await;

        db.execute(Insert(AvailabilityRecord {
            unit_id: UnitId::Experience(experience.id),
            slot: Slot::from(date("2025-09-02")),
            is_available: true,
            capacity_remaining: 8,
            price_override: Some(fixtures::usd("40")),
        }))
        .await
        .unwrap();

        let records = service
            .execute(Availability {
                unit_id: UnitId::Experience(experience.id),
                from: date("2025-09-01"),
                to: date("2025-09-08"),
            })
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].capacity_remaining, 8);
        assert_eq!(records[0].price_override, Some(fixtures::usd("40")));
    }

    #[tokio::test]
    async fn rejects_an_inverted_range() {
        let (service, db) = fixtures::service().await;
        let host = fixtures::user(&db, Role::Host).await;
        let experience = fixtures::experience(&db, host.id, 8).await;

        let err = service
            .execute(Availability {
                unit_id: UnitId::Experience(experience.id),
                from: date("2025-09-08"),
                to: date("2025-09-01"),
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn reports_a_missing_unit() {
        let (service, _db) = fixtures::service().await;

        let err = service
            .execute(Availability {
                unit_id: UnitId::Listing(crate::domain::listing::Id::new()),
                from: date("2025-09-01"),
                to: date("2025-09-04"),
            })
            .await
            .unwrap_err()
            .into_inner();

        assert!(matches!(err, ExecutionError::UnitNotExists(_)));
    }
}
