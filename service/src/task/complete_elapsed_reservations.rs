//! [`CompleteElapsedReservations`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Select, Start},
    DateTime,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{self, CompleteReservation},
    domain::Reservation,
    infra::{database, Database},
    read, Command, Service,
};

use super::Task;

/// Configuration for [`CompleteElapsedReservations`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between sweeps over elapsed [`Reservation`]s.
    pub interval: time::Duration,
}

/// [`Task`] for completing [`Reservation`]s whose span has elapsed.
#[derive(Clone, Copy, Debug)]
pub struct CompleteElapsedReservations<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<CompleteElapsedReservations<Self>, Config>>>
    for Service<Db>
where
    CompleteElapsedReservations<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CompleteElapsedReservations<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CompleteElapsedReservations {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::CompleteElapsedReservations` failed: {e}");
            });
        }
    }
}

impl<Db> Task<Perform<()>> for CompleteElapsedReservations<Service<Db>>
where
    Db: Database<
        Select<By<Vec<Reservation>, read::reservation::ElapsedBefore>>,
        Ok = Vec<Reservation>,
        Err = Traced<database::Error>,
    >,
    Service<Db>: Command<
        CompleteReservation,
        Ok = Reservation,
        Err = Traced<command::complete_reservation::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let elapsed = self
            .service
            .database()
            .execute(Select(By::<Vec<Reservation>, _>::new(
                read::reservation::ElapsedBefore(DateTime::now()),
            )))
            .await
            .map_err(tracerr::wrap!())?;

        for reservation in elapsed {
            // Another actor may flip the status between the sweep select and
            // this command, so a single failure doesn't abort the sweep.
            _ = self
                .service
                .execute(CompleteReservation {
                    reservation_id: reservation.id,
                })
                .await
                .map_err(|e| {
                    log::warn!(
                        "failed to complete `Reservation(id: {})`: {e}",
                        reservation.id,
                    );
                });
        }
        Ok(())
    }
}

/// Error of [`CompleteElapsedReservations`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use common::{operations::Perform, Date};

    use crate::{
        command::{fixtures, ConfirmReservation, CreateReservation},
        domain::{
            inventory::{Span, UnitId},
            reservation::Status,
            user::Role,
        },
        Command as _, Task as _,
    };

    use super::{CompleteElapsedReservations, Config};

    #[tokio::test]
    async fn completes_elapsed_stays_only() {
        let (service, db) = fixtures::service().await;
        let guest = fixtures::user(&db, Role::Guest).await;
        let host = fixtures::user(&db, Role::Host).await;
        let listing = fixtures::listing(&db, host.id).await;

        let date = |s: &str| s.parse::<Date>().unwrap();
        let book = |span| {
            let service = &service;
            async move {
                let r = service
                    .execute(CreateReservation {
                        actor: guest,
                        unit_id: UnitId::Listing(listing.id),
                        span,
                        party_size: 1,
                    })
                    .await
                    .unwrap();
                service
                    .execute(ConfirmReservation {
                        actor: host,
                        reservation_id: r.id,
                    })
                    .await
                    .unwrap()
            }
        };

        let elapsed = book(
            Span::nights(date("2020-01-01"), date("2020-01-03")).unwrap(),
        )
        .await;
        let upcoming = book(
            Span::nights(date("2099-01-01"), date("2099-01-03")).unwrap(),
        )
        .await;

        let task = CompleteElapsedReservations {
            config: Config {
                interval: std::time::Duration::from_secs(60),
            },
            service: service.clone(),
        };
        task.execute(Perform(())).await.unwrap();

        let db = &db;
        let select = |id| async move {
            use common::operations::{By, Select};

            use crate::{domain::Reservation, infra::Database as _};

            db.execute(Select(By::<Option<Reservation>, _>::new(id)))
                .await
                .unwrap()
                .unwrap()
        };
        assert_eq!(select(elapsed.id).await.status, Status::Completed);
        assert_eq!(select(upcoming.id).await.status, Status::Confirmed);
    }
}
