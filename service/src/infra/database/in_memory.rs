//! In-memory [`Database`] implementation.
//!
//! Backs development and the test-suite with the same operations surface as
//! the Postgres implementation. A transaction takes an exclusive guard over
//! the whole [`Store`] and works on a copy of it, writing the copy back on
//! [`Commit`] and discarding it when dropped uncommitted.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::Arc,
    time::Duration,
};

use common::operations::{By, Commit, Insert, Lock, Select, Transact, Update};
use derive_more::{Display, Error as StdError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{AvailabilityRecord, OfUnitWithin, Slot},
        inventory::{Span, Unit, UnitId},
        payment, reservation, user, Payment, Reservation, User,
    },
    infra::{database, Database},
    read,
};

/// In-memory [`Database`] client.
#[derive(Debug, Default)]
pub struct InMemory<T = Shared>(T);

impl Clone for InMemory {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl InMemory {
    /// Creates a new empty [`InMemory`] client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Backing state of an [`InMemory`] client.
#[derive(Clone, Debug, Default)]
pub struct Store {
    /// [`User`]s by their IDs.
    users: HashMap<user::Id, User>,

    /// [`Unit`]s by their IDs.
    units: HashMap<UnitId, Unit>,

    /// Explicit [`AvailabilityRecord`]s, ordered per [`Unit`] and [`Slot`].
    records: BTreeMap<(UnitId, Slot), AvailabilityRecord>,

    /// [`Reservation`]s by their IDs.
    reservations: HashMap<reservation::Id, Reservation>,

    /// [`Payment`]s by their IDs.
    payments: HashMap<payment::Id, Payment>,
}

/// Non-transactional [`InMemory`] client state.
#[derive(Clone, Debug, Default)]
pub struct Shared {
    /// [`Store`] shared between all clones of the client.
    store: Arc<Mutex<Store>>,
}

/// Transactional [`InMemory`] client state.
///
/// Holds the whole [`Store`] exclusively until committed or dropped.
#[derive(Debug)]
pub struct Exclusive {
    /// Transaction state, [`None`] once committed.
    state: Mutex<Option<TxState>>,
}

/// State of a live [`Exclusive`] transaction.
#[derive(Debug)]
struct TxState {
    /// Exclusive guard over the shared [`Store`].
    guard: OwnedMutexGuard<Store>,

    /// Copy of the [`Store`] all operations apply to.
    working: Store,
}

/// Access to the backing [`Store`] of an [`InMemory`] client.
pub trait Access {
    /// Runs the provided function over the backing [`Store`].
    fn with<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;
}

impl Access for Shared {
    async fn with<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        let mut store = self.store.lock().await;
        Ok(f(&mut store))
    }
}

impl Access for Exclusive {
    async fn with<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> Result<R, Traced<database::Error>> {
        let mut state = self.state.lock().await;
        let state = state
            .as_mut()
            .ok_or(Error::TransactionClosed)
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;
        Ok(f(&mut state.working))
    }
}

/// In-memory database [`Error`].
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Operation on an already committed transaction.
    #[display("transaction is already committed")]
    TransactionClosed,
}

impl Database<Transact> for InMemory {
    type Ok = InMemory<Exclusive>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let guard = Arc::clone(&self.0.store).lock_owned().await;
        let working = guard.clone();
        Ok(InMemory(Exclusive {
            state: Mutex::new(Some(TxState { guard, working })),
        }))
    }
}

impl Database<Commit> for InMemory<Exclusive> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        let Some(TxState { mut guard, working }) =
            self.0.state.lock().await.take()
        else {
            // Nothing left to commit.
            return Ok(());
        };
        *guard = working;
        Ok(())
    }
}

impl<A: Access> Database<Select<By<Option<User>, user::Id>>> for InMemory<A> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with(|store| store.users.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<User>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store.users.insert(user.id, user);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Unit>, UnitId>>> for InMemory<A> {
    type Ok = Option<Unit>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Unit>, UnitId>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with(|store| store.units.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Unit>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(unit): Insert<Unit>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store.units.insert(unit.id(), unit);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

// Claim serialization is provided by the exclusive `Store` guard the
// transaction already holds, so row locks have nothing left to do here.
impl<A: Access> Database<Lock<By<Unit, UnitId>>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(_): Lock<By<Unit, UnitId>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.with(|_| ()).await.map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Lock<By<Reservation, reservation::Id>>>
    for InMemory<A>
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(_): Lock<By<Reservation, reservation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.with(|_| ()).await.map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Vec<AvailabilityRecord>, OfUnitWithin>>>
    for InMemory<A>
{
    type Ok = Vec<AvailabilityRecord>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<AvailabilityRecord>, OfUnitWithin>>,
    ) -> Result<Self::Ok, Self::Err> {
        let OfUnitWithin {
            unit_id,
            from,
            until,
        } = by.into_inner();
        self.0
            .with(|store| {
                store
                    .records
                    .range(
                        (unit_id, Slot::from(from))..(unit_id, Slot::from(until)),
                    )
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<AvailabilityRecord>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<AvailabilityRecord>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(record)).await.map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Update<AvailabilityRecord>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(record): Update<AvailabilityRecord>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store
                    .records
                    .insert((record.unit_id, record.slot), record);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Reservation>, reservation::Id>>>
    for InMemory<A>
{
    type Ok = Option<Reservation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Reservation>, reservation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with(|store| store.reservations.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Reservation>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(reservation): Insert<Reservation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store.reservations.insert(reservation.id, reservation);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Update<Reservation>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(reservation): Update<Reservation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store.reservations.insert(reservation.id, reservation);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access>
    Database<Select<By<Vec<Reservation>, read::reservation::ElapsedBefore>>>
    for InMemory<A>
{
    type Ok = Vec<Reservation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Reservation>, read::reservation::ElapsedBefore>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        use crate::domain::reservation::Status;

        let read::reservation::ElapsedBefore(deadline) = by.into_inner();
        self.0
            .with(|store| {
                store
                    .reservations
                    .values()
                    .filter(|r| {
                        matches!(r.status, Status::Confirmed | Status::Paid)
                    })
                    .filter(|r| {
                        let session_duration = match (
                            &r.span,
                            store.units.get(&r.unit_id),
                        ) {
                            (Span::Nights { .. }, _) => Duration::ZERO,
                            (
                                Span::Session { .. },
                                Some(Unit::Experience(e)),
                            ) => e.duration,
                            // Unit is gone, cannot tell when it ended.
                            (Span::Session { .. }, _) => return false,
                        };
                        r.span.ends_at(session_duration) <= deadline
                    })
                    .cloned()
                    .collect()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Payment>, payment::Id>>>
    for InMemory<A>
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with(|store| store.payments.get(&id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<Option<Payment>, reservation::Id>>>
    for InMemory<A>
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, reservation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reservation_id = by.into_inner();
        self.0
            .with(|store| {
                store
                    .payments
                    .values()
                    .find(|p| p.reservation_id == reservation_id)
                    .cloned()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Insert<Payment>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store.payments.insert(payment.id, payment);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Update<Payment>> for InMemory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|store| {
                _ = store.payments.insert(payment.id, payment);
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<A: Access> Database<Select<By<read::Earnings, user::Id>>>
    for InMemory<A>
{
    type Ok = read::Earnings;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::Earnings, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        use common::Money;

        use crate::domain::payment::Status;

        let host_id = by.into_inner();
        self.0
            .with(|store| {
                let mut totals = BTreeMap::<u8, Money>::new();
                let mut payments_count = 0;
                for p in store.payments.values() {
                    if !matches!(
                        p.status,
                        Status::Completed
                            | Status::Refunded
                            | Status::PartiallyRefunded,
                    ) {
                        continue;
                    }
                    let hosted = store
                        .reservations
                        .get(&p.reservation_id)
                        .and_then(|r| store.units.get(&r.unit_id))
                        .is_some_and(|u| u.host_id() == host_id);
                    if !hosted {
                        continue;
                    }

                    let net = p.net_amount();
                    let total = totals
                        .entry(net.currency.u8())
                        .or_insert(Money::zero(net.currency));
                    total.amount += net.amount;
                    payments_count += 1;
                }
                read::Earnings {
                    totals: totals.into_values().collect(),
                    payments_count,
                }
            })
            .await
            .map_err(tracerr::wrap!())
    }
}
