//! [`Reservation`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Date, DateTime, Money,
};
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{
        inventory::{Kind, Span, UnitId},
        reservation::{self, Status},
        Reservation,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Decodes a [`Reservation`] out of the provided [`Row`].
///
/// [`Row`]: tokio_postgres::Row
fn decode(row: &tokio_postgres::Row) -> Reservation {
    let kind: Kind = row.get("unit_kind");
    let span = match kind {
        Kind::Listing => Span::Nights {
            check_in: row.get("check_in"),
            check_out: row.get("check_out"),
        },
        Kind::Experience => Span::Session {
            starts_at: row.get("starts_at"),
        },
    };
    Reservation {
        id: row.get("id"),
        guest_id: row.get("guest_id"),
        unit_id: UnitId::from_parts(kind, row.get("unit_id")),
        span,
        party_size: u16::try_from(row.get::<_, i32>("party_size"))
            .expect("`party_size` overflow"),
        status: row.get("status"),
        total_price: Money {
            amount: row.get("total_price"),
            currency: row.get("total_price_currency"),
        },
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Reservation>, reservation::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Reservation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Reservation>, reservation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: reservation::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, guest_id, unit_kind, unit_id, \
                   check_in, check_out, starts_at, \
                   party_size, status, \
                   total_price, total_price_currency, \
                   created_at \
            FROM reservations \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| decode(&row)))
    }
}

impl<C> Database<Select<By<Vec<Reservation>, read::reservation::ElapsedBefore>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Reservation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Reservation>, read::reservation::ElapsedBefore>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::reservation::ElapsedBefore(deadline) = by.into_inner();

        // A stay elapses once its check-out day arrives, a session once it
        // runs for its full duration.
        const SQL: &str = "\
            SELECT r.id, r.guest_id, r.unit_kind, r.unit_id, \
                   r.check_in, r.check_out, r.starts_at, \
                   r.party_size, r.status, \
                   r.total_price, r.total_price_currency, \
                   r.created_at \
            FROM reservations AS r \
            LEFT JOIN experiences AS e \
                 ON r.unit_kind = $1::INT2 AND e.id = r.unit_id \
            WHERE r.status = ANY($2::INT2[]) \
              AND ((r.unit_kind = $3::INT2 \
                    AND r.check_out <= $4::DATE) \
                OR (r.unit_kind = $1::INT2 \
                    AND r.starts_at \
                        + make_interval(secs => e.duration_secs) \
                        <= $5::TIMESTAMPTZ))";
        let statuses: &[Status] = &[Status::Confirmed, Status::Paid];
        let params: &[&(dyn ToSql + Sync)] = &[
            &Kind::Experience,
            &statuses,
            &Kind::Listing,
            &Date::from(deadline),
            &deadline,
        ];
        Ok(self
            .query(SQL, params)
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(decode)
            .collect())
    }
}

impl<C> Database<Insert<Reservation>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(reservation): Insert<Reservation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(reservation))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Reservation>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(reservation): Update<Reservation>,
    ) -> Result<Self::Ok, Self::Err> {
        let Reservation {
            id,
            guest_id,
            unit_id,
            span,
            party_size,
            status,
            total_price,
            created_at,
        } = reservation;
        let kind: Kind = unit_id.kind();
        let unit_uuid = unit_id.uuid();
        let (check_in, check_out, starts_at) = match span {
            Span::Nights {
                check_in,
                check_out,
            } => (Some(check_in), Some(check_out), None),
            Span::Session { starts_at } => (None, None, Some(starts_at)),
        };
        let party_size = i32::from(party_size);

        const SQL: &str = "\
            INSERT INTO reservations (\
                id, guest_id, unit_kind, unit_id, \
                check_in, check_out, starts_at, \
                party_size, status, \
                total_price, total_price_currency, \
                created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT2, $4::UUID, \
                $5::DATE, $6::DATE, $7::TIMESTAMPTZ, \
                $8::INT4, $9::INT2, \
                $10::NUMERIC, $11::INT2, \
                $12::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status";
        self.exec(
            SQL,
            &[
                &id,
                &guest_id,
                &kind,
                &unit_uuid,
                &check_in,
                &check_out,
                &starts_at,
                &party_size,
                &status,
                &total_price.amount,
                &total_price.currency,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Reservation, reservation::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Reservation, reservation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: reservation::Id = by.into_inner();

        // `DO UPDATE` (unlike `DO NOTHING`) locks the row even when it
        // already exists, serializing status flips upon one `Reservation`.
        const SQL: &str = "\
            INSERT INTO reservations_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
