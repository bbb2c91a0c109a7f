//! [`Payment`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    Money,
};
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{
        inventory::Kind,
        payment::{self, Status},
        reservation, user, Payment,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Decodes a [`Payment`] out of the provided [`Row`].
///
/// [`Row`]: tokio_postgres::Row
fn decode(row: &tokio_postgres::Row) -> Payment {
    let amount = Money {
        amount: row.get("amount"),
        currency: row.get("currency"),
    };
    Payment {
        id: row.get("id"),
        reservation_id: row.get("reservation_id"),
        amount,
        status: row.get("status"),
        method: row.get("method"),
        refunded_amount: row.get::<_, Option<_>>("refunded_amount").map(
            |refunded| Money {
                amount: refunded,
                currency: amount.currency,
            },
        ),
        paid_at: row.get("paid_at"),
        refunded_at: row.get("refunded_at"),
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: payment::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, reservation_id, amount, currency, \
                   status, method, refunded_amount, \
                   paid_at, refunded_at \
            FROM payments \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| decode(&row)))
    }
}

impl<C> Database<Select<By<Option<Payment>, reservation::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, reservation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reservation_id: reservation::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, reservation_id, amount, currency, \
                   status, method, refunded_amount, \
                   paid_at, refunded_at \
            FROM payments \
            WHERE reservation_id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&reservation_id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| decode(&row)))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(payment)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            reservation_id,
            amount,
            status,
            method,
            refunded_amount,
            paid_at,
            refunded_at,
        } = payment;

        const SQL: &str = "\
            INSERT INTO payments (\
                id, reservation_id, amount, currency, \
                status, method, refunded_amount, \
                paid_at, refunded_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::NUMERIC, $4::INT2, \
                $5::INT2, $6::INT2, $7::NUMERIC, \
                $8::TIMESTAMPTZ, $9::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET status = EXCLUDED.status, \
                refunded_amount = EXCLUDED.refunded_amount, \
                refunded_at = EXCLUDED.refunded_at";
        self.exec(
            SQL,
            &[
                &id,
                &reservation_id,
                &amount.amount,
                &amount.currency,
                &status,
                &method,
                &refunded_amount.map(|m| m.amount),
                &paid_at,
                &refunded_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<read::Earnings, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::Earnings;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::Earnings, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let host_id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT p.currency, \
                   SUM(p.amount - COALESCE(p.refunded_amount, 0)) AS total, \
                   COUNT(*) AS payments_count \
            FROM payments AS p \
            JOIN reservations AS r ON r.id = p.reservation_id \
            LEFT JOIN listings AS l \
                 ON r.unit_kind = $1::INT2 AND l.id = r.unit_id \
            LEFT JOIN experiences AS e \
                 ON r.unit_kind = $2::INT2 AND e.id = r.unit_id \
            WHERE p.status = ANY($3::INT2[]) \
              AND COALESCE(l.host_id, e.host_id) = $4::UUID \
            GROUP BY p.currency \
            ORDER BY p.currency";
        let statuses: &[Status] = &[
            Status::Completed,
            Status::Refunded,
            Status::PartiallyRefunded,
        ];
        let params: &[&(dyn ToSql + Sync)] =
            &[&Kind::Listing, &Kind::Experience, &statuses, &host_id];

        let mut totals = Vec::new();
        let mut payments_count = 0;
        for row in self.query(SQL, params).await.map_err(tracerr::wrap!())? {
            totals.push(Money {
                amount: row.get("total"),
                currency: row.get("currency"),
            });
            payments_count += row.get::<_, i64>("payments_count");
        }
        Ok(read::Earnings {
            totals,
            payments_count,
        })
    }
}
