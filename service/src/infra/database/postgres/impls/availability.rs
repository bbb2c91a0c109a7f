//! [`AvailabilityRecord`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    DateTime, Money,
};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{OfUnitWithin, Slot},
        inventory::{Kind, UnitId},
        AvailabilityRecord,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Vec<AvailabilityRecord>, OfUnitWithin>>>
    for Postgres<C>
where
    C: Connection,
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
        let kind: Kind = unit_id.kind();
        let uuid = unit_id.uuid();

        const SQL: &str = "\
            SELECT slot, is_available, capacity_remaining, \
                   price_override, price_override_currency \
            FROM availability_records \
            WHERE unit_kind = $1::INT2 \
              AND unit_id = $2::UUID \
              AND slot >= $3::TIMESTAMPTZ \
              AND slot < $4::TIMESTAMPTZ \
            ORDER BY slot";
        Ok(self
            .query(SQL, &[&kind, &uuid, &from, &until])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| AvailabilityRecord {
                unit_id,
                slot: Slot::from(row.get::<_, DateTime>("slot")),
                is_available: row.get("is_available"),
                capacity_remaining: u16::try_from(
                    row.get::<_, i32>("capacity_remaining"),
                )
                .expect("`capacity_remaining` overflow"),
                price_override: row
                    .get::<_, Option<_>>("price_override")
                    .map(|amount| Money {
                        amount,
                        currency: row.get("price_override_currency"),
                    }),
            })
            .collect())
    }
}

impl<C> Database<Insert<AvailabilityRecord>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<AvailabilityRecord>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(record)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<AvailabilityRecord>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(record): Update<AvailabilityRecord>,
    ) -> Result<Self::Ok, Self::Err> {
        let AvailabilityRecord {
            unit_id,
            slot,
            is_available,
            capacity_remaining,
            price_override,
        } = record;
        let kind: Kind = unit_id.kind();
        let uuid = unit_id.uuid();
        let slot = DateTime::from(slot);
        let capacity_remaining = i32::from(capacity_remaining);

        const SQL: &str = "\
            INSERT INTO availability_records (\
                unit_kind, unit_id, slot, \
                is_available, capacity_remaining, \
                price_override, price_override_currency \
            ) VALUES (\
                $1::INT2, $2::UUID, $3::TIMESTAMPTZ, \
                $4::BOOLEAN, $5::INT4, \
                $6::NUMERIC, $7::INT2 \
            ) \
            ON CONFLICT (unit_kind, unit_id, slot) DO UPDATE \
            SET is_available = EXCLUDED.is_available, \
                capacity_remaining = EXCLUDED.capacity_remaining, \
                price_override = EXCLUDED.price_override, \
                price_override_currency = EXCLUDED.price_override_currency";
        self.exec(
            SQL,
            &[
                &kind,
                &uuid,
                &slot,
                &is_available,
                &capacity_remaining,
                &price_override.map(|m| m.amount),
                &price_override.map(|m| m.currency),
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
