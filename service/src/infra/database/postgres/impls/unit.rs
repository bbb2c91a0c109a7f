//! [`Unit`]-related [`Database`] implementations.

use std::time::Duration;

use common::{
    operations::{By, Insert, Lock, Select},
    Money,
};
use tracerr::Traced;

use crate::{
    domain::{
        experience::{self, GroupTier, GroupTiers},
        inventory::{Kind, UnitId},
        listing,
        pricing::StayDiscounts,
        Experience, Listing, Unit,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Unit>, UnitId>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Unit>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Unit>, UnitId>>,
    ) -> Result<Self::Ok, Self::Err> {
        match by.into_inner() {
            UnitId::Listing(id) => Ok(self
                .execute(Select(By::<Option<Listing>, _>::new(id)))
                .await
                .map_err(tracerr::wrap!())?
                .map(Unit::Listing)),
            UnitId::Experience(id) => Ok(self
                .execute(Select(By::<Option<Experience>, _>::new(id)))
                .await
                .map_err(tracerr::wrap!())?
                .map(Unit::Experience)),
        }
    }
}

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: listing::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, host_id, title, \
                   nightly_rate, nightly_rate_currency, \
                   weekly_discount, weekly_discount_currency, \
                   monthly_discount, monthly_discount_currency, \
                   monthly_min_nights, \
                   max_guests, \
                   created_at \
            FROM listings \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Listing {
                id: row.get("id"),
                host_id: row.get("host_id"),
                title: row.get("title"),
                nightly_rate: Money {
                    amount: row.get("nightly_rate"),
                    currency: row.get("nightly_rate_currency"),
                },
                discounts: StayDiscounts {
                    weekly: row.get::<_, Option<_>>("weekly_discount").map(
                        |amount| Money {
                            amount,
                            currency: row.get("weekly_discount_currency"),
                        },
                    ),
                    monthly: row.get::<_, Option<_>>("monthly_discount").map(
                        |amount| Money {
                            amount,
                            currency: row.get("monthly_discount_currency"),
                        },
                    ),
                    monthly_min_nights: row
                        .get::<_, Option<i32>>("monthly_min_nights")
                        .map(u32::try_from)
                        .transpose()
                        .expect("`monthly_min_nights` overflow"),
                },
                max_guests: u16::try_from(row.get::<_, i32>("max_guests"))
                    .expect("`max_guests` overflow"),
                created_at: row.get("created_at"),
            }))
    }
}

impl<C> Database<Select<By<Option<Experience>, experience::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Experience>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Experience>, experience::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: experience::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, host_id, title, \
                   price_per_person, price_per_person_currency, \
                   duration_secs, seats, \
                   created_at \
            FROM experiences \
            WHERE id = $1::UUID \
            LIMIT 1";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        const TIERS_SQL: &str = "\
            SELECT min_size, max_size, per_person, per_person_currency \
            FROM experience_tiers \
            WHERE experience_id = $1::UUID \
            ORDER BY min_size";
        let tiers = self
            .query(TIERS_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| GroupTier {
                min_size: u16::try_from(row.get::<_, i32>("min_size"))
                    .expect("`min_size` overflow"),
                max_size: u16::try_from(row.get::<_, i32>("max_size"))
                    .expect("`max_size` overflow"),
                per_person: Money {
                    amount: row.get("per_person"),
                    currency: row.get("per_person_currency"),
                },
            })
            .collect();

        Ok(Some(Experience {
            id: row.get("id"),
            host_id: row.get("host_id"),
            title: row.get("title"),
            price_per_person: Money {
                amount: row.get("price_per_person"),
                currency: row.get("price_per_person_currency"),
            },
            duration: Duration::from_secs(
                u64::try_from(row.get::<_, i64>("duration_secs"))
                    .expect("`duration_secs` overflow"),
            ),
            seats: u16::try_from(row.get::<_, i32>("seats"))
                .expect("`seats` overflow"),
            tiers: GroupTiers::new(tiers).expect("tiers validated on insert"),
            created_at: row.get("created_at"),
        }))
    }
}

impl<C> Database<Insert<Unit>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(unit): Insert<Unit>,
    ) -> Result<Self::Ok, Self::Err> {
        match unit {
            Unit::Listing(listing) => {
                let Listing {
                    id,
                    host_id,
                    title,
                    nightly_rate,
                    discounts:
                        StayDiscounts {
                            weekly,
                            monthly,
                            monthly_min_nights,
                        },
                    max_guests,
                    created_at,
                } = listing;

                let max_guests = i32::from(max_guests);
                let monthly_min_nights = monthly_min_nights
                    .map(i32::try_from)
                    .transpose()
                    .expect("`monthly_min_nights` overflow");

                const SQL: &str = "\
                    INSERT INTO listings (\
                        id, host_id, title, \
                        nightly_rate, nightly_rate_currency, \
                        weekly_discount, weekly_discount_currency, \
                        monthly_discount, monthly_discount_currency, \
                        monthly_min_nights, \
                        max_guests, \
                        created_at \
                    ) VALUES (\
                        $1::UUID, $2::UUID, $3::VARCHAR, \
                        $4::NUMERIC, $5::INT2, \
                        $6::NUMERIC, $7::INT2, \
                        $8::NUMERIC, $9::INT2, \
                        $10::INT4, \
                        $11::INT4, \
                        $12::TIMESTAMPTZ \
                    ) \
                    ON CONFLICT (id) DO UPDATE \
                    SET host_id = EXCLUDED.host_id, \
                        title = EXCLUDED.title, \
                        nightly_rate = EXCLUDED.nightly_rate, \
                        nightly_rate_currency = \
                            EXCLUDED.nightly_rate_currency, \
                        weekly_discount = EXCLUDED.weekly_discount, \
                        weekly_discount_currency = \
                            EXCLUDED.weekly_discount_currency, \
                        monthly_discount = EXCLUDED.monthly_discount, \
                        monthly_discount_currency = \
                            EXCLUDED.monthly_discount_currency, \
                        monthly_min_nights = EXCLUDED.monthly_min_nights, \
                        max_guests = EXCLUDED.max_guests";
                self.exec(
                    SQL,
                    &[
                        &id,
                        &host_id,
                        &title,
                        &nightly_rate.amount,
                        &nightly_rate.currency,
                        &weekly.map(|m| m.amount),
                        &weekly.map(|m| m.currency),
                        &monthly.map(|m| m.amount),
                        &monthly.map(|m| m.currency),
                        &monthly_min_nights,
                        &max_guests,
                        &created_at,
                    ],
                )
                .await
                .map_err(tracerr::wrap!())
                .map(drop)
            }
            Unit::Experience(experience) => {
                let Experience {
                    id,
                    host_id,
                    title,
                    price_per_person,
                    duration,
                    seats,
                    tiers,
                    created_at,
                } = experience;

                let duration_secs = i64::try_from(duration.as_secs())
                    .expect("`duration_secs` overflow");
                let seats = i32::from(seats);

                const SQL: &str = "\
                    INSERT INTO experiences (\
                        id, host_id, title, \
                        price_per_person, price_per_person_currency, \
                        duration_secs, seats, \
                        created_at \
                    ) VALUES (\
                        $1::UUID, $2::UUID, $3::VARCHAR, \
                        $4::NUMERIC, $5::INT2, \
                        $6::INT8, $7::INT4, \
                        $8::TIMESTAMPTZ \
                    ) \
                    ON CONFLICT (id) DO UPDATE \
                    SET host_id = EXCLUDED.host_id, \
                        title = EXCLUDED.title, \
                        price_per_person = EXCLUDED.price_per_person, \
                        price_per_person_currency = \
                            EXCLUDED.price_per_person_currency, \
                        duration_secs = EXCLUDED.duration_secs, \
                        seats = EXCLUDED.seats";
                self.exec(
                    SQL,
                    &[
                        &id,
                        &host_id,
                        &title,
                        &price_per_person.amount,
                        &price_per_person.currency,
                        &duration_secs,
                        &seats,
                        &created_at,
                    ],
                )
                .await
                .map_err(tracerr::wrap!())
                .map(drop)?;

                const CLEAR_TIERS_SQL: &str = "\
                    DELETE FROM experience_tiers \
                    WHERE experience_id = $1::UUID";
                _ = self
                    .exec(CLEAR_TIERS_SQL, &[&id])
                    .await
                    .map_err(tracerr::wrap!())?;

                const TIER_SQL: &str = "\
                    INSERT INTO experience_tiers (\
                        experience_id, min_size, max_size, \
                        per_person, per_person_currency \
                    ) VALUES (\
                        $1::UUID, $2::INT4, $3::INT4, \
                        $4::NUMERIC, $5::INT2 \
                    )";
                let tiers: &[GroupTier] = tiers.as_ref();
                for tier in tiers {
                    let min_size = i32::from(tier.min_size);
                    let max_size = i32::from(tier.max_size);
                    _ = self
                        .exec(
                            TIER_SQL,
                            &[
                                &id,
                                &min_size,
                                &max_size,
                                &tier.per_person.amount,
                                &tier.per_person.currency,
                            ],
                        )
                        .await
                        .map_err(tracerr::wrap!())?;
                }
                Ok(())
            }
        }
    }
}

/// Upsert acquiring the row lock of a [`Unit`].
///
/// `DO NOTHING` would take no lock once the row exists, letting two
/// concurrent claims read the same availability records.
const LOCK_UNIT_SQL: &str = "\
    INSERT INTO units_lock \
    VALUES ($1::INT2, $2::UUID) \
    ON CONFLICT (kind, id) DO UPDATE SET id = EXCLUDED.id";

impl<C> Database<Lock<By<Unit, UnitId>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Unit, UnitId>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let kind: Kind = id.kind();
        let uuid = id.uuid();

        self.query(LOCK_UNIT_SQL, &[&kind, &uuid])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

#[cfg(test)]
mod spec {
    use super::LOCK_UNIT_SQL;

    #[test]
    fn unit_lock_upserts_to_hold_the_row_lock() {
        // Reverting to `DO NOTHING` reintroduces the double-booking race:
        // both claiming transactions would pass the lock unblocked.
        assert!(LOCK_UNIT_SQL.contains("DO UPDATE SET"));
    }
}
