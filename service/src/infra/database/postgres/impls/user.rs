//! [`User`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<User>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, name, role, created_at \
            FROM users \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| User {
                id: row.get("id"),
                name: row.get("name"),
                role: row.get("role"),
                created_at: row.get("created_at"),
            }))
    }
}

impl<C> Database<Insert<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            name,
            role,
            created_at,
        } = user;

        const SQL: &str = "\
            INSERT INTO users (id, name, role, created_at) \
            VALUES ($1::UUID, $2::VARCHAR, $3::INT2, $4::TIMESTAMPTZ) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                role = EXCLUDED.role";
        self.exec(SQL, &[&id, &name, &role, &created_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
