use std::io::Write;

use chrono::{DateTime, Utc};
use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, IsNull, Output, ToSql},
    AsExpression, FromSqlRow,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::users;

#[derive(Deserialize, Serialize, Debug, AsExpression, FromSqlRow, Copy, Clone, PartialEq, Eq)]
#[diesel(sql_type = crate::schema::sql_types::Userrole)]
#[repr(u32)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

impl ToSql<crate::schema::sql_types::Userrole, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        match *self {
            UserRole::Admin => out.write_all(b"admin"),
            UserRole::User => out.write_all(b"user"),
        }?;
        Ok(IsNull::No)
    }
}

impl FromSql<crate::schema::sql_types::Userrole, Pg> for UserRole {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"admin" => Ok(UserRole::Admin),
            b"user" => Ok(UserRole::User),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

#[derive(Insertable, Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Validate, Deserialize, Debug)]
pub struct CreateUser {
    #[garde(length(min = 3, max = 60))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8))]
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct UserLogin {
    pub email: String,
    pub password: String,
}

/// The authenticated actor threaded through authorization checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponseBrief {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}
