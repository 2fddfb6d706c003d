//! Minimal user records. Identity and authentication live outside this
//! crate; a user row exists only so knowledge state, sessions and the
//! problem ledger have something to hang off.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::errors::*;
use crate::models::{NewUser, User};

pub fn get_or_add_user(conn: &mut SqliteConnection, name: &str) -> Result<User> {
    use crate::schema::users;

    let name = name.trim();
    if name.is_empty() {
        bail!(ErrorKind::InvalidInput);
    }

    if let Some(user) = users::table.filter(users::name.eq(name))
                                    .first(conn)
                                    .optional()?
    {
        return Ok(user);
    }

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser { name, joined: Utc::now().naive_utc() })
        .get_result(conn)
        .chain_err(|| "Couldn't add the user!")?;
    info!("Added user {} (id {})", user.name, user.id);
    Ok(user)
}

pub fn user_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<User>> {
    use crate::schema::users;

    users::table.filter(users::name.eq(name.trim()))
                .first(conn)
                .optional()
                .chain_err(|| "Couldn't look up the user!")
}

pub fn user_by_id(conn: &mut SqliteConnection, user_id: i32) -> Result<User> {
    use crate::schema::users;

    users::table.find(user_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| ErrorKind::UserNotFound(user_id).into())
}
