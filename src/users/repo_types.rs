use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::users::model::User;

/// Row of the `user` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,                // primary key
    pub email: String,           // unique, ≤180 chars
    pub password: String,        // argon2 hash
    pub roles: Json<Vec<String>>, // stored roles, without the baseline
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User::new(r.id, r.email, r.password, r.roles.0)
    }
}
