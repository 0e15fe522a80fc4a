use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::model::User;

/// Read-facing representation. The password never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRead {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<&User> for UserRead {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            roles: user.roles(),
        }
    }
}

impl From<User> for UserRead {
    fn from(user: User) -> Self {
        UserRead::from(&user)
    }
}

/// Write-facing representation accepted on create and update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserWrite {
    pub email: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}
