use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::password::hash_password,
    error::ApiError,
    state::AppState,
    users::{
        dto::{UserRead, UserWrite},
        model::{NewUser, Principal, ADMIN_ROLE},
        policy::{gate_fields, Operation},
        repo::RepoError,
        validation::{self, Candidate},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Replace,
    Patch,
}

impl UpdateMode {
    fn operation(self) -> Operation {
        match self {
            UpdateMode::Replace => Operation::Replace,
            UpdateMode::Patch => Operation::Patch,
        }
    }
}

pub async fn list_users(
    state: &AppState,
    caller: Option<&Principal>,
) -> Result<Vec<UserRead>, ApiError> {
    state.policy().authorize(Operation::List, caller, None)?;
    let users = state.users.list().await?;
    Ok(users.iter().map(UserRead::from).collect())
}

pub async fn create_user(
    state: &AppState,
    caller: &Principal,
    mut payload: UserWrite,
) -> Result<UserRead, ApiError> {
    state.policy().authorize(Operation::Create, Some(caller), None)?;
    gate_fields(caller, &mut payload);

    let email = payload.email.unwrap_or_default();
    let candidate = Candidate {
        id: None,
        email: &email,
        new_password: payload.password.as_deref(),
        has_stored_hash: false,
    };
    validation::validate(state.users.as_ref(), &candidate).await?;

    let Some(plain) = payload.password else {
        return Err(ApiError::invalid("password", "This value should not be blank."));
    };
    let user = state
        .users
        .insert(NewUser {
            email,
            password_hash: hash_password(&plain)?,
            roles: payload.roles.unwrap_or_default(),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, by = %caller.email, "user created");
    Ok(UserRead::from(user))
}

pub async fn get_user(
    state: &AppState,
    caller: &Principal,
    id: Uuid,
) -> Result<UserRead, ApiError> {
    let user = state.users.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    state.policy().authorize(Operation::Read, Some(caller), Some(&user))?;
    Ok(UserRead::from(user))
}

/// Applies the permitted fields of `payload` to the stored record.
/// Absent fields keep their stored values.
pub async fn update_user(
    state: &AppState,
    caller: &Principal,
    id: Uuid,
    mut payload: UserWrite,
    mode: UpdateMode,
) -> Result<UserRead, ApiError> {
    let mut user = state.users.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    state.policy().authorize(mode.operation(), Some(caller), Some(&user))?;
    gate_fields(caller, &mut payload);

    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(roles) = payload.roles {
        user.set_roles(roles);
    }

    let candidate = Candidate {
        id: Some(user.id),
        email: &user.email,
        new_password: payload.password.as_deref(),
        has_stored_hash: !user.password_hash.is_empty(),
    };
    validation::validate(state.users.as_ref(), &candidate).await?;

    if let Some(plain) = payload.password {
        user.password_hash = hash_password(&plain)?;
    }
    let saved = state.users.update(&user).await?;

    info!(user_id = %saved.id, mode = ?mode, by = %caller.email, "user updated");
    Ok(UserRead::from(saved))
}

pub async fn delete_user(state: &AppState, caller: &Principal, id: Uuid) -> Result<(), ApiError> {
    let user = state.users.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    state.policy().authorize(Operation::Delete, Some(caller), Some(&user))?;

    if !state.users.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = %id, by = %caller.email, "user deleted");
    Ok(())
}

/// Creates the configured administrator if no user holds that email yet.
/// Returns the created record, or `None` when it already existed.
pub async fn bootstrap_admin(
    state: &AppState,
    email: &str,
    password: &str,
) -> anyhow::Result<Option<UserRead>> {
    if let Some(existing) = state.users.find_by_email(email).await? {
        if !existing.is_admin() {
            warn!(email = %email, "bootstrap admin email belongs to a non-admin user");
        }
        return Ok(None);
    }

    let violations = validation::run_checks(&Candidate {
        id: None,
        email,
        new_password: Some(password),
        has_stored_hash: false,
    });
    if let Some(v) = violations.first() {
        anyhow::bail!("invalid bootstrap admin {}: {}", v.field, v.message);
    }

    let user = match state
        .users
        .insert(NewUser {
            email: email.to_string(),
            password_hash: hash_password(password)?,
            roles: vec![ADMIN_ROLE.to_string()],
        })
        .await
    {
        Ok(u) => u,
        Err(RepoError::DuplicateEmail) => return Ok(None),
        Err(e) => return Err(anyhow::Error::new(e).context("insert bootstrap admin")),
    };

    info!(user_id = %user.id, email = %user.email, "bootstrap admin created");
    Ok(Some(UserRead::from(user)))
}
