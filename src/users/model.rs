use uuid::Uuid;

/// Role every user holds regardless of what is stored.
pub const BASELINE_ROLE: &str = "USER";
pub const ADMIN_ROLE: &str = "ADMIN";

/// Something that authenticates with an identity string (the email).
pub trait HasIdentity {
    fn identity(&self) -> &str;
}

/// Something that carries a password hash.
pub trait HasCredentialHash {
    fn credential_hash(&self) -> &str;

    /// Argon2 hashes embed their salt, so there is never a separate one.
    fn salt(&self) -> Option<&str> {
        None
    }
}

/// User account as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    roles: Vec<String>,
}

impl User {
    pub fn new(id: Uuid, email: String, password_hash: String, roles: Vec<String>) -> Self {
        Self {
            id,
            email,
            password_hash,
            roles,
        }
    }

    /// Effective roles: stored roles plus the baseline role, deduplicated.
    pub fn roles(&self) -> Vec<String> {
        effective_roles(&self.roles)
    }

    pub fn stored_roles(&self) -> &[String] {
        &self.roles
    }

    pub fn set_roles(&mut self, roles: Vec<String>) {
        self.roles = roles;
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    /// Hook for scrubbing transient secrets after authentication.
    /// Nothing transient is held today.
    pub fn erase_credentials(&mut self) {}
}

impl HasIdentity for User {
    fn identity(&self) -> &str {
        &self.email
    }
}

impl HasCredentialHash for User {
    fn credential_hash(&self) -> &str {
        &self.password_hash
    }
}

/// Fields of a user that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    pub fn is_same_identity<T: HasIdentity>(&self, target: &T) -> bool {
        self.email == target.identity()
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            roles: user.roles(),
        }
    }
}

impl HasIdentity for Principal {
    fn identity(&self) -> &str {
        &self.email
    }
}

pub fn effective_roles(stored: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(stored.len() + 1);
    for role in stored.iter().map(String::as_str).chain(std::iter::once(BASELINE_ROLE)) {
        if !out.iter().any(|r| r == role) {
            out.push(role.to_string());
        }
    }
    out
}
