use tracing::warn;

use crate::error::ApiError;
use crate::users::{
    dto::UserWrite,
    model::{Principal, User},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Read,
    Replace,
    Patch,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Anyone, authenticated or not.
    Open,
    Admin,
    /// Admins, or the caller whose identity equals the target's email.
    AdminOrSelf,
}

const POLICY_TABLE: [(Operation, Rule); 6] = [
    (Operation::List, Rule::Admin),
    (Operation::Create, Rule::Admin),
    (Operation::Read, Rule::AdminOrSelf),
    (Operation::Replace, Rule::AdminOrSelf),
    (Operation::Patch, Rule::AdminOrSelf),
    (Operation::Delete, Rule::Admin),
];

/// Operation-level authorization for the user resource.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    list_open: bool,
}

impl AccessPolicy {
    pub fn new(list_open: bool) -> Self {
        Self { list_open }
    }

    pub fn rule(&self, op: Operation) -> Rule {
        if op == Operation::List && self.list_open {
            return Rule::Open;
        }
        POLICY_TABLE
            .iter()
            .find(|(o, _)| *o == op)
            .map(|(_, r)| *r)
            .unwrap_or(Rule::Admin)
    }

    /// `target` must be the loaded record for item operations.
    pub fn authorize(
        &self,
        op: Operation,
        caller: Option<&Principal>,
        target: Option<&User>,
    ) -> Result<(), ApiError> {
        let allowed = match (self.rule(op), caller) {
            (Rule::Open, _) => true,
            (_, None) => return Err(ApiError::Unauthenticated("Authentication required")),
            (Rule::Admin, Some(c)) => c.is_admin(),
            (Rule::AdminOrSelf, Some(c)) => {
                c.is_admin() || target.is_some_and(|t| c.is_same_identity(t))
            }
        };

        if allowed {
            Ok(())
        } else {
            warn!(operation = ?op, caller = caller.map(|c| c.email.as_str()), "access denied");
            Err(ApiError::AuthorizationDenied)
        }
    }
}

/// Drops the admin-only fields (`email`, `roles`) from a non-admin payload.
/// Returns the names of the dropped fields.
pub fn gate_fields(caller: &Principal, payload: &mut UserWrite) -> Vec<&'static str> {
    let mut stripped = Vec::new();
    if caller.is_admin() {
        return stripped;
    }
    if payload.email.take().is_some() {
        stripped.push("email");
    }
    if payload.roles.take().is_some() {
        stripped.push("roles");
    }
    if !stripped.is_empty() {
        warn!(caller = %caller.email, fields = ?stripped, "admin-only fields ignored");
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(email: &str, roles: &[&str]) -> User {
        User::new(
            Uuid::new_v4(),
            email.into(),
            "hash".into(),
            roles.iter().map(|r| r.to_string()).collect(),
        )
    }

    fn admin() -> Principal {
        Principal::from(&user("root@x.com", &["ADMIN"]))
    }

    fn plain(email: &str) -> Principal {
        Principal::from(&user(email, &[]))
    }

    #[test]
    fn table_matches_declared_rules() {
        let p = AccessPolicy::new(false);
        assert_eq!(p.rule(Operation::List), Rule::Admin);
        assert_eq!(p.rule(Operation::Create), Rule::Admin);
        assert_eq!(p.rule(Operation::Read), Rule::AdminOrSelf);
        assert_eq!(p.rule(Operation::Replace), Rule::AdminOrSelf);
        assert_eq!(p.rule(Operation::Patch), Rule::AdminOrSelf);
        assert_eq!(p.rule(Operation::Delete), Rule::Admin);
        assert_eq!(AccessPolicy::new(true).rule(Operation::List), Rule::Open);
    }

    #[test]
    fn open_list_allows_anonymous_callers() {
        assert!(AccessPolicy::new(true).authorize(Operation::List, None, None).is_ok());
        assert!(matches!(
            AccessPolicy::new(false).authorize(Operation::List, None, None),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn self_access_is_matched_by_email() {
        let p = AccessPolicy::new(false);
        let target = user("a@x.com", &[]);
        let me = plain("a@x.com");
        let other = plain("b@x.com");

        for op in [Operation::Read, Operation::Replace, Operation::Patch] {
            assert!(p.authorize(op, Some(&me), Some(&target)).is_ok());
            assert!(matches!(
                p.authorize(op, Some(&other), Some(&target)),
                Err(ApiError::AuthorizationDenied)
            ));
        }
    }

    #[test]
    fn delete_and_create_are_admin_only_even_for_self() {
        let p = AccessPolicy::new(false);
        let target = user("a@x.com", &[]);
        let me = plain("a@x.com");

        assert!(matches!(
            p.authorize(Operation::Delete, Some(&me), Some(&target)),
            Err(ApiError::AuthorizationDenied)
        ));
        assert!(matches!(
            p.authorize(Operation::Create, Some(&me), None),
            Err(ApiError::AuthorizationDenied)
        ));
        assert!(p.authorize(Operation::Delete, Some(&admin()), Some(&target)).is_ok());
        assert!(p.authorize(Operation::Create, Some(&admin()), None).is_ok());
    }

    #[test]
    fn gate_strips_protected_fields_for_non_admins() {
        let mut payload = UserWrite {
            email: Some("new@x.com".into()),
            password: Some("pw".into()),
            roles: Some(vec!["ADMIN".into()]),
        };
        let stripped = gate_fields(&plain("a@x.com"), &mut payload);
        assert_eq!(stripped, vec!["email", "roles"]);
        assert!(payload.email.is_none());
        assert!(payload.roles.is_none());
        assert_eq!(payload.password.as_deref(), Some("pw"));
    }

    #[test]
    fn gate_leaves_admin_payload_alone() {
        let mut payload = UserWrite {
            email: Some("new@x.com".into()),
            password: None,
            roles: Some(vec![]),
        };
        assert!(gate_fields(&admin(), &mut payload).is_empty());
        assert!(payload.email.is_some());
        assert!(payload.roles.is_some());
    }
}
