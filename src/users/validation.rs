use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::error::{ApiError, Violation};
use crate::users::repo::UserRepository;

pub const EMAIL_MAX_LEN: usize = 180;

/// A user record as it would be saved, before hashing.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// Set when the record already exists; excluded from the uniqueness check.
    pub id: Option<Uuid>,
    pub email: &'a str,
    /// Plaintext from the payload, if one was supplied.
    pub new_password: Option<&'a str>,
    pub has_stored_hash: bool,
}

type Check = fn(&Candidate<'_>) -> Option<Violation>;

/// Synchronous checks, run in order. A field stops at its first violation.
const CHECKS: &[Check] = &[
    email_required,
    email_length,
    email_format,
    password_required,
];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn email_required(c: &Candidate<'_>) -> Option<Violation> {
    c.email
        .trim()
        .is_empty()
        .then(|| Violation::new("email", "This value should not be blank."))
}

fn email_length(c: &Candidate<'_>) -> Option<Violation> {
    (c.email.chars().count() > EMAIL_MAX_LEN).then(|| {
        Violation::new(
            "email",
            format!("This value is too long. It should have {EMAIL_MAX_LEN} characters or less."),
        )
    })
}

fn email_format(c: &Candidate<'_>) -> Option<Violation> {
    (!is_valid_email(c.email))
        .then(|| Violation::new("email", "This value is not a valid email address."))
}

fn password_required(c: &Candidate<'_>) -> Option<Violation> {
    let missing = match c.new_password {
        Some(p) => p.is_empty(),
        None => !c.has_stored_hash,
    };
    missing.then(|| Violation::new("password", "This value should not be blank."))
}

pub fn run_checks(candidate: &Candidate<'_>) -> Vec<Violation> {
    let mut violations: Vec<Violation> = Vec::new();
    for check in CHECKS {
        if let Some(v) = check(candidate) {
            if !violations.iter().any(|seen| seen.field == v.field) {
                violations.push(v);
            }
        }
    }
    violations
}

/// Full pipeline: field checks, then email uniqueness against the store.
pub async fn validate(
    repo: &dyn UserRepository,
    candidate: &Candidate<'_>,
) -> Result<(), ApiError> {
    let violations = run_checks(candidate);
    if !violations.is_empty() {
        return Err(ApiError::ValidationFailed(violations));
    }

    if let Some(existing) = repo.find_by_email(candidate.email).await? {
        if Some(existing.id) != candidate.id {
            return Err(duplicate_email());
        }
    }
    Ok(())
}

pub fn duplicate_email() -> ApiError {
    ApiError::invalid("email", "This value is already used.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{model::NewUser, repo::InMemoryUserRepository};

    fn candidate<'a>(email: &'a str, password: Option<&'a str>) -> Candidate<'a> {
        Candidate {
            id: None,
            email,
            new_password: password,
            has_stored_hash: false,
        }
    }

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn blank_email_reports_a_single_violation() {
        let v = run_checks(&candidate("", Some("pw")));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, "email");
        assert!(v[0].message.contains("blank"));
    }

    #[test]
    fn overlong_email_is_rejected() {
        let local = "a".repeat(EMAIL_MAX_LEN);
        let email = format!("{local}@x.com");
        let v = run_checks(&candidate(&email, Some("pw")));
        assert_eq!(v.len(), 1);
        assert!(v[0].message.contains("too long"));
    }

    #[test]
    fn email_at_length_limit_is_accepted() {
        let local = "a".repeat(EMAIL_MAX_LEN - "@x.com".len());
        let email = format!("{local}@x.com");
        assert_eq!(email.len(), EMAIL_MAX_LEN);
        assert!(run_checks(&candidate(&email, Some("pw"))).is_empty());

        let one_over = format!("a{email}");
        let v = run_checks(&candidate(&one_over, Some("pw")));
        assert_eq!(v.len(), 1);
        assert!(v[0].message.contains("too long"));
    }

    #[test]
    fn missing_password_only_fails_without_stored_hash() {
        let v = run_checks(&candidate("a@x.com", None));
        assert_eq!(v, vec![Violation::new("password", "This value should not be blank.")]);

        let mut existing = candidate("a@x.com", None);
        existing.has_stored_hash = true;
        assert!(run_checks(&existing).is_empty());

        existing.new_password = Some("");
        assert_eq!(run_checks(&existing).len(), 1);
    }

    #[test]
    fn violations_for_both_fields_are_aggregated() {
        let v = run_checks(&candidate("bad", None));
        let fields: Vec<&str> = v.iter().map(|v| v.field.as_ref()).collect();
        assert_eq!(fields, vec!["email", "password"]);
    }

    #[tokio::test]
    async fn uniqueness_is_checked_against_other_records_only() {
        let repo = InMemoryUserRepository::default();
        let stored = repo
            .insert(NewUser {
                email: "a@x.com".into(),
                password_hash: "h".into(),
                roles: vec![],
            })
            .await
            .unwrap();

        let err = validate(&repo, &candidate("a@x.com", Some("pw"))).await.unwrap_err();
        match err {
            ApiError::ValidationFailed(v) => assert_eq!(v[0].field, "email"),
            other => panic!("unexpected {other:?}"),
        }

        let mut same = candidate("a@x.com", None);
        same.id = Some(stored.id);
        same.has_stored_hash = true;
        assert!(validate(&repo, &same).await.is_ok());

        // exact match only
        assert!(validate(&repo, &candidate("A@x.com", Some("pw"))).await.is_ok());
    }
}
