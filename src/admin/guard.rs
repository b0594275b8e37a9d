use crate::admin::{CreateRequest, NewAccount};
use crate::error::{BallotError, Result};
use crate::models::{Role, UserAccount};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditField {
    Name,
    Email,
    Role,
}

const SELF_EDITABLE: &[EditField] = &[EditField::Name];
const ADMIN_EDITABLE: &[EditField] = &[EditField::Name, EditField::Role];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    SelfEdit,
    OtherAccount,
}

/// Decides what an actor may do to a user account.
///
/// Edits go through a fixed table keyed on the actor's role and whether the
/// target is the actor's own account. Email never appears in it: it is set
/// once at creation.
pub struct EditAuthorizationGuard;

impl EditAuthorizationGuard {
    fn editable_fields(role: Role, relation: Relation) -> Option<&'static [EditField]> {
        match (role, relation) {
            (_, Relation::SelfEdit) => Some(SELF_EDITABLE),
            (Role::Admin, Relation::OtherAccount) => Some(ADMIN_EDITABLE),
            (Role::User, Relation::OtherAccount) => None,
        }
    }

    /// Narrow `requested` to the fields `actor` may change on `target`.
    pub fn authorize(
        actor: &UserAccount,
        target: &UserAccount,
        requested: &BTreeSet<EditField>,
    ) -> Result<BTreeSet<EditField>> {
        let relation = if actor.id == target.id {
            Relation::SelfEdit
        } else {
            Relation::OtherAccount
        };

        let Some(editable) = Self::editable_fields(actor.role, relation) else {
            warn!("User {} denied editing account {}", actor.id, target.id);
            return Err(BallotError::forbidden("Only admins can edit other accounts"));
        };

        Ok(requested
            .iter()
            .copied()
            .filter(|field| editable.contains(field))
            .collect())
    }

    /// Validate an account creation request from `actor`.
    pub fn authorize_create(actor: &UserAccount, request: &CreateRequest) -> Result<NewAccount> {
        Self::require_admin(actor, "create accounts")?;

        let name = request.name.trim();
        let email = request.email.trim();
        let role = request.role.trim();

        if name.is_empty() || email.is_empty() || role.is_empty() || request.password.is_empty() {
            return Err(BallotError::validation(
                "Name, email, role and password are required",
            ));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(BallotError::validation(format!("Invalid email address: {}", email)));
        }
        let role = match role.to_lowercase().as_str() {
            "admin" => Role::Admin,
            "user" => Role::User,
            other => return Err(BallotError::validation(format!("Unknown role: {}", other))),
        };

        Ok(NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            role,
            password: request.password.clone(),
        })
    }

    pub fn authorize_delete(actor: &UserAccount, target: &UserAccount) -> Result<()> {
        Self::require_admin(actor, "delete accounts")?;
        if actor.id == target.id {
            warn!("Admin {} is deleting their own account", actor.id);
        }
        Ok(())
    }

    pub fn require_admin(actor: &UserAccount, action: &str) -> Result<()> {
        if actor.is_admin() {
            Ok(())
        } else {
            warn!("User {} denied: cannot {}", actor.id, action);
            Err(BallotError::forbidden(format!("Only admins can {}", action)))
        }
    }
}
