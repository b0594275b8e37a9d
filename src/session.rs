use crate::fields::{at_path, first_string};
use crate::models::{Role, UserAccount};
use crate::voting::state::{VoteState, coerce_truthy};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::debug;
use serde_json::Value;

/// Where a vote status may live, in lookup order.
enum Source {
    User,
    Claims,
}

const VOTE_STATUS_PATHS: &[(Source, &str)] = &[
    (Source::User, "voteStatus"),
    (Source::User, "vote.status"),
    (Source::Claims, "voteStatus"),
    (Source::Claims, "vote.status"),
    (Source::Claims, "vote"),
];

/// Who is signed in, pieced together from the stored user record and the
/// bearer token's claims.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub vote_status: Option<Value>,
}

impl Identity {
    pub fn derive(stored_user: Option<&Value>, token: Option<&str>) -> Self {
        let claims = token.and_then(decode_claims);
        let user = stored_user.filter(|u| u.is_object());

        let from_user = |aliases: &[&str]| user.and_then(|u| first_string(u, aliases));
        let from_claims = |aliases: &[&str]| claims.as_ref().and_then(|c| first_string(c, aliases));

        let email = from_user(&["email"]).or_else(|| from_claims(&["email"]));

        let id = from_user(&["id", "_id"])
            .or_else(|| from_claims(&["id", "_id", "sub"]))
            .or_else(|| email.clone())
            .unwrap_or_default();

        let name = from_user(&["name", "fullname"])
            .or_else(|| from_claims(&["name", "fullname"]))
            .or_else(|| email.clone())
            .unwrap_or_else(|| "User".to_string());

        let is_admin = [user, claims.as_ref()].into_iter().flatten().any(|source| {
            source.get("role").and_then(Value::as_str) == Some("admin")
                || source.get("isAdmin") == Some(&Value::Bool(true))
        });

        let vote_status = VOTE_STATUS_PATHS.iter().find_map(|(source, path)| {
            let record = match source {
                Source::User => user,
                Source::Claims => claims.as_ref(),
            }?;
            at_path(record, path).cloned()
        });

        Self {
            id,
            name,
            email,
            is_admin,
            vote_status,
        }
    }

    pub fn has_voted(&self) -> bool {
        self.vote_status.as_ref().is_some_and(coerce_truthy)
    }

    pub fn vote_state(&self) -> VoteState {
        VoteState::from_value(self.vote_status.as_ref())
    }

    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "U".to_string())
    }

    pub fn as_account(&self) -> UserAccount {
        UserAccount {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone().unwrap_or_default(),
            role: if self.is_admin { Role::Admin } else { Role::User },
            has_voted: self.has_voted(),
        }
    }
}

/// Read a JWT's payload segment without verifying it.
///
/// Identity here only drives what the UI offers; the store checks the token.
pub fn decode_claims(token: &str) -> Option<Value> {
    let mut parts = token.trim().split('.');
    let (Some(_), Some(payload), Some(_), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        debug!("Token is not a three-part JWT");
        return None;
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.is_object().then_some(claims)
}
