pub mod guard;

use crate::error::{BallotError, Result};
use crate::fields::{first_present, first_string, list_items, random_id};
use crate::models::{Role, UserAccount};
use crate::store::{VoteStore, bounded};
use crate::voting::state::coerce_truthy;
use guard::{EditAuthorizationGuard, EditField};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Account creation as typed into the admin form, before validation.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub name: String,
    pub email: String,
    pub role: String,
    pub password: String,
}

/// A validated account ready for the store's register call.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Requested changes to an existing account. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl EditRequest {
    pub fn requested_fields(&self) -> BTreeSet<EditField> {
        let mut fields = BTreeSet::new();
        if self.name.is_some() {
            fields.insert(EditField::Name);
        }
        if self.email.is_some() {
            fields.insert(EditField::Email);
        }
        if self.role.is_some() {
            fields.insert(EditField::Role);
        }
        fields
    }
}

/// The body actually sent on an edit, after authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none()
    }
}

/// Map a users payload (bare array, or under `users` / `items`) to accounts.
pub fn normalize_users(payload: &Value) -> Vec<UserAccount> {
    list_items(payload, &["users", "items"])
        .iter()
        .map(|raw| UserAccount {
            id: first_string(raw, &["_id", "id", "email"])
                .filter(|id| !id.is_empty())
                .unwrap_or_else(random_id),
            name: first_string(raw, &["name", "fullname"]).unwrap_or_default(),
            email: first_string(raw, &["email"]).unwrap_or_default(),
            role: first_string(raw, &["role"])
                .map(|r| Role::parse(&r))
                .unwrap_or(Role::User),
            has_voted: first_present(raw, &["hasVoted", "voteStatus"]).is_some_and(coerce_truthy),
        })
        .collect()
}

/// User management on behalf of one signed-in actor.
pub struct AdminConsole {
    actor: UserAccount,
    store: Arc<dyn VoteStore>,
    timeout: Duration,
}

impl AdminConsole {
    pub fn new(actor: UserAccount, store: Arc<dyn VoteStore>, timeout: Duration) -> Self {
        Self {
            actor,
            store,
            timeout,
        }
    }

    pub fn actor(&self) -> &UserAccount {
        &self.actor
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>> {
        EditAuthorizationGuard::require_admin(&self.actor, "list accounts")?;
        let payload = bounded(self.timeout, self.store.list_users()).await?;
        Ok(normalize_users(&payload))
    }

    pub async fn create_user(&self, request: &CreateRequest) -> Result<()> {
        let account = EditAuthorizationGuard::authorize_create(&self.actor, request)?;
        bounded(self.timeout, self.store.create_user(&account)).await?;
        info!("Admin {} created account for {}", self.actor.id, account.email);
        Ok(())
    }

    /// Apply the allowed part of `request` to `target`; returns what was sent.
    pub async fn edit_user(&self, target: &UserAccount, request: &EditRequest) -> Result<AccountPatch> {
        let allowed =
            EditAuthorizationGuard::authorize(&self.actor, target, &request.requested_fields())?;

        if let Some(name) = &request.name {
            if allowed.contains(&EditField::Name) && name.trim().is_empty() {
                return Err(BallotError::validation("Name cannot be empty"));
            }
        }

        let patch = AccountPatch {
            name: request
                .name
                .as_ref()
                .filter(|_| allowed.contains(&EditField::Name))
                .map(|n| n.trim().to_string()),
            role: request.role.filter(|_| allowed.contains(&EditField::Role)),
        };

        if patch.is_empty() {
            info!("Nothing editable in request for account {}", target.id);
            return Ok(patch);
        }

        bounded(self.timeout, self.store.update_user(&target.id, &patch)).await?;
        info!("User {} updated account {}", self.actor.id, target.id);
        Ok(patch)
    }

    pub async fn delete_user(&self, target: &UserAccount) -> Result<()> {
        EditAuthorizationGuard::authorize_delete(&self.actor, target)?;
        bounded(self.timeout, self.store.delete_user(&target.id)).await?;
        info!("Admin {} deleted account {}", self.actor.id, target.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MockStore;
    use serde_json::json;

    fn account(id: &str, role: Role) -> UserAccount {
        UserAccount {
            id: id.to_string(),
            name: format!("User {}", id),
            email: format!("{}@example.com", id),
            role,
            has_voted: false,
        }
    }

    fn console(actor: UserAccount, store: Arc<MockStore>) -> AdminConsole {
        AdminConsole::new(actor, store, Duration::from_secs(1))
    }

    #[test]
    fn test_normalize_users() {
        let users = normalize_users(&json!({"users": [
            {"_id": "u1", "name": "Ann", "email": "ann@example.com", "role": "admin", "hasVoted": "yes"},
            {"email": "bob@example.com", "fullname": "Bob"},
            {}
        ]}));

        assert_eq!(users[0].id, "u1");
        assert!(users[0].is_admin());
        assert!(users[0].has_voted);
        assert_eq!(users[1].id, "bob@example.com");
        assert_eq!(users[1].name, "Bob");
        assert_eq!(users[1].role, Role::User);
        assert!(!users[1].has_voted);
        assert!(!users[2].id.is_empty());
    }

    #[test]
    fn test_patch_serialization_omits_unset_fields() {
        let patch = AccountPatch {
            name: Some("Ann".to_string()),
            role: None,
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"name": "Ann"}));
    }

    #[test]
    fn test_new_account_debug_hides_password() {
        let account = NewAccount {
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            role: Role::User,
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", account).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_self_edit_sends_name_only() {
        let store = Arc::new(MockStore::default());
        let admin = account("1", Role::Admin);
        let console = console(admin.clone(), store.clone());

        let request = EditRequest {
            name: Some(" Ann ".to_string()),
            email: Some("new@example.com".to_string()),
            role: Some(Role::User),
        };
        let patch = console.edit_user(&admin, &request).await.unwrap();

        assert_eq!(patch.name.as_deref(), Some("Ann"));
        assert_eq!(patch.role, None);
        assert_eq!(store.patched.lock().unwrap()[0].0, "1");
    }

    #[tokio::test]
    async fn test_admin_edits_other_role() {
        let store = Arc::new(MockStore::default());
        let console = console(account("1", Role::Admin), store.clone());
        let request = EditRequest {
            role: Some(Role::Admin),
            ..EditRequest::default()
        };

        let patch = console.edit_user(&account("2", Role::User), &request).await.unwrap();
        assert_eq!(patch.role, Some(Role::Admin));
        assert_eq!(store.admin_count(), 1);
    }

    #[tokio::test]
    async fn test_role_only_self_edit_skips_store() {
        let store = Arc::new(MockStore::default());
        let admin = account("1", Role::Admin);
        let console = console(admin.clone(), store.clone());
        let request = EditRequest {
            role: Some(Role::User),
            ..EditRequest::default()
        };

        let patch = console.edit_user(&admin, &request).await.unwrap();
        assert!(patch.is_empty());
        assert_eq!(store.admin_count(), 0);
    }

    #[tokio::test]
    async fn test_non_admin_is_stopped_before_store() {
        let store = Arc::new(MockStore::default());
        let console = console(account("2", Role::User), store.clone());
        let other = account("3", Role::User);

        let edit = console
            .edit_user(&other, &EditRequest { name: Some("X".to_string()), ..EditRequest::default() })
            .await;
        assert!(matches!(edit, Err(BallotError::Forbidden(_))));
        assert!(matches!(console.delete_user(&other).await, Err(BallotError::Forbidden(_))));
        assert!(matches!(console.list_users().await, Err(BallotError::Forbidden(_))));
        assert!(matches!(
            console.create_user(&CreateRequest::default()).await,
            Err(BallotError::Forbidden(_))
        ));
        assert_eq!(store.admin_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let store = Arc::new(MockStore::default());
        let user = account("2", Role::User);
        let console = console(user.clone(), store.clone());
        let err = console
            .edit_user(&user, &EditRequest { name: Some("   ".to_string()), ..EditRequest::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, BallotError::Validation(_)));
        assert_eq!(store.admin_count(), 0);
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let store = Arc::new(MockStore::default());
        let console = console(account("1", Role::Admin), store.clone());

        let request = CreateRequest {
            name: "Cleo".to_string(),
            email: "cleo@example.com".to_string(),
            role: "user".to_string(),
            password: "s3cret".to_string(),
        };
        console.create_user(&request).await.unwrap();
        console.delete_user(&account("9", Role::User)).await.unwrap();

        assert_eq!(store.created.lock().unwrap()[0].email, "cleo@example.com");
        assert_eq!(store.deleted.lock().unwrap().as_slice(), ["9".to_string()]);
    }

    #[tokio::test]
    async fn test_list_users_normalizes_payload() {
        let store = Arc::new(MockStore {
            users: json!([{"id": "a", "name": "Ann", "role": "admin"}]),
            ..MockStore::default()
        });
        let console = console(account("1", Role::Admin), store);
        let users = console.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin());
    }
}
