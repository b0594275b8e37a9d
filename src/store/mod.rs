pub mod http;
#[cfg(test)]
pub(crate) mod testing;

use crate::admin::{AccountPatch, NewAccount};
use crate::error::{BallotError, Result};
use crate::models::{Ack, Selection};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// The account/voting backend the core talks to.
///
/// Read calls hand back the raw payload; shaping it is the caller's job.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn fetch_options(&self) -> Result<Value>;

    /// Record a vote. A duplicate for the same voter must come back as
    /// `BallotError::AlreadyVoted`.
    async fn submit_vote(&self, voter_id: &str, selection: &Selection) -> Result<Ack>;

    async fn fetch_results(&self) -> Result<Value>;

    async fn list_users(&self) -> Result<Value>;

    async fn create_user(&self, account: &NewAccount) -> Result<()>;

    async fn update_user(&self, user_id: &str, patch: &AccountPatch) -> Result<()>;

    async fn delete_user(&self, user_id: &str) -> Result<()>;
}

/// Run a store call with an upper bound on how long it may take.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BallotError::Timeout(limit)),
    }
}
