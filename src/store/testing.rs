// MockStore - scripted VoteStore for unit tests
//
// Counts every call so tests can assert that local checks short-circuit
// before anything reaches the store.

use crate::admin::{AccountPatch, NewAccount};
use crate::error::{BallotError, Result};
use crate::models::{Ack, Selection};
use crate::store::VoteStore;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MockStore {
    pub options: Value,
    pub results: Value,
    pub users: Value,
    /// Error returned by the next `submit_vote`, if set.
    pub submit_error: Mutex<Option<BallotError>>,
    /// Error returned by the next read call, if set.
    pub read_error: Mutex<Option<BallotError>>,
    /// Makes every call sleep this long first.
    pub delay: Option<Duration>,
    pub submit_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub admin_calls: AtomicUsize,
    pub submitted: Mutex<Vec<(String, Selection)>>,
    pub created: Mutex<Vec<NewAccount>>,
    pub patched: Mutex<Vec<(String, AccountPatch)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn with_options(options: Value) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn fail_next_submit(&self, err: BallotError) {
        *self.submit_error.lock().unwrap() = Some(err);
    }

    pub fn fail_next_read(&self, err: BallotError) {
        *self.read_error.lock().unwrap() = Some(err);
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn admin_count(&self) -> usize {
        self.admin_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn read(&self, value: &Value) -> Result<Value> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        match self.read_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(value.clone()),
        }
    }
}

#[async_trait]
impl VoteStore for MockStore {
    async fn fetch_options(&self) -> Result<Value> {
        self.read(&self.options).await
    }

    async fn submit_vote(&self, voter_id: &str, selection: &Selection) -> Result<Ack> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = self.submit_error.lock().unwrap().take() {
            return Err(err);
        }
        self.submitted
            .lock()
            .unwrap()
            .push((voter_id.to_string(), selection.clone()));
        Ok(Ack {
            message: "Vote recorded".to_string(),
        })
    }

    async fn fetch_results(&self) -> Result<Value> {
        self.read(&self.results).await
    }

    async fn list_users(&self) -> Result<Value> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.read(&self.users).await
    }

    async fn create_user(&self, account: &NewAccount) -> Result<()> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(account.clone());
        Ok(())
    }

    async fn update_user(&self, user_id: &str, patch: &AccountPatch) -> Result<()> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.patched
            .lock()
            .unwrap()
            .push((user_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.deleted.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}
