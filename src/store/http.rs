use crate::admin::{AccountPatch, NewAccount};
use crate::config::Config;
use crate::error::{BallotError, Result};
use crate::models::{Ack, Selection};
use crate::store::VoteStore;
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// `VoteStore` backed by the voting service's REST API.
pub struct HttpStore {
    base: String,
    token: Option<String>,
    timeout: Duration,
    client: Client,
}

impl HttpStore {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BallotError::fetch(None, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base: config.api_base.clone(),
            token: config.token.clone(),
            timeout: config.timeout,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        debug!("{} {}", method, url);
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // Send, then return the parsed body on success or the mapped error
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Option<Value>> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("{}: timed out after {:?}", action, self.timeout);
                BallotError::Timeout(self.timeout)
            } else {
                error!("{}: {}", action, e);
                BallotError::fetch(None, format!("{}: {}", action, e))
            }
        })?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let text = response.text().await.unwrap_or_default();
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if success {
            Ok(body)
        } else {
            warn!("{} failed with status {}", action, status);
            Err(error_from_response(status, body.as_ref(), action))
        }
    }
}

/// Map a non-success response to a `Fetch` error, preferring the server's `message`.
pub(crate) fn error_from_response(status: u16, body: Option<&Value>, action: &str) -> BallotError {
    let message = body
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} ({})", action, status));
    BallotError::fetch(Some(status), message)
}

/// A rejected submission that means "this voter already has a vote on record".
pub(crate) fn is_duplicate_vote(err: &BallotError) -> bool {
    match err {
        BallotError::Fetch { status, message } => {
            *status == Some(409) || message.to_lowercase().contains("already voted")
        }
        _ => false,
    }
}

fn message_of(body: Option<&Value>) -> Option<String> {
    body.and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl VoteStore for HttpStore {
    async fn fetch_options(&self) -> Result<Value> {
        let body = self
            .send(self.request(Method::GET, "/api/votes/options/main"), "Failed to load options")
            .await?;
        Ok(body.unwrap_or(Value::Null))
    }

    // The bearer token identifies the voter, so the id isn't sent
    async fn submit_vote(&self, _voter_id: &str, selection: &Selection) -> Result<Ack> {
        let request = self.request(Method::POST, "/api/votes/submit").json(selection);
        let body = match self.send(request, "Failed to submit vote").await {
            Ok(body) => body,
            Err(e) if is_duplicate_vote(&e) => {
                warn!("Server rejected submission as a duplicate: {}", e);
                return Err(BallotError::AlreadyVoted);
            }
            Err(e) => return Err(e),
        };

        let message = message_of(body.as_ref()).unwrap_or_else(|| match selection {
            Selection::Catalog { .. } => "Submitted vote".to_string(),
            Selection::Freeform { title, .. } => format!("Submitted custom option: \"{}\"", title),
        });
        Ok(Ack { message })
    }

    async fn fetch_results(&self) -> Result<Value> {
        let body = self
            .send(self.request(Method::GET, "/api/votes/results"), "Failed to fetch results")
            .await?;
        Ok(body.unwrap_or(Value::Null))
    }

    async fn list_users(&self) -> Result<Value> {
        let body = self
            .send(self.request(Method::GET, "/api/users"), "Failed to fetch users")
            .await?;
        Ok(body.unwrap_or(Value::Null))
    }

    async fn create_user(&self, account: &NewAccount) -> Result<()> {
        let request = self.request(Method::POST, "/api/auth/register").json(account);
        self.send(request, "Failed to register user").await?;
        Ok(())
    }

    async fn update_user(&self, user_id: &str, patch: &AccountPatch) -> Result<()> {
        let request = self
            .request(Method::PUT, &format!("/api/users/{}", user_id))
            .json(patch);
        self.send(request, "Failed to update user").await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("/api/users/{}", user_id));
        self.send(request, "Failed to delete user").await?;
        Ok(())
    }
}
