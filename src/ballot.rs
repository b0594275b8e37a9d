use crate::error::{BallotError, Result};
use crate::models::{Ack, Selection};
use crate::session::Identity;
use crate::store::{VoteStore, bounded};
use crate::voting::Results;
use crate::voting::catalog::OptionCatalog;
use crate::voting::state::VoteStateMachine;
use crate::voting::tally;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// One signed-in voter's view of the ballot.
///
/// Owns the option snapshot and the vote state; nothing here is shared
/// between sessions.
pub struct BallotSession {
    store: Arc<dyn VoteStore>,
    identity: Identity,
    catalog: OptionCatalog,
    votes: VoteStateMachine,
    timeout: Duration,
}

impl BallotSession {
    pub fn new(store: Arc<dyn VoteStore>, identity: Identity, timeout: Duration) -> Self {
        let votes = VoteStateMachine::new(identity.vote_state());
        Self {
            store,
            identity,
            catalog: OptionCatalog::default(),
            votes,
            timeout,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn catalog(&self) -> &OptionCatalog {
        &self.catalog
    }

    pub fn has_voted(&self) -> bool {
        self.votes.has_voted()
    }

    /// Rebuild the catalog from the store. On failure the old one is kept.
    pub async fn load_options(&mut self) -> Result<&OptionCatalog> {
        match bounded(self.timeout, self.store.fetch_options()).await {
            Ok(payload) => {
                self.catalog = OptionCatalog::from_payload(&payload);
                info!("Loaded {} ballot option(s)", self.catalog.len());
                Ok(&self.catalog)
            }
            Err(e) => {
                error!("Failed to load options: {}", e);
                Err(e)
            }
        }
    }

    pub async fn submit(&mut self, selection: Option<Selection>) -> Result<Ack> {
        let selection = self.votes.prepare(selection, &self.catalog)?;

        info!("Submitting vote for user {}", self.identity.id);
        match bounded(self.timeout, self.store.submit_vote(&self.identity.id, &selection)).await {
            Ok(ack) => {
                self.votes.mark_voted();
                Ok(ack)
            }
            Err(BallotError::AlreadyVoted) => {
                // The store already holds a vote for this user
                warn!("Store reports user {} has already voted", self.identity.id);
                self.votes.mark_voted();
                Err(BallotError::AlreadyVoted)
            }
            Err(e) => {
                error!("Vote submission failed: {}", e);
                Err(e)
            }
        }
    }

    pub async fn results(&self) -> Result<Results> {
        let payload = bounded(self.timeout, self.store.fetch_results()).await?;
        let tally = tally::aggregate(&payload);
        Ok(Results::new(tally, &self.catalog))
    }
}
