use crate::error::{BallotError, Result};
use crate::models::Selection;
use crate::voting::catalog::OptionCatalog;
use log::{info, warn};
use serde_json::Value;

/// Read a vote-status flag regardless of how the backend encoded it.
///
/// Booleans pass through, numbers are truthy when non-zero, strings when they
/// are `true`, `voted` or `yes` (any case). Everything else is false.
pub fn coerce_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => {
            let lower = s.to_lowercase();
            lower == "true" || lower == "voted" || lower == "yes"
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    NotVoted,
    Voted,
}

impl VoteState {
    pub fn from_value(value: Option<&Value>) -> Self {
        if value.is_some_and(coerce_truthy) {
            VoteState::Voted
        } else {
            VoteState::NotVoted
        }
    }
}

/// Tracks whether the current user may still vote. `Voted` is terminal.
#[derive(Debug, Clone)]
pub struct VoteStateMachine {
    state: VoteState,
}

impl VoteStateMachine {
    pub fn new(initial: VoteState) -> Self {
        Self { state: initial }
    }

    pub fn from_value(value: Option<&Value>) -> Self {
        Self::new(VoteState::from_value(value))
    }

    pub fn state(&self) -> VoteState {
        self.state
    }

    pub fn has_voted(&self) -> bool {
        self.state == VoteState::Voted
    }

    /// Check a selection against the catalog before anything is sent.
    ///
    /// Returns the selection to submit. No state changes here.
    pub fn prepare(&self, selection: Option<Selection>, catalog: &OptionCatalog) -> Result<Selection> {
        if self.has_voted() {
            return Err(BallotError::AlreadyVoted);
        }

        let selection = selection.ok_or_else(|| BallotError::validation("Please choose an option"))?;

        match selection {
            Selection::Catalog { option_id } => {
                let option = catalog
                    .get(&option_id)
                    .ok_or_else(|| BallotError::validation(format!("Unknown option: {}", option_id)))?;
                // The freeform entry needs a title, so it can't be picked by id alone
                if option.is_freeform {
                    return Err(BallotError::validation(
                        "Please enter a title for your custom option",
                    ));
                }
                Ok(Selection::Catalog { option_id })
            }
            Selection::Freeform { title, detail } => {
                if title.trim().is_empty() {
                    return Err(BallotError::validation(
                        "Please enter a title for your custom option",
                    ));
                }
                Ok(Selection::freeform(&title, Some(&detail)))
            }
        }
    }

    /// The store acknowledged the vote.
    pub fn mark_voted(&mut self) {
        if self.state == VoteState::NotVoted {
            info!("Vote state transitioned to VOTED");
        }
        self.state = VoteState::Voted;
    }

    /// Fold in a freshly fetched status. Stale data can never undo a vote.
    pub fn reconcile(&mut self, value: Option<&Value>) {
        match (self.state, VoteState::from_value(value)) {
            (VoteState::NotVoted, VoteState::Voted) => self.mark_voted(),
            (VoteState::Voted, VoteState::NotVoted) => {
                warn!("Ignoring stale vote status from server; user has already voted");
            }
            _ => {}
        }
    }
}

impl Default for VoteStateMachine {
    fn default() -> Self {
        Self::new(VoteState::NotVoted)
    }
}
