//! Single-vote ballots: option catalogs, vote state, result tallies and
//! account edit authorization, over a pluggable account/voting store.

pub mod admin;
pub mod ballot;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod models;
pub mod session;
pub mod store;
pub mod voting;

pub use admin::AdminConsole;
pub use admin::guard::{EditAuthorizationGuard, EditField};
pub use ballot::BallotSession;
pub use config::{Backend, Config};
pub use error::{BallotError, ErrorBody, Result};
pub use models::{PollOption, Selection, Tally, UserAccount};
pub use session::Identity;
pub use store::VoteStore;
pub use voting::Results;
pub use voting::catalog::OptionCatalog;
pub use voting::state::{VoteState, VoteStateMachine, coerce_truthy};
pub use voting::tally::aggregate;
